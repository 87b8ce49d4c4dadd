//! Lifecycle engine driving the remote wizard protocol.
//!
//! [`Engine`] wraps an [`ApiClient`] and implements placeholder creation,
//! operation runs, completion polling, reference resolution and idempotent
//! reconciliation. The implementation is split by concern across the
//! submodules, each adding methods to [`Engine`].

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use std::time::{Duration, Instant};

use thiserror::Error;

use crate::client::ApiClient;
use crate::config::NubesConfig;
use crate::error::LifecycleError;
use crate::retry::RetryPolicy;
use crate::transport::Transport;
use crate::types::{InstanceUid, ParamId, ServiceId};

mod create;
mod lookup;
mod operation;
mod reconcile;
mod reference;
mod wait;

pub use reference::is_uid_like;

/// Default bound on polling one operation plus waiting for the instance.
pub const DEFAULT_OPERATION_TIMEOUT: Duration = Duration::from_secs(30 * 60);
/// Default interval between operation status reads.
pub const DEFAULT_OPERATION_POLL_INTERVAL: Duration = Duration::from_secs(5);
/// Default interval between instance status reads while settling.
pub const DEFAULT_SETTLE_POLL_INTERVAL: Duration = Duration::from_secs(10);

/// Caller-supplied parameter values keyed by parameter id. Submission order
/// follows the key order.
pub type ParamMap = BTreeMap<ParamId, String>;

/// Lifecycle actions that run against an existing instance.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum Action {
    /// Reconfigure the instance.
    Modify,
    /// Stop the instance, keeping its data.
    Suspend,
    /// Remove the instance.
    Delete,
    /// Start a suspended instance.
    Resume,
}

impl Action {
    /// Action name as the remote catalogue spells it.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Modify => "modify",
            Self::Suspend => "suspend",
            Self::Delete => "delete",
            Self::Resume => "resume",
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Raised when parsing an unknown action name.
#[derive(Clone, Debug, Error, Eq, PartialEq)]
#[error("unknown action `{0}` (expected modify, suspend, delete or resume)")]
pub struct UnknownAction(pub String);

impl FromStr for Action {
    type Err = UnknownAction;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "modify" => Ok(Self::Modify),
            "suspend" => Ok(Self::Suspend),
            "delete" => Ok(Self::Delete),
            "resume" => Ok(Self::Resume),
            _ => Err(UnknownAction(value.to_owned())),
        }
    }
}

/// How an instance is retired when its owner lets go of it.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub enum RetireMode {
    /// Forget the instance locally, leave it running remotely.
    #[default]
    StateOnly,
    /// Suspend the instance.
    Suspend,
    /// Delete the instance.
    Delete,
}

impl RetireMode {
    /// Action issued for this mode, if any.
    #[must_use]
    pub const fn action(self) -> Option<Action> {
        match self {
            Self::StateOnly => None,
            Self::Suspend => Some(Action::Suspend),
            Self::Delete => Some(Action::Delete),
        }
    }
}

/// Raised when parsing an unknown retire mode.
#[derive(Clone, Debug, Error, Eq, PartialEq)]
#[error("unknown retire mode `{0}` (expected state_only, suspend or delete)")]
pub struct UnknownRetireMode(pub String);

impl FromStr for RetireMode {
    type Err = UnknownRetireMode;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "" | "state_only" => Ok(Self::StateOnly),
            "suspend" => Ok(Self::Suspend),
            "delete" => Ok(Self::Delete),
            _ => Err(UnknownRetireMode(value.to_owned())),
        }
    }
}

/// Inputs for [`Engine::create_or_adopt`].
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct CreateRequest {
    /// Service catalogue identifier.
    pub service_id: ServiceId,
    /// Display name, also the lookup key for existing instances.
    pub display_name: String,
    /// Adopt or resume an existing instance instead of failing.
    pub resume_if_exists: bool,
    /// Explicit parameter values.
    pub params: ParamMap,
}

impl CreateRequest {
    /// Builds a request with no explicit parameters that adopts existing
    /// instances.
    #[must_use]
    pub fn new(service_id: ServiceId, display_name: impl Into<String>) -> Self {
        Self {
            service_id,
            display_name: display_name.into(),
            resume_if_exists: true,
            params: ParamMap::new(),
        }
    }

    /// Sets whether existing instances may be adopted.
    #[must_use]
    pub const fn resume_if_exists(mut self, enabled: bool) -> Self {
        self.resume_if_exists = enabled;
        self
    }

    /// Adds an explicit parameter value.
    #[must_use]
    pub fn param(mut self, id: impl Into<ParamId>, value: impl Into<String>) -> Self {
        self.params.insert(id.into(), value.into());
        self
    }
}

/// Result of [`Engine::create_or_adopt`].
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum ReconcileOutcome {
    /// A new instance was provisioned.
    Created(InstanceUid),
    /// An existing instance was adopted unchanged.
    Adopted(InstanceUid),
    /// An existing suspended instance was resumed.
    Resumed(InstanceUid),
}

impl ReconcileOutcome {
    /// Identifier of the instance now owned by the caller.
    #[must_use]
    pub const fn instance_uid(&self) -> &InstanceUid {
        match self {
            Self::Created(uid) | Self::Adopted(uid) | Self::Resumed(uid) => uid,
        }
    }

    /// Short label for logs and CLI output.
    #[must_use]
    pub const fn label(&self) -> &'static str {
        match self {
            Self::Created(_) => "created",
            Self::Adopted(_) => "adopted",
            Self::Resumed(_) => "resumed",
        }
    }
}

/// Drives lifecycle operations against the remote API.
#[derive(Clone, Debug)]
pub struct Engine<T> {
    client: ApiClient<T>,
    operation_timeout: Duration,
    operation_poll_interval: Duration,
    settle_poll_interval: Duration,
}

impl<T: Transport> Engine<T> {
    /// Creates an engine with default timeouts and retry policy.
    #[must_use]
    pub fn new(transport: T) -> Self {
        Self {
            client: ApiClient::new(transport),
            operation_timeout: DEFAULT_OPERATION_TIMEOUT,
            operation_poll_interval: DEFAULT_OPERATION_POLL_INTERVAL,
            settle_poll_interval: DEFAULT_SETTLE_POLL_INTERVAL,
        }
    }

    /// Creates an engine using the timeouts and retry policy in `config`.
    #[must_use]
    pub fn configured(transport: T, config: &NubesConfig) -> Self {
        Self::new(transport)
            .with_retry_policy(config.retry_policy())
            .with_operation_timeout(config.operation_timeout())
            .with_operation_poll_interval(config.operation_poll_interval())
            .with_settle_poll_interval(config.settle_poll_interval())
    }

    /// Overrides the retry policy.
    #[must_use]
    pub fn with_retry_policy(mut self, policy: RetryPolicy) -> Self {
        self.client = self.client.with_retry_policy(policy);
        self
    }

    /// Overrides the deadline shared by operation polling and settling.
    ///
    /// Primarily intended for tests.
    #[must_use]
    pub const fn with_operation_timeout(mut self, timeout: Duration) -> Self {
        self.operation_timeout = timeout;
        self
    }

    /// Overrides the operation status poll interval.
    #[must_use]
    pub const fn with_operation_poll_interval(mut self, interval: Duration) -> Self {
        self.operation_poll_interval = interval;
        self
    }

    /// Overrides the instance settle poll interval.
    #[must_use]
    pub const fn with_settle_poll_interval(mut self, interval: Duration) -> Self {
        self.settle_poll_interval = interval;
        self
    }

    /// Borrows the API client.
    #[must_use]
    pub const fn client(&self) -> &ApiClient<T> {
        &self.client
    }

    /// Instant at which the operation timeout started now expires.
    fn operation_deadline(&self) -> Result<Instant, LifecycleError> {
        Instant::now()
            .checked_add(self.operation_timeout)
            .ok_or_else(|| {
                LifecycleError::InvalidRequest(format!(
                    "operation timeout of {}s is too large",
                    self.operation_timeout.as_secs()
                ))
            })
    }
}

#[cfg(test)]
mod tests;
