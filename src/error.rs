//! Error taxonomy for the lifecycle engine.

use std::time::Duration;

use thiserror::Error;

use crate::types::{InstanceUid, OperationUid, ParamId, ServiceId};

/// Errors raised while driving the remote wizard protocol.
#[derive(Clone, Debug, Error, Eq, PartialEq)]
pub enum LifecycleError {
    /// Raised for network failures and server errors that survived retries.
    #[error("transport failure: {message}")]
    Transport {
        /// HTTP status of the last attempt when the server answered.
        status: Option<u16>,
        /// Description of the last failed attempt.
        message: String,
    },
    /// Raised for 4xx responses; never retried.
    #[error("API error {status}: {body}")]
    Api {
        /// HTTP status returned by the remote side.
        status: u16,
        /// Raw response body.
        body: String,
    },
    /// Raised when a response body does not match the expected shape.
    #[error("failed to decode {context}: {message}")]
    Decode {
        /// Endpoint or object being decoded.
        context: String,
        /// Parser error message.
        message: String,
    },
    /// Raised when a create call returns no usable identifier.
    #[error("could not extract {field} from response (Location: {})", describe_location(.location.as_deref()))]
    IdentifierExtraction {
        /// Identifier field that was expected.
        field: String,
        /// `Location` header value, when one was present.
        location: Option<String>,
    },
    /// Raised when the remote side rejects the submitted parameters.
    #[error("validation failed for operation {operation_uid}: {body}")]
    ValidationFailed {
        /// Operation that failed validation.
        operation_uid: OperationUid,
        /// HTTP status of the validation response.
        status: Option<u16>,
        /// Server diagnostic text.
        body: String,
    },
    /// Raised when a caller supplies a parameter id the operation does not declare.
    #[error("parameter {param_id} is not declared by operation {operation_uid}")]
    UnknownParameter {
        /// Parameter id supplied by the caller.
        param_id: ParamId,
        /// Operation that was being configured.
        operation_uid: OperationUid,
    },
    /// Raised when the requested action is not currently offered by the instance.
    #[error("action {action} not available for instance {instance_uid} (available: {})", .available.join(", "))]
    ActionUnavailable {
        /// Requested action name.
        action: String,
        /// Instance the action was requested for.
        instance_uid: InstanceUid,
        /// Actions the instance currently offers.
        available: Vec<String>,
    },
    /// Raised when the remote execution of an operation fails.
    #[error("operation {operation_uid} failed: {}", .error_log.as_deref().unwrap_or("no error log reported"))]
    OperationFailed {
        /// Operation that failed.
        operation_uid: OperationUid,
        /// Server diagnostic text, when available.
        error_log: Option<String>,
    },
    /// Raised when an operation reports no completion timestamp before the deadline.
    #[error("timeout after {}s waiting for operation {operation_uid} to finish", .waited.as_secs())]
    OperationTimeout {
        /// Operation being waited on.
        operation_uid: OperationUid,
        /// Time spent waiting.
        waited: Duration,
    },
    /// Raised when an instance does not reach the expected state before the deadline.
    #[error("timeout waiting for instance {instance_uid} to become {phase} (last status: {last_status})")]
    InstanceTimeout {
        /// Instance being waited on.
        instance_uid: InstanceUid,
        /// State the instance was expected to reach.
        phase: String,
        /// Last explained status observed.
        last_status: String,
    },
    /// Raised when an instance reports an error status while settling.
    #[error("instance {instance_uid} ended in status {status}")]
    InstanceFailed {
        /// Instance that failed.
        instance_uid: InstanceUid,
        /// Explained status reported by the remote side.
        status: String,
    },
    /// Raised when a create operation finishes but the instance was never created.
    #[error("instance {instance_uid} not created after operation finish (status: {status})")]
    NotCreated {
        /// Instance placeholder identifier.
        instance_uid: InstanceUid,
        /// Explained status reported by the remote side.
        status: String,
    },
    /// Raised when a referenced display name cannot be matched to an instance.
    #[error("failed to resolve param {param_id}: no instance found for serviceId={service_id} displayName={display_name}")]
    ReferenceResolution {
        /// Parameter carrying the reference.
        param_id: ParamId,
        /// Service the reference points at.
        service_id: ServiceId,
        /// Display name that could not be matched.
        display_name: String,
    },
    /// Raised when an instance with the same name exists and adoption is disabled.
    #[error("instance {display_name} (service {service_id}) already exists as {instance_uid}")]
    AlreadyExists {
        /// Service identifier searched.
        service_id: ServiceId,
        /// Display name searched.
        display_name: String,
        /// Identifier of the existing instance.
        instance_uid: InstanceUid,
    },
    /// Raised when an existing instance is in a state that cannot be adopted.
    #[error("instance {instance_uid} exists but is not ready for adoption: {status}")]
    NotReadyForAdoption {
        /// Existing instance identifier.
        instance_uid: InstanceUid,
        /// Explained status reported by the remote side.
        status: String,
    },
    /// Raised when the caller's cancellation signal fires.
    #[error("{context} cancelled")]
    Cancelled {
        /// What was in flight when cancellation was observed.
        context: String,
    },
    /// Raised when a caller-supplied argument is unusable.
    #[error("invalid request: {0}")]
    InvalidRequest(String),
}

impl LifecycleError {
    /// Reports whether the error means the deadline elapsed rather than a
    /// definitive failure; the remote side may still finish later.
    #[must_use]
    pub const fn is_timeout(&self) -> bool {
        matches!(
            self,
            Self::OperationTimeout { .. } | Self::InstanceTimeout { .. }
        )
    }

    pub(crate) fn cancelled(context: impl Into<String>) -> Self {
        Self::Cancelled {
            context: context.into(),
        }
    }

    pub(crate) fn decode(context: impl Into<String>, err: &serde_json::Error) -> Self {
        Self::Decode {
            context: context.into(),
            message: err.to_string(),
        }
    }
}

fn describe_location(location: Option<&str>) -> &str {
    match location {
        Some(value) if !value.is_empty() => value,
        _ => "<none>",
    }
}
