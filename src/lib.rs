//! Lifecycle engine for resources provisioned through the Nubes wizard API.
//!
//! Every resource kind is created, modified, suspended, resumed and deleted
//! through the same multi-step protocol: a placeholder instance, an attached
//! operation, individually submitted parameters, validation, execution and
//! completion polling. [`Engine`] drives that protocol over a pluggable
//! [`transport::Transport`], normalises parameter values the remote side is
//! picky about, resolves references between instances, retries transient
//! failures and reconciles creation with existing instances.

pub mod cancel;
pub mod client;
pub mod config;
pub mod engine;
pub mod error;
pub mod normalize;
pub mod retry;
pub mod test_support;
pub mod token;
pub mod transport;
pub mod types;
pub mod wire;

pub use cancel::{CancelHandle, CancelSignal, cancel_pair};
pub use config::{ConfigError, NubesConfig};
pub use engine::{Action, CreateRequest, Engine, ParamMap, ReconcileOutcome, RetireMode};
pub use error::LifecycleError;
pub use transport::{HttpSettings, HttpTransport};
pub use types::{InstanceUid, OperationUid, ParamId, ServiceId, SvcOperationId};
