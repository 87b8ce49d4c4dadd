//! Completion polling for operations and instances.
//!
//! An operation is finished only when its `dtFinish` timestamp is present;
//! progress flags are logged but never decide termination. Settling then
//! waits for the owning instance to reach the state the action aims for.

use std::time::Instant;

use tracing::{debug, info, instrument};

use crate::cancel::{CancelSignal, sleep_or_cancel};
use crate::error::LifecycleError;
use crate::transport::Transport;
use crate::types::{InstanceUid, OperationUid};
use crate::wire::{InstanceState, OperationStatus, OperationStatusEnvelope};

use super::Engine;

/// State an instance must reach after an operation finishes.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub(super) enum SettleTarget {
    /// Running after a create; a "not created" or deleted instance fails.
    Created,
    /// Running after modify or resume.
    Running,
    /// Suspended.
    Suspended,
    /// Deleted, or no longer readable.
    Deleted,
}

impl SettleTarget {
    const fn phase(self) -> &'static str {
        match self {
            Self::Created | Self::Running => "running",
            Self::Suspended => "suspended",
            Self::Deleted => "deleted",
        }
    }

    fn is_reached(self, state: &InstanceState) -> bool {
        let status = state.status();
        match self {
            Self::Created | Self::Running => {
                !state.is_deleted
                    && ["running", "active", "deployed"]
                        .iter()
                        .any(|marker| status.contains(marker))
            }
            Self::Suspended => !state.is_deleted && status.contains("suspend"),
            Self::Deleted => state.is_gone(),
        }
    }
}

impl<T: Transport> Engine<T> {
    /// Reads the status of `operation_uid` once.
    ///
    /// # Errors
    ///
    /// Propagates transport and decode failures.
    pub async fn operation_status(
        &self,
        operation_uid: &OperationUid,
        cancel: &CancelSignal,
    ) -> Result<OperationStatus, LifecycleError> {
        let envelope: OperationStatusEnvelope = self
            .client
            .get_json(&format!("/instanceOperations/{operation_uid}"), cancel)
            .await?;
        Ok(envelope.instance_operation)
    }

    /// Blocks until `operation_uid` reports a completion timestamp, bounded by
    /// the configured operation timeout.
    ///
    /// # Errors
    ///
    /// Returns [`LifecycleError::OperationFailed`] when the operation finished
    /// with a false success flag or an error log,
    /// [`LifecycleError::InvalidRequest`] when the timeout cannot be added to
    /// the current instant, [`LifecycleError::OperationTimeout`] when no timestamp
    /// appears in time and [`LifecycleError::Cancelled`] when `cancel` fires.
    pub async fn wait_for_operation(
        &self,
        operation_uid: &OperationUid,
        cancel: &CancelSignal,
    ) -> Result<(), LifecycleError> {
        let deadline = self.operation_deadline()?;
        self.poll_operation(operation_uid, deadline, cancel).await
    }

    #[instrument(skip(self, deadline, cancel), fields(operation_uid = %operation_uid))]
    pub(super) async fn poll_operation(
        &self,
        operation_uid: &OperationUid,
        deadline: Instant,
        cancel: &CancelSignal,
    ) -> Result<(), LifecycleError> {
        let started = Instant::now();
        loop {
            sleep_or_cancel(self.operation_poll_interval, cancel)
                .await
                .map_err(|_| {
                    LifecycleError::cancelled(format!("wait for operation {operation_uid}"))
                })?;
            if Instant::now() > deadline {
                return Err(LifecycleError::OperationTimeout {
                    operation_uid: operation_uid.clone(),
                    waited: started.elapsed(),
                });
            }

            let status = self.operation_status(operation_uid, cancel).await?;
            if !status.is_finished() {
                debug!(
                    in_progress = status.is_in_progress,
                    pending = status.is_pending,
                    "operation not finished"
                );
                continue;
            }

            if status.is_successful == Some(false) || status.error_text().is_some() {
                return Err(LifecycleError::OperationFailed {
                    operation_uid: operation_uid.clone(),
                    error_log: status.error_text().map(str::to_owned),
                });
            }
            info!(elapsed_ms = elapsed_ms(started), "operation finished");
            return Ok(());
        }
    }

    /// Polls `instance_uid` until it reaches `target`.
    ///
    /// The first read happens immediately. A 404 counts as deleted.
    #[instrument(skip(self, deadline, cancel), fields(instance_uid = %instance_uid, target = target.phase()))]
    pub(super) async fn wait_for_settle(
        &self,
        instance_uid: &InstanceUid,
        target: SettleTarget,
        deadline: Instant,
        cancel: &CancelSignal,
    ) -> Result<(), LifecycleError> {
        loop {
            let state = match self.instance_state(instance_uid, cancel).await {
                Ok(state) => state,
                Err(LifecycleError::Api { status: 404, .. }) if target == SettleTarget::Deleted => {
                    info!("instance no longer readable");
                    return Ok(());
                }
                Err(err) => return Err(err),
            };

            let status = state.status();
            if status.contains("error") || status.contains("failed") {
                return Err(LifecycleError::InstanceFailed {
                    instance_uid: instance_uid.clone(),
                    status: state.explained_status,
                });
            }
            if target.is_reached(&state) {
                info!(status = %state.explained_status, "instance settled");
                return Ok(());
            }
            if target == SettleTarget::Created && (state.is_deleted || status.contains("not created"))
            {
                return Err(LifecycleError::NotCreated {
                    instance_uid: instance_uid.clone(),
                    status: state.explained_status,
                });
            }
            debug!(status = %state.explained_status, "instance not settled");

            if Instant::now() >= deadline {
                return Err(LifecycleError::InstanceTimeout {
                    instance_uid: instance_uid.clone(),
                    phase: target.phase().to_owned(),
                    last_status: state.explained_status,
                });
            }
            sleep_or_cancel(self.settle_poll_interval, cancel)
                .await
                .map_err(|_| LifecycleError::cancelled(format!("settle of instance {instance_uid}")))?;
        }
    }

    /// Polls `instance_uid` until no operation is pending or executing and
    /// returns the idle state.
    #[instrument(skip(self, deadline, cancel), fields(instance_uid = %instance_uid))]
    pub(super) async fn wait_for_idle(
        &self,
        instance_uid: &InstanceUid,
        deadline: Instant,
        cancel: &CancelSignal,
    ) -> Result<InstanceState, LifecycleError> {
        info!("instance busy, waiting for running operation");
        loop {
            sleep_or_cancel(self.operation_poll_interval, cancel)
                .await
                .map_err(|_| LifecycleError::cancelled(format!("idle wait for instance {instance_uid}")))?;
            let state = self.instance_state(instance_uid, cancel).await?;
            if !state.is_busy() {
                return Ok(state);
            }
            if Instant::now() > deadline {
                return Err(LifecycleError::InstanceTimeout {
                    instance_uid: instance_uid.clone(),
                    phase: String::from("idle"),
                    last_status: state.explained_status,
                });
            }
        }
    }
}

fn elapsed_ms(started: Instant) -> u64 {
    u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX)
}
