//! Idempotent creation: adopt, resume or provision.

use tracing::{info, instrument, warn};

use crate::cancel::CancelSignal;
use crate::error::LifecycleError;
use crate::transport::Transport;
use crate::wire::InstanceState;

use super::{Action, CreateRequest, Engine, ParamMap, ReconcileOutcome};

/// Status fragments that rule out adopting an existing instance.
const NON_ADOPTABLE: [&str; 5] = ["not created", "pending", "creating", "failed", "error"];

fn adoption_blocker(state: &InstanceState) -> Option<String> {
    let status = state.status();
    if status.is_empty() {
        return Some(String::from("<empty status>"));
    }
    if state.is_busy() {
        return Some(format!("{} (operation in progress)", state.explained_status));
    }
    NON_ADOPTABLE
        .iter()
        .any(|fragment| status.contains(fragment))
        .then(|| state.explained_status.clone())
}

impl<T: Transport> Engine<T> {
    /// Provisions `request`, or takes over a live instance with the same
    /// service id and display name.
    ///
    /// An existing instance is adopted unchanged unless its status mentions
    /// `suspend`, in which case it is resumed first. Neither path re-runs the
    /// create wizard.
    ///
    /// # Errors
    ///
    /// Returns [`LifecycleError::AlreadyExists`] when a match exists and
    /// adoption is disabled (no write request is issued),
    /// [`LifecycleError::NotReadyForAdoption`] when the match is still
    /// provisioning, busy with an operation, failed or stays suspended after
    /// the resume, and propagates create and resume failures.
    #[instrument(skip_all, fields(service_id = %request.service_id, display_name = %request.display_name))]
    pub async fn create_or_adopt(
        &self,
        request: &CreateRequest,
        cancel: &CancelSignal,
    ) -> Result<ReconcileOutcome, LifecycleError> {
        let existing = self
            .find_instance(request.service_id, &request.display_name, cancel)
            .await?;
        let Some(state) = existing else {
            let uid = self
                .create(
                    request.service_id,
                    &request.display_name,
                    &request.params,
                    cancel,
                )
                .await?;
            return Ok(ReconcileOutcome::Created(uid));
        };

        let instance_uid = state.instance_uid.clone();
        if !request.resume_if_exists {
            return Err(LifecycleError::AlreadyExists {
                service_id: request.service_id,
                display_name: request.display_name.clone(),
                instance_uid,
            });
        }
        if let Some(status) = adoption_blocker(&state) {
            return Err(LifecycleError::NotReadyForAdoption {
                instance_uid,
                status,
            });
        }
        if !request.params.is_empty() {
            warn!(%instance_uid, "explicit parameters ignored when adopting an existing instance");
        }

        if !state.status().contains("suspend") {
            info!(%instance_uid, status = %state.explained_status, "adopting existing instance");
            return Ok(ReconcileOutcome::Adopted(instance_uid));
        }

        info!(%instance_uid, "resuming suspended instance");
        self.run_operation(&instance_uid, Action::Resume, &ParamMap::new(), cancel)
            .await?;
        let resumed = self.instance_state(&instance_uid, cancel).await?;
        let still_blocked = if resumed.status().contains("suspend") {
            Some(resumed.explained_status.clone())
        } else {
            adoption_blocker(&resumed)
        };
        if let Some(status) = still_blocked {
            return Err(LifecycleError::NotReadyForAdoption {
                instance_uid,
                status,
            });
        }
        Ok(ReconcileOutcome::Resumed(instance_uid))
    }
}
