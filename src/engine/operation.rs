//! Wizard steps shared by every action and the driver for actions on
//! existing instances.

use std::collections::BTreeSet;

use serde_json::json;
use tracing::{debug, info, instrument, warn};

use crate::cancel::CancelSignal;
use crate::client::IdField;
use crate::error::LifecycleError;
use crate::normalize::normalize;
use crate::transport::{ApiRequest, Transport};
use crate::types::{InstanceUid, OperationUid, ParamId, SvcOperationId};
use crate::wire::{CreateOperationBody, OperationParamsEnvelope, ParamDescriptor, SubmitParamBody};

use super::wait::SettleTarget;
use super::{Action, Engine, ParamMap, RetireMode};

/// Which descriptors receive a normalised value when the caller sent none.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub(super) enum DefaultFill {
    /// Only descriptors flagged as required.
    Required,
    /// Every descriptor.
    All,
}

impl DefaultFill {
    const fn applies_to(self, descriptor: &ParamDescriptor) -> bool {
        match self {
            Self::Required => descriptor.is_required,
            Self::All => true,
        }
    }
}

impl Action {
    const fn settle_target(self) -> SettleTarget {
        match self {
            Self::Modify | Self::Resume => SettleTarget::Running,
            Self::Suspend => SettleTarget::Suspended,
            Self::Delete => SettleTarget::Deleted,
        }
    }
}

impl<T: Transport> Engine<T> {
    /// Runs `action` against an existing instance and waits until it settles.
    ///
    /// The instance is first allowed to finish any running operation. A
    /// `modify` always walks the full wizard: explicit values, then a
    /// normalised value for every other descriptor, then validation. Other
    /// actions submit only explicit values and skip validation.
    ///
    /// # Errors
    ///
    /// Returns [`LifecycleError::ActionUnavailable`] when the instance does not
    /// offer `action`, and propagates wizard, polling and settle failures.
    #[instrument(skip(self, params, cancel), fields(instance_uid = %instance_uid, action = %action))]
    pub async fn run_operation(
        &self,
        instance_uid: &InstanceUid,
        action: Action,
        params: &ParamMap,
        cancel: &CancelSignal,
    ) -> Result<(), LifecycleError> {
        let deadline = self.operation_deadline()?;
        let mut state = self.instance_state(instance_uid, cancel).await?;
        if state.is_busy() {
            state = self.wait_for_idle(instance_uid, deadline, cancel).await?;
        }

        let svc_operation_id = state.operation_id(action.as_str()).ok_or_else(|| {
            LifecycleError::ActionUnavailable {
                action: action.as_str().to_owned(),
                instance_uid: instance_uid.clone(),
                available: state.action_names(),
            }
        })?;

        let operation_uid = self
            .create_operation(instance_uid, Some(svc_operation_id), action.as_str(), cancel)
            .await?;

        if action == Action::Modify {
            self.configure(&operation_uid, params, DefaultFill::All, cancel)
                .await?;
            self.validate(&operation_uid, cancel).await?;
        } else if params.is_empty() {
            self.log_descriptors(&operation_uid, cancel).await;
        } else {
            let descriptors = self.fetch_descriptors(&operation_uid, cancel).await?;
            let resolved = self
                .resolve_params(&operation_uid, &descriptors, params, cancel)
                .await?;
            self.submit_explicit(&operation_uid, &resolved, cancel)
                .await?;
        }

        self.run(&operation_uid, cancel).await?;
        self.poll_operation(&operation_uid, deadline, cancel).await?;
        self.wait_for_settle(instance_uid, action.settle_target(), deadline, cancel)
            .await?;
        info!("action completed");
        Ok(())
    }

    /// Retires `instance_uid` according to `mode`. [`RetireMode::StateOnly`]
    /// issues no request.
    ///
    /// # Errors
    ///
    /// Propagates [`Self::run_operation`] failures.
    pub async fn retire(
        &self,
        instance_uid: &InstanceUid,
        mode: RetireMode,
        cancel: &CancelSignal,
    ) -> Result<(), LifecycleError> {
        let Some(action) = mode.action() else {
            info!(%instance_uid, "leaving instance in place");
            return Ok(());
        };
        self.run_operation(instance_uid, action, &ParamMap::new(), cancel)
            .await
    }

    pub(super) async fn create_operation(
        &self,
        instance_uid: &InstanceUid,
        svc_operation_id: Option<SvcOperationId>,
        action: &str,
        cancel: &CancelSignal,
    ) -> Result<OperationUid, LifecycleError> {
        let body = CreateOperationBody {
            instance_uid,
            svc_operation_id,
            operation: action,
        };
        let uid = self
            .client
            .post_for_id(
                "/instanceOperations",
                &body,
                IdField::InstanceOperationUid,
                cancel,
            )
            .await?;
        let operation_uid = OperationUid::new(uid);
        info!(%operation_uid, action, "operation created");
        Ok(operation_uid)
    }

    pub(super) async fn fetch_descriptors(
        &self,
        operation_uid: &OperationUid,
        cancel: &CancelSignal,
    ) -> Result<Vec<ParamDescriptor>, LifecycleError> {
        let envelope: OperationParamsEnvelope = self
            .client
            .get_json(
                &format!("/instanceOperations/{operation_uid}?fields=cfsParams"),
                cancel,
            )
            .await?;
        Ok(envelope.instance_operation.cfs_params)
    }

    /// Fetches descriptors, resolves references, submits explicit values and
    /// fills the remaining descriptors selected by `fill`.
    pub(super) async fn configure(
        &self,
        operation_uid: &OperationUid,
        params: &ParamMap,
        fill: DefaultFill,
        cancel: &CancelSignal,
    ) -> Result<(), LifecycleError> {
        let descriptors = self.fetch_descriptors(operation_uid, cancel).await?;
        debug!(descriptors = descriptors.len(), "fetched parameter descriptors");
        let resolved = self
            .resolve_params(operation_uid, &descriptors, params, cancel)
            .await?;
        let sent = self
            .submit_explicit(operation_uid, &resolved, cancel)
            .await?;

        for descriptor in &descriptors {
            let param_id = descriptor.svc_operation_cfs_param_id;
            if sent.contains(&param_id) || !fill.applies_to(descriptor) {
                continue;
            }
            let value = normalize(descriptor, &descriptor.current_or_default());
            debug!(%param_id, value = %value, "submitting default");
            self.submit_param(operation_uid, param_id, &value, cancel)
                .await?;
        }
        Ok(())
    }

    async fn resolve_params(
        &self,
        operation_uid: &OperationUid,
        descriptors: &[ParamDescriptor],
        params: &ParamMap,
        cancel: &CancelSignal,
    ) -> Result<ParamMap, LifecycleError> {
        let declared: BTreeSet<ParamId> = descriptors
            .iter()
            .map(|descriptor| descriptor.svc_operation_cfs_param_id)
            .collect();
        if let Some(unknown) = params.keys().find(|id| !declared.contains(id)) {
            return Err(LifecycleError::UnknownParameter {
                param_id: *unknown,
                operation_uid: operation_uid.clone(),
            });
        }
        self.resolve_references(descriptors, params, cancel).await
    }

    async fn submit_explicit(
        &self,
        operation_uid: &OperationUid,
        params: &ParamMap,
        cancel: &CancelSignal,
    ) -> Result<BTreeSet<ParamId>, LifecycleError> {
        let mut sent = BTreeSet::new();
        for (param_id, value) in params {
            debug!(%param_id, "submitting explicit value");
            self.submit_param(operation_uid, *param_id, value, cancel)
                .await?;
            sent.insert(*param_id);
        }
        Ok(sent)
    }

    async fn submit_param(
        &self,
        operation_uid: &OperationUid,
        param_id: ParamId,
        value: &str,
        cancel: &CancelSignal,
    ) -> Result<(), LifecycleError> {
        let body = SubmitParamBody {
            instance_operation_uid: operation_uid,
            svc_operation_cfs_param_id: param_id,
            param_value: value,
        };
        self.client
            .post_json("/instanceOperationCfsParams", &body, cancel)
            .await?;
        Ok(())
    }

    pub(super) async fn validate(
        &self,
        operation_uid: &OperationUid,
        cancel: &CancelSignal,
    ) -> Result<(), LifecycleError> {
        let request = ApiRequest::get(format!("/instanceOperations/{operation_uid}/validate-cfs"));
        match self.client.execute(&request, cancel).await {
            Ok(_) => {
                debug!("parameters validated");
                Ok(())
            }
            Err(
                LifecycleError::Api { status, body }
                | LifecycleError::Transport {
                    status: Some(status),
                    message: body,
                },
            ) => Err(LifecycleError::ValidationFailed {
                operation_uid: operation_uid.clone(),
                status: Some(status),
                body,
            }),
            Err(err) => Err(err),
        }
    }

    pub(super) async fn run(
        &self,
        operation_uid: &OperationUid,
        cancel: &CancelSignal,
    ) -> Result<(), LifecycleError> {
        self.client
            .post_json(
                &format!("/instanceOperations/{operation_uid}/run"),
                &json!({}),
                cancel,
            )
            .await?;
        info!(%operation_uid, "operation started");
        Ok(())
    }

    async fn log_descriptors(&self, operation_uid: &OperationUid, cancel: &CancelSignal) {
        match self.fetch_descriptors(operation_uid, cancel).await {
            Ok(descriptors) => debug!(
                descriptors = descriptors.len(),
                required = descriptors.iter().filter(|d| d.is_required).count(),
                "operation parameters"
            ),
            Err(err) => warn!(error = %err, "could not fetch operation parameters"),
        }
    }
}
