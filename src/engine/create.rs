//! Provisioning of new instances through the full wizard sequence.

use tracing::{info, instrument};

use crate::cancel::CancelSignal;
use crate::client::IdField;
use crate::error::LifecycleError;
use crate::transport::Transport;
use crate::types::{InstanceUid, ServiceId};
use crate::wire::CreateInstanceBody;

use super::operation::DefaultFill;
use super::wait::SettleTarget;
use super::{Engine, ParamMap};

const PLACEHOLDER_DESCRIPTION: &str = "Provisioned by nubes-lifecycle";

impl<T: Transport> Engine<T> {
    /// Provisions a new instance and returns its identifier once the create
    /// operation has finished and the instance runs.
    ///
    /// The steps run strictly in order: placeholder, create operation,
    /// descriptor fetch, reference resolution, explicit values, normalised
    /// values for required descriptors not yet sent, validation, run, then
    /// completion polling and settle.
    ///
    /// # Errors
    ///
    /// Returns [`LifecycleError::InvalidRequest`] for a zero service id or a
    /// blank display name, and propagates every wizard, polling and settle
    /// failure.
    #[instrument(skip(self, params, cancel), fields(service_id = %service_id))]
    pub async fn create(
        &self,
        service_id: ServiceId,
        display_name: &str,
        params: &ParamMap,
        cancel: &CancelSignal,
    ) -> Result<InstanceUid, LifecycleError> {
        if service_id.get() == 0 {
            return Err(LifecycleError::InvalidRequest(String::from(
                "service id must be positive",
            )));
        }
        if display_name.trim().is_empty() {
            return Err(LifecycleError::InvalidRequest(String::from(
                "display name must not be empty",
            )));
        }

        let placeholder = CreateInstanceBody {
            service_id,
            display_name,
            descr: PLACEHOLDER_DESCRIPTION,
        };
        let instance_uid = InstanceUid::new(
            self.client
                .post_for_id("/instances", &placeholder, IdField::InstanceUid, cancel)
                .await?,
        );
        info!(%instance_uid, "placeholder created");

        let operation_uid = self
            .create_operation(&instance_uid, None, "create", cancel)
            .await?;
        self.configure(&operation_uid, params, DefaultFill::Required, cancel)
            .await?;
        self.validate(&operation_uid, cancel).await?;
        self.run(&operation_uid, cancel).await?;

        let deadline = self.operation_deadline()?;
        self.poll_operation(&operation_uid, deadline, cancel).await?;
        self.wait_for_settle(&instance_uid, SettleTarget::Created, deadline, cancel)
            .await?;
        info!(%instance_uid, "instance created");
        Ok(instance_uid)
    }
}
