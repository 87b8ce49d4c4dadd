//! Instance reads and paginated lookup by display name.

use tracing::{debug, instrument};

use crate::cancel::CancelSignal;
use crate::error::LifecycleError;
use crate::transport::Transport;
use crate::types::{InstanceUid, ServiceId};
use crate::wire::{InstanceEnvelope, InstancePage, InstanceState};

use super::Engine;

/// Instances requested per listing page.
pub(super) const PAGE_SIZE: u32 = 100;
/// Upper bound on listing pages scanned by one lookup.
pub(super) const MAX_PAGES: u32 = 100;

impl<T: Transport> Engine<T> {
    /// Reads the current state of `instance_uid`.
    ///
    /// # Errors
    ///
    /// Returns [`LifecycleError::Api`] when the instance does not exist and
    /// propagates transport and decode failures.
    pub async fn instance_state(
        &self,
        instance_uid: &InstanceUid,
        cancel: &CancelSignal,
    ) -> Result<InstanceState, LifecycleError> {
        let envelope: InstanceEnvelope = self
            .client
            .get_json(&format!("/instances/{instance_uid}"), cancel)
            .await?;
        Ok(envelope.instance)
    }

    /// Finds the first live instance of `service_id` named exactly
    /// `display_name`.
    ///
    /// Deleted instances (by flag or status) are skipped. At most 100 pages
    /// of 100 instances are scanned.
    ///
    /// # Errors
    ///
    /// Propagates listing and state-read failures.
    #[instrument(skip(self, cancel), fields(service_id = %service_id))]
    pub async fn find_instance(
        &self,
        service_id: ServiceId,
        display_name: &str,
        cancel: &CancelSignal,
    ) -> Result<Option<InstanceState>, LifecycleError> {
        for page in 1..=MAX_PAGES {
            let listing = self.instance_page(page, cancel).await?;
            if listing.results.is_empty() {
                break;
            }
            for summary in listing.results {
                if summary.service_id != Some(service_id) || summary.display_name != display_name {
                    continue;
                }
                let state = self.instance_state(&summary.instance_uid, cancel).await?;
                if state.is_gone() {
                    debug!(instance_uid = %summary.instance_uid, "skipping deleted instance");
                    continue;
                }
                return Ok(Some(state));
            }
        }
        Ok(None)
    }

    pub(super) async fn instance_page(
        &self,
        page: u32,
        cancel: &CancelSignal,
    ) -> Result<InstancePage, LifecycleError> {
        debug!(page, "listing instances");
        self.client
            .get_json(&format!("/instances?page={page}&size={PAGE_SIZE}"), cancel)
            .await
    }
}
