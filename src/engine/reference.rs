//! Resolution of display names to instance identifiers for reference
//! parameters.

use std::collections::BTreeMap;

use tracing::{debug, info, instrument};
use uuid::Uuid;

use crate::cancel::CancelSignal;
use crate::error::LifecycleError;
use crate::transport::Transport;
use crate::types::{InstanceUid, ParamId, ServiceId};
use crate::wire::ParamDescriptor;

use super::lookup::MAX_PAGES;
use super::{Engine, ParamMap};

const UID_LEN: usize = 36;

/// Reports whether `value` already looks like an instance identifier: a
/// 36-character hyphenated hexadecimal UUID, surrounding whitespace ignored.
///
/// ```
/// use nubes_lifecycle::engine::is_uid_like;
/// assert!(is_uid_like("0f8e6c1a-3b5d-4e2f-9a7b-1c2d3e4f5a6b"));
/// assert!(!is_uid_like("postgres-main"));
/// assert!(!is_uid_like("0f8e6c1a3b5d4e2f9a7b1c2d3e4f5a6b"));
/// ```
#[must_use]
pub fn is_uid_like(value: &str) -> bool {
    let trimmed = value.trim();
    trimmed.len() == UID_LEN && Uuid::try_parse(trimmed).is_ok()
}

impl<T: Transport> Engine<T> {
    /// Replaces display names with instance identifiers for every supplied
    /// parameter whose descriptor references another service.
    ///
    /// Values that already look like identifiers pass through trimmed, without
    /// any request. Parameters without a reference are returned unchanged.
    ///
    /// # Errors
    ///
    /// Returns [`LifecycleError::ReferenceResolution`] when a name matches no
    /// instance and propagates listing failures.
    #[instrument(skip_all, fields(params = params.len()))]
    pub async fn resolve_references(
        &self,
        descriptors: &[ParamDescriptor],
        params: &ParamMap,
        cancel: &CancelSignal,
    ) -> Result<ParamMap, LifecycleError> {
        let references: BTreeMap<ParamId, ServiceId> = descriptors
            .iter()
            .filter_map(|descriptor| {
                descriptor
                    .reference_service()
                    .map(|service| (descriptor.svc_operation_cfs_param_id, service))
            })
            .collect();

        let mut resolved = ParamMap::new();
        for (param_id, value) in params {
            let Some(&service_id) = references.get(param_id) else {
                resolved.insert(*param_id, value.clone());
                continue;
            };
            if is_uid_like(value) {
                resolved.insert(*param_id, value.trim().to_owned());
                continue;
            }

            let uid = self
                .find_uid_by_name(service_id, value, cancel)
                .await?
                .ok_or_else(|| LifecycleError::ReferenceResolution {
                    param_id: *param_id,
                    service_id,
                    display_name: value.clone(),
                })?;
            info!(%param_id, %service_id, name = %value, instance_uid = %uid, "resolved reference");
            resolved.insert(*param_id, uid.to_string());
        }
        Ok(resolved)
    }

    async fn find_uid_by_name(
        &self,
        service_id: ServiceId,
        display_name: &str,
        cancel: &CancelSignal,
    ) -> Result<Option<InstanceUid>, LifecycleError> {
        let wanted = display_name.trim().to_lowercase();
        for page in 1..=MAX_PAGES {
            let listing = self.instance_page(page, cancel).await?;
            if listing.results.is_empty() {
                debug!(page, "reached end of instance listing");
                break;
            }
            let hit = listing.results.into_iter().find(|summary| {
                summary.service_id == Some(service_id)
                    && summary.display_name.trim().to_lowercase() == wanted
            });
            if let Some(summary) = hit {
                return Ok(Some(summary.instance_uid));
            }
        }
        Ok(None)
    }
}
