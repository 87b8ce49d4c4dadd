//! Request execution on top of a [`Transport`].
//!
//! [`ApiClient`] owns the retry policy, turns 4xx responses into
//! [`LifecycleError::Api`], decodes JSON bodies into the typed structures in
//! [`crate::wire`], and extracts identifiers returned by create calls.

use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::debug;

use crate::cancel::CancelSignal;
use crate::error::LifecycleError;
use crate::retry::{RetryPolicy, send_with_retry};
use crate::transport::{ApiRequest, ApiResponse, Transport, strip_location_prefix};
use crate::wire::CreatedIds;

/// Identifier field a create call is expected to report.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum IdField {
    /// `instanceUid`, returned by `POST /instances`.
    InstanceUid,
    /// `instanceOperationUid`, returned by `POST /instanceOperations`.
    InstanceOperationUid,
}

impl IdField {
    /// JSON field name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::InstanceUid => "instanceUid",
            Self::InstanceOperationUid => "instanceOperationUid",
        }
    }
}

/// Extracts a created identifier from `response`.
///
/// The `Location` header wins (with its `./` prefix stripped), then the named
/// JSON body field, then a bare JSON string body.
///
/// # Errors
///
/// Returns [`LifecycleError::IdentifierExtraction`] when none of the sources
/// carries a non-blank value.
pub fn extract_id(response: &ApiResponse, field: IdField) -> Result<String, LifecycleError> {
    if let Some(location) = response.location.as_deref() {
        let id = strip_location_prefix(location);
        if !id.is_empty() {
            return Ok(id.to_owned());
        }
    }

    let from_field = serde_json::from_str::<CreatedIds>(&response.body)
        .ok()
        .and_then(|ids| match field {
            IdField::InstanceUid => ids.instance_uid,
            IdField::InstanceOperationUid => ids.instance_operation_uid,
        });
    let from_bare = || serde_json::from_str::<String>(&response.body).ok();

    from_field
        .or_else(from_bare)
        .map(|id| id.trim().to_owned())
        .filter(|id| !id.is_empty())
        .ok_or_else(|| LifecycleError::IdentifierExtraction {
            field: field.as_str().to_owned(),
            location: response.location.clone(),
        })
}

/// Retrying, decoding client for the wizard API.
#[derive(Clone, Debug)]
pub struct ApiClient<T> {
    transport: T,
    retry: RetryPolicy,
}

impl<T: Transport> ApiClient<T> {
    /// Wraps `transport` with the default retry policy.
    #[must_use]
    pub fn new(transport: T) -> Self {
        Self {
            transport,
            retry: RetryPolicy::default(),
        }
    }

    /// Replaces the retry policy.
    #[must_use]
    pub const fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Borrows the underlying transport.
    #[must_use]
    pub const fn transport(&self) -> &T {
        &self.transport
    }

    /// Sends `request` with retries and fails on any 4xx status.
    ///
    /// # Errors
    ///
    /// Returns [`LifecycleError::Api`] for 4xx responses and whatever the retry
    /// wrapper reports for transport failures and cancellation.
    pub async fn execute(
        &self,
        request: &ApiRequest,
        cancel: &CancelSignal,
    ) -> Result<ApiResponse, LifecycleError> {
        debug!(method = request.method.as_str(), path = %request.path, "sending request");
        let response = send_with_retry(&self.transport, &self.retry, request, cancel).await?;
        if response.is_success() {
            Ok(response)
        } else {
            Err(LifecycleError::Api {
                status: response.status,
                body: response.body,
            })
        }
    }

    /// Issues a `GET` and decodes the JSON body.
    ///
    /// # Errors
    ///
    /// Propagates [`Self::execute`] failures and returns
    /// [`LifecycleError::Decode`] when the body has the wrong shape.
    pub async fn get_json<R: DeserializeOwned>(
        &self,
        path: &str,
        cancel: &CancelSignal,
    ) -> Result<R, LifecycleError> {
        let response = self.execute(&ApiRequest::get(path), cancel).await?;
        serde_json::from_str(&response.body).map_err(|err| LifecycleError::decode(path, &err))
    }

    /// Issues a `POST` with a JSON body and returns the raw response.
    ///
    /// # Errors
    ///
    /// Propagates [`Self::execute`] failures and returns
    /// [`LifecycleError::InvalidRequest`] when `body` cannot be serialized.
    pub async fn post_json<B: Serialize + ?Sized>(
        &self,
        path: &str,
        body: &B,
        cancel: &CancelSignal,
    ) -> Result<ApiResponse, LifecycleError> {
        let request = ApiRequest::post_json(path, body)
            .map_err(|err| LifecycleError::InvalidRequest(format!("encode {path}: {err}")))?;
        self.execute(&request, cancel).await
    }

    /// Issues a create-style `POST` and extracts the new identifier.
    ///
    /// # Errors
    ///
    /// Propagates [`Self::post_json`] failures and
    /// [`LifecycleError::IdentifierExtraction`].
    pub async fn post_for_id<B: Serialize + ?Sized>(
        &self,
        path: &str,
        body: &B,
        field: IdField,
        cancel: &CancelSignal,
    ) -> Result<String, LifecycleError> {
        let response = self.post_json(path, body, cancel).await?;
        extract_id(&response, field)
    }
}
