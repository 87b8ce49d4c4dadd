//! Test support utilities shared across unit and integration tests.

use std::collections::{BTreeSet, VecDeque};
use std::env;
use std::ffi::OsString;
use std::sync::{Arc, Mutex, PoisonError};

use serde_json::{Value, json};
use tokio::sync::{Mutex as AsyncMutex, MutexGuard};

use crate::transport::{ApiRequest, ApiResponse, Transport, TransportError, TransportFuture};

type Scripted = Result<ApiResponse, TransportError>;

#[derive(Debug, Default)]
struct Script {
    responses: VecDeque<Scripted>,
    fallback: Option<Scripted>,
    requests: Vec<ApiRequest>,
}

/// Scripted transport that returns pre-seeded responses in FIFO order.
///
/// Every request is recorded. When the queue is empty the fallback response
/// is returned if one is set, otherwise a non-retryable network error.
#[derive(Clone, Debug, Default)]
pub struct ScriptedTransport {
    script: Arc<Mutex<Script>>,
}

impl ScriptedTransport {
    /// Creates a transport with no queued responses.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn with_script<R>(&self, apply: impl FnOnce(&mut Script) -> R) -> R {
        let mut script = self.script.lock().unwrap_or_else(PoisonError::into_inner);
        apply(&mut script)
    }

    /// Queues a raw response.
    pub fn push_response(&self, response: ApiResponse) {
        self.with_script(|script| script.responses.push_back(Ok(response)));
    }

    /// Queues a response with `status` and a plain-text body.
    pub fn push_status(&self, status: u16, body: impl Into<String>) {
        self.push_response(ApiResponse {
            status,
            location: None,
            body: body.into(),
        });
    }

    /// Queues a response with `status` and a JSON body.
    pub fn push_json(&self, status: u16, body: &Value) {
        self.push_status(status, body.to_string());
    }

    /// Queues a `201 Created` whose `Location` header is `./<id>`.
    pub fn push_created(&self, id: &str) {
        self.push_response(ApiResponse {
            status: 201,
            location: Some(format!("./{id}")),
            body: String::new(),
        });
    }

    /// Queues an empty `200 OK`.
    pub fn push_ok(&self) {
        self.push_status(200, "");
    }

    /// Queues a network-level failure.
    pub fn push_network_error(&self, message: impl Into<String>) {
        let error = TransportError::new(message);
        self.with_script(|script| script.responses.push_back(Err(error)));
    }

    /// Sets the response returned once the queue is drained.
    pub fn set_fallback_json(&self, status: u16, body: &Value) {
        let response = ApiResponse {
            status,
            location: None,
            body: body.to_string(),
        };
        self.with_script(|script| script.fallback = Some(Ok(response)));
    }

    /// Returns a snapshot of all requests recorded so far.
    #[must_use]
    pub fn requests(&self) -> Vec<ApiRequest> {
        self.with_script(|script| script.requests.clone())
    }

    /// Returns `METHOD path` for every recorded request.
    #[must_use]
    pub fn request_lines(&self) -> Vec<String> {
        self.requests()
            .iter()
            .map(|request| format!("{} {}", request.method.as_str(), request.path))
            .collect()
    }

    /// Number of queued responses not yet consumed.
    #[must_use]
    pub fn remaining(&self) -> usize {
        self.with_script(|script| script.responses.len())
    }
}

impl Transport for ScriptedTransport {
    fn send<'a>(&'a self, request: &'a ApiRequest) -> TransportFuture<'a, ApiResponse> {
        let next = self.with_script(|script| {
            script.requests.push(request.clone());
            script
                .responses
                .pop_front()
                .or_else(|| script.fallback.clone())
        });
        Box::pin(async move {
            next.unwrap_or_else(|| {
                Err(TransportError::new(format!(
                    "no scripted response for {} {}",
                    request.method.as_str(),
                    request.path
                )))
            })
        })
    }
}

/// JSON body of `GET /instances/{uid}`.
#[must_use]
pub fn instance_json(uid: &str, status: &str, operations: &[(u32, &str)]) -> Value {
    let available: Vec<Value> = operations
        .iter()
        .map(|(id, name)| json!({"svcOperationId": id, "operation": name}))
        .collect();
    json!({
        "instance": {
            "instanceUid": uid,
            "explainedStatus": status,
            "isDeleted": false,
            "operationIsInProgress": false,
            "operationIsPending": false,
            "availableOperations": available,
        }
    })
}

/// JSON body of `GET /instanceOperations/{uid}`.
#[must_use]
pub fn operation_json(dt_finish: Option<&str>, successful: Option<bool>, error_log: Option<&str>) -> Value {
    json!({
        "instanceOperation": {
            "dtFinish": dt_finish,
            "isSuccessful": successful,
            "errorLog": error_log,
            "isInProgress": dt_finish.is_none(),
            "isPending": false,
        }
    })
}

/// JSON body of `GET /instanceOperations/{uid}?fields=cfsParams`.
#[must_use]
pub fn descriptors_json(descriptors: &[Value]) -> Value {
    json!({"instanceOperation": {"cfsParams": descriptors}})
}

/// JSON body of `GET /instances?page=N&size=100`.
#[must_use]
pub fn page_json(entries: &[(&str, &str, u32)]) -> Value {
    let results: Vec<Value> = entries
        .iter()
        .map(|(uid, name, service)| {
            json!({"instanceUid": uid, "displayName": name, "serviceId": service})
        })
        .collect();
    json!({"results": results})
}

/// Global mutex used to serialise environment mutation in tests.
pub static ENV_LOCK: AsyncMutex<()> = AsyncMutex::const_new(());

/// Guard that holds the env mutex and cleans up variables on drop.
pub struct EnvGuard {
    previous: Vec<(String, Option<OsString>)>,
    _guard: MutexGuard<'static, ()>,
}

impl EnvGuard {
    /// Sets multiple environment variables while holding a global mutex.
    pub async fn set_vars(pairs: &[(&str, &str)]) -> Self {
        Self::apply(pairs, &[]).await
    }

    /// Sets `pairs` and removes `unset` while holding a global mutex.
    pub async fn apply(pairs: &[(&str, &str)], unset: &[&str]) -> Self {
        debug_assert!(
            {
                let mut seen = BTreeSet::new();
                pairs
                    .iter()
                    .map(|(key, _)| key)
                    .chain(unset.iter())
                    .all(|key| seen.insert(*key))
            },
            "duplicate environment variable keys passed to EnvGuard"
        );

        let guard = ENV_LOCK.lock().await;
        let mut previous = Vec::with_capacity(pairs.len() + unset.len());
        for (key, value) in pairs {
            let old = env::var_os(key);
            // SAFETY: Environment mutation is serialised by `ENV_LOCK`, preventing races.
            unsafe { env::set_var(key, value) };
            previous.push(((*key).to_owned(), old));
        }
        for key in unset {
            let old = env::var_os(key);
            // SAFETY: Environment mutation is serialised by `ENV_LOCK`, preventing races.
            unsafe { env::remove_var(key) };
            previous.push(((*key).to_owned(), old));
        }

        Self {
            previous,
            _guard: guard,
        }
    }
}

impl Drop for EnvGuard {
    fn drop(&mut self) {
        for (key, old) in &self.previous {
            // SAFETY: Environment mutation is serialised by holding `_guard`.
            unsafe {
                match old {
                    Some(val) => env::set_var(key, val),
                    None => env::remove_var(key),
                }
            }
        }
    }
}
