//! Typed request and response bodies for the wizard endpoints.
//!
//! Every structure mirrors one endpoint's JSON shape. Fields the remote side
//! may omit or send as `null` are `Option`s or fall back to `Default`.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::types::{InstanceUid, OperationUid, ParamId, ServiceId, SvcOperationId};

/// Body of `POST /instances`.
#[derive(Clone, Debug, Eq, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateInstanceBody<'a> {
    /// Service catalogue identifier.
    pub service_id: ServiceId,
    /// Caller-chosen display name.
    pub display_name: &'a str,
    /// Free-text description attached to the placeholder.
    pub descr: &'a str,
}

/// Body of `POST /instanceOperations`.
#[derive(Clone, Debug, Eq, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateOperationBody<'a> {
    /// Instance the operation is attached to.
    pub instance_uid: &'a InstanceUid,
    /// Operation definition id; omitted for `create`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub svc_operation_id: Option<SvcOperationId>,
    /// Action name, e.g. `create` or `suspend`.
    pub operation: &'a str,
}

/// Body of `POST /instanceOperationCfsParams`.
#[derive(Clone, Debug, Eq, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmitParamBody<'a> {
    /// Operation being configured.
    pub instance_operation_uid: &'a OperationUid,
    /// Parameter being set.
    pub svc_operation_cfs_param_id: ParamId,
    /// Value, always sent as a string.
    pub param_value: &'a str,
}

/// A scalar or structured value as the catalogue reports it.
///
/// The remote side is inconsistent about value encoding, so a descriptor's
/// `paramValue` may arrive as a string, a number, a boolean, or an inline
/// object or array.
#[derive(Clone, Debug, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum WireValue {
    /// Plain string.
    Text(String),
    /// Numeric literal.
    Number(serde_json::Number),
    /// Boolean literal.
    Flag(bool),
    /// Inline object or array.
    Structured(Value),
}

impl WireValue {
    /// Renders the value the way it must be submitted back.
    #[must_use]
    pub fn to_text(&self) -> String {
        match self {
            Self::Text(text) => text.clone(),
            Self::Number(number) => number.to_string(),
            Self::Flag(flag) => flag.to_string(),
            Self::Structured(value) => value.to_string(),
        }
    }
}

/// Envelope of `GET /instanceOperations/{uid}?fields=cfsParams`.
#[derive(Clone, Debug, Default, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct OperationParamsEnvelope {
    /// Operation carrying the descriptors.
    #[serde(default)]
    pub instance_operation: OperationParams,
}

/// Descriptor list of one operation.
#[derive(Clone, Debug, Default, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct OperationParams {
    /// Declared parameters.
    #[serde(default, deserialize_with = "null_as_default")]
    pub cfs_params: Vec<ParamDescriptor>,
}

/// Catalogue declaration of one configurable value.
#[derive(Clone, Debug, Default, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ParamDescriptor {
    /// Parameter id, unique within the operation.
    pub svc_operation_cfs_param_id: ParamId,
    /// Value already recorded on the operation.
    #[serde(default)]
    pub param_value: Option<WireValue>,
    /// Catalogue default.
    #[serde(default)]
    pub default_value: Option<WireValue>,
    /// Declared type, e.g. `string`, `map`, `array`.
    #[serde(default, deserialize_with = "null_as_default")]
    pub data_type: String,
    /// Name hint.
    #[serde(default, deserialize_with = "null_as_default")]
    pub name: String,
    /// Code hint.
    #[serde(default, deserialize_with = "null_as_default")]
    pub code: String,
    /// Label hint.
    #[serde(default, deserialize_with = "null_as_default")]
    pub label: String,
    /// Catalogue key of the parameter, also used as a type hint.
    #[serde(default, deserialize_with = "null_as_default")]
    pub svc_operation_cfs_param: String,
    /// Whether the operation refuses to validate without a value.
    #[serde(default, deserialize_with = "null_as_default")]
    pub is_required: bool,
    /// Service whose instance identifiers this parameter expects.
    #[serde(default)]
    pub ref_svc_id: Option<ServiceId>,
}

impl ParamDescriptor {
    /// Value to start from when the caller supplied nothing: the recorded
    /// value when it is not blank, otherwise the catalogue default.
    #[must_use]
    pub fn current_or_default(&self) -> String {
        let recorded = self.param_value.as_ref().map(WireValue::to_text);
        match recorded {
            Some(text) if !text.trim().is_empty() => text,
            _ => self
                .default_value
                .as_ref()
                .map(WireValue::to_text)
                .unwrap_or_default(),
        }
    }

    /// Referenced service, when the catalogue declares a positive one.
    #[must_use]
    pub fn reference_service(&self) -> Option<ServiceId> {
        self.ref_svc_id.filter(|id| id.get() > 0)
    }
}

/// Envelope of `GET /instanceOperations/{uid}`.
#[derive(Clone, Debug, Default, Deserialize, Eq, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct OperationStatusEnvelope {
    /// Operation status.
    #[serde(default)]
    pub instance_operation: OperationStatus,
}

/// Progress of one operation.
#[derive(Clone, Debug, Default, Deserialize, Eq, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct OperationStatus {
    /// Completion timestamp; presence means the operation terminated.
    #[serde(default)]
    pub dt_finish: Option<String>,
    /// Outcome, meaningful once `dt_finish` is set.
    #[serde(default)]
    pub is_successful: Option<bool>,
    /// Server diagnostic text.
    #[serde(default)]
    pub error_log: Option<String>,
    /// Informational progress flag.
    #[serde(default, deserialize_with = "null_as_default")]
    pub is_in_progress: bool,
    /// Informational queueing flag.
    #[serde(default, deserialize_with = "null_as_default")]
    pub is_pending: bool,
}

impl OperationStatus {
    /// Reports whether the completion timestamp is present and non-blank.
    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.dt_finish
            .as_deref()
            .is_some_and(|stamp| !stamp.trim().is_empty())
    }

    /// Error log when it carries text.
    #[must_use]
    pub fn error_text(&self) -> Option<&str> {
        self.error_log
            .as_deref()
            .map(str::trim)
            .filter(|log| !log.is_empty())
    }
}

/// Envelope of `GET /instances/{uid}`.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct InstanceEnvelope {
    /// Instance state.
    pub instance: InstanceState,
}

/// Current state of an instance.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct InstanceState {
    /// Instance identifier.
    pub instance_uid: InstanceUid,
    /// Free-text status, e.g. `running` or `suspended`.
    #[serde(default, deserialize_with = "null_as_default")]
    pub explained_status: String,
    /// Deleted flag.
    #[serde(default, deserialize_with = "null_as_default")]
    pub is_deleted: bool,
    /// An operation is executing.
    #[serde(default, deserialize_with = "null_as_default")]
    pub operation_is_in_progress: bool,
    /// An operation is queued.
    #[serde(default, deserialize_with = "null_as_default")]
    pub operation_is_pending: bool,
    /// Actions the instance currently offers.
    #[serde(default, deserialize_with = "null_as_default")]
    pub available_operations: Vec<AvailableOperation>,
}

/// Coarse classification of an instance state.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Readiness {
    /// Idle and not in a failure or provisioning status.
    Ready,
    /// Marked deleted.
    Deleted,
    /// An operation is pending or executing.
    Busy,
    /// Status reports the instance was never created.
    NotCreated,
    /// Status reports provisioning has not finished.
    Pending,
    /// Status reports an error.
    Failed,
}

impl InstanceState {
    /// Lower-cased, trimmed status text.
    #[must_use]
    pub fn status(&self) -> String {
        self.explained_status.trim().to_lowercase()
    }

    /// Reports whether the instance is deleted by flag or status.
    #[must_use]
    pub fn is_gone(&self) -> bool {
        self.is_deleted || self.status() == "deleted"
    }

    /// Reports whether an operation is pending or executing.
    #[must_use]
    pub const fn is_busy(&self) -> bool {
        self.operation_is_pending || self.operation_is_in_progress
    }

    /// Classifies the state. Checks run in order, so a deleted instance with a
    /// pending operation is reported as deleted.
    #[must_use]
    pub fn readiness(&self) -> Readiness {
        let status = self.status();
        if self.is_deleted {
            Readiness::Deleted
        } else if self.is_busy() {
            Readiness::Busy
        } else if status.contains("not created") {
            Readiness::NotCreated
        } else if status.contains("pending") {
            Readiness::Pending
        } else if status.contains("failed") || status.contains("error") {
            Readiness::Failed
        } else {
            Readiness::Ready
        }
    }

    /// Finds the definition id of `action`, matched case-insensitively.
    #[must_use]
    pub fn operation_id(&self, action: &str) -> Option<SvcOperationId> {
        self.available_operations
            .iter()
            .find(|op| op.operation.trim().eq_ignore_ascii_case(action))
            .map(|op| op.svc_operation_id)
            .filter(|id| id.get() > 0)
    }

    /// Names of the offered actions.
    #[must_use]
    pub fn action_names(&self) -> Vec<String> {
        self.available_operations
            .iter()
            .map(|op| op.operation.clone())
            .collect()
    }
}

/// One action an instance offers.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct AvailableOperation {
    /// Operation definition id.
    pub svc_operation_id: SvcOperationId,
    /// Action name.
    #[serde(default, deserialize_with = "null_as_default")]
    pub operation: String,
}

/// One page of `GET /instances?page=N&size=100`.
#[derive(Clone, Debug, Default, Deserialize, Eq, PartialEq)]
pub struct InstancePage {
    /// Instances on this page; empty past the last page.
    #[serde(default, deserialize_with = "null_as_default")]
    pub results: Vec<InstanceSummary>,
}

/// Listing entry for an instance.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct InstanceSummary {
    /// Instance identifier.
    pub instance_uid: InstanceUid,
    /// Display name.
    #[serde(default, deserialize_with = "null_as_default")]
    pub display_name: String,
    /// Service the instance belongs to.
    #[serde(default)]
    pub service_id: Option<ServiceId>,
}

/// Identifier fields create calls may report in their JSON body.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct CreatedIds {
    #[serde(default)]
    pub(crate) instance_uid: Option<String>,
    #[serde(default)]
    pub(crate) instance_operation_uid: Option<String>,
}

fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: serde::Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use serde_json::json;

    fn state(status: &str, deleted: bool, busy: bool) -> InstanceState {
        InstanceState {
            instance_uid: InstanceUid::new("inst"),
            explained_status: status.to_owned(),
            is_deleted: deleted,
            operation_is_in_progress: busy,
            operation_is_pending: false,
            available_operations: Vec::new(),
        }
    }

    #[test]
    fn descriptor_accepts_mixed_value_encodings() {
        let envelope: OperationParamsEnvelope = serde_json::from_value(json!({
            "instanceOperation": {"cfsParams": [
                {"svcOperationCfsParamId": 1, "paramValue": 42, "dataType": "integer"},
                {"svcOperationCfsParamId": 2, "paramValue": null, "defaultValue": true,
                 "isRequired": true, "name": null},
                {"svcOperationCfsParamId": 3, "paramValue": {"a": 1}, "refSvcId": 12}
            ]}
        }))
        .expect("decode descriptors");
        let params = envelope.instance_operation.cfs_params;
        assert_eq!(params.len(), 3);
        assert_eq!(params.first().map(ParamDescriptor::current_or_default).as_deref(), Some("42"));
        assert_eq!(params.get(1).map(ParamDescriptor::current_or_default).as_deref(), Some("true"));
        assert_eq!(params.get(2).map(ParamDescriptor::current_or_default).as_deref(), Some(r#"{"a":1}"#));
        assert_eq!(params.get(2).and_then(ParamDescriptor::reference_service), Some(ServiceId(12)));
    }

    #[test]
    fn blank_recorded_value_falls_back_to_default() {
        let descriptor = ParamDescriptor {
            param_value: Some(WireValue::Text(String::from("  "))),
            default_value: Some(WireValue::Text(String::from("small"))),
            ..ParamDescriptor::default()
        };
        assert_eq!(descriptor.current_or_default(), "small");
    }

    #[test]
    fn zero_reference_service_is_ignored() {
        let descriptor = ParamDescriptor {
            ref_svc_id: Some(ServiceId(0)),
            ..ParamDescriptor::default()
        };
        assert_eq!(descriptor.reference_service(), None);
    }

    #[rstest]
    #[case(None, false)]
    #[case(Some(""), false)]
    #[case(Some("   "), false)]
    #[case(Some("2024-05-01T10:00:00"), true)]
    fn finished_only_with_timestamp(#[case] stamp: Option<&str>, #[case] expected: bool) {
        let status = OperationStatus {
            dt_finish: stamp.map(str::to_owned),
            is_in_progress: true,
            ..OperationStatus::default()
        };
        assert_eq!(status.is_finished(), expected);
    }

    #[rstest]
    #[case("Running", false, false, Readiness::Ready)]
    #[case("running", true, false, Readiness::Deleted)]
    #[case("running", false, true, Readiness::Busy)]
    #[case("Not created", false, false, Readiness::NotCreated)]
    #[case("pending", false, false, Readiness::Pending)]
    #[case("Deploy failed", false, false, Readiness::Failed)]
    #[case("ERROR", false, false, Readiness::Failed)]
    #[case("suspended", false, false, Readiness::Ready)]
    fn readiness_classification(
        #[case] status: &str,
        #[case] deleted: bool,
        #[case] busy: bool,
        #[case] expected: Readiness,
    ) {
        assert_eq!(state(status, deleted, busy).readiness(), expected);
    }

    #[test]
    fn operation_lookup_is_case_insensitive() {
        let instance: InstanceEnvelope = serde_json::from_value(json!({
            "instance": {
                "instanceUid": "inst",
                "explainedStatus": "running",
                "availableOperations": [
                    {"svcOperationId": 7, "operation": "Suspend"},
                    {"svcOperationId": 8, "operation": "modify"}
                ]
            }
        }))
        .expect("decode instance");
        let state = instance.instance;
        assert_eq!(state.operation_id("suspend"), Some(SvcOperationId(7)));
        assert_eq!(state.operation_id("resume"), None);
        assert_eq!(state.action_names(), vec!["Suspend", "modify"]);
    }

    #[test]
    fn create_operation_body_omits_missing_definition_id() {
        let uid = InstanceUid::new("inst");
        let body = CreateOperationBody {
            instance_uid: &uid,
            svc_operation_id: None,
            operation: "create",
        };
        assert_eq!(
            serde_json::to_value(&body).expect("encode"),
            json!({"instanceUid": "inst", "operation": "create"})
        );
    }
}
