//! Tests for provisioning through the full wizard sequence.

use std::time::Duration;

use rstest::rstest;
use serde_json::{Value, json};

use super::fixtures::*;
use crate::cancel::CancelSignal;
use crate::engine::ParamMap;
use crate::error::LifecycleError;
use crate::test_support::{ScriptedTransport, descriptors_json, operation_json};
use crate::types::{ParamId, ServiceId};

/// Queues placeholder creation, operation creation and the descriptor list.
fn push_wizard_prefix(transport: &ScriptedTransport, descriptors: &[Value]) {
    transport.push_created(INSTANCE);
    transport.push_created(OPERATION);
    transport.push_json(200, &descriptors_json(descriptors));
}

fn scenario_descriptors() -> Vec<Value> {
    vec![
        json!({"svcOperationCfsParamId": 10, "dataType": "string", "defaultValue": "small", "isRequired": true}),
        json!({"svcOperationCfsParamId": 11, "name": "labels_map", "isRequired": true}),
        json!({"svcOperationCfsParamId": 12, "code": "subnet_list", "paramValue": "null", "isRequired": true}),
        json!({"svcOperationCfsParamId": 13, "name": "comment", "defaultValue": "n/a", "isRequired": false}),
        json!({"svcOperationCfsParamId": 14, "dataType": "integer", "isRequired": false}),
    ]
}

#[rstest]
#[tokio::test]
async fn create_walks_the_wizard_in_order(transport: ScriptedTransport) {
    push_wizard_prefix(&transport, &scenario_descriptors());
    for _ in 0..4 {
        transport.push_ok();
    }
    transport.push_ok(); // validate
    transport.push_ok(); // run
    push_finish(&transport, "Running");

    let engine = fast_engine(&transport);
    let params = ParamMap::from([(ParamId(14), String::from("3"))]);
    let uid = engine
        .create(ServiceId(42), "web-01", &params, &CancelSignal::never())
        .await
        .unwrap_or_else(|err| panic!("create failed: {err}"));

    assert_eq!(uid.as_str(), INSTANCE);
    assert_eq!(
        transport.request_lines(),
        vec![
            String::from("POST /instances"),
            String::from("POST /instanceOperations"),
            format!("GET {}", params_path()),
            String::from("POST /instanceOperationCfsParams"),
            String::from("POST /instanceOperationCfsParams"),
            String::from("POST /instanceOperationCfsParams"),
            String::from("POST /instanceOperationCfsParams"),
            format!("GET {}", validate_path()),
            format!("POST {}", run_path()),
            format!("GET {}", operation_path()),
            format!("GET {}", instance_path()),
        ]
    );
    assert_eq!(
        submitted_params(&transport),
        vec![
            (14, String::from("3")),
            (10, String::from("small")),
            (11, String::from("{}")),
            (12, String::from("[]")),
        ]
    );
}

#[rstest]
#[tokio::test]
async fn create_sends_placeholder_and_create_operation(transport: ScriptedTransport) {
    push_wizard_prefix(&transport, &[]);
    transport.push_ok();
    transport.push_ok();
    push_finish(&transport, "Active");

    let engine = fast_engine(&transport);
    engine
        .create(ServiceId(42), "web-01", &ParamMap::new(), &CancelSignal::never())
        .await
        .unwrap_or_else(|err| panic!("create failed: {err}"));

    let placeholder = body_of(&transport, "/instances");
    assert_eq!(placeholder["serviceId"], json!(42));
    assert_eq!(placeholder["displayName"], json!("web-01"));
    assert!(
        placeholder["descr"].as_str().is_some_and(|descr| !descr.is_empty()),
        "placeholder needs a description"
    );

    let operation = body_of(&transport, "/instanceOperations");
    assert_eq!(operation["instanceUid"], json!(INSTANCE));
    assert_eq!(operation["operation"], json!("create"));
    assert!(operation.get("svcOperationId").is_none());

    assert_eq!(body_of(&transport, &run_path()), json!({}));
}

#[rstest]
#[case(0, "web-01")]
#[case(42, "   ")]
#[tokio::test]
async fn create_rejects_unusable_arguments(
    transport: ScriptedTransport,
    #[case] service: u32,
    #[case] name: &str,
) {
    let engine = fast_engine(&transport);
    let err = engine
        .create(ServiceId(service), name, &ParamMap::new(), &CancelSignal::never())
        .await
        .expect_err("arguments are invalid");
    assert!(matches!(err, LifecycleError::InvalidRequest(_)), "got {err:?}");
    assert!(transport.requests().is_empty());
}

#[rstest]
#[tokio::test]
async fn failed_operation_carries_error_log(transport: ScriptedTransport) {
    push_wizard_prefix(&transport, &[]);
    transport.push_ok();
    transport.push_ok();
    transport.push_json(
        200,
        &operation_json(Some(FINISHED_AT), Some(false), Some("quota exceeded")),
    );

    let engine = fast_engine(&transport);
    let err = engine
        .create(ServiceId(42), "web-01", &ParamMap::new(), &CancelSignal::never())
        .await
        .expect_err("operation failed remotely");

    assert_eq!(
        err,
        LifecycleError::OperationFailed {
            operation_uid: OPERATION.into(),
            error_log: Some(String::from("quota exceeded")),
        }
    );
    assert!(
        !transport.request_lines().contains(&format!("GET {}", instance_path())),
        "a failed operation must not wait for the instance"
    );
}

#[rstest]
#[tokio::test]
async fn unfinished_operation_times_out(transport: ScriptedTransport) {
    push_wizard_prefix(&transport, &[]);
    transport.push_ok();
    transport.push_ok();
    transport.set_fallback_json(200, &operation_json(None, None, None));

    let engine = fast_engine(&transport).with_operation_timeout(Duration::from_millis(30));
    let err = engine
        .create(ServiceId(42), "web-01", &ParamMap::new(), &CancelSignal::never())
        .await
        .expect_err("operation never finishes");

    assert!(err.is_timeout(), "got {err:?}");
    assert!(matches!(err, LifecycleError::OperationTimeout { .. }));
}

#[rstest]
#[tokio::test]
async fn instance_left_not_created_fails(transport: ScriptedTransport) {
    push_wizard_prefix(&transport, &[]);
    transport.push_ok();
    transport.push_ok();
    push_finish(&transport, "Not created");

    let engine = fast_engine(&transport);
    let err = engine
        .create(ServiceId(42), "web-01", &ParamMap::new(), &CancelSignal::never())
        .await
        .expect_err("instance was not created");
    assert!(matches!(err, LifecycleError::NotCreated { .. }), "got {err:?}");
}

#[rstest]
#[tokio::test]
async fn instance_in_error_fails_settle(transport: ScriptedTransport) {
    push_wizard_prefix(&transport, &[]);
    transport.push_ok();
    transport.push_ok();
    push_finish(&transport, "Deploy error");

    let engine = fast_engine(&transport);
    let err = engine
        .create(ServiceId(42), "web-01", &ParamMap::new(), &CancelSignal::never())
        .await
        .expect_err("instance ended in error");
    assert!(matches!(err, LifecycleError::InstanceFailed { .. }), "got {err:?}");
}

#[rstest]
#[tokio::test]
async fn settle_waits_for_running_status(transport: ScriptedTransport) {
    push_wizard_prefix(&transport, &[]);
    transport.push_ok();
    transport.push_ok();
    transport.push_json(200, &operation_json(Some(FINISHED_AT), Some(true), None));
    push_instance(&transport, "Deploying", &[]);
    push_instance(&transport, "Deploying", &[]);
    push_instance(&transport, "Running", &[]);

    let engine = fast_engine(&transport);
    engine
        .create(ServiceId(42), "web-01", &ParamMap::new(), &CancelSignal::never())
        .await
        .unwrap_or_else(|err| panic!("create failed: {err}"));

    let reads = transport
        .request_lines()
        .iter()
        .filter(|line| **line == format!("GET {}", instance_path()))
        .count();
    assert_eq!(reads, 3);
    assert_eq!(transport.remaining(), 0);
}

#[rstest]
#[tokio::test]
async fn undeclared_parameter_is_rejected_before_submission(transport: ScriptedTransport) {
    push_wizard_prefix(&transport, &scenario_descriptors());

    let engine = fast_engine(&transport);
    let params = ParamMap::from([(ParamId(99), String::from("x"))]);
    let err = engine
        .create(ServiceId(42), "web-01", &params, &CancelSignal::never())
        .await
        .expect_err("parameter 99 is not declared");

    assert_eq!(
        err,
        LifecycleError::UnknownParameter {
            param_id: ParamId(99),
            operation_uid: OPERATION.into(),
        }
    );
    assert!(submitted_params(&transport).is_empty());
}
