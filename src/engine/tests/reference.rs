//! Tests for reference parameter resolution.

use rstest::rstest;

use super::fixtures::*;
use crate::cancel::CancelSignal;
use crate::engine::ParamMap;
use crate::error::LifecycleError;
use crate::test_support::{ScriptedTransport, page_json};
use crate::types::{ParamId, ServiceId};
use crate::wire::ParamDescriptor;

const DATABASE: &str = "5d2c9e1f-7a3b-4c8d-9e0f-112233445566";

fn reference(id: u32, service: u32) -> ParamDescriptor {
    ParamDescriptor {
        svc_operation_cfs_param_id: ParamId(id),
        ref_svc_id: Some(ServiceId(service)),
        ..ParamDescriptor::default()
    }
}

fn plain(id: u32) -> ParamDescriptor {
    ParamDescriptor {
        svc_operation_cfs_param_id: ParamId(id),
        ..ParamDescriptor::default()
    }
}

#[rstest]
#[tokio::test]
async fn identifier_values_pass_through_trimmed_without_requests(transport: ScriptedTransport) {
    let engine = fast_engine(&transport);
    let params = ParamMap::from([(ParamId(10), format!(" {DATABASE} "))]);

    let resolved = engine
        .resolve_references(&[reference(10, 7)], &params, &CancelSignal::never())
        .await
        .unwrap_or_else(|err| panic!("resolve failed: {err}"));

    assert_eq!(resolved, ParamMap::from([(ParamId(10), String::from(DATABASE))]));
    assert!(transport.requests().is_empty());
}

#[rstest]
#[case("db-main", "DB-Main")]
#[case("  db-main ", "db-main")]
#[case("база", "База")]
#[tokio::test]
async fn names_match_ignoring_case(
    transport: ScriptedTransport,
    #[case] supplied: &str,
    #[case] listed: &str,
) {
    transport.push_json(
        200,
        &page_json(&[(INSTANCE, listed, 8), (DATABASE, listed, 7)]),
    );

    let engine = fast_engine(&transport);
    let params = ParamMap::from([(ParamId(10), supplied.to_owned())]);
    let resolved = engine
        .resolve_references(&[reference(10, 7)], &params, &CancelSignal::never())
        .await
        .unwrap_or_else(|err| panic!("resolve failed: {err}"));

    assert_eq!(resolved.get(&ParamId(10)).map(String::as_str), Some(DATABASE));
}

#[rstest]
#[tokio::test]
async fn unmatched_name_is_an_error(transport: ScriptedTransport) {
    transport.push_json(200, &page_json(&[(DATABASE, "db-main", 8)]));
    transport.push_json(200, &page_json(&[]));

    let engine = fast_engine(&transport);
    let params = ParamMap::from([(ParamId(10), String::from("db-main"))]);
    let err = engine
        .resolve_references(&[reference(10, 7)], &params, &CancelSignal::never())
        .await
        .expect_err("no instance of service 7 is named db-main");

    assert_eq!(
        err,
        LifecycleError::ReferenceResolution {
            param_id: ParamId(10),
            service_id: ServiceId(7),
            display_name: String::from("db-main"),
        }
    );
    assert_eq!(transport.requests().len(), 2);
}

#[rstest]
#[tokio::test]
async fn non_reference_values_are_untouched(transport: ScriptedTransport) {
    let engine = fast_engine(&transport);
    let params = ParamMap::from([
        (ParamId(10), String::from("db-main")),
        (ParamId(11), String::from("web")),
    ]);
    let descriptors = [plain(10), reference(11, 0)];

    let resolved = engine
        .resolve_references(&descriptors, &params, &CancelSignal::never())
        .await
        .unwrap_or_else(|err| panic!("resolve failed: {err}"));

    assert_eq!(resolved, params);
    assert!(transport.requests().is_empty());
}

#[rstest]
#[tokio::test]
async fn name_search_gives_up_after_page_limit(transport: ScriptedTransport) {
    transport.set_fallback_json(200, &page_json(&[(DATABASE, "db-other", 7)]));

    let engine = fast_engine(&transport);
    let params = ParamMap::from([(ParamId(10), String::from("db-main"))]);
    let err = engine
        .resolve_references(&[reference(10, 7)], &params, &CancelSignal::never())
        .await
        .expect_err("name never appears");

    assert!(
        matches!(err, LifecycleError::ReferenceResolution { .. }),
        "got {err:?}"
    );
    assert_eq!(transport.requests().len(), 100);
}
