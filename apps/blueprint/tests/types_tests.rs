//! Unit tests for API types serialization/deserialization.

#![allow(clippy::unwrap_used, clippy::panic)]

use blueprint::api::{
    ErrorBody, EvaluateRequest, EvaluateResponse, HealthResponse, ValidateResponse,
    VersionsResponse,
};
use blueprint_core::{BlueprintError, DslVersion, Role};
use serde_json::json;

// =============================================================================
// HEALTH RESPONSE TESTS
// =============================================================================

#[test]
fn test_health_response_default() {
    let health = HealthResponse::default();
    assert_eq!(health.status, "ok");
    assert!(!health.version.is_empty());
}

#[test]
fn test_health_response_serialization() {
    let health = HealthResponse {
        status: "ok".to_string(),
        version: "0.4.2".to_string(),
    };

    let json = serde_json::to_string(&health).unwrap();
    assert!(json.contains("\"status\":\"ok\""));
    assert!(json.contains("\"version\":\"0.4.2\""));
}

// =============================================================================
// ERROR BODY TESTS
// =============================================================================

#[test]
fn test_error_body_carries_code() {
    let error = BlueprintError::VersionMismatch {
        element: "policies".into(),
        version: DslVersion::V1_2,
        required: DslVersion::V1_3,
    };
    let body = ErrorBody::from(&error);

    assert_eq!(body.code, Some(29));
    assert_eq!(
        body.message,
        "'policies' not supported in version cloudify_dsl_1_2, it was added in cloudify_dsl_1_3"
    );
}

#[test]
fn test_error_body_omits_missing_code() {
    let error = BlueprintError::ReferenceBindingMissing {
        function: "get_attribute".into(),
        role: Role::Target,
    };
    let json = serde_json::to_value(ErrorBody::from(&error)).unwrap();

    assert_eq!(
        json,
        json!({"message": "get_attribute: TARGET is missing in request context"})
    );
}

// =============================================================================
// VERSIONS RESPONSE TESTS
// =============================================================================

#[test]
fn test_versions_features_accumulate() {
    let versions = VersionsResponse::supported();
    let feature_counts: Vec<usize> = versions.versions.iter().map(|v| v.features.len()).collect();

    assert_eq!(feature_counts, vec![0, 0, 2, 3, 3]);
    assert_eq!(versions.latest, DslVersion::LATEST.name());
}

// =============================================================================
// VALIDATE RESPONSE TESTS
// =============================================================================

#[test]
fn test_validate_error_response_serialization() {
    let error = BlueprintError::EmptyGroup("web".into());
    let json = serde_json::to_value(ValidateResponse::error(&error)).unwrap();

    assert_eq!(json["success"], json!(false));
    assert_eq!(json["error"]["code"], json!(40));
    assert!(json.get("result").is_none());
}

// =============================================================================
// EVALUATE REQUEST/RESPONSE TESTS
// =============================================================================

#[test]
fn test_evaluate_request_minimal() {
    let request: EvaluateRequest = serde_json::from_str(r#"{"payload": "plain"}"#).unwrap();

    assert_eq!(request.payload, json!("plain"));
    assert_eq!(request.context.self_node, None);
    assert!(request.topology.is_none());
}

#[test]
fn test_evaluate_request_full() {
    let request: EvaluateRequest = serde_json::from_value(json!({
        "payload": {"get_attribute": ["SELF", "ip"]},
        "context": {"self": "vm", "source": "lb", "target": "db"},
        "topology": {"nodes": [{"id": "vm"}], "node_instances": []}
    }))
    .unwrap();

    assert_eq!(request.context.self_node.as_deref(), Some("vm"));
    assert_eq!(request.context.source.as_deref(), Some("lb"));
    assert_eq!(request.context.target.as_deref(), Some("db"));
    assert_eq!(request.topology.unwrap().nodes[0].id, "vm");
}

#[test]
fn test_evaluate_request_rejects_missing_payload() {
    let result: Result<EvaluateRequest, _> = serde_json::from_str(r#"{"context": {}}"#);
    assert!(result.is_err());
}

#[test]
fn test_evaluate_success_response_serialization() {
    let json = serde_json::to_value(EvaluateResponse::success(json!({"ip": "10.0.0.5"}))).unwrap();

    assert_eq!(json, json!({"success": true, "payload": {"ip": "10.0.0.5"}}));
}
