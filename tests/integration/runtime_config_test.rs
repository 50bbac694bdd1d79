//! Runtime Config Integration Tests
//!
//! Applies deploy lifecycle events read from JSON and checks the written
//! `config.js`.

use std::fs;

use chrono::Utc;
use workorder_safety::models::settings::AppConfig;
use workorder_safety::services::runtime_config::{
    handle_resource_event, write_config_js, ResourceEvent, RuntimeConfigParams,
    CONFIG_UPDATED_MESSAGE,
};

const CREATE_EVENT: &str = r#"{
    "RequestType": "Create",
    "ServiceToken": "arn:aws:lambda:us-west-2:000000000000:function:config",
    "ResourceProperties": {
        "ApiEndpoint": "https://abc.execute-api.us-west-2.amazonaws.com/prod/",
        "WorkorderApiEndpoint": "https://def.execute-api.us-west-2.amazonaws.com/prod/",
        "RegionName": "us-west-2",
        "CognitoUserPoolId": "us-west-2_pool",
        "CognitoUserPoolClientId": "client123",
        "CognitoIdentityPoolId": "us-west-2:identity"
    }
}"#;

#[test]
fn test_create_then_update_rewrites_file() {
    let dir = tempfile::tempdir().unwrap();
    let out = dir.path().join("site").join("config.js");

    let event: ResourceEvent = serde_json::from_str(CREATE_EVENT).unwrap();
    let response = handle_resource_event(&event, &out, "stream-1", Utc::now()).unwrap();
    assert_eq!(response.message.as_deref(), Some(CONFIG_UPDATED_MESSAGE));

    let written = fs::read_to_string(&out).unwrap();
    assert!(written.starts_with("// Runtime configuration - Generated at "));
    assert!(written.contains("window.APP_CONFIG = {"));
    assert!(written.contains(r#"VITE_COGNITO_IDENTITY_POOL_ID: "us-west-2:identity""#));
    assert!(written.contains(r#"VITE_COGNITO_DOMAIN: ".auth.us-west-2.amazoncognito.com/""#));

    let mut update = event.clone();
    update.request_type = serde_json::from_str("\"Update\"").unwrap();
    update.resource_properties.region_name = "eu-west-1".to_string();
    handle_resource_event(&update, &out, "stream-1", Utc::now()).unwrap();

    let rewritten = fs::read_to_string(&out).unwrap();
    assert!(rewritten.contains(r#"VITE_REGION_NAME: "eu-west-1""#));
    assert!(!rewritten.contains(r#"VITE_REGION_NAME: "us-west-2""#));
}

#[test]
fn test_delete_leaves_existing_file() {
    let dir = tempfile::tempdir().unwrap();
    let out = dir.path().join("config.js");
    fs::write(&out, "existing").unwrap();

    let event: ResourceEvent = serde_json::from_str(
        r#"{"RequestType": "Delete", "PhysicalResourceId": "stream-1"}"#,
    )
    .unwrap();
    let response = handle_resource_event(&event, &out, "stream-2", Utc::now()).unwrap();

    assert_eq!(response.physical_resource_id.as_deref(), Some("stream-1"));
    assert_eq!(fs::read_to_string(&out).unwrap(), "existing");
}

#[test]
fn test_config_js_from_app_config() {
    let dir = tempfile::tempdir().unwrap();
    let out = dir.path().join("config.js");
    let config = AppConfig {
        api_endpoint: "https://api.example.com/".to_string(),
        cognito_user_pool_id: "pool".to_string(),
        ..AppConfig::default()
    };

    write_config_js(&out, &RuntimeConfigParams::from(&config), Utc::now()).unwrap();

    let written = fs::read_to_string(&out).unwrap();
    assert!(written.contains(r#"VITE_API_ENDPOINT: "https://api.example.com/""#));
    assert!(written.contains(r#"VITE_COGNITO_USER_POOL_ID: "pool""#));
    assert!(written.contains(r#"VITE_REGION_NAME: "us-east-1""#));
}
