//! Registration handshake: redirect lookup, connect, configuration merge
//! and the failure paths that must yield no session.

use beacon::{create_session, Environment};
use serde_json::json;

use super::test_utils::{body_json, param, registered_session, test_config, MockTransport};

#[test]
fn handshake_produces_session_with_run_id_and_merged_config() {
    let transport = MockTransport::new();
    let session = registered_session(&transport);

    assert_eq!(session.run_id(), "abc123");
    // Server value wins over whatever the local snapshot carried.
    assert_eq!(session.configuration()["some_setting"], 5);
    // Local-only settings survive the overlay.
    assert_eq!(session.configuration()["app_name"], "Checkout Service");
}

#[test]
fn handshake_issues_redirect_then_connect() {
    let transport = MockTransport::new();
    let _session = registered_session(&transport);

    assert_eq!(transport.request_count(), 2);

    let redirect = transport.request(0);
    assert_eq!(param(&redirect, "method"), Some("get_redirect_host"));
    assert_eq!(param(&redirect, "license_key"), Some("0123456789abcdef"));
    assert_eq!(param(&redirect, "protocol_version"), Some("9"));
    assert_eq!(param(&redirect, "marshal_format"), Some("json"));
    // No run id before registration completes.
    assert_eq!(param(&redirect, "run_id"), None);
    assert_eq!(body_json(&redirect), json!([]));

    let connect = transport.request(1);
    assert_eq!(param(&connect, "method"), Some("connect"));
    assert_eq!(param(&connect, "run_id"), None);
    assert!(connect
        .url
        .starts_with("https://collector-2.beaconapm.io/agent_listener/invoke_raw_method"));
}

#[test]
fn connect_payload_is_one_configuration_record() {
    let transport = MockTransport::new();
    let _session = registered_session(&transport);

    let body = body_json(&transport.request(1));
    let record = &body[0];
    assert_eq!(body.as_array().unwrap().len(), 1);
    assert_eq!(record["language"], "rust");
    assert_eq!(record["app_name"], json!(["Checkout Service"]));
    assert_eq!(record["identifier"], "Checkout Service");
    assert_eq!(record["agent_version"], env!("CARGO_PKG_VERSION"));
    assert!(record["pid"].as_u64().unwrap() > 0);
    assert!(record["settings"].is_object());
    assert!(record["environment"].is_array());
}

#[test]
fn linked_applications_appear_in_name_list_and_identifier() {
    let transport = MockTransport::new();
    transport.push_return_value(json!("collector-2.beaconapm.io"));
    transport.push_return_value(json!({ "agent_run_id": 7 }));

    let mut config = test_config();
    config.linked_applications = vec!["Checkout Workers".to_string()];

    let session =
        create_session(transport.clone(), &config, &Environment::collect()).unwrap();
    assert_eq!(session.run_id(), "7");

    let record = &body_json(&transport.request(1))[0];
    assert_eq!(
        record["app_name"],
        json!(["Checkout Service", "Checkout Workers"])
    );
    assert_eq!(record["identifier"], "Checkout Service,Checkout Workers");
}

#[test]
fn unavailable_collector_yields_no_session() {
    let transport = MockTransport::new();
    transport.push_response(503, json!({}));

    let session = create_session(transport.clone(), &test_config(), &Environment::new());
    assert!(session.is_none());
    assert_eq!(transport.request_count(), 1);
}

#[test]
fn license_rejection_during_connect_yields_no_session() {
    let transport = MockTransport::new();
    transport.push_return_value(json!("collector-2.beaconapm.io"));
    transport.push_exception("Collector::Agent::LicenseException", "invalid key");

    let session = create_session(transport.clone(), &test_config(), &Environment::new());
    assert!(session.is_none());
}

#[test]
fn connect_response_without_run_id_yields_no_session() {
    let transport = MockTransport::new();
    transport.push_return_value(json!("collector-2.beaconapm.io"));
    transport.push_return_value(json!({ "some_setting": 5 }));

    let session = create_session(transport.clone(), &test_config(), &Environment::new());
    assert!(session.is_none());
}

#[test]
fn non_string_redirect_host_yields_no_session() {
    let transport = MockTransport::new();
    transport.push_return_value(json!(17));

    let session = create_session(transport.clone(), &test_config(), &Environment::new());
    assert!(session.is_none());
    assert_eq!(transport.request_count(), 1);
}

#[test]
fn connection_failure_during_handshake_yields_no_session() {
    let transport = MockTransport::new();
    transport.push_connection_failure();

    let session = create_session(transport.clone(), &test_config(), &Environment::new());
    assert!(session.is_none());
}
