//! Session send operations: payload shapes, empty-input short-circuits,
//! retry behavior and terminal fates.

use beacon::Outcome;
use serde_json::{json, Value};

use super::test_utils::{body_json, param, registered_session, MockTransport};

fn trace(name: &str) -> Value {
    json!([name, 0.25])
}

#[test]
fn metric_data_payload_carries_run_id_and_window() {
    let transport = MockTransport::new();
    let session = registered_session(&transport);

    transport.push_return_value(Value::Null);
    let metrics = vec![json!([{"name": "Requests"}, [1, 0.5, 0.5, 0.5, 0.5, 0.25]])];
    let outcome = session.send_metric_data(1000.0, 1060.0, &metrics);
    assert!(outcome.is_success());

    let request = transport.last_request();
    assert_eq!(param(&request, "method"), Some("metric_data"));
    assert_eq!(param(&request, "run_id"), Some("abc123"));

    let body = body_json(&request);
    assert_eq!(body[0], "abc123");
    assert_eq!(body[1], 1000.0);
    assert_eq!(body[2], 1060.0);
    assert_eq!(body[3], json!(metrics));
}

#[test]
fn metric_data_is_sent_even_when_empty() {
    let transport = MockTransport::new();
    let session = registered_session(&transport);
    let before = transport.request_count();

    transport.push_return_value(Value::Null);
    session.send_metric_data(1000.0, 1060.0, &[]);
    assert_eq!(transport.request_count(), before + 1);
}

#[test]
fn empty_batches_issue_no_network_calls() {
    let transport = MockTransport::new();
    let session = registered_session(&transport);
    let before = transport.request_count();

    assert!(session.send_errors(&[]).is_success());
    assert!(session.send_transaction_traces(&[]).is_success());
    assert!(session.send_sql_traces(&[]).is_success());
    assert_eq!(transport.request_count(), before);
}

#[test]
fn error_and_transaction_payloads_are_run_scoped() {
    let transport = MockTransport::new();
    let session = registered_session(&transport);

    transport.push_return_value(Value::Null);
    session.send_errors(&[trace("e1")]);
    let body = body_json(&transport.last_request());
    assert_eq!(body, json!(["abc123", [["e1", 0.25]]]));
    assert_eq!(param(&transport.last_request(), "method"), Some("error_data"));

    transport.push_return_value(Value::Null);
    session.send_transaction_traces(&[trace("t1")]);
    let body = body_json(&transport.last_request());
    assert_eq!(body, json!(["abc123", [["t1", 0.25]]]));
    assert_eq!(
        param(&transport.last_request(), "method"),
        Some("transaction_sample_data")
    );
}

#[test]
fn sql_trace_payload_omits_run_id() {
    let transport = MockTransport::new();
    let session = registered_session(&transport);

    transport.push_return_value(Value::Null);
    session.send_sql_traces(&[trace("q1"), trace("q2")]);

    let request = transport.last_request();
    assert_eq!(param(&request, "method"), Some("sql_trace_data"));
    // Run id still travels in the query string.
    assert_eq!(param(&request, "run_id"), Some("abc123"));
    // But the body is exactly the one-element tuple (traces,).
    assert_eq!(
        body_json(&request),
        json!([[["q1", 0.25], ["q2", 0.25]]])
    );
}

#[test]
fn unavailable_collector_retries_and_session_stays_usable() {
    let transport = MockTransport::new();
    let session = registered_session(&transport);

    transport.push_response(503, json!({}));
    let outcome = session.send_metric_data(0.0, 60.0, &[]);
    assert_eq!(outcome, Outcome::Retry(None));
    assert!(!session.is_terminal());

    transport.push_return_value(Value::Null);
    assert!(session.send_metric_data(0.0, 60.0, &[]).is_success());
}

#[test]
fn connection_failure_retries() {
    let transport = MockTransport::new();
    let session = registered_session(&transport);

    transport.push_connection_failure();
    let outcome = session.send_errors(&[trace("e1")]);
    assert!(matches!(outcome, Outcome::Retry(_)));
    assert!(!session.is_terminal());
}

#[test]
fn force_disconnect_makes_session_terminal() {
    let transport = MockTransport::new();
    let session = registered_session(&transport);

    transport.push_exception("Collector::Agent::ForceDisconnectException", "disabled");
    let outcome = session.send_metric_data(0.0, 60.0, &[]);
    assert!(matches!(outcome, Outcome::Disconnect(_)));
    assert!(session.is_terminal());

    // Later sends are rejected with the recorded fate, no network call.
    let before = transport.request_count();
    let outcome = session.send_errors(&[trace("e1")]);
    assert!(matches!(outcome, Outcome::Disconnect(_)));
    assert_eq!(transport.request_count(), before);
}

#[test]
fn force_restart_makes_session_terminal() {
    let transport = MockTransport::new();
    let session = registered_session(&transport);

    transport.push_exception("Collector::Agent::ForceRestartException", "config changed");
    let outcome = session.send_transaction_traces(&[trace("t1")]);
    assert!(matches!(outcome, Outcome::Restart(_)));
    assert!(session.is_terminal());

    let before = transport.request_count();
    assert!(matches!(
        session.send_metric_data(0.0, 60.0, &[]),
        Outcome::Restart(_)
    ));
    assert_eq!(transport.request_count(), before);
}

#[test]
fn shutdown_sends_and_swallows_failure() {
    let transport = MockTransport::new();
    let session = registered_session(&transport);
    let before = transport.request_count();

    transport.push_response(503, json!({}));
    session.shutdown();

    assert_eq!(transport.request_count(), before + 1);
    let request = transport.last_request();
    assert_eq!(param(&request, "method"), Some("shutdown"));
    assert_eq!(param(&request, "run_id"), Some("abc123"));
    assert_eq!(body_json(&request), json!([]));
}

#[test]
fn unknown_server_exception_discards_but_session_survives() {
    let transport = MockTransport::new();
    let session = registered_session(&transport);

    transport.push_exception("Collector::Agent::FutureException", "novel");
    let outcome = session.send_errors(&[trace("e1")]);
    assert!(matches!(outcome, Outcome::Discard(_)));
    assert!(!session.is_terminal());
}
