//! Session
//!
//! A bound handle on one agent run: collector URL, license key and the run
//! id handed out by the handshake, plus the negotiated configuration. All
//! communication with the collector after registration goes through here.
//!
//! Once a Restart or Disconnect outcome has been observed the session is
//! terminal: the recorded outcome is returned from every later send
//! without touching the network, so a harvest loop that fails to check
//! still cannot leak data into a dead run.

use std::sync::Arc;

use parking_lot::RwLock;
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, warn};

use crate::classify::Outcome;
use crate::config::DebugConfig;
use crate::protocol::{self, EmptyPayload, SingleElement};
use crate::transport::CollectorTransport;

/// Wire shape for `metric_data`: `(runId, start, end, metrics)`. Times are
/// seconds since the Unix epoch.
#[derive(Debug, Serialize)]
struct MetricDataPayload<'a>(&'a str, f64, f64, &'a [Value]);

/// Wire shape for `error_data` and `transaction_sample_data`:
/// `(runId, items)`.
#[derive(Debug, Serialize)]
struct RunScopedPayload<'a>(&'a str, &'a [Value]);

/// Communication with the collector once registration has been done.
/// Created only by [`crate::register::create_session`]; the run id is
/// immutable for the session's lifetime.
pub struct Session {
    collector_url: String,
    license_key: String,
    run_id: String,
    configuration: Value,
    debug: DebugConfig,
    transport: Arc<dyn CollectorTransport>,
    fate: RwLock<Option<Outcome>>,
}

impl Session {
    pub(crate) fn new(
        collector_url: String,
        license_key: String,
        run_id: String,
        configuration: Value,
        debug: DebugConfig,
        transport: Arc<dyn CollectorTransport>,
    ) -> Self {
        Self {
            collector_url,
            license_key,
            run_id,
            configuration,
            debug,
            transport,
            fate: RwLock::new(None),
        }
    }

    pub fn run_id(&self) -> &str {
        &self.run_id
    }

    pub fn collector_url(&self) -> &str {
        &self.collector_url
    }

    /// Negotiated configuration: the local snapshot overlaid with the
    /// server's response, server values winning on key conflict.
    pub fn configuration(&self) -> &Value {
        &self.configuration
    }

    /// True once a Restart or Disconnect has been observed. A terminal
    /// session must be replaced (Restart) or abandoned (Disconnect) by the
    /// harvest loop; buffered, not-yet-sent data carries over to the
    /// replacement session.
    pub fn is_terminal(&self) -> bool {
        self.fate.read().is_some()
    }

    /// Orderly deregistration of the agent run, rather than dropping the
    /// connection and leaving the collector to infer the run is finished.
    /// The caller is already tearing down, so failures are logged and
    /// swallowed.
    pub fn shutdown(&self) {
        debug!(run_id = %self.run_id, "Connecting to the collector to terminate the session");
        let outcome = self.send("shutdown", &EmptyPayload);
        if !outcome.is_success() {
            warn!(
                run_id = %self.run_id,
                outcome = ?outcome,
                "Session shutdown was not acknowledged by the collector"
            );
        }
    }

    /// Submit already-aggregated metric data for the given period. Sent
    /// even when `metrics` is empty: an empty interval is still a report,
    /// and suppressing it is the caller's decision.
    pub fn send_metric_data(&self, start_time: f64, end_time: f64, metrics: &[Value]) -> Outcome {
        let payload = MetricDataPayload(&self.run_id, start_time, end_time, metrics);
        self.send("metric_data", &payload)
    }

    /// Submit error records. No network call when `errors` is empty.
    pub fn send_errors(&self, errors: &[Value]) -> Outcome {
        if errors.is_empty() {
            return Outcome::Success(Value::Null);
        }
        let payload = RunScopedPayload(&self.run_id, errors);
        self.send("error_data", &payload)
    }

    /// Submit transaction trace records. No network call when empty.
    pub fn send_transaction_traces(&self, traces: &[Value]) -> Outcome {
        if traces.is_empty() {
            return Outcome::Success(Value::Null);
        }
        let payload = RunScopedPayload(&self.run_id, traces);
        self.send("transaction_sample_data", &payload)
    }

    /// Submit SQL trace records. No network call when empty.
    ///
    /// The wire payload is the one-element tuple `(traces,)` — unlike the
    /// other data methods the run id is not part of this payload, only of
    /// the query string.
    pub fn send_sql_traces(&self, traces: &[Value]) -> Outcome {
        if traces.is_empty() {
            return Outcome::Success(Value::Null);
        }
        self.send("sql_trace_data", &SingleElement(traces))
    }

    fn send<P: Serialize>(&self, method: &str, payload: &P) -> Outcome {
        if let Some(fate) = self.fate.read().clone() {
            warn!(
                method = %method,
                run_id = %self.run_id,
                fate = ?fate,
                "Send attempted on a terminal session; re-register before resuming"
            );
            return fate;
        }

        let outcome = protocol::send_request(
            self.transport.as_ref(),
            &self.collector_url,
            method,
            &self.license_key,
            Some(&self.run_id),
            payload,
            &self.debug,
        );

        if outcome.is_terminal() {
            *self.fate.write() = Some(outcome.clone());
        }
        outcome
    }
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("collector_url", &self.collector_url)
            .field("run_id", &self.run_id)
            .field("terminal", &self.is_terminal())
            .finish()
    }
}
