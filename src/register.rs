//! Registration Handshake
//!
//! The two-call bootstrap that turns configuration into a live [`Session`]:
//! ask the primary collector which host to use for this run, then connect
//! against that host and merge the server's configuration over the local
//! snapshot. Nothing here escapes as an error; an unsuccessful handshake
//! of any kind yields `None`, which the caller reads as "try registration
//! again later".

use std::sync::Arc;

use anyhow::{anyhow, Context};
use serde::Serialize;
use serde_json::{Map, Value};
use tracing::{debug, error};

use crate::classify::Outcome;
use crate::config::AgentConfig;
use crate::endpoint;
use crate::protocol::{self, EmptyPayload, SingleElement};
use crate::session::Session;
use crate::transport::CollectorTransport;

/// Ordered list of facts about the host process, reported to the collector
/// during connect. Order is preserved on the wire; each entry serializes
/// as a `[name, value]` pair.
#[derive(Debug, Clone, Default, Serialize)]
pub struct Environment(Vec<(String, Value)>);

impl Environment {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, name: impl Into<String>, value: impl Into<Value>) {
        self.0.push((name.into(), value.into()));
    }

    /// Baseline facts every agent reports.
    pub fn collect() -> Self {
        let mut env = Self::new();
        env.push("Agent Version", env!("CARGO_PKG_VERSION"));
        env.push("OS", std::env::consts::OS);
        env.push("Architecture", std::env::consts::ARCH);
        env
    }
}

/// The one configuration record sent as the `connect` payload.
#[derive(Debug, Serialize)]
struct ConnectRecord<'a> {
    pid: u32,
    language: &'static str,
    host: String,
    app_name: Vec<String>,
    identifier: String,
    agent_version: &'static str,
    environment: &'a Environment,
    settings: Value,
}

/// Register the configured application with the collector and retrieve the
/// server-side configuration. Returns a session through which subsequent
/// collector calls are made, or `None` when registration should be retried
/// later. Reasons for failure have already been logged by the time this
/// returns.
pub fn create_session(
    transport: Arc<dyn CollectorTransport>,
    config: &AgentConfig,
    environment: &Environment,
) -> Option<Session> {
    match try_create_session(transport, config, environment) {
        Ok(session) => session,
        Err(err) => {
            // Classified protocol failures return Ok(None) above; reaching
            // here means a defect in the agent itself, logged in full.
            error!(
                error = %format!("{:#}", err),
                "Unexpected error when attempting to register the agent with the collector"
            );
            None
        }
    }
}

fn try_create_session(
    transport: Arc<dyn CollectorTransport>,
    config: &AgentConfig,
    environment: &Environment,
) -> anyhow::Result<Option<Session>> {
    debug!(
        app_name = %config.app_name,
        host = %config.host,
        "Connecting to the collector to register the agent"
    );

    // First ask the primary collector which of the many collector
    // instances this agent run should talk to.
    let url = endpoint::collector_url(config, None);
    let redirect_host = match protocol::send_request(
        transport.as_ref(),
        &url,
        "get_redirect_host",
        &config.license_key,
        None,
        &EmptyPayload,
        &config.debug,
    ) {
        Outcome::Success(value) => match value.as_str() {
            Some(host) => host.to_string(),
            None => {
                return Err(anyhow!(
                    "collector returned a non-string redirect host: {}",
                    value
                ))
            }
        },
        outcome => {
            debug!(outcome = ?outcome, "Registration redirect lookup did not succeed");
            return Ok(None);
        }
    };

    // All communication from here on goes to the per-run collector.
    let app_names = config.app_names();
    let record = ConnectRecord {
        pid: std::process::id(),
        language: "rust",
        host: local_hostname(),
        identifier: app_names.join(","),
        app_name: app_names,
        agent_version: env!("CARGO_PKG_VERSION"),
        environment,
        settings: config.settings_snapshot(),
    };

    let url = endpoint::collector_url(config, Some(&redirect_host));
    let server_config = match protocol::send_request(
        transport.as_ref(),
        &url,
        "connect",
        &config.license_key,
        None,
        &SingleElement(&record),
        &config.debug,
    ) {
        Outcome::Success(value) => value,
        outcome => {
            debug!(outcome = ?outcome, "Registration connect call did not succeed");
            return Ok(None);
        }
    };

    let server_map = server_config
        .as_object()
        .context("collector connect response was not a configuration object")?;

    let negotiated = overlay_settings(config.settings_snapshot(), server_map);
    let run_id = extract_run_id(server_map)
        .context("collector connect response did not supply an agent run id")?;

    let session = Session::new(
        url,
        config.license_key.clone(),
        run_id,
        negotiated,
        config.debug.clone(),
        transport,
    );

    debug!(
        app_name = %config.app_name,
        redirect_host = %redirect_host,
        run_id = %session.run_id(),
        "Successfully registered agent with the collector"
    );

    Ok(Some(session))
}

/// Negotiated configuration: local snapshot overlaid by the server
/// response, server values winning on key conflict.
fn overlay_settings(local: Value, server: &Map<String, Value>) -> Value {
    let mut merged = match local {
        Value::Object(map) => map,
        _ => Map::new(),
    };
    for (key, value) in server {
        merged.insert(key.clone(), value.clone());
    }
    Value::Object(merged)
}

/// The run id comes back as a string or a number depending on collector
/// version; normalize to a string either way.
fn extract_run_id(server: &Map<String, Value>) -> Option<String> {
    match server.get("agent_run_id")? {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn local_hostname() -> String {
    std::env::var("HOSTNAME").unwrap_or_else(|_| "localhost".to_string())
}
