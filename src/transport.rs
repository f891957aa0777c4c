//! Request Transport
//!
//! Blocking HTTP POST to the collector. The trait is the seam the rest of
//! the crate talks through, so tests and the handshake can run against a
//! scripted transport without a network.
//!
//! TLS certificate validation is disabled for collector connections. This
//! is deliberate and load-bearing: trust between agent and collector is
//! established by the shared license key, not the certificate chain, and
//! agents frequently sit behind interception proxies with private CAs.
//! Anyone embedding this crate should understand that the transport will
//! accept any certificate the collector presents.

use std::time::Duration;

use reqwest::blocking::Client;
use tracing::warn;

use crate::codec::ContentEncoding;
use crate::config::AgentConfig;
use crate::endpoint;
use crate::error::TransportError;

/// Identifying user-agent, used by the collector to target specific agents
/// when a protocol problem needs diagnosing.
pub fn user_agent() -> String {
    format!(
        "Beacon-RustAgent/{} (rust {} {})",
        env!("CARGO_PKG_VERSION"),
        std::env::consts::OS,
        std::env::consts::ARCH
    )
}

/// One outbound protocol request, fully assembled.
#[derive(Debug, Clone)]
pub struct WireRequest {
    pub url: String,
    /// Query parameters in wire order: method, license_key,
    /// protocol_version, marshal_format, optional run_id.
    pub params: Vec<(String, String)>,
    pub encoding: ContentEncoding,
    pub body: Vec<u8>,
}

/// Raw response: status code and body bytes. Classification happens
/// elsewhere; the transport surfaces only connection-level failure.
#[derive(Debug, Clone)]
pub struct WireResponse {
    pub status: u16,
    pub body: Vec<u8>,
}

/// The transport seam. Exactly one request is assumed in flight per
/// session at a time; serialization across calls is the harvest
/// scheduler's responsibility.
pub trait CollectorTransport: Send + Sync {
    fn post(&self, request: &WireRequest) -> Result<WireResponse, TransportError>;
}

/// Production transport on `reqwest`'s blocking client. Connection pooling
/// keyed by host is left to the client; keep-alive is requested via header
/// in case the collector ever honours it.
pub struct HttpTransport {
    client: Client,
}

impl HttpTransport {
    pub fn new(config: &AgentConfig) -> Result<Self, TransportError> {
        let mut builder = Client::builder()
            .danger_accept_invalid_certs(true)
            .timeout(Duration::from_secs(config.request_timeout_secs));

        if let Some(proxy) = endpoint::proxy_url(config) {
            builder = builder.proxy(
                reqwest::Proxy::all(&proxy)
                    .map_err(|e| TransportError::Client(e.to_string()))?,
            );
        }

        let client = builder
            .build()
            .map_err(|e| TransportError::Client(e.to_string()))?;
        Ok(Self { client })
    }
}

impl CollectorTransport for HttpTransport {
    fn post(&self, request: &WireRequest) -> Result<WireResponse, TransportError> {
        let response = self
            .client
            .post(&request.url)
            .query(&request.params)
            .header("User-Agent", user_agent())
            .header("Content-Encoding", request.encoding.as_str())
            .header("Connection", "Keep-Alive")
            .body(request.body.clone())
            .send()
            .map_err(|err| {
                warn!(
                    url = %request.url,
                    error = %err,
                    "Unable to connect to the collector"
                );
                TransportError::Connection(err.to_string())
            })?;

        let status = response.status().as_u16();
        let body = response
            .bytes()
            .map_err(|err| {
                warn!(
                    url = %request.url,
                    error = %err,
                    "Connection lost while reading the collector response"
                );
                TransportError::Connection(err.to_string())
            })?
            .to_vec();

        Ok(WireResponse { status, body })
    }
}
