//! Request pipeline: codec, transport and classifier composed into the one
//! request shape every protocol method shares.

use std::io::Read;

use serde::ser::SerializeTuple;
use serde::{Serialize, Serializer};
use tracing::{debug, error};

use crate::classify::{self, Outcome};
use crate::codec::{self, ContentEncoding};
use crate::config::DebugConfig;
use crate::error::TransportError;
use crate::transport::{CollectorTransport, WireRequest};

/// Version of the agent wire protocol all requests are formatted for.
pub const PROTOCOL_VERSION: &str = "9";

/// Substituted when no license key was configured, so the failure shows up
/// clearly in collector-side logs instead of as an empty parameter.
const MISSING_LICENSE_KEY: &str = "NO LICENSE KEY WAS SET IN AGENT CONFIGURATION";

/// Wire shape for methods that take no arguments: the empty tuple `()`.
#[derive(Debug, Clone, Copy)]
pub struct EmptyPayload;

impl Serialize for EmptyPayload {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_tuple(0)?.end()
    }
}

/// Wire shape for methods whose argument tuple has exactly one element:
/// `(value,)`. A plain newtype would serialize transparently as the inner
/// value, which is the wrong shape on the wire.
#[derive(Debug, Clone, Copy)]
pub struct SingleElement<T>(pub T);

impl<T: Serialize> Serialize for SingleElement<T> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut tuple = serializer.serialize_tuple(1)?;
        tuple.serialize_element(&self.0)?;
        tuple.end()
    }
}

/// Construct and send one request to the collector, classifying the result.
///
/// Encode failure short-circuits to Discard without a network call: the
/// same batch would fail identically on any later attempt. Connection
/// failure, including timeout, classifies as Retry.
pub fn send_request<P: Serialize>(
    transport: &dyn CollectorTransport,
    url: &str,
    method: &str,
    license_key: &str,
    run_id: Option<&str>,
    payload: &P,
    debug_config: &DebugConfig,
) -> Outcome {
    let encoded = match codec::encode(method, payload) {
        Ok(encoded) => encoded,
        Err(err) => {
            error!(
                method = %method,
                run_id = run_id.unwrap_or("-"),
                error = %err,
                "Error encoding payload; the batch will be discarded"
            );
            return Outcome::Discard(Some(err.to_string()));
        }
    };

    let license_key = if license_key.is_empty() {
        MISSING_LICENSE_KEY
    } else {
        license_key
    };

    let mut params = vec![
        ("method".to_string(), method.to_string()),
        ("license_key".to_string(), license_key.to_string()),
        ("protocol_version".to_string(), PROTOCOL_VERSION.to_string()),
        ("marshal_format".to_string(), "json".to_string()),
    ];
    if let Some(run_id) = run_id {
        params.push(("run_id".to_string(), run_id.to_string()));
    }

    let request = WireRequest {
        url: url.to_string(),
        params,
        encoding: encoded.encoding,
        body: encoded.body,
    };

    let response = match transport.post(&request) {
        Ok(response) => response,
        // Pre-response network failure is always transient.
        Err(TransportError::Connection(message)) => {
            return Outcome::Retry(Some(message));
        }
        // A transport that cannot even be constructed is an agent-side
        // defect; retrying would loop forever on the same failure.
        Err(TransportError::Client(message)) => {
            error!(
                method = %method,
                run_id = run_id.unwrap_or("-"),
                error = %message,
                "Collector transport is unusable; the batch will be discarded"
            );
            return Outcome::Discard(Some(message));
        }
    };

    if response.status == 415 && debug_config.log_malformed_payloads {
        log_rejected_payload(&request);
    }

    classify::classify(
        response.status,
        &response.body,
        method,
        run_id,
        request.body.len(),
        debug_config,
    )
}

/// The collector said the payload was malformed; with the debug flag on,
/// put the exact bytes we sent into the log for diagnosis.
fn log_rejected_payload(request: &WireRequest) {
    let body = match request.encoding {
        ContentEncoding::Identity => request.body.clone(),
        ContentEncoding::Deflate => {
            let mut decoder = flate2::read::ZlibDecoder::new(request.body.as_slice());
            let mut out = Vec::new();
            if decoder.read_to_end(&mut out).is_err() {
                out = request.body.clone();
            }
            out
        }
    };
    debug!(
        payload = %String::from_utf8_lossy(&body),
        "Payload data which was rejected by the collector"
    );
}
