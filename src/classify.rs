//! Response Classifier
//!
//! Pure mapping from (HTTP status, response body) to an [`Outcome`]. This
//! is the protocol's core state machine and the single channel through
//! which every send operation reports its result to the harvest loop.
//!
//! The classifier never acts on what it sees: Restart and Disconnect are
//! collector-issued control instructions propagated verbatim to the
//! session owner, which decides whether to re-register or stop.

use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, error, info, warn};

use crate::codec;
use crate::config::DebugConfig;

/// Classified result of one protocol call.
///
/// `Discard` bounds memory growth: data the collector has permanently
/// rejected would fail identically on resend, so the batch must be
/// dropped. `Retry` is reserved for conditions a short wait plausibly
/// resolves. The classifier performs no retries itself.
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    Success(Value),
    Retry(Option<String>),
    Discard(Option<String>),
    Restart(Option<String>),
    Disconnect(Option<String>),
}

impl Outcome {
    pub fn is_success(&self) -> bool {
        matches!(self, Outcome::Success(_))
    }

    /// True when the session that observed this outcome must not be used
    /// for further sends.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Outcome::Restart(_) | Outcome::Disconnect(_))
    }
}

/// Server-side exception kinds, resolved from the wire `error_type` string
/// in this one place. The collector namespaces the type name, so matching
/// is on the trailing class name. Anything unrecognized falls through to
/// `Unrecognized` and classifies as Discard, which keeps the agent safe
/// against exception types introduced by newer collectors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServerErrorKind {
    License,
    PostTooBig,
    ForceRestart,
    ForceDisconnect,
    Unrecognized,
}

impl ServerErrorKind {
    pub fn from_error_type(error_type: &str) -> Self {
        if error_type.ends_with("LicenseException") {
            ServerErrorKind::License
        } else if error_type.ends_with("PostTooBigException") {
            ServerErrorKind::PostTooBig
        } else if error_type.ends_with("ForceRestartException") {
            ServerErrorKind::ForceRestart
        } else if error_type.ends_with("ForceDisconnectException") {
            ServerErrorKind::ForceDisconnect
        } else {
            ServerErrorKind::Unrecognized
        }
    }
}

#[derive(Debug, Deserialize)]
struct ServerException {
    error_type: String,
    message: Option<String>,
}

/// Classify a collector response. Pure apart from logging; safe to share
/// across sessions and threads. `request_len` is the size of the request
/// content as sent, reported when the collector rejects on size.
pub fn classify(
    status: u16,
    body: &[u8],
    method: &str,
    run_id: Option<&str>,
    request_len: usize,
    debug_config: &DebugConfig,
) -> Outcome {
    if status != 200 {
        return classify_http_error(status, body, method, run_id, request_len);
    }

    let decoded = match codec::decode(body) {
        Ok(value) => value,
        Err(err) => {
            error!(
                method = %method,
                run_id = run_id.unwrap_or("-"),
                error = %err,
                "Error decoding collector response"
            );
            if debug_config.log_malformed_payloads {
                debug!(content = %String::from_utf8_lossy(body), "Undecodable response body");
            }
            return Outcome::Discard(Some(err.to_string()));
        }
    };

    // A 200 body is either `{"return_value": ...}` or `{"exception": ...}`.
    // Presence of the key decides; a null return value is still a success.
    let Some(object) = decoded.as_object() else {
        warn!(
            method = %method,
            run_id = run_id.unwrap_or("-"),
            "Collector response is not a recognized protocol object"
        );
        return Outcome::Discard(None);
    };

    if let Some(value) = object.get("return_value") {
        return Outcome::Success(value.clone());
    }

    let exception: ServerException = match object
        .get("exception")
        .cloned()
        .map(serde_json::from_value)
    {
        Some(Ok(exception)) => exception,
        Some(Err(err)) => {
            warn!(
                method = %method,
                run_id = run_id.unwrap_or("-"),
                error = %err,
                "Collector exception object could not be decoded"
            );
            return Outcome::Discard(Some(err.to_string()));
        }
        None => {
            warn!(
                method = %method,
                run_id = run_id.unwrap_or("-"),
                "Collector response carried neither a return value nor an exception"
            );
            return Outcome::Discard(None);
        }
    };

    classify_server_exception(exception, method, run_id, request_len)
}

fn classify_server_exception(
    exception: ServerException,
    method: &str,
    run_id: Option<&str>,
    request_len: usize,
) -> Outcome {
    let kind = ServerErrorKind::from_error_type(&exception.error_type);
    let message = exception.message;

    debug!(
        method = %method,
        run_id = run_id.unwrap_or("-"),
        error_type = %exception.error_type,
        message = message.as_deref().unwrap_or("-"),
        "Received an exception from the collector"
    );

    match kind {
        ServerErrorKind::License => {
            error!(
                method = %method,
                "Collector is indicating that an incorrect license key has been \
                 supplied by the agent. Correct the license key in the agent \
                 configuration."
            );
            Outcome::Discard(message)
        }
        ServerErrorKind::PostTooBig => {
            warn!(
                method = %method,
                run_id = run_id.unwrap_or("-"),
                content_len = request_len,
                "Collector rejected the request because the content size was over \
                 the maximum allowed limit"
            );
            Outcome::Discard(message)
        }
        ServerErrorKind::ForceRestart => {
            info!(
                run_id = run_id.unwrap_or("-"),
                reason = message.as_deref().unwrap_or("-"),
                "An internal agent restart has been requested by the collector"
            );
            Outcome::Restart(message)
        }
        ServerErrorKind::ForceDisconnect => {
            error!(
                run_id = run_id.unwrap_or("-"),
                reason = message.as_deref().unwrap_or("-"),
                "Disconnection of the agent has been requested by the collector"
            );
            Outcome::Disconnect(message)
        }
        ServerErrorKind::Unrecognized => {
            warn!(
                method = %method,
                run_id = run_id.unwrap_or("-"),
                error_type = %exception.error_type,
                "An unexpected server error was received from the collector"
            );
            Outcome::Discard(message)
        }
    }
}

fn classify_http_error(
    status: u16,
    body: &[u8],
    method: &str,
    run_id: Option<&str>,
    request_len: usize,
) -> Outcome {
    debug!(
        method = %method,
        run_id = run_id.unwrap_or("-"),
        status = status,
        content_len = body.len(),
        "Received a non-200 HTTP response from the collector"
    );

    match status {
        400 => {
            error!(
                method = %method,
                status = status,
                "Collector is indicating that a bad request has been submitted. \
                 This would suggest a defect in the agent implementation."
            );
            Outcome::Discard(None)
        }
        413 => {
            warn!(
                method = %method,
                status = status,
                content_len = request_len,
                "Collector rejected the request because the content size was over \
                 the maximum allowed limit"
            );
            Outcome::Discard(None)
        }
        415 => {
            warn!(
                method = %method,
                status = status,
                "Collector is indicating that it was sent malformed payload data"
            );
            Outcome::Discard(Some(String::from_utf8_lossy(body).into_owned()))
        }
        503 => {
            warn!(
                method = %method,
                "Collector is unavailable. This is usually transient while the \
                 collector is being restarted."
            );
            Outcome::Retry(None)
        }
        _ => {
            warn!(
                method = %method,
                status = status,
                "An unexpected HTTP response was received from the collector"
            );
            Outcome::Discard(None)
        }
    }
}
