//! Payload Codec
//!
//! Serializes protocol method payloads to JSON and applies size-based
//! compression. Stateless; safe to share across sessions and threads.
//!
//! Every payload type declares its wire shape explicitly through
//! `Serialize` — there is no generic fallback that reflects over unknown
//! values, so a payload that cannot serialize is a defect in the caller,
//! not something to paper over here.

use std::io::Write;

use flate2::write::ZlibEncoder;
use flate2::Compression;
use serde::Serialize;

use crate::error::CodecError;

/// Payloads at or over this size are deflate-compressed.
pub const COMPRESSION_THRESHOLD: usize = 64 * 1024;

/// Below this serialized size, compress for speed; at or above, compress
/// for smallest size, trading CPU for bandwidth on very large batches.
pub const FAST_COMPRESSION_LIMIT: usize = 2_000_000;

/// Content encoding applied to a serialized payload, reported verbatim in
/// the `Content-Encoding` request header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContentEncoding {
    Identity,
    Deflate,
}

impl ContentEncoding {
    pub fn as_str(&self) -> &'static str {
        match self {
            ContentEncoding::Identity => "identity",
            ContentEncoding::Deflate => "deflate",
        }
    }
}

/// A serialized, possibly compressed payload ready for the transport.
#[derive(Debug, Clone)]
pub struct EncodedPayload {
    pub body: Vec<u8>,
    pub encoding: ContentEncoding,
}

/// Serialize a method payload and apply the compression policy.
pub fn encode<P: Serialize>(method: &str, payload: &P) -> Result<EncodedPayload, CodecError> {
    let data = serde_json::to_vec(payload).map_err(|source| CodecError::Encoding {
        method: method.to_string(),
        source,
    })?;

    if data.len() < COMPRESSION_THRESHOLD {
        return Ok(EncodedPayload {
            body: data,
            encoding: ContentEncoding::Identity,
        });
    }

    let level = if data.len() < FAST_COMPRESSION_LIMIT {
        Compression::fast()
    } else {
        Compression::best()
    };

    let mut encoder = ZlibEncoder::new(Vec::with_capacity(data.len() / 4), level);
    encoder.write_all(&data)?;
    let body = encoder.finish()?;

    Ok(EncodedPayload {
        body,
        encoding: ContentEncoding::Deflate,
    })
}

/// Decode a collector response body.
pub fn decode(bytes: &[u8]) -> Result<serde_json::Value, CodecError> {
    Ok(serde_json::from_slice(bytes)?)
}
