//! Verification payload codec.
//!
//! A certificate's QR code carries the whole record so that a verifier on another
//! device can confirm it without a prior lookup. The record is serialized to JSON and
//! turned into a token by the first [`Encoding`] in [`PRIORITY`] that succeeds:
//!
//! 1. [`Encoding::Compact`]: raw DEFLATE, then URL-safe base64 without padding.
//! 2. [`Encoding::Plain`]: UTF-8 bytes, then standard base64, then percent-escaping.
//!
//! Tokens do not say which encoding produced them, so [`decode`] tries the same list
//! in the same order and keeps the first result that passes [`schema::validate`].
//! Neither [`encode`] nor [`decode`] returns an error; failures come back as a bare
//! link or as [`Decoded::Invalid`].

pub mod schema;

use crate::model::record::Record;
use base64::engine::general_purpose::{STANDARD, URL_SAFE_NO_PAD};
use base64::Engine;
use flate2::read::DeflateDecoder;
use flate2::write::DeflateEncoder;
use flate2::Compression;
use log::{debug, warn};
use schema::SchemaError;
use std::io::{Read, Write};
use thiserror::Error;

/// Name of the query/fragment parameter that carries the token.
pub const TOKEN_PARAM: &str = "data";

/// Path prefix of verification links.
pub const VERIFY_PATH: &str = "/verify/";

/// Upper bound on inflated payload size. Real records are well under 2 KiB.
const MAX_PAYLOAD_BYTES: u64 = 64 * 1024;

#[derive(Debug, Error)]
pub enum CodecError {
    #[error("record serialization failed: {0}")]
    Serialize(#[from] serde_json::Error),
    #[error("compression stream failed: {0}")]
    Io(#[from] std::io::Error),
    #[error("payload exceeds the 64 KiB limit")]
    TooLarge,
    #[error("base64 decoding failed: {0}")]
    Base64(#[from] base64::DecodeError),
    #[error("percent-unescaping failed: {0}")]
    Unescape(String),
    #[error("payload is not UTF-8")]
    NotUtf8,
    #[error("payload rejected: {0}")]
    Schema(#[from] SchemaError),
}

/// A reversible text-to-token transformation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Encoding {
    Compact,
    Plain,
}

/// Order in which encodings are attempted, on both encode and decode.
pub const PRIORITY: [Encoding; 2] = [Encoding::Compact, Encoding::Plain];

impl Encoding {
    pub fn name(self) -> &'static str {
        match self {
            Encoding::Compact => "compact",
            Encoding::Plain => "plain",
        }
    }

    pub fn encode(self, text: &str) -> Result<String, CodecError> {
        match self {
            Encoding::Compact => {
                let mut encoder = DeflateEncoder::new(Vec::new(), Compression::default());
                encoder.write_all(text.as_bytes())?;
                let compressed = encoder.finish()?;
                Ok(URL_SAFE_NO_PAD.encode(compressed))
            }
            Encoding::Plain => {
                let base64 = STANDARD.encode(text.as_bytes());
                Ok(urlencoding::encode(&base64).into_owned())
            }
        }
    }

    pub fn decode(self, token: &str) -> Result<String, CodecError> {
        match self {
            Encoding::Compact => {
                let compressed = URL_SAFE_NO_PAD.decode(token)?;
                let mut inflated = Vec::new();
                DeflateDecoder::new(compressed.as_slice())
                    .take(MAX_PAYLOAD_BYTES + 1)
                    .read_to_end(&mut inflated)?;
                if inflated.len() as u64 > MAX_PAYLOAD_BYTES {
                    return Err(CodecError::TooLarge);
                }
                String::from_utf8(inflated).map_err(|_| CodecError::NotUtf8)
            }
            Encoding::Plain => {
                // Reverse order of `encode`: unescape, then base64, then UTF-8.
                let unescaped =
                    urlencoding::decode(token).map_err(|e| CodecError::Unescape(e.to_string()))?;
                let bytes = STANDARD.decode(unescaped.as_bytes())?;
                String::from_utf8(bytes).map_err(|_| CodecError::NotUtf8)
            }
        }
    }
}

/// Outcome of decoding a token.
#[derive(Debug, Clone, PartialEq)]
pub enum Decoded {
    /// No token was supplied.
    Absent,
    /// A token was supplied but no encoding produced a well-formed record.
    Invalid(String),
    Record(Record),
}

/// Encodes `record` into a token, or `None` if every encoding failed.
pub fn encode_token(record: &Record) -> Option<String> {
    let text = match serde_json::to_string(record) {
        Ok(text) => text,
        Err(e) => {
            warn!("Could not serialize record {}: {}", record.id, e);
            return None;
        }
    };

    for encoding in PRIORITY {
        match encoding.encode(&text) {
            Ok(token) => return Some(token),
            Err(e) => debug!("{} encoding failed for {}: {}", encoding.name(), record.id, e),
        }
    }
    None
}

/// Verification link for `id` without an embedded payload.
pub fn verify_url(origin: &str, id: &str) -> String {
    format!(
        "{}{}{}",
        origin.trim_end_matches('/'),
        VERIFY_PATH,
        urlencoding::encode(id)
    )
}

/// Builds the verification link for `record`, embedding the token in the fragment.
///
/// Falls back to the bare identifier link when no token can be produced.
pub fn encode(origin: &str, record: &Record) -> String {
    let base = verify_url(origin, &record.id);
    match encode_token(record) {
        Some(token) => format!("{}#{}={}", base, TOKEN_PARAM, token),
        None => base,
    }
}

/// Decodes a token produced by [`encode_token`].
pub fn decode(token: Option<&str>) -> Decoded {
    let token = match token.map(str::trim) {
        Some(token) if !token.is_empty() => token,
        _ => return Decoded::Absent,
    };

    let mut failures = Vec::with_capacity(PRIORITY.len());
    for encoding in PRIORITY {
        let attempt = encoding
            .decode(token)
            .and_then(|text| schema::parse_record(&text).map_err(CodecError::from));
        match attempt {
            Ok(record) => return Decoded::Record(record),
            Err(e) => {
                debug!("{} decoding rejected token: {}", encoding.name(), e);
                failures.push(format!("{}: {}", encoding.name(), e));
            }
        }
    }
    Decoded::Invalid(failures.join("; "))
}
