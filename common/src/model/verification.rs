use crate::model::record::Record;
use crate::resolution::Resolution;
use serde::{Deserialize, Serialize};

pub const VERIFIED_MESSAGE: &str = "This certificate has been verified and is authentic";
pub const NOT_VERIFIED_MESSAGE: &str = "This certificate is NOT verified";

/// Where a verified record came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Source {
    /// Decoded from the token embedded in the verification link.
    Embedded,
    /// Looked up by identifier in the record store.
    Stored,
}

/// Body returned by `POST /api/verify` and rendered by the verification page.
///
/// A negative outcome is a regular value with `found == false`; the page shows it
/// as "not verified" rather than as an error.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VerificationResult {
    pub found: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub student: Option<Record>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<Source>,
    pub message: String,
}

impl From<Resolution> for VerificationResult {
    fn from(resolution: Resolution) -> Self {
        match resolution {
            Resolution::Embedded(record) => VerificationResult {
                found: true,
                student: Some(record),
                source: Some(Source::Embedded),
                message: VERIFIED_MESSAGE.to_string(),
            },
            Resolution::Stored(record) => VerificationResult {
                found: true,
                student: Some(record),
                source: Some(Source::Stored),
                message: VERIFIED_MESSAGE.to_string(),
            },
            Resolution::Unresolved => VerificationResult {
                found: false,
                student: None,
                source: None,
                message: NOT_VERIFIED_MESSAGE.to_string(),
            },
        }
    }
}
