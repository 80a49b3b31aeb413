use chrono::{DateTime, SecondsFormat, Utc};
use rand::Rng;
use serde::{Deserialize, Serialize};

/// Upper-case base-36 alphabet used for the random tail of record identifiers.
const ID_ALPHABET: &[u8] = b"0123456789ABCDEFGHIJKLMNOPQRSTUVWXYZ";
const ID_RANDOM_LEN: usize = 6;

/// The default identifier prefix.
pub const DEFAULT_ID_PREFIX: &str = "ICES";

/// One certificate subject, as imported from a spreadsheet row.
///
/// Records are write-once: the identifier and creation instant are assigned by
/// [`Record::issue`] and nothing mutates a stored record afterwards. The serialized
/// field names are the ones embedded in verification links, so renaming a field
/// breaks every QR code already printed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Record {
    /// `PREFIX-YEAR-RANDOM6`, e.g. `ICES-2024-K3X9QZ`.
    pub id: String,
    pub student_name: String,
    pub email: String,
    pub mobile_number: String,
    pub address: String,
    pub batch_number: String,
    pub course_name: String,
    /// `YYYY-MM-DD`
    pub course_start_date: String,
    /// `YYYY-MM-DD`
    pub course_end_date: String,
    /// `YYYY-MM-DD`
    pub certificate_issue_date: String,
    pub is_valid: bool,
    /// RFC 3339 instant.
    pub created_at: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub certificate_url: Option<String>,
}

/// The importer's view of a row before it becomes a [`Record`].
///
/// Dates are expected to be normalized to `YYYY-MM-DD` already.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NewRecord {
    pub student_name: String,
    pub email: String,
    pub mobile_number: String,
    pub address: String,
    pub batch_number: String,
    pub course_name: String,
    pub course_start_date: String,
    pub course_end_date: String,
    pub certificate_issue_date: String,
}

impl Record {
    /// Turns an imported row into a record, assigning its identifier and creation instant.
    pub fn issue(row: NewRecord, id: String, created_at: DateTime<Utc>) -> Self {
        Record {
            id,
            student_name: row.student_name,
            email: row.email,
            mobile_number: row.mobile_number,
            address: row.address,
            batch_number: row.batch_number,
            course_name: row.course_name,
            course_start_date: row.course_start_date,
            course_end_date: row.course_end_date,
            certificate_issue_date: row.certificate_issue_date,
            is_valid: true,
            created_at: created_at.to_rfc3339_opts(SecondsFormat::Millis, true),
            certificate_url: None,
        }
    }
}

/// Generates a record identifier of the form `PREFIX-YEAR-XXXXXX`.
///
/// The six trailing characters are drawn from the upper-case base-36 alphabet.
/// Collisions inside one year are unlikely but possible; nothing here checks for them.
pub fn generate_record_id(prefix: &str, year: i32) -> String {
    let mut rng = rand::thread_rng();
    let random: String = (0..ID_RANDOM_LEN)
        .map(|_| ID_ALPHABET[rng.gen_range(0..ID_ALPHABET.len())] as char)
        .collect();
    format!("{}-{}-{}", prefix, year, random)
}
