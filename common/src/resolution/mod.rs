//! Turns a verification request into the record to display, or a negative outcome.
//!
//! The embedded token is looked for in the query first and in the fragment second.
//! A token that decodes to a well-formed record wins and is registered in the store
//! if its identifier is new there. Otherwise, including when the token is invalid,
//! the identifier is looked up in the store.

use crate::codec::{self, Decoded, TOKEN_PARAM, VERIFY_PATH};
use crate::model::record::Record;
use crate::requests::VerifyRequest;
use crate::store::RecordStore;
use log::{debug, warn};

/// An incoming verification: the identifier path segment plus the raw query and
/// fragment strings, with or without their leading `?` / `#`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VerificationRequest {
    pub id: String,
    pub query: Option<String>,
    pub fragment: Option<String>,
}

/// Terminal state of a resolution.
#[derive(Debug, Clone, PartialEq)]
pub enum Resolution {
    Embedded(Record),
    Stored(Record),
    Unresolved,
}

impl Resolution {
    pub fn record(&self) -> Option<&Record> {
        match self {
            Resolution::Embedded(record) | Resolution::Stored(record) => Some(record),
            Resolution::Unresolved => None,
        }
    }
}

impl VerificationRequest {
    pub fn new(id: impl Into<String>) -> Self {
        VerificationRequest {
            id: id.into(),
            ..Self::default()
        }
    }

    pub fn with_query(mut self, query: impl Into<String>) -> Self {
        self.query = Some(query.into());
        self
    }

    pub fn with_fragment(mut self, fragment: impl Into<String>) -> Self {
        self.fragment = Some(fragment.into());
        self
    }

    /// Splits a verification link (absolute or path-only) into its parts.
    ///
    /// Returns `None` when the link has no non-empty segment after `/verify/`.
    pub fn parse(url: &str) -> Option<Self> {
        let (rest, fragment) = match url.split_once('#') {
            Some((rest, fragment)) => (rest, Some(fragment.to_string())),
            None => (url, None),
        };
        let (path, query) = match rest.split_once('?') {
            Some((path, query)) => (path, Some(query.to_string())),
            None => (rest, None),
        };

        let start = path.rfind(VERIFY_PATH)? + VERIFY_PATH.len();
        let segment = path[start..].split('/').next().unwrap_or_default();
        if segment.is_empty() {
            return None;
        }
        let id = urlencoding::decode(segment)
            .map(|id| id.into_owned())
            .unwrap_or_else(|_| segment.to_string());

        Some(VerificationRequest {
            id,
            query,
            fragment,
        })
    }

    /// The embedded token, if any. The query takes precedence over the fragment.
    ///
    /// The value is returned as it appears in the link; percent-escapes are left for
    /// the codec to undo.
    pub fn token(&self) -> Option<&str> {
        self.query
            .as_deref()
            .and_then(find_token)
            .or_else(|| self.fragment.as_deref().and_then(find_token))
    }
}

impl From<VerifyRequest> for VerificationRequest {
    fn from(req: VerifyRequest) -> Self {
        VerificationRequest {
            id: req.id,
            query: req.query,
            fragment: req.fragment,
        }
    }
}

fn find_token(params: &str) -> Option<&str> {
    params
        .trim_start_matches(|c| c == '?' || c == '#')
        .split('&')
        .find_map(|pair| match pair.split_once('=') {
            Some((name, value)) if name == TOKEN_PARAM && !value.is_empty() => Some(value),
            _ => None,
        })
}

/// Resolves `request` against `store`.
///
/// Never fails: an undecodable token falls back to the identifier lookup, a failed
/// registration is logged, and a missing record is [`Resolution::Unresolved`].
pub fn resolve(request: &VerificationRequest, store: &dyn RecordStore) -> Resolution {
    match codec::decode(request.token()) {
        Decoded::Record(record) => {
            if record.id != request.id {
                warn!(
                    "Embedded payload for {} carries identifier {}",
                    request.id, record.id
                );
            }
            if store.get_by_id(&record.id).is_none() {
                if let Err(e) = store.insert(std::slice::from_ref(&record)) {
                    warn!("Could not register embedded record {}: {}", record.id, e);
                }
            }
            return Resolution::Embedded(record);
        }
        Decoded::Invalid(reason) => {
            debug!("Invalid payload for {}: {}", request.id, reason);
        }
        Decoded::Absent => {}
    }

    match store.get_by_id(&request.id) {
        Some(record) => Resolution::Stored(record),
        None => Resolution::Unresolved,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::Encoding;
    use crate::model::record::tests::{records_with, sample_record, unicode_text};
    use crate::store::{MemoryRecordStore, StoreError};
    use proptest::prelude::*;

    fn renamed(name: &str) -> Record {
        Record {
            student_name: name.to_string(),
            ..sample_record()
        }
    }

    fn token(record: &Record) -> String {
        codec::encode_token(record).unwrap()
    }

    /// Reads like an empty store and refuses every write.
    struct ReadOnlyStore;

    impl RecordStore for ReadOnlyStore {
        fn list(&self) -> Vec<Record> {
            Vec::new()
        }
        fn insert(&self, _: &[Record]) -> Result<(), StoreError> {
            Err(StoreError::Unavailable("read-only".to_string()))
        }
        fn delete_one(&self, _: &str) -> Result<(), StoreError> {
            Err(StoreError::Unavailable("read-only".to_string()))
        }
        fn delete_all(&self) -> Result<(), StoreError> {
            Err(StoreError::Unavailable("read-only".to_string()))
        }
        fn get_by_id(&self, _: &str) -> Option<Record> {
            None
        }
    }

    #[test]
    fn parse_splits_path_query_and_fragment() {
        let req =
            VerificationRequest::parse("https://certs.example.org/verify/ICES-2024-001?x=1#data=abc")
                .unwrap();
        assert_eq!(req.id, "ICES-2024-001");
        assert_eq!(req.query.as_deref(), Some("x=1"));
        assert_eq!(req.fragment.as_deref(), Some("data=abc"));
        assert_eq!(req.token(), Some("abc"));

        let req = VerificationRequest::parse("/verify/ICES%202024").unwrap();
        assert_eq!(req.id, "ICES 2024");
        assert_eq!(req.token(), None);

        assert!(VerificationRequest::parse("https://certs.example.org/verify/").is_none());
        assert!(VerificationRequest::parse("https://certs.example.org/about").is_none());
    }

    #[test]
    fn token_is_not_percent_decoded() {
        let req = VerificationRequest::new("id").with_fragment("#data=eyJ9%3D%3D&lang=en");
        assert_eq!(req.token(), Some("eyJ9%3D%3D"));
    }

    #[test]
    fn query_token_wins_over_fragment_token() {
        let store = MemoryRecordStore::new();
        let url = format!(
            "/verify/ICES-2024-001?data={}#data={}",
            token(&renamed("From Query")),
            token(&renamed("From Fragment"))
        );
        let req = VerificationRequest::parse(&url).unwrap();

        match resolve(&req, &store) {
            Resolution::Embedded(record) => assert_eq!(record.student_name, "From Query"),
            other => panic!("expected embedded record, got {:?}", other),
        }
    }

    #[test]
    fn fragment_token_is_used_when_query_has_none() {
        let store = MemoryRecordStore::new();
        let req = VerificationRequest::new("ICES-2024-001")
            .with_query("utm=qr")
            .with_fragment(format!("data={}", token(&renamed("From Fragment"))));

        let resolution = resolve(&req, &store);
        assert_eq!(
            resolution.record().map(|r| r.student_name.as_str()),
            Some("From Fragment")
        );
    }

    #[test]
    fn without_token_resolution_is_a_store_lookup() {
        let store = MemoryRecordStore::with_records(vec![sample_record()]);

        let found = resolve(&VerificationRequest::new("ICES-2024-001"), &store);
        assert_eq!(found, Resolution::Stored(sample_record()));

        let missing = resolve(&VerificationRequest::new("ICES-2024-999"), &store);
        assert_eq!(missing, Resolution::Unresolved);
    }

    #[test]
    fn first_sight_registers_the_embedded_record() {
        let store = MemoryRecordStore::new();
        let record = sample_record();
        let req = VerificationRequest::new(record.id.clone())
            .with_fragment(format!("data={}", token(&record)));

        assert_eq!(resolve(&req, &store), Resolution::Embedded(record.clone()));
        assert_eq!(store.get_by_id(&record.id), Some(record.clone()));

        // The same device can now verify from the bare link.
        let bare = VerificationRequest::new(record.id.clone());
        assert_eq!(resolve(&bare, &store), Resolution::Stored(record));
    }

    #[test]
    fn known_identifier_is_not_overwritten_by_payload() {
        let stored = sample_record();
        let store = MemoryRecordStore::with_records(vec![stored.clone()]);
        let req = VerificationRequest::new(stored.id.clone())
            .with_query(format!("data={}", token(&renamed("Edited Name"))));

        let resolution = resolve(&req, &store);
        assert_eq!(
            resolution.record().map(|r| r.student_name.as_str()),
            Some("Edited Name")
        );
        assert_eq!(store.get_by_id(&stored.id), Some(stored));
        assert_eq!(store.list().len(), 1);
    }

    #[test]
    fn invalid_token_falls_back_to_lookup() {
        let store = MemoryRecordStore::with_records(vec![sample_record()]);
        let req = VerificationRequest::new("ICES-2024-001").with_query("data=%%%garbage");
        assert_eq!(resolve(&req, &store), Resolution::Stored(sample_record()));

        let req = VerificationRequest::new("ICES-2024-404").with_query("data=%%%garbage");
        assert_eq!(resolve(&req, &store), Resolution::Unresolved);
    }

    #[test]
    fn plain_token_in_fragment_resolves() {
        let store = MemoryRecordStore::new();
        let text = serde_json::to_string(&sample_record()).unwrap();
        let plain = Encoding::Plain.encode(&text).unwrap();
        let req = VerificationRequest::new("ICES-2024-001").with_fragment(format!("data={}", plain));

        assert_eq!(resolve(&req, &store), Resolution::Embedded(sample_record()));
    }

    #[test]
    fn failed_registration_does_not_change_outcome() {
        let record = sample_record();
        let req = VerificationRequest::new(record.id.clone())
            .with_fragment(format!("data={}", token(&record)));
        assert_eq!(resolve(&req, &ReadOnlyStore), Resolution::Embedded(record));

        assert_eq!(
            resolve(&VerificationRequest::new("ICES-2024-001"), &ReadOnlyStore),
            Resolution::Unresolved
        );
    }

    proptest! {
        #[test]
        fn first_sight_registers_any_record(
            record in records_with(unicode_text()),
            in_query in any::<bool>(),
        ) {
            let store = MemoryRecordStore::new();
            let params = format!("data={}", token(&record));
            let req = VerificationRequest::new(record.id.clone());
            let req = if in_query { req.with_query(params) } else { req.with_fragment(params) };

            prop_assert_eq!(resolve(&req, &store), Resolution::Embedded(record.clone()));
            prop_assert_eq!(store.get_by_id(&record.id), Some(record.clone()));

            let bare = VerificationRequest::new(record.id.clone());
            prop_assert_eq!(resolve(&bare, &store), Resolution::Stored(record));
        }
    }
}
