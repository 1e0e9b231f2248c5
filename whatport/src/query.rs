//! Port lookup and protocol description queries.
//!
//! A lookup key made only of digits searches the port column, anything else
//! searches the service name. Raw matches that describe the same service
//! (same description, name and port) on several transport protocols are
//! coalesced into one record whose protocol lists them in encounter order.

use std::collections::hash_map::Entry;
use std::collections::HashMap;
use shared::protocol::PROTOCOL_SEPARATOR;
use shared::types::PortRecord;
use crate::error::Result;
use crate::store::db::PortDb;

/// Which column a lookup targets and how it is compared
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Predicate {
    PortEquals(u16),
    NameEquals(String),
    /// Substring of the port rendered as decimal text
    PortContains(String),
    NameContains(String),
}

impl Predicate {
    /// Build the predicate for a lookup key.
    ///
    /// Returns `None` for an exact lookup of a digits-only key that is too
    /// large to be a port, since no record can match it.
    pub fn select(key: &str, like: bool) -> Option<Self> {
        match (is_port_key(key), like) {
            (true, false) => key.parse::<u16>().ok().map(Predicate::PortEquals),
            (true, true) => Some(Predicate::PortContains(key.to_string())),
            (false, false) => Some(Predicate::NameEquals(key.to_string())),
            (false, true) => Some(Predicate::NameContains(key.to_string())),
        }
    }
}

fn is_port_key(key: &str) -> bool {
    !key.is_empty() && key.bytes().all(|b| b.is_ascii_digit())
}

/// Find the services matching `key`, merging protocol variants.
///
/// The key is compared as given; callers that want case-insensitive name
/// matching must normalise it themselves.
pub fn lookup(db: &PortDb, key: &str, like: bool) -> Result<Vec<PortRecord>> {
    let Some(predicate) = Predicate::select(key, like) else {
        tracing::debug!("Key {:?} is outside the port range, nothing to match", key);
        return Ok(Vec::new());
    };

    let raw = db.filter(&predicate)?;
    let merged = merge_protocols(raw);
    tracing::debug!("{:?} matched {} services", predicate, merged.len());

    Ok(merged)
}

/// Description of the first record carrying `protocol_name` (case-insensitive),
/// or an empty string when there is none.
pub fn describe(db: &PortDb, protocol_name: &str) -> Result<String> {
    let protocol = protocol_name.to_lowercase();

    let description = db
        .filter_protocol(&protocol)?
        .into_iter()
        .next()
        .map(|record| record.description)
        .unwrap_or_default();

    Ok(description)
}

/// Coalesce records sharing (description, name, port) into a single record.
/// Later protocols are appended to the first one seen; output keeps
/// first-seen order.
pub fn merge_protocols(records: Vec<PortRecord>) -> Vec<PortRecord> {
    let mut slots: HashMap<(String, String, u16), usize> = HashMap::new();
    let mut merged: Vec<PortRecord> = Vec::with_capacity(records.len());

    for record in records {
        let key = (record.description.clone(), record.name.clone(), record.port);
        match slots.entry(key) {
            Entry::Occupied(slot) => {
                let existing = &mut merged[*slot.get()];
                existing.protocol.push_str(PROTOCOL_SEPARATOR);
                existing.protocol.push_str(&record.protocol);
            }
            Entry::Vacant(slot) => {
                slot.insert(merged.len());
                merged.push(record);
            }
        }
    }

    merged
}

#[cfg(test)]
mod tests {
    use super::*;

    const HTTP_DESC: &str = "World Wide Web HTTP";

    fn test_db(records: &[PortRecord]) -> PortDb {
        let mut db = PortDb::open(":memory:").unwrap();
        db.replace_all(records, None).unwrap();
        db
    }

    fn web_records() -> Vec<PortRecord> {
        vec![
            PortRecord::new("http", 80, "tcp", HTTP_DESC),
            PortRecord::new("http", 80, "udp", HTTP_DESC),
            PortRecord::new("https", 443, "tcp", "http protocol over TLS/SSL"),
            PortRecord::new("https", 443, "udp", "http protocol over TLS/SSL"),
            PortRecord::new("http-alt", 8080, "tcp", "HTTP Alternate"),
        ]
    }

    #[test]
    fn test_select_targets_port_for_digit_keys() {
        assert_eq!(Predicate::select("80", false), Some(Predicate::PortEquals(80)));
        assert_eq!(Predicate::select("080", false), Some(Predicate::PortEquals(80)));
        assert_eq!(
            Predicate::select("80", true),
            Some(Predicate::PortContains("80".to_string()))
        );
        assert_eq!(Predicate::select("70000", false), None);
    }

    #[test]
    fn test_select_targets_name_otherwise() {
        assert_eq!(
            Predicate::select("http", false),
            Some(Predicate::NameEquals("http".to_string()))
        );
        assert_eq!(
            Predicate::select("8o", false),
            Some(Predicate::NameEquals("8o".to_string()))
        );
        assert_eq!(
            Predicate::select("", false),
            Some(Predicate::NameEquals(String::new()))
        );
        assert_eq!(
            Predicate::select("-80", true),
            Some(Predicate::NameContains("-80".to_string()))
        );
    }

    #[test]
    fn test_merge_joins_protocols_in_encounter_order() {
        let merged = merge_protocols(vec![
            PortRecord::new("domain", 53, "udp", "Domain Name Server"),
            PortRecord::new("domain", 53, "tcp", "Domain Name Server"),
            PortRecord::new("domain", 53, "sctp", "Domain Name Server"),
        ]);

        assert_eq!(merged, vec![PortRecord::new("domain", 53, "udp, tcp, sctp", "Domain Name Server")]);
    }

    #[test]
    fn test_merge_keeps_repeated_protocols() {
        let merged = merge_protocols(vec![
            PortRecord::new("echo", 7, "tcp", "Echo"),
            PortRecord::new("echo", 7, "tcp", "Echo"),
        ]);

        assert_eq!(merged.len(), 1);
        assert_eq!(merged[0].protocol, "tcp, tcp");
    }

    #[test]
    fn test_merge_is_identity_on_unique_records() {
        let unique = vec![
            PortRecord::new("https", 443, "tcp", "http protocol over TLS/SSL"),
            PortRecord::new("http", 80, "tcp", HTTP_DESC),
            PortRecord::new("http", 80, "udp", "different description"),
            PortRecord::new("http", 8008, "tcp", HTTP_DESC),
        ];

        assert_eq!(merge_protocols(unique.clone()), unique);
    }

    #[test]
    fn test_merge_does_not_share_state_between_calls() {
        let first = merge_protocols(vec![PortRecord::new("http", 80, "tcp", HTTP_DESC)]);
        let second = merge_protocols(vec![PortRecord::new("http", 80, "udp", HTTP_DESC)]);

        assert_eq!(first[0].protocol, "tcp");
        assert_eq!(second[0].protocol, "udp");
    }

    #[test]
    fn test_lookup_merges_tcp_and_udp() {
        let db = test_db(&web_records());

        let records = lookup(&db, "http", false).unwrap();
        assert_eq!(records, vec![PortRecord::new("http", 80, "tcp, udp", HTTP_DESC)]);
    }

    #[test]
    fn test_lookup_digit_key_searches_port_not_name() {
        let db = test_db(&[
            PortRecord::new("80", 9999, "tcp", "named eighty"),
            PortRecord::new("http", 80, "tcp", HTTP_DESC),
        ]);

        let records = lookup(&db, "80", false).unwrap();
        assert_eq!(records, vec![PortRecord::new("http", 80, "tcp", HTTP_DESC)]);
    }

    #[test]
    fn test_lookup_substring_mode() {
        let db = test_db(&web_records());

        let like: Vec<String> = lookup(&db, "http", true)
            .unwrap()
            .into_iter()
            .map(|r| r.name)
            .collect();
        assert_eq!(like, vec!["http", "https", "http-alt"]);

        let exact = lookup(&db, "http", false).unwrap();
        assert_eq!(exact.len(), 1);
        assert_eq!(exact[0].name, "http");
    }

    #[test]
    fn test_lookup_port_substring() {
        let db = test_db(&web_records());

        let ports: Vec<u16> = lookup(&db, "80", true)
            .unwrap()
            .into_iter()
            .map(|r| r.port)
            .collect();
        assert_eq!(ports, vec![80, 8080]);
    }

    #[test]
    fn test_lookup_no_match_is_empty() {
        let db = test_db(&web_records());

        assert!(lookup(&db, "nonexistent-service-zzz", false).unwrap().is_empty());
        assert!(lookup(&db, "99999", false).unwrap().is_empty());
    }

    #[test]
    fn test_lookup_does_not_lowercase_key() {
        let db = test_db(&web_records());

        assert!(lookup(&db, "HTTP", false).unwrap().is_empty());
    }

    #[test]
    fn test_lookup_on_empty_store() {
        let db = PortDb::open(":memory:").unwrap();

        assert!(lookup(&db, "http", true).unwrap().is_empty());
        assert!(lookup(&db, "80", false).unwrap().is_empty());
    }

    #[test]
    fn test_describe_is_case_insensitive() {
        let db = test_db(&[
            PortRecord::new("tcp", 0, "tcp", "Transmission Control Protocol"),
            PortRecord::new("http", 80, "tcp", HTTP_DESC),
        ]);

        let lower = describe(&db, "tcp").unwrap();
        assert_eq!(lower, "Transmission Control Protocol");
        assert_eq!(describe(&db, "TCP").unwrap(), lower);
    }

    #[test]
    fn test_describe_first_match_wins() {
        let db = test_db(&web_records());

        assert_eq!(describe(&db, "udp").unwrap(), HTTP_DESC);
    }

    #[test]
    fn test_describe_no_match_is_empty() {
        let db = test_db(&web_records());

        assert_eq!(describe(&db, "not-a-protocol").unwrap(), "");
    }
}
