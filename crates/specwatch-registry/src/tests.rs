//! # Integration Tests for the Registry
//!
//! Exercises the endpoint registry and version store together the way the
//! scanner and the subscription front-end use them.

use crate::digest::digest;
use crate::models::{Unsubscribed, DEFAULT_RETENTION_LIMIT};
use crate::storage::Database;
use serde_json::json;

const URL: &str = "https://petstore.example.com/openapi.json";

// =============================================================================
// Scan Cycle
// =============================================================================

#[test]
fn test_scan_cycle_records_digest_and_snapshot() {
    let db = Database::temporary().unwrap();
    let registry = db.endpoint_registry();
    let versions = db.version_store();

    let endpoint = registry.subscribe(URL, "C1").unwrap();
    assert!(endpoint.is_first_fetch());

    let document = json!({"a": 1});
    let d = digest(&document);
    versions.store(endpoint.id, d.clone(), document.clone()).unwrap();
    registry.update_digest(endpoint.id, &d).unwrap();

    let enabled = registry.list_enabled().unwrap();
    assert_eq!(enabled.len(), 1);
    assert_eq!(enabled[0].last_digest.as_ref(), Some(&d));
    assert!(!enabled[0].is_first_fetch());

    let latest = versions.latest(endpoint.id).unwrap().unwrap();
    assert_eq!(latest.document, document);
    assert_eq!(latest.digest, d);
}

#[test]
fn test_retention_bound_after_many_cycles() {
    let db = Database::temporary().unwrap();
    let registry = db.endpoint_registry();
    let versions = db.version_store();
    let endpoint = registry.subscribe(URL, "C1").unwrap();

    let mut last = None;
    for n in 0..(DEFAULT_RETENTION_LIMIT + 7) {
        let document = json!({ "info": { "version": format!("1.0.{n}") } });
        let snapshot = versions.store(endpoint.id, digest(&document), document).unwrap();
        versions.enforce_retention(endpoint.id, DEFAULT_RETENTION_LIMIT).unwrap();
        assert!(versions.count(endpoint.id).unwrap() <= DEFAULT_RETENTION_LIMIT);
        last = Some(snapshot);
    }

    let history = versions.history(endpoint.id).unwrap();
    assert_eq!(history.len(), DEFAULT_RETENTION_LIMIT);
    assert_eq!(history.first().unwrap().document["info"]["version"], "1.0.7");
    assert_eq!(history.last().unwrap().id, last.unwrap().id);
}

// =============================================================================
// Subscription Lifecycle
// =============================================================================

#[test]
fn test_last_unsubscribe_cascades_to_history() {
    let db = Database::temporary().unwrap();
    let registry = db.endpoint_registry();
    let versions = db.version_store();

    let endpoint = registry.subscribe(URL, "C1").unwrap();
    let document = json!({"paths": {}});
    versions.store(endpoint.id, digest(&document), document).unwrap();

    let outcome = registry.unsubscribe(URL, "C1").unwrap();
    let Unsubscribed::EndpointDeleted(id) = outcome else {
        panic!("expected endpoint deletion, got {outcome:?}");
    };
    assert_eq!(versions.delete_all(id).unwrap(), 1);

    assert!(registry.is_empty());
    assert!(versions.latest(id).unwrap().is_none());
}

#[test]
fn test_endpoint_never_persisted_without_channels() {
    let db = Database::temporary().unwrap();
    let registry = db.endpoint_registry();

    registry.subscribe(URL, "C1").unwrap();
    registry.subscribe(URL, "C2").unwrap();
    registry.unsubscribe(URL, "C1").unwrap();
    registry.unsubscribe(URL, "C2").unwrap();

    assert!(registry.list_all().unwrap().iter().all(|e| !e.channels.is_empty()));
    assert!(registry.find_by_url(URL).unwrap().is_none());
}
