// src/providers/tests/search_tests.rs

use super::super::search::{evidence_from_response, SearchResponse};

const FIXTURE: &str = r#"{
    "kind": "customsearch#search",
    "items": [
        {"title": "Great Wall myth", "link": "https://example.com/a", "snippet": "Not visible\nfrom the   moon."},
        {"title": "NASA answers", "link": "https://example.com/b", "snippet": "Astronauts report..."},
        {"title": "Travel guide", "link": "https://example.com/c"}
    ]
}"#;

#[test]
fn test_evidence_is_limited_and_cleaned() {
    let response: SearchResponse = serde_json::from_str(FIXTURE).unwrap();

    let evidence = evidence_from_response(response, 2);

    assert_eq!(evidence.len(), 2);
    assert_eq!(evidence[0].title, "Great Wall myth");
    assert_eq!(evidence[0].link, "https://example.com/a");
    assert_eq!(evidence[0].snippet, "Not visible from the moon.");
}

#[test]
fn test_missing_fields_default_to_empty() {
    let response: SearchResponse = serde_json::from_str(FIXTURE).unwrap();

    let evidence = evidence_from_response(response, 10);

    assert_eq!(evidence.len(), 3);
    assert_eq!(evidence[2].snippet, "");
}

#[test]
fn test_no_items() {
    let response: SearchResponse =
        serde_json::from_str(r#"{"searchInformation": {"totalResults": "0"}}"#).unwrap();
    assert!(evidence_from_response(response, 3).is_empty());
}
