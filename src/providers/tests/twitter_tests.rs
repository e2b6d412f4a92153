// src/providers/tests/twitter_tests.rs

use super::super::twitter::{candidates_from_response, TweetsResponse};
use crate::models::Source;

fn parse(body: &str) -> TweetsResponse {
    serde_json::from_str(body).expect("fixture should parse")
}

#[test]
fn test_mention_resolves_replied_to_parent() {
    let response = parse(
        r#"{
            "data": [{
                "id": "1800000000000000002",
                "text": "@pleasedebunk is this true?",
                "author_id": "42",
                "created_at": "2024-06-10T12:00:00.000Z",
                "public_metrics": {"impression_count": 3, "reply_count": 0},
                "referenced_tweets": [
                    {"type": "quoted", "id": "1700000000000000000"},
                    {"type": "replied_to", "id": "1800000000000000001"}
                ]
            }],
            "includes": {
                "tweets": [{
                    "id": "1800000000000000001",
                    "text": "Drinking bleach cures the flu, doctors hate this.",
                    "author_id": "43",
                    "public_metrics": {"impression_count": 12000, "reply_count": 7}
                }]
            }
        }"#,
    );

    let items = candidates_from_response(response);

    assert_eq!(items.len(), 1);
    let item = &items[0];
    assert_eq!(item.id, "1800000000000000002");
    assert_eq!(item.author_id.as_deref(), Some("42"));
    assert!(item.created_at.is_some());

    let parent = item.referenced.as_ref().expect("parent should be resolved");
    assert_eq!(parent.id, "1800000000000000001");
    assert_eq!(parent.author_id.as_deref(), Some("43"));
    assert_eq!(item.claim_text(Source::Mention), "Drinking bleach cures the flu, doctors hate this.");
    assert_eq!(item.claim_metrics(Source::Mention).and_then(|m| m.impression_count), Some(12000));

    // Found by search, the same post is judged on its own text
    assert_eq!(item.claim_text(Source::Search), "@pleasedebunk is this true?");
    assert_eq!(item.claim_metrics(Source::Search).and_then(|m| m.impression_count), Some(3));
}

#[test]
fn test_quote_is_used_when_there_is_no_reply_parent() {
    let response = parse(
        r#"{
            "data": [{
                "id": "20",
                "text": "@pleasedebunk check this",
                "referenced_tweets": [{"type": "quoted", "id": "19"}]
            }],
            "includes": {"tweets": [{"id": "19", "text": "The moon is made of cheese."}]}
        }"#,
    );

    let items = candidates_from_response(response);

    assert_eq!(items[0].claim_text(Source::Mention), "The moon is made of cheese.");
}

#[test]
fn test_missing_parent_keeps_empty_text() {
    let response = parse(
        r#"{
            "data": [{
                "id": "20",
                "text": "@pleasedebunk is this right?",
                "referenced_tweets": [{"type": "replied_to", "id": "19"}]
            }]
        }"#,
    );

    let items = candidates_from_response(response);

    let parent = items[0].referenced.as_ref().unwrap();
    assert_eq!(parent.id, "19");
    assert_eq!(parent.text, "");
    assert_eq!(items[0].claim_text(Source::Mention), "");
}

#[test]
fn test_plain_search_result_has_no_parent() {
    let response = parse(
        r#"{
            "data": [{
                "id": "30",
                "text": "5G towers spread viruses, wake up people.",
                "author_id": "44",
                "public_metrics": {"reply_count": 2}
            }],
            "meta": {"result_count": 1}
        }"#,
    );

    let items = candidates_from_response(response);

    assert!(items[0].referenced.is_none());
    assert_eq!(items[0].claim_text(Source::Search), "5G towers spread viruses, wake up people.");
    let metrics = items[0].metrics.as_ref().unwrap();
    assert_eq!(metrics.reply_count, Some(2));
    assert_eq!(metrics.impression_count, None);
}

#[test]
fn test_empty_timeline() {
    let response = parse(r#"{"meta": {"result_count": 0}}"#);
    assert!(candidates_from_response(response).is_empty());
}
