// src/core/tests/agent_tests.rs

use chrono::NaiveDate;

use super::fakes::{self, FakeModel, FakeSearch, LONG_CLAIM};
use crate::config::ModelEndpoint;
use crate::core::agent::{clean_candidate, extract_reply, extract_search_query};
use crate::core::prompt::{reply_budget, PromptComposer};
use crate::error::BotError;
use crate::models::{EvidenceResult, ModelRequest, Role};

const TASK: &str = "If the claim is false, explain why in one tweet. Otherwise answer 0.";

fn evidence() -> Vec<EvidenceResult> {
    vec![
        EvidenceResult {
            title: "Bitcoin price today".to_string(),
            link: "https://example.com/btc".to_string(),
            snippet: "BTC trades at 61,000 USD.".to_string(),
        },
        EvidenceResult {
            title: "Crypto markets".to_string(),
            link: "https://example.com/markets".to_string(),
            snippet: "Markets were flat on Tuesday.".to_string(),
        },
    ]
}

#[test]
fn test_sentinel_zero_means_no_reply() {
    assert_eq!(extract_reply(&["0".to_string()]), "");
    assert_eq!(extract_reply(&["  0 - the claim is accurate".to_string()]), "");
    assert_eq!(extract_reply(&[]), "");
}

#[test]
fn test_clean_candidate_strips_quotes_and_trailing_sentinel() {
    assert_eq!(
        clean_candidate("\"Actually false.\"").as_deref(),
        Some("Actually false.")
    );
    assert_eq!(
        clean_candidate("\u{201C}The vaccine does not contain microchips.\u{201D}").as_deref(),
        Some("The vaccine does not contain microchips.")
    );
    assert_eq!(
        clean_candidate("The moon landing happened in 1969. 0").as_deref(),
        Some("The moon landing happened in 1969.")
    );
    assert_eq!(
        clean_candidate("This claim is simply misleading\".").as_deref(),
        Some("This claim is simply misleading")
    );
}

#[test]
fn test_clean_candidate_keeps_numbers_ending_in_zero() {
    assert_eq!(
        clean_candidate("Wrong: the real figure is 10.").as_deref(),
        Some("Wrong: the real figure is 10.")
    );
    assert_eq!(
        clean_candidate("The population is about 8,000,000,000").as_deref(),
        Some("The population is about 8,000,000,000")
    );
}

#[test]
fn test_short_candidates_are_dropped() {
    assert_eq!(clean_candidate("ok0."), None);
    assert_eq!(clean_candidate("\"False\""), None);
    assert_eq!(clean_candidate("   "), None);
}

#[test]
fn test_extract_reply_takes_first_usable_choice() {
    let choices = vec![
        "0".to_string(),
        "nope".to_string(),
        "This is the real answer to the claim.".to_string(),
        "A later answer that should be ignored.".to_string(),
    ];
    assert_eq!(extract_reply(&choices), "This is the real answer to the claim.");
}

#[test]
fn test_extract_search_query() {
    let choices = vec![
        "I think this is false.".to_string(),
        "QSTART  bitcoin price\n QEND".to_string(),
    ];
    assert_eq!(extract_search_query(&choices).as_deref(), Some("bitcoin price"));
    assert_eq!(extract_search_query(&["QSTART   QEND".to_string()]), None);
    assert_eq!(extract_search_query(&["plain answer".to_string()]), None);
}

#[test]
fn test_reply_budget_shrinks_to_floor() {
    assert_eq!(reply_budget(0), 250);
    assert_eq!(reply_budget(1), 210);
    assert_eq!(reply_budget(3), 130);
    assert_eq!(reply_budget(4), 100);
    assert_eq!(reply_budget(9), 100);
}

#[test]
fn test_composer_chat_turns() {
    let composer = PromptComposer::new("debunk", "@pleasedebunk", ModelEndpoint::Chat, false);
    let today = NaiveDate::from_ymd_opt(2024, 3, 5).unwrap();

    let ModelRequest::Chat(turns) = composer.compose_on(today, LONG_CLAIM, TASK, None, 0) else {
        panic!("Chat endpoint should produce chat turns");
    };
    assert_eq!(turns.len(), 2);
    assert_eq!(turns[0].role, Role::System);
    assert!(turns[0].content.starts_with("Today is March 5, 2024."));
    assert!(turns[0].content.contains("debunk (@pleasedebunk)"));

    assert_eq!(turns[1].role, Role::User);
    assert!(turns[1].content.contains(LONG_CLAIM));
    assert!(turns[1].content.ends_with(TASK));
    assert!(!turns[1].content.contains("QSTART"), "Search is not offered when unavailable");
}

#[test]
fn test_composer_offers_search_only_without_evidence() {
    let composer = fakes::composer(true);

    let first = composer.compose_retry(LONG_CLAIM, TASK, None, 0).text();
    assert!(first.contains("QSTART"));
    assert!(first.contains("QEND"));

    let results = evidence();
    let second = composer.compose_retry(LONG_CLAIM, TASK, Some(results.as_slice()), 0).text();
    assert!(!second.contains("QSTART"));
    assert!(second.contains("Web search results:"));
    assert!(second.contains("https://example.com/btc"));

    let empty = composer.compose_retry(LONG_CLAIM, TASK, Some(&[] as &[EvidenceResult]), 0).text();
    assert!(empty.contains("found nothing useful"));
    assert!(empty.contains("[]"));
}

#[test]
fn test_composer_completion_prompt_and_retry_budget() {
    let composer = PromptComposer::new("debunk", "pleasedebunk", ModelEndpoint::Completions, false);

    let ModelRequest::Completion(prompt) = composer.compose_retry(LONG_CLAIM, TASK, None, 2) else {
        panic!("Completions endpoint should produce a single prompt");
    };
    assert!(prompt.starts_with("Today is "));
    assert!(prompt.contains(LONG_CLAIM));
    assert!(prompt.contains("Keep it under 170 characters."));
}

#[tokio::test]
async fn test_answer_without_marker_skips_search() {
    let model = FakeModel::answering("False. The wall is not visible from the moon.");
    let search = FakeSearch::returning(evidence());
    let agent = fakes::agent(model.clone(), Some(search.clone()));

    let reply = agent.resolve(LONG_CLAIM, TASK, 0).await.unwrap();

    assert_eq!(reply, "False. The wall is not visible from the moon.");
    assert_eq!(model.calls(), 1);
    assert!(search.queries().is_empty());
}

#[tokio::test]
async fn test_marker_triggers_one_search_and_second_call() {
    let model = FakeModel::scripted(
        vec![Ok(vec!["QSTART bitcoin price QEND".to_string()])],
        "False. Bitcoin trades near 61,000 USD today.",
    );
    let search = FakeSearch::returning(evidence());
    let agent = fakes::agent(model.clone(), Some(search.clone()));

    let reply = agent.resolve("Bitcoin just hit 200k", TASK, 0).await.unwrap();

    assert_eq!(reply, "False. Bitcoin trades near 61,000 USD today.");
    assert_eq!(search.queries(), vec![("bitcoin price".to_string(), 3)]);
    assert_eq!(model.calls(), 2);

    let second = model.request(1).text();
    assert!(second.contains("Web search results:"));
    assert!(second.contains("BTC trades at 61,000 USD."));
    assert!(!second.contains("do not answer yet"));
}

#[tokio::test]
async fn test_search_failure_continues_with_empty_evidence() {
    let model = FakeModel::scripted(
        vec![Ok(vec!["QSTART election results QEND".to_string()])],
        "0",
    );
    let search = FakeSearch::failing();
    let agent = fakes::agent(model.clone(), Some(search.clone()));

    let reply = agent.resolve(LONG_CLAIM, TASK, 0).await.unwrap();

    assert_eq!(reply, "");
    assert_eq!(search.queries().len(), 1);
    assert_eq!(model.calls(), 2);
    let second = model.request(1).text();
    assert!(second.contains("Web search results:"));
    assert!(second.contains("[]"));
}

#[tokio::test]
async fn test_repeated_marker_is_not_a_reply() {
    let model = FakeModel::scripted(
        vec![
            Ok(vec!["QSTART first query QEND".to_string()]),
            Ok(vec!["QSTART second query QEND".to_string()]),
        ],
        "unused fallback answer",
    );
    let search = FakeSearch::returning(evidence());
    let agent = fakes::agent(model.clone(), Some(search.clone()));

    let reply = agent.resolve(LONG_CLAIM, TASK, 0).await.unwrap();

    assert_eq!(reply, "");
    assert_eq!(model.calls(), 2, "Only one evidence round per attempt");
    assert_eq!(search.queries().len(), 1);
}

#[tokio::test]
async fn test_retry_attempt_shrinks_budget_and_evidence() {
    let model = FakeModel::scripted(
        vec![Ok(vec!["QSTART great wall visibility QEND".to_string()])],
        "False. Astronauts cannot see the wall from the moon.",
    );
    let search = FakeSearch::returning(evidence());
    let agent = fakes::agent(model.clone(), Some(search.clone()));

    assert_eq!(agent.evidence_limit_for(0), 3);
    assert_eq!(agent.evidence_limit_for(2), 1);
    assert_eq!(agent.evidence_limit_for(7), 1);

    agent.resolve(LONG_CLAIM, TASK, 2).await.unwrap();

    assert_eq!(search.queries(), vec![("great wall visibility".to_string(), 1)]);
    assert!(model.request(0).text().contains("Keep it under 170 characters."));
    assert!(model.request(1).text().contains("Keep it under 170 characters."));
}

#[tokio::test]
async fn test_model_failure_propagates() {
    let model = FakeModel::scripted(
        vec![Err(BotError::ModelRequestFailed("503 from upstream".to_string()))],
        "unused",
    );
    let agent = fakes::agent(model.clone(), None);

    let result = agent.resolve(LONG_CLAIM, TASK, 0).await;

    assert!(matches!(result, Err(BotError::ModelRequestFailed(_))));
}
