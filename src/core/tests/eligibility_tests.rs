// src/core/tests/eligibility_tests.rs

use super::fakes::{self, mention, post, BOT_HANDLE, BOT_ID, LONG_CLAIM};
use crate::config::{Config, SearchPolicy};
use crate::core::eligibility::{check, count_mentions, strip_mentions, EligibilityContext, Ineligible};
use crate::memory::CheckedIds;
use crate::models::{CandidateItem, Metrics, ReferencedItem, Source};

fn ctx<'a>(config: &'a Config, source: Source, checked: &'a CheckedIds) -> EligibilityContext<'a> {
    EligibilityContext::from_config(config, source, checked)
}

#[test]
fn test_strip_and_count_mentions() {
    let text = "@alice  @bob_99 the earth is flat @carol";
    assert_eq!(strip_mentions(text), "the earth is flat");
    assert_eq!(count_mentions(text), 3);
    assert_eq!(count_mentions("no handles here"), 0);
}

#[test]
fn test_eligible_mention() {
    let config = fakes::config();
    let checked = CheckedIds::new(500);
    let item = mention("20", "42", "43", LONG_CLAIM);

    assert_eq!(check(&item, &ctx(&config, Source::Mention, &checked)), Ok(()));
    // Pure: same answer on every call
    assert!(check(&item, &ctx(&config, Source::Mention, &checked)).is_ok());
    assert!(check(&item, &ctx(&config, Source::Mention, &checked)).is_ok());
}

#[test]
fn test_self_authored_is_rejected() {
    let config = fakes::config();
    let checked = CheckedIds::new(500);

    let own_mention = mention("20", BOT_ID, "43", LONG_CLAIM);
    assert_eq!(
        check(&own_mention, &ctx(&config, Source::Mention, &checked)),
        Err(Ineligible::SelfAuthored)
    );

    let own_parent = mention("21", "42", BOT_ID, LONG_CLAIM);
    assert_eq!(
        check(&own_parent, &ctx(&config, Source::Mention, &checked)),
        Err(Ineligible::SelfAuthored)
    );
}

#[test]
fn test_handle_in_parent_means_already_answered() {
    let config = fakes::config();
    let checked = CheckedIds::new(500);
    let parent = format!("{} cc @PleaseDebunk", LONG_CLAIM);
    let item = mention("20", "42", "43", &parent);

    assert_eq!(
        check(&item, &ctx(&config, Source::Mention, &checked)),
        Err(Ineligible::AlreadyAnswered)
    );
}

#[test]
fn test_bare_mention_is_judged_on_its_own_text() {
    let config = fakes::config();
    let checked = CheckedIds::new(500);
    let text = format!("@{} {}", BOT_HANDLE, LONG_CLAIM);
    let item = post("20", "42", &text);

    assert_eq!(check(&item, &ctx(&config, Source::Mention, &checked)), Ok(()));
    // The same text found by search already carries the handle
    assert_eq!(
        check(&item, &ctx(&config, Source::Search, &checked)),
        Err(Ineligible::AlreadyAnswered)
    );
}

#[test]
fn test_short_claim_is_rejected_after_stripping_mentions() {
    let config = fakes::config();
    let checked = CheckedIds::new(500);
    let padded = "@a_very_long_handle_one @another_long_handle_two short claim here";
    let item = mention("20", "42", "43", padded);

    assert_eq!(
        check(&item, &ctx(&config, Source::Mention, &checked)),
        Err(Ineligible::TooShort("short claim here".len()))
    );
}

#[test]
fn test_missing_parent_text_is_too_short() {
    let config = fakes::config();
    let checked = CheckedIds::new(500);
    let item = CandidateItem::new("20", format!("@{} true?", BOT_HANDLE))
        .with_author("42")
        .with_referenced(ReferencedItem {
            id: "19".to_string(),
            text: String::new(),
            author_id: None,
            metrics: None,
        });

    assert_eq!(
        check(&item, &ctx(&config, Source::Mention, &checked)),
        Err(Ineligible::TooShort(0))
    );
}

#[test]
fn test_over_mentioned_claim() {
    let config = fakes::config();
    let checked = CheckedIds::new(500);
    let crowded = format!("@a @b @c @d @e @f {}", LONG_CLAIM);
    let item = mention("20", "42", "43", &crowded);

    assert_eq!(
        check(&item, &ctx(&config, Source::Mention, &checked)),
        Err(Ineligible::OverMentioned(6))
    );

    let fine = format!("@a @b @c @d @e {}", LONG_CLAIM);
    let item = mention("21", "42", "43", &fine);
    assert_eq!(check(&item, &ctx(&config, Source::Mention, &checked)), Ok(()));
}

#[test]
fn test_impression_threshold() {
    let checked = CheckedIds::new(500);
    let quiet = post("30", "42", LONG_CLAIM).with_metrics(Metrics {
        impression_count: Some(99),
        reply_count: Some(0),
    });
    let unknown = post("31", "42", LONG_CLAIM);

    let mut config = fakes::config();
    assert_eq!(check(&quiet, &ctx(&config, Source::Search, &checked)), Ok(()));
    assert_eq!(check(&unknown, &ctx(&config, Source::Search, &checked)), Ok(()));

    config.impression_threshold = 100;
    assert_eq!(
        check(&quiet, &ctx(&config, Source::Search, &checked)),
        Err(Ineligible::LowReach(99))
    );
    assert_eq!(
        check(&unknown, &ctx(&config, Source::Search, &checked)),
        Err(Ineligible::LowReach(0))
    );

    config.impression_threshold = 99;
    assert_eq!(check(&quiet, &ctx(&config, Source::Search, &checked)), Ok(()));
}

#[test]
fn test_mention_threshold_uses_parent_metrics() {
    let mut config = fakes::config();
    config.impression_threshold = 1000;
    let checked = CheckedIds::new(500);

    let mut item = mention("20", "42", "43", LONG_CLAIM).with_metrics(Metrics {
        impression_count: Some(5),
        reply_count: None,
    });
    if let Some(parent) = item.referenced.as_mut() {
        parent.metrics = Some(Metrics {
            impression_count: Some(25_000),
            reply_count: None,
        });
    }

    assert_eq!(check(&item, &ctx(&config, Source::Mention, &checked)), Ok(()));
}

#[test]
fn test_checked_ids_are_skipped() {
    let config = fakes::config();
    let mut checked = CheckedIds::new(500);
    let item = post("30", "42", LONG_CLAIM);

    assert_eq!(check(&item, &ctx(&config, Source::Search, &checked)), Ok(()));
    checked.insert("30");
    assert_eq!(
        check(&item, &ctx(&config, Source::Search, &checked)),
        Err(Ineligible::AlreadyChecked)
    );
}

#[test]
fn test_search_policies() {
    let checked = CheckedIds::new(500);
    let reply = post("30", "42", &format!("@someone {}", LONG_CLAIM));
    let discussed = post("31", "42", LONG_CLAIM).with_metrics(Metrics {
        impression_count: None,
        reply_count: Some(4),
    });

    let mut config = fakes::config();
    config.search_policy = SearchPolicy::SkipReplies;
    assert_eq!(check(&reply, &ctx(&config, Source::Search, &checked)), Err(Ineligible::IsReply));
    assert_eq!(check(&discussed, &ctx(&config, Source::Search, &checked)), Ok(()));

    config.search_policy = SearchPolicy::SkipAnswered;
    assert_eq!(check(&reply, &ctx(&config, Source::Search, &checked)), Ok(()));
    assert_eq!(
        check(&discussed, &ctx(&config, Source::Search, &checked)),
        Err(Ineligible::HasReplies(4))
    );

    config.search_policy = SearchPolicy::Both;
    assert!(check(&reply, &ctx(&config, Source::Search, &checked)).is_err());
    assert!(check(&discussed, &ctx(&config, Source::Search, &checked)).is_err());

    config.search_policy = SearchPolicy::None;
    assert!(check(&reply, &ctx(&config, Source::Search, &checked)).is_ok());
    assert!(check(&discussed, &ctx(&config, Source::Search, &checked)).is_ok());
}

#[test]
fn test_search_policy_does_not_apply_to_mentions() {
    let mut config = fakes::config();
    config.search_policy = SearchPolicy::Both;
    let checked = CheckedIds::new(500);
    let item = mention("20", "42", "43", LONG_CLAIM).with_metrics(Metrics {
        impression_count: None,
        reply_count: Some(3),
    });

    assert_eq!(check(&item, &ctx(&config, Source::Mention, &checked)), Ok(()));
}

#[test]
fn test_search_hit_is_judged_on_its_own_text() {
    let config = fakes::config();
    let checked = CheckedIds::new(500);
    let parent = ReferencedItem {
        id: "29".to_string(),
        text: LONG_CLAIM.to_string(),
        author_id: Some("43".to_string()),
        metrics: None,
    };

    let short_quote = post("30", "42", "lol").with_referenced(parent.clone());
    assert_eq!(
        check(&short_quote, &ctx(&config, Source::Search, &checked)),
        Err(Ineligible::TooShort(3))
    );

    let long_quote = post("31", "42", LONG_CLAIM).with_referenced(ReferencedItem {
        text: "short".to_string(),
        ..parent.clone()
    });
    assert_eq!(check(&long_quote, &ctx(&config, Source::Search, &checked)), Ok(()));

    // The handle in the quoted post still means the thread was answered
    let answered = post("32", "42", LONG_CLAIM).with_referenced(ReferencedItem {
        text: format!("@{} {}", BOT_HANDLE, LONG_CLAIM),
        ..parent
    });
    assert_eq!(
        check(&answered, &ctx(&config, Source::Search, &checked)),
        Err(Ineligible::AlreadyAnswered)
    );
}

#[test]
fn test_search_hit_threshold_uses_own_metrics() {
    let mut config = fakes::config();
    config.impression_threshold = 1000;
    let checked = CheckedIds::new(500);
    let item = post("30", "42", LONG_CLAIM)
        .with_metrics(Metrics {
            impression_count: Some(5),
            reply_count: None,
        })
        .with_referenced(ReferencedItem {
            id: "29".to_string(),
            text: LONG_CLAIM.to_string(),
            author_id: None,
            metrics: Some(Metrics {
                impression_count: Some(25_000),
                reply_count: None,
            }),
        });

    assert_eq!(
        check(&item, &ctx(&config, Source::Search, &checked)),
        Err(Ineligible::LowReach(5))
    );
}
