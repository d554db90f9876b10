// Unit tests for topic metrics and sentiment.

use topicpulse::db::models::Item;
use topicpulse::metrics::{aggregate, items_for_topic, ranked, topic_words, EXCERPT_CHARS};
use topicpulse::sentiment::{LexiconSentiment, SentimentScorer};
use topicpulse::topics::label::FALLBACK_TOPIC;

fn labeled(id: &str, topic: Option<&str>, score: i64, replies: i64) -> Item {
    Item {
        topic: topic.map(str::to_string),
        score: Some(score),
        reply_count: Some(replies),
        ..Item::new(id, &format!("post {id} about gpu"))
    }
}

fn sample() -> Vec<Item> {
    vec![
        labeled("1", Some("gpu, performance"), 10, 2),
        labeled("2", Some("gpu"), 3, 1),
        labeled("3", Some("finetuning, lora, llama"), 20, 5),
        labeled("4", Some("lora"), 1, 0),
        labeled("5", None, 4, 4),
        labeled("6", Some(""), 2, 2),
    ]
}

// ============================================================
// Aggregation properties
// ============================================================

#[test]
fn total_items_equals_label_membership_count() {
    let items = sample();
    let metrics = aggregate(&items, &LexiconSentiment::default());

    for (word, metric) in &metrics {
        let expected = items
            .iter()
            .filter(|i| topic_words(i.topic.as_deref()).contains(word))
            .count();
        assert_eq!(metric.total_items, expected, "topic {word}");
        assert_eq!(items_for_topic(&items, word).len(), expected);
    }
}

#[test]
fn multi_topic_items_count_fully_toward_each_topic() {
    let metrics = aggregate(&sample(), &LexiconSentiment::default());

    assert_eq!(metrics["gpu"].total_score, 13);
    assert_eq!(metrics["gpu"].total_comments, 3);
    assert_eq!(metrics["performance"].total_score, 10);
    assert_eq!(metrics["performance"].total_comments, 2);
    assert_eq!(metrics["lora"].total_items, 2);
    assert_eq!(metrics["lora"].total_score, 21);
}

#[test]
fn missing_and_blank_labels_become_miscellaneous() {
    let metrics = aggregate(&sample(), &LexiconSentiment::default());
    let misc = &metrics[FALLBACK_TOPIC];
    assert_eq!(misc.total_items, 2);
    assert_eq!(misc.total_score, 6);
}

#[test]
fn aggregation_is_idempotent() {
    let items = sample();
    let scorer = LexiconSentiment::default();
    assert_eq!(aggregate(&items, &scorer), aggregate(&items, &scorer));
}

#[test]
fn ranked_puts_largest_topics_first() {
    let metrics = aggregate(&sample(), &LexiconSentiment::default());
    let order: Vec<&str> = ranked(&metrics).iter().map(|m| m.topic.as_str()).collect();
    assert_eq!(&order[..3], &["gpu", "lora", FALLBACK_TOPIC]);
}

#[test]
fn excerpt_is_capped() {
    let items: Vec<Item> = (0..20)
        .map(|i| labeled(&i.to_string(), Some("gpu"), 1, 1))
        .collect();
    let metrics = aggregate(&items, &LexiconSentiment::default());
    let excerpt = &metrics["gpu"].excerpt;
    assert!(excerpt.starts_with("post 0 about gpu post 1 about gpu"));
    assert!(excerpt.ends_with("..."));
    assert_eq!(excerpt.chars().count(), EXCERPT_CHARS + 3);
}

#[test]
fn huge_counts_saturate_instead_of_overflowing() {
    let big = i64::MAX / 2 + 1;
    let items = vec![labeled("a", Some("gpu"), big, big), labeled("b", Some("gpu"), big, big)];
    let metrics = aggregate(&items, &LexiconSentiment::default());

    assert_eq!(metrics["gpu"].total_items, 2);
    assert_eq!(metrics["gpu"].total_score, i64::MAX);
    assert_eq!(metrics["gpu"].total_comments, i64::MAX);
}

#[test]
fn negative_extremes_saturate_at_the_floor() {
    let items = vec![
        labeled("a", Some("gpu"), i64::MIN, 0),
        labeled("b", Some("gpu"), -1, 0),
    ];
    let metrics = aggregate(&items, &LexiconSentiment::default());
    assert_eq!(metrics["gpu"].total_score, i64::MIN);
}

// ============================================================
// Sentiment
// ============================================================

#[test]
fn sentiment_is_bounded_and_neutral_on_empty() {
    let scorer = LexiconSentiment::default();
    assert_eq!(scorer.polarity("").unwrap(), 0.0);
    for text in [
        "This is the best, most amazing, perfect GPU ever",
        "Awful, horrible, terrible drivers. Worst purchase.",
        "not bad at all",
    ] {
        let p = scorer.polarity(text).unwrap();
        assert!((-1.0..=1.0).contains(&p), "{text}: {p}");
    }
}

#[test]
fn average_sentiment_is_mean_of_items() {
    let items = vec![
        Item {
            topic: Some("gpu".to_string()),
            ..Item::new("a", "great card")
        },
        Item {
            topic: Some("gpu".to_string()),
            ..Item::new("b", "bad drivers")
        },
        Item {
            topic: Some("gpu".to_string()),
            ..Item::new("c", "just a card")
        },
    ];
    let metrics = aggregate(&items, &LexiconSentiment::default());
    // (0.8 + -0.7 + 0.0) / 3
    assert!((metrics["gpu"].average_sentiment - 0.1 / 3.0).abs() < 1e-10);
}
