// Topic metrics — per-topic engagement and sentiment.
//
// Always rederived from the current item rows; nothing here is persisted.
// A label like "gpu, performance" is split on commas and the item counts
// in full toward each topic word.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::db::models::Item;
use crate::output::truncate_chars;
use crate::sentiment::SentimentScorer;
use crate::topics::label::FALLBACK_TOPIC;

/// Excerpt length in characters before "..." is appended.
pub const EXCERPT_CHARS: usize = 150;

/// How many topics the summary shows by default.
pub const DEFAULT_TOP_TOPICS: usize = 15;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TopicMetric {
    pub topic: String,
    pub total_items: usize,
    pub total_score: i64,
    pub total_comments: i64,
    /// Mean polarity of the contributing items, in [-1, 1]
    pub average_sentiment: f64,
    pub excerpt: String,
}

#[derive(Default)]
struct Accumulator {
    items: usize,
    score: i64,
    comments: i64,
    sentiments: Vec<f64>,
    text: String,
    text_chars: usize,
}

impl Accumulator {
    fn add(&mut self, item: &Item, text: &str, sentiment: f64) {
        self.items += 1;
        // Imported counts are arbitrary i64s; pin at the bounds instead of wrapping
        self.score = self.score.saturating_add(item.score.unwrap_or(0));
        self.comments = self.comments.saturating_add(item.reply_count.unwrap_or(0));
        self.sentiments.push(sentiment);

        // Anything past the excerpt length would be cut anyway
        if self.text_chars <= EXCERPT_CHARS && !text.is_empty() {
            if !self.text.is_empty() {
                self.text.push(' ');
                self.text_chars += 1;
            }
            self.text.push_str(text);
            self.text_chars += text.chars().count();
        }
    }

    fn finish(self, topic: String) -> TopicMetric {
        let average_sentiment = if self.sentiments.is_empty() {
            0.0
        } else {
            self.sentiments.iter().sum::<f64>() / self.sentiments.len() as f64
        };
        TopicMetric {
            topic,
            total_items: self.items,
            total_score: self.score,
            total_comments: self.comments,
            average_sentiment,
            excerpt: truncate_chars(&self.text, EXCERPT_CHARS),
        }
    }
}

/// Split a topic label into its distinct topic words.
///
/// Missing or blank labels give `["miscellaneous"]`.
pub fn topic_words(label: Option<&str>) -> Vec<String> {
    let mut seen = BTreeSet::new();
    let words: Vec<String> = label
        .unwrap_or("")
        .split(',')
        .map(str::trim)
        .filter(|w| !w.is_empty())
        .filter(|w| seen.insert(w.to_string()))
        .map(str::to_string)
        .collect();

    if words.is_empty() {
        vec![FALLBACK_TOPIC.to_string()]
    } else {
        words
    }
}

/// Polarity of one item's combined text. Scorer faults are logged and
/// count as neutral so one bad item never sinks the batch.
pub fn item_sentiment(item: &Item, text: &str, scorer: &dyn SentimentScorer) -> f64 {
    if text.is_empty() {
        return 0.0;
    }
    match scorer.polarity(text) {
        Ok(p) if p.is_finite() => p.clamp(-1.0, 1.0),
        Ok(p) => {
            warn!(item = %item.id, scorer = scorer.name(), value = p, "Non-finite sentiment, using 0");
            0.0
        }
        Err(e) => {
            warn!(item = %item.id, scorer = scorer.name(), error = %e, "Sentiment failed, using 0");
            0.0
        }
    }
}

/// Aggregate every item into per-topic metrics, keyed by topic word.
pub fn aggregate(items: &[Item], scorer: &dyn SentimentScorer) -> BTreeMap<String, TopicMetric> {
    let mut acc: BTreeMap<String, Accumulator> = BTreeMap::new();

    for item in items {
        let text = item.combined_text();
        let sentiment = item_sentiment(item, &text, scorer);
        for word in topic_words(item.topic.as_deref()) {
            acc.entry(word).or_default().add(item, &text, sentiment);
        }
    }

    acc.into_iter()
        .map(|(topic, a)| (topic.clone(), a.finish(topic)))
        .collect()
}

/// Metrics ordered by item count (highest first), then topic name.
pub fn ranked(metrics: &BTreeMap<String, TopicMetric>) -> Vec<&TopicMetric> {
    let mut out: Vec<&TopicMetric> = metrics.values().collect();
    out.sort_by(|a, b| b.total_items.cmp(&a.total_items).then_with(|| a.topic.cmp(&b.topic)));
    out
}

/// Items whose label contains `word` as a whole topic word.
pub fn items_for_topic<'a>(items: &'a [Item], word: &str) -> Vec<&'a Item> {
    let word = word.trim();
    items
        .iter()
        .filter(|item| topic_words(item.topic.as_deref()).iter().any(|w| w == word))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sentiment::LexiconSentiment;

    fn item(id: &str, topic: Option<&str>, score: Option<i64>, replies: Option<i64>) -> Item {
        Item {
            topic: topic.map(str::to_string),
            score,
            reply_count: replies,
            ..Item::new(id, &format!("title {id}"))
        }
    }

    #[test]
    fn test_topic_words() {
        assert_eq!(topic_words(Some("gpu, performance")), vec!["gpu", "performance"]);
        assert_eq!(topic_words(Some(" gpu ,, gpu ")), vec!["gpu"]);
        assert_eq!(topic_words(Some("")), vec![FALLBACK_TOPIC]);
        assert_eq!(topic_words(Some(" , ")), vec![FALLBACK_TOPIC]);
        assert_eq!(topic_words(None), vec![FALLBACK_TOPIC]);
    }

    #[test]
    fn test_absent_numbers_count_as_zero() {
        let items = vec![
            item("a", Some("gpu"), Some(4), None),
            item("b", Some("gpu"), None, Some(3)),
        ];
        let metrics = aggregate(&items, &LexiconSentiment::default());
        let gpu = &metrics["gpu"];
        assert_eq!(gpu.total_items, 2);
        assert_eq!(gpu.total_score, 4);
        assert_eq!(gpu.total_comments, 3);
    }

    #[test]
    fn test_excerpt_truncated_with_ellipsis() {
        let long = "x".repeat(200);
        let items = vec![Item::new("a", &long)];
        let metrics = aggregate(&items, &LexiconSentiment::default());
        let excerpt = &metrics[FALLBACK_TOPIC].excerpt;
        assert_eq!(excerpt.chars().count(), EXCERPT_CHARS + 3);
        assert!(excerpt.ends_with("..."));
    }

    #[test]
    fn test_excerpt_joins_items() {
        let items = vec![Item::new("a", "first"), Item::new("b", "second")];
        let metrics = aggregate(&items, &LexiconSentiment::default());
        assert_eq!(metrics[FALLBACK_TOPIC].excerpt, "first second");
    }

    #[test]
    fn test_ranked_order() {
        let items = vec![
            item("a", Some("beta"), None, None),
            item("b", Some("alpha"), None, None),
            item("c", Some("gamma, beta"), None, None),
        ];
        let metrics = aggregate(&items, &LexiconSentiment::default());
        let order: Vec<&str> = ranked(&metrics).iter().map(|m| m.topic.as_str()).collect();
        assert_eq!(order, vec!["beta", "alpha", "gamma"]);
    }

    #[test]
    fn test_items_for_topic_is_exact() {
        let items = vec![
            item("a", Some("gpu, vram"), None, None),
            item("b", Some("gpus"), None, None),
            item("c", None, None, None),
        ];
        let ids: Vec<&str> = items_for_topic(&items, "gpu").iter().map(|i| i.id.as_str()).collect();
        assert_eq!(ids, vec!["a"]);
        assert_eq!(items_for_topic(&items, FALLBACK_TOPIC).len(), 1);
    }

    struct FailingScorer;

    impl SentimentScorer for FailingScorer {
        fn polarity(&self, _text: &str) -> anyhow::Result<f64> {
            anyhow::bail!("scorer offline")
        }

        fn name(&self) -> &str {
            "failing"
        }
    }

    #[test]
    fn test_sentiment_fault_defaults_to_zero() {
        let items = vec![item("a", Some("gpu"), Some(1), None)];
        let metrics = aggregate(&items, &FailingScorer);
        assert_eq!(metrics["gpu"].average_sentiment, 0.0);
        assert_eq!(metrics["gpu"].total_score, 1);
    }
}
