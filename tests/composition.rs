// Composition tests — the full pipeline over an in-memory item store.
//
// These tests exercise the data flow between modules:
//   Items -> Documents -> Embeddings -> Reduced -> Clusters -> Labels -> Metrics
// with the deterministic hashing embedder, so no model files or network
// access are needed.

use std::collections::BTreeMap;
use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;

use topicpulse::db::models::Item;
use topicpulse::db::Database;
use topicpulse::metrics::{self, topic_words};
use topicpulse::pipeline::{PipelineError, PipelineSettings, RunOutcome, TopicPipeline};
use topicpulse::sentiment::LexiconSentiment;
use topicpulse::topics::hashing::HashingEmbedder;
use topicpulse::topics::label::FALLBACK_TOPIC;
use topicpulse::topics::traits::EmbeddingProvider;

fn item(id: &str, title: &str, body: &str, score: i64) -> Item {
    Item {
        body: Some(body.to_string()),
        score: Some(score),
        reply_count: Some(1),
        ..Item::new(id, title)
    }
}

/// Two fine-tuning posts with identical normalized text and three hardware
/// posts that share most of their vocabulary.
fn scenario_items() -> Vec<Item> {
    vec![
        item("ft-1", "Fine-tuning LLaMA with LoRA adapters", "Fine-tuning QLoRA quantization", 10),
        item("hw-1", "GPU VRAM bandwidth", "hardware overheating", 5),
        item("ft-2", "Fine-tuning LLaMA with LoRA adapters", "Fine-tuning QLoRA quantization", 20),
        item("hw-2", "GPU VRAM bandwidth", "hardware benchmarks", 5),
        item("hw-3", "GPU VRAM bandwidth", "hardware watercooling", 5),
    ]
}

async fn store_with(items: &[Item]) -> Arc<dyn Database> {
    let db = topicpulse::db::in_memory().unwrap();
    db.insert_items(items).await.unwrap();
    db
}

async fn labels_by_id(db: &Arc<dyn Database>) -> BTreeMap<String, Option<String>> {
    db.get_all_items()
        .await
        .unwrap()
        .into_iter()
        .map(|i| (i.id, i.topic))
        .collect()
}

// ============================================================
// End-to-end scenario
// ============================================================

#[tokio::test]
async fn finetuning_items_cluster_and_aggregate_together() {
    let db = store_with(&scenario_items()).await;
    let embedder = HashingEmbedder::default();
    let sentiment = LexiconSentiment::default();
    let pipeline = TopicPipeline::new(db.clone(), &embedder, &sentiment, PipelineSettings::default());

    let run = pipeline.run_topic_modeling(None, None).await.unwrap();
    assert_eq!(run.outcome, RunOutcome::Clustered);
    assert_eq!(run.items_read, 5);
    assert_eq!(run.documents, 5);

    let labels = labels_by_id(&db).await;
    let ft1 = labels["ft-1"].clone().unwrap();
    let ft2 = labels["ft-2"].clone().unwrap();
    assert_eq!(ft1, ft2, "fine-tuning items should share a label");
    assert!(topic_words(Some(&ft1)).contains(&"finetuning".to_string()), "label was {ft1}");

    for id in ["hw-1", "hw-2", "hw-3"] {
        let label = labels[id].clone().unwrap();
        assert!(!label.contains("finetuning"), "{id} got {label}");
    }

    let finetuning = &run.metrics["finetuning"];
    assert_eq!(finetuning.total_items, 2);
    assert_eq!(finetuning.total_score, 30);
    assert_eq!(finetuning.total_comments, 2);
}

#[tokio::test]
async fn labels_match_by_id_regardless_of_input_order() {
    let embedder = HashingEmbedder::default();
    let sentiment = LexiconSentiment::default();

    let forward = store_with(&scenario_items()).await;
    TopicPipeline::new(forward.clone(), &embedder, &sentiment, PipelineSettings::default())
        .run_topic_modeling(None, None)
        .await
        .unwrap();

    let mut reversed_items = scenario_items();
    reversed_items.reverse();
    let reversed = store_with(&reversed_items).await;
    TopicPipeline::new(reversed.clone(), &embedder, &sentiment, PipelineSettings::default())
        .run_topic_modeling(None, None)
        .await
        .unwrap();

    assert_eq!(labels_by_id(&forward).await, labels_by_id(&reversed).await);
}

#[tokio::test]
async fn rerunning_relabels_without_duplicating_rows() {
    let db = store_with(&scenario_items()).await;
    let embedder = HashingEmbedder::default();
    let sentiment = LexiconSentiment::default();
    let pipeline = TopicPipeline::new(db.clone(), &embedder, &sentiment, PipelineSettings::default());

    pipeline.run_topic_modeling(None, None).await.unwrap();
    let first = labels_by_id(&db).await;

    // Ingestion reloads the same batch, then the pipeline runs again
    db.insert_items(&scenario_items()).await.unwrap();
    pipeline.run_topic_modeling(None, None).await.unwrap();

    assert_eq!(db.item_counts().await.unwrap().total, 5);
    assert_eq!(labels_by_id(&db).await, first);
}

// ============================================================
// Empty corpus and fallbacks
// ============================================================

#[tokio::test]
async fn empty_corpus_reports_error_and_leaves_labels_alone() {
    let items = vec![
        Item {
            topic: Some("gpu".to_string()),
            ..Item::new("a", "GPUs")
        },
        Item::new("b", "LoRA"),
    ];
    let db = store_with(&items).await;
    let embedder = HashingEmbedder::default();
    let sentiment = LexiconSentiment::default();
    let pipeline = TopicPipeline::new(db.clone(), &embedder, &sentiment, PipelineSettings::default());

    let err = pipeline.run_topic_modeling(None, None).await.unwrap_err();
    assert!(matches!(err, PipelineError::EmptyCorpus { items: 2 }), "got {err}");

    let labels = labels_by_id(&db).await;
    assert_eq!(labels["a"].as_deref(), Some("gpu"));
    assert_eq!(labels["b"], None);
}

#[tokio::test]
async fn excluded_items_aggregate_as_miscellaneous() {
    let mut items = scenario_items();
    items.push(item("short", "GPU", "", 7));
    let db = store_with(&items).await;
    let embedder = HashingEmbedder::default();
    let sentiment = LexiconSentiment::default();
    let pipeline = TopicPipeline::new(db.clone(), &embedder, &sentiment, PipelineSettings::default());

    let run = pipeline.run_topic_modeling(None, None).await.unwrap();
    assert_eq!(run.excluded, vec!["short".to_string()]);
    assert_eq!(labels_by_id(&db).await["short"], None);

    let misc = &run.metrics[FALLBACK_TOPIC];
    assert!(misc.total_items >= 1);
    assert!(misc.total_score >= 7);
}

#[tokio::test]
async fn no_dense_region_falls_back_to_miscellaneous() {
    let items = vec![
        item("a", "GPU VRAM bandwidth", "", 1),
        item("b", "LoRA QLoRA adapters", "", 2),
    ];
    let db = store_with(&items).await;
    let embedder = HashingEmbedder::default();
    let sentiment = LexiconSentiment::default();
    let pipeline = TopicPipeline::new(db.clone(), &embedder, &sentiment, PipelineSettings::default());

    let run = pipeline.run_topic_modeling(None, None).await.unwrap();
    assert_eq!(run.outcome, RunOutcome::Degenerate);
    assert_eq!(run.cluster_count(), 0);

    let labels = labels_by_id(&db).await;
    assert!(labels.values().all(|l| l.as_deref() == Some(FALLBACK_TOPIC)));
    assert_eq!(run.metrics[FALLBACK_TOPIC].total_items, 2);
    assert_eq!(run.metrics[FALLBACK_TOPIC].total_score, 3);
}

#[tokio::test]
async fn corpus_selector_and_limit_restrict_the_run() {
    let mut items = scenario_items();
    for it in items.iter_mut() {
        it.source = Some(if it.id.starts_with("ft") { "ml" } else { "hardware" }.to_string());
    }
    let db = store_with(&items).await;
    let embedder = HashingEmbedder::default();
    let sentiment = LexiconSentiment::default();
    let pipeline = TopicPipeline::new(db.clone(), &embedder, &sentiment, PipelineSettings::default());

    let run = pipeline.run_topic_modeling(Some("hardware"), Some(2)).await.unwrap();
    assert_eq!(run.items_read, 2);

    let labels = labels_by_id(&db).await;
    assert_eq!(labels["ft-1"], None);
    assert_eq!(labels["ft-2"], None);
}

// ============================================================
// Aggregation over the store
// ============================================================

#[tokio::test]
async fn aggregation_is_idempotent_and_fans_out() {
    let items = vec![
        Item {
            topic: Some("gpu, performance".to_string()),
            score: Some(10),
            reply_count: Some(4),
            ..Item::new("a", "Great GPU")
        },
        Item {
            topic: Some("gpu".to_string()),
            score: Some(1),
            reply_count: None,
            ..Item::new("b", "Terrible GPU")
        },
    ];
    let db = store_with(&items).await;
    let sentiment = LexiconSentiment::default();

    let first = metrics::aggregate(&db.get_all_items().await.unwrap(), &sentiment);
    let second = metrics::aggregate(&db.get_all_items().await.unwrap(), &sentiment);
    assert_eq!(first, second);

    assert_eq!(first["gpu"].total_items, 2);
    assert_eq!(first["gpu"].total_score, 11);
    assert_eq!(first["gpu"].total_comments, 4);
    assert_eq!(first["performance"].total_items, 1);
    assert_eq!(first["performance"].total_score, 10);
    assert_eq!(first["performance"].total_comments, 4);

    // (0.8 + -1.0) / 2
    assert!((first["gpu"].average_sentiment + 0.1).abs() < 1e-10);
    assert!((first["performance"].average_sentiment - 0.8).abs() < 1e-10);
}

// ============================================================
// Run guard
// ============================================================

/// Yields once before embedding so a second run can observe the guard.
struct YieldingEmbedder(HashingEmbedder);

#[async_trait]
impl EmbeddingProvider for YieldingEmbedder {
    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f64>>> {
        tokio::task::yield_now().await;
        self.0.embed(texts).await
    }

    fn dimension(&self) -> usize {
        self.0.dimension()
    }

    fn name(&self) -> &str {
        "yielding"
    }
}

#[tokio::test]
async fn concurrent_run_is_rejected() {
    let db = store_with(&scenario_items()).await;
    let embedder = YieldingEmbedder(HashingEmbedder::default());
    let sentiment = LexiconSentiment::default();
    let pipeline = TopicPipeline::new(db.clone(), &embedder, &sentiment, PipelineSettings::default());

    let (first, second) = tokio::join!(
        pipeline.run_topic_modeling(None, None),
        pipeline.run_topic_modeling(None, None)
    );
    assert!(first.is_ok());
    assert!(matches!(second, Err(PipelineError::RunInProgress)));
    assert!(!pipeline.is_running());
}
