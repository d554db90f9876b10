// Topic modeling run: items in, labeled topics and per-topic metrics out.
//
// Stages run strictly forward:
//   Idle → Ingesting → Normalizing → Embedding → Reducing → Clustering
//        → Labeling → Aggregating → Done
// and any failure lands in Failed with a diagnostic. Labels are committed
// in one transaction after Labeling, so a failure anywhere from Embedding
// through Labeling writes nothing. Results are correlated back to items by
// id, never by position.

use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use super::error::PipelineError;
use crate::db::Database;
use crate::metrics::{self, TopicMetric};
use crate::sentiment::SentimentScorer;
use crate::topics::cluster::{ClusterEngine, NOISE};
use crate::topics::document::assemble;
use crate::topics::label::{TopicCluster, TopicLabeler, FALLBACK_TOPIC};
use crate::topics::normalize::TextNormalizer;
use crate::topics::reduce::DimensionReducer;
use crate::topics::traits::EmbeddingProvider;

/// Run state keys in the `run_state` table.
pub const STATE_LAST_STAGE: &str = "last_run_stage";
pub const STATE_LAST_RUN_AT: &str = "last_run_at";
pub const STATE_LAST_ERROR: &str = "last_run_error";

/// Tuning knobs for the reducer and cluster engine.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PipelineSettings {
    pub reduce_dims: usize,
    pub min_cluster_size: usize,
    pub min_samples: usize,
    pub seed: u64,
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self {
            reduce_dims: 5,
            min_cluster_size: 2,
            min_samples: 1,
            seed: 42,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunStage {
    Idle,
    Ingesting,
    Normalizing,
    Embedding,
    Reducing,
    Clustering,
    Labeling,
    Aggregating,
    Done,
    Failed,
}

impl RunStage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Ingesting => "ingesting",
            Self::Normalizing => "normalizing",
            Self::Embedding => "embedding",
            Self::Reducing => "reducing",
            Self::Clustering => "clustering",
            Self::Labeling => "labeling",
            Self::Aggregating => "aggregating",
            Self::Done => "done",
            Self::Failed => "failed",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        [
            Self::Idle,
            Self::Ingesting,
            Self::Normalizing,
            Self::Embedding,
            Self::Reducing,
            Self::Clustering,
            Self::Labeling,
            Self::Aggregating,
            Self::Done,
            Self::Failed,
        ]
        .into_iter()
        .find(|stage| stage.as_str() == s)
    }
}

impl fmt::Display for RunStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How clustering went. A degenerate run (only noise) still succeeds: every
/// clustered item is labeled "miscellaneous".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunOutcome {
    Clustered,
    Degenerate,
}

/// Everything a finished run produced.
#[derive(Debug, Clone, Serialize)]
pub struct TopicRun {
    pub outcome: RunOutcome,
    pub items_read: usize,
    pub documents: usize,
    /// Items too short to cluster; their labels were not touched
    pub excluded: Vec<String>,
    pub clusters: Vec<TopicCluster>,
    pub noise_points: usize,
    /// Item id to committed label
    pub labels: BTreeMap<String, String>,
    pub metrics: BTreeMap<String, TopicMetric>,
}

impl TopicRun {
    /// Number of real (non-noise) clusters.
    pub fn cluster_count(&self) -> usize {
        self.clusters.iter().filter(|c| c.cluster_id != NOISE).count()
    }
}

/// Clears the in-progress flag however the run ends.
struct RunGuard<'a>(&'a AtomicBool);

impl Drop for RunGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

/// The pipeline with its collaborators injected.
pub struct TopicPipeline<'a> {
    db: Arc<dyn Database>,
    embedder: &'a dyn EmbeddingProvider,
    sentiment: &'a dyn SentimentScorer,
    normalizer: TextNormalizer,
    settings: PipelineSettings,
    running: AtomicBool,
}

impl<'a> TopicPipeline<'a> {
    pub fn new(
        db: Arc<dyn Database>,
        embedder: &'a dyn EmbeddingProvider,
        sentiment: &'a dyn SentimentScorer,
        settings: PipelineSettings,
    ) -> Self {
        Self {
            db,
            embedder,
            sentiment,
            normalizer: TextNormalizer::default(),
            settings,
            running: AtomicBool::new(false),
        }
    }

    /// Swap in a different normalizer (e.g. a custom stop-word set).
    pub fn with_normalizer(mut self, normalizer: TextNormalizer) -> Self {
        self.normalizer = normalizer;
        self
    }

    pub fn settings(&self) -> &PipelineSettings {
        &self.settings
    }

    /// Whether a run is currently executing on this pipeline.
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    /// Run the whole pipeline over the items selected by `corpus` (matched
    /// on item source; `None` means every item), capped at `limit`.
    pub async fn run_topic_modeling(
        &self,
        corpus: Option<&str>,
        limit: Option<usize>,
    ) -> Result<TopicRun, PipelineError> {
        if self
            .running
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return Err(PipelineError::RunInProgress);
        }
        let _guard = RunGuard(&self.running);

        info!(
            corpus = corpus.unwrap_or("all"),
            limit = ?limit,
            embedder = self.embedder.name(),
            "Starting topic modeling run"
        );

        match self.execute(corpus, limit).await {
            Ok(run) => {
                self.finish(RunStage::Done, "").await?;
                info!(
                    stage = %RunStage::Done,
                    outcome = ?run.outcome,
                    clusters = run.cluster_count(),
                    topics = run.metrics.len(),
                    "Topic modeling run complete"
                );
                Ok(run)
            }
            Err(e) => {
                warn!(stage = %RunStage::Failed, kind = e.kind(), error = %e, "Topic modeling run failed");
                if let Err(state_err) = self.finish(RunStage::Failed, &e.to_string()).await {
                    warn!(error = %state_err, "Failed to record run failure");
                }
                Err(e)
            }
        }
    }

    async fn execute(&self, corpus: Option<&str>, limit: Option<usize>) -> Result<TopicRun, PipelineError> {
        // --- Ingesting ---
        self.enter(RunStage::Ingesting).await?;
        let items = self
            .db
            .get_items(corpus, limit)
            .await
            .map_err(PipelineError::Store)?;
        info!(stage = %RunStage::Ingesting, items = items.len(), "Items loaded");

        // --- Normalizing ---
        self.enter(RunStage::Normalizing).await?;
        let assembly = assemble(&items, &self.normalizer);
        info!(
            stage = %RunStage::Normalizing,
            documents = assembly.documents.len(),
            excluded = assembly.excluded.len(),
            "Documents assembled"
        );
        if assembly.is_empty() {
            return Err(PipelineError::EmptyCorpus { items: items.len() });
        }
        let documents = assembly.documents;

        // --- Embedding ---
        self.enter(RunStage::Embedding).await?;
        let texts: Vec<String> = documents.iter().map(|d| d.text.clone()).collect();
        let embeddings = self
            .embedder
            .embed(&texts)
            .await
            .map_err(|e| PipelineError::EmbeddingUnavailable(format!("{}: {e:#}", self.embedder.name())))?;
        if embeddings.len() != documents.len() {
            return Err(PipelineError::EmbeddingUnavailable(format!(
                "{} returned {} vectors for {} documents",
                self.embedder.name(),
                embeddings.len(),
                documents.len()
            )));
        }
        info!(
            stage = %RunStage::Embedding,
            vectors = embeddings.len(),
            dim = self.embedder.dimension(),
            "Documents embedded"
        );

        // --- Reducing ---
        self.enter(RunStage::Reducing).await?;
        let reducer = DimensionReducer::new(self.settings.reduce_dims, self.settings.seed);
        let reduced = reducer
            .fit_transform(&embeddings)
            .map_err(|e| PipelineError::Internal(format!("dimensionality reduction failed: {e:#}")))?;

        // --- Clustering ---
        self.enter(RunStage::Clustering).await?;
        let engine = ClusterEngine::new(self.settings.min_cluster_size, self.settings.min_samples);
        let cluster_ids = engine.fit(&reduced);
        let assignments: HashMap<String, i32> = documents
            .iter()
            .map(|d| d.item_id.clone())
            .zip(cluster_ids)
            .collect();
        let noise_points = assignments.values().filter(|&&c| c == NOISE).count();
        let real_clusters = assignments.len() - noise_points;
        info!(
            stage = %RunStage::Clustering,
            clustered = real_clusters,
            noise = noise_points,
            "Clustering finished"
        );

        // --- Labeling ---
        self.enter(RunStage::Labeling).await?;
        let (outcome, clusters, labels) = if real_clusters == 0 {
            warn!(
                documents = documents.len(),
                "Clustering found no dense regions, labeling everything {}",
                FALLBACK_TOPIC
            );
            let labels: BTreeMap<String, String> = documents
                .iter()
                .map(|d| (d.item_id.clone(), FALLBACK_TOPIC.to_string()))
                .collect();
            (RunOutcome::Degenerate, Vec::new(), labels)
        } else {
            let clusters = TopicLabeler::default().label(&documents, &assignments);
            let labels: BTreeMap<String, String> = clusters
                .iter()
                .flat_map(|c| c.member_ids.iter().map(|id| (id.clone(), c.label.clone())))
                .collect();
            (RunOutcome::Clustered, clusters, labels)
        };

        let pairs: Vec<(String, String)> = labels
            .iter()
            .map(|(id, label)| (id.clone(), label.clone()))
            .collect();
        let written = self
            .db
            .set_topics(&pairs)
            .await
            .map_err(PipelineError::Store)?;
        info!(stage = %RunStage::Labeling, labels = written, "Topic labels committed");

        // --- Aggregating ---
        self.enter(RunStage::Aggregating).await?;
        let all_items = self.db.get_all_items().await.map_err(PipelineError::Store)?;
        let metrics = metrics::aggregate(&all_items, self.sentiment);
        info!(
            stage = %RunStage::Aggregating,
            items = all_items.len(),
            topics = metrics.len(),
            "Topic metrics aggregated"
        );

        Ok(TopicRun {
            outcome,
            items_read: items.len(),
            documents: documents.len(),
            excluded: assembly.excluded,
            clusters,
            noise_points,
            labels,
            metrics,
        })
    }

    async fn enter(&self, stage: RunStage) -> Result<(), PipelineError> {
        info!(stage = %stage, "Entering stage");
        self.db
            .set_run_state(STATE_LAST_STAGE, stage.as_str())
            .await
            .map_err(PipelineError::Store)
    }

    async fn finish(&self, stage: RunStage, error: &str) -> Result<(), PipelineError> {
        let now = chrono::Utc::now().to_rfc3339();
        for (key, value) in [
            (STATE_LAST_STAGE, stage.as_str()),
            (STATE_LAST_RUN_AT, now.as_str()),
            (STATE_LAST_ERROR, error),
        ] {
            self.db
                .set_run_state(key, value)
                .await
                .map_err(PipelineError::Store)?;
        }
        Ok(())
    }
}
