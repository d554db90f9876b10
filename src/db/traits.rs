// Database trait — backend-agnostic async interface for the item store.
//
// The pipeline only sees this trait: it reads items (the item source),
// writes topic labels (the item sink), and records run state. All methods
// are async so a native async backend could slot in next to the rusqlite
// one without touching callers.

use anyhow::Result;
use async_trait::async_trait;

use super::models::{Item, ItemCounts};

#[async_trait]
pub trait Database: Send + Sync {
    // --- Lifecycle ---

    /// Count the number of user-created tables in the database.
    async fn table_count(&self) -> Result<i64>;

    // --- Items ---

    /// Insert or refresh items by id. Returns the number of rows written.
    async fn insert_items(&self, items: &[Item]) -> Result<usize>;

    /// Remove every item (used before a full reload).
    async fn clear_items(&self) -> Result<usize>;

    /// Every item present at call time, topic possibly NULL.
    async fn get_all_items(&self) -> Result<Vec<Item>>;

    /// Items for a corpus selector (matched on source), capped at `limit`.
    async fn get_items(&self, corpus: Option<&str>, limit: Option<usize>) -> Result<Vec<Item>>;

    /// One item by id.
    async fn get_item(&self, id: &str) -> Result<Option<Item>>;

    /// Single-field update of one item's topic label.
    async fn set_topic(&self, id: &str, label: &str) -> Result<()>;

    /// Commit a run's labels atomically. Returns the number of rows updated.
    async fn set_topics(&self, labels: &[(String, String)]) -> Result<usize>;

    /// Total and labeled item counts.
    async fn item_counts(&self) -> Result<ItemCounts>;

    // --- Run state ---

    /// Get a run state value by key (e.g., "last_run_stage").
    async fn get_run_state(&self, key: &str) -> Result<Option<String>>;

    /// Set a run state value (upsert).
    async fn set_run_state(&self, key: &str, value: &str) -> Result<()>;
}
