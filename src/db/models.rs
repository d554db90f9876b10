// Data models — Rust structs that map to database rows.
//
// These are the types that flow through the application. They're separate
// from the database queries so other modules can use them without depending
// on rusqlite directly.

use serde::{Deserialize, Serialize};

/// One discussion entry: a post plus the concatenated text of its replies.
///
/// The `id` is the only key used to correlate pipeline results back to rows.
/// Field aliases accept the column names used by the scraper exports
/// (`post_title`, `post_content`, `comments`, `num_comments`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Item {
    pub id: String,
    /// Community / feed the item was collected from (used as the corpus selector)
    #[serde(default)]
    pub source: Option<String>,
    #[serde(alias = "post_title")]
    pub title: String,
    #[serde(default, alias = "post_content")]
    pub body: Option<String>,
    /// Concatenated reply text
    #[serde(default, alias = "comments")]
    pub discussion: Option<String>,
    /// Popularity score (upvotes)
    #[serde(default)]
    pub score: Option<i64>,
    #[serde(default, alias = "num_comments")]
    pub reply_count: Option<i64>,
    /// Comma-separated topic words, absent until a pipeline run labels the item
    #[serde(default)]
    pub topic: Option<String>,
}

impl Item {
    /// Build an unlabeled item with just a title. Handy for tests and imports.
    pub fn new(id: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            source: None,
            title: title.into(),
            body: None,
            discussion: None,
            score: None,
            reply_count: None,
            topic: None,
        }
    }

    /// Title, body, and discussion joined with single spaces, skipping empty parts.
    pub fn combined_text(&self) -> String {
        [
            Some(self.title.as_str()),
            self.body.as_deref(),
            self.discussion.as_deref(),
        ]
        .into_iter()
        .flatten()
        .map(str::trim)
        .filter(|part| !part.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
    }
}

/// Item counts shown by `topicpulse status`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemCounts {
    pub total: i64,
    pub labeled: i64,
}

impl ItemCounts {
    pub fn unlabeled(&self) -> i64 {
        self.total - self.labeled
    }
}
