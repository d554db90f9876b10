// Document assembly — one normalized document per item, short ones excluded.

use serde::{Deserialize, Serialize};

use super::normalize::{token_count, TextNormalizer};
use crate::db::models::Item;

/// Documents with fewer tokens than this are not clustered.
pub const MIN_DOCUMENT_TOKENS: usize = 3;

/// A normalized document, keyed by the id of the item it came from.
/// Only exists for the duration of a run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NormalizedDocument {
    pub item_id: String,
    pub text: String,
    pub token_count: usize,
}

/// Result of assembling a batch: the documents to cluster and the ids of
/// items that were too short.
#[derive(Debug, Clone, Default)]
pub struct Assembly {
    pub documents: Vec<NormalizedDocument>,
    pub excluded: Vec<String>,
}

impl Assembly {
    pub fn is_empty(&self) -> bool {
        self.documents.is_empty()
    }
}

/// Normalize one item's combined text, returning `None` if it is too short.
pub fn assemble_item(item: &Item, normalizer: &TextNormalizer) -> Option<NormalizedDocument> {
    let text = normalizer.normalize(&item.combined_text());
    let tokens = token_count(&text);
    (tokens >= MIN_DOCUMENT_TOKENS).then(|| NormalizedDocument {
        item_id: item.id.clone(),
        text,
        token_count: tokens,
    })
}

/// Assemble documents for every item, preserving input order.
pub fn assemble(items: &[Item], normalizer: &TextNormalizer) -> Assembly {
    let mut assembly = Assembly::default();
    for item in items {
        match assemble_item(item, normalizer) {
            Some(doc) => assembly.documents.push(doc),
            None => assembly.excluded.push(item.id.clone()),
        }
    }
    assembly
}
