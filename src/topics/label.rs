// Topic labeling — class-based TF-IDF over cluster member documents.
//
// Each real cluster is treated as one class document made of all its
// members' tokens; each noise document is its own class. A term scores
// high for a class when it is frequent inside the class and rare across
// the whole corpus. The label is the first three qualifying terms.

use std::collections::{BTreeMap, HashMap};

use serde::{Deserialize, Serialize};

use super::cluster::NOISE;
use super::document::NormalizedDocument;

/// Label used whenever no term qualifies.
pub const FALLBACK_TOPIC: &str = "miscellaneous";

/// Number of terms joined into a label.
pub const MAX_LABEL_TERMS: usize = 3;

/// Terms must be longer than this to appear in a label.
pub const MIN_LABEL_TERM_CHARS: usize = 2;

/// A labeled cluster. `cluster_id` is [`NOISE`] for single-document noise
/// classes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TopicCluster {
    pub cluster_id: i32,
    /// Ranked (term, weight) pairs, highest weight first
    pub terms: Vec<(String, f64)>,
    pub member_ids: Vec<String>,
    pub label: String,
}

pub struct TopicLabeler {
    /// How many ranked terms to keep on each cluster
    pub top_n_terms: usize,
}

impl Default for TopicLabeler {
    fn default() -> Self {
        Self { top_n_terms: 10 }
    }
}

impl TopicLabeler {
    /// Label every class. `assignments` maps item id to cluster id; documents
    /// missing from it are treated as noise.
    ///
    /// Real clusters come first in ascending id order, then one entry per
    /// noise document in input order.
    pub fn label(
        &self,
        documents: &[NormalizedDocument],
        assignments: &HashMap<String, i32>,
    ) -> Vec<TopicCluster> {
        let mut clustered: BTreeMap<i32, Vec<&NormalizedDocument>> = BTreeMap::new();
        let mut noise: Vec<&NormalizedDocument> = Vec::new();
        for doc in documents {
            match assignments.get(&doc.item_id).copied().unwrap_or(NOISE) {
                NOISE => noise.push(doc),
                id => clustered.entry(id).or_default().push(doc),
            }
        }

        let mut classes: Vec<(i32, Vec<&NormalizedDocument>)> = clustered.into_iter().collect();
        classes.extend(noise.into_iter().map(|doc| (NOISE, vec![doc])));

        let counts: Vec<HashMap<&str, usize>> = classes
            .iter()
            .map(|(_, docs)| {
                let mut tf: HashMap<&str, usize> = HashMap::new();
                for doc in docs {
                    for token in doc.text.split_whitespace() {
                        *tf.entry(token).or_default() += 1;
                    }
                }
                tf
            })
            .collect();

        let mut corpus_freq: HashMap<&str, usize> = HashMap::new();
        for tf in &counts {
            for (&term, &n) in tf {
                *corpus_freq.entry(term).or_default() += n;
            }
        }
        let total_tokens: usize = corpus_freq.values().sum();
        let avg_class_len = if classes.is_empty() {
            0.0
        } else {
            total_tokens as f64 / classes.len() as f64
        };

        classes
            .iter()
            .zip(&counts)
            .map(|((cluster_id, docs), tf)| {
                let class_len: usize = tf.values().sum();
                let mut terms: Vec<(String, f64)> = tf
                    .iter()
                    .map(|(&term, &n)| {
                        let f = corpus_freq.get(term).copied().unwrap_or(1).max(1) as f64;
                        let weight = (n as f64 / class_len.max(1) as f64)
                            * (1.0 + avg_class_len / f).ln();
                        (term.to_string(), weight)
                    })
                    .collect();
                terms.sort_by(|a, b| b.1.total_cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
                terms.truncate(self.top_n_terms.max(MAX_LABEL_TERMS));

                TopicCluster {
                    cluster_id: *cluster_id,
                    label: label_from_terms(&terms),
                    terms,
                    member_ids: docs.iter().map(|d| d.item_id.clone()).collect(),
                }
            })
            .collect()
    }
}

/// Join the first qualifying terms with ", ", or [`FALLBACK_TOPIC`].
pub fn label_from_terms(terms: &[(String, f64)]) -> String {
    let picked: Vec<&str> = terms
        .iter()
        .map(|(term, _)| term.as_str())
        .filter(|term| term.chars().count() > MIN_LABEL_TERM_CHARS)
        .take(MAX_LABEL_TERMS)
        .collect();

    if picked.is_empty() {
        FALLBACK_TOPIC.to_string()
    } else {
        picked.join(", ")
    }
}
