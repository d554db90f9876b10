// Sentiment scorer trait — the swap-ready abstraction.
//
// The default implementation is a local weighted lexicon. Anything that can
// map text to a polarity in [-1, 1] can stand in for it.

use anyhow::Result;

pub trait SentimentScorer: Send + Sync {
    /// Polarity of `text` in [-1.0, 1.0]. Empty text scores 0.0.
    fn polarity(&self, text: &str) -> Result<f64>;

    /// Short name for logs.
    fn name(&self) -> &str;
}
