// Sentiment polarity — how positive or negative a piece of text reads.

pub mod lexicon;
pub mod traits;

pub use lexicon::LexiconSentiment;
pub use traits::SentimentScorer;
