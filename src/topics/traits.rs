// Embedding provider trait — swap-ready abstraction.
//
// The pipeline treats embedding as an opaque capability: any sentence
// embedding model works as long as it returns one vector per input, in
// input order, deterministically for a fixed model version.

use anyhow::Result;
use async_trait::async_trait;

/// Maps documents to fixed-length dense vectors.
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    /// Embed a batch of documents. Output order matches input order.
    /// The batch either succeeds as a whole or fails; there are no
    /// partial results.
    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f64>>>;

    /// Native dimensionality of the vectors this provider returns.
    fn dimension(&self) -> usize;

    /// Short name for logs and status output.
    fn name(&self) -> &str;
}
