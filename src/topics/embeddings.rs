// Sentence embeddings using all-MiniLM-L6-v2.
//
// Each normalized document is embedded into a 384-dimensional vector with a
// local ONNX sentence transformer, with no API calls or rate limits. Token
// embeddings are mean-pooled (matching the model's training) and then
// L2-normalized, like the sentence-transformers pipeline does.

use std::path::Path;
use std::sync::{Arc, Mutex};

use anyhow::{Context, Result};
use async_trait::async_trait;
use ort::session::Session;
use ort::value::Tensor;
use tokenizers::{Tokenizer, TruncationParams};
use tracing::debug;

use super::traits::EmbeddingProvider;

/// Embedding dimension for all-MiniLM-L6-v2.
pub const EMBEDDING_DIM: usize = 384;

/// Longest token sequence fed to the model. MiniLM was trained on 256
/// word pieces and has 512 positions; long reply threads are cut here.
pub const MAX_SEQUENCE_TOKENS: usize = 256;

/// Sentence embedder using a local ONNX model.
///
/// `Arc<Mutex<Session>>` for thread safety, `Arc<Tokenizer>` for shared
/// ownership across spawn_blocking.
pub struct SentenceEmbedder {
    session: Arc<Mutex<Session>>,
    tokenizer: Arc<Tokenizer>,
}

impl SentenceEmbedder {
    /// Load the sentence embedding model and tokenizer from the given directory.
    ///
    /// Expects `model.onnx` and `tokenizer.json` in the directory.
    /// Call `download_model()` first if they don't exist.
    pub fn load(model_dir: &Path) -> Result<Self> {
        let model_path = model_dir.join("model.onnx");
        let tokenizer_path = model_dir.join("tokenizer.json");

        if !model_path.exists() {
            anyhow::bail!(
                "Embedding model not found: {}\nRun `topicpulse download-model` to download it.",
                model_path.display()
            );
        }
        if !tokenizer_path.exists() {
            anyhow::bail!(
                "Embedding tokenizer not found: {}\nRun `topicpulse download-model` to download it.",
                tokenizer_path.display()
            );
        }

        let session = Session::builder()
            .context("Failed to create ONNX session builder")?
            .commit_from_file(&model_path)
            .with_context(|| {
                format!(
                    "Failed to load embedding model from {}",
                    model_path.display()
                )
            })?;

        let mut tokenizer = Tokenizer::from_file(&tokenizer_path)
            .map_err(|e| anyhow::anyhow!("Failed to load embedding tokenizer: {}", e))?;
        limit_sequence_length(&mut tokenizer)?;

        debug!(
            "Loaded sentence embedding model from {}",
            model_dir.display()
        );

        Ok(Self {
            session: Arc::new(Mutex::new(session)),
            tokenizer: Arc::new(tokenizer),
        })
    }
}

#[async_trait]
impl EmbeddingProvider for SentenceEmbedder {
    /// CPU-bound work is offloaded to spawn_blocking to keep the async
    /// runtime responsive.
    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f64>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        let session = Arc::clone(&self.session);
        let tokenizer = Arc::clone(&self.tokenizer);
        let texts = texts.to_vec();

        tokio::task::spawn_blocking(move || embed_sync(&session, &tokenizer, &texts))
            .await
            .context("spawn_blocking panicked")?
    }

    fn dimension(&self) -> usize {
        EMBEDDING_DIM
    }

    fn name(&self) -> &str {
        "all-MiniLM-L6-v2"
    }
}

/// Truncate every encoding to [`MAX_SEQUENCE_TOKENS`], whatever the
/// tokenizer file ships with.
fn limit_sequence_length(tokenizer: &mut Tokenizer) -> Result<()> {
    tokenizer
        .with_truncation(Some(TruncationParams {
            max_length: MAX_SEQUENCE_TOKENS,
            ..Default::default()
        }))
        .map_err(|e| anyhow::anyhow!("Failed to configure tokenizer truncation: {}", e))?;
    Ok(())
}

/// Synchronous embedding. Runs tokenization, inference, and mean pooling.
fn embed_sync(
    session: &Arc<Mutex<Session>>,
    tokenizer: &Arc<Tokenizer>,
    texts: &[String],
) -> Result<Vec<Vec<f64>>> {
    let encodings: Vec<_> = texts
        .iter()
        .map(|t| {
            tokenizer
                .encode(t.as_str(), true)
                .map_err(|e| anyhow::anyhow!("Tokenization failed: {}", e))
        })
        .collect::<Result<Vec<_>>>()?;

    let batch_size = encodings.len();
    let max_len = encodings
        .iter()
        .map(|e| e.get_ids().len())
        .max()
        .unwrap_or(0);

    if max_len == 0 {
        return Ok(vec![vec![0.0; EMBEDDING_DIM]; batch_size]);
    }

    // BERT inputs: input_ids (pad 0), attention_mask (1 real / 0 pad),
    // token_type_ids (all zeros for single-sentence input)
    let mut input_ids_flat: Vec<i64> = Vec::with_capacity(batch_size * max_len);
    let mut attention_mask_flat: Vec<i64> = Vec::with_capacity(batch_size * max_len);
    let mut token_type_ids_flat: Vec<i64> = Vec::with_capacity(batch_size * max_len);

    for enc in &encodings {
        let ids = enc.get_ids();
        let mask = enc.get_attention_mask();
        let seq_len = ids.len();

        input_ids_flat.extend(ids.iter().map(|&id| id as i64));
        attention_mask_flat.extend(mask.iter().map(|&m| m as i64));
        token_type_ids_flat.extend(std::iter::repeat_n(0i64, seq_len));

        let pad_len = max_len - seq_len;
        input_ids_flat.extend(std::iter::repeat_n(0i64, pad_len));
        attention_mask_flat.extend(std::iter::repeat_n(0i64, pad_len));
        token_type_ids_flat.extend(std::iter::repeat_n(0i64, pad_len));
    }

    let shape = [batch_size as i64, max_len as i64];

    let input_ids_tensor =
        Tensor::from_array((shape, input_ids_flat)).context("Failed to create input_ids tensor")?;
    let attention_mask_tensor = Tensor::from_array((shape, attention_mask_flat.clone()))
        .context("Failed to create attention_mask tensor")?;
    let token_type_ids_tensor = Tensor::from_array((shape, token_type_ids_flat))
        .context("Failed to create token_type_ids tensor")?;

    // Output is last_hidden_state: [batch, seq_len, 384]
    let hidden_states = {
        let mut session = session
            .lock()
            .map_err(|e| anyhow::anyhow!("Session lock poisoned: {}", e))?;

        let outputs = session
            .run(ort::inputs! {
                "input_ids" => input_ids_tensor,
                "attention_mask" => attention_mask_tensor,
                "token_type_ids" => token_type_ids_tensor
            })
            .context("Embedding ONNX inference failed")?;

        let (_shape, data) = outputs[0]
            .try_extract_tensor::<f32>()
            .context("Failed to extract embedding output tensor")?;

        data.to_vec()
    };

    let mut embeddings = Vec::with_capacity(batch_size);

    for i in 0..batch_size {
        let mask = &attention_mask_flat[i * max_len..(i + 1) * max_len];
        let start = i * max_len * EMBEDDING_DIM;
        let tokens = &hidden_states[start..start + max_len * EMBEDDING_DIM];
        embeddings.push(l2_normalize(mean_pool(tokens, mask)));
    }

    debug!(
        batch_size = batch_size,
        dim = EMBEDDING_DIM,
        "Computed sentence embeddings"
    );

    Ok(embeddings)
}

/// Average token embeddings weighted by the attention mask.
///
/// `tokens` is a flat `[seq_len * EMBEDDING_DIM]` slice for one text.
fn mean_pool(tokens: &[f32], mask: &[i64]) -> Vec<f64> {
    let mut sum = vec![0.0_f64; EMBEDDING_DIM];
    let mut mask_sum = 0.0_f64;

    for (j, &m) in mask.iter().enumerate() {
        if m > 0 {
            let weight = m as f64;
            mask_sum += weight;
            let offset = j * EMBEDDING_DIM;
            for (k, acc) in sum.iter_mut().enumerate() {
                *acc += tokens[offset + k] as f64 * weight;
            }
        }
    }

    if mask_sum > 0.0 {
        for val in &mut sum {
            *val /= mask_sum;
        }
    }

    sum
}

/// Scale a vector to unit length. Zero vectors are returned unchanged.
pub fn l2_normalize(mut v: Vec<f64>) -> Vec<f64> {
    let norm = v.iter().map(|x| x * x).sum::<f64>().sqrt();
    if norm > f64::EPSILON {
        for x in &mut v {
            *x /= norm;
        }
    }
    v
}
