// Model download — fetches the sentence embedding model from HuggingFace.
//
// all-MiniLM-L6-v2 (~90MB ONNX export plus tokenizer) is stored under the
// platform data directory (~/.local/share/topicpulse/models/ on Linux) so
// it persists across runs.

use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use indicatif::{ProgressBar, ProgressStyle};
use tracing::{info, warn};

const EMBEDDING_HF_URL: &str =
    "https://huggingface.co/sentence-transformers/all-MiniLM-L6-v2/resolve/main";

/// Remote paths within the HuggingFace repo.
const REMOTE_MODEL_FILE: &str = "onnx/model.onnx";
const REMOTE_TOKENIZER_FILE: &str = "tokenizer.json";

/// Local file names inside the embedding model directory.
pub const MODEL_FILE: &str = "model.onnx";
pub const TOKENIZER_FILE: &str = "tokenizer.json";

/// ~/.local/share/topicpulse/models/ on Linux.
pub fn default_model_dir() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("topicpulse")
        .join("models")
}

/// Subdirectory within the model dir for the sentence embedding model.
pub fn embedding_model_dir(base: &Path) -> PathBuf {
    base.join("all-MiniLM-L6-v2")
}

pub fn embedding_files_present(base: &Path) -> bool {
    let dir = embedding_model_dir(base);
    dir.join(MODEL_FILE).exists() && dir.join(TOKENIZER_FILE).exists()
}

/// Download the embedding model and tokenizer, skipping files that exist.
pub async fn download_model(base: &Path) -> Result<()> {
    let dir = embedding_model_dir(base);
    std::fs::create_dir_all(&dir)
        .with_context(|| format!("Failed to create model directory: {}", dir.display()))?;

    println!("\nSentence embedding model (all-MiniLM-L6-v2):");

    for (remote, local, large) in [
        (REMOTE_TOKENIZER_FILE, TOKENIZER_FILE, false),
        (REMOTE_MODEL_FILE, MODEL_FILE, true),
    ] {
        let dest = dir.join(local);
        if dest.exists() {
            info!(file = local, "Model file already exists, skipping");
            println!("  {} (already exists)", local);
            continue;
        }
        if large {
            println!("  Downloading {} (~90 MB)...", local);
        } else {
            println!("  Downloading {}...", local);
        }
        download_file(&format!("{}/{}", EMBEDDING_HF_URL, remote), &dest, large).await?;
    }

    Ok(())
}

/// Stream one file to disk, with a progress bar when `show_progress` is set.
async fn download_file(url: &str, dest: &Path, show_progress: bool) -> Result<()> {
    let mut response = reqwest::Client::new()
        .get(url)
        .send()
        .await
        .with_context(|| format!("Failed to download {}", url))?;

    if !response.status().is_success() {
        anyhow::bail!("Download failed with status {}: {}", response.status(), url);
    }

    let pb = show_progress.then(|| match response.content_length() {
        Some(size) => {
            let pb = ProgressBar::new(size);
            pb.set_style(
                ProgressStyle::default_bar()
                    .template("    [{bar:40.cyan/blue}] {bytes}/{total_bytes} ({eta})")
                    .expect("valid template")
                    .progress_chars("=> "),
            );
            pb
        }
        None => {
            let pb = ProgressBar::new_spinner();
            pb.set_style(
                ProgressStyle::default_spinner()
                    .template("    {spinner} {bytes}")
                    .expect("valid template"),
            );
            pb
        }
    });

    // Write to a sibling file first so an interrupted download never
    // looks like a complete model
    let mut partial = PartialFile::create(dest)?;

    while let Some(chunk) = response
        .chunk()
        .await
        .context("Failed to read response body")?
    {
        partial.write(&chunk)?;
        if let Some(ref pb) = pb {
            pb.inc(chunk.len() as u64);
        }
    }
    partial.commit()?;

    if let Some(pb) = pb {
        pb.finish_and_clear();
    }

    info!("Downloaded {} to {}", url, dest.display());
    Ok(())
}

/// A `.part` file next to its final destination.
///
/// Dropped without `commit` (any error mid-download), the partial file is
/// removed so a retry starts clean.
struct PartialFile {
    path: PathBuf,
    dest: PathBuf,
    file: Option<std::fs::File>,
}

impl PartialFile {
    fn create(dest: &Path) -> Result<Self> {
        let path = dest.with_extension("part");
        let file = std::fs::File::create(&path)
            .with_context(|| format!("Failed to create {}", path.display()))?;
        Ok(Self {
            path,
            dest: dest.to_path_buf(),
            file: Some(file),
        })
    }

    fn write(&mut self, bytes: &[u8]) -> Result<()> {
        let file = self
            .file
            .as_mut()
            .context("Partial download already committed")?;
        file.write_all(bytes)
            .with_context(|| format!("Failed to write {}", self.path.display()))
    }

    /// Flush and move the finished file into place.
    fn commit(mut self) -> Result<()> {
        if let Some(mut file) = self.file.take() {
            file.flush()
                .with_context(|| format!("Failed to flush {}", self.path.display()))?;
        }
        std::fs::rename(&self.path, &self.dest)
            .with_context(|| format!("Failed to move download into {}", self.dest.display()))
    }
}

impl Drop for PartialFile {
    fn drop(&mut self) {
        // Renamed on success, so this only finds a leftover partial file
        if self.path.exists() {
            if let Err(e) = std::fs::remove_file(&self.path) {
                warn!(path = %self.path.display(), error = %e, "Failed to remove partial download");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_model_dir_is_under_topicpulse() {
        let dir = default_model_dir();
        let path_str = dir.to_string_lossy();
        assert!(
            path_str.contains("topicpulse") && path_str.contains("models"),
            "Expected path containing topicpulse/models, got: {path_str}"
        );
    }

    #[test]
    fn test_embedding_model_dir_is_subdirectory() {
        let base = PathBuf::from("/tmp/test-models");
        assert_eq!(embedding_model_dir(&base), base.join("all-MiniLM-L6-v2"));
    }

    #[test]
    fn test_partial_file_commit_moves_into_place() {
        let tmp = tempfile::tempdir().unwrap();
        let dest = tmp.path().join(MODEL_FILE);

        let mut partial = PartialFile::create(&dest).unwrap();
        partial.write(b"onnx").unwrap();
        assert!(dest.with_extension("part").exists());
        partial.commit().unwrap();

        assert_eq!(std::fs::read(&dest).unwrap(), b"onnx");
        assert!(!dest.with_extension("part").exists());
    }

    #[test]
    fn test_partial_file_removed_when_abandoned() {
        let tmp = tempfile::tempdir().unwrap();
        let dest = tmp.path().join(MODEL_FILE);

        fn interrupted(dest: &Path) -> Result<()> {
            let mut partial = PartialFile::create(dest)?;
            partial.write(b"half a model")?;
            anyhow::bail!("connection reset")
        }

        assert!(interrupted(&dest).is_err());
        assert!(!dest.with_extension("part").exists());
        assert!(!dest.exists());
    }

    #[test]
    fn test_embedding_files_present() {
        let tmp = tempfile::tempdir().unwrap();
        assert!(!embedding_files_present(tmp.path()));

        let dir = embedding_model_dir(tmp.path());
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(dir.join(MODEL_FILE), b"fake").unwrap();
        assert!(!embedding_files_present(tmp.path()));

        std::fs::write(dir.join(TOKENIZER_FILE), b"fake").unwrap();
        assert!(embedding_files_present(tmp.path()));
    }
}
