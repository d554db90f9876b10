// System status display — shows DB stats, label coverage, last run.

use anyhow::Result;
use std::path::Path;
use std::sync::Arc;

use crate::db::Database;
use crate::pipeline::topic_run::{STATE_LAST_ERROR, STATE_LAST_RUN_AT, STATE_LAST_STAGE};

/// Display system status to the terminal.
pub async fn show(db: &Arc<dyn Database>, db_display_path: &str) -> Result<()> {
    // Database file size
    let file_size = std::fs::metadata(db_display_path)
        .map(|m| format_bytes(m.len()))
        .unwrap_or_else(|_| "unknown".to_string());
    println!("Database: {} ({})", db_display_path, file_size);

    let counts = db.item_counts().await?;
    println!(
        "Items: {} total, {} labeled, {} unlabeled",
        counts.total,
        counts.labeled,
        counts.unlabeled()
    );
    if counts.total == 0 {
        println!("  Run `topicpulse import <file>` to load items");
    }

    match db.get_run_state(STATE_LAST_STAGE).await? {
        Some(stage) => {
            let at = db
                .get_run_state(STATE_LAST_RUN_AT)
                .await?
                .unwrap_or_else(|| "in progress".to_string());
            println!("Last run: {} ({})", stage, at);
            if let Some(error) = db.get_run_state(STATE_LAST_ERROR).await? {
                if !error.is_empty() {
                    println!("  Diagnostic: {}", error);
                }
            }
        }
        None => {
            println!("Last run: never");
            println!("  Run `topicpulse run` to discover topics");
        }
    }

    Ok(())
}

/// Whether the database file exists yet.
pub fn database_exists(db_path: &str) -> bool {
    Path::new(db_path).exists()
}

fn format_bytes(bytes: u64) -> String {
    if bytes < 1024 {
        format!("{} B", bytes)
    } else if bytes < 1024 * 1024 {
        format!("{:.1} KB", bytes as f64 / 1024.0)
    } else {
        format!("{:.1} MB", bytes as f64 / (1024.0 * 1024.0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_bytes() {
        assert_eq!(format_bytes(512), "512 B");
        assert_eq!(format_bytes(2048), "2.0 KB");
        assert_eq!(format_bytes(3 * 1024 * 1024), "3.0 MB");
    }
}
