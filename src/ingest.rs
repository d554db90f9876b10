// Item import — loads scraped discussion items from a JSON export.
//
// Accepts either a JSON array of objects or JSON-lines (one object per
// line). Numeric ids are turned into strings, so exports keyed by integer
// row ids import cleanly.

use std::path::Path;

use anyhow::{Context, Result};
use serde_json::Value;
use tracing::debug;

use crate::db::models::Item;

/// Read and parse an item file.
pub fn load_items(path: &Path) -> Result<Vec<Item>> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    let items = parse_items(&raw).with_context(|| format!("Failed to parse {}", path.display()))?;
    debug!(count = items.len(), path = %path.display(), "Loaded items");
    Ok(items)
}

/// Parse a JSON array or JSON-lines string into items.
pub fn parse_items(raw: &str) -> Result<Vec<Item>> {
    let trimmed = raw.trim_start();
    if trimmed.is_empty() {
        return Ok(Vec::new());
    }

    if trimmed.starts_with('[') {
        let values: Vec<Value> = serde_json::from_str(trimmed).context("Invalid JSON array")?;
        return values
            .into_iter()
            .enumerate()
            .map(|(i, v)| to_item(v).with_context(|| format!("Invalid item at index {i}")))
            .collect();
    }

    raw.lines()
        .enumerate()
        .filter(|(_, line)| !line.trim().is_empty())
        .map(|(i, line)| {
            let value: Value = serde_json::from_str(line)
                .with_context(|| format!("Invalid JSON on line {}", i + 1))?;
            to_item(value).with_context(|| format!("Invalid item on line {}", i + 1))
        })
        .collect()
}

fn to_item(mut value: Value) -> Result<Item> {
    if let Some(id) = value.get_mut("id") {
        if id.is_number() {
            *id = Value::String(id.to_string());
        }
    }
    let item: Item = serde_json::from_value(value)?;
    if item.id.trim().is_empty() {
        anyhow::bail!("item id is empty");
    }
    Ok(item)
}
