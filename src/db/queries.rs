// Database queries — CRUD operations for all tables.
//
// Every database interaction goes through this module. This keeps SQL
// contained in one place and gives the rest of the app clean Rust interfaces.

use anyhow::{Context, Result};
use rusqlite::{params, Connection, OptionalExtension, Row};

use super::models::{Item, ItemCounts};

const ITEM_COLUMNS: &str = "id, source, title, body, discussion, score, reply_count, topic";

fn item_from_row(row: &Row<'_>) -> rusqlite::Result<Item> {
    Ok(Item {
        id: row.get(0)?,
        source: row.get(1)?,
        title: row.get(2)?,
        body: row.get(3)?,
        discussion: row.get(4)?,
        score: row.get(5)?,
        reply_count: row.get(6)?,
        topic: row.get(7)?,
    })
}

// --- Items ---

/// Insert items, updating content fields for ids that already exist.
///
/// The topic column is left alone on conflict, so reloading a batch never
/// duplicates rows and never wipes labels from a previous run.
pub fn insert_items(conn: &Connection, items: &[Item]) -> Result<usize> {
    let tx = conn.unchecked_transaction()?;
    {
        let mut stmt = tx.prepare(
            "INSERT INTO items (id, source, title, body, discussion, score, reply_count, topic)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
             ON CONFLICT(id) DO UPDATE SET
                source = ?2,
                title = ?3,
                body = ?4,
                discussion = ?5,
                score = ?6,
                reply_count = ?7",
        )?;
        for item in items {
            stmt.execute(params![
                item.id,
                item.source,
                item.title,
                item.body,
                item.discussion,
                item.score,
                item.reply_count,
                item.topic,
            ])
            .with_context(|| format!("Failed to insert item {}", item.id))?;
        }
    }
    tx.commit()?;
    Ok(items.len())
}

/// Delete every item (the ingestion side's "clear and reload").
pub fn clear_items(conn: &Connection) -> Result<usize> {
    let deleted = conn.execute("DELETE FROM items", [])?;
    Ok(deleted)
}

/// Every item currently in the table, in insertion order.
pub fn get_all_items(conn: &Connection) -> Result<Vec<Item>> {
    get_items(conn, None, None)
}

/// Items for one corpus (matched on `source`), capped at `limit`.
/// `None` for either argument means "no filter".
pub fn get_items(conn: &Connection, corpus: Option<&str>, limit: Option<usize>) -> Result<Vec<Item>> {
    // SQLite treats a negative LIMIT as unbounded
    let limit: i64 = limit.map(|l| l as i64).unwrap_or(-1);
    let mut stmt = conn.prepare(&format!(
        "SELECT {ITEM_COLUMNS} FROM items
         WHERE (?1 IS NULL OR source = ?1)
         ORDER BY rowid
         LIMIT ?2"
    ))?;
    let rows = stmt.query_map(params![corpus, limit], item_from_row)?;
    let mut items = Vec::new();
    for row in rows {
        items.push(row?);
    }
    Ok(items)
}

/// Look up a single item by id.
pub fn get_item(conn: &Connection, id: &str) -> Result<Option<Item>> {
    let mut stmt = conn.prepare(&format!("SELECT {ITEM_COLUMNS} FROM items WHERE id = ?1"))?;
    let item = stmt.query_row(params![id], item_from_row).optional()?;
    Ok(item)
}

/// Set one item's topic label. Re-applying the same label is a no-op in effect.
pub fn set_topic(conn: &Connection, id: &str, label: &str) -> Result<()> {
    conn.execute(
        "UPDATE items SET topic = ?2 WHERE id = ?1",
        params![id, label],
    )?;
    Ok(())
}

/// Write a whole run's labels in one transaction. Either every label lands
/// or none do.
pub fn set_topics(conn: &Connection, labels: &[(String, String)]) -> Result<usize> {
    let tx = conn.unchecked_transaction()?;
    let mut updated = 0;
    {
        let mut stmt = tx.prepare("UPDATE items SET topic = ?2 WHERE id = ?1")?;
        for (id, label) in labels {
            updated += stmt.execute(params![id, label])?;
        }
    }
    tx.commit()?;
    Ok(updated)
}

/// Total and labeled item counts.
pub fn item_counts(conn: &Connection) -> Result<ItemCounts> {
    let counts = conn.query_row(
        "SELECT COUNT(*), COUNT(topic) FROM items",
        [],
        |row| {
            Ok(ItemCounts {
                total: row.get(0)?,
                labeled: row.get(1)?,
            })
        },
    )?;
    Ok(counts)
}

// --- Run state ---

/// Get a run state value by key (e.g., "last_run_stage").
pub fn get_run_state(conn: &Connection, key: &str) -> Result<Option<String>> {
    let mut stmt = conn.prepare("SELECT value FROM run_state WHERE key = ?1")?;
    let result = stmt.query_row(params![key], |row| row.get(0)).optional()?;
    Ok(result)
}

/// Set a run state value (upsert).
pub fn set_run_state(conn: &Connection, key: &str, value: &str) -> Result<()> {
    conn.execute(
        "INSERT INTO run_state (key, value, updated_at)
         VALUES (?1, ?2, datetime('now'))
         ON CONFLICT(key) DO UPDATE SET value = ?2, updated_at = datetime('now')",
        params![key, value],
    )?;
    Ok(())
}
