// SqliteDatabase — rusqlite backend implementing the Database trait.
//
// The Connection is wrapped in tokio::sync::Mutex because Connection is !Send.
// Trait methods lock the mutex, do synchronous rusqlite work, and return.
// The lock is never held across .await points.

use anyhow::Result;
use async_trait::async_trait;
use rusqlite::Connection;
use tokio::sync::Mutex;

use super::models::{Item, ItemCounts};
use super::traits::Database;

pub struct SqliteDatabase {
    conn: Mutex<Connection>,
}

impl SqliteDatabase {
    /// Wrap an already-opened rusqlite Connection.
    pub fn new(conn: Connection) -> Self {
        Self {
            conn: Mutex::new(conn),
        }
    }
}

#[async_trait]
impl Database for SqliteDatabase {
    async fn table_count(&self) -> Result<i64> {
        let conn = self.conn.lock().await;
        super::schema::table_count(&conn)
    }

    async fn insert_items(&self, items: &[Item]) -> Result<usize> {
        let conn = self.conn.lock().await;
        super::queries::insert_items(&conn, items)
    }

    async fn clear_items(&self) -> Result<usize> {
        let conn = self.conn.lock().await;
        super::queries::clear_items(&conn)
    }

    async fn get_all_items(&self) -> Result<Vec<Item>> {
        let conn = self.conn.lock().await;
        super::queries::get_all_items(&conn)
    }

    async fn get_items(&self, corpus: Option<&str>, limit: Option<usize>) -> Result<Vec<Item>> {
        let conn = self.conn.lock().await;
        super::queries::get_items(&conn, corpus, limit)
    }

    async fn get_item(&self, id: &str) -> Result<Option<Item>> {
        let conn = self.conn.lock().await;
        super::queries::get_item(&conn, id)
    }

    async fn set_topic(&self, id: &str, label: &str) -> Result<()> {
        let conn = self.conn.lock().await;
        super::queries::set_topic(&conn, id, label)
    }

    async fn set_topics(&self, labels: &[(String, String)]) -> Result<usize> {
        let conn = self.conn.lock().await;
        super::queries::set_topics(&conn, labels)
    }

    async fn item_counts(&self) -> Result<ItemCounts> {
        let conn = self.conn.lock().await;
        super::queries::item_counts(&conn)
    }

    async fn get_run_state(&self, key: &str) -> Result<Option<String>> {
        let conn = self.conn.lock().await;
        super::queries::get_run_state(&conn, key)
    }

    async fn set_run_state(&self, key: &str, value: &str) -> Result<()> {
        let conn = self.conn.lock().await;
        super::queries::set_run_state(&conn, key, value)
    }
}
