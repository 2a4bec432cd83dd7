//! Transcript persistence.
//!
//! Round-trips the full ordered message log as JSON through a key-value
//! table under a fixed key, so the log survives process restart.

use std::sync::Arc;

use rusqlite::{params, Connection, OptionalExtension};
use tracing::debug;

use prompter_core::error::CoreError;
use prompter_core::types::Message;

use crate::db::Database;

/// Fixed key under which the serialized message log is stored.
pub const TRANSCRIPT_KEY: &str = "transcript";

/// Create the key-value schema if it does not exist.
pub fn init_schema(conn: &Connection) -> Result<(), CoreError> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS kv_store (
            key         TEXT PRIMARY KEY NOT NULL,
            value       TEXT NOT NULL,
            updated_at  INTEGER NOT NULL DEFAULT (strftime('%s', 'now'))
        );",
    )
    .map_err(|e| CoreError::Storage(format!("Failed to create kv_store table: {}", e)))
}

/// Persists the conversation transcript through the key-value store.
#[derive(Clone)]
pub struct TranscriptStore {
    db: Arc<Database>,
}

impl TranscriptStore {
    pub fn new(db: Arc<Database>) -> Self {
        Self { db }
    }

    /// Write the full ordered message log, replacing any previous value.
    pub fn save(&self, messages: &[Message]) -> Result<(), CoreError> {
        let json = serde_json::to_string(messages)?;
        self.db.with_conn(|conn| {
            conn.execute(
                "INSERT INTO kv_store (key, value, updated_at)
                 VALUES (?1, ?2, strftime('%s', 'now'))
                 ON CONFLICT(key) DO UPDATE SET
                     value = excluded.value,
                     updated_at = excluded.updated_at",
                params![TRANSCRIPT_KEY, json],
            )
            .map_err(|e| CoreError::Storage(format!("Failed to save transcript: {}", e)))?;
            Ok(())
        })?;
        debug!(message_count = messages.len(), "Transcript persisted");
        Ok(())
    }

    /// Read the message log back; an absent key yields an empty log.
    pub fn load(&self) -> Result<Vec<Message>, CoreError> {
        let json: Option<String> = self.db.with_conn(|conn| {
            conn.query_row(
                "SELECT value FROM kv_store WHERE key = ?1",
                params![TRANSCRIPT_KEY],
                |row| row.get(0),
            )
            .optional()
            .map_err(|e| CoreError::Storage(format!("Failed to load transcript: {}", e)))
        })?;

        match json {
            Some(json) => Ok(serde_json::from_str(&json)?),
            None => Ok(Vec::new()),
        }
    }

    /// Remove the persisted log.
    pub fn clear(&self) -> Result<(), CoreError> {
        self.db.with_conn(|conn| {
            conn.execute(
                "DELETE FROM kv_store WHERE key = ?1",
                params![TRANSCRIPT_KEY],
            )
            .map_err(|e| CoreError::Storage(format!("Failed to clear transcript: {}", e)))?;
            Ok(())
        })
    }
}

// =============================================================================
// Tests
// =============================================================================
