//! Chat transcript persistence.
//!
//! A single SQLite key-value table. The transcript is one JSON array stored
//! under [`HISTORY_KEY`]; other keys pass through untouched.

use rusqlite::{params, Connection, OptionalExtension};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::{SystemTime, UNIX_EPOCH};

use crate::error::ChatError;
use crate::modes::Mode;

pub const HISTORY_KEY: &str = "chatHistory";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Sender {
    User,
    Bot,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatEntry {
    pub text: String,
    pub sender: Sender,
    pub mode: Mode,
    #[serde(rename = "timestamp")]
    pub timestamp_ms: u64,
}

impl ChatEntry {
    pub fn new(text: impl Into<String>, sender: Sender, mode: Mode) -> Self {
        ChatEntry {
            text: text.into(),
            sender,
            mode,
            timestamp_ms: now_ms(),
        }
    }
}

/// Current Unix epoch in milliseconds.
pub fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

pub struct TranscriptStore {
    conn: Connection,
}

impl TranscriptStore {
    pub fn open(path: &Path) -> Result<Self, ChatError> {
        Self::with_connection(Connection::open(path)?)
    }

    pub fn open_in_memory() -> Result<Self, ChatError> {
        Self::with_connection(Connection::open_in_memory()?)
    }

    fn with_connection(conn: Connection) -> Result<Self, ChatError> {
        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS kv (
                key   TEXT PRIMARY KEY,
                value TEXT NOT NULL
            );",
        )?;
        Ok(TranscriptStore { conn })
    }

    pub fn get(&self, key: &str) -> Result<Option<String>, ChatError> {
        let value = self
            .conn
            .query_row("SELECT value FROM kv WHERE key = ?1", params![key], |row| row.get(0))
            .optional()?;
        Ok(value)
    }

    pub fn set(&self, key: &str, value: &str) -> Result<(), ChatError> {
        self.conn.execute(
            "INSERT INTO kv (key, value) VALUES (?1, ?2)
             ON CONFLICT(key) DO UPDATE SET value = excluded.value",
            params![key, value],
        )?;
        Ok(())
    }

    /// Stored transcript. A missing or corrupt value reads as empty.
    pub fn load(&self) -> Vec<ChatEntry> {
        let raw = match self.get(HISTORY_KEY) {
            Ok(Some(raw)) => raw,
            Ok(None) => return Vec::new(),
            Err(e) => {
                tracing::error!(error = %e, "error loading chat history");
                return Vec::new();
            }
        };
        serde_json::from_str(&raw).unwrap_or_else(|e| {
            tracing::error!(error = %e, "stored chat history is corrupt, starting empty");
            Vec::new()
        })
    }

    pub fn save(&self, entries: &[ChatEntry]) -> Result<(), ChatError> {
        let raw = serde_json::to_string(entries)?;
        self.set(HISTORY_KEY, &raw)
    }

    /// Append one entry and persist the whole transcript.
    pub fn push(&self, entry: ChatEntry) -> Result<usize, ChatError> {
        let mut entries = self.load();
        entries.push(entry);
        self.save(&entries)?;
        Ok(entries.len())
    }

    pub fn clear(&self) -> Result<(), ChatError> {
        self.save(&[])
    }
}
