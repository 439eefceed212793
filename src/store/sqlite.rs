// src/store/sqlite.rs — SQLite operations for chat sessions and messages

use anyhow::bail;
use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::types::Type;
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::path::Path;
use uuid::Uuid;

use super::{schema, ChatSession, SessionPatch, StoredMessage};
use crate::provider::Role;

/// Fixed-width RFC 3339 so lexical order matches time order.
fn now_ts() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Nanos, true)
}

fn parse_ts(row: &Row, idx: usize) -> rusqlite::Result<DateTime<Utc>> {
    let raw: String = row.get(idx)?;
    DateTime::parse_from_rfc3339(&raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

fn row_to_session(row: &Row) -> rusqlite::Result<ChatSession> {
    Ok(ChatSession {
        id: row.get(0)?,
        title: row.get(1)?,
        created_at: parse_ts(row, 2)?,
        updated_at: parse_ts(row, 3)?,
        message_count: row.get(4)?,
    })
}

fn row_to_message(row: &Row) -> rusqlite::Result<StoredMessage> {
    let role: String = row.get(1)?;
    let role = Role::parse(&role).ok_or_else(|| {
        rusqlite::Error::FromSqlConversionFailure(
            1,
            Type::Text,
            format!("unknown role '{}'", role).into(),
        )
    })?;
    Ok(StoredMessage {
        id: row.get(0)?,
        role,
        content: row.get(2)?,
        created_at: parse_ts(row, 3)?,
    })
}

/// Low-level SQLite operations. Every call is scoped to one user id.
pub struct Store {
    conn: Connection,
}

impl Store {
    pub fn new(conn: Connection) -> Self {
        Self { conn }
    }

    /// Open (or create) the database at the given path and migrate it.
    pub fn open(path: &Path) -> anyhow::Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let conn = Connection::open(path)?;
        conn.execute_batch("PRAGMA journal_mode=WAL;")?;
        conn.execute_batch("PRAGMA foreign_keys=ON;")?;
        schema::run_migrations(&conn)?;
        Ok(Self::new(conn))
    }

    /// Create an in-memory database (for testing).
    pub fn in_memory() -> anyhow::Result<Self> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch("PRAGMA foreign_keys=ON;")?;
        schema::run_migrations(&conn)?;
        Ok(Self::new(conn))
    }

    pub fn conn(&self) -> &Connection {
        &self.conn
    }

    fn owns_session(&self, user_id: &str, session_id: &str) -> anyhow::Result<bool> {
        let found = self
            .conn
            .query_row(
                "SELECT 1 FROM chat_sessions WHERE id = ?1 AND user_id = ?2",
                params![session_id, user_id],
                |_| Ok(()),
            )
            .optional()?;
        Ok(found.is_some())
    }

    // -- Sessions --

    pub fn create_session(&self, user_id: &str, title: &str) -> anyhow::Result<String> {
        let id = Uuid::new_v4().to_string();
        let now = now_ts();
        self.conn.execute(
            "INSERT INTO chat_sessions (id, user_id, title, created_at, updated_at, message_count)
             VALUES (?1, ?2, ?3, ?4, ?4, 0)",
            params![id, user_id, title, now],
        )?;
        Ok(id)
    }

    pub fn update_session(
        &self,
        user_id: &str,
        session_id: &str,
        patch: &SessionPatch,
    ) -> anyhow::Result<()> {
        let updated = self.conn.execute(
            "UPDATE chat_sessions SET
                title = COALESCE(?1, title),
                message_count = COALESCE(?2, message_count),
                updated_at = ?3
             WHERE id = ?4 AND user_id = ?5",
            params![patch.title, patch.message_count, now_ts(), session_id, user_id],
        )?;
        if updated == 0 {
            bail!("session '{}' not found", session_id);
        }
        Ok(())
    }

    /// Delete a session and all of its messages. Messages go first.
    pub fn delete_session(&self, user_id: &str, session_id: &str) -> anyhow::Result<()> {
        if !self.owns_session(user_id, session_id)? {
            bail!("session '{}' not found", session_id);
        }
        let tx = self.conn.unchecked_transaction()?;
        tx.execute(
            "DELETE FROM chat_messages WHERE session_id = ?1",
            params![session_id],
        )?;
        tx.execute(
            "DELETE FROM chat_sessions WHERE id = ?1 AND user_id = ?2",
            params![session_id, user_id],
        )?;
        tx.commit()?;
        Ok(())
    }

    /// All sessions of a user, most recently updated first.
    pub fn list_sessions(&self, user_id: &str) -> anyhow::Result<Vec<ChatSession>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, title, created_at, updated_at, message_count
             FROM chat_sessions WHERE user_id = ?1
             ORDER BY updated_at DESC, rowid DESC",
        )?;
        let rows = stmt.query_map(params![user_id], row_to_session)?;
        let sessions = rows.collect::<Result<Vec<_>, _>>()?;
        Ok(sessions)
    }

    // -- Messages --

    /// Append a message and bump the owning session's updated_at and message_count.
    pub fn add_message(
        &self,
        user_id: &str,
        session_id: &str,
        role: Role,
        content: &str,
    ) -> anyhow::Result<String> {
        if !self.owns_session(user_id, session_id)? {
            bail!("session '{}' not found", session_id);
        }

        let id = Uuid::new_v4().to_string();
        let now = now_ts();
        let tx = self.conn.unchecked_transaction()?;
        tx.execute(
            "INSERT INTO chat_messages (id, session_id, role, content, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![id, session_id, role.as_str(), content, now],
        )?;
        tx.execute(
            "UPDATE chat_sessions SET updated_at = ?1, message_count = message_count + 1
             WHERE id = ?2",
            params![now, session_id],
        )?;
        tx.commit()?;
        Ok(id)
    }

    /// Messages of a session in creation order.
    pub fn get_messages(
        &self,
        user_id: &str,
        session_id: &str,
    ) -> anyhow::Result<Vec<StoredMessage>> {
        if !self.owns_session(user_id, session_id)? {
            bail!("session '{}' not found", session_id);
        }
        let mut stmt = self.conn.prepare(
            "SELECT id, role, content, created_at
             FROM chat_messages WHERE session_id = ?1
             ORDER BY created_at ASC, rowid ASC",
        )?;
        let rows = stmt.query_map(params![session_id], row_to_message)?;
        let messages = rows.collect::<Result<Vec<_>, _>>()?;
        Ok(messages)
    }
}
