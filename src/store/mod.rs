// src/store/mod.rs — Session store: trait, records, and the SQLite-backed handle

pub mod schema;
pub mod server;
pub mod sqlite;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::Path;
use tokio::sync::watch;

use crate::provider::Role;

pub use server::{spawn_store_server, StoreHandle};
pub use sqlite::Store;

/// Shown in listings for sessions whose title is blank.
pub const UNTITLED: &str = "Untitled Chat";

/// One conversation thread.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatSession {
    pub id: String,
    pub title: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    /// Advisory; bumped by the store on every appended message.
    pub message_count: i64,
}

impl ChatSession {
    pub fn display_title(&self) -> &str {
        if self.title.trim().is_empty() {
            UNTITLED
        } else {
            &self.title
        }
    }
}

/// A persisted turn. Content never changes after it is written.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredMessage {
    pub id: String,
    pub role: Role,
    pub content: String,
    pub created_at: DateTime<Utc>,
}

/// Partial session update. `updated_at` is always bumped.
#[derive(Debug, Clone, Default)]
pub struct SessionPatch {
    pub title: Option<String>,
    pub message_count: Option<i64>,
}

/// Push feed of a user's sessions, newest first. Drop it to unsubscribe.
pub type SessionFeed = watch::Receiver<Vec<ChatSession>>;

/// Remote document store holding sessions and their ordered messages.
#[async_trait]
pub trait SessionStore: Send + Sync {
    async fn create_session(&self, user_id: &str, title: &str) -> anyhow::Result<String>;

    async fn update_session(
        &self,
        user_id: &str,
        session_id: &str,
        patch: SessionPatch,
    ) -> anyhow::Result<()>;

    /// Removes the session's messages, then the session.
    async fn delete_session(&self, user_id: &str, session_id: &str) -> anyhow::Result<()>;

    async fn subscribe_sessions(&self, user_id: &str) -> anyhow::Result<SessionFeed>;

    /// Appends a message; also bumps the session's `updated_at`.
    async fn add_message(
        &self,
        user_id: &str,
        session_id: &str,
        role: Role,
        content: &str,
    ) -> anyhow::Result<String>;

    async fn get_messages(
        &self,
        user_id: &str,
        session_id: &str,
    ) -> anyhow::Result<Vec<StoredMessage>>;
}

/// Open the database at `path` and start its server task.
pub fn open_handle(path: &Path) -> anyhow::Result<StoreHandle> {
    let store = Store::open(path)?;
    let (handle, _join) = spawn_store_server(store);
    Ok(handle)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn session(title: &str) -> ChatSession {
        ChatSession {
            id: "s".into(),
            title: title.into(),
            created_at: Utc::now(),
            updated_at: Utc::now(),
            message_count: 0,
        }
    }

    #[test]
    fn test_display_title_falls_back() {
        assert_eq!(session("").display_title(), "Untitled Chat");
        assert_eq!(session("   ").display_title(), "Untitled Chat");
        assert_eq!(session("Offers").display_title(), "Offers");
    }
}
