// src/mentor/types.rs — Visible conversation state

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::provider::Role;
use crate::store::StoredMessage;
use crate::util::first_words;

pub const GREETING_ID: &str = "greeting";

pub const GREETING_TEXT: &str = "Hello! I'm your AI Career Mentor. I'm here to help you navigate your professional journey with personalized advice, interview preparation, and career strategy. What would you like to discuss today?";

/// Replaces the placeholder when the model request or its stream fails.
pub const STREAM_APOLOGY: &str = "Sorry, I couldn't generate a response. Please try again.";

/// Replaces the placeholder when no API key is configured.
pub const CONNECT_APOLOGY: &str = "Sorry, I couldn't connect to the AI. Please check your API key.";

/// Number of leading words of the first user message used as a session title.
pub const TITLE_WORDS: usize = 6;

/// A message as the presentation layer sees it.
///
/// Loaded messages carry store ids; the user echo and the streaming
/// placeholder carry local ids until the conversation is reloaded.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MentorMessage {
    pub id: String,
    pub role: Role,
    pub content: String,
    pub timestamp: DateTime<Utc>,
}

impl MentorMessage {
    pub fn greeting() -> Self {
        Self {
            id: GREETING_ID.to_string(),
            role: Role::Assistant,
            content: GREETING_TEXT.to_string(),
            timestamp: Utc::now(),
        }
    }

    pub(crate) fn local_user(content: &str) -> Self {
        Self {
            id: format!("u-{}", Uuid::new_v4()),
            role: Role::User,
            content: content.to_string(),
            timestamp: Utc::now(),
        }
    }

    pub(crate) fn placeholder() -> Self {
        Self {
            id: format!("a-{}", Uuid::new_v4()),
            role: Role::Assistant,
            content: String::new(),
            timestamp: Utc::now(),
        }
    }

    pub fn is_greeting(&self) -> bool {
        self.id == GREETING_ID
    }

    /// An assistant message with no content yet: render a typing indicator.
    pub fn is_typing(&self) -> bool {
        self.role == Role::Assistant && self.content.is_empty()
    }
}

impl From<StoredMessage> for MentorMessage {
    fn from(m: StoredMessage) -> Self {
        Self {
            id: m.id,
            role: m.role,
            content: m.content,
            timestamp: m.created_at,
        }
    }
}

/// Snapshot of the conversation published to observers on every change.
#[derive(Debug, Clone, PartialEq)]
pub struct ChatView {
    pub messages: Vec<MentorMessage>,
    /// `None` while the conversation is an unsaved draft.
    pub active_session_id: Option<String>,
    pub is_generating: bool,
    pub is_loading: bool,
}

impl ChatView {
    /// A brand-new chat showing only the greeting.
    pub fn is_fresh(&self) -> bool {
        !self.is_loading && self.messages.len() == 1 && self.messages[0].is_greeting()
    }
}

/// What became of a `send_message` call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SendOutcome {
    /// Preconditions not met; nothing changed.
    Ignored,
    /// The reply streamed to completion.
    Completed,
    /// The placeholder now holds an apology.
    Failed,
}

/// Session title derived from the first user message.
pub fn session_title(text: &str) -> String {
    first_words(text, TITLE_WORDS)
}
