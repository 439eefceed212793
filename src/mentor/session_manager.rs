// src/mentor/session_manager.rs — Active conversation, streaming turns, persistence

use std::sync::{Arc, Mutex, PoisonError};

use futures::StreamExt;
use tokio::sync::watch;
use tokio::task::JoinHandle;

use super::prompt::MENTOR_SYSTEM_PROMPT;
use super::types::{
    session_title, ChatView, MentorMessage, SendOutcome, CONNECT_APOLOGY, STREAM_APOLOGY,
};
use crate::infra::config::MentorConfig;
use crate::infra::errors::MentorError;
use crate::provider::{ChatRequest, Message, ModelProvider, Role};
use crate::store::{SessionFeed, SessionPatch, SessionStore};

/// Model parameters for every mentor turn.
#[derive(Debug, Clone)]
pub struct MentorOptions {
    pub model: String,
    pub system_prompt: String,
    pub temperature: Option<f32>,
    pub max_tokens: Option<u32>,
}

impl Default for MentorOptions {
    fn default() -> Self {
        Self::from_config(&MentorConfig::default())
    }
}

impl MentorOptions {
    pub fn from_config(config: &MentorConfig) -> Self {
        Self {
            model: config.model.clone(),
            system_prompt: config
                .system_prompt
                .clone()
                .unwrap_or_else(|| MENTOR_SYSTEM_PROMPT.to_string()),
            temperature: config.temperature,
            max_tokens: config.max_output_tokens,
        }
    }
}

/// Owns the visible conversation for one user.
///
/// Cheap to clone; clones share state. Every change is published as a
/// [`ChatView`] snapshot on [`SessionManager::watch`].
#[derive(Clone)]
pub struct SessionManager {
    inner: Arc<Inner>,
}

struct Inner {
    store: Arc<dyn SessionStore>,
    provider: Arc<dyn ModelProvider>,
    user_id: Option<String>,
    options: MentorOptions,
    state: Mutex<ChatState>,
    view_tx: watch::Sender<ChatView>,
    pending_writes: Mutex<Vec<JoinHandle<()>>>,
}

struct ChatState {
    messages: Vec<MentorMessage>,
    /// Public id, set only once the first turn of a new session completes.
    active_session_id: Option<String>,
    /// Session that persistence targets; set as soon as one exists.
    bound_session_id: Option<String>,
    is_generating: bool,
    is_loading: bool,
    /// Bumped whenever the view switches conversations.
    view_epoch: u64,
    /// Bumped on every accepted send.
    turn: u64,
}

impl ChatState {
    fn new() -> Self {
        Self {
            messages: vec![MentorMessage::greeting()],
            active_session_id: None,
            bound_session_id: None,
            is_generating: false,
            is_loading: false,
            view_epoch: 0,
            turn: 0,
        }
    }

    fn view(&self) -> ChatView {
        ChatView {
            messages: self.messages.clone(),
            active_session_id: self.active_session_id.clone(),
            is_generating: self.is_generating,
            is_loading: self.is_loading,
        }
    }

    fn reset(&mut self) {
        self.messages = vec![MentorMessage::greeting()];
        self.active_session_id = None;
        self.bound_session_id = None;
        self.is_generating = false;
        self.is_loading = false;
        self.view_epoch += 1;
    }

    fn set_content(&mut self, id: &str, content: &str) {
        if let Some(m) = self.messages.iter_mut().find(|m| m.id == id) {
            m.content = content.to_string();
        }
    }

    /// Chat history for the model: everything visible except the greeting.
    fn history(&self) -> Vec<Message> {
        self.messages
            .iter()
            .filter(|m| !m.is_greeting())
            .map(|m| Message {
                role: m.role,
                content: m.content.clone(),
            })
            .collect()
    }
}

/// Identity of one accepted send.
struct Turn {
    number: u64,
    epoch: u64,
    placeholder_id: String,
}

impl SessionManager {
    pub fn new(
        store: Arc<dyn SessionStore>,
        provider: Arc<dyn ModelProvider>,
        user_id: Option<String>,
        options: MentorOptions,
    ) -> Self {
        let state = ChatState::new();
        let (view_tx, _) = watch::channel(state.view());
        Self {
            inner: Arc::new(Inner {
                store,
                provider,
                user_id,
                options,
                state: Mutex::new(state),
                view_tx,
                pending_writes: Mutex::new(Vec::new()),
            }),
        }
    }

    pub fn user_id(&self) -> Option<&str> {
        self.inner.user_id.as_deref()
    }

    pub fn view(&self) -> ChatView {
        self.inner.view_tx.borrow().clone()
    }

    /// Receiver that observes every state change.
    pub fn watch(&self) -> watch::Receiver<ChatView> {
        self.inner.view_tx.subscribe()
    }

    /// Live list of the user's sessions, newest first.
    pub async fn subscribe_sessions(&self) -> Option<SessionFeed> {
        let user_id = self.inner.user_id.as_deref()?;
        match self.inner.store.subscribe_sessions(user_id).await {
            Ok(feed) => Some(feed),
            Err(e) => {
                tracing::warn!(user = user_id, "Failed to subscribe to sessions: {:#}", e);
                None
            }
        }
    }

    /// Apply a state change and publish the result.
    fn update<R>(&self, f: impl FnOnce(&mut ChatState) -> R) -> R {
        let mut state = self
            .inner
            .state
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        let out = f(&mut state);
        self.inner.view_tx.send_replace(state.view());
        out
    }

    /// Reset to an unsaved draft showing only the greeting.
    ///
    /// An in-flight reply keeps streaming and persisting in the background,
    /// but its effects no longer reach this view.
    pub fn start_new_chat(&self) {
        self.update(|state| state.reset());
        tracing::debug!("Started new chat");
    }

    /// Switch the view to an existing session.
    ///
    /// No-op when the session is already bound or a reply is streaming.
    /// On fetch failure or an empty session the view falls back to the greeting.
    pub async fn load_session(&self, session_id: &str) {
        let Some(user_id) = self.inner.user_id.clone() else {
            return;
        };

        let epoch = self.update(|state| {
            if state.bound_session_id.as_deref() == Some(session_id) || state.is_generating {
                return None;
            }
            state.active_session_id = Some(session_id.to_string());
            state.bound_session_id = Some(session_id.to_string());
            state.is_loading = true;
            state.view_epoch += 1;
            Some(state.view_epoch)
        });
        let Some(epoch) = epoch else {
            tracing::debug!(session = session_id, "Load skipped");
            return;
        };

        let messages = match self.inner.store.get_messages(&user_id, session_id).await {
            Ok(stored) if stored.is_empty() => vec![MentorMessage::greeting()],
            Ok(stored) => stored.into_iter().map(MentorMessage::from).collect(),
            Err(e) => {
                tracing::warn!(session = session_id, "Failed to load messages: {:#}", e);
                vec![MentorMessage::greeting()]
            }
        };

        self.update(|state| {
            if state.view_epoch == epoch {
                state.messages = messages;
                state.is_loading = false;
            }
        });
    }

    /// Delete a session; resets to a new chat when it is the bound one.
    pub async fn delete_session(&self, session_id: &str) {
        let Some(user_id) = self.inner.user_id.as_deref() else {
            return;
        };

        if let Err(e) = self.inner.store.delete_session(user_id, session_id).await {
            tracing::warn!(session = session_id, "Failed to delete session: {:#}", e);
        }

        self.update(|state| {
            if state.bound_session_id.as_deref() == Some(session_id) {
                state.reset();
            }
        });
    }

    /// Send a user message and stream the mentor's reply into the view.
    ///
    /// Store failures are logged and never abort the turn.
    pub async fn send_message(&self, text: &str) -> SendOutcome {
        let Some(user_id) = self.inner.user_id.clone() else {
            return SendOutcome::Ignored;
        };
        let trimmed = text.trim();
        if trimmed.is_empty() {
            return SendOutcome::Ignored;
        }

        let accepted = self.update(|state| {
            if state.is_generating || state.is_loading {
                return None;
            }
            let mut history = state.history();
            history.push(Message::user(text));
            state.messages.push(MentorMessage::local_user(text));
            state.is_generating = true;
            state.turn += 1;
            Some((history, state.turn, state.view_epoch, state.bound_session_id.clone()))
        });
        let Some((history, number, epoch, bound)) = accepted else {
            tracing::debug!("Send ignored while busy");
            return SendOutcome::Ignored;
        };

        let (session_id, created) = match bound {
            Some(id) => (Some(id), false),
            None => match self
                .inner
                .store
                .create_session(&user_id, &session_title(trimmed))
                .await
            {
                Ok(id) => {
                    self.update(|state| {
                        if state.view_epoch == epoch {
                            state.bound_session_id = Some(id.clone());
                        }
                    });
                    tracing::debug!(session = %id, "Created session");
                    (Some(id), true)
                }
                Err(e) => {
                    tracing::warn!("Failed to create session: {:#}", e);
                    (None, false)
                }
            },
        };

        if let Some(ref id) = session_id {
            if let Err(e) = self
                .inner
                .store
                .add_message(&user_id, id, Role::User, text)
                .await
            {
                tracing::warn!(session = %id, "Failed to save user message: {:#}", e);
            }
        }

        let placeholder = MentorMessage::placeholder();
        let turn = Turn {
            number,
            epoch,
            placeholder_id: placeholder.id.clone(),
        };
        self.update(|state| {
            if state.view_epoch == epoch {
                state.messages.push(placeholder);
            }
        });

        let request = ChatRequest {
            model: self.inner.options.model.clone(),
            messages: history,
            max_tokens: self.inner.options.max_tokens,
            temperature: self.inner.options.temperature,
            system: Some(self.inner.options.system_prompt.clone()),
        };

        let mut stream = match self.inner.provider.chat_stream(request).await {
            Ok(stream) => stream,
            Err(e) => {
                tracing::warn!("Mentor stream failed to start: {}", e);
                self.fail_turn(&turn, open_failure_apology(&e));
                return SendOutcome::Failed;
            }
        };

        let mut reply = String::new();
        while let Some(item) = stream.next().await {
            match item {
                Ok(chunk) => {
                    if chunk.delta.is_empty() {
                        continue;
                    }
                    reply.push_str(&chunk.delta);
                    self.update(|state| {
                        if state.view_epoch == turn.epoch {
                            state.set_content(&turn.placeholder_id, &reply);
                        }
                    });
                }
                Err(e) => {
                    tracing::warn!("Mentor stream failed: {}", e);
                    self.fail_turn(&turn, STREAM_APOLOGY);
                    return SendOutcome::Failed;
                }
            }
        }

        self.update(|state| {
            if state.view_epoch == turn.epoch {
                state.set_content(&turn.placeholder_id, &reply);
                if created {
                    state.active_session_id = session_id.clone();
                }
            }
            if state.turn == turn.number {
                state.is_generating = false;
            }
        });

        if let Some(id) = session_id {
            if !reply.is_empty() {
                self.persist_reply(user_id, id, reply);
            }
        }

        SendOutcome::Completed
    }

    fn fail_turn(&self, turn: &Turn, apology: &str) {
        self.update(|state| {
            if state.view_epoch == turn.epoch {
                state.set_content(&turn.placeholder_id, apology);
            }
            if state.turn == turn.number {
                state.is_generating = false;
            }
        });
    }

    /// Save the finished reply and touch the session without blocking the caller.
    fn persist_reply(&self, user_id: String, session_id: String, reply: String) {
        let store = Arc::clone(&self.inner.store);
        let handle = tokio::spawn(async move {
            if let Err(e) = store
                .add_message(&user_id, &session_id, Role::Assistant, &reply)
                .await
            {
                tracing::warn!(session = %session_id, "Failed to save mentor reply: {:#}", e);
            }
            if let Err(e) = store
                .update_session(&user_id, &session_id, SessionPatch::default())
                .await
            {
                tracing::debug!(session = %session_id, "Session touch failed: {:#}", e);
            }
        });

        let mut pending = self
            .inner
            .pending_writes
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        pending.retain(|h| !h.is_finished());
        pending.push(handle);
    }

    /// Wait for background reply writes to finish.
    pub async fn flush(&self) {
        let handles = {
            let mut pending = self
                .inner
                .pending_writes
                .lock()
                .unwrap_or_else(PoisonError::into_inner);
            std::mem::take(&mut *pending)
        };
        for handle in handles {
            if let Err(e) = handle.await {
                tracing::warn!("Reply write task failed: {}", e);
            }
        }
    }
}

/// Only a missing key means the model was never reachable; every other
/// open failure (rejected request, retries exhausted) is a failed reply.
fn open_failure_apology(err: &MentorError) -> &'static str {
    match err {
        MentorError::MissingCredential { .. } => CONNECT_APOLOGY,
        _ => STREAM_APOLOGY,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_history_skips_greeting() {
        let mut state = ChatState::new();
        state.messages.push(MentorMessage::local_user("hi"));
        let history = state.history();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].role, Role::User);
    }

    #[test]
    fn test_reset_bumps_epoch() {
        let mut state = ChatState::new();
        state.bound_session_id = Some("s".into());
        state.is_generating = true;
        state.reset();
        assert_eq!(state.view_epoch, 1);
        assert!(state.bound_session_id.is_none());
        assert!(!state.is_generating);
        assert_eq!(state.messages.len(), 1);
    }

    #[test]
    fn test_set_content_ignores_unknown_id() {
        let mut state = ChatState::new();
        state.set_content("missing", "x");
        assert!(state.messages[0].is_greeting());
        assert_ne!(state.messages[0].content, "x");
    }

    #[test]
    fn test_open_failure_apology_by_kind() {
        let missing = MentorError::MissingCredential { var: "KEY".into() };
        assert_eq!(open_failure_apology(&missing), CONNECT_APOLOGY);

        let limited = MentorError::RateLimited {
            provider: "gemini".into(),
            retry_after_ms: 0,
        };
        assert_eq!(open_failure_apology(&limited), STREAM_APOLOGY);

        let rejected = MentorError::Provider {
            provider: "gemini".into(),
            message: "API error (403)".into(),
            retriable: false,
        };
        assert_eq!(open_failure_apology(&rejected), STREAM_APOLOGY);
    }

    #[test]
    fn test_options_default_prompt() {
        let opts = MentorOptions::default();
        assert_eq!(opts.system_prompt, MENTOR_SYSTEM_PROMPT);
        assert_eq!(opts.model, "gemini-2.5-flash");
    }
}
