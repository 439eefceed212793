// src/store/server.rs — Async message passing for Store, plus session-list feeds

use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::{mpsc, oneshot, watch};

use super::sqlite::Store;
use super::{ChatSession, SessionFeed, SessionPatch, SessionStore, StoredMessage};
use crate::provider::Role;

#[derive(Debug)]
pub enum StoreCommand {
    CreateSession {
        user_id: String,
        title: String,
        resp: oneshot::Sender<anyhow::Result<String>>,
    },
    UpdateSession {
        user_id: String,
        session_id: String,
        patch: SessionPatch,
        resp: oneshot::Sender<anyhow::Result<()>>,
    },
    DeleteSession {
        user_id: String,
        session_id: String,
        resp: oneshot::Sender<anyhow::Result<()>>,
    },
    Subscribe {
        user_id: String,
        resp: oneshot::Sender<anyhow::Result<SessionFeed>>,
    },
    AddMessage {
        user_id: String,
        session_id: String,
        role: Role,
        content: String,
        resp: oneshot::Sender<anyhow::Result<String>>,
    },
    GetMessages {
        user_id: String,
        session_id: String,
        resp: oneshot::Sender<anyhow::Result<Vec<StoredMessage>>>,
    },
}

/// A handle to the Store that uses message passing.
#[derive(Clone)]
pub struct StoreHandle {
    tx: mpsc::Sender<StoreCommand>,
}

impl StoreHandle {
    pub fn new(tx: mpsc::Sender<StoreCommand>) -> Self {
        Self { tx }
    }

    async fn request<T>(
        &self,
        build: impl FnOnce(oneshot::Sender<anyhow::Result<T>>) -> StoreCommand,
    ) -> anyhow::Result<T> {
        let (resp_tx, resp_rx) = oneshot::channel();
        self.tx
            .send(build(resp_tx))
            .await
            .map_err(|_| anyhow::anyhow!("session store is closed"))?;
        resp_rx
            .await
            .map_err(|_| anyhow::anyhow!("session store dropped the request"))?
    }
}

#[async_trait]
impl SessionStore for StoreHandle {
    async fn create_session(&self, user_id: &str, title: &str) -> anyhow::Result<String> {
        self.request(|resp| StoreCommand::CreateSession {
            user_id: user_id.to_string(),
            title: title.to_string(),
            resp,
        })
        .await
    }

    async fn update_session(
        &self,
        user_id: &str,
        session_id: &str,
        patch: SessionPatch,
    ) -> anyhow::Result<()> {
        self.request(|resp| StoreCommand::UpdateSession {
            user_id: user_id.to_string(),
            session_id: session_id.to_string(),
            patch,
            resp,
        })
        .await
    }

    async fn delete_session(&self, user_id: &str, session_id: &str) -> anyhow::Result<()> {
        self.request(|resp| StoreCommand::DeleteSession {
            user_id: user_id.to_string(),
            session_id: session_id.to_string(),
            resp,
        })
        .await
    }

    async fn subscribe_sessions(&self, user_id: &str) -> anyhow::Result<SessionFeed> {
        self.request(|resp| StoreCommand::Subscribe {
            user_id: user_id.to_string(),
            resp,
        })
        .await
    }

    async fn add_message(
        &self,
        user_id: &str,
        session_id: &str,
        role: Role,
        content: &str,
    ) -> anyhow::Result<String> {
        self.request(|resp| StoreCommand::AddMessage {
            user_id: user_id.to_string(),
            session_id: session_id.to_string(),
            role,
            content: content.to_string(),
            resp,
        })
        .await
    }

    async fn get_messages(
        &self,
        user_id: &str,
        session_id: &str,
    ) -> anyhow::Result<Vec<StoredMessage>> {
        self.request(|resp| StoreCommand::GetMessages {
            user_id: user_id.to_string(),
            session_id: session_id.to_string(),
            resp,
        })
        .await
    }
}

/// Helper to spawn the store server and return a handle.
pub fn spawn_store_server(store: Store) -> (StoreHandle, tokio::task::JoinHandle<()>) {
    let (tx, rx) = mpsc::channel(100);
    let handle = StoreHandle::new(tx);
    let join_handle = tokio::spawn(run_store_server(store, rx));
    (handle, join_handle)
}

/// Live session-list feeds, one per subscribed user.
#[derive(Default)]
struct Feeds {
    senders: HashMap<String, watch::Sender<Vec<ChatSession>>>,
}

impl Feeds {
    fn subscribe(&mut self, store: &Store, user_id: &str) -> anyhow::Result<SessionFeed> {
        let sessions = store.list_sessions(user_id)?;
        match self.senders.get(user_id) {
            Some(tx) => {
                tx.send_replace(sessions);
                Ok(tx.subscribe())
            }
            None => {
                let (tx, rx) = watch::channel(sessions);
                self.senders.insert(user_id.to_string(), tx);
                Ok(rx)
            }
        }
    }

    /// Push the fresh list to a user's subscribers after a mutation.
    fn publish(&mut self, store: &Store, user_id: &str) {
        let Some(tx) = self.senders.get(user_id) else {
            return;
        };
        if tx.receiver_count() == 0 {
            self.senders.remove(user_id);
            return;
        }
        match store.list_sessions(user_id) {
            Ok(sessions) => {
                tx.send_replace(sessions);
            }
            Err(e) => tracing::warn!(user = user_id, "Failed to refresh session feed: {}", e),
        }
    }
}

pub async fn run_store_server(store: Store, mut rx: mpsc::Receiver<StoreCommand>) {
    let mut feeds = Feeds::default();

    while let Some(cmd) = rx.recv().await {
        match cmd {
            StoreCommand::CreateSession {
                user_id,
                title,
                resp,
            } => {
                let res = store.create_session(&user_id, &title);
                if res.is_ok() {
                    feeds.publish(&store, &user_id);
                }
                let _ = resp.send(res);
            }
            StoreCommand::UpdateSession {
                user_id,
                session_id,
                patch,
                resp,
            } => {
                let res = store.update_session(&user_id, &session_id, &patch);
                if res.is_ok() {
                    feeds.publish(&store, &user_id);
                }
                let _ = resp.send(res);
            }
            StoreCommand::DeleteSession {
                user_id,
                session_id,
                resp,
            } => {
                let res = store.delete_session(&user_id, &session_id);
                if res.is_ok() {
                    feeds.publish(&store, &user_id);
                }
                let _ = resp.send(res);
            }
            StoreCommand::Subscribe { user_id, resp } => {
                let res = feeds.subscribe(&store, &user_id);
                let _ = resp.send(res);
            }
            StoreCommand::AddMessage {
                user_id,
                session_id,
                role,
                content,
                resp,
            } => {
                let res = store.add_message(&user_id, &session_id, role, &content);
                if res.is_ok() {
                    feeds.publish(&store, &user_id);
                }
                let _ = resp.send(res);
            }
            StoreCommand::GetMessages {
                user_id,
                session_id,
                resp,
            } => {
                let res = store.get_messages(&user_id, &session_id);
                let _ = resp.send(res);
            }
        }
    }
}
