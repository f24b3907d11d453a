// Chat store: client-side state controller for a one-to-one conversation
// Each concern lives in its own file as an `impl ChatStore` block

use log::debug;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::{mpsc, watch};

use crate::models::{TempId, User};
use crate::session::Session;
use crate::transport::{ChatTransport, TransportError};

pub mod fetch;
pub mod ids;
pub mod push;
pub mod retry;
pub mod selection;
pub mod send;
pub mod state;

pub use ids::TempIdAllocator;
pub use push::{Subscription, NEW_MESSAGE_EVENT};
pub use retry::RetrySummary;
pub use state::{ChatState, StateStore};

const DEFAULT_NOTICE_CAPACITY: usize = 100;

/// Errors surfaced by store actions
#[derive(Debug, Error, PartialEq)]
pub enum ChatError {
    /// No peer is selected
    #[error("No conversation selected")]
    NoSelectedUser,

    /// No authenticated user in the session
    #[error("Not signed in")]
    NotAuthenticated,

    /// Draft carries neither text nor an image
    #[error("Message is empty")]
    EmptyMessage,

    /// A push subscription is already active for this store
    #[error("Already subscribed to new messages")]
    AlreadySubscribed,

    /// A read request failed (already reported as a notice)
    #[error("Request failed: {0}")]
    Request(#[from] TransportError),
}

/// User-visible notifications, the equivalent of a toast
#[derive(Debug, Clone, PartialEq)]
pub enum Notice {
    Error(String),
    SendFailed(TempId),
}

#[derive(Clone)]
pub struct ChatStore {
    state: StateStore,
    transport: Arc<dyn ChatTransport>,
    session: Arc<dyn Session>,
    ids: Arc<TempIdAllocator>,
    notice_tx: mpsc::Sender<Notice>,
    subscribed: Arc<AtomicBool>,
    sweeping: Arc<AtomicBool>,
    sweep_requested: Arc<AtomicBool>,
}

impl ChatStore {
    pub fn new(
        transport: Arc<dyn ChatTransport>,
        session: Arc<dyn Session>,
    ) -> (Self, mpsc::Receiver<Notice>) {
        Self::with_notice_capacity(transport, session, DEFAULT_NOTICE_CAPACITY)
    }

    pub fn with_notice_capacity(
        transport: Arc<dyn ChatTransport>,
        session: Arc<dyn Session>,
        capacity: usize,
    ) -> (Self, mpsc::Receiver<Notice>) {
        let (notice_tx, notice_rx) = mpsc::channel(capacity.max(1));
        let store = Self {
            state: StateStore::new(),
            transport,
            session,
            ids: Arc::new(TempIdAllocator::new()),
            notice_tx,
            subscribed: Arc::new(AtomicBool::new(false)),
            sweeping: Arc::new(AtomicBool::new(false)),
            sweep_requested: Arc::new(AtomicBool::new(false)),
        };
        (store, notice_rx)
    }

    /// Snapshot of the current state
    pub fn state(&self) -> ChatState {
        self.state.snapshot()
    }

    /// Receiver that observes every state transition
    pub fn watch(&self) -> watch::Receiver<ChatState> {
        self.state.subscribe()
    }

    fn selected_user(&self) -> Option<User> {
        self.state.read(|s| s.selected_user.clone())
    }

    /// Authenticated user and selected peer, or the precondition that is missing
    fn require_conversation(&self) -> Result<(User, User), ChatError> {
        let me = self.session.current_user().ok_or(ChatError::NotAuthenticated)?;
        let peer = self.selected_user().ok_or(ChatError::NoSelectedUser)?;
        Ok((me, peer))
    }

    // Never blocks; a full notice queue drops the notice
    fn notify(&self, notice: Notice) {
        if let Err(e) = self.notice_tx.try_send(notice) {
            debug!("Dropped notice: {}", e);
        }
    }
}
