// Common test utilities for integration tests
// Scripted transport, session wiring and state-waiting helpers

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, Once};

use async_trait::async_trait;
use chrono::Utc;
use log::LevelFilter;
use tokio::sync::{mpsc, oneshot, watch, Notify};
use tokio::time::{timeout, Duration};

use chatsync::chat::ChatState;
use chatsync::session::{LocalEventChannel, StaticSession};
use chatsync::transport::{ChatTransport, TransportError};
use chatsync::{ChatStore, MessageRecord, Notice, OutgoingMessage, TempId, User};

// Initialize logging once
static INIT_LOGGER: Once = Once::new();

pub const ME: &str = "user-me";
pub const PEER: &str = "user-peer";
pub const OTHER: &str = "user-other";

/// Set up the logger for the tests
pub fn setup_logging() {
    INIT_LOGGER.call_once(|| {
        let _ = env_logger::Builder::new()
            .filter_level(LevelFilter::Debug)
            .is_test(true)
            .try_init();
    });
}

pub fn me() -> User {
    User::new(ME, "Me")
}

pub fn peer() -> User {
    User::new(PEER, "Peer")
}

pub fn other() -> User {
    User::new(OTHER, "Other")
}

/// How the mock answers `send_message`
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SendMode {
    Succeed,
    Fail,
    /// Park each request until the test releases it
    Gated,
}

type Gate = (TempId, oneshot::Sender<Result<MessageRecord, TransportError>>);

pub struct MockTransport {
    users: Mutex<Result<Vec<User>, TransportError>>,
    history: Mutex<HashMap<String, Result<Vec<MessageRecord>, TransportError>>>,
    send_mode: Mutex<SendMode>,
    sent: Mutex<Vec<(String, OutgoingMessage)>>,
    gates: Mutex<Vec<Gate>>,
    hold_fetches: AtomicBool,
    fetch_gate: Notify,
    next_server_id: AtomicU64,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

impl MockTransport {
    pub fn new() -> Arc<Self> {
        Arc::new(MockTransport {
            users: Mutex::new(Ok(Vec::new())),
            history: Mutex::new(HashMap::new()),
            send_mode: Mutex::new(SendMode::Succeed),
            sent: Mutex::new(Vec::new()),
            gates: Mutex::new(Vec::new()),
            hold_fetches: AtomicBool::new(false),
            fetch_gate: Notify::new(),
            next_server_id: AtomicU64::new(1),
            in_flight: AtomicUsize::new(0),
            max_in_flight: AtomicUsize::new(0),
        })
    }

    pub fn set_users(&self, users: Result<Vec<User>, TransportError>) {
        *self.users.lock().unwrap() = users;
    }

    pub fn set_history(&self, peer_id: &str, history: Result<Vec<MessageRecord>, TransportError>) {
        self.history.lock().unwrap().insert(peer_id.to_string(), history);
    }

    /// Park user/history fetches until `release_fetch` is called
    pub fn hold_fetches(&self) {
        self.hold_fetches.store(true, Ordering::SeqCst);
    }

    /// Let one parked (or the next) fetch complete
    pub fn release_fetch(&self) {
        self.fetch_gate.notify_one();
    }

    async fn fetch_pause(&self) {
        if self.hold_fetches.load(Ordering::SeqCst) {
            self.fetch_gate.notified().await;
        } else {
            tokio::task::yield_now().await;
        }
    }

    pub fn set_send_mode(&self, mode: SendMode) {
        *self.send_mode.lock().unwrap() = mode;
    }

    /// Every send request seen so far, in order
    pub fn sent(&self) -> Vec<(String, OutgoingMessage)> {
        self.sent.lock().unwrap().clone()
    }

    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    pub fn pending_gates(&self) -> usize {
        self.gates.lock().unwrap().len()
    }

    /// Temp ids of the parked requests, in arrival order
    pub fn gated_temp_ids(&self) -> Vec<TempId> {
        self.gates.lock().unwrap().iter().map(|(t, _)| t.clone()).collect()
    }

    /// Answer the parked request for `temp_id`
    pub fn release(&self, temp_id: &TempId, result: Result<MessageRecord, TransportError>) {
        let gate = {
            let mut gates = self.gates.lock().unwrap();
            let pos = gates.iter().position(|(t, _)| t == temp_id).expect("no gated request");
            gates.remove(pos)
        };
        let _ = gate.1.send(result);
    }

    /// The record a well-behaved server would return for `outgoing`
    pub fn confirm(&self, outgoing: &OutgoingMessage, receiver_id: &str) -> MessageRecord {
        let n = self.next_server_id.fetch_add(1, Ordering::SeqCst);
        MessageRecord {
            id: format!("srv-{}", n),
            sender_id: ME.to_string(),
            receiver_id: receiver_id.to_string(),
            text: outgoing.text.clone(),
            image: outgoing.image.clone(),
            created_at: Utc::now(),
            temp_id: Some(outgoing.temp_id.clone()),
        }
    }
}

#[async_trait]
impl ChatTransport for MockTransport {
    async fn fetch_users(&self) -> Result<Vec<User>, TransportError> {
        self.fetch_pause().await;
        self.users.lock().unwrap().clone()
    }

    async fn fetch_messages(&self, peer_id: &str) -> Result<Vec<MessageRecord>, TransportError> {
        self.fetch_pause().await;
        self.history
            .lock()
            .unwrap()
            .get(peer_id)
            .cloned()
            .unwrap_or_else(|| Ok(Vec::new()))
    }

    async fn send_message(
        &self,
        peer_id: &str,
        outgoing: &OutgoingMessage,
    ) -> Result<MessageRecord, TransportError> {
        self.sent.lock().unwrap().push((peer_id.to_string(), outgoing.clone()));
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);

        // Give any other task a chance to start a request concurrently
        tokio::task::yield_now().await;

        let mode = *self.send_mode.lock().unwrap();
        let result = match mode {
            SendMode::Succeed => Ok(self.confirm(outgoing, peer_id)),
            SendMode::Fail => Err(TransportError::Network("network unreachable".to_string())),
            SendMode::Gated => {
                let (tx, rx) = oneshot::channel();
                self.gates.lock().unwrap().push((outgoing.temp_id.clone(), tx));
                rx.await
                    .unwrap_or_else(|_| Err(TransportError::Network("gate dropped".to_string())))
            }
        };

        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        result
    }
}

pub struct Harness {
    pub store: ChatStore,
    pub notices: mpsc::Receiver<Notice>,
    pub transport: Arc<MockTransport>,
    pub session: Arc<StaticSession>,
    pub channel: Arc<LocalEventChannel>,
}

/// Store signed in as `me()` with nothing selected
pub fn harness() -> Harness {
    setup_logging();
    let transport = MockTransport::new();
    let session = Arc::new(StaticSession::new(Some(me())));
    let channel = session.channel();
    let (store, notices) = ChatStore::new(transport.clone(), session.clone());
    Harness { store, notices, transport, session, channel }
}

/// Store signed in as `me()` with `peer()` selected
pub fn harness_with_peer() -> Harness {
    let h = harness();
    h.store.set_selected_user(Some(peer()));
    h
}

pub fn record(id: &str, sender: &str, receiver: &str, text: &str) -> MessageRecord {
    MessageRecord {
        id: id.to_string(),
        sender_id: sender.to_string(),
        receiver_id: receiver.to_string(),
        text: Some(text.to_string()),
        image: None,
        created_at: Utc::now(),
        temp_id: None,
    }
}

/// Wait until the store state satisfies `predicate`, or fail after a few seconds
pub async fn wait_for_state(
    rx: &mut watch::Receiver<ChatState>,
    predicate: impl Fn(&ChatState) -> bool,
) -> ChatState {
    let result = timeout(Duration::from_secs(5), async {
        loop {
            {
                let state = rx.borrow_and_update();
                if predicate(&state) {
                    return (*state).clone();
                }
            }
            if rx.changed().await.is_err() {
                panic!("state store dropped");
            }
        }
    })
    .await;
    result.expect("timed out waiting for state")
}

pub fn push_payload(record: &MessageRecord) -> serde_json::Value {
    serde_json::to_value(record).expect("record serializes")
}

/// Let spawned tasks run for a while
pub async fn settle() {
    for _ in 0..20 {
        tokio::task::yield_now().await;
    }
}

/// Yield until `n` requests are parked in the mock
pub async fn wait_for_gates(transport: &MockTransport, n: usize) {
    timeout(Duration::from_secs(5), async {
        while transport.pending_gates() < n {
            tokio::task::yield_now().await;
        }
    })
    .await
    .expect("timed out waiting for gated requests");
}
