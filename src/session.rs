// Authenticated session and its real-time event channel
// The chat store reaches both only through these traits

use log::debug;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, RwLock};

use crate::models::User;

/// Callback attached to a named event
pub type EventHandler = Arc<dyn Fn(&serde_json::Value) + Send + Sync>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(pub u64);

/// Named-event subscription over a bidirectional real-time connection
pub trait EventChannel: Send + Sync {
    fn on(&self, event: &str, handler: EventHandler) -> ListenerId;
    fn off(&self, event: &str, listener: ListenerId);
}

pub trait Session: Send + Sync {
    fn current_user(&self) -> Option<User>;
    fn event_channel(&self) -> Arc<dyn EventChannel>;
}

/// In-process event channel. Whatever owns the socket feeds it through `emit`.
#[derive(Default)]
pub struct LocalEventChannel {
    next_id: AtomicU64,
    listeners: Mutex<HashMap<String, Vec<(ListenerId, EventHandler)>>>,
}

impl LocalEventChannel {
    pub fn new() -> Self {
        Self::default()
    }

    /// Deliver `payload` to every handler registered for `event`; returns how many ran.
    pub fn emit(&self, event: &str, payload: &serde_json::Value) -> usize {
        // Clone out so handlers can call on/off without deadlocking
        let handlers: Vec<EventHandler> = match self.listeners.lock() {
            Ok(listeners) => listeners
                .get(event)
                .map(|hs| hs.iter().map(|(_, h)| h.clone()).collect())
                .unwrap_or_default(),
            Err(_) => return 0,
        };
        for handler in &handlers {
            handler(payload);
        }
        handlers.len()
    }

    pub fn listener_count(&self, event: &str) -> usize {
        self.listeners
            .lock()
            .map(|l| l.get(event).map_or(0, |hs| hs.len()))
            .unwrap_or(0)
    }
}

impl EventChannel for LocalEventChannel {
    fn on(&self, event: &str, handler: EventHandler) -> ListenerId {
        let id = ListenerId(self.next_id.fetch_add(1, Ordering::Relaxed));
        if let Ok(mut listeners) = self.listeners.lock() {
            listeners.entry(event.to_string()).or_default().push((id, handler));
        }
        debug!("Attached listener {:?} for '{}'", id, event);
        id
    }

    fn off(&self, event: &str, listener: ListenerId) {
        if let Ok(mut listeners) = self.listeners.lock() {
            if let Some(handlers) = listeners.get_mut(event) {
                handlers.retain(|(id, _)| *id != listener);
                if handlers.is_empty() {
                    listeners.remove(event);
                }
            }
        }
        debug!("Detached listener {:?} for '{}'", listener, event);
    }
}

/// Session with a settable user and a local event channel.
pub struct StaticSession {
    user: RwLock<Option<User>>,
    channel: Arc<LocalEventChannel>,
}

impl StaticSession {
    pub fn new(user: Option<User>) -> Self {
        StaticSession {
            user: RwLock::new(user),
            channel: Arc::new(LocalEventChannel::new()),
        }
    }

    pub fn channel(&self) -> Arc<LocalEventChannel> {
        self.channel.clone()
    }

    pub fn set_user(&self, user: Option<User>) {
        if let Ok(mut current) = self.user.write() {
            *current = user;
        }
    }
}

impl Session for StaticSession {
    fn current_user(&self) -> Option<User> {
        self.user.read().ok().and_then(|u| u.clone())
    }

    fn event_channel(&self) -> Arc<dyn EventChannel> {
        self.channel.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    #[test]
    fn test_emit_reaches_only_named_event() {
        let channel = LocalEventChannel::new();
        let hits = Arc::new(AtomicUsize::new(0));
        let counter = hits.clone();
        channel.on("newMessage", Arc::new(move |_: &serde_json::Value| {
            counter.fetch_add(1, Ordering::SeqCst);
        }));

        assert_eq!(channel.emit("newMessage", &serde_json::json!({})), 1);
        assert_eq!(channel.emit("typing", &serde_json::json!({})), 0);
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_off_detaches_single_listener() {
        let channel = LocalEventChannel::new();
        let a = channel.on("newMessage", Arc::new(|_: &serde_json::Value| {}));
        let _b = channel.on("newMessage", Arc::new(|_: &serde_json::Value| {}));
        assert_eq!(channel.listener_count("newMessage"), 2);

        channel.off("newMessage", a);
        assert_eq!(channel.listener_count("newMessage"), 1);
    }

    #[test]
    fn test_static_session_user() {
        let session = StaticSession::new(None);
        assert!(session.current_user().is_none());
        session.set_user(Some(User::new("u1", "Ada")));
        assert_eq!(session.current_user().map(|u| u.id), Some("u1".to_string()));
    }
}
