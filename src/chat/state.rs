// Conversation state and the reconciliation rules applied to it
// Every mutation goes through StateStore, which notifies observers on change

use log::debug;
use std::sync::Arc;
use tokio::sync::watch;

use crate::models::{DeliveryStatus, Message, TempId, User};

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ChatState {
    pub messages: Vec<Message>,
    pub users: Vec<User>,
    pub selected_user: Option<User>,
    pub is_users_loading: bool,
    pub is_messages_loading: bool,
}

impl ChatState {
    pub fn selected_user_id(&self) -> Option<&str> {
        self.selected_user.as_ref().map(|u| u.id.as_str())
    }

    /// Look up a message by the id it is currently known by
    pub fn message(&self, id: &str) -> Option<&Message> {
        self.messages.iter().find(|m| m.id.key() == id)
    }

    pub fn find_by_temp_id(&self, temp_id: &TempId) -> Option<&Message> {
        self.messages.iter().find(|m| m.id.temp_id() == Some(temp_id))
    }

    /// Messages authored by `sender_id` that are still sending or have failed, in order
    pub fn unsent_messages(&self, sender_id: &str) -> Vec<Message> {
        self.messages
            .iter()
            .filter(|m| m.is_unsent() && m.sender_id == sender_id)
            .cloned()
            .collect()
    }

    fn position_of_temp(&self, temp_id: &TempId) -> Option<usize> {
        self.messages.iter().position(|m| m.id.temp_id() == Some(temp_id))
    }

    /// Append unless a message with the same id is already present.
    pub(crate) fn append_message(&mut self, message: Message) -> bool {
        if self.message(message.id.key()).is_some() {
            debug!("Message {} already in conversation, not appending", message.id.key());
            return false;
        }
        self.messages.push(message);
        true
    }

    /// Replace the message tracked under `temp_id` with its confirmed form.
    ///
    /// Applying the same confirmation twice leaves the state unchanged, and a
    /// later confirmation carrying a different server id is ignored. If the
    /// server copy already arrived under its permanent id (e.g. a history
    /// refetch), the provisional entry is dropped so ids stay unique.
    pub(crate) fn apply_confirmation(&mut self, temp_id: &TempId, confirmed: Message) -> bool {
        let pos = match self.position_of_temp(temp_id) {
            Some(pos) => pos,
            None => {
                debug!("No message tracked under {}, ignoring confirmation", temp_id);
                return false;
            }
        };

        let current = &self.messages[pos];
        if *current == confirmed {
            return false;
        }
        if current.id.is_confirmed() {
            // A resubmitted message can be confirmed twice; the first server id stays
            debug!(
                "Message {} already confirmed as {}, ignoring {}",
                temp_id,
                current.id.key(),
                confirmed.id.key()
            );
            return false;
        }

        let already_present = self
            .messages
            .iter()
            .any(|m| m.id.key() == confirmed.id.key() && m.id.temp_id() != Some(temp_id));
        if already_present {
            debug!("Server copy of {} already present, dropping provisional entry", temp_id);
            self.messages.remove(pos);
            return true;
        }

        debug!("Reconciled {} -> {}", temp_id, confirmed.id.key());
        self.messages[pos] = confirmed;
        true
    }

    /// Only a message still in flight can fail; a confirmed one is never downgraded.
    pub(crate) fn mark_failed(&mut self, temp_id: &TempId) -> bool {
        self.transition(temp_id, DeliveryStatus::Sending, DeliveryStatus::Failed)
    }

    pub(crate) fn mark_sending(&mut self, temp_id: &TempId) -> bool {
        self.transition(temp_id, DeliveryStatus::Failed, DeliveryStatus::Sending)
    }

    fn transition(&mut self, temp_id: &TempId, from: DeliveryStatus, to: DeliveryStatus) -> bool {
        match self.position_of_temp(temp_id) {
            Some(pos) if self.messages[pos].status == from => {
                debug!("Message {} status {:?} -> {:?}", temp_id, from, to);
                self.messages[pos].status = to;
                true
            }
            _ => false,
        }
    }
}

/// Observable holder of the single `ChatState`.
#[derive(Clone)]
pub struct StateStore {
    tx: Arc<watch::Sender<ChatState>>,
}

impl StateStore {
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(ChatState::default());
        StateStore { tx: Arc::new(tx) }
    }

    pub fn snapshot(&self) -> ChatState {
        self.tx.borrow().clone()
    }

    /// Read without cloning. Must not call back into the store.
    pub fn read<R>(&self, f: impl FnOnce(&ChatState) -> R) -> R {
        f(&self.tx.borrow())
    }

    pub fn subscribe(&self) -> watch::Receiver<ChatState> {
        self.tx.subscribe()
    }

    pub fn update(&self, f: impl FnOnce(&mut ChatState)) {
        self.tx.send_modify(f);
    }

    /// Apply a transition and notify observers only if it reports a change.
    pub fn update_if(&self, f: impl FnOnce(&mut ChatState) -> bool) -> bool {
        self.tx.send_if_modified(f)
    }
}

impl Default for StateStore {
    fn default() -> Self {
        Self::new()
    }
}
