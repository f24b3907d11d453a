// Live "newMessage" push subscription
// At most one subscription per store; the handle detaches its listener when dropped

use log::{debug, info, warn};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use super::{ChatError, ChatStore};
use crate::models::{Message, MessageRecord};
use crate::session::{EventChannel, EventHandler, ListenerId};

pub const NEW_MESSAGE_EVENT: &str = "newMessage";

/// Active push subscription for one peer.
#[must_use = "dropping the subscription detaches it immediately"]
pub struct Subscription {
    peer_id: String,
    listener: ListenerId,
    channel: Arc<dyn EventChannel>,
    active: Arc<AtomicBool>,
}

impl Subscription {
    pub fn peer_id(&self) -> &str {
        &self.peer_id
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.channel.off(NEW_MESSAGE_EVENT, self.listener);
        self.active.store(false, Ordering::Release);
        debug!("Push subscription for {} released", self.peer_id);
    }
}

impl ChatStore {
    /// Start appending pushed messages from the selected peer.
    ///
    /// Events from any other sender are dropped, as are events that arrive
    /// after the selection has moved away from the subscribed peer.
    pub fn subscribe_to_messages(&self) -> Result<Subscription, ChatError> {
        let peer = self.selected_user().ok_or(ChatError::NoSelectedUser)?;

        if self.subscribed.swap(true, Ordering::AcqRel) {
            warn!("Refusing second push subscription (peer {})", peer.id);
            return Err(ChatError::AlreadySubscribed);
        }

        let state = self.state.clone();
        let peer_id = peer.id.clone();
        let handler: EventHandler = Arc::new(move |payload: &serde_json::Value| {
            let record: MessageRecord = match serde_json::from_value(payload.clone()) {
                Ok(record) => record,
                Err(e) => {
                    warn!("Ignoring malformed {} payload: {}", NEW_MESSAGE_EVENT, e);
                    return;
                }
            };
            if record.sender_id != peer_id {
                debug!("Ignoring push from {} (subscribed to {})", record.sender_id, peer_id);
                return;
            }
            let message = Message::from(record);
            state.update_if(|s| {
                s.selected_user_id() == Some(peer_id.as_str()) && s.append_message(message)
            });
        });

        let channel = self.session.event_channel();
        let listener = channel.on(NEW_MESSAGE_EVENT, handler);
        info!("Subscribed to new messages from {}", peer.id);

        Ok(Subscription {
            peer_id: peer.id,
            listener,
            channel,
            active: self.subscribed.clone(),
        })
    }

    /// Detach the push listener held by `subscription`.
    pub fn unsubscribe_from_messages(&self, subscription: Subscription) {
        info!("Unsubscribing from new messages from {}", subscription.peer_id());
        drop(subscription);
    }
}
