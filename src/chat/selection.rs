use log::{info, warn};

use super::{ChatError, ChatStore, Subscription};
use crate::models::User;

impl ChatStore {
    /// Replace the selected peer. History and subscriptions are left alone;
    /// see `open_conversation` for the full switch.
    pub fn set_selected_user(&self, user: Option<User>) {
        self.state.update(|s| s.selected_user = user);
    }

    /// Switch to `peer`: drop the previous subscription, select, load history, subscribe.
    ///
    /// A failed history load is already reported as a notice; the subscription
    /// is still established so live messages are not missed.
    pub async fn open_conversation(
        &self,
        peer: User,
        previous: Option<Subscription>,
    ) -> Result<Subscription, ChatError> {
        if let Some(subscription) = previous {
            self.unsubscribe_from_messages(subscription);
        }

        info!("Opening conversation with {}", peer.id);
        let peer_id = peer.id.clone();
        self.set_selected_user(Some(peer));

        if let Err(e) = self.get_messages(&peer_id).await {
            warn!("Opened conversation with {} without history: {}", peer_id, e);
        }

        self.subscribe_to_messages()
    }
}
