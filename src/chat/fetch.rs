// User directory and conversation history fetches

use log::{error, info, warn};

use super::{ChatError, ChatStore, Notice, StateStore};
use crate::models::Message;

#[derive(Clone, Copy)]
enum LoadingFlag {
    Users,
    Messages,
}

/// Raises a loading flag for its lifetime; the flag is cleared on every exit path.
struct LoadingGuard<'a> {
    state: &'a StateStore,
    flag: LoadingFlag,
}

impl<'a> LoadingGuard<'a> {
    fn raise(state: &'a StateStore, flag: LoadingFlag) -> Self {
        state.update(|s| match flag {
            LoadingFlag::Users => s.is_users_loading = true,
            LoadingFlag::Messages => s.is_messages_loading = true,
        });
        LoadingGuard { state, flag }
    }
}

impl Drop for LoadingGuard<'_> {
    fn drop(&mut self) {
        let flag = self.flag;
        self.state.update(|s| match flag {
            LoadingFlag::Users => s.is_users_loading = false,
            LoadingFlag::Messages => s.is_messages_loading = false,
        });
    }
}

impl ChatStore {
    /// Refresh the user directory. On failure the previous list is kept and a notice is raised.
    pub async fn get_users(&self) -> Result<(), ChatError> {
        let _loading = LoadingGuard::raise(&self.state, LoadingFlag::Users);

        match self.transport.fetch_users().await {
            Ok(users) => {
                info!("Loaded {} users", users.len());
                self.state.update(|s| s.users = users);
                Ok(())
            }
            Err(e) => {
                error!("Failed to load users: {}", e);
                self.notify(Notice::Error(e.user_message()));
                Err(e.into())
            }
        }
    }

    /// Replace the conversation with the server's history for `peer_id`.
    ///
    /// This is not a merge: provisional and pushed messages not in the history
    /// are discarded. A response for a peer that is no longer selected is dropped.
    pub async fn get_messages(&self, peer_id: &str) -> Result<(), ChatError> {
        let _loading = LoadingGuard::raise(&self.state, LoadingFlag::Messages);

        match self.transport.fetch_messages(peer_id).await {
            Ok(records) => {
                let history: Vec<Message> = records.into_iter().map(Message::from).collect();
                let count = history.len();
                let applied = self.state.update_if(|s| {
                    if s.selected_user_id().map_or(false, |selected| selected != peer_id) {
                        return false;
                    }
                    s.messages = history;
                    true
                });
                if applied {
                    info!("Loaded {} messages with {}", count, peer_id);
                } else {
                    warn!("Discarding history for {}: selection changed while loading", peer_id);
                }
                Ok(())
            }
            Err(e) => {
                error!("Failed to load messages with {}: {}", peer_id, e);
                self.notify(Notice::Error(e.user_message()));
                Err(e.into())
            }
        }
    }
}
