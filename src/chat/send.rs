// Optimistic send pipeline
// A provisional message is appended before any I/O, then reconciled by its
// temporary id once the server answers, or marked failed in place.

use log::{debug, error, info, warn};

use super::{ChatError, ChatStore, Notice};
use crate::models::{Message, MessageDraft, MessageId, MessageRecord, OutgoingMessage, TempId};
use crate::transport::TransportError;

impl ChatStore {
    /// Send `draft` to the selected peer.
    ///
    /// Returns `Err` only when a precondition is not met, in which case nothing
    /// was appended. `Ok(None)` means the request failed and the message is now
    /// `Failed`; `Ok(Some(..))` carries the confirmed message.
    pub async fn send_message(&self, draft: MessageDraft) -> Result<Option<Message>, ChatError> {
        if draft.is_empty() {
            return Err(ChatError::EmptyMessage);
        }
        let (me, peer) = self.require_conversation()?;

        let temp_id = self.ids.next_id();
        let provisional = Message::provisional(temp_id.clone(), &draft, &me.id, &peer.id);
        let outgoing = OutgoingMessage::from_message(&provisional, temp_id.clone());

        self.state.update(|s| {
            s.append_message(provisional);
        });
        debug!("Queued message {} for {}", temp_id, peer.id);

        match self.submit(&peer.id, &outgoing).await {
            Ok(confirmed) => Ok(Some(confirmed)),
            Err(e) => {
                error!("Message {} failed to send: {}", temp_id, e);
                self.notify(Notice::SendFailed(temp_id));
                Ok(None)
            }
        }
    }

    /// Reconcile a server confirmation against the message tracked under `temp_id`.
    /// Safe to call more than once with the same record.
    pub fn apply_confirmation(&self, temp_id: &TempId, record: MessageRecord) -> Message {
        if record.temp_id.as_ref() != Some(temp_id) {
            warn!(
                "Confirmation {} echoed tempId {:?}, reconciling against {}",
                record.id, record.temp_id, temp_id
            );
        }

        let mut confirmed = Message::from(record);
        confirmed.id = MessageId::Confirmed {
            id: confirmed.id.key().to_string(),
            temp_id: Some(temp_id.clone()),
        };

        self.state.update_if(|s| s.apply_confirmation(temp_id, confirmed.clone()));
        confirmed
    }

    /// One network round-trip for an already-tracked message.
    /// Failure leaves the message `Failed`; the caller decides how to report it.
    pub(crate) async fn submit(
        &self,
        peer_id: &str,
        outgoing: &OutgoingMessage,
    ) -> Result<Message, TransportError> {
        match self.transport.send_message(peer_id, outgoing).await {
            Ok(record) => {
                let confirmed = self.apply_confirmation(&outgoing.temp_id, record);
                info!("Message {} confirmed as {}", outgoing.temp_id, confirmed.id.key());
                Ok(confirmed)
            }
            Err(e) => {
                self.state.update_if(|s| s.mark_failed(&outgoing.temp_id));
                Err(e)
            }
        }
    }
}
