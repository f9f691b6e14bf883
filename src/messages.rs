use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

use crate::{
    ChatError, Username,
    store::{Collection, CollectionStore, fields},
};

const SENDER: &str = "sender";
const BODY: &str = "body";

/// One line of the transcript as the UI shows it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageView {
    pub sender: String,
    pub body: String,
}

impl MessageView {
    pub fn new(sender: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            sender: sender.into(),
            body: body.into(),
        }
    }
}

/// Append-only transcript in the message collection.
#[derive(Clone)]
pub struct MessageClient<S> {
    store: S,
}

impl<S: CollectionStore> MessageClient<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    #[instrument(skip(self, sender, body), fields(sender = %sender, len = body.len()))]
    pub async fn append(&self, sender: &Username, body: &str) -> Result<(), ChatError> {
        let record = self
            .store
            .create(Collection::Messages, fields([(SENDER, sender.as_str()), (BODY, body)]))
            .await?;
        debug!(id = record.id, "message appended");
        Ok(())
    }

    /// Every message in store order.
    pub async fn list(&self) -> Result<Vec<MessageView>, ChatError> {
        let records = self.store.list(Collection::Messages).await?;
        Ok(records
            .iter()
            .map(|r| MessageView {
                sender: r.str_attr(SENDER).unwrap_or_default().to_owned(),
                body: r.str_attr(BODY).unwrap_or_default().to_owned(),
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;

    #[tokio::test]
    async fn test_list_keeps_store_order() {
        let messages = MessageClient::new(MemoryStore::new());
        let alice = Username::parse("alice").unwrap();
        let bob = Username::parse("bob").unwrap();
        messages.append(&alice, "first").await.unwrap();
        messages.append(&bob, "second").await.unwrap();
        messages.append(&alice, "third").await.unwrap();

        assert_eq!(
            messages.list().await.unwrap(),
            vec![
                MessageView::new("alice", "first"),
                MessageView::new("bob", "second"),
                MessageView::new("alice", "third"),
            ]
        );
    }

    #[tokio::test]
    async fn test_append_offline_is_unavailable() {
        let store = MemoryStore::new();
        store.set_offline(true);
        let messages = MessageClient::new(store);
        let err = messages.append(&Username::parse("alice").unwrap(), "hi").await.unwrap_err();
        assert!(matches!(err, ChatError::StoreUnavailable(_)));
    }
}
