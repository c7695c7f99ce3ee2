//! Conversation persistence on top of a backend adapter.

use crate::MnemeCoreError;
use chrono::Utc;
use log::{debug, info};
use mneme_rs_protocol::{Conversation, ConversationId, Event, EventId};
use mneme_rs_storage::tenancy::unescape_component;
use mneme_rs_storage::{
    BackendAdapter, Document, KeyGuard, KeyedLocks, StorageError, Subsystem, Tenancy, TenancyKey,
    resolve, resolve_user_scope,
};
use serde_json::Value;
use std::sync::Arc;

/// Leaf name of the document holding a conversation under its tenancy prefix.
const CONVERSATION_DOCUMENT: &str = "conversation";

/// Stores one document per conversation and serializes mutations per key.
///
/// Appends are read-modify-write cycles under a per-conversation lock, so
/// concurrent appends to one conversation are totally ordered while distinct
/// conversations proceed in parallel.
pub struct ConversationStore {
    backend: Arc<dyn BackendAdapter>,
    locks: KeyedLocks,
}

impl ConversationStore {
    pub fn new(backend: Arc<dyn BackendAdapter>) -> Self {
        Self {
            backend,
            locks: KeyedLocks::new(),
        }
    }

    /// Adapter this store writes to.
    pub fn backend(&self) -> &Arc<dyn BackendAdapter> {
        &self.backend
    }

    /// Create an empty conversation; fails if the id is taken.
    pub async fn create_conversation(
        &self,
        app: &str,
        user: &str,
        id: &str,
    ) -> Result<Conversation, MnemeCoreError> {
        let (tenancy, key) = conversation_key(app, user, id)?;
        let _guard = self.lock(&tenancy).await;
        let conversation = Conversation::new(app, user, id);
        self.backend
            .create(&key, Document::encode(&conversation)?)
            .await
            .map_err(|err| conversation_error(err, id))?;
        info!("conversation created (app={app}, user={user}, conversation={id})");
        Ok(conversation)
    }

    /// Load a conversation.
    pub async fn get_conversation(
        &self,
        app: &str,
        user: &str,
        id: &str,
    ) -> Result<Conversation, MnemeCoreError> {
        let (_, key) = conversation_key(app, user, id)?;
        self.load(&key, id).await
    }

    /// Load a conversation, creating it when absent.
    pub async fn get_or_create_conversation(
        &self,
        app: &str,
        user: &str,
        id: &str,
    ) -> Result<Conversation, MnemeCoreError> {
        let (tenancy, key) = conversation_key(app, user, id)?;
        let _guard = self.lock(&tenancy).await;
        match self.load(&key, id).await {
            Ok(conversation) => Ok(conversation),
            Err(MnemeCoreError::NotFound(_)) => {
                let conversation = Conversation::new(app, user, id);
                self.backend
                    .create(&key, Document::encode(&conversation)?)
                    .await
                    .map_err(|err| conversation_error(err, id))?;
                info!("conversation created (app={app}, user={user}, conversation={id})");
                Ok(conversation)
            }
            Err(err) => Err(err),
        }
    }

    /// Append an event, returning its index in the log.
    pub async fn append_event(
        &self,
        app: &str,
        user: &str,
        id: &str,
        event: Event,
    ) -> Result<usize, MnemeCoreError> {
        let conversation = self.append(app, user, id, event, false).await?;
        Ok(conversation.events.len() - 1)
    }

    /// Append an event and return the updated conversation.
    ///
    /// With `create_missing` the conversation is created on its first event.
    pub async fn append(
        &self,
        app: &str,
        user: &str,
        id: &str,
        event: Event,
        create_missing: bool,
    ) -> Result<Conversation, MnemeCoreError> {
        let (tenancy, key) = conversation_key(app, user, id)?;
        let _guard = self.lock(&tenancy).await;
        let mut conversation = match self.load(&key, id).await {
            Ok(conversation) => conversation,
            Err(MnemeCoreError::NotFound(_)) if create_missing => {
                info!("conversation created on first event (app={app}, user={user}, conversation={id})");
                Conversation::new(app, user, id)
            }
            Err(err) => return Err(err),
        };
        let event_id = event.id;
        conversation.events.push(event);
        conversation.last_updated_at = Utc::now();
        self.backend
            .write(&key, Document::encode(&conversation)?)
            .await?;
        debug!(
            "event appended (conversation={id}, event_id={event_id}, index={})",
            conversation.events.len() - 1
        );
        Ok(conversation)
    }

    /// Ids of a user's conversations, sorted.
    pub async fn list_conversations(
        &self,
        app: &str,
        user: &str,
    ) -> Result<Vec<ConversationId>, MnemeCoreError> {
        let scope = resolve_user_scope(Subsystem::ShortTerm, app, user)?;
        let keys = self.backend.list(scope.prefix()).await?;
        Ok(keys
            .iter()
            .filter_map(|key| conversation_id_from_key(&scope, key))
            .collect())
    }

    /// Remove a conversation.
    pub async fn delete_conversation(
        &self,
        app: &str,
        user: &str,
        id: &str,
    ) -> Result<(), MnemeCoreError> {
        let (tenancy, key) = conversation_key(app, user, id)?;
        let _guard = self.lock(&tenancy).await;
        if !self.backend.delete(&key).await? {
            return Err(MnemeCoreError::NotFound(id.to_string()));
        }
        info!("conversation deleted (app={app}, user={user}, conversation={id})");
        Ok(())
    }

    /// Set one entry of the conversation's state map; `Value::Null` removes it.
    pub async fn update_state(
        &self,
        app: &str,
        user: &str,
        id: &str,
        state_key: &str,
        value: Value,
    ) -> Result<Conversation, MnemeCoreError> {
        let (tenancy, key) = conversation_key(app, user, id)?;
        let _guard = self.lock(&tenancy).await;
        let mut conversation = self.load(&key, id).await?;
        if value.is_null() {
            conversation.state.remove(state_key);
        } else {
            conversation.state.insert(state_key.to_string(), value);
        }
        conversation.last_updated_at = Utc::now();
        self.backend
            .write(&key, Document::encode(&conversation)?)
            .await?;
        Ok(conversation)
    }

    /// Replace the leading events of a conversation with a summary.
    ///
    /// `head` lists the ids the summary was built from; the replace only
    /// happens if the log still starts with exactly those events. Events
    /// appended after them are kept in order.
    pub async fn replace_window(
        &self,
        app: &str,
        user: &str,
        id: &str,
        head: &[EventId],
        summary: Event,
    ) -> Result<Conversation, MnemeCoreError> {
        let (tenancy, key) = conversation_key(app, user, id)?;
        let _guard = self.lock(&tenancy).await;
        let mut conversation = self.load(&key, id).await?;
        let current = conversation
            .events
            .iter()
            .take(head.len())
            .map(|event| event.id)
            .collect::<Vec<_>>();
        if current.as_slice() != head {
            return Err(MnemeCoreError::WindowConflict(format!(
                "conversation {id} no longer starts with the summarized events"
            )));
        }
        let tail = conversation.events.split_off(head.len());
        conversation.events = std::iter::once(summary).chain(tail).collect();
        conversation.last_updated_at = Utc::now();
        self.backend
            .write(&key, Document::encode(&conversation)?)
            .await?;
        Ok(conversation)
    }

    async fn load(&self, key: &str, id: &str) -> Result<Conversation, MnemeCoreError> {
        let document = self
            .backend
            .read(key)
            .await
            .map_err(|err| conversation_error(err, id))?;
        Ok(document.decode()?)
    }

    async fn lock(&self, tenancy: &TenancyKey) -> KeyGuard {
        self.locks.lock(tenancy.prefix()).await
    }
}

fn conversation_key(
    app: &str,
    user: &str,
    id: &str,
) -> Result<(TenancyKey, String), MnemeCoreError> {
    let tenancy = resolve(Subsystem::ShortTerm, &Tenancy::conversation(app, user, id))?;
    let key = tenancy.key(&[CONVERSATION_DOCUMENT]);
    Ok((tenancy, key))
}

/// Recover the conversation id from `{scope}{escaped id}/conversation`.
fn conversation_id_from_key(scope: &TenancyKey, key: &str) -> Option<ConversationId> {
    let rest = key.strip_prefix(scope.prefix())?;
    let (escaped, leaf) = rest.split_once('/')?;
    (leaf == CONVERSATION_DOCUMENT).then(|| unescape_component(escaped))
}

fn conversation_error(err: StorageError, id: &str) -> MnemeCoreError {
    match err {
        StorageError::NotFound(_) => MnemeCoreError::NotFound(id.to_string()),
        StorageError::AlreadyExists(_) => MnemeCoreError::AlreadyExists(id.to_string()),
        other => other.into(),
    }
}

#[cfg(test)]
mod tests {
    use super::ConversationStore;
    use crate::MnemeCoreError;
    use mneme_rs_protocol::{Author, Event};
    use mneme_rs_storage::InProcessBackend;
    use pretty_assertions::assert_eq;
    use serde_json::json;
    use std::sync::Arc;

    fn store() -> ConversationStore {
        ConversationStore::new(Arc::new(InProcessBackend::new()))
    }

    #[tokio::test]
    async fn create_twice_fails() {
        let store = store();
        store.create_conversation("app", "u1", "c1").await.expect("create");
        let err = store
            .create_conversation("app", "u1", "c1")
            .await
            .unwrap_err();
        assert!(matches!(err, MnemeCoreError::AlreadyExists(id) if id == "c1"));
    }

    #[tokio::test]
    async fn append_requires_existing_conversation() {
        let store = store();
        let err = store
            .append_event("app", "u1", "missing", Event::text(Author::User, "hi"))
            .await
            .unwrap_err();
        assert!(matches!(err, MnemeCoreError::NotFound(_)));
    }

    #[tokio::test]
    async fn get_or_create_returns_existing() {
        let store = store();
        store.create_conversation("app", "u1", "c1").await.expect("create");
        store
            .append_event("app", "u1", "c1", Event::text(Author::User, "hi"))
            .await
            .expect("append");
        let conversation = store
            .get_or_create_conversation("app", "u1", "c1")
            .await
            .expect("open");
        assert_eq!(conversation.events.len(), 1);
    }

    #[tokio::test]
    async fn list_only_returns_own_conversations() {
        let store = store();
        for (user, id) in [("u1", "b"), ("u1", "a/b"), ("u2", "c"), ("u10", "d")] {
            store.create_conversation("app", user, id).await.expect("create");
        }
        assert_eq!(
            store.list_conversations("app", "u1").await.expect("list"),
            vec!["a/b".to_string(), "b".to_string()]
        );
    }

    #[tokio::test]
    async fn update_state_sets_and_removes() {
        let store = store();
        store.create_conversation("app", "u1", "c1").await.expect("create");
        store
            .update_state("app", "u1", "c1", "topic", json!("alpha"))
            .await
            .expect("set");
        let conversation = store
            .update_state("app", "u1", "c1", "mood", json!("calm"))
            .await
            .expect("set");
        assert_eq!(conversation.state.get("topic"), Some(&json!("alpha")));
        let conversation = store
            .update_state("app", "u1", "c1", "topic", serde_json::Value::Null)
            .await
            .expect("remove");
        assert!(!conversation.state.contains_key("topic"));
    }

    #[tokio::test]
    async fn replace_window_rejects_changed_head() {
        let store = store();
        store.create_conversation("app", "u1", "c1").await.expect("create");
        let first = Event::text(Author::User, "one");
        store
            .append_event("app", "u1", "c1", first.clone())
            .await
            .expect("append");
        let err = store
            .replace_window(
                "app",
                "u1",
                "c1",
                &[uuid::Uuid::new_v4()],
                Event::text(Author::System, "summary"),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, MnemeCoreError::WindowConflict(_)));

        let conversation = store
            .replace_window(
                "app",
                "u1",
                "c1",
                &[first.id],
                Event::text(Author::System, "summary"),
            )
            .await
            .expect("replace");
        assert_eq!(conversation.events.len(), 1);
        assert_eq!(conversation.events[0].text_content(), "summary");
    }

    #[tokio::test]
    async fn missing_tenancy_fields_are_rejected() {
        let store = store();
        let err = store.create_conversation("app", "", "c1").await.unwrap_err();
        assert!(matches!(err, MnemeCoreError::InvalidTenancy(_)));
    }
}
