//! In-memory conversation histories.

use std::collections::HashMap;

use tunechat_core::{Message, Role, SessionKey};

/// Per-session message logs.
///
/// No internal locking: the owner serializes access. Nothing is persisted;
/// histories live until the process exits.
#[derive(Debug, Default)]
pub struct ConversationStore {
    conversations: HashMap<SessionKey, Vec<Message>>,
    max_messages: Option<usize>,
}

impl ConversationStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// A store that keeps at most `max` messages per session, oldest dropped
    /// first.
    pub fn with_max_messages(max: Option<usize>) -> Self {
        Self {
            conversations: HashMap::new(),
            max_messages: max,
        }
    }

    pub fn append(&mut self, key: &SessionKey, role: Role, content: impl Into<String>) {
        let history = self.conversations.entry(key.clone()).or_default();
        history.push(Message {
            role,
            content: content.into(),
        });
        if let Some(max) = self.max_messages {
            if history.len() > max {
                let excess = history.len() - max;
                history.drain(..excess);
            }
        }
    }

    /// The session's messages in insertion order; empty for unknown keys.
    pub fn history(&self, key: &SessionKey) -> &[Message] {
        self.conversations
            .get(key)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Empty the session's history. The key itself is kept.
    pub fn clear(&mut self, key: &SessionKey) {
        if let Some(history) = self.conversations.get_mut(key) {
            history.clear();
        }
    }

    /// Move a history to a new key, e.g. after the credential it was keyed
    /// by has been refreshed. Messages already under `to` are kept after it.
    pub fn rekey(&mut self, from: &SessionKey, to: &SessionKey) {
        if from == to {
            return;
        }
        if let Some(mut moved) = self.conversations.remove(from) {
            if let Some(existing) = self.conversations.remove(to) {
                moved.extend(existing);
            }
            self.conversations.insert(to.clone(), moved);
        }
    }

    pub fn session_count(&self) -> usize {
        self.conversations.len()
    }
}
