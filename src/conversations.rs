//! Simulated chat threads

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Who wrote a message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Sender {
    /// The simulated contact (typed by the operator)
    Customer,
    /// A generated reply
    Bot,
}

/// A chat message; immutable once appended
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct Message {
    pub id: String,
    pub sender: Sender,
    pub content: String,
    pub timestamp: DateTime<Utc>,
}

impl Message {
    #[must_use]
    pub fn new(sender: Sender, content: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            sender,
            content: content.into(),
            timestamp: Utc::now(),
        }
    }

    #[must_use]
    pub fn customer(content: impl Into<String>) -> Self {
        Self::new(Sender::Customer, content)
    }

    #[must_use]
    pub fn bot(content: impl Into<String>) -> Self {
        Self::new(Sender::Bot, content)
    }
}

/// One contact and its ordered message list
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Conversation {
    pub id: String,
    pub contact_name: String,
    pub contact_number: String,
    pub last_message: String,
    pub timestamp: DateTime<Utc>,
    pub unread_count: u32,
    pub messages: Vec<Message>,
    /// Non-owning reference; may point at a deleted agent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub agent_id: Option<String>,
}

impl Conversation {
    #[must_use]
    pub fn new(contact_name: &str, contact_number: &str, agent_id: Option<String>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            contact_name: contact_name.to_string(),
            contact_number: contact_number.to_string(),
            last_message: String::new(),
            timestamp: Utc::now(),
            unread_count: 0,
            messages: Vec::new(),
            agent_id,
        }
    }

    /// Append a message at the end of the thread
    ///
    /// Timestamps stay strictly increasing: a message stamped at or before its
    /// predecessor is moved one millisecond past it.
    pub fn append(&mut self, mut message: Message) -> &Message {
        if let Some(prev) = self.messages.last() {
            if message.timestamp <= prev.timestamp {
                message.timestamp = prev.timestamp + Duration::milliseconds(1);
            }
        }

        self.last_message.clone_from(&message.content);
        self.timestamp = message.timestamp;
        if message.sender == Sender::Customer {
            self.unread_count = 0;
        }

        self.messages.push(message);
        &self.messages[self.messages.len() - 1]
    }

    /// The last `n` messages (or fewer)
    #[must_use]
    pub fn recent(&self, n: usize) -> &[Message] {
        let start = self.messages.len().saturating_sub(n);
        &self.messages[start..]
    }
}

/// Owns every conversation plus the operator's current selection
#[derive(Debug, Clone, Default)]
pub struct ConversationStore {
    conversations: Vec<Conversation>,
    selected: Option<String>,
}

impl ConversationStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub const fn from_conversations(conversations: Vec<Conversation>) -> Self {
        Self {
            conversations,
            selected: None,
        }
    }

    /// Start a new thread; a blank contact name is ignored
    pub fn create(
        &mut self,
        contact_name: &str,
        contact_number: &str,
        agent_id: Option<String>,
    ) -> Option<&Conversation> {
        let contact_name = contact_name.trim();
        if contact_name.is_empty() {
            return None;
        }
        self.conversations
            .push(Conversation::new(contact_name, contact_number.trim(), agent_id));
        self.conversations.last()
    }

    /// Append to a conversation by id; unknown ids are a no-op
    pub fn append_message(&mut self, conversation_id: &str, message: Message) -> Option<&Message> {
        let conversation = self.get_mut(conversation_id)?;
        Some(conversation.append(message))
    }

    /// Make a conversation the active one, clearing its unread counter
    pub fn select(&mut self, conversation_id: &str) -> Option<&Conversation> {
        let conversation = self.get_mut(conversation_id)?;
        conversation.unread_count = 0;
        self.selected = Some(conversation_id.to_string());
        self.get(conversation_id)
    }

    /// Point a conversation at an agent (or at none)
    pub fn assign_agent(
        &mut self,
        conversation_id: &str,
        agent_id: Option<String>,
    ) -> Option<&Conversation> {
        let conversation = self.get_mut(conversation_id)?;
        conversation.agent_id = agent_id;
        Some(conversation)
    }

    #[must_use]
    pub fn selected_id(&self) -> Option<&str> {
        self.selected.as_deref()
    }

    #[must_use]
    pub fn get(&self, id: &str) -> Option<&Conversation> {
        self.conversations.iter().find(|c| c.id == id)
    }

    fn get_mut(&mut self, id: &str) -> Option<&mut Conversation> {
        self.conversations.iter_mut().find(|c| c.id == id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Conversation> {
        self.conversations.iter()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.conversations.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.conversations.is_empty()
    }

    #[must_use]
    pub fn to_vec(&self) -> Vec<Conversation> {
        self.conversations.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store_with_thread() -> (ConversationStore, String) {
        let mut store = ConversationStore::new();
        let id = store.create("Januário", "+244 923 111 222", None).unwrap().id.clone();
        (store, id)
    }

    #[test]
    fn test_append_updates_last_message() {
        let (mut store, id) = store_with_thread();
        for i in 0..4 {
            store.append_message(&id, Message::customer(format!("msg {i}")));
        }

        let conversation = store.get(&id).unwrap();
        assert_eq!(conversation.messages.len(), 4);
        assert_eq!(conversation.last_message, "msg 3");
        assert_eq!(conversation.timestamp, conversation.messages[3].timestamp);
    }

    #[test]
    fn test_timestamps_strictly_increase() {
        let (mut store, id) = store_with_thread();
        let first = Message::customer("a");
        let mut second = Message::bot("b");
        second.timestamp = first.timestamp;

        store.append_message(&id, first);
        store.append_message(&id, second);

        let messages = &store.get(&id).unwrap().messages;
        assert!(messages[1].timestamp > messages[0].timestamp);
    }

    #[test]
    fn test_customer_message_clears_unread() {
        let mut conversation = Conversation::new("A", "1", None);
        conversation.unread_count = 3;

        conversation.append(Message::bot("hi"));
        assert_eq!(conversation.unread_count, 3);

        conversation.append(Message::customer("hello"));
        assert_eq!(conversation.unread_count, 0);
    }

    #[test]
    fn test_select_clears_unread_only() {
        let mut conversation = Conversation::new("A", "1", None);
        conversation.unread_count = 2;
        conversation.append(Message::bot("welcome"));
        let id = conversation.id.clone();

        let mut store = ConversationStore::from_conversations(vec![conversation]);
        let selected = store.select(&id).unwrap();
        assert_eq!(selected.unread_count, 0);
        assert_eq!(selected.messages.len(), 1);
        assert_eq!(store.selected_id(), Some(id.as_str()));
    }

    #[test]
    fn test_unknown_conversation_is_noop() {
        let mut store = ConversationStore::new();
        assert!(store.append_message("nope", Message::customer("x")).is_none());
        assert!(store.select("nope").is_none());
        assert!(store.selected_id().is_none());
        assert!(store.create("", "1", None).is_none());
    }

    #[test]
    fn test_recent_window() {
        let mut conversation = Conversation::new("A", "1", None);
        for i in 0..7 {
            conversation.append(Message::customer(i.to_string()));
        }
        let recent: Vec<_> = conversation.recent(5).iter().map(|m| m.content.as_str()).collect();
        assert_eq!(recent, vec!["2", "3", "4", "5", "6"]);
        assert_eq!(Conversation::new("B", "2", None).recent(5).len(), 0);
    }
}
