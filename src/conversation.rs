use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Transcript text shown when a completion request fails, regardless of
/// whether the failure was a timeout, a non-2xx status, or a transport error.
pub const COMPLETION_ERROR_TEXT: &str = "Error: unable to fetch response.";

/// Role of a transcript message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Role {
    User,
    Assistant,
}

/// A single message in the conversation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub text: String,
    pub pending: bool,
    pub timestamp: DateTime<Utc>,
}

impl Message {
    fn user(text: String) -> Self {
        Self {
            role: Role::User,
            text,
            pending: false,
            timestamp: Utc::now(),
        }
    }

    fn pending_assistant() -> Self {
        Self {
            role: Role::Assistant,
            text: String::new(),
            pending: true,
            timestamp: Utc::now(),
        }
    }
}

/// Ordered message sequence with the submission lifecycle: a submit appends a
/// user message plus a pending assistant placeholder, and the eventual
/// outcome replaces that placeholder in place.
#[derive(Debug, Clone, Default)]
pub struct Conversation {
    messages: Vec<Message>,
}

impl Conversation {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stage a query for submission. Blank input is ignored, and so is input
    /// arriving while a previous request is still pending: at most one
    /// pending assistant message may exist at a time. Returns the trimmed
    /// query to hand to the completion client.
    pub fn submit(&mut self, query: &str) -> Option<String> {
        let query = query.trim();
        if query.is_empty() || self.has_pending() {
            return None;
        }

        self.messages.push(Message::user(query.to_string()));
        self.messages.push(Message::pending_assistant());
        Some(query.to_string())
    }

    /// Resolve the pending placeholder with the assistant's response. The
    /// sequence length does not change. A completion arriving with nothing
    /// pending (the transcript was cleared mid-flight) is dropped.
    pub fn complete(&mut self, text: impl Into<String>) {
        if let Some(placeholder) = self.pending_mut() {
            placeholder.text = text.into();
            placeholder.pending = false;
            placeholder.timestamp = Utc::now();
        }
    }

    /// Resolve the pending placeholder with the fixed error text.
    pub fn fail(&mut self) {
        self.complete(COMPLETION_ERROR_TEXT);
    }

    pub fn has_pending(&self) -> bool {
        self.messages.iter().any(|m| m.pending)
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    /// Drop the whole transcript. An in-flight response will find nothing
    /// pending and be discarded by `complete`.
    pub fn clear(&mut self) {
        self.messages.clear();
    }

    fn pending_mut(&mut self) -> Option<&mut Message> {
        self.messages.iter_mut().rev().find(|m| m.pending)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blank_submit_leaves_sequence_unchanged() {
        let mut convo = Conversation::new();
        assert!(convo.submit("").is_none());
        assert!(convo.submit("   \t  ").is_none());
        assert!(convo.is_empty());
    }

    #[test]
    fn submit_appends_user_then_pending_assistant() {
        let mut convo = Conversation::new();
        let staged = convo.submit("  hello there  ");
        assert_eq!(staged.as_deref(), Some("hello there"));

        assert_eq!(convo.len(), 2);
        assert_eq!(convo.messages()[0].role, Role::User);
        assert_eq!(convo.messages()[0].text, "hello there");
        assert!(!convo.messages()[0].pending);
        assert_eq!(convo.messages()[1].role, Role::Assistant);
        assert!(convo.messages()[1].pending);
        assert!(convo.has_pending());
    }

    #[test]
    fn complete_replaces_placeholder_in_place() {
        let mut convo = Conversation::new();
        convo.submit("what is an API?");
        convo.complete("An API is a contract between programs.");

        assert_eq!(convo.len(), 2);
        let reply = &convo.messages()[1];
        assert_eq!(reply.role, Role::Assistant);
        assert_eq!(reply.text, "An API is a contract between programs.");
        assert!(!reply.pending);
        assert!(!convo.has_pending());
    }

    #[test]
    fn fail_replaces_placeholder_with_fixed_error_text() {
        let mut convo = Conversation::new();
        convo.submit("hello");
        convo.fail();

        assert_eq!(convo.len(), 2);
        assert_eq!(convo.messages()[1].text, COMPLETION_ERROR_TEXT);
        assert!(!convo.messages()[1].pending);
    }

    #[test]
    fn submit_is_rejected_while_request_pending() {
        let mut convo = Conversation::new();
        assert!(convo.submit("first").is_some());
        assert!(convo.submit("second").is_none());
        assert_eq!(convo.len(), 2);

        convo.complete("done");
        assert!(convo.submit("second").is_some());
        assert_eq!(convo.len(), 4);
    }

    #[test]
    fn late_completion_after_clear_is_dropped() {
        let mut convo = Conversation::new();
        convo.submit("hello");
        convo.clear();
        convo.complete("too late");
        assert!(convo.is_empty());
    }

    #[test]
    fn conversation_alternates_across_turns() {
        let mut convo = Conversation::new();
        convo.submit("one");
        convo.complete("reply one");
        convo.submit("two");
        convo.fail();

        let roles: Vec<Role> = convo.messages().iter().map(|m| m.role).collect();
        assert_eq!(
            roles,
            vec![Role::User, Role::Assistant, Role::User, Role::Assistant]
        );
        assert!(!convo.has_pending());
    }
}
