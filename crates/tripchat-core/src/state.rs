//! UI-agnostic conversation state types
//!
//! Messages and the transcript are shared by every front end and don't
//! depend on any specific UI framework.

use serde::{Deserialize, Serialize};

use crate::format::render_reply;
use crate::markup::Fragment;
use crate::sanitize::sanitize;

/// The role of a chat message sender
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatRole {
    User,
    Assistant,
    System,
}

/// A rendered chat message. Built once and never modified.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatMessage {
    role: ChatRole,
    raw_text: String,
    rendered_markup: String,
    fragment: Fragment,
}

impl ChatMessage {
    /// User text is shown literally: sanitized, never formatted.
    pub fn user(text: impl Into<String>) -> Self {
        let raw_text = text.into();
        Self {
            role: ChatRole::User,
            rendered_markup: sanitize(&raw_text),
            fragment: Fragment::plain(raw_text.clone()),
            raw_text,
        }
    }

    pub fn assistant(text: impl Into<String>) -> Self {
        Self::formatted(ChatRole::Assistant, text.into())
    }

    pub fn system(text: impl Into<String>) -> Self {
        Self::formatted(ChatRole::System, text.into())
    }

    fn formatted(role: ChatRole, raw_text: String) -> Self {
        let fragment = render_reply(&raw_text);
        Self {
            role,
            rendered_markup: fragment.to_markup(),
            fragment,
            raw_text,
        }
    }

    pub fn role(&self) -> ChatRole {
        self.role
    }

    pub fn raw_text(&self) -> &str {
        &self.raw_text
    }

    pub fn rendered_markup(&self) -> &str {
        &self.rendered_markup
    }

    pub fn fragment(&self) -> &Fragment {
        &self.fragment
    }
}

/// Ordered, append-only list of messages. Insertion order is display order.
#[derive(Debug, Clone, Default)]
pub struct Transcript {
    messages: Vec<ChatMessage>,
}

impl Transcript {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, message: ChatMessage) -> &ChatMessage {
        self.messages.push(message);
        &self.messages[self.messages.len() - 1]
    }

    pub fn messages(&self) -> &[ChatMessage] {
        &self.messages
    }

    pub fn last(&self) -> Option<&ChatMessage> {
        self.messages.last()
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    pub(crate) fn clear(&mut self) {
        self.messages.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::format::format;

    #[test]
    fn test_user_message_is_literal() {
        let msg = ChatMessage::user("**not bold** <b>");
        assert_eq!(msg.role(), ChatRole::User);
        assert_eq!(msg.rendered_markup(), "**not bold** &lt;b&gt;");
        assert_eq!(msg.fragment().plain_text(), "**not bold** <b>");
    }

    #[test]
    fn test_assistant_markup_is_sanitize_then_format() {
        let raw = "**Bali** <img src=x onerror=alert(1)>\nDay 1";
        let msg = ChatMessage::assistant(raw);
        assert_eq!(msg.rendered_markup(), format(&sanitize(raw)));
        assert_eq!(msg.raw_text(), raw);
    }

    #[test]
    fn test_transcript_keeps_insertion_order() {
        let mut transcript = Transcript::new();
        transcript.push(ChatMessage::user("one"));
        transcript.push(ChatMessage::assistant("two"));
        transcript.push(ChatMessage::user("three"));
        let texts: Vec<&str> = transcript.messages().iter().map(|m| m.raw_text()).collect();
        assert_eq!(texts, ["one", "two", "three"]);
        assert_eq!(transcript.last().map(|m| m.raw_text()), Some("three"));
    }
}
