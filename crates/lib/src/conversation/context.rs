//! Per-event conversation context: the inbound message, the chat's key memory,
//! queued replies, and transition/termination signaling.

use crate::channels::{ChatId, InboundMessage, User};
use crate::conversation::handler::BoxedHandler;
use serde_json::Value;
use std::collections::HashMap;

/// Per-chat key/value memory. Values are opaque to the engine.
pub type KeyMemory = HashMap<String, Value>;

/// A reply queued during dispatch, delivered by the runner in order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outbound {
    Text(String),
    WithOptions { text: String, options: Vec<String> },
}

impl Outbound {
    pub fn text(&self) -> &str {
        match self {
            Outbound::Text(text) => text,
            Outbound::WithOptions { text, .. } => text,
        }
    }
}

/// Handle passed to handlers for one inbound event.
///
/// Only one context exists per chat at a time: the runner builds it, runs the
/// dispatch step, then drains the replies with [`Context::into_outbox`].
pub struct Context<'a> {
    message: &'a InboundMessage,
    memory: &'a mut KeyMemory,
    outbox: Vec<Outbound>,
    next: Option<BoxedHandler>,
    closed: bool,
}

impl<'a> Context<'a> {
    pub fn new(message: &'a InboundMessage, memory: &'a mut KeyMemory) -> Self {
        Self {
            message,
            memory,
            outbox: Vec::new(),
            next: None,
            closed: false,
        }
    }

    pub fn message(&self) -> &InboundMessage {
        self.message
    }

    pub fn sender(&self) -> &User {
        &self.message.sender
    }

    pub fn chat_id(&self) -> ChatId {
        self.message.chat_id()
    }

    /// Queue a text reply to the chat this event came from.
    pub fn reply(&mut self, text: impl Into<String>) {
        self.outbox.push(Outbound::Text(text.into()));
    }

    /// Queue a reply rendered with one quick-reply button per option.
    pub fn reply_with_options(&mut self, text: impl Into<String>, options: Vec<String>) {
        self.outbox.push(Outbound::WithOptions {
            text: text.into(),
            options,
        });
    }

    pub fn get_key(&self, key: &str) -> Option<&Value> {
        self.memory.get(key)
    }

    /// String value of `key`, or "" when unset or not a string.
    pub fn get_str(&self, key: &str) -> &str {
        self.memory.get(key).and_then(Value::as_str).unwrap_or("")
    }

    pub fn set_key(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        self.memory.insert(key.into(), value.into());
    }

    /// Request a transition to `handler` once the current step finishes. Last call wins.
    pub fn set_next(&mut self, handler: BoxedHandler) {
        self.next = Some(handler);
    }

    /// The requested next handler, unless the context was closed.
    pub fn next(&self) -> Option<BoxedHandler> {
        if self.closed {
            return None;
        }
        self.next.clone()
    }

    /// End the session: the next event for this chat starts over from the entry point.
    pub fn close(&mut self) {
        self.closed = true;
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }

    pub fn is_transitioning(&self) -> bool {
        self.next.is_some()
    }

    /// Replies queued so far, oldest first.
    pub fn outbox(&self) -> &[Outbound] {
        &self.outbox
    }

    pub fn into_outbox(self) -> Vec<Outbound> {
        self.outbox
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::conversation::handler::AnswerHandler;
    use crate::conversation::action::empty_action;
    use std::sync::Arc;

    fn message(text: &str) -> InboundMessage {
        InboundMessage {
            channel_id: "test".to_string(),
            conversation_id: "1".to_string(),
            sender: User::default(),
            text: text.to_string(),
        }
    }

    fn question(text: &str) -> BoxedHandler {
        Arc::new(AnswerHandler::new(empty_action(), text, empty_action()))
    }

    #[test]
    fn next_is_none_without_transition() {
        let msg = message("hi");
        let mut memory = KeyMemory::new();
        let ctx = Context::new(&msg, &mut memory);
        assert!(ctx.next().is_none());
        assert!(!ctx.is_transitioning());
    }

    #[test]
    fn last_set_next_wins() {
        let msg = message("hi");
        let mut memory = KeyMemory::new();
        let mut ctx = Context::new(&msg, &mut memory);
        let first = question("first");
        let second = question("second");
        ctx.set_next(first);
        ctx.set_next(second.clone());
        let next = ctx.next().expect("transition requested");
        assert!(Arc::ptr_eq(&next, &second));
    }

    #[test]
    fn close_suppresses_earlier_transition() {
        let msg = message("hi");
        let mut memory = KeyMemory::new();
        let mut ctx = Context::new(&msg, &mut memory);
        ctx.set_next(question("q"));
        ctx.close();
        assert!(ctx.next().is_none());
        assert!(ctx.is_closed());
    }

    #[test]
    fn keys_write_through_to_memory() {
        let msg = message("hi");
        let mut memory = KeyMemory::new();
        {
            let mut ctx = Context::new(&msg, &mut memory);
            ctx.set_key("age", "42");
            assert_eq!(ctx.get_str("age"), "42");
            assert_eq!(ctx.get_str("missing"), "");
        }
        assert_eq!(memory.get("age"), Some(&Value::String("42".to_string())));
    }

    #[test]
    fn replies_are_queued_in_order() {
        let msg = message("hi");
        let mut memory = KeyMemory::new();
        let mut ctx = Context::new(&msg, &mut memory);
        ctx.reply("one");
        ctx.reply_with_options("two", vec!["a".to_string()]);
        let outbox = ctx.into_outbox();
        assert_eq!(
            outbox,
            vec![
                Outbound::Text("one".to_string()),
                Outbound::WithOptions {
                    text: "two".to_string(),
                    options: vec!["a".to_string()],
                },
            ]
        );
    }
}
