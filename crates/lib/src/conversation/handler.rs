//! Handler state machine: each handler is one state of a chat's conversation.
//!
//! A handler reacts to one inbound message in `handle` and may request a
//! transition through the context; the runner then calls `welcome` on the new
//! state with the same context.

use crate::conversation::action::{empty_action, send_text_with_options, Action};
use crate::conversation::context::Context;
use crate::store::StoreError;
use std::sync::Arc;

#[derive(Debug, thiserror::Error)]
pub enum HandlerError {
    #[error("handler failed: {0}")]
    Failed(String),
    #[error("record store: {0}")]
    Store(#[from] StoreError),
}

/// One conversation state.
pub trait Handler: Send + Sync {
    /// Called when the state is entered (first contact or after a transition).
    fn welcome(&self, ctx: &mut Context<'_>) -> Result<(), HandlerError>;

    /// Called for every inbound message while this state is active.
    fn handle(&self, ctx: &mut Context<'_>) -> Result<(), HandlerError>;
}

/// Shared handler reference stored in sessions and transition slots.
pub type BoxedHandler = Arc<dyn Handler>;

/// Asks a free-form question and passes the raw answer to a single action.
pub struct AnswerHandler {
    welcome: Action,
    question: String,
    answer: Action,
}

impl AnswerHandler {
    pub fn new(welcome: Action, question: impl Into<String>, answer: Action) -> Self {
        Self {
            welcome,
            question: question.into(),
            answer,
        }
    }

    pub fn boxed(self) -> BoxedHandler {
        Arc::new(self)
    }
}

impl Handler for AnswerHandler {
    fn welcome(&self, ctx: &mut Context<'_>) -> Result<(), HandlerError> {
        (self.welcome)("", ctx)?;
        ctx.reply(self.question.clone());
        Ok(())
    }

    fn handle(&self, ctx: &mut Context<'_>) -> Result<(), HandlerError> {
        let answer = ctx.message().text.clone();
        (self.answer)(&answer, ctx)
    }
}

/// Option label -> action, kept in insertion order so quick replies render deterministically.
#[derive(Clone, Default)]
pub struct Options {
    entries: Vec<(String, Action)>,
}

impl Options {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an option. Re-adding a label replaces its action and keeps its position.
    pub fn insert(&mut self, label: impl Into<String>, action: Action) {
        let label = label.into();
        match self.entries.iter_mut().find(|(l, _)| *l == label) {
            Some(entry) => entry.1 = action,
            None => self.entries.push((label, action)),
        }
    }

    /// Builder form of [`Options::insert`].
    pub fn with(mut self, label: impl Into<String>, action: Action) -> Self {
        self.insert(label, action);
        self
    }

    /// Exact match on the label.
    pub fn get(&self, label: &str) -> Option<&Action> {
        self.entries
            .iter()
            .find(|(l, _)| l == label)
            .map(|(_, action)| action)
    }

    pub fn labels(&self) -> Vec<String> {
        self.entries.iter().map(|(l, _)| l.clone()).collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Asks a question with quick-reply options. A matching label runs that option's
/// action, anything else runs the fallback. The question is asked again until
/// an action transitions or closes the session.
pub struct OptionsHandler {
    welcome: Action,
    question: String,
    options: Options,
    fallback: Action,
}

impl OptionsHandler {
    pub fn new(welcome: Action, question: impl Into<String>, options: Options, fallback: Action) -> Self {
        Self {
            welcome,
            question: question.into(),
            options,
            fallback,
        }
    }

    pub fn boxed(self) -> BoxedHandler {
        Arc::new(self)
    }

    pub fn question(&self) -> &str {
        &self.question
    }

    pub fn options(&self) -> &Options {
        &self.options
    }

    fn send_question(&self, ctx: &mut Context<'_>) -> Result<(), HandlerError> {
        let ask = send_text_with_options(
            self.question.clone(),
            self.options.labels(),
            empty_action(),
        );
        ask("", ctx)
    }
}

impl Handler for OptionsHandler {
    fn welcome(&self, ctx: &mut Context<'_>) -> Result<(), HandlerError> {
        (self.welcome)("", ctx)?;
        self.send_question(ctx)
    }

    fn handle(&self, ctx: &mut Context<'_>) -> Result<(), HandlerError> {
        let answer = ctx.message().text.clone();
        match self.options.get(&answer) {
            Some(action) => action(&answer, ctx)?,
            None => (self.fallback)(&answer, ctx)?,
        }
        if !ctx.is_closed() && !ctx.is_transitioning() {
            self.send_question(ctx)?;
        }
        Ok(())
    }
}
