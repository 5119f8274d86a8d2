//! Action and stage combinators for assembling conversations declaratively.
//!
//! An [`Action`] receives the just-received answer (empty inside `welcome`) and
//! the context. Actions hold no state of their own; every effect goes through
//! the context. Chains are built left to right, each link deciding whether to
//! call the next one.

use crate::conversation::context::Context;
use crate::conversation::handler::{BoxedHandler, HandlerError};
use std::sync::Arc;

pub type Action = Arc<dyn Fn(&str, &mut Context<'_>) -> Result<(), HandlerError> + Send + Sync>;

/// Wrap a closure as an [`Action`].
pub fn action<F>(f: F) -> Action
where
    F: Fn(&str, &mut Context<'_>) -> Result<(), HandlerError> + Send + Sync + 'static,
{
    Arc::new(f)
}

/// No-op; terminates a chain.
pub fn empty_action() -> Action {
    action(|_, _| Ok(()))
}

/// Reply with `text`, then run `next`.
pub fn send_text(text: impl Into<String>, next: Action) -> Action {
    let text = text.into();
    action(move |answer, ctx| {
        ctx.reply(text.clone());
        next(answer, ctx)
    })
}

/// Reply with `text` and quick-reply `options`, then run `next`.
pub fn send_text_with_options(text: impl Into<String>, options: Vec<String>, next: Action) -> Action {
    let text = text.into();
    action(move |answer, ctx| {
        ctx.reply_with_options(text.clone(), options.clone());
        next(answer, ctx)
    })
}

/// Transition to the handler produced by `stage`.
pub fn transition_to<S>(stage: S) -> Action
where
    S: Fn() -> BoxedHandler + Send + Sync + 'static,
{
    action(move |_, ctx| {
        ctx.set_next(stage());
        Ok(())
    })
}

/// Transition to the handler produced from the answer and the context (e.g. to
/// branch on user input or read key memory).
pub fn transition_to_with_answer<S>(stage: S) -> Action
where
    S: Fn(&str, &Context<'_>) -> BoxedHandler + Send + Sync + 'static,
{
    action(move |answer, ctx| {
        let next = stage(answer, ctx);
        ctx.set_next(next);
        Ok(())
    })
}

/// Store the raw answer under `key`, then run `next`.
pub fn save_key(key: impl Into<String>, next: Action) -> Action {
    let key = key.into();
    action(move |answer, ctx| {
        ctx.set_key(key.clone(), answer);
        next(answer, ctx)
    })
}

/// Run `first`, then `then` with the same answer. Stops at the first error.
pub fn sequence(first: Action, then: Action) -> Action {
    action(move |answer, ctx| {
        first(answer, ctx)?;
        then(answer, ctx)
    })
}
