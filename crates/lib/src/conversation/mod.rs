//! Conversation engine: per-chat state machines driven by channel runners.
//!
//! A [`Manager`] starts one [`AgentRunner`] per channel. Each runner keeps a
//! [`SessionRegistry`] and, for every inbound message, builds a [`Context`]
//! and steps the chat's current [`Handler`]. Handlers are usually assembled
//! from the combinators in [`action`].

pub mod action;
mod context;
mod handler;
mod manager;
mod runner;
mod session;

pub use action::{
    action, empty_action, save_key, send_text, send_text_with_options, sequence, transition_to,
    transition_to_with_answer, Action,
};
pub use context::{Context, KeyMemory, Outbound};
pub use handler::{AnswerHandler, BoxedHandler, Handler, HandlerError, Options, OptionsHandler};
pub use manager::{Manager, ManagerError};
pub use runner::{dispatch, AgentRunner, EntryPoint};
pub use session::{Session, SessionRegistry};
