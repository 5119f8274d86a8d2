//! Communication channels (Telegram, VK, console).
//!
//! The [`Channel`] trait is the boundary between a messaging backend and the
//! conversation engine: it produces a stream of [`InboundMessage`]s and sends
//! replies back, optionally with quick-reply options.

mod channel;
mod console;
mod inbound;
mod telegram;
mod vk;

pub use channel::{Channel, ChannelError, INBOUND_QUEUE};
pub use console::ConsoleChannel;
pub use inbound::{ChatId, InboundMessage, User};
pub use telegram::{TelegramChannel, TelegramUpdate};
pub use vk::VkChannel;
