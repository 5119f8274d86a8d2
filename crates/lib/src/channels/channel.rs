//! Channel trait: the inbound event source and outbound capability of one messaging backend.

use crate::channels::inbound::InboundMessage;
use async_trait::async_trait;
use tokio::sync::mpsc;

/// Capacity of the inbound queue between a channel's receive loop and its runner.
pub const INBOUND_QUEUE: usize = 64;

#[derive(Debug, thiserror::Error)]
pub enum ChannelError {
    #[error("{0} request failed: {1}")]
    Request(&'static str, #[source] reqwest::Error),
    #[error("{0} api error: {1}")]
    Api(&'static str, String),
    #[error("{0} is not configured: {1}")]
    NotConfigured(&'static str, &'static str),
    #[error("{0} channel already started")]
    AlreadyStarted(String),
    #[error("{0} channel is closed")]
    Closed(String),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// A running messaging backend (Telegram, VK, console, ...).
#[async_trait]
pub trait Channel: Send + Sync {
    /// Channel id (e.g. "tg"). Prefixes every chat identity of this channel.
    fn id(&self) -> &str;

    /// Begin producing inbound messages. Errors when the backend cannot start
    /// (bad token, unreachable API). The stream is not restartable: it ends for
    /// good once `stop` is called.
    async fn start(&self) -> Result<mpsc::Receiver<InboundMessage>, ChannelError>;

    /// Signal the inbound stream to end. Idempotent.
    fn stop(&self);

    /// Send a text message to a conversation.
    async fn send_message(&self, conversation_id: &str, text: &str) -> Result<(), ChannelError>;

    /// Send a text message with one quick-reply affordance per option, in order.
    /// Default sends the text alone.
    async fn send_with_options(
        &self,
        conversation_id: &str,
        text: &str,
        _options: &[String],
    ) -> Result<(), ChannelError> {
        self.send_message(conversation_id, text).await
    }
}
