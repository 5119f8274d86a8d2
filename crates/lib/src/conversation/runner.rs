//! Agent runner: one serialized dispatch loop per channel.
//!
//! The loop takes inbound messages one at a time, applies each to its chat's
//! session, then delivers the replies the step queued before taking the next
//! message. Events of one chat are therefore handled strictly in arrival
//! order, and the session registry is touched by this task alone.

use crate::channels::{Channel, ChannelError, InboundMessage};
use crate::conversation::context::{Context, Outbound};
use crate::conversation::handler::BoxedHandler;
use crate::conversation::session::SessionRegistry;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

/// Produces the first handler of a fresh (or closed) session.
pub type EntryPoint = Arc<dyn Fn() -> BoxedHandler + Send + Sync>;

/// Bridges one channel's inbound stream to its session registry.
pub struct AgentRunner {
    channel: Arc<dyn Channel>,
}

impl AgentRunner {
    pub fn new(channel: Arc<dyn Channel>) -> Self {
        Self { channel }
    }

    pub fn channel_id(&self) -> &str {
        self.channel.id()
    }

    /// Start the channel and spawn the dispatch loop. Returns once the loop is
    /// running; the handle completes after the inbound stream ends and drains.
    pub async fn start(&self, entry_point: EntryPoint) -> Result<JoinHandle<()>, ChannelError> {
        let inbound = self.channel.start().await?;
        log::info!("runner {}: dispatch loop started", self.channel.id());
        let channel = self.channel.clone();
        Ok(tokio::spawn(async move {
            run_dispatch_loop(channel, inbound, entry_point).await;
        }))
    }

    /// Ask the channel to end its inbound stream. Idempotent.
    pub fn stop(&self) {
        self.channel.stop();
    }
}

async fn run_dispatch_loop(
    channel: Arc<dyn Channel>,
    mut inbound: mpsc::Receiver<InboundMessage>,
    entry_point: EntryPoint,
) {
    let mut sessions = SessionRegistry::new();
    while let Some(msg) = inbound.recv().await {
        let outbox = dispatch(&mut sessions, &msg, &entry_point);
        deliver(channel.as_ref(), &msg, outbox).await;
    }
    log::info!(
        "runner {}: inbound stream ended, {} session(s) dropped",
        channel.id(),
        sessions.len()
    );
}

/// Apply one inbound message to its chat's session and return the queued replies.
///
/// A session without a handler starts from `entry_point`, which is welcomed
/// before the message is handled. Handler errors are logged; the session keeps
/// whatever state the step reached.
pub fn dispatch(
    sessions: &mut SessionRegistry,
    msg: &InboundMessage,
    entry_point: &EntryPoint,
) -> Vec<Outbound> {
    let chat = msg.chat_id();
    log::debug!("dispatch {}: {:?}", chat, msg.text);
    let session = sessions.get_or_create(&chat);
    let mut ctx = Context::new(msg, &mut session.memory);

    let mut handler = match session.handler.take() {
        Some(handler) => handler,
        None => {
            let handler = entry_point();
            if let Err(e) = handler.welcome(&mut ctx) {
                log::warn!("dispatch {}: entry welcome failed: {}", chat, e);
            }
            handler
        }
    };

    if let Err(e) = handler.handle(&mut ctx) {
        log::warn!("dispatch {}: handle failed: {}", chat, e);
    }
    if let Some(next) = ctx.next() {
        handler = next;
        if let Err(e) = handler.welcome(&mut ctx) {
            log::warn!("dispatch {}: welcome failed: {}", chat, e);
        }
    }
    let closed = ctx.is_closed();
    let outbox = ctx.into_outbox();

    session.handler = if closed {
        log::debug!("dispatch {}: session closed", chat);
        None
    } else {
        Some(handler)
    };
    outbox
}

/// Send queued replies in order. Failures are logged and skipped.
async fn deliver(channel: &dyn Channel, msg: &InboundMessage, outbox: Vec<Outbound>) {
    for out in outbox {
        let res = match &out {
            Outbound::Text(text) => channel.send_message(&msg.conversation_id, text).await,
            Outbound::WithOptions { text, options } => {
                channel
                    .send_with_options(&msg.conversation_id, text, options)
                    .await
            }
        };
        if let Err(e) = res {
            log::warn!(
                "runner {}: send to {} failed: {}",
                channel.id(),
                msg.conversation_id,
                e
            );
        }
    }
}
