//! Console channel: one local chat over stdin/stdout, for trying flows without a bot token.

use crate::channels::channel::{Channel, ChannelError, INBOUND_QUEUE};
use crate::channels::inbound::{InboundMessage, User};
use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::{mpsc, Notify};

const CHANNEL_ID: &str = "console";
const CONVERSATION_ID: &str = "local";

/// Quick replies printed last; a bare number typed back selects one of them.
#[derive(Default)]
struct Shared {
    last_options: Mutex<Vec<String>>,
    shutdown: Notify,
    stopped: AtomicBool,
}

impl Shared {
    fn resolve_input(&self, line: &str) -> String {
        let line = line.trim_end_matches(['\r', '\n']);
        let options = self.last_options.lock().unwrap_or_else(|e| e.into_inner());
        line.trim()
            .parse::<usize>()
            .ok()
            .and_then(|n| n.checked_sub(1))
            .and_then(|i| options.get(i).cloned())
            .unwrap_or_else(|| line.to_string())
    }
}

pub struct ConsoleChannel {
    user: User,
    started: AtomicBool,
    shared: Arc<Shared>,
}

impl ConsoleChannel {
    /// `username` is shown to flows as the sender's handle (defaults to $USER).
    pub fn new(username: Option<String>) -> Self {
        let username = username.or_else(|| std::env::var("USER").ok());
        Self {
            user: User {
                id: format!("{}:{}", CHANNEL_ID, CONVERSATION_ID),
                first_name: username.clone().unwrap_or_default(),
                last_name: String::new(),
                username,
            },
            started: AtomicBool::new(false),
            shared: Arc::new(Shared::default()),
        }
    }
}

async fn run_stdin_loop(user: User, shared: Arc<Shared>, inbound_tx: mpsc::Sender<InboundMessage>) {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while !shared.stopped.load(Ordering::SeqCst) {
        let line = tokio::select! {
            line = lines.next_line() => line,
            _ = shared.shutdown.notified() => break,
        };
        let text = match line {
            Ok(Some(line)) => shared.resolve_input(&line),
            Ok(None) => break,
            Err(e) => {
                log::warn!("console: reading stdin failed: {}", e);
                break;
            }
        };
        let inbound = InboundMessage {
            channel_id: CHANNEL_ID.to_string(),
            conversation_id: CONVERSATION_ID.to_string(),
            sender: user.clone(),
            text,
        };
        if inbound_tx.send(inbound).await.is_err() {
            return;
        }
    }
    log::info!("console channel: stdin loop stopped");
}

#[async_trait]
impl Channel for ConsoleChannel {
    fn id(&self) -> &str {
        CHANNEL_ID
    }

    async fn start(&self) -> Result<mpsc::Receiver<InboundMessage>, ChannelError> {
        if self.started.swap(true, Ordering::SeqCst) {
            return Err(ChannelError::AlreadyStarted(CHANNEL_ID.to_string()));
        }
        if self.shared.stopped.load(Ordering::SeqCst) {
            return Err(ChannelError::Closed(CHANNEL_ID.to_string()));
        }
        let (tx, rx) = mpsc::channel(INBOUND_QUEUE);
        tokio::spawn(run_stdin_loop(self.user.clone(), self.shared.clone(), tx));
        Ok(rx)
    }

    fn stop(&self) {
        if !self.shared.stopped.swap(true, Ordering::SeqCst) {
            self.shared.shutdown.notify_one();
        }
    }

    async fn send_message(&self, _conversation_id: &str, text: &str) -> Result<(), ChannelError> {
        self.shared
            .last_options
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clear();
        println!("< {}", text.trim_end());
        Ok(())
    }

    async fn send_with_options(
        &self,
        _conversation_id: &str,
        text: &str,
        options: &[String],
    ) -> Result<(), ChannelError> {
        println!("< {}", text.trim_end());
        for (i, label) in options.iter().enumerate() {
            println!("  [{}] {}", i + 1, label);
        }
        *self
            .shared
            .last_options
            .lock()
            .unwrap_or_else(|e| e.into_inner()) = options.to_vec();
        Ok(())
    }
}
