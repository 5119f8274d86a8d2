//! Telegram channel: long-poll getUpdates and sendMessage via Bot API.

use crate::channels::channel::{Channel, ChannelError, INBOUND_QUEUE};
use crate::channels::inbound::{InboundMessage, User};
use async_trait::async_trait;
use serde::Deserialize;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::{mpsc, Notify};

pub const TELEGRAM_API_BASE: &str = "https://api.telegram.org";
const LONG_POLL_TIMEOUT: u64 = 30;
const CHANNEL_ID: &str = "tg";

#[derive(Debug, Deserialize)]
struct ApiResponse<T> {
    ok: bool,
    result: Option<T>,
    #[serde(default)]
    description: Option<String>,
}

/// Telegram update payload (getUpdates result item).
#[derive(Debug, Deserialize)]
pub struct TelegramUpdate {
    pub update_id: i64,
    #[serde(default)]
    pub message: Option<TelegramMessage>,
}

#[derive(Debug, Deserialize)]
pub struct TelegramMessage {
    pub chat: TelegramChat,
    #[serde(default)]
    pub from: Option<TelegramUser>,
    #[serde(default)]
    pub text: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct TelegramChat {
    pub id: i64,
}

#[derive(Debug, Deserialize)]
pub struct TelegramUser {
    pub id: i64,
    #[serde(default)]
    pub first_name: String,
    #[serde(default)]
    pub last_name: Option<String>,
    #[serde(default)]
    pub username: Option<String>,
}

impl TelegramUpdate {
    /// Convert to an inbound message; `None` for updates that carry no message.
    pub fn into_inbound(self) -> Option<InboundMessage> {
        let msg = self.message?;
        let sender = msg
            .from
            .map(|u| User {
                id: format!("{}:{}", CHANNEL_ID, u.id),
                first_name: u.first_name,
                last_name: u.last_name.unwrap_or_default(),
                username: u.username.filter(|s| !s.is_empty()),
            })
            .unwrap_or_default();
        Some(InboundMessage {
            channel_id: CHANNEL_ID.to_string(),
            conversation_id: msg.chat.id.to_string(),
            sender,
            text: msg.text.unwrap_or_default(),
        })
    }
}

/// One-button-per-row reply keyboard that hides after use.
pub fn reply_keyboard(options: &[String]) -> serde_json::Value {
    let rows: Vec<serde_json::Value> = options
        .iter()
        .map(|label| serde_json::json!([{ "text": label }]))
        .collect();
    serde_json::json!({
        "keyboard": rows,
        "one_time_keyboard": true,
        "resize_keyboard": true,
    })
}

/// Shared between the channel handle and its polling task. `stopped` may be
/// set before the loop exists; `start` checks it after every await.
struct PollState {
    stopped: AtomicBool,
    shutdown: Notify,
}

/// Telegram channel connector: long-polls for updates and sends replies via sendMessage.
pub struct TelegramChannel {
    token: String,
    api_base: String,
    client: reqwest::Client,
    started: AtomicBool,
    state: Arc<PollState>,
}

impl TelegramChannel {
    pub fn new(token: String, api_base: Option<String>) -> Self {
        let api_base = api_base
            .map(|u| u.trim_end_matches('/').to_string())
            .unwrap_or_else(|| TELEGRAM_API_BASE.to_string());
        Self {
            token,
            api_base,
            client: reqwest::Client::new(),
            started: AtomicBool::new(false),
            state: Arc::new(PollState {
                stopped: AtomicBool::new(false),
                shutdown: Notify::new(),
            }),
        }
    }

    fn method_url(&self, method: &str) -> String {
        format!("{}/bot{}/{}", self.api_base, self.token, method)
    }

    /// Call getMe to validate the token. Returns the bot username.
    pub async fn get_me(&self) -> Result<String, ChannelError> {
        #[derive(Deserialize)]
        struct Me {
            #[serde(default)]
            username: Option<String>,
        }
        let res = self
            .client
            .get(self.method_url("getMe"))
            .send()
            .await
            .map_err(|e| ChannelError::Request("telegram", e))?;
        let me: Me = read_result(res, "getMe").await?;
        Ok(me.username.unwrap_or_default())
    }

    /// Remove any webhook so getUpdates can be used.
    async fn delete_webhook(&self) -> Result<(), ChannelError> {
        let res = self
            .client
            .post(self.method_url("deleteWebhook"))
            .send()
            .await
            .map_err(|e| ChannelError::Request("telegram", e))?;
        let _: bool = read_result(res, "deleteWebhook").await?;
        Ok(())
    }

    fn check_stopped(&self) -> Result<(), ChannelError> {
        if self.state.stopped.load(Ordering::SeqCst) {
            return Err(ChannelError::Closed(CHANNEL_ID.to_string()));
        }
        Ok(())
    }

    async fn send(&self, body: serde_json::Value) -> Result<(), ChannelError> {
        let res = self
            .client
            .post(self.method_url("sendMessage"))
            .json(&body)
            .send()
            .await
            .map_err(|e| ChannelError::Request("telegram", e))?;
        let _: serde_json::Value = read_result(res, "sendMessage").await?;
        Ok(())
    }
}

async fn read_result<T: serde::de::DeserializeOwned>(
    res: reqwest::Response,
    method: &str,
) -> Result<T, ChannelError> {
    let status = res.status();
    if !status.is_success() {
        let body = res.text().await.unwrap_or_default();
        return Err(ChannelError::Api(
            "telegram",
            format!("{} failed: {} {}", method, status, body),
        ));
    }
    let data: ApiResponse<T> = res
        .json()
        .await
        .map_err(|e| ChannelError::Request("telegram", e))?;
    match data.result {
        Some(result) if data.ok => Ok(result),
        _ => Err(ChannelError::Api(
            "telegram",
            format!(
                "{} returned ok: false ({})",
                method,
                data.description.unwrap_or_default()
            ),
        )),
    }
}

/// Call Telegram getUpdates (long poll). Returns (updates, next_offset).
async fn get_updates(
    client: &reqwest::Client,
    url: &str,
    offset: Option<i64>,
) -> Result<(Vec<TelegramUpdate>, Option<i64>), ChannelError> {
    let url = match offset {
        Some(off) => format!("{}?timeout={}&offset={}", url, LONG_POLL_TIMEOUT, off),
        None => format!("{}?timeout={}", url, LONG_POLL_TIMEOUT),
    };
    let res = client
        .get(&url)
        .send()
        .await
        .map_err(|e| ChannelError::Request("telegram", e))?;
    let updates: Vec<TelegramUpdate> = read_result(res, "getUpdates").await?;
    let next_offset = updates.iter().map(|u| u.update_id).max().map(|id| id + 1);
    Ok((updates, next_offset))
}

async fn run_get_updates_loop(
    client: reqwest::Client,
    url: String,
    state: Arc<PollState>,
    inbound_tx: mpsc::Sender<InboundMessage>,
) {
    let mut offset: Option<i64> = None;
    while !state.stopped.load(Ordering::SeqCst) {
        let polled = tokio::select! {
            res = get_updates(&client, &url, offset) => res,
            _ = state.shutdown.notified() => break,
        };
        match polled {
            Ok((updates, next)) => {
                if next.is_some() {
                    offset = next;
                }
                for inbound in updates.into_iter().filter_map(TelegramUpdate::into_inbound) {
                    if inbound_tx.send(inbound).await.is_err() {
                        log::debug!("telegram: inbound channel closed, stopping loop");
                        return;
                    }
                }
            }
            Err(e) => {
                log::debug!("telegram getUpdates error: {}", e);
                tokio::time::sleep(tokio::time::Duration::from_secs(2)).await;
            }
        }
    }
    log::info!("telegram channel: getUpdates loop stopped");
}

#[async_trait]
impl Channel for TelegramChannel {
    fn id(&self) -> &str {
        CHANNEL_ID
    }

    async fn start(&self) -> Result<mpsc::Receiver<InboundMessage>, ChannelError> {
        if self.started.swap(true, Ordering::SeqCst) {
            return Err(ChannelError::AlreadyStarted(CHANNEL_ID.to_string()));
        }
        self.check_stopped()?;
        let username = self.get_me().await?;
        self.check_stopped()?;
        if let Err(e) = self.delete_webhook().await {
            log::warn!("telegram deleteWebhook failed: {}", e);
        }
        self.check_stopped()?;
        let (tx, rx) = mpsc::channel(INBOUND_QUEUE);
        log::info!("telegram channel: @{} starting getUpdates long-poll loop", username);
        tokio::spawn(run_get_updates_loop(
            self.client.clone(),
            self.method_url("getUpdates"),
            self.state.clone(),
            tx,
        ));
        Ok(rx)
    }

    fn stop(&self) {
        if !self.state.stopped.swap(true, Ordering::SeqCst) {
            self.state.shutdown.notify_one();
        }
    }

    async fn send_message(&self, chat_id: &str, text: &str) -> Result<(), ChannelError> {
        self.send(serde_json::json!({ "chat_id": chat_id, "text": text }))
            .await
    }

    async fn send_with_options(
        &self,
        chat_id: &str,
        text: &str,
        options: &[String],
    ) -> Result<(), ChannelError> {
        if options.is_empty() {
            return self.send_message(chat_id, text).await;
        }
        self.send(serde_json::json!({
            "chat_id": chat_id,
            "text": text,
            "reply_markup": reply_keyboard(options),
        }))
        .await
    }
}
