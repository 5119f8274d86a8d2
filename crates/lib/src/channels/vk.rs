//! VK channel: community Bots Long Poll for inbound messages, messages.send for replies.

use crate::channels::channel::{Channel, ChannelError, INBOUND_QUEUE};
use crate::channels::inbound::{InboundMessage, User};
use async_trait::async_trait;
use serde::Deserialize;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::{mpsc, Notify};

pub const VK_API_BASE: &str = "https://api.vk.com/method";
pub const VK_API_VERSION: &str = "5.199";
const LONG_POLL_WAIT: u64 = 25;
const CHANNEL_ID: &str = "vk";

#[derive(Debug, Deserialize)]
struct ApiEnvelope<T> {
    response: Option<T>,
    #[serde(default)]
    error: Option<ApiErrorBody>,
}

#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    error_code: i64,
    #[serde(default)]
    error_msg: String,
}

#[derive(Debug, Clone, Deserialize)]
struct LongPollServer {
    key: String,
    server: String,
    ts: serde_json::Value,
}

#[derive(Debug, Deserialize)]
struct LongPollResponse {
    #[serde(default)]
    ts: Option<serde_json::Value>,
    #[serde(default)]
    updates: Vec<VkEvent>,
    #[serde(default)]
    failed: Option<i64>,
}

/// One Bots Long Poll event.
#[derive(Debug, Deserialize)]
pub struct VkEvent {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub object: Option<VkEventObject>,
}

#[derive(Debug, Deserialize)]
pub struct VkEventObject {
    #[serde(default)]
    pub message: Option<VkMessage>,
}

#[derive(Debug, Deserialize)]
pub struct VkMessage {
    #[serde(default)]
    pub peer_id: i64,
    #[serde(default)]
    pub from_id: i64,
    #[serde(default)]
    pub text: String,
}

#[derive(Debug, Deserialize)]
struct VkUser {
    id: i64,
    #[serde(default)]
    first_name: String,
    #[serde(default)]
    last_name: String,
    #[serde(default)]
    screen_name: Option<String>,
}

impl VkMessage {
    /// Peer id when present (group chats and dialogs), else the author.
    pub fn conversation_id(&self) -> i64 {
        if self.peer_id != 0 {
            self.peer_id
        } else {
            self.from_id
        }
    }
}

/// Long-poll `ts` arrives as a string or a number depending on the endpoint.
fn ts_string(ts: &serde_json::Value) -> String {
    match ts {
        serde_json::Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// First group id of a `groups.getById` response. Recent API versions wrap the
/// list as `{"groups": [...]}`, older ones return the bare list.
fn group_id_from_response(response: &serde_json::Value) -> Option<i64> {
    let groups = response.get("groups").unwrap_or(response);
    groups.get(0)?.get("id")?.as_i64()
}

/// One-time keyboard with one text button per row.
pub fn keyboard_json(options: &[String]) -> serde_json::Value {
    let buttons: Vec<serde_json::Value> = options
        .iter()
        .map(|label| {
            serde_json::json!([{
                "action": {
                    "type": "text",
                    "label": label,
                    "payload": "{\"button\": \"1\"}",
                },
                "color": "secondary",
            }])
        })
        .collect();
    serde_json::json!({ "one_time": true, "buttons": buttons })
}

/// Connection settings shared by the channel handle and its polling task.
#[derive(Clone)]
struct VkApi {
    token: String,
    group_id: String,
    api_base: String,
    version: String,
    client: reqwest::Client,
}

impl VkApi {
    async fn call<T: serde::de::DeserializeOwned>(
        &self,
        method: &str,
        params: &[(&str, String)],
    ) -> Result<T, ChannelError> {
        let url = format!("{}/{}", self.api_base, method);
        let mut form: Vec<(&str, String)> = params.to_vec();
        form.push(("access_token", self.token.clone()));
        form.push(("v", self.version.clone()));
        let res = self
            .client
            .post(&url)
            .form(&form)
            .send()
            .await
            .map_err(|e| ChannelError::Request("vk", e))?;
        if !res.status().is_success() {
            let status = res.status();
            let body = res.text().await.unwrap_or_default();
            return Err(ChannelError::Api("vk", format!("{} failed: {} {}", method, status, body)));
        }
        let data: ApiEnvelope<T> = res.json().await.map_err(|e| ChannelError::Request("vk", e))?;
        if let Some(err) = data.error {
            return Err(ChannelError::Api(
                "vk",
                format!("{} error {}: {}", method, err.error_code, err.error_msg),
            ));
        }
        data.response
            .ok_or_else(|| ChannelError::Api("vk", format!("{} returned no response", method)))
    }

    async fn long_poll_server(&self) -> Result<LongPollServer, ChannelError> {
        self.call("groups.getLongPollServer", &[("group_id", self.group_id.clone())])
            .await
    }

    /// Community id of the token's own group, for configs without `groupId`.
    async fn resolve_group_id(&self) -> Result<i64, ChannelError> {
        let response: serde_json::Value = self.call("groups.getById", &[]).await?;
        group_id_from_response(&response).ok_or(ChannelError::NotConfigured(
            "vk",
            "groupId is not set and could not be resolved from the token",
        ))
    }

    async fn check(&self, server: &LongPollServer, ts: &str) -> Result<LongPollResponse, ChannelError> {
        let res = self
            .client
            .get(&server.server)
            .query(&[
                ("act", "a_check".to_string()),
                ("key", server.key.clone()),
                ("ts", ts.to_string()),
                ("wait", LONG_POLL_WAIT.to_string()),
            ])
            .send()
            .await
            .map_err(|e| ChannelError::Request("vk", e))?;
        res.json().await.map_err(|e| ChannelError::Request("vk", e))
    }

    /// Resolve names and a contact handle for a user; falls back to the bare id.
    async fn resolve_user(&self, from_id: i64) -> User {
        let mut user = User {
            id: format!("{}:{}", CHANNEL_ID, from_id),
            ..User::default()
        };
        if from_id <= 0 {
            return user;
        }
        let params = [
            ("user_ids", from_id.to_string()),
            ("fields", "screen_name".to_string()),
        ];
        match self.call::<Vec<VkUser>>("users.get", &params).await {
            Ok(users) => {
                if let Some(u) = users.into_iter().next() {
                    user.first_name = u.first_name;
                    user.last_name = u.last_name;
                    user.username = Some(match u.screen_name.filter(|s| !s.is_empty()) {
                        Some(name) => format!("@{}", name),
                        None => format!("https://vk.com/id{}", u.id),
                    });
                }
            }
            Err(e) => log::debug!("vk users.get {} failed: {}", from_id, e),
        }
        user
    }
}

/// `stopped` may be set while `start` is still awaiting the API.
struct PollState {
    stopped: AtomicBool,
    shutdown: Notify,
}

/// VK community bot channel.
pub struct VkChannel {
    api: VkApi,
    started: AtomicBool,
    state: Arc<PollState>,
}

impl VkChannel {
    pub fn new(token: String, group_id: String, api_version: Option<String>) -> Self {
        Self {
            api: VkApi {
                token,
                group_id,
                api_base: VK_API_BASE.to_string(),
                version: api_version.unwrap_or_else(|| VK_API_VERSION.to_string()),
                client: reqwest::Client::new(),
            },
            started: AtomicBool::new(false),
            state: Arc::new(PollState {
                stopped: AtomicBool::new(false),
                shutdown: Notify::new(),
            }),
        }
    }

    fn check_stopped(&self) -> Result<(), ChannelError> {
        if self.state.stopped.load(Ordering::SeqCst) {
            return Err(ChannelError::Closed(CHANNEL_ID.to_string()));
        }
        Ok(())
    }

    async fn send(&self, peer_id: &str, text: &str, keyboard: Option<String>) -> Result<(), ChannelError> {
        let random_id = (uuid::Uuid::new_v4().as_u128() & 0x7fff_ffff) as i64;
        let mut params = vec![
            ("peer_id", peer_id.to_string()),
            ("message", text.to_string()),
            ("random_id", random_id.to_string()),
        ];
        if let Some(kb) = keyboard {
            params.push(("keyboard", kb));
        }
        let _: serde_json::Value = self.api.call("messages.send", &params).await?;
        Ok(())
    }
}

async fn run_long_poll_loop(
    api: VkApi,
    mut server: LongPollServer,
    state: Arc<PollState>,
    inbound_tx: mpsc::Sender<InboundMessage>,
) {
    let mut ts = ts_string(&server.ts);
    while !state.stopped.load(Ordering::SeqCst) {
        let polled = tokio::select! {
            res = api.check(&server, &ts) => res,
            _ = state.shutdown.notified() => break,
        };
        let resp = match polled {
            Ok(resp) => resp,
            Err(e) => {
                log::debug!("vk long poll error: {}", e);
                tokio::time::sleep(tokio::time::Duration::from_secs(2)).await;
                continue;
            }
        };
        match resp.failed {
            None => {}
            Some(1) => {
                if let Some(new_ts) = resp.ts.as_ref() {
                    ts = ts_string(new_ts);
                }
                continue;
            }
            Some(code) => {
                log::debug!("vk long poll failed ({}), refreshing server", code);
                match api.long_poll_server().await {
                    Ok(fresh) => {
                        if code == 3 {
                            ts = ts_string(&fresh.ts);
                        }
                        server = fresh;
                    }
                    Err(e) => {
                        log::warn!("vk groups.getLongPollServer failed: {}", e);
                        tokio::time::sleep(tokio::time::Duration::from_secs(2)).await;
                    }
                }
                continue;
            }
        }
        if let Some(new_ts) = resp.ts.as_ref() {
            ts = ts_string(new_ts);
        }
        for event in resp.updates {
            if event.kind != "message_new" {
                continue;
            }
            let Some(msg) = event.object.and_then(|o| o.message) else {
                continue;
            };
            let inbound = InboundMessage {
                channel_id: CHANNEL_ID.to_string(),
                conversation_id: msg.conversation_id().to_string(),
                sender: api.resolve_user(msg.from_id).await,
                text: msg.text,
            };
            if inbound_tx.send(inbound).await.is_err() {
                log::debug!("vk: inbound channel closed, stopping loop");
                return;
            }
        }
    }
    log::info!("vk channel: long poll loop stopped");
}

#[async_trait]
impl Channel for VkChannel {
    fn id(&self) -> &str {
        CHANNEL_ID
    }

    async fn start(&self) -> Result<mpsc::Receiver<InboundMessage>, ChannelError> {
        if self.started.swap(true, Ordering::SeqCst) {
            return Err(ChannelError::AlreadyStarted(CHANNEL_ID.to_string()));
        }
        self.check_stopped()?;
        let mut api = self.api.clone();
        if api.group_id.trim().is_empty() {
            api.group_id = api.resolve_group_id().await?.to_string();
            self.check_stopped()?;
        }
        let server = api.long_poll_server().await?;
        self.check_stopped()?;
        let (tx, rx) = mpsc::channel(INBOUND_QUEUE);
        log::info!("vk channel: group {} starting long poll loop", api.group_id);
        tokio::spawn(run_long_poll_loop(api, server, self.state.clone(), tx));
        Ok(rx)
    }

    fn stop(&self) {
        if !self.state.stopped.swap(true, Ordering::SeqCst) {
            self.state.shutdown.notify_one();
        }
    }

    async fn send_message(&self, peer_id: &str, text: &str) -> Result<(), ChannelError> {
        self.send(peer_id, text, None).await
    }

    async fn send_with_options(
        &self,
        peer_id: &str,
        text: &str,
        options: &[String],
    ) -> Result<(), ChannelError> {
        if options.is_empty() {
            return self.send(peer_id, text, None).await;
        }
        self.send(peer_id, text, Some(keyboard_json(options).to_string()))
            .await
    }
}
