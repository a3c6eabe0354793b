// Thin client over the Telegram Bot HTTP API: long-polled updates in, sent
// messages out. Message delivery and command routing stay with the caller.
use crate::error::DeliveryError;
use anyhow::{anyhow, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::json;
use std::time::Duration;

const TELEGRAM_API_BASE: &str = "https://api.telegram.org";

/// Outbound message seam. The delivery loop depends on this instead of the
/// concrete client so report fan-out is testable without the network.
#[async_trait]
pub trait MessageSender: Send + Sync {
    async fn send_message(&self, chat_id: i64, text: &str, html: bool)
        -> Result<(), DeliveryError>;
}

#[derive(Debug, Deserialize)]
struct ApiResponse<T> {
    ok: bool,
    result: Option<T>,
    description: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Update {
    pub update_id: i64,
    #[serde(default)]
    pub message: Option<Message>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Message {
    pub chat: Chat,
    #[serde(default)]
    pub text: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Chat {
    pub id: i64,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub first_name: Option<String>,
    #[serde(default)]
    pub last_name: Option<String>,
}

#[derive(Clone)]
pub struct TelegramClient {
    http: Client,
    api_base: String,
}

impl TelegramClient {
    pub fn new(api_token: &str) -> Self {
        Self {
            http: Client::new(),
            api_base: format!("{TELEGRAM_API_BASE}/bot{}", api_token.trim()),
        }
    }

    /// Sends one message to one chat. `html` enables Telegram HTML parse
    /// mode for the bold markup used in reports.
    pub async fn send_message(
        &self,
        chat_id: i64,
        text: &str,
        html: bool,
    ) -> Result<(), DeliveryError> {
        let mut payload = json!({
            "chat_id": chat_id,
            "text": text,
        });
        if html {
            payload["parse_mode"] = json!("HTML");
        }
        let response = self
            .http
            .post(format!("{}/sendMessage", self.api_base))
            .json(&payload)
            .send()
            .await
            .map_err(|err| DeliveryError {
                chat_id,
                reason: err.to_string(),
            })?;
        if response.status().is_success() {
            Ok(())
        } else {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            Err(DeliveryError {
                chat_id,
                reason: format!("{status} {body}"),
            })
        }
    }

    /// Long-polls for updates after `offset`. The HTTP timeout is padded
    /// past the server-side poll timeout so the poll itself never trips it.
    pub async fn get_updates(&self, offset: i64, timeout_s: u64) -> Result<Vec<Update>> {
        let response = self
            .http
            .post(format!("{}/getUpdates", self.api_base))
            .timeout(Duration::from_secs(timeout_s + 10))
            .json(&json!({
                "offset": offset,
                "timeout": timeout_s,
                "allowed_updates": ["message"],
            }))
            .send()
            .await?;
        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(anyhow!("getUpdates failed: {status} {body}"));
        }
        let payload: ApiResponse<Vec<Update>> = response.json().await?;
        if !payload.ok {
            return Err(anyhow!(
                "getUpdates rejected: {}",
                payload.description.unwrap_or_default()
            ));
        }
        Ok(payload.result.unwrap_or_default())
    }
}

#[async_trait]
impl MessageSender for TelegramClient {
    async fn send_message(
        &self,
        chat_id: i64,
        text: &str,
        html: bool,
    ) -> Result<(), DeliveryError> {
        TelegramClient::send_message(self, chat_id, text, html).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_update_deserialization() {
        let raw = r#"{
            "ok": true,
            "result": [{
                "update_id": 7,
                "message": {
                    "message_id": 1,
                    "chat": {"id": 42, "type": "private", "first_name": "Ada"},
                    "text": "/start"
                }
            }]
        }"#;
        let payload: ApiResponse<Vec<Update>> = serde_json::from_str(raw).unwrap();
        assert!(payload.ok);
        let updates = payload.result.unwrap();
        assert_eq!(updates.len(), 1);
        assert_eq!(updates[0].update_id, 7);
        let message = updates[0].message.as_ref().unwrap();
        assert_eq!(message.chat.id, 42);
        assert_eq!(message.chat.first_name.as_deref(), Some("Ada"));
        assert_eq!(message.text.as_deref(), Some("/start"));
    }

    #[test]
    fn test_update_without_message() {
        let raw = r#"{"update_id": 8}"#;
        let update: Update = serde_json::from_str(raw).unwrap();
        assert!(update.message.is_none());
    }
}
