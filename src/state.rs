// Shared service context, passed explicitly to jobs and command handlers.
use crate::config::Config;
use crate::storage::{build_storage, StorageBackend};
use crate::telegram::TelegramClient;
use anyhow::Result;
use std::sync::Arc;
use tracing::{info, warn};

pub struct AppState {
    pub config: Config,
    pub storage: Arc<dyn StorageBackend>,
    pub telegram: TelegramClient,
    pub http: reqwest::Client,
}

impl AppState {
    pub fn new(config: Config) -> Result<Self> {
        let storage = build_storage(&config.storage)?;
        storage.ensure_initialized()?;
        let telegram = TelegramClient::new(&config.telegram.api_token);
        Ok(Self {
            config,
            storage,
            telegram,
            http: reqwest::Client::new(),
        })
    }

    /// Logs the event and forwards it to the admin chat when one is
    /// configured. A failed admin send is logged, never propagated.
    pub async fn notify_admin(&self, event: &str) {
        info!("{event}");
        let Some(admin_chat_id) = self.admin_chat_id() else {
            return;
        };
        let text = format!("<code>{event}</code>");
        if let Err(err) = self.telegram.send_message(admin_chat_id, &text, true).await {
            warn!("admin notification failed: {err}");
        }
    }

    pub fn admin_chat_id(&self) -> Option<i64> {
        self.config
            .telegram
            .admin_chat_id
            .trim()
            .parse::<i64>()
            .ok()
    }
}
