// Command dispatch loop: long-polls Telegram for updates and handles the
// subscribe/unsubscribe/on-demand commands sequentially. A failing handler
// answers with a fixed apology and never tears down the loop.
use crate::jobs::{crawl_job, send_report};
use crate::state::AppState;
use crate::storage::SubscriberRecord;
use crate::telegram::{Chat, Message};
use anyhow::{anyhow, Result};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{info, warn};

const FALLBACK_REPLY: &str = "Entschuldige, das habe ich nicht verstanden. Ich bin leider ein \
    ziemlich dummer Bot und verstehe deshalb nur die Kommandos, die mir mein Programmierer \
    beigebracht hat und unter /help aufgelistet sind.";

const ERROR_REPLY: &str = "Ups, das hat nicht geklappt. Keine Sorge, das ist nicht deine Schuld, \
    sondern die von meinem unfähigen Programmierer 🙄. Ich habe ihn gerade über diesen Fehler \
    informiert, damit er ihn schnellstmöglich beheben kann.";

const STOP_REPLY: &str = "Ok, ich sende dir ab sofort keine Corona-Berichte mehr. Wenn du die \
    Berichte wieder erhalten möchtest, tippe einfach /start.";

pub async fn run(state: Arc<AppState>) -> Result<()> {
    let timeout_s = state.config.telegram.poll_timeout_s;
    let mut offset = 0i64;
    info!("listening for updates");
    loop {
        let updates = match state.telegram.get_updates(offset, timeout_s).await {
            Ok(updates) => updates,
            Err(err) => {
                warn!("polling failed, retrying: {err}");
                sleep(Duration::from_secs(5)).await;
                continue;
            }
        };
        for update in updates {
            offset = offset.max(update.update_id + 1);
            let Some(message) = update.message else {
                continue;
            };
            handle_message(&state, &message).await;
        }
    }
}

async fn handle_message(state: &AppState, message: &Message) {
    if let Err(err) = dispatch(state, message).await {
        warn!("command handler failed: {err}");
        if let Err(send_err) = state
            .telegram
            .send_message(message.chat.id, ERROR_REPLY, false)
            .await
        {
            warn!("error reply failed: {send_err}");
        }
        state
            .notify_admin(&format!(
                "Error: {err}; chat {}, message {:?}.",
                message.chat.id, message.text
            ))
            .await;
    }
}

async fn dispatch(state: &AppState, message: &Message) -> Result<()> {
    let text = message.text.as_deref().unwrap_or_default();
    match command_of(text) {
        Some("/start") => handle_start(state, &message.chat).await,
        Some("/stop") => handle_stop(state, &message.chat).await,
        Some("/crawl") => handle_crawl(state, &message.chat).await,
        Some("/report") => handle_report(state, &message.chat).await,
        Some("/help") => handle_help(state, &message.chat).await,
        _ => handle_fallback(state, message).await,
    }
}

/// First token of the message, with an optional `@botname` suffix removed.
fn command_of(text: &str) -> Option<&str> {
    let first = text.trim().split_whitespace().next()?;
    if !first.starts_with('/') {
        return None;
    }
    match first.split_once('@') {
        Some((command, _)) => Some(command),
        None => Some(first),
    }
}

fn subscriber_from_chat(chat: &Chat) -> SubscriberRecord {
    SubscriberRecord {
        chat_id: chat.id,
        title: chat.title.clone(),
        username: chat.username.clone(),
        first_name: chat.first_name.clone(),
        last_name: chat.last_name.clone(),
    }
}

async fn handle_start(state: &AppState, chat: &Chat) -> Result<()> {
    let record = subscriber_from_chat(chat);
    let storage = state.storage.clone();
    let to_store = record.clone();
    tokio::task::spawn_blocking(move || storage.upsert_subscriber(&to_store))
        .await
        .map_err(|err| anyhow!(err.to_string()))??;

    let greeting = record.greeting_name().unwrap_or("du").to_string();
    let report_time = state.config.reporter_start_time()?;
    let reply = format!(
        "Hey {greeting}, danke für deine Anmeldung 🥳. Ich sende dir ab sofort täglich um \
         {} Uhr einen Bericht mit den aktuellen Corona Infektions- und Todesfällen in Freiburg \
         und Baden-Württemberg. Wenn du die Berichte nicht mehr erhalten willst, tippe einfach \
         /stop.",
        report_time.format("%-H:%M"),
    );
    state.telegram.send_message(chat.id, &reply, true).await?;
    state
        .notify_admin(&format!("Chat {} subscribed.", chat.id))
        .await;
    Ok(())
}

async fn handle_stop(state: &AppState, chat: &Chat) -> Result<()> {
    let storage = state.storage.clone();
    let chat_id = chat.id;
    tokio::task::spawn_blocking(move || storage.delete_subscriber(chat_id))
        .await
        .map_err(|err| anyhow!(err.to_string()))??;

    state
        .telegram
        .send_message(chat.id, STOP_REPLY, false)
        .await?;
    state
        .notify_admin(&format!("Chat {} unsubscribed.", chat.id))
        .await;
    Ok(())
}

async fn handle_crawl(state: &AppState, chat: &Chat) -> Result<()> {
    crawl_job(state).await?;
    state.telegram.send_message(chat.id, "Ok.", true).await?;
    state
        .notify_admin(&format!("Chat {} started crawling manually.", chat.id))
        .await;
    Ok(())
}

async fn handle_report(state: &AppState, chat: &Chat) -> Result<()> {
    // On-demand delivery goes to the requesting chat only.
    send_report(state, &[subscriber_from_chat(chat)]).await?;
    state
        .notify_admin(&format!("Chat {} requested report manually.", chat.id))
        .await;
    Ok(())
}

async fn handle_help(state: &AppState, chat: &Chat) -> Result<()> {
    let help_lines = [
        "Tippe:",
        "/start, um dich für den täglichen Corona-Bericht anzumelden;",
        "/help, um diese Hilfe-Nachricht erneut anzuzeigen;",
        "/stop, um dich von den täglichen Corona-Berichten abzumelden;",
        "/report, um den aktuellen Corona-Bericht anzuzeigen.",
    ];
    state
        .telegram
        .send_message(chat.id, &help_lines.join("\n"), true)
        .await?;
    Ok(())
}

async fn handle_fallback(state: &AppState, message: &Message) -> Result<()> {
    state
        .telegram
        .send_message(message.chat.id, FALLBACK_REPLY, false)
        .await?;
    state
        .notify_admin(&format!(
            "Chat {} sent message: {}",
            message.chat.id,
            message.text.as_deref().unwrap_or_default()
        ))
        .await;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_command_of() {
        assert_eq!(command_of("/start"), Some("/start"));
        assert_eq!(command_of("  /stop  "), Some("/stop"));
        assert_eq!(command_of("/report@corona_reporter_bot"), Some("/report"));
        assert_eq!(command_of("/crawl now"), Some("/crawl"));
        assert_eq!(command_of("hallo"), None);
        assert_eq!(command_of(""), None);
    }
}
