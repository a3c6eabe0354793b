// The two daily jobs and their scheduler: crawl-and-store in the morning,
// send-to-all-subscribers once the report is ready.
use crate::crawler::crawl;
use crate::error::DeliveryError;
use crate::report::compose_report;
use crate::state::AppState;
use crate::storage::{ReportRecord, SubscriberRecord};
use crate::telegram::MessageSender;
use anyhow::{anyhow, Result};
use chrono::{Local, NaiveTime};
use cron::Schedule;
use std::path::PathBuf;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{error, info};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DailyJob {
    Crawl,
    Send,
}

impl DailyJob {
    fn name(self) -> &'static str {
        match self {
            DailyJob::Crawl => "crawl",
            DailyJob::Send => "send",
        }
    }
}

/// Crawls the workbook, composes today's report and stores it. Any failure
/// aborts before the store step, so the previous report stays in place.
pub async fn crawl_job(state: &AppState) -> Result<()> {
    let dataset = crawl(
        &state.http,
        &state.config.crawler.excel_file_url,
        &PathBuf::from(&state.config.crawler.download_path),
    )
    .await?;

    let today = Local::now().date_naive();
    let report = compose_report(
        &dataset.infections,
        &dataset.deaths,
        &state.config.reporter.include_counties,
        today,
    );

    let storage = state.storage.clone();
    let date = report.date.format("%Y-%m-%d").to_string();
    let text = report.text;
    tokio::task::spawn_blocking(move || storage.upsert_report(&date, &text))
        .await
        .map_err(|err| anyhow!(err.to_string()))??;
    info!("stored report for {today}");
    Ok(())
}

/// Sends the latest stored report to all subscribers.
pub async fn send_job(state: &AppState) -> Result<()> {
    let storage = state.storage.clone();
    let subscribers = tokio::task::spawn_blocking(move || storage.list_subscribers())
        .await
        .map_err(|err| anyhow!(err.to_string()))??;
    send_report(state, &subscribers).await
}

/// Notice sent when the report store is still empty.
pub const NO_REPORT_NOTICE: &str = "No report available.";

/// Delivers the latest stored report to each given recipient, falling back
/// to a notice when no report exists yet. A failed send is logged and the
/// remaining recipients still get theirs.
pub async fn send_report(state: &AppState, recipients: &[SubscriberRecord]) -> Result<()> {
    let storage = state.storage.clone();
    let report = tokio::task::spawn_blocking(move || storage.latest_report())
        .await
        .map_err(|err| anyhow!(err.to_string()))??;

    let failures = deliver_report(&state.telegram, report.as_ref(), recipients).await;
    for err in failures {
        error!("{err}");
        state.notify_admin(&format!("Error: {err}")).await;
    }
    Ok(())
}

/// Sends the report (or the empty-store notice) to each recipient in turn.
/// Failed sends are collected, never propagated, so one broken chat cannot
/// block the recipients after it.
pub async fn deliver_report<S: MessageSender + ?Sized>(
    sender: &S,
    report: Option<&ReportRecord>,
    recipients: &[SubscriberRecord],
) -> Vec<DeliveryError> {
    let mut failures = Vec::new();
    for recipient in recipients {
        info!("sending report to chat {}", recipient.chat_id);
        let result = match report {
            Some(report) => sender.send_message(recipient.chat_id, &report.text, true).await,
            None => sender.send_message(recipient.chat_id, NO_REPORT_NOTICE, false).await,
        };
        if let Err(err) = result {
            failures.push(err);
        }
    }
    failures
}

/// Runs the given job once per day at `time` (local), forever. Job failures
/// are logged, forwarded to the admin chat and do not stop the schedule.
pub async fn run_daily(state: Arc<AppState>, time: NaiveTime, job: DailyJob) {
    let expr = format!(
        "0 {} {} * * *",
        time.format("%M"),
        time.format("%H")
    );
    // The expression is built from a validated NaiveTime.
    let schedule = match Schedule::from_str(&expr) {
        Ok(schedule) => schedule,
        Err(err) => {
            error!("invalid schedule '{expr}' for {} job: {err}", job.name());
            return;
        }
    };
    loop {
        let Some(next) = schedule.upcoming(Local).next() else {
            error!("schedule '{expr}' yields no next fire time");
            return;
        };
        let wait = (next - Local::now()).to_std().unwrap_or(Duration::ZERO);
        info!("next {} job at {next}", job.name());
        sleep(wait).await;

        let result = match job {
            DailyJob::Crawl => crawl_job(&state).await,
            DailyJob::Send => send_job(&state).await,
        };
        if let Err(err) = result {
            error!("{} job failed: {err}", job.name());
            state
                .notify_admin(&format!("Error: {} job failed: {err}", job.name()))
                .await;
        }
    }
}
