use thiserror::Error;

/// Errors raised by the crawl pipeline (download, workbook parse, extraction).
/// Any of these aborts the current crawl job; the previously stored report
/// stays authoritative.
#[derive(Debug, Error)]
pub enum CrawlError {
    #[error("download failed: {0}")]
    Download(String),

    #[error("workbook parse failed: {0}")]
    Parse(String),

    #[error("total row '{0}' missing from sheet")]
    MissingRow(String),
}

impl From<reqwest::Error> for CrawlError {
    fn from(err: reqwest::Error) -> Self {
        CrawlError::Download(err.to_string())
    }
}

impl From<std::io::Error> for CrawlError {
    fn from(err: std::io::Error) -> Self {
        CrawlError::Download(err.to_string())
    }
}

impl From<calamine::Error> for CrawlError {
    fn from(err: calamine::Error) -> Self {
        CrawlError::Parse(err.to_string())
    }
}

/// A failed send to a single chat. Isolated per recipient: the send batch
/// continues with the remaining subscribers.
#[derive(Debug, Error)]
#[error("delivery to chat {chat_id} failed: {reason}")]
pub struct DeliveryError {
    pub chat_id: i64,
    pub reason: String,
}
