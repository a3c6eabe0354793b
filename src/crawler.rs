// Crawl pipeline: download the published workbook, open it, and extract the
// infection and death statistics per county.
use crate::error::CrawlError;
use crate::sheet::{extract_sheet, CountyStats};
use calamine::{open_workbook_auto, Reader};
use reqwest::Client;
use std::path::{Path, PathBuf};
use tracing::info;

/// One successful crawl. Produced atomically: either both sheets parsed or
/// the crawl failed as a whole.
#[derive(Debug, Clone)]
pub struct Dataset {
    pub infections: CountyStats,
    pub deaths: CountyStats,
}

/// Downloads the workbook at `url` to `download_path` (overwriting any
/// previous download) and extracts both statistics sheets.
pub async fn crawl(http: &Client, url: &str, download_path: &Path) -> Result<Dataset, CrawlError> {
    info!("downloading workbook from {url}");
    let response = http.get(url).send().await?;
    if !response.status().is_success() {
        return Err(CrawlError::Download(format!(
            "unexpected status {} from {url}",
            response.status()
        )));
    }
    let body = response.bytes().await?;
    if let Some(parent) = download_path.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }
    tokio::fs::write(download_path, &body).await?;

    info!("parsing workbook {}", download_path.display());
    let path = download_path.to_path_buf();
    tokio::task::spawn_blocking(move || parse_workbook(&path))
        .await
        .map_err(|err| CrawlError::Parse(err.to_string()))?
}

fn parse_workbook(path: &PathBuf) -> Result<Dataset, CrawlError> {
    let mut workbook = open_workbook_auto(path)?;
    let sheet_names = workbook.sheet_names().to_owned();
    // The published workbook carries the infections sheet first and the
    // deaths sheet second. Anything else is a layout change we must not
    // silently misread.
    if sheet_names.len() < 2 {
        return Err(CrawlError::Parse(format!(
            "expected an infections and a deaths sheet, found {:?}",
            sheet_names
        )));
    }
    let infections_range = workbook
        .worksheet_range(&sheet_names[0])
        .map_err(|err| CrawlError::Parse(format!("sheet '{}': {err}", sheet_names[0])))?;
    let deaths_range = workbook
        .worksheet_range(&sheet_names[1])
        .map_err(|err| CrawlError::Parse(format!("sheet '{}': {err}", sheet_names[1])))?;

    let infections = extract_sheet(&infections_range)?;
    let deaths = extract_sheet(&deaths_range)?;
    Ok(Dataset { infections, deaths })
}
