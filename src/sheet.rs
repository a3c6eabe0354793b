// Extraction of per-county statistics from one worksheet of the published
// workbook. The layout is a fixed contract of the source: county labels in
// column 0, data in rows 8-52 (1-indexed), one column per day with the most
// recent day first.
use crate::error::CrawlError;
use calamine::{Data, Range};
use std::collections::BTreeMap;

/// County name -> observations, most recent first, one per data column.
pub type CountyStats = BTreeMap<String, Vec<f64>>;

/// First data row, 0-based (row 8 in sheet terms).
pub const DATA_ROW_START: u32 = 7;
/// One past the last data row, 0-based (row 52 in sheet terms).
pub const DATA_ROW_END: u32 = 52;
/// Column holding the county labels.
pub const LABEL_COLUMN: u32 = 0;
/// Label of the aggregate row summing all counties.
pub const TOTAL_ROW_LABEL: &str = "Summe";
/// Alias under which the total row is additionally exposed.
pub const TOTAL_ROW_ALIAS: &str = "Baden-Württemberg";

/// Reads the per-county statistics from the given worksheet range.
///
/// Rows outside the fixed window are ignored regardless of content, blank
/// cells coerce to `0.0`, and every entry carries exactly one value per data
/// column. The `"Summe"` total row is exposed a second time under
/// `"Baden-Württemberg"`; its absence is a hard error.
pub fn extract_sheet(range: &Range<Data>) -> Result<CountyStats, CrawlError> {
    let (_, last_column) = range
        .end()
        .ok_or_else(|| CrawlError::Parse("worksheet is empty".to_string()))?;

    let mut stats_per_county = CountyStats::new();
    for row in DATA_ROW_START..DATA_ROW_END {
        let label = match range.get_value((row, LABEL_COLUMN)) {
            Some(Data::String(text)) if !text.trim().is_empty() => text.trim().to_string(),
            _ => continue,
        };
        let mut stats = Vec::with_capacity(last_column as usize);
        for column in (LABEL_COLUMN + 1)..=last_column {
            stats.push(cell_to_f64(range.get_value((row, column))));
        }
        stats_per_county.insert(label, stats);
    }

    let total = stats_per_county
        .get(TOTAL_ROW_LABEL)
        .cloned()
        .ok_or_else(|| CrawlError::MissingRow(TOTAL_ROW_LABEL.to_string()))?;
    stats_per_county.insert(TOTAL_ROW_ALIAS.to_string(), total);

    Ok(stats_per_county)
}

fn cell_to_f64(cell: Option<&Data>) -> f64 {
    match cell {
        Some(Data::Float(value)) => *value,
        Some(Data::Int(value)) => *value as f64,
        Some(Data::Bool(flag)) => {
            if *flag {
                1.0
            } else {
                0.0
            }
        }
        Some(Data::String(text)) => text.trim().parse::<f64>().unwrap_or(0.0),
        Some(Data::DateTime(value)) => value.as_f64(),
        _ => 0.0,
    }
}
