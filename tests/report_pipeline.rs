// Extraction and composition wired together the way the crawl job runs them,
// minus network and Telegram.
use calamine::{Data, Range};
use chrono::NaiveDate;
use corona_reporter::config::StorageConfig;
use corona_reporter::report::compose_report;
use corona_reporter::sheet::{extract_sheet, DATA_ROW_END, DATA_ROW_START};
use corona_reporter::storage::build_storage;

fn sheet(rows: &[(&str, &[f64])]) -> Range<Data> {
    let columns = rows
        .iter()
        .map(|(_, values)| values.len() as u32)
        .max()
        .unwrap_or(0);
    let mut range = Range::new((0, 0), (DATA_ROW_END, columns));
    for (offset, (label, values)) in rows.iter().enumerate() {
        let row = DATA_ROW_START + offset as u32;
        range.set_value((row, 0), Data::String(label.to_string()));
        for (column, value) in values.iter().enumerate() {
            range.set_value((row, column as u32 + 1), Data::Float(*value));
        }
    }
    range
}

#[test]
fn extracted_sheets_compose_into_the_stored_report() {
    let infections_range = sheet(&[
        ("Freiburg", &[120.0, 100.0]),
        ("Emmendingen", &[30.0, 28.0]),
        ("Summe", &[150.0, 128.0]),
    ]);
    let deaths_range = sheet(&[("Freiburg", &[3.0, 2.0]), ("Summe", &[3.0, 2.0])]);

    let infections = extract_sheet(&infections_range).unwrap();
    let deaths = extract_sheet(&deaths_range).unwrap();

    // The total row is addressable under the regional alias.
    assert_eq!(infections["Baden-Württemberg"], vec![150.0, 128.0]);

    let counties = vec![
        "Freiburg".to_string(),
        "Baden-Württemberg".to_string(),
        "Lörrach".to_string(),
    ];
    let today = NaiveDate::from_ymd_opt(2020, 4, 7).unwrap();
    let report = compose_report(&infections, &deaths, &counties, today);

    assert!(report.text.contains("<b>Freiburg:</b>"));
    assert!(report.text.contains("• <b>+20</b> Neuinfektionen (120 « 100)"));
    assert!(report.text.contains("• <b>+1</b> Todesfälle (3 « 2)"));
    assert!(report.text.contains("<b>Baden-Württemberg:</b>"));
    assert!(report.text.contains("• <b>+22</b> Neuinfektionen (150 « 128)"));
    // No data for Lörrach in either sheet, so no section.
    assert!(!report.text.contains("Lörrach"));

    let dir = tempfile::tempdir().unwrap();
    let storage = build_storage(&StorageConfig {
        db_path: dir.path().join("reporter.db").to_string_lossy().to_string(),
        subscribers_table: "subscribed_chats".to_string(),
        reports_table: "reports".to_string(),
    })
    .unwrap();
    storage
        .upsert_report(&report.date.format("%Y-%m-%d").to_string(), &report.text)
        .unwrap();

    let stored = storage.latest_report().unwrap().unwrap();
    assert_eq!(stored.date, "2020-04-07");
    assert_eq!(stored.text, report.text);
}
