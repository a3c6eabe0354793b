// Daily report composition. Pure: the same statistics, county list and date
// always render the same text.
use crate::sheet::CountyStats;
use chrono::NaiveDate;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Report {
    pub date: NaiveDate,
    pub text: String,
}

/// Renders the daily HTML report for the given counties.
///
/// Counties are emitted in list order (duplicates included). A county with
/// no data in either mapping produces no section; a county present in only
/// one mapping produces exactly one metric line. A series with a single
/// observation treats the missing "yesterday" value as `0.0`.
pub fn compose_report(
    infections: &CountyStats,
    deaths: &CountyStats,
    counties: &[String],
    today: NaiveDate,
) -> Report {
    let mut lines = vec![
        format!(
            "Dein täglicher Corona-Statusbericht vom {}:",
            today.format("%d.%m.%Y")
        ),
        String::new(),
    ];

    for county in counties {
        let county_infections = infections.get(county).filter(|stats| !stats.is_empty());
        let county_deaths = deaths.get(county).filter(|stats| !stats.is_empty());
        if county_infections.is_none() && county_deaths.is_none() {
            continue;
        }

        lines.push(format!("<b>{county}:</b>"));
        if let Some(stats) = county_infections {
            lines.push(metric_line(stats, "Neuinfektionen"));
        }
        if let Some(stats) = county_deaths {
            lines.push(metric_line(stats, "Todesfälle"));
        }
        lines.push(String::new());
    }

    lines.push("Bleib gesund! 😷".to_string());
    Report {
        date: today,
        text: lines.join("\n"),
    }
}

fn metric_line(stats: &[f64], label: &str) -> String {
    let today = stats[0];
    let yesterday = stats.get(1).copied().unwrap_or(0.0);
    let delta = today - yesterday;
    format!("• <b>{delta:+.0}</b> {label} ({today:.0} « {yesterday:.0})")
}
