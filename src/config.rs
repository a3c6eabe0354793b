// Configuration loading: YAML file with env placeholder expansion and
// fail-fast validation of the required fields at startup.
use anyhow::{anyhow, Result};
use chrono::NaiveTime;
use serde::de::{self, Deserializer, SeqAccess, Visitor};
use serde::{Deserialize, Serialize};
use serde_yaml::Value;
use std::env;
use std::fmt;
use std::fs;

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub telegram: TelegramConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub crawler: CrawlerConfig,
    #[serde(default)]
    pub reporter: ReporterConfig,
    #[serde(default)]
    pub observability: ObservabilityConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct TelegramConfig {
    #[serde(default)]
    pub api_token: String,
    /// Chat that receives diagnostic notifications. Empty disables them.
    #[serde(default)]
    pub admin_chat_id: String,
    #[serde(default = "default_poll_timeout_s")]
    pub poll_timeout_s: u64,
}

fn default_poll_timeout_s() -> u64 {
    30
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    #[serde(default)]
    pub db_path: String,
    #[serde(default = "default_subscribers_table")]
    pub subscribers_table: String,
    #[serde(default = "default_reports_table")]
    pub reports_table: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            db_path: String::new(),
            subscribers_table: default_subscribers_table(),
            reports_table: default_reports_table(),
        }
    }
}

fn default_subscribers_table() -> String {
    "subscribed_chats".to_string()
}

fn default_reports_table() -> String {
    "reports".to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CrawlerConfig {
    #[serde(default)]
    pub excel_file_url: String,
    #[serde(default = "default_download_path")]
    pub download_path: String,
    /// Daily trigger, "HH:MM" local time.
    #[serde(default)]
    pub start_time: String,
}

impl Default for CrawlerConfig {
    fn default() -> Self {
        Self {
            excel_file_url: String::new(),
            download_path: default_download_path(),
            start_time: String::new(),
        }
    }
}

fn default_download_path() -> String {
    "data/corona-report.xlsx".to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ReporterConfig {
    /// Counties included in the daily report, in report order.
    /// Accepts a YAML sequence or a comma-separated string.
    #[serde(default, deserialize_with = "deserialize_county_list")]
    pub include_counties: Vec<String>,
    /// Daily trigger, "HH:MM" local time.
    #[serde(default)]
    pub start_time: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ObservabilityConfig {
    #[serde(default)]
    pub log_level: String,
}

impl Config {
    /// Enumerates every missing or malformed required field instead of
    /// stopping at the first one.
    pub fn validate(&self) -> Result<()> {
        let mut problems = Vec::new();
        if self.telegram.api_token.trim().is_empty() {
            problems.push("telegram.api_token is required".to_string());
        }
        if self.crawler.excel_file_url.trim().is_empty() {
            problems.push("crawler.excel_file_url is required".to_string());
        }
        if let Err(err) = parse_daily_time(&self.crawler.start_time) {
            problems.push(format!("crawler.start_time: {err}"));
        }
        if let Err(err) = parse_daily_time(&self.reporter.start_time) {
            problems.push(format!("reporter.start_time: {err}"));
        }
        if self.reporter.include_counties.is_empty() {
            problems.push("reporter.include_counties is required".to_string());
        }
        if problems.is_empty() {
            Ok(())
        } else {
            Err(anyhow!("invalid configuration: {}", problems.join("; ")))
        }
    }

    pub fn crawler_start_time(&self) -> Result<NaiveTime> {
        parse_daily_time(&self.crawler.start_time)
    }

    pub fn reporter_start_time(&self) -> Result<NaiveTime> {
        parse_daily_time(&self.reporter.start_time)
    }
}

pub fn parse_daily_time(value: &str) -> Result<NaiveTime> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(anyhow!("daily time missing, expected \"HH:MM\""));
    }
    NaiveTime::parse_from_str(trimmed, "%H:%M")
        .map_err(|_| anyhow!("invalid daily time '{trimmed}', expected \"HH:MM\""))
}

fn deserialize_county_list<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    struct CountyListVisitor;

    impl<'de> Visitor<'de> for CountyListVisitor {
        type Value = Vec<String>;

        fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
            formatter.write_str("a sequence of county names or a comma-separated string")
        }

        fn visit_str<E>(self, value: &str) -> Result<Self::Value, E>
        where
            E: de::Error,
        {
            Ok(split_county_list(value))
        }

        fn visit_seq<A>(self, mut seq: A) -> Result<Self::Value, A::Error>
        where
            A: SeqAccess<'de>,
        {
            let mut items = Vec::new();
            while let Some(item) = seq.next_element::<String>()? {
                let trimmed = item.trim();
                if !trimmed.is_empty() {
                    items.push(trimmed.to_string());
                }
            }
            Ok(items)
        }
    }

    deserializer.deserialize_any(CountyListVisitor)
}

pub fn split_county_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(str::trim)
        .filter(|item| !item.is_empty())
        .map(|item| item.to_string())
        .collect()
}

/// Loads the configuration. Diagnostics are returned instead of logged so
/// callers can emit them once the tracing subscriber is installed.
pub fn load_config() -> (Config, Vec<String>) {
    let mut warnings = Vec::new();
    let path =
        env::var("CORONA_CONFIG_PATH").unwrap_or_else(|_| "config/reporter.yaml".to_string());
    let mut value = read_yaml(&path, &mut warnings);
    expand_yaml_env(&mut value);
    let config = serde_yaml::from_value::<Config>(value).unwrap_or_else(|err| {
        warnings.push(format!(
            "failed to parse configuration, falling back to defaults: {err}"
        ));
        Config::default()
    });
    (config, warnings)
}

fn read_yaml(path: &str, warnings: &mut Vec<String>) -> Value {
    let content = match fs::read_to_string(path) {
        Ok(text) => text,
        Err(err) => {
            warnings.push(format!("failed to read configuration {path}: {err}"));
            return Value::Null;
        }
    };
    serde_yaml::from_str(&content).unwrap_or_else(|err| {
        warnings.push(format!("failed to parse YAML {path}: {err}"));
        Value::Null
    })
}

fn expand_yaml_env(value: &mut Value) {
    match value {
        Value::String(text) => {
            *text = expand_env_placeholders(text);
        }
        Value::Sequence(items) => {
            for item in items {
                expand_yaml_env(item);
            }
        }
        Value::Mapping(map) => {
            for (_, value) in map.iter_mut() {
                expand_yaml_env(value);
            }
        }
        _ => {}
    }
}

fn expand_env_placeholders(input: &str) -> String {
    let mut output = String::with_capacity(input.len());
    let mut rest = input;
    while let Some(start) = rest.find("${") {
        output.push_str(&rest[..start]);
        rest = &rest[start + 2..];
        let Some(end) = rest.find('}') else {
            output.push_str("${");
            output.push_str(rest);
            return output;
        };
        let inner = &rest[..end];
        rest = &rest[end + 1..];
        let (name, default_value) = match inner.split_once(":-") {
            Some((name, default_value)) => (name.trim(), Some(default_value)),
            None => (inner.trim(), None),
        };
        if name.is_empty() {
            output.push_str("${");
            output.push_str(inner);
            output.push('}');
            continue;
        }
        let resolved = env::var(name).ok().filter(|value| !value.is_empty());
        match (resolved, default_value) {
            (Some(value), _) => output.push_str(&value),
            (None, Some(default_value)) => output.push_str(default_value),
            (None, None) => {}
        }
    }
    output.push_str(rest);
    output
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_expand_env_placeholders() {
        std::env::remove_var("CORONA_TEST_PLACEHOLDER");
        assert_eq!(
            expand_env_placeholders("${CORONA_TEST_PLACEHOLDER:-default}"),
            "default"
        );

        std::env::set_var("CORONA_TEST_PLACEHOLDER", "value");
        assert_eq!(
            expand_env_placeholders("prefix-${CORONA_TEST_PLACEHOLDER}-suffix"),
            "prefix-value-suffix"
        );
        std::env::remove_var("CORONA_TEST_PLACEHOLDER");
    }

    #[test]
    fn test_county_list_accepts_string_and_sequence() {
        let from_string: ReporterConfig = serde_yaml::from_str(
            "include_counties: \"Freiburg, Emmendingen ,Baden-Württemberg\"\nstart_time: \"09:00\"",
        )
        .unwrap();
        assert_eq!(
            from_string.include_counties,
            vec!["Freiburg", "Emmendingen", "Baden-Württemberg"]
        );

        let from_seq: ReporterConfig = serde_yaml::from_str(
            "include_counties:\n  - Freiburg\n  - Emmendingen\nstart_time: \"09:00\"",
        )
        .unwrap();
        assert_eq!(from_seq.include_counties, vec!["Freiburg", "Emmendingen"]);
    }

    #[test]
    fn test_parse_daily_time() {
        assert_eq!(
            parse_daily_time("09:30").unwrap(),
            NaiveTime::from_hms_opt(9, 30, 0).unwrap()
        );
        assert!(parse_daily_time("").is_err());
        assert!(parse_daily_time("25:00").is_err());
    }

    #[test]
    fn test_load_config_surfaces_diagnostics() {
        // Both scenarios share the env var, so they live in one test.
        std::env::set_var("CORONA_CONFIG_PATH", "/nonexistent/reporter.yaml");
        let (config, warnings) = load_config();
        assert!(config.telegram.api_token.is_empty());
        assert!(warnings
            .iter()
            .any(|warning| warning.contains("failed to read configuration")));

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("broken.yaml");
        fs::write(&path, ": not yaml [").unwrap();
        std::env::set_var("CORONA_CONFIG_PATH", &path);
        let (_, warnings) = load_config();
        assert!(warnings
            .iter()
            .any(|warning| warning.contains("failed to parse YAML")));
        std::env::remove_var("CORONA_CONFIG_PATH");
    }

    #[test]
    fn test_validate_reports_all_problems() {
        let config = Config::default();
        let err = config.validate().unwrap_err().to_string();
        assert!(err.contains("telegram.api_token"));
        assert!(err.contains("crawler.excel_file_url"));
        assert!(err.contains("reporter.include_counties"));
    }
}
