use crate::datasource::currency::DEFAULT_RATE_API_URL;
use crate::domain::TimeMs;
use crate::engine::MatchPolicy;
use chrono::{Datelike, Days, NaiveDate, Utc};
use serde::Deserialize;
use std::collections::HashMap;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Clone)]
pub struct Config {
    pub sales_start: TimeMs,
    /// Inclusive: the last millisecond of the end month.
    pub sales_end: TimeMs,
    /// First day of the sales start month, kept for report naming.
    pub sales_start_date: NaiveDate,
    /// First day of the month after the sales end month.
    pub sales_end_date: NaiveDate,
    pub buys_start: TimeMs,
    pub buys_end: TimeMs,
    pub sources: SourceToggles,
    pub dmarket_cs_only: bool,
    pub match_policy: MatchPolicy,
    pub create_xlsx: bool,
    pub create_csv: bool,
    pub report_dir: PathBuf,
    pub secrets_path: PathBuf,
    pub currency_api_url: String,
}

/// Which marketplaces to fetch.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SourceToggles {
    pub dmarket: bool,
    pub csfloat: bool,
    pub buffmarket: bool,
    pub csmoney: bool,
    pub youpin: bool,
}

impl SourceToggles {
    pub fn any(&self) -> bool {
        self.dmarket || self.csfloat || self.buffmarket || self.csmoney || self.youpin
    }
}

/// Marketplace credentials, read from a JSON file.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Secrets {
    #[serde(default)]
    pub dmarket_key: String,
    #[serde(default)]
    pub csfloat_key: String,
    #[serde(default)]
    pub buffmarket_headers: HashMap<String, String>,
    #[serde(default)]
    pub buffmarket_cookies: HashMap<String, String>,
    #[serde(default, rename = "csmoney_cookie")]
    pub csmoney_cookies: HashMap<String, String>,
    #[serde(default)]
    pub youpin_headers: HashMap<String, String>,
    #[serde(default, rename = "youpin_steamid")]
    pub youpin_steam_id: String,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingEnv(String),
    #[error("Invalid value for {0}: {1}")]
    InvalidValue(String, String),
    #[error("Failed to load secrets from {0}: {1}")]
    Secrets(String, String),
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_env_map(std::env::vars().collect())
    }

    pub fn from_env_map(env_map: HashMap<String, String>) -> Result<Self, ConfigError> {
        let sales_start_date = parse_month(&env_map, "SALES_START")?;
        let sales_end_month = parse_month(&env_map, "SALES_END")?;
        let sales_end_date = next_month(sales_end_month).ok_or_else(|| {
            ConfigError::InvalidValue("SALES_END".to_string(), "month out of range".to_string())
        })?;
        if sales_end_date <= sales_start_date {
            return Err(ConfigError::InvalidValue(
                "SALES_END".to_string(),
                "must not be before SALES_START".to_string(),
            ));
        }

        let buys_start_date = match env_map.get("BUYS_START") {
            Some(s) => NaiveDate::parse_from_str(s.trim(), "%Y-%m-%d").map_err(|_| {
                ConfigError::InvalidValue(
                    "BUYS_START".to_string(),
                    "must be YYYY-MM-DD".to_string(),
                )
            })?,
            None => NaiveDate::from_ymd_opt(2023, 1, 1).ok_or_else(|| {
                ConfigError::InvalidValue("BUYS_START".to_string(), "bad default".to_string())
            })?,
        };
        let buys_end = Utc::now()
            .checked_add_days(Days::new(1))
            .map(TimeMs::from)
            .unwrap_or_else(TimeMs::now);

        let match_policy = match env_map.get("MATCH_POLICY") {
            Some(s) => s
                .parse::<MatchPolicy>()
                .map_err(|e| ConfigError::InvalidValue("MATCH_POLICY".to_string(), e))?,
            None => MatchPolicy::default(),
        };

        let sources = SourceToggles {
            dmarket: parse_bool(&env_map, "FETCH_DMARKET")?,
            csfloat: parse_bool(&env_map, "FETCH_CSFLOAT")?,
            buffmarket: parse_bool(&env_map, "FETCH_BUFFMARKET")?,
            csmoney: parse_bool(&env_map, "FETCH_CSMONEY")?,
            youpin: parse_bool(&env_map, "FETCH_YOUPIN")?,
        };

        Ok(Config {
            sales_start: start_of_day(sales_start_date),
            sales_end: TimeMs::new(start_of_day(sales_end_date).as_ms() - 1),
            sales_start_date,
            sales_end_date,
            buys_start: start_of_day(buys_start_date),
            buys_end,
            sources,
            dmarket_cs_only: parse_bool(&env_map, "DMARKET_CS_ONLY")?,
            match_policy,
            create_xlsx: parse_bool(&env_map, "CREATE_XLSX")?,
            create_csv: parse_bool(&env_map, "CREATE_CSV")?,
            report_dir: PathBuf::from(env_map.get("REPORT_DIR").map(|s| s.as_str()).unwrap_or(".")),
            secrets_path: PathBuf::from(
                env_map
                    .get("SECRETS_PATH")
                    .map(|s| s.as_str())
                    .unwrap_or("secrets.json"),
            ),
            currency_api_url: env_map
                .get("CURRENCY_API_URL")
                .cloned()
                .unwrap_or_else(|| DEFAULT_RATE_API_URL.to_string()),
        })
    }

    /// Read the secrets file. A missing file is only acceptable when no
    /// marketplace is enabled.
    pub fn load_secrets(&self) -> Result<Secrets, ConfigError> {
        let path = self.secrets_path.display().to_string();
        let content = match std::fs::read_to_string(&self.secrets_path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound && !self.sources.any() => {
                return Ok(Secrets::default())
            }
            Err(e) => return Err(ConfigError::Secrets(path, e.to_string())),
        };
        serde_json::from_str(&content).map_err(|e| ConfigError::Secrets(path, e.to_string()))
    }
}

fn parse_month(env_map: &HashMap<String, String>, key: &str) -> Result<NaiveDate, ConfigError> {
    let raw = env_map
        .get(key)
        .ok_or_else(|| ConfigError::MissingEnv(key.to_string()))?;
    NaiveDate::parse_from_str(&format!("{}-01", raw.trim()), "%Y-%m-%d")
        .map_err(|_| ConfigError::InvalidValue(key.to_string(), "must be YYYY-MM".to_string()))
}

fn parse_bool(env_map: &HashMap<String, String>, key: &str) -> Result<bool, ConfigError> {
    match env_map.get(key).map(|s| s.trim().to_ascii_lowercase()).as_deref() {
        None | Some("") => Ok(false),
        Some("true") | Some("1") | Some("yes") => Ok(true),
        Some("false") | Some("0") | Some("no") => Ok(false),
        Some(other) => Err(ConfigError::InvalidValue(
            key.to_string(),
            format!("must be true or false, got {}", other),
        )),
    }
}

fn next_month(date: NaiveDate) -> Option<NaiveDate> {
    if date.month() == 12 {
        NaiveDate::from_ymd_opt(date.year() + 1, 1, 1)
    } else {
        NaiveDate::from_ymd_opt(date.year(), date.month() + 1, 1)
    }
}

fn start_of_day(date: NaiveDate) -> TimeMs {
    TimeMs::new(date.and_time(chrono::NaiveTime::MIN).and_utc().timestamp_millis())
}
