//! Command-line flags and `MP_*` environment overrides
//!
//! An environment variable, when set and non-empty, wins over the matching
//! flag; flags in turn fall back to the defaults below.

use crate::crawler::CrawlOptions;
use crate::dataset::LISTINGS_FILE;
use crate::error::ConfigError;
use crate::scrapers::{BrowserOptions, MARKTPLAATS_BASE_URL};
use clap::Parser;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

pub const ENV_PREFIX: &str = "MP_";

pub const DEFAULT_LIMIT: usize = 0;
pub const DEFAULT_TIMEOUT_SECONDS: u64 = 10;
pub const DEFAULT_WAIT_SECONDS: u64 = 10;
pub const DEFAULT_RECRAWL_HOURS: f64 = 24.0;
pub const DEFAULT_MAX_PAGE_RETRIES: u32 = 10;
pub const DEFAULT_DATA_DIR: &str = "./";
pub const DEFAULT_CHROMIUM_PATH: &str = "/usr/bin/chromium";

/// Incremental Marktplaats listings crawler
#[derive(Parser, Debug, Clone)]
#[command(name = "mp-scout", version, about, long_about = None)]
pub struct Cli {
    /// The limit of new listings to scrape, 0 for no limit (MP_LIMIT)
    #[arg(short, long, default_value_t = DEFAULT_LIMIT)]
    pub limit: usize,

    /// Run browser in headless mode (MP_HEADLESS)
    #[arg(long)]
    pub headless: bool,

    /// Path to the Chromium executable (MP_CHROMIUM_PATH)
    #[arg(long, default_value = DEFAULT_CHROMIUM_PATH)]
    pub chromium_path: PathBuf,

    /// Seconds before a page wait times out, also the page backoff (MP_TIMEOUT_SECONDS)
    #[arg(short, long = "timeout", default_value_t = DEFAULT_TIMEOUT_SECONDS)]
    pub timeout_seconds: u64,

    /// Seconds to wait before retrying a rate-limited listing (MP_WAIT_SECONDS)
    #[arg(long, default_value_t = DEFAULT_WAIT_SECONDS)]
    pub wait_seconds: u64,

    /// Recrawl listings not checked for this many hours or more (MP_RECRAWL_HOURS)
    #[arg(short, long, default_value_t = DEFAULT_RECRAWL_HOURS)]
    pub recrawl_hours: f64,

    /// Directory to save output data (MP_DATA_DIR)
    #[arg(short, long, default_value = DEFAULT_DATA_DIR)]
    pub data_dir: PathBuf,

    /// Consecutive failures allowed on one search page, 0 retries forever (MP_MAX_PAGE_RETRIES)
    #[arg(long, default_value_t = DEFAULT_MAX_PAGE_RETRIES)]
    pub max_page_retries: u32,

    /// Marketplace base URL
    #[arg(long, default_value = MARKTPLAATS_BASE_URL)]
    pub base_url: String,

    /// Increase logging verbosity (-v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,
}

/// Resolved run settings
#[derive(Debug, Clone, PartialEq)]
pub struct Settings {
    pub limit: usize,
    pub headless: bool,
    pub chromium_path: PathBuf,
    pub timeout_seconds: u64,
    pub wait_seconds: u64,
    pub recrawl_hours: f64,
    pub data_dir: PathBuf,
    pub max_page_retries: u32,
    pub base_url: String,
}

impl Settings {
    /// Resolve against the process environment
    pub fn from_env(cli: &Cli) -> Result<Self, ConfigError> {
        Self::resolve(cli, |key| std::env::var(key).ok())
    }

    /// Resolve flags against an environment lookup
    pub fn resolve<E>(cli: &Cli, env: E) -> Result<Self, ConfigError>
    where
        E: Fn(&str) -> Option<String>,
    {
        let lookup = |name: &str| {
            let key = format!("{}{}", ENV_PREFIX, name);
            env(&key)
                .filter(|value| !value.trim().is_empty())
                .map(|value| (key, value))
        };

        let settings = Self {
            limit: parse_or(lookup("LIMIT"), cli.limit)?,
            headless: match lookup("HEADLESS") {
                Some((key, value)) => parse_bool(&key, &value)?,
                None => cli.headless,
            },
            chromium_path: lookup("CHROMIUM_PATH")
                .map(|(_, value)| PathBuf::from(value))
                .unwrap_or_else(|| cli.chromium_path.clone()),
            timeout_seconds: parse_or(lookup("TIMEOUT_SECONDS"), cli.timeout_seconds)?,
            wait_seconds: parse_or(lookup("WAIT_SECONDS"), cli.wait_seconds)?,
            recrawl_hours: parse_or(lookup("RECRAWL_HOURS"), cli.recrawl_hours)?,
            data_dir: lookup("DATA_DIR")
                .map(|(_, value)| PathBuf::from(value))
                .unwrap_or_else(|| cli.data_dir.clone()),
            max_page_retries: parse_or(lookup("MAX_PAGE_RETRIES"), cli.max_page_retries)?,
            base_url: cli.base_url.clone(),
        };

        settings.validate()?;
        Ok(settings)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.timeout_seconds == 0 {
            return Err(ConfigError::Validation(
                "timeout must be at least one second".to_string(),
            ));
        }
        if !self.recrawl_hours.is_finite() || self.recrawl_hours < 0.0 {
            return Err(ConfigError::Validation(format!(
                "recrawl hours must be a non-negative number, got {}",
                self.recrawl_hours
            )));
        }
        if self.base_url.trim().is_empty() {
            return Err(ConfigError::Validation("base URL is empty".to_string()));
        }
        Ok(())
    }

    pub fn listings_path(&self) -> PathBuf {
        self.data_dir.join(LISTINGS_FILE)
    }

    pub fn crawl_options(&self) -> CrawlOptions {
        CrawlOptions {
            timeout: Duration::from_secs(self.timeout_seconds),
            wait: Duration::from_secs(self.wait_seconds),
            max_page_retries: self.max_page_retries,
        }
    }

    pub fn browser_options(&self) -> BrowserOptions {
        let longest_pause = self.timeout_seconds.max(self.wait_seconds);
        BrowserOptions {
            headless: self.headless,
            chromium_path: self.chromium_path.clone(),
            page_timeout: Duration::from_secs(self.timeout_seconds),
            idle_timeout: Duration::from_secs(longest_pause + 60),
        }
    }
}

fn parse_or<T>(value: Option<(String, String)>, fallback: T) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match value {
        Some((key, raw)) => raw
            .trim()
            .parse()
            .map_err(|e: T::Err| ConfigError::InvalidValue {
                key,
                value: raw.clone(),
                reason: e.to_string(),
            }),
        None => Ok(fallback),
    }
}

fn parse_bool(key: &str, raw: &str) -> Result<bool, ConfigError> {
    match raw.trim().to_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(ConfigError::InvalidValue {
            key: key.to_string(),
            value: raw.to_string(),
            reason: "expected a boolean".to_string(),
        }),
    }
}
