use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::PathBuf;
use std::time::Duration;

use crate::common::ANALYZE_CYCLE_PATH;

/// Process configuration, read from the environment (and `.env`, if present).
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct AppConfig {
    /// redb file holding the job record and cache tables
    #[serde(default = "default_db_path")]
    pub db_path: PathBuf,
    /// Explicit engine binary; discovery runs when unset
    #[serde(default)]
    pub tesseract_path: Option<PathBuf>,
    /// Language data directory handed to the engine via `TESSDATA_PREFIX`
    #[serde(default = "default_tessdata_prefix")]
    pub tessdata_prefix: PathBuf,
    #[serde(default = "default_ocr_language")]
    pub ocr_language: String,
    #[serde(default = "default_ocr_timeout_secs")]
    pub ocr_timeout_secs: u64,
    #[serde(default = "default_fetch_timeout_secs")]
    pub fetch_timeout_secs: u64,
    #[serde(default = "default_max_image_bytes")]
    pub max_image_bytes: u64,
    /// Failure webhook; without it no notifier is wired
    #[serde(default)]
    pub error_webhook_url: Option<String>,
    #[serde(default = "default_notify_timeout_secs")]
    pub notify_timeout_secs: u64,
    #[serde(default = "default_notify_queue_capacity")]
    pub notify_queue_capacity: usize,
    /// Base URL of the analysis service; the call is skipped when unset
    #[serde(default)]
    pub api_url: Option<String>,
    #[serde(default = "default_true")]
    pub analysis_failure_is_fatal: bool,
}

fn default_db_path() -> PathBuf {
    PathBuf::from("./db/ocr.redb")
}

fn default_tessdata_prefix() -> PathBuf {
    PathBuf::from("/opt/share/tessdata")
}

fn default_ocr_language() -> String {
    "kor".to_string()
}

fn default_ocr_timeout_secs() -> u64 {
    60
}

fn default_fetch_timeout_secs() -> u64 {
    30
}

fn default_max_image_bytes() -> u64 {
    20 * 1024 * 1024
}

fn default_notify_timeout_secs() -> u64 {
    10
}

fn default_notify_queue_capacity() -> usize {
    64
}

fn default_true() -> bool {
    true
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            db_path: default_db_path(),
            tesseract_path: None,
            tessdata_prefix: default_tessdata_prefix(),
            ocr_language: default_ocr_language(),
            ocr_timeout_secs: default_ocr_timeout_secs(),
            fetch_timeout_secs: default_fetch_timeout_secs(),
            max_image_bytes: default_max_image_bytes(),
            error_webhook_url: None,
            notify_timeout_secs: default_notify_timeout_secs(),
            notify_queue_capacity: default_notify_queue_capacity(),
            api_url: None,
            analysis_failure_is_fatal: true,
        }
    }
}

impl AppConfig {
    pub fn from_env() -> Result<Self> {
        dotenv::dotenv().ok();
        let config = envy::from_env::<AppConfig>()
            .context("failed to read configuration from environment")?;
        Ok(config.normalized())
    }

    /// Blank values in `.env` files read as unset.
    fn normalized(mut self) -> Self {
        self.error_webhook_url = self
            .error_webhook_url
            .filter(|url| !url.trim().is_empty());
        self.api_url = self.api_url.filter(|url| !url.trim().is_empty());
        self.tesseract_path = self
            .tesseract_path
            .filter(|path| !path.as_os_str().is_empty());
        self
    }

    pub fn ocr_timeout(&self) -> Duration {
        Duration::from_secs(self.ocr_timeout_secs)
    }

    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_secs(self.fetch_timeout_secs)
    }

    pub fn notify_timeout(&self) -> Duration {
        Duration::from_secs(self.notify_timeout_secs)
    }

    pub fn analysis_endpoint(&self) -> Option<String> {
        self.api_url
            .as_ref()
            .map(|base| format!("{}{}", base.trim_end_matches('/'), ANALYZE_CYCLE_PATH))
    }
}
