use chrono::{SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use super::position::Position;

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, bitcode::Encode, bitcode::Decode,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum JobStatus {
    Pending,
    Completed,
    Failed,
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            JobStatus::Pending => write!(f, "PENDING"),
            JobStatus::Completed => write!(f, "COMPLETED"),
            JobStatus::Failed => write!(f, "FAILED"),
        }
    }
}

/// Terminal state of one job invocation, keyed by `job_id`.
/// Each terminal attempt overwrites the previous record wholesale.
#[derive(
    Debug, Clone, PartialEq, Eq, Serialize, Deserialize, bitcode::Encode, bitcode::Decode,
)]
#[serde(rename_all = "camelCase")]
pub struct JobRecord {
    pub job_id: String,
    pub image_url: String,
    pub recognized_text: String,
    pub status: JobStatus,
    pub error: String,
    pub timestamp: String,
}

impl JobRecord {
    pub fn completed(job_id: impl Into<String>, image_url: impl Into<String>, text: String) -> Self {
        Self {
            job_id: job_id.into(),
            image_url: image_url.into(),
            recognized_text: text,
            status: JobStatus::Completed,
            error: String::new(),
            timestamp: now_rfc3339(),
        }
    }

    pub fn failed(
        job_id: impl Into<String>,
        image_url: impl Into<String>,
        error: impl Into<String>,
    ) -> Self {
        Self {
            job_id: job_id.into(),
            image_url: image_url.into(),
            recognized_text: String::new(),
            status: JobStatus::Failed,
            error: error.into(),
            timestamp: now_rfc3339(),
        }
    }
}

/// Reusable OCR result keyed by image URL. Only written for completed jobs.
#[derive(
    Debug, Clone, PartialEq, Eq, Serialize, Deserialize, bitcode::Encode, bitcode::Decode,
)]
#[serde(rename_all = "camelCase")]
pub struct CacheEntry {
    pub image_url: String,
    pub job_id: String,
    pub position: Position,
    pub recognized_text: String,
    pub processed_at: String,
    pub error: String,
}

impl CacheEntry {
    pub fn new(
        job_id: impl Into<String>,
        image_url: impl Into<String>,
        position: Position,
        recognized_text: impl Into<String>,
    ) -> Self {
        Self {
            image_url: image_url.into(),
            job_id: job_id.into(),
            position,
            recognized_text: recognized_text.into(),
            processed_at: now_rfc3339(),
            error: String::new(),
        }
    }
}

pub fn now_rfc3339() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true)
}
