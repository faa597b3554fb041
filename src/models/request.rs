use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};

use super::position::Position;
use crate::common::errors::JobError;

/// Crawled page a job points into. Only the five image fields matter to OCR;
/// the text fields are carried through to the analysis call untouched.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CrawlResult {
    #[serde(deserialize_with = "null_as_empty")]
    pub url: String,
    #[serde(deserialize_with = "null_as_empty")]
    pub first_paragraph: String,
    #[serde(deserialize_with = "null_as_empty")]
    pub last_paragraph: String,
    #[serde(deserialize_with = "null_as_empty")]
    pub content: String,
    #[serde(deserialize_with = "null_as_empty")]
    pub first_image_url: String,
    #[serde(deserialize_with = "null_as_empty")]
    pub last_image_url: String,
    #[serde(deserialize_with = "null_as_empty")]
    pub first_sticker_url: String,
    #[serde(deserialize_with = "null_as_empty")]
    pub second_sticker_url: String,
    #[serde(deserialize_with = "null_as_empty")]
    pub last_sticker_url: String,
}

/// Canonical job description every transport decodes into.
///
/// `position` stays a raw string here: membership in the closed slot set is
/// checked by [`JobRequest::validate`], so a bad slot becomes a recorded
/// validation failure instead of a decode error.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobRequest {
    #[serde(default, alias = "JobId", deserialize_with = "null_as_empty")]
    pub job_id: String,
    #[serde(default, alias = "reqId", skip_serializing_if = "Option::is_none")]
    pub request_id: Option<String>,
    #[serde(default, alias = "currentPosition", deserialize_with = "null_as_empty")]
    pub position: String,
    #[serde(default, alias = "is2025OrLater", deserialize_with = "lenient_bool")]
    pub is_late_period: bool,
    #[serde(
        default,
        deserialize_with = "lenient_timestamp",
        skip_serializing_if = "Option::is_none"
    )]
    pub requested_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub crawl_result: Option<CrawlResult>,
}

/// A request that passed validation; borrowed from the [`JobRequest`].
#[derive(Debug, Clone, Copy)]
pub struct ValidatedJob<'a> {
    pub job_id: &'a str,
    pub position: Position,
    pub crawl_result: &'a CrawlResult,
}

impl JobRequest {
    pub fn validate(&self) -> Result<ValidatedJob<'_>, JobError> {
        if self.job_id.trim().is_empty() {
            return Err(JobError::Validation("missing jobId".to_string()));
        }
        let crawl_result = self
            .crawl_result
            .as_ref()
            .ok_or_else(|| JobError::Validation("crawlResult is required".to_string()))?;
        if self.position.is_empty() {
            return Err(JobError::Validation(
                "currentPosition is required".to_string(),
            ));
        }
        let position = self.position.parse::<Position>().map_err(JobError::Validation)?;

        Ok(ValidatedJob {
            job_id: &self.job_id,
            position,
            crawl_result,
        })
    }

    /// Page URL for log lines, empty when the crawl reference is missing.
    pub fn page_url(&self) -> &str {
        self.crawl_result
            .as_ref()
            .map(|crawl| crawl.url.as_str())
            .unwrap_or_default()
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum BoolOrText {
    Bool(bool),
    Text(String),
}

/// Queue producers send the epoch flag both as a JSON bool and as text.
fn lenient_bool<'de, D: Deserializer<'de>>(deserializer: D) -> Result<bool, D::Error> {
    Ok(match Option::<BoolOrText>::deserialize(deserializer)? {
        Some(BoolOrText::Bool(value)) => value,
        Some(BoolOrText::Text(text)) => text.trim().parse().unwrap_or(false),
        None => false,
    })
}

/// Producers send `null` for unused slots; it reads the same as absent.
fn null_as_empty<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
    Ok(Option::<String>::deserialize(deserializer)?.unwrap_or_default())
}

/// Unparsable timestamps are dropped rather than rejecting the whole job.
fn lenient_timestamp<'de, D: Deserializer<'de>>(
    deserializer: D,
) -> Result<Option<DateTime<Utc>>, D::Error> {
    Ok(Option::<String>::deserialize(deserializer)?.and_then(|text| parse_rfc3339(&text)))
}

pub fn parse_rfc3339(text: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(text.trim())
        .ok()
        .map(|timestamp| timestamp.with_timezone(&Utc))
}
