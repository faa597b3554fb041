use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

/// Everything that can end a job invocation early.
///
/// Cache and notification failures are absent on purpose: they are logged
/// where they happen and never change the outcome of a job.
#[derive(Debug, Error)]
pub enum JobError {
    #[error("{0}")]
    Validation(String),

    #[error("{message}")]
    Unmarshal {
        origin: &'static str,
        message: String,
    },

    #[error("failed to fetch image: {0}")]
    Fetch(String),

    #[error("failed to optimize image: {0}")]
    Optimize(String),

    #[error("{0}")]
    EngineNotFound(String),

    #[error("{0}")]
    EngineExecution(String),

    #[error("recognition engine timed out after {}s", .0.as_secs())]
    EngineTimeout(Duration),

    #[error("analysis API call failed: {0}")]
    Downstream(String),

    #[error("failed to update job record: {0}")]
    Persistence(String),

    #[error("job {0} is already being processed")]
    InProgress(String),
}

impl JobError {
    /// Error-source tag reported as `errorCode` and in failure notifications.
    pub fn source_tag(&self) -> &'static str {
        match self {
            JobError::Validation(_) => "RequestValidation",
            JobError::Unmarshal { origin, .. } => *origin,
            JobError::Fetch(_) => "ImageFetch",
            JobError::Optimize(_) => "ImageOptimize",
            JobError::EngineNotFound(_) => "EngineNotFound",
            JobError::EngineExecution(_) => "OCRExecutionFailed",
            JobError::EngineTimeout(_) => "OCRTimeout",
            JobError::Downstream(_) => "AnalyzeAPI",
            JobError::Persistence(_) => "UpdateJobRecord",
            JobError::InProgress(_) => "DuplicateDelivery",
        }
    }

    /// Caller mistakes map to 4xx, broken infrastructure to 5xx.
    pub fn http_status(&self) -> u16 {
        match self {
            JobError::Validation(_) | JobError::Unmarshal { .. } => 400,
            JobError::InProgress(_) => 409,
            JobError::Optimize(_) | JobError::EngineExecution(_) => 422,
            JobError::Fetch(_) | JobError::Downstream(_) => 502,
            JobError::EngineTimeout(_) => 504,
            JobError::EngineNotFound(_) | JobError::Persistence(_) => 500,
        }
    }

    /// A rejected duplicate is not a job outcome, so nobody is alerted.
    pub fn should_notify(&self) -> bool {
        !matches!(self, JobError::InProgress(_))
    }
}

/// A [`JobError`] together with the job it ended.
#[derive(Debug, Error)]
#[error("{error}")]
pub struct JobFailure {
    pub error: JobError,
    pub job_id: String,
    pub image_url: String,
}

impl JobFailure {
    pub fn new(error: JobError, job_id: impl Into<String>, image_url: impl Into<String>) -> Self {
        Self {
            error,
            job_id: job_id.into(),
            image_url: image_url.into(),
        }
    }

    pub fn response(&self) -> ErrorResponse {
        ErrorResponse {
            message: self.error.to_string(),
            job_id: self.job_id.clone(),
            image_url: self.image_url.clone(),
            error_code: self.error.source_tag().to_string(),
        }
    }
}

impl From<JobError> for JobFailure {
    fn from(error: JobError) -> Self {
        JobFailure::new(error, "", "")
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorResponse {
    pub message: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub job_id: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub image_url: String,
    pub error_code: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validation_is_a_client_error() {
        let failure = JobFailure::new(JobError::Validation("missing jobId".into()), "", "");
        let response = failure.response();
        assert_eq!(failure.error.http_status(), 400);
        assert_eq!(response.error_code, "RequestValidation");
        assert_eq!(response.message, "missing jobId");

        let body = serde_json::to_value(&response).unwrap();
        assert!(body.get("jobId").is_none());
        assert_eq!(body["errorCode"], "RequestValidation");
    }

    #[test]
    fn infrastructure_failures_are_server_errors() {
        assert_eq!(JobError::EngineNotFound("gone".into()).http_status(), 500);
        assert_eq!(JobError::Persistence("disk full".into()).http_status(), 500);
        assert!(JobError::Persistence("disk full".into()).should_notify());
        assert!(!JobError::InProgress("job-1".into()).should_notify());
    }

    #[test]
    fn timeout_message_names_the_bound() {
        let message = JobError::EngineTimeout(Duration::from_secs(60)).to_string();
        assert_eq!(message, "recognition engine timed out after 60s");
    }
}
