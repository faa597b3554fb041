use log::{info, warn};
use rocket::http::Status;
use rocket::serde::json::{self, Json};
use rocket::{State, post};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use super::jobs::decode_json;
use crate::api::AppResult;
use crate::common::errors::{ErrorResponse, JobError, JobFailure};
use crate::models::JobRequest;
use crate::workflow::JobOrchestrator;

/// Queue delivery envelope: one or more messages, each carrying a JSON job.
#[derive(Debug, Deserialize)]
pub struct QueueBatch {
    #[serde(rename = "Records", default)]
    pub records: Vec<QueueRecord>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueueRecord {
    pub message_id: String,
    pub body: String,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchItemFailure {
    pub item_identifier: String,
    pub error: ErrorResponse,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchResponse {
    pub processed: usize,
    pub batch_item_failures: Vec<BatchItemFailure>,
}

/// Every record is its own job invocation, run one after another. Any
/// failure turns the whole response into a 500 so the transport redelivers.
#[post("/queue", format = "json", data = "<batch>")]
pub async fn receive_batch(
    orchestrator: &State<Arc<JobOrchestrator>>,
    batch: Result<Json<QueueBatch>, json::Error<'_>>,
) -> AppResult<(Status, Json<BatchResponse>)> {
    let batch = match decode_json(batch, "QueueEventUnmarshal") {
        Ok(batch) => batch,
        Err(err) => return Err(orchestrator.reject(err).into()),
    };
    if batch.records.is_empty() {
        let err = JobError::Unmarshal {
            origin: "QueueEventHandler",
            message: "no records in queue event".to_string(),
        };
        return Err(orchestrator.reject(err).into());
    }

    info!("Received queue batch of {} records", batch.records.len());
    let mut failures = Vec::new();
    for record in &batch.records {
        if let Err(failure) = process_record(orchestrator, record).await {
            warn!(job_id = failure.job_id.as_str(); "Queue message {} failed: {}", record.message_id, failure);
            failures.push(BatchItemFailure {
                item_identifier: record.message_id.clone(),
                error: failure.response(),
            });
        }
    }

    let status = if failures.is_empty() {
        Status::Ok
    } else {
        Status::InternalServerError
    };
    Ok((
        status,
        Json(BatchResponse {
            processed: batch.records.len(),
            batch_item_failures: failures,
        }),
    ))
}

async fn process_record(
    orchestrator: &JobOrchestrator,
    record: &QueueRecord,
) -> Result<(), JobFailure> {
    let request: JobRequest = match serde_json::from_str(&record.body) {
        Ok(request) => request,
        Err(err) => {
            return Err(orchestrator.reject(JobError::Unmarshal {
                origin: "QueueMessageUnmarshal",
                message: err.to_string(),
            }));
        }
    };
    orchestrator.process(request).await.map(|_| ())
}
