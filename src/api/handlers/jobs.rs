use anyhow::Context;
use log::info;
use rocket::form::{Errors, Form};
use rocket::serde::json::{self, Json};
use rocket::{State, get, post};
use std::sync::Arc;

use crate::api::forms::JobForm;
use crate::api::{AppError, AppResult};
use crate::common::errors::JobError;
use crate::database::RedbStore;
use crate::models::{JobRecord, JobRequest};
use crate::workflow::JobOrchestrator;

/// Unwrap a JSON data guard, tagging a decode failure with `origin`.
pub(crate) fn decode_json<T>(
    data: Result<Json<T>, json::Error<'_>>,
    origin: &'static str,
) -> Result<T, JobError> {
    data.map(Json::into_inner).map_err(|err| {
        let message = match err {
            json::Error::Io(err) => err.to_string(),
            json::Error::Parse(_, err) => err.to_string(),
        };
        JobError::Unmarshal { origin, message }
    })
}

async fn submit_json_body(
    orchestrator: &JobOrchestrator,
    request: Result<Json<JobRequest>, json::Error<'_>>,
) -> AppResult<Json<JobRecord>> {
    let request = match decode_json(request, "HTTPRequestUnmarshal") {
        Ok(request) => request,
        Err(err) => return Err(orchestrator.reject(err).into()),
    };
    info!(job_id = request.job_id.as_str(); "Received job over HTTP (json)");
    let record = orchestrator.process(request).await?;
    Ok(Json(record))
}

#[post("/ocr", format = "json", data = "<request>")]
pub async fn submit_json(
    orchestrator: &State<Arc<JobOrchestrator>>,
    request: Result<Json<JobRequest>, json::Error<'_>>,
) -> AppResult<Json<JobRecord>> {
    submit_json_body(orchestrator, request).await
}

#[post("/ocr", format = "form", data = "<form>", rank = 2)]
pub async fn submit_form(
    orchestrator: &State<Arc<JobOrchestrator>>,
    form: Result<Form<JobForm>, Errors<'_>>,
) -> AppResult<Json<JobRecord>> {
    let request = match form {
        Ok(form) => JobRequest::from(form.into_inner()),
        Err(errors) => {
            let message = errors
                .iter()
                .map(|e| e.to_string())
                .collect::<Vec<_>>()
                .join("; ");
            let err = JobError::Unmarshal {
                origin: "HTTPFormUnmarshal",
                message,
            };
            return Err(orchestrator.reject(err).into());
        }
    };
    info!(job_id = request.job_id.as_str(); "Received job over HTTP (form)");
    let record = orchestrator.process(request).await?;
    Ok(Json(record))
}

/// Anything that is not a form, including a body with no Content-Type, is read as JSON.
#[post("/ocr", data = "<request>", rank = 3)]
pub async fn submit_untyped(
    orchestrator: &State<Arc<JobOrchestrator>>,
    request: Result<Json<JobRequest>, json::Error<'_>>,
) -> AppResult<Json<JobRecord>> {
    submit_json_body(orchestrator, request).await
}

#[get("/jobs/<job_id>")]
pub async fn get_job(store: &State<Arc<RedbStore>>, job_id: String) -> AppResult<Json<JobRecord>> {
    let store = Arc::clone(store.inner());
    let lookup_id = job_id.clone();
    let record = tokio::task::spawn_blocking(move || store.job_record(&lookup_id))
        .await
        .context("job lookup task failed")??;

    match record {
        Some(record) => Ok(Json(record)),
        None => Err(AppError::not_found(&job_id)),
    }
}

#[cfg(test)]
mod tests {
    use crate::common::errors::ErrorResponse;
    use crate::models::{JobRecord, JobStatus};
    use crate::testing::{
        ScriptedFetcher, ScriptedRecognizer, png, test_client, test_client_with_notices,
    };
    use rocket::http::{ContentType, Status};
    use serde_json::json;

    fn job_json(job_id: &str, position: &str) -> String {
        json!({
            "jobId": job_id,
            "position": position,
            "crawlResult": {
                "url": "https://blog.example.com/post/1",
                "firstImageUrl": "https://img.example.com/first.jpg"
            }
        })
        .to_string()
    }

    #[rocket::async_test]
    async fn json_job_round_trip() {
        let (client, _store) = test_client(
            ScriptedFetcher::ok(png(300, 200)),
            ScriptedRecognizer::text("텍스트"),
        )
        .await;

        let response = client
            .post("/ocr")
            .header(ContentType::JSON)
            .body(job_json("job-1", "FirstImageUrl"))
            .dispatch()
            .await;
        assert_eq!(response.status(), Status::Ok);
        let record: JobRecord = response.into_json().await.unwrap();
        assert_eq!(record.status, JobStatus::Completed);
        assert_eq!(record.recognized_text, "텍스트");

        let response = client.get("/jobs/job-1").dispatch().await;
        assert_eq!(response.status(), Status::Ok);
        let stored: JobRecord = response.into_json().await.unwrap();
        assert_eq!(stored, record);
    }

    #[rocket::async_test]
    async fn form_job_with_legacy_keys() {
        let (client, store) = test_client(
            ScriptedFetcher::ok(png(300, 200)),
            ScriptedRecognizer::text("스티커"),
        )
        .await;

        let response = client
            .post("/ocr")
            .header(ContentType::Form)
            .body(
                "JobId=job-2&currentPosition=LastStickerUrl&is2025OrLater=true\
                 &crawlResult.url=https%3A%2F%2Fblog.example.com%2F2\
                 &crawlResult.lastStickerUrl=https%3A%2F%2Fimg.example.com%2Fs.png",
            )
            .dispatch()
            .await;
        assert_eq!(response.status(), Status::Ok);

        let stored = store.job_record("job-2").unwrap().unwrap();
        assert_eq!(stored.image_url, "https://img.example.com/s.png");
        assert_eq!(stored.recognized_text, "스티커");
    }

    #[rocket::async_test]
    async fn failures_map_to_status_codes() {
        let (client, _store) = test_client(
            ScriptedFetcher::ok(png(300, 200)),
            ScriptedRecognizer::failing("Error opening data file"),
        )
        .await;

        let response = client
            .post("/ocr")
            .header(ContentType::JSON)
            .body(job_json("", "FirstImageUrl"))
            .dispatch()
            .await;
        assert_eq!(response.status(), Status::BadRequest);
        let body: ErrorResponse = response.into_json().await.unwrap();
        assert_eq!(body.error_code, "RequestValidation");
        assert_eq!(body.message, "missing jobId");

        let response = client
            .post("/ocr")
            .header(ContentType::JSON)
            .body("{\"jobId\": ")
            .dispatch()
            .await;
        assert_eq!(response.status(), Status::BadRequest);
        let body: ErrorResponse = response.into_json().await.unwrap();
        assert_eq!(body.error_code, "HTTPRequestUnmarshal");

        let response = client
            .post("/ocr")
            .header(ContentType::JSON)
            .body(job_json("job-3", "FirstImageUrl"))
            .dispatch()
            .await;
        assert_eq!(response.status(), Status::UnprocessableEntity);
        let body: ErrorResponse = response.into_json().await.unwrap();
        assert_eq!(body.error_code, "OCRExecutionFailed");
        assert_eq!(body.job_id, "job-3");
        assert_eq!(body.image_url, "https://img.example.com/first.jpg");
        assert!(body.message.contains("Error opening data file"));

        let response = client.get("/jobs/job-3").dispatch().await;
        let stored: JobRecord = response.into_json().await.unwrap();
        assert_eq!(stored.status, JobStatus::Failed);
    }

    #[rocket::async_test]
    async fn body_without_content_type_is_read_as_json() {
        let (client, store) = test_client(
            ScriptedFetcher::ok(png(300, 200)),
            ScriptedRecognizer::text("텍스트"),
        )
        .await;

        let response = client
            .post("/ocr")
            .body(job_json("job-x", "FirstImageUrl"))
            .dispatch()
            .await;
        assert_eq!(response.status(), Status::Ok);
        let stored = store.job_record("job-x").unwrap().unwrap();
        assert_eq!(stored.status, JobStatus::Completed);

        let response = client
            .post("/ocr")
            .header(ContentType::Plain)
            .body(job_json("job-y", "FirstImageUrl"))
            .dispatch()
            .await;
        assert_eq!(response.status(), Status::Ok);
        assert!(store.job_record("job-y").unwrap().is_some());
    }

    #[rocket::async_test]
    async fn decode_failures_are_notified() {
        let (client, _store, mut notices) = test_client_with_notices(
            ScriptedFetcher::ok(png(300, 200)),
            ScriptedRecognizer::text("텍스트"),
        )
        .await;

        let response = client
            .post("/ocr")
            .header(ContentType::JSON)
            .body("{\"jobId\": ")
            .dispatch()
            .await;
        assert_eq!(response.status(), Status::BadRequest);
        let body: ErrorResponse = response.into_json().await.unwrap();
        assert_eq!(body.error_code, "HTTPRequestUnmarshal");

        let notice = notices.try_recv().unwrap();
        assert_eq!(notice.source, "HTTPRequestUnmarshal");
        assert_eq!(notice.job_id, None);
        assert!(notices.try_recv().is_err());
    }

    #[rocket::async_test]
    async fn unknown_job_is_not_found() {
        let (client, _store) = test_client(
            ScriptedFetcher::ok(png(300, 200)),
            ScriptedRecognizer::text("텍스트"),
        )
        .await;

        let response = client.get("/jobs/nope").dispatch().await;
        assert_eq!(response.status(), Status::NotFound);
        let body: ErrorResponse = response.into_json().await.unwrap();
        assert_eq!(body.error_code, "NotFound");
        assert_eq!(body.job_id, "nope");
    }
}
