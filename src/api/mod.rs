pub mod forms;
pub mod handlers;

use rocket::figment::Figment;
use rocket::http::{ContentType, Status};
use rocket::request::Request;
use rocket::response::{self, Responder, Response};
use rocket::{Build, Rocket};
use std::io::Cursor;
use std::sync::Arc;

use crate::common::errors::{ErrorResponse, JobError, JobFailure};
use crate::database::RedbStore;
use crate::workflow::JobOrchestrator;
use handlers::{generate_job_routes, generate_queue_routes};

#[derive(Debug)]
pub struct AppError {
    pub status: Status,
    pub body: ErrorResponse,
}

impl AppError {
    pub fn not_found(job_id: &str) -> Self {
        AppError {
            status: Status::NotFound,
            body: ErrorResponse {
                message: format!("job {} not found", job_id),
                job_id: job_id.to_string(),
                image_url: String::new(),
                error_code: "NotFound".to_string(),
            },
        }
    }
}

#[rocket::async_trait]
impl<'r, 'o: 'r> Responder<'r, 'o> for AppError {
    fn respond_to(self, _req: &'r Request<'_>) -> response::Result<'o> {
        let body = serde_json::to_string(&self.body).map_err(|_| Status::InternalServerError)?;

        Response::build()
            .status(self.status)
            .header(ContentType::JSON)
            .sized_body(body.len(), Cursor::new(body))
            .ok()
    }
}

impl From<JobFailure> for AppError {
    fn from(failure: JobFailure) -> Self {
        AppError {
            status: Status::from_code(failure.error.http_status())
                .unwrap_or(Status::InternalServerError),
            body: failure.response(),
        }
    }
}

impl From<JobError> for AppError {
    fn from(err: JobError) -> Self {
        AppError::from(JobFailure::from(err))
    }
}

impl From<anyhow::Error> for AppError {
    fn from(err: anyhow::Error) -> Self {
        AppError {
            status: Status::InternalServerError,
            body: ErrorResponse {
                message: format!("{:#}", err),
                job_id: String::new(),
                image_url: String::new(),
                error_code: "Internal".to_string(),
            },
        }
    }
}

pub type AppResult<T> = Result<T, AppError>;

pub fn build_rocket(
    figment: Figment,
    orchestrator: Arc<JobOrchestrator>,
    store: Arc<RedbStore>,
) -> Rocket<Build> {
    rocket::custom(figment)
        .manage(orchestrator)
        .manage(store)
        .mount("/", generate_job_routes())
        .mount("/", generate_queue_routes())
}
