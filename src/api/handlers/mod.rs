use rocket::{Route, routes};

pub mod jobs;
pub mod queue;

pub fn generate_job_routes() -> Vec<Route> {
    routes![
        jobs::submit_json,
        jobs::submit_form,
        jobs::submit_untyped,
        jobs::get_job
    ]
}

pub fn generate_queue_routes() -> Vec<Route> {
    routes![queue::receive_batch]
}
