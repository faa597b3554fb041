pub mod errors;

// Optimizer bounds, in pixels.
pub const OPTIMAL_WIDTH: u32 = 1000;
pub const OPTIMAL_HEIGHT: u32 = 500;
pub const WIDE_FACTOR: f64 = 1.5;
pub const TALL_FACTOR: f64 = 1.5;
pub const CROP_WIDTH: u32 = 100;
pub const CROP_HEIGHT: u32 = 500;

pub const JPEG_QUALITY: u8 = 90;

pub const TESSERACT_CANDIDATE_PATHS: &[&str] = &[
    "/opt/bin/tesseract",
    "/opt/tesseract",
    "/usr/local/bin/tesseract",
];

pub const ANALYZE_CYCLE_PATH: &str = "/api/v1/search/analyze/cycle";

use std::sync::LazyLock;

use tokio::runtime::{Builder, Runtime};

// Dedicated to rocket and everything a request drives: fetch, engine
// subprocess, store writes and the notifier worker.
pub static ROCKET_RUNTIME: LazyLock<Runtime> = LazyLock::new(|| {
    Builder::new_multi_thread()
        .thread_name("rocket-io-worker")
        .enable_all()
        .build()
        .expect("Failed to build Rocket Tokio runtime")
});
