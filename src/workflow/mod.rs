//! Workflow module - drives a job through the pipeline
//!
//! Structure:
//! - `types`: In-flight guard against concurrent duplicate deliveries
//! - `flows`: The job orchestrator

pub mod flows;
pub mod types;

pub use flows::JobOrchestrator;
