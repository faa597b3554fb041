//! Background module - the work a job drives outside the request handler
//!
//! Structure:
//! - `processors`: Pipeline stages (fetch, optimize, recognize, analyze)
//! - `notifier`: Best-effort failure alerting on its own worker

pub mod notifier;
pub mod processors;
