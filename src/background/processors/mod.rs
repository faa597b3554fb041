pub mod analyze;
pub mod fetch;
pub mod optimize;
pub mod recognize;
