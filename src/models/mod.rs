pub mod position;
pub mod record;
pub mod request;

pub use position::{Position, resolve};
pub use record::{CacheEntry, JobRecord, JobStatus};
pub use request::{CrawlResult, JobRequest, ValidatedJob};
