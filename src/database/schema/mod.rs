pub mod job_record;
pub mod ocr_cache;
