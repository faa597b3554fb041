pub mod schema;

use anyhow::{Context, Result};
use log::info;
use redb::Database;
use std::path::Path;

use crate::models::{CacheEntry, JobRecord};
use schema::job_record::{JOB_RECORD_TABLE, JobRecordTable};
use schema::ocr_cache::{OCR_CACHE_TABLE, OcrCacheTable};

/// Durable, keyed job state. Writes are atomic per key and unconditional.
pub trait JobRecordStore: Send + Sync {
    fn put_job_record(&self, record: &JobRecord) -> Result<()>;
}

/// Write-only from the pipeline's point of view: nothing here reads it back
/// to skip recognition.
pub trait CacheStore: Send + Sync {
    fn put_cache_entry(&self, entry: &CacheEntry) -> Result<()>;
}

/// Both tables in a single redb file. Opened once by `main` and shared.
pub struct RedbStore {
    in_disk: Database,
}

impl RedbStore {
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let database =
            Database::create(path).context(format!("failed to open redb file {:?}", path))?;
        let store = Self::from_database(database)?;
        info!("Opened job store at {:?}", path);
        Ok(store)
    }

    #[cfg(test)]
    pub fn in_memory() -> Result<Self> {
        let database =
            Database::builder().create_with_backend(redb::backends::InMemoryBackend::new())?;
        Self::from_database(database)
    }

    fn from_database(in_disk: Database) -> Result<Self> {
        let txn = in_disk.begin_write()?;
        txn.open_table(JOB_RECORD_TABLE)?;
        txn.open_table(OCR_CACHE_TABLE)?;
        txn.commit()?;
        Ok(Self { in_disk })
    }

    pub fn job_record(&self, job_id: &str) -> Result<Option<JobRecord>> {
        let txn = self.in_disk.begin_read()?;
        JobRecordTable::get(&txn, job_id)
    }

    #[cfg(test)]
    pub fn cache_entry(&self, image_url: &str) -> Result<Option<CacheEntry>> {
        let txn = self.in_disk.begin_read()?;
        OcrCacheTable::get(&txn, image_url)
    }
}

impl JobRecordStore for RedbStore {
    fn put_job_record(&self, record: &JobRecord) -> Result<()> {
        let txn = self.in_disk.begin_write()?;
        JobRecordTable::put(&txn, record)?;
        txn.commit()
            .context(format!("failed to commit job record {}", record.job_id))?;
        Ok(())
    }
}

impl CacheStore for RedbStore {
    fn put_cache_entry(&self, entry: &CacheEntry) -> Result<()> {
        let txn = self.in_disk.begin_write()?;
        OcrCacheTable::put(&txn, entry)?;
        txn.commit()
            .context(format!("failed to commit cache entry {}", entry.image_url))?;
        Ok(())
    }
}
