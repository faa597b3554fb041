use crate::models::JobRecord;
use anyhow::{Context, Result};
use redb::{ReadTransaction, ReadableTable, TableDefinition, WriteTransaction};

// Key: JobId -> Value: JobRecord (Serialized)
pub const JOB_RECORD_TABLE: TableDefinition<&str, &[u8]> = TableDefinition::new("ocr_job_record");

pub struct JobRecordTable;

impl JobRecordTable {
    /// Unconditional overwrite; the previous record for the job is discarded.
    pub fn put(txn: &WriteTransaction, record: &JobRecord) -> Result<()> {
        if record.job_id.is_empty() {
            anyhow::bail!("jobId cannot be empty when writing a job record");
        }
        let mut table = txn.open_table(JOB_RECORD_TABLE)?;
        let bytes = bitcode::encode(record);
        table
            .insert(record.job_id.as_str(), bytes.as_slice())
            .context(format!("failed to insert job record {}", record.job_id))?;
        Ok(())
    }

    pub fn get(txn: &ReadTransaction, job_id: &str) -> Result<Option<JobRecord>> {
        let table = txn.open_table(JOB_RECORD_TABLE)?;
        match table.get(job_id)? {
            Some(bytes) => Ok(Some(bitcode::decode(bytes.value())?)),
            None => Ok(None),
        }
    }
}
