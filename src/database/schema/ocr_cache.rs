use crate::models::CacheEntry;
use anyhow::{Context, Result};
use redb::{TableDefinition, WriteTransaction};
#[cfg(test)]
use redb::{ReadTransaction, ReadableTable};

// Key: ImageUrl -> Value: CacheEntry (Serialized)
pub const OCR_CACHE_TABLE: TableDefinition<&str, &[u8]> = TableDefinition::new("ocr_result_cache");

pub struct OcrCacheTable;

impl OcrCacheTable {
    pub fn put(txn: &WriteTransaction, entry: &CacheEntry) -> Result<()> {
        if entry.image_url.is_empty() {
            anyhow::bail!("imageUrl cannot be empty when writing a cache entry");
        }
        let mut table = txn.open_table(OCR_CACHE_TABLE)?;
        let bytes = bitcode::encode(entry);
        table
            .insert(entry.image_url.as_str(), bytes.as_slice())
            .context(format!("failed to insert cache entry for {}", entry.image_url))?;
        Ok(())
    }

    #[cfg(test)]
    pub fn get(txn: &ReadTransaction, image_url: &str) -> Result<Option<CacheEntry>> {
        let table = txn.open_table(OCR_CACHE_TABLE)?;
        match table.get(image_url)? {
            Some(bytes) => Ok(Some(bitcode::decode(bytes.value())?)),
            None => Ok(None),
        }
    }
}
