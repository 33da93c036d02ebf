use redb::{Database, ReadableTable, TableDefinition};
use serde::{Deserialize, Serialize};
use std::path::Path;

const RECORDS: TableDefinition<&str, &[u8]> = TableDefinition::new("records");

/// One stored mail item. `processed_at` stays `None` until the processing
/// loop has successfully dispatched every action for the record; it is
/// written only by `mark_processed`, never by `upsert`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MailRecord {
    pub id: String,
    #[serde(default)]
    pub thread_id: Option<String>,
    #[serde(default)]
    pub from_address: String,
    #[serde(default)]
    pub to_address: String,
    #[serde(default)]
    pub subject: String,
    #[serde(default)]
    pub snippet: String,
    /// Unix seconds.
    pub received_at: i64,
    #[serde(default)]
    pub processed_at: Option<i64>,
}

pub struct RecordStore {
    db: Database,
}

impl RecordStore {
    pub fn open<P: AsRef<Path>>(path: P) -> Result<RecordStore, String> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| format!("failed to create store dir: {}", e))?;
        }
        let db = Database::create(path)
            .map_err(|e| format!("failed to open store at {}: {}", path.display(), e))?;

        let txn = db
            .begin_write()
            .map_err(|e| format!("store write txn: {}", e))?;
        {
            txn.open_table(RECORDS)
                .map_err(|e| format!("store open table: {}", e))?;
        }
        txn.commit().map_err(|e| format!("store commit: {}", e))?;

        Ok(RecordStore { db })
    }

    /// Insert or update records by id. An existing record is updated in
    /// place and keeps its `processed_at`; a re-fetch never duplicates and
    /// never resurrects a record for processing.
    pub fn upsert(&self, records: &[MailRecord]) -> Result<(), String> {
        if records.is_empty() {
            return Ok(());
        }
        let txn = self
            .db
            .begin_write()
            .map_err(|e| format!("store write txn: {}", e))?;
        {
            let mut table = txn
                .open_table(RECORDS)
                .map_err(|e| format!("store open table: {}", e))?;
            for record in records {
                let existing_processed_at = match table
                    .get(record.id.as_str())
                    .map_err(|e| format!("store read '{}': {}", record.id, e))?
                {
                    Some(entry) => serde_json::from_slice::<MailRecord>(entry.value())
                        .map(|r| r.processed_at)
                        .unwrap_or(None),
                    None => None,
                };
                let mut merged = record.clone();
                merged.processed_at = existing_processed_at;
                let bytes = serde_json::to_vec(&merged)
                    .map_err(|e| format!("store encode '{}': {}", record.id, e))?;
                table
                    .insert(merged.id.as_str(), bytes.as_slice())
                    .map_err(|e| format!("store insert '{}': {}", merged.id, e))?;
            }
        }
        txn.commit().map_err(|e| format!("store commit: {}", e))
    }

    /// Every stored record, in key order.
    pub fn all(&self) -> Result<Vec<MailRecord>, String> {
        let txn = self
            .db
            .begin_read()
            .map_err(|e| format!("store read txn: {}", e))?;
        let table = txn
            .open_table(RECORDS)
            .map_err(|e| format!("store open table: {}", e))?;

        let mut records = Vec::new();
        for entry in table.iter().map_err(|e| format!("store scan: {}", e))? {
            let (key, value) = entry.map_err(|e| format!("store scan: {}", e))?;
            let record: MailRecord = serde_json::from_slice(value.value())
                .map_err(|e| format!("store decode '{}': {}", key.value(), e))?;
            records.push(record);
        }
        Ok(records)
    }

    /// All records with `processed_at = None`, in key order.
    pub fn unprocessed(&self) -> Result<Vec<MailRecord>, String> {
        let mut records = self.all()?;
        records.retain(|r| r.processed_at.is_none());
        Ok(records)
    }

    /// Set `processed_at` for one record and commit immediately, so a crash
    /// mid-run leaves earlier records durably marked.
    pub fn mark_processed(&self, id: &str, processed_at: i64) -> Result<(), String> {
        let txn = self
            .db
            .begin_write()
            .map_err(|e| format!("store write txn: {}", e))?;
        {
            let mut table = txn
                .open_table(RECORDS)
                .map_err(|e| format!("store open table: {}", e))?;
            let mut record: MailRecord = match table
                .get(id)
                .map_err(|e| format!("store read '{}': {}", id, e))?
            {
                Some(entry) => serde_json::from_slice(entry.value())
                    .map_err(|e| format!("store decode '{}': {}", id, e))?,
                None => return Err(format!("no record with id '{}'", id)),
            };
            record.processed_at = Some(processed_at);
            let bytes = serde_json::to_vec(&record)
                .map_err(|e| format!("store encode '{}': {}", id, e))?;
            table
                .insert(id, bytes.as_slice())
                .map_err(|e| format!("store insert '{}': {}", id, e))?;
        }
        txn.commit().map_err(|e| format!("store commit: {}", e))
    }
}

#[cfg(test)]
impl RecordStore {
    fn get(&self, id: &str) -> Result<Option<MailRecord>, String> {
        let txn = self
            .db
            .begin_read()
            .map_err(|e| format!("store read txn: {}", e))?;
        let table = txn
            .open_table(RECORDS)
            .map_err(|e| format!("store open table: {}", e))?;
        match table
            .get(id)
            .map_err(|e| format!("store read '{}': {}", id, e))?
        {
            Some(entry) => serde_json::from_slice(entry.value())
                .map(Some)
                .map_err(|e| format!("store decode '{}': {}", id, e)),
            None => Ok(None),
        }
    }

    fn count(&self) -> Result<u64, String> {
        let txn = self
            .db
            .begin_read()
            .map_err(|e| format!("store read txn: {}", e))?;
        let table = txn
            .open_table(RECORDS)
            .map_err(|e| format!("store open table: {}", e))?;
        let count = table
            .iter()
            .map_err(|e| format!("store scan: {}", e))?
            .count();
        Ok(count as u64)
    }
}
