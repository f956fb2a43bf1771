//! services/tracker/src/services/records.rs
//!
//! The local record store: the whole collection lives as one JSON array under a
//! fixed storage key and is rewritten on every change.

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, SecondsFormat, Timelike, Utc};
use scrap_tracker_core::domain::{DashboardStats, Record, RecordFields};
use scrap_tracker_core::ports::{KeyValueStore, PortError, PortResult, RecordRepository};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, error};

pub const RECORDS_KEY: &str = "scrapRecords";

//=========================================================================================
// Stored Representation
//=========================================================================================

/// `{ "id": ..., "timestamp": ..., <user fields> }`
#[derive(Serialize, Deserialize)]
struct StoredRecord {
    id: String,
    timestamp: String,
    #[serde(flatten)]
    fields: Map<String, Value>,
}

impl StoredRecord {
    fn from_domain(record: &Record) -> Self {
        Self {
            id: record.id.clone(),
            timestamp: record.timestamp.to_rfc3339_opts(SecondsFormat::Millis, true),
            fields: record.fields.clone().into_iter().collect(),
        }
    }

    fn to_domain(self) -> PortResult<Record> {
        let timestamp = DateTime::parse_from_rfc3339(&self.timestamp)
            .map_err(|e| {
                PortError::Unexpected(format!("Record {} has an invalid timestamp: {}", self.id, e))
            })?
            .with_timezone(&Utc);
        Ok(Record {
            id: self.id,
            timestamp,
            fields: self.fields.into_iter().collect(),
        })
    }
}

//=========================================================================================
// The Store
//=========================================================================================

pub struct LocalRecordStore {
    storage: Arc<dyn KeyValueStore>,
    // Serializes read-modify-write cycles on the collection.
    write_lock: Mutex<()>,
}

impl LocalRecordStore {
    pub fn new(storage: Arc<dyn KeyValueStore>) -> Self {
        Self {
            storage,
            write_lock: Mutex::new(()),
        }
    }

    /// Newest first.
    pub async fn recent(&self, limit: usize) -> PortResult<Vec<Record>> {
        let records = self.load().await?;
        Ok(records.into_iter().rev().take(limit).collect())
    }

    /// Records created on the given UTC calendar day, in insertion order.
    pub async fn by_date(&self, date: NaiveDate) -> PortResult<Vec<Record>> {
        let records = self.load().await?;
        Ok(records
            .into_iter()
            .filter(|r| r.timestamp.date_naive() == date)
            .collect())
    }

    pub async fn dashboard_stats(&self) -> PortResult<DashboardStats> {
        let records = self.load().await?;
        Ok(compute_stats(&records, Utc::now().date_naive()))
    }

    async fn load(&self) -> PortResult<Vec<Record>> {
        let Some(raw) = self.storage.get_item(RECORDS_KEY).await? else {
            return Ok(Vec::new());
        };
        let stored: Vec<StoredRecord> = serde_json::from_str(&raw).map_err(|e| {
            error!("Stored records are unreadable: {:?}", e);
            PortError::Unexpected(format!("Stored records are unreadable: {}", e))
        })?;
        stored.into_iter().map(StoredRecord::to_domain).collect()
    }

    async fn persist(&self, records: &[Record]) -> PortResult<()> {
        let stored: Vec<StoredRecord> = records.iter().map(StoredRecord::from_domain).collect();
        let raw =
            serde_json::to_string(&stored).map_err(|e| PortError::Unexpected(e.to_string()))?;
        self.storage.set_item(RECORDS_KEY, &raw).await
    }
}

#[async_trait]
impl RecordRepository for LocalRecordStore {
    async fn list(&self) -> PortResult<Vec<Record>> {
        self.load().await
    }

    async fn add(&self, mut fields: RecordFields) -> PortResult<Record> {
        let _guard = self.write_lock.lock().await;
        let mut records = self.load().await?;

        // The generated values win over user-supplied ones.
        fields.remove("id");
        fields.remove("timestamp");

        let now = Utc::now();
        let timestamp = now
            .with_nanosecond(now.nanosecond() / 1_000_000 * 1_000_000)
            .unwrap_or(now);

        let mut millis = timestamp.timestamp_millis();
        while records.iter().any(|r| r.id == millis.to_string()) {
            millis += 1;
        }

        let record = Record {
            id: millis.to_string(),
            timestamp,
            fields,
        };
        records.push(record.clone());
        self.persist(&records).await?;

        debug!("Added record {} ({} total)", record.id, records.len());
        Ok(record)
    }

    async fn remove(&self, id: &str) -> PortResult<()> {
        let _guard = self.write_lock.lock().await;
        let mut records = self.load().await?;
        let before = records.len();
        records.retain(|r| r.id != id);
        if records.len() == before {
            debug!("Record {} not found; collection unchanged", id);
        }
        self.persist(&records).await
    }
}

/// Pure aggregation over a record list.
pub fn compute_stats(records: &[Record], today: NaiveDate) -> DashboardStats {
    let mut stats = DashboardStats {
        total_records: records.len(),
        latest: records.last().cloned(),
        ..DashboardStats::default()
    };
    for record in records {
        let day = record.timestamp.date_naive();
        *stats.records_per_day.entry(day).or_insert(0) += 1;
        if day == today {
            stats.records_today += 1;
        }
    }
    stats
}
