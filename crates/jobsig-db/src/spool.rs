//! Local single-file write spool.
//!
//! When the server engine is unreachable, listing and call-log writes
//! spill to `spool.jsonl` under the data directory. `flush_spool`
//! replays them insert-if-missing (a unique conflict means the record
//! already made it across) and truncates the file on success.

use std::io::Write;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use sqlx::PgPool;

use crate::call_log::{insert_call, NewCall};
use crate::listings::{insert_listing, NewListing};
use crate::{set_sync_state, DbError};

const SPOOL_FILE: &str = "spool.jsonl";
pub const SPOOL_FLUSH_KEY: &str = "spool_last_flush_at";

/// One buffered write.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SpoolRecord {
    Listing(NewListing),
    Call(NewCall),
}

/// Flush statistics for CLI display.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SpoolStats {
    pub replayed: usize,
    pub duplicates: usize,
}

fn spool_path(data_dir: &Path) -> PathBuf {
    data_dir.join(SPOOL_FILE)
}

/// Append one record to the spool file, creating it (and the data dir)
/// on first use.
///
/// # Errors
///
/// Returns [`DbError::Io`] on I/O failure.
pub fn append_spool(data_dir: &Path, record: &SpoolRecord) -> Result<(), DbError> {
    std::fs::create_dir_all(data_dir)?;
    let mut file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(spool_path(data_dir))?;
    let line = serde_json::to_string(record)?;
    writeln!(file, "{line}")?;
    Ok(())
}

/// Replay every spooled record into the store, then truncate the spool.
///
/// Listings are inserted if missing (a unique conflict counts as a
/// duplicate, not a failure); call-log entries are appended as-is. A
/// transient store failure aborts the flush and leaves the spool intact
/// for the next attempt.
///
/// # Errors
///
/// Returns [`DbError`] if the store rejects a write for a
/// non-duplicate reason, or on spool I/O failure.
pub async fn flush_spool(pool: &PgPool, data_dir: &Path) -> Result<SpoolStats, DbError> {
    let path = spool_path(data_dir);
    if !path.exists() {
        return Ok(SpoolStats::default());
    }

    let content = std::fs::read_to_string(&path)?;
    let mut stats = SpoolStats::default();

    for line in content.lines() {
        if line.trim().is_empty() {
            continue;
        }
        let record: SpoolRecord = serde_json::from_str(line)?;
        match record {
            SpoolRecord::Listing(listing) => match insert_listing(pool, &listing).await {
                Ok(_) => stats.replayed += 1,
                Err(DbError::UniqueConflict { .. }) => stats.duplicates += 1,
                Err(e) => return Err(e),
            },
            SpoolRecord::Call(call) => {
                insert_call(pool, &call).await?;
                stats.replayed += 1;
            }
        }
    }

    std::fs::write(&path, "")?;
    set_sync_state(pool, SPOOL_FLUSH_KEY, &chrono::Utc::now().to_rfc3339()).await?;

    tracing::info!(
        replayed = stats.replayed,
        duplicates = stats.duplicates,
        "spool flushed"
    );
    Ok(stats)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn sample_listing() -> NewListing {
        NewListing {
            listing_id: "9001".to_string(),
            title: "Senior Data Engineer".to_string(),
            entity: "Woolworths".to_string(),
            description: "Build pipelines.".to_string(),
            first_seen: NaiveDate::from_ymd_opt(2026, 7, 1).unwrap(),
            search_keyword: Some("data engineer".to_string()),
        }
    }

    #[test]
    fn spool_records_round_trip_as_jsonl() {
        let dir = tempfile::tempdir().unwrap();
        append_spool(dir.path(), &SpoolRecord::Listing(sample_listing())).unwrap();
        append_spool(
            dir.path(),
            &SpoolRecord::Call(NewCall {
                phone: None,
                entity: "Woolworths".to_string(),
                title: "Senior Data Engineer".to_string(),
                outcome: "screening_call".to_string(),
                notes: String::new(),
                call_date: NaiveDate::from_ymd_opt(2026, 7, 9).unwrap(),
                matched_application_id: None,
            }),
        )
        .unwrap();

        let content = std::fs::read_to_string(dir.path().join(SPOOL_FILE)).unwrap();
        let lines: Vec<&str> = content.lines().collect();
        assert_eq!(lines.len(), 2);

        let first: SpoolRecord = serde_json::from_str(lines[0]).unwrap();
        assert!(matches!(first, SpoolRecord::Listing(ref l) if l.listing_id == "9001"));
        let second: SpoolRecord = serde_json::from_str(lines[1]).unwrap();
        assert!(matches!(second, SpoolRecord::Call(_)));
    }

    #[test]
    fn append_creates_missing_data_dir() {
        let dir = tempfile::tempdir().unwrap();
        let nested = dir.path().join("deeper");
        append_spool(&nested, &SpoolRecord::Listing(sample_listing())).unwrap();
        assert!(nested.join(SPOOL_FILE).exists());
    }
}
