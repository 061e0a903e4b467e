//! Point-in-time store snapshots.
//!
//! Exports every entity table as JSONL into a timestamped directory.
//! A logical export keeps the backup path free of any external tooling;
//! restore is a replay concern, not the engine's.

use std::path::{Path, PathBuf};

use serde_json::Value;
use sqlx::PgPool;

use crate::DbError;

const TABLES: &[&str] = &[
    "listings",
    "applications",
    "application_batches",
    "messages",
    "known_senders",
    "call_log",
    "resume_variants",
    "market_centroids",
    "drift_alerts",
    "sync_state",
];

/// Write a snapshot of every table under
/// `<out_dir>/snapshot-<YYYYMMDDHHMMSS>/<table>.jsonl` and return the
/// snapshot directory.
///
/// # Errors
///
/// Returns [`DbError`] on query or I/O failure.
pub async fn snapshot_store(pool: &PgPool, out_dir: &Path) -> Result<PathBuf, DbError> {
    let stamp = chrono::Utc::now().format("%Y%m%d%H%M%S");
    let snapshot_dir = out_dir.join(format!("snapshot-{stamp}"));
    tokio::fs::create_dir_all(&snapshot_dir).await?;

    for table in TABLES {
        // Table names come from the static list above, never from input.
        let query = format!("SELECT row_to_json(t)::jsonb FROM {table} t ORDER BY 1");
        let rows: Vec<Value> = sqlx::query_scalar(&query).fetch_all(pool).await?;

        let mut lines = String::new();
        for row in &rows {
            lines.push_str(&serde_json::to_string(row)?);
            lines.push('\n');
        }
        tokio::fs::write(snapshot_dir.join(format!("{table}.jsonl")), lines).await?;
        tracing::debug!(table, rows = rows.len(), "snapshot table written");
    }

    tracing::info!(dir = %snapshot_dir.display(), "store snapshot complete");
    Ok(snapshot_dir)
}
