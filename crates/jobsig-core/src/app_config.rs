use std::net::SocketAddr;
use std::path::PathBuf;

/// Process-level configuration, read from the environment.
#[derive(Clone)]
pub struct AppConfig {
    pub database_url: String,
    pub log_level: String,
    pub bind_addr: SocketAddr,
    /// Local data directory holding the write spool and snapshots.
    pub data_dir: PathBuf,
    /// Root directory of the résumé-variant version store.
    pub variant_root: PathBuf,
    /// Base URL of the embedding service (`/embed` + `/info`). Absent
    /// means the deterministic hashing fallback.
    pub embed_url: Option<String>,
    pub embed_dim: usize,
    pub external_timeout_secs: u64,
    /// Residential submitter agent endpoint.
    pub submitter_url: Option<String>,
    /// Inbox collaborator endpoint.
    pub inbox_url: Option<String>,
    pub db_max_connections: u32,
    pub db_min_connections: u32,
    pub db_acquire_timeout_secs: u64,
    pub external_max_retries: u32,
    pub external_backoff_base_ms: u64,
    pub engine: EngineConfig,
}

impl std::fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppConfig")
            .field("database_url", &"[redacted]")
            .field("log_level", &self.log_level)
            .field("bind_addr", &self.bind_addr)
            .field("data_dir", &self.data_dir)
            .field("variant_root", &self.variant_root)
            .field("embed_url", &self.embed_url)
            .field("embed_dim", &self.embed_dim)
            .field("external_timeout_secs", &self.external_timeout_secs)
            .field("submitter_url", &self.submitter_url)
            .field("inbox_url", &self.inbox_url)
            .field("db_max_connections", &self.db_max_connections)
            .field("db_min_connections", &self.db_min_connections)
            .field("db_acquire_timeout_secs", &self.db_acquire_timeout_secs)
            .field("external_max_retries", &self.external_max_retries)
            .field("external_backoff_base_ms", &self.external_backoff_base_ms)
            .field("engine", &self.engine)
            .finish()
    }
}

/// Tunables of the signal engine. Every recognised option is a field
/// here; defaults match the documented behaviour.
#[derive(Debug, Clone, PartialEq)]
pub struct EngineConfig {
    /// Centroid movement above which a market_shift alert fires.
    pub shift_threshold: f32,
    /// Variant staleness distance above which a resume_stale alert fires.
    pub staleness_threshold: f32,
    /// Minimum days since the last rewrite before another can trigger.
    pub rewrite_cooldown_days: i64,
    /// Rolling centroid window width.
    pub window_days: i64,
    /// Minimum listings in a window before a centroid is computed.
    pub min_window_jd_count: usize,
    /// Top-minus-second score gap below which selection is a close call.
    pub close_call_delta: f32,
    /// Combined (top score x alignment) below which a listing is kept
    /// for market intelligence only.
    pub combined_score_threshold: f32,
    /// Cascade score a single candidate must exceed to auto-match.
    pub match_auto_confidence: f32,
    /// How far back an unacknowledged alert still counts as recent.
    pub alert_recency_days: i64,
    /// Inbox poll lookback window.
    pub inbox_lookback_days: i64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            shift_threshold: 0.05,
            staleness_threshold: 0.08,
            rewrite_cooldown_days: 21,
            window_days: 30,
            min_window_jd_count: 5,
            close_call_delta: 0.10,
            combined_score_threshold: 0.15,
            match_auto_confidence: 0.5,
            alert_recency_days: 30,
            inbox_lookback_days: 1,
        }
    }
}
