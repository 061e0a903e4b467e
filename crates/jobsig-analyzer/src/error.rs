use thiserror::Error;

#[derive(Debug, Error)]
pub enum AnalyzerError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("embedding service error: {0}")]
    Embed(String),

    #[error(transparent)]
    Db(#[from] jobsig_db::DbError),
}

impl AnalyzerError {
    /// Transient failures are retried with back-off; everything else
    /// surfaces immediately.
    #[must_use]
    pub fn is_transient(&self) -> bool {
        match self {
            AnalyzerError::Http(e) => {
                e.is_timeout() || e.is_connect() || e.status().is_some_and(|s| s.is_server_error())
            }
            AnalyzerError::Embed(_) => false,
            AnalyzerError::Db(e) => e.is_transient(),
        }
    }
}
