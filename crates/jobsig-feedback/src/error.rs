use thiserror::Error;

#[derive(Debug, Error)]
pub enum FeedbackError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("inbox error: {0}")]
    Inbox(String),

    #[error(transparent)]
    Db(#[from] jobsig_db::DbError),

    #[error(transparent)]
    Analyzer(#[from] jobsig_analyzer::AnalyzerError),

    #[error(transparent)]
    VersionStore(#[from] jobsig_core::version_store::VersionStoreError),
}
