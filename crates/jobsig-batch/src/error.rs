use jobsig_core::Archetype;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum BatchError {
    #[error("external profile state is '{actual}' but the batch archetype is '{expected}'")]
    ProfileMismatch {
        expected: Archetype,
        actual: Archetype,
    },

    #[error("listing '{0}' is intelligence-only and can never be applied to")]
    IntelligenceOnly(String),

    #[error("listing '{listing}' is a {listing_archetype} listing; the open batch is {batch_archetype}")]
    ArchetypeMismatch {
        listing: String,
        listing_archetype: Archetype,
        batch_archetype: Archetype,
    },

    #[error("listing '{0}' has not been classified yet")]
    Unclassified(String),

    #[error("batch {0} is already closed")]
    BatchClosed(i64),

    #[error("store consistency error: {0}")]
    Internal(String),

    #[error(transparent)]
    VersionStore(#[from] jobsig_core::version_store::VersionStoreError),

    #[error(transparent)]
    Db(#[from] jobsig_db::DbError),
}
