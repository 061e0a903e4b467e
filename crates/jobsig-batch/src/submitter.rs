//! Submitter collaborator interface.
//!
//! The actual submission runs on the residential host as a remote side
//! effect; the coordinator only sees success or a classified failure.

use jobsig_core::Archetype;
use serde::Serialize;

/// Everything the submitter needs to place one application.
#[derive(Debug, Clone, Serialize)]
pub struct ApplicationPlan {
    pub listing_id: String,
    pub entity: String,
    pub title: String,
    pub variant_archetype: Archetype,
    /// Version-store reference to the exact variant text to send.
    pub version_id: String,
    pub variant_path: String,
    /// Must equal the externally advertised profile state; the
    /// submitter refuses otherwise.
    pub profile_state: Archetype,
}

/// A classified submission failure.
#[derive(Debug, Clone)]
pub enum SubmitFailure {
    /// Worth retrying later (timeout, 5xx, flaky network).
    Transient(String),
    /// Will not succeed without intervention (auth revoked, form
    /// changed).
    Permanent(String),
}

impl std::fmt::Display for SubmitFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SubmitFailure::Transient(msg) => write!(f, "transient submit failure: {msg}"),
            SubmitFailure::Permanent(msg) => write!(f, "permanent submit failure: {msg}"),
        }
    }
}

/// Submission contract. One submission in flight at a time; the
/// coordinator never parallelises calls.
pub trait Submitter {
    fn submit(
        &self,
        plan: &ApplicationPlan,
    ) -> impl std::future::Future<Output = Result<(), SubmitFailure>> + Send;
}

/// HTTP submitter client posting plans to the residential agent.
pub struct HttpSubmitter {
    client: reqwest::Client,
    base_url: String,
}

impl HttpSubmitter {
    /// # Panics
    ///
    /// Panics if the HTTP client cannot be constructed, which only
    /// happens with an invalid TLS/system configuration.
    #[must_use]
    pub fn new(base_url: &str, timeout_secs: u64) -> Self {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(timeout_secs))
            .build()
            .expect("failed to build HTTP client");
        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }
}

impl Submitter for HttpSubmitter {
    async fn submit(&self, plan: &ApplicationPlan) -> Result<(), SubmitFailure> {
        let url = format!("{}/submit", self.base_url);
        let response = self.client.post(&url).json(plan).send().await;

        match response {
            Ok(response) if response.status().is_success() => Ok(()),
            Ok(response) if response.status().is_server_error() => Err(SubmitFailure::Transient(
                format!("agent returned {}", response.status()),
            )),
            Ok(response) => Err(SubmitFailure::Permanent(format!(
                "agent rejected submission with {}",
                response.status()
            ))),
            Err(e) if e.is_timeout() || e.is_connect() => {
                Err(SubmitFailure::Transient(e.to_string()))
            }
            Err(e) => Err(SubmitFailure::Permanent(e.to_string())),
        }
    }
}
