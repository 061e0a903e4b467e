//! Application queue and batch emission under the shared-profile
//! invariant.

mod coordinator;
mod error;
mod queue;
mod submitter;

pub use coordinator::{close_batch, emit, open_batch, EmitOutcome};
pub use error::BatchError;
pub use queue::{list_queue, queued_listings, QueueSummary};
pub use submitter::{ApplicationPlan, HttpSubmitter, SubmitFailure, Submitter};
