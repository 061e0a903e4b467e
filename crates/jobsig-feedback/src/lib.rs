//! Outcome ingestion and the market-drift feedback loop.
//!
//! Everything downstream of a submitted application lives here: parsing
//! inbox messages, classifying outcome signals, linking them back to
//! applications (deterministically or via the cascade), call-log intake,
//! rolling market centroids, and the rewrite trigger.

pub mod drift;
mod error;
mod inbox;
mod intake;
pub mod matcher;
pub mod outcome;
mod rewrite;

pub use error::FeedbackError;
pub use inbox::{poll_inbox, HttpInbox, Inbox, ParsedMessage, PollStats, RawMessage};
pub use intake::{log_call, CallIntake, CallLogged};
pub use matcher::{match_candidates, MatchDecision, RankedCandidate, SignalFacts};
pub use rewrite::{check_rewrite_triggers, TriggeredRewrite};
