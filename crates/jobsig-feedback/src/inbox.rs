//! Inbox collaborator interface and the poll loop.

use chrono::{DateTime, Duration, Utc};
use jobsig_core::{EngineConfig, MatchMethod, SenderClass};
use jobsig_db::NewMessage;
use serde::Deserialize;
use sqlx::PgPool;

use crate::error::FeedbackError;
use crate::matcher::{match_candidates, MatchDecision, SignalFacts};
use crate::outcome::{classify_outcome, classify_sender, extract_listing_id};

/// Watermark key: the last inbox message id that was processed.
pub const INBOX_WATERMARK_KEY: &str = "inbox_last_message_id";

/// How far back the matching cascade looks for candidate applications.
const MATCH_WINDOW_DAYS: i64 = 120;

/// A raw message as the inbox collaborator yields it.
#[derive(Debug, Clone, Deserialize)]
pub struct RawMessage {
    pub external_id: String,
    pub received_at: DateTime<Utc>,
    pub sender_address: String,
    pub subject: String,
    #[serde(default)]
    pub body_text: String,
    #[serde(default)]
    pub body_html: String,
}

/// A message after parsing: normalised sender, derived domain, plain
/// body, and source class.
#[derive(Debug, Clone)]
pub struct ParsedMessage {
    pub message_id: String,
    pub received_at: DateTime<Utc>,
    pub sender_address: String,
    pub sender_domain: String,
    pub subject: String,
    pub body_text: String,
    pub body_html: String,
    pub source_class: SenderClass,
}

impl ParsedMessage {
    #[must_use]
    pub fn from_raw(raw: RawMessage) -> Self {
        let sender_address = raw.sender_address.trim().to_lowercase();
        let sender_domain = sender_address
            .split_once('@')
            .map(|(_, domain)| domain.to_string())
            .unwrap_or_default();
        let body_text = if raw.body_text.trim().is_empty() && !raw.body_html.is_empty() {
            strip_html(&raw.body_html)
        } else {
            raw.body_text
        };
        let source_class = classify_sender(&sender_address, &sender_domain);

        Self {
            message_id: raw.external_id,
            received_at: raw.received_at,
            sender_address,
            sender_domain,
            subject: raw.subject,
            body_text,
            body_html: raw.body_html,
            source_class,
        }
    }

    fn facts(&self) -> SignalFacts {
        SignalFacts {
            sender_address: self.sender_address.clone(),
            sender_domain: self.sender_domain.clone(),
            subject: self.subject.clone(),
            body: self.body_text.clone(),
            received_at: self.received_at,
            source_class: self.source_class,
            entity_hint: None,
        }
    }
}

/// Inbox collaborator: yields messages in receive order, newer than a
/// cutoff, optionally resuming after a watermark id.
pub trait Inbox {
    fn fetch(
        &self,
        newer_than: DateTime<Utc>,
        after_id: Option<&str>,
    ) -> impl std::future::Future<Output = Result<Vec<RawMessage>, FeedbackError>> + Send;
}

/// HTTP inbox client.
pub struct HttpInbox {
    client: reqwest::Client,
    base_url: String,
}

impl HttpInbox {
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

impl Inbox for HttpInbox {
    async fn fetch(
        &self,
        newer_than: DateTime<Utc>,
        after_id: Option<&str>,
    ) -> Result<Vec<RawMessage>, FeedbackError> {
        let mut request = self
            .client
            .get(format!("{}/messages", self.base_url))
            .query(&[("since", newer_than.to_rfc3339())]);
        if let Some(after) = after_id {
            request = request.query(&[("after_id", after)]);
        }

        let response = request.send().await?.error_for_status()?;
        let messages: Vec<RawMessage> = response
            .json()
            .await
            .map_err(|e| FeedbackError::Inbox(format!("message payload parse error: {e}")))?;
        Ok(messages)
    }
}

/// Counters for one poll run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PollStats {
    pub fetched: usize,
    pub duplicates: usize,
    pub outcome_signals: usize,
    pub auto_matched: usize,
    pub manual_review: usize,
    pub unmatched: usize,
}

/// Poll the inbox once: fetch, dedupe, parse, classify, match, persist,
/// and advance the watermark.
///
/// # Errors
///
/// Returns [`FeedbackError`] when the inbox or the store fails; already
/// processed messages are never an error.
pub async fn poll_inbox<I: Inbox>(
    pool: &PgPool,
    inbox: &I,
    engine: &EngineConfig,
) -> Result<PollStats, FeedbackError> {
    let watermark = jobsig_db::get_sync_state(pool, INBOX_WATERMARK_KEY).await?;
    let newer_than = Utc::now() - Duration::days(engine.inbox_lookback_days);
    let raw_messages = inbox.fetch(newer_than, watermark.as_deref()).await?;

    let mut stats = PollStats {
        fetched: raw_messages.len(),
        ..PollStats::default()
    };
    let candidates = jobsig_db::recent_for_matching(pool, MATCH_WINDOW_DAYS).await?;
    let mut newest_id = watermark.clone();

    for raw in raw_messages {
        newest_id = Some(raw.external_id.clone());
        if jobsig_db::message_exists(pool, &raw.external_id).await? {
            stats.duplicates += 1;
            continue;
        }

        let parsed = ParsedMessage::from_raw(raw);
        process_message(pool, engine, &parsed, &candidates, &mut stats).await?;
    }

    if let Some(newest) = &newest_id {
        if watermark.as_deref() != Some(newest.as_str()) {
            jobsig_db::set_sync_state(pool, INBOX_WATERMARK_KEY, newest).await?;
        }
    }

    tracing::info!(
        fetched = stats.fetched,
        auto_matched = stats.auto_matched,
        manual_review = stats.manual_review,
        "inbox poll complete"
    );
    Ok(stats)
}

/// Classify, match, and persist one parsed message.
async fn process_message(
    pool: &PgPool,
    engine: &EngineConfig,
    parsed: &ParsedMessage,
    candidates: &[jobsig_db::ApplicationRow],
    stats: &mut PollStats,
) -> Result<(), FeedbackError> {
    let classification = classify_outcome(&parsed.body_text);
    if classification.is_some() {
        stats.outcome_signals += 1;
    }
    let (outcome, confidence) = classification
        .map_or((None, 0.0), |(stage, confidence)| (Some(stage), confidence));

    // Deterministic path for structured (board) messages.
    let external = if parsed.source_class == SenderClass::Structured {
        let haystack = format!("{} {}", parsed.body_text, parsed.body_html);
        match extract_listing_id(&haystack) {
            Some(listing_id) => jobsig_db::get_application_by_listing(pool, &listing_id).await?,
            None => None,
        }
    } else {
        None
    };

    let (matched_id, matched_entity, method, needs_review) = if let Some(application) = external {
        stats.auto_matched += 1;
        (
            Some(application.id),
            Some(application.entity),
            MatchMethod::ExternalId,
            false,
        )
    } else {
        let known = lookup_sender(pool, parsed).await?;
        match match_candidates(&parsed.facts(), known.as_ref(), candidates, engine) {
            MatchDecision::Auto {
                application_id, ..
            } => {
                stats.auto_matched += 1;
                let entity = candidates
                    .iter()
                    .find(|app| app.id == application_id)
                    .map(|app| app.entity.clone());
                (Some(application_id), entity, MatchMethod::Cascade, false)
            }
            MatchDecision::ManualReview { .. } => {
                stats.manual_review += 1;
                (None, None, MatchMethod::Unmatched, true)
            }
            MatchDecision::Unmatched => {
                stats.unmatched += 1;
                (None, None, MatchMethod::Unmatched, false)
            }
        }
    };

    let message_pk = jobsig_db::insert_message(
        pool,
        &NewMessage {
            message_id: parsed.message_id.clone(),
            received_at: parsed.received_at,
            sender_address: parsed.sender_address.clone(),
            sender_domain: parsed.sender_domain.clone(),
            subject: parsed.subject.clone(),
            body_text: parsed.body_text.clone(),
            body_html: parsed.body_html.clone(),
            source_class: parsed.source_class,
            outcome_classification: outcome,
            classification_confidence: confidence,
            matched_application_id: matched_id,
            match_method: method,
            requires_manual_review: needs_review,
        },
    )
    .await?;

    let Some(message_pk) = message_pk else {
        stats.duplicates += 1;
        return Ok(());
    };

    // Confirmed match: apply the outcome (priority-guarded) and record
    // the sender for the fast path.
    if let Some(application_id) = matched_id {
        if let Some(stage) = outcome {
            jobsig_db::update_outcome(
                pool,
                application_id,
                stage,
                confidence,
                Some(parsed.received_at.date_naive()),
                Some(message_pk),
            )
            .await?;
        }
        if !parsed.sender_address.is_empty() {
            jobsig_db::upsert_known_sender(
                pool,
                &parsed.sender_address,
                &parsed.sender_domain,
                matched_entity.as_deref(),
                parsed.source_class,
            )
            .await?;
        }
    }

    Ok(())
}

async fn lookup_sender(
    pool: &PgPool,
    parsed: &ParsedMessage,
) -> Result<Option<jobsig_db::KnownSenderRow>, FeedbackError> {
    if parsed.sender_address.is_empty() {
        return Ok(None);
    }
    Ok(jobsig_db::lookup_known_sender(pool, &parsed.sender_address).await?)
}

/// Minimal tag stripper for messages that only carry an HTML body.
fn strip_html(html: &str) -> String {
    let mut out = String::with_capacity(html.len());
    let mut in_tag = false;
    for c in html.chars() {
        match c {
            '<' => in_tag = true,
            '>' => {
                in_tag = false;
                out.push(' ');
            }
            c if !in_tag => out.push(c),
            _ => {}
        }
    }
    out.split_whitespace().collect::<Vec<_>>().join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn raw(address: &str, body_text: &str, body_html: &str) -> RawMessage {
        RawMessage {
            external_id: "m-1".to_string(),
            received_at: Utc::now(),
            sender_address: address.to_string(),
            subject: "subject".to_string(),
            body_text: body_text.to_string(),
            body_html: body_html.to_string(),
        }
    }

    #[test]
    fn parse_derives_domain_and_source_class() {
        let parsed = ParsedMessage::from_raw(raw("Jane@Woolworths.COM.AU", "hello", ""));
        assert_eq!(parsed.sender_address, "jane@woolworths.com.au");
        assert_eq!(parsed.sender_domain, "woolworths.com.au");
        assert_eq!(parsed.source_class, SenderClass::Direct);
    }

    #[test]
    fn parse_falls_back_to_stripped_html_body() {
        let parsed = ParsedMessage::from_raw(raw(
            "a@b.com",
            "  ",
            "<p>We would like to <b>schedule</b> a time.</p>",
        ));
        assert_eq!(parsed.body_text, "We would like to schedule a time.");
    }

    #[test]
    fn strip_html_collapses_whitespace() {
        assert_eq!(
            strip_html("<div>\n  hello <span>world</span>\n</div>"),
            "hello world"
        );
    }

    #[test]
    fn address_without_at_has_empty_domain() {
        let parsed = ParsedMessage::from_raw(raw("not-an-address", "x", ""));
        assert_eq!(parsed.sender_domain, "");
        assert_eq!(parsed.source_class, SenderClass::Unknown);
    }

    #[tokio::test]
    async fn http_inbox_fetches_and_parses_messages() {
        use wiremock::matchers::{method, path};
        use wiremock::{Mock, MockServer, ResponseTemplate};

        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/messages"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!([
                {
                    "external_id": "m-42",
                    "received_at": "2026-07-09T08:00:00Z",
                    "sender_address": "jane@woolworths.com.au",
                    "subject": "Senior Data Engineer role",
                    "body_text": "Can we schedule a time?"
                }
            ])))
            .mount(&server)
            .await;

        let inbox = HttpInbox::new(&server.uri(), 5);
        let messages = inbox.fetch(Utc::now(), Some("m-41")).await.unwrap();
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0].external_id, "m-42");
        assert_eq!(messages[0].body_html, "", "missing body_html defaults to empty");
    }
}
