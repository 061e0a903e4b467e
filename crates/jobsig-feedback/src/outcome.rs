//! Rule-based outcome classification for inbox messages.

use jobsig_core::{OutcomeStage, SenderClass};
use regex::Regex;
use std::sync::OnceLock;

/// Keyword rules per outcome, highest priority first. A tie between
/// categories resolves to the earlier entry.
const OUTCOME_RULES: &[(OutcomeStage, &[&str])] = &[
    (
        OutcomeStage::Offer,
        &[
            "employment offer",
            "pleased to offer",
            "offer letter",
            "compensation package",
            "written offer",
        ],
    ),
    (
        OutcomeStage::Interview,
        &[
            "availability",
            "phone screen",
            "would like to discuss",
            "schedule",
            "interview",
            "meet with",
            "arrange a time",
            "chat about the role",
            "initial conversation",
            "when are you free",
        ],
    ),
    (
        OutcomeStage::Rejected,
        &[
            "unfortunately",
            "other candidates",
            "not progressing",
            "position has been filled",
            "we will not be",
            "unsuccessful",
            "decided not to proceed",
            "not shortlisted",
            "gone with another",
        ],
    ),
    (
        OutcomeStage::Viewed,
        &[
            "your application was viewed",
            "has viewed your application",
            "viewed your profile",
        ],
    ),
    (
        OutcomeStage::Acknowledged,
        &[
            "application received",
            "thank you for applying",
            "we have received",
            "application submitted",
        ],
    ),
];

/// Domains that belong to the job board itself; their messages carry an
/// external listing identifier.
const BOARD_DOMAINS: &[&str] = &["seek.com.au"];

const AGENCY_TOKENS: &[&str] = &["recruit", "talent", "agency", "staff"];

/// Classify a message body into an outcome with a confidence score.
///
/// Matching is case-insensitive substring; confidence is the fraction of
/// the winning category's keywords that matched. Returns `None` when no
/// category matches (the message is not an outcome signal).
#[must_use]
pub fn classify_outcome(body: &str) -> Option<(OutcomeStage, f32)> {
    let text = body.to_lowercase();

    for (stage, keywords) in OUTCOME_RULES {
        let hits = keywords.iter().filter(|k| text.contains(*k)).count();
        if hits > 0 {
            #[allow(clippy::cast_precision_loss)]
            let confidence = hits as f32 / keywords.len() as f32;
            return Some((*stage, confidence));
        }
    }
    None
}

/// Infer the sender class from address and domain.
#[must_use]
pub fn classify_sender(sender_address: &str, sender_domain: &str) -> SenderClass {
    let address = sender_address.to_lowercase();
    let domain = sender_domain.to_lowercase();

    if BOARD_DOMAINS
        .iter()
        .any(|board| address.contains(board) || domain.ends_with(board))
    {
        return SenderClass::Structured;
    }
    if AGENCY_TOKENS.iter().any(|token| domain.contains(token)) {
        return SenderClass::Agency;
    }
    if !domain.is_empty() {
        return SenderClass::Direct;
    }
    SenderClass::Unknown
}

/// Pull an external listing identifier out of message text or URLs.
#[must_use]
pub fn extract_listing_id(text: &str) -> Option<String> {
    static PATTERNS: OnceLock<Vec<Regex>> = OnceLock::new();
    let patterns = PATTERNS.get_or_init(|| {
        vec![
            Regex::new(r"(?i)jobId=(\d+)").expect("static pattern"),
            Regex::new(r"(?i)/job/(\d+)").expect("static pattern"),
        ]
    });

    for pattern in patterns {
        if let Some(captures) = pattern.captures(text) {
            return Some(captures[1].to_string());
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn interview_keywords_classify_as_interview() {
        let (stage, confidence) =
            classify_outcome("Hi, we would like to schedule a time to chat.").unwrap();
        assert_eq!(stage, OutcomeStage::Interview);
        assert!(confidence > 0.0);
    }

    #[test]
    fn interview_outranks_rejected_on_ties() {
        // Both categories match; priority order decides.
        let (stage, _) =
            classify_outcome("Unfortunately the panel wants another interview.").unwrap();
        assert_eq!(stage, OutcomeStage::Interview);
    }

    #[test]
    fn offer_outranks_interview() {
        let (stage, _) =
            classify_outcome("Following the interview we are pleased to offer you the role.")
                .unwrap();
        assert_eq!(stage, OutcomeStage::Offer);
    }

    #[test]
    fn acknowledgement_is_detected() {
        let (stage, _) = classify_outcome("Thank you for applying to Acme.").unwrap();
        assert_eq!(stage, OutcomeStage::Acknowledged);
    }

    #[test]
    fn plain_newsletter_is_not_a_signal() {
        assert!(classify_outcome("Weekly digest: ten hot jobs near you").is_none());
    }

    #[test]
    fn confidence_is_fraction_of_category_keywords() {
        // "availability" + "interview" + "schedule" = 3 of 10 interview keywords.
        let (stage, confidence) =
            classify_outcome("interview availability: please schedule").unwrap();
        assert_eq!(stage, OutcomeStage::Interview);
        assert!((confidence - 0.3).abs() < 1e-6);
    }

    #[test]
    fn board_domain_is_structured() {
        assert_eq!(
            classify_sender("noreply@seek.com.au", "seek.com.au"),
            SenderClass::Structured
        );
    }

    #[test]
    fn recruiting_domain_is_agency() {
        assert_eq!(
            classify_sender("amy@toptalentgroup.com", "toptalentgroup.com"),
            SenderClass::Agency
        );
    }

    #[test]
    fn company_domain_is_direct() {
        assert_eq!(
            classify_sender("jane@woolworths.com.au", "woolworths.com.au"),
            SenderClass::Direct
        );
    }

    #[test]
    fn empty_domain_is_unknown() {
        assert_eq!(classify_sender("", ""), SenderClass::Unknown);
    }

    #[test]
    fn listing_id_is_extracted_from_urls() {
        assert_eq!(
            extract_listing_id("https://example.seek.com.au/apply?jobId=81234567").as_deref(),
            Some("81234567")
        );
        assert_eq!(
            extract_listing_id("see https://www.seek.com.au/job/81234567 for details").as_deref(),
            Some("81234567")
        );
        assert!(extract_listing_id("no identifiers here").is_none());
    }
}
