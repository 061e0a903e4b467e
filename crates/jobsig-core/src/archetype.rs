use serde::{Deserialize, Serialize};

/// One of the four work-shape archetypes a listing (and résumé variant)
/// can belong to.
///
/// `ALL` is ordered builder > fixer > operator > translator; score ties
/// are broken in that fixed order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Archetype {
    Builder,
    Fixer,
    Operator,
    Translator,
}

impl Archetype {
    pub const ALL: [Archetype; 4] = [
        Archetype::Builder,
        Archetype::Fixer,
        Archetype::Operator,
        Archetype::Translator,
    ];

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Archetype::Builder => "builder",
            Archetype::Fixer => "fixer",
            Archetype::Operator => "operator",
            Archetype::Translator => "translator",
        }
    }

    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "builder" => Some(Archetype::Builder),
            "fixer" => Some(Archetype::Fixer),
            "operator" => Some(Archetype::Operator),
            "translator" => Some(Archetype::Translator),
            _ => None,
        }
    }
}

impl std::fmt::Display for Archetype {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Employment shape extracted from listing text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RoleType {
    Contract,
    Permanent,
    Unknown,
}

impl RoleType {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            RoleType::Contract => "contract",
            RoleType::Permanent => "permanent",
            RoleType::Unknown => "unknown",
        }
    }

    #[must_use]
    pub fn parse(s: &str) -> Self {
        match s.trim().to_lowercase().as_str() {
            "contract" => RoleType::Contract,
            "permanent" => RoleType::Permanent,
            _ => RoleType::Unknown,
        }
    }
}

/// Seniority band extracted from the listing title.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Seniority {
    Junior,
    Mid,
    Senior,
    Lead,
    Unknown,
}

impl Seniority {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Seniority::Junior => "junior",
            Seniority::Mid => "mid",
            Seniority::Senior => "senior",
            Seniority::Lead => "lead",
            Seniority::Unknown => "unknown",
        }
    }

    #[must_use]
    pub fn parse(s: &str) -> Self {
        match s.trim().to_lowercase().as_str() {
            "junior" => Seniority::Junior,
            "mid" => Seniority::Mid,
            "senior" => Seniority::Senior,
            "lead" => Seniority::Lead,
            _ => Seniority::Unknown,
        }
    }
}

/// Lifecycle stage of an application's outcome.
///
/// Updates are monotone: an outcome is only ever replaced by one of
/// strictly higher [`priority`](OutcomeStage::priority).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutcomeStage {
    Submitted,
    Acknowledged,
    Viewed,
    Rejected,
    Interview,
    Offer,
    Ghost,
}

impl OutcomeStage {
    /// Strict ordering used by the no-downgrade guard. `Ghost` sits just
    /// above `Submitted` so any real signal can replace it.
    #[must_use]
    pub fn priority(self) -> i16 {
        match self {
            OutcomeStage::Submitted => 0,
            OutcomeStage::Ghost => 1,
            OutcomeStage::Acknowledged => 2,
            OutcomeStage::Viewed => 3,
            OutcomeStage::Rejected => 4,
            OutcomeStage::Interview => 5,
            OutcomeStage::Offer => 6,
        }
    }

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            OutcomeStage::Submitted => "submitted",
            OutcomeStage::Acknowledged => "acknowledged",
            OutcomeStage::Viewed => "viewed",
            OutcomeStage::Rejected => "rejected",
            OutcomeStage::Interview => "interview",
            OutcomeStage::Offer => "offer",
            OutcomeStage::Ghost => "ghost",
        }
    }

    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "submitted" => Some(OutcomeStage::Submitted),
            "acknowledged" => Some(OutcomeStage::Acknowledged),
            "viewed" => Some(OutcomeStage::Viewed),
            "rejected" => Some(OutcomeStage::Rejected),
            "interview" => Some(OutcomeStage::Interview),
            "offer" => Some(OutcomeStage::Offer),
            "ghost" => Some(OutcomeStage::Ghost),
            _ => None,
        }
    }
}

impl std::fmt::Display for OutcomeStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Where an inbox message came from, as inferred from its sender.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SenderClass {
    /// The job board itself; carries an external listing id.
    Structured,
    Direct,
    Agency,
    Unknown,
}

impl SenderClass {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            SenderClass::Structured => "structured",
            SenderClass::Direct => "direct",
            SenderClass::Agency => "agency",
            SenderClass::Unknown => "unknown",
        }
    }

    #[must_use]
    pub fn parse(s: &str) -> Self {
        match s.trim().to_lowercase().as_str() {
            "structured" => SenderClass::Structured,
            "direct" => SenderClass::Direct,
            "agency" => SenderClass::Agency,
            _ => SenderClass::Unknown,
        }
    }
}

/// How a message was linked (or not) to an application.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchMethod {
    ExternalId,
    Cascade,
    Manual,
    Unmatched,
}

impl MatchMethod {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            MatchMethod::ExternalId => "external_id",
            MatchMethod::Cascade => "cascade",
            MatchMethod::Manual => "manual",
            MatchMethod::Unmatched => "unmatched",
        }
    }

    #[must_use]
    pub fn parse(s: &str) -> Self {
        match s.trim().to_lowercase().as_str() {
            "external_id" => MatchMethod::ExternalId,
            "cascade" => MatchMethod::Cascade,
            "manual" => MatchMethod::Manual,
            _ => MatchMethod::Unmatched,
        }
    }
}

/// Kind of a drift alert row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlertKind {
    MarketShift,
    ResumeStale,
    RewriteTriggered,
}

impl AlertKind {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            AlertKind::MarketShift => "market_shift",
            AlertKind::ResumeStale => "resume_stale",
            AlertKind::RewriteTriggered => "rewrite_triggered",
        }
    }

    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "market_shift" => Some(AlertKind::MarketShift),
            "resume_stale" => Some(AlertKind::ResumeStale),
            "rewrite_triggered" => Some(AlertKind::RewriteTriggered),
            _ => None,
        }
    }
}

impl std::fmt::Display for AlertKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn archetype_round_trips_through_str() {
        for archetype in Archetype::ALL {
            assert_eq!(Archetype::parse(archetype.as_str()), Some(archetype));
        }
    }

    #[test]
    fn archetype_parse_rejects_unknown() {
        assert_eq!(Archetype::parse("plumber"), None);
    }

    #[test]
    fn outcome_priority_is_strictly_ordered() {
        let ordered = [
            OutcomeStage::Submitted,
            OutcomeStage::Ghost,
            OutcomeStage::Acknowledged,
            OutcomeStage::Viewed,
            OutcomeStage::Rejected,
            OutcomeStage::Interview,
            OutcomeStage::Offer,
        ];
        for pair in ordered.windows(2) {
            assert!(pair[0].priority() < pair[1].priority());
        }
    }

    #[test]
    fn interview_outranks_rejected() {
        assert!(OutcomeStage::Interview.priority() > OutcomeStage::Rejected.priority());
    }

    #[test]
    fn role_type_parse_defaults_to_unknown() {
        assert_eq!(RoleType::parse("casual"), RoleType::Unknown);
    }
}
