//! Seed dictionary for the archetype classifier.
//!
//! Verb-pattern templates carry a `{tech}` wildcard that matches a short
//! run of technology nouns; sentence indicators are fixed phrases. The
//! same phrases seed the per-archetype embedding centroids, so the
//! dictionary is the single source of truth for both signal paths.

use jobsig_core::Archetype;

pub struct ArchetypeSeeds {
    pub archetype: Archetype,
    pub verb_patterns: &'static [&'static str],
    pub sentence_indicators: &'static [&'static str],
}

pub const SEED_DICTIONARY: [ArchetypeSeeds; 4] = [
    ArchetypeSeeds {
        archetype: Archetype::Builder,
        verb_patterns: &[
            "build {tech}",
            "building {tech}",
            "design {tech}",
            "designing {tech}",
            "design and implement {tech}",
            "designing and implementing {tech}",
            "architect {tech}",
            "architecting {tech}",
            "implement {tech} from scratch",
            "implementing {tech} from scratch",
            "establish {tech}",
            "establishing {tech}",
            "create {tech}",
            "creating {tech}",
            "set up {tech}",
            "setting up {tech}",
            "develop new {tech}",
            "developing new {tech}",
            "stand up {tech}",
            "standing up {tech}",
            "greenfield",
            "from the ground up",
            "define standards",
            "new platform",
            "cloud-native",
            "founding",
            "build out",
            "building out",
            "develop and deploy",
            "developing and deploying",
            "create a new",
            "design the architecture",
            "lead the development of",
        ],
        sentence_indicators: &[
            "no existing",
            "first hire",
            "new team",
            "newly created",
            "start-up phase",
            "zero to one",
            "ground floor",
            "vision for",
            "shape the direction",
            "greenfield",
        ],
    },
    ArchetypeSeeds {
        archetype: Archetype::Fixer,
        verb_patterns: &[
            "migrate {tech}",
            "migrating {tech}",
            "migrate from {tech} to {tech}",
            "consolidate {tech}",
            "refactor {tech}",
            "refactoring {tech}",
            "modernise {tech}",
            "modernising {tech}",
            "modernize {tech}",
            "modernizing {tech}",
            "replace {tech}",
            "uplift {tech}",
            "uplifting {tech}",
            "remediate {tech}",
            "transition from {tech}",
            "transition to {tech}",
            "sunset {tech}",
            "decommission {tech}",
            "decommissioning {tech}",
            "optimise {tech}",
            "re-platform",
            "improve existing",
            "reduce complexity",
            "streamline",
            "transform legacy",
            "clean up",
            "rationalise",
            "data migration",
            "target state",
            "target-state",
            "transformation program",
            "uplift program",
            "platform uplift",
            "system decommissioning",
        ],
        sentence_indicators: &[
            "legacy",
            "tech debt",
            "technical debt",
            "end of life",
            "current state",
            "pain points",
            "inefficiencies",
            "aging infrastructure",
            "manual processes",
            "existing systems need",
            "outdated",
            "migration",
            "migrating",
            "modernisation",
            "modernization",
            "uplift",
            "target state",
            "target-state",
            "transformation",
            "decommission",
            "decommissioning",
        ],
    },
    ArchetypeSeeds {
        archetype: Archetype::Operator,
        verb_patterns: &[
            "maintain {tech}",
            "maintaining {tech}",
            "support {tech}",
            "supporting {tech}",
            "monitor {tech}",
            "monitoring {tech}",
            "ensure reliability of {tech}",
            "manage {tech}",
            "administer {tech}",
            "troubleshoot {tech}",
            "troubleshooting {tech}",
            "on-call",
            "incident response",
            "production support",
            "bau",
            "run book",
            "sla",
            "ensure uptime",
            "day-to-day management",
            "operational readiness",
            "observability",
            "platform reliability",
            "operational resilience",
            "runbook",
            "slo",
            "sli",
        ],
        sentence_indicators: &[
            "steady state",
            "ongoing",
            "business as usual",
            "existing environment",
            "mature platform",
            "well-established",
            "ensure continuity",
            "support the team",
            "keep the lights on",
            "incident",
            "runbook",
            "observability",
        ],
    },
    ArchetypeSeeds {
        archetype: Archetype::Translator,
        verb_patterns: &[
            "enable {tech}",
            "train on {tech}",
            "translate requirements",
            "bridge technical and business",
            "self-serve",
            "data literacy",
            "empower stakeholders",
            "gather requirements",
            "communicate insights",
            "present findings",
            "democratise data",
        ],
        sentence_indicators: &[
            "stakeholder",
            "non-technical",
            "business users",
            "executive reporting",
            "data-driven culture",
            "enable teams",
            "business intelligence",
            "analytics enablement",
            "self-serve",
            "semantic model",
        ],
    },
];

/// Technology nouns recognised when extracting a listing's tag set.
pub const KNOWN_TECH: &[&str] = &[
    "snowflake",
    "dbt",
    "airflow",
    "spark",
    "kafka",
    "terraform",
    "aws",
    "azure",
    "gcp",
    "python",
    "sql",
    "kubernetes",
    "docker",
    "fivetran",
    "looker",
    "tableau",
    "power bi",
    "databricks",
    "redshift",
    "bigquery",
    "matillion",
    "informatica",
    "talend",
    "ssis",
    "ssas",
    "ssrs",
    "kimball",
    "data vault",
    "medallion",
];

// Keyword boosts. These damp brittle tie-breaking on JDs that phrase the
// work in noun form ("migration" rather than "migrate X").

pub const STRONG_FIXER_TOKENS: &[&str] = &[
    "legacy",
    "tech debt",
    "technical debt",
    "decommission",
    "decommissioning",
    "end of life",
    "uplift program",
    "platform uplift",
    "target state",
    "target-state",
    "transformation program",
    "erp transformation",
    "modernisation",
    "modernization",
    "redesign",
    "re-platform",
    "replatform",
];

pub const MEDIUM_FIXER_TOKENS: &[&str] = &[
    "migration",
    "migrate",
    "migrating",
    "transition",
    "transform",
    "refactor",
    "uplift",
    "modernis",
    "moderniz",
];

pub const HARD_OPERATOR_TOKENS: &[&str] = &[
    "on-call",
    "on call",
    "incident response",
    "production support",
    "runbook",
    "run book",
    "sla",
    "slo",
    "sli",
];

pub const SOFT_OPERATOR_TOKENS: &[&str] = &[
    "observability",
    "operational readiness",
    "operational resilience",
    "platform reliability",
];

// Translator is intentionally conservative; a single "stakeholders"
// mention must not dominate plain engineering roles.
pub const TRANSLATOR_TOKENS: &[&str] = &[
    "self-serve",
    "self serve",
    "semantic model",
    "executive reporting",
    "business intelligence",
    "data literacy",
    "analytics enablement",
];

pub const BUILDER_TOKENS: &[&str] = &[
    "greenfield",
    "from the ground up",
    "from scratch",
    "0->1",
    "zero to one",
    "new platform",
    "first hire",
];
