//! Résumé-variant selection and queue admission.

use jobsig_core::{Archetype, EngineConfig};
use serde_json::json;

/// Outcome of variant selection for one listing.
#[derive(Debug, Clone, PartialEq)]
pub struct Selection {
    pub variant: Archetype,
    pub top_score: f32,
    pub second_score: f32,
    /// Alignment of the chosen variant against its latest centroid.
    pub alignment: f32,
    /// `top_score x alignment`, the queue-admission metric.
    pub combined: f32,
    /// Top two scores within `close_call_delta` of each other; still
    /// selected, but flagged for review.
    pub needs_review: bool,
    /// Combined score below the admission threshold; the listing feeds
    /// centroids only and is never queued.
    pub intelligence_only: bool,
}

impl Selection {
    /// Selection rationale recorded on the application at emission.
    #[must_use]
    pub fn rationale(&self) -> serde_json::Value {
        json!({
            "variant": self.variant.as_str(),
            "top_score": self.top_score,
            "second_score": self.second_score,
            "alignment": self.alignment,
            "combined": self.combined,
            "needs_review": self.needs_review,
            "intelligence_only": self.intelligence_only,
        })
    }
}

/// Alignment assumed for a variant with no recorded alignment yet.
const DEFAULT_ALIGNMENT: f32 = 0.5;

/// Pick the variant for a scored listing.
///
/// `scores` must be the normalised score map in fixed archetype order;
/// `alignment_for` resolves a variant's current alignment (None when the
/// variant has never been aligned).
pub fn select_variant(
    scores: &[(Archetype, f32)],
    alignment_for: impl Fn(Archetype) -> Option<f32>,
    engine: &EngineConfig,
) -> Selection {
    // Stable sort keeps the fixed archetype order on ties.
    let mut ranked: Vec<(Archetype, f32)> = scores.to_vec();
    ranked.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));

    let (variant, top_score) = ranked.first().copied().unwrap_or((Archetype::Builder, 0.0));
    let second_score = ranked.get(1).map_or(0.0, |(_, s)| *s);

    let alignment = alignment_for(variant).unwrap_or(DEFAULT_ALIGNMENT);
    let combined = top_score * alignment;

    Selection {
        variant,
        top_score,
        second_score,
        alignment,
        combined,
        needs_review: (top_score - second_score) < engine.close_call_delta,
        intelligence_only: combined < engine.combined_score_threshold,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scores(builder: f32, fixer: f32, operator: f32, translator: f32) -> Vec<(Archetype, f32)> {
        vec![
            (Archetype::Builder, builder),
            (Archetype::Fixer, fixer),
            (Archetype::Operator, operator),
            (Archetype::Translator, translator),
        ]
    }

    fn engine() -> EngineConfig {
        EngineConfig::default()
    }

    #[test]
    fn picks_top_archetype_and_multiplies_alignment() {
        let selection = select_variant(&scores(0.6, 0.2, 0.1, 0.1), |_| Some(0.8), &engine());
        assert_eq!(selection.variant, Archetype::Builder);
        assert!((selection.combined - 0.48).abs() < 1e-6);
        assert!(!selection.intelligence_only);
        assert!(!selection.needs_review);
    }

    #[test]
    fn below_threshold_is_intelligence_only() {
        // 0.35 x 0.4 = 0.14 < 0.15
        let selection = select_variant(&scores(0.35, 0.25, 0.2, 0.2), |_| Some(0.4), &engine());
        assert!(selection.intelligence_only);
    }

    #[test]
    fn at_threshold_is_admitted() {
        // 0.5 x 0.3 = 0.15, not strictly below the threshold.
        let selection = select_variant(&scores(0.5, 0.3, 0.1, 0.1), |_| Some(0.3), &engine());
        assert!(!selection.intelligence_only);
    }

    #[test]
    fn gap_below_delta_is_a_close_call_but_still_selected() {
        let selection = select_variant(&scores(0.40, 0.35, 0.15, 0.10), |_| Some(0.9), &engine());
        assert!(selection.needs_review);
        assert_eq!(selection.variant, Archetype::Builder);
    }

    #[test]
    fn gap_of_exactly_delta_is_not_a_close_call() {
        let selection = select_variant(&scores(0.55, 0.45, 0.0, 0.0), |_| Some(0.9), &engine());
        assert!((selection.top_score - selection.second_score - 0.10).abs() < 1e-6);
        assert!(!selection.needs_review);
    }

    #[test]
    fn missing_alignment_defaults_to_half() {
        let selection = select_variant(&scores(0.6, 0.2, 0.1, 0.1), |_| None, &engine());
        assert!((selection.alignment - 0.5).abs() < 1e-6);
        assert!((selection.combined - 0.3).abs() < 1e-6);
    }

    #[test]
    fn tie_prefers_fixed_archetype_order() {
        let selection = select_variant(&scores(0.25, 0.25, 0.25, 0.25), |_| Some(0.9), &engine());
        assert_eq!(selection.variant, Archetype::Builder);
        assert!(selection.needs_review);
    }

    #[test]
    fn rationale_carries_the_decision_inputs() {
        let selection = select_variant(&scores(0.6, 0.2, 0.1, 0.1), |_| Some(0.8), &engine());
        let rationale = selection.rationale();
        assert_eq!(rationale["variant"], "builder");
        assert!(rationale["combined"].as_f64().unwrap() > 0.0);
    }
}
