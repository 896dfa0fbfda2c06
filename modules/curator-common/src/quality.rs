//! Editorial thresholds and rubric weights for the quality gate.

/// Minimum weighted rubric score for a report to be published.
pub const MIN_OVERALL_SCORE: f64 = 7.0;

/// Minimum fraction of sources at or above `TRUSTED_SOURCE_SCORE`.
pub const MIN_TRUST_SOURCE_RATIO: f64 = 0.6;

/// A source counts as trusted at or above this domain trust score.
pub const TRUSTED_SOURCE_SCORE: u8 = 70;

/// Value used for any rubric field the evaluator omits or garbles.
pub const NEUTRAL_RUBRIC_SCORE: f64 = 7.0;

pub const RELIABILITY_WEIGHT: f64 = 0.30;
pub const COMPLETENESS_WEIGHT: f64 = 0.25;
pub const OBJECTIVITY_WEIGHT: f64 = 0.25;
pub const SOURCE_QUALITY_WEIGHT: f64 = 0.20;

/// Weighted sum of the four rubric components (weights sum to 1.0).
pub fn overall_score(
    reliability: f64,
    completeness: f64,
    objectivity: f64,
    source_quality: f64,
) -> f64 {
    reliability * RELIABILITY_WEIGHT
        + completeness * COMPLETENESS_WEIGHT
        + objectivity * OBJECTIVITY_WEIGHT
        + source_quality * SOURCE_QUALITY_WEIGHT
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn weights_sum_to_one() {
        let total =
            RELIABILITY_WEIGHT + COMPLETENESS_WEIGHT + OBJECTIVITY_WEIGHT + SOURCE_QUALITY_WEIGHT;
        assert!((total - 1.0).abs() < 1e-9);
    }

    #[test]
    fn uniform_components_give_same_overall() {
        assert!((overall_score(7.0, 7.0, 7.0, 7.0) - 7.0).abs() < 1e-9);
    }

    #[test]
    fn reliability_dominates() {
        let high_reliability = overall_score(10.0, 5.0, 5.0, 5.0);
        let high_source = overall_score(5.0, 5.0, 5.0, 10.0);
        assert!(high_reliability > high_source);
    }
}
