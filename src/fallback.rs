use crate::models::{PredictionMethod, PredictionResult, ResponseMap};
use crate::score;

/// Confidence reported for rule-based assessments. Flat regardless of how
/// complete the answers are.
pub const FALLBACK_CONFIDENCE: f64 = 0.85;

/// Rule-based severity assessment used whenever model inference is
/// unavailable or fails. Has no external dependencies and always succeeds;
/// an empty response map scores 0 and lands in the Minimal tier.
pub fn assess(responses: &ResponseMap) -> PredictionResult {
    let total = score::compute_total(responses);
    PredictionResult {
        severity: score::classify(total),
        confidence: FALLBACK_CONFIDENCE,
        method: PredictionMethod::Fallback,
    }
}
