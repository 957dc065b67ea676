use crate::models::{ResponseMap, SeverityBand};

/// Sums the answers for PHQ-9 items 1-9. Unanswered items count as 0 and
/// answers outside that range (past diagnosis, supplementary items) are
/// ignored.
pub fn compute_total(responses: &ResponseMap) -> i32 {
    (1..=9).map(|question| responses.get(question)).sum()
}

/// Maps a PHQ-9 total onto its severity tier. Boundaries are inclusive on
/// the lower bound and there is no upper cap.
pub fn classify(total: i32) -> SeverityBand {
    match total {
        ..=4 => SeverityBand::Minimal,
        5..=9 => SeverityBand::Mild,
        10..=14 => SeverityBand::Moderate,
        15..=19 => SeverityBand::ModeratelySevere,
        _ => SeverityBand::Severe,
    }
}
