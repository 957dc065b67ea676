use crate::models::{FeatureVector, ResponseMap};
use crate::score;

/// Builds the feature vector the trained model expects: the nine PHQ-9
/// answers, the past-diagnosis flag (question 10), and the PHQ-9 total.
/// Missing answers default to 0. The total reuses the score calculator so
/// the two can never drift apart.
pub fn extract(responses: &ResponseMap) -> FeatureVector {
    FeatureVector {
        q1: responses.get(1),
        q2: responses.get(2),
        q3: responses.get(3),
        q4: responses.get(4),
        q5: responses.get(5),
        q6: responses.get(6),
        q7: responses.get(7),
        q8: responses.get(8),
        q9: responses.get(9),
        past_diagnosis: responses.get(10),
        phq9_total: score::compute_total(responses),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_answers_default_to_zero() {
        let responses: ResponseMap = [(1, 2), (9, 1)].into_iter().collect();
        let features = extract(&responses);
        assert_eq!(features.q1, 2);
        assert_eq!(features.q2, 0);
        assert_eq!(features.q9, 1);
        assert_eq!(features.past_diagnosis, 0);
        assert_eq!(features.phq9_total, 3);
    }

    #[test]
    fn total_matches_score_calculator() {
        let responses: ResponseMap =
            [(1, 3), (2, 3), (3, 3), (4, 3), (5, 3), (10, 1)].into_iter().collect();
        let features = extract(&responses);
        assert_eq!(features.phq9_total, score::compute_total(&responses));
        assert_eq!(features.phq9_total, 15);
        assert_eq!(features.past_diagnosis, 1);
    }

    #[test]
    fn serializes_to_the_trained_shape() {
        let responses: ResponseMap = [(1, 1), (10, 1)].into_iter().collect();
        let value = serde_json::to_value(extract(&responses)).unwrap();
        let object = value.as_object().unwrap();
        let mut keys: Vec<&str> = object.keys().map(String::as_str).collect();
        keys.sort_unstable();
        assert_eq!(
            keys,
            vec![
                "past_diagnosis",
                "phq9_total",
                "q1",
                "q2",
                "q3",
                "q4",
                "q5",
                "q6",
                "q7",
                "q8",
                "q9",
            ]
        );
        assert_eq!(object["q1"], 1);
        assert_eq!(object["past_diagnosis"], 1);
        assert_eq!(object["phq9_total"], 1);
    }
}
