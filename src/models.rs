use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize, Serializer};
use thiserror::Error;
use uuid::Uuid;

/// Highest value a single answer may take. PHQ-9 items are scored 0-3 and
/// yes/no items use 0 or 1.
pub const MAX_RESPONSE_VALUE: i64 = 3;

#[derive(Debug, Error, PartialEq)]
pub enum ResponseError {
    #[error("responses must be a JSON object keyed by question id")]
    NotAnObject,
    #[error("question id {0:?} is not a positive integer")]
    InvalidKey(String),
    #[error("answer for question {question} is not an integer")]
    NonIntegerValue { question: u32 },
    #[error("answer {value} for question {question} is outside 0..={MAX_RESPONSE_VALUE}")]
    ValueOutOfRange { question: u32, value: i64 },
}

/// Validated questionnaire answers, keyed by question id. Unanswered
/// questions are absent rather than zero.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ResponseMap(BTreeMap<u32, i32>);

impl ResponseMap {
    /// Validates an untrusted JSON payload into a response map. Keys must
    /// parse as positive integers and values as integers in
    /// `0..=MAX_RESPONSE_VALUE`.
    pub fn from_value(value: &serde_json::Value) -> Result<Self, ResponseError> {
        let object = value.as_object().ok_or(ResponseError::NotAnObject)?;
        let mut responses = BTreeMap::new();

        for (key, raw) in object {
            let question: u32 = key
                .parse()
                .map_err(|_| ResponseError::InvalidKey(key.clone()))?;
            if question == 0 {
                return Err(ResponseError::InvalidKey(key.clone()));
            }

            let value = raw
                .as_i64()
                .ok_or(ResponseError::NonIntegerValue { question })?;
            if !(0..=MAX_RESPONSE_VALUE).contains(&value) {
                return Err(ResponseError::ValueOutOfRange { question, value });
            }

            responses.insert(question, value as i32);
        }

        Ok(Self(responses))
    }

    /// Returns the answer for a question, or 0 when it was not answered.
    pub fn get(&self, question: u32) -> i32 {
        self.0.get(&question).copied().unwrap_or(0)
    }
}

impl FromIterator<(u32, i32)> for ResponseMap {
    fn from_iter<T: IntoIterator<Item = (u32, i32)>>(iter: T) -> Self {
        Self(iter.into_iter().collect())
    }
}

/// The five PHQ-9 severity tiers, ordered by ascending total score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum SeverityBand {
    Minimal,
    Mild,
    Moderate,
    ModeratelySevere,
    Severe,
}

impl SeverityBand {
    pub fn label(&self) -> &'static str {
        match self {
            SeverityBand::Minimal => "Minimal depression",
            SeverityBand::Mild => "Mild depression",
            SeverityBand::Moderate => "Moderate depression",
            SeverityBand::ModeratelySevere => "Moderately severe depression",
            SeverityBand::Severe => "Severe depression",
        }
    }

    /// Parses a severity label as emitted by the trained label encoder.
    /// Accepts both the bare tier name and the full label.
    pub fn from_label(label: &str) -> Option<Self> {
        match label.trim().to_lowercase().as_str() {
            "minimal" | "minimal depression" => Some(SeverityBand::Minimal),
            "mild" | "mild depression" => Some(SeverityBand::Mild),
            "moderate" | "moderate depression" => Some(SeverityBand::Moderate),
            "moderately severe" | "moderately severe depression" => {
                Some(SeverityBand::ModeratelySevere)
            }
            "severe" | "severe depression" => Some(SeverityBand::Severe),
            _ => None,
        }
    }
}

impl fmt::Display for SeverityBand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl Serialize for SeverityBand {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.label())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PredictionMethod {
    // The exported model tags its own output "ml".
    #[serde(alias = "ml")]
    Model,
    Fallback,
}

impl PredictionMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            PredictionMethod::Model => "model",
            PredictionMethod::Fallback => "fallback",
        }
    }
}

/// The complete outcome of one assessment. Every field is always populated,
/// whichever path produced it.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PredictionResult {
    pub severity: SeverityBand,
    pub confidence: f64,
    pub method: PredictionMethod,
}

/// The exact input shape the model was trained on. Field names double as
/// the JSON keys handed to the inference process.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FeatureVector {
    pub q1: i32,
    pub q2: i32,
    pub q3: i32,
    pub q4: i32,
    pub q5: i32,
    pub q6: i32,
    pub q7: i32,
    pub q8: i32,
    pub q9: i32,
    pub past_diagnosis: i32,
    pub phq9_total: i32,
}

#[derive(Debug, Clone)]
pub struct QuestionRecord {
    pub id: i32,
    pub text: String,
    pub category: String,
    pub response_type: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct AssessmentRecord {
    pub id: Uuid,
    pub user_email: String,
    pub score: i32,
    pub result: String,
    pub functional_impairment: Option<String>,
    pub confidence: f64,
    pub prediction_method: String,
    pub created_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn accepts_valid_response_object() {
        let value = json!({"1": 3, "2": 0, "10": 1});
        let responses = ResponseMap::from_value(&value).unwrap();
        assert_eq!(responses.get(1), 3);
        assert_eq!(responses.get(2), 0);
        assert_eq!(responses.get(10), 1);
        assert_eq!(responses.get(5), 0);
    }

    #[test]
    fn rejects_non_object_payloads() {
        assert_eq!(
            ResponseMap::from_value(&json!([1, 2, 3])),
            Err(ResponseError::NotAnObject)
        );
    }

    #[test]
    fn rejects_non_numeric_and_zero_keys() {
        assert_eq!(
            ResponseMap::from_value(&json!({"mood": 2})),
            Err(ResponseError::InvalidKey("mood".to_string()))
        );
        assert_eq!(
            ResponseMap::from_value(&json!({"0": 2})),
            Err(ResponseError::InvalidKey("0".to_string()))
        );
    }

    #[test]
    fn rejects_non_integer_values() {
        assert_eq!(
            ResponseMap::from_value(&json!({"3": "often"})),
            Err(ResponseError::NonIntegerValue { question: 3 })
        );
        assert_eq!(
            ResponseMap::from_value(&json!({"3": 1.5})),
            Err(ResponseError::NonIntegerValue { question: 3 })
        );
    }

    #[test]
    fn rejects_values_outside_scale() {
        assert_eq!(
            ResponseMap::from_value(&json!({"4": 7})),
            Err(ResponseError::ValueOutOfRange {
                question: 4,
                value: 7
            })
        );
        assert_eq!(
            ResponseMap::from_value(&json!({"4": -1})),
            Err(ResponseError::ValueOutOfRange {
                question: 4,
                value: -1
            })
        );
    }

    #[test]
    fn severity_labels_round_trip() {
        for band in [
            SeverityBand::Minimal,
            SeverityBand::Mild,
            SeverityBand::Moderate,
            SeverityBand::ModeratelySevere,
            SeverityBand::Severe,
        ] {
            assert_eq!(SeverityBand::from_label(band.label()), Some(band));
        }
    }

    #[test]
    fn severity_accepts_bare_tier_names() {
        assert_eq!(SeverityBand::from_label("Mild"), Some(SeverityBand::Mild));
        assert_eq!(
            SeverityBand::from_label("moderately severe"),
            Some(SeverityBand::ModeratelySevere)
        );
        assert_eq!(SeverityBand::from_label("unknown"), None);
    }

    #[test]
    fn severity_orders_by_score() {
        assert!(SeverityBand::Minimal < SeverityBand::Mild);
        assert!(SeverityBand::ModeratelySevere < SeverityBand::Severe);
    }

    #[test]
    fn prediction_method_parses_model_alias() {
        let method: PredictionMethod = serde_json::from_str("\"ml\"").unwrap();
        assert_eq!(method, PredictionMethod::Model);
        let method: PredictionMethod = serde_json::from_str("\"fallback\"").unwrap();
        assert_eq!(method, PredictionMethod::Fallback);
    }
}
