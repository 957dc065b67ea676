use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use thiserror::Error;
use tokio::process::Command;
use tracing::{info, warn};

use crate::fallback;
use crate::features;
use crate::models::{FeatureVector, PredictionMethod, PredictionResult, ResponseMap, SeverityBand};

pub const DEFAULT_TIMEOUT_MS: u64 = 10_000;

const MODEL_FILE: &str = "depression_severity_xgboost_model.pkl";
const SCALER_FILE: &str = "depression_severity_scaler.pkl";
const ENCODER_FILE: &str = "depression_severity_label_encoder.pkl";
const RUNNER_FILE: &str = "predict.py";

/// Locations of the trained model and its paired preprocessing artifacts,
/// plus the runner script that loads them.
#[derive(Debug, Clone)]
pub struct ModelArtifacts {
    pub model: PathBuf,
    pub scaler: PathBuf,
    pub encoder: PathBuf,
    pub runner: PathBuf,
}

impl ModelArtifacts {
    pub fn from_dir(dir: &Path) -> Self {
        Self {
            model: dir.join(MODEL_FILE),
            scaler: dir.join(SCALER_FILE),
            encoder: dir.join(ENCODER_FILE),
            runner: dir.join(RUNNER_FILE),
        }
    }

    /// The model is usable only when the artifact, scaler, and label
    /// encoder are all on disk.
    fn all_present(&self) -> bool {
        [&self.model, &self.scaler, &self.encoder]
            .into_iter()
            .all(|path| path.is_file())
    }
}

/// Failure modes of one model invocation. Every variant resolves to the
/// rule-based fallback; none of them reach the caller.
#[derive(Debug, Error)]
pub enum InferenceError {
    #[error("failed to spawn inference process: {0}")]
    Spawn(#[from] std::io::Error),
    #[error("inference timed out after {timeout_ms}ms")]
    Timeout { timeout_ms: u64 },
    #[error("inference process exited with code {code:?}: {stderr}")]
    NonZeroExit { code: Option<i32>, stderr: String },
    #[error("failed to encode feature vector: {0}")]
    Encode(#[source] serde_json::Error),
    #[error("inference output is not a valid prediction: {0}")]
    MalformedOutput(String),
}

/// Model output before validation. Only `severity` is required; the
/// orchestrator supplies defaults for the rest.
#[derive(Debug, Deserialize)]
struct RawPrediction {
    severity: String,
    confidence: Option<f64>,
    method: Option<PredictionMethod>,
}

/// Port to the out-of-process model. Implemented by [`PythonBackend`] in
/// production and by canned fakes in tests, so the orchestrator's decision
/// path can be exercised without spawning anything.
#[async_trait]
pub trait InferenceBackend: Send + Sync {
    /// Runs one inference and returns the raw stdout of the process.
    async fn infer(
        &self,
        artifacts: &ModelArtifacts,
        features_json: &str,
    ) -> Result<String, InferenceError>;
}

/// Invokes the exported predictor script with the three artifact paths and
/// the serialized features as positional arguments.
#[derive(Debug, Clone)]
pub struct PythonBackend {
    python: String,
    timeout: Duration,
}

impl PythonBackend {
    pub fn new(timeout: Duration) -> Self {
        Self {
            python: "python".to_string(),
            timeout,
        }
    }

    pub fn with_python(mut self, python: impl Into<String>) -> Self {
        self.python = python.into();
        self
    }
}

#[async_trait]
impl InferenceBackend for PythonBackend {
    async fn infer(
        &self,
        artifacts: &ModelArtifacts,
        features_json: &str,
    ) -> Result<String, InferenceError> {
        let mut cmd = Command::new(&self.python);
        cmd.kill_on_drop(true)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .arg(&artifacts.runner)
            .arg(&artifacts.model)
            .arg(&artifacts.scaler)
            .arg(&artifacts.encoder)
            .arg(features_json);

        // output() drains stdout and stderr concurrently, so a chatty child
        // cannot deadlock on a full pipe. kill_on_drop reaps the child when
        // the timeout fires or the caller is cancelled.
        let output = match tokio::time::timeout(self.timeout, cmd.output()).await {
            Ok(result) => result?,
            Err(_) => {
                return Err(InferenceError::Timeout {
                    timeout_ms: self.timeout.as_millis() as u64,
                })
            }
        };

        if !output.status.success() {
            return Err(InferenceError::NonZeroExit {
                code: output.status.code(),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }

        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}

/// Severity assessment service. Holds immutable artifact configuration and
/// a readiness flag computed once at construction; safe to share across
/// concurrent requests.
pub struct SeverityEngine {
    artifacts: ModelArtifacts,
    backend: Box<dyn InferenceBackend>,
    model_ready: bool,
}

impl SeverityEngine {
    pub fn new(artifacts: ModelArtifacts, backend: Box<dyn InferenceBackend>) -> Self {
        let model_ready = artifacts.all_present();
        if model_ready {
            info!(model = %artifacts.model.display(), "model artifacts found, inference enabled");
        } else {
            warn!(
                model = %artifacts.model.display(),
                "model artifacts missing, assessments will use the rule-based fallback"
            );
        }
        Self {
            artifacts,
            backend,
            model_ready,
        }
    }

    pub fn model_ready(&self) -> bool {
        self.model_ready
    }

    /// Assesses one set of responses. Tries the model when it is ready and
    /// falls back to the rule-based classifier on any failure, so the
    /// caller always receives a complete result.
    pub async fn predict(&self, responses: &ResponseMap) -> PredictionResult {
        if !self.model_ready {
            return fallback::assess(responses);
        }

        let features = features::extract(responses);
        match self.infer_once(&features).await {
            Ok(result) => result,
            Err(err) => {
                warn!(error = %err, "model inference failed, using rule-based fallback");
                fallback::assess(responses)
            }
        }
    }

    async fn infer_once(&self, features: &FeatureVector) -> Result<PredictionResult, InferenceError> {
        let features_json = serde_json::to_string(features).map_err(InferenceError::Encode)?;
        let stdout = self.backend.infer(&self.artifacts, &features_json).await?;
        parse_prediction(&stdout)
    }
}

/// Validates raw model stdout into a complete result. `method` defaults to
/// model and `confidence` to 0 when the output omits them; anything that
/// does not parse, names an unknown severity, or reports a confidence
/// outside [0, 1] is rejected.
fn parse_prediction(stdout: &str) -> Result<PredictionResult, InferenceError> {
    let raw: RawPrediction = serde_json::from_str(stdout.trim())
        .map_err(|err| InferenceError::MalformedOutput(err.to_string()))?;

    let severity = SeverityBand::from_label(&raw.severity).ok_or_else(|| {
        InferenceError::MalformedOutput(format!("unknown severity label {:?}", raw.severity))
    })?;

    let confidence = raw.confidence.unwrap_or(0.0);
    if !(0.0..=1.0).contains(&confidence) {
        return Err(InferenceError::MalformedOutput(format!(
            "confidence {confidence} outside [0, 1]"
        )));
    }

    Ok(PredictionResult {
        severity,
        confidence,
        method: raw.method.unwrap_or(PredictionMethod::Model),
    })
}
