use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::Context;
use clap::{Parser, Subcommand};
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;

mod db;
mod engine;
mod fallback;
mod features;
mod models;
mod score;

#[derive(Parser)]
#[command(name = "phq-severity-engine")]
#[command(about = "PHQ-9 depression severity assessment with model inference and rule-based fallback", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create or upgrade the database schema
    InitDb,
    /// Load the starter question bank
    Seed,
    /// Import questions from a CSV file
    ImportQuestions {
        #[arg(long)]
        csv: PathBuf,
    },
    /// Fetch a random sample of questions for one assessment
    Questions {
        #[arg(long, default_value_t = 10)]
        count: i64,
    },
    /// Assess questionnaire responses and print the prediction
    Assess {
        /// JSON object mapping question ids to answer values, e.g. '{"1":2,"2":1}'
        #[arg(long)]
        responses: String,
        /// Store the assessment for this user
        #[arg(long)]
        email: Option<String>,
        #[arg(long)]
        name: Option<String>,
        /// Self-reported functional impairment, stored alongside the result
        #[arg(long)]
        impairment: Option<String>,
    },
    /// Report whether the model artifacts are present
    Status,
    /// Show assessment history for a user
    History {
        #[arg(long)]
        email: String,
        #[arg(long, default_value_t = 20)]
        limit: i64,
    },
}

async fn connect() -> anyhow::Result<PgPool> {
    let database_url = std::env::var("DATABASE_URL")
        .context("DATABASE_URL must be set to a Postgres instance")?;

    PgPoolOptions::new()
        .max_connections(5)
        .connect(&database_url)
        .await
        .context("failed to connect to Postgres")
}

fn build_engine() -> engine::SeverityEngine {
    let model_dir = std::env::var("MODEL_DIR").unwrap_or_else(|_| "models".to_string());
    let timeout_ms = std::env::var("PREDICT_TIMEOUT_MS")
        .ok()
        .and_then(|value| value.parse().ok())
        .unwrap_or(engine::DEFAULT_TIMEOUT_MS);

    let artifacts = engine::ModelArtifacts::from_dir(Path::new(&model_dir));
    let mut backend = engine::PythonBackend::new(Duration::from_millis(timeout_ms));
    if let Ok(python) = std::env::var("PYTHON") {
        backend = backend.with_python(python);
    }
    engine::SeverityEngine::new(artifacts, Box::new(backend))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "phq_severity_engine=info".to_string()),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::InitDb => {
            let pool = connect().await?;
            db::init_db(&pool).await?;
            println!("Schema ready.");
        }
        Commands::Seed => {
            let pool = connect().await?;
            db::seed(&pool).await?;
            println!("Question bank seeded.");
        }
        Commands::ImportQuestions { csv } => {
            let pool = connect().await?;
            let inserted = db::import_questions(&pool, &csv).await?;
            println!("Inserted {inserted} questions from {}.", csv.display());
        }
        Commands::Questions { count } => {
            let pool = connect().await?;
            let questions = db::random_questions(&pool, count).await?;

            if questions.is_empty() {
                println!("No questions available. Run `seed` or `import-questions` first.");
                return Ok(());
            }

            for question in questions {
                println!(
                    "- [{}] {} ({}, {})",
                    question.id, question.text, question.category, question.response_type
                );
            }
        }
        Commands::Assess {
            responses,
            email,
            name,
            impairment,
        } => {
            let payload: serde_json::Value =
                serde_json::from_str(&responses).context("responses must be valid JSON")?;
            let responses =
                models::ResponseMap::from_value(&payload).context("invalid responses")?;

            let engine = build_engine();
            let total = score::compute_total(&responses);
            let prediction = engine.predict(&responses).await;

            println!("{}", serde_json::to_string_pretty(&prediction)?);
            println!("Total PHQ-9 score: {total}");

            if let Some(email) = email {
                let pool = connect().await?;
                let user_id =
                    db::ensure_user(&pool, &email, name.as_deref().unwrap_or(&email)).await?;
                let assessment_id = db::insert_assessment(
                    &pool,
                    user_id,
                    total,
                    &prediction,
                    impairment.as_deref(),
                )
                .await
                .context("assessment computed but could not be stored")?;
                println!("Assessment {assessment_id} saved for {email}.");
            }
        }
        Commands::Status => {
            let engine = build_engine();
            if engine.model_ready() {
                println!("Model artifacts present; inference enabled.");
            } else {
                println!("Model artifacts missing; rule-based fallback active.");
            }
        }
        Commands::History { email, limit } => {
            let pool = connect().await?;
            let assessments = db::fetch_history(&pool, &email, limit).await?;

            if assessments.is_empty() {
                println!("No assessments recorded for {email}.");
                return Ok(());
            }

            println!("Assessment history for {email}:");
            for record in assessments {
                println!(
                    "- {} score {} {} (confidence {:.2}, method {})",
                    record.created_at.format("%Y-%m-%d %H:%M"),
                    record.score,
                    record.result,
                    record.confidence,
                    record.prediction_method
                );
            }
        }
    }

    Ok(())
}
