use anyhow::Context;
use sqlx::{PgPool, Row};
use uuid::Uuid;

use crate::models::{AssessmentRecord, PredictionResult, QuestionRecord};

pub async fn init_db(pool: &PgPool) -> anyhow::Result<()> {
    sqlx::migrate!("./migrations").run(pool).await?;
    Ok(())
}

/// Inserts the starter question bank: the nine PHQ-9 items, the
/// past-diagnosis item, and a handful of supplementary screening questions.
pub async fn seed(pool: &PgPool) -> anyhow::Result<()> {
    let questions = vec![
        ("Little interest or pleasure in doing things?", "PHQ-9", "phq9"),
        ("Feeling down, depressed, or hopeless?", "PHQ-9", "phq9"),
        (
            "Trouble falling or staying asleep, or sleeping too much?",
            "PHQ-9",
            "phq9",
        ),
        ("Feeling tired or having little energy?", "PHQ-9", "phq9"),
        ("Poor appetite or overeating?", "PHQ-9", "phq9"),
        (
            "Feeling bad about yourself, or that you are a failure?",
            "PHQ-9",
            "phq9",
        ),
        (
            "Trouble concentrating on things, such as reading or watching TV?",
            "PHQ-9",
            "phq9",
        ),
        (
            "Moving or speaking slowly, or being so fidgety that people notice?",
            "PHQ-9",
            "phq9",
        ),
        (
            "Thoughts that you would be better off dead, or hurting yourself?",
            "PHQ-9",
            "yesno",
        ),
        (
            "Have you ever been diagnosed with depression in the past?",
            "Medical History",
            "yesno",
        ),
        (
            "Do you feel lonely, even when around people?",
            "Social",
            "yesno",
        ),
        (
            "Do you feel overwhelmed even by small tasks?",
            "Stress",
            "phq9",
        ),
        ("Do you feel hopeless about the future?", "Depression", "yesno"),
        (
            "Have you been isolating yourself from family and friends?",
            "Social",
            "phq9",
        ),
    ];

    for (text, category, response_type) in questions {
        sqlx::query(
            r#"
            INSERT INTO phq_screening.questions (text, category, response_type)
            VALUES ($1, $2, $3)
            ON CONFLICT (text) DO NOTHING
            "#,
        )
        .bind(text)
        .bind(category)
        .bind(response_type)
        .execute(pool)
        .await?;
    }

    Ok(())
}

/// Bulk-loads questions from a CSV with columns text, category,
/// response_type. Returns the number of rows actually inserted.
pub async fn import_questions(pool: &PgPool, csv_path: &std::path::Path) -> anyhow::Result<usize> {
    #[derive(serde::Deserialize)]
    struct CsvRow {
        text: String,
        category: String,
        response_type: String,
    }

    let mut reader = csv::Reader::from_path(csv_path)?;
    let mut inserted = 0usize;

    for result in reader.deserialize::<CsvRow>() {
        let row = result?;
        let result = sqlx::query(
            r#"
            INSERT INTO phq_screening.questions (text, category, response_type)
            VALUES ($1, $2, $3)
            ON CONFLICT (text) DO NOTHING
            "#,
        )
        .bind(&row.text)
        .bind(&row.category)
        .bind(&row.response_type)
        .execute(pool)
        .await?;

        if result.rows_affected() > 0 {
            inserted += 1;
        }
    }

    Ok(inserted)
}

pub async fn random_questions(pool: &PgPool, count: i64) -> anyhow::Result<Vec<QuestionRecord>> {
    let rows = sqlx::query(
        "SELECT id, text, category, response_type FROM phq_screening.questions \
         ORDER BY random() LIMIT $1",
    )
    .bind(count)
    .fetch_all(pool)
    .await?;

    let mut questions = Vec::new();
    for row in rows {
        questions.push(QuestionRecord {
            id: row.get("id"),
            text: row.get("text"),
            category: row.get("category"),
            response_type: row.get("response_type"),
        });
    }

    Ok(questions)
}

pub async fn ensure_user(pool: &PgPool, email: &str, full_name: &str) -> anyhow::Result<Uuid> {
    let id: Uuid = sqlx::query(
        r#"
        INSERT INTO phq_screening.users (id, email, full_name)
        VALUES ($1, $2, $3)
        ON CONFLICT (email) DO UPDATE
        SET full_name = EXCLUDED.full_name
        RETURNING id
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(email)
    .bind(full_name)
    .fetch_one(pool)
    .await?
    .get("id");

    Ok(id)
}

/// Stores one completed assessment. The prediction is already final by the
/// time this runs; a failure here is a storage failure, never a prediction
/// failure.
pub async fn insert_assessment(
    pool: &PgPool,
    user_id: Uuid,
    total_score: i32,
    prediction: &PredictionResult,
    functional_impairment: Option<&str>,
) -> anyhow::Result<Uuid> {
    let id = Uuid::new_v4();

    sqlx::query(
        r#"
        INSERT INTO phq_screening.assessments
        (id, user_id, score, result, functional_impairment, confidence, prediction_method)
        VALUES ($1, $2, $3, $4, $5, $6, $7)
        "#,
    )
    .bind(id)
    .bind(user_id)
    .bind(total_score)
    .bind(prediction.severity.label())
    .bind(functional_impairment)
    .bind(prediction.confidence)
    .bind(prediction.method.as_str())
    .execute(pool)
    .await
    .context("failed to insert assessment")?;

    Ok(id)
}

pub async fn fetch_history(
    pool: &PgPool,
    email: &str,
    limit: i64,
) -> anyhow::Result<Vec<AssessmentRecord>> {
    let rows = sqlx::query(
        "SELECT a.id, u.email, a.score, a.result, a.functional_impairment, \
         a.confidence, a.prediction_method, a.created_at \
         FROM phq_screening.assessments a \
         JOIN phq_screening.users u ON u.id = a.user_id \
         WHERE u.email = $1 \
         ORDER BY a.created_at DESC \
         LIMIT $2",
    )
    .bind(email)
    .bind(limit)
    .fetch_all(pool)
    .await?;

    let mut assessments = Vec::new();
    for row in rows {
        assessments.push(AssessmentRecord {
            id: row.get("id"),
            user_email: row.get("email"),
            score: row.get("score"),
            result: row.get("result"),
            functional_impairment: row.get("functional_impairment"),
            confidence: row.get("confidence"),
            prediction_method: row.get("prediction_method"),
            created_at: row.get("created_at"),
        });
    }

    Ok(assessments)
}
