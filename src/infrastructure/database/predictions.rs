use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::FromRow;
use uuid::Uuid;

use super::{PgStore, PredictionRepository};
use crate::domain::{NewPrediction, Prediction, PredictionOutcome};
use crate::infrastructure::error::{not_found, AppResult};

const PREDICTION_COLUMNS: &str = "id, user_id, image_path, label, model_preference, model_used, \
                                  confidence_score, created_at";

#[derive(FromRow)]
struct PredictionRow {
    id: i64,
    user_id: Uuid,
    image_path: String,
    label: String,
    model_preference: String,
    model_used: Option<String>,
    confidence_score: Option<f64>,
    created_at: DateTime<Utc>,
}

impl From<PredictionRow> for Prediction {
    fn from(row: PredictionRow) -> Self {
        Prediction {
            id: row.id,
            user_id: row.user_id,
            image_path: row.image_path,
            label: row.label,
            // Une valeur inconnue en base retombe sur `auto`
            model_preference: row.model_preference.parse().unwrap_or_default(),
            model_used: row.model_used,
            confidence_score: row.confidence_score,
            created_at: row.created_at,
        }
    }
}

#[async_trait]
impl PredictionRepository for PgStore {
    async fn create_prediction(&self, new_prediction: NewPrediction) -> AppResult<Prediction> {
        let row = sqlx::query_as::<_, PredictionRow>(&format!(
            r#"
            INSERT INTO predictions (user_id, image_path, model_preference)
            VALUES ($1, $2, $3)
            RETURNING {PREDICTION_COLUMNS}
            "#
        ))
        .bind(new_prediction.user_id)
        .bind(&new_prediction.image_path)
        .bind(new_prediction.model_preference.as_str())
        .fetch_one(&self.pool)
        .await?;

        Ok(row.into())
    }

    async fn attach_outcome(&self, id: i64, outcome: PredictionOutcome) -> AppResult<Prediction> {
        let row = sqlx::query_as::<_, PredictionRow>(&format!(
            r#"
            UPDATE predictions
            SET label = $2, model_used = $3, confidence_score = $4
            WHERE id = $1
            RETURNING {PREDICTION_COLUMNS}
            "#
        ))
        .bind(id)
        .bind(&outcome.label)
        .bind(&outcome.model_used)
        .bind(outcome.confidence_score)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| not_found("Prediction not found"))?;

        Ok(row.into())
    }

    async fn find_prediction(&self, user_id: Uuid, id: i64) -> AppResult<Option<Prediction>> {
        let row = sqlx::query_as::<_, PredictionRow>(&format!(
            "SELECT {PREDICTION_COLUMNS} FROM predictions WHERE id = $1 AND user_id = $2"
        ))
        .bind(id)
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(Prediction::from))
    }

    async fn list_predictions(&self, user_id: Uuid, limit: Option<i64>) -> AppResult<Vec<Prediction>> {
        let rows = sqlx::query_as::<_, PredictionRow>(&format!(
            r#"
            SELECT {PREDICTION_COLUMNS}
            FROM predictions
            WHERE user_id = $1
            ORDER BY created_at DESC, id DESC
            LIMIT $2
            "#
        ))
        .bind(user_id)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(Prediction::from).collect())
    }

    async fn find_predictions_by_ids(&self, user_id: Uuid, ids: &[i64]) -> AppResult<Vec<Prediction>> {
        let rows = sqlx::query_as::<_, PredictionRow>(&format!(
            r#"
            SELECT {PREDICTION_COLUMNS}
            FROM predictions
            WHERE user_id = $1 AND id = ANY($2)
            ORDER BY created_at DESC, id DESC
            "#
        ))
        .bind(user_id)
        .bind(ids)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(Prediction::from).collect())
    }

    async fn count_predictions(&self, user_id: Uuid) -> AppResult<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM predictions WHERE user_id = $1")
            .bind(user_id)
            .fetch_one(&self.pool)
            .await?;

        Ok(count)
    }
}

