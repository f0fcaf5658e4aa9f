use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::FromRow;
use uuid::Uuid;

use super::{OtpRepository, PgStore};
use crate::domain::{OtpCode, OtpPurpose};
use crate::infrastructure::error::{AppError, AppResult};

#[derive(FromRow)]
struct OtpRow {
    user_id: Uuid,
    purpose: String,
    code_hash: String,
    created_at: DateTime<Utc>,
    consumed: bool,
}

impl TryFrom<OtpRow> for OtpCode {
    type Error = AppError;

    fn try_from(row: OtpRow) -> Result<Self, Self::Error> {
        let purpose = OtpPurpose::parse(&row.purpose).ok_or_else(|| {
            AppError::InternalError(format!("Unknown OTP purpose in database: {}", row.purpose))
        })?;

        Ok(OtpCode {
            user_id: row.user_id,
            purpose,
            code_hash: row.code_hash,
            created_at: row.created_at,
            consumed: row.consumed,
        })
    }
}

#[async_trait]
impl OtpRepository for PgStore {
    async fn upsert_otp(
        &self,
        user_id: Uuid,
        purpose: OtpPurpose,
        code_hash: &str,
        created_at: DateTime<Utc>,
    ) -> AppResult<OtpCode> {
        let row = sqlx::query_as::<_, OtpRow>(
            r#"
            INSERT INTO otp_codes (user_id, purpose, code_hash, created_at, consumed)
            VALUES ($1, $2, $3, $4, false)
            ON CONFLICT (user_id, purpose)
            DO UPDATE SET code_hash = EXCLUDED.code_hash,
                          created_at = EXCLUDED.created_at,
                          consumed = false
            RETURNING user_id, purpose, code_hash, created_at, consumed
            "#,
        )
        .bind(user_id)
        .bind(purpose.as_str())
        .bind(code_hash)
        .bind(created_at)
        .fetch_one(&self.pool)
        .await?;

        row.try_into()
    }

    async fn find_otp(&self, user_id: Uuid, purpose: OtpPurpose) -> AppResult<Option<OtpCode>> {
        let row = sqlx::query_as::<_, OtpRow>(
            r#"
            SELECT user_id, purpose, code_hash, created_at, consumed
            FROM otp_codes
            WHERE user_id = $1 AND purpose = $2
            "#,
        )
        .bind(user_id)
        .bind(purpose.as_str())
        .fetch_optional(&self.pool)
        .await?;

        row.map(OtpCode::try_from).transpose()
    }

    async fn consume_otp(&self, user_id: Uuid, purpose: OtpPurpose, code_hash: &str) -> AppResult<bool> {
        let result = sqlx::query(
            r#"
            UPDATE otp_codes
            SET consumed = true
            WHERE user_id = $1 AND purpose = $2 AND code_hash = $3 AND consumed = false
            "#,
        )
        .bind(user_id)
        .bind(purpose.as_str())
        .bind(code_hash)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() == 1)
    }

    async fn delete_otp(&self, user_id: Uuid, purpose: OtpPurpose) -> AppResult<()> {
        sqlx::query("DELETE FROM otp_codes WHERE user_id = $1 AND purpose = $2")
            .bind(user_id)
            .bind(purpose.as_str())
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn delete_otps_created_before(
        &self,
        purpose: OtpPurpose,
        cutoff: DateTime<Utc>,
    ) -> AppResult<u64> {
        let result = sqlx::query("DELETE FROM otp_codes WHERE purpose = $1 AND created_at < $2")
            .bind(purpose.as_str())
            .bind(cutoff)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected())
    }
}
