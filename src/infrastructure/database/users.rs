use async_trait::async_trait;
use chrono::Utc;
use uuid::Uuid;

use super::{PgStore, UserRepository};
use crate::domain::{AccountUpdate, NewUser, ProfileUpdate, User, UserProfile};
use crate::infrastructure::error::{conflict, not_found, AppError, AppResult};

const USER_COLUMNS: &str = "id, username, email, first_name, last_name, password_hash, \
                            is_staff, is_active, date_joined";

const PROFILE_COLUMNS: &str = "user_id, bio, phone, date_of_birth, profile_picture, \
                               email_verified, email_notifications, first_analysis_email_sent, \
                               created_at, updated_at";

/// Traduit une violation d'unicité en message lisible selon la contrainte
fn map_unique_violation(error: sqlx::Error) -> AppError {
    if let sqlx::Error::Database(db_error) = &error {
        if db_error.code().as_deref() == Some("23505") {
            let constraint = db_error.constraint().unwrap_or_default();
            if constraint.contains("email") {
                return conflict("Email already exists.");
            }
            if constraint.contains("username") {
                return conflict("Username already exists.");
            }
        }
    }
    AppError::from(error)
}

#[async_trait]
impl UserRepository for PgStore {
    async fn create_user(&self, new_user: NewUser) -> AppResult<User> {
        let mut tx = self.pool.begin().await?;

        let user = sqlx::query_as::<_, User>(&format!(
            r#"
            INSERT INTO users (id, username, email, password_hash, date_joined)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING {USER_COLUMNS}
            "#
        ))
        .bind(Uuid::new_v4())
        .bind(&new_user.username)
        .bind(&new_user.email)
        .bind(&new_user.password_hash)
        .bind(Utc::now())
        .fetch_one(&mut *tx)
        .await
        .map_err(map_unique_violation)?;

        sqlx::query("INSERT INTO user_profiles (user_id) VALUES ($1)")
            .bind(user.id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(user)
    }

    async fn find_user_by_id(&self, id: Uuid) -> AppResult<Option<User>> {
        let user = sqlx::query_as::<_, User>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(user)
    }

    async fn find_user_by_username(&self, username: &str) -> AppResult<Option<User>> {
        let user = sqlx::query_as::<_, User>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE username = $1"
        ))
        .bind(username)
        .fetch_optional(&self.pool)
        .await?;

        Ok(user)
    }

    async fn find_user_by_email(&self, email: &str) -> AppResult<Option<User>> {
        let user = sqlx::query_as::<_, User>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE LOWER(email) = LOWER($1)"
        ))
        .bind(email)
        .fetch_optional(&self.pool)
        .await?;

        Ok(user)
    }

    async fn update_account(&self, id: Uuid, update: AccountUpdate) -> AppResult<User> {
        sqlx::query_as::<_, User>(&format!(
            r#"
            UPDATE users
            SET username = $2, email = $3, first_name = $4, last_name = $5
            WHERE id = $1
            RETURNING {USER_COLUMNS}
            "#
        ))
        .bind(id)
        .bind(&update.username)
        .bind(&update.email)
        .bind(&update.first_name)
        .bind(&update.last_name)
        .fetch_optional(&self.pool)
        .await
        .map_err(map_unique_violation)?
        .ok_or_else(|| not_found("User not found"))
    }

    async fn update_password(&self, id: Uuid, password_hash: &str) -> AppResult<()> {
        let result = sqlx::query("UPDATE users SET password_hash = $2 WHERE id = $1")
            .bind(id)
            .bind(password_hash)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(not_found("User not found"));
        }
        Ok(())
    }

    async fn get_or_create_profile(&self, user_id: Uuid) -> AppResult<UserProfile> {
        sqlx::query(
            "INSERT INTO user_profiles (user_id) VALUES ($1) ON CONFLICT (user_id) DO NOTHING",
        )
        .bind(user_id)
        .execute(&self.pool)
        .await?;

        let profile = sqlx::query_as::<_, UserProfile>(&format!(
            "SELECT {PROFILE_COLUMNS} FROM user_profiles WHERE user_id = $1"
        ))
        .bind(user_id)
        .fetch_one(&self.pool)
        .await?;

        Ok(profile)
    }

    async fn update_profile(&self, user_id: Uuid, update: ProfileUpdate) -> AppResult<UserProfile> {
        sqlx::query_as::<_, UserProfile>(&format!(
            r#"
            UPDATE user_profiles
            SET bio = $2, phone = $3, date_of_birth = $4, email_notifications = $5,
                updated_at = NOW()
            WHERE user_id = $1
            RETURNING {PROFILE_COLUMNS}
            "#
        ))
        .bind(user_id)
        .bind(&update.bio)
        .bind(&update.phone)
        .bind(update.date_of_birth)
        .bind(update.email_notifications)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| not_found("Profile not found"))
    }

    async fn mark_email_verified(&self, user_id: Uuid) -> AppResult<()> {
        sqlx::query(
            "UPDATE user_profiles SET email_verified = true, updated_at = NOW() WHERE user_id = $1",
        )
        .bind(user_id)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn claim_first_analysis_email(&self, user_id: Uuid) -> AppResult<bool> {
        let result = sqlx::query(
            r#"
            UPDATE user_profiles
            SET first_analysis_email_sent = true, updated_at = NOW()
            WHERE user_id = $1 AND first_analysis_email_sent = false
            "#,
        )
        .bind(user_id)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() == 1)
    }
}
