// core/password_reset.rs
use serde::Serialize;
use std::sync::Arc;
use tracing::{error, info, warn};

use crate::core::auth_service::AuthService;
use crate::core::notification_service::NotificationService;
use crate::core::otp_service::OtpService;
use crate::domain::OtpPurpose;
use crate::infrastructure::database::Store;
use crate::infrastructure::error::{bad_request, not_found, AppError, AppResult};
use crate::utils::security::{hash_password, TokenPurpose};
use crate::utils::validation::{require_otp_input, validate_email, validate_new_password};

pub const NO_ACCOUNT_FOR_EMAIL: &str = "No account found with this email address.";
pub const RESET_NOT_VERIFIED: &str = "Please verify your password reset code first.";

/// Étape franchie, avec le token de l'étape suivante
#[derive(Debug, Clone, Serialize)]
pub struct ResetStep {
    pub reset_token: String,
    pub email: String,
}

/// Réinitialisation en trois étapes: demande, vérification du code, nouveau mot de passe.
///
/// Le changement de mot de passe exige un token `password_reset_verified` ET un
/// code OTP consommé encore présent. Le code est supprimé après usage.
pub struct PasswordResetService {
    store: Arc<dyn Store>,
    otp: Arc<OtpService>,
    notifier: Arc<NotificationService>,
    auth: Arc<AuthService>,
}

impl PasswordResetService {
    pub fn new(
        store: Arc<dyn Store>,
        otp: Arc<OtpService>,
        notifier: Arc<NotificationService>,
        auth: Arc<AuthService>,
    ) -> Self {
        Self {
            store,
            otp,
            notifier,
            auth,
        }
    }

    /// Étape 1: émet et envoie un code de réinitialisation
    pub async fn request(&self, email: &str) -> AppResult<ResetStep> {
        validate_email(email)?;
        let user = self
            .store
            .find_user_by_email(email.trim())
            .await?
            .ok_or_else(|| not_found(NO_ACCOUNT_FOR_EMAIL))?;

        let code = self.otp.issue(user.id, OtpPurpose::PasswordReset).await?;
        if let Err(e) = self.notifier.send_password_reset_code(&user, &code).await {
            error!(user_id = %user.id, "❌ Envoi du code de réinitialisation impossible: {}", e);
            return Err(AppError::InfrastructureError(format!(
                "Failed to send password reset code: {}",
                e
            )));
        }

        info!(user_id = %user.id, "🔁 Demande de réinitialisation du mot de passe");
        Ok(ResetStep {
            reset_token: self.auth.flow_token(&user, TokenPurpose::PasswordReset)?,
            email: user.email,
        })
    }

    /// Étape 2: vérifie le code et délivre le token "vérifié"
    pub async fn verify(&self, reset_token: &str, code: &str) -> AppResult<ResetStep> {
        let claims = self.auth.claims(reset_token, TokenPurpose::PasswordReset)?;
        require_otp_input(code)?;
        let user = self.auth.user_for(&claims).await?;

        self.otp.verify(user.id, OtpPurpose::PasswordReset, code).await?;

        Ok(ResetStep {
            reset_token: self
                .auth
                .flow_token(&user, TokenPurpose::PasswordResetVerified)?,
            email: user.email,
        })
    }

    /// Étape 3: remplace le mot de passe puis supprime le code
    pub async fn reset(&self, verified_token: &str, password: &str, confirmation: &str) -> AppResult<()> {
        let claims = self
            .auth
            .claims(verified_token, TokenPurpose::PasswordResetVerified)?;
        let user = self.auth.user_for(&claims).await?;

        if !self.otp.is_consumed(user.id, OtpPurpose::PasswordReset).await? {
            warn!(user_id = %user.id, "🚫 Réinitialisation sans code vérifié");
            return Err(bad_request(RESET_NOT_VERIFIED));
        }
        validate_new_password(password, confirmation)?;

        self.store
            .update_password(user.id, &hash_password(password)?)
            .await?;
        self.otp.discard(user.id, OtpPurpose::PasswordReset).await?;

        info!(user_id = %user.id, "✅ Mot de passe réinitialisé");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::auth_service::Registration;
    use crate::core::notification_service::testing::RecordingEmailProvider;
    use crate::domain::OtpRejection;
    use crate::infrastructure::database::MemoryStore;
    use crate::utils::config::Config;

    struct Harness {
        emails: Arc<RecordingEmailProvider>,
        auth: Arc<AuthService>,
        reset: PasswordResetService,
    }

    async fn harness() -> Harness {
        let config = Config::default();
        let store: Arc<dyn Store> = Arc::new(MemoryStore::new());
        let emails = Arc::new(RecordingEmailProvider::default());
        let otp = Arc::new(OtpService::new(store.clone(), &config));
        let notifier = Arc::new(NotificationService::new(emails.clone(), &config));
        let auth = Arc::new(AuthService::new(
            store.clone(),
            otp.clone(),
            notifier.clone(),
            &config,
        ));
        auth.register(Registration {
            username: "ivan".to_string(),
            email: "ivan@example.com".to_string(),
            password: "old-password".to_string(),
            password_confirm: "old-password".to_string(),
        })
        .await
        .unwrap();

        let reset = PasswordResetService::new(store, otp, notifier, auth.clone());
        Harness { emails, auth, reset }
    }

    #[tokio::test]
    async fn full_reset_flow_changes_password_once() {
        let h = harness().await;
        let step = h.reset.request("IVAN@example.com").await.unwrap();
        let code = h.emails.last_code_for("ivan@example.com").unwrap();

        let verified = h.reset.verify(&step.reset_token, &code).await.unwrap();
        h.reset
            .reset(&verified.reset_token, "new-password", "new-password")
            .await
            .unwrap();

        assert!(h.auth.login("ivan", "new-password").await.is_ok());
        assert!(h.auth.login("ivan", "old-password").await.is_err());

        // Le code a été supprimé: le même token ne peut pas resservir
        assert!(matches!(
            h.reset
                .reset(&verified.reset_token, "third-password", "third-password")
                .await,
            Err(AppError::BadRequest(_))
        ));
    }

    #[tokio::test]
    async fn reset_without_verified_code_is_rejected() {
        let h = harness().await;
        let step = h.reset.request("ivan@example.com").await.unwrap();

        // Token de l'étape 1 présenté à l'étape 3
        assert!(matches!(
            h.reset.reset(&step.reset_token, "new-password", "new-password").await,
            Err(AppError::Unauthorized(_))
        ));
        assert!(h.auth.login("ivan", "old-password").await.is_ok());
    }

    #[tokio::test]
    async fn used_code_cannot_be_verified_twice() {
        let h = harness().await;
        let step = h.reset.request("ivan@example.com").await.unwrap();
        let code = h.emails.last_code_for("ivan@example.com").unwrap();

        h.reset.verify(&step.reset_token, &code).await.unwrap();
        assert!(matches!(
            h.reset.verify(&step.reset_token, &code).await,
            Err(AppError::OtpRejected(OtpRejection::ResetAlreadyUsed))
        ));
    }

    #[tokio::test]
    async fn used_code_is_reported_before_a_malformed_entry() {
        let h = harness().await;
        let step = h.reset.request("ivan@example.com").await.unwrap();
        let code = h.emails.last_code_for("ivan@example.com").unwrap();
        h.reset.verify(&step.reset_token, &code).await.unwrap();

        assert!(matches!(
            h.reset.verify(&step.reset_token, "12ab").await,
            Err(AppError::OtpRejected(OtpRejection::ResetAlreadyUsed))
        ));
    }

    #[tokio::test]
    async fn malformed_entry_on_a_live_code_is_a_mismatch() {
        let h = harness().await;
        let step = h.reset.request("ivan@example.com").await.unwrap();

        assert!(matches!(
            h.reset.verify(&step.reset_token, "12ab").await,
            Err(AppError::OtpRejected(OtpRejection::ResetMismatch))
        ));
    }

    #[tokio::test]
    async fn unknown_email_is_not_found() {
        let h = harness().await;
        match h.reset.request("nobody@example.com").await {
            Err(AppError::NotFound(msg)) => assert_eq!(msg, NO_ACCOUNT_FOR_EMAIL),
            other => panic!("unexpected: {:?}", other),
        }
    }
}
