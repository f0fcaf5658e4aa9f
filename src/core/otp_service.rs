// core/otp_service.rs
use chrono::{DateTime, Duration, Utc};
use std::sync::Arc;
use tracing::{debug, info};
use uuid::Uuid;

use crate::domain::{OtpCode, OtpPurpose, OtpRejection};
use crate::infrastructure::database::Store;
use crate::infrastructure::error::AppResult;
use crate::utils::config::Config;
use crate::utils::security::{constant_time_eq, generate_otp, otp_digest};

/// Émission et vérification des codes OTP (email et réinitialisation).
///
/// Un seul code actif par (utilisateur, usage): une nouvelle émission écrase
/// l'ancienne. Seule l'empreinte SHA-256 du code est stockée.
pub struct OtpService {
    store: Arc<dyn Store>,
    email_validity: Duration,
    reset_validity: Duration,
}

impl OtpService {
    pub fn new(store: Arc<dyn Store>, config: &Config) -> Self {
        Self {
            store,
            email_validity: Duration::minutes(config.email_otp_expiry_minutes),
            reset_validity: Duration::minutes(config.reset_otp_expiry_minutes),
        }
    }

    pub fn validity(&self, purpose: OtpPurpose) -> Duration {
        match purpose {
            OtpPurpose::EmailVerification => self.email_validity,
            OtpPurpose::PasswordReset => self.reset_validity,
        }
    }

    /// Génère un nouveau code et remplace le précédent. Retourne le code en clair,
    /// à transmettre par email uniquement.
    pub async fn issue(&self, user_id: Uuid, purpose: OtpPurpose) -> AppResult<String> {
        let code = generate_otp();
        self.store
            .upsert_otp(user_id, purpose, &otp_digest(&code), Utc::now())
            .await?;

        info!(user_id = %user_id, purpose = purpose.as_str(), "🔐 Nouveau code OTP émis");
        Ok(code)
    }

    /// Vérifie puis consomme le code. Un code consommé ne peut plus jamais être
    /// accepté, quel que soit le code saisi.
    pub async fn verify(&self, user_id: Uuid, purpose: OtpPurpose, entered: &str) -> AppResult<()> {
        let validity = self.validity(purpose);
        let record = self.store.find_otp(user_id, purpose).await?;
        check_code(record.as_ref(), purpose, entered, Utc::now(), validity)?;

        let digest = otp_digest(entered);
        if !self.store.consume_otp(user_id, purpose, &digest).await? {
            // Un autre appel a consommé le code (ou l'a remplacé) entre-temps
            debug!(user_id = %user_id, "Consommation OTP concurrente perdue");
            let record = self.store.find_otp(user_id, purpose).await?;
            check_code(record.as_ref(), purpose, entered, Utc::now(), validity)?;
            return Err(OtpRejection::consumed(purpose).into());
        }

        if purpose == OtpPurpose::EmailVerification {
            self.store.mark_email_verified(user_id).await?;
        }

        info!(user_id = %user_id, purpose = purpose.as_str(), "✅ Code OTP vérifié");
        Ok(())
    }

    /// `true` si le code actif a déjà été utilisé
    pub async fn is_consumed(&self, user_id: Uuid, purpose: OtpPurpose) -> AppResult<bool> {
        Ok(self
            .store
            .find_otp(user_id, purpose)
            .await?
            .map(|otp| otp.consumed)
            .unwrap_or(false))
    }

    pub async fn discard(&self, user_id: Uuid, purpose: OtpPurpose) -> AppResult<()> {
        self.store.delete_otp(user_id, purpose).await
    }
}

/// Contrôles dans l'ordre: existence, déjà utilisé, expiration, égalité du code
pub fn check_code(
    record: Option<&OtpCode>,
    purpose: OtpPurpose,
    entered: &str,
    now: DateTime<Utc>,
    validity: Duration,
) -> Result<(), OtpRejection> {
    let otp = record.ok_or(OtpRejection::missing(purpose))?;

    if otp.consumed {
        return Err(OtpRejection::consumed(purpose));
    }
    if otp.is_expired(now, validity) {
        return Err(OtpRejection::expired(purpose));
    }
    if !constant_time_eq(&otp.code_hash, &otp_digest(entered)) {
        return Err(OtpRejection::mismatch(purpose));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::NewUser;
    use crate::infrastructure::database::{MemoryStore, UserRepository};
    use crate::infrastructure::error::AppError;

    fn record(code: &str, minutes_ago: i64, consumed: bool) -> OtpCode {
        OtpCode {
            user_id: Uuid::new_v4(),
            purpose: OtpPurpose::EmailVerification,
            code_hash: otp_digest(code),
            created_at: Utc::now() - Duration::minutes(minutes_ago),
            consumed,
        }
    }

    const PURPOSE: OtpPurpose = OtpPurpose::EmailVerification;

    #[test]
    fn check_order_is_existence_consumed_expiry_code() {
        let validity = Duration::minutes(10);
        let now = Utc::now();

        assert_eq!(
            check_code(None, PURPOSE, "123456", now, validity),
            Err(OtpRejection::EmailMissing)
        );
        // Consommé ET expiré ET faux: "déjà vérifié" l'emporte
        assert_eq!(
            check_code(Some(&record("111111", 60, true)), PURPOSE, "999999", now, validity),
            Err(OtpRejection::EmailAlreadyVerified)
        );
        assert_eq!(
            check_code(Some(&record("111111", 60, false)), PURPOSE, "999999", now, validity),
            Err(OtpRejection::EmailExpired)
        );
        assert_eq!(
            check_code(Some(&record("111111", 1, false)), PURPOSE, "999999", now, validity),
            Err(OtpRejection::EmailMismatch)
        );
        assert_eq!(
            check_code(Some(&record("111111", 1, false)), PURPOSE, " 111111 ", now, validity),
            Ok(())
        );
    }

    #[test]
    fn reset_rejections_use_reset_messages() {
        let mut otp = record("222222", 0, true);
        otp.purpose = OtpPurpose::PasswordReset;
        let rejection = check_code(
            Some(&otp),
            OtpPurpose::PasswordReset,
            "222222",
            Utc::now(),
            Duration::minutes(15),
        )
        .unwrap_err();
        assert_eq!(
            rejection.message(),
            "This password reset code has already been used."
        );
    }

    async fn setup() -> (Arc<MemoryStore>, OtpService, Uuid) {
        let store = Arc::new(MemoryStore::new());
        let user = store
            .create_user(NewUser {
                username: "bob".to_string(),
                email: "bob@example.com".to_string(),
                password_hash: "x".to_string(),
            })
            .await
            .unwrap();
        let service = OtpService::new(store.clone(), &Config::default());
        (store, service, user.id)
    }

    #[tokio::test]
    async fn verified_code_can_never_be_reused() {
        let (store, service, user_id) = setup().await;
        let code = service.issue(user_id, PURPOSE).await.unwrap();

        service.verify(user_id, PURPOSE, &code).await.unwrap();
        let profile = store.get_or_create_profile(user_id).await.unwrap();
        assert!(profile.email_verified);

        for attempt in [code.as_str(), "000000"] {
            match service.verify(user_id, PURPOSE, attempt).await {
                Err(AppError::OtpRejected(r)) => assert_eq!(r.message(), "Email already verified"),
                other => panic!("unexpected: {:?}", other),
            }
        }
    }

    #[tokio::test]
    async fn reissue_replaces_previous_code() {
        let (_store, service, user_id) = setup().await;
        let first = service.issue(user_id, OtpPurpose::PasswordReset).await.unwrap();
        let second = service.issue(user_id, OtpPurpose::PasswordReset).await.unwrap();

        if first != second {
            assert!(matches!(
                service.verify(user_id, OtpPurpose::PasswordReset, &first).await,
                Err(AppError::OtpRejected(OtpRejection::ResetMismatch))
            ));
        }
        service
            .verify(user_id, OtpPurpose::PasswordReset, &second)
            .await
            .unwrap();
        assert!(service.is_consumed(user_id, OtpPurpose::PasswordReset).await.unwrap());
    }

    #[tokio::test]
    async fn expired_code_is_rejected() {
        let (store, service, user_id) = setup().await;
        let code = service.issue(user_id, PURPOSE).await.unwrap();
        store
            .backdate_otp(user_id, PURPOSE, Utc::now() - Duration::minutes(11))
            .unwrap();

        assert!(matches!(
            service.verify(user_id, PURPOSE, &code).await,
            Err(AppError::OtpRejected(OtpRejection::EmailExpired))
        ));
    }

    #[tokio::test]
    async fn concurrent_verifications_let_exactly_one_through() {
        let (_store, service, user_id) = setup().await;
        let service = Arc::new(service);
        let code = service.issue(user_id, PURPOSE).await.unwrap();

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let service = Arc::clone(&service);
                let code = code.clone();
                tokio::spawn(async move { service.verify(user_id, PURPOSE, &code).await.is_ok() })
            })
            .collect();

        let mut successes = 0;
        for handle in handles {
            if handle.await.unwrap() {
                successes += 1;
            }
        }
        assert_eq!(successes, 1);
    }
}
