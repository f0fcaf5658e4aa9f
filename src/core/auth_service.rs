// core/auth_service.rs
use chrono::Duration;
use serde::Serialize;
use std::sync::Arc;
use tracing::{info, warn};

use crate::core::notification_service::NotificationService;
use crate::core::otp_service::OtpService;
use crate::domain::{NewUser, OtpPurpose, OtpRejection, User};
use crate::infrastructure::database::Store;
use crate::infrastructure::error::{conflict, forbidden, unauthorized, AppError, AppResult};
use crate::utils::config::Config;
use crate::utils::security::{
    hash_password, issue_token, verify_password, verify_token, TokenClaims, TokenPurpose,
};
use crate::utils::validation::{
    require_otp_input, validate_email, validate_new_password, validate_username,
};

pub const INVALID_CREDENTIALS: &str = "Invalid username or password. Please try again.";
pub const INVALID_ADMIN_CREDENTIALS: &str = "Invalid admin credentials. Please try again.";
pub const NOT_AN_ADMIN: &str = "Access denied. This account does not have administrator privileges.";

/// Données du formulaire d'inscription
#[derive(Debug, Clone)]
pub struct Registration {
    pub username: String,
    pub email: String,
    pub password: String,
    pub password_confirm: String,
}

/// Résultat d'une inscription: le compte existe même si l'OTP n'a pas pu partir
#[derive(Debug, Clone, Serialize)]
pub struct RegisteredAccount {
    pub user: User,
    pub otp_sent: bool,
    /// Token court transportant l'étape "vérification d'email"
    pub verification_token: String,
}

/// Token d'accès délivré après connexion ou vérification
#[derive(Debug, Clone, Serialize)]
pub struct AuthSession {
    pub user: User,
    pub access_token: String,
    pub token_type: &'static str,
    pub expires_in: i64,
}

/// Inscription, connexion et vérification d'email
pub struct AuthService {
    store: Arc<dyn Store>,
    otp: Arc<OtpService>,
    notifier: Arc<NotificationService>,
    jwt_secret: String,
    access_ttl: Duration,
    flow_ttl: Duration,
}

impl AuthService {
    pub fn new(
        store: Arc<dyn Store>,
        otp: Arc<OtpService>,
        notifier: Arc<NotificationService>,
        config: &Config,
    ) -> Self {
        Self {
            store,
            otp,
            notifier,
            jwt_secret: config.jwt_secret.clone(),
            access_ttl: Duration::hours(config.access_token_expiry_hours),
            flow_ttl: Duration::minutes(config.flow_token_expiry_minutes),
        }
    }

    /// Inscription d'un nouvel utilisateur
    pub async fn register(&self, registration: Registration) -> AppResult<RegisteredAccount> {
        let username = registration.username.trim().to_string();
        let email = registration.email.trim().to_string();
        validate_username(&username)?;
        validate_email(&email)?;
        validate_new_password(&registration.password, &registration.password_confirm)?;

        // Vérifier si l'utilisateur existe déjà
        if self.store.find_user_by_username(&username).await?.is_some() {
            return Err(conflict("Username already exists."));
        }
        if self.store.find_user_by_email(&email).await?.is_some() {
            return Err(conflict("Email already exists."));
        }

        let user = self
            .store
            .create_user(NewUser {
                username,
                email,
                password_hash: hash_password(&registration.password)?,
            })
            .await?;
        info!(user_id = %user.id, "👤 Nouveau compte: {}", user.username);

        self.notifier.send_welcome(&user).await;

        let otp_sent = match self.send_verification_code(&user).await {
            Ok(()) => true,
            Err(e) => {
                warn!(user_id = %user.id, "⚠️ Compte créé mais OTP non envoyé: {}", e);
                false
            }
        };

        let verification_token = self.flow_token(&user, TokenPurpose::EmailVerification)?;
        Ok(RegisteredAccount {
            user,
            otp_sent,
            verification_token,
        })
    }

    /// Vérifie le code reçu par email et ouvre une session
    pub async fn verify_email(&self, verification_token: &str, code: &str) -> AppResult<AuthSession> {
        let claims = self.claims(verification_token, TokenPurpose::EmailVerification)?;
        require_otp_input(code)?;

        let user = self.user_for(&claims).await?;
        self.otp
            .verify(user.id, OtpPurpose::EmailVerification, code)
            .await?;

        self.session_for(user)
    }

    /// Renvoie un nouveau code, sauf si l'email est déjà vérifié
    pub async fn resend_verification(&self, verification_token: &str) -> AppResult<()> {
        let claims = self.claims(verification_token, TokenPurpose::EmailVerification)?;
        let user = self.user_for(&claims).await?;

        if self
            .otp
            .is_consumed(user.id, OtpPurpose::EmailVerification)
            .await?
        {
            return Err(OtpRejection::consumed(OtpPurpose::EmailVerification).into());
        }

        self.send_verification_code(&user).await.map_err(|e| {
            warn!(user_id = %user.id, "⚠️ Renvoi OTP impossible: {}", e);
            AppError::InfrastructureError(format!("Failed to resend OTP: {}", e))
        })
    }

    /// Authentification username/mot de passe
    pub async fn login(&self, username: &str, password: &str) -> AppResult<AuthSession> {
        let user = self
            .check_credentials(username, password)
            .await?
            .ok_or_else(|| unauthorized(INVALID_CREDENTIALS))?;

        info!(user_id = %user.id, "🔑 Connexion: {}", user.username);
        self.session_for(user)
    }

    /// Connexion réservée aux comptes `is_staff`
    pub async fn admin_login(&self, username: &str, password: &str) -> AppResult<AuthSession> {
        let user = self
            .check_credentials(username, password)
            .await?
            .ok_or_else(|| unauthorized(INVALID_ADMIN_CREDENTIALS))?;

        if !user.is_staff {
            warn!(user_id = %user.id, "🚫 Connexion admin refusée");
            return Err(forbidden(NOT_AN_ADMIN));
        }

        info!(user_id = %user.id, "🛡️ Connexion administrateur: {}", user.username);
        self.session_for(user)
    }

    /// Résout l'utilisateur d'un token d'accès
    pub async fn authenticate(&self, access_token: &str) -> AppResult<User> {
        let claims = self.claims(access_token, TokenPurpose::Access)?;
        let user = self.user_for(&claims).await?;
        if !user.is_active {
            return Err(unauthorized("This account is disabled."));
        }
        Ok(user)
    }

    pub(crate) fn claims(&self, token: &str, purpose: TokenPurpose) -> AppResult<TokenClaims> {
        verify_token(token, purpose, &self.jwt_secret)
    }

    pub(crate) fn flow_token(&self, user: &User, purpose: TokenPurpose) -> AppResult<String> {
        issue_token(user.id, purpose, user.is_staff, self.flow_ttl, &self.jwt_secret)
    }

    pub(crate) async fn user_for(&self, claims: &TokenClaims) -> AppResult<User> {
        self.store
            .find_user_by_id(claims.sub)
            .await?
            .ok_or_else(|| unauthorized("User not found."))
    }

    async fn send_verification_code(&self, user: &User) -> AppResult<()> {
        let code = self.otp.issue(user.id, OtpPurpose::EmailVerification).await?;
        self.notifier.send_email_otp(user, &code).await
    }

    async fn check_credentials(&self, username: &str, password: &str) -> AppResult<Option<User>> {
        let user = match self.store.find_user_by_username(username.trim()).await? {
            Some(user) if user.is_active => user,
            _ => return Ok(None),
        };
        if verify_password(password, &user.password_hash)? {
            Ok(Some(user))
        } else {
            Ok(None)
        }
    }

    fn session_for(&self, user: User) -> AppResult<AuthSession> {
        let access_token = issue_token(
            user.id,
            TokenPurpose::Access,
            user.is_staff,
            self.access_ttl,
            &self.jwt_secret,
        )?;
        Ok(AuthSession {
            user,
            access_token,
            token_type: "Bearer",
            expires_in: self.access_ttl.num_seconds(),
        })
    }
}
