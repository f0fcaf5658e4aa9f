// core/notification_service.rs
use async_trait::async_trait;
use std::sync::Arc;
use tracing::{info, warn};

use crate::domain::{Prediction, User, UserProfile};
use crate::infrastructure::error::{AppError, AppResult};
use crate::utils::config::Config;

/// Emails transactionnels (OTP) et notifications d'activité.
///
/// Les codes OTP partent toujours. Les autres emails exigent
/// `ENABLE_EMAIL_NOTIFICATIONS`, et ceux liés à l'activité exigent en plus la
/// préférence `email_notifications` du profil. Ces derniers sont best-effort:
/// un échec est journalisé puis ignoré.
pub struct NotificationService {
    email_provider: Arc<dyn EmailProvider>,
    frontend_url: String,
    notifications_enabled: bool,
    email_otp_minutes: i64,
    reset_otp_minutes: i64,
}

impl NotificationService {
    pub fn new(email_provider: Arc<dyn EmailProvider>, config: &Config) -> Self {
        Self {
            email_provider,
            frontend_url: config.frontend_url.trim_end_matches('/').to_string(),
            notifications_enabled: config.enable_email_notifications,
            email_otp_minutes: config.email_otp_expiry_minutes,
            reset_otp_minutes: config.reset_otp_expiry_minutes,
        }
    }

    pub fn notifications_enabled(&self) -> bool {
        self.notifications_enabled
    }

    /// Emails d'activité autorisés pour ce profil
    pub fn wants_activity_emails(&self, profile: &UserProfile) -> bool {
        self.notifications_enabled && profile.email_notifications
    }

    /// Code de vérification d'email
    pub async fn send_email_otp(&self, user: &User, code: &str) -> AppResult<()> {
        let subject = "Verify Your Email - SkinCare AI";
        let body = format!(
            r#"Hello {},

Thank you for registering with SkinCare AI!

Your email verification code is: {}

This code will expire in {} minutes.

If you didn't request this code, please ignore this email.

Best regards,
SkinCare AI Team"#,
            user.username, code, self.email_otp_minutes
        );

        self.email_provider.send(&user.email, subject, &body).await
    }

    /// Code de réinitialisation du mot de passe
    pub async fn send_password_reset_code(&self, user: &User, code: &str) -> AppResult<()> {
        let subject = "Password Reset Code - SkinCare AI";
        let body = format!(
            r#"Hello {},

We received a request to reset your SkinCare AI password.

Your password reset code is: {}

This code will expire in {} minutes.

If you didn't request a password reset, you can safely ignore this email.
Your password will not change.

Best regards,
SkinCare AI Team"#,
            user.username, code, self.reset_otp_minutes
        );

        self.email_provider.send(&user.email, subject, &body).await
    }

    /// Email de bienvenue. Retourne `true` si l'email est parti.
    pub async fn send_welcome(&self, user: &User) -> bool {
        if !self.notifications_enabled {
            return false;
        }

        let subject = "Welcome to SkinCare AI!";
        let body = format!(
            r#"Hello {},

Welcome to SkinCare AI!

Thank you for joining our community. With your account you can:
- Upload skin images for AI-powered visual pattern analysis
- Choose between our analysis models or let the system pick automatically
- Keep track of your analysis history and compare results
- Chat with our educational skin health assistant

Get started: {}/analyze

Remember: SkinCare AI is for educational purposes only and does not replace
professional medical advice.

Best regards,
SkinCare AI Team"#,
            user.display_name(),
            self.frontend_url
        );

        self.deliver_best_effort(&user.email, subject, &body, "welcome").await
    }

    /// Félicitations pour la première analyse
    pub async fn send_first_analysis(&self, user: &User, prediction: &Prediction) -> bool {
        let subject = "Your First Skin Analysis - SkinCare AI";
        let confidence = prediction
            .confidence_score
            .map(|c| format!("{:.1}%", c * 100.0))
            .unwrap_or_else(|| "not available".to_string());
        let body = format!(
            r#"Hello {},

Congratulations on completing your first skin analysis with SkinCare AI!

Analysis summary:
- Result: {}
- Confidence: {}
- Date: {}

View the full result: {}/results/{}

This analysis is for educational use only and is NOT a medical diagnosis.
Please consult a healthcare professional for any concern about your skin.

Best regards,
SkinCare AI Team"#,
            user.display_name(),
            prediction.label,
            confidence,
            prediction.created_at.format("%B %d, %Y at %I:%M %p"),
            self.frontend_url,
            prediction.id
        );

        self.deliver_best_effort(&user.email, subject, &body, "first_analysis").await
    }

    /// Notification de mise à jour du profil
    pub async fn send_profile_updated(&self, user: &User, profile: &UserProfile) -> bool {
        if !self.wants_activity_emails(profile) {
            return false;
        }

        let subject = "Profile Updated - SkinCare AI";
        let body = format!(
            r#"Hello {},

Your SkinCare AI profile was updated successfully.

If you did not make this change, please contact our support team immediately.

View your profile: {}/profile

Best regards,
SkinCare AI Team"#,
            user.display_name(),
            self.frontend_url
        );

        self.deliver_best_effort(&user.email, subject, &body, "profile_update").await
    }

    async fn deliver_best_effort(&self, to: &str, subject: &str, body: &str, kind: &str) -> bool {
        if to.is_empty() {
            return false;
        }
        match self.email_provider.send(to, subject, body).await {
            Ok(()) => true,
            Err(e) => {
                warn!(kind, "⚠️ Échec d'envoi de l'email à {}: {}", to, e);
                false
            }
        }
    }
}

// Traits pour les fournisseurs de notification
#[async_trait]
pub trait EmailProvider: Send + Sync {
    async fn send(&self, to: &str, subject: &str, body: &str) -> AppResult<()>;
}

// Implémentation pour les logs (développement)
pub struct LogEmailProvider;

#[async_trait]
impl EmailProvider for LogEmailProvider {
    async fn send(&self, to: &str, subject: &str, body: &str) -> AppResult<()> {
        info!(to, subject, "📧 [EMAIL]\n{}", body);
        Ok(())
    }
}

#[cfg(feature = "email")]
pub use smtp::SmtpEmailProvider;

#[cfg(feature = "email")]
mod smtp {
    use async_trait::async_trait;
    use lettre::message::header::ContentType;
    use lettre::message::Mailbox;
    use lettre::transport::smtp::authentication::Credentials;
    use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};

    use super::EmailProvider;
    use crate::infrastructure::error::{AppError, AppResult};

    /// Envoi SMTP (STARTTLS) via lettre
    pub struct SmtpEmailProvider {
        transport: AsyncSmtpTransport<Tokio1Executor>,
        from: Mailbox,
    }

    impl SmtpEmailProvider {
        pub fn new(
            host: &str,
            port: Option<u16>,
            credentials: Option<(String, String)>,
            from_name: &str,
            from_address: &str,
        ) -> AppResult<Self> {
            let mut builder = AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(host)
                .map_err(|e| AppError::ConfigurationError(format!("Invalid SMTP host: {}", e)))?;
            if let Some(port) = port {
                builder = builder.port(port);
            }
            if let Some((username, password)) = credentials {
                builder = builder.credentials(Credentials::new(username, password));
            }

            let from = format!("{} <{}>", from_name, from_address)
                .parse::<Mailbox>()
                .map_err(|e| AppError::ConfigurationError(format!("Invalid EMAIL_FROM: {}", e)))?;

            Ok(Self {
                transport: builder.build(),
                from,
            })
        }
    }

    #[async_trait]
    impl EmailProvider for SmtpEmailProvider {
        async fn send(&self, to: &str, subject: &str, body: &str) -> AppResult<()> {
            let recipient = to
                .parse::<Mailbox>()
                .map_err(|e| AppError::BadRequest(format!("Invalid recipient address: {}", e)))?;

            let message = Message::builder()
                .from(self.from.clone())
                .to(recipient)
                .subject(subject)
                .header(ContentType::TEXT_PLAIN)
                .body(body.to_string())
                .map_err(|e| AppError::InfrastructureError(format!("Failed to build email: {}", e)))?;

            self.transport
                .send(message)
                .await
                .map_err(|e| AppError::ConnectionError(format!("SMTP send failed: {}", e)))?;
            Ok(())
        }
    }
}

/// Construit le fournisseur désigné par `EMAIL_PROVIDER`
pub fn build_email_provider(config: &Config) -> AppResult<Arc<dyn EmailProvider>> {
    match config.email_provider.as_str() {
        "log" => Ok(Arc::new(LogEmailProvider)),
        #[cfg(feature = "email")]
        "smtp" => {
            let host = config
                .smtp_host
                .as_deref()
                .ok_or_else(|| AppError::ConfigurationError("SMTP_HOST is required".to_string()))?;
            let credentials = match (&config.smtp_username, &config.smtp_password) {
                (Some(user), Some(password)) => Some((user.clone(), password.clone())),
                _ => None,
            };
            let provider = SmtpEmailProvider::new(
                host,
                config.smtp_port,
                credentials,
                &config.email_from_name,
                &config.email_from,
            )?;
            info!("✅ Email: SMTP via {}", host);
            Ok(Arc::new(provider))
        }
        other => Err(AppError::ConfigurationError(format!(
            "Unsupported EMAIL_PROVIDER: {}",
            other
        ))),
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;
    use std::sync::Mutex;

    #[derive(Debug, Clone)]
    pub struct SentEmail {
        pub to: String,
        pub subject: String,
        pub body: String,
    }

    /// Conserve les emails envoyés, ou échoue systématiquement
    #[derive(Default)]
    pub struct RecordingEmailProvider {
        pub sent: Mutex<Vec<SentEmail>>,
        pub fail: bool,
    }

    impl RecordingEmailProvider {
        pub fn failing() -> Self {
            Self {
                fail: true,
                ..Self::default()
            }
        }

        pub fn sent(&self) -> Vec<SentEmail> {
            self.sent.lock().unwrap().clone()
        }

        pub fn with_subject(&self, subject: &str) -> Vec<SentEmail> {
            self.sent().into_iter().filter(|e| e.subject == subject).collect()
        }

        /// Dernier code à 6 chiffres envoyé à cette adresse
        pub fn last_code_for(&self, to: &str) -> Option<String> {
            self.sent().iter().rev().filter(|e| e.to == to).find_map(|e| {
                e.body
                    .split_whitespace()
                    .find(|w| w.len() == 6 && w.chars().all(|c| c.is_ascii_digit()))
                    .map(|w| w.to_string())
            })
        }
    }

    #[async_trait]
    impl EmailProvider for RecordingEmailProvider {
        async fn send(&self, to: &str, subject: &str, body: &str) -> AppResult<()> {
            if self.fail {
                return Err(AppError::ConnectionError("smtp unreachable".to_string()));
            }
            self.sent.lock().unwrap().push(SentEmail {
                to: to.to_string(),
                subject: subject.to_string(),
                body: body.to_string(),
            });
            Ok(())
        }
    }
}
