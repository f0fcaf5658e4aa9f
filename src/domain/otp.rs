use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Usage d'un code OTP. Un seul code actif par (utilisateur, usage).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OtpPurpose {
    EmailVerification,
    PasswordReset,
}

impl OtpPurpose {
    pub fn as_str(&self) -> &'static str {
        match self {
            OtpPurpose::EmailVerification => "email_verification",
            OtpPurpose::PasswordReset => "password_reset",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "email_verification" => Some(OtpPurpose::EmailVerification),
            "password_reset" => Some(OtpPurpose::PasswordReset),
            _ => None,
        }
    }
}

/// Code OTP stocké. `code_hash` est le SHA-256 hexadécimal du code à 6 chiffres.
#[derive(Debug, Clone, Serialize)]
pub struct OtpCode {
    pub user_id: Uuid,
    pub purpose: OtpPurpose,
    #[serde(skip_serializing)]
    pub code_hash: String,
    pub created_at: DateTime<Utc>,
    /// `is_verified` pour l'email, `is_used` pour la réinitialisation
    pub consumed: bool,
}

impl OtpCode {
    pub fn is_expired(&self, now: DateTime<Utc>, validity: Duration) -> bool {
        now > self.created_at + validity
    }
}

/// Raison du refus d'un code OTP, avec le message affiché à l'utilisateur
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("{}", self.message())]
pub enum OtpRejection {
    EmailMissing,
    EmailAlreadyVerified,
    EmailExpired,
    EmailMismatch,
    ResetMissing,
    ResetAlreadyUsed,
    ResetExpired,
    ResetMismatch,
}

impl OtpRejection {
    pub fn missing(purpose: OtpPurpose) -> Self {
        match purpose {
            OtpPurpose::EmailVerification => OtpRejection::EmailMissing,
            OtpPurpose::PasswordReset => OtpRejection::ResetMissing,
        }
    }

    pub fn consumed(purpose: OtpPurpose) -> Self {
        match purpose {
            OtpPurpose::EmailVerification => OtpRejection::EmailAlreadyVerified,
            OtpPurpose::PasswordReset => OtpRejection::ResetAlreadyUsed,
        }
    }

    pub fn expired(purpose: OtpPurpose) -> Self {
        match purpose {
            OtpPurpose::EmailVerification => OtpRejection::EmailExpired,
            OtpPurpose::PasswordReset => OtpRejection::ResetExpired,
        }
    }

    pub fn mismatch(purpose: OtpPurpose) -> Self {
        match purpose {
            OtpPurpose::EmailVerification => OtpRejection::EmailMismatch,
            OtpPurpose::PasswordReset => OtpRejection::ResetMismatch,
        }
    }

    pub fn message(&self) -> &'static str {
        match self {
            OtpRejection::EmailMissing => "No OTP found. Please request a new one.",
            OtpRejection::EmailAlreadyVerified => "Email already verified",
            OtpRejection::EmailExpired => "OTP has expired. Please request a new one.",
            OtpRejection::EmailMismatch => "Invalid OTP. Please try again.",
            OtpRejection::ResetMissing => "No password reset request found. Please request a new code.",
            OtpRejection::ResetAlreadyUsed => "This password reset code has already been used.",
            OtpRejection::ResetExpired => "Password reset code has expired. Please request a new one.",
            OtpRejection::ResetMismatch => "Invalid password reset code. Please try again.",
        }
    }
}

/// Message de succès d'une vérification
pub fn success_message(purpose: OtpPurpose) -> &'static str {
    match purpose {
        OtpPurpose::EmailVerification => "Email verified successfully!",
        OtpPurpose::PasswordReset => "Password reset code verified successfully!",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejection_displays_its_user_message() {
        assert_eq!(
            OtpRejection::EmailExpired.to_string(),
            "OTP has expired. Please request a new one."
        );
        assert_eq!(
            OtpRejection::consumed(OtpPurpose::PasswordReset).to_string(),
            "This password reset code has already been used."
        );
    }

    #[test]
    fn purpose_round_trips_through_its_name() {
        for purpose in [OtpPurpose::EmailVerification, OtpPurpose::PasswordReset] {
            assert_eq!(OtpPurpose::parse(purpose.as_str()), Some(purpose));
        }
        assert_eq!(OtpPurpose::parse("unknown"), None);
    }
}
