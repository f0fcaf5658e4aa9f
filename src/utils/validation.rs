// utils/validation.rs
use crate::infrastructure::error::{bad_request, AppResult};

pub const MIN_PASSWORD_LENGTH: usize = 8;

/// Valider un email
pub fn validate_email(email: &str) -> AppResult<()> {
    if !validator::validate_email(email.trim()) {
        return Err(bad_request("Please enter a valid email address."));
    }
    Ok(())
}

/// Valider un nouveau mot de passe et sa confirmation
pub fn validate_new_password(password: &str, confirmation: &str) -> AppResult<()> {
    if password.chars().count() < MIN_PASSWORD_LENGTH {
        return Err(bad_request(format!(
            "Password must be at least {} characters long.",
            MIN_PASSWORD_LENGTH
        )));
    }
    if password != confirmation {
        return Err(bad_request("Passwords do not match."));
    }
    Ok(())
}

/// Seule la saisie vide est refusée ici; un code mal formé est jugé par la
/// vérification OTP (existence, usage, expiration, puis égalité)
pub fn require_otp_input(code: &str) -> AppResult<()> {
    if code.trim().is_empty() {
        return Err(bad_request("Please enter the verification code."));
    }
    Ok(())
}

/// Lettres, chiffres et @/./+/-/_ uniquement
pub fn validate_username(username: &str) -> AppResult<()> {
    let length = username.chars().count();
    if !(3..=150).contains(&length) {
        return Err(bad_request("Username must be between 3 and 150 characters."));
    }
    let valid = !username.is_empty()
        && username
            .chars()
            .all(|c| c.is_alphanumeric() || matches!(c, '@' | '.' | '+' | '-' | '_'));
    if !valid {
        return Err(bad_request(
            "Username may contain only letters, numbers, and @/./+/-/_ characters.",
        ));
    }
    Ok(())
}
