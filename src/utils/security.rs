// utils/security.rs
use crate::infrastructure::error::{AppError, AppResult};
use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use rand::Rng;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use uuid::Uuid;

/// Usage d'un token signé. Les parcours en plusieurs étapes (vérification
/// d'email, réinitialisation) transportent leur état dans un token court.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TokenPurpose {
    Access,
    EmailVerification,
    PasswordReset,
    PasswordResetVerified,
}

/// Claims JWT communs à tous les tokens
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenClaims {
    pub sub: Uuid,        // User ID
    pub purpose: TokenPurpose,
    pub exp: usize,       // Expiration timestamp
    pub iat: usize,       // Issued at timestamp
    pub jti: String,      // Token ID
    #[serde(default)]
    pub is_staff: bool,
}

/// Générer un token JWT signé (HS256)
pub fn issue_token(
    user_id: Uuid,
    purpose: TokenPurpose,
    is_staff: bool,
    ttl: Duration,
    secret: &str,
) -> AppResult<String> {
    let now = Utc::now();
    let expires_at = now + ttl;

    let claims = TokenClaims {
        sub: user_id,
        purpose,
        exp: expires_at.timestamp() as usize,
        iat: now.timestamp() as usize,
        jti: Uuid::new_v4().to_string(),
        is_staff,
    };

    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
    .map_err(|e| AppError::InternalError(format!("Failed to sign token: {}", e)))
}

/// Vérifier un token et son usage
pub fn verify_token(token: &str, expected: TokenPurpose, secret: &str) -> AppResult<TokenClaims> {
    let token_data = decode::<TokenClaims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &Validation::default(),
    )?;

    if token_data.claims.purpose != expected {
        return Err(AppError::Unauthorized(
            "This token cannot be used for this step.".to_string(),
        ));
    }

    Ok(token_data.claims)
}

/// Générer un hash de mot de passe avec Argon2
pub fn hash_password(password: &str) -> AppResult<String> {
    use argon2::{
        password_hash::{rand_core::OsRng, PasswordHasher, SaltString},
        Argon2,
    };

    let argon2 = Argon2::default();
    let salt = SaltString::generate(&mut OsRng);

    argon2
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| AppError::InternalError(format!("Password hashing failed: {}", e)))
}

/// Vérifier un mot de passe contre un hash
pub fn verify_password(password: &str, hash: &str) -> AppResult<bool> {
    use argon2::{
        password_hash::{PasswordHash, PasswordVerifier},
        Argon2,
    };

    let parsed_hash = PasswordHash::new(hash)
        .map_err(|e| AppError::InternalError(format!("Invalid password hash: {}", e)))?;

    Ok(Argon2::default()
        .verify_password(password.as_bytes(), &parsed_hash)
        .is_ok())
}

/// Code OTP à 6 chiffres (100000..=999999)
pub fn generate_otp() -> String {
    rand::thread_rng().gen_range(100_000..=999_999).to_string()
}

/// Empreinte SHA-256 d'un code OTP, seule forme stockée en base
pub fn otp_digest(code: &str) -> String {
    format!("{:x}", Sha256::digest(code.trim().as_bytes()))
}

/// Comparaison en temps constant de deux chaînes de même longueur
pub fn constant_time_eq(a: &str, b: &str) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.bytes()
        .zip(b.bytes())
        .fold(0u8, |acc, (x, y)| acc | (x ^ y))
        == 0
}

#[cfg(test)]
mod tests {
    use super::*;

    const SECRET: &str = "test-secret-with-enough-length-for-hs256";

    #[test]
    fn password_hash_roundtrip() {
        let hash = hash_password("correct horse battery").unwrap();
        assert!(hash.starts_with("$argon2"));
        assert!(verify_password("correct horse battery", &hash).unwrap());
        assert!(!verify_password("wrong password", &hash).unwrap());
    }

    #[test]
    fn otp_is_six_digits() {
        for _ in 0..100 {
            let code = generate_otp();
            assert_eq!(code.len(), 6);
            let value: u32 = code.parse().unwrap();
            assert!((100_000..=999_999).contains(&value));
        }
    }

    #[test]
    fn otp_digest_ignores_surrounding_whitespace() {
        assert_eq!(otp_digest(" 123456 "), otp_digest("123456"));
        assert_ne!(otp_digest("123456"), otp_digest("123457"));
        assert_eq!(otp_digest("123456").len(), 64);
    }

    #[test]
    fn token_purpose_is_enforced() {
        let user_id = Uuid::new_v4();
        let token = issue_token(
            user_id,
            TokenPurpose::PasswordReset,
            false,
            Duration::minutes(15),
            SECRET,
        )
        .unwrap();

        let claims = verify_token(&token, TokenPurpose::PasswordReset, SECRET).unwrap();
        assert_eq!(claims.sub, user_id);

        let wrong = verify_token(&token, TokenPurpose::PasswordResetVerified, SECRET);
        assert!(matches!(wrong, Err(AppError::Unauthorized(_))));
    }

    #[test]
    fn expired_token_is_rejected() {
        let token = issue_token(
            Uuid::new_v4(),
            TokenPurpose::Access,
            false,
            Duration::minutes(-10),
            SECRET,
        )
        .unwrap();
        assert!(verify_token(&token, TokenPurpose::Access, SECRET).is_err());
    }

    #[test]
    fn token_signed_with_other_secret_is_rejected() {
        let token = issue_token(
            Uuid::new_v4(),
            TokenPurpose::Access,
            false,
            Duration::hours(1),
            SECRET,
        )
        .unwrap();
        assert!(verify_token(&token, TokenPurpose::Access, "another-secret").is_err());
    }

    #[test]
    fn constant_time_eq_behaviour() {
        assert!(constant_time_eq("abc", "abc"));
        assert!(!constant_time_eq("abc", "abd"));
        assert!(!constant_time_eq("abc", "abcd"));
    }
}
