//! # Auth Routes
//!
//! Inscription, vérification d'email par OTP, connexion et réinitialisation
//! du mot de passe. Les étapes successives d'un parcours sont reliées par un
//! token court renvoyé dans la réponse de l'étape précédente.

use actix_web::{post, web, HttpResponse};
use serde::{Deserialize, Serialize};
use serde_json::json;
use validator::Validate;

use crate::api::state::AppState;
use crate::core::auth_service::{AuthSession, Registration};
use crate::domain::otp::success_message;
use crate::domain::{OtpPurpose, User};
use crate::infrastructure::error::AppResult;

/// Requête pour l'inscription
#[derive(Debug, Deserialize, Validate)]
pub struct RegisterRequest {
    #[validate(length(min = 3, max = 150, message = "Username must be between 3 and 150 characters."))]
    pub username: String,
    #[validate(email(message = "Please enter a valid email address."))]
    pub email: String,
    #[validate(length(min = 8, message = "Password must be at least 8 characters long."))]
    pub password: String,
    pub password_confirm: String,
}

/// Requête pour la connexion
#[derive(Debug, Deserialize, Validate)]
pub struct LoginRequest {
    #[validate(length(min = 1, message = "Please enter your username."))]
    pub username: String,
    #[validate(length(min = 1, message = "Please enter your password."))]
    pub password: String,
}

/// Étape OTP d'un parcours
#[derive(Debug, Deserialize)]
pub struct OtpRequest {
    pub token: String,
    pub otp: String,
}

#[derive(Debug, Deserialize)]
pub struct FlowTokenRequest {
    pub token: String,
}

#[derive(Debug, Deserialize, Validate)]
pub struct ForgotPasswordRequest {
    #[validate(email(message = "Please enter a valid email address."))]
    pub email: String,
}

#[derive(Debug, Deserialize)]
pub struct ResetPasswordRequest {
    pub token: String,
    pub password: String,
    pub password_confirm: String,
}

/// Réponse d'authentification réussie
#[derive(Serialize)]
pub struct AuthResponse {
    pub user: User,
    pub access_token: String,
    pub token_type: &'static str,
    pub expires_in: i64,
    pub message: String,
}

impl AuthResponse {
    fn new(session: AuthSession, message: String) -> Self {
        Self {
            user: session.user,
            access_token: session.access_token,
            token_type: session.token_type,
            expires_in: session.expires_in,
            message,
        }
    }
}

/// Endpoint d'inscription
#[post("/auth/register")]
pub async fn register(
    payload: web::Json<RegisterRequest>,
    state: web::Data<AppState>,
) -> AppResult<HttpResponse> {
    payload.validate()?;
    let payload = payload.into_inner();

    let account = state
        .auth
        .register(Registration {
            username: payload.username,
            email: payload.email,
            password: payload.password,
            password_confirm: payload.password_confirm,
        })
        .await?;

    let message = if account.otp_sent {
        format!(
            "Account created for {}! Please check your email for verification code.",
            account.user.username
        )
    } else {
        "Account created but failed to send verification email. Please request a new code."
            .to_string()
    };

    Ok(HttpResponse::Created().json(json!({
        "user": account.user,
        "otp_sent": account.otp_sent,
        "verification_token": account.verification_token,
        "message": message,
    })))
}

/// Vérification de l'email par OTP, ouvre une session
#[post("/auth/verify-email")]
pub async fn verify_email(
    payload: web::Json<OtpRequest>,
    state: web::Data<AppState>,
) -> AppResult<HttpResponse> {
    let session = state.auth.verify_email(&payload.token, &payload.otp).await?;
    let message = success_message(OtpPurpose::EmailVerification).to_string();
    Ok(HttpResponse::Ok().json(AuthResponse::new(session, message)))
}

#[post("/auth/resend-otp")]
pub async fn resend_otp(
    payload: web::Json<FlowTokenRequest>,
    state: web::Data<AppState>,
) -> AppResult<HttpResponse> {
    state.auth.resend_verification(&payload.token).await?;
    Ok(HttpResponse::Ok().json(json!({
        "message": "OTP resent successfully! Please check your email."
    })))
}

/// Endpoint de connexion (username/mot de passe)
#[post("/auth/login")]
pub async fn login(
    credentials: web::Json<LoginRequest>,
    state: web::Data<AppState>,
) -> AppResult<HttpResponse> {
    credentials.validate()?;
    let session = state
        .auth
        .login(&credentials.username, &credentials.password)
        .await?;
    let message = format!("Welcome back, {}!", session.user.username);
    Ok(HttpResponse::Ok().json(AuthResponse::new(session, message)))
}

#[post("/auth/admin/login")]
pub async fn admin_login(
    credentials: web::Json<LoginRequest>,
    state: web::Data<AppState>,
) -> AppResult<HttpResponse> {
    credentials.validate()?;
    let session = state
        .auth
        .admin_login(&credentials.username, &credentials.password)
        .await?;
    let message = format!("Welcome, Administrator {}!", session.user.username);
    Ok(HttpResponse::Ok().json(AuthResponse::new(session, message)))
}

/// Les tokens sont sans état: le client oublie simplement le sien
#[post("/auth/logout")]
pub async fn logout() -> HttpResponse {
    HttpResponse::Ok().json(json!({
        "message": "You have been logged out successfully."
    }))
}

#[post("/auth/password/forgot")]
pub async fn forgot_password(
    payload: web::Json<ForgotPasswordRequest>,
    state: web::Data<AppState>,
) -> AppResult<HttpResponse> {
    payload.validate()?;
    let step = state.password_reset.request(&payload.email).await?;
    Ok(HttpResponse::Ok().json(json!({
        "reset_token": step.reset_token,
        "email": step.email,
        "message": "A password reset code has been sent to your email.",
    })))
}

#[post("/auth/password/verify")]
pub async fn verify_reset_code(
    payload: web::Json<OtpRequest>,
    state: web::Data<AppState>,
) -> AppResult<HttpResponse> {
    let step = state
        .password_reset
        .verify(&payload.token, &payload.otp)
        .await?;
    Ok(HttpResponse::Ok().json(json!({
        "reset_token": step.reset_token,
        "message": success_message(OtpPurpose::PasswordReset),
    })))
}

#[post("/auth/password/reset")]
pub async fn reset_password(
    payload: web::Json<ResetPasswordRequest>,
    state: web::Data<AppState>,
) -> AppResult<HttpResponse> {
    state
        .password_reset
        .reset(&payload.token, &payload.password, &payload.password_confirm)
        .await?;
    Ok(HttpResponse::Ok().json(json!({
        "message": "Your password has been reset successfully. You can now log in."
    })))
}
