use actix_web::{error::ResponseError, http::StatusCode, HttpResponse};
use serde::Serialize;
use sqlx::Error as SqlxError;
use validator::ValidationErrors;

use crate::domain::otp::OtpRejection;

/// Type de résultat standard pour l'application
pub type AppResult<T> = Result<T, AppError>;

/// Erreurs principales de l'application
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    /// Erreur d'authentification (401 Unauthorized)
    #[error("{0}")]
    Unauthorized(String),

    /// Permissions insuffisantes (403 Forbidden)
    #[error("{0}")]
    Forbidden(String),

    /// Ressource non trouvée (404 Not Found)
    #[error("{0}")]
    NotFound(String),

    /// Conflit de ressources (409 Conflict)
    #[error("{0}")]
    Conflict(String),

    /// Données invalides (422 Unprocessable Entity)
    #[error("Validation failed: {0}")]
    ValidationError(ValidationErrors),

    /// Requête mal formée (400 Bad Request)
    #[error("{0}")]
    BadRequest(String),

    /// Code OTP refusé (400 Bad Request)
    #[error("{0}")]
    OtpRejected(OtpRejection),

    /// Erreur interne du serveur (500 Internal Server Error)
    #[error("Internal server error: {0}")]
    InternalError(String),

    /// Erreur de base de données (500 Internal Server Error)
    #[error("Database error: {0}")]
    DatabaseError(#[source] SqlxError),

    /// Erreur de sérialisation/désérialisation (500 Internal Server Error)
    #[error("Serialization error: {0}")]
    SerializationError(#[source] serde_json::Error),

    /// Erreur d'infrastructure (stockage, email, etc.) (500 Internal Server Error)
    #[error("Infrastructure error: {0}")]
    InfrastructureError(String),

    /// Erreur de configuration (500 Internal Server Error)
    #[error("Configuration error: {0}")]
    ConfigurationError(String),

    /// Timeout d'opération (504 Gateway Timeout)
    #[error("Operation timeout: {0}")]
    Timeout(String),

    /// Erreur de connexion (502 Bad Gateway)
    #[error("Connection error: {0}")]
    ConnectionError(String),

    /// Type de média non supporté (415 Unsupported Media Type)
    #[error("{0}")]
    UnsupportedMediaType(String),

    /// Payload trop lourd (413 Payload Too Large)
    #[error("{0}")]
    PayloadTooLarge(String),
}

impl AppError {
    /// Convertit l'erreur en code HTTP approprié
    pub fn status_code(&self) -> StatusCode {
        match self {
            AppError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            AppError::Forbidden(_) => StatusCode::FORBIDDEN,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Conflict(_) => StatusCode::CONFLICT,
            AppError::ValidationError(_) => StatusCode::UNPROCESSABLE_ENTITY,
            AppError::BadRequest(_) | AppError::OtpRejected(_) => StatusCode::BAD_REQUEST,
            AppError::InternalError(_)
            | AppError::DatabaseError(_)
            | AppError::SerializationError(_)
            | AppError::InfrastructureError(_)
            | AppError::ConfigurationError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::Timeout(_) => StatusCode::GATEWAY_TIMEOUT,
            AppError::ConnectionError(_) => StatusCode::BAD_GATEWAY,
            AppError::UnsupportedMediaType(_) => StatusCode::UNSUPPORTED_MEDIA_TYPE,
            AppError::PayloadTooLarge(_) => StatusCode::PAYLOAD_TOO_LARGE,
        }
    }

    /// Message destiné au client (les détails internes restent dans les logs)
    pub fn user_friendly_message(&self) -> String {
        match self {
            AppError::Unauthorized(message)
            | AppError::Forbidden(message)
            | AppError::NotFound(message)
            | AppError::Conflict(message)
            | AppError::BadRequest(message)
            | AppError::UnsupportedMediaType(message)
            | AppError::PayloadTooLarge(message) => message.clone(),
            AppError::OtpRejected(rejection) => rejection.message().to_string(),
            AppError::ValidationError(errors) => {
                let mut messages: Vec<String> = errors
                    .field_errors()
                    .iter()
                    .flat_map(|(field, field_errors)| {
                        field_errors.iter().map(move |error| match error.message.as_ref() {
                            Some(msg) => msg.to_string(),
                            None => format!("Invalid value for '{}'", field),
                        })
                    })
                    .collect();
                messages.sort();
                if messages.is_empty() {
                    "Invalid form data. Please check the fields.".to_string()
                } else {
                    messages.join("; ")
                }
            }
            AppError::Timeout(_) => "The operation took too long. Please try again later.".to_string(),
            AppError::InternalError(_)
            | AppError::DatabaseError(_)
            | AppError::SerializationError(_)
            | AppError::InfrastructureError(_)
            | AppError::ConfigurationError(_)
            | AppError::ConnectionError(_) => {
                "An internal error occurred. Please try again later.".to_string()
            }
        }
    }
}

impl ResponseError for AppError {
    fn status_code(&self) -> StatusCode {
        self.status_code()
    }

    fn error_response(&self) -> HttpResponse {
        let status = self.status_code();
        if status.is_server_error() {
            tracing::error!("❌ {}", self);
        }

        HttpResponse::build(status).json(ErrorResponse {
            error: self.user_friendly_message(),
            code: status.as_u16(),
        })
    }
}

/// Structure de réponse d'erreur standardisée
#[derive(Serialize)]
struct ErrorResponse {
    error: String,
    code: u16,
}

// Implémentations From pour les conversions automatiques

impl From<SqlxError> for AppError {
    fn from(error: SqlxError) -> Self {
        match &error {
            SqlxError::RowNotFound => AppError::NotFound("Resource not found".to_string()),
            SqlxError::Database(db_error) if db_error.code().as_deref() == Some("23505") => {
                AppError::Conflict("This value is already in use.".to_string())
            }
            _ => AppError::DatabaseError(error),
        }
    }
}

impl From<serde_json::Error> for AppError {
    fn from(error: serde_json::Error) -> Self {
        AppError::SerializationError(error)
    }
}

impl From<ValidationErrors> for AppError {
    fn from(errors: ValidationErrors) -> Self {
        AppError::ValidationError(errors)
    }
}

impl From<OtpRejection> for AppError {
    fn from(rejection: OtpRejection) -> Self {
        AppError::OtpRejected(rejection)
    }
}

impl From<std::io::Error> for AppError {
    fn from(error: std::io::Error) -> Self {
        AppError::InfrastructureError(format!("IO error: {}", error))
    }
}

impl From<sqlx::migrate::MigrateError> for AppError {
    fn from(error: sqlx::migrate::MigrateError) -> Self {
        AppError::InfrastructureError(format!("Migration error: {}", error))
    }
}

impl From<tokio::task::JoinError> for AppError {
    fn from(error: tokio::task::JoinError) -> Self {
        AppError::InternalError(format!("Task join error: {}", error))
    }
}

impl From<jsonwebtoken::errors::Error> for AppError {
    fn from(error: jsonwebtoken::errors::Error) -> Self {
        use jsonwebtoken::errors::ErrorKind;
        match error.kind() {
            ErrorKind::ExpiredSignature => {
                AppError::Unauthorized("Your session has expired. Please start again.".to_string())
            }
            _ => AppError::Unauthorized("Invalid or missing token.".to_string()),
        }
    }
}

impl From<actix_multipart::MultipartError> for AppError {
    fn from(error: actix_multipart::MultipartError) -> Self {
        AppError::BadRequest(format!("Invalid multipart payload: {}", error))
    }
}

impl From<reqwest::Error> for AppError {
    fn from(error: reqwest::Error) -> Self {
        if error.is_timeout() {
            AppError::Timeout("Request timeout".to_string())
        } else if error.is_connect() {
            AppError::ConnectionError("Connection failed".to_string())
        } else {
            AppError::InfrastructureError(format!("HTTP request error: {}", error))
        }
    }
}

// Helpers pour créer des erreurs courantes
pub fn not_found<T: Into<String>>(message: T) -> AppError {
    AppError::NotFound(message.into())
}

pub fn unauthorized<T: Into<String>>(message: T) -> AppError {
    AppError::Unauthorized(message.into())
}

pub fn forbidden<T: Into<String>>(message: T) -> AppError {
    AppError::Forbidden(message.into())
}

pub fn conflict<T: Into<String>>(message: T) -> AppError {
    AppError::Conflict(message.into())
}

pub fn bad_request<T: Into<String>>(message: T) -> AppError {
    AppError::BadRequest(message.into())
}

#[cfg(test)]
mod tests {
    use super::*;
    use actix_web::body::to_bytes;

    #[test]
    fn otp_rejection_maps_to_bad_request_with_message() {
        let error = AppError::from(OtpRejection::EmailExpired);
        assert_eq!(error.status_code(), StatusCode::BAD_REQUEST);
        assert_eq!(
            error.user_friendly_message(),
            "OTP has expired. Please request a new one."
        );
    }

    #[test]
    fn internal_errors_are_not_leaked() {
        let error = AppError::InfrastructureError("disk /var/secret unreachable".to_string());
        assert!(!error.user_friendly_message().contains("/var/secret"));
    }

    #[actix_web::test]
    async fn error_response_is_json() {
        let response = conflict("Username already exists.").error_response();
        assert_eq!(response.status(), StatusCode::CONFLICT);
        let body = to_bytes(response.into_body()).await.unwrap();
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json["error"], "Username already exists.");
        assert_eq!(json["code"], 409);
    }
}
