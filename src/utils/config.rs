// utils/config.rs
use crate::infrastructure::error::{AppError, AppResult};
use dotenv::dotenv;
use serde::Deserialize;
use std::env;
use std::path::PathBuf;
use std::str::FromStr;

const DEV_JWT_SECRET: &str = "dev-only-secret-change-me-in-production-0000";

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    // Environnement et serveur
    pub run_mode: String,
    pub server_host: String,
    pub server_port: u16,
    pub workers: usize,
    pub log_level: String,
    pub log_format: String,

    // Base de données
    pub database_url: String,
    pub database_max_connections: u32,

    // Sécurité
    pub jwt_secret: String,
    pub access_token_expiry_hours: i64,
    pub flow_token_expiry_minutes: i64,
    pub email_otp_expiry_minutes: i64,
    pub reset_otp_expiry_minutes: i64,

    // Médias
    pub media_root: PathBuf,
    pub max_upload_size_mb: u64,

    // Modèles
    pub models_dir: PathBuf,
    pub primary_model_file: String,
    pub secondary_model_file: String,
    pub primary_input_size: u32,
    pub secondary_input_size: u32,
    pub primary_pixel_scale: f32,
    pub secondary_pixel_scale: f32,
    pub confidence_threshold: f64,

    // Email
    pub email_provider: String,
    pub email_from: String,
    pub email_from_name: String,
    pub smtp_host: Option<String>,
    pub smtp_port: Option<u16>,
    pub smtp_username: Option<String>,
    pub smtp_password: Option<String>,
    pub enable_email_notifications: bool,
    pub frontend_url: String,

    // Assistant
    pub chat_api_key: Option<String>,
    pub chat_api_base_url: String,
    pub chat_model: String,
    pub chat_timeout_seconds: u64,

    // Maintenance
    pub otp_cleanup_interval_minutes: u64,
    pub otp_retention_hours: i64,
}

impl Config {
    /// Charger la configuration depuis les variables d'environnement
    pub fn from_env() -> AppResult<Self> {
        // Charger le fichier .env si présent
        let _ = dotenv().ok();

        let run_mode = env::var("RUN_MODE").unwrap_or_else(|_| "development".to_string());

        let jwt_secret = match env::var("JWT_SECRET") {
            Ok(secret) => secret,
            Err(_) if run_mode == "development" => DEV_JWT_SECRET.to_string(),
            Err(_) => {
                return Err(AppError::ConfigurationError(
                    "Variable d'environnement requise manquante: JWT_SECRET".to_string(),
                ))
            }
        };

        let config = Config {
            run_mode,
            server_host: env::var("SERVER_HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
            server_port: parse_var("SERVER_PORT", "8080", "a number")?,
            workers: parse_var("WORKERS", "4", "a number")?,
            log_level: env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string()),
            log_format: env::var("LOG_FORMAT").unwrap_or_else(|_| "compact".to_string()),

            database_url: env::var("DATABASE_URL").unwrap_or_else(|_| "memory://".to_string()),
            database_max_connections: parse_var("DATABASE_MAX_CONNECTIONS", "10", "a number")?,

            jwt_secret,
            access_token_expiry_hours: parse_var("ACCESS_TOKEN_EXPIRY_HOURS", "24", "a number")?,
            flow_token_expiry_minutes: parse_var("FLOW_TOKEN_EXPIRY_MINUTES", "15", "a number")?,
            email_otp_expiry_minutes: parse_var("EMAIL_OTP_EXPIRY_MINUTES", "10", "a number")?,
            reset_otp_expiry_minutes: parse_var("RESET_OTP_EXPIRY_MINUTES", "15", "a number")?,

            media_root: PathBuf::from(env::var("MEDIA_ROOT").unwrap_or_else(|_| "./media".to_string())),
            max_upload_size_mb: parse_var("MAX_UPLOAD_SIZE_MB", "10", "a number")?,

            models_dir: PathBuf::from(env::var("MODELS_DIR").unwrap_or_else(|_| "./models".to_string())),
            primary_model_file: env::var("PRIMARY_MODEL_FILE")
                .unwrap_or_else(|_| "efficientnet_b0_skin_cancer.onnx".to_string()),
            secondary_model_file: env::var("SECONDARY_MODEL_FILE")
                .unwrap_or_else(|_| "CNN_skin-cancer.onnx".to_string()),
            primary_input_size: parse_var("PRIMARY_INPUT_SIZE", "224", "a number")?,
            secondary_input_size: parse_var("SECONDARY_INPUT_SIZE", "48", "a number")?,
            primary_pixel_scale: parse_var("PRIMARY_PIXEL_SCALE", "255.0", "a number")?,
            secondary_pixel_scale: parse_var("SECONDARY_PIXEL_SCALE", "255.0", "a number")?,
            confidence_threshold: parse_var("CONFIDENCE_THRESHOLD", "0.5", "a number")?,

            email_provider: env::var("EMAIL_PROVIDER").unwrap_or_else(|_| "log".to_string()),
            email_from: env::var("EMAIL_FROM").unwrap_or_else(|_| "noreply@skincare-ai.local".to_string()),
            email_from_name: env::var("EMAIL_FROM_NAME").unwrap_or_else(|_| "SkinCare AI".to_string()),
            smtp_host: env::var("SMTP_HOST").ok(),
            smtp_port: optional_var("SMTP_PORT", "a port number")?,
            smtp_username: env::var("SMTP_USERNAME").ok(),
            smtp_password: env::var("SMTP_PASSWORD").ok(),
            enable_email_notifications: parse_var("ENABLE_EMAIL_NOTIFICATIONS", "true", "a boolean")?,
            frontend_url: env::var("FRONTEND_URL").unwrap_or_else(|_| "http://localhost:3000".to_string()),

            chat_api_key: env::var("CHAT_API_KEY").ok().filter(|key| !key.trim().is_empty()),
            chat_api_base_url: env::var("CHAT_API_BASE_URL")
                .unwrap_or_else(|_| "https://api.perplexity.ai".to_string()),
            chat_model: env::var("CHAT_MODEL").unwrap_or_else(|_| "sonar".to_string()),
            chat_timeout_seconds: parse_var("CHAT_TIMEOUT_SECONDS", "60", "a number")?,

            otp_cleanup_interval_minutes: parse_var("OTP_CLEANUP_INTERVAL_MINUTES", "60", "a number")?,
            otp_retention_hours: parse_var("OTP_RETENTION_HOURS", "24", "a number")?,
        };

        config.validate()?;
        Ok(config)
    }

    /// Vérifie la cohérence des valeurs chargées
    pub fn validate(&self) -> AppResult<()> {
        if !(0.0..=1.0).contains(&self.confidence_threshold) {
            return Err(AppError::ConfigurationError(
                "CONFIDENCE_THRESHOLD must be between 0 and 1".to_string(),
            ));
        }
        if self.primary_input_size == 0 || self.secondary_input_size == 0 {
            return Err(AppError::ConfigurationError(
                "model input sizes must be greater than zero".to_string(),
            ));
        }
        if self.primary_pixel_scale <= 0.0 || self.secondary_pixel_scale <= 0.0 {
            return Err(AppError::ConfigurationError(
                "pixel scales must be positive".to_string(),
            ));
        }
        if self.email_provider == "smtp" && self.smtp_host.is_none() {
            return Err(AppError::ConfigurationError(
                "SMTP_HOST is required when EMAIL_PROVIDER=smtp".to_string(),
            ));
        }
        Ok(())
    }

    pub fn is_production(&self) -> bool {
        self.run_mode == "production"
    }

    /// `DATABASE_URL=memory://` sélectionne le store en mémoire
    pub fn uses_memory_store(&self) -> bool {
        self.database_url.starts_with("memory://")
    }

    pub fn max_upload_bytes(&self) -> usize {
        (self.max_upload_size_mb as usize) * 1024 * 1024
    }

    pub fn primary_model_path(&self) -> PathBuf {
        self.models_dir.join(&self.primary_model_file)
    }

    pub fn secondary_model_path(&self) -> PathBuf {
        self.models_dir.join(&self.secondary_model_file)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            run_mode: "development".to_string(),
            server_host: "127.0.0.1".to_string(),
            server_port: 8080,
            workers: 1,
            log_level: "info".to_string(),
            log_format: "compact".to_string(),
            database_url: "memory://".to_string(),
            database_max_connections: 5,
            jwt_secret: DEV_JWT_SECRET.to_string(),
            access_token_expiry_hours: 24,
            flow_token_expiry_minutes: 15,
            email_otp_expiry_minutes: 10,
            reset_otp_expiry_minutes: 15,
            media_root: PathBuf::from("./media"),
            max_upload_size_mb: 10,
            models_dir: PathBuf::from("./models"),
            primary_model_file: "efficientnet_b0_skin_cancer.onnx".to_string(),
            secondary_model_file: "CNN_skin-cancer.onnx".to_string(),
            primary_input_size: 224,
            secondary_input_size: 48,
            primary_pixel_scale: 255.0,
            secondary_pixel_scale: 255.0,
            confidence_threshold: 0.5,
            email_provider: "log".to_string(),
            email_from: "noreply@skincare-ai.local".to_string(),
            email_from_name: "SkinCare AI".to_string(),
            smtp_host: None,
            smtp_port: None,
            smtp_username: None,
            smtp_password: None,
            enable_email_notifications: true,
            frontend_url: "http://localhost:3000".to_string(),
            chat_api_key: None,
            chat_api_base_url: "https://api.perplexity.ai".to_string(),
            chat_model: "sonar".to_string(),
            chat_timeout_seconds: 60,
            otp_cleanup_interval_minutes: 60,
            otp_retention_hours: 24,
        }
    }
}

fn parse_var<T: FromStr>(key: &str, default: &str, kind: &str) -> AppResult<T> {
    let raw = env::var(key).unwrap_or_else(|_| default.to_string());
    parse_value(key, &raw, kind)
}

/// Variable facultative: absente => `None`, présente mais invalide => erreur
fn optional_var<T: FromStr>(key: &str, kind: &str) -> AppResult<Option<T>> {
    env::var(key)
        .ok()
        .map(|raw| parse_value(key, &raw, kind))
        .transpose()
}

fn parse_value<T: FromStr>(key: &str, raw: &str, kind: &str) -> AppResult<T> {
    raw.trim()
        .parse()
        .map_err(|_| AppError::ConfigurationError(format!("{} must be {}", key, kind)))
}
