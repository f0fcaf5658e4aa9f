// core/mod.rs
pub mod analysis_service;
pub mod auth_service;
pub mod chat_service;
pub mod inference;
pub mod notification_service;
pub mod otp_service;
pub mod password_reset;
pub mod profile_service;
pub mod result_formatter;

// Ré-exports pour faciliter l'import
pub use analysis_service::AnalysisService;
pub use auth_service::AuthService;
pub use chat_service::ChatService;
pub use inference::{ModelLoader, ModelRegistry};
pub use notification_service::{build_email_provider, EmailProvider, LogEmailProvider, NotificationService};
pub use otp_service::OtpService;
pub use password_reset::PasswordResetService;
pub use profile_service::ProfileService;
