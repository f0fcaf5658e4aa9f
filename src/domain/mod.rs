//! # Domain Models Module
//!
//! Entités métier partagées par l'API, les services et la persistance.
//!
//! ## Structure
//! - `user.rs`: utilisateurs et profils
//! - `otp.rs`: codes OTP (vérification d'email, réinitialisation du mot de passe)
//! - `prediction.rs`: analyses d'images et identifiants de modèles
//! - `chat.rs`: historique de l'assistant
//!
//! ## Conventions
//! - Les champs sensibles sont exclus de la sérialisation JSON
//! - Les utilisateurs sont identifiés par `uuid::Uuid`
//! - Les timestamps utilisent `chrono::DateTime<chrono::Utc>`

pub mod chat;
pub mod otp;
pub mod prediction;
pub mod user;

pub use chat::{ChatConversation, NewChatConversation};
pub use otp::{OtpCode, OtpPurpose, OtpRejection};
pub use prediction::{ModelId, ModelPreference, NewPrediction, Prediction, PredictionOutcome};
pub use user::{AccountUpdate, NewUser, ProfileUpdate, User, UserProfile};
