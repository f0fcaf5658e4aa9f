use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// Représente un utilisateur du système
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct User {
    /// Identifiant unique de l'utilisateur (UUID)
    pub id: Uuid,
    /// Nom d'utilisateur (unique, sert à la connexion)
    pub username: String,
    /// Email de l'utilisateur (unique)
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    /// Hash Argon2 du mot de passe (jamais exposé dans les APIs)
    #[serde(skip_serializing, default)]
    pub password_hash: String,
    /// Accès à la connexion administrateur
    pub is_staff: bool,
    /// Statut du compte (actif/désactivé)
    pub is_active: bool,
    pub date_joined: DateTime<Utc>,
}

/// Données requises pour créer un nouvel utilisateur (mot de passe déjà hashé)
#[derive(Debug, Clone)]
pub struct NewUser {
    pub username: String,
    pub email: String,
    pub password_hash: String,
}

/// Profil associé un-à-un à chaque utilisateur
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct UserProfile {
    pub user_id: Uuid,
    pub bio: String,
    pub phone: String,
    pub date_of_birth: Option<NaiveDate>,
    pub profile_picture: Option<String>,
    /// Passe à `true` après vérification OTP de l'email
    pub email_verified: bool,
    /// Préférence d'envoi des emails de notification
    pub email_notifications: bool,
    /// Garde-fou de l'email "première analyse" (false -> true une seule fois)
    pub first_analysis_email_sent: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl UserProfile {
    pub fn new(user_id: Uuid) -> Self {
        let now = Utc::now();
        Self {
            user_id,
            bio: String::new(),
            phone: String::new(),
            date_of_birth: None,
            profile_picture: None,
            email_verified: false,
            email_notifications: true,
            first_analysis_email_sent: false,
            created_at: now,
            updated_at: now,
        }
    }
}

/// Champs du compte modifiables depuis la page profil
#[derive(Debug, Clone)]
pub struct AccountUpdate {
    pub username: String,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
}

/// Champs du profil modifiables depuis la page profil
#[derive(Debug, Clone)]
pub struct ProfileUpdate {
    pub bio: String,
    pub phone: String,
    pub date_of_birth: Option<NaiveDate>,
    pub email_notifications: bool,
}

impl User {
    pub fn display_name(&self) -> String {
        let full = format!("{} {}", self.first_name, self.last_name);
        let full = full.trim();
        if full.is_empty() {
            self.username.clone()
        } else {
            full.to_string()
        }
    }
}
