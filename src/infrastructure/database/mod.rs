//! Persistance: traits de repository, store PostgreSQL et store en mémoire.
//!
//! Les services ne dépendent que de `Arc<dyn Store>`. `PgStore` est utilisé en
//! production, `MemoryStore` pour les tests et `DATABASE_URL=memory://`.

pub mod chats;
pub mod memory;
pub mod otps;
pub mod predictions;
pub mod users;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::PgPoolOptions;
use sqlx::{Pool, Postgres};
use std::sync::Arc;
use std::time::Duration;
use tracing::info;
use uuid::Uuid;

use crate::domain::{
    AccountUpdate, ChatConversation, NewChatConversation, NewPrediction, NewUser, OtpCode,
    OtpPurpose, Prediction, PredictionOutcome, ProfileUpdate, User, UserProfile,
};
use crate::infrastructure::error::AppResult;
use crate::utils::config::Config;

pub use memory::MemoryStore;

/// Opérations sur les utilisateurs et leurs profils
#[async_trait]
pub trait UserRepository: Send + Sync {
    /// Crée l'utilisateur et son profil. Conflit si username ou email est pris.
    async fn create_user(&self, new_user: NewUser) -> AppResult<User>;
    async fn find_user_by_id(&self, id: Uuid) -> AppResult<Option<User>>;
    async fn find_user_by_username(&self, username: &str) -> AppResult<Option<User>>;
    /// Recherche insensible à la casse
    async fn find_user_by_email(&self, email: &str) -> AppResult<Option<User>>;
    async fn update_account(&self, id: Uuid, update: AccountUpdate) -> AppResult<User>;
    async fn update_password(&self, id: Uuid, password_hash: &str) -> AppResult<()>;

    /// Retourne le profil, en le créant s'il manque
    async fn get_or_create_profile(&self, user_id: Uuid) -> AppResult<UserProfile>;
    async fn update_profile(&self, user_id: Uuid, update: ProfileUpdate) -> AppResult<UserProfile>;
    async fn mark_email_verified(&self, user_id: Uuid) -> AppResult<()>;
    /// Passe `first_analysis_email_sent` de false à true. `true` seulement pour
    /// l'appelant qui a effectué la bascule.
    async fn claim_first_analysis_email(&self, user_id: Uuid) -> AppResult<bool>;
}

/// Codes OTP, un seul actif par (utilisateur, usage)
#[async_trait]
pub trait OtpRepository: Send + Sync {
    /// Écrase le code existant et remet `consumed` à false
    async fn upsert_otp(
        &self,
        user_id: Uuid,
        purpose: OtpPurpose,
        code_hash: &str,
        created_at: DateTime<Utc>,
    ) -> AppResult<OtpCode>;
    async fn find_otp(&self, user_id: Uuid, purpose: OtpPurpose) -> AppResult<Option<OtpCode>>;
    /// Bascule conditionnelle `consumed` false -> true sur le code attendu
    async fn consume_otp(&self, user_id: Uuid, purpose: OtpPurpose, code_hash: &str) -> AppResult<bool>;
    async fn delete_otp(&self, user_id: Uuid, purpose: OtpPurpose) -> AppResult<()>;
    async fn delete_otps_created_before(
        &self,
        purpose: OtpPurpose,
        cutoff: DateTime<Utc>,
    ) -> AppResult<u64>;
}

/// Analyses soumises par les utilisateurs
#[async_trait]
pub trait PredictionRepository: Send + Sync {
    async fn create_prediction(&self, new_prediction: NewPrediction) -> AppResult<Prediction>;
    async fn attach_outcome(&self, id: i64, outcome: PredictionOutcome) -> AppResult<Prediction>;
    async fn find_prediction(&self, user_id: Uuid, id: i64) -> AppResult<Option<Prediction>>;
    /// Plus récentes d'abord
    async fn list_predictions(&self, user_id: Uuid, limit: Option<i64>) -> AppResult<Vec<Prediction>>;
    async fn find_predictions_by_ids(&self, user_id: Uuid, ids: &[i64]) -> AppResult<Vec<Prediction>>;
    async fn count_predictions(&self, user_id: Uuid) -> AppResult<i64>;
}

/// Historique de l'assistant
#[async_trait]
pub trait ChatRepository: Send + Sync {
    async fn save_conversation(&self, conversation: NewChatConversation) -> AppResult<ChatConversation>;
    async fn list_conversations(&self, user_id: Uuid, limit: i64) -> AppResult<Vec<ChatConversation>>;
}

/// Ensemble des repositories utilisés par les services
pub trait Store: UserRepository + OtpRepository + PredictionRepository + ChatRepository {}

impl<T> Store for T where T: UserRepository + OtpRepository + PredictionRepository + ChatRepository {}

/// Gestion de la connexion à la base de données
#[derive(Clone)]
pub struct PgStore {
    pub pool: Pool<Postgres>,
}

impl PgStore {
    /// Crée une nouvelle connexion à la base de données
    pub async fn connect(database_url: &str, max_connections: u32) -> AppResult<Self> {
        info!("🔌 Connexion à la base de données PostgreSQL...");

        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .acquire_timeout(Duration::from_secs(10))
            .connect(database_url)
            .await?;
        info!("✅ Connexion établie avec succès");

        Ok(Self { pool })
    }

    /// Applique les migrations embarquées
    pub async fn migrate(&self) -> AppResult<()> {
        sqlx::migrate!("./migrations").run(&self.pool).await?;
        info!("✅ Migrations appliquées");
        Ok(())
    }
}

/// Construit le store choisi par la configuration
pub async fn connect_store(config: &Config) -> AppResult<Arc<dyn Store>> {
    if config.uses_memory_store() {
        info!("🧠 Store en mémoire (DATABASE_URL=memory://), données non persistées");
        return Ok(Arc::new(MemoryStore::new()));
    }

    let store = PgStore::connect(&config.database_url, config.database_max_connections).await?;
    store.migrate().await?;
    Ok(Arc::new(store))
}
