use chrono::{Duration as ChronoDuration, Utc};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info};

use crate::domain::OtpPurpose;
use crate::infrastructure::database::Store;
use crate::infrastructure::error::AppResult;
use crate::utils::config::Config;

/// Configuration du worker de nettoyage
#[derive(Debug, Clone)]
pub struct CleanupConfig {
    /// Âge au-delà duquel un code de réinitialisation est supprimé (heures)
    pub otp_retention_hours: i64,
    /// Intervalle entre les cycles de nettoyage
    pub interval: Duration,
}

impl CleanupConfig {
    /// `None` quand `OTP_CLEANUP_INTERVAL_MINUTES=0`
    pub fn from_config(config: &Config) -> Option<Self> {
        if config.otp_cleanup_interval_minutes == 0 {
            return None;
        }
        Some(Self {
            otp_retention_hours: config.otp_retention_hours,
            interval: Duration::from_secs(config.otp_cleanup_interval_minutes * 60),
        })
    }
}

/// Supprime périodiquement les vieux codes de réinitialisation.
/// L'expiration à la lecture reste la seule règle de validité.
pub struct CleanupWorker {
    config: CleanupConfig,
    store: Arc<dyn Store>,
}

impl CleanupWorker {
    pub fn new(config: CleanupConfig, store: Arc<dyn Store>) -> Self {
        Self { config, store }
    }

    /// Démarre le worker en boucle infinie
    pub async fn start(self) {
        info!("🔧 Worker de nettoyage démarré avec config: {:?}", self.config);

        let mut ticker = tokio::time::interval(self.config.interval);
        loop {
            ticker.tick().await;
            match self.run_cleanup_cycle().await {
                Ok(deleted) => debug!("✅ Cycle de nettoyage terminé ({} codes supprimés)", deleted),
                Err(e) => error!("❌ Erreur lors du cycle de nettoyage: {}", e),
            }
        }
    }

    /// Exécute un cycle complet de nettoyage
    pub async fn run_cleanup_cycle(&self) -> AppResult<u64> {
        let cutoff = Utc::now() - ChronoDuration::hours(self.config.otp_retention_hours);
        let deleted = self
            .store
            .delete_otps_created_before(OtpPurpose::PasswordReset, cutoff)
            .await?;

        if deleted > 0 {
            info!("🧹 {} code(s) de réinitialisation expiré(s) supprimé(s)", deleted);
        }
        Ok(deleted)
    }
}
