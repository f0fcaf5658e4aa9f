use std::sync::Arc;

use crate::core::{
    AnalysisService, AuthService, ChatService, EmailProvider, ModelLoader, NotificationService,
    OtpService, PasswordResetService, ProfileService,
};
use crate::infrastructure::database::Store;
use crate::infrastructure::error::AppResult;
use crate::infrastructure::storage::MediaStorage;
use crate::utils::config::Config;

/// Services partagés par tous les workers actix (`web::Data<AppState>`)
pub struct AppState {
    pub config: Config,
    pub store: Arc<dyn Store>,
    pub storage: Arc<MediaStorage>,
    pub auth: Arc<AuthService>,
    pub password_reset: Arc<PasswordResetService>,
    pub analysis: Arc<AnalysisService>,
    pub profiles: Arc<ProfileService>,
    pub chat: Arc<ChatService>,
}

impl AppState {
    /// Assemble les services à partir de leurs dépendances externes
    pub fn build(
        config: Config,
        store: Arc<dyn Store>,
        models: Arc<dyn ModelLoader>,
        email_provider: Arc<dyn EmailProvider>,
    ) -> AppResult<Self> {
        let storage = Arc::new(MediaStorage::new(config.media_root.clone()));
        let notifier = Arc::new(NotificationService::new(email_provider, &config));
        let otp = Arc::new(OtpService::new(store.clone(), &config));

        let auth = Arc::new(AuthService::new(
            store.clone(),
            otp.clone(),
            notifier.clone(),
            &config,
        ));
        let password_reset = Arc::new(PasswordResetService::new(
            store.clone(),
            otp,
            notifier.clone(),
            auth.clone(),
        ));
        let analysis = Arc::new(AnalysisService::new(
            store.clone(),
            models,
            storage.clone(),
            notifier.clone(),
            config.confidence_threshold,
        ));
        let profiles = Arc::new(ProfileService::new(store.clone(), notifier));
        let chat = Arc::new(ChatService::new(store.clone(), &config)?);

        Ok(Self {
            config,
            store,
            storage,
            auth,
            password_reset,
            analysis,
            profiles,
            chat,
        })
    }
}
