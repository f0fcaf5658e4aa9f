// core/profile_service.rs
use serde::Serialize;
use std::sync::Arc;
use tracing::info;

use crate::core::analysis_service::PredictionSummary;
use crate::core::notification_service::NotificationService;
use crate::domain::{AccountUpdate, ProfileUpdate, User, UserProfile};
use crate::infrastructure::database::Store;
use crate::infrastructure::error::{bad_request, AppResult};
use crate::utils::validation::{validate_email, validate_username};

pub const MAX_BIO_LENGTH: usize = 500;
pub const MAX_PHONE_LENGTH: usize = 20;
const RECENT_PREDICTIONS: i64 = 5;

/// Page profil: compte, profil et activité récente
#[derive(Debug, Clone, Serialize)]
pub struct ProfileView {
    pub user: User,
    pub profile: UserProfile,
    pub prediction_count: i64,
    pub recent_predictions: Vec<PredictionSummary>,
}

pub struct ProfileService {
    store: Arc<dyn Store>,
    notifier: Arc<NotificationService>,
}

impl ProfileService {
    pub fn new(store: Arc<dyn Store>, notifier: Arc<NotificationService>) -> Self {
        Self { store, notifier }
    }

    /// Le profil est créé à la volée s'il manque
    pub async fn view(&self, user: &User) -> AppResult<ProfileView> {
        let profile = self.store.get_or_create_profile(user.id).await?;
        let prediction_count = self.store.count_predictions(user.id).await?;
        let recent = self
            .store
            .list_predictions(user.id, Some(RECENT_PREDICTIONS))
            .await?;

        Ok(ProfileView {
            user: user.clone(),
            profile,
            prediction_count,
            recent_predictions: recent.iter().map(PredictionSummary::from).collect(),
        })
    }

    /// Met à jour compte et profil, puis notifie l'utilisateur si il l'accepte
    pub async fn update(
        &self,
        user: &User,
        account: AccountUpdate,
        profile: ProfileUpdate,
    ) -> AppResult<ProfileView> {
        let account = AccountUpdate {
            username: account.username.trim().to_string(),
            email: account.email.trim().to_string(),
            first_name: account.first_name.trim().to_string(),
            last_name: account.last_name.trim().to_string(),
        };
        validate_username(&account.username)?;
        validate_email(&account.email)?;
        if account.first_name.chars().count() > 150 || account.last_name.chars().count() > 150 {
            return Err(bad_request("Names must be at most 150 characters."));
        }
        if profile.bio.chars().count() > MAX_BIO_LENGTH {
            return Err(bad_request(format!(
                "Bio must be at most {} characters.",
                MAX_BIO_LENGTH
            )));
        }
        if profile.phone.chars().count() > MAX_PHONE_LENGTH {
            return Err(bad_request(format!(
                "Phone number must be at most {} characters.",
                MAX_PHONE_LENGTH
            )));
        }

        self.store.get_or_create_profile(user.id).await?;
        let updated_user = self.store.update_account(user.id, account).await?;
        let updated_profile = self.store.update_profile(user.id, profile).await?;
        info!(user_id = %user.id, "📝 Profil mis à jour");

        self.notifier
            .send_profile_updated(&updated_user, &updated_profile)
            .await;

        self.view(&updated_user).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::notification_service::testing::RecordingEmailProvider;
    use crate::domain::NewUser;
    use crate::infrastructure::database::{MemoryStore, UserRepository};
    use crate::infrastructure::error::AppError;
    use crate::utils::config::Config;

    async fn create(store: &MemoryStore, name: &str) -> User {
        store
            .create_user(NewUser {
                username: name.to_string(),
                email: format!("{}@example.com", name),
                password_hash: "x".to_string(),
            })
            .await
            .unwrap()
    }

    fn account(username: &str, email: &str) -> AccountUpdate {
        AccountUpdate {
            username: username.to_string(),
            email: email.to_string(),
            first_name: "Kim".to_string(),
            last_name: "Lee".to_string(),
        }
    }

    fn profile(bio: &str, notifications: bool) -> ProfileUpdate {
        ProfileUpdate {
            bio: bio.to_string(),
            phone: "+33 6 12 34 56 78".to_string(),
            date_of_birth: None,
            email_notifications: notifications,
        }
    }

    fn service(store: Arc<MemoryStore>, emails: Arc<RecordingEmailProvider>) -> ProfileService {
        let notifier = Arc::new(NotificationService::new(emails, &Config::default()));
        ProfileService::new(store, notifier)
    }

    #[tokio::test]
    async fn update_persists_and_notifies() {
        let store = Arc::new(MemoryStore::new());
        let emails = Arc::new(RecordingEmailProvider::default());
        let user = create(&store, "kim").await;
        let service = service(store.clone(), emails.clone());

        let view = service
            .update(&user, account("kim", "kim.lee@example.com"), profile("Hello", true))
            .await
            .unwrap();

        assert_eq!(view.user.email, "kim.lee@example.com");
        assert_eq!(view.user.first_name, "Kim");
        assert_eq!(view.profile.bio, "Hello");
        assert_eq!(view.prediction_count, 0);
        let sent = emails.with_subject("Profile Updated - SkinCare AI");
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].to, "kim.lee@example.com");
    }

    #[tokio::test]
    async fn opting_out_suppresses_notification() {
        let store = Arc::new(MemoryStore::new());
        let emails = Arc::new(RecordingEmailProvider::default());
        let user = create(&store, "lou").await;
        let service = service(store, emails.clone());

        service
            .update(&user, account("lou", "lou@example.com"), profile("", false))
            .await
            .unwrap();
        assert!(emails.sent().is_empty());
    }

    #[tokio::test]
    async fn taken_username_conflicts() {
        let store = Arc::new(MemoryStore::new());
        let emails = Arc::new(RecordingEmailProvider::default());
        create(&store, "max").await;
        let user = create(&store, "ned").await;
        let service = service(store, emails);

        assert!(matches!(
            service
                .update(&user, account("max", "ned@example.com"), profile("", true))
                .await,
            Err(AppError::Conflict(_))
        ));
    }

    #[tokio::test]
    async fn long_bio_is_rejected() {
        let store = Arc::new(MemoryStore::new());
        let emails = Arc::new(RecordingEmailProvider::default());
        let user = create(&store, "oli").await;
        let service = service(store, emails);

        let bio = "a".repeat(MAX_BIO_LENGTH + 1);
        assert!(matches!(
            service
                .update(&user, account("oli", "oli@example.com"), profile(&bio, true))
                .await,
            Err(AppError::BadRequest(_))
        ));
    }
}
