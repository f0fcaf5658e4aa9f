// core/analysis_service.rs
use chrono::{DateTime, Duration, NaiveDate, Utc};
use serde::Serialize;
use std::sync::Arc;
use tracing::{info, warn};

use crate::core::inference::{
    classify_with_policy, preprocess, ModelLoader, SelectionOutcome, SelectionPolicy,
};
use crate::core::notification_service::NotificationService;
use crate::core::result_formatter::{format_result, EducationalResult};
use crate::domain::prediction::ERROR_LABEL;
use crate::domain::{ModelPreference, NewPrediction, Prediction, PredictionOutcome, User};
use crate::infrastructure::database::Store;
use crate::infrastructure::error::{not_found, AppResult};
use crate::infrastructure::storage::{media_url, MediaStorage};
use crate::utils::helpers::format_display_date;

pub const IN_PROGRESS_LABEL: &str = "Analysis in progress";

/// Résultat d'une analyse, tel qu'affiché sur la page de résultat
#[derive(Debug, Clone, Serialize)]
pub struct AnalysisReport {
    pub prediction: Prediction,
    pub image_url: String,
    pub model_preference_display: &'static str,
    pub result: EducationalResult,
}

/// Ligne d'historique ou de comparaison
#[derive(Debug, Clone, Serialize)]
pub struct PredictionSummary {
    pub id: i64,
    pub label: String,
    pub date: String,
    pub image_url: String,
    pub model_used: Option<String>,
    pub confidence_score: Option<f64>,
    pub created_at: DateTime<Utc>,
}

impl From<&Prediction> for PredictionSummary {
    fn from(prediction: &Prediction) -> Self {
        let label = if prediction.is_pending() {
            IN_PROGRESS_LABEL.to_string()
        } else {
            prediction.label.clone()
        };
        Self {
            id: prediction.id,
            label,
            date: format_display_date(&prediction.created_at),
            image_url: media_url(&prediction.image_path),
            model_used: prediction.model_used.clone(),
            confidence_score: prediction.confidence_score,
            created_at: prediction.created_at,
        }
    }
}

/// Tableau de bord: total et activité des 7 derniers jours (du plus ancien au plus récent)
#[derive(Debug, Clone, Serialize)]
pub struct ActivityOverview {
    pub prediction_count: i64,
    pub recent_activity: Vec<usize>,
}

/// Analyse d'images et consultation des résultats
pub struct AnalysisService {
    store: Arc<dyn Store>,
    models: Arc<dyn ModelLoader>,
    storage: Arc<MediaStorage>,
    notifier: Arc<NotificationService>,
    confidence_threshold: f64,
}

impl AnalysisService {
    pub fn new(
        store: Arc<dyn Store>,
        models: Arc<dyn ModelLoader>,
        storage: Arc<MediaStorage>,
        notifier: Arc<NotificationService>,
        confidence_threshold: f64,
    ) -> Self {
        Self {
            store,
            models,
            storage,
            notifier,
            confidence_threshold,
        }
    }

    /// Enregistre l'image, crée la prédiction puis y rattache le résultat du modèle.
    /// Un échec d'inférence ne fait jamais échouer la requête: il produit le libellé `error`.
    pub async fn analyze(
        &self,
        user: &User,
        image: Vec<u8>,
        preference: ModelPreference,
    ) -> AppResult<AnalysisReport> {
        let stored = self.storage.save_image(&image).await?;
        info!(
            user_id = %user.id,
            mime_type = stored.mime_type,
            size_bytes = stored.size_bytes,
            "💾 Image enregistrée: {}",
            stored.relative_path
        );
        let prediction = self
            .store
            .create_prediction(NewPrediction {
                user_id: user.id,
                image_path: stored.relative_path,
                model_preference: preference,
            })
            .await?;

        let policy = SelectionPolicy::from_preference(preference, self.confidence_threshold);
        let models = Arc::clone(&self.models);
        // L'inférence est bloquante: elle quitte le worker actix
        let selection = tokio::task::spawn_blocking(move || match preprocess::decode_image(&image) {
            Ok(decoded) => classify_with_policy(models.as_ref(), policy, &decoded),
            Err(error) => SelectionOutcome::Failed {
                model: policy.first_model(),
                error,
            },
        })
        .await?;

        let outcome = outcome_from(selection);
        let prediction = self.store.attach_outcome(prediction.id, outcome).await?;
        info!(
            user_id = %user.id,
            prediction_id = prediction.id,
            model = prediction.model_used.as_deref().unwrap_or("-"),
            "🔬 Analyse terminée: {}",
            prediction.label
        );

        if !prediction.is_error() {
            self.notify_first_analysis(user, &prediction).await?;
        }

        Ok(self.report(prediction))
    }

    /// Résultat d'une analyse appartenant à l'utilisateur
    pub async fn get_report(&self, user: &User, prediction_id: i64) -> AppResult<AnalysisReport> {
        let prediction = self
            .store
            .find_prediction(user.id, prediction_id)
            .await?
            .ok_or_else(|| not_found("Analysis not found."))?;
        Ok(self.report(prediction))
    }

    /// Historique, plus récent d'abord
    pub async fn history(&self, user: &User) -> AppResult<Vec<PredictionSummary>> {
        let predictions = self.store.list_predictions(user.id, None).await?;
        Ok(predictions.iter().map(PredictionSummary::from).collect())
    }

    /// Comparaison: seules les analyses de l'utilisateur sont retournées
    pub async fn compare(&self, user: &User, ids: &[i64]) -> AppResult<Vec<PredictionSummary>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let mut predictions = self.store.find_predictions_by_ids(user.id, ids).await?;
        predictions.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        Ok(predictions.iter().map(PredictionSummary::from).collect())
    }

    pub async fn overview(&self, user: &User) -> AppResult<ActivityOverview> {
        let prediction_count = self.store.count_predictions(user.id).await?;
        let predictions = self.store.list_predictions(user.id, None).await?;
        Ok(ActivityOverview {
            prediction_count,
            recent_activity: daily_activity(&predictions, Utc::now().date_naive(), 7),
        })
    }

    fn report(&self, prediction: Prediction) -> AnalysisReport {
        let result = format_result(
            &prediction.label,
            prediction.confidence_score,
            prediction.model_used.as_deref(),
        );
        AnalysisReport {
            image_url: media_url(&prediction.image_path),
            model_preference_display: prediction.model_preference.display_name(),
            result,
            prediction,
        }
    }

    /// L'email "première analyse" part au plus une fois par utilisateur
    async fn notify_first_analysis(&self, user: &User, prediction: &Prediction) -> AppResult<()> {
        let profile = self.store.get_or_create_profile(user.id).await?;
        if profile.first_analysis_email_sent || !self.notifier.wants_activity_emails(&profile) {
            return Ok(());
        }
        if !self.store.claim_first_analysis_email(user.id).await? {
            return Ok(());
        }
        if !self.notifier.send_first_analysis(user, prediction).await {
            warn!(user_id = %user.id, "⚠️ Email de première analyse non envoyé");
        }
        Ok(())
    }
}

fn outcome_from(selection: SelectionOutcome) -> PredictionOutcome {
    match selection {
        SelectionOutcome::Classified(classification) => PredictionOutcome {
            label: classification.label,
            model_used: Some(classification.model.as_str().to_string()),
            confidence_score: Some(classification.confidence),
        },
        SelectionOutcome::Failed { model, .. } => PredictionOutcome {
            label: ERROR_LABEL.to_string(),
            model_used: Some(model.as_str().to_string()),
            confidence_score: None,
        },
    }
}

/// Nombre d'analyses par jour sur `days` jours se terminant à `today`
fn daily_activity(predictions: &[Prediction], today: NaiveDate, days: i64) -> Vec<usize> {
    (0..days)
        .rev()
        .map(|offset| {
            let day = today - Duration::days(offset);
            predictions
                .iter()
                .filter(|p| p.created_at.date_naive() == day)
                .count()
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::inference::testing::{Behaviour, FakeLoader};
    use crate::core::notification_service::testing::RecordingEmailProvider;
    use crate::domain::{ModelId, NewUser, ProfileUpdate};
    use crate::infrastructure::database::{
        MemoryStore, PredictionRepository, UserRepository,
    };
    use crate::infrastructure::error::AppError;
    use crate::utils::config::Config;
    use image::{DynamicImage, ImageOutputFormat, RgbImage};
    use std::io::Cursor;

    const FIRST_ANALYSIS_SUBJECT: &str = "Your First Skin Analysis - SkinCare AI";

    fn png_bytes() -> Vec<u8> {
        let img = DynamicImage::ImageRgb8(RgbImage::from_pixel(32, 32, image::Rgb([180, 120, 90])));
        let mut bytes = Cursor::new(Vec::new());
        img.write_to(&mut bytes, ImageOutputFormat::Png).unwrap();
        bytes.into_inner()
    }

    struct Harness {
        _media: tempfile::TempDir,
        store: Arc<MemoryStore>,
        emails: Arc<RecordingEmailProvider>,
        loader: Arc<FakeLoader>,
        service: AnalysisService,
        user: User,
    }

    async fn harness(primary: Behaviour, secondary: Behaviour) -> Harness {
        let media = tempfile::tempdir().unwrap();
        let config = Config::default();
        let store = Arc::new(MemoryStore::new());
        let emails = Arc::new(RecordingEmailProvider::default());
        let loader = Arc::new(FakeLoader::new(primary, secondary));
        let notifier = Arc::new(NotificationService::new(emails.clone(), &config));
        let service = AnalysisService::new(
            store.clone(),
            loader.clone(),
            Arc::new(MediaStorage::new(media.path())),
            notifier,
            config.confidence_threshold,
        );
        let user = store
            .create_user(NewUser {
                username: "judy".to_string(),
                email: "judy@example.com".to_string(),
                password_hash: "x".to_string(),
            })
            .await
            .unwrap();
        Harness {
            _media: media,
            store,
            emails,
            loader,
            service,
            user,
        }
    }

    #[tokio::test]
    async fn confident_primary_result_is_stored() {
        let h = harness(
            Behaviour::Returns { class_index: 4, confidence: 0.9 },
            Behaviour::Returns { class_index: 7, confidence: 0.99 },
        )
        .await;

        let report = h
            .service
            .analyze(&h.user, png_bytes(), ModelPreference::Auto)
            .await
            .unwrap();

        assert_eq!(report.prediction.label, "Melanoma");
        assert_eq!(report.prediction.model_used.as_deref(), Some("efficientnet"));
        assert_eq!(report.prediction.confidence_score, Some(0.9));
        assert_eq!(report.result.risk_color, "#ef4444");
        assert!(report.image_url.starts_with("/media/images/"));
        assert_eq!(h.loader.loads(ModelId::Cnn), 0);

        let stored = h
            .store
            .find_prediction(h.user.id, report.prediction.id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(stored.label, "Melanoma");
    }

    #[tokio::test]
    async fn forced_model_failure_stores_error_label() {
        let h = harness(
            Behaviour::Returns { class_index: 0, confidence: 0.99 },
            Behaviour::FailsToLoad,
        )
        .await;

        let report = h
            .service
            .analyze(&h.user, png_bytes(), ModelPreference::Cnn)
            .await
            .unwrap();

        assert_eq!(report.prediction.label, "error");
        assert_eq!(report.prediction.model_used.as_deref(), Some("cnn"));
        assert_eq!(report.prediction.confidence_score, None);
        assert_eq!(report.result.pattern_classification, "Image Quality Assessment");
        assert!(h.emails.with_subject(FIRST_ANALYSIS_SUBJECT).is_empty());
    }

    #[tokio::test]
    async fn undecodable_image_is_an_error_result() {
        let h = harness(
            Behaviour::Returns { class_index: 0, confidence: 0.99 },
            Behaviour::Returns { class_index: 0, confidence: 0.99 },
        )
        .await;
        // En-tête PNG valide, contenu tronqué
        let truncated = png_bytes()[..24].to_vec();

        let report = h
            .service
            .analyze(&h.user, truncated, ModelPreference::Auto)
            .await
            .unwrap();
        assert_eq!(report.prediction.label, "error");
        assert_eq!(report.prediction.model_used.as_deref(), Some("efficientnet"));
        assert_eq!(h.loader.loads(ModelId::Efficientnet), 0);
    }

    #[tokio::test]
    async fn non_image_upload_is_rejected_before_storage() {
        let h = harness(Behaviour::FailsToLoad, Behaviour::FailsToLoad).await;
        let result = h
            .service
            .analyze(&h.user, b"not an image".to_vec(), ModelPreference::Auto)
            .await;
        assert!(matches!(result, Err(AppError::UnsupportedMediaType(_))));
        assert_eq!(h.store.count_predictions(h.user.id).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn first_analysis_email_is_sent_exactly_once() {
        let h = harness(
            Behaviour::Returns { class_index: 5, confidence: 0.8 },
            Behaviour::FailsToLoad,
        )
        .await;

        for _ in 0..3 {
            h.service
                .analyze(&h.user, png_bytes(), ModelPreference::Auto)
                .await
                .unwrap();
        }

        assert_eq!(h.emails.with_subject(FIRST_ANALYSIS_SUBJECT).len(), 1);
        let profile = h.store.get_or_create_profile(h.user.id).await.unwrap();
        assert!(profile.first_analysis_email_sent);
    }

    #[tokio::test]
    async fn opted_out_user_does_not_burn_the_first_analysis_flag() {
        let h = harness(
            Behaviour::Returns { class_index: 5, confidence: 0.8 },
            Behaviour::FailsToLoad,
        )
        .await;
        h.store
            .update_profile(
                h.user.id,
                ProfileUpdate {
                    bio: String::new(),
                    phone: String::new(),
                    date_of_birth: None,
                    email_notifications: false,
                },
            )
            .await
            .unwrap();

        h.service
            .analyze(&h.user, png_bytes(), ModelPreference::Auto)
            .await
            .unwrap();

        let profile = h.store.get_or_create_profile(h.user.id).await.unwrap();
        assert!(!profile.first_analysis_email_sent);
        assert!(h.emails.with_subject(FIRST_ANALYSIS_SUBJECT).is_empty());
    }

    #[tokio::test]
    async fn compare_only_returns_own_predictions() {
        let h = harness(
            Behaviour::Returns { class_index: 5, confidence: 0.8 },
            Behaviour::FailsToLoad,
        )
        .await;
        let mine = h
            .service
            .analyze(&h.user, png_bytes(), ModelPreference::Auto)
            .await
            .unwrap();

        let stranger = h
            .store
            .create_user(NewUser {
                username: "mallory".to_string(),
                email: "mallory@example.com".to_string(),
                password_hash: "x".to_string(),
            })
            .await
            .unwrap();
        let theirs = h
            .store
            .create_prediction(NewPrediction {
                user_id: stranger.id,
                image_path: "images/x.png".to_string(),
                model_preference: ModelPreference::Auto,
            })
            .await
            .unwrap();

        let summaries = h
            .service
            .compare(&h.user, &[mine.prediction.id, theirs.id])
            .await
            .unwrap();
        assert_eq!(summaries.len(), 1);
        assert_eq!(summaries[0].id, mine.prediction.id);

        // La prédiction en attente de l'autre utilisateur s'affiche "en cours"
        let pending = h.service.compare(&stranger, &[theirs.id]).await.unwrap();
        assert_eq!(pending[0].label, IN_PROGRESS_LABEL);

        assert!(matches!(
            h.service.get_report(&h.user, theirs.id).await,
            Err(AppError::NotFound(_))
        ));
    }

    #[test]
    fn daily_activity_counts_last_days() {
        let today = Utc::now();
        let make = |days_ago: i64| Prediction {
            id: days_ago,
            user_id: uuid::Uuid::nil(),
            image_path: String::new(),
            label: "Melanoma".to_string(),
            model_preference: ModelPreference::Auto,
            model_used: None,
            confidence_score: None,
            created_at: today - Duration::days(days_ago),
        };
        let predictions = vec![make(0), make(0), make(2), make(10)];
        assert_eq!(
            daily_activity(&predictions, today.date_naive(), 7),
            vec![0, 0, 0, 0, 1, 0, 2]
        );
    }
}
