//! # Analysis Routes
//!
//! Téléversement d'une image de peau et analyse par les modèles.
//!
//! ## Workflow
//! 1. Lecture du formulaire multipart (`image`, `model_preference`)
//! 2. Validation de la taille et du type réel du fichier
//! 3. Enregistrement de l'image et création de la prédiction
//! 4. Inférence selon la préférence (avec repli en mode `auto`)
//! 5. Retour de la prédiction et du résultat éducatif

use actix_multipart::{Field, Multipart};
use actix_web::{post, web, HttpResponse};
use futures_util::TryStreamExt;
use tracing::info;

use crate::api::routes::middleware::CurrentUser;
use crate::api::state::AppState;
use crate::domain::ModelPreference;
use crate::infrastructure::error::{AppError, AppResult};
use crate::utils::helpers::sanitize_filename;

/// Contenu utile du formulaire d'analyse
#[derive(Debug)]
pub struct AnalysisForm {
    pub image: Vec<u8>,
    /// Nom fourni par le client, nettoyé (journalisation uniquement)
    pub filename: Option<String>,
    pub model_preference: ModelPreference,
}

#[post("/analyze")]
pub async fn analyze(
    user: CurrentUser,
    payload: Multipart,
    state: web::Data<AppState>,
) -> AppResult<HttpResponse> {
    let form = read_analysis_form(payload, state.config.max_upload_bytes()).await?;
    info!(
        user_id = %user.id,
        preference = form.model_preference.as_str(),
        filename = form.filename.as_deref().unwrap_or("-"),
        "📁 Image reçue ({} octets)",
        form.image.len()
    );

    let report = state
        .analysis
        .analyze(&user, form.image, form.model_preference)
        .await?;

    Ok(HttpResponse::Created().json(report))
}

/// Lit les champs `image` (obligatoire) et `model_preference` (optionnel)
pub async fn read_analysis_form(mut payload: Multipart, max_bytes: usize) -> AppResult<AnalysisForm> {
    let mut image: Option<Vec<u8>> = None;
    let mut filename: Option<String> = None;
    let mut preference = ModelPreference::Auto;

    while let Some(field) = payload.try_next().await? {
        let disposition = field.content_disposition();
        let name = disposition
            .and_then(|cd| cd.get_name())
            .unwrap_or_default()
            .to_string();
        let client_filename = disposition.and_then(|cd| cd.get_filename()).map(sanitize_filename);

        match name.as_str() {
            "image" => {
                filename = client_filename;
                image = Some(read_field(field, max_bytes).await?);
            }
            "model_preference" => {
                let raw = read_field(field, max_bytes).await?;
                let value = String::from_utf8_lossy(&raw);
                preference = value.parse().map_err(AppError::BadRequest)?;
            }
            _ => {
                // Champ inconnu: consommé et ignoré
                read_field(field, max_bytes).await?;
            }
        }
    }

    let image = image
        .filter(|bytes| !bytes.is_empty())
        .ok_or_else(|| AppError::BadRequest("Please select an image to upload.".to_string()))?;

    Ok(AnalysisForm {
        image,
        filename,
        model_preference: preference,
    })
}

async fn read_field(mut field: Field, max_bytes: usize) -> AppResult<Vec<u8>> {
    let mut buffer = Vec::new();
    while let Some(chunk) = field.try_next().await? {
        if buffer.len() + chunk.len() > max_bytes {
            return Err(AppError::PayloadTooLarge(format!(
                "File too large. Maximum size: {} MB",
                max_bytes / (1024 * 1024)
            )));
        }
        buffer.extend_from_slice(&chunk);
    }
    Ok(buffer)
}
