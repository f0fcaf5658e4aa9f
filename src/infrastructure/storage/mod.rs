//! Stockage local des images téléversées sous `MEDIA_ROOT`.
//!
//! Les fichiers sont nommés `images/<uuid>.<ext>`, l'extension venant de la
//! détection magique du contenu (jamais du nom fourni par le client). Le
//! répertoire est servi en lecture seule sous `/media`.

use infer::Infer;
use std::path::PathBuf;
use tracing::info;
use uuid::Uuid;

use crate::infrastructure::error::{AppError, AppResult};

pub const IMAGES_DIR: &str = "images";
pub const MEDIA_URL_PREFIX: &str = "/media";

/// Image enregistrée sur le disque
#[derive(Debug, Clone)]
pub struct StoredImage {
    /// Chemin relatif à la racine média, toujours avec des `/`
    pub relative_path: String,
    pub mime_type: &'static str,
    pub size_bytes: usize,
}

/// Service de stockage des médias
#[derive(Debug, Clone)]
pub struct MediaStorage {
    root: PathBuf,
}

impl MediaStorage {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Crée l'arborescence si nécessaire
    pub async fn init(&self) -> AppResult<()> {
        tokio::fs::create_dir_all(self.root.join(IMAGES_DIR)).await?;
        info!("✅ Stockage média: {:?}", self.root);
        Ok(())
    }

    /// Valide le contenu (image reconnue) et l'écrit sous un nom unique
    pub async fn save_image(&self, content: &[u8]) -> AppResult<StoredImage> {
        let (mime_type, extension) = detect_image(content)?;

        let file_name = format!("{}.{}", Uuid::new_v4(), extension);
        let relative_path = format!("{}/{}", IMAGES_DIR, file_name);
        let directory = self.root.join(IMAGES_DIR);
        tokio::fs::create_dir_all(&directory).await?;
        tokio::fs::write(directory.join(&file_name), content).await?;

        Ok(StoredImage {
            relative_path,
            mime_type,
            size_bytes: content.len(),
        })
    }

}

/// URL publique d'un média
pub fn media_url(relative_path: &str) -> String {
    format!("{}/{}", MEDIA_URL_PREFIX, relative_path.trim_start_matches('/'))
}

/// Détection magique: seuls les types `image/*` sont acceptés
pub fn detect_image(content: &[u8]) -> AppResult<(&'static str, &'static str)> {
    if content.is_empty() {
        return Err(AppError::BadRequest("Please select an image to upload.".to_string()));
    }

    let detected = Infer::new().get(content).ok_or_else(|| {
        AppError::UnsupportedMediaType(
            "Unrecognized file type. Please upload an image (JPEG, PNG, ...).".to_string(),
        )
    })?;

    if !detected.mime_type().starts_with("image/") {
        return Err(AppError::UnsupportedMediaType(format!(
            "Unsupported file type: {}. Please upload an image.",
            detected.mime_type()
        )));
    }
    Ok((detected.mime_type(), detected.extension()))
}

#[cfg(test)]
mod tests {
    use super::*;

    const PNG_HEADER: [u8; 16] = [
        0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A, 0x00, 0x00, 0x00, 0x0D, 0x49, 0x48, 0x44, 0x52,
    ];

    #[test]
    fn png_is_detected() {
        assert_eq!(detect_image(&PNG_HEADER).unwrap(), ("image/png", "png"));
    }

    #[test]
    fn non_images_are_rejected() {
        assert!(matches!(
            detect_image(b"%PDF-1.7\n..."),
            Err(AppError::UnsupportedMediaType(_))
        ));
        assert!(matches!(detect_image(b""), Err(AppError::BadRequest(_))));
        assert!(matches!(
            detect_image(b"just some text"),
            Err(AppError::UnsupportedMediaType(_))
        ));
    }

    #[tokio::test]
    async fn saves_under_images_with_detected_extension() {
        let dir = tempfile::tempdir().unwrap();
        let storage = MediaStorage::new(dir.path());
        storage.init().await.unwrap();

        let stored = storage.save_image(&PNG_HEADER).await.unwrap();
        assert!(stored.relative_path.starts_with("images/"));
        assert!(stored.relative_path.ends_with(".png"));
        assert_eq!(stored.mime_type, "image/png");
        assert_eq!(stored.size_bytes, PNG_HEADER.len());
        let written = tokio::fs::read(dir.path().join(&stored.relative_path)).await.unwrap();
        assert_eq!(written, PNG_HEADER);
        assert_eq!(
            media_url(&stored.relative_path),
            format!("/media/{}", stored.relative_path)
        );
    }
}
