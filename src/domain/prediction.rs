use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Libellé d'une prédiction dont le résultat n'est pas encore rattaché
pub const PENDING_LABEL: &str = "data";
/// Libellé stocké quand aucun modèle n'a pu classifier l'image
pub const ERROR_LABEL: &str = "error";

/// Identifiant d'un modèle de classification
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ModelId {
    /// EfficientNetB0, 224x224, 8 classes dont le carcinome épidermoïde
    Efficientnet,
    /// CNN compact, 48x48, 8 classes dont `not_skin_cancer`
    Cnn,
}

impl ModelId {
    pub fn as_str(&self) -> &'static str {
        match self {
            ModelId::Efficientnet => "efficientnet",
            ModelId::Cnn => "cnn",
        }
    }
}

impl fmt::Display for ModelId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Préférence de modèle choisie par l'utilisateur au moment de l'envoi
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ModelPreference {
    #[default]
    Auto,
    Efficientnet,
    Cnn,
}

impl ModelPreference {
    pub fn as_str(&self) -> &'static str {
        match self {
            ModelPreference::Auto => "auto",
            ModelPreference::Efficientnet => "efficientnet",
            ModelPreference::Cnn => "cnn",
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            ModelPreference::Auto => "Auto (Best Available)",
            ModelPreference::Efficientnet => "EfficientNetB0 (High Accuracy)",
            ModelPreference::Cnn => "Custom CNN (Fast)",
        }
    }

    /// Modèle imposé, `None` pour la sélection automatique
    pub fn forced_model(&self) -> Option<ModelId> {
        match self {
            ModelPreference::Auto => None,
            ModelPreference::Efficientnet => Some(ModelId::Efficientnet),
            ModelPreference::Cnn => Some(ModelId::Cnn),
        }
    }
}

impl FromStr for ModelPreference {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "" | "auto" => Ok(ModelPreference::Auto),
            "efficientnet" => Ok(ModelPreference::Efficientnet),
            "cnn" => Ok(ModelPreference::Cnn),
            other => Err(format!(
                "Unknown model preference '{}'. Expected one of: auto, efficientnet, cnn.",
                other
            )),
        }
    }
}

/// Une analyse soumise par un utilisateur
#[derive(Debug, Clone, Serialize)]
pub struct Prediction {
    pub id: i64,
    pub user_id: Uuid,
    /// Chemin relatif à la racine des médias
    pub image_path: String,
    pub label: String,
    pub model_preference: ModelPreference,
    pub model_used: Option<String>,
    pub confidence_score: Option<f64>,
    pub created_at: DateTime<Utc>,
}

impl Prediction {
    pub fn is_pending(&self) -> bool {
        self.label == PENDING_LABEL
    }

    pub fn is_error(&self) -> bool {
        self.label == ERROR_LABEL
    }
}

#[derive(Debug, Clone)]
pub struct NewPrediction {
    pub user_id: Uuid,
    pub image_path: String,
    pub model_preference: ModelPreference,
}

/// Résultat d'inférence rattaché à une prédiction existante
#[derive(Debug, Clone, PartialEq)]
pub struct PredictionOutcome {
    pub label: String,
    pub model_used: Option<String>,
    pub confidence_score: Option<f64>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn preference_parsing() {
        assert_eq!("".parse::<ModelPreference>(), Ok(ModelPreference::Auto));
        assert_eq!(" CNN ".parse::<ModelPreference>(), Ok(ModelPreference::Cnn));
        assert_eq!(
            "efficientnet".parse::<ModelPreference>(),
            Ok(ModelPreference::Efficientnet)
        );
        assert!("resnet".parse::<ModelPreference>().is_err());
    }

    #[test]
    fn forced_model_for_specific_preference() {
        assert_eq!(ModelPreference::Auto.forced_model(), None);
        assert_eq!(ModelPreference::Cnn.forced_model(), Some(ModelId::Cnn));
    }

    #[test]
    fn serde_uses_lowercase_ids() {
        assert_eq!(
            serde_json::to_value(ModelId::Efficientnet).unwrap(),
            serde_json::json!("efficientnet")
        );
        assert_eq!(
            serde_json::from_value::<ModelPreference>(serde_json::json!("auto")).unwrap(),
            ModelPreference::Auto
        );
    }
}
