//! # Inférence
//!
//! Deux classifieurs pré-entraînés chargés paresseusement depuis le disque:
//! - `efficientnet` (primaire): EfficientNetB0, 224x224, 8 classes dont SCC
//! - `cnn` (secondaire): CNN compact, 48x48, 8 classes dont `not_skin_cancer`
//!
//! ## Politique de sélection
//! - `Forced(model)`: seul ce modèle est chargé et exécuté, sans repli.
//! - `Auto { threshold }`: le primaire est essayé d'abord. Son résultat est
//!   accepté si la confiance atteint le seuil. Sinon, ou s'il échoue au
//!   chargement ou à l'inférence, le secondaire est exécuté et son résultat
//!   accepté sans condition.
//!
//! Un échec sans repli possible produit `SelectionOutcome::Failed`, stocké avec
//! le libellé `"error"`.

pub mod onnx;
pub mod preprocess;

use image::DynamicImage;
use ort::Environment;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use tracing::{debug, info, warn};

use crate::domain::{ModelId, ModelPreference};
use crate::utils::config::Config;

pub const PRIMARY_CLASSES: [&str; 8] = [
    "Actinic keratoses",
    "Basal cell carcinoma",
    "Benign keratosis like lesions",
    "Dermatofibroma",
    "Melanoma",
    "Melanocytic nevi",
    "Squamous cell carcinoma",
    "Vascular lesions",
];

pub const SECONDARY_CLASSES: [&str; 8] = [
    "Actinic keratoses",
    "Basal cell carcinoma",
    "Benign keratosis like lesions",
    "Dermatofibroma",
    "Melanoma",
    "Melanocytic nevi",
    "Vascular lesions",
    "not_skin_cancer",
];

#[derive(Debug, thiserror::Error)]
pub enum InferenceError {
    #[error("model file not found: {0:?}")]
    ModelMissing(PathBuf),
    #[error("failed to load model: {0}")]
    Load(String),
    #[error("failed to decode image: {0}")]
    Decode(String),
    #[error("inference failed: {0}")]
    Inference(String),
    #[error("model produced no output")]
    EmptyOutput,
    #[error("model produced {got} scores, expected {expected}")]
    ClassCountMismatch { expected: usize, got: usize },
}

/// Description statique d'un modèle
#[derive(Debug, Clone)]
pub struct ModelSpec {
    pub id: ModelId,
    pub path: PathBuf,
    /// Côté de l'entrée carrée attendue
    pub input_size: u32,
    /// Diviseur appliqué aux pixels [0, 255]
    pub pixel_scale: f32,
    pub classes: Vec<String>,
}

impl ModelSpec {
    pub fn primary(config: &Config) -> Self {
        Self {
            id: ModelId::Efficientnet,
            path: config.primary_model_path(),
            input_size: config.primary_input_size,
            pixel_scale: config.primary_pixel_scale,
            classes: PRIMARY_CLASSES.iter().map(|c| c.to_string()).collect(),
        }
    }

    pub fn secondary(config: &Config) -> Self {
        Self {
            id: ModelId::Cnn,
            path: config.secondary_model_path(),
            input_size: config.secondary_input_size,
            pixel_scale: config.secondary_pixel_scale,
            classes: SECONDARY_CLASSES.iter().map(|c| c.to_string()).collect(),
        }
    }

    /// Transforme les scores bruts du modèle en classe + confiance
    pub fn classification_from(&self, probabilities: &[f32]) -> Result<Classification, InferenceError> {
        if probabilities.len() != self.classes.len() {
            return Err(InferenceError::ClassCountMismatch {
                expected: self.classes.len(),
                got: probabilities.len(),
            });
        }
        let (index, confidence) =
            preprocess::top_class(probabilities).ok_or(InferenceError::EmptyOutput)?;

        Ok(Classification {
            model: self.id,
            class_index: index,
            label: self.classes[index].clone(),
            confidence: f64::from(confidence),
        })
    }
}

/// Classe retenue par un modèle
#[derive(Debug, Clone, PartialEq)]
pub struct Classification {
    pub model: ModelId,
    pub class_index: usize,
    pub label: String,
    pub confidence: f64,
}

pub trait Classifier: Send + Sync {
    fn spec(&self) -> &ModelSpec;
    fn classify(&self, image: &DynamicImage) -> Result<Classification, InferenceError>;
}

/// Fournit un classifieur prêt à l'emploi pour un identifiant de modèle
pub trait ModelLoader: Send + Sync {
    fn load(&self, model: ModelId) -> Result<Arc<dyn Classifier>, InferenceError>;
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SelectionPolicy {
    Forced(ModelId),
    Auto { threshold: f64 },
}

impl SelectionPolicy {
    pub const PRIMARY: ModelId = ModelId::Efficientnet;
    pub const SECONDARY: ModelId = ModelId::Cnn;

    pub fn from_preference(preference: ModelPreference, threshold: f64) -> Self {
        match preference.forced_model() {
            Some(model) => SelectionPolicy::Forced(model),
            None => SelectionPolicy::Auto { threshold },
        }
    }

    /// Premier modèle tenté par la politique
    pub fn first_model(&self) -> ModelId {
        match self {
            SelectionPolicy::Forced(model) => *model,
            SelectionPolicy::Auto { .. } => Self::PRIMARY,
        }
    }
}

#[derive(Debug)]
pub enum SelectionOutcome {
    Classified(Classification),
    Failed { model: ModelId, error: InferenceError },
}

fn run_model(
    loader: &dyn ModelLoader,
    model: ModelId,
    image: &DynamicImage,
) -> Result<Classification, InferenceError> {
    let classifier = loader.load(model)?;
    let spec = classifier.spec();
    debug!(
        model = %spec.id,
        input_size = spec.input_size,
        classes = spec.classes.len(),
        "Inférence"
    );
    classifier.classify(image)
}

/// Applique la politique de sélection à une image décodée
pub fn classify_with_policy(
    loader: &dyn ModelLoader,
    policy: SelectionPolicy,
    image: &DynamicImage,
) -> SelectionOutcome {
    match policy {
        SelectionPolicy::Forced(model) => match run_model(loader, model, image) {
            Ok(classification) => SelectionOutcome::Classified(classification),
            Err(error) => {
                warn!(model = %model, "⚠️ Modèle imposé indisponible: {}", error);
                SelectionOutcome::Failed { model, error }
            }
        },
        SelectionPolicy::Auto { threshold } => {
            match run_model(loader, SelectionPolicy::PRIMARY, image) {
                Ok(classification) if classification.confidence >= threshold => {
                    debug!(
                        confidence = classification.confidence,
                        "Résultat du modèle primaire accepté"
                    );
                    return SelectionOutcome::Classified(classification);
                }
                Ok(classification) => debug!(
                    confidence = classification.confidence,
                    threshold, "Confiance insuffisante, repli sur le modèle secondaire"
                ),
                Err(error) => warn!("⚠️ Modèle primaire en échec, repli: {}", error),
            }

            match run_model(loader, SelectionPolicy::SECONDARY, image) {
                Ok(classification) => SelectionOutcome::Classified(classification),
                Err(error) => {
                    warn!("❌ Modèle secondaire en échec: {}", error);
                    SelectionOutcome::Failed {
                        model: SelectionPolicy::SECONDARY,
                        error,
                    }
                }
            }
        }
    }
}

/// Registre des modèles ONNX, chargés à la première utilisation.
/// Seuls les chargements réussis sont mis en cache.
pub struct ModelRegistry {
    environment: Option<Arc<Environment>>,
    specs: HashMap<ModelId, ModelSpec>,
    cache: Mutex<HashMap<ModelId, Arc<dyn Classifier>>>,
}

impl ModelRegistry {
    pub fn new(config: &Config) -> Self {
        let environment = match Environment::builder().with_name("skincare-ai").build() {
            Ok(env) => {
                info!("✅ ONNX Runtime: prêt");
                Some(env.into_arc())
            }
            Err(e) => {
                warn!("⚠️  ONNX Runtime indisponible: {}", e);
                None
            }
        };

        let specs = [ModelSpec::primary(config), ModelSpec::secondary(config)]
            .into_iter()
            .map(|spec| (spec.id, spec))
            .collect();

        Self {
            environment,
            specs,
            cache: Mutex::new(HashMap::new()),
        }
    }

    /// Modèles dont le fichier est présent sur le disque
    pub fn available_models(&self) -> Vec<ModelId> {
        let mut available: Vec<ModelId> = self
            .specs
            .values()
            .filter(|spec| spec.path.exists())
            .map(|spec| spec.id)
            .collect();
        available.sort_by_key(|id| id.as_str());
        available
    }
}

impl ModelLoader for ModelRegistry {
    fn load(&self, model: ModelId) -> Result<Arc<dyn Classifier>, InferenceError> {
        if let Some(classifier) = self.cache.lock().ok().and_then(|cache| cache.get(&model).cloned()) {
            return Ok(classifier);
        }

        let spec = self
            .specs
            .get(&model)
            .cloned()
            .ok_or_else(|| InferenceError::Load(format!("unknown model {}", model)))?;
        let environment = self
            .environment
            .as_ref()
            .ok_or_else(|| InferenceError::Load("ONNX Runtime is not available".to_string()))?;

        let classifier: Arc<dyn Classifier> = Arc::new(onnx::OnnxClassifier::load(environment, spec)?);
        if let Ok(mut cache) = self.cache.lock() {
            cache.insert(model, Arc::clone(&classifier));
        }
        Ok(classifier)
    }
}

#[cfg(test)]
pub(crate) mod testing {
    //! Classifieurs factices pour les tests
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    pub struct FixedClassifier {
        spec: ModelSpec,
        class_index: usize,
        confidence: f64,
    }

    impl Classifier for FixedClassifier {
        fn spec(&self) -> &ModelSpec {
            &self.spec
        }

        fn classify(&self, _image: &DynamicImage) -> Result<Classification, InferenceError> {
            Ok(Classification {
                model: self.spec.id,
                class_index: self.class_index,
                label: self.spec.classes[self.class_index].clone(),
                confidence: self.confidence,
            })
        }
    }

    #[derive(Clone, Copy)]
    pub enum Behaviour {
        Returns { class_index: usize, confidence: f64 },
        FailsToLoad,
    }

    /// Chargeur configurable qui compte les chargements par modèle
    pub struct FakeLoader {
        pub primary: Behaviour,
        pub secondary: Behaviour,
        pub primary_loads: AtomicUsize,
        pub secondary_loads: AtomicUsize,
    }

    impl FakeLoader {
        pub fn new(primary: Behaviour, secondary: Behaviour) -> Self {
            Self {
                primary,
                secondary,
                primary_loads: AtomicUsize::new(0),
                secondary_loads: AtomicUsize::new(0),
            }
        }

        pub fn loads(&self, model: ModelId) -> usize {
            match model {
                ModelId::Efficientnet => self.primary_loads.load(Ordering::SeqCst),
                ModelId::Cnn => self.secondary_loads.load(Ordering::SeqCst),
            }
        }
    }

    impl ModelLoader for FakeLoader {
        fn load(&self, model: ModelId) -> Result<Arc<dyn Classifier>, InferenceError> {
            let config = Config::default();
            let (behaviour, spec) = match model {
                ModelId::Efficientnet => {
                    self.primary_loads.fetch_add(1, Ordering::SeqCst);
                    (self.primary, ModelSpec::primary(&config))
                }
                ModelId::Cnn => {
                    self.secondary_loads.fetch_add(1, Ordering::SeqCst);
                    (self.secondary, ModelSpec::secondary(&config))
                }
            };
            match behaviour {
                Behaviour::Returns { class_index, confidence } => Ok(Arc::new(FixedClassifier {
                    spec,
                    class_index,
                    confidence,
                })),
                Behaviour::FailsToLoad => Err(InferenceError::ModelMissing(spec.path)),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::testing::{Behaviour, FakeLoader};
    use super::*;
    use image::RgbImage;

    fn image() -> DynamicImage {
        DynamicImage::ImageRgb8(RgbImage::new(8, 8))
    }

    const AUTO: SelectionPolicy = SelectionPolicy::Auto { threshold: 0.5 };

    #[test]
    fn auto_accepts_confident_primary() {
        let loader = FakeLoader::new(
            Behaviour::Returns { class_index: 4, confidence: 0.9 },
            Behaviour::Returns { class_index: 7, confidence: 0.99 },
        );
        match classify_with_policy(&loader, AUTO, &image()) {
            SelectionOutcome::Classified(c) => {
                assert_eq!(c.model, ModelId::Efficientnet);
                assert_eq!(c.label, "Melanoma");
                assert_eq!(c.confidence, 0.9);
            }
            other => panic!("unexpected outcome: {:?}", other),
        }
        assert_eq!(loader.loads(ModelId::Cnn), 0);
    }

    #[test]
    fn auto_accepts_primary_at_exact_threshold() {
        let loader = FakeLoader::new(
            Behaviour::Returns { class_index: 0, confidence: 0.5 },
            Behaviour::Returns { class_index: 7, confidence: 0.99 },
        );
        let outcome = classify_with_policy(&loader, AUTO, &image());
        assert!(matches!(
            outcome,
            SelectionOutcome::Classified(Classification { model: ModelId::Efficientnet, .. })
        ));
    }

    #[test]
    fn auto_falls_back_on_low_confidence() {
        let loader = FakeLoader::new(
            Behaviour::Returns { class_index: 6, confidence: 0.49 },
            Behaviour::Returns { class_index: 7, confidence: 0.2 },
        );
        match classify_with_policy(&loader, AUTO, &image()) {
            SelectionOutcome::Classified(c) => {
                assert_eq!(c.model, ModelId::Cnn);
                assert_eq!(c.label, "not_skin_cancer");
                assert_eq!(c.confidence, 0.2);
            }
            other => panic!("unexpected outcome: {:?}", other),
        }
    }

    #[test]
    fn auto_falls_back_when_primary_fails_to_load() {
        let loader = FakeLoader::new(
            Behaviour::FailsToLoad,
            Behaviour::Returns { class_index: 5, confidence: 0.8 },
        );
        match classify_with_policy(&loader, AUTO, &image()) {
            SelectionOutcome::Classified(c) => {
                assert_eq!(c.model, ModelId::Cnn);
                assert_eq!(c.label, "Melanocytic nevi");
            }
            other => panic!("unexpected outcome: {:?}", other),
        }
    }

    #[test]
    fn auto_fails_when_both_models_fail() {
        let loader = FakeLoader::new(Behaviour::FailsToLoad, Behaviour::FailsToLoad);
        assert!(matches!(
            classify_with_policy(&loader, AUTO, &image()),
            SelectionOutcome::Failed { model: ModelId::Cnn, .. }
        ));
    }

    #[test]
    fn forced_model_never_falls_back() {
        let loader = FakeLoader::new(
            Behaviour::Returns { class_index: 0, confidence: 0.99 },
            Behaviour::FailsToLoad,
        );
        let outcome = classify_with_policy(&loader, SelectionPolicy::Forced(ModelId::Cnn), &image());
        assert!(matches!(outcome, SelectionOutcome::Failed { model: ModelId::Cnn, .. }));
        assert_eq!(loader.loads(ModelId::Efficientnet), 0);
    }

    #[test]
    fn forced_model_ignores_threshold() {
        let loader = FakeLoader::new(
            Behaviour::Returns { class_index: 1, confidence: 0.1 },
            Behaviour::Returns { class_index: 7, confidence: 0.99 },
        );
        let outcome =
            classify_with_policy(&loader, SelectionPolicy::Forced(ModelId::Efficientnet), &image());
        match outcome {
            SelectionOutcome::Classified(c) => {
                assert_eq!(c.label, "Basal cell carcinoma");
                assert_eq!(c.confidence, 0.1);
            }
            other => panic!("unexpected outcome: {:?}", other),
        }
        assert_eq!(loader.loads(ModelId::Cnn), 0);
    }

    #[test]
    fn policy_from_preference() {
        assert_eq!(
            SelectionPolicy::from_preference(ModelPreference::Auto, 0.5),
            AUTO
        );
        assert_eq!(
            SelectionPolicy::from_preference(ModelPreference::Cnn, 0.5),
            SelectionPolicy::Forced(ModelId::Cnn)
        );
    }

    #[test]
    fn classification_from_scores() {
        let spec = ModelSpec::secondary(&Config::default());
        let c = spec
            .classification_from(&[0.0, 0.1, 0.0, 0.0, 0.0, 0.0, 0.0, 0.9])
            .unwrap();
        assert_eq!(c.label, "not_skin_cancer");
        assert_eq!(c.class_index, 7);
        assert!((c.confidence - 0.9).abs() < 1e-6);

        assert!(matches!(
            spec.classification_from(&[0.5, 0.5]),
            Err(InferenceError::ClassCountMismatch { expected: 8, got: 2 })
        ));
    }

    #[test]
    fn registry_reports_missing_model_files() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config {
            models_dir: dir.path().to_path_buf(),
            ..Config::default()
        };
        let registry = ModelRegistry::new(&config);
        assert!(registry.available_models().is_empty());
        assert!(registry.load(ModelId::Cnn).is_err());
    }
}
