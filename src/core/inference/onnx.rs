use image::DynamicImage;
use ndarray::CowArray;
use ort::tensor::OrtOwnedTensor;
use ort::{Environment, GraphOptimizationLevel, Session, SessionBuilder, Value};
use std::sync::Arc;
use tracing::info;

use super::{preprocess, Classification, Classifier, InferenceError, ModelSpec};

/// Classifieur adossé à une session ONNX Runtime (export Keras NHWC)
pub struct OnnxClassifier {
    spec: ModelSpec,
    session: Session,
}

impl OnnxClassifier {
    /// Charge le modèle depuis `spec.path`. Seule l'existence du fichier est vérifiée.
    pub fn load(environment: &Arc<Environment>, spec: ModelSpec) -> Result<Self, InferenceError> {
        if !spec.path.exists() {
            return Err(InferenceError::ModelMissing(spec.path.clone()));
        }

        info!("📦 Chargement du modèle {} depuis {:?}", spec.id, spec.path);
        let session = SessionBuilder::new(environment)
            .and_then(|builder| builder.with_optimization_level(GraphOptimizationLevel::Level3))
            .and_then(|builder| builder.with_intra_threads(1))
            .and_then(|builder| builder.with_model_from_file(&spec.path))
            .map_err(|e| InferenceError::Load(e.to_string()))?;

        Ok(Self { spec, session })
    }
}

impl Classifier for OnnxClassifier {
    fn spec(&self) -> &ModelSpec {
        &self.spec
    }

    fn classify(&self, image: &DynamicImage) -> Result<Classification, InferenceError> {
        let input = preprocess::to_input_tensor(image, self.spec.input_size, self.spec.pixel_scale);
        let input = CowArray::from(input.into_dyn());

        let value = Value::from_array(self.session.allocator(), &input)
            .map_err(|e| InferenceError::Inference(e.to_string()))?;
        let outputs = self
            .session
            .run(vec![value])
            .map_err(|e| InferenceError::Inference(e.to_string()))?;

        let first = outputs.first().ok_or(InferenceError::EmptyOutput)?;
        let tensor: OrtOwnedTensor<f32, _> = first
            .try_extract()
            .map_err(|e| InferenceError::Inference(e.to_string()))?;
        let probabilities: Vec<f32> = tensor.view().iter().copied().collect();

        self.spec.classification_from(&probabilities)
    }
}
