//! Mise en forme éducative (non diagnostique) d'un libellé de classification.
//!
//! Tables statiques: niveau d'attention, description, motifs visuels,
//! prévention, précautions et avertissements obligatoires.

use serde::Serialize;

use crate::domain::prediction::ERROR_LABEL;

pub const CARD_TITLE: &str = "AI Visual Pattern Analysis Result";
pub const MANDATORY_DISCLAIMER: &str = "Educational use only. NOT medical advice or diagnosis.";
pub const FOOTER_DISCLAIMER: &str = "⚠️ IMPORTANT LEGAL NOTICE

Educational use only. NOT medical advice or diagnosis.

• AI analysis using standard camera photos
• NOT a substitute for professional medical evaluation
• Results may be inaccurate

Always consult a healthcare professional for medical concerns.";

const UNCLEAR_PHRASES: [&str; 3] = ["may not be suitable", "may need adjustment", "may not be optimal"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RiskLevel {
    Green,
    Amber,
    Red,
}

impl RiskLevel {
    pub fn label(&self) -> &'static str {
        match self {
            RiskLevel::Green => "Likely Benign Visual Patterns",
            RiskLevel::Amber => "Non-Specific Visual Patterns Detected",
            RiskLevel::Red => "High-Attention Visual Patterns Detected",
        }
    }

    pub fn color(&self) -> &'static str {
        match self {
            RiskLevel::Green => "#22c55e",
            RiskLevel::Amber => "#f59e0b",
            RiskLevel::Red => "#ef4444",
        }
    }

    pub fn professional_guidance(&self) -> &'static str {
        match self {
            RiskLevel::Green => "Professional evaluation by a qualified healthcare provider is recommended if there are any changes, symptoms, or concerns. Regular skin examinations are important for maintaining skin health and early detection of any issues.",
            RiskLevel::Amber => "Consultation with a qualified healthcare professional is advised for further clarification and proper medical assessment. A dermatologist can provide accurate evaluation using medical-grade equipment and clinical expertise.",
            RiskLevel::Red => "Prompt evaluation by a qualified healthcare professional is strongly recommended. Please schedule an appointment with a dermatologist or healthcare provider for proper medical assessment using appropriate medical equipment and clinical evaluation.",
        }
    }
}

struct ConditionInfo {
    key: &'static str,
    name: &'static str,
    description: &'static str,
    patterns: &'static [&'static str],
    prevention: &'static str,
    precautions: &'static str,
}

const CONDITIONS: [ConditionInfo; 9] = [
    ConditionInfo {
        key: "actinic keratoses",
        name: "Actinic Keratosis",
        description: "Actinic keratosis is a medical condition that may present as rough, scaly patches on sun-exposed areas of the skin. This condition can develop from prolonged sun exposure and may require professional medical evaluation.",
        patterns: &[
            "Rough or scaly surface texture",
            "Irregular pigmentation patterns",
            "Variable size and shape characteristics",
        ],
        prevention: "Sun protection measures may help reduce risk, including wearing sunscreen, protective clothing, and avoiding prolonged sun exposure during peak hours.",
        precautions: "Monitor for any changes in size, texture, or appearance. Professional evaluation is recommended for proper assessment.",
    },
    ConditionInfo {
        key: "basal cell carcinoma",
        name: "Basal Cell Carcinoma-Like Patterns",
        description: "Basal cell carcinoma is a medical condition that may present with certain visual characteristics on the skin. This condition requires professional medical evaluation for accurate assessment and appropriate care.",
        patterns: &[
            "Pearl-like or translucent appearance",
            "Irregular border characteristics",
            "Variable pigmentation patterns",
        ],
        prevention: "Sun protection measures are important, including regular use of sunscreen, protective clothing, and avoiding excessive UV exposure.",
        precautions: "Professional medical evaluation is strongly recommended for any concerning skin changes or new growths.",
    },
    ConditionInfo {
        key: "melanoma",
        name: "Melanoma-Like Visual Patterns",
        description: "Melanoma is a serious medical condition that may present with specific visual characteristics on the skin. Early professional medical evaluation is crucial for proper assessment and care.",
        patterns: &[
            "Asymmetrical shape characteristics",
            "Irregular border patterns",
            "Color variation within the lesion",
            "Diameter changes over time",
        ],
        prevention: "Sun protection is essential, including daily sunscreen use, protective clothing, and avoiding tanning beds. Regular skin examinations are important.",
        precautions: "Immediate professional medical evaluation is strongly recommended for any suspicious skin changes or new growths.",
    },
    ConditionInfo {
        key: "melanocytic nevi",
        name: "Melanocytic Nevus",
        description: "A melanocytic nevus is a common skin growth that may appear as a pigmented spot on the skin. These growths are frequently observed and can vary in appearance.",
        patterns: &[
            "Relatively uniform coloration",
            "Regular border patterns",
            "Symmetrical appearance",
            "Consistent size characteristics",
        ],
        prevention: "Sun protection may help prevent new mole development. Regular monitoring of existing moles is recommended.",
        precautions: "Monitor for any changes in size, shape, color, or texture. Professional evaluation is recommended if changes occur.",
    },
    ConditionInfo {
        key: "benign keratosis like lesions",
        name: "Benign Keratosis-Like Lesions",
        description: "Benign keratosis-like lesions are common skin growths that may appear with certain visual characteristics. These growths can vary in appearance and typically require professional evaluation.",
        patterns: &[
            "Waxy or rough surface texture",
            "Well-defined border characteristics",
            "Variable pigmentation patterns",
        ],
        prevention: "Sun protection measures may help reduce the development of new growths.",
        precautions: "Monitor for any changes and consult a healthcare professional for proper evaluation.",
    },
    ConditionInfo {
        key: "dermatofibroma",
        name: "Dermatofibroma",
        description: "Dermatofibroma is a benign skin growth that may appear as a firm bump on the skin. These growths can vary in appearance and typically require professional evaluation for accurate assessment.",
        patterns: &[
            "Firm, raised appearance",
            "Variable coloration patterns",
            "Well-defined border characteristics",
        ],
        prevention: "Avoiding skin trauma may help reduce risk. Gentle skin care practices are recommended.",
        precautions: "Monitor for any changes in size, color, or texture. Professional evaluation is recommended for proper assessment.",
    },
    ConditionInfo {
        key: "vascular lesions",
        name: "Vascular Lesions",
        description: "Vascular lesions are skin growths that may involve blood vessels and can present with certain visual characteristics. Professional medical evaluation is recommended for proper assessment.",
        patterns: &[
            "Red or purple coloration",
            "Variable size characteristics",
            "Smooth or raised surface texture",
        ],
        prevention: "Protecting skin from injury may help. Gentle skin care practices are recommended.",
        precautions: "Monitor for any changes and consult a healthcare professional for evaluation.",
    },
    ConditionInfo {
        key: "squamous cell carcinoma",
        name: "Squamous Cell Carcinoma-Like Patterns",
        description: "Squamous cell carcinoma is a medical condition that may present with specific visual characteristics on the skin. Professional medical evaluation is essential for proper assessment and care.",
        patterns: &[
            "Scaly or crusty surface texture",
            "Irregular border characteristics",
            "Variable pigmentation patterns",
        ],
        prevention: "Sun protection is crucial, including regular sunscreen use, protective clothing, and avoiding excessive UV exposure.",
        precautions: "Professional medical evaluation is strongly recommended for any concerning skin changes.",
    },
    ConditionInfo {
        key: "not_skin_cancer",
        name: "Non-Specific Skin Patterns",
        description: "This analysis shows visual patterns that may be associated with various non-cancerous skin conditions. Professional medical evaluation is recommended for accurate assessment.",
        patterns: &[
            "Variable appearance characteristics",
            "Non-specific visual features",
            "Requires professional assessment",
        ],
        prevention: "General skin care practices including sun protection and gentle cleansing are recommended.",
        precautions: "Monitor for any changes and consult a healthcare professional for proper evaluation.",
    },
];

/// Résultat éducatif complet renvoyé au client
#[derive(Debug, Clone, Serialize)]
pub struct EducationalResult {
    pub card_title: String,
    pub pattern_classification: String,
    pub risk_level: RiskLevel,
    pub risk_label: String,
    pub risk_color: String,
    pub educational_description: String,
    pub ai_explanation: String,
    pub visual_patterns: Vec<String>,
    pub confidence_display: String,
    pub professional_guidance: String,
    pub disclaimer: String,
    pub footer_disclaimer: String,
    pub prevention_info: String,
    pub precautions: String,
}

/// Niveau d'attention d'un libellé (ambre par défaut pour l'inconnu)
pub fn risk_level(label: &str) -> RiskLevel {
    let label = label.to_lowercase();
    let contains_any = |keys: &[&str]| keys.iter().any(|key| label.contains(key));

    if contains_any(&["melanoma", "basal cell carcinoma", "squamous cell carcinoma"]) {
        RiskLevel::Red
    } else if contains_any(&["actinic keratoses", "vascular lesions"]) {
        RiskLevel::Amber
    } else if contains_any(&[
        "melanocytic nevi",
        "benign keratosis like lesions",
        "dermatofibroma",
        "not_skin_cancer",
    ]) {
        RiskLevel::Green
    } else {
        RiskLevel::Amber
    }
}

fn condition_info(label: &str) -> &'static ConditionInfo {
    let label = label.to_lowercase();
    CONDITIONS
        .iter()
        .find(|info| label.contains(info.key))
        .unwrap_or(&CONDITIONS[CONDITIONS.len() - 1])
}

fn ai_explanation() -> String {
    "Based on an AI-powered visual pattern analysis, this image shows features that may resemble patterns sometimes associated with this condition. The AI model identified visual characteristics that appear similar to those found in medical literature.\n\n⚠️ Important Limitations:\nImage quality, lighting, camera angle, and device limitations may significantly affect results. This analysis is based on visual patterns only and does not consider medical history, symptoms, or other clinical factors that are essential for proper medical evaluation.".to_string()
}

/// `confidence` est dans [0, 1]; `None` si le modèle n'a rien produit
pub fn format_result(label: &str, confidence: Option<f64>, model_used: Option<&str>) -> EducationalResult {
    let normalized = label.trim().to_lowercase();
    if normalized == ERROR_LABEL || UNCLEAR_PHRASES.iter().any(|phrase| normalized.contains(phrase)) {
        return format_unclear_image_result(model_used.unwrap_or("the selected model"));
    }

    let level = risk_level(&normalized);
    let info = condition_info(&normalized);
    let confidence_display = match confidence {
        Some(value) => format!(
            "{:.1}% (Model-specific estimate, not clinical certainty)",
            value * 100.0
        ),
        None => "Not available".to_string(),
    };

    EducationalResult {
        card_title: CARD_TITLE.to_string(),
        pattern_classification: info.name.to_string(),
        risk_level: level,
        risk_label: level.label().to_string(),
        risk_color: level.color().to_string(),
        educational_description: info.description.to_string(),
        ai_explanation: ai_explanation(),
        visual_patterns: info.patterns.iter().map(|p| p.to_string()).collect(),
        confidence_display,
        professional_guidance: level.professional_guidance().to_string(),
        disclaimer: MANDATORY_DISCLAIMER.to_string(),
        footer_disclaimer: FOOTER_DISCLAIMER.to_string(),
        prevention_info: info.prevention.to_string(),
        precautions: info.precautions.to_string(),
    }
}

/// Variante "qualité d'image" (libellé `error` ou image jugée inadaptée)
pub fn format_unclear_image_result(model_used: &str) -> EducationalResult {
    EducationalResult {
        card_title: CARD_TITLE.to_string(),
        pattern_classification: "Image Quality Assessment".to_string(),
        risk_level: RiskLevel::Amber,
        risk_label: "Analysis May Be Limited".to_string(),
        risk_color: RiskLevel::Amber.color().to_string(),
        educational_description: "The uploaded image may not provide optimal conditions for reliable AI analysis. Image quality, lighting, focus, and angle can significantly affect the accuracy of visual pattern recognition.".to_string(),
        ai_explanation: format!(
            "The AI system using {} has detected that this image may not meet the optimal conditions for reliable analysis. Factors such as lighting, image clarity, focus, or the content of the image may limit the system's ability to identify clear visual patterns.",
            model_used
        ),
        visual_patterns: vec![
            "Image quality may affect pattern recognition".to_string(),
            "Lighting conditions may not be optimal".to_string(),
            "Focus or clarity may be insufficient for analysis".to_string(),
        ],
        confidence_display: "Analysis confidence may be limited due to image conditions".to_string(),
        professional_guidance: "If you have concerns about your skin, consider consulting with a qualified healthcare professional who can perform a proper examination using appropriate medical equipment and clinical expertise.".to_string(),
        disclaimer: MANDATORY_DISCLAIMER.to_string(),
        footer_disclaimer: FOOTER_DISCLAIMER.to_string(),
        prevention_info: "For better AI analysis results, try uploading a clear, well-lit image taken in good lighting conditions.".to_string(),
        precautions: "Consider retaking the image with better lighting and focus, or consult a healthcare professional for proper skin examination.".to_string(),
    }
}
