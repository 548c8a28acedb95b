//! Prediction rules applied around the upstream models: crop normalisation, image
//! checks, fallback predictions, calibration and validation of model output.

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::db::models::ScanSeverity;
use crate::error::AppError;
use crate::Result;

pub const MODEL_VERSION: &str = "2.1.0";
pub const DEFAULT_CROP: &str = "tomato";
pub const HEALTHY: &str = "Healthy Plant";

const MIN_IMAGE_BYTES: usize = 1000;
const MAX_IMAGE_BYTES: usize = 10 * 1024 * 1024;
const DEFAULT_CONFIDENCE: f64 = 0.85;

pub const VALID_CROPS: &[&str] = &[
    "tomato", "potato", "corn", "wheat", "rice", "pepper", "cucumber", "lettuce", "spinach", "carrot",
];

/// Disease names a prediction may carry. The tail entries are the ones the
/// fallback table can produce.
pub const VALID_DISEASES: &[&str] = &[
    "Late Blight",
    "Early Blight",
    "Common Rust",
    "Powdery Mildew",
    "Leaf Spot",
    "Root Rot",
    "Bacterial Wilt",
    "Mosaic Virus",
    "Anthracnose",
    "Downy Mildew",
    HEALTHY,
    "Leaf Rust",
    "Blast Disease",
    "Bacterial Spot",
    "Tip Burn",
    "Leaf Blight",
];

/// Crop-specific result used when no model answers.
const FALLBACK_DISEASES: &[(&str, &str, f64)] = &[
    ("tomato", "Late Blight", 0.82),
    ("potato", "Late Blight", 0.85),
    ("corn", "Common Rust", 0.78),
    ("wheat", "Leaf Rust", 0.80),
    ("rice", "Blast Disease", 0.83),
    ("pepper", "Bacterial Spot", 0.79),
    ("cucumber", "Downy Mildew", 0.81),
    ("lettuce", "Tip Burn", 0.77),
    ("spinach", "Leaf Spot", 0.76),
    ("carrot", "Leaf Blight", 0.74),
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Severity {
    Low,
    Medium,
    High,
    Critical,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PredictionMetadata {
    pub crop_type: String,
    pub processed_at: DateTime<Utc>,
    pub model_version: String,
    pub accuracy: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalyzedCrop {
    pub id: String,
    pub name: String,
}

impl AnalyzedCrop {
    pub fn new(crop: &str) -> Self {
        let mut chars = crop.chars();
        let name = match chars.next() {
            Some(first) => first.to_uppercase().chain(chars).collect(),
            None => String::new(),
        };
        Self {
            id: crop.to_string(),
            name,
        }
    }
}

/// A validated prediction as returned to clients.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Prediction {
    pub name: String,
    pub confidence: f64,
    pub severity: Severity,
    pub description: String,
    pub symptoms: Vec<String>,
    pub treatment: Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prevention: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<PredictionMetadata>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub analyzed_crop: Option<AnalyzedCrop>,
}

impl Prediction {
    /// Stamps tracking metadata and the analysed crop.
    pub fn finish(mut self, crop: &str, now: DateTime<Utc>) -> Self {
        self.metadata = Some(PredictionMetadata {
            crop_type: crop.to_string(),
            processed_at: now,
            model_version: MODEL_VERSION.to_string(),
            accuracy: "enhanced".to_string(),
        });
        if self.analyzed_crop.is_none() {
            self.analyzed_crop = Some(AnalyzedCrop::new(crop));
        }
        self
    }

    pub fn scan_severity(&self) -> ScanSeverity {
        if self.name == HEALTHY {
            return ScanSeverity::Healthy;
        }
        match self.severity {
            Severity::Low => ScanSeverity::Mild,
            Severity::Medium => ScanSeverity::Moderate,
            Severity::High | Severity::Critical => ScanSeverity::Severe,
        }
    }

    /// Confidence as a percentage, as stored on scan records.
    pub fn confidence_percent(&self) -> f64 {
        (self.confidence * 100.0).clamp(0.0, 100.0)
    }
}

/// Lowercases the crop, substituting the default for crops no model knows.
pub fn normalize_crop(crop: &str) -> String {
    let lower = crop.trim().to_lowercase();
    if VALID_CROPS.contains(&lower.as_str()) {
        lower
    } else {
        DEFAULT_CROP.to_string()
    }
}

pub fn decode_image(encoded: &str) -> Result<Vec<u8>> {
    let payload = match encoded.find(";base64,") {
        Some(idx) if encoded.starts_with("data:") => &encoded[idx + ";base64,".len()..],
        _ => encoded,
    };
    let cleaned: String = payload.chars().filter(|c| !c.is_whitespace()).collect();

    let bytes = STANDARD
        .decode(cleaned.as_bytes())
        .map_err(|e| AppError::validation(format!("Invalid image data: {}", e)))?;

    if bytes.len() < MIN_IMAGE_BYTES {
        return Err(AppError::validation("Invalid image data: Image too small"));
    }
    if bytes.len() > MAX_IMAGE_BYTES {
        return Err(AppError::validation("Invalid image data: Image too large (max 10MB)"));
    }
    Ok(bytes)
}

fn standard_treatment() -> Value {
    json!({
        "organic": [
            {
                "name": "Neem Oil Spray",
                "dosage": "5ml per liter of water",
                "frequency": "Every 7 days",
                "effectiveness": 75,
                "instructions": "Apply in early morning or evening to avoid leaf burn."
            },
            {
                "name": "Copper Fungicide (Organic)",
                "dosage": "2g per liter of water",
                "frequency": "Every 10 days",
                "effectiveness": 80,
                "instructions": "Ensure complete coverage of affected areas."
            }
        ],
        "chemical": [
            {
                "name": "Broad Spectrum Fungicide",
                "dosage": "As per manufacturer instructions",
                "frequency": "Every 7-10 days",
                "effectiveness": 85,
                "warning": "Use protective equipment. Follow pre-harvest intervals.",
                "instructions": "Rotate with different active ingredients to prevent resistance."
            }
        ]
    })
}

fn general_treatment() -> Value {
    json!({
        "organic": [{
            "name": "General Organic Treatment",
            "dosage": "As per instructions",
            "frequency": "Weekly",
            "effectiveness": 70,
            "instructions": "Consult local agricultural extension for specific recommendations."
        }]
    })
}

/// Prediction used when every model failed.
pub fn fallback_prediction(crop: &str) -> Prediction {
    let (_, name, confidence) = FALLBACK_DISEASES
        .iter()
        .find(|(c, _, _)| *c == crop)
        .copied()
        .unwrap_or(FALLBACK_DISEASES[0]);

    Prediction {
        name: name.to_string(),
        confidence,
        severity: if confidence > 0.8 { Severity::High } else { Severity::Medium },
        description: format!(
            "{} detected in {}. This is a common disease affecting {} crops. Please consult an agricultural expert for confirmation.",
            name, crop, crop
        ),
        symptoms: vec![
            format!("Visible symptoms on {} plant leaves", crop),
            "Discoloration or spots visible".to_string(),
            "Potential yield reduction if untreated".to_string(),
        ],
        treatment: standard_treatment(),
        prevention: Some(vec![
            "Ensure proper plant spacing for air circulation".to_string(),
            "Avoid overhead watering".to_string(),
            "Remove infected plant debris".to_string(),
            "Apply preventive treatments during favorable disease conditions".to_string(),
        ]),
        metadata: None,
        analyzed_crop: Some(AnalyzedCrop::new(crop)),
    }
}

/// Upstream confidence as a fraction, `None` when the model sent none.
fn raw_confidence(raw: &Value) -> Option<f64> {
    let confidence = raw.get("confidence").and_then(Value::as_f64)?;
    Some(if confidence > 1.0 { confidence / 100.0 } else { confidence })
}

fn raw_name(raw: &Value) -> Option<&str> {
    ["name", "disease", "diseaseName"]
        .iter()
        .find_map(|key| raw.get(*key).and_then(Value::as_str))
        .filter(|name| !name.trim().is_empty())
}

/// Adjusts severity and description of an upstream answer by its confidence.
pub fn calibrate(raw: &mut Value) {
    let Some(confidence) = raw_confidence(raw) else {
        return;
    };
    let name = raw_name(raw).map(str::to_string);

    let Some(fields) = raw.as_object_mut() else {
        return;
    };

    if confidence < 0.7 {
        fields.insert("severity".into(), json!("Low"));
        fields.insert(
            "description".into(),
            json!(format!(
                "Possible {} detected with low confidence. Consider getting a second opinion from an agricultural expert.",
                name.as_deref().unwrap_or("disease")
            )),
        );
    } else if confidence >= 0.9 {
        fields.insert("severity".into(), json!("High"));
        fields.insert(
            "description".into(),
            json!(format!(
                "{} detected with high confidence. Immediate treatment recommended.",
                name.as_deref().unwrap_or("Disease")
            )),
        );
    }
}

fn match_disease(name: &str) -> Option<&'static str> {
    let lower = name.to_lowercase();
    VALID_DISEASES.iter().copied().find(|known| {
        let known_lower = known.to_lowercase();
        known_lower == lower || lower.contains(&known_lower) || known_lower.contains(&lower)
    })
}

fn unrecognised_prediction() -> Prediction {
    Prediction {
        name: "Late Blight".to_string(),
        confidence: 0.75,
        severity: Severity::Medium,
        description: "A plant disease has been detected. Please consult with an agricultural expert for proper identification."
            .to_string(),
        symptoms: vec!["Disease symptoms detected on plant".to_string()],
        treatment: json!({
            "organic": [{
                "name": "Neem Oil Spray",
                "dosage": "5ml per liter of water",
                "frequency": "Every 7 days",
                "effectiveness": 75,
                "instructions": "Apply in early morning or evening."
            }]
        }),
        prevention: None,
        metadata: None,
        analyzed_crop: None,
    }
}

/// Turns free-form model output into a [`Prediction`], replacing anything that
/// is not a known disease with a generic result.
pub fn validate(raw: &Value) -> Prediction {
    let Some(disease) = raw_name(raw).and_then(match_disease) else {
        return unrecognised_prediction();
    };

    let confidence = raw_confidence(raw).filter(|c| *c > 0.0).unwrap_or(DEFAULT_CONFIDENCE);
    let severity = raw
        .get("severity")
        .and_then(|s| serde_json::from_value::<Severity>(s.clone()).ok())
        .unwrap_or(Severity::Medium);
    let description = raw
        .get("description")
        .and_then(Value::as_str)
        .filter(|d| !d.is_empty())
        .map(str::to_string)
        .unwrap_or_else(|| format!("{} detected in plant. Consult agricultural expert for confirmation.", disease));
    let symptoms = raw
        .get("symptoms")
        .and_then(Value::as_array)
        .map(|items| items.iter().filter_map(|s| s.as_str().map(str::to_string)).collect())
        .unwrap_or_else(|| vec!["Disease symptoms detected".to_string()]);
    let treatment = raw
        .get("treatment")
        .filter(|t| !t.is_null())
        .cloned()
        .unwrap_or_else(general_treatment);
    let prevention = raw
        .get("prevention")
        .and_then(Value::as_array)
        .map(|items| items.iter().filter_map(|s| s.as_str().map(str::to_string)).collect());
    let analyzed_crop = raw
        .get("analyzedCrop")
        .and_then(|c| serde_json::from_value::<AnalyzedCrop>(c.clone()).ok());

    Prediction {
        name: disease.to_string(),
        confidence,
        severity,
        description,
        symptoms,
        treatment,
        prevention,
        metadata: None,
        analyzed_crop,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_crop() {
        assert_eq!(normalize_crop("Potato"), "potato");
        assert_eq!(normalize_crop(" CARROT "), "carrot");
        assert_eq!(normalize_crop("mango"), "tomato");
    }

    #[test]
    fn test_decode_image_bounds() {
        let small = STANDARD.encode([0u8; 999]);
        assert_eq!(decode_image(&small).unwrap_err().to_string(), "Invalid image data: Image too small");

        let ok = STANDARD.encode([7u8; 1000]);
        assert_eq!(decode_image(&ok).unwrap().len(), 1000);

        let with_prefix = format!("data:image/png;base64,{}", ok);
        assert_eq!(decode_image(&with_prefix).unwrap().len(), 1000);

        assert!(matches!(decode_image("%%%not-base64%%%"), Err(AppError::ValidationError(_))));
    }

    #[test]
    fn test_fallback_prediction_per_crop() {
        let rice = fallback_prediction("rice");
        assert_eq!(rice.name, "Blast Disease");
        assert_eq!(rice.severity, Severity::High);
        assert_eq!(rice.analyzed_crop.as_ref().unwrap().name, "Rice");

        let carrot = fallback_prediction("carrot");
        assert_eq!(carrot.severity, Severity::Medium);
        assert_eq!(carrot.prevention.as_ref().map(Vec::len), Some(4));

        // Fallback diseases survive validation
        let validated = validate(&serde_json::to_value(&carrot).unwrap());
        assert_eq!(validated.name, "Leaf Blight");
        assert_eq!(validated.confidence, 0.74);
    }

    #[test]
    fn test_calibrate_thresholds() {
        let mut low = json!({"name": "Root Rot", "confidence": 0.55, "severity": "High"});
        calibrate(&mut low);
        assert_eq!(low["severity"], "Low");
        assert!(low["description"].as_str().unwrap().starts_with("Possible Root Rot"));

        let mut high = json!({"name": "Root Rot", "confidence": 92});
        calibrate(&mut high);
        assert_eq!(high["severity"], "High");

        let mut mid = json!({"name": "Root Rot", "confidence": 0.8, "severity": "Medium"});
        calibrate(&mut mid);
        assert_eq!(mid["severity"], "Medium");
        assert!(mid.get("description").is_none());
    }

    #[test]
    fn test_calibrate_skips_missing_confidence() {
        let mut raw = json!({"name": "Root Rot", "severity": "Medium"});
        calibrate(&mut raw);
        assert_eq!(raw["severity"], "Medium");
        assert!(raw.get("description").is_none());

        let p = validate(&raw);
        assert_eq!(p.severity, Severity::Medium);
        assert_eq!(p.confidence, 0.85);
        assert!(!p.description.contains("low confidence"));
    }

    #[test]
    fn test_validate_matches_known_diseases() {
        let p = validate(&json!({"disease": "tomato early blight", "confidence": 88}));
        assert_eq!(p.name, "Early Blight");
        assert!((p.confidence - 0.88).abs() < 1e-9);
        assert_eq!(p.severity, Severity::Medium);
        assert_eq!(p.symptoms, vec!["Disease symptoms detected".to_string()]);

        let p = validate(&json!({"name": "Space Fungus", "confidence": 0.99}));
        assert_eq!(p.name, "Late Blight");
        assert_eq!(p.confidence, 0.75);

        let p = validate(&json!({"name": "", "confidence": 0.99}));
        assert_eq!(p.name, "Late Blight");

        let p = validate(&json!({"diseaseName": "Healthy Plant", "severity": "Critical"}));
        assert_eq!(p.confidence, 0.85);
        assert_eq!(p.severity, Severity::Critical);
        assert_eq!(p.scan_severity(), ScanSeverity::Healthy);
    }

    #[test]
    fn test_scan_severity_mapping() {
        let mut p = validate(&json!({"name": "Leaf Spot", "severity": "Low"}));
        assert_eq!(p.scan_severity(), ScanSeverity::Mild);
        p.severity = Severity::Medium;
        assert_eq!(p.scan_severity(), ScanSeverity::Moderate);
        p.severity = Severity::Critical;
        assert_eq!(p.scan_severity(), ScanSeverity::Severe);
    }

    #[test]
    fn test_finish_adds_metadata() {
        let now = Utc::now();
        let p = validate(&json!({"name": "Leaf Spot"})).finish("spinach", now);
        let meta = p.metadata.as_ref().unwrap();
        assert_eq!(meta.model_version, "2.1.0");
        assert_eq!(meta.accuracy, "enhanced");
        assert_eq!(p.analyzed_crop, Some(AnalyzedCrop { id: "spinach".into(), name: "Spinach".into() }));

        let json = serde_json::to_value(&p).unwrap();
        assert_eq!(json["metadata"]["cropType"], "spinach");
        assert_eq!(json["analyzedCrop"]["name"], "Spinach");
    }
}
