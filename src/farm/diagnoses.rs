use std::str::FromStr;

use actix_web::{web, HttpResponse};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::info;
use uuid::Uuid;

use crate::auth::AuthenticatedUser;
use crate::db::models::{Diagnosis, DiagnosisStatus};
use crate::error::AppError;
use crate::{AppState, Result};

pub const PLACEHOLDER_IMAGE: &str = "data:image/jpeg;base64,placeholder";
const DEFAULT_CONFIDENCE: f64 = 0.85;

/// Diagnosis fields as sent by clients. Also the shape of a draft built from an ML
/// result, so a draft can be posted back unchanged to be saved.
#[derive(Debug, Default, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DiagnosisInput {
    pub disease_name: Option<String>,
    pub confidence: Option<f64>,
    pub symptoms: Option<Vec<String>>,
    pub recommended_treatment: Option<String>,
    pub image_url: Option<String>,
    pub crop: Option<Uuid>,
    pub status: Option<String>,
}

fn parse_status(value: &str) -> Result<DiagnosisStatus> {
    DiagnosisStatus::from_str(value).map_err(|_| AppError::validation(format!("Invalid diagnosis status: {}", value)))
}

fn check_confidence(confidence: Option<f64>) -> Result<()> {
    match confidence {
        Some(c) if !(0.0..=100.0).contains(&c) => Err(AppError::validation("Confidence must be between 0 and 100")),
        _ => Ok(()),
    }
}

impl DiagnosisInput {
    /// Maps an ML prediction into an unsaved diagnosis.
    pub fn draft_from_ml(ml_result: &Value, image_url: Option<String>, crop: Option<Uuid>) -> Self {
        let confidence = ml_result
            .get("confidence")
            .and_then(Value::as_f64)
            .filter(|c| *c != 0.0)
            .unwrap_or(DEFAULT_CONFIDENCE);
        let symptoms = ml_result
            .get("symptoms")
            .and_then(Value::as_array)
            .map(|items| items.iter().filter_map(|s| s.as_str().map(String::from)).collect())
            .unwrap_or_default();
        let recommended_treatment = ml_result
            .get("treatment")
            .filter(|t| !t.is_null())
            .map(Value::to_string);

        Self {
            disease_name: ml_result.get("name").and_then(Value::as_str).map(String::from),
            confidence: Some((confidence * 100.0).round()),
            symptoms: Some(symptoms),
            recommended_treatment,
            image_url: Some(image_url.unwrap_or_else(|| PLACEHOLDER_IMAGE.to_string())),
            crop,
            status: Some(DiagnosisStatus::Pending.as_str().to_string()),
        }
    }

    pub fn into_diagnosis(self, user_id: Uuid) -> Result<Diagnosis> {
        let disease_name = self
            .disease_name
            .map(|d| d.trim().to_string())
            .filter(|d| !d.is_empty())
            .ok_or_else(|| AppError::validation("Disease name is required"))?;
        let image_url = self
            .image_url
            .filter(|u| !u.is_empty())
            .ok_or_else(|| AppError::validation("Image URL is required"))?;
        check_confidence(self.confidence)?;
        let status = self
            .status
            .as_deref()
            .map(parse_status)
            .transpose()?
            .unwrap_or(DiagnosisStatus::Pending);

        let now = Utc::now();
        Ok(Diagnosis {
            id: Uuid::new_v4(),
            user_id,
            crop_id: self.crop,
            disease_name,
            image_url,
            confidence: self.confidence,
            symptoms: self.symptoms.unwrap_or_default(),
            recommended_treatment: self.recommended_treatment,
            status,
            created_at: now,
            updated_at: now,
        })
    }

    pub fn apply(self, diagnosis: &mut Diagnosis) -> Result<()> {
        if let Some(name) = self.disease_name.filter(|d| !d.trim().is_empty()) {
            diagnosis.disease_name = name.trim().to_string();
        }
        if let Some(url) = self.image_url.filter(|u| !u.is_empty()) {
            diagnosis.image_url = url;
        }
        if self.confidence.is_some() {
            check_confidence(self.confidence)?;
            diagnosis.confidence = self.confidence;
        }
        if let Some(symptoms) = self.symptoms {
            diagnosis.symptoms = symptoms;
        }
        if self.recommended_treatment.is_some() {
            diagnosis.recommended_treatment = self.recommended_treatment;
        }
        if self.crop.is_some() {
            diagnosis.crop_id = self.crop;
        }
        if let Some(status) = self.status.as_deref() {
            diagnosis.status = parse_status(status)?;
        }
        diagnosis.updated_at = Utc::now();
        Ok(())
    }
}

/// A referenced crop must belong to the caller.
async fn check_crop_owner(state: &AppState, user_id: Uuid, crop: Option<Uuid>) -> Result<()> {
    if let Some(crop_id) = crop {
        state
            .store
            .get_crop(user_id, crop_id)
            .await?
            .ok_or_else(|| AppError::not_found("Crop not found"))?;
    }
    Ok(())
}

pub async fn list_diagnoses(
    AuthenticatedUser(user): AuthenticatedUser,
    state: web::Data<AppState>,
) -> Result<HttpResponse> {
    let diagnoses = state.store.list_diagnoses(user.id).await?;
    Ok(HttpResponse::Ok().json(json!({ "success": true, "count": diagnoses.len(), "data": diagnoses })))
}

pub async fn create_diagnosis(
    AuthenticatedUser(user): AuthenticatedUser,
    req: web::Json<DiagnosisInput>,
    state: web::Data<AppState>,
) -> Result<HttpResponse> {
    let diagnosis = req.into_inner().into_diagnosis(user.id)?;
    check_crop_owner(&state, user.id, diagnosis.crop_id).await?;
    let diagnosis = state.store.create_diagnosis(&diagnosis).await?;
    info!("Created diagnosis {} for user {}", diagnosis.id, user.id);
    Ok(HttpResponse::Created().json(json!({ "success": true, "data": diagnosis })))
}

pub async fn update_diagnosis(
    AuthenticatedUser(user): AuthenticatedUser,
    path: web::Path<Uuid>,
    req: web::Json<DiagnosisInput>,
    state: web::Data<AppState>,
) -> Result<HttpResponse> {
    let mut diagnosis = state
        .store
        .get_diagnosis(user.id, path.into_inner())
        .await?
        .ok_or_else(|| AppError::not_found("Diagnosis not found"))?;

    req.into_inner().apply(&mut diagnosis)?;
    check_crop_owner(&state, user.id, diagnosis.crop_id).await?;
    let diagnosis = state.store.update_diagnosis(&diagnosis).await?;
    Ok(HttpResponse::Ok().json(json!({ "success": true, "data": diagnosis })))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DraftRequest {
    pub ml_result: Option<Value>,
    pub image_url: Option<String>,
    pub crop_id: Option<Uuid>,
}

pub async fn create_draft(req: web::Json<DraftRequest>) -> Result<HttpResponse> {
    let req = req.into_inner();
    let ml_result = req
        .ml_result
        .filter(|v| !v.is_null())
        .ok_or_else(|| AppError::validation("ML result is required"))?;

    let draft = DiagnosisInput::draft_from_ml(&ml_result, req.image_url, req.crop_id);
    Ok(HttpResponse::Ok().json(json!({ "success": true, "diagnosis": draft })))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SaveRequest {
    pub diagnosis_data: Option<DiagnosisInput>,
}

pub async fn save_draft(
    AuthenticatedUser(user): AuthenticatedUser,
    req: web::Json<SaveRequest>,
    state: web::Data<AppState>,
) -> Result<HttpResponse> {
    let draft = req
        .into_inner()
        .diagnosis_data
        .ok_or_else(|| AppError::validation("Diagnosis data is required"))?;

    let diagnosis = draft.into_diagnosis(user.id)?;
    check_crop_owner(&state, user.id, diagnosis.crop_id).await?;
    let diagnosis = state.store.create_diagnosis(&diagnosis).await?;
    info!("Saved diagnosis {} for user {}", diagnosis.id, user.id);

    Ok(HttpResponse::Ok().json(json!({
        "success": true,
        "message": "Diagnosis saved successfully",
        "diagnosisId": diagnosis.id,
    })))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_draft_from_ml_result() {
        let ml = json!({
            "name": "Early Blight",
            "confidence": 0.914,
            "symptoms": ["Dark rings on leaves"],
            "treatment": {"organic": []}
        });
        let draft = DiagnosisInput::draft_from_ml(&ml, None, None);

        assert_eq!(draft.disease_name.as_deref(), Some("Early Blight"));
        assert_eq!(draft.confidence, Some(91.0));
        assert_eq!(draft.symptoms.as_deref(), Some(&["Dark rings on leaves".to_string()][..]));
        assert_eq!(draft.recommended_treatment.as_deref(), Some(r#"{"organic":[]}"#));
        assert_eq!(draft.image_url.as_deref(), Some(PLACEHOLDER_IMAGE));
        assert_eq!(draft.status.as_deref(), Some("pending"));
    }

    #[test]
    fn test_draft_defaults_missing_confidence() {
        let draft = DiagnosisInput::draft_from_ml(&json!({"name": "Leaf Spot"}), Some("http://img".into()), None);
        assert_eq!(draft.confidence, Some(85.0));
        assert!(draft.recommended_treatment.is_none());
    }

    #[test]
    fn test_draft_round_trips_into_diagnosis() {
        let draft = DiagnosisInput::draft_from_ml(&json!({"name": "Leaf Spot", "confidence": 0.5}), None, None);
        let wire = serde_json::to_value(&draft).unwrap();
        let parsed: DiagnosisInput = serde_json::from_value(wire).unwrap();

        let diagnosis = parsed.into_diagnosis(Uuid::new_v4()).unwrap();
        assert_eq!(diagnosis.confidence, Some(50.0));
        assert_eq!(diagnosis.status, DiagnosisStatus::Pending);
    }

    #[test]
    fn test_into_diagnosis_validation() {
        let err = DiagnosisInput::default().into_diagnosis(Uuid::new_v4()).unwrap_err();
        assert_eq!(err.to_string(), "Disease name is required");

        let input = DiagnosisInput {
            disease_name: Some("Root Rot".into()),
            image_url: Some("http://img".into()),
            confidence: Some(140.0),
            ..Default::default()
        };
        assert!(input.into_diagnosis(Uuid::new_v4()).is_err());
    }
}
