use actix_web::{web, HttpResponse};
use chrono::Utc;
use serde::Deserialize;
use serde_json::json;
use tracing::{error, info, warn};

use crate::auth::AuthenticatedUser;
use crate::db::models::ScanRecord;
use crate::error::AppError;
use crate::ml::catalog::{self, Prediction};
use crate::{AppState, Result};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PredictRequest {
    pub crop: Option<String>,
    pub image_base64: Option<String>,
}

/// Runs the ensemble, falling back to the crop table, and validates the outcome.
pub async fn run_prediction(state: &AppState, image: &[u8], crop: &str) -> Prediction {
    let prediction = match state.ml.predict(image, crop).await {
        Some(mut answer) => {
            catalog::calibrate(&mut answer.body);
            catalog::validate(&answer.body)
        }
        None => {
            warn!("ML service unavailable, using fallback prediction for {}", crop);
            catalog::fallback_prediction(crop)
        }
    };

    prediction.finish(crop, Utc::now())
}

pub async fn predict(
    req: web::Json<PredictRequest>,
    user: Option<AuthenticatedUser>,
    state: web::Data<AppState>,
) -> Result<HttpResponse> {
    let req = req.into_inner();
    let (crop, image) = match (req.crop, req.image_base64) {
        (Some(crop), Some(image)) if !crop.trim().is_empty() && !image.is_empty() => (crop, image),
        _ => return Err(AppError::validation("Crop and image are required")),
    };

    let crop = catalog::normalize_crop(&crop);
    let image = catalog::decode_image(&image)?;

    let prediction = run_prediction(&state, &image, &crop).await;
    info!(
        "Prediction for {}: {} ({:.2})",
        crop, prediction.name, prediction.confidence
    );

    if let Some(AuthenticatedUser(user)) = user {
        let mut scan = ScanRecord::new(
            user.id,
            crop.clone(),
            prediction.name.clone(),
            prediction.confidence_percent(),
            prediction.scan_severity(),
            Utc::now(),
        );
        scan.ml_result = Some(serde_json::to_value(&prediction)?);

        // The prediction is still returned when the scan cannot be recorded.
        if let Err(e) = state.store.create_scan(&scan).await {
            error!("Failed to record scan for user {}: {}", user.id, e);
        }
    }

    Ok(HttpResponse::Ok().json(json!({
        "success": true,
        "mlResult": prediction,
    })))
}

pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(web::scope("/ml").route("/predict", web::post().to(predict)));
}
