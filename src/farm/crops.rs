use std::str::FromStr;

use actix_web::{web, HttpResponse};
use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::json;
use tracing::info;
use uuid::Uuid;

use crate::auth::AuthenticatedUser;
use crate::db::models::{Crop, CropStatus, GeoPoint};
use crate::error::AppError;
use crate::{AppState, Result};

/// Body of crop create and update. Update only touches the fields that are present.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CropInput {
    pub name: Option<String>,
    #[serde(rename = "type")]
    pub crop_type: Option<String>,
    pub planting_date: Option<DateTime<Utc>>,
    pub expected_harvest_date: Option<DateTime<Utc>>,
    pub status: Option<String>,
    pub location: Option<GeoPoint>,
}

fn required(value: Option<String>, field: &str) -> Result<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
        .ok_or_else(|| AppError::validation(format!("{} is required", field)))
}

fn parse_status(value: &str) -> Result<CropStatus> {
    CropStatus::from_str(value).map_err(|_| AppError::validation(format!("Invalid crop status: {}", value)))
}

fn check_location(location: &Option<GeoPoint>) -> Result<()> {
    if let Some(point) = location {
        if !(-90.0..=90.0).contains(&point.latitude) || !(-180.0..=180.0).contains(&point.longitude) {
            return Err(AppError::validation("Invalid crop location"));
        }
    }
    Ok(())
}

impl CropInput {
    pub fn into_crop(self, user_id: Uuid) -> Result<Crop> {
        let name = required(self.name, "Crop name")?;
        let crop_type = required(self.crop_type, "Crop type")?;
        let planting_date = self
            .planting_date
            .ok_or_else(|| AppError::validation("Planting date is required"))?;
        let status = self.status.as_deref().map(parse_status).transpose()?.unwrap_or(CropStatus::Planted);
        check_location(&self.location)?;

        let now = Utc::now();
        Ok(Crop {
            id: Uuid::new_v4(),
            user_id,
            name,
            crop_type,
            planting_date,
            expected_harvest_date: self.expected_harvest_date,
            status,
            location: self.location,
            created_at: now,
            updated_at: now,
        })
    }

    pub fn apply(self, crop: &mut Crop) -> Result<()> {
        if self.name.is_some() {
            crop.name = required(self.name, "Crop name")?;
        }
        if self.crop_type.is_some() {
            crop.crop_type = required(self.crop_type, "Crop type")?;
        }
        if let Some(date) = self.planting_date {
            crop.planting_date = date;
        }
        if self.expected_harvest_date.is_some() {
            crop.expected_harvest_date = self.expected_harvest_date;
        }
        if let Some(status) = self.status.as_deref() {
            crop.status = parse_status(status)?;
        }
        if self.location.is_some() {
            check_location(&self.location)?;
            crop.location = self.location;
        }
        crop.updated_at = Utc::now();
        Ok(())
    }
}

fn crop_not_found() -> AppError {
    AppError::not_found("Crop not found")
}

pub async fn list_crops(AuthenticatedUser(user): AuthenticatedUser, state: web::Data<AppState>) -> Result<HttpResponse> {
    let crops = state.store.list_crops(user.id).await?;
    Ok(HttpResponse::Ok().json(json!({ "success": true, "count": crops.len(), "data": crops })))
}

pub async fn get_crop(
    AuthenticatedUser(user): AuthenticatedUser,
    path: web::Path<Uuid>,
    state: web::Data<AppState>,
) -> Result<HttpResponse> {
    let crop = state.store.get_crop(user.id, path.into_inner()).await?.ok_or_else(crop_not_found)?;
    Ok(HttpResponse::Ok().json(json!({ "success": true, "data": crop })))
}

pub async fn create_crop(
    AuthenticatedUser(user): AuthenticatedUser,
    req: web::Json<CropInput>,
    state: web::Data<AppState>,
) -> Result<HttpResponse> {
    let crop = req.into_inner().into_crop(user.id)?;
    let crop = state.store.create_crop(&crop).await?;
    info!("Created crop {} for user {}", crop.id, user.id);
    Ok(HttpResponse::Created().json(json!({ "success": true, "data": crop })))
}

pub async fn update_crop(
    AuthenticatedUser(user): AuthenticatedUser,
    path: web::Path<Uuid>,
    req: web::Json<CropInput>,
    state: web::Data<AppState>,
) -> Result<HttpResponse> {
    let mut crop = state.store.get_crop(user.id, path.into_inner()).await?.ok_or_else(crop_not_found)?;
    req.into_inner().apply(&mut crop)?;
    let crop = state.store.update_crop(&crop).await?;
    Ok(HttpResponse::Ok().json(json!({ "success": true, "data": crop })))
}

pub async fn delete_crop(
    AuthenticatedUser(user): AuthenticatedUser,
    path: web::Path<Uuid>,
    state: web::Data<AppState>,
) -> Result<HttpResponse> {
    let id = path.into_inner();
    if !state.store.delete_crop(user.id, id).await? {
        return Err(crop_not_found());
    }
    info!("Deleted crop {} for user {}", id, user.id);
    Ok(HttpResponse::Ok().json(json!({ "success": true, "message": "Crop deleted" })))
}
