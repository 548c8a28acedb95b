use std::str::FromStr;

use actix_web::{web, HttpResponse};
use chrono::Utc;
use serde::Deserialize;
use serde_json::json;
use tracing::{error, info};

use crate::auth::extract::{AuthenticatedUser, BearerToken};
use crate::db::models::{FarmDetails, SupportedCrop, User};
use crate::error::AppError;
use crate::{AppState, Result};

#[derive(Debug, Deserialize)]
pub struct CredentialsRequest {
    #[serde(default)]
    pub phone: String,
    #[serde(default)]
    pub password: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfileUpdate {
    pub name: Option<String>,
    pub email: Option<String>,
    pub selected_crops: Option<Vec<String>>,
    pub primary_crop: Option<String>,
    pub farm_details: Option<FarmDetails>,
}

fn parse_crop(value: &str) -> Result<SupportedCrop> {
    SupportedCrop::from_str(value.trim()).map_err(|_| AppError::validation(format!("Unsupported crop: {}", value)))
}

impl ProfileUpdate {
    /// Applies the non-empty fields and marks the profile complete.
    pub fn apply(self, user: &mut User) -> Result<()> {
        if let Some(name) = self.name.filter(|n| !n.trim().is_empty()) {
            user.name = name.trim().to_string();
        }
        if let Some(email) = self.email.filter(|e| !e.trim().is_empty()) {
            user.email = email.trim().to_lowercase();
        }
        if let Some(crops) = self.selected_crops {
            user.selected_crops = crops.iter().map(|c| parse_crop(c)).collect::<Result<_>>()?;
        }
        if let Some(primary) = self.primary_crop.filter(|c| !c.trim().is_empty()) {
            user.primary_crop = Some(parse_crop(&primary)?);
        }
        if let Some(details) = self.farm_details {
            user.farm_details = details;
        }
        user.profile_complete = true;
        user.updated_at = Utc::now();
        Ok(())
    }
}

pub async fn register(req: web::Json<CredentialsRequest>, state: web::Data<AppState>) -> Result<HttpResponse> {
    info!("Received registration request for phone: {}", req.phone);
    match state.auth_service.register_farmer(&req.phone, &req.password).await {
        Ok((user, token)) => Ok(HttpResponse::Created().json(json!({
            "success": true,
            "token": token,
            "user": user,
        }))),
        Err(e) => {
            error!("Registration failed for phone: {}: {}", req.phone, e);
            Err(e)
        }
    }
}

pub async fn login(req: web::Json<CredentialsRequest>, state: web::Data<AppState>) -> Result<HttpResponse> {
    info!("Received login request for phone: {}", req.phone);
    match state.auth_service.login_farmer(&req.phone, &req.password).await {
        Ok((user, token)) => {
            info!("Login successful for user {}", user.id);
            Ok(HttpResponse::Ok().json(json!({
                "success": true,
                "token": token,
                "user": user,
            })))
        }
        Err(e) => {
            error!("Login failed for phone: {}: {}", req.phone, e);
            Err(e)
        }
    }
}

pub async fn get_profile(AuthenticatedUser(user): AuthenticatedUser) -> Result<HttpResponse> {
    Ok(HttpResponse::Ok().json(json!({ "success": true, "user": user })))
}

pub async fn update_profile(
    AuthenticatedUser(mut user): AuthenticatedUser,
    req: web::Json<ProfileUpdate>,
    state: web::Data<AppState>,
) -> Result<HttpResponse> {
    req.into_inner().apply(&mut user)?;
    let user = state.store.update_user(&user).await?;
    info!("Updated profile for user {}", user.id);
    Ok(HttpResponse::Ok().json(json!({ "success": true, "user": user })))
}

pub async fn logout(
    _user: AuthenticatedUser,
    BearerToken(token): BearerToken,
    state: web::Data<AppState>,
) -> Result<HttpResponse> {
    state.auth_service.invalidate_token(&token).await?;
    Ok(HttpResponse::Ok().json(json!({
        "success": true,
        "message": "Successfully logged out"
    })))
}

pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/auth")
            .route("/register", web::post().to(register))
            .route("/login", web::post().to(login))
            .route("/profile", web::get().to(get_profile))
            .route("/profile", web::put().to(update_profile))
            .route("/logout", web::post().to(logout)),
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::models::FarmSize;

    #[test]
    fn test_profile_update_skips_empty_fields() {
        let mut user = User::new("123".into(), "hash".into());
        user.name = "Ravi".into();

        let update = ProfileUpdate {
            name: Some("  ".into()),
            email: Some("Ravi@Farm.IN".into()),
            selected_crops: Some(vec!["rice".into(), "wheat".into()]),
            primary_crop: Some("rice".into()),
            farm_details: Some(FarmDetails {
                location: Some("Nashik".into()),
                size: Some(FarmSize::Small),
            }),
        };
        update.apply(&mut user).unwrap();

        assert_eq!(user.name, "Ravi");
        assert_eq!(user.email, "ravi@farm.in");
        assert_eq!(user.selected_crops, vec![SupportedCrop::Rice, SupportedCrop::Wheat]);
        assert_eq!(user.primary_crop, Some(SupportedCrop::Rice));
        assert!(user.profile_complete);
    }

    #[test]
    fn test_profile_update_rejects_unknown_crop() {
        let mut user = User::new("123".into(), "hash".into());
        let update = ProfileUpdate {
            selected_crops: Some(vec!["durian".into()]),
            ..Default::default()
        };
        assert!(matches!(update.apply(&mut user), Err(AppError::ValidationError(_))));
    }
}
