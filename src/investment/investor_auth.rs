use actix_web::{web, HttpResponse};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{error, info};
use uuid::Uuid;

use crate::auth::{AuthenticatedInvestor, BearerToken, NewInvestor};
use crate::db::models::Investor;
use crate::error::{AppError, DatabaseError};
use crate::{AppState, Result};

const DUPLICATE_INVESTOR: &str = "Investor already exists with this email or phone";

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password: String,
}

/// Public part of an investor returned next to a fresh token.
#[derive(Debug, Serialize)]
pub struct InvestorSummary<'a> {
    pub id: Uuid,
    pub name: &'a str,
    pub email: &'a str,
    pub phone: &'a str,
    pub role: &'a str,
}

impl<'a> From<&'a Investor> for InvestorSummary<'a> {
    fn from(investor: &'a Investor) -> Self {
        Self {
            id: investor.id,
            name: &investor.name,
            email: &investor.email,
            phone: &investor.phone,
            role: &investor.role,
        }
    }
}

/// Profile fields an investor may change. Unknown fields such as `password` are ignored.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InvestorUpdate {
    pub name: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub investment_capacity: Option<f64>,
    pub preferred_crops: Option<Vec<String>>,
    pub preferred_locations: Option<Vec<String>>,
}

impl InvestorUpdate {
    pub fn apply(self, investor: &mut Investor) -> Result<()> {
        if let Some(name) = self.name {
            let name = name.trim();
            if name.is_empty() {
                return Err(AppError::validation("Name cannot be empty"));
            }
            investor.name = name.to_string();
        }
        if let Some(email) = self.email {
            let email = email.trim().to_lowercase();
            if email.is_empty() {
                return Err(AppError::validation("Email cannot be empty"));
            }
            investor.email = email;
        }
        if let Some(phone) = self.phone {
            let phone = phone.trim();
            if phone.is_empty() {
                return Err(AppError::validation("Phone cannot be empty"));
            }
            investor.phone = phone.to_string();
        }
        if let Some(capacity) = self.investment_capacity {
            if capacity < 0.0 {
                return Err(AppError::validation("Investment capacity cannot be negative"));
            }
            investor.investment_capacity = capacity;
        }
        if let Some(crops) = self.preferred_crops {
            investor.preferred_crops = crops;
        }
        if let Some(locations) = self.preferred_locations {
            investor.preferred_locations = locations;
        }
        investor.updated_at = Utc::now();
        Ok(())
    }
}

fn session_body(investor: &Investor, token: &str) -> serde_json::Value {
    json!({
        "success": true,
        "data": {
            "investor": InvestorSummary::from(investor),
            "token": token,
        }
    })
}

pub async fn register(req: web::Json<NewInvestor>, state: web::Data<AppState>) -> Result<HttpResponse> {
    let email = req.email.clone();
    info!("Received investor registration for {}", email);
    match state.auth_service.register_investor(req.into_inner()).await {
        Ok((investor, token)) => Ok(HttpResponse::Created().json(session_body(&investor, &token))),
        Err(e) => {
            error!("Investor registration failed for {}: {}", email, e);
            Err(e)
        }
    }
}

pub async fn login(req: web::Json<LoginRequest>, state: web::Data<AppState>) -> Result<HttpResponse> {
    let (investor, token) = state.auth_service.login_investor(&req.email, &req.password).await?;
    info!("Investor {} logged in", investor.id);
    Ok(HttpResponse::Ok().json(session_body(&investor, &token)))
}

pub async fn get_profile(AuthenticatedInvestor(investor): AuthenticatedInvestor) -> Result<HttpResponse> {
    Ok(HttpResponse::Ok().json(json!({ "success": true, "data": investor })))
}

pub async fn update_profile(
    AuthenticatedInvestor(mut investor): AuthenticatedInvestor,
    req: web::Json<InvestorUpdate>,
    state: web::Data<AppState>,
) -> Result<HttpResponse> {
    req.into_inner().apply(&mut investor)?;
    let investor = match state.store.update_investor(&investor).await {
        Ok(investor) => investor,
        Err(AppError::DatabaseError(DatabaseError::Duplicate(_))) => {
            return Err(AppError::validation(DUPLICATE_INVESTOR));
        }
        Err(e) => return Err(e),
    };
    Ok(HttpResponse::Ok().json(json!({ "success": true, "data": investor })))
}

pub async fn logout(
    _investor: AuthenticatedInvestor,
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
        web::scope("/investor-auth")
            .route("/register", web::post().to(register))
            .route("/login", web::post().to(login))
            .route("/profile", web::get().to(get_profile))
            .route("/profile", web::put().to(update_profile))
            .route("/logout", web::post().to(logout)),
    );
}
