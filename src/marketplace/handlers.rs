use std::str::FromStr;

use actix_web::{web, HttpResponse};
use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::info;
use uuid::Uuid;

use crate::auth::{AuthenticatedInvestor, AuthenticatedUser};
use crate::db::models::{
    FarmRequest, FarmRequestResponse, FarmRequestStatus, FarmRequestType, InvestorOffer, OfferType,
};
use crate::db::store::{FarmRequestFilter, OfferFilter};
use crate::error::AppError;
use crate::marketplace::matching;
use crate::{AppState, Result};

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FarmRequestInput {
    #[serde(rename = "type", alias = "requestType")]
    pub request_type: Option<FarmRequestType>,
    pub farmer_id: Option<String>,
    pub farmer_name: Option<String>,
    pub location: Option<String>,
    pub contact_mobile: Option<String>,
    pub description: Option<String>,
    pub machinery_type: Option<String>,
    pub duration: Option<i32>,
    pub amount: Option<f64>,
    pub equity: Option<f64>,
    pub crop_type: Option<String>,
    pub land_size: Option<f64>,
    pub start_date: Option<DateTime<Utc>>,
    pub end_date: Option<DateTime<Utc>>,
    pub daily_payment: Option<f64>,
    pub workers_needed: Option<i32>,
    pub inventory: Option<String>,
    pub min_equity: Option<f64>,
}

fn required(value: Option<String>, field: &str) -> Result<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
        .ok_or_else(|| AppError::validation(format!("{} is required", field)))
}

fn trimmed(value: Option<String>) -> Option<String> {
    value.map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}

fn at_least(value: Option<f64>, min: f64, field: &str) -> Result<Option<f64>> {
    match value {
        Some(v) if v < min => Err(AppError::validation(format!("{} must be at least {}", field, min))),
        _ => Ok(value),
    }
}

fn percentage(value: Option<f64>, field: &str) -> Result<Option<f64>> {
    match value {
        Some(v) if !(0.0..=100.0).contains(&v) => {
            Err(AppError::validation(format!("{} must be between 0 and 100", field)))
        }
        _ => Ok(value),
    }
}

impl FarmRequestInput {
    /// `farmer` is the signed-in farmer, which wins over any `farmerId` in the body.
    pub fn into_request(self, farmer: Option<(Uuid, &str)>) -> Result<FarmRequest> {
        let request_type = self
            .request_type
            .ok_or_else(|| AppError::validation("Request type is required"))?;

        let farmer_name = match (trimmed(self.farmer_name), farmer) {
            (Some(name), _) => name,
            (None, Some((_, name))) if !name.trim().is_empty() => name.trim().to_string(),
            _ => return Err(AppError::validation("Farmer name is required")),
        };

        if matches!(self.duration, Some(days) if days < 1) {
            return Err(AppError::validation("duration must be at least 1"));
        }
        let workers_needed = self.workers_needed.unwrap_or(1);
        if workers_needed < 1 {
            return Err(AppError::validation("workersNeeded must be at least 1"));
        }

        let now = Utc::now();
        Ok(FarmRequest {
            id: Uuid::new_v4(),
            farmer_id: farmer.map(|(id, _)| id.to_string()).or_else(|| trimmed(self.farmer_id)),
            farmer_name,
            request_type,
            location: required(self.location, "Location")?,
            contact_mobile: required(self.contact_mobile, "Contact mobile")?,
            description: self.description.unwrap_or_default(),
            status: FarmRequestStatus::Pending,
            machinery_type: trimmed(self.machinery_type),
            duration_days: self.duration,
            amount: at_least(self.amount, 0.0, "amount")?,
            equity: percentage(self.equity, "equity")?,
            crop_type: trimmed(self.crop_type),
            land_size: at_least(self.land_size, 0.0, "landSize")?,
            start_date: self.start_date,
            end_date: self.end_date,
            daily_payment: at_least(self.daily_payment, 0.0, "dailyPayment")?,
            workers_needed,
            inventory: trimmed(self.inventory),
            min_equity: percentage(self.min_equity, "minEquity")?,
            response_count: 0,
            responses: Vec::new(),
            created_at: now,
            updated_at: now,
        })
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OfferInput {
    #[serde(rename = "type", alias = "offerType")]
    pub offer_type: Option<OfferType>,
    pub location: Option<String>,
    pub amount: Option<f64>,
    pub min_equity: Option<f64>,
    pub description: Option<String>,
    pub contact_mobile: Option<String>,
}

impl OfferInput {
    pub fn into_offer(self, investor_id: Option<Uuid>) -> Result<InvestorOffer> {
        let offer_type = self
            .offer_type
            .ok_or_else(|| AppError::validation("Offer type is required"))?;
        Ok(InvestorOffer {
            id: Uuid::new_v4(),
            investor_id,
            offer_type,
            location: self.location.map(|l| l.trim().to_string()).unwrap_or_default(),
            amount: at_least(self.amount, 0.0, "amount")?,
            min_equity: percentage(self.min_equity, "minEquity")?,
            description: self.description.unwrap_or_default(),
            contact_mobile: trimmed(self.contact_mobile),
            status: "active".to_string(),
            created_at: Utc::now(),
        })
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct ListQuery {
    #[serde(rename = "type")]
    pub kind: Option<String>,
    pub location: Option<String>,
}

/// Parses a wire enum from a query string, accepting the same labels as request bodies.
fn parse_kind<T: DeserializeOwned>(kind: Option<String>, what: &str) -> Result<Option<T>> {
    match trimmed(kind) {
        Some(kind) => serde_json::from_value(Value::String(kind.clone()))
            .map(Some)
            .map_err(|_| AppError::validation(format!("Invalid {}: {}", what, kind))),
        None => Ok(None),
    }
}

pub async fn submit_request(
    user: Option<AuthenticatedUser>,
    req: web::Json<FarmRequestInput>,
    state: web::Data<AppState>,
) -> Result<HttpResponse> {
    let farmer = user.as_ref().map(|AuthenticatedUser(u)| (u.id, u.name.as_str()));
    let request = req.into_inner().into_request(farmer)?;
    let request = state.store.create_farm_request(&request).await?;
    info!("Marketplace {} request {} submitted", request.request_type, request.id);

    Ok(HttpResponse::Ok().json(json!({
        "success": true,
        "message": "Request submitted successfully",
        "requestId": request.id,
    })))
}

pub async fn post_offer(
    investor: Option<AuthenticatedInvestor>,
    req: web::Json<OfferInput>,
    state: web::Data<AppState>,
) -> Result<HttpResponse> {
    let offer = req.into_inner().into_offer(investor.map(|AuthenticatedInvestor(i)| i.id))?;
    let offer = state.store.create_offer(&offer).await?;

    let candidates = state
        .store
        .list_farm_requests(&FarmRequestFilter {
            request_type: Some(matching::wanted_request_type(offer.offer_type)),
            location: None,
        })
        .await?;
    // listings are newest first, matches go to the earliest requests
    let matches = matching::find_matches(&offer, candidates.iter().rev());
    info!("Offer {} posted with {} matches", offer.id, matches.len());

    Ok(HttpResponse::Ok().json(json!({
        "success": true,
        "message": "Offer posted successfully",
        "offerId": offer.id,
        "matches": matches,
    })))
}

pub async fn list_requests(query: web::Query<ListQuery>, state: web::Data<AppState>) -> Result<HttpResponse> {
    let query = query.into_inner();
    let filter = FarmRequestFilter {
        request_type: parse_kind(query.kind, "request type")?,
        location: trimmed(query.location),
    };
    let requests = state.store.list_farm_requests(&filter).await?;
    Ok(HttpResponse::Ok().json(json!({ "success": true, "requests": requests })))
}

pub async fn list_offers(query: web::Query<ListQuery>, state: web::Data<AppState>) -> Result<HttpResponse> {
    let query = query.into_inner();
    let filter = OfferFilter {
        offer_type: parse_kind(query.kind, "offer type")?,
        location: trimmed(query.location),
    };
    let offers = state.store.list_offers(&filter).await?;
    Ok(HttpResponse::Ok().json(json!({ "success": true, "offers": offers })))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RespondRequest {
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub contact_info: String,
}

pub async fn respond(
    AuthenticatedInvestor(investor): AuthenticatedInvestor,
    path: web::Path<String>,
    req: web::Json<RespondRequest>,
    state: web::Data<AppState>,
) -> Result<HttpResponse> {
    let not_found = || AppError::not_found("Request not found");
    let id = Uuid::from_str(path.trim()).map_err(|_| not_found())?;
    let req = req.into_inner();

    let contact_info = if req.contact_info.trim().is_empty() {
        investor.phone.clone()
    } else {
        req.contact_info.trim().to_string()
    };
    let response = FarmRequestResponse {
        investor_id: investor.id,
        message: req.message,
        contact_info,
        responded_at: Utc::now(),
    };

    let request = state
        .store
        .add_farm_request_response(id, &response)
        .await?
        .ok_or_else(not_found)?;
    info!("Investor {} responded to request {}", investor.id, request.id);

    Ok(HttpResponse::Ok().json(json!({
        "success": true,
        "message": "Response sent successfully",
        "data": request,
    })))
}

pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/farmer-investor")
            .route("/farmer-request", web::post().to(submit_request))
            .route("/investor-offer", web::post().to(post_offer))
            .route("/farmer-requests", web::get().to(list_requests))
            .route("/farmer-requests/{id}/respond", web::post().to(respond))
            .route("/investor-offers", web::get().to(list_offers)),
    );
}
