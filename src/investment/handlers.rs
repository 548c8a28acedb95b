use std::str::FromStr;

use actix_web::{web, HttpResponse};
use chrono::Utc;
use futures::future::join_all;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{info, warn};
use uuid::Uuid;

use crate::auth::{AuthenticatedUser, Principal};
use crate::db::models::{FarmerRequest, FarmerRequestStatus, InterestStatus, InvestorInterest};
use crate::db::store::OpportunityFilter;
use crate::error::{AppError, DatabaseError};
use crate::{AppState, Result};

pub const DEFAULT_INTEREST_MESSAGE: &str = "I am interested in investing in your farming project.";
const DUPLICATE_INTEREST: &str = "Interest already expressed for this opportunity";

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FarmerRequestInput {
    pub farmer_name: Option<String>,
    pub crop_type: Option<String>,
    pub location: Option<String>,
    pub land_size: Option<f64>,
    pub investment_needed: Option<f64>,
    pub equity_offered: Option<f64>,
    pub tax_rate: Option<f64>,
    pub contact_mobile: Option<String>,
    pub description: Option<String>,
}

fn required_text(value: Option<String>, field: &str) -> Result<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
        .ok_or_else(|| AppError::validation(format!("{} is required", field)))
}

fn required_number(value: Option<f64>, field: &str, min: f64, max: f64) -> Result<f64> {
    let value = value.ok_or_else(|| AppError::validation(format!("{} is required", field)))?;
    if !value.is_finite() || value < min || value > max {
        return Err(AppError::validation(format!("{} is out of range", field)));
    }
    Ok(value)
}

impl FarmerRequestInput {
    pub fn into_request(self, farmer_id: Uuid) -> Result<FarmerRequest> {
        let now = Utc::now();
        Ok(FarmerRequest {
            id: Uuid::new_v4(),
            farmer_id,
            farmer_name: required_text(self.farmer_name, "farmerName")?,
            crop_type: required_text(self.crop_type, "cropType")?,
            location: required_text(self.location, "location")?,
            land_size: required_number(self.land_size, "landSize", 0.0, f64::MAX)?,
            investment_needed: required_number(self.investment_needed, "investmentNeeded", 0.0, f64::MAX)?,
            equity_offered: required_number(self.equity_offered, "equityOffered", 0.0, 100.0)?,
            tax_rate: required_number(self.tax_rate, "taxRate", 0.0, 50.0)?,
            contact_mobile: required_text(self.contact_mobile, "contactMobile")?,
            description: self.description.unwrap_or_default(),
            status: FarmerRequestStatus::Active,
            interest_count: 0,
            created_at: now,
            updated_at: now,
        })
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OpportunityQuery {
    pub crop_type: Option<String>,
    pub location: Option<String>,
    pub min_equity: Option<f64>,
    pub max_equity: Option<f64>,
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}

impl From<OpportunityQuery> for OpportunityFilter {
    fn from(query: OpportunityQuery) -> Self {
        Self {
            crop_type: non_empty(query.crop_type),
            location: non_empty(query.location),
            min_equity: query.min_equity,
            max_equity: query.max_equity,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct FarmerContact {
    pub id: Uuid,
    pub name: String,
    pub phone: String,
}

#[derive(Debug, Serialize)]
pub struct Opportunity {
    #[serde(flatten)]
    pub request: FarmerRequest,
    pub farmer: Option<FarmerContact>,
}

#[derive(Debug, Clone, Serialize)]
pub struct InvestorContact {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub phone: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RequestSummary {
    pub crop_type: String,
    pub investment_needed: f64,
    pub equity_offered: f64,
}

impl From<&FarmerRequest> for RequestSummary {
    fn from(request: &FarmerRequest) -> Self {
        Self {
            crop_type: request.crop_type.clone(),
            investment_needed: request.investment_needed,
            equity_offered: request.equity_offered,
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InterestView {
    #[serde(flatten)]
    pub interest: InvestorInterest,
    pub investor: Option<InvestorContact>,
    pub farmer_request: Option<RequestSummary>,
}

/// Contact details for whoever expressed the interest. Farmers can act as
/// investors, so the user table is consulted when no investor matches.
async fn investor_contact(state: &AppState, id: Uuid) -> Result<Option<InvestorContact>> {
    if let Some(investor) = state.store.get_investor_by_id(id).await? {
        return Ok(Some(InvestorContact {
            id,
            name: investor.name,
            email: investor.email,
            phone: investor.phone,
        }));
    }
    Ok(state.store.get_user_by_id(id).await?.map(|user| InvestorContact {
        id,
        name: user.name,
        email: user.email,
        phone: user.phone,
    }))
}

async fn interest_view(state: &AppState, interest: InvestorInterest) -> Result<InterestView> {
    let investor = investor_contact(state, interest.investor_id).await?;
    let farmer_request = state
        .store
        .get_farmer_request(interest.farmer_request_id)
        .await?
        .as_ref()
        .map(RequestSummary::from);
    Ok(InterestView {
        interest,
        investor,
        farmer_request,
    })
}

pub async fn create_request(
    AuthenticatedUser(user): AuthenticatedUser,
    req: web::Json<FarmerRequestInput>,
    state: web::Data<AppState>,
) -> Result<HttpResponse> {
    let request = req.into_inner().into_request(user.id)?;
    let request = state.store.create_farmer_request(&request).await?;
    info!("Farmer {} posted investment request {}", user.id, request.id);
    Ok(HttpResponse::Created().json(json!({ "success": true, "data": request })))
}

pub async fn list_opportunities(
    query: web::Query<OpportunityQuery>,
    state: web::Data<AppState>,
) -> Result<HttpResponse> {
    let filter = OpportunityFilter::from(query.into_inner());
    let requests = state.store.list_opportunities(&filter).await?;

    let farmers = join_all(requests.iter().map(|r| state.store.get_user_by_id(r.farmer_id))).await;
    let data = requests
        .into_iter()
        .zip(farmers)
        .map(|(request, farmer)| {
            let farmer = farmer?.map(|user| FarmerContact {
                id: user.id,
                name: user.name,
                phone: user.phone,
            });
            Ok(Opportunity { request, farmer })
        })
        .collect::<Result<Vec<_>>>()?;

    Ok(HttpResponse::Ok().json(json!({ "success": true, "data": data })))
}

pub async fn my_requests(AuthenticatedUser(user): AuthenticatedUser, state: web::Data<AppState>) -> Result<HttpResponse> {
    let requests = state.store.list_farmer_requests_by_farmer(user.id).await?;
    Ok(HttpResponse::Ok().json(json!({ "success": true, "data": requests })))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InterestRequest {
    #[serde(default)]
    pub farmer_request_id: String,
    pub message: Option<String>,
}

pub async fn express_interest(
    principal: Principal,
    req: web::Json<InterestRequest>,
    state: web::Data<AppState>,
) -> Result<HttpResponse> {
    let req = req.into_inner();
    let not_found = || AppError::not_found("Farmer request not found");

    let request_id = Uuid::from_str(req.farmer_request_id.trim()).map_err(|_| not_found())?;
    let request = state.store.get_farmer_request(request_id).await?.ok_or_else(not_found)?;

    let investor_id = principal.id();
    if let Principal::Farmer(_) = principal {
        warn!("Farmer {} is expressing interest as an investor", investor_id);
    }

    if state.store.find_interest(investor_id, request.id).await?.is_some() {
        return Err(AppError::validation(DUPLICATE_INTEREST));
    }

    let now = Utc::now();
    let interest = InvestorInterest {
        id: Uuid::new_v4(),
        investor_id,
        farmer_request_id: request.id,
        farmer_id: request.farmer_id,
        message: non_empty(req.message).unwrap_or_else(|| DEFAULT_INTEREST_MESSAGE.to_string()),
        status: InterestStatus::Pending,
        notification_sent: false,
        created_at: now,
        updated_at: now,
    };

    let interest = match state.store.create_interest(&interest).await {
        Ok(interest) => interest,
        Err(AppError::DatabaseError(DatabaseError::Duplicate(_))) => {
            return Err(AppError::validation(DUPLICATE_INTEREST));
        }
        Err(e) => return Err(e),
    };
    state.store.increment_interest_count(request.id).await?;
    info!("Investor {} interested in request {}", investor_id, request.id);

    Ok(HttpResponse::Created().json(json!({
        "success": true,
        "message": "Interest expressed successfully! The farmer will be notified.",
        "data": interest,
    })))
}

pub async fn my_interests(AuthenticatedUser(user): AuthenticatedUser, state: web::Data<AppState>) -> Result<HttpResponse> {
    let interests = state.store.list_interests_for_farmer(user.id).await?;
    let views = join_all(interests.into_iter().map(|i| interest_view(&state, i)))
        .await
        .into_iter()
        .collect::<Result<Vec<_>>>()?;
    Ok(HttpResponse::Ok().json(json!({ "success": true, "data": views })))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InterestStatusRequest {
    #[serde(default)]
    pub interest_id: String,
    #[serde(default)]
    pub status: String,
}

pub async fn update_interest_status(
    AuthenticatedUser(user): AuthenticatedUser,
    req: web::Json<InterestStatusRequest>,
    state: web::Data<AppState>,
) -> Result<HttpResponse> {
    let status = InterestStatus::from_str(req.status.trim())
        .map_err(|_| AppError::validation(format!("Invalid interest status: {}", req.status)))?;
    let not_found = || AppError::not_found("Interest not found");
    let interest_id = Uuid::from_str(req.interest_id.trim()).map_err(|_| not_found())?;

    let interest = state
        .store
        .update_interest_status(interest_id, user.id, status)
        .await?
        .ok_or_else(not_found)?;
    info!("Farmer {} marked interest {} as {}", user.id, interest.id, status);

    let view = interest_view(&state, interest).await?;
    Ok(HttpResponse::Ok().json(json!({ "success": true, "data": view })))
}

pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/investment")
            .route("/farmer/request", web::post().to(create_request))
            .route("/farmer/my-requests", web::get().to(my_requests))
            .route("/farmer/interests", web::get().to(my_interests))
            .route("/farmer/interest-status", web::put().to(update_interest_status))
            .route("/opportunities", web::get().to(list_opportunities))
            .route("/investor/interest", web::post().to(express_interest)),
    );
}
