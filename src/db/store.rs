use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::db::models::{
    Crop, Diagnosis, FarmRequest, FarmRequestResponse, FarmRequestType, FarmerRequest, InterestStatus, Investor,
    InvestorInterest, InvestorOffer, OfferType, ScanRecord, Session, User,
};
use crate::Result;

/// Filters for the public investment opportunity listing.
#[derive(Debug, Clone, Default)]
pub struct OpportunityFilter {
    pub crop_type: Option<String>,
    pub location: Option<String>,
    pub min_equity: Option<f64>,
    pub max_equity: Option<f64>,
}

#[derive(Debug, Clone, Default)]
pub struct FarmRequestFilter {
    pub request_type: Option<FarmRequestType>,
    pub location: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct OfferFilter {
    pub offer_type: Option<OfferType>,
    pub location: Option<String>,
}

/// Case-insensitive substring test shared by the store backends.
pub(crate) fn contains_ci(haystack: &str, needle: &str) -> bool {
    haystack.to_lowercase().contains(&needle.to_lowercase())
}

/// Persistence boundary for every handler. Implementations enforce the unique
/// constraints (user phone, investor email and phone, one interest per investor and
/// request) and report violations as `DatabaseError::Duplicate`.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Store: Send + Sync {
    /// Backend name reported by the health endpoint.
    fn backend(&self) -> &'static str;

    async fn ping(&self) -> Result<()>;

    // Farmers
    async fn create_user(&self, user: &User) -> Result<User>;
    async fn get_user_by_id(&self, id: Uuid) -> Result<Option<User>>;
    async fn get_user_by_phone(&self, phone: &str) -> Result<Option<User>>;
    async fn update_user(&self, user: &User) -> Result<User>;

    // Investors
    async fn create_investor(&self, investor: &Investor) -> Result<Investor>;
    async fn get_investor_by_id(&self, id: Uuid) -> Result<Option<Investor>>;
    async fn get_investor_by_email(&self, email: &str) -> Result<Option<Investor>>;
    async fn find_investor_by_email_or_phone(&self, email: &str, phone: &str) -> Result<Option<Investor>>;
    async fn update_investor(&self, investor: &Investor) -> Result<Investor>;

    // Sessions
    async fn create_session(&self, session: &Session) -> Result<Session>;
    async fn get_session(&self, token_hash: &str) -> Result<Option<Session>>;
    async fn touch_session(&self, token_hash: &str) -> Result<()>;
    async fn delete_session(&self, token_hash: &str) -> Result<()>;
    async fn cleanup_expired_sessions(&self) -> Result<u64>;

    // Crops
    async fn create_crop(&self, crop: &Crop) -> Result<Crop>;
    async fn list_crops(&self, user_id: Uuid) -> Result<Vec<Crop>>;
    async fn get_crop(&self, user_id: Uuid, id: Uuid) -> Result<Option<Crop>>;
    async fn update_crop(&self, crop: &Crop) -> Result<Crop>;
    async fn delete_crop(&self, user_id: Uuid, id: Uuid) -> Result<bool>;

    // Diagnoses
    async fn create_diagnosis(&self, diagnosis: &Diagnosis) -> Result<Diagnosis>;
    async fn list_diagnoses(&self, user_id: Uuid) -> Result<Vec<Diagnosis>>;
    async fn get_diagnosis(&self, user_id: Uuid, id: Uuid) -> Result<Option<Diagnosis>>;
    async fn update_diagnosis(&self, diagnosis: &Diagnosis) -> Result<Diagnosis>;

    // Scan records
    async fn create_scan(&self, scan: &ScanRecord) -> Result<ScanRecord>;
    /// Scans with `since <= timestamp < until`, oldest first.
    async fn scans_between(
        &self,
        user_id: Uuid,
        since: DateTime<Utc>,
        until: Option<DateTime<Utc>>,
    ) -> Result<Vec<ScanRecord>>;
    /// The `limit` newest scans, newest first.
    async fn recent_scans(&self, user_id: Uuid, limit: usize) -> Result<Vec<ScanRecord>>;

    // Investment requests
    async fn create_farmer_request(&self, request: &FarmerRequest) -> Result<FarmerRequest>;
    async fn get_farmer_request(&self, id: Uuid) -> Result<Option<FarmerRequest>>;
    /// Active requests matching the filter, newest first.
    async fn list_opportunities(&self, filter: &OpportunityFilter) -> Result<Vec<FarmerRequest>>;
    async fn list_farmer_requests_by_farmer(&self, farmer_id: Uuid) -> Result<Vec<FarmerRequest>>;
    async fn increment_interest_count(&self, id: Uuid) -> Result<()>;

    // Investor interests
    async fn create_interest(&self, interest: &InvestorInterest) -> Result<InvestorInterest>;
    async fn find_interest(&self, investor_id: Uuid, farmer_request_id: Uuid) -> Result<Option<InvestorInterest>>;
    async fn list_interests_for_farmer(&self, farmer_id: Uuid) -> Result<Vec<InvestorInterest>>;
    /// Updates only when `farmer_id` owns the interest.
    async fn update_interest_status(
        &self,
        id: Uuid,
        farmer_id: Uuid,
        status: InterestStatus,
    ) -> Result<Option<InvestorInterest>>;

    // Marketplace
    async fn create_farm_request(&self, request: &FarmRequest) -> Result<FarmRequest>;
    async fn get_farm_request(&self, id: Uuid) -> Result<Option<FarmRequest>>;
    /// Newest first.
    async fn list_farm_requests(&self, filter: &FarmRequestFilter) -> Result<Vec<FarmRequest>>;
    async fn add_farm_request_response(&self, id: Uuid, response: &FarmRequestResponse) -> Result<Option<FarmRequest>>;
    async fn create_offer(&self, offer: &InvestorOffer) -> Result<InvestorOffer>;
    /// Newest first.
    async fn list_offers(&self, filter: &OfferFilter) -> Result<Vec<InvestorOffer>>;
}
