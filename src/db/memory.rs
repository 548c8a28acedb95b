use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::db::models::{
    Crop, Diagnosis, FarmRequest, FarmRequestResponse, FarmerRequest, FarmerRequestStatus, InterestStatus, Investor,
    InvestorInterest, InvestorOffer, ScanRecord, Session, User,
};
use crate::db::store::{contains_ci, FarmRequestFilter, OfferFilter, OpportunityFilter, Store};
use crate::error::DatabaseError;
use crate::Result;

#[derive(Default)]
struct Tables {
    users: HashMap<Uuid, User>,
    investors: HashMap<Uuid, Investor>,
    sessions: HashMap<String, Session>,
    crops: HashMap<Uuid, Crop>,
    diagnoses: HashMap<Uuid, Diagnosis>,
    scans: Vec<ScanRecord>,
    farmer_requests: HashMap<Uuid, FarmerRequest>,
    interests: HashMap<Uuid, InvestorInterest>,
    farm_requests: HashMap<Uuid, FarmRequest>,
    offers: Vec<InvestorOffer>,
}

/// Process-local store used in tests and when Postgres is unreachable.
#[derive(Default)]
pub struct MemoryStore {
    tables: RwLock<Tables>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

fn duplicate(what: &str) -> crate::AppError {
    DatabaseError::Duplicate(what.to_string()).into()
}

fn newest_first<T, F>(mut items: Vec<T>, created_at: F) -> Vec<T>
where
    F: Fn(&T) -> DateTime<Utc>,
{
    items.sort_by_key(|item| std::cmp::Reverse(created_at(item)));
    items
}

#[async_trait]
impl Store for MemoryStore {
    fn backend(&self) -> &'static str {
        "memory"
    }

    async fn ping(&self) -> Result<()> {
        Ok(())
    }

    async fn create_user(&self, user: &User) -> Result<User> {
        let mut tables = self.tables.write().await;
        if tables.users.values().any(|u| u.phone == user.phone) {
            return Err(duplicate("users.phone"));
        }
        tables.users.insert(user.id, user.clone());
        Ok(user.clone())
    }

    async fn get_user_by_id(&self, id: Uuid) -> Result<Option<User>> {
        Ok(self.tables.read().await.users.get(&id).cloned())
    }

    async fn get_user_by_phone(&self, phone: &str) -> Result<Option<User>> {
        let tables = self.tables.read().await;
        Ok(tables.users.values().find(|u| u.phone == phone).cloned())
    }

    async fn update_user(&self, user: &User) -> Result<User> {
        let mut tables = self.tables.write().await;
        match tables.users.get_mut(&user.id) {
            Some(existing) => {
                *existing = user.clone();
                Ok(user.clone())
            }
            None => Err(DatabaseError::NotFound.into()),
        }
    }

    async fn create_investor(&self, investor: &Investor) -> Result<Investor> {
        let mut tables = self.tables.write().await;
        if tables.investors.values().any(|i| i.email == investor.email) {
            return Err(duplicate("investors.email"));
        }
        if tables.investors.values().any(|i| i.phone == investor.phone) {
            return Err(duplicate("investors.phone"));
        }
        tables.investors.insert(investor.id, investor.clone());
        Ok(investor.clone())
    }

    async fn get_investor_by_id(&self, id: Uuid) -> Result<Option<Investor>> {
        Ok(self.tables.read().await.investors.get(&id).cloned())
    }

    async fn get_investor_by_email(&self, email: &str) -> Result<Option<Investor>> {
        let tables = self.tables.read().await;
        Ok(tables.investors.values().find(|i| i.email == email).cloned())
    }

    async fn find_investor_by_email_or_phone(&self, email: &str, phone: &str) -> Result<Option<Investor>> {
        let tables = self.tables.read().await;
        Ok(tables
            .investors
            .values()
            .find(|i| i.email == email || i.phone == phone)
            .cloned())
    }

    async fn update_investor(&self, investor: &Investor) -> Result<Investor> {
        let mut tables = self.tables.write().await;
        let clash = tables
            .investors
            .values()
            .any(|i| i.id != investor.id && (i.email == investor.email || i.phone == investor.phone));
        if clash {
            return Err(duplicate("investors.email_or_phone"));
        }
        match tables.investors.get_mut(&investor.id) {
            Some(existing) => {
                *existing = investor.clone();
                Ok(investor.clone())
            }
            None => Err(DatabaseError::NotFound.into()),
        }
    }

    async fn create_session(&self, session: &Session) -> Result<Session> {
        let mut tables = self.tables.write().await;
        if tables.sessions.contains_key(&session.token_hash) {
            return Err(duplicate("sessions.token_hash"));
        }
        tables.sessions.insert(session.token_hash.clone(), session.clone());
        Ok(session.clone())
    }

    async fn get_session(&self, token_hash: &str) -> Result<Option<Session>> {
        Ok(self.tables.read().await.sessions.get(token_hash).cloned())
    }

    async fn touch_session(&self, token_hash: &str) -> Result<()> {
        if let Some(session) = self.tables.write().await.sessions.get_mut(token_hash) {
            session.last_activity = Utc::now();
        }
        Ok(())
    }

    async fn delete_session(&self, token_hash: &str) -> Result<()> {
        self.tables.write().await.sessions.remove(token_hash);
        Ok(())
    }

    async fn cleanup_expired_sessions(&self) -> Result<u64> {
        let mut tables = self.tables.write().await;
        let before = tables.sessions.len();
        tables.sessions.retain(|_, session| !session.is_expired());
        Ok((before - tables.sessions.len()) as u64)
    }

    async fn create_crop(&self, crop: &Crop) -> Result<Crop> {
        self.tables.write().await.crops.insert(crop.id, crop.clone());
        Ok(crop.clone())
    }

    async fn list_crops(&self, user_id: Uuid) -> Result<Vec<Crop>> {
        let tables = self.tables.read().await;
        let crops = tables.crops.values().filter(|c| c.user_id == user_id).cloned().collect();
        Ok(newest_first(crops, |c| c.created_at))
    }

    async fn get_crop(&self, user_id: Uuid, id: Uuid) -> Result<Option<Crop>> {
        let tables = self.tables.read().await;
        Ok(tables.crops.get(&id).filter(|c| c.user_id == user_id).cloned())
    }

    async fn update_crop(&self, crop: &Crop) -> Result<Crop> {
        let mut tables = self.tables.write().await;
        match tables.crops.get_mut(&crop.id).filter(|c| c.user_id == crop.user_id) {
            Some(existing) => {
                *existing = crop.clone();
                Ok(crop.clone())
            }
            None => Err(DatabaseError::NotFound.into()),
        }
    }

    async fn delete_crop(&self, user_id: Uuid, id: Uuid) -> Result<bool> {
        let mut tables = self.tables.write().await;
        let owned = tables.crops.get(&id).map_or(false, |c| c.user_id == user_id);
        if !owned {
            return Ok(false);
        }
        tables.crops.remove(&id);
        for diagnosis in tables.diagnoses.values_mut() {
            if diagnosis.crop_id == Some(id) {
                diagnosis.crop_id = None;
            }
        }
        Ok(true)
    }

    async fn create_diagnosis(&self, diagnosis: &Diagnosis) -> Result<Diagnosis> {
        self.tables.write().await.diagnoses.insert(diagnosis.id, diagnosis.clone());
        Ok(diagnosis.clone())
    }

    async fn list_diagnoses(&self, user_id: Uuid) -> Result<Vec<Diagnosis>> {
        let tables = self.tables.read().await;
        let diagnoses = tables.diagnoses.values().filter(|d| d.user_id == user_id).cloned().collect();
        Ok(newest_first(diagnoses, |d| d.created_at))
    }

    async fn get_diagnosis(&self, user_id: Uuid, id: Uuid) -> Result<Option<Diagnosis>> {
        let tables = self.tables.read().await;
        Ok(tables.diagnoses.get(&id).filter(|d| d.user_id == user_id).cloned())
    }

    async fn update_diagnosis(&self, diagnosis: &Diagnosis) -> Result<Diagnosis> {
        let mut tables = self.tables.write().await;
        match tables
            .diagnoses
            .get_mut(&diagnosis.id)
            .filter(|d| d.user_id == diagnosis.user_id)
        {
            Some(existing) => {
                *existing = diagnosis.clone();
                Ok(diagnosis.clone())
            }
            None => Err(DatabaseError::NotFound.into()),
        }
    }

    async fn create_scan(&self, scan: &ScanRecord) -> Result<ScanRecord> {
        self.tables.write().await.scans.push(scan.clone());
        Ok(scan.clone())
    }

    async fn scans_between(
        &self,
        user_id: Uuid,
        since: DateTime<Utc>,
        until: Option<DateTime<Utc>>,
    ) -> Result<Vec<ScanRecord>> {
        let tables = self.tables.read().await;
        let mut scans: Vec<ScanRecord> = tables
            .scans
            .iter()
            .filter(|s| s.user_id == user_id && s.timestamp >= since)
            .filter(|s| until.map_or(true, |until| s.timestamp < until))
            .cloned()
            .collect();
        scans.sort_by_key(|s| s.timestamp);
        Ok(scans)
    }

    async fn recent_scans(&self, user_id: Uuid, limit: usize) -> Result<Vec<ScanRecord>> {
        let tables = self.tables.read().await;
        let scans = tables.scans.iter().filter(|s| s.user_id == user_id).cloned().collect();
        let mut scans = newest_first(scans, |s| s.timestamp);
        scans.truncate(limit);
        Ok(scans)
    }

    async fn create_farmer_request(&self, request: &FarmerRequest) -> Result<FarmerRequest> {
        self.tables.write().await.farmer_requests.insert(request.id, request.clone());
        Ok(request.clone())
    }

    async fn get_farmer_request(&self, id: Uuid) -> Result<Option<FarmerRequest>> {
        Ok(self.tables.read().await.farmer_requests.get(&id).cloned())
    }

    async fn list_opportunities(&self, filter: &OpportunityFilter) -> Result<Vec<FarmerRequest>> {
        let tables = self.tables.read().await;
        let requests = tables
            .farmer_requests
            .values()
            .filter(|r| r.status == FarmerRequestStatus::Active)
            .filter(|r| filter.crop_type.as_deref().map_or(true, |c| contains_ci(&r.crop_type, c)))
            .filter(|r| filter.location.as_deref().map_or(true, |l| contains_ci(&r.location, l)))
            .filter(|r| filter.min_equity.map_or(true, |min| r.equity_offered >= min))
            .filter(|r| filter.max_equity.map_or(true, |max| r.equity_offered <= max))
            .cloned()
            .collect();
        Ok(newest_first(requests, |r| r.created_at))
    }

    async fn list_farmer_requests_by_farmer(&self, farmer_id: Uuid) -> Result<Vec<FarmerRequest>> {
        let tables = self.tables.read().await;
        let requests = tables
            .farmer_requests
            .values()
            .filter(|r| r.farmer_id == farmer_id)
            .cloned()
            .collect();
        Ok(newest_first(requests, |r| r.created_at))
    }

    async fn increment_interest_count(&self, id: Uuid) -> Result<()> {
        let mut tables = self.tables.write().await;
        let request = tables.farmer_requests.get_mut(&id).ok_or(DatabaseError::NotFound)?;
        request.interest_count += 1;
        request.updated_at = Utc::now();
        Ok(())
    }

    async fn create_interest(&self, interest: &InvestorInterest) -> Result<InvestorInterest> {
        let mut tables = self.tables.write().await;
        let exists = tables.interests.values().any(|i| {
            i.investor_id == interest.investor_id && i.farmer_request_id == interest.farmer_request_id
        });
        if exists {
            return Err(duplicate("investor_interests.investor_id_farmer_request_id"));
        }
        tables.interests.insert(interest.id, interest.clone());
        Ok(interest.clone())
    }

    async fn find_interest(&self, investor_id: Uuid, farmer_request_id: Uuid) -> Result<Option<InvestorInterest>> {
        let tables = self.tables.read().await;
        Ok(tables
            .interests
            .values()
            .find(|i| i.investor_id == investor_id && i.farmer_request_id == farmer_request_id)
            .cloned())
    }

    async fn list_interests_for_farmer(&self, farmer_id: Uuid) -> Result<Vec<InvestorInterest>> {
        let tables = self.tables.read().await;
        let interests = tables.interests.values().filter(|i| i.farmer_id == farmer_id).cloned().collect();
        Ok(newest_first(interests, |i| i.created_at))
    }

    async fn update_interest_status(
        &self,
        id: Uuid,
        farmer_id: Uuid,
        status: InterestStatus,
    ) -> Result<Option<InvestorInterest>> {
        let mut tables = self.tables.write().await;
        Ok(tables
            .interests
            .get_mut(&id)
            .filter(|i| i.farmer_id == farmer_id)
            .map(|interest| {
                interest.status = status;
                interest.updated_at = Utc::now();
                interest.clone()
            }))
    }

    async fn create_farm_request(&self, request: &FarmRequest) -> Result<FarmRequest> {
        self.tables.write().await.farm_requests.insert(request.id, request.clone());
        Ok(request.clone())
    }

    async fn get_farm_request(&self, id: Uuid) -> Result<Option<FarmRequest>> {
        Ok(self.tables.read().await.farm_requests.get(&id).cloned())
    }

    async fn list_farm_requests(&self, filter: &FarmRequestFilter) -> Result<Vec<FarmRequest>> {
        let tables = self.tables.read().await;
        let requests = tables
            .farm_requests
            .values()
            .filter(|r| filter.request_type.map_or(true, |t| r.request_type == t))
            .filter(|r| filter.location.as_deref().map_or(true, |l| contains_ci(&r.location, l)))
            .cloned()
            .collect();
        Ok(newest_first(requests, |r| r.created_at))
    }

    async fn add_farm_request_response(&self, id: Uuid, response: &FarmRequestResponse) -> Result<Option<FarmRequest>> {
        let mut tables = self.tables.write().await;
        Ok(tables.farm_requests.get_mut(&id).map(|request| {
            request.responses.push(response.clone());
            request.response_count += 1;
            request.updated_at = Utc::now();
            request.clone()
        }))
    }

    async fn create_offer(&self, offer: &InvestorOffer) -> Result<InvestorOffer> {
        self.tables.write().await.offers.push(offer.clone());
        Ok(offer.clone())
    }

    async fn list_offers(&self, filter: &OfferFilter) -> Result<Vec<InvestorOffer>> {
        let tables = self.tables.read().await;
        let offers = tables
            .offers
            .iter()
            .filter(|o| filter.offer_type.map_or(true, |t| o.offer_type == t))
            .filter(|o| filter.location.as_deref().map_or(true, |l| contains_ci(&o.location, l)))
            .cloned()
            .collect();
        Ok(newest_first(offers, |o| o.created_at))
    }
}
