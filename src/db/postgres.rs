use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::{PgPool, PgPoolOptions, PgRow};
use sqlx::types::Json;
use sqlx::Row;
use uuid::Uuid;

use crate::config::DatabaseConfig;
use crate::db::models::{
    Crop, Diagnosis, FarmDetails, FarmRequest, FarmRequestResponse, FarmerRequest, GeoPoint, InterestStatus,
    Investor, InvestorInterest, InvestorOffer, ScanRecord, Session, User,
};
use crate::db::store::{FarmRequestFilter, OfferFilter, OpportunityFilter, Store};
use crate::error::DatabaseError;
use crate::Result;

pub struct PgStore {
    pool: Arc<PgPool>,
}

impl PgStore {
    pub fn new(pool: Arc<PgPool>) -> Self {
        Self { pool }
    }

    pub async fn connect(config: &DatabaseConfig) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .acquire_timeout(Duration::from_secs(config.acquire_timeout_secs))
            .connect(&config.url)
            .await
            .map_err(|e| DatabaseError::ConnectionError(e.to_string()))?;

        Ok(Self::new(Arc::new(pool)))
    }

    pub async fn migrate(&self) -> Result<()> {
        sqlx::migrate!("./migrations").run(self.pool.as_ref()).await?;
        Ok(())
    }

    pub async fn close(&self) {
        self.pool.close().await;
    }
}

fn parse<T: FromStr<Err = String>>(value: &str) -> Result<T> {
    T::from_str(value).map_err(|e| DatabaseError::QueryError(e).into())
}

fn parse_opt<T: FromStr<Err = String>>(value: Option<String>) -> Result<Option<T>> {
    value.as_deref().map(parse).transpose()
}

/// `%needle%` for ILIKE with the pattern metacharacters escaped.
fn like_pattern(needle: &str) -> String {
    let escaped = needle.replace('\\', "\\\\").replace('%', "\\%").replace('_', "\\_");
    format!("%{}%", escaped)
}

fn user_from_row(row: &PgRow) -> Result<User> {
    let selected: Vec<String> = row.try_get("selected_crops")?;
    Ok(User {
        id: row.try_get("id")?,
        phone: row.try_get("phone")?,
        contact_mobile: row.try_get("contact_mobile")?,
        password_hash: row.try_get("password_hash")?,
        name: row.try_get("name")?,
        email: row.try_get("email")?,
        role: parse(&row.try_get::<String, _>("role")?)?,
        selected_crops: selected.iter().map(|c| parse(c)).collect::<Result<_>>()?,
        primary_crop: parse_opt(row.try_get("primary_crop")?)?,
        farm_details: FarmDetails {
            location: row.try_get("farm_location")?,
            size: parse_opt(row.try_get("farm_size")?)?,
        },
        profile_complete: row.try_get("profile_complete")?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

fn investor_from_row(row: &PgRow) -> Result<Investor> {
    Ok(Investor {
        id: row.try_get("id")?,
        name: row.try_get("name")?,
        email: row.try_get("email")?,
        phone: row.try_get("phone")?,
        password_hash: row.try_get("password_hash")?,
        investment_capacity: row.try_get("investment_capacity")?,
        preferred_crops: row.try_get("preferred_crops")?,
        preferred_locations: row.try_get("preferred_locations")?,
        role: row.try_get("role")?,
        is_verified: row.try_get("is_verified")?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

fn session_from_row(row: &PgRow) -> Result<Session> {
    Ok(Session {
        token_hash: row.try_get("token_hash")?,
        subject_id: row.try_get("subject_id")?,
        role: parse(&row.try_get::<String, _>("role")?)?,
        expires_at: row.try_get("expires_at")?,
        created_at: row.try_get("created_at")?,
        last_activity: row.try_get("last_activity")?,
    })
}

fn crop_from_row(row: &PgRow) -> Result<Crop> {
    let latitude: Option<f64> = row.try_get("latitude")?;
    let longitude: Option<f64> = row.try_get("longitude")?;
    Ok(Crop {
        id: row.try_get("id")?,
        user_id: row.try_get("user_id")?,
        name: row.try_get("name")?,
        crop_type: row.try_get("crop_type")?,
        planting_date: row.try_get("planting_date")?,
        expected_harvest_date: row.try_get("expected_harvest_date")?,
        status: parse(&row.try_get::<String, _>("status")?)?,
        location: latitude
            .zip(longitude)
            .map(|(latitude, longitude)| GeoPoint { latitude, longitude }),
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

fn diagnosis_from_row(row: &PgRow) -> Result<Diagnosis> {
    Ok(Diagnosis {
        id: row.try_get("id")?,
        user_id: row.try_get("user_id")?,
        crop_id: row.try_get("crop_id")?,
        disease_name: row.try_get("disease_name")?,
        image_url: row.try_get("image_url")?,
        confidence: row.try_get("confidence")?,
        symptoms: row.try_get("symptoms")?,
        recommended_treatment: row.try_get("recommended_treatment")?,
        status: parse(&row.try_get::<String, _>("status")?)?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

fn scan_from_row(row: &PgRow) -> Result<ScanRecord> {
    Ok(ScanRecord {
        id: row.try_get("id")?,
        user_id: row.try_get("user_id")?,
        crop_name: row.try_get("crop_name")?,
        disease_name: row.try_get("disease_name")?,
        confidence: row.try_get("confidence")?,
        severity: parse(&row.try_get::<String, _>("severity")?)?,
        timestamp: row.try_get("timestamp")?,
        ml_result: row.try_get("ml_result")?,
        created_at: row.try_get("created_at")?,
    })
}

fn farmer_request_from_row(row: &PgRow) -> Result<FarmerRequest> {
    Ok(FarmerRequest {
        id: row.try_get("id")?,
        farmer_id: row.try_get("farmer_id")?,
        farmer_name: row.try_get("farmer_name")?,
        crop_type: row.try_get("crop_type")?,
        location: row.try_get("location")?,
        land_size: row.try_get("land_size")?,
        investment_needed: row.try_get("investment_needed")?,
        equity_offered: row.try_get("equity_offered")?,
        tax_rate: row.try_get("tax_rate")?,
        contact_mobile: row.try_get("contact_mobile")?,
        description: row.try_get("description")?,
        status: parse(&row.try_get::<String, _>("status")?)?,
        interest_count: row.try_get("interest_count")?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

fn interest_from_row(row: &PgRow) -> Result<InvestorInterest> {
    Ok(InvestorInterest {
        id: row.try_get("id")?,
        investor_id: row.try_get("investor_id")?,
        farmer_request_id: row.try_get("farmer_request_id")?,
        farmer_id: row.try_get("farmer_id")?,
        message: row.try_get("message")?,
        status: parse(&row.try_get::<String, _>("status")?)?,
        notification_sent: row.try_get("notification_sent")?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

fn farm_request_from_row(row: &PgRow) -> Result<FarmRequest> {
    let Json(responses): Json<Vec<FarmRequestResponse>> = row.try_get("responses")?;
    Ok(FarmRequest {
        id: row.try_get("id")?,
        farmer_id: row.try_get("farmer_id")?,
        farmer_name: row.try_get("farmer_name")?,
        request_type: parse(&row.try_get::<String, _>("request_type")?)?,
        location: row.try_get("location")?,
        contact_mobile: row.try_get("contact_mobile")?,
        description: row.try_get("description")?,
        status: parse(&row.try_get::<String, _>("status")?)?,
        machinery_type: row.try_get("machinery_type")?,
        duration_days: row.try_get("duration_days")?,
        amount: row.try_get("amount")?,
        equity: row.try_get("equity")?,
        crop_type: row.try_get("crop_type")?,
        land_size: row.try_get("land_size")?,
        start_date: row.try_get("start_date")?,
        end_date: row.try_get("end_date")?,
        daily_payment: row.try_get("daily_payment")?,
        workers_needed: row.try_get("workers_needed")?,
        inventory: row.try_get("inventory")?,
        min_equity: row.try_get("min_equity")?,
        response_count: row.try_get("response_count")?,
        responses,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

fn offer_from_row(row: &PgRow) -> Result<InvestorOffer> {
    Ok(InvestorOffer {
        id: row.try_get("id")?,
        investor_id: row.try_get("investor_id")?,
        offer_type: parse(&row.try_get::<String, _>("offer_type")?)?,
        location: row.try_get("location")?,
        amount: row.try_get("amount")?,
        min_equity: row.try_get("min_equity")?,
        description: row.try_get("description")?,
        contact_mobile: row.try_get("contact_mobile")?,
        status: row.try_get("status")?,
        created_at: row.try_get("created_at")?,
    })
}

#[async_trait]
impl Store for PgStore {
    fn backend(&self) -> &'static str {
        "postgres"
    }

    async fn ping(&self) -> Result<()> {
        sqlx::query("SELECT 1").execute(self.pool.as_ref()).await?;
        Ok(())
    }

    async fn create_user(&self, user: &User) -> Result<User> {
        let selected: Vec<&str> = user.selected_crops.iter().map(|c| c.as_str()).collect();
        let row = sqlx::query(
            r#"
            INSERT INTO users (id, phone, contact_mobile, password_hash, name, email, role, selected_crops,
                               primary_crop, farm_location, farm_size, profile_complete, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14)
            RETURNING *
            "#,
        )
        .bind(user.id)
        .bind(&user.phone)
        .bind(&user.contact_mobile)
        .bind(&user.password_hash)
        .bind(&user.name)
        .bind(&user.email)
        .bind(user.role.as_str())
        .bind(&selected)
        .bind(user.primary_crop.map(|c| c.as_str()))
        .bind(&user.farm_details.location)
        .bind(user.farm_details.size.map(|s| s.as_str()))
        .bind(user.profile_complete)
        .bind(user.created_at)
        .bind(user.updated_at)
        .fetch_one(self.pool.as_ref())
        .await?;

        user_from_row(&row)
    }

    async fn get_user_by_id(&self, id: Uuid) -> Result<Option<User>> {
        sqlx::query("SELECT * FROM users WHERE id = $1")
            .bind(id)
            .fetch_optional(self.pool.as_ref())
            .await?
            .as_ref()
            .map(user_from_row)
            .transpose()
    }

    async fn get_user_by_phone(&self, phone: &str) -> Result<Option<User>> {
        sqlx::query("SELECT * FROM users WHERE phone = $1")
            .bind(phone)
            .fetch_optional(self.pool.as_ref())
            .await?
            .as_ref()
            .map(user_from_row)
            .transpose()
    }

    async fn update_user(&self, user: &User) -> Result<User> {
        let selected: Vec<&str> = user.selected_crops.iter().map(|c| c.as_str()).collect();
        let row = sqlx::query(
            r#"
            UPDATE users
            SET contact_mobile = $2, name = $3, email = $4, role = $5, selected_crops = $6, primary_crop = $7,
                farm_location = $8, farm_size = $9, profile_complete = $10, updated_at = $11
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(user.id)
        .bind(&user.contact_mobile)
        .bind(&user.name)
        .bind(&user.email)
        .bind(user.role.as_str())
        .bind(&selected)
        .bind(user.primary_crop.map(|c| c.as_str()))
        .bind(&user.farm_details.location)
        .bind(user.farm_details.size.map(|s| s.as_str()))
        .bind(user.profile_complete)
        .bind(user.updated_at)
        .fetch_one(self.pool.as_ref())
        .await?;

        user_from_row(&row)
    }

    async fn create_investor(&self, investor: &Investor) -> Result<Investor> {
        let row = sqlx::query(
            r#"
            INSERT INTO investors (id, name, email, phone, password_hash, investment_capacity, preferred_crops,
                                   preferred_locations, role, is_verified, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
            RETURNING *
            "#,
        )
        .bind(investor.id)
        .bind(&investor.name)
        .bind(&investor.email)
        .bind(&investor.phone)
        .bind(&investor.password_hash)
        .bind(investor.investment_capacity)
        .bind(&investor.preferred_crops)
        .bind(&investor.preferred_locations)
        .bind(&investor.role)
        .bind(investor.is_verified)
        .bind(investor.created_at)
        .bind(investor.updated_at)
        .fetch_one(self.pool.as_ref())
        .await?;

        investor_from_row(&row)
    }

    async fn get_investor_by_id(&self, id: Uuid) -> Result<Option<Investor>> {
        sqlx::query("SELECT * FROM investors WHERE id = $1")
            .bind(id)
            .fetch_optional(self.pool.as_ref())
            .await?
            .as_ref()
            .map(investor_from_row)
            .transpose()
    }

    async fn get_investor_by_email(&self, email: &str) -> Result<Option<Investor>> {
        sqlx::query("SELECT * FROM investors WHERE email = $1")
            .bind(email)
            .fetch_optional(self.pool.as_ref())
            .await?
            .as_ref()
            .map(investor_from_row)
            .transpose()
    }

    async fn find_investor_by_email_or_phone(&self, email: &str, phone: &str) -> Result<Option<Investor>> {
        sqlx::query("SELECT * FROM investors WHERE email = $1 OR phone = $2 LIMIT 1")
            .bind(email)
            .bind(phone)
            .fetch_optional(self.pool.as_ref())
            .await?
            .as_ref()
            .map(investor_from_row)
            .transpose()
    }

    async fn update_investor(&self, investor: &Investor) -> Result<Investor> {
        let row = sqlx::query(
            r#"
            UPDATE investors
            SET name = $2, email = $3, phone = $4, investment_capacity = $5, preferred_crops = $6,
                preferred_locations = $7, is_verified = $8, updated_at = $9
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(investor.id)
        .bind(&investor.name)
        .bind(&investor.email)
        .bind(&investor.phone)
        .bind(investor.investment_capacity)
        .bind(&investor.preferred_crops)
        .bind(&investor.preferred_locations)
        .bind(investor.is_verified)
        .bind(investor.updated_at)
        .fetch_one(self.pool.as_ref())
        .await?;

        investor_from_row(&row)
    }

    async fn create_session(&self, session: &Session) -> Result<Session> {
        let row = sqlx::query(
            r#"
            INSERT INTO sessions (token_hash, subject_id, role, expires_at, created_at, last_activity)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING *
            "#,
        )
        .bind(&session.token_hash)
        .bind(session.subject_id)
        .bind(session.role.as_str())
        .bind(session.expires_at)
        .bind(session.created_at)
        .bind(session.last_activity)
        .fetch_one(self.pool.as_ref())
        .await?;

        session_from_row(&row)
    }

    async fn get_session(&self, token_hash: &str) -> Result<Option<Session>> {
        sqlx::query("SELECT * FROM sessions WHERE token_hash = $1")
            .bind(token_hash)
            .fetch_optional(self.pool.as_ref())
            .await?
            .as_ref()
            .map(session_from_row)
            .transpose()
    }

    async fn touch_session(&self, token_hash: &str) -> Result<()> {
        sqlx::query("UPDATE sessions SET last_activity = $1 WHERE token_hash = $2")
            .bind(Utc::now())
            .bind(token_hash)
            .execute(self.pool.as_ref())
            .await?;
        Ok(())
    }

    async fn delete_session(&self, token_hash: &str) -> Result<()> {
        sqlx::query("DELETE FROM sessions WHERE token_hash = $1")
            .bind(token_hash)
            .execute(self.pool.as_ref())
            .await?;
        Ok(())
    }

    async fn cleanup_expired_sessions(&self) -> Result<u64> {
        let mut transaction = self.pool.as_ref().begin().await?;

        let result = sqlx::query("DELETE FROM sessions WHERE expires_at < $1")
            .bind(Utc::now())
            .execute(&mut *transaction)
            .await;

        match result {
            Ok(result) => {
                transaction.commit().await?;
                Ok(result.rows_affected())
            }
            Err(e) => {
                transaction.rollback().await?;
                Err(e.into())
            }
        }
    }

    async fn create_crop(&self, crop: &Crop) -> Result<Crop> {
        let row = sqlx::query(
            r#"
            INSERT INTO crops (id, user_id, name, crop_type, planting_date, expected_harvest_date, status,
                               latitude, longitude, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
            RETURNING *
            "#,
        )
        .bind(crop.id)
        .bind(crop.user_id)
        .bind(&crop.name)
        .bind(&crop.crop_type)
        .bind(crop.planting_date)
        .bind(crop.expected_harvest_date)
        .bind(crop.status.as_str())
        .bind(crop.location.map(|l| l.latitude))
        .bind(crop.location.map(|l| l.longitude))
        .bind(crop.created_at)
        .bind(crop.updated_at)
        .fetch_one(self.pool.as_ref())
        .await?;

        crop_from_row(&row)
    }

    async fn list_crops(&self, user_id: Uuid) -> Result<Vec<Crop>> {
        sqlx::query("SELECT * FROM crops WHERE user_id = $1 ORDER BY created_at DESC")
            .bind(user_id)
            .fetch_all(self.pool.as_ref())
            .await?
            .iter()
            .map(crop_from_row)
            .collect()
    }

    async fn get_crop(&self, user_id: Uuid, id: Uuid) -> Result<Option<Crop>> {
        sqlx::query("SELECT * FROM crops WHERE id = $1 AND user_id = $2")
            .bind(id)
            .bind(user_id)
            .fetch_optional(self.pool.as_ref())
            .await?
            .as_ref()
            .map(crop_from_row)
            .transpose()
    }

    async fn update_crop(&self, crop: &Crop) -> Result<Crop> {
        let row = sqlx::query(
            r#"
            UPDATE crops
            SET name = $3, crop_type = $4, planting_date = $5, expected_harvest_date = $6, status = $7,
                latitude = $8, longitude = $9, updated_at = $10
            WHERE id = $1 AND user_id = $2
            RETURNING *
            "#,
        )
        .bind(crop.id)
        .bind(crop.user_id)
        .bind(&crop.name)
        .bind(&crop.crop_type)
        .bind(crop.planting_date)
        .bind(crop.expected_harvest_date)
        .bind(crop.status.as_str())
        .bind(crop.location.map(|l| l.latitude))
        .bind(crop.location.map(|l| l.longitude))
        .bind(crop.updated_at)
        .fetch_one(self.pool.as_ref())
        .await?;

        crop_from_row(&row)
    }

    async fn delete_crop(&self, user_id: Uuid, id: Uuid) -> Result<bool> {
        let result = sqlx::query("DELETE FROM crops WHERE id = $1 AND user_id = $2")
            .bind(id)
            .bind(user_id)
            .execute(self.pool.as_ref())
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn create_diagnosis(&self, diagnosis: &Diagnosis) -> Result<Diagnosis> {
        let row = sqlx::query(
            r#"
            INSERT INTO diagnoses (id, user_id, crop_id, disease_name, image_url, confidence, symptoms,
                                   recommended_treatment, status, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
            RETURNING *
            "#,
        )
        .bind(diagnosis.id)
        .bind(diagnosis.user_id)
        .bind(diagnosis.crop_id)
        .bind(&diagnosis.disease_name)
        .bind(&diagnosis.image_url)
        .bind(diagnosis.confidence)
        .bind(&diagnosis.symptoms)
        .bind(&diagnosis.recommended_treatment)
        .bind(diagnosis.status.as_str())
        .bind(diagnosis.created_at)
        .bind(diagnosis.updated_at)
        .fetch_one(self.pool.as_ref())
        .await?;

        diagnosis_from_row(&row)
    }

    async fn list_diagnoses(&self, user_id: Uuid) -> Result<Vec<Diagnosis>> {
        sqlx::query("SELECT * FROM diagnoses WHERE user_id = $1 ORDER BY created_at DESC")
            .bind(user_id)
            .fetch_all(self.pool.as_ref())
            .await?
            .iter()
            .map(diagnosis_from_row)
            .collect()
    }

    async fn get_diagnosis(&self, user_id: Uuid, id: Uuid) -> Result<Option<Diagnosis>> {
        sqlx::query("SELECT * FROM diagnoses WHERE id = $1 AND user_id = $2")
            .bind(id)
            .bind(user_id)
            .fetch_optional(self.pool.as_ref())
            .await?
            .as_ref()
            .map(diagnosis_from_row)
            .transpose()
    }

    async fn update_diagnosis(&self, diagnosis: &Diagnosis) -> Result<Diagnosis> {
        let row = sqlx::query(
            r#"
            UPDATE diagnoses
            SET crop_id = $3, disease_name = $4, image_url = $5, confidence = $6, symptoms = $7,
                recommended_treatment = $8, status = $9, updated_at = $10
            WHERE id = $1 AND user_id = $2
            RETURNING *
            "#,
        )
        .bind(diagnosis.id)
        .bind(diagnosis.user_id)
        .bind(diagnosis.crop_id)
        .bind(&diagnosis.disease_name)
        .bind(&diagnosis.image_url)
        .bind(diagnosis.confidence)
        .bind(&diagnosis.symptoms)
        .bind(&diagnosis.recommended_treatment)
        .bind(diagnosis.status.as_str())
        .bind(diagnosis.updated_at)
        .fetch_one(self.pool.as_ref())
        .await?;

        diagnosis_from_row(&row)
    }

    async fn create_scan(&self, scan: &ScanRecord) -> Result<ScanRecord> {
        let row = sqlx::query(
            r#"
            INSERT INTO scan_records (id, user_id, crop_name, disease_name, confidence, severity, "timestamp",
                                      ml_result, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            RETURNING *
            "#,
        )
        .bind(scan.id)
        .bind(scan.user_id)
        .bind(&scan.crop_name)
        .bind(&scan.disease_name)
        .bind(scan.confidence)
        .bind(scan.severity.as_str())
        .bind(scan.timestamp)
        .bind(&scan.ml_result)
        .bind(scan.created_at)
        .fetch_one(self.pool.as_ref())
        .await?;

        scan_from_row(&row)
    }

    async fn scans_between(
        &self,
        user_id: Uuid,
        since: DateTime<Utc>,
        until: Option<DateTime<Utc>>,
    ) -> Result<Vec<ScanRecord>> {
        sqlx::query(
            r#"
            SELECT * FROM scan_records
            WHERE user_id = $1 AND "timestamp" >= $2 AND ($3::timestamptz IS NULL OR "timestamp" < $3)
            ORDER BY "timestamp" ASC
            "#,
        )
        .bind(user_id)
        .bind(since)
        .bind(until)
        .fetch_all(self.pool.as_ref())
        .await?
        .iter()
        .map(scan_from_row)
        .collect()
    }

    async fn recent_scans(&self, user_id: Uuid, limit: usize) -> Result<Vec<ScanRecord>> {
        sqlx::query(r#"SELECT * FROM scan_records WHERE user_id = $1 ORDER BY "timestamp" DESC LIMIT $2"#)
            .bind(user_id)
            .bind(limit as i64)
            .fetch_all(self.pool.as_ref())
            .await?
            .iter()
            .map(scan_from_row)
            .collect()
    }

    async fn create_farmer_request(&self, request: &FarmerRequest) -> Result<FarmerRequest> {
        let row = sqlx::query(
            r#"
            INSERT INTO farmer_requests (id, farmer_id, farmer_name, crop_type, location, land_size,
                                         investment_needed, equity_offered, tax_rate, contact_mobile, description,
                                         status, interest_count, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15)
            RETURNING *
            "#,
        )
        .bind(request.id)
        .bind(request.farmer_id)
        .bind(&request.farmer_name)
        .bind(&request.crop_type)
        .bind(&request.location)
        .bind(request.land_size)
        .bind(request.investment_needed)
        .bind(request.equity_offered)
        .bind(request.tax_rate)
        .bind(&request.contact_mobile)
        .bind(&request.description)
        .bind(request.status.as_str())
        .bind(request.interest_count)
        .bind(request.created_at)
        .bind(request.updated_at)
        .fetch_one(self.pool.as_ref())
        .await?;

        farmer_request_from_row(&row)
    }

    async fn get_farmer_request(&self, id: Uuid) -> Result<Option<FarmerRequest>> {
        sqlx::query("SELECT * FROM farmer_requests WHERE id = $1")
            .bind(id)
            .fetch_optional(self.pool.as_ref())
            .await?
            .as_ref()
            .map(farmer_request_from_row)
            .transpose()
    }

    async fn list_opportunities(&self, filter: &OpportunityFilter) -> Result<Vec<FarmerRequest>> {
        sqlx::query(
            r#"
            SELECT * FROM farmer_requests
            WHERE status = 'active'
              AND ($1::text IS NULL OR crop_type ILIKE $1)
              AND ($2::text IS NULL OR location ILIKE $2)
              AND ($3::float8 IS NULL OR equity_offered >= $3)
              AND ($4::float8 IS NULL OR equity_offered <= $4)
            ORDER BY created_at DESC
            "#,
        )
        .bind(filter.crop_type.as_deref().map(like_pattern))
        .bind(filter.location.as_deref().map(like_pattern))
        .bind(filter.min_equity)
        .bind(filter.max_equity)
        .fetch_all(self.pool.as_ref())
        .await?
        .iter()
        .map(farmer_request_from_row)
        .collect()
    }

    async fn list_farmer_requests_by_farmer(&self, farmer_id: Uuid) -> Result<Vec<FarmerRequest>> {
        sqlx::query("SELECT * FROM farmer_requests WHERE farmer_id = $1 ORDER BY created_at DESC")
            .bind(farmer_id)
            .fetch_all(self.pool.as_ref())
            .await?
            .iter()
            .map(farmer_request_from_row)
            .collect()
    }

    async fn increment_interest_count(&self, id: Uuid) -> Result<()> {
        let result = sqlx::query(
            "UPDATE farmer_requests SET interest_count = interest_count + 1, updated_at = $2 WHERE id = $1",
        )
        .bind(id)
        .bind(Utc::now())
        .execute(self.pool.as_ref())
        .await?;

        if result.rows_affected() == 0 {
            return Err(DatabaseError::NotFound.into());
        }
        Ok(())
    }

    async fn create_interest(&self, interest: &InvestorInterest) -> Result<InvestorInterest> {
        let row = sqlx::query(
            r#"
            INSERT INTO investor_interests (id, investor_id, farmer_request_id, farmer_id, message, status,
                                            notification_sent, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            RETURNING *
            "#,
        )
        .bind(interest.id)
        .bind(interest.investor_id)
        .bind(interest.farmer_request_id)
        .bind(interest.farmer_id)
        .bind(&interest.message)
        .bind(interest.status.as_str())
        .bind(interest.notification_sent)
        .bind(interest.created_at)
        .bind(interest.updated_at)
        .fetch_one(self.pool.as_ref())
        .await?;

        interest_from_row(&row)
    }

    async fn find_interest(&self, investor_id: Uuid, farmer_request_id: Uuid) -> Result<Option<InvestorInterest>> {
        sqlx::query("SELECT * FROM investor_interests WHERE investor_id = $1 AND farmer_request_id = $2")
            .bind(investor_id)
            .bind(farmer_request_id)
            .fetch_optional(self.pool.as_ref())
            .await?
            .as_ref()
            .map(interest_from_row)
            .transpose()
    }

    async fn list_interests_for_farmer(&self, farmer_id: Uuid) -> Result<Vec<InvestorInterest>> {
        sqlx::query("SELECT * FROM investor_interests WHERE farmer_id = $1 ORDER BY created_at DESC")
            .bind(farmer_id)
            .fetch_all(self.pool.as_ref())
            .await?
            .iter()
            .map(interest_from_row)
            .collect()
    }

    async fn update_interest_status(
        &self,
        id: Uuid,
        farmer_id: Uuid,
        status: InterestStatus,
    ) -> Result<Option<InvestorInterest>> {
        sqlx::query(
            r#"
            UPDATE investor_interests SET status = $3, updated_at = $4
            WHERE id = $1 AND farmer_id = $2
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(farmer_id)
        .bind(status.as_str())
        .bind(Utc::now())
        .fetch_optional(self.pool.as_ref())
        .await?
        .as_ref()
        .map(interest_from_row)
        .transpose()
    }

    async fn create_farm_request(&self, request: &FarmRequest) -> Result<FarmRequest> {
        let row = sqlx::query(
            r#"
            INSERT INTO farm_requests (id, farmer_id, farmer_name, request_type, location, contact_mobile,
                                       description, status, machinery_type, duration_days, amount, equity,
                                       crop_type, land_size, start_date, end_date, daily_payment, workers_needed,
                                       inventory, min_equity, response_count, responses, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17, $18, $19, $20,
                    $21, $22, $23, $24)
            RETURNING *
            "#,
        )
        .bind(request.id)
        .bind(&request.farmer_id)
        .bind(&request.farmer_name)
        .bind(request.request_type.as_str())
        .bind(&request.location)
        .bind(&request.contact_mobile)
        .bind(&request.description)
        .bind(request.status.as_str())
        .bind(&request.machinery_type)
        .bind(request.duration_days)
        .bind(request.amount)
        .bind(request.equity)
        .bind(&request.crop_type)
        .bind(request.land_size)
        .bind(request.start_date)
        .bind(request.end_date)
        .bind(request.daily_payment)
        .bind(request.workers_needed)
        .bind(&request.inventory)
        .bind(request.min_equity)
        .bind(request.response_count)
        .bind(Json(&request.responses))
        .bind(request.created_at)
        .bind(request.updated_at)
        .fetch_one(self.pool.as_ref())
        .await?;

        farm_request_from_row(&row)
    }

    async fn get_farm_request(&self, id: Uuid) -> Result<Option<FarmRequest>> {
        sqlx::query("SELECT * FROM farm_requests WHERE id = $1")
            .bind(id)
            .fetch_optional(self.pool.as_ref())
            .await?
            .as_ref()
            .map(farm_request_from_row)
            .transpose()
    }

    async fn list_farm_requests(&self, filter: &FarmRequestFilter) -> Result<Vec<FarmRequest>> {
        sqlx::query(
            r#"
            SELECT * FROM farm_requests
            WHERE ($1::text IS NULL OR request_type = $1)
              AND ($2::text IS NULL OR location ILIKE $2)
            ORDER BY created_at DESC
            "#,
        )
        .bind(filter.request_type.map(|t| t.as_str()))
        .bind(filter.location.as_deref().map(like_pattern))
        .fetch_all(self.pool.as_ref())
        .await?
        .iter()
        .map(farm_request_from_row)
        .collect()
    }

    async fn add_farm_request_response(&self, id: Uuid, response: &FarmRequestResponse) -> Result<Option<FarmRequest>> {
        sqlx::query(
            r#"
            UPDATE farm_requests
            SET responses = responses || jsonb_build_array($2::jsonb),
                response_count = response_count + 1,
                updated_at = $3
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(Json(response))
        .bind(Utc::now())
        .fetch_optional(self.pool.as_ref())
        .await?
        .as_ref()
        .map(farm_request_from_row)
        .transpose()
    }

    async fn create_offer(&self, offer: &InvestorOffer) -> Result<InvestorOffer> {
        let row = sqlx::query(
            r#"
            INSERT INTO investor_offers (id, investor_id, offer_type, location, amount, min_equity, description,
                                         contact_mobile, status, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            RETURNING *
            "#,
        )
        .bind(offer.id)
        .bind(offer.investor_id)
        .bind(offer.offer_type.as_str())
        .bind(&offer.location)
        .bind(offer.amount)
        .bind(offer.min_equity)
        .bind(&offer.description)
        .bind(&offer.contact_mobile)
        .bind(&offer.status)
        .bind(offer.created_at)
        .fetch_one(self.pool.as_ref())
        .await?;

        offer_from_row(&row)
    }

    async fn list_offers(&self, filter: &OfferFilter) -> Result<Vec<InvestorOffer>> {
        sqlx::query(
            r#"
            SELECT * FROM investor_offers
            WHERE ($1::text IS NULL OR offer_type = $1)
              AND ($2::text IS NULL OR location ILIKE $2)
            ORDER BY created_at DESC
            "#,
        )
        .bind(filter.offer_type.map(|t| t.as_str()))
        .bind(filter.location.as_deref().map(like_pattern))
        .fetch_all(self.pool.as_ref())
        .await?
        .iter()
        .map(offer_from_row)
        .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_like_pattern_escapes_metacharacters() {
        assert_eq!(like_pattern("pune"), "%pune%");
        assert_eq!(like_pattern("50%_off"), "%50\\%\\_off%");
    }

    #[test]
    fn test_parse_reports_unknown_values() {
        let bad: Result<crate::db::models::CropStatus> = parse("wilted");
        assert!(matches!(bad, Err(crate::AppError::DatabaseError(DatabaseError::QueryError(_)))));
        let none: Option<crate::db::models::FarmSize> = parse_opt(None).unwrap();
        assert!(none.is_none());
    }
}
