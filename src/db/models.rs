use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Declares a string-backed enum with matching serde names, `as_str` and `FromStr`
/// so the same spelling is used on the wire and in the database.
macro_rules! text_enum {
    (
        $(#[$meta:meta])*
        pub enum $name:ident {
            $( $(#[$vmeta:meta])* $variant:ident => $text:literal ),+ $(,)?
        }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        pub enum $name {
            $( $(#[$vmeta])* #[serde(rename = $text)] $variant ),+
        }

        impl $name {
            pub fn as_str(&self) -> &'static str {
                match self {
                    $( $name::$variant => $text ),+
                }
            }
        }

        impl std::str::FromStr for $name {
            type Err = String;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $( $text => Ok($name::$variant), )+
                    other => Err(format!("unknown {} value '{}'", stringify!($name), other)),
                }
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(self.as_str())
            }
        }
    };
}

text_enum! {
    pub enum UserRole {
        User => "user",
        Admin => "admin",
    }
}

text_enum! {
    /// Crops a farmer can pick on their profile.
    pub enum SupportedCrop {
        Apple => "apple",
        Banana => "banana",
        Coffee => "coffee",
        Corn => "corn",
        Cotton => "cotton",
        Eggplant => "eggplant",
        Grapes => "grapes",
        Guava => "guava",
        Mango => "mango",
        Okra => "okra",
        Potato => "potato",
        Rice => "rice",
        Sugarcane => "sugarcane",
        Tea => "tea",
        Tomato => "tomato",
        Wheat => "wheat",
    }
}

text_enum! {
    pub enum FarmSize {
        Small => "small",
        Medium => "medium",
        Large => "large",
    }
}

text_enum! {
    pub enum CropStatus {
        Planted => "planted",
        Growing => "growing",
        Flowering => "flowering",
        Harvested => "harvested",
    }
}

text_enum! {
    pub enum DiagnosisStatus {
        Pending => "pending",
        Confirmed => "confirmed",
        Treated => "treated",
    }
}

text_enum! {
    pub enum ScanSeverity {
        Healthy => "Healthy",
        Mild => "Mild",
        Moderate => "Moderate",
        Severe => "Severe",
    }
}

text_enum! {
    pub enum FarmerRequestStatus {
        Active => "active",
        Funded => "funded",
        Cancelled => "cancelled",
    }
}

text_enum! {
    pub enum InterestStatus {
        Pending => "pending",
        Accepted => "accepted",
        Rejected => "rejected",
    }
}

text_enum! {
    /// Marketplace request kinds. The long labels are what the mobile client sends.
    pub enum FarmRequestType {
        #[serde(alias = "Request for Machinery")]
        Machinery => "machinery",
        #[serde(alias = "Request for Loan")]
        Funding => "funding",
        #[serde(alias = "Request for Labour")]
        Labour => "labour",
        #[serde(alias = "Request for Equipment")]
        Equipment => "equipment",
        #[serde(alias = "Request for Investor Funding")]
        InvestorFunding => "investor_funding",
    }
}

text_enum! {
    pub enum FarmRequestStatus {
        Pending => "pending",
        Active => "active",
        Fulfilled => "fulfilled",
        Cancelled => "cancelled",
    }
}

text_enum! {
    pub enum OfferType {
        #[serde(alias = "Inventory Rent")]
        InventoryRent => "inventory_rent",
        #[serde(alias = "Loan")]
        Loan => "loan",
    }
}

text_enum! {
    /// Which kind of account a bearer token was issued to.
    pub enum TokenRole {
        Farmer => "farmer",
        Investor => "investor",
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FarmDetails {
    pub location: Option<String>,
    pub size: Option<FarmSize>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: Uuid,
    pub phone: String,
    pub contact_mobile: String,
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub name: String,
    pub email: String,
    pub role: UserRole,
    pub selected_crops: Vec<SupportedCrop>,
    pub primary_crop: Option<SupportedCrop>,
    pub farm_details: FarmDetails,
    pub profile_complete: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl User {
    pub fn new(phone: String, password_hash: String) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            contact_mobile: phone.clone(),
            phone,
            password_hash,
            name: String::new(),
            email: String::new(),
            role: UserRole::User,
            selected_crops: Vec::new(),
            primary_crop: None,
            farm_details: FarmDetails::default(),
            profile_complete: false,
            created_at: now,
            updated_at: now,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Investor {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub phone: String,
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub investment_capacity: f64,
    pub preferred_crops: Vec<String>,
    pub preferred_locations: Vec<String>,
    pub role: String,
    pub is_verified: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Investor {
    pub const ROLE: &'static str = "investor";
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    pub token_hash: String,
    pub subject_id: Uuid,
    pub role: TokenRole,
    pub expires_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    pub last_activity: DateTime<Utc>,
}

impl Session {
    pub fn new(token_hash: String, subject_id: Uuid, role: TokenRole, expires_in_hours: i64) -> Self {
        let now = Utc::now();
        Self {
            token_hash,
            subject_id,
            role,
            expires_at: now + chrono::Duration::hours(expires_in_hours),
            created_at: now,
            last_activity: now,
        }
    }

    pub fn is_expired(&self) -> bool {
        Utc::now() > self.expires_at
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoPoint {
    pub latitude: f64,
    pub longitude: f64,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Crop {
    pub id: Uuid,
    #[serde(rename = "user")]
    pub user_id: Uuid,
    pub name: String,
    #[serde(rename = "type")]
    pub crop_type: String,
    pub planting_date: DateTime<Utc>,
    pub expected_harvest_date: Option<DateTime<Utc>>,
    pub status: CropStatus,
    pub location: Option<GeoPoint>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Diagnosis {
    pub id: Uuid,
    #[serde(rename = "user")]
    pub user_id: Uuid,
    #[serde(rename = "crop")]
    pub crop_id: Option<Uuid>,
    pub disease_name: String,
    pub image_url: String,
    pub confidence: Option<f64>,
    pub symptoms: Vec<String>,
    pub recommended_treatment: Option<String>,
    pub status: DiagnosisStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ScanRecord {
    pub id: Uuid,
    #[serde(rename = "userId")]
    pub user_id: Uuid,
    pub crop_name: String,
    pub disease_name: String,
    pub confidence: f64,
    pub severity: ScanSeverity,
    pub timestamp: DateTime<Utc>,
    #[serde(rename = "mlResult")]
    pub ml_result: Option<serde_json::Value>,
    #[serde(rename = "createdAt")]
    pub created_at: DateTime<Utc>,
}

impl ScanRecord {
    pub fn new(
        user_id: Uuid,
        crop_name: impl Into<String>,
        disease_name: impl Into<String>,
        confidence: f64,
        severity: ScanSeverity,
        timestamp: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            user_id,
            crop_name: crop_name.into(),
            disease_name: disease_name.into(),
            confidence,
            severity,
            timestamp,
            ml_result: None,
            created_at: Utc::now(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FarmerRequest {
    pub id: Uuid,
    pub farmer_id: Uuid,
    pub farmer_name: String,
    pub crop_type: String,
    pub location: String,
    pub land_size: f64,
    pub investment_needed: f64,
    pub equity_offered: f64,
    pub tax_rate: f64,
    pub contact_mobile: String,
    pub description: String,
    pub status: FarmerRequestStatus,
    pub interest_count: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InvestorInterest {
    pub id: Uuid,
    pub investor_id: Uuid,
    pub farmer_request_id: Uuid,
    pub farmer_id: Uuid,
    pub message: String,
    pub status: InterestStatus,
    pub notification_sent: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FarmRequestResponse {
    pub investor_id: Uuid,
    pub message: String,
    pub contact_info: String,
    pub responded_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FarmRequest {
    pub id: Uuid,
    /// Absent for anonymous submissions.
    pub farmer_id: Option<String>,
    pub farmer_name: String,
    pub request_type: FarmRequestType,
    pub location: String,
    pub contact_mobile: String,
    pub description: String,
    pub status: FarmRequestStatus,
    pub machinery_type: Option<String>,
    #[serde(rename = "duration")]
    pub duration_days: Option<i32>,
    pub amount: Option<f64>,
    pub equity: Option<f64>,
    pub crop_type: Option<String>,
    pub land_size: Option<f64>,
    pub start_date: Option<DateTime<Utc>>,
    pub end_date: Option<DateTime<Utc>>,
    pub daily_payment: Option<f64>,
    pub workers_needed: i32,
    pub inventory: Option<String>,
    pub min_equity: Option<f64>,
    pub response_count: i64,
    pub responses: Vec<FarmRequestResponse>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InvestorOffer {
    pub id: Uuid,
    pub investor_id: Option<Uuid>,
    #[serde(rename = "type")]
    pub offer_type: OfferType,
    pub location: String,
    pub amount: Option<f64>,
    pub min_equity: Option<f64>,
    pub description: String,
    pub contact_mobile: Option<String>,
    pub status: String,
    pub created_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn test_text_enum_round_trips_through_db_spelling() {
        assert_eq!(ScanSeverity::from_str("Moderate").unwrap(), ScanSeverity::Moderate);
        assert_eq!(FarmRequestType::InvestorFunding.as_str(), "investor_funding");
        assert!(CropStatus::from_str("wilted").is_err());
    }

    #[test]
    fn test_request_type_accepts_client_labels() {
        let parsed: FarmRequestType = serde_json::from_str("\"Request for Loan\"").unwrap();
        assert_eq!(parsed, FarmRequestType::Funding);

        let parsed: OfferType = serde_json::from_str("\"Inventory Rent\"").unwrap();
        assert_eq!(parsed, OfferType::InventoryRent);

        assert_eq!(serde_json::to_string(&FarmRequestType::Machinery).unwrap(), "\"machinery\"");
    }

    #[test]
    fn test_user_json_hides_password() {
        let user = User::new("9876543210".into(), "$2b$hash".into());
        let json = serde_json::to_value(&user).unwrap();
        assert!(json.get("passwordHash").is_none());
        assert_eq!(json["contactMobile"], "9876543210");
        assert_eq!(json["role"], "user");
        assert_eq!(json["profileComplete"], false);
    }

    #[test]
    fn test_session_expiry() {
        let session = Session::new("hash".into(), Uuid::new_v4(), TokenRole::Farmer, -1);
        assert!(session.is_expired());

        let session = Session::new("hash".into(), Uuid::new_v4(), TokenRole::Farmer, 1);
        assert!(!session.is_expired());
    }
}
