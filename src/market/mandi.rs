use std::time::Duration;

use actix_web::{web, HttpResponse};
use chrono::{DateTime, Utc};
use rand::Rng;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::{error, info, warn};
use url::Url;

use crate::config::MandiConfig;
use crate::error::{AppError, UpstreamError};
use crate::{AppState, Result};

pub const DEFAULT_LIMIT: usize = 10;
const PROBE_LIMIT: usize = 5;
const USER_AGENT: &str = "CropCare-Assistant/1.0";

const MOCK_RECORDS: &[(&str, &str, &str, &str, &str)] = &[
    ("Rice", "2150", "Pune APMC", "Pune", "Maharashtra"),
    ("Wheat", "2350", "Delhi Mandi", "Delhi", "Delhi"),
    ("Tomato", "1500", "Mumbai APMC", "Mumbai", "Maharashtra"),
    ("Potato", "1200", "Nashik APMC", "Nashik", "Maharashtra"),
    ("Onion", "2800", "Pune APMC", "Pune", "Maharashtra"),
];

#[derive(Debug, Clone, Default, Deserialize)]
pub struct PriceQuery {
    pub crop: Option<String>,
    pub limit: Option<usize>,
}

impl PriceQuery {
    fn crop(&self) -> Option<&str> {
        self.crop.as_deref().map(str::trim).filter(|c| !c.is_empty())
    }

    fn limit(&self) -> usize {
        self.limit.filter(|n| *n > 0).unwrap_or(DEFAULT_LIMIT)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum PriceSource {
    #[serde(rename = "government_api")]
    Government,
    #[serde(rename = "mock_data")]
    Mock,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MandiPrices {
    pub records: Vec<Value>,
    pub source: PriceSource,
    pub last_updated: DateTime<Utc>,
    /// Matching records before `records` was cut to the limit.
    pub total_records: usize,
}

impl MandiPrices {
    fn new(mut records: Vec<Value>, source: PriceSource, limit: usize) -> Self {
        let total_records = records.len();
        records.truncate(limit);
        Self {
            records,
            source,
            last_updated: Utc::now(),
            total_records,
        }
    }
}

#[derive(Debug, Deserialize)]
struct UpstreamPayload {
    #[serde(default)]
    records: Vec<Value>,
    #[serde(default)]
    status: Option<Value>,
}

/// Records whose commodity contains `crop`, case-insensitively.
pub fn filter_by_crop(records: &[Value], crop: &str) -> Vec<Value> {
    let crop = crop.to_lowercase();
    records
        .iter()
        .filter(|r| {
            r.get("commodity")
                .and_then(Value::as_str)
                .is_some_and(|c| c.to_lowercase().contains(&crop))
        })
        .cloned()
        .collect()
}

/// Government records for `crop`, or every record when nothing matches.
pub fn select_government(records: Vec<Value>, crop: Option<&str>) -> Vec<Value> {
    match crop {
        Some(crop) => {
            let matched = filter_by_crop(&records, crop);
            if matched.is_empty() {
                records
            } else {
                matched
            }
        }
        None => records,
    }
}

fn record(commodity: &str, price: &str, market: &str, district: &str, state: &str) -> Value {
    json!({
        "commodity": commodity,
        "modal_price": price,
        "market": market,
        "district": district,
        "state": state,
    })
}

/// Offline price list. An unknown crop gets two synthetic local quotes.
pub fn mock_records(crop: Option<&str>) -> Vec<Value> {
    let all: Vec<Value> = MOCK_RECORDS
        .iter()
        .map(|(c, p, m, d, s)| record(c, p, m, d, s))
        .collect();

    let Some(crop) = crop else {
        return all;
    };

    let matched = filter_by_crop(&all, crop);
    if !matched.is_empty() {
        return matched;
    }

    let mut rng = rand::thread_rng();
    vec![
        record(crop, &rng.gen_range(1500..2500).to_string(), "Local APMC", "Mumbai", "Maharashtra"),
        record(crop, &rng.gen_range(1500..2500).to_string(), "Regional Market", "Pune", "Maharashtra"),
    ]
}

pub struct MandiClient {
    http: reqwest::Client,
    api_url: Url,
    api_key: Option<String>,
}

impl MandiClient {
    pub fn new(config: &MandiConfig) -> Result<Self> {
        let api_url =
            Url::parse(&config.api_url).map_err(|e| AppError::ConfigError(format!("invalid mandi.api_url: {}", e)))?;
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .user_agent(USER_AGENT)
            .build()
            .map_err(|e| AppError::ConfigError(format!("failed to build mandi client: {}", e)))?;

        Ok(Self {
            http,
            api_url,
            api_key: config.api_key.clone().filter(|k| !k.is_empty()),
        })
    }

    async fn fetch(&self, key: &str, limit: usize) -> Result<UpstreamPayload> {
        let payload = self
            .http
            .get(self.api_url.clone())
            .header(reqwest::header::ACCEPT, "application/json")
            .query(&[("api-key", key), ("format", "json")])
            .query(&[("limit", limit), ("offset", 0)])
            .send()
            .await?
            .error_for_status()?
            .json::<UpstreamPayload>()
            .await?;
        Ok(payload)
    }

    /// Government prices when reachable, the offline list otherwise.
    pub async fn prices(&self, query: &PriceQuery) -> MandiPrices {
        let limit = query.limit();
        if let Some(key) = self.api_key.as_deref() {
            match self.fetch(key, limit).await {
                Ok(payload) if !payload.records.is_empty() => {
                    let records = select_government(payload.records, query.crop());
                    return MandiPrices::new(records, PriceSource::Government, limit);
                }
                Ok(_) => warn!("Government mandi API returned no records, using mock data"),
                Err(e) => warn!("Government mandi API failed, using mock data: {}", e),
            }
        }

        MandiPrices::new(mock_records(query.crop()), PriceSource::Mock, limit)
    }

    /// Raw probe of the government API.
    pub async fn probe(&self) -> Result<(Option<Value>, Vec<Value>)> {
        let key = self
            .api_key
            .as_deref()
            .ok_or_else(|| AppError::UpstreamError(UpstreamError::Unavailable("mandi API key not configured".into())))?;
        let payload = self.fetch(key, PROBE_LIMIT).await?;
        Ok((payload.status, payload.records))
    }
}

pub async fn prices(query: web::Query<PriceQuery>, state: web::Data<AppState>) -> HttpResponse {
    let data = state.mandi.prices(&query).await;
    info!("Served {} mandi records from {:?}", data.total_records, data.source);
    HttpResponse::Ok().json(json!({ "success": true, "data": data }))
}

pub async fn test_govt_api(state: web::Data<AppState>) -> HttpResponse {
    match state.mandi.probe().await {
        Ok((status, records)) => HttpResponse::Ok().json(json!({
            "success": true,
            "status": status,
            "data": records,
            "message": "Government API is working"
        })),
        Err(e) => {
            error!("Government API test failed: {}", e);
            HttpResponse::InternalServerError().json(json!({
                "success": false,
                "error": e.to_string(),
                "status": Value::Null,
                "message": "Government API test failed"
            }))
        }
    }
}

pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/mandi")
            .route("/prices", web::get().to(prices))
            .route("/test-govt-api", web::get().to(test_govt_api)),
    );
}
