use std::collections::BTreeMap;

use actix_web::{web, HttpResponse};
use chrono::{DateTime, Utc};
use rand::Rng;
use serde::Serialize;
use serde_json::json;

/// Maximum relative jitter applied to a base price, each way.
const JITTER: f64 = 0.05;

#[derive(Debug, Clone, Copy)]
struct BaseRate {
    crop: &'static str,
    price: f64,
    unit: &'static str,
    change: &'static str,
    trend: &'static str,
}

const fn rate(crop: &'static str, price: f64, unit: &'static str, change: &'static str, trend: &'static str) -> BaseRate {
    BaseRate {
        crop,
        price,
        unit,
        change,
        trend,
    }
}

const MUMBAI: &[BaseRate] = &[
    rate("tomato", 45.0, "kg", "+5%", "up"),
    rate("potato", 28.0, "kg", "-2%", "down"),
    rate("wheat", 2150.0, "quintal", "+3%", "up"),
    rate("rice", 3200.0, "quintal", "+1%", "up"),
    rate("corn", 1850.0, "quintal", "-1%", "down"),
    rate("onion", 35.0, "kg", "+8%", "up"),
];

const DELHI: &[BaseRate] = &[
    rate("tomato", 42.0, "kg", "+3%", "up"),
    rate("potato", 25.0, "kg", "-1%", "down"),
    rate("wheat", 2100.0, "quintal", "+2%", "up"),
    rate("rice", 3150.0, "quintal", "0%", "stable"),
    rate("corn", 1800.0, "quintal", "-2%", "down"),
    rate("onion", 32.0, "kg", "+6%", "up"),
];

const BANGALORE: &[BaseRate] = &[
    rate("tomato", 48.0, "kg", "+7%", "up"),
    rate("potato", 30.0, "kg", "+1%", "up"),
    rate("wheat", 2200.0, "quintal", "+4%", "up"),
    rate("rice", 3300.0, "quintal", "+2%", "up"),
    rate("corn", 1900.0, "quintal", "0%", "stable"),
    rate("onion", 38.0, "kg", "+10%", "up"),
];

fn table(city: &str) -> &'static [BaseRate] {
    match city.trim().to_lowercase().as_str() {
        "delhi" => DELHI,
        "bangalore" => BANGALORE,
        // mumbai and every other city
        _ => MUMBAI,
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CropRate {
    pub price: i64,
    pub unit: &'static str,
    pub change: &'static str,
    pub trend: &'static str,
    pub last_updated: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CityRates {
    pub city: String,
    pub rates: BTreeMap<&'static str, CropRate>,
    pub last_updated: DateTime<Utc>,
    pub currency: &'static str,
}

fn jittered(base: f64, rng: &mut impl Rng) -> i64 {
    let variation = rng.gen_range(-JITTER..JITTER);
    (base * (1.0 + variation)).round() as i64
}

/// Current rates for `city`, optionally limited to `crops`. Unknown crops are skipped.
pub fn city_rates(city: &str, crops: Option<&[String]>, now: DateTime<Utc>) -> CityRates {
    let mut rng = rand::thread_rng();
    let rates = table(city)
        .iter()
        .filter(|base| crops.map_or(true, |wanted| wanted.iter().any(|c| c == base.crop)))
        .map(|base| {
            (
                base.crop,
                CropRate {
                    price: jittered(base.price, &mut rng),
                    unit: base.unit,
                    change: base.change,
                    trend: base.trend,
                    last_updated: now,
                },
            )
        })
        .collect();

    CityRates {
        city: city.to_string(),
        rates,
        last_updated: now,
        currency: "INR",
    }
}

/// Splits a comma separated crop list into lowercase names.
pub fn parse_crops(list: &str) -> Vec<String> {
    list.split(',')
        .map(|c| c.trim().to_lowercase())
        .filter(|c| !c.is_empty())
        .collect()
}

pub async fn rates_for_city(path: web::Path<String>) -> HttpResponse {
    let data = city_rates(&path, None, Utc::now());
    HttpResponse::Ok().json(json!({ "success": true, "data": data }))
}

pub async fn rates_for_crops(path: web::Path<(String, String)>) -> HttpResponse {
    let (city, crops) = path.into_inner();
    let crops = parse_crops(&crops);
    let data = city_rates(&city, Some(&crops), Utc::now());
    HttpResponse::Ok().json(json!({ "success": true, "data": data }))
}

pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/crop-rates")
            .route("/rates/{city}", web::get().to(rates_for_city))
            .route("/rates/{city}/{crops}", web::get().to(rates_for_crops)),
    );
}
