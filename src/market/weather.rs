use std::time::Duration;

use actix_web::{web, HttpResponse};
use chrono::{DateTime, Duration as ChronoDuration, DurationRound, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{error, info};
use url::Url;

use crate::config::WeatherConfig;
use crate::error::AppError;
use crate::{AppState, Result};

/// Key value shipped in sample env files; treated as no key.
pub const PLACEHOLDER_KEY: &str = "YOUR_ACTUAL_API_KEY_HERE";
pub const FORECAST_SLOTS: usize = 8;

#[derive(Debug, Clone, PartialEq)]
pub enum Location {
    City(String),
    Coords { lat: f64, lon: f64 },
}

impl Location {
    fn query(&self) -> Vec<(&'static str, String)> {
        match self {
            Location::City(city) => vec![("q", city.clone())],
            Location::Coords { lat, lon } => vec![("lat", lat.to_string()), ("lon", lon.to_string())],
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CurrentWeather {
    pub temperature: i64,
    pub description: String,
    pub icon: String,
    pub humidity: i64,
    pub wind_speed: f64,
    pub city: String,
    pub country: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ForecastSlot {
    pub time: String,
    pub temperature: i64,
    pub description: String,
    pub icon: String,
    pub humidity: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WeatherReport {
    pub current: CurrentWeather,
    pub forecast: Vec<ForecastSlot>,
}

// OpenWeather wire types
#[derive(Debug, Deserialize)]
struct OwMain {
    temp: f64,
    humidity: i64,
}

#[derive(Debug, Deserialize)]
struct OwCondition {
    description: String,
    icon: String,
}

#[derive(Debug, Deserialize)]
struct OwWind {
    speed: f64,
}

#[derive(Debug, Default, Deserialize)]
struct OwSys {
    #[serde(default)]
    country: String,
}

#[derive(Debug, Deserialize)]
struct OwCurrent {
    name: String,
    main: OwMain,
    weather: Vec<OwCondition>,
    wind: OwWind,
    #[serde(default)]
    sys: OwSys,
}

#[derive(Debug, Deserialize)]
struct OwForecastItem {
    dt_txt: String,
    main: OwMain,
    weather: Vec<OwCondition>,
}

#[derive(Debug, Deserialize)]
struct OwForecast {
    list: Vec<OwForecastItem>,
}

fn condition(conditions: &[OwCondition]) -> (String, String) {
    conditions
        .first()
        .map(|c| (c.description.clone(), c.icon.clone()))
        .unwrap_or_default()
}

fn js_round(value: f64) -> i64 {
    (value + 0.5).floor() as i64
}

impl WeatherReport {
    fn from_upstream(current: OwCurrent, forecast: OwForecast) -> Self {
        let (description, icon) = condition(&current.weather);
        Self {
            current: CurrentWeather {
                temperature: js_round(current.main.temp),
                description,
                icon,
                humidity: current.main.humidity,
                wind_speed: current.wind.speed,
                city: current.name,
                country: current.sys.country,
            },
            forecast: forecast
                .list
                .into_iter()
                .take(FORECAST_SLOTS)
                .map(|item| {
                    let (description, icon) = condition(&item.weather);
                    ForecastSlot {
                        time: item.dt_txt,
                        temperature: js_round(item.main.temp),
                        description,
                        icon,
                        humidity: item.main.humidity,
                    }
                })
                .collect(),
        }
    }
}

const CITY_MOCK: &[(i64, &str, &str, i64)] = &[
    (28, "Partly cloudy", "02d", 65),
    (26, "Clear sky", "01d", 60),
    (24, "Clear sky", "01n", 70),
    (22, "Clear sky", "01n", 75),
    (21, "Clear sky", "01n", 80),
    (23, "Sunny", "01d", 70),
    (26, "Sunny", "01d", 65),
    (29, "Partly cloudy", "02d", 60),
];

const COORDS_MOCK: &[(i64, &str, &str, i64)] = &[
    (27, "Sunny", "01d", 55),
    (25, "Clear sky", "01d", 60),
    (23, "Clear sky", "01n", 65),
    (21, "Clear sky", "01n", 70),
    (20, "Clear sky", "01n", 75),
    (22, "Sunny", "01d", 65),
    (25, "Sunny", "01d", 60),
    (28, "Partly cloudy", "02d", 55),
];

/// Canned report used when no API key is configured. Slots run in three hour
/// steps from the next slot after `now`.
pub fn mock_report(location: &Location, now: DateTime<Utc>) -> WeatherReport {
    let step = ChronoDuration::hours(3);
    let start = now.duration_trunc(step).unwrap_or(now) + step;

    let (table, current) = match location {
        Location::City(city) => (
            CITY_MOCK,
            CurrentWeather {
                temperature: 28,
                description: "Partly cloudy".into(),
                icon: "02d".into(),
                humidity: 65,
                wind_speed: 12.0,
                city: if city.is_empty() { "Mumbai".into() } else { city.clone() },
                country: "IN".into(),
            },
        ),
        Location::Coords { .. } => (
            COORDS_MOCK,
            CurrentWeather {
                temperature: 27,
                description: "Sunny".into(),
                icon: "01d".into(),
                humidity: 55,
                wind_speed: 8.0,
                city: "Your Location".into(),
                country: "IN".into(),
            },
        ),
    };

    let forecast = table
        .iter()
        .enumerate()
        .map(|(i, (temperature, description, icon, humidity))| ForecastSlot {
            time: (start + step * i as i32).format("%Y-%m-%d %H:%M:%S").to_string(),
            temperature: *temperature,
            description: description.to_string(),
            icon: icon.to_string(),
            humidity: *humidity,
        })
        .collect();

    WeatherReport { current, forecast }
}

pub struct WeatherClient {
    http: reqwest::Client,
    base_url: Url,
    api_key: Option<String>,
}

impl WeatherClient {
    pub fn new(config: &WeatherConfig) -> Result<Self> {
        let base = format!("{}/", config.base_url.trim_end_matches('/'));
        let base_url =
            Url::parse(&base).map_err(|e| AppError::ConfigError(format!("invalid weather.base_url: {}", e)))?;
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(15))
            .build()
            .map_err(|e| AppError::ConfigError(format!("failed to build weather client: {}", e)))?;

        let api_key = config
            .api_key
            .clone()
            .filter(|key| !key.is_empty() && key != PLACEHOLDER_KEY);

        Ok(Self {
            http,
            base_url,
            api_key,
        })
    }

    pub fn is_configured(&self) -> bool {
        self.api_key.is_some()
    }

    async fn fetch<T: serde::de::DeserializeOwned>(&self, endpoint: &str, location: &Location, key: &str) -> Result<T> {
        let url = self
            .base_url
            .join(endpoint)
            .map_err(|e| AppError::InternalError(e.to_string()))?;

        let body = self
            .http
            .get(url)
            .query(&location.query())
            .query(&[("appid", key), ("units", "metric")])
            .send()
            .await?
            .error_for_status()?
            .json::<T>()
            .await?;
        Ok(body)
    }

    pub async fn forecast(&self, location: &Location) -> Result<WeatherReport> {
        let Some(key) = self.api_key.as_deref() else {
            return Ok(mock_report(location, Utc::now()));
        };

        let (current, forecast) = futures::try_join!(
            self.fetch::<OwCurrent>("weather", location, key),
            self.fetch::<OwForecast>("forecast", location, key),
        )?;
        Ok(WeatherReport::from_upstream(current, forecast))
    }
}

async fn respond(state: &AppState, location: Location) -> HttpResponse {
    match state.weather.forecast(&location).await {
        Ok(report) => {
            info!("Weather served for {:?}", location);
            HttpResponse::Ok().json(json!({ "success": true, "data": report }))
        }
        Err(e) => {
            error!("Weather API error: {}", e);
            HttpResponse::InternalServerError().json(json!({
                "success": false,
                "message": "Failed to fetch weather data"
            }))
        }
    }
}

pub async fn forecast_by_city(path: web::Path<String>, state: web::Data<AppState>) -> HttpResponse {
    respond(&state, Location::City(path.into_inner())).await
}

pub async fn forecast_by_coords(path: web::Path<(String, String)>, state: web::Data<AppState>) -> Result<HttpResponse> {
    let (lat, lon) = path.into_inner();
    let lat: f64 = lat.trim().parse().map_err(|_| AppError::validation("Invalid coordinates"))?;
    let lon: f64 = lon.trim().parse().map_err(|_| AppError::validation("Invalid coordinates"))?;
    if !(-90.0..=90.0).contains(&lat) || !(-180.0..=180.0).contains(&lon) {
        return Err(AppError::validation("Invalid coordinates"));
    }
    Ok(respond(&state, Location::Coords { lat, lon }).await)
}

pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/weather")
            .route("/forecast/coords/{lat}/{lon}", web::get().to(forecast_by_coords))
            .route("/forecast/{city}", web::get().to(forecast_by_city)),
    );
}
