//! Market and weather feeds proxied for the farmer app.

pub mod crop_rates;
pub mod mandi;
pub mod weather;

use actix_web::web;

pub use mandi::MandiClient;
pub use weather::WeatherClient;

pub fn configure(cfg: &mut web::ServiceConfig) {
    weather::configure(cfg);
    mandi::configure(cfg);
    crop_rates::configure(cfg);
}
