use actix_web::{web, HttpResponse};
use chrono::{Duration, Utc};
use tracing::debug;

use crate::auth::AuthenticatedUser;
use crate::dashboard;
use crate::{AppState, Result};

pub async fn summary(AuthenticatedUser(user): AuthenticatedUser, state: web::Data<AppState>) -> Result<HttpResponse> {
    let now = Utc::now();
    let week_ago = now - Duration::days(7);
    let two_weeks_ago = now - Duration::days(14);

    let current = state.store.scans_between(user.id, week_ago, None).await?;
    let previous = state.store.scans_between(user.id, two_weeks_ago, Some(week_ago)).await?;
    debug!(
        "Dashboard summary for {}: {} current, {} previous scans",
        user.id,
        current.len(),
        previous.len()
    );

    Ok(HttpResponse::Ok().json(dashboard::summary(&current, &previous)))
}

pub async fn health_trend(
    AuthenticatedUser(user): AuthenticatedUser,
    state: web::Data<AppState>,
) -> Result<HttpResponse> {
    let now = Utc::now();
    let scans = state.store.scans_between(user.id, now - Duration::days(7), None).await?;
    Ok(HttpResponse::Ok().json(dashboard::health_trend(&scans, now)))
}

pub async fn disease_breakdown(
    AuthenticatedUser(user): AuthenticatedUser,
    state: web::Data<AppState>,
) -> Result<HttpResponse> {
    let since = dashboard::month_start(Utc::now());
    let scans = state.store.scans_between(user.id, since, None).await?;
    Ok(HttpResponse::Ok().json(dashboard::disease_breakdown(&scans)))
}

pub async fn recent_diagnoses(
    AuthenticatedUser(user): AuthenticatedUser,
    state: web::Data<AppState>,
) -> Result<HttpResponse> {
    let scans = state.store.recent_scans(user.id, dashboard::RECENT_LIMIT).await?;
    Ok(HttpResponse::Ok().json(dashboard::recent_diagnoses(&scans, Utc::now())))
}

pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/dashboard")
            .route("/summary", web::get().to(summary))
            .route("/health-trend", web::get().to(health_trend))
            .route("/disease-breakdown", web::get().to(disease_breakdown))
            .route("/recent-diagnoses", web::get().to(recent_diagnoses)),
    );
}
