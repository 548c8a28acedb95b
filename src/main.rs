use std::net::TcpListener;
use std::time::Duration;

use actix_cors::Cors;
use actix_web::middleware::Logger;
use actix_web::{web, App, HttpServer};
use anyhow::Context;
use cropcare_server::auth::RateLimit;
use cropcare_server::config::CorsConfig;
use cropcare_server::{configure, json_config, query_config, route_not_found, AppState, Settings};
use dotenv::dotenv;
use tracing::info;
use tracing_subscriber::EnvFilter;

const MAINTENANCE_INTERVAL: Duration = Duration::from_secs(60 * 60);

fn cors(config: &CorsConfig) -> Cors {
    if !config.enabled {
        return Cors::default();
    }

    let cors = if config.allow_any_origin {
        Cors::default()
            .allow_any_origin()
            .allow_any_method()
            .allow_any_header()
            .expose_any_header()
    } else {
        config
            .allowed_origins
            .iter()
            .fold(Cors::default(), |cors, origin| cors.allowed_origin(origin))
            .allowed_methods(vec!["GET", "POST", "PUT", "DELETE", "OPTIONS"])
            .allowed_headers(vec!["Authorization", "Content-Type"])
            .supports_credentials()
    };

    cors.max_age(config.max_age as usize)
}

#[actix_web::main]
async fn main() -> anyhow::Result<()> {
    dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_target(false)
        .with_line_number(true)
        .init();

    let config = Settings::new().context("failed to load configuration")?;
    info!("Configuration loaded for {} environment", config.environment);

    let state = AppState::new(config.clone()).await?;
    info!("Using {} storage", state.store.backend());
    state.spawn_maintenance(MAINTENANCE_INTERVAL);

    let limiter = state.rate_limiter.clone();
    let state = web::Data::new(state);

    let address = format!("{}:{}", config.server.host, config.server.port);
    let listener = TcpListener::bind(&address).with_context(|| format!("failed to bind {}", address))?;
    info!("Starting server at http://{}", address);

    let cors_config = config.cors.clone();
    let json_limit = config.server.json_limit_bytes;

    HttpServer::new(move || {
        App::new()
            .wrap(RateLimit::new(limiter.clone()))
            .wrap(cors(&cors_config))
            .wrap(Logger::default())
            .app_data(state.clone())
            .app_data(json_config(json_limit))
            .app_data(query_config())
            .configure(configure)
            .default_service(web::to(route_not_found))
    })
    .listen(listener)?
    .workers(config.server.workers as usize)
    .run()
    .await?;

    info!("Server stopped");
    Ok(())
}
