#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Actix-Web API server for incident trend charts.
//!
//! Serves the interval series consumed by the time-line chart plus the
//! small dashboard lookups (categories, totals, daily counts) from the
//! Postgres incident store.

mod handlers;

use std::sync::Arc;

use actix_cors::Cors;
use actix_web::{App, HttpServer, middleware, web};
use incident_trends_analytics::{RecordSource, ReportLookup};
use incident_trends_database::IncidentDb;
use incident_trends_database::db::{DbConfig, strict_interval_from_env};

/// Shared application state.
pub struct AppState {
    /// Source for the interval aggregation.
    pub records: Arc<dyn RecordSource>,
    /// Source for the dashboard lookups.
    pub reports: Arc<dyn ReportLookup>,
    /// Reject unknown `interval` values instead of falling back to month.
    pub strict_interval: bool,
}

impl AppState {
    /// Builds state where one store serves both roles.
    #[must_use]
    pub fn new<S: RecordSource + ReportLookup + 'static>(store: S, strict_interval: bool) -> Self {
        let store = Arc::new(store);
        Self {
            records: store.clone(),
            reports: store,
            strict_interval,
        }
    }
}

/// Registers the `/api` routes.
pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/api")
            .route("/health", web::get().to(handlers::health))
            .route("/categories", web::get().to(handlers::categories))
            .route("/reports/interval", web::get().to(handlers::interval))
            .route("/reports/totals", web::get().to(handlers::totals))
            .route("/reports/daily", web::get().to(handlers::daily))
            .route("/reports/oldest", web::get().to(handlers::oldest))
            .route("/reports/dates", web::get().to(handlers::approved_dates)),
    );
}

/// Starts the incident trends API server.
///
/// Connects to the incident store from environment configuration and
/// starts the Actix-Web HTTP server. The caller is responsible for providing
/// the async runtime (e.g. via `#[actix_web::main]`).
///
/// # Errors
///
/// Returns an `std::io::Result` error if the store cannot be reached, or the
/// HTTP server fails to bind or encounters a runtime error.
#[allow(clippy::future_not_send)]
pub async fn run_server() -> std::io::Result<()> {
    pretty_env_logger::init_custom_env("RUST_LOG");

    log::info!("Connecting to database...");
    let config = DbConfig::from_env();
    let store = IncidentDb::connect(&config)
        .await
        .map_err(|e| std::io::Error::other(format!("Failed to connect to database: {e}")))?;

    let strict_interval = strict_interval_from_env();
    if strict_interval {
        log::info!("Strict interval validation enabled");
    }

    let state = web::Data::new(AppState::new(store, strict_interval));

    let bind_addr = std::env::var("BIND_ADDR").unwrap_or_else(|_| "127.0.0.1".to_string());
    let port: u16 = std::env::var("PORT")
        .ok()
        .and_then(|p| p.parse().ok())
        .unwrap_or(8080);

    log::info!("Starting server on {bind_addr}:{port}");

    HttpServer::new(move || {
        let cors = Cors::permissive();

        App::new()
            .wrap(cors)
            .wrap(middleware::Logger::default())
            .app_data(state.clone())
            .configure(configure)
    })
    .bind((bind_addr.as_str(), port))?
    .run()
    .await
}
