//! HTTP handler functions for the incident trends API.

use actix_web::{HttpResponse, web};
use incident_trends_analytics::AnalyticsError;
use incident_trends_analytics::aggregate::aggregate_params;
use incident_trends_analytics::reports;
use incident_trends_analytics_models::IntervalParams;
use incident_trends_server_models::{
    ApiHealth, ApiOldestReport, DailyQueryParams, OldestQueryParams, daily_counts_to_api,
};

use crate::AppState;

/// Maps an analytics failure to a JSON error response.
///
/// Bad parameters are the caller's fault and echo the reason; everything
/// else is logged and reported generically.
fn error_response(context: &str, e: &AnalyticsError) -> HttpResponse {
    match e {
        AnalyticsError::InvalidParameter { .. } => {
            log::warn!("{context}: {e}");
            HttpResponse::BadRequest().json(serde_json::json!({
                "error": e.to_string()
            }))
        }
        AnalyticsError::DataSourceUnavailable { .. } | AnalyticsError::MalformedRow { .. } => {
            log::error!("{context}: {e}");
            HttpResponse::InternalServerError().json(serde_json::json!({
                "error": context
            }))
        }
    }
}

/// `GET /api/health`
pub async fn health() -> HttpResponse {
    HttpResponse::Ok().json(ApiHealth {
        healthy: true,
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

/// `GET /api/reports/interval`
///
/// Returns the keyed series collection for the chart: `"0"` holds all
/// categories, every other key is a category id.
pub async fn interval(
    state: web::Data<AppState>,
    params: web::Query<IntervalParams>,
) -> HttpResponse {
    match aggregate_params(&params, state.strict_interval, state.records.as_ref()).await {
        Ok(collection) => HttpResponse::Ok().json(collection),
        Err(e) => error_response("Failed to aggregate incidents", &e),
    }
}

/// `GET /api/categories`
pub async fn categories(state: web::Data<AppState>) -> HttpResponse {
    match reports::active_categories(state.reports.as_ref()).await {
        Ok(categories) => HttpResponse::Ok().json(categories),
        Err(e) => error_response("Failed to query categories", &e),
    }
}

/// `GET /api/reports/totals`
pub async fn totals(state: web::Data<AppState>) -> HttpResponse {
    match reports::report_totals(state.reports.as_ref()).await {
        Ok(totals) => HttpResponse::Ok().json(totals),
        Err(e) => error_response("Failed to count reports", &e),
    }
}

/// `GET /api/reports/daily`
pub async fn daily(
    state: web::Data<AppState>,
    params: web::Query<DailyQueryParams>,
) -> HttpResponse {
    let today = chrono::Utc::now().date_naive();
    match reports::reports_by_date(state.reports.as_ref(), params.range, today).await {
        Ok(counts) => HttpResponse::Ok().json(daily_counts_to_api(&counts)),
        Err(e) => error_response("Failed to count reports by date", &e),
    }
}

/// `GET /api/reports/oldest`
pub async fn oldest(
    state: web::Data<AppState>,
    params: web::Query<OldestQueryParams>,
) -> HttpResponse {
    let approved = params.approved.unwrap_or(true);
    match reports::oldest_report_timestamp(state.reports.as_ref(), approved).await {
        Ok(timestamp) => HttpResponse::Ok().json(ApiOldestReport { timestamp }),
        Err(e) => error_response("Failed to find oldest report", &e),
    }
}

/// `GET /api/reports/dates`
///
/// Unix seconds of every approved report, ordered by report id.
pub async fn approved_dates(state: web::Data<AppState>) -> HttpResponse {
    match state.reports.approved_incident_dates().await {
        Ok(dates) => {
            let seconds: Vec<i64> = dates.iter().map(|d| d.and_utc().timestamp()).collect();
            HttpResponse::Ok().json(seconds)
        }
        Err(e) => error_response("Failed to list report dates", &e),
    }
}

#[cfg(test)]
mod tests {
    use actix_web::http::StatusCode;
    use actix_web::{App, test};
    use chrono::NaiveDateTime;
    use incident_trends_analytics::memory::MemoryRecordSource;
    use incident_trends_incident_models::{ActiveState, Category, Incident};

    use super::*;
    use crate::configure;

    fn at(s: &str) -> NaiveDateTime {
        NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S").unwrap()
    }

    fn store() -> MemoryRecordSource {
        MemoryRecordSource::new()
            .with_category(Category::new(1, "Riots", "cc0000"))
            .with_incident(
                Incident::new(1, at("2024-01-05 10:00:00"), ActiveState::Active)
                    .with_categories([1]),
            )
            .with_incident(Incident::new(2, at("2024-02-05 10:00:00"), ActiveState::Active))
    }

    #[actix_web::test]
    async fn interval_returns_keyed_series() {
        let app = test::init_service(
            App::new()
                .app_data(web::Data::new(AppState::new(store(), false)))
                .configure(configure),
        )
        .await;
        let req = test::TestRequest::get()
            .uri("/api/reports/interval?interval=month&active=true")
            .to_request();
        let body: serde_json::Value = test::call_and_read_body_json(&app, req).await;

        assert_eq!(
            body["0"]["data"],
            serde_json::json!([[1_704_067_200_000_i64, 1], [1_706_745_600_000_i64, 1]])
        );
        assert_eq!(body["0"]["label"], "All Categories");
        assert_eq!(body["1"]["color"], "#cc0000");
        assert_eq!(body["1"]["data"], serde_json::json!([[1_704_067_200_000_i64, 1]]));
    }

    #[actix_web::test]
    async fn strict_mode_rejects_unknown_interval() {
        let app = test::init_service(
            App::new()
                .app_data(web::Data::new(AppState::new(store(), true)))
                .configure(configure),
        )
        .await;
        let req = test::TestRequest::get()
            .uri("/api/reports/interval?interval=fortnight")
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    }

    #[actix_web::test]
    async fn unavailable_store_is_a_server_error() {
        let app = test::init_service(
            App::new()
                .app_data(web::Data::new(AppState::new(
                    MemoryRecordSource::new().unavailable(),
                    false,
                )))
                .configure(configure),
        )
        .await;
        for uri in ["/api/reports/interval", "/api/categories", "/api/reports/totals"] {
            let req = test::TestRequest::get().uri(uri).to_request();
            let resp = test::call_service(&app, req).await;
            assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR, "{uri}");
        }
    }

    #[actix_web::test]
    async fn dashboard_lookups() {
        let app = test::init_service(
            App::new()
                .app_data(web::Data::new(AppState::new(store(), false)))
                .configure(configure),
        )
        .await;

        let req = test::TestRequest::get().uri("/api/categories").to_request();
        let body: serde_json::Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(
            body,
            serde_json::json!([{"id": 1, "title": "Riots", "color": "#cc0000"}])
        );

        let req = test::TestRequest::get().uri("/api/reports/totals").to_request();
        let body: serde_json::Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(body["total"], 2);
        assert_eq!(body["approved"], 2);

        let req = test::TestRequest::get().uri("/api/reports/oldest").to_request();
        let body: serde_json::Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(body["timestamp"], 1_704_448_800_i64);

        let req = test::TestRequest::get().uri("/api/reports/daily").to_request();
        let body: serde_json::Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(body.as_array().map(Vec::len), Some(2));

        let req = test::TestRequest::get().uri("/api/health").to_request();
        let body: serde_json::Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(body["healthy"], true);
    }
}
