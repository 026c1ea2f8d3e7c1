use crate::config::Config;
use crate::error::Result;
use crate::export;
use crate::pipeline::score::{apply_buy_box, BuyBox};
use crate::types::ScoredZipRecord;
use axum::{
    extract::Query,
    http::{header, Method, StatusCode},
    response::{IntoResponse, Json, Response},
    routing::get,
    Extension, Router,
};
use serde::Deserialize;
use std::net::SocketAddr;
use std::sync::Arc;
use tower::ServiceBuilder;
use tower_http::cors::{Any, CorsLayer};
use tracing::info;

/// Shared server state: the configuration and the ranked table loaded at
/// startup. The table is immutable for the server's lifetime.
pub struct AppState {
    pub config: Config,
    pub records: Vec<ScoredZipRecord>,
}

/// Buy-box query parameters shared by the JSON and CSV endpoints.
/// Unsupplied thresholds default to the published metadata values.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct ZipQuery {
    pub state: Option<String>,
    pub min_cap: Option<f64>,
    pub max_cash: Option<f64>,
    pub min_dscr: Option<f64>,
    pub min_coc: Option<f64>,
    pub limit: Option<usize>,
}

fn buy_box_from_query(config: &Config, query: &ZipQuery) -> BuyBox {
    BuyBox {
        state: query.state.clone(),
        min_cap: query.min_cap.unwrap_or(config.cap_threshold),
        max_cash: query.max_cash.unwrap_or(config.budget.max_cash),
        min_dscr: query.min_dscr.unwrap_or(config.min_dscr),
        min_coc: query.min_coc,
        limit: query.limit.or(config.result_limit),
    }
}

/// Health check endpoint
async fn health() -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "healthy",
        "service": "zipfinder",
        "version": env!("CARGO_PKG_VERSION")
    }))
}

/// Published screening metadata: the allowlist, default thresholds, loan
/// configuration, and scoring weights clients can mirror.
async fn meta_handler(Extension(state): Extension<Arc<AppState>>) -> impl IntoResponse {
    let config = &state.config;
    Json(serde_json::json!({
        "states_allowlist": config.states_allowlist,
        "cap_threshold": config.cap_threshold,
        "min_dscr": config.min_dscr,
        "max_cash": config.budget.max_cash,
        "loan": config.loan,
        "scoring_weights": config.scoring_weights,
    }))
}

async fn zips_handler(
    Extension(state): Extension<Arc<AppState>>,
    Query(query): Query<ZipQuery>,
) -> Json<Vec<ScoredZipRecord>> {
    let buy_box = buy_box_from_query(&state.config, &query);
    Json(apply_buy_box(&state.records, &buy_box))
}

async fn export_csv_handler(
    Extension(state): Extension<Arc<AppState>>,
    Query(query): Query<ZipQuery>,
) -> Response {
    let buy_box = buy_box_from_query(&state.config, &query);
    let filtered = apply_buy_box(&state.records, &buy_box);
    match export::render_csv(&filtered) {
        Ok(bytes) => (
            StatusCode::OK,
            [
                (header::CONTENT_TYPE, "text/csv; charset=utf-8"),
                (
                    header::CONTENT_DISPOSITION,
                    "attachment; filename=target_zips.csv",
                ),
            ],
            bytes,
        )
            .into_response(),
        Err(e) => (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()).into_response(),
    }
}

/// Create the HTTP server with all routes
pub fn create_router(state: Arc<AppState>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET])
        .allow_headers(Any);

    Router::new()
        .route("/health", get(health))
        .route("/api/meta", get(meta_handler))
        .route("/api/zips", get(zips_handler))
        .route("/api/export.csv", get(export_csv_handler))
        .layer(ServiceBuilder::new().layer(Extension(state)).layer(cors))
}

pub async fn run_server(state: Arc<AppState>, port: u16) -> Result<()> {
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let app = create_router(state);
    info!(%addr, "HTTP API listening");
    println!("zipfinder API listening on http://{addr}");
    axum::Server::bind(&addr)
        .serve(app.into_make_service())
        .await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(zip: &str, state: &str, cap_rate: f64, cash: f64) -> ScoredZipRecord {
        ScoredZipRecord {
            zip: zip.to_string(),
            city: "Testville".to_string(),
            state: state.to_string(),
            price: 100_000.0,
            rent: 1_200.0,
            eff_tax_rate: 0.00339,
            crime_index: 1.0,
            inventory_hits: 0,
            noi: cap_rate * 100_000.0,
            cap_rate,
            cash_on_cash: Some(0.05),
            dscr: Some(1.4),
            cash_needed: cash,
            score: cap_rate * 10.0,
        }
    }

    fn app_state() -> Arc<AppState> {
        Arc::new(AppState {
            config: Config::sample(),
            records: vec![
                record("35004", "AL", 0.08, 25_000.0),
                record("30301", "GA", 0.06, 30_000.0),
                record("30302", "GA", 0.04, 30_000.0),
            ],
        })
    }

    #[test]
    fn query_thresholds_default_to_published_metadata() {
        let config = Config::sample();
        let buy_box = buy_box_from_query(&config, &ZipQuery::default());
        assert_eq!(buy_box.min_cap, config.cap_threshold);
        assert_eq!(buy_box.max_cash, config.budget.max_cash);
        assert_eq!(buy_box.min_dscr, config.min_dscr);
        assert!(buy_box.min_coc.is_none());
        assert_eq!(buy_box.limit, config.result_limit);
    }

    #[tokio::test]
    async fn zips_endpoint_applies_filters_and_ordering() {
        let state = app_state();

        // Default thresholds: cap_threshold 0.05 drops the 0.04 record
        let Json(records) = zips_handler(Extension(state.clone()), Query(ZipQuery::default())).await;
        let zips: Vec<&str> = records.iter().map(|r| r.zip.as_str()).collect();
        assert_eq!(zips, vec!["35004", "30301"]);

        // State filter narrows to Georgia
        let query = ZipQuery {
            state: Some("GA".to_string()),
            ..ZipQuery::default()
        };
        let Json(records) = zips_handler(Extension(state.clone()), Query(query)).await;
        let zips: Vec<&str> = records.iter().map(|r| r.zip.as_str()).collect();
        assert_eq!(zips, vec!["30301"]);

        // Explicit min_cap overrides the default
        let query = ZipQuery {
            min_cap: Some(0.0),
            ..ZipQuery::default()
        };
        let Json(records) = zips_handler(Extension(state), Query(query)).await;
        assert_eq!(records.len(), 3);
    }

    #[tokio::test]
    async fn meta_endpoint_publishes_thresholds_and_weights() {
        let state = app_state();
        let response = meta_handler(Extension(state)).await.into_response();
        assert_eq!(response.status(), StatusCode::OK);

        let body = hyper::body::to_bytes(response.into_body()).await.unwrap();
        let meta: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(meta["cap_threshold"], 0.05);
        assert_eq!(meta["min_dscr"], 1.2);
        assert_eq!(meta["max_cash"], 60_000.0);
        assert_eq!(meta["loan"]["term_years"], 30);
        assert_eq!(meta["scoring_weights"]["cap_rate"], 0.4);
        assert_eq!(meta["states_allowlist"][0], "AL");
    }

    #[tokio::test]
    async fn export_endpoint_returns_csv_attachment() {
        let state = app_state();
        let response =
            export_csv_handler(Extension(state), Query(ZipQuery::default())).await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            response.headers().get(header::CONTENT_TYPE).unwrap(),
            "text/csv; charset=utf-8"
        );

        let body = hyper::body::to_bytes(response.into_body()).await.unwrap();
        let text = String::from_utf8(body.to_vec()).unwrap();
        assert!(text.lines().next().unwrap().contains("cap_rate"));
        assert!(text.contains("35004"));
        assert!(!text.contains("30302"));
    }
}
