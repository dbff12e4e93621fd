use std::sync::Arc;

use axum::{
    extract::{rejection::QueryRejection, Query, State},
    http::{header, HeaderValue, Method, StatusCode},
    middleware::map_response,
    routing::get,
    Json, Router,
};
use serde::Deserialize;
use tower_http::{
    cors::{Any, CorsLayer},
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    timeout::TimeoutLayer,
    trace::TraceLayer,
};

use crate::{
    config::Config,
    error::{json_timeout_body, ApiError, ApiResult},
    main_lib::AppState,
};
use quotefeed_market_data::Snapshot;

#[derive(Debug, Default, Deserialize)]
struct TickerQuery {
    ticker: Option<String>,
}

pub async fn healthz() -> &'static str {
    "ok"
}

async fn get_latest(
    State(state): State<Arc<AppState>>,
    query: Result<Query<TickerQuery>, QueryRejection>,
) -> ApiResult<Json<Snapshot>> {
    let Query(query) = query?;
    let snapshot = state.query_service.get_latest(query.ticker.as_deref())?;
    Ok(Json(snapshot))
}

async fn get_history(
    State(state): State<Arc<AppState>>,
    query: Result<Query<TickerQuery>, QueryRejection>,
) -> ApiResult<Json<Vec<Snapshot>>> {
    let Query(query) = query?;
    let entries = state
        .query_service
        .get_history(query.ticker.as_deref())
        .await?;
    Ok(Json(entries))
}

async fn route_not_found() -> ApiError {
    ApiError::RouteNotFound
}

fn cors_layer(config: &Config) -> CorsLayer {
    let cors = if config.cors_allow.iter().any(|o| o == "*") {
        CorsLayer::new().allow_origin(Any)
    } else {
        // origins were validated when the config was loaded
        let origins = config
            .cors_allow
            .iter()
            .filter_map(|o| HeaderValue::from_str(o).ok())
            .collect::<Vec<_>>();
        CorsLayer::new().allow_origin(origins)
    };
    cors.allow_methods([Method::GET, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION])
}

pub fn app_router(state: Arc<AppState>, config: &Config) -> Router {
    let api = Router::new().route("/healthz", get(healthz));

    Router::new()
        .route("/latest", get(get_latest).fallback(route_not_found))
        .route("/history", get(get_history).fallback(route_not_found))
        .nest("/api/v1", api)
        .fallback(route_not_found)
        .with_state(state)
        .layer(cors_layer(config))
        .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
        .layer(PropagateRequestIdLayer::x_request_id())
        .layer(TimeoutLayer::with_status_code(
            StatusCode::REQUEST_TIMEOUT,
            config.request_timeout,
        ))
        .layer(map_response(json_timeout_body))
        .layer(TraceLayer::new_for_http())
}
