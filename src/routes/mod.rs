//! Route gateway for the analysis API (EMBP).
//!
//! Each sibling module owns one endpoint and exports a subrouter; this
//! gateway merges them, attaches the permissive CORS layer every dashboard
//! client relies on, and installs the shared state tuple. `main.rs` only
//! ever sees [`router`].

use std::sync::Arc;

use axum::http::{header, Method};
use axum::response::{IntoResponse, Response};
use axum::{Json, Router};
use serde::Serialize;
use sqlx::PgPool;
use tower_http::cors::{Any, CorsLayer};

use crate::cache::TtlCache;
use crate::error::ApiError;
use crate::Config;

mod availability;
mod compare;
mod health;
mod params;
mod spatial;
mod statistics;
mod trends;

// ---

/// Cached availability responses keyed by the requested time range.
pub type AvailabilityCache = Arc<TtlCache<(i64, i64), availability::AvailabilityResponse>>;

/// Shared state handed to every subrouter.
pub type AppState = (PgPool, Config, AvailabilityCache);

pub fn router(pool: PgPool, config: Config) -> Router {
    // ---
    let cache: AvailabilityCache = Arc::new(TtlCache::new());

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE]);

    Router::new()
        .merge(statistics::router())
        .merge(compare::router())
        .merge(trends::router())
        .merge(spatial::router())
        .merge(availability::router())
        .merge(health::router())
        .method_not_allowed_fallback(method_not_allowed)
        .layer(cors)
        .with_state((pool, config, cache))
}

/// Non-GET request on an existing route.
async fn method_not_allowed() -> ApiError {
    ApiError::MethodNotAllowed
}

// ---

/// `Cache-Control` max-age for a query window ending at `to_ms`.
///
/// Windows that closed over an hour ago no longer receive readings and can
/// cache for 30 minutes; recent windows cache for 5.
pub(crate) fn cache_max_age(now_ms: i64, to_ms: i64) -> u32 {
    // ---
    if now_ms - to_ms > 3_600_000 {
        1800
    } else {
        300
    }
}

/// Current wall-clock time in epoch milliseconds.
pub(crate) fn now_ms() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

/// Serialize a response body with the derived `Cache-Control` header.
pub(crate) fn json_with_cache_control<T: Serialize>(body: &T, to_ms: i64) -> Response {
    // ---
    let max_age = cache_max_age(now_ms(), to_ms);
    (
        [(header::CACHE_CONTROL, format!("public, max-age={max_age}"))],
        Json(body),
    )
        .into_response()
}
