//! Sensor data availability endpoint.
//!
//! Answers "which sensors have data in this window" with a single DISTINCT
//! scan. Results are memoized in the injected TTL cache keyed by the exact
//! time range, so dashboards polling a pinned historical window don't
//! re-scan the store every refresh.

use std::time::Duration;

use axum::extract::{Query, State};
use axum::http::header;
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::ApiError;
use crate::store;

use super::params::{self, TimeRange, DAY_MS};
use super::{cache_max_age, now_ms, AppState};

// ---

pub fn router() -> Router<AppState> {
    // ---
    Router::new().route("/api/v1/sensors/availability", get(handler))
}

#[derive(Debug, Default, Deserialize)]
struct AvailabilityQuery {
    from: Option<String>,
    to: Option<String>,
}

/// Cached and served body of an availability lookup.
#[derive(Debug, Clone, Serialize)]
pub struct AvailabilityResponse {
    #[serde(rename = "availableSensors")]
    available_sensors: Vec<String>,
    #[serde(rename = "timeRange")]
    time_range: TimeRange,
    count: usize,
}

async fn handler(
    Query(raw): Query<AvailabilityQuery>,
    State((pool, _config, cache)): State<AppState>,
) -> Result<Response, ApiError> {
    // ---
    let now = now_ms();
    let from = params::parse_time(raw.from.as_deref(), "from", now - DAY_MS)?;
    let to = params::parse_time(raw.to.as_deref(), "to", now)?;
    if from > to {
        return Err(ApiError::InvalidParameter(
            "from time must be before to time".to_string(),
        ));
    }

    let max_age = cache_max_age(now, to);

    let body = match cache.get(&(from, to)) {
        Some(cached) => {
            debug!("availability cache hit for [{from}, {to}]");
            cached
        }
        None => {
            let available_sensors = store::available_sensors(&pool, from, to).await?;
            info!(
                "GET /api/v1/sensors/availability - {} sensors in range",
                available_sensors.len()
            );
            let body = AvailabilityResponse {
                count: available_sensors.len(),
                available_sensors,
                time_range: TimeRange { from, to },
            };
            cache.insert((from, to), body.clone(), Duration::from_secs(max_age.into()));
            body
        }
    };

    let etag = format!("\"availability-{}-{}-{}\"", from, to, body.count);
    Ok((
        [
            (header::CACHE_CONTROL, format!("public, max-age={max_age}")),
            (header::ETAG, etag),
        ],
        Json(&body),
    )
        .into_response())
}
