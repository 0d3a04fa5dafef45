//! Long-term trend analysis endpoint.
//!
//! Buckets each sensor's series at the requested level, then runs the full
//! trend battery per (sensor, metric): least-squares trend line, moving
//! average, seasonal cycle scan, and change-point detection.

use std::collections::{BTreeMap, HashMap};

use axum::extract::{Query, State};
use axum::response::Response;
use axum::routing::get;
use axum::Router;
use serde::Serialize;
use tracing::{info, warn};

use crate::analysis::trend::{self, MetricTrendAnalysis, TrendPoint};
use crate::error::ApiError;
use crate::models::{Aggregation, Metric};
use crate::store;

use super::params::{self, EndpointDefaults, RawAnalysisQuery, TimeRange, DAY_MS};
use super::{json_with_cache_control, now_ms, AppState};

// ---

const DEFAULTS: EndpointDefaults = EndpointDefaults {
    window_ms: 30 * DAY_MS,
    aggregation: Aggregation::Daily,
    min_sensors: 1,
};

pub fn router() -> Router<AppState> {
    // ---
    Router::new().route("/api/v1/analysis/trends", get(handler))
}

async fn handler(
    Query(raw): Query<RawAnalysisQuery>,
    State((pool, _config, _cache)): State<AppState>,
) -> Result<Response, ApiError> {
    // ---
    let now = now_ms();
    let request = params::parse(&raw, DEFAULTS, now)?;
    info!(
        "GET /api/v1/analysis/trends - {} sensors at {}",
        request.sensor_ids.len(),
        request.aggregation.as_str()
    );

    let points = store::bucketed_series(
        &pool,
        &request.sensor_ids,
        request.from,
        request.to,
        &request.metrics,
        request.aggregation,
    )
    .await?;

    // One series per (sensor, metric); buckets without a value are skipped
    let mut series: HashMap<String, Vec<Vec<TrendPoint>>> = HashMap::new();
    for point in points {
        let per_metric = series
            .entry(point.device_id)
            .or_insert_with(|| vec![Vec::new(); request.metrics.len()]);
        for (index, value) in point.values.iter().enumerate() {
            if let Some(value) = value {
                per_metric[index].push(TrendPoint {
                    timestamp: point.time_bucket,
                    value: *value,
                });
            }
        }
    }

    let mut analysis: BTreeMap<String, BTreeMap<String, MetricTrendAnalysis>> = BTreeMap::new();
    for sensor_id in &request.sensor_ids {
        let mut by_metric = BTreeMap::new();
        for (index, metric) in request.metrics.iter().enumerate() {
            let data = series
                .get(sensor_id)
                .map(|per_metric| per_metric[index].as_slice())
                .unwrap_or(&[]);
            by_metric.insert(
                metric.requested().to_string(),
                trend::analyze(data, request.aggregation),
            );
        }
        analysis.insert(sensor_id.clone(), by_metric);
    }

    let names = match store::sensor_names(&pool, &request.sensor_ids).await {
        Ok(names) => names,
        Err(e) => {
            warn!("sensor name lookup failed: {e}");
            HashMap::new()
        }
    };
    let sensors: Vec<SensorRef> = request
        .sensor_ids
        .iter()
        .map(|id| SensorRef {
            id: id.clone(),
            name: names.get(id).cloned().unwrap_or_else(|| id.clone()),
        })
        .collect();

    let body = TrendsResponse {
        time_range: TimeRange {
            from: request.from,
            to: request.to,
        },
        aggregation: request.aggregation,
        metrics: request.metrics.clone(),
        sensors,
        analysis,
        meta: TrendsMeta {
            total_sensors: request.sensor_ids.len(),
            bucket_size: request.aggregation.bucket_size_ms(),
            query_time: now_ms(),
        },
    };

    Ok(json_with_cache_control(&body, request.to))
}

// ---

#[derive(Serialize)]
struct SensorRef {
    id: String,
    name: String,
}

#[derive(Serialize)]
struct TrendsResponse {
    #[serde(rename = "timeRange")]
    time_range: TimeRange,
    aggregation: Aggregation,
    metrics: Vec<Metric>,
    sensors: Vec<SensorRef>,
    /// Keyed by sensor ID, then by requested metric name.
    analysis: BTreeMap<String, BTreeMap<String, MetricTrendAnalysis>>,
    meta: TrendsMeta,
}

#[derive(Serialize)]
struct TrendsMeta {
    #[serde(rename = "totalSensors")]
    total_sensors: usize,
    /// Null when the series was not bucketed (raw aggregation).
    #[serde(rename = "bucketSize")]
    bucket_size: Option<i64>,
    #[serde(rename = "queryTime")]
    query_time: i64,
}
