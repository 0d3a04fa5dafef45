//! Multi-sensor comparison endpoint.
//!
//! One grouped query fetches every sensor's bucketed averages; pairwise
//! Pearson correlations are then computed over the buckets where both
//! sensors reported, and the chart-facing `timeSeriesData` array is shaped
//! with one `<sensor>_<metric>` key per series.

use std::collections::{BTreeMap, BTreeSet, HashMap};

use axum::extract::{Query, State};
use axum::response::Response;
use axum::routing::get;
use axum::Router;
use serde::Serialize;
use serde_json::{json, Map, Value};
use tracing::{info, warn};

use crate::analysis::{correlation, stats};
use crate::error::ApiError;
use crate::models::{Aggregation, Metric};
use crate::store;

use super::params::{self, EndpointDefaults, RawAnalysisQuery, TimeRange, DAY_MS};
use super::{json_with_cache_control, now_ms, AppState};

// ---

const DEFAULTS: EndpointDefaults = EndpointDefaults {
    window_ms: 7 * DAY_MS,
    aggregation: Aggregation::Hourly,
    min_sensors: 2,
};

pub fn router() -> Router<AppState> {
    // ---
    Router::new().route("/api/v1/analysis/compare", get(handler))
}

async fn handler(
    Query(raw): Query<RawAnalysisQuery>,
    State((pool, _config, _cache)): State<AppState>,
) -> Result<Response, ApiError> {
    // ---
    let now = now_ms();
    let request = params::parse(&raw, DEFAULTS, now)?;
    info!(
        "GET /api/v1/analysis/compare - {} sensors at {}",
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

    // Organize by sensor and bucket; the bucket set is the union across
    // sensors, so a sensor can be absent from any given bucket.
    let mut time_points: BTreeSet<i64> = BTreeSet::new();
    let mut sensor_data: HashMap<String, HashMap<i64, Vec<Option<f64>>>> = HashMap::new();
    for point in points {
        time_points.insert(point.time_bucket);
        sensor_data
            .entry(point.device_id)
            .or_default()
            .insert(point.time_bucket, point.values);
    }

    let value_at = |sensor: &str, bucket: i64, index: usize| -> Option<f64> {
        sensor_data
            .get(sensor)
            .and_then(|buckets| buckets.get(&bucket))
            .and_then(|values| values[index])
    };

    // Pairwise correlations per metric, over shared buckets only
    let mut correlations: BTreeMap<String, BTreeMap<String, Option<f64>>> = BTreeMap::new();
    for i in 0..request.sensor_ids.len() {
        for j in i + 1..request.sensor_ids.len() {
            let sensor1 = &request.sensor_ids[i];
            let sensor2 = &request.sensor_ids[j];

            let mut by_metric = BTreeMap::new();
            for (index, metric) in request.metrics.iter().enumerate() {
                let pairs: Vec<(f64, f64)> = time_points
                    .iter()
                    .filter_map(|&bucket| {
                        match (
                            value_at(sensor1, bucket, index),
                            value_at(sensor2, bucket, index),
                        ) {
                            (Some(a), Some(b)) => Some((a, b)),
                            _ => None,
                        }
                    })
                    .collect();
                by_metric.insert(metric.requested().to_string(), correlation::pearson(&pairs));
            }
            correlations.insert(format!("{sensor1}_{sensor2}"), by_metric);
        }
    }

    // Chart-shaped series: one object per bucket with dynamic keys
    let time_series_data: Vec<Value> = time_points
        .iter()
        .map(|&bucket| {
            let mut point = Map::new();
            point.insert("timestamp".to_string(), json!(bucket));
            for sensor_id in &request.sensor_ids {
                for (index, metric) in request.metrics.iter().enumerate() {
                    let key = format!("{}_{}", sensor_id, metric.requested());
                    point.insert(key, json!(value_at(sensor_id, bucket, index)));
                }
            }
            Value::Object(point)
        })
        .collect();

    // Per-sensor summary over its bucket averages
    let mut summary_stats: BTreeMap<String, BTreeMap<String, Option<ComparisonSummary>>> =
        BTreeMap::new();
    for sensor_id in &request.sensor_ids {
        let mut by_metric = BTreeMap::new();
        for (index, metric) in request.metrics.iter().enumerate() {
            let values: Vec<f64> = time_points
                .iter()
                .filter_map(|&bucket| value_at(sensor_id, bucket, index))
                .collect();
            let summary = stats::describe(&stats::sorted(values)).map(|s| ComparisonSummary {
                mean: s.mean,
                min: s.min,
                max: s.max,
                median: s.median,
                count: s.count,
            });
            by_metric.insert(metric.requested().to_string(), summary);
        }
        summary_stats.insert(sensor_id.clone(), by_metric);
    }

    // Display names are an enrichment; fall back to IDs if the lookup fails
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

    let body = CompareResponse {
        time_range: TimeRange {
            from: request.from,
            to: request.to,
        },
        aggregation: request.aggregation,
        metrics: request.metrics.clone(),
        sensors,
        time_series_data,
        correlations,
        summary_stats,
        meta: CompareMeta {
            total_sensors: request.sensor_ids.len(),
            total_data_points: time_points.len(),
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
struct ComparisonSummary {
    mean: f64,
    min: f64,
    max: f64,
    median: f64,
    count: usize,
}

#[derive(Serialize)]
struct CompareResponse {
    #[serde(rename = "timeRange")]
    time_range: TimeRange,
    aggregation: Aggregation,
    metrics: Vec<Metric>,
    sensors: Vec<SensorRef>,
    #[serde(rename = "timeSeriesData")]
    time_series_data: Vec<Value>,
    /// Keyed `<sensor1>_<sensor2>`, then by requested metric name.
    correlations: BTreeMap<String, BTreeMap<String, Option<f64>>>,
    #[serde(rename = "summaryStats")]
    summary_stats: BTreeMap<String, BTreeMap<String, Option<ComparisonSummary>>>,
    meta: CompareMeta,
}

#[derive(Serialize)]
struct CompareMeta {
    #[serde(rename = "totalSensors")]
    total_sensors: usize,
    #[serde(rename = "totalDataPoints")]
    total_data_points: usize,
    #[serde(rename = "queryTime")]
    query_time: i64,
}
