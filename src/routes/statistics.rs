//! Statistical summary endpoint.
//!
//! One grouped aggregate query yields per-device mean/min/max/count; the
//! percentile and standard-deviation fields need the full ordered value
//! sequence, so each (sensor, metric) pair gets one additional fetch.
//! Those enrichment fetches are deliberately non-fatal: if one fails, the
//! pair's percentile fields come back null while the rest of the response
//! stands.

use std::collections::{BTreeMap, HashMap};

use axum::extract::{Query, State};
use axum::response::Response;
use axum::routing::get;
use axum::Router;
use serde::Serialize;
use tracing::{info, warn};

use crate::analysis::stats;
use crate::error::ApiError;
use crate::models::{Aggregation, Metric};
use crate::store;

use super::params::{self, EndpointDefaults, RawAnalysisQuery, TimeRange, DAY_MS};
use super::{json_with_cache_control, now_ms, AppState};

// ---

const DEFAULTS: EndpointDefaults = EndpointDefaults {
    window_ms: DAY_MS,
    aggregation: Aggregation::Hourly,
    min_sensors: 1,
};

pub fn router() -> Router<AppState> {
    // ---
    Router::new().route("/api/v1/analysis/statistics", get(handler))
}

async fn handler(
    Query(raw): Query<RawAnalysisQuery>,
    State((pool, _config, _cache)): State<AppState>,
) -> Result<Response, ApiError> {
    // ---
    let now = now_ms();
    let request = params::parse(&raw, DEFAULTS, now)?;
    info!(
        "GET /api/v1/analysis/statistics - {} sensors, {} metrics",
        request.sensor_ids.len(),
        request.metrics.len()
    );

    let stats_rows = store::device_stats(
        &pool,
        &request.sensor_ids,
        request.from,
        request.to,
        &request.metrics,
    )
    .await?;

    // Percentile enrichment, one ordered fetch per (sensor, metric).
    // Sequential on purpose; a failure only nulls that pair's fields.
    let mut percentiles: HashMap<(String, usize), stats::Summary> = HashMap::new();
    for sensor_id in &request.sensor_ids {
        for (index, metric) in request.metrics.iter().enumerate() {
            let fetched =
                store::ordered_metric_values(&pool, sensor_id, request.from, request.to, metric)
                    .await;
            match fetched {
                Ok(values) => {
                    if let Some(summary) = stats::describe(&values) {
                        percentiles.insert((sensor_id.clone(), index), summary);
                    }
                }
                Err(e) => warn!(
                    "percentile query failed for {sensor_id}/{}: {e}",
                    metric.requested()
                ),
            }
        }
    }

    let results: Vec<SensorStatistics> = stats_rows
        .into_iter()
        .map(|row| {
            let mut statistics = BTreeMap::new();
            for (index, metric) in request.metrics.iter().enumerate() {
                let aggregate = &row.metrics[index];
                let summary = percentiles.get(&(row.device_id.clone(), index));
                statistics.insert(
                    metric.requested().to_string(),
                    MetricStatistics {
                        mean: aggregate.avg,
                        min: aggregate.min,
                        max: aggregate.max,
                        count: aggregate.count,
                        median: summary.map(|s| s.median),
                        p25: summary.map(|s| s.p25),
                        p75: summary.map(|s| s.p75),
                        std_dev: summary.map(|s| s.std_dev),
                    },
                );
            }
            SensorStatistics {
                device_id: row.device_id,
                total_readings: row.total_readings,
                statistics,
            }
        })
        .collect();

    let body = StatisticsResponse {
        time_range: TimeRange {
            from: request.from,
            to: request.to,
        },
        aggregation: request.aggregation,
        metrics: request.metrics.clone(),
        results,
        meta: StatisticsMeta {
            total_sensors: request.sensor_ids.len(),
            query_time: now_ms(),
        },
    };

    Ok(json_with_cache_control(&body, request.to))
}

// ---

#[derive(Serialize)]
struct MetricStatistics {
    mean: Option<f64>,
    min: Option<f64>,
    max: Option<f64>,
    count: i64,
    median: Option<f64>,
    p25: Option<f64>,
    p75: Option<f64>,
    #[serde(rename = "stdDev")]
    std_dev: Option<f64>,
}

#[derive(Serialize)]
struct SensorStatistics {
    device_id: String,
    total_readings: i64,
    /// Keyed by the metric name as requested (aliases preserved).
    statistics: BTreeMap<String, MetricStatistics>,
}

#[derive(Serialize)]
struct StatisticsResponse {
    #[serde(rename = "timeRange")]
    time_range: TimeRange,
    aggregation: Aggregation,
    metrics: Vec<Metric>,
    results: Vec<SensorStatistics>,
    meta: StatisticsMeta,
}

#[derive(Serialize)]
struct StatisticsMeta {
    #[serde(rename = "totalSensors")]
    total_sensors: usize,
    #[serde(rename = "queryTime")]
    query_time: i64,
}
