//! Geographic analysis endpoint.
//!
//! Joins each sensor's time-window average with its registered coordinates,
//! then derives the padded bounding box, the IDW interpolation grid, the
//! distance/value-difference correlations, and hotspot/coldspot rankings.
//! Sensors without coordinates are dropped up front; if none remain the
//! request is a 400, not an empty success.

use std::collections::BTreeMap;

use axum::extract::{Query, State};
use axum::response::Response;
use axum::routing::get;
use axum::Router;
use serde::Serialize;
use tracing::info;

use crate::analysis::correlation::{self, DistanceCorrelation};
use crate::analysis::spatial::{self, Bounds, GridPoint, SamplePoint, SpotSensor, Spots};
use crate::analysis::stats;
use crate::error::ApiError;
use crate::models::{Aggregation, Metric};
use crate::store;

use super::params::{self, EndpointDefaults, RawAnalysisQuery, TimeRange, DAY_MS};
use super::{json_with_cache_control, now_ms, AppState};

// ---

const DEFAULTS: EndpointDefaults = EndpointDefaults {
    window_ms: 7 * DAY_MS,
    aggregation: Aggregation::Hourly,
    min_sensors: 1,
};

const NO_LOCATION_MESSAGE: &str = "No sensors with valid location data found";

pub fn router() -> Router<AppState> {
    // ---
    Router::new().route("/api/v1/analysis/spatial", get(handler))
}

/// A sensor that survived the coordinate filter.
struct Located {
    device_id: String,
    name: String,
    lat: f64,
    long: f64,
    reading_count: i64,
    values: Vec<Option<f64>>,
}

async fn handler(
    Query(raw): Query<RawAnalysisQuery>,
    State((pool, _config, _cache)): State<AppState>,
) -> Result<Response, ApiError> {
    // ---
    let now = now_ms();
    let request = params::parse(&raw, DEFAULTS, now)?;
    info!(
        "GET /api/v1/analysis/spatial - {} sensors, grid {}",
        request.sensor_ids.len(),
        request.grid_size
    );

    let rows = store::spatial_rows(
        &pool,
        &request.sensor_ids,
        request.from,
        request.to,
        &request.metrics,
    )
    .await?;

    let located: Vec<Located> = rows
        .into_iter()
        .filter_map(|row| match (row.lat, row.long) {
            (Some(lat), Some(long)) => Some(Located {
                device_id: row.device_id,
                name: row.name,
                lat,
                long,
                reading_count: row.reading_count,
                values: row.values,
            }),
            _ => None,
        })
        .collect();

    if located.is_empty() {
        return Err(ApiError::InsufficientInput(NO_LOCATION_MESSAGE.to_string()));
    }

    let coords: Vec<(f64, f64)> = located.iter().map(|s| (s.lat, s.long)).collect();
    let bounds = spatial::padded_bounds(&coords)
        .ok_or_else(|| ApiError::InsufficientInput(NO_LOCATION_MESSAGE.to_string()))?;

    let mut regional_stats: BTreeMap<String, Option<RegionalSummary>> = BTreeMap::new();
    let mut interpolation_data: BTreeMap<String, Vec<GridPoint>> = BTreeMap::new();
    let mut distance_correlations: BTreeMap<String, Option<DistanceCorrelation>> = BTreeMap::new();
    let mut hotspots: BTreeMap<String, Spots> = BTreeMap::new();

    for (index, metric) in request.metrics.iter().enumerate() {
        let key = metric.requested().to_string();

        // Regional summary over the sensors that reported this metric
        let values: Vec<f64> = located.iter().filter_map(|s| s.values[index]).collect();
        let summary = stats::describe(&stats::sorted(values)).map(|s| RegionalSummary {
            mean: s.mean,
            median: s.median,
            min: s.min,
            max: s.max,
            std_dev: s.std_dev,
            count: s.count,
        });
        regional_stats.insert(key.clone(), summary);

        // IDW grid from the same reporting sensors
        let samples: Vec<SamplePoint> = located
            .iter()
            .filter_map(|s| {
                s.values[index].map(|value| SamplePoint {
                    lat: s.lat,
                    long: s.long,
                    value,
                })
            })
            .collect();
        interpolation_data.insert(
            key.clone(),
            spatial::idw_grid(&bounds, request.grid_size, &samples),
        );

        // Distance vs absolute value difference across all sensor pairs
        let mut pairs: Vec<(f64, f64)> = Vec::new();
        for i in 0..located.len() {
            for j in i + 1..located.len() {
                if let (Some(v1), Some(v2)) = (located[i].values[index], located[j].values[index]) {
                    let distance = spatial::planar_distance_meters(
                        located[i].lat,
                        located[i].long,
                        located[j].lat,
                        located[j].long,
                    );
                    pairs.push((distance, (v1 - v2).abs()));
                }
            }
        }
        distance_correlations.insert(key.clone(), correlation::distance_correlation(&pairs));

        // Extreme-value rankings
        let ranked: Vec<SpotSensor> = located
            .iter()
            .filter_map(|s| {
                s.values[index].map(|value| SpotSensor {
                    device_id: s.device_id.clone(),
                    name: s.name.clone(),
                    lat: s.lat,
                    long: s.long,
                    value,
                })
            })
            .collect();
        hotspots.insert(key, spatial::find_spots(ranked));
    }

    let sensor_data: Vec<SpatialSensor> = located
        .iter()
        .map(|s| SpatialSensor {
            device_id: s.device_id.clone(),
            name: s.name.clone(),
            lat: s.lat,
            long: s.long,
            reading_count: s.reading_count,
            metrics: request
                .metrics
                .iter()
                .enumerate()
                .map(|(index, metric)| (metric.requested().to_string(), s.values[index]))
                .collect(),
        })
        .collect();

    let body = SpatialResponse {
        time_range: TimeRange {
            from: request.from,
            to: request.to,
        },
        metrics: request.metrics.clone(),
        bounds,
        sensor_data,
        regional_stats,
        interpolation_data,
        distance_correlations,
        hotspots,
        meta: SpatialMeta {
            total_sensors: located.len(),
            grid_size: request.grid_size,
            query_time: now_ms(),
        },
    };

    Ok(json_with_cache_control(&body, request.to))
}

// ---

#[derive(Serialize)]
struct SpatialSensor {
    device_id: String,
    name: String,
    lat: f64,
    long: f64,
    reading_count: i64,
    /// Keyed by requested metric name; null when no reading carried it.
    metrics: BTreeMap<String, Option<f64>>,
}

#[derive(Serialize)]
struct RegionalSummary {
    mean: f64,
    median: f64,
    min: f64,
    max: f64,
    #[serde(rename = "stdDev")]
    std_dev: f64,
    count: usize,
}

#[derive(Serialize)]
struct SpatialResponse {
    #[serde(rename = "timeRange")]
    time_range: TimeRange,
    metrics: Vec<Metric>,
    bounds: Bounds,
    #[serde(rename = "sensorData")]
    sensor_data: Vec<SpatialSensor>,
    #[serde(rename = "regionalStats")]
    regional_stats: BTreeMap<String, Option<RegionalSummary>>,
    #[serde(rename = "interpolationData")]
    interpolation_data: BTreeMap<String, Vec<GridPoint>>,
    #[serde(rename = "distanceCorrelations")]
    distance_correlations: BTreeMap<String, Option<DistanceCorrelation>>,
    hotspots: BTreeMap<String, Spots>,
    meta: SpatialMeta,
}

#[derive(Serialize)]
struct SpatialMeta {
    #[serde(rename = "totalSensors")]
    total_sensors: usize,
    #[serde(rename = "gridSize")]
    grid_size: usize,
    #[serde(rename = "queryTime")]
    query_time: i64,
}
