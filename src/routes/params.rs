//! Shared Parse/Validate stage for the analysis endpoints.
//!
//! Each endpoint differs only in its defaults (query window, aggregation
//! level, minimum sensor count); the mechanics of splitting sensor lists,
//! resolving metric names through the allowlist, and validating the time
//! range are identical and live here.

use serde::{Deserialize, Serialize};

use crate::error::ApiError;
use crate::models::{Aggregation, Metric};

// ---

pub const DAY_MS: i64 = 86_400_000;

const DEFAULT_GRID_SIZE: usize = 10;

/// Raw query string of an analysis request, before validation.
///
/// Everything is an optional string so that malformed values produce our
/// own 400 JSON body instead of the framework's rejection.
#[derive(Debug, Default, Deserialize)]
pub struct RawAnalysisQuery {
    pub sensors: Option<String>,
    pub from: Option<String>,
    pub to: Option<String>,
    pub metrics: Option<String>,
    pub aggregation: Option<String>,
    #[serde(rename = "gridSize")]
    pub grid_size: Option<String>,
}

/// Validated analysis request parameters.
#[derive(Debug)]
pub struct AnalysisParams {
    pub sensor_ids: Vec<String>,
    pub from: i64,
    pub to: i64,
    pub metrics: Vec<Metric>,
    pub aggregation: Aggregation,
    pub grid_size: usize,
}

/// Per-endpoint defaults and requirements.
#[derive(Debug, Clone, Copy)]
pub struct EndpointDefaults {
    /// Length of the default query window, ending now.
    pub window_ms: i64,
    pub aggregation: Aggregation,
    /// Minimum number of sensor IDs the endpoint needs.
    pub min_sensors: usize,
}

/// The `timeRange` object echoed in every response.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct TimeRange {
    pub from: i64,
    pub to: i64,
}

// ---

/// Validate a raw query against an endpoint's defaults.
pub fn parse(
    raw: &RawAnalysisQuery,
    defaults: EndpointDefaults,
    now_ms: i64,
) -> Result<AnalysisParams, ApiError> {
    // ---
    let sensor_ids: Vec<String> = raw
        .sensors
        .as_deref()
        .unwrap_or("")
        .split(',')
        .filter(|id| !id.is_empty())
        .map(str::to_string)
        .collect();

    if sensor_ids.len() < defaults.min_sensors {
        return Err(ApiError::InsufficientInput(if defaults.min_sensors >= 2 {
            "At least 2 sensors required for comparison".to_string()
        } else {
            "No sensors specified".to_string()
        }));
    }

    let from = parse_time(raw.from.as_deref(), "from", now_ms - defaults.window_ms)?;
    let to = parse_time(raw.to.as_deref(), "to", now_ms)?;
    if from > to {
        return Err(ApiError::InvalidParameter(
            "from time must be before to time".to_string(),
        ));
    }

    let metrics = match raw.metrics.as_deref() {
        None => Metric::defaults(),
        Some(list) => list
            .split(',')
            .map(|name| {
                Metric::parse(name)
                    .ok_or_else(|| ApiError::InvalidParameter(format!("Unknown metric: {name}")))
            })
            .collect::<Result<Vec<_>, _>>()?,
    };

    let aggregation = match raw.aggregation.as_deref() {
        None => defaults.aggregation,
        Some(level) => Aggregation::parse(level).ok_or_else(|| {
            ApiError::InvalidParameter(format!("Unknown aggregation level: {level}"))
        })?,
    };

    let grid_size = match raw.grid_size.as_deref() {
        None => DEFAULT_GRID_SIZE,
        Some(value) => match value.parse::<usize>() {
            Ok(size) if size >= 1 => size,
            _ => {
                return Err(ApiError::InvalidParameter(
                    "gridSize must be a positive integer".to_string(),
                ))
            }
        },
    };

    Ok(AnalysisParams {
        sensor_ids,
        from,
        to,
        metrics,
        aggregation,
        grid_size,
    })
}

/// Parse an epoch-milliseconds parameter, falling back to the default when
/// absent.
pub fn parse_time(value: Option<&str>, name: &str, default: i64) -> Result<i64, ApiError> {
    // ---
    match value {
        None => Ok(default),
        Some(text) => text.parse::<i64>().map_err(|_| {
            ApiError::InvalidParameter(format!("{name} must be a valid timestamp"))
        }),
    }
}

#[cfg(test)]
mod tests {
    // ---
    use super::*;

    const NOW: i64 = 1_700_000_000_000;

    fn defaults() -> EndpointDefaults {
        // ---
        EndpointDefaults {
            window_ms: DAY_MS,
            aggregation: Aggregation::Hourly,
            min_sensors: 1,
        }
    }

    fn query(sensors: &str) -> RawAnalysisQuery {
        // ---
        RawAnalysisQuery {
            sensors: Some(sensors.to_string()),
            ..Default::default()
        }
    }

    #[test]
    fn test_defaults_applied() {
        // ---
        let params = parse(&query("dev-1,dev-2"), defaults(), NOW).unwrap();
        assert_eq!(params.sensor_ids, vec!["dev-1", "dev-2"]);
        assert_eq!(params.from, NOW - DAY_MS);
        assert_eq!(params.to, NOW);
        assert_eq!(params.aggregation, Aggregation::Hourly);
        assert_eq!(params.grid_size, 10);
        let columns: Vec<&str> = params.metrics.iter().map(|m| m.column()).collect();
        assert_eq!(columns, vec!["pm2_5", "temperature", "relative_humidity"]);
    }

    #[test]
    fn test_missing_sensors_rejected() {
        // ---
        let err = parse(&RawAnalysisQuery::default(), defaults(), NOW).unwrap_err();
        assert_eq!(err.to_string(), "No sensors specified");

        // A bare `sensors=` or stray commas carry no IDs either
        assert!(parse(&query(""), defaults(), NOW).is_err());
        assert!(parse(&query(",,"), defaults(), NOW).is_err());
    }

    #[test]
    fn test_min_sensor_count_for_comparison() {
        // ---
        let two_required = EndpointDefaults {
            min_sensors: 2,
            ..defaults()
        };
        let err = parse(&query("lonely-sensor"), two_required, NOW).unwrap_err();
        assert_eq!(err.to_string(), "At least 2 sensors required for comparison");

        assert!(parse(&query("a,b"), two_required, NOW).is_ok());
    }

    #[test]
    fn test_explicit_time_range() {
        // ---
        let mut raw = query("dev-1");
        raw.from = Some("1000".to_string());
        raw.to = Some("2000".to_string());
        let params = parse(&raw, defaults(), NOW).unwrap();
        assert_eq!((params.from, params.to), (1000, 2000));
    }

    #[test]
    fn test_non_numeric_time_rejected() {
        // ---
        let mut raw = query("dev-1");
        raw.from = Some("yesterday".to_string());
        let err = parse(&raw, defaults(), NOW).unwrap_err();
        assert_eq!(err.to_string(), "from must be a valid timestamp");
    }

    #[test]
    fn test_inverted_time_range_rejected() {
        // ---
        let mut raw = query("dev-1");
        raw.from = Some("2000".to_string());
        raw.to = Some("1000".to_string());
        let err = parse(&raw, defaults(), NOW).unwrap_err();
        assert_eq!(err.to_string(), "from time must be before to time");
    }

    #[test]
    fn test_metric_allowlist_enforced() {
        // ---
        let mut raw = query("dev-1");
        raw.metrics = Some("pm2_5,humidity".to_string());
        let params = parse(&raw, defaults(), NOW).unwrap();
        assert_eq!(params.metrics[1].column(), "relative_humidity");
        assert_eq!(params.metrics[1].requested(), "humidity");

        raw.metrics = Some("pm2_5,password".to_string());
        let err = parse(&raw, defaults(), NOW).unwrap_err();
        assert_eq!(err.to_string(), "Unknown metric: password");
    }

    #[test]
    fn test_unknown_aggregation_rejected() {
        // ---
        let mut raw = query("dev-1");
        raw.aggregation = Some("fortnightly".to_string());
        let err = parse(&raw, defaults(), NOW).unwrap_err();
        assert_eq!(err.to_string(), "Unknown aggregation level: fortnightly");

        raw.aggregation = Some("weekly".to_string());
        let params = parse(&raw, defaults(), NOW).unwrap();
        assert_eq!(params.aggregation, Aggregation::Weekly);
    }

    #[test]
    fn test_grid_size_validation() {
        // ---
        let mut raw = query("dev-1");
        raw.grid_size = Some("25".to_string());
        assert_eq!(parse(&raw, defaults(), NOW).unwrap().grid_size, 25);

        for bad in ["0", "-3", "many"] {
            raw.grid_size = Some(bad.to_string());
            assert!(parse(&raw, defaults(), NOW).is_err(), "gridSize {bad}");
        }
    }
}
