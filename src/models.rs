//! Domain types shared by the analysis endpoints.
//!
//! The metric vocabulary here is the single source of truth for which
//! `sensor_readings` columns a request may touch. Query builders in
//! `store.rs` only ever interpolate column names obtained from
//! [`Metric::column`], so user-supplied metric names never reach SQL text
//! without passing the allowlist in [`Metric::parse`].

use serde::{Serialize, Serializer};

// ---

/// Numeric columns of `sensor_readings` that analysis requests may select.
pub const METRIC_COLUMNS: [&str; 8] = [
    "pm1",
    "pm2_5",
    "pm4",
    "pm10",
    "temperature",
    "relative_humidity",
    "voc",
    "nox",
];

/// A validated metric selection.
///
/// Keeps the spelling the client used (`humidity` stays `humidity` in
/// response keys) alongside the allowlisted column it resolves to.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Metric {
    requested: String,
    column: &'static str,
}

impl Metric {
    /// Resolve a requested metric name against the allowlist.
    ///
    /// Applies the `humidity` → `relative_humidity` alias. Returns `None`
    /// for anything outside the fixed vocabulary.
    pub fn parse(name: &str) -> Option<Metric> {
        // ---
        let target = if name == "humidity" {
            "relative_humidity"
        } else {
            name
        };

        METRIC_COLUMNS
            .iter()
            .find(|col| **col == target)
            .map(|col| Metric {
                requested: name.to_string(),
                column: col,
            })
    }

    /// Default metric set when a request names none.
    pub fn defaults() -> Vec<Metric> {
        // ---
        ["pm2_5", "temperature", "relative_humidity"]
            .iter()
            .filter_map(|name| Metric::parse(name))
            .collect()
    }

    /// The column name, safe to interpolate into SQL.
    pub fn column(&self) -> &'static str {
        self.column
    }

    /// The spelling the client used, echoed back in response keys.
    pub fn requested(&self) -> &str {
        &self.requested
    }
}

impl Serialize for Metric {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.requested)
    }
}

// ---

/// Granularity at which readings are bucketed before analysis.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Aggregation {
    Raw,
    Hourly,
    Daily,
    Weekly,
}

impl Aggregation {
    pub fn parse(level: &str) -> Option<Aggregation> {
        // ---
        match level {
            "raw" => Some(Aggregation::Raw),
            "hourly" => Some(Aggregation::Hourly),
            "daily" => Some(Aggregation::Daily),
            "weekly" => Some(Aggregation::Weekly),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        // ---
        match self {
            Aggregation::Raw => "raw",
            Aggregation::Hourly => "hourly",
            Aggregation::Daily => "daily",
            Aggregation::Weekly => "weekly",
        }
    }

    /// Bucket width in milliseconds; `None` for raw (no bucketing).
    pub fn bucket_size_ms(&self) -> Option<i64> {
        // ---
        match self {
            Aggregation::Raw => None,
            Aggregation::Hourly => Some(3_600_000),
            Aggregation::Daily => Some(86_400_000),
            Aggregation::Weekly => Some(604_800_000),
        }
    }

    /// Map an event time to its aggregation bucket.
    ///
    /// Integer floor division then rescale; raw is the identity.
    pub fn bucket(&self, event_time_ms: i64) -> i64 {
        // ---
        match self.bucket_size_ms() {
            Some(size) => (event_time_ms / size) * size,
            None => event_time_ms,
        }
    }

    /// SQL expression computing the bucket, for GROUP BY clauses.
    pub fn sql_bucket_expr(&self) -> &'static str {
        // ---
        match self {
            Aggregation::Raw => "event_time",
            Aggregation::Hourly => "(event_time / 3600000) * 3600000",
            Aggregation::Daily => "(event_time / 86400000) * 86400000",
            Aggregation::Weekly => "(event_time / 604800000) * 604800000",
        }
    }

    /// Trailing moving-average window used by trend analysis.
    pub fn moving_average_window(&self) -> usize {
        // ---
        match self {
            Aggregation::Hourly => 24,
            _ => 7,
        }
    }

    /// Candidate seasonal cycle lengths, shortest first.
    ///
    /// Daily data is scanned for weekly then monthly cycles; everything
    /// else for daily then weekly cycles (in bucket counts).
    pub fn seasonal_cycles(&self) -> [usize; 2] {
        // ---
        match self {
            Aggregation::Daily => [7, 30],
            _ => [24, 168],
        }
    }
}

impl Serialize for Aggregation {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

// ---

/// One `(device, bucket)` row of averaged metric values.
///
/// `values` is aligned with the request's metric list; a metric whose rows
/// were all NULL in the bucket averages to `None`, never zero.
#[derive(Debug, Clone)]
pub struct AggregatedPoint {
    pub device_id: String,
    pub time_bucket: i64,
    pub values: Vec<Option<f64>>,
}

/// Per-sensor aggregate joined with the sensor's registration record,
/// produced for spatial analysis.
#[derive(Debug, Clone)]
pub struct SpatialSensorRow {
    pub device_id: String,
    pub name: String,
    pub lat: Option<f64>,
    pub long: Option<f64>,
    pub reading_count: i64,
    pub values: Vec<Option<f64>>,
}

#[cfg(test)]
mod tests {
    // ---
    use super::*;

    #[test]
    fn test_metric_allowlist() {
        // ---
        let m = Metric::parse("pm2_5").unwrap();
        assert_eq!(m.column(), "pm2_5");
        assert_eq!(m.requested(), "pm2_5");

        assert!(Metric::parse("nox").is_some());
        assert!(Metric::parse("temperature").is_some());

        // Anything outside the vocabulary is rejected, including SQL text
        assert!(Metric::parse("pm2_5; DROP TABLE sensor_readings").is_none());
        assert!(Metric::parse("uptime").is_none());
        assert!(Metric::parse("").is_none());
    }

    #[test]
    fn test_humidity_alias() {
        // ---
        let m = Metric::parse("humidity").unwrap();
        assert_eq!(m.column(), "relative_humidity");
        // Response keys keep the client's spelling
        assert_eq!(m.requested(), "humidity");
    }

    #[test]
    fn test_default_metrics() {
        // ---
        let defaults = Metric::defaults();
        let columns: Vec<&str> = defaults.iter().map(|m| m.column()).collect();
        assert_eq!(columns, vec!["pm2_5", "temperature", "relative_humidity"]);
    }

    #[test]
    fn test_aggregation_parse() {
        // ---
        assert_eq!(Aggregation::parse("hourly"), Some(Aggregation::Hourly));
        assert_eq!(Aggregation::parse("daily"), Some(Aggregation::Daily));
        assert_eq!(Aggregation::parse("weekly"), Some(Aggregation::Weekly));
        assert_eq!(Aggregation::parse("raw"), Some(Aggregation::Raw));
        assert_eq!(Aggregation::parse("monthly"), None);
        assert_eq!(Aggregation::parse("Hourly"), None);
    }

    #[test]
    fn test_bucket_floors_to_period_start() {
        // ---
        // 2024-01-15T13:37:42.123Z
        let t = 1_705_325_862_123;

        let hourly = Aggregation::Hourly.bucket(t);
        assert_eq!(hourly % 3_600_000, 0);
        assert!(hourly <= t && t - hourly < 3_600_000);

        let daily = Aggregation::Daily.bucket(t);
        assert_eq!(daily % 86_400_000, 0);
        assert!(daily <= t && t - daily < 86_400_000);

        assert_eq!(Aggregation::Raw.bucket(t), t);
    }

    #[test]
    fn test_bucket_idempotent() {
        // ---
        let t = 1_705_325_862_123;
        for level in [
            Aggregation::Raw,
            Aggregation::Hourly,
            Aggregation::Daily,
            Aggregation::Weekly,
        ] {
            let once = level.bucket(t);
            assert_eq!(level.bucket(once), once, "level {:?}", level);
        }
    }

    #[test]
    fn test_trend_parameters_by_level() {
        // ---
        assert_eq!(Aggregation::Hourly.moving_average_window(), 24);
        assert_eq!(Aggregation::Daily.moving_average_window(), 7);
        assert_eq!(Aggregation::Weekly.moving_average_window(), 7);

        assert_eq!(Aggregation::Daily.seasonal_cycles(), [7, 30]);
        assert_eq!(Aggregation::Hourly.seasonal_cycles(), [24, 168]);
        // Weekly buckets reuse the non-daily candidates
        assert_eq!(Aggregation::Weekly.seasonal_cycles(), [24, 168]);
    }
}
