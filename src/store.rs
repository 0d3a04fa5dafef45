//! Aggregate query layer over the readings store.
//!
//! Every function here issues a single parameterized query. Device IDs are
//! bound as a text array (`= ANY($n)`); metric column names are only ever
//! the `&'static str` values vetted by [`Metric::parse`], so no
//! request-controlled text is spliced into SQL.
//!
//! Percentile extraction is the one operation that cannot be expressed as a
//! plain SQL aggregate, so callers fetch ordered raw values per
//! (sensor, metric) pair via [`ordered_metric_values`].

use std::collections::HashMap;

use sqlx::{PgPool, Row};

use crate::models::{AggregatedPoint, Aggregation, Metric, SpatialSensorRow};

// ---

/// SQL aggregates of one metric within a device's stats row.
#[derive(Debug, Clone)]
pub struct MetricAggregate {
    pub avg: Option<f64>,
    pub min: Option<f64>,
    pub max: Option<f64>,
    pub count: i64,
}

/// One device's aggregate row for the statistics endpoint.
#[derive(Debug, Clone)]
pub struct DeviceStatsRow {
    pub device_id: String,
    pub total_readings: i64,
    /// Aligned with the request's metric list.
    pub metrics: Vec<MetricAggregate>,
}

/// Per-device AVG/MIN/MAX/COUNT over the time range, one row per device
/// that has at least one reading in range.
pub async fn device_stats(
    pool: &PgPool,
    sensor_ids: &[String],
    from: i64,
    to: i64,
    metrics: &[Metric],
) -> Result<Vec<DeviceStatsRow>, sqlx::Error> {
    // ---
    let mut sql = String::from("SELECT device_id, COUNT(*) AS total_readings");
    for metric in metrics {
        let col = metric.column();
        sql.push_str(&format!(
            ", AVG({col}) AS avg_{col}, MIN({col}) AS min_{col}, MAX({col}) AS max_{col}, COUNT({col}) AS count_{col}"
        ));
    }
    sql.push_str(
        " FROM sensor_readings \
         WHERE device_id = ANY($1) AND event_time >= $2 AND event_time <= $3 \
         GROUP BY device_id",
    );

    tracing::debug!("device_stats query for {} sensors", sensor_ids.len());

    let rows = sqlx::query(&sql)
        .bind(sensor_ids)
        .bind(from)
        .bind(to)
        .fetch_all(pool)
        .await?;

    rows.into_iter()
        .map(|row| {
            let mut aggregates = Vec::with_capacity(metrics.len());
            for i in 0..metrics.len() {
                let base = 2 + i * 4;
                aggregates.push(MetricAggregate {
                    avg: row.try_get(base)?,
                    min: row.try_get(base + 1)?,
                    max: row.try_get(base + 2)?,
                    count: row.try_get(base + 3)?,
                });
            }
            Ok(DeviceStatsRow {
                device_id: row.try_get(0)?,
                total_readings: row.try_get(1)?,
                metrics: aggregates,
            })
        })
        .collect()
}

/// Non-null values of one metric for one device, ordered ascending.
///
/// Feeds percentile computation; the ordering satisfies the sorted-input
/// contract of `stats::describe`.
pub async fn ordered_metric_values(
    pool: &PgPool,
    device_id: &str,
    from: i64,
    to: i64,
    metric: &Metric,
) -> Result<Vec<f64>, sqlx::Error> {
    // ---
    let col = metric.column();
    let sql = format!(
        "SELECT {col} FROM sensor_readings \
         WHERE device_id = $1 AND event_time >= $2 AND event_time <= $3 AND {col} IS NOT NULL \
         ORDER BY {col}"
    );

    sqlx::query_scalar::<_, f64>(&sql)
        .bind(device_id)
        .bind(from)
        .bind(to)
        .fetch_all(pool)
        .await
}

/// Per-(device, bucket) metric averages over the time range, ordered
/// ascending by bucket.
///
/// Buckets with no rows are simply absent; a metric whose in-bucket rows
/// are all NULL averages to `None`.
pub async fn bucketed_series(
    pool: &PgPool,
    sensor_ids: &[String],
    from: i64,
    to: i64,
    metrics: &[Metric],
    aggregation: Aggregation,
) -> Result<Vec<AggregatedPoint>, sqlx::Error> {
    // ---
    let mut sql = format!(
        "SELECT device_id, {} AS time_bucket",
        aggregation.sql_bucket_expr()
    );
    for metric in metrics {
        let col = metric.column();
        sql.push_str(&format!(", AVG({col}) AS avg_{col}"));
    }
    sql.push_str(
        " FROM sensor_readings \
         WHERE device_id = ANY($1) AND event_time >= $2 AND event_time <= $3 \
         GROUP BY device_id, time_bucket \
         ORDER BY time_bucket ASC",
    );

    tracing::debug!(
        "bucketed_series query for {} sensors at {}",
        sensor_ids.len(),
        aggregation.as_str()
    );

    let rows = sqlx::query(&sql)
        .bind(sensor_ids)
        .bind(from)
        .bind(to)
        .fetch_all(pool)
        .await?;

    rows.into_iter()
        .map(|row| {
            let time_bucket: i64 = row.try_get(1)?;
            // SQL bucketing must agree with the in-process contract
            debug_assert_eq!(time_bucket, aggregation.bucket(time_bucket));

            let mut values = Vec::with_capacity(metrics.len());
            for i in 0..metrics.len() {
                values.push(row.try_get(2 + i)?);
            }
            Ok(AggregatedPoint {
                device_id: row.try_get(0)?,
                time_bucket,
                values,
            })
        })
        .collect()
}

/// Display names for the given devices, keyed by device ID.
pub async fn sensor_names(
    pool: &PgPool,
    sensor_ids: &[String],
) -> Result<HashMap<String, String>, sqlx::Error> {
    // ---
    let rows: Vec<(String, String)> =
        sqlx::query_as("SELECT device_id, name FROM sensors WHERE device_id = ANY($1)")
            .bind(sensor_ids)
            .fetch_all(pool)
            .await?;

    Ok(rows.into_iter().collect())
}

/// Per-sensor metric averages joined with the sensor registry, one row per
/// registered sensor (readings or not).
pub async fn spatial_rows(
    pool: &PgPool,
    sensor_ids: &[String],
    from: i64,
    to: i64,
    metrics: &[Metric],
) -> Result<Vec<SpatialSensorRow>, sqlx::Error> {
    // ---
    let mut sql = String::from("SELECT s.device_id, s.name, s.lat, s.long");
    for metric in metrics {
        let col = metric.column();
        sql.push_str(&format!(", AVG(sr.{col}) AS avg_{col}"));
    }
    sql.push_str(
        ", COUNT(sr.device_id) AS reading_count \
         FROM sensors s \
         LEFT JOIN sensor_readings sr \
             ON s.device_id = sr.device_id AND sr.event_time >= $2 AND sr.event_time <= $3 \
         WHERE s.device_id = ANY($1) \
         GROUP BY s.device_id, s.name, s.lat, s.long",
    );

    let rows = sqlx::query(&sql)
        .bind(sensor_ids)
        .bind(from)
        .bind(to)
        .fetch_all(pool)
        .await?;

    let count_index = 4 + metrics.len();
    rows.into_iter()
        .map(|row| {
            let mut values = Vec::with_capacity(metrics.len());
            for i in 0..metrics.len() {
                values.push(row.try_get(4 + i)?);
            }
            Ok(SpatialSensorRow {
                device_id: row.try_get(0)?,
                name: row.try_get(1)?,
                lat: row.try_get(2)?,
                long: row.try_get(3)?,
                reading_count: row.try_get(count_index)?,
                values,
            })
        })
        .collect()
}

/// Device IDs with at least one reading in the time range.
pub async fn available_sensors(
    pool: &PgPool,
    from: i64,
    to: i64,
) -> Result<Vec<String>, sqlx::Error> {
    // ---
    sqlx::query_scalar(
        "SELECT DISTINCT device_id FROM sensor_readings \
         WHERE event_time >= $1 AND event_time <= $2",
    )
    .bind(from)
    .bind(to)
    .fetch_all(pool)
    .await
}
