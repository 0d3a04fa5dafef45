//! Database schema management for `airmesh-analytics`.
//!
//! Ensures required tables and indexes exist before serving requests.
//! Applied once on startup from `main.rs` (EMBP: single gateway call).

use anyhow::Result;
use sqlx::PgPool;

// ---

/// Create or update the database schema (idempotent).
///
/// Creates the `sensor_readings` table the ingestion path writes into and
/// the `sensors` registry the spatial/compare endpoints join against.
/// Safe to call on every startup; no-op if objects already exist.
///
/// Errors are propagated if any SQL execution fails.
pub async fn create_schema(pool: &PgPool) -> Result<()> {
    // ---
    let mut tx = pool.begin().await?;

    // Raw observations, one row per device report. Metric columns are
    // nullable: devices without the matching hardware send nothing.
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS sensor_readings (
            id                BIGSERIAL PRIMARY KEY,
            device_id         TEXT   NOT NULL,
            event_time        BIGINT NOT NULL,
            relative_humidity DOUBLE PRECISION,
            temperature       DOUBLE PRECISION,
            pm1               DOUBLE PRECISION,
            pm2_5             DOUBLE PRECISION,
            pm4               DOUBLE PRECISION,
            pm10              DOUBLE PRECISION,
            voc               DOUBLE PRECISION,
            nox               DOUBLE PRECISION,
            uptime            BIGINT,
            version           TEXT
        );
        "#,
    )
    .execute(&mut *tx)
    .await?;

    // Sensor registry with display name and WGS84 coordinates; sensors
    // without coordinates are skipped by spatial analysis.
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS sensors (
            device_id TEXT PRIMARY KEY,
            name      TEXT NOT NULL,
            lat       DOUBLE PRECISION,
            long      DOUBLE PRECISION
        );
        "#,
    )
    .execute(&mut *tx)
    .await?;

    // Every analysis query filters on (device_id, event_time)
    sqlx::query(
        r#"
        CREATE INDEX IF NOT EXISTS idx_sensor_readings_device_time
            ON sensor_readings (device_id, event_time);
        "#,
    )
    .execute(&mut *tx)
    .await?;

    // Availability scans only constrain event_time
    sqlx::query(
        r#"
        CREATE INDEX IF NOT EXISTS idx_sensor_readings_event_time
            ON sensor_readings (event_time);
        "#,
    )
    .execute(&mut *tx)
    .await?;

    tx.commit().await?;
    Ok(())
}
