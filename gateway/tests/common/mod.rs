#![allow(dead_code)]

use sqlx::sqlite::SqlitePoolOptions;
use sqlx::{Pool, Sqlite};

use gateway::models::telemetry::TelemetryRow;

/// Fresh in-memory database with the production schema applied. A single
/// connection keeps every query on the same in-memory instance.
pub async fn memory_pool() -> Pool<Sqlite> {
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect("sqlite::memory:")
        .await
        .expect("in-memory database");
    sqlx::migrate!("./migrations")
        .run(&pool)
        .await
        .expect("migrations");
    pool
}

/// A plausible discharge row at `timestamp`; tests override what they care
/// about.
pub fn sample_row(timestamp: i64) -> TelemetryRow {
    TelemetryRow {
        timestamp,
        lat: 51.5,
        lon: -0.1,
        soc: 80,
        soh: 95,
        capacity: 1.8,
        pack_voltage: 4.0,
        v1: 3.85,
        v2: 3.86,
        v3: 3.84,
        v4: 3.85,
        pack_current: -1.0,
        i1: -0.25,
        i2: -0.25,
        i3: -0.25,
        i4: -0.25,
        ambient_temp: 24.0,
        cell_temp: 26.0,
        t1: 25.0,
        t2: 25.0,
        t3: 25.0,
        t4: 25.0,
        q1: 60.0,
        q2: 61.0,
        q3: 59.0,
        q4: 60.0,
        otc: 0,
        cycle_count: 1,
        wifi: true,
    }
}
