use sqlx::{Pool, Sqlite};

use crate::error::GatewayError;
use crate::models::responses::ChartPoint;
use crate::models::telemetry::{ChartColumn, TelemetryRow};

const ROW_COLUMNS: &str = "timestamp, lat, lon, soc, soh, capacity, pack_voltage, \
     v1, v2, v3, v4, pack_current, i1, i2, i3, i4, \
     ambient_temp, cell_temp, t1, t2, t3, t4, q1, q2, q3, q4, \
     otc, cycle_count, wifi";

/// Data access for the append-only telemetry series. One fixed-schema table
/// keyed by `(device_id, timestamp)`; a device's "series" is its partition.
#[derive(Clone)]
pub struct TelemetryRepository {
    pool: Pool<Sqlite>,
}

impl TelemetryRepository {
    pub fn new(pool: Pool<Sqlite>) -> Self {
        Self { pool }
    }

    /// Appends one row. The `(device_id, timestamp)` primary key makes the
    /// timestamp the natural key within a series; a second row with the same
    /// timestamp raises `DuplicateTimestamp`.
    pub async fn append(&self, device_id: &str, row: &TelemetryRow) -> Result<(), GatewayError> {
        let query = format!(
            "INSERT INTO telemetry (device_id, {ROW_COLUMNS}) \
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)"
        );
        let result = sqlx::query(&query)
            .bind(device_id)
            .bind(row.timestamp)
            .bind(row.lat)
            .bind(row.lon)
            .bind(row.soc)
            .bind(row.soh)
            .bind(row.capacity)
            .bind(row.pack_voltage)
            .bind(row.v1)
            .bind(row.v2)
            .bind(row.v3)
            .bind(row.v4)
            .bind(row.pack_current)
            .bind(row.i1)
            .bind(row.i2)
            .bind(row.i3)
            .bind(row.i4)
            .bind(row.ambient_temp)
            .bind(row.cell_temp)
            .bind(row.t1)
            .bind(row.t2)
            .bind(row.t3)
            .bind(row.t4)
            .bind(row.q1)
            .bind(row.q2)
            .bind(row.q3)
            .bind(row.q4)
            .bind(row.otc)
            .bind(row.cycle_count)
            .bind(row.wifi)
            .execute(&self.pool)
            .await;

        match result {
            Ok(_) => Ok(()),
            Err(sqlx::Error::Database(e)) if e.is_unique_violation() => {
                Err(GatewayError::DuplicateTimestamp)
            }
            Err(e) => Err(e.into()),
        }
    }

    pub async fn latest(&self, device_id: &str) -> Result<Option<TelemetryRow>, GatewayError> {
        let query = format!(
            "SELECT {ROW_COLUMNS} FROM telemetry WHERE device_id = ? \
             ORDER BY timestamp DESC LIMIT 1"
        );
        let row = sqlx::query_as::<_, TelemetryRow>(&query)
            .bind(device_id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row)
    }

    /// Most recent `limit` rows, newest first.
    pub async fn recent(
        &self,
        device_id: &str,
        limit: i64,
    ) -> Result<Vec<TelemetryRow>, GatewayError> {
        let query = format!(
            "SELECT {ROW_COLUMNS} FROM telemetry WHERE device_id = ? \
             ORDER BY timestamp DESC LIMIT ?"
        );
        let rows = sqlx::query_as::<_, TelemetryRow>(&query)
            .bind(device_id)
            .bind(limit)
            .fetch_all(&self.pool)
            .await?;
        Ok(rows)
    }

    /// Timestamp page for the windowing algorithm: up to `limit` timestamps
    /// at or before `cursor`, most recent first.
    pub async fn timestamps_at_or_before(
        &self,
        device_id: &str,
        cursor: i64,
        limit: i64,
    ) -> Result<Vec<i64>, GatewayError> {
        let timestamps = sqlx::query_scalar::<_, i64>(
            "SELECT timestamp FROM telemetry WHERE device_id = ? AND timestamp <= ? \
             ORDER BY timestamp DESC LIMIT ?",
        )
        .bind(device_id)
        .bind(cursor)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;
        Ok(timestamps)
    }

    /// Most recent `limit` points of a single column, newest first. The
    /// column name comes from the `ChartColumn` whitelist, never the caller.
    pub async fn column_series(
        &self,
        device_id: &str,
        column: ChartColumn,
        limit: i64,
    ) -> Result<Vec<ChartPoint>, GatewayError> {
        let query = format!(
            "SELECT timestamp, CAST({} AS REAL) AS value FROM telemetry \
             WHERE device_id = ? ORDER BY timestamp DESC LIMIT ?",
            column.as_sql()
        );
        let points = sqlx::query_as::<_, (i64, f64)>(&query)
            .bind(device_id)
            .bind(limit)
            .fetch_all(&self.pool)
            .await?
            .into_iter()
            .map(|(timestamp, value)| ChartPoint { timestamp, value })
            .collect();
        Ok(points)
    }

    /// All rows whose cycle counter lies in `[from_cycle, to_cycle]`,
    /// oldest first.
    pub async fn rows_for_cycles(
        &self,
        device_id: &str,
        from_cycle: i64,
        to_cycle: i64,
    ) -> Result<Vec<TelemetryRow>, GatewayError> {
        let query = format!(
            "SELECT {ROW_COLUMNS} FROM telemetry WHERE device_id = ? \
             AND cycle_count >= ? AND cycle_count <= ? ORDER BY timestamp ASC"
        );
        let rows = sqlx::query_as::<_, TelemetryRow>(&query)
            .bind(device_id)
            .bind(from_cycle)
            .bind(to_cycle)
            .fetch_all(&self.pool)
            .await?;
        Ok(rows)
    }

    pub async fn first_row_of_cycle(
        &self,
        device_id: &str,
        cycle: i64,
    ) -> Result<Option<TelemetryRow>, GatewayError> {
        let query = format!(
            "SELECT {ROW_COLUMNS} FROM telemetry WHERE device_id = ? AND cycle_count = ? \
             ORDER BY timestamp ASC LIMIT 1"
        );
        let row = sqlx::query_as::<_, TelemetryRow>(&query)
            .bind(device_id)
            .bind(cycle)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row)
    }

    /// Rows at or after `since`, oldest first.
    pub async fn rows_since(
        &self,
        device_id: &str,
        since: i64,
    ) -> Result<Vec<TelemetryRow>, GatewayError> {
        let query = format!(
            "SELECT {ROW_COLUMNS} FROM telemetry WHERE device_id = ? AND timestamp >= ? \
             ORDER BY timestamp ASC"
        );
        let rows = sqlx::query_as::<_, TelemetryRow>(&query)
            .bind(device_id)
            .bind(since)
            .fetch_all(&self.pool)
            .await?;
        Ok(rows)
    }

    /// Most recent `limit` discharge rows (negative pack current), newest
    /// first.
    pub async fn discharge_recent(
        &self,
        device_id: &str,
        limit: i64,
    ) -> Result<Vec<TelemetryRow>, GatewayError> {
        let query = format!(
            "SELECT {ROW_COLUMNS} FROM telemetry WHERE device_id = ? AND pack_current < 0 \
             ORDER BY timestamp DESC LIMIT ?"
        );
        let rows = sqlx::query_as::<_, TelemetryRow>(&query)
            .bind(device_id)
            .bind(limit)
            .fetch_all(&self.pool)
            .await?;
        Ok(rows)
    }
}
