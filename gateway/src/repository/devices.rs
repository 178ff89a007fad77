use sqlx::{Pool, Sqlite};

use crate::error::GatewayError;
use crate::models::devices::DeviceRecord;

/// Data access for the mesh directory (`device_info`). Rows are created on
/// first telemetry contact and never deleted by the gateway.
#[derive(Clone)]
pub struct DeviceRepository {
    pool: Pool<Sqlite>,
}

impl DeviceRepository {
    pub fn new(pool: Pool<Sqlite>) -> Self {
        Self { pool }
    }

    /// Creates or refreshes one directory entry. Called per accepted batch
    /// element, so an upsert keeps exactly one record per device id.
    pub async fn upsert(
        &self,
        device_id: &str,
        root_id: Option<&str>,
        now: i64,
    ) -> Result<(), GatewayError> {
        sqlx::query(
            "INSERT INTO device_info (device_id, root_id, last_updated_time, live) \
             VALUES (?, ?, ?, 1) \
             ON CONFLICT(device_id) DO UPDATE SET \
                 root_id = excluded.root_id, \
                 last_updated_time = excluded.last_updated_time, \
                 live = 1",
        )
        .bind(device_id)
        .bind(root_id)
        .bind(now)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn set_live(&self, device_id: &str, live: bool, now: i64) -> Result<(), GatewayError> {
        sqlx::query(
            "UPDATE device_info SET live = ?, last_updated_time = ? WHERE device_id = ?",
        )
        .bind(live)
        .bind(now)
        .bind(device_id)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Startup reconciliation: the registry is empty after a restart, so any
    /// persisted `live = true` flag is stale.
    pub async fn reset_all_live(&self) -> Result<u64, GatewayError> {
        let result = sqlx::query("UPDATE device_info SET live = 0 WHERE live = 1")
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }

    pub async fn get(&self, device_id: &str) -> Result<Option<DeviceRecord>, GatewayError> {
        let record = sqlx::query_as::<_, DeviceRecord>(
            "SELECT device_id, root_id, last_updated_time, live FROM device_info \
             WHERE device_id = ?",
        )
        .bind(device_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(record)
    }

    pub async fn all(&self) -> Result<Vec<DeviceRecord>, GatewayError> {
        let records = sqlx::query_as::<_, DeviceRecord>(
            "SELECT device_id, root_id, last_updated_time, live FROM device_info \
             ORDER BY device_id ASC",
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(records)
    }
}
