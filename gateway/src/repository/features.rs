use sqlx::{Pool, Sqlite};

use crate::error::GatewayError;
use crate::models::features::FeatureRollup;

/// Data access for the asynchronously written feature rollups.
#[derive(Clone)]
pub struct FeatureRepository {
    pool: Pool<Sqlite>,
}

impl FeatureRepository {
    pub fn new(pool: Pool<Sqlite>) -> Self {
        Self { pool }
    }

    pub async fn exists(&self, device_id: &str, cycle_index: i64) -> Result<bool, GatewayError> {
        let count = sqlx::query_scalar::<_, i64>(
            "SELECT COUNT(*) FROM feature_rollups WHERE device_id = ? AND cycle_index = ?",
        )
        .bind(device_id)
        .bind(cycle_index)
        .fetch_one(&self.pool)
        .await?;
        Ok(count > 0)
    }

    pub async fn insert(&self, rollup: &FeatureRollup) -> Result<(), GatewayError> {
        sqlx::query(
            "INSERT INTO feature_rollups (device_id, cycle_index, timestamp, \
                 mean_temp_last_50_cycles, mean_dod_last_50_cycles, \
                 mean_capacity_last_50_cycles, capacity_slope_last_200_cycles, \
                 hours_soc_gt_90_last_7d, idle_hours_last_7d) \
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&rollup.device_id)
        .bind(rollup.cycle_index)
        .bind(rollup.timestamp)
        .bind(rollup.mean_temp_last_50_cycles)
        .bind(rollup.mean_dod_last_50_cycles)
        .bind(rollup.mean_capacity_last_50_cycles)
        .bind(rollup.capacity_slope_last_200_cycles)
        .bind(rollup.hours_soc_gt_90_last_7d)
        .bind(rollup.idle_hours_last_7d)
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}
