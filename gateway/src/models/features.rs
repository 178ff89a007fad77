use serde::Serialize;
use sqlx::FromRow;

/// Trailing-window aggregates rolled up once per feature trigger, consumed
/// by the offline health-prediction pipeline.
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct FeatureRollup {
    pub device_id: String,
    pub cycle_index: i64,
    pub timestamp: i64,
    pub mean_temp_last_50_cycles: f64,
    pub mean_dod_last_50_cycles: f64,
    pub mean_capacity_last_50_cycles: f64,
    pub capacity_slope_last_200_cycles: f64,
    pub hours_soc_gt_90_last_7d: f64,
    pub idle_hours_last_7d: f64,
}
