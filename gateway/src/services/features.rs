use log::{error, info, warn};

use crate::error::GatewayError;
use crate::models::features::FeatureRollup;
use crate::models::telemetry::TelemetryRow;
use crate::repository::{FeatureRepository, TelemetryRepository};

const BLOCK_CYCLES: i64 = 50;
const SLOPE_CYCLES: i64 = 200;
const RECENT_WINDOW_SECS: i64 = 7 * 24 * 3600;
const MIN_DOWNTIME_SECS: i64 = 300;
const HIGH_SOC_THRESHOLD: i64 = 90;

/// Computes trailing-window feature rollups for the offline health model.
/// Runs as a spawned side effect of ingest; failures are logged and never
/// reach the telemetry path.
pub struct FeatureService {
    telemetry: TelemetryRepository,
    features: FeatureRepository,
}

impl FeatureService {
    pub fn new(telemetry: TelemetryRepository, features: FeatureRepository) -> Self {
        Self {
            telemetry,
            features,
        }
    }

    pub async fn maybe_rollup(&self, device_id: &str, cycle_index: i64) {
        match self.compute_rollup(device_id, cycle_index).await {
            Ok(true) => info!("stored feature rollup for {device_id} at cycle {cycle_index}"),
            Ok(false) => {}
            Err(e) => error!("feature rollup failed for {device_id}: {e}"),
        }
    }

    /// Returns true when a new rollup was stored.
    async fn compute_rollup(
        &self,
        device_id: &str,
        cycle_index: i64,
    ) -> Result<bool, GatewayError> {
        if self.features.exists(device_id, cycle_index).await? {
            return Ok(false);
        }

        let block = self
            .telemetry
            .rows_for_cycles(device_id, cycle_index + 1 - BLOCK_CYCLES, cycle_index)
            .await?;
        if block.is_empty() {
            warn!("no rows in the {BLOCK_CYCLES}-cycle block for {device_id}, skipping rollup");
            return Ok(false);
        }

        let mean_temp = mean(block.iter().map(|r| r.cell_temp));
        let mean_capacity = mean(block.iter().map(|r| r.capacity));
        let mean_dod = mean_depth_of_discharge(&block, cycle_index);

        let first = self
            .telemetry
            .first_row_of_cycle(device_id, cycle_index - SLOPE_CYCLES + 1)
            .await?;
        let second = self.telemetry.first_row_of_cycle(device_id, cycle_index).await?;
        let (Some(first), Some(second)) = (first, second) else {
            warn!("missing slope endpoints for {device_id} at cycle {cycle_index}");
            return Ok(false);
        };
        let elapsed_hours = (second.timestamp - first.timestamp) as f64 / 3600.0;
        if elapsed_hours <= 0.0 {
            warn!("degenerate slope window for {device_id} at cycle {cycle_index}");
            return Ok(false);
        }
        let capacity_slope = (second.capacity - first.capacity) / elapsed_hours;

        let recent = self
            .telemetry
            .rows_since(device_id, second.timestamp - RECENT_WINDOW_SECS)
            .await?;
        let (idle_hours, high_soc_hours) = recent_usage_hours(&recent);

        self.features
            .insert(&FeatureRollup {
                device_id: device_id.to_string(),
                cycle_index,
                timestamp: second.timestamp,
                mean_temp_last_50_cycles: mean_temp,
                mean_dod_last_50_cycles: mean_dod,
                mean_capacity_last_50_cycles: mean_capacity,
                capacity_slope_last_200_cycles: capacity_slope,
                hours_soc_gt_90_last_7d: high_soc_hours,
                idle_hours_last_7d: idle_hours,
            })
            .await?;
        Ok(true)
    }
}

fn mean(values: impl Iterator<Item = f64>) -> f64 {
    let (sum, n) = values.fold((0.0, 0usize), |(s, n), v| (s + v, n + 1));
    if n == 0 { 0.0 } else { sum / n as f64 }
}

/// Depth of discharge per cycle is the minimum state of charge the cycle
/// reached; averaged over the block's cycles that have any rows.
fn mean_depth_of_discharge(block: &[TelemetryRow], cycle_index: i64) -> f64 {
    let mut depths = Vec::new();
    for cycle in (cycle_index + 1 - BLOCK_CYCLES)..=cycle_index {
        let min_soc = block
            .iter()
            .filter(|r| r.cycle_count == cycle)
            .map(|r| r.soc)
            .min();
        if let Some(min_soc) = min_soc {
            depths.push(min_soc as f64);
        }
    }
    mean(depths.into_iter())
}

/// Splits the trailing week into idle time (gaps longer than the downtime
/// threshold) and time spent above 90% state of charge. Rows must be in
/// ascending timestamp order.
fn recent_usage_hours(rows: &[TelemetryRow]) -> (f64, f64) {
    let Some(first) = rows.first() else {
        return (0.0, 0.0);
    };

    let mut idle_secs: i64 = 0;
    let mut last_timestamp = first.timestamp;

    let mut high_soc_secs: i64 = 0;
    let mut above_since = first.timestamp;
    let mut was_above = false;

    for row in rows {
        if row.timestamp - last_timestamp > MIN_DOWNTIME_SECS {
            idle_secs += row.timestamp - last_timestamp;
        }
        last_timestamp = row.timestamp;

        if row.soc <= HIGH_SOC_THRESHOLD {
            if was_above {
                high_soc_secs += row.timestamp - above_since;
                was_above = false;
            }
        } else {
            if !was_above {
                above_since = row.timestamp;
            }
            was_above = true;
        }
    }

    (idle_secs as f64 / 3600.0, high_soc_secs as f64 / 3600.0)
}
