use chrono::Utc;

use crate::error::GatewayError;
use crate::models::responses::Recommendation;
use crate::models::telemetry::TelemetryRow;
use crate::repository::TelemetryRepository;
use crate::services::query::WindowedQueryEngine;
use std::sync::Arc;

/// Hours of active usage each check looks back over.
const WINDOW_HOURS: f64 = 12.0;

const HIGH_TEMPERATURE_THRESHOLD: f64 = 40.0; // degrees C
const DISCHARGE_CURRENT_LIMIT: f64 = 2.0; // Amps
const LOW_POWER_THRESHOLD: f64 = 2.0; // Watts
const DEPTH_OF_DISCHARGE_THRESHOLD: f64 = 1.0; // Volts
const MINIMUM_OPERATING_VOLTAGE: f64 = 2.7; // Volts
const MIN_GAP_SECS: i64 = 300;
/// Currents below this magnitude count as idle when detecting cycles.
const CURRENT_EPSILON: f64 = 0.01;

/// Derives BMS optimisation flags (overheating, underutilization, shallow
/// cycling) from recent telemetry, sized by the windowed query engine so
/// idle gaps don't dilute the statistics.
pub struct RecommendationService {
    telemetry: TelemetryRepository,
    query: Arc<WindowedQueryEngine>,
}

impl RecommendationService {
    pub fn new(telemetry: TelemetryRepository, query: Arc<WindowedQueryEngine>) -> Self {
        Self { telemetry, query }
    }

    pub async fn recommendations(
        &self,
        device_id: &str,
    ) -> Result<Vec<Recommendation>, GatewayError> {
        self.recommendations_from(device_id, Utc::now().timestamp())
            .await
    }

    pub async fn recommendations_from(
        &self,
        device_id: &str,
        cursor: i64,
    ) -> Result<Vec<Recommendation>, GatewayError> {
        let window = self
            .query
            .row_count_from(device_id, cursor, WINDOW_HOURS)
            .await?;

        let mut recommendations = Vec::new();

        if self.high_temperature(device_id, window).await? {
            recommendations.push(Recommendation {
                kind: "current-dischg-limit".to_string(),
                message: format!(
                    "Overheating detected (> {HIGH_TEMPERATURE_THRESHOLD:.1} C). \
                     Throttle discharge current to {DISCHARGE_CURRENT_LIMIT}A."
                ),
                min: None,
                max: Some(DISCHARGE_CURRENT_LIMIT),
            });
        }

        if self.low_power(device_id, window).await? {
            recommendations.push(Recommendation {
                kind: "soc-window".to_string(),
                message: format!(
                    "Low average power usage (< {LOW_POWER_THRESHOLD}W) over last \
                     {WINDOW_HOURS} hours of usage. Restrict SoC range to [40,60]%."
                ),
                min: Some(40.0),
                max: Some(60.0),
            });
        }

        if self.shallow_cycling(device_id, window).await? {
            recommendations.push(Recommendation {
                kind: "operating-voltage".to_string(),
                message: format!(
                    "Frequently low depth of discharge (dV < \
                     {DEPTH_OF_DISCHARGE_THRESHOLD}V) over last {WINDOW_HOURS} hours \
                     of usage. Reduce operating voltage to {:.1}V.",
                    MINIMUM_OPERATING_VOLTAGE + DEPTH_OF_DISCHARGE_THRESHOLD
                ),
                min: None,
                max: Some(MINIMUM_OPERATING_VOLTAGE + DEPTH_OF_DISCHARGE_THRESHOLD),
            });
        }

        Ok(recommendations)
    }

    /// Mean cell temperature over the active window.
    async fn high_temperature(&self, device_id: &str, window: i64) -> Result<bool, GatewayError> {
        let rows = self.telemetry.recent(device_id, window).await?;
        if rows.is_empty() {
            return Ok(false);
        }
        let mean =
            rows.iter().map(|r| r.cell_temp).sum::<f64>() / rows.len() as f64;
        Ok(mean > HIGH_TEMPERATURE_THRESHOLD)
    }

    /// Mean discharge power over the active window, discharge rows only.
    async fn low_power(&self, device_id: &str, window: i64) -> Result<bool, GatewayError> {
        let rows = self.telemetry.discharge_recent(device_id, window).await?;
        if rows.is_empty() {
            return Ok(false);
        }
        let mean = rows
            .iter()
            .map(|r| -r.pack_current * r.pack_voltage)
            .sum::<f64>()
            / rows.len() as f64;
        Ok(mean < LOW_POWER_THRESHOLD)
    }

    /// Detects repeated shallow discharge cycles: more than four complete
    /// idle-discharge-idle segments whose mean voltage drop is below the
    /// threshold.
    async fn shallow_cycling(&self, device_id: &str, window: i64) -> Result<bool, GatewayError> {
        let mut rows = self.telemetry.recent(device_id, window).await?;
        rows.reverse(); // oldest-to-newest
        let depths = discharge_depths(&rows);
        if depths.len() <= 4 {
            return Ok(false);
        }
        let mean = depths.iter().sum::<f64>() / depths.len() as f64;
        Ok(mean < DEPTH_OF_DISCHARGE_THRESHOLD)
    }
}

/// Walks ascending rows and measures the voltage drop of each complete
/// discharge cycle. A cycle starts at the first idle row after a period of
/// charging and stops just before current flows again; cycles interrupted
/// by an idle gap longer than the downtime threshold are discarded.
/// A discharge already underway at the start of the data is skipped.
fn discharge_depths(rows: &[TelemetryRow]) -> Vec<f64> {
    let mut depths = Vec::new();
    let mut clean_start = false;
    let mut start: Option<usize> = None;
    let mut stop: Option<usize> = None;

    for (i, row) in rows.iter().enumerate() {
        match start {
            Some(s) => {
                if let Some(e) = stop {
                    let interrupted = (s..e)
                        .any(|j| rows[j + 1].timestamp - rows[j].timestamp > MIN_GAP_SECS);
                    if !interrupted {
                        depths.push(rows[s].pack_voltage - rows[e].pack_voltage);
                    }
                    start = None;
                    stop = None;
                    continue;
                }
                if row.pack_current > CURRENT_EPSILON {
                    stop = Some(i - 1);
                }
            }
            None => {
                if row.pack_current > CURRENT_EPSILON {
                    clean_start = true;
                } else if clean_start {
                    start = Some(i);
                }
            }
        }
    }

    depths
}
