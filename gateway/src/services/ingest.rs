use chrono::{NaiveDate, NaiveDateTime, Utc};
use log::{debug, error};
use std::sync::Arc;

use crate::error::GatewayError;
use crate::models::telemetry::{DeviceReading, RawReading, TelemetryRow};
use crate::repository::{DeviceRepository, TelemetryRepository};
use crate::services::features::FeatureService;
use crate::services::soc::estimate_cell_soc;

/// Converts the firmware's DDMMYY date integer and HHMMSS.ss time float
/// into a UTC epoch timestamp. A zero date is the firmware's
/// "clock never set" sentinel and is rejected.
fn local_clock_timestamp(d: i64, t: f64) -> Result<i64, GatewayError> {
    if d == 0 {
        return Err(GatewayError::MalformedMessage(
            "device clock not set (d = 0)".to_string(),
        ));
    }

    let day = (d / 10_000) as u32;
    let month = ((d / 100) % 100) as u32;
    let year = 2000 + (d % 100) as i32;

    let hour = (t / 10_000.0) as u32;
    let minute = ((t / 100.0) % 100.0) as u32;
    let second = t % 100.0;

    let date = NaiveDate::from_ymd_opt(year, month, day).ok_or_else(|| {
        GatewayError::MalformedMessage(format!("invalid wire date: {d}"))
    })?;
    let time = chrono::NaiveTime::from_hms_milli_opt(
        hour,
        minute,
        second as u32,
        ((second.fract()) * 1000.0) as u32,
    )
    .ok_or_else(|| GatewayError::MalformedMessage(format!("invalid wire time: {t}")))?;

    Ok(NaiveDateTime::new(date, time).and_utc().timestamp())
}

fn wire_timestamp(raw: &RawReading) -> Result<i64, GatewayError> {
    if let Some(text) = &raw.timestamp {
        if let Ok(ts) = chrono::DateTime::parse_from_rfc3339(text) {
            return Ok(ts.timestamp());
        }
        // firmware without a timezone-aware clock sends bare local datetimes
        if let Ok(naive) = NaiveDateTime::parse_from_str(text, "%Y-%m-%dT%H:%M:%S%.f") {
            return Ok(naive.and_utc().timestamp());
        }
        return Err(GatewayError::MalformedMessage(format!(
            "unparseable timestamp: {text}"
        )));
    }

    match (raw.d, raw.t) {
        (Some(d), Some(t)) => local_clock_timestamp(d, t),
        _ => Err(GatewayError::MalformedMessage(
            "reading carries neither a timestamp nor a d/t pair".to_string(),
        )),
    }
}

/// Scales a raw wire reading into SI units and derives the per-cell charge
/// estimates from voltage + temperature.
pub fn row_from_raw(raw: &RawReading) -> Result<TelemetryRow, GatewayError> {
    let timestamp = wire_timestamp(raw)?;

    let v1 = raw.v1 / 100.0;
    let v2 = raw.v2 / 100.0;
    let v3 = raw.v3 / 100.0;
    let v4 = raw.v4 / 100.0;
    let t1 = raw.t1 / 100.0;
    let t2 = raw.t2 / 100.0;
    let t3 = raw.t3 / 100.0;
    let t4 = raw.t4 / 100.0;

    Ok(TelemetryRow {
        timestamp,
        lat: raw.lat,
        lon: raw.lon,
        soc: raw.q,
        soh: raw.h,
        capacity: raw.c,
        pack_voltage: raw.v / 10.0,
        v1,
        v2,
        v3,
        v4,
        pack_current: raw.i / 10.0,
        i1: raw.i1 / 100.0,
        i2: raw.i2 / 100.0,
        i3: raw.i3 / 100.0,
        i4: raw.i4 / 100.0,
        ambient_temp: raw.at / 10.0,
        cell_temp: raw.ct / 10.0,
        t1,
        t2,
        t3,
        t4,
        q1: estimate_cell_soc(v1, t1),
        q2: estimate_cell_soc(v2, t2),
        q3: estimate_cell_soc(v3, t3),
        q4: estimate_cell_soc(v4, t4),
        otc: raw.otc,
        cycle_count: raw.cc,
        wifi: raw.wifi,
    })
}

// Feature trigger thresholds: the largest block feature spans 200 cycles,
// and a new rollup is taken every 10th cycle past that.
const MIN_CYCLE_HISTORY: i64 = 200;
const ROLLUP_EVERY: i64 = 10;

/// Consumes reading batches from field-device connections: idle-filters,
/// upserts the mesh directory, appends telemetry rows and evaluates the
/// feature-extraction trigger. Transport-free; the connection task owns the
/// dashboard broadcast of whatever this accepts.
pub struct IngestService {
    telemetry: TelemetryRepository,
    devices: DeviceRepository,
    features: Arc<FeatureService>,
}

impl IngestService {
    pub fn new(
        telemetry: TelemetryRepository,
        devices: DeviceRepository,
        features: Arc<FeatureService>,
    ) -> Self {
        Self {
            telemetry,
            devices,
            features,
        }
    }

    /// Processes one ordered batch; element 0 is the mesh root. Failures are
    /// isolated per element: a bad row is logged and skipped, the rest of
    /// the batch still lands. Returns the accepted `(device_id, row)` pairs
    /// in batch order for broadcast.
    pub async fn process_batch(&self, batch: &[DeviceReading]) -> Vec<(String, TelemetryRow)> {
        let Some(root) = batch.first() else {
            return Vec::new();
        };
        let root_id = root.id.clone();

        let mut accepted = Vec::new();
        for (index, reading) in batch.iter().enumerate() {
            // idle filter: the device records nothing meaningful at zero current
            if reading.content.i == 0.0 {
                continue;
            }

            let row = match row_from_raw(&reading.content) {
                Ok(row) => row,
                Err(e) => {
                    error!("skipping reading from {}: {}", reading.id, e);
                    continue;
                }
            };

            let parent = if index == 0 { None } else { Some(root_id.as_str()) };
            let now = Utc::now().timestamp();
            if let Err(e) = self.devices.upsert(&reading.id, parent, now).await {
                error!("directory upsert failed for {}: {}", reading.id, e);
                continue;
            }

            match self.telemetry.append(&reading.id, &row).await {
                Ok(()) => {}
                Err(GatewayError::DuplicateTimestamp) => {
                    debug!(
                        "duplicate timestamp {} for {}, skipping",
                        row.timestamp, reading.id
                    );
                    continue;
                }
                Err(e) => {
                    error!("append failed for {}: {}", reading.id, e);
                    continue;
                }
            }

            self.maybe_trigger_rollup(&reading.id, row.cycle_count);
            accepted.push((reading.id.clone(), row));
        }

        accepted
    }

    /// Spawns the rollup computation when the cycle counter crosses a
    /// trigger point. Fire-and-forget: feature extraction must never block
    /// or fail persistence of the raw row.
    fn maybe_trigger_rollup(&self, device_id: &str, cycle_count: i64) {
        let cycle_index = cycle_count - 1;
        if cycle_index < MIN_CYCLE_HISTORY || cycle_index % ROLLUP_EVERY != 0 {
            return;
        }
        let features = Arc::clone(&self.features);
        let device_id = device_id.to_string();
        tokio::spawn(async move {
            features.maybe_rollup(&device_id, cycle_index).await;
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn raw() -> RawReading {
        serde_json::from_value(serde_json::json!({
            "Q": 88, "H": 95, "C": 1.8, "V": 41.0,
            "V1": 385.0, "V2": 386.0, "V3": 384.0, "V4": 385.0,
            "I": -12.0, "I1": -30.0, "I2": -30.0, "I3": -30.0, "I4": -30.0,
            "aT": 268.0, "cT": 295.0,
            "T1": 2500.0, "T2": 2500.0, "T3": 2500.0, "T4": 2500.0,
            "OTC": 3, "CC": 42, "wifi": true,
            "lat": 51.5, "lon": -0.1,
            "timestamp": "2024-06-01T12:30:00"
        }))
        .unwrap()
    }

    #[test]
    fn raw_fields_are_scaled_to_si_units() {
        let row = row_from_raw(&raw()).unwrap();
        assert!((row.pack_voltage - 4.1).abs() < 1e-9);
        assert!((row.v1 - 3.85).abs() < 1e-9);
        assert!((row.pack_current - -1.2).abs() < 1e-9);
        assert!((row.i1 - -0.3).abs() < 1e-9);
        assert!((row.ambient_temp - 26.8).abs() < 1e-9);
        assert!((row.cell_temp - 29.5).abs() < 1e-9);
        assert!((row.t1 - 25.0).abs() < 1e-9);
    }

    #[test]
    fn per_cell_charges_are_derived() {
        let row = row_from_raw(&raw()).unwrap();
        assert!(row.q1 > 0.0 && row.q1 < 100.0);
        assert!(row.q2 > row.q1); // 3.86 V sits above 3.85 V on the curve
    }

    #[test]
    fn local_clock_pair_is_converted() {
        // 15 March 2024, 14:30:05.25
        let ts = local_clock_timestamp(150324, 143005.25).unwrap();
        let expected = NaiveDate::from_ymd_opt(2024, 3, 15)
            .unwrap()
            .and_hms_opt(14, 30, 5)
            .unwrap()
            .and_utc()
            .timestamp();
        assert_eq!(ts, expected);
    }

    #[test]
    fn zero_date_sentinel_is_rejected() {
        assert!(matches!(
            local_clock_timestamp(0, 120000.0),
            Err(GatewayError::MalformedMessage(_))
        ));
    }

    #[test]
    fn reading_without_any_clock_is_rejected() {
        let mut reading = raw();
        reading.timestamp = None;
        assert!(matches!(
            row_from_raw(&reading),
            Err(GatewayError::MalformedMessage(_))
        ));
    }
}
