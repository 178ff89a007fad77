use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;

/// One element of a field-device batch. Element 0 of a batch is the mesh
/// root; the rest are node devices relayed through the root's connection.
#[derive(Debug, Clone, Deserialize)]
pub struct DeviceReading {
    pub id: String,
    pub content: RawReading,
}

/// Raw wire reading as sent by the BMS firmware. Analog fields arrive as
/// scaled integers: `V` in decivolts, `V1..V4` in centivolts, `I` in
/// deciamps, `I1..I4` in centiamps, `aT`/`cT` in deci-degrees C and
/// `T1..T4` in centi-degrees C. The timestamp is either an RFC 3339 string
/// or the device-local `d` (DDMMYY) + `t` (HHMMSS.ss) pair.
#[derive(Debug, Clone, Deserialize)]
pub struct RawReading {
    #[serde(rename = "Q")]
    pub q: i64,
    #[serde(rename = "H")]
    pub h: i64,
    #[serde(rename = "C", default)]
    pub c: f64,
    #[serde(rename = "V")]
    pub v: f64,
    #[serde(rename = "V1", default)]
    pub v1: f64,
    #[serde(rename = "V2", default)]
    pub v2: f64,
    #[serde(rename = "V3", default)]
    pub v3: f64,
    #[serde(rename = "V4", default)]
    pub v4: f64,
    #[serde(rename = "I")]
    pub i: f64,
    #[serde(rename = "I1", default)]
    pub i1: f64,
    #[serde(rename = "I2", default)]
    pub i2: f64,
    #[serde(rename = "I3", default)]
    pub i3: f64,
    #[serde(rename = "I4", default)]
    pub i4: f64,
    #[serde(rename = "aT")]
    pub at: f64,
    #[serde(rename = "cT", default)]
    pub ct: f64,
    #[serde(rename = "T1", default)]
    pub t1: f64,
    #[serde(rename = "T2", default)]
    pub t2: f64,
    #[serde(rename = "T3", default)]
    pub t3: f64,
    #[serde(rename = "T4", default)]
    pub t4: f64,
    #[serde(rename = "OTC", default)]
    pub otc: i64,
    #[serde(rename = "CC", default)]
    pub cc: i64,
    #[serde(default)]
    pub wifi: bool,
    #[serde(default)]
    pub lat: f64,
    #[serde(default)]
    pub lon: f64,
    /// RFC 3339 timestamp, if the firmware has a synchronized clock.
    #[serde(default)]
    pub timestamp: Option<String>,
    /// Device-local date as a DDMMYY integer.
    #[serde(default)]
    pub d: Option<i64>,
    /// Device-local time as an HHMMSS.ss float.
    #[serde(default)]
    pub t: Option<f64>,
}

/// A persisted telemetry row. Append-only; `(device_id, timestamp)` is the
/// natural key. All analog fields are in SI units, `q1..q4` are the derived
/// per-cell state-of-charge estimates.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow, ToSchema)]
pub struct TelemetryRow {
    pub timestamp: i64,
    pub lat: f64,
    pub lon: f64,
    pub soc: i64,
    pub soh: i64,
    pub capacity: f64,
    pub pack_voltage: f64,
    pub v1: f64,
    pub v2: f64,
    pub v3: f64,
    pub v4: f64,
    pub pack_current: f64,
    pub i1: f64,
    pub i2: f64,
    pub i3: f64,
    pub i4: f64,
    pub ambient_temp: f64,
    pub cell_temp: f64,
    pub t1: f64,
    pub t2: f64,
    pub t3: f64,
    pub t4: f64,
    pub q1: f64,
    pub q2: f64,
    pub q3: f64,
    pub q4: f64,
    pub otc: i64,
    pub cycle_count: i64,
    pub wifi: bool,
}

/// Columns a chart series may be requested for. Keeps the dynamic column
/// selection a closed set rather than interpolating caller input into SQL.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum ChartColumn {
    Soc,
    Soh,
    Capacity,
    PackVoltage,
    V1,
    V2,
    V3,
    V4,
    PackCurrent,
    I1,
    I2,
    I3,
    I4,
    AmbientTemp,
    CellTemp,
    T1,
    T2,
    T3,
    T4,
    Q1,
    Q2,
    Q3,
    Q4,
    Otc,
    CycleCount,
}

impl ChartColumn {
    pub fn as_sql(&self) -> &'static str {
        match self {
            ChartColumn::Soc => "soc",
            ChartColumn::Soh => "soh",
            ChartColumn::Capacity => "capacity",
            ChartColumn::PackVoltage => "pack_voltage",
            ChartColumn::V1 => "v1",
            ChartColumn::V2 => "v2",
            ChartColumn::V3 => "v3",
            ChartColumn::V4 => "v4",
            ChartColumn::PackCurrent => "pack_current",
            ChartColumn::I1 => "i1",
            ChartColumn::I2 => "i2",
            ChartColumn::I3 => "i3",
            ChartColumn::I4 => "i4",
            ChartColumn::AmbientTemp => "ambient_temp",
            ChartColumn::CellTemp => "cell_temp",
            ChartColumn::T1 => "t1",
            ChartColumn::T2 => "t2",
            ChartColumn::T3 => "t3",
            ChartColumn::T4 => "t4",
            ChartColumn::Q1 => "q1",
            ChartColumn::Q2 => "q2",
            ChartColumn::Q3 => "q3",
            ChartColumn::Q4 => "q4",
            ChartColumn::Otc => "otc",
            ChartColumn::CycleCount => "cycle_count",
        }
    }
}
