use chrono::{DateTime, Datelike};

use crate::error::GatewayError;
use crate::models::responses::ChartPoint;
use crate::models::telemetry::{ChartColumn, TelemetryRow};
use crate::repository::TelemetryRepository;

/// Upper bound on points per chart; enough for a dashboard plot without
/// shipping the whole series.
const MAX_CHART_POINTS: i64 = 250;

const ONE_DAY_SECS: i64 = 24 * 3600;

/// Read side of the telemetry store: latest snapshot and per-column chart
/// series for the dashboard.
pub struct TelemetryService {
    telemetry: TelemetryRepository,
}

impl TelemetryService {
    pub fn new(telemetry: TelemetryRepository) -> Self {
        Self { telemetry }
    }

    pub async fn latest(&self, device_id: &str) -> Result<Option<TelemetryRow>, GatewayError> {
        self.telemetry.latest(device_id).await
    }

    /// One column's recent history, chronological, trimmed to the newest
    /// sample's calendar day and cut at the first gap longer than a day.
    pub async fn chart(
        &self,
        device_id: &str,
        column: ChartColumn,
    ) -> Result<Vec<ChartPoint>, GatewayError> {
        let series = self
            .telemetry
            .column_series(device_id, column, MAX_CHART_POINTS)
            .await?;
        Ok(trim_chart_series(&series))
    }
}

/// `series` arrives newest-first. Keeps only samples from the same UTC day
/// as the newest one, stops at the first inter-sample gap over a day, and
/// returns the survivors oldest-first.
fn trim_chart_series(series: &[ChartPoint]) -> Vec<ChartPoint> {
    let Some(newest) = series.first() else {
        return Vec::new();
    };
    let day = day_ordinal(newest.timestamp);

    let mut points = Vec::new();
    let mut previous = newest.timestamp;
    for point in series {
        if day_ordinal(point.timestamp) != day || previous - point.timestamp > ONE_DAY_SECS {
            break;
        }
        points.push(point.clone());
        previous = point.timestamp;
    }
    points.reverse();
    points
}

fn day_ordinal(timestamp: i64) -> i32 {
    DateTime::from_timestamp(timestamp, 0)
        .map(|dt| dt.num_days_from_ce())
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    // 2024-06-01T12:00:00Z
    const NOON: i64 = 1_717_243_200;

    fn point(timestamp: i64, value: f64) -> ChartPoint {
        ChartPoint { timestamp, value }
    }

    #[test]
    fn empty_series_yields_no_points() {
        assert!(trim_chart_series(&[]).is_empty());
    }

    #[test]
    fn points_come_back_chronological() {
        let series = vec![point(NOON, 3.0), point(NOON - 60, 2.0), point(NOON - 120, 1.0)];
        let points = trim_chart_series(&series);
        assert_eq!(points.len(), 3);
        assert!(points.windows(2).all(|p| p[0].timestamp < p[1].timestamp));
        assert!((points[0].value - 1.0).abs() < 1e-9);
    }

    #[test]
    fn samples_from_an_earlier_day_are_dropped() {
        let series = vec![
            point(NOON, 3.0),
            point(NOON - 3600, 2.0),
            point(NOON - ONE_DAY_SECS, 1.0), // previous day
        ];
        let points = trim_chart_series(&series);
        assert_eq!(points.len(), 2);
    }
}
