use serde::Deserialize;

use crate::models::telemetry::ChartColumn;

#[derive(Debug, Deserialize)]
pub struct LatestTelemetryRequest {
    pub device_id: String,
}

#[derive(Debug, Deserialize)]
pub struct ChartDataRequest {
    pub device_id: String,
    pub column: ChartColumn,
}

#[derive(Debug, Deserialize)]
pub struct RecommendationRequest {
    pub device_id: String,
}

#[derive(Debug, Deserialize)]
pub struct DashboardQuery {
    pub device_id: String,
}
