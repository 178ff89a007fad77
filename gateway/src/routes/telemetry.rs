use actix_web::{HttpResponse, Responder, Result, get, web};
use log::error;

use crate::error::GatewayError;
use crate::models::requests::{ChartDataRequest, LatestTelemetryRequest};
use crate::services::telemetry::TelemetryService;

/// Latest telemetry endpoint
#[utoipa::path(
    get,
    path = "/api/telemetry/latest",
    params(
        ("device_id" = String, Query, description = "Device to query", example = "bms_001"),
    ),
    responses(
        (status = 200, description = "Success", body = TelemetryRow),
        (status = 404, description = "No telemetry stored for the device", body = String),
        (status = 500, description = "Internal Server Error", body = String)
    ),
    tag = "API"
)]
#[get("/api/telemetry/latest")]
pub async fn get_latest_telemetry(
    req: web::Query<LatestTelemetryRequest>,
    service: web::Data<TelemetryService>,
) -> Result<impl Responder, GatewayError> {
    let req = req.into_inner();
    match service.latest(&req.device_id).await {
        Ok(Some(row)) => Ok(HttpResponse::Ok().json(row)),
        Ok(None) => Err(GatewayError::NoSuchDevice(req.device_id)),
        Err(e) => {
            error!("fetching latest telemetry for {} failed: {e}", req.device_id);
            Err(e)
        }
    }
}

/// Chart data endpoint
#[utoipa::path(
    get,
    path = "/api/telemetry/chart",
    params(
        ("device_id" = String, Query, description = "Device to query", example = "bms_001"),
        ("column" = String, Query, description = "Telemetry column to plot", example = "pack_voltage"),
    ),
    responses(
        (status = 200, description = "Success", body = Vec<ChartPoint>),
        (status = 400, description = "Unknown column", body = String),
        (status = 500, description = "Internal Server Error", body = String)
    ),
    tag = "API"
)]
#[get("/api/telemetry/chart")]
pub async fn get_chart_data(
    req: web::Query<ChartDataRequest>,
    service: web::Data<TelemetryService>,
) -> Result<impl Responder, GatewayError> {
    let req = req.into_inner();
    match service.chart(&req.device_id, req.column).await {
        Ok(points) => Ok(web::Json(points)),
        Err(e) => {
            error!("fetching chart data for {} failed: {e}", req.device_id);
            Err(e)
        }
    }
}
