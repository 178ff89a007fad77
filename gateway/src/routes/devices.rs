use actix_web::{Responder, Result, get, web};

use crate::error::GatewayError;
use crate::models::responses::build_device_tree;
use crate::repository::DeviceRepository;

/// Device directory endpoint
#[utoipa::path(
    get,
    path = "/api/devices",
    responses(
        (status = 200, description = "Success", body = Vec<DeviceTreeNode>),
        (status = 500, description = "Internal Server Error", body = String)
    ),
    tag = "API"
)]
#[get("/api/devices")]
pub async fn get_devices(
    devices: web::Data<DeviceRepository>,
) -> Result<impl Responder, GatewayError> {
    let records = devices.all().await?;
    Ok(web::Json(build_device_tree(&records)))
}
