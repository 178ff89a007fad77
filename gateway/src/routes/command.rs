use actix_web::{Responder, Result, post, web};
use log::{error, info};

use crate::error::GatewayError;
use crate::models::commands::CommandRequest;
use crate::services::relay::CommandRelay;
use crate::ws::{WsRegistry, dispatch};

/// Command relay endpoint
#[utoipa::path(
    post,
    path = "/api/command",
    request_body = CommandRequest,
    responses(
        (status = 200, description = "Device response", body = Object),
        (status = 404, description = "Device not connected", body = String),
        (status = 409, description = "A command is already in flight", body = String),
        (status = 504, description = "Device did not respond in time", body = String)
    ),
    tag = "API"
)]
#[post("/api/command")]
pub async fn post_command(
    req: web::Json<CommandRequest>,
    registry: web::Data<WsRegistry>,
    relay: web::Data<CommandRelay>,
) -> Result<impl Responder, GatewayError> {
    let command = req.into_inner();
    info!("relaying {} {} to {}", command.method, command.endpoint, command.device_id);
    match dispatch(&registry, &relay, &command).await {
        Ok(response) => Ok(web::Json(response)),
        Err(e) => {
            error!("command relay to {} failed: {e}", command.device_id);
            Err(e)
        }
    }
}
