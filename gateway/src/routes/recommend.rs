use actix_web::{Responder, Result, get, web};
use log::error;

use crate::error::GatewayError;
use crate::models::requests::RecommendationRequest;
use crate::services::recommend::RecommendationService;

/// Recommendation endpoint
#[utoipa::path(
    get,
    path = "/api/recommendations",
    params(
        ("device_id" = String, Query, description = "Device to analyse", example = "bms_001"),
    ),
    responses(
        (status = 200, description = "Success", body = Vec<Recommendation>),
        (status = 500, description = "Internal Server Error", body = String)
    ),
    tag = "API"
)]
#[get("/api/recommendations")]
pub async fn get_recommendations(
    req: web::Query<RecommendationRequest>,
    service: web::Data<RecommendationService>,
) -> Result<impl Responder, GatewayError> {
    let req = req.into_inner();
    match service.recommendations(&req.device_id).await {
        Ok(recommendations) => Ok(web::Json(recommendations)),
        Err(e) => {
            error!("computing recommendations for {} failed: {e}", req.device_id);
            Err(e)
        }
    }
}
