use actix_web::{App, HttpServer, web};
use log::info;
use std::sync::Arc;
use std::time::Duration;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use gateway::config::Config;
use gateway::database::create_pool;
use gateway::models::commands::CommandRequest;
use gateway::models::responses::{ChartPoint, DeviceTreeNode, Recommendation};
use gateway::models::telemetry::TelemetryRow;
use gateway::repository::{DeviceRepository, FeatureRepository, TelemetryRepository};
use gateway::routes;
use gateway::services::features::FeatureService;
use gateway::services::ingest::IngestService;
use gateway::services::query::WindowedQueryEngine;
use gateway::services::recommend::RecommendationService;
use gateway::services::relay::CommandRelay;
use gateway::services::telemetry::TelemetryService;
use gateway::ws::WsRegistry;
use gateway::ws::dashboard::dashboard_socket;
use gateway::ws::device::device_socket;

#[derive(OpenApi)]
#[openapi(
    paths(
        routes::devices::get_devices,
        routes::telemetry::get_latest_telemetry,
        routes::telemetry::get_chart_data,
        routes::recommend::get_recommendations,
        routes::command::post_command,
    ),
    components(schemas(
        TelemetryRow,
        ChartPoint,
        DeviceTreeNode,
        Recommendation,
        CommandRequest,
    )),
    tags(
        (name = "API", description = "Battery fleet read and control endpoints")
    ),
    info(
        title = "Battery Telemetry Gateway",
        version = "1.0.0",
        description = "Ingest, live-relay and query service for BMS field devices"
    )
)]
struct ApiDoc;

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    env_logger::init_from_env(env_logger::Env::new().default_filter_or("info"));

    let config = Config::load().expect("Failed to load configuration");
    let server_address = config.server_address();

    let pool = create_pool(&config.database)
        .await
        .expect("Failed to open the telemetry database");

    let telemetry_repo = TelemetryRepository::new(pool.clone());
    let device_repo = DeviceRepository::new(pool.clone());
    let feature_repo = FeatureRepository::new(pool);

    // devices marked live before the last shutdown are not connected now
    let reset = device_repo
        .reset_all_live()
        .await
        .expect("Failed to reconcile the device directory");
    if reset > 0 {
        info!("cleared stale live flags on {reset} devices");
    }

    let features = Arc::new(FeatureService::new(
        telemetry_repo.clone(),
        feature_repo,
    ));
    let query = Arc::new(WindowedQueryEngine::new(
        telemetry_repo.clone(),
        &config.query,
    ));

    let registry = web::Data::new(WsRegistry::new());
    let relay = web::Data::new(CommandRelay::new(Duration::from_secs(
        config.relay.command_timeout_secs,
    )));
    let ingest = web::Data::new(IngestService::new(
        telemetry_repo.clone(),
        device_repo.clone(),
        features,
    ));
    let telemetry_service = web::Data::new(TelemetryService::new(telemetry_repo.clone()));
    let recommendations = web::Data::new(RecommendationService::new(telemetry_repo, query));
    let device_repo = web::Data::new(device_repo);

    info!("listening on {server_address}");

    HttpServer::new(move || {
        App::new()
            .app_data(registry.clone())
            .app_data(relay.clone())
            .app_data(ingest.clone())
            .app_data(telemetry_service.clone())
            .app_data(recommendations.clone())
            .app_data(device_repo.clone())
            .service(routes::devices::get_devices)
            .service(routes::telemetry::get_latest_telemetry)
            .service(routes::telemetry::get_chart_data)
            .service(routes::recommend::get_recommendations)
            .service(routes::command::post_command)
            .route("/ws/device", web::get().to(device_socket))
            .route("/ws/dashboard", web::get().to(dashboard_socket))
            .service(
                SwaggerUi::new("/swagger-ui/{_:.*}")
                    .url("/api-docs/openapi.json", ApiDoc::openapi()),
            )
    })
    .bind(server_address)?
    .run()
    .await
}
