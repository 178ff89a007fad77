use actix_web::{Error, HttpRequest, HttpResponse, rt, web};
use actix_ws::{AggregatedMessage, AggregatedMessageStream, Session};
use log::{debug, error, info, warn};
use serde_json::{Value, json};
use uuid::Uuid;

use crate::models::commands::CommandAck;
use crate::models::telemetry::DeviceReading;
use crate::repository::DeviceRepository;
use crate::services::ingest::IngestService;
use crate::services::relay::CommandRelay;
use crate::ws::{WsRegistry, push_to_watchers};

/// Batches arrive as one JSON array per frame; generous headroom for large
/// meshes.
const MAX_FRAME_BYTES: usize = 1024 * 1024;

/// `GET /ws/device` — upgraded by the mesh root on behalf of its whole mesh.
pub async fn device_socket(
    req: HttpRequest,
    stream: web::Payload,
    registry: web::Data<WsRegistry>,
    ingest: web::Data<IngestService>,
    relay: web::Data<CommandRelay>,
    devices: web::Data<DeviceRepository>,
) -> Result<HttpResponse, Error> {
    let (response, session, msg_stream) = actix_ws::handle(&req, stream)?;
    let msg_stream = msg_stream
        .aggregate_continuations()
        .max_continuation_size(MAX_FRAME_BYTES);

    rt::spawn(run_session(
        session,
        msg_stream,
        registry,
        ingest,
        relay,
        devices,
    ));
    Ok(response)
}

async fn run_session(
    mut session: Session,
    mut stream: AggregatedMessageStream,
    registry: web::Data<WsRegistry>,
    ingest: web::Data<IngestService>,
    relay: web::Data<CommandRelay>,
    devices: web::Data<DeviceRepository>,
) {
    let conn_id = Uuid::new_v4();
    // the member ids most recently announced over this socket
    let mut member_ids: Vec<String> = Vec::new();
    debug!("device socket {conn_id} opened");

    while let Some(Ok(msg)) = stream.recv().await {
        match msg {
            AggregatedMessage::Text(text) => {
                handle_frame(
                    conn_id,
                    &text,
                    &mut session,
                    &mut member_ids,
                    &registry,
                    &ingest,
                    &relay,
                )
                .await;
            }
            AggregatedMessage::Ping(bytes) => {
                if session.pong(&bytes).await.is_err() {
                    break;
                }
            }
            AggregatedMessage::Close(_) => break,
            _ => {}
        }
    }

    // atomic cleanup: directory, live flags, pending commands, watchers
    let offline = registry.unregister_device(conn_id);
    relay.abort(&offline).await;
    let now = chrono::Utc::now().timestamp();
    for device_id in &offline {
        if let Err(e) = devices.set_live(device_id, false, now).await {
            error!("marking {device_id} offline failed: {e}");
        }
        let status = json!({"type": "status", "device_id": device_id, "live": false});
        push_to_watchers(&registry, device_id, &status.to_string()).await;
    }
    if !offline.is_empty() {
        info!("device socket {conn_id} closed, {} devices offline", offline.len());
    }
    let _ = session.close(None).await;
}

async fn handle_frame(
    conn_id: Uuid,
    text: &str,
    session: &mut Session,
    member_ids: &mut Vec<String>,
    registry: &WsRegistry,
    ingest: &IngestService,
    relay: &CommandRelay,
) {
    let value: Value = match serde_json::from_str(text) {
        Ok(value) => value,
        Err(e) => {
            warn!("unparseable frame on device socket {conn_id}: {e}");
            reply(session, "error").await;
            return;
        }
    };

    if value.is_array() {
        let batch: Vec<DeviceReading> = match serde_json::from_value(value) {
            Ok(batch) => batch,
            Err(e) => {
                warn!("malformed batch on device socket {conn_id}: {e}");
                reply(session, "error").await;
                return;
            }
        };
        handle_batch(conn_id, &batch, session, member_ids, registry, ingest).await;
        return;
    }

    // command acknowledgements are the only non-batch traffic
    match serde_json::from_value::<CommandAck>(value) {
        Ok(ack) if ack.kind == "response" => {
            let target = match ack.id {
                Some(id) => Some(id),
                None => relay.sole_pending_among(member_ids).await,
            };
            match target {
                Some(device_id) => {
                    if !relay.fulfill(&device_id, ack.content).await {
                        debug!("late response for {device_id}, dropped");
                    }
                }
                None => warn!("untagged response on socket {conn_id} with no sole pending command"),
            }
        }
        Ok(ack) => warn!("unexpected frame type {:?} on device socket {conn_id}", ack.kind),
        Err(e) => {
            warn!("malformed frame on device socket {conn_id}: {e}");
            reply(session, "error").await;
        }
    }
}

async fn handle_batch(
    conn_id: Uuid,
    batch: &[DeviceReading],
    session: &mut Session,
    member_ids: &mut Vec<String>,
    registry: &WsRegistry,
    ingest: &IngestService,
) {
    let Some(root) = batch.first() else {
        reply(session, "error").await;
        return;
    };

    *member_ids = batch.iter().map(|r| r.id.clone()).collect();
    registry.register_device(conn_id, &root.id, member_ids.clone(), session.clone());

    let accepted = ingest.process_batch(batch).await;
    for (device_id, row) in &accepted {
        // dashboards receive `{<device_id>: <row>}` per accepted reading
        let row = match serde_json::to_value(row) {
            Ok(row) => row,
            Err(e) => {
                error!("serializing update for {device_id} failed: {e}");
                continue;
            }
        };
        let mut update = serde_json::Map::new();
        update.insert(device_id.clone(), row);
        push_to_watchers(registry, device_id, &Value::Object(update).to_string()).await;
    }

    reply(session, "OK").await;
}

async fn reply(session: &mut Session, content: &str) {
    let body = json!({"type": "response", "content": content});
    let _ = session.text(body.to_string()).await;
}
