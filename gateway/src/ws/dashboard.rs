use actix_web::{Error, HttpRequest, HttpResponse, rt, web};
use actix_ws::{Message, MessageStream, Session};
use log::{debug, warn};
use serde_json::json;
use uuid::Uuid;

use crate::models::commands::CommandRequest;
use crate::models::requests::DashboardQuery;
use crate::services::relay::CommandRelay;
use crate::ws::{WsRegistry, dispatch};

/// `GET /ws/dashboard?device_id=…` — a browser session subscribing to one
/// device's live updates. Commands typed into the dashboard are relayed
/// inline and answered on the same socket.
pub async fn dashboard_socket(
    req: HttpRequest,
    stream: web::Payload,
    query: web::Query<DashboardQuery>,
    registry: web::Data<WsRegistry>,
    relay: web::Data<CommandRelay>,
) -> Result<HttpResponse, Error> {
    let (response, session, msg_stream) = actix_ws::handle(&req, stream)?;
    rt::spawn(run_session(
        session,
        msg_stream,
        query.into_inner().device_id,
        registry,
        relay,
    ));
    Ok(response)
}

async fn run_session(
    mut session: Session,
    mut stream: MessageStream,
    device_id: String,
    registry: web::Data<WsRegistry>,
    relay: web::Data<CommandRelay>,
) {
    let conn_id = Uuid::new_v4();
    registry.register_dashboard(&device_id, conn_id, session.clone());
    debug!("dashboard {conn_id} watching {device_id}");

    while let Some(Ok(msg)) = stream.recv().await {
        match msg {
            Message::Text(text) => {
                let reply = match serde_json::from_str::<CommandRequest>(&text) {
                    Ok(command) => match dispatch(&registry, &relay, &command).await {
                        Ok(response) => json!({"type": "result", "content": response}),
                        Err(e) => json!({"type": "error", "error": e.to_string()}),
                    },
                    Err(e) => {
                        warn!("malformed command from dashboard {conn_id}: {e}");
                        json!({"type": "error", "error": "malformed command"})
                    }
                };
                if session.text(reply.to_string()).await.is_err() {
                    break;
                }
            }
            Message::Ping(bytes) => {
                if session.pong(&bytes).await.is_err() {
                    break;
                }
            }
            Message::Close(_) => break,
            _ => {}
        }
    }

    registry.unregister_dashboard(&device_id, conn_id);
    debug!("dashboard {conn_id} left {device_id}");
    let _ = session.close(None).await;
}
