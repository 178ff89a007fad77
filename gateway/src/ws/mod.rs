pub mod dashboard;
pub mod device;
pub mod registry;

use actix_ws::Session;
use serde_json::Value;

use crate::error::GatewayError;
use crate::models::commands::{CommandEnvelope, CommandRequest};
use crate::services::relay::CommandRelay;
use registry::ConnectionRegistry;

/// The registry as wired in production, holding live socket sessions.
pub type WsRegistry = ConnectionRegistry<Session>;

/// Outbound half of a field-device connection, as the relay sees it.
pub trait CommandSink {
    /// Sends one text frame; an error means the socket is gone.
    fn send_text(
        &mut self,
        payload: String,
    ) -> impl std::future::Future<Output = Result<(), ()>> + Send;
}

impl CommandSink for Session {
    async fn send_text(&mut self, payload: String) -> Result<(), ()> {
        self.text(payload).await.map_err(|_| ())
    }
}

/// Forwards a command to the device's live connection and blocks until the
/// correlated response, the device's disconnect or the relay timeout. An
/// unknown device id fails immediately, before any correlation slot is
/// armed.
pub async fn dispatch<H: CommandSink + Clone>(
    registry: &ConnectionRegistry<H>,
    relay: &CommandRelay,
    command: &CommandRequest,
) -> Result<Value, GatewayError> {
    let Some(mut session) = registry.lookup_device(&command.device_id) else {
        return Err(GatewayError::NoSuchDevice(command.device_id.clone()));
    };

    let rx = relay.claim(&command.device_id).await?;

    let envelope = serde_json::to_string(&CommandEnvelope::request(command))
        .map_err(|e| GatewayError::MalformedMessage(e.to_string()))?;
    if session.send_text(envelope).await.is_err() {
        // socket died between lookup and send
        relay.release(&command.device_id).await;
        return Err(GatewayError::NoSuchDevice(command.device_id.clone()));
    }

    relay.wait(&command.device_id, rx).await
}

/// Pushes a payload to every dashboard watching `device_id`, evicting
/// sessions whose socket has gone away.
pub async fn push_to_watchers(registry: &WsRegistry, device_id: &str, payload: &str) {
    for (conn_id, mut session) in registry.dashboards_watching(device_id) {
        if session.text(payload.to_string()).await.is_err() {
            registry.unregister_dashboard(device_id, conn_id);
        }
    }
}
