use serde_json::Value;
use std::collections::HashMap;
use std::time::Duration;
use tokio::sync::{Mutex, oneshot};

use crate::error::GatewayError;

/// Request/response correlation over the inherently asynchronous device
/// transport. One short-lived slot per device id: claimed when a command is
/// forwarded, fulfilled by the receiving connection task or expired by the
/// timeout, then removed — no slot is ever left armed.
///
/// The pending map's lock is held only for map mutation, so relays to
/// different devices never block each other; a second relay to the same
/// device is rejected instead of silently replacing the first's slot.
pub struct CommandRelay {
    pending: Mutex<HashMap<String, oneshot::Sender<Value>>>,
    timeout: Duration,
}

impl CommandRelay {
    pub fn new(timeout: Duration) -> Self {
        Self {
            pending: Mutex::new(HashMap::new()),
            timeout,
        }
    }

    /// Arms the correlation slot for `device_id`. Fails with
    /// `CommandInFlight` when a previous command is still awaiting its
    /// response.
    pub async fn claim(&self, device_id: &str) -> Result<oneshot::Receiver<Value>, GatewayError> {
        let mut pending = self.pending.lock().await;
        if pending.contains_key(device_id) {
            return Err(GatewayError::CommandInFlight(device_id.to_string()));
        }
        let (tx, rx) = oneshot::channel();
        pending.insert(device_id.to_string(), tx);
        Ok(rx)
    }

    /// Disarms a claimed slot without waiting (e.g. the forward itself
    /// failed before any response could arrive).
    pub async fn release(&self, device_id: &str) {
        self.pending.lock().await.remove(device_id);
    }

    /// Blocks until the correlated response arrives, the device disconnects
    /// or the timeout elapses. A late response after a timeout finds no slot
    /// and is dropped by the connection task.
    pub async fn wait(
        &self,
        device_id: &str,
        rx: oneshot::Receiver<Value>,
    ) -> Result<Value, GatewayError> {
        match tokio::time::timeout(self.timeout, rx).await {
            Ok(Ok(response)) => Ok(response),
            // sender dropped: the device disconnected mid-relay — fail fast
            Ok(Err(_)) => Err(GatewayError::NoSuchDevice(device_id.to_string())),
            Err(_) => {
                self.release(device_id).await;
                Err(GatewayError::CommandTimeout(device_id.to_string()))
            }
        }
    }

    /// Wakes the relay blocked on `device_id`, consuming the slot. Returns
    /// false when no command was pending (late or unsolicited response).
    pub async fn fulfill(&self, device_id: &str, response: Value) -> bool {
        let sender = self.pending.lock().await.remove(device_id);
        match sender {
            Some(tx) => tx.send(response).is_ok(),
            None => false,
        }
    }

    /// Drops the slots for the given ids, waking their waiters with a
    /// disconnect error. Called when a field-device connection goes away.
    pub async fn abort(&self, device_ids: &[String]) {
        let mut pending = self.pending.lock().await;
        for id in device_ids {
            pending.remove(id);
        }
    }

    /// Resolves an untagged response: if exactly one of the connection's
    /// member ids has a pending command, that one must be its target.
    pub async fn sole_pending_among(&self, device_ids: &[String]) -> Option<String> {
        let pending = self.pending.lock().await;
        let mut hits = device_ids.iter().filter(|id| pending.contains_key(*id));
        match (hits.next(), hits.next()) {
            (Some(id), None) => Some(id.clone()),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn relay() -> CommandRelay {
        CommandRelay::new(Duration::from_millis(50))
    }

    #[tokio::test]
    async fn fulfilled_command_returns_the_response() {
        let relay = relay();
        let rx = relay.claim("bms_001").await.unwrap();
        assert!(relay.fulfill("bms_001", json!({"status": "ok"})).await);
        let response = relay.wait("bms_001", rx).await.unwrap();
        assert_eq!(response, json!({"status": "ok"}));
    }

    #[tokio::test]
    async fn second_claim_for_same_device_is_rejected() {
        let relay = relay();
        let _rx = relay.claim("bms_001").await.unwrap();
        assert!(matches!(
            relay.claim("bms_001").await,
            Err(GatewayError::CommandInFlight(_))
        ));
    }

    #[tokio::test]
    async fn claims_for_different_devices_are_independent() {
        let relay = relay();
        let _a = relay.claim("bms_001").await.unwrap();
        let _b = relay.claim("bms_002").await.unwrap();
        assert!(relay.fulfill("bms_002", json!("second")).await);
        assert!(relay.fulfill("bms_001", json!("first")).await);
    }

    #[tokio::test]
    async fn timeout_clears_the_slot() {
        let relay = relay();
        let rx = relay.claim("bms_001").await.unwrap();
        assert!(matches!(
            relay.wait("bms_001", rx).await,
            Err(GatewayError::CommandTimeout(_))
        ));
        // the slot is gone: a late response finds nothing to wake...
        assert!(!relay.fulfill("bms_001", json!("late")).await);
        // ...and a new command can be issued
        assert!(relay.claim("bms_001").await.is_ok());
    }

    #[tokio::test]
    async fn disconnect_fails_faster_than_the_timeout() {
        let relay = CommandRelay::new(Duration::from_secs(60));
        let rx = relay.claim("bms_001").await.unwrap();
        relay.abort(&["bms_001".to_string()]).await;
        let start = std::time::Instant::now();
        assert!(matches!(
            relay.wait("bms_001", rx).await,
            Err(GatewayError::NoSuchDevice(_))
        ));
        assert!(start.elapsed() < Duration::from_secs(1));
    }

    #[tokio::test]
    async fn unsolicited_response_is_ignored() {
        let relay = relay();
        assert!(!relay.fulfill("bms_404", json!("hello")).await);
    }

    #[tokio::test]
    async fn untagged_response_resolves_to_the_sole_pending_member() {
        let relay = relay();
        let members = vec!["bms_001".to_string(), "bms_002".to_string()];
        assert_eq!(relay.sole_pending_among(&members).await, None);

        let _rx = relay.claim("bms_002").await.unwrap();
        assert_eq!(
            relay.sole_pending_among(&members).await,
            Some("bms_002".to_string())
        );

        let _rx2 = relay.claim("bms_001").await.unwrap();
        // ambiguous: two members pending
        assert_eq!(relay.sole_pending_among(&members).await, None);
    }
}
