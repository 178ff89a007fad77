use serde::{Deserialize, Serialize};
use serde_json::Value;
use utoipa::ToSchema;

fn default_method() -> String {
    "POST".to_string()
}

/// An operator command addressed to one field device, as submitted by a
/// dashboard socket or the `POST /api/command` route.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct CommandRequest {
    pub device_id: String,
    pub endpoint: String,
    #[serde(default = "default_method")]
    pub method: String,
    #[serde(default)]
    #[schema(value_type = Object)]
    pub data: Option<Value>,
}

/// Wire envelope forwarded to the field device over its socket.
#[derive(Debug, Serialize, Deserialize)]
pub struct CommandEnvelope {
    #[serde(rename = "type")]
    pub kind: String,
    /// The addressed device; the root forwards to this mesh member.
    pub node_id: String,
    pub content: CommandContent,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct CommandContent {
    pub endpoint: String,
    pub method: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

impl CommandEnvelope {
    pub fn request(command: &CommandRequest) -> Self {
        Self {
            kind: "request".to_string(),
            node_id: command.device_id.clone(),
            content: CommandContent {
                endpoint: command.endpoint.clone(),
                method: command.method.clone(),
                data: command.data.clone(),
            },
        }
    }
}

/// Device-to-server acknowledgement, correlated back to the pending command
/// via the addressed device id.
#[derive(Debug, Deserialize)]
pub struct CommandAck {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub content: Value,
}
