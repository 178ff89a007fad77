use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;

/// Durable mesh-directory entry for one field device.
///
/// A device with `root_id = NULL` is a mesh root; a non-null `root_id`
/// always references a root record (single-level mesh, no root-of-root).
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
pub struct DeviceRecord {
    pub device_id: String,
    pub root_id: Option<String>,
    pub last_updated_time: i64,
    pub live: bool,
}
