use serde::Serialize;
use std::collections::HashMap;
use utoipa::ToSchema;

use crate::models::devices::DeviceRecord;

/// One mesh root with its directly attached node devices, as served to the
/// dashboard device list.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct DeviceTreeNode {
    pub device_id: String,
    pub root_id: Option<String>,
    pub last_updated_time: i64,
    pub live: bool,
    pub nodes: Vec<DeviceTreeNode>,
}

impl DeviceTreeNode {
    fn leaf(record: &DeviceRecord) -> Self {
        Self {
            device_id: record.device_id.clone(),
            root_id: record.root_id.clone(),
            last_updated_time: record.last_updated_time,
            live: record.live,
            nodes: Vec::new(),
        }
    }
}

/// Nests node devices under their roots and returns only the roots.
/// Nodes whose root record is missing are dropped; every non-null `root_id`
/// is expected to reference a stored root.
pub fn build_device_tree(records: &[DeviceRecord]) -> Vec<DeviceTreeNode> {
    let mut children: HashMap<&str, Vec<DeviceTreeNode>> = HashMap::new();

    for record in records {
        if let Some(root_id) = &record.root_id {
            children
                .entry(root_id.as_str())
                .or_default()
                .push(DeviceTreeNode::leaf(record));
        }
    }

    records
        .iter()
        .filter(|record| record.root_id.is_none())
        .map(|record| {
            let mut node = DeviceTreeNode::leaf(record);
            node.nodes = children.remove(record.device_id.as_str()).unwrap_or_default();
            node
        })
        .collect()
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct ChartPoint {
    pub timestamp: i64,
    pub value: f64,
}

/// A BMS optimisation recommendation derived from recent telemetry.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct Recommendation {
    #[serde(rename = "type")]
    pub kind: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub min: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max: Option<f64>,
}
