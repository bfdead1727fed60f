// instance.rs
// Purpose: Static identity of the host instance attached to every outbound record

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Resource type used when records are pinned to a virtual machine instance.
pub const INSTANCE_RESOURCE_TYPE: &str = "gce_instance";

/// Identity of the running instance. Only exists when at least one part is set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstanceMetadata {
    pub id: String,
    pub name: String,
    pub zone: String,
}

impl InstanceMetadata {
    /// Build metadata from its three identifiers. All three empty means no
    /// metadata at all; otherwise every identifier is kept, empty ones included.
    pub fn from_parts(
        id: impl Into<String>,
        name: impl Into<String>,
        zone: impl Into<String>,
    ) -> Option<Self> {
        let metadata = Self {
            id: id.into(),
            name: name.into(),
            zone: zone.into(),
        };

        if metadata.id.is_empty() && metadata.name.is_empty() && metadata.zone.is_empty() {
            None
        } else {
            Some(metadata)
        }
    }

    /// Resource descriptor that targets this instance by id and zone.
    pub fn resource(&self) -> MonitoredResource {
        let mut labels = BTreeMap::new();
        labels.insert("instance_id".to_string(), self.id.clone());
        labels.insert("zone".to_string(), self.zone.clone());

        MonitoredResource {
            kind: INSTANCE_RESOURCE_TYPE.to_string(),
            labels,
        }
    }
}

/// Default resource a log sink attributes its records to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MonitoredResource {
    #[serde(rename = "type")]
    pub kind: String,
    pub labels: BTreeMap<String, String>,
}
