use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::plan::{Bundling, FabricPartition, ServerRole, Speed, Tier};

/// Index of a device within a GeneratedTopology
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DeviceId(pub usize);

/// Index of an interface within a GeneratedTopology
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct InterfaceId(pub usize);

/// Index of a cable within a GeneratedTopology
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CableId(pub usize);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeviceKind {
    Leaf,
    Spine,
    Server,
}

impl From<Tier> for DeviceKind {
    fn from(tier: Tier) -> Self {
        match tier {
            Tier::Leaf => DeviceKind::Leaf,
            Tier::Spine => DeviceKind::Spine,
        }
    }
}

/// Device is one switch or server instance
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Device {
    pub id: DeviceId,
    pub name: String,
    pub kind: DeviceKind,
    /// Switch or server class that produced this device
    pub class_name: String,
    /// 1-based position within its class
    pub index: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fabric_partition: Option<FabricPartition>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub switch_model: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub server_role: Option<ServerRole>,
    pub interfaces: Vec<InterfaceId>,
}

impl Device {
    pub fn is_switch(&self) -> bool {
        self.kind != DeviceKind::Server
    }
}

/// What produced an interface or cable
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum LinkSource {
    /// A server-to-leaf link from a plan connection
    Connection {
        connection: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        rail: Option<u32>,
    },
    /// A leaf-to-spine uplink
    Fabric { partition: FabricPartition },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Interface {
    pub id: InterfaceId,
    pub device: DeviceId,
    pub name: String,
    pub speed: Speed,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bundling: Option<Bundling>,
    /// Bundle (LAG) label for bundled server links, e.g. "bond0"
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bundle: Option<String>,
    /// Backing physical port on switches (1-based)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub physical_port: Option<u32>,
    /// Breakout lane on the physical port (1-based)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lane: Option<u32>,
    pub source: LinkSource,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cable: Option<CableId>,
}

/// Cable connects exactly two interfaces on two distinct devices
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Cable {
    pub id: CableId,
    pub a: InterfaceId,
    pub b: InterfaceId,
    pub speed: Speed,
    pub source: LinkSource,
}

/// Rule that decided a class's instance count
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SizingRule {
    ManualOverride,
    RailCount,
    Demand,
    SpineUplinkDemand,
}

/// ClassSizing reports how a switch class was sized
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassSizing {
    pub switch_class: String,
    pub tier: Tier,
    pub fabric_partition: FabricPartition,
    pub quantity: u32,
    pub rule: SizingRule,
    /// Logical ports (leaves) or uplinks (spines) the class must terminate
    pub demand: u64,
    /// Ports a single instance offers toward that demand
    pub capacity_per_instance: u64,
}

/// FabricSummary reports leaf-to-spine sizing for one partition
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FabricSummary {
    pub partition: FabricPartition,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub spine_class: Option<String>,
    pub uplink_demand: u64,
    pub spine_count: u32,
    pub cable_count: u64,
}

/// GeneratedTopology is the full, recomputed output for one plan
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeneratedTopology {
    pub plan: String,
    pub devices: Vec<Device>,
    pub interfaces: Vec<Interface>,
    pub cables: Vec<Cable>,
    pub sizing: Vec<ClassSizing>,
    pub fabrics: Vec<FabricSummary>,
}

impl GeneratedTopology {
    pub fn device(&self, id: DeviceId) -> &Device {
        &self.devices[id.0]
    }

    pub fn interface(&self, id: InterfaceId) -> &Interface {
        &self.interfaces[id.0]
    }

    pub fn devices_of_class<'a>(&'a self, class_name: &'a str) -> impl Iterator<Item = &'a Device> + 'a {
        self.devices.iter().filter(move |d| d.class_name == class_name)
    }

    pub fn sizing_for(&self, switch_class: &str) -> Option<&ClassSizing> {
        self.sizing.iter().find(|s| s.switch_class == switch_class)
    }

    pub fn unconnected_interfaces(&self) -> usize {
        self.interfaces.iter().filter(|i| i.cable.is_none()).count()
    }

    pub fn summary(&self) -> PreviewSummary {
        let switch_count = self.devices.iter().filter(|d| d.is_switch()).count();
        let fabric_cable_count = self
            .cables
            .iter()
            .filter(|c| matches!(c.source, LinkSource::Fabric { .. }))
            .count();
        PreviewSummary {
            device_count: self.devices.len(),
            server_count: self.devices.len() - switch_count,
            switch_count,
            interface_count: self.interfaces.len(),
            cable_count: self.cables.len(),
            server_cable_count: self.cables.len() - fabric_cable_count,
            fabric_cable_count,
            unconnected_interface_count: self.unconnected_interfaces(),
        }
    }
}

/// PreviewSummary is the pre-commit count overview of a generation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PreviewSummary {
    pub device_count: usize,
    pub server_count: usize,
    pub switch_count: usize,
    pub interface_count: usize,
    pub cable_count: usize,
    pub server_cable_count: usize,
    pub fabric_cable_count: usize,
    pub unconnected_interface_count: usize,
}

/// PreviewResponse returned by the preview endpoint
#[derive(Debug, Clone, Serialize)]
pub struct PreviewResponse {
    pub plan: String,
    #[serde(flatten)]
    pub summary: PreviewSummary,
    pub sizing: Vec<ClassSizing>,
    pub fabrics: Vec<FabricSummary>,
}

impl From<&GeneratedTopology> for PreviewResponse {
    fn from(topology: &GeneratedTopology) -> Self {
        Self {
            plan: topology.plan.clone(),
            summary: topology.summary(),
            sizing: topology.sizing.clone(),
            fabrics: topology.fabrics.clone(),
        }
    }
}

/// CommitPayload is the full record set handed to the persistence layer
#[derive(Debug, Clone, Serialize)]
pub struct CommitPayload {
    pub generation_id: Uuid,
    pub plan: String,
    pub generated_at: DateTime<Utc>,
    pub summary: PreviewSummary,
    pub topology: GeneratedTopology,
}

impl CommitPayload {
    pub fn new(topology: GeneratedTopology) -> Self {
        Self {
            generation_id: Uuid::new_v4(),
            plan: topology.plan.clone(),
            generated_at: Utc::now(),
            summary: topology.summary(),
            topology,
        }
    }
}

/// ValidationResponse returned by the validate endpoint
#[derive(Debug, Clone, Serialize)]
pub struct ValidationResponse {
    pub valid: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}
