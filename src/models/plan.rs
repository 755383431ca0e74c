use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Fabric partition a switch class belongs to. Frontend and backend planes
/// never share spines.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FabricPartition {
    Frontend,
    Backend,
}

impl FabricPartition {
    pub const ALL: [FabricPartition; 2] = [FabricPartition::Frontend, FabricPartition::Backend];

    pub fn as_str(&self) -> &'static str {
        match self {
            FabricPartition::Frontend => "frontend",
            FabricPartition::Backend => "backend",
        }
    }
}

impl fmt::Display for FabricPartition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Tier {
    Leaf,
    Spine,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Redundancy {
    #[default]
    Single,
    MclagPair,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ServerRole {
    #[serde(rename = "GPU", alias = "gpu")]
    Gpu,
    #[serde(rename = "Storage", alias = "storage")]
    Storage,
    #[default]
    #[serde(rename = "other", alias = "Other")]
    Other,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Bundling {
    Bundled,
    #[default]
    Unbundled,
}

/// How a connection's server ports spread across the target class instances.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Distribution {
    Alternating,
    SameSwitch,
    RailOptimized,
    Sequential,
}

impl Distribution {
    pub fn as_str(&self) -> &'static str {
        match self {
            Distribution::Alternating => "alternating",
            Distribution::SameSwitch => "same-switch",
            Distribution::RailOptimized => "rail-optimized",
            Distribution::Sequential => "sequential",
        }
    }
}

impl fmt::Display for Distribution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Logical-port allocation policy within a zone. Only sequential exists today.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AllocationStrategy {
    #[default]
    Sequential,
}

/// Link speed in Gbps, written as "200G" (or "1T") in plans.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Speed(pub u32);

impl Speed {
    pub fn gbps(&self) -> u32 {
        self.0
    }
}

impl fmt::Display for Speed {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}G", self.0)
    }
}

impl FromStr for Speed {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        let (digits, multiplier) = match trimmed.chars().last() {
            Some('G') | Some('g') => (&trimmed[..trimmed.len() - 1], 1),
            Some('T') | Some('t') => (&trimmed[..trimmed.len() - 1], 1000),
            _ => (trimmed, 1),
        };
        let value: u32 = digits
            .parse()
            .map_err(|_| format!("invalid speed '{}'", s))?;
        if value == 0 {
            return Err(format!("invalid speed '{}': must be positive", s));
        }
        value
            .checked_mul(multiplier)
            .map(Speed)
            .ok_or_else(|| format!("invalid speed '{}': out of range", s))
    }
}

impl TryFrom<String> for Speed {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Speed> for String {
    fn from(speed: Speed) -> Self {
        speed.to_string()
    }
}

/// SwitchClass describes a family of identical switches in the plan
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SwitchClass {
    pub name: String,
    pub fabric_partition: FabricPartition,
    pub tier: Tier,
    #[serde(default)]
    pub redundancy: Redundancy,
    pub switch_model: String,
    #[serde(default)]
    pub uplink_port_count: u32,
    #[serde(default)]
    pub rail_aware: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub manual_quantity_override: Option<u32>,
}

/// PortZone reserves a physical port range on a switch class for one breakout policy
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PortZone {
    pub switch_class: String,
    pub port_spec: String,
    pub breakout_factor: String,
    #[serde(default)]
    pub allocation_strategy: AllocationStrategy,
}

impl PortZone {
    /// Label used to identify the zone in errors, e.g. "fe-leaf[1-63:2]"
    pub fn label(&self) -> String {
        format!("{}[{}]", self.switch_class, self.port_spec)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerClass {
    pub name: String,
    pub instance_count: u32,
    #[serde(default)]
    pub role: ServerRole,
}

/// Connection declares how every server of a class attaches to a switch class
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Connection {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    pub server_class: String,
    pub switch_class: String,
    pub ports_per_connection: u32,
    pub speed: Speed,
    #[serde(default)]
    pub bundling: Bundling,
    pub distribution: Distribution,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rail_count: Option<u32>,
}

impl Connection {
    pub fn label(&self) -> String {
        match &self.name {
            Some(name) if !name.is_empty() => name.clone(),
            _ => format!("{}-to-{}", self.server_class, self.switch_class),
        }
    }
}

/// Plan is the declarative design a topology is generated from
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Plan {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default)]
    pub switch_classes: Vec<SwitchClass>,
    #[serde(default)]
    pub port_zones: Vec<PortZone>,
    #[serde(default)]
    pub server_classes: Vec<ServerClass>,
    #[serde(default)]
    pub connections: Vec<Connection>,
}

impl Plan {
    pub fn switch_class(&self, name: &str) -> Option<&SwitchClass> {
        self.switch_classes.iter().find(|c| c.name == name)
    }

    pub fn server_class(&self, name: &str) -> Option<&ServerClass> {
        self.server_classes.iter().find(|c| c.name == name)
    }

    /// Zones owned by a switch class, in declaration order
    pub fn zones_for<'a>(&'a self, switch_class: &'a str) -> impl Iterator<Item = &'a PortZone> + 'a {
        self.port_zones
            .iter()
            .filter(move |z| z.switch_class == switch_class)
    }
}
