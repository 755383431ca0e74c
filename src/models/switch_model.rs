use serde::{Deserialize, Serialize};

use super::plan::Speed;

/// SwitchModel is the physical template a switch class is built on
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SwitchModel {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vendor: Option<String>,
    pub total_physical_ports: u32,
    pub port_speed_capacity: Speed,
    #[serde(default = "default_port_name_prefix")]
    pub port_name_prefix: String,
}

impl SwitchModel {
    /// Interface name for a physical port, optionally a breakout lane (1-based)
    pub fn port_name(&self, physical: u32, lane: Option<u32>) -> String {
        match lane {
            Some(lane) => format!("{}{}/{}", self.port_name_prefix, physical, lane),
            None => format!("{}{}", self.port_name_prefix, physical),
        }
    }
}

fn default_port_name_prefix() -> String {
    "Ethernet".to_string()
}
