//! Port zone resolution: port specs and breakouts expanded into the ordered
//! logical ports a single switch instance offers.

use std::collections::{BTreeMap, BTreeSet};

use regex_lite::Regex;

use crate::models::{PortZone, Speed, SwitchClass, SwitchModel};

use super::error::{DietError, Entity, Result};

/// Parsed `start-end:step` physical port range (1-based, inclusive)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PortSpec {
    pub start: u32,
    pub end: u32,
    pub step: u32,
}

impl PortSpec {
    /// Parse "1-63:2", "1-32" or "5"
    pub fn parse(spec: &str) -> std::result::Result<Self, String> {
        if spec.trim().is_empty() {
            return Err("port_spec is empty".to_string());
        }
        let re = Regex::new(r"^\s*(\d+)\s*(?:-\s*(\d+))?\s*(?::\s*(\d+))?\s*$")
            .map_err(|e| e.to_string())?;
        let caps = re
            .captures(spec)
            .ok_or_else(|| format!("invalid port_spec '{}', expected start-end:step", spec))?;
        let number = |i: usize| -> std::result::Result<Option<u32>, String> {
            caps.get(i)
                .map(|m| {
                    m.as_str()
                        .parse::<u32>()
                        .map_err(|_| format!("port_spec '{}' has an out-of-range number", spec))
                })
                .transpose()
        };
        let start = number(1)?.unwrap_or(0);
        let end = number(2)?.unwrap_or(start);
        let step = number(3)?.unwrap_or(1);

        if start == 0 {
            return Err(format!("port_spec '{}' must start at port 1 or above", spec));
        }
        if step == 0 {
            return Err(format!("port_spec '{}' has a zero step", spec));
        }
        if start > end {
            return Err(format!("port_spec '{}' is empty: start is after end", spec));
        }
        Ok(Self { start, end, step })
    }

    /// Physical port indices in ascending order
    pub fn ports(&self) -> impl Iterator<Item = u32> {
        (self.start..=self.end).step_by(self.step as usize)
    }

    pub fn contains(&self, index: u32) -> bool {
        index >= self.start && index <= self.end && (index - self.start) % self.step == 0
    }
}

/// Parsed `N×speed` breakout factor
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Breakout {
    pub count: u32,
    pub speed: Speed,
}

impl Breakout {
    /// Parse "4x200G" or "4×200G"
    pub fn parse(factor: &str) -> std::result::Result<Self, String> {
        let re = Regex::new(r"^\s*(\d+)\s*[xX×*]\s*(\d+\s*[GgTt]?)\s*$").map_err(|e| e.to_string())?;
        let caps = re
            .captures(factor)
            .ok_or_else(|| format!("invalid breakout_factor '{}', expected NxSPEED", factor))?;
        let count: u32 = caps[1]
            .parse()
            .map_err(|_| format!("breakout_factor '{}' has an out-of-range count", factor))?;
        if count == 0 {
            return Err(format!("breakout_factor '{}' yields zero logical ports", factor));
        }
        let speed: Speed = caps[2].replace(' ', "").parse()?;
        Ok(Self { count, speed })
    }
}

/// One logical port on a switch instance
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LogicalPort {
    pub physical: u32,
    /// Breakout lane, 1-based; `None` when the port is not broken out
    pub lane: Option<u32>,
    pub speed: Speed,
    /// Index of the producing zone in the plan
    pub zone: usize,
}

/// Resolved port layout shared by every instance of a switch class.
/// Each instance takes its own copy when ports are allocated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClassPorts {
    pub switch_class: String,
    pub logical: Vec<LogicalPort>,
    /// Physical ports outside every zone, ascending
    pub free_physical: Vec<u32>,
}

impl ClassPorts {
    pub fn capacity_at(&self, speed: Speed) -> u64 {
        self.logical.iter().filter(|p| p.speed == speed).count() as u64
    }

    pub fn capacity_by_speed(&self) -> BTreeMap<Speed, u64> {
        let mut capacity = BTreeMap::new();
        for port in &self.logical {
            *capacity.entry(port.speed).or_insert(0) += 1;
        }
        capacity
    }
}

/// Expand a single zone into its logical ports, in physical then lane order.
pub fn resolve_zone(zone: &PortZone, zone_index: usize, model: &SwitchModel) -> Result<Vec<LogicalPort>> {
    let entity = || Entity::port_zone(zone.label());
    let spec = PortSpec::parse(&zone.port_spec).map_err(|e| DietError::configuration(entity(), e))?;
    let breakout =
        Breakout::parse(&zone.breakout_factor).map_err(|e| DietError::configuration(entity(), e))?;

    if spec.end > model.total_physical_ports {
        return Err(DietError::configuration(
            entity(),
            format!(
                "port {} exceeds the {} physical ports of model {}",
                spec.end, model.total_physical_ports, model.name
            ),
        ));
    }
    let lane_total = breakout.count as u64 * breakout.speed.gbps() as u64;
    if lane_total > model.port_speed_capacity.gbps() as u64 {
        return Err(DietError::configuration(
            entity(),
            format!(
                "breakout {} needs {}G per port but model {} ports carry {}",
                zone.breakout_factor, lane_total, model.name, model.port_speed_capacity
            ),
        ));
    }

    let mut ports = Vec::new();
    for physical in spec.ports() {
        if breakout.count == 1 {
            ports.push(LogicalPort {
                physical,
                lane: None,
                speed: breakout.speed,
                zone: zone_index,
            });
        } else {
            for lane in 1..=breakout.count {
                ports.push(LogicalPort {
                    physical,
                    lane: Some(lane),
                    speed: breakout.speed,
                    zone: zone_index,
                });
            }
        }
    }
    Ok(ports)
}

/// Resolve every zone of a class and check that no two zones share a physical port.
pub fn resolve_class_ports(
    class: &SwitchClass,
    zones: &[(usize, &PortZone)],
    model: &SwitchModel,
) -> Result<ClassPorts> {
    let mut logical = Vec::new();
    let mut claimed: BTreeMap<u32, &PortZone> = BTreeMap::new();

    for &(zone_index, zone) in zones {
        let ports = resolve_zone(zone, zone_index, model)?;
        let physical: BTreeSet<u32> = ports.iter().map(|p| p.physical).collect();
        for index in physical {
            if let Some(other) = claimed.insert(index, zone) {
                return Err(DietError::configuration(
                    Entity::port_zone(zone.label()),
                    format!("overlaps zone {} at physical port {}", other.label(), index),
                ));
            }
        }
        logical.extend(ports);
    }

    let free_physical = (1..=model.total_physical_ports)
        .filter(|p| !claimed.contains_key(p))
        .collect();

    tracing::debug!(
        switch_class = %class.name,
        logical_ports = logical.len(),
        "Resolved port zones"
    );

    Ok(ClassPorts {
        switch_class: class.name.clone(),
        logical,
        free_physical,
    })
}
