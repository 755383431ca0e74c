//! Connection demand: how many logical ports each connection needs, and which
//! target instance each server port lands on.

use std::collections::BTreeMap;

use crate::models::{Bundling, Connection, Distribution, Plan, Speed};

use super::error::{DietError, Entity, Result};
use super::zones::ClassPorts;

/// Rail layout of a rail-optimized connection
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RailGroups {
    pub rail_count: u32,
    /// Ports each server contributes to every rail
    pub ports_per_rail: u32,
    /// Logical ports each rail's leaf must terminate
    pub group_demand: u64,
}

/// Demand of one plan connection
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DemandEntry {
    /// Position of the connection in the plan
    pub connection: usize,
    pub label: String,
    pub server_class: String,
    pub switch_class: String,
    pub distribution: Distribution,
    pub bundling: Bundling,
    pub speed: Speed,
    pub servers: u32,
    pub ports_per_connection: u32,
    pub total: u64,
    pub rails: Option<RailGroups>,
}

/// Key of the aggregated demand table
pub type DemandKey = (String, String, Distribution);

/// All connection demand of a plan, in connection order
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DemandTable {
    pub entries: Vec<DemandEntry>,
}

impl DemandTable {
    /// Demand summed per (server class, switch class, distribution)
    pub fn by_key(&self) -> BTreeMap<DemandKey, u64> {
        let mut table = BTreeMap::new();
        for entry in &self.entries {
            let key = (entry.server_class.clone(), entry.switch_class.clone(), entry.distribution);
            *table.entry(key).or_insert(0) += entry.total;
        }
        table
    }

    /// Downlink demand aimed at a switch class, per speed
    pub fn for_switch_class(&self, switch_class: &str) -> BTreeMap<Speed, u64> {
        let mut demand = BTreeMap::new();
        for entry in self.entries.iter().filter(|e| e.switch_class == switch_class) {
            *demand.entry(entry.speed).or_insert(0) += entry.total;
        }
        demand
    }

    pub fn entries_for<'a>(&'a self, switch_class: &'a str) -> impl Iterator<Item = &'a DemandEntry> + 'a {
        self.entries.iter().filter(move |e| e.switch_class == switch_class)
    }

    /// Server-to-switch port demand across the whole plan
    pub fn total(&self) -> u64 {
        self.entries.iter().map(|e| e.total).sum()
    }
}

fn entry_for(index: usize, conn: &Connection, plan: &Plan) -> Result<DemandEntry> {
    let label = conn.label();
    let entity = || Entity::connection(label.clone());

    let server = plan.server_class(&conn.server_class).ok_or_else(|| {
        DietError::configuration(entity(), format!("unknown server class '{}'", conn.server_class))
    })?;
    if conn.ports_per_connection == 0 {
        return Err(DietError::configuration(entity(), "ports_per_connection must be at least 1"));
    }

    let total = server.instance_count as u64 * conn.ports_per_connection as u64;

    let rails = match (conn.distribution, conn.rail_count) {
        (Distribution::RailOptimized, None) => {
            return Err(DietError::configuration(
                entity(),
                "rail-optimized distribution requires rail_count",
            ));
        }
        (Distribution::RailOptimized, Some(0)) => {
            return Err(DietError::configuration(entity(), "rail_count must be at least 1"));
        }
        (Distribution::RailOptimized, Some(rail_count)) => {
            if server.instance_count % rail_count != 0 {
                return Err(DietError::configuration(
                    entity(),
                    format!(
                        "{} servers of class '{}' do not divide evenly into {} rails",
                        server.instance_count, server.name, rail_count
                    ),
                ));
            }
            if conn.ports_per_connection % rail_count != 0 {
                return Err(DietError::configuration(
                    entity(),
                    format!(
                        "{} ports per server do not divide evenly into {} rails",
                        conn.ports_per_connection, rail_count
                    ),
                ));
            }
            Some(RailGroups {
                rail_count,
                ports_per_rail: conn.ports_per_connection / rail_count,
                group_demand: total / rail_count as u64,
            })
        }
        (_, Some(_)) => {
            return Err(DietError::configuration(
                entity(),
                format!("rail_count is only valid for rail-optimized, not {}", conn.distribution),
            ));
        }
        (_, None) => None,
    };

    Ok(DemandEntry {
        connection: index,
        label,
        server_class: conn.server_class.clone(),
        switch_class: conn.switch_class.clone(),
        distribution: conn.distribution,
        bundling: conn.bundling,
        speed: conn.speed,
        servers: server.instance_count,
        ports_per_connection: conn.ports_per_connection,
        total,
        rails,
    })
}

/// Build the demand table for every connection in the plan.
pub fn compute_demand(plan: &Plan) -> Result<DemandTable> {
    let entries = plan
        .connections
        .iter()
        .enumerate()
        .map(|(index, conn)| entry_for(index, conn, plan))
        .collect::<Result<Vec<_>>>()?;

    let table = DemandTable { entries };
    tracing::debug!(
        connections = table.entries.len(),
        total_demand = table.total(),
        "Computed connection demand"
    );
    Ok(table)
}

/// Decide the target instance of every server port of a connection.
///
/// `free` holds the remaining logical ports at the connection's speed on each
/// target instance and is decremented as ports are claimed. `cursor` is the
/// round-robin position of alternating connections at this speed; it carries
/// over from one connection to the next on the same target class. Returns, per
/// server, the target instance index of each of its ports.
pub fn place(entry: &DemandEntry, free: &mut [u64], cursor: &mut usize) -> Result<Vec<Vec<usize>>> {
    let instances = free.len();
    let servers = entry.servers as usize;
    let ports = entry.ports_per_connection as usize;
    let target = || Entity::switch_class(&entry.switch_class);

    if entry.total > 0 && instances == 0 {
        return Err(DietError::capacity(
            target(),
            format!("no instances available for connection '{}'", entry.label),
        ));
    }

    let exhausted = |instance: usize| {
        DietError::capacity(
            target(),
            format!(
                "instance {} has no free {} ports left for connection '{}'",
                instance + 1,
                entry.speed,
                entry.label
            ),
        )
    };

    let mut placement = Vec::with_capacity(servers);
    match entry.distribution {
        Distribution::Alternating => {
            for _ in 0..servers {
                let mut targets = Vec::with_capacity(ports);
                for _ in 0..ports {
                    // Next instance in round-robin order that still has a port
                    let instance = (0..instances)
                        .map(|step| (*cursor + step) % instances)
                        .find(|&i| free[i] > 0)
                        .ok_or_else(|| {
                            DietError::capacity(
                                target(),
                                format!(
                                    "all {} instances are out of {} ports for connection '{}'",
                                    instances, entry.speed, entry.label
                                ),
                            )
                        })?;
                    free[instance] -= 1;
                    targets.push(instance);
                    *cursor = (instance + 1) % instances;
                }
                placement.push(targets);
            }
        }
        Distribution::SameSwitch => {
            let mut cursor = 0;
            for _ in 0..servers {
                while cursor < instances && free[cursor] < ports as u64 {
                    cursor += 1;
                }
                if cursor == instances {
                    return Err(DietError::capacity(
                        target(),
                        format!(
                            "no instance can hold another {}-port bundle for connection '{}'",
                            ports, entry.label
                        ),
                    ));
                }
                free[cursor] -= ports as u64;
                placement.push(vec![cursor; ports]);
            }
        }
        Distribution::RailOptimized => {
            let rails = entry.rails.ok_or_else(|| {
                DietError::configuration(
                    Entity::connection(entry.label.clone()),
                    "rail-optimized distribution requires rail_count",
                )
            })?;
            if instances < rails.rail_count as usize {
                return Err(DietError::configuration(
                    Entity::connection(entry.label.clone()),
                    format!(
                        "{} rails need {} leaf instances but '{}' has {}",
                        rails.rail_count, rails.rail_count, entry.switch_class, instances
                    ),
                ));
            }
            let per_rail = rails.ports_per_rail as usize;
            for _ in 0..servers {
                let mut targets = Vec::with_capacity(ports);
                for port in 0..ports {
                    let rail = port / per_rail;
                    if free[rail] == 0 {
                        return Err(exhausted(rail));
                    }
                    free[rail] -= 1;
                    targets.push(rail);
                }
                placement.push(targets);
            }
        }
        Distribution::Sequential => {
            let mut cursor = 0;
            for _ in 0..servers {
                let mut targets = Vec::with_capacity(ports);
                for _ in 0..ports {
                    while cursor < instances && free[cursor] == 0 {
                        cursor += 1;
                    }
                    if cursor == instances {
                        return Err(exhausted(instances - 1));
                    }
                    free[cursor] -= 1;
                    targets.push(cursor);
                }
                placement.push(targets);
            }
        }
    }
    Ok(placement)
}

/// Running allocation state of one target class across all of its connections
pub struct ClassAllocator {
    /// Free logical ports per speed, one counter per instance
    free: BTreeMap<Speed, Vec<u64>>,
    /// Alternating round-robin position per speed
    cursors: BTreeMap<Speed, usize>,
    instances: usize,
}

impl ClassAllocator {
    pub fn new(ports: &ClassPorts, instances: usize) -> Self {
        let free = ports
            .capacity_by_speed()
            .into_iter()
            .map(|(speed, capacity)| (speed, vec![capacity; instances]))
            .collect();
        Self {
            free,
            cursors: BTreeMap::new(),
            instances,
        }
    }

    /// Place one connection, claiming its ports from the shared state.
    pub fn place(&mut self, entry: &DemandEntry) -> Result<Vec<Vec<usize>>> {
        let free = self
            .free
            .entry(entry.speed)
            .or_insert_with(|| vec![0; self.instances]);
        let cursor = self.cursors.entry(entry.speed).or_insert(0);
        place(entry, free, cursor)
    }
}

/// Whether `instances` copies of a class can hold every given connection,
/// placed in order exactly as materialization will place them.
pub fn fits<'a>(ports: &ClassPorts, instances: usize, entries: impl IntoIterator<Item = &'a DemandEntry>) -> bool {
    let mut allocator = ClassAllocator::new(ports, instances);
    entries.into_iter().all(|entry| allocator.place(entry).is_ok())
}
