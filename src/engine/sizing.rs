//! Leaf switch class sizing from demand, rail count and overrides.

use std::collections::{BTreeMap, BTreeSet};

use crate::models::{ClassSizing, Distribution, Plan, Redundancy, SizingRule, Speed, SwitchClass, Tier};

use super::demand::{fits, ClassAllocator, DemandEntry, DemandTable};
use super::error::{DietError, Entity, Result};
use super::zones::ClassPorts;

/// Integer division rounding up. All capacity math rounds up, never down.
pub fn ceil_div(value: u64, divisor: u64) -> u64 {
    if divisor == 0 {
        return 0;
    }
    value.div_ceil(divisor)
}

/// Round up to the next even number, with a floor of 2 (one MCLAG pair)
pub fn round_up_pair(value: u64) -> u64 {
    let value = value.max(2);
    value + value % 2
}

fn rail_count_for(class: &SwitchClass, demand: &DemandTable) -> Result<u32> {
    let counts: BTreeSet<u32> = demand
        .entries_for(&class.name)
        .filter_map(|e| e.rails.map(|r| r.rail_count))
        .collect();
    let mut iter = counts.iter();
    match (iter.next(), iter.next()) {
        (Some(&count), None) => Ok(count),
        (None, _) => Err(DietError::configuration(
            Entity::switch_class(&class.name),
            "rail-aware class has no rail-optimized connection to size from",
        )),
        (Some(_), Some(_)) => Err(DietError::configuration(
            Entity::switch_class(&class.name),
            format!("rail-optimized connections disagree on rail_count: {:?}", counts),
        )),
    }
}

/// Each rail lands on a single instance, so one instance must hold a whole
/// rail group of every rail-optimized connection at that speed.
fn check_rail_groups(class: &SwitchClass, ports: &ClassPorts, demand: &DemandTable) -> Result<()> {
    let mut per_rail: BTreeMap<Speed, u64> = BTreeMap::new();
    for entry in demand.entries_for(&class.name) {
        if let Some(rails) = entry.rails {
            *per_rail.entry(entry.speed).or_insert(0) += rails.group_demand;
        }
    }
    for (speed, needed) in per_rail {
        let capacity = ports.capacity_at(speed);
        if needed > capacity {
            return Err(DietError::capacity(
                Entity::switch_class(&class.name),
                format!(
                    "each rail needs {} logical ports of {} but an instance offers {}",
                    needed, speed, capacity
                ),
            ));
        }
    }
    Ok(())
}

/// Instances needed to hold one same-switch connection, a whole bundle per server
fn bundle_quantity(class: &SwitchClass, ports: &ClassPorts, entry: &DemandEntry) -> Result<u64> {
    let capacity = ports.capacity_at(entry.speed);
    let bundles_per_instance = capacity / entry.ports_per_connection as u64;
    if bundles_per_instance == 0 {
        return Err(DietError::capacity(
            Entity::switch_class(&class.name),
            format!(
                "a {}-port bundle of connection '{}' exceeds the {} {} ports an instance offers",
                entry.ports_per_connection, entry.label, capacity, entry.speed
            ),
        ));
    }
    Ok(ceil_div(entry.servers as u64, bundles_per_instance))
}

/// Smallest instance count that holds every connection of a demand-sized class.
///
/// Starts from the per-speed port ratio and the per-connection bundle bound, then
/// grows until placement succeeds. Rail-optimized connections are left to
/// `check_rail_targets`.
fn demand_quantity(
    class: &SwitchClass,
    ports: &ClassPorts,
    demand: &DemandTable,
    by_speed: &BTreeMap<Speed, u64>,
) -> Result<u64> {
    let entries: Vec<&DemandEntry> = demand
        .entries_for(&class.name)
        .filter(|e| e.rails.is_none())
        .collect();

    let mut needed = by_speed
        .iter()
        .map(|(&speed, &d)| ceil_div(d, ports.capacity_at(speed)))
        .max()
        .unwrap_or(0);
    for entry in entries.iter().filter(|e| e.distribution == Distribution::SameSwitch) {
        needed = needed.max(bundle_quantity(class, ports, entry)?);
    }

    // One instance per port always fits once every bundle fits an instance
    let limit = needed.max(entries.iter().map(|e| e.total).sum());
    while !fits(ports, needed as usize, entries.iter().copied()) {
        if needed >= limit {
            return Err(DietError::capacity(
                Entity::switch_class(&class.name),
                format!("no instance count up to {} can hold every connection", limit),
            ));
        }
        needed += 1;
    }
    Ok(needed)
}

fn size_leaf(class: &SwitchClass, ports: &ClassPorts, demand: &DemandTable) -> Result<ClassSizing> {
    let entity = || Entity::switch_class(&class.name);
    let by_speed = demand.for_switch_class(&class.name);
    let total_demand: u64 = by_speed.values().sum();

    // Every demanded speed needs at least one deliverable port, whatever rule sizes the class.
    for (&speed, &needed) in &by_speed {
        if needed > 0 && ports.capacity_at(speed) == 0 {
            return Err(DietError::capacity(
                entity(),
                format!("{} logical ports of {} demanded but no zone delivers that speed", needed, speed),
            ));
        }
    }

    let mclag = class.redundancy == Redundancy::MclagPair;
    let (quantity, rule) = if let Some(count) = class.manual_quantity_override {
        if mclag && (count < 2 || count % 2 != 0) {
            return Err(DietError::configuration(
                entity(),
                format!("manual_quantity_override {} is not an even count of at least 2 for an MCLAG pair", count),
            ));
        }
        (count as u64, SizingRule::ManualOverride)
    } else if class.rail_aware {
        check_rail_groups(class, ports, demand)?;
        (rail_count_for(class, demand)? as u64, SizingRule::RailCount)
    } else {
        let needed = demand_quantity(class, ports, demand, &by_speed)?;
        let needed = if mclag { round_up_pair(needed) } else { needed };
        (needed, SizingRule::Demand)
    };

    let quantity = u32::try_from(quantity).map_err(|_| {
        DietError::capacity(entity(), format!("{} instances exceed the supported count", quantity))
    })?;

    tracing::debug!(
        switch_class = %class.name,
        quantity,
        rule = ?rule,
        demand = total_demand,
        "Sized leaf class"
    );

    Ok(ClassSizing {
        switch_class: class.name.clone(),
        tier: Tier::Leaf,
        fabric_partition: class.fabric_partition,
        quantity,
        rule,
        demand: total_demand,
        capacity_per_instance: ports.logical.len() as u64,
    })
}

/// Every rail index must land on its own instance of the target class.
fn check_rail_targets(plan: &Plan, demand: &DemandTable, quantities: &BTreeMap<&str, u32>) -> Result<()> {
    for entry in &demand.entries {
        let Some(rails) = entry.rails else { continue };
        let instances = quantities.get(entry.switch_class.as_str()).copied().unwrap_or(0);
        if instances < rails.rail_count {
            let target = plan.switch_class(&entry.switch_class);
            let hint = match target {
                Some(class) if !class.rail_aware => " (mark the class rail_aware or override its quantity)",
                _ => "",
            };
            return Err(DietError::configuration(
                Entity::connection(entry.label.clone()),
                format!(
                    "{} rails need {} instances of '{}' but it resolved to {}{}",
                    rails.rail_count, rails.rail_count, entry.switch_class, instances, hint
                ),
            ));
        }
    }
    Ok(())
}

/// Size every leaf class of the plan, in plan order.
pub fn size_leaf_classes(
    plan: &Plan,
    ports: &BTreeMap<String, ClassPorts>,
    demand: &DemandTable,
) -> Result<Vec<ClassSizing>> {
    let mut sizing = Vec::new();
    for class in plan.switch_classes.iter().filter(|c| c.tier == Tier::Leaf) {
        let class_ports = ports.get(&class.name).ok_or_else(|| {
            DietError::configuration(Entity::switch_class(&class.name), "port zones were not resolved")
        })?;
        sizing.push(size_leaf(class, class_ports, demand)?);
    }

    let quantities: BTreeMap<&str, u32> = sizing
        .iter()
        .map(|s| (s.switch_class.as_str(), s.quantity))
        .collect();
    check_rail_targets(plan, demand, &quantities)?;
    check_allocations(plan, ports, demand, &quantities)?;

    Ok(sizing)
}

/// Replay every connection against the final quantities so an overridden or
/// rail-sized class that cannot hold its allocation fails here, before any
/// record is built.
fn check_allocations(
    plan: &Plan,
    ports: &BTreeMap<String, ClassPorts>,
    demand: &DemandTable,
    quantities: &BTreeMap<&str, u32>,
) -> Result<()> {
    for class in plan.switch_classes.iter().filter(|c| c.tier == Tier::Leaf) {
        let Some(class_ports) = ports.get(&class.name) else { continue };
        let instances = quantities.get(class.name.as_str()).copied().unwrap_or(0) as usize;
        let mut allocator = ClassAllocator::new(class_ports, instances);
        for entry in demand.entries_for(&class.name) {
            allocator.place(entry)?;
        }
    }
    Ok(())
}
