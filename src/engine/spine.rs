//! Spine sizing per fabric partition from aggregate leaf uplink demand.

use std::collections::BTreeMap;

use crate::models::{
    ClassSizing, FabricPartition, Plan, Redundancy, SizingRule, SwitchClass, SwitchModel, Tier,
};

use super::error::{DietError, Entity, Result};
use super::sizing::ceil_div;
use super::zones::ClassPorts;

/// Resolved leaf-to-spine plan of one fabric partition
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FabricPlan {
    pub partition: FabricPartition,
    pub spine_class: Option<String>,
    pub uplink_demand: u64,
    pub spine_count: u32,
    /// Physical ports each spine instance offers to leaf uplinks
    pub spine_ports: u32,
}

impl FabricPlan {
    /// Leaf-to-spine cables; zero when no spine class terminates the uplinks
    pub fn cable_count(&self) -> u64 {
        if self.spine_class.is_some() {
            self.uplink_demand
        } else {
            0
        }
    }
}

fn spine_class_for(plan: &Plan, partition: FabricPartition) -> Result<Option<&SwitchClass>> {
    let mut spines = plan
        .switch_classes
        .iter()
        .filter(|c| c.tier == Tier::Spine && c.fabric_partition == partition);
    let Some(first) = spines.next() else {
        return Ok(None);
    };
    if let Some(extra) = spines.next() {
        return Err(DietError::configuration(
            Entity::switch_class(&extra.name),
            format!("{} partition already has spine class '{}'", partition, first.name),
        ));
    }
    Ok(Some(first))
}

fn partition_uplink_demand(
    plan: &Plan,
    partition: FabricPartition,
    ports: &BTreeMap<String, ClassPorts>,
    leaves: &[ClassSizing],
) -> Result<u64> {
    let mut demand = 0u64;
    for sizing in leaves.iter().filter(|s| s.fabric_partition == partition) {
        let Some(class) = plan.switch_class(&sizing.switch_class) else { continue };
        if class.uplink_port_count == 0 {
            continue;
        }
        let free = ports.get(&class.name).map(|p| p.free_physical.len()).unwrap_or(0);
        if (free as u64) < class.uplink_port_count as u64 {
            return Err(DietError::configuration(
                Entity::switch_class(&class.name),
                format!(
                    "{} uplinks requested but only {} physical ports lie outside its port zones",
                    class.uplink_port_count, free
                ),
            ));
        }
        demand += sizing.quantity as u64 * class.uplink_port_count as u64;
    }
    Ok(demand)
}

/// Size the spine class of every partition independently.
///
/// Returns the per-partition fabric plans and the sizing report of each spine class.
pub fn size_spines(
    plan: &Plan,
    models: &BTreeMap<String, &SwitchModel>,
    ports: &BTreeMap<String, ClassPorts>,
    leaves: &[ClassSizing],
) -> Result<(Vec<FabricPlan>, Vec<ClassSizing>)> {
    let mut fabrics = Vec::new();
    let mut sizing = Vec::new();

    for partition in FabricPartition::ALL {
        let uplink_demand = partition_uplink_demand(plan, partition, ports, leaves)?;
        let Some(spine) = spine_class_for(plan, partition)? else {
            if uplink_demand > 0 {
                tracing::warn!(
                    partition = %partition,
                    uplink_demand,
                    "No spine class in partition; leaf uplinks stay unconnected"
                );
            }
            fabrics.push(FabricPlan {
                partition,
                spine_class: None,
                uplink_demand,
                spine_count: 0,
                spine_ports: 0,
            });
            continue;
        };

        let entity = || Entity::switch_class(&spine.name);
        if spine.redundancy == Redundancy::MclagPair {
            return Err(DietError::configuration(entity(), "spine classes cannot be MCLAG pairs"));
        }
        let model = models.get(&spine.switch_model).ok_or_else(|| {
            DietError::configuration(entity(), format!("unknown switch model '{}'", spine.switch_model))
        })?;
        let spine_ports = model.total_physical_ports;

        let (count, rule) = match spine.manual_quantity_override {
            Some(count) => (count as u64, SizingRule::ManualOverride),
            None => (ceil_div(uplink_demand, spine_ports as u64), SizingRule::SpineUplinkDemand),
        };
        if count * (spine_ports as u64) < uplink_demand {
            return Err(DietError::capacity(
                entity(),
                format!(
                    "{} spines x {} ports cannot terminate {} leaf uplinks",
                    count, spine_ports, uplink_demand
                ),
            ));
        }
        let count = u32::try_from(count).map_err(|_| {
            DietError::capacity(entity(), format!("{} instances exceed the supported count", count))
        })?;

        tracing::debug!(
            partition = %partition,
            spine_class = %spine.name,
            uplink_demand,
            spine_count = count,
            "Sized spine class"
        );

        sizing.push(ClassSizing {
            switch_class: spine.name.clone(),
            tier: Tier::Spine,
            fabric_partition: partition,
            quantity: count,
            rule,
            demand: uplink_demand,
            capacity_per_instance: spine_ports as u64,
        });
        fabrics.push(FabricPlan {
            partition,
            spine_class: Some(spine.name.clone()),
            uplink_demand,
            spine_count: count,
            spine_ports,
        });
    }

    Ok((fabrics, sizing))
}
