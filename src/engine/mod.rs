//! DIET topology synthesis.
//!
//! [`generate`] is a pure function from a [`Plan`] and a switch model catalog
//! to a [`GeneratedTopology`]. Phases run in a fixed order: resolve port zones,
//! compute connection demand, size leaf classes, size spines, materialize.
//! Every call owns its working set, so independent plans can be generated
//! concurrently without coordination.

pub mod demand;
pub mod error;
pub mod materialize;
pub mod sizing;
pub mod spine;
pub mod zones;

use std::collections::{BTreeMap, BTreeSet};

use crate::catalog::SwitchModelCatalog;
use crate::models::{ClassSizing, GeneratedTopology, Plan, PreviewSummary, Redundancy, SwitchModel, Tier};

pub use error::{DietError, Entity, EntityKind, Result};

use materialize::MaterializeInput;
use zones::ClassPorts;

fn check_unique<'a>(names: impl Iterator<Item = &'a str>, entity: fn(&str) -> Entity) -> Result<()> {
    let mut seen = BTreeSet::new();
    for name in names {
        if name.trim().is_empty() {
            return Err(DietError::configuration(entity(name), "name is required"));
        }
        if !seen.insert(name) {
            return Err(DietError::configuration(entity(name), "name is declared more than once"));
        }
    }
    Ok(())
}

/// Structural checks on names and cross references, before any sizing.
fn check_plan(plan: &Plan) -> Result<()> {
    if plan.name.trim().is_empty() {
        return Err(DietError::configuration(Entity::plan(&plan.name), "plan name is required"));
    }
    check_unique(plan.switch_classes.iter().map(|c| c.name.as_str()), Entity::switch_class)?;
    check_unique(plan.server_classes.iter().map(|c| c.name.as_str()), Entity::server_class)?;

    for class in &plan.switch_classes {
        if class.tier == Tier::Spine && class.rail_aware {
            return Err(DietError::configuration(
                Entity::switch_class(&class.name),
                "only leaf classes can be rail-aware",
            ));
        }
        if class.rail_aware && class.redundancy == Redundancy::MclagPair {
            return Err(DietError::configuration(
                Entity::switch_class(&class.name),
                "a rail-aware class sizes from rail count and cannot also be an MCLAG pair",
            ));
        }
    }

    for zone in &plan.port_zones {
        match plan.switch_class(&zone.switch_class) {
            None => {
                return Err(DietError::configuration(
                    Entity::port_zone(zone.label()),
                    format!("unknown switch class '{}'", zone.switch_class),
                ));
            }
            Some(class) if class.tier == Tier::Spine => {
                return Err(DietError::configuration(
                    Entity::port_zone(zone.label()),
                    "spine classes offer all physical ports to uplinks and take no port zones",
                ));
            }
            Some(_) => {}
        }
    }

    for conn in &plan.connections {
        let entity = || Entity::connection(conn.label());
        if plan.server_class(&conn.server_class).is_none() {
            return Err(DietError::configuration(
                entity(),
                format!("unknown server class '{}'", conn.server_class),
            ));
        }
        match plan.switch_class(&conn.switch_class) {
            None => {
                return Err(DietError::configuration(
                    entity(),
                    format!("unknown switch class '{}'", conn.switch_class),
                ));
            }
            Some(class) if class.tier == Tier::Spine => {
                return Err(DietError::configuration(
                    entity(),
                    format!("servers cannot attach to spine class '{}'", class.name),
                ));
            }
            Some(_) => {}
        }
    }
    Ok(())
}

/// Look up the switch model of every switch class.
fn resolve_models<'c>(plan: &Plan, catalog: &'c SwitchModelCatalog) -> Result<BTreeMap<String, &'c SwitchModel>> {
    let mut models = BTreeMap::new();
    for class in &plan.switch_classes {
        let model = catalog.get(&class.switch_model).ok_or_else(|| {
            DietError::configuration(
                Entity::switch_class(&class.name),
                format!("unknown switch model '{}'", class.switch_model),
            )
        })?;
        models.insert(class.switch_model.clone(), model);
    }
    Ok(models)
}

/// Resolve the port zones of every leaf class.
fn resolve_ports(plan: &Plan, models: &BTreeMap<String, &SwitchModel>) -> Result<BTreeMap<String, ClassPorts>> {
    let mut ports = BTreeMap::new();
    for class in plan.switch_classes.iter().filter(|c| c.tier == Tier::Leaf) {
        let model = models.get(&class.switch_model).ok_or_else(|| {
            DietError::configuration(Entity::switch_model(&class.switch_model), "model was not resolved")
        })?;
        let zones: Vec<_> = plan
            .port_zones
            .iter()
            .enumerate()
            .filter(|(_, z)| z.switch_class == class.name)
            .collect();
        ports.insert(class.name.clone(), zones::resolve_class_ports(class, &zones, model)?);
    }
    Ok(ports)
}

/// Generate the full topology for a plan.
pub fn generate(plan: &Plan, catalog: &SwitchModelCatalog) -> Result<GeneratedTopology> {
    check_plan(plan)?;
    let models = resolve_models(plan, catalog)?;
    let ports = resolve_ports(plan, &models)?;
    let demand = demand::compute_demand(plan)?;
    let leaf_sizing = sizing::size_leaf_classes(plan, &ports, &demand)?;
    let (fabrics, spine_sizing) = spine::size_spines(plan, &models, &ports, &leaf_sizing)?;

    // Report sizing in plan order
    let mut by_class: BTreeMap<String, ClassSizing> = leaf_sizing
        .into_iter()
        .chain(spine_sizing)
        .map(|s| (s.switch_class.clone(), s))
        .collect();
    let sizing: Vec<ClassSizing> = plan
        .switch_classes
        .iter()
        .filter_map(|c| by_class.remove(&c.name))
        .collect();

    let topology = materialize::materialize(MaterializeInput {
        plan,
        models: &models,
        ports: &ports,
        demand: &demand,
        sizing,
        fabrics: &fabrics,
    })?;

    let summary = topology.summary();
    tracing::info!(
        plan = %plan.name,
        devices = summary.device_count,
        switches = summary.switch_count,
        servers = summary.server_count,
        interfaces = summary.interface_count,
        cables = summary.cable_count,
        "Generated topology"
    );
    Ok(topology)
}

/// Count-only preview of what [`generate`] would produce.
pub fn preview(plan: &Plan, catalog: &SwitchModelCatalog) -> Result<PreviewSummary> {
    generate(plan, catalog).map(|t| t.summary())
}

/// Check a plan end to end without keeping the result.
pub fn validate(plan: &Plan, catalog: &SwitchModelCatalog) -> Result<()> {
    generate(plan, catalog).map(|_| ())
}

#[cfg(test)]
mod tests;
