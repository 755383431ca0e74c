use std::collections::{BTreeMap, BTreeSet};

use super::*;
use crate::models::{
    AllocationStrategy, Bundling, Connection, DeviceKind, Distribution, FabricPartition, LinkSource,
    PortZone, ServerClass, ServerRole, SizingRule, Speed, SwitchClass,
};

fn switch(name: &str, partition: FabricPartition, tier: Tier, redundancy: Redundancy, uplinks: u32) -> SwitchClass {
    SwitchClass {
        name: name.to_string(),
        fabric_partition: partition,
        tier,
        redundancy,
        switch_model: "DS5000".to_string(),
        uplink_port_count: uplinks,
        rail_aware: false,
        manual_quantity_override: None,
    }
}

fn zone(class: &str, spec: &str, breakout: &str) -> PortZone {
    PortZone {
        switch_class: class.to_string(),
        port_spec: spec.to_string(),
        breakout_factor: breakout.to_string(),
        allocation_strategy: AllocationStrategy::Sequential,
    }
}

fn servers(name: &str, count: u32, role: ServerRole) -> ServerClass {
    ServerClass {
        name: name.to_string(),
        instance_count: count,
        role,
    }
}

fn connect(
    server: &str,
    switch: &str,
    ports: u32,
    speed: u32,
    bundling: Bundling,
    distribution: Distribution,
    rails: Option<u32>,
) -> Connection {
    Connection {
        name: None,
        server_class: server.to_string(),
        switch_class: switch.to_string(),
        ports_per_connection: ports,
        speed: Speed(speed),
        bundling,
        distribution,
        rail_count: rails,
    }
}

/// Two-partition GPU fabric with storage, every switch on DS5000
fn gpu_fabric() -> Plan {
    let mut rail_leaf = switch("be-rail-leaf", FabricPartition::Backend, Tier::Leaf, Redundancy::Single, 32);
    rail_leaf.rail_aware = true;

    Plan {
        name: "gpu-pod".to_string(),
        description: Some("128 GPU servers with two storage groups".to_string()),
        switch_classes: vec![
            switch("fe-gpu-leaf", FabricPartition::Frontend, Tier::Leaf, Redundancy::MclagPair, 32),
            rail_leaf,
            switch("storage-leaf-a", FabricPartition::Frontend, Tier::Leaf, Redundancy::Single, 32),
            switch("storage-leaf-b", FabricPartition::Frontend, Tier::Leaf, Redundancy::Single, 32),
            switch("fe-spine", FabricPartition::Frontend, Tier::Spine, Redundancy::Single, 0),
            switch("be-spine", FabricPartition::Backend, Tier::Spine, Redundancy::Single, 0),
        ],
        port_zones: vec![
            zone("fe-gpu-leaf", "1-63:2", "4x200G"),
            zone("be-rail-leaf", "1-63:2", "2x400G"),
            zone("storage-leaf-a", "1-63:2", "4x200G"),
            zone("storage-leaf-b", "1-63:2", "4x200G"),
        ],
        server_classes: vec![
            servers("gpu-fe-only", 96, ServerRole::Gpu),
            servers("gpu-dual", 32, ServerRole::Gpu),
            servers("storage-a", 9, ServerRole::Storage),
            servers("storage-b", 9, ServerRole::Storage),
        ],
        connections: vec![
            connect("gpu-fe-only", "fe-gpu-leaf", 2, 200, Bundling::Unbundled, Distribution::Alternating, None),
            connect("gpu-dual", "fe-gpu-leaf", 2, 200, Bundling::Unbundled, Distribution::Alternating, None),
            connect("gpu-dual", "be-rail-leaf", 8, 400, Bundling::Unbundled, Distribution::RailOptimized, Some(8)),
            connect("storage-a", "storage-leaf-a", 2, 200, Bundling::Bundled, Distribution::SameSwitch, None),
            connect("storage-b", "storage-leaf-b", 2, 200, Bundling::Bundled, Distribution::SameSwitch, None),
        ],
    }
}

fn catalog() -> SwitchModelCatalog {
    SwitchModelCatalog::with_seed_models()
}

fn quantity(topology: &GeneratedTopology, class: &str) -> u32 {
    topology.sizing_for(class).map(|s| s.quantity).unwrap_or_default()
}

#[test]
fn test_gpu_fabric_sizing() {
    let topology = generate(&gpu_fabric(), &catalog()).unwrap();

    assert_eq!(quantity(&topology, "fe-gpu-leaf"), 2);
    assert_eq!(quantity(&topology, "be-rail-leaf"), 8);
    assert_eq!(quantity(&topology, "storage-leaf-a"), 1);
    assert_eq!(quantity(&topology, "storage-leaf-b"), 1);
    assert_eq!(quantity(&topology, "fe-spine"), 2);
    assert_eq!(quantity(&topology, "be-spine"), 4);

    assert_eq!(topology.sizing_for("be-rail-leaf").unwrap().rule, SizingRule::RailCount);
    assert_eq!(topology.sizing_for("fe-spine").unwrap().rule, SizingRule::SpineUplinkDemand);

    let frontend = &topology.fabrics[0];
    assert_eq!(frontend.partition, FabricPartition::Frontend);
    assert_eq!(frontend.uplink_demand, 128);
    let backend = &topology.fabrics[1];
    assert_eq!(backend.uplink_demand, 256);
    assert_eq!(backend.cable_count, 256);
}

#[test]
fn test_gpu_fabric_counts() {
    let topology = generate(&gpu_fabric(), &catalog()).unwrap();
    let summary = topology.summary();

    assert_eq!(summary.server_count, 146);
    assert_eq!(summary.switch_count, 18);
    assert_eq!(summary.device_count, 164);
    assert_eq!(summary.server_cable_count, 548);
    assert_eq!(summary.fabric_cable_count, 384);
    assert_eq!(summary.cable_count, 932);
    assert_eq!(summary.unconnected_interface_count, 0);
    assert_eq!(summary.interface_count, 1864);
}

#[test]
fn test_interfaces_reconcile_with_cables() {
    let topology = generate(&gpu_fabric(), &catalog()).unwrap();
    assert_eq!(
        topology.interfaces.len(),
        2 * topology.cables.len() + topology.unconnected_interfaces()
    );

    for cable in &topology.cables {
        let a = topology.interface(cable.a);
        let b = topology.interface(cable.b);
        assert_ne!(a.device, b.device);
        assert_eq!(a.cable, Some(cable.id));
        assert_eq!(b.cable, Some(cable.id));
    }
    for device in &topology.devices {
        for &id in &device.interfaces {
            assert_eq!(topology.interface(id).device, device.id);
        }
    }
}

#[test]
fn test_server_links_use_zone_ports_only() {
    let topology = generate(&gpu_fabric(), &catalog()).unwrap();
    let leaf_ports: Vec<_> = topology
        .interfaces
        .iter()
        .filter(|i| topology.device(i.device).kind == DeviceKind::Leaf)
        .collect();
    assert!(!leaf_ports.is_empty());

    for interface in leaf_ports {
        let physical = interface.physical_port.unwrap();
        match interface.source {
            LinkSource::Connection { .. } => {
                assert!(physical % 2 == 1 && physical <= 63, "{} on port {}", interface.name, physical);
            }
            LinkSource::Fabric { .. } => {
                assert!(physical % 2 == 0, "uplink {} on zone port {}", interface.name, physical);
            }
        }
    }
}

#[test]
fn test_names_and_order() {
    let topology = generate(&gpu_fabric(), &catalog()).unwrap();
    assert_eq!(topology.devices[0].name, "fe-gpu-leaf-01");
    assert_eq!(topology.devices[2].name, "be-rail-leaf-01");
    assert_eq!(topology.devices[17].name, "be-spine-04");
    assert_eq!(topology.devices[18].name, "gpu-fe-only-01");
    assert_eq!(topology.devices[18].server_role, Some(ServerRole::Gpu));

    let names: BTreeSet<&str> = topology.devices.iter().map(|d| d.name.as_str()).collect();
    assert_eq!(names.len(), topology.devices.len());

    // First server port lands on the first lane of the first zone port
    let first = topology.device(topology.devices[18].id);
    let eth0 = topology.interface(first.interfaces[0]);
    assert_eq!(eth0.name, "eth0");
    let cable = &topology.cables[eth0.cable.unwrap().0];
    let leaf_side = topology.interface(cable.b);
    assert_eq!(topology.device(leaf_side.device).name, "fe-gpu-leaf-01");
    assert_eq!(leaf_side.name, "Ethernet1/1");
}

#[test]
fn test_alternating_spreads_ports() {
    let topology = generate(&gpu_fabric(), &catalog()).unwrap();
    let server = topology.devices_of_class("gpu-fe-only").next().unwrap();
    let leaves: Vec<String> = server
        .interfaces
        .iter()
        .map(|&id| {
            let interface = topology.interface(id);
            let cable = &topology.cables[interface.cable.unwrap().0];
            let peer = if cable.a == id { cable.b } else { cable.a };
            topology.device(topology.interface(peer).device).name.clone()
        })
        .collect();
    assert_eq!(leaves, vec!["fe-gpu-leaf-01", "fe-gpu-leaf-02"]);
}

#[test]
fn test_same_switch_bundles_stay_together() {
    let topology = generate(&gpu_fabric(), &catalog()).unwrap();
    for server in topology.devices_of_class("storage-a") {
        let peers: BTreeSet<_> = server
            .interfaces
            .iter()
            .map(|&id| {
                let interface = topology.interface(id);
                assert_eq!(interface.bundle.as_deref(), Some("bond0"));
                let cable = &topology.cables[interface.cable.unwrap().0];
                topology.interface(cable.b).device
            })
            .collect();
        assert_eq!(peers.len(), 1);
    }
}

#[test]
fn test_rail_optimized_maps_rails_to_leaves() {
    let topology = generate(&gpu_fabric(), &catalog()).unwrap();
    let mut per_leaf: BTreeMap<String, usize> = BTreeMap::new();

    for server in topology.devices_of_class("gpu-dual") {
        let mut seen_leaves = BTreeSet::new();
        for &id in &server.interfaces {
            let interface = topology.interface(id);
            let LinkSource::Connection { rail: Some(rail), .. } = interface.source else { continue };
            let cable = &topology.cables[interface.cable.unwrap().0];
            let leaf = topology.device(topology.interface(cable.b).device);
            assert_eq!(leaf.class_name, "be-rail-leaf");
            assert_eq!(leaf.index, rail + 1);
            seen_leaves.insert(leaf.id);
            *per_leaf.entry(leaf.name.clone()).or_insert(0) += 1;
        }
        assert_eq!(seen_leaves.len(), 8);
    }
    assert_eq!(per_leaf.len(), 8);
    assert!(per_leaf.values().all(|&ports| ports == 32));
}

#[test]
fn test_generation_is_deterministic() {
    let plan = gpu_fabric();
    let catalog = catalog();
    let first = generate(&plan, &catalog).unwrap();
    let second = generate(&plan, &catalog).unwrap();
    assert_eq!(first, second);
}

#[test]
fn test_preview_matches_generate() {
    let plan = gpu_fabric();
    let catalog = catalog();
    let summary = preview(&plan, &catalog).unwrap();
    assert_eq!(summary, generate(&plan, &catalog).unwrap().summary());
    assert!(validate(&plan, &catalog).is_ok());
}

#[test]
fn test_override_wins_and_flows_into_spines() {
    let mut plan = gpu_fabric();
    plan.switch_classes[0].manual_quantity_override = Some(4);
    let topology = generate(&plan, &catalog()).unwrap();

    assert_eq!(quantity(&topology, "fe-gpu-leaf"), 4);
    assert_eq!(topology.sizing_for("fe-gpu-leaf").unwrap().rule, SizingRule::ManualOverride);
    // 4 x 32 + 2 x 32 frontend uplinks over 64-port spines
    assert_eq!(topology.fabrics[0].uplink_demand, 192);
    assert_eq!(quantity(&topology, "fe-spine"), 3);
}

#[test]
fn test_zero_uplink_demand_yields_zero_spines() {
    let mut plan = gpu_fabric();
    plan.switch_classes[1].uplink_port_count = 0;
    let topology = generate(&plan, &catalog()).unwrap();

    assert_eq!(quantity(&topology, "be-spine"), 0);
    assert_eq!(topology.devices_of_class("be-spine").count(), 0);
    assert_eq!(topology.fabrics[1].cable_count, 0);
    assert_eq!(topology.summary().fabric_cable_count, 128);
}

#[test]
fn test_partition_without_spine_leaves_uplinks_open() {
    let mut plan = gpu_fabric();
    plan.switch_classes.retain(|c| c.name != "be-spine");
    let topology = generate(&plan, &catalog()).unwrap();

    assert_eq!(topology.unconnected_interfaces(), 256);
    assert_eq!(
        topology.interfaces.len(),
        2 * topology.cables.len() + topology.unconnected_interfaces()
    );
}

#[test]
fn test_duplicate_switch_class_is_rejected() {
    let mut plan = gpu_fabric();
    plan.switch_classes.push(switch(
        "fe-spine",
        FabricPartition::Frontend,
        Tier::Spine,
        Redundancy::Single,
        0,
    ));
    let err = generate(&plan, &catalog()).unwrap_err();
    assert!(err.is_configuration());
    assert_eq!(err.entity().kind, EntityKind::SwitchClass);
    assert_eq!(err.entity().name, "fe-spine");
}

#[test]
fn test_unknown_references_are_rejected() {
    let mut plan = gpu_fabric();
    plan.connections[0].server_class = "gpu-missing".to_string();
    let err = generate(&plan, &catalog()).unwrap_err();
    assert!(err.is_configuration());
    assert_eq!(err.entity().kind, EntityKind::Connection);

    let mut plan = gpu_fabric();
    plan.switch_classes[0].switch_model = "NOPE-9000".to_string();
    let err = generate(&plan, &catalog()).unwrap_err();
    assert!(err.to_string().contains("NOPE-9000"));
}

#[test]
fn test_zone_outside_model_is_rejected() {
    let mut plan = gpu_fabric();
    plan.port_zones[0].port_spec = "1-65:2".to_string();
    let err = generate(&plan, &catalog()).unwrap_err();
    assert!(err.is_configuration());
    assert_eq!(err.entity().kind, EntityKind::PortZone);
}

#[test]
fn test_speed_without_zone_is_capacity_error() {
    let mut plan = gpu_fabric();
    plan.connections[3].speed = Speed(100);
    let err = generate(&plan, &catalog()).unwrap_err();
    assert!(err.is_capacity());
    assert_eq!(err.entity().name, "storage-leaf-a");
}

#[test]
fn test_overflow_fails_without_partial_topology() {
    let mut plan = gpu_fabric();
    // 9 storage servers need 18 ports; one leaf with a single 4-lane port offers 4
    plan.port_zones[2].port_spec = "1".to_string();
    plan.switch_classes[2].manual_quantity_override = Some(1);
    let result = generate(&plan, &catalog());
    let err = result.unwrap_err();
    assert!(err.is_capacity());
    assert_eq!(err.entity().name, "storage-leaf-a");
}

#[test]
fn test_rail_count_must_divide_ports() {
    let mut plan = gpu_fabric();
    plan.connections[2].ports_per_connection = 6;
    assert!(generate(&plan, &catalog()).unwrap_err().is_configuration());
}

/// One frontend leaf class with three single-lane 800G server ports and no spine
fn small_leaf_plan(server_classes: Vec<ServerClass>, connections: Vec<Connection>) -> Plan {
    Plan {
        name: "small".to_string(),
        description: None,
        switch_classes: vec![switch("leaf", FabricPartition::Frontend, Tier::Leaf, Redundancy::Single, 0)],
        port_zones: vec![zone("leaf", "1-3", "1x800G")],
        server_classes,
        connections,
    }
}

/// Leaf names each server of `class` is cabled to, in interface order
fn server_peers(topology: &GeneratedTopology, class: &str) -> Vec<Vec<String>> {
    topology
        .devices_of_class(class)
        .map(|server| {
            server
                .interfaces
                .iter()
                .map(|&id| {
                    let cable = &topology.cables[topology.interface(id).cable.unwrap().0];
                    let peer = if cable.a == id { cable.b } else { cable.a };
                    topology.device(topology.interface(peer).device).name.clone()
                })
                .collect()
        })
        .collect()
}

fn assert_reconciles(topology: &GeneratedTopology) {
    assert_eq!(
        topology.interfaces.len(),
        2 * topology.cables.len() + topology.unconnected_interfaces()
    );
}

#[test]
fn test_alternating_connections_share_leaf_class() {
    let plan = small_leaf_plan(
        vec![servers("a", 3, ServerRole::Gpu), servers("b", 3, ServerRole::Gpu)],
        vec![
            connect("a", "leaf", 1, 800, Bundling::Unbundled, Distribution::Alternating, None),
            connect("b", "leaf", 1, 800, Bundling::Unbundled, Distribution::Alternating, None),
        ],
    );
    let topology = generate(&plan, &catalog()).unwrap();
    assert_eq!(quantity(&topology, "leaf"), 2);
    assert_eq!(topology.cables.len(), 6);
    assert_reconciles(&topology);

    let flat = |class: &str| server_peers(&topology, class).into_iter().flatten().collect::<Vec<_>>();
    assert_eq!(flat("a"), vec!["leaf-01", "leaf-02", "leaf-01"]);
    assert_eq!(flat("b"), vec!["leaf-02", "leaf-01", "leaf-02"]);
}

#[test]
fn test_same_switch_bundles_that_leave_remainders() {
    let plan = small_leaf_plan(
        vec![servers("storage", 5, ServerRole::Storage)],
        vec![connect("storage", "leaf", 2, 800, Bundling::Bundled, Distribution::SameSwitch, None)],
    );
    let topology = generate(&plan, &catalog()).unwrap();
    // one 2-port bundle per 3-port leaf
    assert_eq!(quantity(&topology, "leaf"), 5);
    assert_reconciles(&topology);

    for peers in server_peers(&topology, "storage") {
        assert_eq!(peers.len(), 2);
        assert_eq!(peers[0], peers[1]);
    }
}

#[test]
fn test_sequential_fills_leaves_in_order() {
    let plan = small_leaf_plan(
        vec![servers("cpu", 5, ServerRole::Other)],
        vec![connect("cpu", "leaf", 2, 800, Bundling::Unbundled, Distribution::Sequential, None)],
    );
    let topology = generate(&plan, &catalog()).unwrap();
    assert_eq!(quantity(&topology, "leaf"), 4);
    assert_eq!(topology.cables.len(), 10);
    assert_reconciles(&topology);

    let mut per_leaf: BTreeMap<String, usize> = BTreeMap::new();
    for peer in server_peers(&topology, "cpu").into_iter().flatten() {
        *per_leaf.entry(peer).or_default() += 1;
    }
    let counts: Vec<usize> = per_leaf.values().copied().collect();
    assert_eq!(counts, vec![3, 3, 3, 1]);
}

#[test]
fn test_uneven_sized_plans_generate() {
    for (count, ports, distribution, bundling) in [
        (7, 1, Distribution::Alternating, Bundling::Unbundled),
        (4, 2, Distribution::Alternating, Bundling::Unbundled),
        (7, 2, Distribution::SameSwitch, Bundling::Bundled),
        (4, 3, Distribution::SameSwitch, Bundling::Bundled),
        (11, 2, Distribution::Sequential, Bundling::Unbundled),
    ] {
        let plan = small_leaf_plan(
            vec![servers("srv", count, ServerRole::Gpu), servers("extra", 2, ServerRole::Gpu)],
            vec![
                connect("srv", "leaf", ports, 800, bundling, distribution, None),
                connect("extra", "leaf", 1, 800, Bundling::Unbundled, Distribution::Alternating, None),
            ],
        );
        let topology = generate(&plan, &catalog())
            .unwrap_or_else(|e| panic!("{} x {} {:?}: {}", count, ports, distribution, e));
        assert_eq!(topology.cables.len() as u32, count * ports + 2);
        assert_reconciles(&topology);
    }
}
