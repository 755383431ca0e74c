//! Materialization of sized classes into Device, Interface and Cable records.

use std::collections::{BTreeMap, VecDeque};

use crate::models::{
    Bundling, Cable, CableId, ClassSizing, Device, DeviceId, DeviceKind, FabricSummary,
    GeneratedTopology, Interface, InterfaceId, LinkSource, Plan, Speed, SwitchModel, Tier,
};

use super::demand::{ClassAllocator, DemandTable};
use super::error::{DietError, Entity, Result};
use super::spine::FabricPlan;
use super::zones::{ClassPorts, LogicalPort};

/// Everything the materializer needs from the earlier phases
pub struct MaterializeInput<'a> {
    pub plan: &'a Plan,
    pub models: &'a BTreeMap<String, &'a SwitchModel>,
    pub ports: &'a BTreeMap<String, ClassPorts>,
    pub demand: &'a DemandTable,
    pub sizing: Vec<ClassSizing>,
    pub fabrics: &'a [FabricPlan],
}

/// Logical ports still unallocated on one leaf instance, queued per speed
struct InstancePorts {
    by_speed: BTreeMap<Speed, VecDeque<LogicalPort>>,
}

impl InstancePorts {
    fn new(template: &ClassPorts) -> Self {
        let mut by_speed: BTreeMap<Speed, VecDeque<LogicalPort>> = BTreeMap::new();
        for port in &template.logical {
            by_speed.entry(port.speed).or_default().push_back(*port);
        }
        Self { by_speed }
    }

    fn take(&mut self, speed: Speed) -> Option<LogicalPort> {
        self.by_speed.get_mut(&speed).and_then(|q| q.pop_front())
    }
}

/// Arena builder; every record refers to others by index
#[derive(Default)]
struct TopologyBuilder {
    devices: Vec<Device>,
    interfaces: Vec<Interface>,
    cables: Vec<Cable>,
}

struct NewInterface {
    name: String,
    speed: Speed,
    bundling: Option<Bundling>,
    bundle: Option<String>,
    physical_port: Option<u32>,
    lane: Option<u32>,
    source: LinkSource,
}

impl TopologyBuilder {
    fn add_device(&mut self, mut device: Device) -> DeviceId {
        let id = DeviceId(self.devices.len());
        device.id = id;
        self.devices.push(device);
        id
    }

    fn add_interface(&mut self, device: DeviceId, new: NewInterface) -> InterfaceId {
        let id = InterfaceId(self.interfaces.len());
        self.interfaces.push(Interface {
            id,
            device,
            name: new.name,
            speed: new.speed,
            bundling: new.bundling,
            bundle: new.bundle,
            physical_port: new.physical_port,
            lane: new.lane,
            source: new.source,
            cable: None,
        });
        self.devices[device.0].interfaces.push(id);
        id
    }

    fn connect(&mut self, a: InterfaceId, b: InterfaceId, speed: Speed, source: LinkSource) -> CableId {
        debug_assert_ne!(self.interfaces[a.0].device, self.interfaces[b.0].device);
        let id = CableId(self.cables.len());
        self.cables.push(Cable { id, a, b, speed, source });
        self.interfaces[a.0].cable = Some(id);
        self.interfaces[b.0].cable = Some(id);
        id
    }
}

/// Deterministic device name: `<class-name>-<two-digit-index>`, 1-based
pub fn device_name(class_name: &str, index: u32) -> String {
    format!("{}-{:02}", class_name, index)
}

fn model_for<'a>(input: &MaterializeInput<'a>, class_name: &str, model_name: &str) -> Result<&'a SwitchModel> {
    input.models.get(model_name).copied().ok_or_else(|| {
        DietError::configuration(
            Entity::switch_class(class_name),
            format!("unknown switch model '{}'", model_name),
        )
    })
}

/// Turn the sized plan into concrete records.
pub fn materialize(input: MaterializeInput<'_>) -> Result<GeneratedTopology> {
    let plan = input.plan;
    let mut builder = TopologyBuilder::default();
    let quantities: BTreeMap<&str, u32> = input
        .sizing
        .iter()
        .map(|s| (s.switch_class.as_str(), s.quantity))
        .collect();

    // Switches first, in plan order
    let mut switch_devices: BTreeMap<&str, Vec<DeviceId>> = BTreeMap::new();
    let mut leaf_ports: BTreeMap<&str, Vec<InstancePorts>> = BTreeMap::new();
    let mut allocators: BTreeMap<&str, ClassAllocator> = BTreeMap::new();
    for class in &plan.switch_classes {
        let quantity = quantities.get(class.name.as_str()).copied().unwrap_or(0);
        let mut ids = Vec::with_capacity(quantity as usize);
        for index in 1..=quantity {
            ids.push(builder.add_device(Device {
                id: DeviceId(0),
                name: device_name(&class.name, index),
                kind: DeviceKind::from(class.tier),
                class_name: class.name.clone(),
                index,
                fabric_partition: Some(class.fabric_partition),
                switch_model: Some(class.switch_model.clone()),
                server_role: None,
                interfaces: Vec::new(),
            }));
        }
        if class.tier == Tier::Leaf {
            if let Some(template) = input.ports.get(&class.name) {
                leaf_ports.insert(
                    class.name.as_str(),
                    (0..quantity).map(|_| InstancePorts::new(template)).collect(),
                );
                allocators.insert(class.name.as_str(), ClassAllocator::new(template, quantity as usize));
            }
        }
        switch_devices.insert(class.name.as_str(), ids);
    }

    // Then servers, in plan order
    let mut server_devices: BTreeMap<&str, Vec<DeviceId>> = BTreeMap::new();
    for class in &plan.server_classes {
        let ids = (1..=class.instance_count)
            .map(|index| {
                builder.add_device(Device {
                    id: DeviceId(0),
                    name: device_name(&class.name, index),
                    kind: DeviceKind::Server,
                    class_name: class.name.clone(),
                    index,
                    fabric_partition: None,
                    switch_model: None,
                    server_role: Some(class.role),
                    interfaces: Vec::new(),
                })
            })
            .collect();
        server_devices.insert(class.name.as_str(), ids);
    }

    // Server-to-leaf links, connection by connection
    let mut next_nic: BTreeMap<DeviceId, u32> = BTreeMap::new();
    let mut next_bond: BTreeMap<DeviceId, u32> = BTreeMap::new();
    for entry in &input.demand.entries {
        let class = plan.switch_class(&entry.switch_class).ok_or_else(|| {
            DietError::configuration(
                Entity::connection(entry.label.clone()),
                format!("unknown switch class '{}'", entry.switch_class),
            )
        })?;
        let model = model_for(&input, &class.name, &class.switch_model)?;
        let leaves = switch_devices.get(class.name.as_str()).cloned().unwrap_or_default();
        let instances = leaf_ports.get_mut(class.name.as_str()).ok_or_else(|| {
            DietError::configuration(Entity::switch_class(&class.name), "servers can only attach to leaf classes")
        })?;
        let servers = server_devices.get(entry.server_class.as_str()).cloned().unwrap_or_default();

        let allocator = allocators.get_mut(class.name.as_str()).ok_or_else(|| {
            DietError::configuration(Entity::switch_class(&class.name), "servers can only attach to leaf classes")
        })?;
        let placement = allocator.place(entry)?;

        for (server_index, targets) in placement.iter().enumerate() {
            let server = servers[server_index];
            let bundle = match entry.bundling {
                Bundling::Bundled => {
                    let bond = next_bond.entry(server).or_insert(0);
                    let label = format!("bond{}", bond);
                    *bond += 1;
                    Some(label)
                }
                Bundling::Unbundled => None,
            };

            for (port, &instance) in targets.iter().enumerate() {
                let logical = instances[instance].take(entry.speed).ok_or_else(|| {
                    DietError::capacity(
                        Entity::switch_class(&class.name),
                        format!("instance {} ran out of {} ports", instance + 1, entry.speed),
                    )
                })?;
                let source = LinkSource::Connection {
                    connection: entry.label.clone(),
                    rail: entry.rails.map(|r| (port as u32) / r.ports_per_rail),
                };

                let nic = next_nic.entry(server).or_insert(0);
                let server_if = builder.add_interface(
                    server,
                    NewInterface {
                        name: format!("eth{}", nic),
                        speed: entry.speed,
                        bundling: Some(entry.bundling),
                        bundle: bundle.clone(),
                        physical_port: None,
                        lane: None,
                        source: source.clone(),
                    },
                );
                *nic += 1;

                let leaf_if = builder.add_interface(
                    leaves[instance],
                    NewInterface {
                        name: model.port_name(logical.physical, logical.lane),
                        speed: logical.speed,
                        bundling: Some(entry.bundling),
                        bundle: None,
                        physical_port: Some(logical.physical),
                        lane: logical.lane,
                        source: source.clone(),
                    },
                );
                builder.connect(server_if, leaf_if, entry.speed, source);
            }
        }
    }

    // Leaf-to-spine uplinks, round-robin across the partition's spines
    let mut fabrics = Vec::with_capacity(input.fabrics.len());
    for fabric in input.fabrics {
        let spine = match &fabric.spine_class {
            Some(name) => {
                let class = plan.switch_class(name).ok_or_else(|| {
                    DietError::configuration(Entity::switch_class(name), "spine class not found")
                })?;
                let model = model_for(&input, &class.name, &class.switch_model)?;
                let ids = switch_devices.get(name.as_str()).cloned().unwrap_or_default();
                Some((model, ids))
            }
            None => None,
        };
        let mut spine_next_port: Vec<u32> = spine.as_ref().map(|(_, ids)| vec![0; ids.len()]).unwrap_or_default();
        let source = LinkSource::Fabric { partition: fabric.partition };
        let mut uplink_index = 0usize;
        let mut cable_count = 0u64;

        let leaves = plan
            .switch_classes
            .iter()
            .filter(|c| c.tier == Tier::Leaf && c.fabric_partition == fabric.partition);
        for class in leaves {
            if class.uplink_port_count == 0 {
                continue;
            }
            let model = model_for(&input, &class.name, &class.switch_model)?;
            let free = input
                .ports
                .get(&class.name)
                .map(|p| p.free_physical.as_slice())
                .unwrap_or_default();
            let devices = switch_devices.get(class.name.as_str()).cloned().unwrap_or_default();

            for leaf in devices {
                for uplink in 0..class.uplink_port_count as usize {
                    let physical = *free.get(uplink).ok_or_else(|| {
                        DietError::configuration(
                            Entity::switch_class(&class.name),
                            "not enough free physical ports for uplinks",
                        )
                    })?;
                    let leaf_if = builder.add_interface(
                        leaf,
                        NewInterface {
                            name: model.port_name(physical, None),
                            speed: model.port_speed_capacity,
                            bundling: None,
                            bundle: None,
                            physical_port: Some(physical),
                            lane: None,
                            source: source.clone(),
                        },
                    );

                    if let Some((spine_model, spine_ids)) = &spine {
                        if spine_ids.is_empty() {
                            continue;
                        }
                        let target = uplink_index % spine_ids.len();
                        uplink_index += 1;
                        spine_next_port[target] += 1;
                        let spine_port = spine_next_port[target];
                        if spine_port > spine_model.total_physical_ports {
                            return Err(DietError::capacity(
                                Entity::switch_class(fabric.spine_class.as_deref().unwrap_or_default()),
                                format!(
                                    "spine instance {} has no free port for an uplink from {}",
                                    target + 1,
                                    builder.devices[leaf.0].name
                                ),
                            ));
                        }
                        let spine_if = builder.add_interface(
                            spine_ids[target],
                            NewInterface {
                                name: spine_model.port_name(spine_port, None),
                                speed: spine_model.port_speed_capacity,
                                bundling: None,
                                bundle: None,
                                physical_port: Some(spine_port),
                                lane: None,
                                source: source.clone(),
                            },
                        );
                        let speed = model.port_speed_capacity.min(spine_model.port_speed_capacity);
                        builder.connect(leaf_if, spine_if, speed, source.clone());
                        cable_count += 1;
                    }
                }
            }
        }

        fabrics.push(FabricSummary {
            partition: fabric.partition,
            spine_class: fabric.spine_class.clone(),
            uplink_demand: fabric.uplink_demand,
            spine_count: fabric.spine_count,
            cable_count,
        });
    }

    Ok(GeneratedTopology {
        plan: plan.name.clone(),
        devices: builder.devices,
        interfaces: builder.interfaces,
        cables: builder.cables,
        sizing: input.sizing,
        fabrics,
    })
}
