use crate::models::{Speed, SwitchModel};

fn model(name: &str, vendor: &str, ports: u32, gbps: u32, prefix: &str) -> SwitchModel {
    SwitchModel {
        name: name.to_string(),
        vendor: Some(vendor.to_string()),
        total_physical_ports: ports,
        port_speed_capacity: Speed(gbps),
        port_name_prefix: prefix.to_string(),
    }
}

/// Built-in switch models available without a catalog file
pub(super) fn seed_switch_models() -> Vec<SwitchModel> {
    vec![
        // 800G fabric switches (64x OSFP)
        model("DS5000", "celestica", 64, 800, "Ethernet"),
        model("SN5600", "nvidia", 64, 800, "swp"),
        model("7060X6-64PE", "arista", 64, 800, "Ethernet"),
        model("QFX5240-64OD", "juniper", 64, 800, "et-0/0/"),
        // 400G
        model("DS4000", "celestica", 32, 400, "Ethernet"),
        model("SN4700", "nvidia", 32, 400, "swp"),
        model("7060DX5-64S", "arista", 64, 400, "Ethernet"),
        // 100G
        model("7050CX3-32S", "arista", 32, 100, "Ethernet"),
        model("SN4600C", "nvidia", 64, 100, "swp"),
    ]
}
