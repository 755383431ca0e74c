use std::fmt;

/// Kind of plan entity an error points at
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntityKind {
    Plan,
    SwitchClass,
    PortZone,
    ServerClass,
    Connection,
    SwitchModel,
}

impl EntityKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EntityKind::Plan => "plan",
            EntityKind::SwitchClass => "switch class",
            EntityKind::PortZone => "port zone",
            EntityKind::ServerClass => "server class",
            EntityKind::Connection => "connection",
            EntityKind::SwitchModel => "switch model",
        }
    }
}

/// The offending plan entity, identified by kind and name
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Entity {
    pub kind: EntityKind,
    pub name: String,
}

impl Entity {
    pub fn new(kind: EntityKind, name: impl Into<String>) -> Self {
        Self {
            kind,
            name: name.into(),
        }
    }

    pub fn plan(name: &str) -> Self {
        Self::new(EntityKind::Plan, name)
    }

    pub fn switch_class(name: &str) -> Self {
        Self::new(EntityKind::SwitchClass, name)
    }

    pub fn port_zone(label: impl Into<String>) -> Self {
        Self::new(EntityKind::PortZone, label)
    }

    pub fn server_class(name: &str) -> Self {
        Self::new(EntityKind::ServerClass, name)
    }

    pub fn connection(label: impl Into<String>) -> Self {
        Self::new(EntityKind::Connection, label)
    }

    pub fn switch_model(name: &str) -> Self {
        Self::new(EntityKind::SwitchModel, name)
    }
}

impl fmt::Display for Entity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} '{}'", self.kind.as_str(), self.name)
    }
}

/// Generation failure. No partial topology is ever returned alongside one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DietError {
    /// The plan is structurally invalid
    Configuration { entity: Entity, message: String },
    /// A zone or class cannot be sized or cannot hold its allocation
    Capacity { entity: Entity, message: String },
}

impl DietError {
    pub fn configuration(entity: Entity, message: impl Into<String>) -> Self {
        DietError::Configuration {
            entity,
            message: message.into(),
        }
    }

    pub fn capacity(entity: Entity, message: impl Into<String>) -> Self {
        DietError::Capacity {
            entity,
            message: message.into(),
        }
    }

    pub fn entity(&self) -> &Entity {
        match self {
            DietError::Configuration { entity, .. } | DietError::Capacity { entity, .. } => entity,
        }
    }

    pub fn is_configuration(&self) -> bool {
        matches!(self, DietError::Configuration { .. })
    }

    pub fn is_capacity(&self) -> bool {
        matches!(self, DietError::Capacity { .. })
    }
}

impl fmt::Display for DietError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DietError::Configuration { entity, message } => {
                write!(f, "configuration error in {}: {}", entity, message)
            }
            DietError::Capacity { entity, message } => {
                write!(f, "capacity error in {}: {}", entity, message)
            }
        }
    }
}

impl std::error::Error for DietError {}

pub type Result<T> = std::result::Result<T, DietError>;
