use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Reserved character used to compose full names (`<base>_<suffix>`) and
/// value paths. Base names may never contain it.
pub const NAME_DELIMITER: char = '_';

/// Common behaviour of the typed identifier handles.
pub trait Handle: Copy + Eq + std::hash::Hash + std::fmt::Debug + std::fmt::Display {
    /// Generate a fresh random identifier
    fn generate() -> Self;

    /// Underlying UUID
    fn uuid(&self) -> Uuid;
}

macro_rules! define_handle {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(Uuid);

        impl $name {
            /// Wrap an existing UUID
            pub fn from_uuid(uuid: Uuid) -> Self {
                Self(uuid)
            }
        }

        impl Handle for $name {
            fn generate() -> Self {
                Self(Uuid::new_v4())
            }

            fn uuid(&self) -> Uuid {
                self.0
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<Uuid> for $name {
            fn from(uuid: Uuid) -> Self {
                Self(uuid)
            }
        }
    };
}

define_handle!(
    /// Identifier of an element registered in a scheme
    ElementId
);
define_handle!(
    /// Identifier of a port inside an element's in- or out-port set
    PortId
);
define_handle!(
    /// Identifier of a value inside a port or a parameter set
    ValueId
);
define_handle!(
    /// Identifier of a registered connection
    ConnectionId
);

/// Port direction on an element
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    /// In-port, receives values from upstream elements
    Input,
    /// Out-port, publishes values to downstream elements
    Output,
}

impl Direction {
    /// Check if a port of this direction can feed a port of the other direction
    pub fn can_connect_to(&self, other: &Direction) -> bool {
        matches!((self, other), (Direction::Output, Direction::Input))
    }

    /// Numeric flag used in value paths (`0` = in, `1` = out)
    pub fn flag(&self) -> u8 {
        match self {
            Direction::Input => 0,
            Direction::Output => 1,
        }
    }

    pub fn from_flag(flag: u8) -> Option<Self> {
        match flag {
            0 => Some(Direction::Input),
            1 => Some(Direction::Output),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Direction::Input => "input",
            Direction::Output => "output",
        }
    }
}

impl std::fmt::Display for Direction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Reference to a port on a known element, either by base name or by identifier
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PortRef {
    Name(String),
    Id(PortId),
}

impl From<&str> for PortRef {
    fn from(name: &str) -> Self {
        PortRef::Name(name.to_string())
    }
}

impl From<String> for PortRef {
    fn from(name: String) -> Self {
        PortRef::Name(name)
    }
}

impl From<PortId> for PortRef {
    fn from(id: PortId) -> Self {
        PortRef::Id(id)
    }
}

impl std::fmt::Display for PortRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PortRef::Name(name) => write!(f, "'{}'", name),
            PortRef::Id(id) => write!(f, "{}", id),
        }
    }
}

/// Handle for an out-port of a registered element
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OutputPort {
    pub(crate) element_id: ElementId,
    pub(crate) port_id: PortId,
}

impl OutputPort {
    pub fn element_id(&self) -> ElementId {
        self.element_id
    }

    pub fn port_id(&self) -> PortId {
        self.port_id
    }
}

/// Handle for an in-port of a registered element
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InputPort {
    pub(crate) element_id: ElementId,
    pub(crate) port_id: PortId,
}

impl InputPort {
    pub fn element_id(&self) -> ElementId {
        self.element_id
    }

    pub fn port_id(&self) -> PortId {
        self.port_id
    }
}

/// Validate a base name against the delimiter rule
pub fn check_base_name(name: &str) -> crate::core::error::Result<()> {
    if name.is_empty() {
        return Err(crate::core::error::EngineError::InvalidName {
            name: name.to_string(),
            reason: "name is empty".to_string(),
        });
    }
    if name.contains(NAME_DELIMITER) {
        return Err(crate::core::error::EngineError::InvalidName {
            name: name.to_string(),
            reason: format!("base names may not contain '{}'", NAME_DELIMITER),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_direction_connectivity() {
        assert!(Direction::Output.can_connect_to(&Direction::Input));
        assert!(!Direction::Input.can_connect_to(&Direction::Output));
        assert!(!Direction::Output.can_connect_to(&Direction::Output));
    }

    #[test]
    fn test_direction_flags() {
        assert_eq!(Direction::from_flag(0), Some(Direction::Input));
        assert_eq!(Direction::from_flag(1), Some(Direction::Output));
        assert_eq!(Direction::from_flag(2), None);
        assert_eq!(Direction::Output.flag(), 1);
    }

    #[test]
    fn test_handles_are_unique() {
        assert_ne!(ElementId::generate(), ElementId::generate());
    }

    #[test]
    fn test_base_name_rules() {
        assert!(check_base_name("Inlet").is_ok());
        assert!(check_base_name("in_let").is_err());
        assert!(check_base_name("").is_err());
    }
}
