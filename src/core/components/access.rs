use crate::core::error::{EngineError, Result};
use crate::core::repository::ObjectRepository;
use crate::core::types::{Direction, NAME_DELIMITER};
use crate::core::values::{Payload, Value, ValueStatus};

/// Name-based read/write access over a collection of values.
///
/// Implemented by ports and parameter sets so precondition helpers can be
/// built outside the engine without reaching into internals.
pub trait ValueAccess {
    fn lookup(&self, name: &str) -> Option<&Value>;

    fn lookup_mut(&mut self, name: &str) -> Option<&mut Value>;

    fn exists(&self, name: &str) -> bool {
        self.lookup(name).is_some()
    }

    /// True when the value exists and its status is not `Unknown`
    fn is_known(&self, name: &str) -> bool {
        self.lookup(name).map_or(false, Value::is_known)
    }

    fn get(&self, name: &str) -> Result<&Value> {
        self.lookup(name)
            .ok_or_else(|| EngineError::not_found(format!("value '{}'", name)))
    }

    fn get_value_state(&self, name: &str) -> Option<(Option<&Payload>, ValueStatus)> {
        self.lookup(name).map(Value::state)
    }

    fn set_value_state(
        &mut self,
        name: &str,
        payload: Option<Payload>,
        status: ValueStatus,
    ) -> Result<()> {
        self.lookup_mut(name)
            .ok_or_else(|| EngineError::not_found(format!("value '{}'", name)))?
            .update(payload, Some(status))
    }
}

impl ValueAccess for ObjectRepository<Value> {
    fn lookup(&self, name: &str) -> Option<&Value> {
        self.get_by_name(name)
    }

    fn lookup_mut(&mut self, name: &str) -> Option<&mut Value> {
        self.get_by_name_mut(name)
    }
}

/// Structured address of a value inside an element
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValuePath {
    /// Element parameter
    Parameter(String),
    /// Value in the port at `index` of the given direction
    Indexed {
        value: String,
        direction: Direction,
        index: usize,
    },
    /// Value in the named port (in-ports searched first)
    Named { value: String, port: String },
}

impl ValuePath {
    /// Candidate interpretations of a flat name, in resolution order:
    /// parameter, `<value>_<flag>_<index>`, `<value>_<port>`.
    pub fn candidates(name: &str) -> Vec<ValuePath> {
        let mut paths = vec![ValuePath::Parameter(name.to_string())];
        let parts: Vec<&str> = name.split(NAME_DELIMITER).collect();

        if let [value, flag, index] = parts.as_slice() {
            let direction = flag.parse::<u8>().ok().and_then(Direction::from_flag);
            if let (Some(direction), Ok(index)) = (direction, index.parse::<usize>()) {
                if !value.is_empty() {
                    paths.push(ValuePath::Indexed {
                        value: value.to_string(),
                        direction,
                        index,
                    });
                }
            }
        }

        if let [value, port] = parts.as_slice() {
            if !value.is_empty() && !port.is_empty() {
                paths.push(ValuePath::Named {
                    value: value.to_string(),
                    port: port.to_string(),
                });
            }
        }

        paths
    }
}

impl std::fmt::Display for ValuePath {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ValuePath::Parameter(name) => write!(f, "{}", name),
            ValuePath::Indexed {
                value,
                direction,
                index,
            } => write!(f, "{}_{}_{}", value, direction.flag(), index),
            ValuePath::Named { value, port } => write!(f, "{}_{}", value, port),
        }
    }
}
