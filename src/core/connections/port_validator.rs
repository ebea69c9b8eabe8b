use crate::core::components::Element;
use crate::core::error::{EngineError, Result};
use crate::core::types::{Direction, PortId, PortRef};

/// Port validation utilities for elements
pub struct PortValidator;

impl PortValidator {
    /// Resolve a connection source; it must be one of the element's out-ports
    pub fn validate_source_port(element: &Element, port: &PortRef) -> Result<PortId> {
        Self::validate_port(element, port, Direction::Output)
    }

    /// Resolve a connection destination; it must be one of the element's in-ports
    pub fn validate_target_port(element: &Element, port: &PortRef) -> Result<PortId> {
        Self::validate_port(element, port, Direction::Input)
    }

    fn validate_port(element: &Element, port: &PortRef, expected: Direction) -> Result<PortId> {
        let Some((id, actual)) = element.find_port(port) else {
            let valid = match expected {
                Direction::Input => element.in_ports().base_names(),
                Direction::Output => element.out_ports().base_names(),
            };
            return Err(EngineError::not_found(format!(
                "{} port {} on element '{}' (valid {} ports: {:?})",
                expected,
                port,
                element.name(),
                expected,
                valid
            )));
        };

        if actual != expected {
            return Err(EngineError::DirectionMismatch {
                element: element.name().to_string(),
                port: port.to_string(),
                expected: expected.to_string(),
                actual: actual.to_string(),
            });
        }
        Ok(id)
    }
}
