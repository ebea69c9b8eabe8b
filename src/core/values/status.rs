use crate::core::error::{EngineError, Result};
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Knowledge state of a value.
///
/// There is no ordering between statuses; every transition is an explicit
/// `Value::update` or a port reset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ValueStatus {
    /// Nothing is known yet
    #[default]
    Unknown,
    /// Mirrors another value across an edge, not authoritative
    Depend,
    /// Produced by the owning element's own computation
    Calculated,
    /// Supplied by the user, never overwritten by calculation
    Fixed,
}

impl ValueStatus {
    pub const ALL: [ValueStatus; 4] = [
        ValueStatus::Unknown,
        ValueStatus::Depend,
        ValueStatus::Calculated,
        ValueStatus::Fixed,
    ];

    /// Calculated or fixed values are the ones propagation copies from
    pub fn is_authoritative(&self) -> bool {
        matches!(self, ValueStatus::Calculated | ValueStatus::Fixed)
    }

    pub fn is_known(&self) -> bool {
        *self != ValueStatus::Unknown
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ValueStatus::Unknown => "UNKNOWN",
            ValueStatus::Depend => "DEPEND",
            ValueStatus::Calculated => "CALCULATED",
            ValueStatus::Fixed => "FIXED",
        }
    }
}

impl FromStr for ValueStatus {
    type Err = EngineError;

    fn from_str(s: &str) -> Result<Self> {
        let normalized = s.trim().to_uppercase();
        ValueStatus::ALL
            .iter()
            .copied()
            .find(|status| status.as_str() == normalized)
            .ok_or_else(|| EngineError::ParseStatus(s.to_string()))
    }
}

impl std::fmt::Display for ValueStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Semantic type of a quantity (e.g. enthalpy in thermodynamics, `kJ/kg`).
///
/// Compared structurally and only used for compatibility checks.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ValueSpec {
    pub semantic_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub physics_domain: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dimension: Option<String>,
}

impl ValueSpec {
    pub fn new(semantic_name: &str) -> Self {
        Self {
            semantic_name: semantic_name.to_string(),
            physics_domain: None,
            dimension: None,
        }
    }

    /// Spec of a value produced by arithmetic on incompatible operands
    pub fn untyped() -> Self {
        Self::new("")
    }

    pub fn with_domain(mut self, domain: &str) -> Self {
        self.physics_domain = Some(domain.to_string());
        self
    }

    pub fn with_dimension(mut self, dimension: &str) -> Self {
        self.dimension = Some(dimension.to_string());
        self
    }

    /// No dimension, or the explicit unit dimension `1`
    pub fn is_dimensionless(&self) -> bool {
        match self.dimension.as_deref() {
            None => true,
            Some(d) => d.trim().is_empty() || d.trim() == "1",
        }
    }
}

impl std::fmt::Display for ValueSpec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.semantic_name)?;
        if let Some(domain) = &self.physics_domain {
            write!(f, "@{}", domain)?;
        }
        if let Some(dimension) = &self.dimension {
            write!(f, " [{}]", dimension)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_parsing() {
        assert_eq!("fixed".parse::<ValueStatus>().unwrap(), ValueStatus::Fixed);
        assert_eq!(" Calculated ".parse::<ValueStatus>().unwrap(), ValueStatus::Calculated);
        assert!("maybe".parse::<ValueStatus>().is_err());
    }

    #[test]
    fn test_status_default_is_unknown() {
        assert_eq!(ValueStatus::default(), ValueStatus::Unknown);
        assert!(!ValueStatus::Unknown.is_known());
        assert!(ValueStatus::Fixed.is_authoritative());
        assert!(!ValueStatus::Depend.is_authoritative());
    }

    #[test]
    fn test_spec_equality_is_structural() {
        let a = ValueSpec::new("enthalpy").with_domain("thermo").with_dimension("kJ/kg");
        let b = ValueSpec::new("enthalpy").with_domain("thermo").with_dimension("kJ/kg");
        let c = ValueSpec::new("enthalpy").with_dimension("kJ/kg");
        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn test_dimensionless() {
        assert!(ValueSpec::new("ratio").is_dimensionless());
        assert!(ValueSpec::new("ratio").with_dimension("1").is_dimensionless());
        assert!(!ValueSpec::new("mass").with_dimension("kg").is_dimensionless());
    }
}
