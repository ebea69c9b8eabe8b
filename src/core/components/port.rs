use super::access::ValueAccess;
use crate::core::error::{EngineError, Result};
use crate::core::repository::{ObjectKind, ObjectRepository, Registrable};
use crate::core::types::{PortId, ValueId};
use crate::core::values::{PayloadKind, Value, ValueRecord, ValueStatus};
use serde::{Deserialize, Serialize};

/// A named, ordered group of values on one side of an element
#[derive(Debug, Clone)]
pub struct Port {
    name: String,
    values: ObjectRepository<Value>,
}

impl Port {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            values: ObjectRepository::new(ObjectKind::Value),
        }
    }

    /// Port whose values are also reachable as `<value>_<suffix>`
    pub fn with_suffix(name: &str, suffix: &str) -> Self {
        Self {
            name: name.to_string(),
            values: ObjectRepository::with_suffix(ObjectKind::Value, suffix),
        }
    }

    /// Build a port from values, in order
    pub fn from_values(name: &str, values: Vec<Value>) -> Result<Self> {
        let mut port = Port::new(name);
        for value in values {
            port.add_value(value, None)?;
        }
        Ok(port)
    }

    /// Add a value, optionally constraining its payload kind
    pub fn add_value(&mut self, value: Value, type_check: Option<PayloadKind>) -> Result<ValueId> {
        self.add_value_with_id(value, type_check, None)
    }

    pub(crate) fn add_value_with_id(
        &mut self,
        value: Value,
        type_check: Option<PayloadKind>,
        id: Option<ValueId>,
    ) -> Result<ValueId> {
        if let (Some(expected), Some(payload)) = (type_check, value.payload()) {
            if payload.kind() != expected {
                return Err(EngineError::TypeMismatch {
                    expected: expected.to_string(),
                    found: payload.kind().to_string(),
                });
            }
        }
        self.values.register(value, id)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn suffix(&self) -> Option<&str> {
        self.values.suffix()
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn get_value(&self, name: &str) -> Option<&Value> {
        self.values.get_by_name(name)
    }

    pub fn get_value_mut(&mut self, name: &str) -> Option<&mut Value> {
        self.values.get_by_name_mut(name)
    }

    pub fn get_value_by_id(&self, id: ValueId) -> Option<&Value> {
        self.values.get_by_id(id)
    }

    pub fn get_value_by_id_mut(&mut self, id: ValueId) -> Option<&mut Value> {
        self.values.get_by_id_mut(id)
    }

    pub fn value_id(&self, name: &str) -> Option<ValueId> {
        self.values.id_of_name(name)
    }

    pub fn value_ids(&self) -> Vec<ValueId> {
        self.values.ids()
    }

    pub fn value_names(&self) -> Vec<&str> {
        self.values.base_names()
    }

    /// Iterate `(id, value)` in registration order
    pub fn values(&self) -> impl Iterator<Item = (ValueId, &Value)> + '_ {
        self.values.iter()
    }

    /// Names of the values whose status is any of `statuses`
    pub fn list_by_status(&self, statuses: &[ValueStatus]) -> Vec<&str> {
        self.values
            .values()
            .filter(|value| statuses.contains(&value.status()))
            .map(Value::name)
            .collect()
    }

    pub fn list_known(&self) -> Vec<&str> {
        self.values
            .values()
            .filter(|value| value.is_known())
            .map(Value::name)
            .collect()
    }

    pub fn list_unknown(&self) -> Vec<&str> {
        self.list_by_status(&[ValueStatus::Unknown])
    }

    /// True iff no value is left `Unknown`
    pub fn is_calculated(&self) -> bool {
        self.values.values().all(Value::is_known)
    }

    /// Reset `Calculated`/`Depend` values to `Unknown`; `Fixed` only on request
    pub fn reset(&mut self, reset_fixed: bool) -> Result<()> {
        for value in self.values.objects_mut().values_mut() {
            if Self::should_reset(value.status(), reset_fixed) {
                value.update(None, Some(ValueStatus::Unknown))?;
            }
        }
        Ok(())
    }

    pub fn reset_by_names(&mut self, names: &[&str], reset_fixed: bool) -> Result<()> {
        for name in names {
            if let Some(value) = self.values.get_by_name_mut(name) {
                if Self::should_reset(value.status(), reset_fixed) {
                    value.update(None, Some(ValueStatus::Unknown))?;
                }
            }
        }
        Ok(())
    }

    fn should_reset(status: ValueStatus, reset_fixed: bool) -> bool {
        matches!(status, ValueStatus::Calculated | ValueStatus::Depend)
            || (reset_fixed && status == ValueStatus::Fixed)
    }

    pub fn as_record(&self) -> PortRecord {
        PortRecord {
            name: self.name.clone(),
            suffix: self.values.suffix().map(str::to_string),
            values: self
                .values
                .iter()
                .map(|(id, value)| IdentifiedValue {
                    id: Some(id),
                    value: value.as_record(),
                })
                .collect(),
        }
    }

    pub fn from_record(record: PortRecord) -> Result<Self> {
        let mut port = match &record.suffix {
            Some(suffix) => Port::with_suffix(&record.name, suffix),
            None => Port::new(&record.name),
        };
        for entry in record.values {
            port.add_value_with_id(Value::from_record(entry.value)?, None, entry.id)?;
        }
        Ok(port)
    }
}

impl ValueAccess for Port {
    fn lookup(&self, name: &str) -> Option<&Value> {
        self.get_value(name)
    }

    fn lookup_mut(&mut self, name: &str) -> Option<&mut Value> {
        self.get_value_mut(name)
    }
}

/// Structural equality: same value names, each with the same dimension
impl PartialEq for Port {
    fn eq(&self, other: &Self) -> bool {
        self.len() == other.len()
            && self.values.values().all(|value| {
                other
                    .get_value(value.name())
                    .map_or(false, |theirs| theirs.dimension() == value.dimension())
            })
    }
}

impl Registrable for Port {
    type Id = PortId;

    fn kind(&self) -> ObjectKind {
        ObjectKind::Port
    }

    fn name(&self) -> &str {
        &self.name
    }
}

/// A value record together with the identifier it was registered under
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IdentifiedValue {
    #[serde(default)]
    pub id: Option<ValueId>,
    pub value: ValueRecord,
}

/// Serializable form of a [`Port`]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PortRecord {
    pub name: String,
    #[serde(default)]
    pub suffix: Option<String>,
    pub values: Vec<IdentifiedValue>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::values::{Payload, ValueSpec};

    fn flow_port() -> Port {
        let mut port = Port::new("Inlet");
        port.add_value(Value::new("G", ValueSpec::new("mass flow").with_dimension("kg/s")), None)
            .unwrap();
        port.add_value(Value::new("T", ValueSpec::new("temperature").with_dimension("K")), None)
            .unwrap();
        port.add_value(Value::new("P", ValueSpec::new("pressure").with_dimension("bar")), None)
            .unwrap();
        port
    }

    #[test]
    fn test_add_value_rejects_duplicates() {
        let mut port = flow_port();
        let err = port
            .add_value(Value::new("G", ValueSpec::new("mass flow")), None)
            .unwrap_err();
        assert!(matches!(err, EngineError::DuplicateName { .. }));
    }

    #[test]
    fn test_add_value_type_check() {
        let mut port = Port::new("Data");
        let text = Value::new("path", ValueSpec::new("file"))
            .with_initial("data.csv", ValueStatus::Fixed)
            .unwrap();
        let err = port.add_value(text.clone(), Some(PayloadKind::Float)).unwrap_err();
        assert!(matches!(err, EngineError::TypeMismatch { .. }));
        assert!(port.add_value(text, Some(PayloadKind::Text)).is_ok());
    }

    #[test]
    fn test_status_queries() {
        let mut port = flow_port();
        port.set_value_state("G", Some(Payload::Float(2.0)), ValueStatus::Fixed).unwrap();
        port.set_value_state("T", Some(Payload::Float(300.0)), ValueStatus::Calculated)
            .unwrap();

        assert_eq!(port.list_known(), vec!["G", "T"]);
        assert_eq!(port.list_unknown(), vec!["P"]);
        assert_eq!(
            port.list_by_status(&[ValueStatus::Fixed, ValueStatus::Calculated]),
            vec!["G", "T"]
        );
        assert!(!port.is_calculated());
        assert!(port.is_known("G"));
        assert!(!port.is_known("P"));
        assert!(!port.exists("H"));

        port.set_value_state("P", Some(Payload::Float(1.0)), ValueStatus::Depend).unwrap();
        assert!(port.is_calculated());
    }

    #[test]
    fn test_reset_keeps_fixed_by_default() {
        let mut port = flow_port();
        port.set_value_state("G", Some(Payload::Float(2.0)), ValueStatus::Fixed).unwrap();
        port.set_value_state("T", Some(Payload::Float(300.0)), ValueStatus::Calculated)
            .unwrap();
        port.set_value_state("P", Some(Payload::Float(1.0)), ValueStatus::Depend).unwrap();

        port.reset(false).unwrap();
        assert_eq!(port.get_value("G").unwrap().status(), ValueStatus::Fixed);
        assert_eq!(port.get_value("G").unwrap().payload(), Some(&Payload::Float(2.0)));
        assert_eq!(port.get_value("T").unwrap().status(), ValueStatus::Unknown);
        assert_eq!(port.get_value("T").unwrap().payload(), None);
        assert_eq!(port.get_value("P").unwrap().status(), ValueStatus::Unknown);

        port.reset(true).unwrap();
        assert_eq!(port.get_value("G").unwrap().status(), ValueStatus::Unknown);
    }

    #[test]
    fn test_reset_by_names() {
        let mut port = flow_port();
        port.set_value_state("G", Some(Payload::Float(2.0)), ValueStatus::Calculated)
            .unwrap();
        port.set_value_state("T", Some(Payload::Float(300.0)), ValueStatus::Calculated)
            .unwrap();
        port.reset_by_names(&["G"], false).unwrap();
        assert_eq!(port.list_unknown(), vec!["G", "P"]);
    }

    #[test]
    fn test_structural_equality() {
        let a = flow_port();
        let mut b = flow_port();
        assert_eq!(a, b);

        b.add_value(Value::new("H", ValueSpec::new("enthalpy")), None).unwrap();
        assert_ne!(a, b);

        let c = Port::from_values(
            "Other",
            vec![
                Value::new("G", ValueSpec::new("mass flow").with_dimension("kg/s")),
                Value::new("T", ValueSpec::new("temperature").with_dimension("C")),
                Value::new("P", ValueSpec::new("pressure").with_dimension("bar")),
            ],
        )
        .unwrap();
        assert_ne!(a, c);
    }

    #[test]
    fn test_record_preserves_ids_and_order() {
        let port = flow_port();
        let record = port.as_record();
        let restored = Port::from_record(record).unwrap();
        assert_eq!(restored.value_ids(), port.value_ids());
        assert_eq!(restored.value_names(), vec!["G", "T", "P"]);
    }
}
