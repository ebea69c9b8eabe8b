use super::payload::{BinaryOp, Payload, PayloadRecord};
use super::status::{ValueSpec, ValueStatus};
use crate::core::error::{EngineError, Result};
use crate::core::repository::{ObjectKind, Registrable};
use crate::core::types::ValueId;
use serde::{Deserialize, Serialize};

/// Comparison operators for dimension-checked value comparison
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompareOp {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
}

/// A named, status-tagged, bounded container for one piece of data.
///
/// Mutated only through [`Value::update`], which validates bounds first and
/// snapshots the previous `(payload, status)` pair before committing.
#[derive(Debug, Clone)]
pub struct Value {
    name: String,
    description: String,
    spec: ValueSpec,
    payload: Option<Payload>,
    status: ValueStatus,
    track_history: bool,
    previous: Option<(Option<Payload>, ValueStatus)>,
    min: Option<f64>,
    max: Option<f64>,
}

impl Value {
    /// Create an empty `Unknown` value with history tracking enabled
    pub fn new(name: &str, spec: ValueSpec) -> Self {
        Self {
            name: name.to_string(),
            description: String::new(),
            spec,
            payload: None,
            status: ValueStatus::Unknown,
            track_history: true,
            previous: Some((None, ValueStatus::Unknown)),
            min: None,
            max: None,
        }
    }

    pub fn with_description(mut self, description: &str) -> Self {
        self.description = description.to_string();
        self
    }

    pub fn with_name(mut self, name: &str) -> Self {
        self.name = name.to_string();
        self
    }

    /// Set bounds and validate the current payload against them
    pub fn with_bounds(mut self, min: Option<f64>, max: Option<f64>) -> Result<Self> {
        self.set_bounds(min, max)?;
        Ok(self)
    }

    /// Set the initial payload and status; the initial state becomes the history slot
    pub fn with_initial(mut self, payload: impl Into<Payload>, status: ValueStatus) -> Result<Self> {
        let payload = payload.into();
        self.check_bounds(Some(&payload))?;
        self.payload = Some(payload);
        self.status = status;
        if self.track_history {
            self.previous = Some((self.payload.clone(), self.status));
        }
        Ok(self)
    }

    pub fn without_history(mut self) -> Self {
        self.set_track_history(false);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn spec(&self) -> &ValueSpec {
        &self.spec
    }

    pub fn dimension(&self) -> Option<&str> {
        self.spec.dimension.as_deref()
    }

    pub fn payload(&self) -> Option<&Payload> {
        self.payload.as_ref()
    }

    pub fn status(&self) -> ValueStatus {
        self.status
    }

    /// Current `(payload, status)` pair
    pub fn state(&self) -> (Option<&Payload>, ValueStatus) {
        (self.payload.as_ref(), self.status)
    }

    pub fn previous_payload(&self) -> Option<&Payload> {
        self.previous.as_ref().and_then(|(payload, _)| payload.as_ref())
    }

    pub fn previous_status(&self) -> Option<ValueStatus> {
        self.previous.as_ref().map(|(_, status)| *status)
    }

    pub fn min(&self) -> Option<f64> {
        self.min
    }

    pub fn max(&self) -> Option<f64> {
        self.max
    }

    pub fn tracks_history(&self) -> bool {
        self.track_history
    }

    pub fn is_known(&self) -> bool {
        self.status.is_known()
    }

    pub fn is_callable(&self) -> bool {
        self.payload.as_ref().map_or(false, Payload::is_callable)
    }

    pub(crate) fn check_bounds(&self, payload: Option<&Payload>) -> Result<()> {
        let Some(components) = payload.and_then(Payload::numeric_components) else {
            return Ok(());
        };

        for component in components {
            if let Some(min) = self.min {
                if component < min {
                    return Err(EngineError::OutOfBounds {
                        name: self.name.clone(),
                        detail: format!("{} is below minimum {}", component, min),
                    });
                }
            }
            if let Some(max) = self.max {
                if component > max {
                    return Err(EngineError::OutOfBounds {
                        name: self.name.clone(),
                        detail: format!("{} is above maximum {}", component, max),
                    });
                }
            }
        }
        Ok(())
    }

    /// Validate, snapshot history, then commit. On a bounds violation nothing changes.
    /// The status is kept when `status` is `None`.
    pub fn update(&mut self, payload: Option<Payload>, status: Option<ValueStatus>) -> Result<()> {
        self.check_bounds(payload.as_ref())?;

        if self.track_history {
            self.previous = Some((self.payload.take(), self.status));
        }

        self.payload = payload;
        if let Some(status) = status {
            self.status = status;
        }
        Ok(())
    }

    /// Convenience over [`Value::update`] with a present payload and an explicit status
    pub fn set(&mut self, payload: impl Into<Payload>, status: ValueStatus) -> Result<()> {
        self.update(Some(payload.into()), Some(status))
    }

    /// Replace bounds; restores the old bounds if the current payload violates the new ones
    pub fn set_bounds(&mut self, min: Option<f64>, max: Option<f64>) -> Result<()> {
        let old = (self.min, self.max);
        self.min = min;
        self.max = max;
        if let Err(err) = self.check_bounds(self.payload.as_ref()) {
            (self.min, self.max) = old;
            return Err(err);
        }
        Ok(())
    }

    pub fn set_track_history(&mut self, flag: bool) {
        self.track_history = flag;
        if !flag {
            self.previous = None;
        } else if self.previous.is_none() {
            self.previous = Some((self.payload.clone(), self.status));
        }
    }

    /// Drop the history slot and re-seed it from the current state
    pub fn reset_history(&mut self) {
        self.previous = None;
        if self.track_history {
            self.previous = Some((self.payload.clone(), self.status));
        }
    }

    /// Difference between current and previous payload, if defined
    pub fn residual(&self) -> Option<Payload> {
        let (previous, previous_status) = self.previous.as_ref()?;
        if *previous_status == ValueStatus::Unknown {
            return None;
        }
        let current = self.payload.as_ref()?;
        current.binary(BinaryOp::Sub, previous.as_ref()?).ok()
    }

    /// Compare payloads of two values of the same spec
    pub fn compare(&self, other: &Value, op: CompareOp) -> Result<bool> {
        if self.spec != other.spec {
            return Err(EngineError::TypeMismatch {
                expected: self.spec.to_string(),
                found: other.spec.to_string(),
            });
        }

        match op {
            CompareOp::Eq => return Ok(self.payload == other.payload),
            CompareOp::Ne => return Ok(self.payload != other.payload),
            _ => {}
        }

        let (Some(lhs), Some(rhs)) = (&self.payload, &other.payload) else {
            return Err(EngineError::unsupported("compare", "both values need a payload"));
        };
        let ordering = lhs.partial_cmp(rhs).ok_or_else(|| {
            EngineError::unsupported(
                "compare",
                format!("{} and {} payloads are not ordered", lhs.kind(), rhs.kind()),
            )
        })?;

        Ok(match op {
            CompareOp::Lt => ordering.is_lt(),
            CompareOp::Le => ordering.is_le(),
            CompareOp::Gt => ordering.is_gt(),
            CompareOp::Ge => ordering.is_ge(),
            CompareOp::Eq | CompareOp::Ne => unreachable!(),
        })
    }

    /// Call a callable payload, or return the payload itself
    pub fn invoke(&self, args: &[Payload]) -> Result<Payload> {
        match &self.payload {
            Some(Payload::Callable(callable)) => callable.call(args),
            Some(other) => Ok(other.clone()),
            None => Err(EngineError::unsupported(
                "invoke",
                format!("value '{}' has no payload", self.name),
            )),
        }
    }

    pub(crate) fn new_derived(spec: ValueSpec, payload: Payload) -> Self {
        Self {
            name: String::new(),
            description: String::new(),
            spec,
            payload: Some(payload),
            status: ValueStatus::Calculated,
            track_history: false,
            previous: None,
            min: None,
            max: None,
        }
    }

    /// Structural export
    pub fn as_record(&self) -> ValueRecord {
        ValueRecord {
            name: self.name.clone(),
            description: self.description.clone(),
            spec: self.spec.clone(),
            payload: self.payload.as_ref().and_then(PayloadRecord::from_payload),
            is_callable: self.is_callable(),
            status: self.status,
            store_prev: self.track_history,
            min: self.min,
            max: self.max,
        }
    }

    /// Rebuild a value from its structural export; history starts from the restored state
    pub fn from_record(record: ValueRecord) -> Result<Self> {
        let mut value = Value::new(&record.name, record.spec)
            .with_description(&record.description)
            .with_bounds(record.min, record.max)?;
        value.update(record.payload.map(PayloadRecord::into_payload), Some(record.status))?;
        value.set_track_history(record.store_prev);
        value.reset_history();
        Ok(value)
    }
}

impl Registrable for Value {
    type Id = ValueId;

    fn kind(&self) -> ObjectKind {
        ObjectKind::Value
    }

    fn name(&self) -> &str {
        &self.name
    }
}

/// Serializable form of a [`Value`]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValueRecord {
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub spec: ValueSpec,
    #[serde(default)]
    pub payload: Option<PayloadRecord>,
    #[serde(default)]
    pub is_callable: bool,
    #[serde(default)]
    pub status: ValueStatus,
    #[serde(default = "default_store_prev")]
    pub store_prev: bool,
    #[serde(default)]
    pub min: Option<f64>,
    #[serde(default)]
    pub max: Option<f64>,
}

fn default_store_prev() -> bool {
    true
}
