use super::connection_validator::ConnectionValidator;
use crate::core::components::{Element, Port, ValueSite};
use crate::core::error::{EngineError, Result};
use crate::core::execution::config::ConflictPolicy;
use crate::core::repository::{ObjectKind, ObjectRepository, Registrable};
use crate::core::types::{ConnectionId, ElementId, InputPort, OutputPort, PortId, ValueId};
use crate::core::values::{Payload, Value, ValueStatus};
use serde::{Deserialize, Serialize};

/// Directed external edge from one element's out-port to another element's in-port.
///
/// Holds identifiers only; both ends are resolved against the element
/// repository on every use, so validity is re-checked rather than cached.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Connection {
    name: String,
    source_element: ElementId,
    source_port: PortId,
    destination_element: ElementId,
    destination_port: PortId,
}

impl Connection {
    pub fn new(name: &str, source: OutputPort, destination: InputPort) -> Self {
        Self {
            name: name.to_string(),
            source_element: source.element_id,
            source_port: source.port_id,
            destination_element: destination.element_id,
            destination_port: destination.port_id,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn source(&self) -> OutputPort {
        OutputPort {
            element_id: self.source_element,
            port_id: self.source_port,
        }
    }

    pub fn destination(&self) -> InputPort {
        InputPort {
            element_id: self.destination_element,
            port_id: self.destination_port,
        }
    }

    pub fn touches(&self, element: ElementId) -> bool {
        self.source_element == element || self.destination_element == element
    }

    fn resolve<'a>(&self, elements: &'a ObjectRepository<Element>) -> Result<(&'a Port, &'a Port)> {
        let source = resolve_port(elements, self.source_element, self.source_port, &self.name)?;
        let destination = resolve_port(
            elements,
            self.destination_element,
            self.destination_port,
            &self.name,
        )?;
        Ok((source, destination))
    }

    /// Check both ends exist and carry the same specs with the same multiplicity.
    ///
    /// With `raise_on_error` unset a failed check returns `Ok(false)`.
    pub fn validate(&self, elements: &ObjectRepository<Element>, raise_on_error: bool) -> Result<bool> {
        let outcome = self
            .resolve(elements)
            .and_then(|(source, destination)| ConnectionValidator::check_compatibility(source, destination));
        match outcome {
            Ok(()) => Ok(true),
            Err(err) if raise_on_error => Err(err),
            Err(err) => {
                log::debug!("connection '{}' is invalid: {}", self.name, err);
                Ok(false)
            }
        }
    }

    /// Mirror authoritative values into `Depend` values across the edge, in both directions.
    /// Returns the number of values whose state changed.
    pub fn propagate(&self, elements: &mut ObjectRepository<Element>, policy: ConflictPolicy) -> Result<usize> {
        let mut plan = Vec::new();
        self.plan(elements, policy, &mut plan)?;
        apply_plan(elements, plan)
    }

    /// Collect the writes `propagate` would make without applying them
    pub(crate) fn plan(
        &self,
        elements: &ObjectRepository<Element>,
        policy: ConflictPolicy,
        plan: &mut Vec<PlannedCopy>,
    ) -> Result<()> {
        let (source, destination) = self.resolve(elements)?;
        for (source_id, destination_id) in ConnectionValidator::pair_by_spec(source, destination) {
            plan_pair(
                PortEnd::new(self.source_element, self.source_port, source, source_id)?,
                PortEnd::new(self.destination_element, self.destination_port, destination, destination_id)?,
                true,
                policy,
                plan,
            )?;
        }
        Ok(())
    }

    pub fn as_record(&self) -> ConnectionRecord {
        ConnectionRecord {
            name: self.name.clone(),
            source_element: self.source_element,
            source_port: self.source_port,
            destination_element: self.destination_element,
            destination_port: self.destination_port,
        }
    }

    pub fn from_record(record: ConnectionRecord) -> Self {
        Self {
            name: record.name,
            source_element: record.source_element,
            source_port: record.source_port,
            destination_element: record.destination_element,
            destination_port: record.destination_port,
        }
    }
}

impl Registrable for Connection {
    type Id = ConnectionId;

    fn kind(&self) -> ObjectKind {
        ObjectKind::Connection
    }

    fn name(&self) -> &str {
        &self.name
    }
}

/// Serializable form of a [`Connection`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectionRecord {
    pub name: String,
    pub source_element: ElementId,
    pub source_port: PortId,
    pub destination_element: ElementId,
    pub destination_port: PortId,
}

pub(crate) fn resolve_port<'a>(
    elements: &'a ObjectRepository<Element>,
    element: ElementId,
    port: PortId,
    context: &str,
) -> Result<&'a Port> {
    let owner = elements.get_by_id(element).ok_or_else(|| {
        EngineError::DanglingReference(format!("'{}' refers to unknown element {}", context, element))
    })?;
    owner.get_port(&port.into()).ok_or_else(|| {
        EngineError::DanglingReference(format!(
            "'{}' refers to unknown port {} on element '{}'",
            context,
            port,
            owner.name()
        ))
    })
}

/// Location of a port value inside the element repository
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct ValueSlot {
    pub element: ElementId,
    pub port: PortId,
    pub value: ValueId,
}

/// One end of a value pair being propagated
pub(crate) struct PortEnd<'a> {
    slot: ValueSlot,
    value: &'a Value,
}

impl<'a> PortEnd<'a> {
    pub(crate) fn new(element: ElementId, port_id: PortId, port: &'a Port, value: ValueId) -> Result<Self> {
        let resolved = port
            .get_value_by_id(value)
            .ok_or_else(|| EngineError::not_found(format!("value {} in port '{}'", value, port.name())))?;
        Ok(Self {
            slot: ValueSlot {
                element,
                port: port_id,
                value,
            },
            value: resolved,
        })
    }
}

/// A pending write: the target becomes `Depend` with the given payload
#[derive(Debug)]
pub(crate) struct PlannedCopy {
    target: ValueSlot,
    payload: Option<Payload>,
}

fn same_payload(a: Option<&Payload>, b: Option<&Payload>) -> bool {
    match (a, b) {
        (Some(a), Some(b)) => a.same_as(b),
        (None, None) => true,
        _ => false,
    }
}

fn mirror(from: &Value, to: &PortEnd<'_>) -> Option<PlannedCopy> {
    if !from.status().is_authoritative() || to.value.status() != ValueStatus::Depend {
        return None;
    }
    if same_payload(to.value.payload(), from.payload()) {
        return None;
    }
    Some(PlannedCopy {
        target: to.slot,
        payload: from.payload().cloned(),
    })
}

/// Apply the status gate to one value pair.
///
/// An authoritative source overwrites a `Depend` destination; the mirrored
/// rule applies when `both_directions` is set. Two authoritative ends never
/// overwrite each other.
pub(crate) fn plan_pair(
    source: PortEnd<'_>,
    destination: PortEnd<'_>,
    both_directions: bool,
    policy: ConflictPolicy,
    plan: &mut Vec<PlannedCopy>,
) -> Result<()> {
    if let Some(copy) = mirror(source.value, &destination) {
        plan.push(copy);
    } else if both_directions {
        if let Some(copy) = mirror(destination.value, &source) {
            plan.push(copy);
        }
    }

    let both_authoritative =
        source.value.status().is_authoritative() && destination.value.status().is_authoritative();
    if policy == ConflictPolicy::Error
        && both_authoritative
        && !same_payload(source.value.payload(), destination.value.payload())
    {
        return Err(EngineError::ConflictingValues {
            source_value: describe(&source),
            destination_value: describe(&destination),
        });
    }
    Ok(())
}

fn describe(end: &PortEnd<'_>) -> String {
    let payload = end
        .value
        .payload()
        .map_or_else(|| "none".to_string(), Payload::describe);
    format!("{} = {} ({})", end.value.name(), payload, end.value.status())
}

/// Commit planned writes. Every write is bounds-checked before any is applied.
pub(crate) fn apply_plan(elements: &mut ObjectRepository<Element>, plan: Vec<PlannedCopy>) -> Result<usize> {
    Ok(apply_plans(elements, vec![plan])?.into_iter().sum())
}

/// Commit several plans as one unit: a bounds failure anywhere leaves every
/// value untouched. Returns the number of values changed per plan; a write
/// already satisfied by an earlier plan in the batch is skipped.
pub(crate) fn apply_plans(
    elements: &mut ObjectRepository<Element>,
    plans: Vec<Vec<PlannedCopy>>,
) -> Result<Vec<usize>> {
    for copy in plans.iter().flatten() {
        target_value(elements, copy.target)?.check_bounds(copy.payload.as_ref())?;
    }

    let mut changed = Vec::with_capacity(plans.len());
    for plan in plans {
        let mut moved = 0;
        for copy in plan {
            let value = target_value_mut(elements, copy.target)?;
            if value.status() == ValueStatus::Depend && same_payload(value.payload(), copy.payload.as_ref()) {
                continue;
            }
            value.update(copy.payload, Some(ValueStatus::Depend))?;
            moved += 1;
        }
        changed.push(moved);
    }
    Ok(changed)
}

fn target_value(elements: &ObjectRepository<Element>, slot: ValueSlot) -> Result<&Value> {
    elements
        .get_by_id(slot.element)
        .and_then(|element| element.get_value_by_id(slot.value, ValueSite::Port(slot.port)))
        .ok_or_else(|| EngineError::not_found(format!("value {}", slot.value)))
}

fn target_value_mut(elements: &mut ObjectRepository<Element>, slot: ValueSlot) -> Result<&mut Value> {
    elements
        .get_by_id_mut(slot.element)
        .and_then(|element| element.get_value_by_id_mut(slot.value, ValueSite::Port(slot.port)))
        .ok_or_else(|| EngineError::not_found(format!("value {}", slot.value)))
}
