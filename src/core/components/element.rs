use super::access::ValuePath;
use super::port::{IdentifiedValue, Port, PortRecord};
use crate::core::error::{EngineError, Result};
use crate::core::repository::{ObjectKind, ObjectRepository, Registrable};
use crate::core::types::{check_base_name, Direction, ElementId, PortId, PortRef, ValueId};
use crate::core::values::{Payload, Value, ValueStatus};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::sync::Arc;

/// Behavior hook bound to an element (setup, calculate, internal-connection update).
/// Receives the owning element and may only mutate that element.
pub type Behavior = Arc<dyn Fn(&mut Element) -> Result<()> + Send + Sync>;

/// Where a value lives inside an element
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueSite {
    Port(PortId),
    Parameter,
}

/// A computation node with in-ports, out-ports, parameters and behavior hooks
#[derive(Clone)]
pub struct Element {
    name: String,
    description: String,
    in_ports: ObjectRepository<Port>,
    out_ports: ObjectRepository<Port>,
    parameters: ObjectRepository<Value>,
    internal_groups: Vec<Vec<PortId>>,
    calculate: Option<Behavior>,
    update_internal: Option<Behavior>,
}

impl Element {
    pub fn builder(name: &str) -> ElementBuilder {
        ElementBuilder::new(name)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn in_ports(&self) -> &ObjectRepository<Port> {
        &self.in_ports
    }

    pub fn out_ports(&self) -> &ObjectRepository<Port> {
        &self.out_ports
    }

    pub fn parameters(&self) -> &ObjectRepository<Value> {
        &self.parameters
    }

    pub(crate) fn parameters_mut(&mut self) -> &mut ObjectRepository<Value> {
        &mut self.parameters
    }

    fn ports(&self, direction: Direction) -> &ObjectRepository<Port> {
        match direction {
            Direction::Input => &self.in_ports,
            Direction::Output => &self.out_ports,
        }
    }

    fn ports_mut(&mut self, direction: Direction) -> &mut ObjectRepository<Port> {
        match direction {
            Direction::Input => &mut self.in_ports,
            Direction::Output => &mut self.out_ports,
        }
    }

    /// Direction of one of this element's ports
    pub fn port_direction(&self, id: PortId) -> Option<Direction> {
        if self.in_ports.contains_id(id) {
            Some(Direction::Input)
        } else if self.out_ports.contains_id(id) {
            Some(Direction::Output)
        } else {
            None
        }
    }

    /// Resolve a port reference; names are searched among in-ports first
    pub fn find_port(&self, port: &PortRef) -> Option<(PortId, Direction)> {
        match port {
            PortRef::Id(id) => self.port_direction(*id).map(|direction| (*id, direction)),
            PortRef::Name(name) => [Direction::Input, Direction::Output]
                .into_iter()
                .find_map(|direction| {
                    self.ports(direction)
                        .id_of_name(name)
                        .map(|id| (id, direction))
                }),
        }
    }

    pub fn get_port(&self, port: &PortRef) -> Option<&Port> {
        let (id, direction) = self.find_port(port)?;
        self.ports(direction).get_by_id(id)
    }

    pub fn get_port_mut(&mut self, port: &PortRef) -> Option<&mut Port> {
        let (id, direction) = self.find_port(port)?;
        self.ports_mut(direction).get_by_id_mut(id)
    }

    pub fn in_port_mut(&mut self, name: &str) -> Option<&mut Port> {
        self.in_ports.get_by_name_mut(name)
    }

    pub fn out_port_mut(&mut self, name: &str) -> Option<&mut Port> {
        self.out_ports.get_by_name_mut(name)
    }

    /// Port at a position within the in- or out-port set
    pub fn port_at(&self, direction: Direction, index: usize) -> Option<&Port> {
        self.ports(direction).get_by_index(index)
    }

    /// In-port ids followed by out-port ids, each in registration order
    pub fn all_port_ids(&self) -> Vec<(PortId, Direction)> {
        let inputs = self.in_ports.ids().into_iter().map(|id| (id, Direction::Input));
        let outputs = self.out_ports.ids().into_iter().map(|id| (id, Direction::Output));
        inputs.chain(outputs).collect()
    }

    /// Every value id owned by this element with its location
    pub fn all_value_ids(&self) -> Vec<(ValueId, ValueSite)> {
        let mut ids = Vec::new();
        for (port_id, _) in self.all_port_ids() {
            if let Some(port) = self.get_port(&PortRef::Id(port_id)) {
                ids.extend(port.value_ids().into_iter().map(|id| (id, ValueSite::Port(port_id))));
            }
        }
        ids.extend(self.parameters.ids().into_iter().map(|id| (id, ValueSite::Parameter)));
        ids
    }

    pub fn get_value_by_id(&self, id: ValueId, site: ValueSite) -> Option<&Value> {
        match site {
            ValueSite::Parameter => self.parameters.get_by_id(id),
            ValueSite::Port(port_id) => self.get_port(&PortRef::Id(port_id))?.get_value_by_id(id),
        }
    }

    pub fn get_value_by_id_mut(&mut self, id: ValueId, site: ValueSite) -> Option<&mut Value> {
        match site {
            ValueSite::Parameter => self.parameters.get_by_id_mut(id),
            ValueSite::Port(port_id) => self
                .get_port_mut(&PortRef::Id(port_id))?
                .get_value_by_id_mut(id),
        }
    }

    fn locate(&self, path: &ValuePath) -> Option<(ValueId, ValueSite)> {
        match path {
            ValuePath::Parameter(name) => self
                .parameters
                .id_of_name(name)
                .map(|id| (id, ValueSite::Parameter)),
            ValuePath::Indexed {
                value,
                direction,
                index,
            } => {
                let port_id = self.ports(*direction).id_at(*index)?;
                let port = self.ports(*direction).get_by_id(port_id)?;
                port.value_id(value).map(|id| (id, ValueSite::Port(port_id)))
            }
            ValuePath::Named { value, port } => {
                let (port_id, _) = self.find_port(&PortRef::Name(port.clone()))?;
                let port = self.get_port(&PortRef::Id(port_id))?;
                port.value_id(value).map(|id| (id, ValueSite::Port(port_id)))
            }
        }
    }

    pub fn resolve_path(&self, path: &ValuePath) -> Option<&Value> {
        let (id, site) = self.locate(path)?;
        self.get_value_by_id(id, site)
    }

    pub fn resolve_path_mut(&mut self, path: &ValuePath) -> Option<&mut Value> {
        let (id, site) = self.locate(path)?;
        self.get_value_by_id_mut(id, site)
    }

    /// Resolve a flat name: parameter, then `<value>_<flag>_<index>`, then `<value>_<port>`
    pub fn resolve(&self, name: &str) -> Option<&Value> {
        ValuePath::candidates(name)
            .iter()
            .find_map(|path| self.resolve_path(path))
    }

    pub fn resolve_mut(&mut self, name: &str) -> Option<&mut Value> {
        let (id, site) = ValuePath::candidates(name)
            .iter()
            .find_map(|path| self.locate(path))?;
        self.get_value_by_id_mut(id, site)
    }

    /// Like [`Element::resolve`] but unmatched names are an error
    pub fn require(&self, name: &str) -> Result<&Value> {
        self.resolve(name).ok_or_else(|| {
            EngineError::not_found(format!("'{}' in element '{}'", name, self.name))
        })
    }

    /// Update a value addressed by a flat name
    pub fn set(&mut self, name: &str, payload: impl Into<Payload>, status: ValueStatus) -> Result<()> {
        let element = self.name.clone();
        self.resolve_mut(name)
            .ok_or_else(|| EngineError::not_found(format!("'{}' in element '{}'", name, element)))?
            .set(payload, status)
    }

    pub fn internal_groups(&self) -> &[Vec<PortId>] {
        &self.internal_groups
    }

    /// Replace the internal connection groups; every id must be one of this element's ports
    pub fn set_internal_groups(&mut self, groups: Vec<Vec<PortId>>) -> Result<()> {
        for id in groups.iter().flatten() {
            if self.port_direction(*id).is_none() {
                return Err(EngineError::not_found(format!(
                    "port {} in element '{}'",
                    id, self.name
                )));
            }
        }
        self.internal_groups = groups;
        Ok(())
    }

    pub fn set_internal_groups_by_name(&mut self, groups: &[Vec<&str>]) -> Result<()> {
        let resolved = resolve_groups(self, groups)?;
        self.internal_groups = resolved;
        Ok(())
    }

    pub fn has_calculate(&self) -> bool {
        self.calculate.is_some()
    }

    pub fn has_update_internal_connections(&self) -> bool {
        self.update_internal.is_some()
    }

    pub fn set_calculate<F>(&mut self, func: F)
    where
        F: Fn(&mut Element) -> Result<()> + Send + Sync + 'static,
    {
        self.calculate = Some(Arc::new(func));
    }

    pub fn set_update_internal_connections<F>(&mut self, func: F)
    where
        F: Fn(&mut Element) -> Result<()> + Send + Sync + 'static,
    {
        self.update_internal = Some(Arc::new(func));
    }

    /// Run the calculate hook
    pub fn calculate(&mut self) -> Result<()> {
        let hook = self.calculate.clone().ok_or_else(|| EngineError::NotImplemented {
            element: self.name.clone(),
            hook: "calculate".to_string(),
        })?;
        hook(self)
    }

    /// Run the internal-connection update hook
    pub fn update_internal_connections(&mut self) -> Result<()> {
        let hook = self.update_internal.clone().ok_or_else(|| EngineError::NotImplemented {
            element: self.name.clone(),
            hook: "update_internal_connections".to_string(),
        })?;
        hook(self)
    }

    pub fn as_record(&self) -> ElementRecord {
        let ports = |repo: &ObjectRepository<Port>| {
            repo.iter()
                .map(|(id, port)| IdentifiedPort {
                    id: Some(id),
                    port: port.as_record(),
                })
                .collect()
        };
        ElementRecord {
            name: self.name.clone(),
            description: self.description.clone(),
            in_ports: ports(&self.in_ports),
            out_ports: ports(&self.out_ports),
            parameters: self
                .parameters
                .iter()
                .map(|(id, value)| IdentifiedValue {
                    id: Some(id),
                    value: value.as_record(),
                })
                .collect(),
            internal_groups: self.internal_groups.clone(),
        }
    }

    /// Rebuild an element without behaviors; identifiers are preserved
    pub fn from_record(record: ElementRecord) -> Result<Self> {
        let mut builder = Element::builder(&record.name).description(&record.description);
        for entry in record.in_ports {
            builder.in_ports.push((Port::from_record(entry.port)?, entry.id));
        }
        for entry in record.out_ports {
            builder.out_ports.push((Port::from_record(entry.port)?, entry.id));
        }
        for entry in record.parameters {
            builder.parameters.push((Value::from_record(entry.value)?, entry.id));
        }
        let mut element = builder.build()?;
        element.set_internal_groups(record.internal_groups)?;
        Ok(element)
    }
}

impl Registrable for Element {
    type Id = ElementId;

    fn kind(&self) -> ObjectKind {
        ObjectKind::Element
    }

    fn name(&self) -> &str {
        &self.name
    }
}

impl std::fmt::Debug for Element {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Element")
            .field("name", &self.name)
            .field("in", &self.in_ports.base_names())
            .field("out", &self.out_ports.base_names())
            .field("params", &self.parameters.base_names())
            .field("calculate", &self.calculate.is_some())
            .finish()
    }
}

fn resolve_groups(element: &Element, groups: &[Vec<&str>]) -> Result<Vec<Vec<PortId>>> {
    groups
        .iter()
        .map(|group| {
            group
                .iter()
                .map(|name| {
                    element
                        .find_port(&PortRef::from(*name))
                        .map(|(id, _)| id)
                        .ok_or_else(|| {
                            EngineError::not_found(format!(
                                "port '{}' in element '{}'",
                                name, element.name
                            ))
                        })
                })
                .collect()
        })
        .collect()
}

/// Assembles an element with its ports and parameters fully populated,
/// then runs `setup` once.
pub struct ElementBuilder {
    name: String,
    description: String,
    in_ports: Vec<(Port, Option<PortId>)>,
    out_ports: Vec<(Port, Option<PortId>)>,
    parameters: Vec<(Value, Option<ValueId>)>,
    internal_groups: Vec<Vec<String>>,
    setup: Option<Behavior>,
    calculate: Option<Behavior>,
    update_internal: Option<Behavior>,
}

impl ElementBuilder {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            description: String::new(),
            in_ports: Vec::new(),
            out_ports: Vec::new(),
            parameters: Vec::new(),
            internal_groups: Vec::new(),
            setup: None,
            calculate: None,
            update_internal: None,
        }
    }

    pub fn description(mut self, description: &str) -> Self {
        self.description = description.to_string();
        self
    }

    pub fn in_port(mut self, port: Port) -> Self {
        self.in_ports.push((port, None));
        self
    }

    pub fn out_port(mut self, port: Port) -> Self {
        self.out_ports.push((port, None));
        self
    }

    pub fn parameter(mut self, value: Value) -> Self {
        self.parameters.push((value, None));
        self
    }

    /// Declare a group of ports (by name) treated as internally linked
    pub fn internal_group(mut self, ports: &[&str]) -> Self {
        self.internal_groups
            .push(ports.iter().map(|name| name.to_string()).collect());
        self
    }

    pub fn setup<F>(mut self, func: F) -> Self
    where
        F: Fn(&mut Element) -> Result<()> + Send + Sync + 'static,
    {
        self.setup = Some(Arc::new(func));
        self
    }

    pub fn calculate<F>(mut self, func: F) -> Self
    where
        F: Fn(&mut Element) -> Result<()> + Send + Sync + 'static,
    {
        self.calculate = Some(Arc::new(func));
        self
    }

    pub fn update_internal_connections<F>(mut self, func: F) -> Self
    where
        F: Fn(&mut Element) -> Result<()> + Send + Sync + 'static,
    {
        self.update_internal = Some(Arc::new(func));
        self
    }

    pub fn build(self) -> Result<Element> {
        check_base_name(&self.name)?;

        let mut seen = HashSet::new();
        let names = self
            .in_ports
            .iter()
            .map(|(port, _)| port.name())
            .chain(self.out_ports.iter().map(|(port, _)| port.name()))
            .chain(self.parameters.iter().map(|(value, _)| value.name()));
        for name in names {
            if !seen.insert(name.to_string()) {
                return Err(EngineError::DuplicateName {
                    name: name.to_string(),
                    repository: format!("element '{}'", self.name),
                });
            }
        }

        let mut element = Element {
            name: self.name.clone(),
            description: self.description,
            in_ports: ObjectRepository::with_suffix(ObjectKind::Port, &self.name),
            out_ports: ObjectRepository::with_suffix(ObjectKind::Port, &self.name),
            parameters: ObjectRepository::with_suffix(ObjectKind::Value, &self.name),
            internal_groups: Vec::new(),
            calculate: self.calculate,
            update_internal: self.update_internal,
        };

        for (port, id) in self.in_ports {
            element.in_ports.register(port, id)?;
        }
        for (port, id) in self.out_ports {
            element.out_ports.register(port, id)?;
        }
        for (value, id) in self.parameters {
            element.parameters.register(value, id)?;
        }

        let groups: Vec<Vec<&str>> = self
            .internal_groups
            .iter()
            .map(|group| group.iter().map(String::as_str).collect())
            .collect();
        element.internal_groups = resolve_groups(&element, &groups)?;

        if let Some(setup) = self.setup {
            setup(&mut element)?;
        }
        Ok(element)
    }
}

/// A port record together with the identifier it was registered under
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IdentifiedPort {
    #[serde(default)]
    pub id: Option<PortId>,
    pub port: PortRecord,
}

/// Serializable form of an [`Element`]; behaviors are not part of it
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ElementRecord {
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub in_ports: Vec<IdentifiedPort>,
    #[serde(default)]
    pub out_ports: Vec<IdentifiedPort>,
    #[serde(default)]
    pub parameters: Vec<IdentifiedValue>,
    #[serde(default)]
    pub internal_groups: Vec<Vec<PortId>>,
}
