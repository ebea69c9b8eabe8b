use super::config::{ConcurrencyMode, CyclePolicy, EngineConfig};
use super::execution_order::ExecutionOrderBuilder;
use super::port_graph::{PortEdge, PortGraph};
use crate::core::components::{Element, ElementRecord, Port, ValueSite};
use crate::core::connections::connection::{apply_plans, plan_pair, resolve_port, PlannedCopy, PortEnd};
use crate::core::connections::{Connection, ConnectionRecord, ConnectionValidator, PortValidator};
use crate::core::error::{EngineError, Result};
use crate::core::repository::{ObjectKind, ObjectRepository};
use crate::core::types::{
    ConnectionId, Direction, ElementId, InputPort, OutputPort, PortId, PortRef, ValueId,
};
use crate::core::values::{Payload, Value, ValueStatus};
use log::{debug, trace, warn};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use uuid::Uuid;

/// Any object reachable from a scheme by identifier
#[derive(Debug, Clone, Copy)]
pub enum SchemeObject<'a> {
    Port {
        element: ElementId,
        direction: Direction,
        port: &'a Port,
    },
    Value {
        element: ElementId,
        value: &'a Value,
    },
    Element(&'a Element),
    Connection(&'a Connection),
}

/// Element order derived from the external edges
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecutionOrder {
    /// Topological stages; one element per stage in registration order when cyclic
    pub stages: Vec<Vec<ElementId>>,
    /// Elements that could not be ordered; empty for an acyclic graph
    pub cycle: Vec<ElementId>,
}

impl ExecutionOrder {
    pub fn is_cyclic(&self) -> bool {
        !self.cycle.is_empty()
    }

    pub fn flatten(&self) -> Vec<ElementId> {
        self.stages.iter().flatten().copied().collect()
    }
}

/// Summary of one `run_calculations` call
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunReport {
    /// Order elements were executed in (one sweep)
    pub order: Vec<ElementId>,
    pub cycle_detected: bool,
    /// Elements whose calculate behavior ran
    pub executed: usize,
    /// Elements without a calculate behavior
    pub skipped: usize,
    pub sweeps: usize,
    /// Edges changed by propagation, summed over all passes
    pub propagated: usize,
}

#[derive(Debug, Clone, Copy)]
struct StepOutcome {
    executed: bool,
    regrouped: bool,
}

fn run_behaviors(element: &mut Element) -> Result<StepOutcome> {
    let executed = match element.calculate() {
        Ok(()) => true,
        Err(err) if err.is_not_implemented() => {
            trace!("element '{}' has no calculate behavior, passing through", element.name());
            false
        }
        Err(err) => return Err(err),
    };

    let regrouped = element.has_update_internal_connections();
    if regrouped {
        element.update_internal_connections()?;
    }
    Ok(StepOutcome { executed, regrouped })
}

fn run_stage(
    elements: &mut HashMap<ElementId, Element>,
    members: &HashSet<ElementId>,
) -> HashMap<ElementId, Result<StepOutcome>> {
    elements
        .par_iter_mut()
        .filter(|(id, _)| members.contains(*id))
        .map(|(id, element)| (*id, run_behaviors(element)))
        .collect()
}

fn port_set(element: &Element) -> HashSet<PortId> {
    element.all_port_ids().into_iter().map(|(id, _)| id).collect()
}

/// Edges from every in-port to every out-port of each internal group
fn internal_edges(element: &Element) -> Vec<PortEdge> {
    let mut edges = Vec::new();
    for group in element.internal_groups() {
        let with_direction = |direction| {
            group
                .iter()
                .filter(move |port| element.port_direction(**port) == Some(direction))
        };
        for from in with_direction(Direction::Input) {
            for to in with_direction(Direction::Output) {
                edges.push(PortEdge::internal(*from, *to));
            }
        }
    }
    edges
}

/// Top-level graph of elements and connections, and the execution driver.
///
/// The scheme owns every element; connections and callers refer to
/// elements, ports and values by identifier only.
#[derive(Debug, Clone)]
pub struct Scheme {
    name: String,
    config: EngineConfig,
    elements: ObjectRepository<Element>,
    connections: ObjectRepository<Connection>,
    graph: PortGraph,
    port_index: HashMap<PortId, (ElementId, Direction)>,
    value_index: HashMap<ValueId, (ElementId, ValueSite)>,
    name_counter: usize,
}

impl Scheme {
    pub fn new(name: &str) -> Self {
        Self::with_config(name, EngineConfig::default())
    }

    pub fn with_config(name: &str, config: EngineConfig) -> Self {
        Self {
            name: name.to_string(),
            config,
            elements: ObjectRepository::new(ObjectKind::Element),
            connections: ObjectRepository::new(ObjectKind::Connection),
            graph: PortGraph::new(),
            port_index: HashMap::new(),
            value_index: HashMap::new(),
            name_counter: 0,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn set_config(&mut self, config: EngineConfig) {
        self.config = config;
    }

    pub fn elements(&self) -> &ObjectRepository<Element> {
        &self.elements
    }

    pub fn connections(&self) -> &ObjectRepository<Connection> {
        &self.connections
    }

    pub fn graph(&self) -> &PortGraph {
        &self.graph
    }

    /// Next unused name `<prefix><n>` from the scheme-owned counter
    pub fn unique_name(&mut self, prefix: &str) -> String {
        loop {
            self.name_counter += 1;
            let candidate = format!("{}{}", prefix, self.name_counter);
            if !self.connections.contains_name(&candidate) && !self.elements.contains_name(&candidate) {
                return candidate;
            }
        }
    }

    // ---- elements ----

    /// Register an element, index its ports and values and add its internal edges
    pub fn add_element(&mut self, element: Element) -> Result<ElementId> {
        self.insert_element(element, None)
    }

    fn insert_element(&mut self, element: Element, id: Option<ElementId>) -> Result<ElementId> {
        let repository = format!("scheme '{}'", self.name);
        for (port_id, _) in element.all_port_ids() {
            if self.port_index.contains_key(&port_id) {
                return Err(EngineError::DuplicateId {
                    id: port_id.to_string(),
                    repository,
                });
            }
        }
        for (value_id, _) in element.all_value_ids() {
            if self.value_index.contains_key(&value_id) {
                return Err(EngineError::DuplicateId {
                    id: value_id.to_string(),
                    repository,
                });
            }
        }

        let id = self.elements.register(element, id)?;
        self.index_element(id)?;
        debug!("registered element '{}' ({}) in scheme '{}'", self.element_name(id), id, self.name);
        Ok(id)
    }

    fn index_element(&mut self, id: ElementId) -> Result<()> {
        let element = self.elements.get_by_id(id).ok_or_else(|| EngineError::not_found(format!("element {}", id)))?;
        for (port_id, direction) in element.all_port_ids() {
            self.port_index.insert(port_id, (id, direction));
            self.graph.add_node(port_id);
        }
        for (value_id, site) in element.all_value_ids() {
            self.value_index.insert(value_id, (id, site));
        }
        self.graph.replace_internal_edges(&port_set(element), internal_edges(element));
        Ok(())
    }

    /// Index values added since registration; ports never drop values
    fn reindex_values(&mut self, id: ElementId) -> Result<()> {
        let element = self
            .elements
            .get_by_id(id)
            .ok_or_else(|| EngineError::not_found(format!("element {}", id)))?;
        for (value_id, site) in element.all_value_ids() {
            self.value_index.insert(value_id, (id, site));
        }
        Ok(())
    }

    fn unindex_element(&mut self, id: ElementId) {
        self.port_index.retain(|_, (owner, _)| *owner != id);
        self.value_index.retain(|_, (owner, _)| *owner != id);
    }

    fn rebuild_internal_edges(&mut self, id: ElementId) -> Result<()> {
        let element = self
            .elements
            .get_by_id(id)
            .ok_or_else(|| EngineError::not_found(format!("element {}", id)))?;
        self.graph.replace_internal_edges(&port_set(element), internal_edges(element));
        Ok(())
    }

    /// Remove an element along with its ports, values, graph nodes and every connection touching it
    pub fn remove_element(&mut self, id: ElementId) -> Result<Element> {
        let ports = port_set(self.element_or_err(id)?);
        let touching: Vec<ConnectionId> = self
            .connections
            .iter()
            .filter(|(_, connection)| connection.touches(id))
            .map(|(connection_id, _)| connection_id)
            .collect();
        for connection_id in touching {
            self.connections.remove(connection_id);
        }

        self.graph.remove_nodes(&ports);
        self.unindex_element(id);
        let element = self
            .elements
            .remove(id)
            .ok_or_else(|| EngineError::not_found(format!("element {}", id)))?;
        debug!("removed element '{}' from scheme '{}'", element.name(), self.name);
        Ok(element)
    }

    pub fn element(&self, id: ElementId) -> Option<&Element> {
        self.elements.get_by_id(id)
    }

    pub fn element_by_name(&self, name: &str) -> Option<&Element> {
        self.elements.get_by_name(name)
    }

    pub fn element_id(&self, name: &str) -> Option<ElementId> {
        self.elements.id_of_name(name)
    }

    fn element_or_err(&self, id: ElementId) -> Result<&Element> {
        self.elements
            .get_by_id(id)
            .ok_or_else(|| EngineError::not_found(format!("element {}", id)))
    }

    fn element_id_or_err(&self, name: &str) -> Result<ElementId> {
        self.element_id(name)
            .ok_or_else(|| EngineError::not_found(format!("element '{}'", name)))
    }

    fn element_name(&self, id: ElementId) -> String {
        self.elements
            .get_by_id(id)
            .map_or_else(|| id.to_string(), |element| element.name().to_string())
    }

    /// Mutate an element in place; its values and internal edges are re-indexed afterwards
    pub fn update_element<F, R>(&mut self, id: ElementId, f: F) -> Result<R>
    where
        F: FnOnce(&mut Element) -> R,
    {
        let element = self
            .elements
            .get_by_id_mut(id)
            .ok_or_else(|| EngineError::not_found(format!("element {}", id)))?;
        let result = f(element);
        self.unindex_element(id);
        self.index_element(id)?;
        Ok(result)
    }

    // ---- connections ----

    /// Handle for an out-port, checking the port's direction
    pub fn output_port(&self, element: ElementId, port: impl Into<PortRef>) -> Result<OutputPort> {
        let port_id = PortValidator::validate_source_port(self.element_or_err(element)?, &port.into())?;
        Ok(OutputPort {
            element_id: element,
            port_id,
        })
    }

    /// Handle for an in-port, checking the port's direction
    pub fn input_port(&self, element: ElementId, port: impl Into<PortRef>) -> Result<InputPort> {
        let port_id = PortValidator::validate_target_port(self.element_or_err(element)?, &port.into())?;
        Ok(InputPort {
            element_id: element,
            port_id,
        })
    }

    /// Connect an out-port of `source` to an in-port of `destination`; ports by name or id
    pub fn connect(
        &mut self,
        source: ElementId,
        source_port: impl Into<PortRef>,
        destination: ElementId,
        destination_port: impl Into<PortRef>,
    ) -> Result<ConnectionId> {
        let source = self.output_port(source, source_port)?;
        let destination = self.input_port(destination, destination_port)?;
        self.connect_ports(source, destination)
    }

    pub fn connect_by_names(
        &mut self,
        source: &str,
        source_port: &str,
        destination: &str,
        destination_port: &str,
    ) -> Result<ConnectionId> {
        let source = self.element_id_or_err(source)?;
        let destination = self.element_id_or_err(destination)?;
        self.connect(source, source_port, destination, destination_port)
    }

    /// Connect two port handles under a generated name
    pub fn connect_ports(&mut self, source: OutputPort, destination: InputPort) -> Result<ConnectionId> {
        let name = self.unique_name("conn");
        self.connect_named(&name, source, destination)
    }

    pub fn connect_named(&mut self, name: &str, source: OutputPort, destination: InputPort) -> Result<ConnectionId> {
        let connection = Connection::new(name, source, destination);
        connection.validate(&self.elements, true)?;
        self.insert_connection(connection, None)
    }

    fn insert_connection(&mut self, connection: Connection, id: Option<ConnectionId>) -> Result<ConnectionId> {
        let source = connection.source().port_id();
        let destination = connection.destination().port_id();
        let id = self.connections.register(connection, id)?;
        self.graph.add_edge(PortEdge::external(source, destination, Some(id)));
        debug!("registered connection {} in scheme '{}'", self.describe_connection(id), self.name);
        Ok(id)
    }

    /// Direct port-to-port edge without a connection record; the ports must be
    /// structurally equal and values are paired by name during propagation
    pub fn link_ports(&mut self, source: OutputPort, destination: InputPort) -> Result<()> {
        let from = resolve_port(&self.elements, source.element_id, source.port_id, "link")?;
        let to = resolve_port(&self.elements, destination.element_id, destination.port_id, "link")?;
        if from != to {
            return Err(EngineError::TypeMismatch {
                expected: format!("port with the values of '{}' {:?}", from.name(), from.value_names()),
                found: format!("'{}' {:?}", to.name(), to.value_names()),
            });
        }
        self.graph
            .add_edge(PortEdge::external(source.port_id, destination.port_id, None));
        Ok(())
    }

    pub fn remove_connection(&mut self, id: ConnectionId) -> Option<Connection> {
        self.graph.remove_connection(id);
        self.connections.remove(id)
    }

    pub fn connection(&self, id: ConnectionId) -> Option<&Connection> {
        self.connections.get_by_id(id)
    }

    /// Re-check every registered connection against the current elements
    pub fn validate_connections(&self) -> Result<()> {
        for connection in self.connections.values() {
            connection.validate(&self.elements, true)?;
        }
        Ok(())
    }

    // ---- lookups ----

    pub fn port(&self, id: PortId) -> Option<(ElementId, Direction, &Port)> {
        let (element, direction) = *self.port_index.get(&id)?;
        let port = self.elements.get_by_id(element)?.get_port(&PortRef::Id(id))?;
        Some((element, direction, port))
    }

    pub fn value(&self, id: ValueId) -> Option<&Value> {
        let (element, site) = *self.value_index.get(&id)?;
        self.elements.get_by_id(element)?.get_value_by_id(id, site)
    }

    /// Resolve an identifier of any kind: port, then value, then element, then connection
    pub fn get_object_by_id(&self, id: Uuid) -> Option<SchemeObject<'_>> {
        if let Some((element, direction, port)) = self.port(PortId::from_uuid(id)) {
            return Some(SchemeObject::Port {
                element,
                direction,
                port,
            });
        }
        let value_id = ValueId::from_uuid(id);
        if let Some(value) = self.value(value_id) {
            let (element, _) = self.value_index[&value_id];
            return Some(SchemeObject::Value { element, value });
        }
        if let Some(element) = self.element(ElementId::from_uuid(id)) {
            return Some(SchemeObject::Element(element));
        }
        self.connection(ConnectionId::from_uuid(id))
            .map(SchemeObject::Connection)
    }

    /// Elements for the given ids; unknown ids are skipped
    pub fn ids_to_elements(&self, ids: &[ElementId]) -> Vec<&Element> {
        ids.iter().filter_map(|id| self.element(*id)).collect()
    }

    pub fn ids_to_ports(&self, ids: &[PortId]) -> Vec<&Port> {
        ids.iter()
            .filter_map(|id| self.port(*id).map(|(_, _, port)| port))
            .collect()
    }

    pub fn ids_to_values(&self, ids: &[ValueId]) -> Vec<&Value> {
        ids.iter().filter_map(|id| self.value(*id)).collect()
    }

    // ---- value updates ----

    pub fn set_value_by_id(&mut self, id: ValueId, payload: Option<Payload>, status: ValueStatus) -> Result<()> {
        let (element, site) = *self
            .value_index
            .get(&id)
            .ok_or_else(|| EngineError::not_found(format!("value {}", id)))?;
        self.elements
            .get_by_id_mut(element)
            .and_then(|owner| owner.get_value_by_id_mut(id, site))
            .ok_or_else(|| EngineError::not_found(format!("value {}", id)))?
            .update(payload, Some(status))
    }

    pub fn set_param(
        &mut self,
        element: &str,
        name: &str,
        payload: impl Into<Payload>,
        status: ValueStatus,
    ) -> Result<()> {
        let id = self.element_id_or_err(element)?;
        self.elements
            .get_by_id_mut(id)
            .and_then(|owner| owner.parameters_mut().get_by_name_mut(name))
            .ok_or_else(|| EngineError::not_found(format!("parameter '{}' in element '{}'", name, element)))?
            .set(payload, status)
    }

    pub fn set_port_value(
        &mut self,
        element: &str,
        port: &str,
        name: &str,
        payload: impl Into<Payload>,
        status: ValueStatus,
    ) -> Result<()> {
        let id = self.element_id_or_err(element)?;
        self.elements
            .get_by_id_mut(id)
            .and_then(|owner| owner.get_port_mut(&PortRef::from(port)))
            .and_then(|owner_port| owner_port.get_value_mut(name))
            .ok_or_else(|| {
                EngineError::not_found(format!("value '{}' in port '{}' of element '{}'", name, port, element))
            })?
            .set(payload, status)
    }

    /// Reset the port values of every element; see [`Port::reset`]
    pub fn reset(&mut self, reset_fixed: bool) -> Result<()> {
        for element in self.elements.objects_mut().values_mut() {
            for (port_id, _) in element.all_port_ids() {
                if let Some(port) = element.get_port_mut(&PortRef::Id(port_id)) {
                    port.reset(reset_fixed)?;
                }
            }
        }
        Ok(())
    }

    // ---- propagation ----

    /// One propagation pass over every external edge.
    ///
    /// Edges backed by a connection pair values by spec and always propagate
    /// both ways. Direct port links pair values by name and propagate
    /// destination to source only when `both_directions` is set. Every edge
    /// is planned and checked before any value is written, so a failing pass
    /// changes nothing. Returns the number of edges that changed state.
    pub fn propagate_known_values(&mut self, both_directions: bool) -> Result<usize> {
        let policy = self.config.conflict_policy;
        let plans = {
            let mut plans = Vec::new();
            for edge in self.graph.external_edges() {
                let mut plan = Vec::new();
                match edge.connection() {
                    Some(id) => self
                        .connections
                        .get_by_id(id)
                        .ok_or_else(|| {
                            EngineError::DanglingReference(format!("edge refers to unknown connection {}", id))
                        })?
                        .plan(&self.elements, policy, &mut plan)?,
                    None => self.plan_link(edge, both_directions, &mut plan)?,
                }
                plans.push(plan);
            }
            plans
        };

        let edges = plans.len();
        let changed = apply_plans(&mut self.elements, plans)?
            .into_iter()
            .filter(|moved| *moved > 0)
            .count();
        debug!(
            "propagation pass over {} edges in scheme '{}' changed {}",
            edges, self.name, changed
        );
        Ok(changed)
    }

    fn plan_link(&self, edge: &PortEdge, both_directions: bool, plan: &mut Vec<PlannedCopy>) -> Result<()> {
        let owner = |port: PortId| {
            self.port_index
                .get(&port)
                .map(|(element, _)| *element)
                .ok_or_else(|| EngineError::DanglingReference(format!("link refers to unknown port {}", port)))
        };
        let (source_element, destination_element) = (owner(edge.from)?, owner(edge.to)?);
        let source = resolve_port(&self.elements, source_element, edge.from, "link")?;
        let destination = resolve_port(&self.elements, destination_element, edge.to, "link")?;
        for (source_value, destination_value) in ConnectionValidator::pair_by_name(source, destination) {
            plan_pair(
                PortEnd::new(source_element, edge.from, source, source_value)?,
                PortEnd::new(destination_element, edge.to, destination, destination_value)?,
                both_directions,
                self.config.conflict_policy,
                plan,
            )?;
        }
        Ok(())
    }

    // ---- execution ----

    /// Project external port edges onto their owning elements, dropping self-edges
    fn element_edges(&self) -> Vec<(ElementId, ElementId)> {
        self.graph
            .external_edges()
            .filter_map(|edge| {
                let (from, _) = self.port_index.get(&edge.from)?;
                let (to, _) = self.port_index.get(&edge.to)?;
                (from != to).then_some((*from, *to))
            })
            .collect()
    }

    pub fn execution_order(&self) -> ExecutionOrder {
        let ids = self.elements.ids();
        match ExecutionOrderBuilder::build_execution_order_stages(&ids, &self.element_edges()) {
            Ok(stages) => ExecutionOrder {
                stages,
                cycle: Vec::new(),
            },
            Err(cycle) => ExecutionOrder {
                stages: ids.into_iter().map(|id| vec![id]).collect(),
                cycle,
            },
        }
    }

    fn names_of(&self, ids: &[ElementId]) -> Vec<String> {
        ids.iter().map(|id| self.element_name(*id)).collect()
    }

    /// Run with the configured `propagate_each_step`
    pub fn run(&mut self) -> Result<RunReport> {
        self.run_calculations(self.config.propagate_each_step)
    }

    /// Execute every element in dependency order.
    ///
    /// A missing calculate behavior is a pass-through. When the element graph
    /// is cyclic the configured [`CyclePolicy`] decides between a single
    /// registration-order sweep, an error, or repeated sweeps until
    /// propagation settles.
    pub fn run_calculations(&mut self, propagate_each_step: bool) -> Result<RunReport> {
        let order = self.execution_order();
        let mut report = RunReport {
            order: order.flatten(),
            cycle_detected: order.is_cyclic(),
            ..RunReport::default()
        };
        debug!("execution order for scheme '{}': {:?}", self.name, self.names_of(&report.order));

        if order.is_cyclic() {
            let members = self.names_of(&order.cycle);
            let sequence = report.order.clone();
            match self.config.cycle_policy {
                CyclePolicy::Reject => return Err(EngineError::CycleDetected(members)),
                CyclePolicy::RegistrationOrder => {
                    warn!(
                        "cycle among {:?} in scheme '{}', falling back to registration order",
                        members, self.name
                    );
                    self.sweep(&sequence, propagate_each_step, &mut report)?;
                }
                CyclePolicy::Relax { max_sweeps } => {
                    warn!("cycle among {:?} in scheme '{}', relaxing", members, self.name);
                    self.relax(&sequence, max_sweeps, propagate_each_step, &mut report)?;
                }
            }
            return Ok(report);
        }

        if self.config.concurrency_mode == ConcurrencyMode::Rayon {
            let pool = match self.config.thread_pool_size {
                Some(size) => Some(rayon::ThreadPoolBuilder::new().num_threads(size).build()?),
                None => None,
            };
            for stage in &order.stages {
                if stage.len() > 1 {
                    self.run_stage_parallel(stage, pool.as_ref(), &mut report)?;
                } else {
                    for &id in stage {
                        self.run_element(id, &mut report)?;
                    }
                }
                if propagate_each_step {
                    report.propagated += self.propagate_known_values(true)?;
                }
            }
            report.sweeps = 1;
        } else {
            self.sweep(&report.order.clone(), propagate_each_step, &mut report)?;
        }
        Ok(report)
    }

    /// Run `order` once; returns the number of edges changed by propagation
    fn sweep(&mut self, order: &[ElementId], propagate_each_step: bool, report: &mut RunReport) -> Result<usize> {
        let mut moved = 0;
        for &id in order {
            self.run_element(id, report)?;
            if propagate_each_step {
                moved += self.propagate_known_values(true)?;
            }
        }
        report.sweeps += 1;
        report.propagated += moved;
        Ok(moved)
    }

    fn relax(
        &mut self,
        order: &[ElementId],
        max_sweeps: usize,
        propagate_each_step: bool,
        report: &mut RunReport,
    ) -> Result<()> {
        for _ in 0..max_sweeps {
            let mut moved = self.sweep(order, propagate_each_step, report)?;
            if !propagate_each_step {
                let pass = self.propagate_known_values(true)?;
                report.propagated += pass;
                moved += pass;
            }
            if moved == 0 {
                debug!("scheme '{}' settled after {} sweeps", self.name, report.sweeps);
                return Ok(());
            }
        }
        warn!("scheme '{}' did not settle within {} sweeps", self.name, max_sweeps);
        Ok(())
    }

    fn run_element(&mut self, id: ElementId, report: &mut RunReport) -> Result<()> {
        let element = self
            .elements
            .get_by_id_mut(id)
            .ok_or_else(|| EngineError::not_found(format!("element {}", id)))?;
        trace!("calculating element '{}'", element.name());
        let outcome = run_behaviors(element)?;
        self.record_outcome(id, outcome, report)
    }

    fn run_stage_parallel(
        &mut self,
        stage: &[ElementId],
        pool: Option<&rayon::ThreadPool>,
        report: &mut RunReport,
    ) -> Result<()> {
        let members: HashSet<ElementId> = stage.iter().copied().collect();
        let elements = self.elements.objects_mut();
        let mut outcomes = match pool {
            Some(pool) => pool.install(|| run_stage(elements, &members)),
            None => run_stage(elements, &members),
        };
        trace!("ran stage of {} elements in parallel", stage.len());

        for &id in stage {
            if let Some(outcome) = outcomes.remove(&id) {
                self.record_outcome(id, outcome?, report)?;
            }
        }
        Ok(())
    }

    fn record_outcome(&mut self, id: ElementId, outcome: StepOutcome, report: &mut RunReport) -> Result<()> {
        if outcome.executed {
            report.executed += 1;
        } else {
            report.skipped += 1;
        }
        // behaviors may add values to their own ports
        self.reindex_values(id)?;
        if outcome.regrouped {
            self.rebuild_internal_edges(id)?;
        }
        Ok(())
    }

    // ---- description and export ----

    fn describe_connection(&self, id: ConnectionId) -> String {
        let Some(connection) = self.connections.get_by_id(id) else {
            return id.to_string();
        };
        let end = |element: ElementId, port: PortId| {
            let port_name = self
                .port(port)
                .map_or_else(|| port.to_string(), |(_, _, port)| port.name().to_string());
            format!("{}.{}", self.element_name(element), port_name)
        };
        format!(
            "'{}': {} -> {}",
            connection.name(),
            end(connection.source().element_id(), connection.source().port_id()),
            end(connection.destination().element_id(), connection.destination().port_id())
        )
    }

    /// Human-readable summary of elements, connections and direct links
    pub fn describe(&self) -> String {
        let mut lines = vec![format!(
            "scheme '{}': {} elements, {} connections",
            self.name,
            self.elements.len(),
            self.connections.len()
        )];
        for element in self.elements.values() {
            lines.push(format!(
                "  element '{}' in: {:?} out: {:?} params: {:?}",
                element.name(),
                element.in_ports().base_names(),
                element.out_ports().base_names(),
                element.parameters().base_names()
            ));
        }
        for id in self.connections.ids() {
            lines.push(format!("  connection {}", self.describe_connection(id)));
        }
        for link in self.links() {
            lines.push(format!(
                "  link {}.{} -> {}.{}",
                self.element_name(link.source_element),
                self.port(link.source_port).map_or("?", |(_, _, port)| port.name()),
                self.element_name(link.destination_element),
                self.port(link.destination_port).map_or("?", |(_, _, port)| port.name())
            ));
        }
        lines.join("\n")
    }

    fn links(&self) -> Vec<LinkRecord> {
        self.graph
            .external_edges()
            .filter(|edge| edge.connection().is_none())
            .filter_map(|edge| {
                let (source_element, _) = self.port_index.get(&edge.from)?;
                let (destination_element, _) = self.port_index.get(&edge.to)?;
                Some(LinkRecord {
                    source_element: *source_element,
                    source_port: edge.from,
                    destination_element: *destination_element,
                    destination_port: edge.to,
                })
            })
            .collect()
    }

    pub fn as_record(&self) -> SchemeRecord {
        SchemeRecord {
            name: self.name.clone(),
            config: self.config.clone(),
            elements: self
                .elements
                .iter()
                .map(|(id, element)| IdentifiedElement {
                    id,
                    element: element.as_record(),
                })
                .collect(),
            connections: self
                .connections
                .iter()
                .map(|(id, connection)| IdentifiedConnection {
                    id,
                    connection: connection.as_record(),
                })
                .collect(),
            links: self.links(),
            name_counter: self.name_counter,
        }
    }

    /// Rebuild a scheme with identical identifiers; elements come back without behaviors
    pub fn from_record(record: SchemeRecord) -> Result<Self> {
        let mut scheme = Scheme::with_config(&record.name, record.config);
        for entry in record.elements {
            scheme.insert_element(Element::from_record(entry.element)?, Some(entry.id))?;
        }
        for entry in record.connections {
            let connection = Connection::from_record(entry.connection);
            connection.validate(&scheme.elements, true)?;
            scheme.insert_connection(connection, Some(entry.id))?;
        }
        for link in record.links {
            scheme.link_ports(
                OutputPort {
                    element_id: link.source_element,
                    port_id: link.source_port,
                },
                InputPort {
                    element_id: link.destination_element,
                    port_id: link.destination_port,
                },
            )?;
        }
        scheme.name_counter = record.name_counter;
        Ok(scheme)
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(&self.as_record())?)
    }

    pub fn from_json(text: &str) -> Result<Self> {
        Self::from_record(serde_json::from_str(text)?)
    }
}

impl std::fmt::Display for Scheme {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.describe())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IdentifiedElement {
    pub id: ElementId,
    pub element: ElementRecord,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IdentifiedConnection {
    pub id: ConnectionId,
    pub connection: ConnectionRecord,
}

/// Direct port-to-port edge without a connection record
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LinkRecord {
    pub source_element: ElementId,
    pub source_port: PortId,
    pub destination_element: ElementId,
    pub destination_port: PortId,
}

/// Serializable form of a whole [`Scheme`]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SchemeRecord {
    pub name: String,
    #[serde(default)]
    pub config: EngineConfig,
    #[serde(default)]
    pub elements: Vec<IdentifiedElement>,
    #[serde(default)]
    pub connections: Vec<IdentifiedConnection>,
    #[serde(default)]
    pub links: Vec<LinkRecord>,
    #[serde(default)]
    pub name_counter: usize,
}
