//! Dataflow engine for schemes of elements connected through typed ports.
//!
//! Elements own in-ports, out-ports and parameters holding status-tagged
//! [`Value`]s. A [`Scheme`] registers elements and connections, orders the
//! elements by their data dependencies, runs each element's behavior and
//! propagates newly known values along validated edges.

pub mod core;

// Re-export commonly used types
pub use crate::core::components::{Element, ElementBuilder, Port, ValueAccess, ValuePath};
pub use crate::core::connections::Connection;
pub use crate::core::error::{EngineError, Result};
pub use crate::core::execution::{
    ConcurrencyMode, ConflictPolicy, CyclePolicy, EngineConfig, RunReport, Scheme, SchemeObject,
};
pub use crate::core::repository::{ObjectKind, ObjectRepository, Registrable};
pub use crate::core::types::{
    ConnectionId, Direction, ElementId, Handle, InputPort, OutputPort, PortId, PortRef, ValueId,
};
pub use crate::core::values::{Payload, Value, ValueSpec, ValueStatus};
