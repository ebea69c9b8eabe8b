pub mod config;
pub mod execution_order;
pub mod port_graph;
pub mod scheme;

// Re-export commonly used types
pub use config::{ConcurrencyMode, ConflictPolicy, CyclePolicy, EngineConfig};
pub use execution_order::ExecutionOrderBuilder;
pub use port_graph::{EdgeKind, PortEdge, PortGraph};
pub use scheme::{
    ExecutionOrder, IdentifiedConnection, IdentifiedElement, LinkRecord, RunReport, Scheme,
    SchemeObject, SchemeRecord,
};
