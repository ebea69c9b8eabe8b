//! Error types for scheme construction, validation and execution.
//!
//! Registration and validation failures are raised at the call that caused
//! them. The only soft failures are a missing `calculate` hook and the cycle
//! fallback in the scheduler, both handled inside the scheme driver.

use crate::core::values::ValueSpec;
use thiserror::Error;

/// The main error type for engine operations.
#[derive(Error, Debug)]
pub enum EngineError {
    /// A base name is already registered in the target repository.
    #[error("name '{name}' is already registered in {repository}")]
    DuplicateName { name: String, repository: String },

    /// An explicit identifier collides with an existing entry.
    #[error("identifier {id} is already in use in {repository}")]
    DuplicateId { id: String, repository: String },

    /// Object kind or payload kind does not match the configured one.
    #[error("type mismatch: expected {expected}, found {found}")]
    TypeMismatch { expected: String, found: String },

    /// A base name contains the reserved delimiter or is empty.
    #[error("invalid name '{name}': {reason}")]
    InvalidName { name: String, reason: String },

    /// Payload violates the value's bounds.
    #[error("value '{name}' out of bounds: {detail}")]
    OutOfBounds { name: String, detail: String },

    /// Arithmetic or invocation on a payload that does not support it.
    #[error("unsupported operation '{operation}': {reason}")]
    UnsupportedOperation { operation: String, reason: String },

    /// A connection refers to an element or port that is not registered.
    #[error("dangling reference: {0}")]
    DanglingReference(String),

    /// The two ports of a connection carry different sets of value specs.
    #[error(
        "incompatible spec sets: missing in source {missing_in_source:?}, missing in destination {missing_in_destination:?}"
    )]
    IncompatibleSpecSet {
        missing_in_source: Vec<ValueSpec>,
        missing_in_destination: Vec<ValueSpec>,
    },

    /// A spec appears a different number of times on each side.
    #[error(
        "multiplicity mismatch for {spec}: source has {in_source}, destination has {in_destination}"
    )]
    MultiplicityMismatch {
        spec: ValueSpec,
        in_source: usize,
        in_destination: usize,
    },

    /// A port was used against its direction (e.g. an in-port as a connection source).
    #[error("port '{port}' on element '{element}' is an {actual} port, expected {expected}")]
    DirectionMismatch {
        element: String,
        port: String,
        expected: String,
        actual: String,
    },

    /// A behavior hook was not supplied.
    #[error("{hook} is not implemented for element '{element}'")]
    NotImplemented { element: String, hook: String },

    /// Lookup by name or identifier failed.
    #[error("not found: {0}")]
    NotFound(String),

    /// Two authoritative ends of an edge hold different payloads.
    #[error("conflicting authoritative values '{source_value}' and '{destination_value}'")]
    ConflictingValues {
        source_value: String,
        destination_value: String,
    },

    /// The element graph contains a cycle and the configured policy rejects it.
    #[error("cycle detected among elements: {0:?}")]
    CycleDetected(Vec<String>),

    /// Unknown value status text.
    #[error("unknown status '{0}', expected one of UNKNOWN, DEPEND, CALCULATED, FIXED")]
    ParseStatus(String),

    /// A dedicated Rayon pool could not be created.
    #[error("failed to build thread pool: {0}")]
    ThreadPool(#[from] rayon::ThreadPoolBuildError),

    /// Structural export could not be encoded or decoded.
    #[error("serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, EngineError>;

impl EngineError {
    pub(crate) fn not_found(what: impl std::fmt::Display) -> Self {
        EngineError::NotFound(what.to_string())
    }

    pub(crate) fn unsupported(operation: &str, reason: impl Into<String>) -> Self {
        EngineError::UnsupportedOperation {
            operation: operation.to_string(),
            reason: reason.into(),
        }
    }

    /// True for a missing behavior hook, the one error the scheduler swallows.
    pub fn is_not_implemented(&self) -> bool {
        matches!(self, EngineError::NotImplemented { .. })
    }
}
