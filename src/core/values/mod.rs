pub mod arithmetic;
pub mod payload;
pub mod status;
pub mod typed_value;
pub mod value;

// Re-export commonly used types
pub use payload::{Callable, Payload, PayloadKind, PayloadRecord};
pub use status::{ValueSpec, ValueStatus};
pub use typed_value::OpaqueValue;
pub use value::{CompareOp, Value, ValueRecord};
