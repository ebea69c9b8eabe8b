pub mod access;
pub mod element;
pub mod port;

pub use access::{ValueAccess, ValuePath};
pub use element::{Behavior, Element, ElementBuilder, ElementRecord, IdentifiedPort, ValueSite};
pub use port::{IdentifiedValue, Port, PortRecord};
