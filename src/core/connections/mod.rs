pub mod connection;
pub mod connection_validator;
pub mod port_validator;

pub use connection::{Connection, ConnectionRecord};
pub use connection_validator::{ConnectionValidator, SpecGroups};
pub use port_validator::PortValidator;
