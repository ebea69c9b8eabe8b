pub mod components;
pub mod connections;
pub mod error;
pub mod execution;
pub mod repository;
pub mod types;
pub mod values;

#[cfg(test)]
mod tests;
