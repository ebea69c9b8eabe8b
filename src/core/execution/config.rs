//! Configuration for scheme execution
//!
//! Controls concurrency, the treatment of cyclic element graphs and the
//! treatment of two authoritative values meeting on one edge.

use serde::{Deserialize, Serialize};

/// Enumeration of supported concurrency modes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConcurrencyMode {
    /// Elements run one after another on the calling thread
    #[default]
    Sequential,
    /// Elements of one topological stage run their behaviors in parallel using Rayon
    Rayon,
}

/// What `run_calculations` does when the element graph has a cycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CyclePolicy {
    /// Run once in registration order and flag the cycle in the report
    #[default]
    RegistrationOrder,
    /// Fail with `CycleDetected`
    Reject,
    /// Repeat registration-order sweeps until a propagation pass moves nothing
    Relax { max_sweeps: usize },
}

/// What propagation does when both ends of a value pair are authoritative
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConflictPolicy {
    /// Leave both ends untouched
    #[default]
    Ignore,
    /// Fail with `ConflictingValues` when the payloads differ
    Error,
}

/// Configuration for scheme execution
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub concurrency_mode: ConcurrencyMode,
    /// Size of a dedicated thread pool; only relevant in `Rayon` mode.
    /// `None` uses Rayon's global pool.
    pub thread_pool_size: Option<usize>,
    pub cycle_policy: CyclePolicy,
    pub conflict_policy: ConflictPolicy,
    /// Used by `Scheme::run`: propagate after every element (or stage)
    pub propagate_each_step: bool,
}

impl EngineConfig {
    pub fn new() -> Self {
        Self {
            concurrency_mode: ConcurrencyMode::default(),
            thread_pool_size: None,
            cycle_policy: CyclePolicy::default(),
            conflict_policy: ConflictPolicy::default(),
            propagate_each_step: true,
        }
    }

    pub fn with_concurrency(mut self, mode: ConcurrencyMode) -> Self {
        self.concurrency_mode = mode;
        self
    }

    pub fn with_thread_pool_size(mut self, size: usize) -> Self {
        self.thread_pool_size = Some(size);
        self
    }

    pub fn with_cycle_policy(mut self, policy: CyclePolicy) -> Self {
        self.cycle_policy = policy;
        self
    }

    pub fn with_conflict_policy(mut self, policy: ConflictPolicy) -> Self {
        self.conflict_policy = policy;
        self
    }

    pub fn with_propagate_each_step(mut self, flag: bool) -> Self {
        self.propagate_each_step = flag;
        self
    }

    /// Parse a configuration from JSON; missing fields take their defaults
    pub fn from_json(text: &str) -> crate::core::error::Result<Self> {
        Ok(serde_json::from_str(text)?)
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self::new()
    }
}
