//! Stop condition for the outer training loop.

use std::fmt;

use sysinfo::System;

use super::trainer::IterationResult;
use crate::experiment::config::StopConfig;

/// Reports how much of the machine's memory is in use.
pub trait MemoryProbe: Send {
    fn ram_util_percent(&mut self) -> f64;
}

/// [`MemoryProbe`] backed by the operating system.
pub struct SystemMemory {
    sys: System,
}

impl SystemMemory {
    pub fn new() -> Self {
        Self { sys: System::new() }
    }
}

impl Default for SystemMemory {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryProbe for SystemMemory {
    fn ram_util_percent(&mut self) -> f64 {
        self.sys.refresh_memory();
        let total = self.sys.total_memory();
        if total == 0 {
            return 0.0;
        }
        self.sys.used_memory() as f64 / total as f64 * 100.0
    }
}

/// Why training stopped.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum StopReason {
    RamUtil(f64),
    TrainingIteration(u64),
    TimestepsTotal(u64),
    Interrupted,
}

impl fmt::Display for StopReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StopReason::RamUtil(p) => write!(f, "RAM utilisation reached {:.1}%", p),
            StopReason::TrainingIteration(n) => write!(f, "reached training iteration {}", n),
            StopReason::TimestepsTotal(n) => write!(f, "reached {} timesteps", n),
            StopReason::Interrupted => write!(f, "interrupted"),
        }
    }
}

/// Checks iteration results against the configured limits.
#[derive(Debug, Clone)]
pub struct StopCondition {
    config: StopConfig,
}

impl StopCondition {
    pub fn new(config: StopConfig) -> Self {
        Self { config }
    }

    /// Returns the first limit `result` reached, if any.
    pub fn check(&self, result: &IterationResult) -> Option<StopReason> {
        if let Some(limit) = self.config.ram_util_percent {
            if result.ram_util_percent >= limit {
                return Some(StopReason::RamUtil(result.ram_util_percent));
            }
        }
        if let Some(limit) = self.config.training_iteration {
            if result.training_iteration >= limit {
                return Some(StopReason::TrainingIteration(result.training_iteration));
            }
        }
        if let Some(limit) = self.config.timesteps_total {
            if result.timesteps_total >= limit {
                return Some(StopReason::TimestepsTotal(result.timesteps_total));
            }
        }
        None
    }
}
