//! Coordinator configuration

use core::time::Duration;

use serde::{Deserialize, Serialize};

// ----------------------------------------------------------------------------
// Coordinator Configuration
// ----------------------------------------------------------------------------

/// Configuration for the coordinator's task handling and teardown behavior
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CoordinatorConfig {
    /// Ceiling on a task's accumulated elapsed time before it is
    /// force-completed as failed; `None` disables orphan detection
    pub max_task_time: Option<Duration>,
    /// Simulated frame delta fed to each tick of the shutdown drain loop
    pub drain_tick_delta: Duration,
    /// Sleep between drain ticks
    pub drain_sleep: Duration,
    /// Whether a host shrinks public slots to the registrant count once
    /// arbitration completes
    pub shrink_arbitrated_sessions: bool,
}

impl Default for CoordinatorConfig {
    fn default() -> Self {
        Self {
            max_task_time: Some(Duration::from_secs(30)),
            drain_tick_delta: Duration::from_millis(100),
            drain_sleep: Duration::from_millis(10),
            shrink_arbitrated_sessions: true,
        }
    }
}

impl CoordinatorConfig {
    /// Create configuration optimized for testing (tight timeouts, no sleep)
    pub fn testing() -> Self {
        Self {
            max_task_time: Some(Duration::from_secs(1)),
            drain_tick_delta: Duration::from_millis(10),
            drain_sleep: Duration::ZERO,
            shrink_arbitrated_sessions: true,
        }
    }

    /// Validate the configuration for consistency and feasibility
    pub fn validate(&self) -> Result<(), String> {
        if self.drain_tick_delta.is_zero() {
            return Err("drain tick delta cannot be zero".into());
        }
        if let Some(ceiling) = self.max_task_time {
            if ceiling.is_zero() {
                return Err("max task time must be positive when set".into());
            }
        }
        Ok(())
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
