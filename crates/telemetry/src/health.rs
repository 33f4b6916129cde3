//! Health of the broker and database connections.
//!
//! Startup checks set the initial state; the worker updates the database
//! entry after every save.

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::Serialize;

/// Overall status across components.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    Healthy,
    Degraded,
    Unhealthy,
}

#[derive(Debug, Clone)]
struct ComponentState {
    up: bool,
    reason: Option<String>,
    consecutive_failures: u64,
    changed_at: Option<DateTime<Utc>>,
}

/// One external dependency. Starts out down until a check passes.
#[derive(Debug)]
pub struct Component {
    name: &'static str,
    state: Mutex<ComponentState>,
}

impl Component {
    pub const fn new(name: &'static str) -> Self {
        Self {
            name,
            state: Mutex::new(ComponentState {
                up: false,
                reason: None,
                consecutive_failures: 0,
                changed_at: None,
            }),
        }
    }

    pub fn mark_up(&self) {
        let mut state = self.state.lock();
        if !state.up {
            state.changed_at = Some(Utc::now());
        }
        state.up = true;
        state.reason = None;
        state.consecutive_failures = 0;
    }

    /// Records a failure and returns how many have happened in a row.
    pub fn mark_down(&self, reason: impl Into<String>) -> u64 {
        let mut state = self.state.lock();
        if state.up || state.changed_at.is_none() {
            state.changed_at = Some(Utc::now());
        }
        state.up = false;
        state.reason = Some(reason.into());
        state.consecutive_failures += 1;
        state.consecutive_failures
    }

    pub fn report(&self) -> ComponentReport {
        let state = self.state.lock().clone();
        ComponentReport {
            name: self.name,
            healthy: state.up,
            reason: state.reason,
            consecutive_failures: state.consecutive_failures,
            since: state.changed_at,
        }
    }
}

/// Point-in-time view of one component.
#[derive(Debug, Clone, Serialize)]
pub struct ComponentReport {
    pub name: &'static str,
    pub healthy: bool,
    pub reason: Option<String>,
    pub consecutive_failures: u64,
    /// When the component last flipped between up and down
    pub since: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize)]
pub struct HealthReport {
    pub status: HealthStatus,
    pub components: Vec<ComponentReport>,
}

/// The consumer's two dependencies.
#[derive(Debug)]
pub struct HealthRegistry {
    pub kafka: Component,
    pub database: Component,
}

impl HealthRegistry {
    pub const fn new() -> Self {
        Self {
            kafka: Component::new("kafka"),
            database: Component::new("database"),
        }
    }

    pub fn report(&self) -> HealthReport {
        let components = vec![self.kafka.report(), self.database.report()];

        let up = components.iter().filter(|c| c.healthy).count();
        let status = if up == components.len() {
            HealthStatus::Healthy
        } else if up == 0 {
            HealthStatus::Unhealthy
        } else {
            HealthStatus::Degraded
        };

        HealthReport { status, components }
    }
}

impl Default for HealthRegistry {
    fn default() -> Self {
        Self::new()
    }
}

static HEALTH: HealthRegistry = HealthRegistry::new();

/// Process-wide registry.
pub fn health() -> &'static HealthRegistry {
    &HEALTH
}
