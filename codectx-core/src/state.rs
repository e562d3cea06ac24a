//! Cross-cutting state enums shared by the resilience kernel and its callers
//! (spec §3).

use serde::{Deserialize, Serialize};

/// Circuit breaker state machine (spec §4.1.1).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CircuitState {
    Closed,
    Open,
    HalfOpen,
}

/// Connection state of a `ResilientClient` (spec §4.1.4).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConnectionState {
    Connected,
    Degraded,
    CircuitOpen,
    HalfOpen,
}

/// Feature-level degradation mode surfaced by a `DegradationHandler`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DegradationMode {
    Normal,
    Degraded,
    Disabled,
}
