//! Observed lifecycle state of a remote endpoint

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::naming::EndpointName;

/// Lifecycle status of a named endpoint
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum EndpointStatus {
    /// Neither endpoint nor configuration exists
    Absent,
    /// A configuration exists but no endpoint has been created from it yet
    ConfigOnly,
    /// Endpoint is being created or updated
    Creating,
    /// Endpoint is ready to serve requests
    InService,
    /// Platform reported the endpoint as failed
    Failed,
}

impl EndpointStatus {
    /// Map a remote status string onto a lifecycle status
    ///
    /// Update and rollback states count as `Creating`. Returns `None` for
    /// statuses the orchestrator does not wait on (e.g. `OutOfService`, `Deleting`).
    pub fn from_remote(status: &str) -> Option<Self> {
        match status {
            "InService" => Some(EndpointStatus::InService),
            "Failed" => Some(EndpointStatus::Failed),
            "Creating" | "Updating" | "SystemUpdating" | "RollingBack" => {
                Some(EndpointStatus::Creating)
            }
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            EndpointStatus::Absent => "Absent",
            EndpointStatus::ConfigOnly => "ConfigOnly",
            EndpointStatus::Creating => "Creating",
            EndpointStatus::InService => "InService",
            EndpointStatus::Failed => "Failed",
        }
    }

    /// Whether no further transition is expected
    pub fn is_terminal(&self) -> bool {
        matches!(self, EndpointStatus::InService | EndpointStatus::Failed)
    }
}

impl fmt::Display for EndpointStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One observation of a remote endpoint
///
/// A projection of control-plane truth at `last_observed`; re-fetched on every
/// poll and never cached beyond a single wait loop.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct EndpointState {
    pub name: EndpointName,
    pub status: EndpointStatus,
    /// Failure reason or raw remote status
    pub detail: Option<String>,
    pub last_observed: DateTime<Utc>,
}

impl EndpointState {
    /// Record a fresh observation
    pub fn observed(name: EndpointName, status: EndpointStatus, detail: Option<String>) -> Self {
        Self {
            name,
            status,
            detail,
            last_observed: Utc::now(),
        }
    }
}
