//! Provisioning state machine
//!
//! [`ProvisioningMachine`] is a pure poll-and-transition step function. It
//! performs no I/O and never sleeps: the driver asks for the next [`Action`],
//! performs it, and feeds the result back as an [`Observation`]. The wait
//! ceiling is a monotonic deadline checked on every step, and waits are
//! clamped so nothing is polled after it passes.

use std::time::{Duration, Instant};

use super::state::{EndpointState, EndpointStatus};
use crate::config::LifecycleConfig;
use crate::naming::EndpointName;
use crate::providers::EndpointDescription;

/// What the driver should do next
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    /// Fetch the endpoint's status
    DescribeEndpoint,
    /// Check whether an endpoint configuration exists
    DescribeConfig,
    /// Create model, configuration and endpoint
    CreateEndpoint,
    /// Deploy an endpoint from the existing configuration
    CreateFromConfig,
    /// Sleep, then ask again
    Wait(Duration),
    /// Endpoint is in service
    Ready,
    /// Platform reported a failure (or a status we cannot wait on)
    Failed { status: String, detail: String },
    /// Deadline passed before the endpoint became ready
    TimedOut { elapsed: Duration, last_status: String },
}

impl Action {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            Action::Ready | Action::Failed { .. } | Action::TimedOut { .. }
        )
    }
}

/// Result of performing an [`Action`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Observation {
    /// `describe_endpoint` returned a description
    Described(EndpointDescription),
    /// `describe_endpoint` reported `NotFound`
    EndpointMissing,
    /// `describe_endpoint_config` result
    ConfigExists(bool),
    /// Create call accepted by the platform
    CreateAccepted,
    /// Create call lost a race: the resource already exists
    CreateRaced,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Pending {
    Act(Action),
    WaitThenDescribe(Duration),
    Done(Action),
}

/// Step-function state machine for bringing one endpoint to `InService`
#[derive(Debug, Clone)]
pub struct ProvisioningMachine {
    name: EndpointName,
    poll_interval: Duration,
    grace_interval: Duration,
    max_grace_waits: u32,
    started: Instant,
    deadline: Instant,
    pending: Pending,
    grace_waits: u32,
    create_requested: bool,
    last_state: Option<EndpointState>,
}

impl ProvisioningMachine {
    /// Start a machine whose deadline is `settings.provisioning_timeout()` after `now`
    pub fn new(name: EndpointName, settings: &LifecycleConfig, now: Instant) -> Self {
        Self {
            name,
            poll_interval: settings.poll_interval(),
            grace_interval: settings.grace_interval(),
            max_grace_waits: settings.max_grace_waits,
            started: now,
            deadline: now + settings.provisioning_timeout(),
            pending: Pending::Act(Action::DescribeEndpoint),
            grace_waits: 0,
            create_requested: false,
            last_state: None,
        }
    }

    pub fn name(&self) -> &EndpointName {
        &self.name
    }

    /// Most recent observation, if any
    pub fn last_state(&self) -> Option<&EndpointState> {
        self.last_state.as_ref()
    }

    /// Grace waits spent on a configuration without an endpoint
    pub fn grace_waits(&self) -> u32 {
        self.grace_waits
    }

    /// Whether this machine has issued a create (accepted or raced)
    pub fn create_requested(&self) -> bool {
        self.create_requested
    }

    /// Instant after which no further remote call may start
    pub fn deadline(&self) -> Instant {
        self.deadline
    }

    /// Next action to perform at time `now`
    pub fn next_action(&mut self, now: Instant) -> Action {
        if let Pending::Done(action) = &self.pending {
            return action.clone();
        }

        if now >= self.deadline {
            let last_status = self
                .last_state
                .as_ref()
                .map(|s| s.status.to_string())
                .unwrap_or_else(|| "Unknown".to_string());
            tracing::error!(
                "Timeout while waiting for endpoint '{}' (last status {})",
                self.name,
                last_status
            );
            return self.finish(Action::TimedOut {
                elapsed: now.duration_since(self.started),
                last_status,
            });
        }

        match self.pending.clone() {
            Pending::WaitThenDescribe(interval) => {
                self.pending = Pending::Act(Action::DescribeEndpoint);
                Action::Wait(interval.min(self.deadline.duration_since(now)))
            }
            Pending::Act(action) => action,
            Pending::Done(action) => action,
        }
    }

    /// Feed back the result of the last action
    pub fn observe(&mut self, observation: Observation) {
        if matches!(self.pending, Pending::Done(_)) {
            return;
        }

        match observation {
            Observation::Described(description) => self.on_described(description),
            Observation::EndpointMissing => {
                if self.create_requested {
                    // Create accepted but not yet visible; keep polling
                    self.record(EndpointStatus::Creating, Some("not yet visible".to_string()));
                    self.pending = Pending::WaitThenDescribe(self.poll_interval);
                } else {
                    self.record(EndpointStatus::Absent, None);
                    self.pending = Pending::Act(Action::DescribeConfig);
                }
            }
            Observation::ConfigExists(true) => {
                self.record(EndpointStatus::ConfigOnly, None);
                if self.grace_waits < self.max_grace_waits {
                    self.grace_waits += 1;
                    tracing::info!(
                        "Configuration for '{}' exists without endpoint, \
                         waiting {:?} (grace wait {}/{})",
                        self.name,
                        self.grace_interval,
                        self.grace_waits,
                        self.max_grace_waits
                    );
                    self.pending = Pending::WaitThenDescribe(self.grace_interval);
                } else {
                    tracing::warn!(
                        "Configuration for '{}' still has no endpoint after {} grace waits, \
                         deploying from it",
                        self.name,
                        self.grace_waits
                    );
                    self.pending = Pending::Act(Action::CreateFromConfig);
                }
            }
            Observation::ConfigExists(false) => {
                tracing::info!("Endpoint '{}' does not exist, creating it", self.name);
                self.pending = Pending::Act(Action::CreateEndpoint);
            }
            Observation::CreateAccepted => {
                self.create_requested = true;
                self.record(EndpointStatus::Creating, None);
                self.pending = Pending::Act(Action::DescribeEndpoint);
            }
            Observation::CreateRaced => {
                tracing::info!(
                    "Endpoint '{}' was created by another caller, waiting for it",
                    self.name
                );
                self.create_requested = true;
                self.record(EndpointStatus::Creating, None);
                self.pending = Pending::Act(Action::DescribeEndpoint);
            }
        }
    }

    fn on_described(&mut self, description: EndpointDescription) {
        let status = match EndpointStatus::from_remote(&description.status) {
            Some(status) => status,
            None => {
                tracing::error!(
                    "Endpoint '{}' has unexpected status {}",
                    self.name,
                    description.status
                );
                let detail = description.detail.unwrap_or_else(|| {
                    format!("unexpected endpoint status {}", description.status)
                });
                self.finish(Action::Failed {
                    status: description.status,
                    detail,
                });
                return;
            }
        };

        if !status.is_terminal() {
            self.record(status, Some(description.status));
            self.pending = Pending::WaitThenDescribe(self.poll_interval);
            return;
        }

        if status == EndpointStatus::InService {
            self.record(status, description.detail);
            tracing::info!("Endpoint '{}' is now in service", self.name);
            self.finish(Action::Ready);
        } else {
            let detail = description
                .detail
                .clone()
                .unwrap_or_else(|| "no failure reason reported".to_string());
            self.record(status, description.detail);
            tracing::error!("Endpoint '{}' creation failed: {}", self.name, detail);
            self.finish(Action::Failed {
                status: description.status,
                detail,
            });
        }
    }

    fn record(&mut self, status: EndpointStatus, detail: Option<String>) {
        let previous = self.last_state.as_ref().map(|s| s.status);
        if previous != Some(status) {
            match previous {
                Some(prev) => tracing::info!("Endpoint '{}': {} -> {}", self.name, prev, status),
                None => tracing::info!("Endpoint '{}' status: {}", self.name, status),
            }
        }
        self.last_state = Some(EndpointState::observed(self.name.clone(), status, detail));
    }

    fn finish(&mut self, action: Action) -> Action {
        self.pending = Pending::Done(action.clone());
        action
    }
}
