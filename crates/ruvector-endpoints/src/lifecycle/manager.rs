//! Endpoint lifecycle orchestration
//!
//! [`EndpointLifecycleManager::ensure_ready`] brings the endpoint for a model
//! to `InService`, creating it on first use. Creation is optimistic and needs
//! no coordination between callers: the derived endpoint name is the
//! idempotency key, and an "already exists" answer from the platform simply
//! means someone else won the race, so the caller falls through to polling.
//! Every remote call goes through a [`RetryExecutor`] and is cut off at the
//! provisioning deadline, backoff included.

use std::future::Future;
use std::sync::Arc;
use tokio::time::{sleep, timeout_at, Instant};

use super::machine::{Action, Observation, ProvisioningMachine};
use super::state::{EndpointState, EndpointStatus};
use crate::catalog::{ModelCatalog, ModelConfig};
use crate::config::{LifecycleConfig, OrchestratorConfig};
use crate::error::{Error, RemoteError, Result};
use crate::naming::EndpointName;
use crate::providers::{ControlPlane, EndpointDescription};
use crate::retry::{RetryError, RetryExecutor, RetryOutcome, RetryPolicy};

/// Reference to an in-service endpoint
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EndpointHandle {
    endpoint_name: EndpointName,
    model: ModelConfig,
}

impl EndpointHandle {
    pub fn endpoint_name(&self) -> &EndpointName {
        &self.endpoint_name
    }

    pub fn model(&self) -> &ModelConfig {
        &self.model
    }
}

/// Provisions endpoints and waits for them to become ready
pub struct EndpointLifecycleManager {
    control_plane: Arc<dyn ControlPlane>,
    catalog: Arc<ModelCatalog>,
    settings: LifecycleConfig,
    executor: RetryExecutor,
}

impl EndpointLifecycleManager {
    /// Create a manager with default lifecycle settings and control-plane retry policy
    pub fn new(control_plane: Arc<dyn ControlPlane>, catalog: Arc<ModelCatalog>) -> Self {
        Self {
            control_plane,
            catalog,
            settings: LifecycleConfig::default(),
            executor: RetryExecutor::new(RetryPolicy::control_plane()).with_label("control plane"),
        }
    }

    /// Create a manager from validated configuration
    pub fn from_config(
        config: &OrchestratorConfig,
        control_plane: Arc<dyn ControlPlane>,
    ) -> Result<Self> {
        config.validate()?;
        let policy = config.retry.control_plane.to_policy()?;
        Ok(Self::new(control_plane, Arc::new(config.catalog()?))
            .with_lifecycle(config.lifecycle.clone())?
            .with_retry_policy(policy))
    }

    /// Replace the lifecycle settings, rejecting zero intervals or ceilings
    pub fn with_lifecycle(mut self, settings: LifecycleConfig) -> Result<Self> {
        settings.validate()?;
        self.settings = settings;
        Ok(self)
    }

    pub fn with_retry_policy(mut self, policy: RetryPolicy) -> Self {
        self.executor = RetryExecutor::new(policy).with_label("control plane");
        self
    }

    pub fn catalog(&self) -> &ModelCatalog {
        &self.catalog
    }

    /// Canonical endpoint name for a catalog model
    pub fn endpoint_name(&self, model_id: &str) -> Result<EndpointName> {
        let model = self.catalog.resolve(model_id)?;
        Ok(EndpointName::for_model(&model.model_id, model.role))
    }

    /// Ensure the endpoint for `model_id` exists and is in service
    pub async fn ensure_ready(&self, model_id: &str) -> Result<EndpointHandle> {
        let model = self.catalog.resolve(model_id)?.clone();
        self.ensure_ready_for(&model).await
    }

    /// Ensure the endpoint for an explicit model configuration is in service
    pub async fn ensure_ready_for(&self, model: &ModelConfig) -> Result<EndpointHandle> {
        let name = EndpointName::for_model(&model.model_id, model.role);
        tracing::info!(
            "Ensuring endpoint '{}' for model '{}' is in service",
            name,
            model.model_id
        );

        let mut machine =
            ProvisioningMachine::new(name.clone(), &self.settings, Instant::now().into_std());
        let deadline = Instant::from_std(machine.deadline());

        // A `None` from `before` means the deadline passed mid-call; the next
        // step reports the timeout.
        loop {
            match machine.next_action(Instant::now().into_std()) {
                Action::DescribeEndpoint => {
                    let Some(described) = before(deadline, &name, self.describe(&name)).await
                    else {
                        continue;
                    };
                    let observation = match described? {
                        Some(description) => Observation::Described(description),
                        None => Observation::EndpointMissing,
                    };
                    machine.observe(observation);
                }
                Action::DescribeConfig => {
                    let Some(exists) = before(deadline, &name, self.describe_config(&name)).await
                    else {
                        continue;
                    };
                    machine.observe(Observation::ConfigExists(exists?));
                }
                Action::CreateEndpoint => {
                    let control_plane = &self.control_plane;
                    let target = &name;
                    let create = self
                        .executor
                        .execute(move || control_plane.create_endpoint(target, model));
                    let Some(result) = before(deadline, &name, create).await else {
                        continue;
                    };
                    machine.observe(Self::creation_observation(&name, result)?);
                }
                Action::CreateFromConfig => {
                    let control_plane = &self.control_plane;
                    let target = &name;
                    let create = self
                        .executor
                        .execute(move || control_plane.create_endpoint_from_config(target));
                    let Some(result) = before(deadline, &name, create).await else {
                        continue;
                    };
                    machine.observe(Self::creation_observation(&name, result)?);
                }
                Action::Wait(interval) => sleep(interval).await,
                Action::Ready => {
                    return Ok(EndpointHandle {
                        endpoint_name: name,
                        model: model.clone(),
                    })
                }
                Action::Failed { status, detail } => {
                    return Err(Error::ProvisioningFailed {
                        endpoint: name.into_string(),
                        status,
                        detail,
                    })
                }
                Action::TimedOut {
                    elapsed,
                    last_status,
                } => {
                    return Err(Error::ProvisioningTimeout {
                        endpoint: name.into_string(),
                        elapsed,
                        last_status,
                    })
                }
            }
        }
    }

    /// Observe the current remote state of an endpoint without changing it
    pub async fn observe(&self, name: &EndpointName) -> Result<EndpointState> {
        match self.describe(name).await? {
            Some(description) => {
                let status = EndpointStatus::from_remote(&description.status)
                    .unwrap_or(EndpointStatus::Failed);
                let detail = description.detail.or(Some(description.status));
                Ok(EndpointState::observed(name.clone(), status, detail))
            }
            None => {
                let status = if self.describe_config(name).await? {
                    EndpointStatus::ConfigOnly
                } else {
                    EndpointStatus::Absent
                };
                Ok(EndpointState::observed(name.clone(), status, None))
            }
        }
    }

    /// Describe an endpoint; `None` when it does not exist
    async fn describe(&self, name: &EndpointName) -> Result<Option<EndpointDescription>> {
        let control_plane = &self.control_plane;
        match self
            .executor
            .execute(move || control_plane.describe_endpoint(name))
            .await
        {
            Ok(outcome) => Ok(Some(outcome.value)),
            Err(RetryError::Fatal(e)) if e.is_not_found() => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    async fn describe_config(&self, name: &EndpointName) -> Result<bool> {
        let control_plane = &self.control_plane;
        let outcome = self
            .executor
            .execute(move || control_plane.describe_endpoint_config(name))
            .await?;
        Ok(outcome.value)
    }

    /// Absorb the benign race outcome of a create call; surface everything else
    fn creation_observation(
        name: &EndpointName,
        result: std::result::Result<RetryOutcome<()>, RetryError<RemoteError>>,
    ) -> Result<Observation> {
        match result {
            Ok(_) => {
                tracing::info!("Create request for endpoint '{}' accepted", name);
                Ok(Observation::CreateAccepted)
            }
            Err(RetryError::Fatal(e)) if e.is_already_exists() => Ok(Observation::CreateRaced),
            Err(e) => {
                tracing::error!("Error while creating endpoint '{}': {}", name, e);
                Err(e.into())
            }
        }
    }
}

/// Run a remote call, giving up once `deadline` passes
async fn before<F: Future>(deadline: Instant, name: &EndpointName, call: F) -> Option<F::Output> {
    match timeout_at(deadline, call).await {
        Ok(output) => Some(output),
        Err(_) => {
            tracing::warn!(
                "Provisioning deadline for endpoint '{}' passed during a remote call",
                name
            );
            None
        }
    }
}
