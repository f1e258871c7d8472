//! Invocation of in-service endpoints

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;

use crate::config::OrchestratorConfig;
use crate::error::Result;
use crate::lifecycle::EndpointHandle;
use crate::naming::EndpointName;
use crate::providers::DataPlane;
use crate::retry::{RetryExecutor, RetryPolicy};

/// Metadata about a completed invocation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InvocationMetadata {
    pub endpoint_name: EndpointName,
    /// Calls made, including the successful one
    pub attempts: u32,
    /// Wall time including retry backoff
    pub latency: Duration,
}

/// Response body of an endpoint invocation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Invocation {
    pub body: Value,
    pub metadata: InvocationMetadata,
}

/// Sends payloads to ready endpoints with retry on transient failures
pub struct InvocationClient {
    data_plane: Arc<dyn DataPlane>,
    executor: RetryExecutor,
}

impl InvocationClient {
    /// Create a client using the default invocation retry policy
    pub fn new(data_plane: Arc<dyn DataPlane>) -> Self {
        Self::with_policy(data_plane, RetryPolicy::invocation())
    }

    pub fn with_policy(data_plane: Arc<dyn DataPlane>, policy: RetryPolicy) -> Self {
        Self {
            data_plane,
            executor: RetryExecutor::new(policy).with_label("invocation"),
        }
    }

    /// Create a client from the `[retry.invocation]` configuration section
    pub fn from_config(
        config: &OrchestratorConfig,
        data_plane: Arc<dyn DataPlane>,
    ) -> Result<Self> {
        let policy = config.retry.invocation.to_policy()?;
        Ok(Self::with_policy(data_plane, policy))
    }

    pub fn policy(&self) -> &RetryPolicy {
        self.executor.policy()
    }

    /// Invoke the endpoint behind `handle` with a JSON payload
    ///
    /// The payload is passed through unchanged; formatting it for the
    /// model's [`RequestShape`](crate::catalog::RequestShape) is the caller's job.
    pub async fn invoke(&self, handle: &EndpointHandle, payload: &Value) -> Result<Invocation> {
        let name = handle.endpoint_name();
        let data_plane = &self.data_plane;
        let start = Instant::now();

        let outcome = self
            .executor
            .execute(move || data_plane.invoke_endpoint(name, payload))
            .await?;

        let latency = start.elapsed();
        tracing::debug!(
            "Invoked endpoint '{}' in {:?} ({} attempt(s))",
            name,
            latency,
            outcome.attempts
        );

        Ok(Invocation {
            body: outcome.value,
            metadata: InvocationMetadata {
                endpoint_name: name.clone(),
                attempts: outcome.attempts,
                latency,
            },
        })
    }
}
