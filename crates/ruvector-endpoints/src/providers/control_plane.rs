//! Control-plane trait for endpoint lifecycle management

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::catalog::ModelConfig;
use crate::error::RemoteError;
use crate::naming::EndpointName;

/// Raw endpoint description as reported by the platform
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EndpointDescription {
    /// Remote status string (e.g., "Creating", "InService", "Failed")
    pub status: String,
    /// Failure reason or other status detail
    #[serde(default)]
    pub detail: Option<String>,
}

impl EndpointDescription {
    pub fn new(status: impl Into<String>) -> Self {
        Self {
            status: status.into(),
            detail: None,
        }
    }

    pub fn with_detail(mut self, detail: impl Into<String>) -> Self {
        self.detail = Some(detail.into());
        self
    }
}

/// Remote API used to observe and create endpoints
///
/// Implementations return structured [`RemoteError`]s; classification into
/// transient / racing / fatal happens in the caller.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ControlPlane: Send + Sync {
    /// Describe an endpoint; fails with `NotFound` when it does not exist
    async fn describe_endpoint(
        &self,
        name: &EndpointName,
    ) -> Result<EndpointDescription, RemoteError>;

    /// Whether an endpoint configuration with this name exists
    async fn describe_endpoint_config(&self, name: &EndpointName) -> Result<bool, RemoteError>;

    /// Create the model, endpoint configuration and endpoint in one go
    ///
    /// Fails with `AlreadyExists` when another caller created it first.
    async fn create_endpoint(
        &self,
        name: &EndpointName,
        model: &ModelConfig,
    ) -> Result<(), RemoteError>;

    /// Deploy an endpoint from an existing endpoint configuration of the same name
    async fn create_endpoint_from_config(&self, name: &EndpointName) -> Result<(), RemoteError>;
}
