//! Data-plane trait for invoking a running endpoint

use async_trait::async_trait;
use serde_json::Value;

use crate::error::RemoteError;
use crate::naming::EndpointName;

/// Remote API used to send requests to an in-service endpoint
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait DataPlane: Send + Sync {
    /// Send a JSON payload to the endpoint and return its JSON response
    ///
    /// Fails with `ThrottlingException` (transient) or `ModelError` (fatal).
    async fn invoke_endpoint(&self, name: &EndpointName, payload: &Value)
        -> Result<Value, RemoteError>;
}
