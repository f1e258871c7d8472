//! ruvector-endpoints: Managed inference endpoint provisioning for embedding and generation models
//!
//! Brings named remote inference endpoints to `InService` and invokes them.
//! Creation is optimistic and tolerates concurrent, uncoordinated callers: the
//! endpoint name derived from the model id is the idempotency key, and an
//! "already exists" answer from the platform counts as success. Every remote
//! call runs through a policy-driven [`RetryExecutor`] with exponential backoff.
//!
//! ```no_run
//! use std::sync::Arc;
//! use ruvector_endpoints::{
//!     EndpointLifecycleManager, HttpControlPlane, InvocationClient, OrchestratorConfig,
//! };
//!
//! # async fn run() -> ruvector_endpoints::Result<()> {
//! let config = OrchestratorConfig::from_file("endpoints.toml")?;
//! let platform = Arc::new(HttpControlPlane::new(&config.control_plane)?);
//!
//! let manager = EndpointLifecycleManager::from_config(&config, platform.clone())?;
//! let handle = manager.ensure_ready("huggingface-sentencesimilarity-bge-m3").await?;
//!
//! let client = InvocationClient::from_config(&config, platform)?;
//! let response = client
//!     .invoke(&handle, &serde_json::json!({"text_inputs": ["hello"]}))
//!     .await?;
//! println!("{}", response.body);
//! # Ok(())
//! # }
//! ```

pub mod catalog;
pub mod config;
pub mod error;
pub mod invocation;
pub mod lifecycle;
pub mod logging;
pub mod naming;
pub mod providers;
pub mod retry;

pub use catalog::{EndpointRole, ModelCatalog, ModelConfig, RequestShape, SourceKind};
pub use config::OrchestratorConfig;
pub use error::{Error, RemoteError, Result};
pub use invocation::{Invocation, InvocationClient, InvocationMetadata};
pub use lifecycle::{EndpointHandle, EndpointLifecycleManager, EndpointState, EndpointStatus};
pub use naming::EndpointName;
pub use providers::{ControlPlane, DataPlane, EndpointDescription, HttpControlPlane};
pub use retry::{ErrorClass, RetryError, RetryExecutor, RetryOutcome, RetryPolicy};
