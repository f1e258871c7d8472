//! End-to-end lifecycle tests against an in-memory control plane

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::{json, Value};
use tokio::time::Instant;

use ruvector_endpoints::config::LifecycleConfig;
use ruvector_endpoints::error::codes;
use ruvector_endpoints::{
    ControlPlane, DataPlane, EndpointDescription, EndpointLifecycleManager, EndpointName,
    EndpointStatus, Error, InvocationClient, ModelCatalog, ModelConfig, OrchestratorConfig,
    RemoteError, RetryPolicy,
};

const BGE: &str = "huggingface-sentencesimilarity-bge-m3";
const LLAMA: &str = "meta-textgeneration-llama-3-1-8b-instruct";

#[derive(Debug, Clone)]
struct Endpoint {
    /// Describe calls answered with "Creating" before the final status
    polls_left: u32,
    final_status: &'static str,
}

/// Control plane with platform-enforced unique names and scripted provisioning
#[derive(Default)]
struct FakePlatform {
    endpoints: Mutex<HashMap<String, Endpoint>>,
    configs: Mutex<HashSet<String>>,
    /// Polls every new endpoint spends in "Creating"
    creating_polls: u32,
    final_status: Option<&'static str>,
    /// Leading describe calls that fail with throttling
    throttled_describes: AtomicU32,
    creates: AtomicU32,
    creates_accepted: AtomicU32,
    creates_from_config: AtomicU32,
    describes: AtomicU32,
    invocations: AtomicU32,
}

impl FakePlatform {
    fn new(creating_polls: u32) -> Self {
        Self {
            creating_polls,
            ..Default::default()
        }
    }

    fn with_final_status(mut self, status: &'static str) -> Self {
        self.final_status = Some(status);
        self
    }

    fn with_config(self, name: &EndpointName) -> Self {
        self.configs.lock().unwrap().insert(name.to_string());
        self
    }

    fn with_throttled_describes(self, count: u32) -> Self {
        self.throttled_describes.store(count, Ordering::SeqCst);
        self
    }

    /// Atomic create-if-not-exists
    fn insert(&self, name: &EndpointName) -> Result<(), RemoteError> {
        let mut endpoints = self.endpoints.lock().unwrap();
        if endpoints.contains_key(name.as_str()) {
            return Err(RemoteError::already_exists(format!(
                "Cannot create already existing endpoint \"{}\"",
                name
            )));
        }
        endpoints.insert(
            name.to_string(),
            Endpoint {
                polls_left: self.creating_polls,
                final_status: self.final_status.unwrap_or("InService"),
            },
        );
        self.creates_accepted.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

#[async_trait]
impl ControlPlane for FakePlatform {
    async fn describe_endpoint(
        &self,
        name: &EndpointName,
    ) -> Result<EndpointDescription, RemoteError> {
        self.describes.fetch_add(1, Ordering::SeqCst);
        // Yield so concurrent callers interleave
        tokio::task::yield_now().await;

        if self
            .throttled_describes
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
        {
            return Err(RemoteError::throttling("Rate exceeded"));
        }

        let mut endpoints = self.endpoints.lock().unwrap();
        match endpoints.get_mut(name.as_str()) {
            Some(endpoint) if endpoint.polls_left > 0 => {
                endpoint.polls_left -= 1;
                Ok(EndpointDescription::new("Creating"))
            }
            Some(endpoint) if endpoint.final_status == "Failed" => Ok(EndpointDescription::new(
                "Failed",
            )
            .with_detail("CapacityError: insufficient capacity")),
            Some(endpoint) => Ok(EndpointDescription::new(endpoint.final_status)),
            None => Err(RemoteError::not_found(format!(
                "Could not find endpoint \"{}\"",
                name
            ))),
        }
    }

    async fn describe_endpoint_config(&self, name: &EndpointName) -> Result<bool, RemoteError> {
        tokio::task::yield_now().await;
        Ok(self.configs.lock().unwrap().contains(name.as_str()))
    }

    async fn create_endpoint(
        &self,
        name: &EndpointName,
        _model: &ModelConfig,
    ) -> Result<(), RemoteError> {
        self.creates.fetch_add(1, Ordering::SeqCst);
        tokio::task::yield_now().await;
        self.configs.lock().unwrap().insert(name.to_string());
        self.insert(name)
    }

    async fn create_endpoint_from_config(&self, name: &EndpointName) -> Result<(), RemoteError> {
        self.creates_from_config.fetch_add(1, Ordering::SeqCst);
        tokio::task::yield_now().await;
        self.insert(name)
    }
}

#[async_trait]
impl DataPlane for FakePlatform {
    async fn invoke_endpoint(
        &self,
        name: &EndpointName,
        payload: &Value,
    ) -> Result<Value, RemoteError> {
        if self.invocations.fetch_add(1, Ordering::SeqCst) == 0 {
            return Err(RemoteError::new(codes::MODEL_NOT_READY, "warming up"));
        }
        Ok(json!({"endpoint": name.as_str(), "echo": payload}))
    }
}

fn lifecycle(timeout_secs: u64) -> LifecycleConfig {
    LifecycleConfig {
        poll_interval_secs: 5,
        grace_interval_secs: 5,
        max_grace_waits: 3,
        provisioning_timeout_secs: timeout_secs,
    }
}

fn manager(platform: Arc<FakePlatform>, timeout_secs: u64) -> EndpointLifecycleManager {
    EndpointLifecycleManager::new(platform, Arc::new(ModelCatalog::builtin()))
        .with_lifecycle(lifecycle(timeout_secs))
        .unwrap()
        .with_retry_policy(
            RetryPolicy::new(3, Duration::from_millis(50), 2.0, [codes::THROTTLING]).unwrap(),
        )
}

#[tokio::test(start_paused = true)]
async fn concurrent_callers_converge_on_one_endpoint() {
    let platform = Arc::new(FakePlatform::new(3));
    let manager = manager(platform.clone(), 600);

    let (a, b) = tokio::join!(manager.ensure_ready(BGE), manager.ensure_ready(BGE));
    let (a, b) = (a.unwrap(), b.unwrap());

    assert_eq!(a, b);
    assert_eq!(
        a.endpoint_name().as_str(),
        "huggingface-sentencesimilarity-bge-m3-embedding-endpoint"
    );
    assert_eq!(platform.creates_accepted.load(Ordering::SeqCst), 1);
    assert_eq!(platform.endpoints.lock().unwrap().len(), 1);
}

#[tokio::test(start_paused = true)]
async fn concurrent_callers_on_separate_managers_converge() {
    let platform = Arc::new(FakePlatform::new(2));
    let first = manager(platform.clone(), 600);
    let second = manager(platform.clone(), 600);
    let third = manager(platform.clone(), 600);

    let (a, b, c) = tokio::join!(
        first.ensure_ready(LLAMA),
        second.ensure_ready(LLAMA),
        third.ensure_ready(LLAMA)
    );

    let names: Vec<_> = [a, b, c]
        .into_iter()
        .map(|r| r.unwrap().endpoint_name().clone())
        .collect();
    assert!(names.windows(2).all(|w| w[0] == w[1]));
    assert!(names[0].as_str().ends_with("-inferencing-endpoint"));
    assert_eq!(platform.creates_accepted.load(Ordering::SeqCst), 1);
}

#[tokio::test(start_paused = true)]
async fn timeout_stops_polling_at_deadline() {
    // Stays "Creating" far longer than the 60s ceiling
    let platform = Arc::new(FakePlatform::new(1_000));
    let manager = manager(platform.clone(), 60);

    let start = Instant::now();
    let err = manager.ensure_ready(BGE).await.unwrap_err();

    match err {
        Error::ProvisioningTimeout {
            endpoint,
            elapsed,
            last_status,
        } => {
            assert_eq!(endpoint, "huggingface-sentencesimilarity-bge-m3-embedding-endpoint");
            assert_eq!(elapsed, Duration::from_secs(60));
            assert_eq!(last_status, EndpointStatus::Creating.as_str());
        }
        other => panic!("expected timeout, got {other:?}"),
    }
    assert_eq!(start.elapsed(), Duration::from_secs(60));
    // Initial describe plus polls at 5s..55s after creation
    assert_eq!(platform.describes.load(Ordering::SeqCst), 13);
}

#[tokio::test(start_paused = true)]
async fn failed_endpoint_is_reported_without_recreation() {
    let platform = Arc::new(FakePlatform::new(1).with_final_status("Failed"));
    let manager = manager(platform.clone(), 600);

    match manager.ensure_ready(BGE).await {
        Err(Error::ProvisioningFailed { status, detail, .. }) => {
            assert_eq!(status, "Failed");
            assert!(detail.contains("insufficient capacity"));
        }
        other => panic!("expected ProvisioningFailed, got {other:?}"),
    }
    assert_eq!(platform.creates.load(Ordering::SeqCst), 1);

    // A second call observes Failed and does not create again
    assert!(manager.ensure_ready(BGE).await.is_err());
    assert_eq!(platform.creates.load(Ordering::SeqCst), 1);
}

#[tokio::test(start_paused = true)]
async fn dangling_config_escalates_after_grace_waits() {
    let name = EndpointName::for_model(BGE, ruvector_endpoints::EndpointRole::Embedding);
    let platform = Arc::new(FakePlatform::new(0).with_config(&name));
    let manager = manager(platform.clone(), 600);

    let start = Instant::now();
    let handle = manager.ensure_ready(BGE).await.unwrap();

    assert_eq!(handle.endpoint_name(), &name);
    assert_eq!(platform.creates.load(Ordering::SeqCst), 0);
    assert_eq!(platform.creates_from_config.load(Ordering::SeqCst), 1);
    // Three 5s grace waits
    assert_eq!(start.elapsed(), Duration::from_secs(15));
}

#[tokio::test(start_paused = true)]
async fn throttled_status_checks_are_retried() {
    let platform = Arc::new(FakePlatform::new(0).with_throttled_describes(2));
    let manager = manager(platform.clone(), 600);

    assert!(manager.ensure_ready(BGE).await.is_ok());
    assert_eq!(platform.creates_accepted.load(Ordering::SeqCst), 1);
}

#[tokio::test(start_paused = true)]
async fn ensure_then_invoke_with_configured_policies() {
    let config = OrchestratorConfig::from_toml_str(
        r#"
        [control_plane]
        base_url = "https://models.example.com/v1"

        [lifecycle]
        poll_interval_secs = 2
        provisioning_timeout_secs = 120

        [retry.invocation]
        max_retries = 2
        base_delay_ms = 500
        backoff_factor = 2.0
        retryable_error_codes = ["ModelNotReadyException"]
        "#,
    )
    .unwrap();

    let platform = Arc::new(FakePlatform::new(2));
    let manager = EndpointLifecycleManager::from_config(&config, platform.clone()).unwrap();
    let client = InvocationClient::from_config(&config, platform.clone()).unwrap();

    let handle = manager.ensure_ready(LLAMA).await.unwrap();
    let invocation = client
        .invoke(&handle, &json!({"inputs": "Hello"}))
        .await
        .unwrap();

    assert_eq!(invocation.metadata.attempts, 2);
    assert_eq!(invocation.metadata.latency, Duration::from_millis(500));
    assert_eq!(invocation.body["endpoint"], handle.endpoint_name().as_str());
    assert_eq!(invocation.body["echo"]["inputs"], "Hello");
}

#[tokio::test(start_paused = true)]
async fn unknown_model_makes_no_remote_calls() {
    let platform = Arc::new(FakePlatform::new(0));
    let manager = manager(platform.clone(), 600);

    assert!(matches!(
        manager.ensure_ready("no-such-model").await,
        Err(Error::UnknownModel(_))
    ));
    assert_eq!(platform.describes.load(Ordering::SeqCst), 0);
}
