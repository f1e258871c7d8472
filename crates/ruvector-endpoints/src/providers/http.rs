//! JSON/REST client for the managed model-serving platform
//!
//! Implements both the control plane (describe / create) and the data plane
//! (invoke) over plain HTTP. Error bodies of the form
//! `{"code": "...", "message": "..."}` become [`RemoteError`]s; when the body
//! carries no code, the HTTP status decides.

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION};
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::control_plane::{ControlPlane, EndpointDescription};
use super::data_plane::DataPlane;
use crate::catalog::{ModelConfig, SourceKind};
use crate::config::ControlPlaneConfig;
use crate::error::{codes, Error, RemoteError, Result};
use crate::naming::EndpointName;

/// HTTP control-plane and data-plane client
pub struct HttpControlPlane {
    /// HTTP client
    client: Client,
    /// API base URL without trailing slash
    base_url: String,
    /// Region endpoints are created in
    region: String,
    /// Execution role passed on creation
    role_arn: Option<String>,
}

#[derive(Serialize)]
struct CreateEndpointRequest<'a> {
    name: &'a str,
    model_id: &'a str,
    source_kind: SourceKind,
    compute_class: &'a str,
    region: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    role_arn: Option<&'a str>,
    initial_instance_count: u32,
    accept_eula: bool,
}

#[derive(Deserialize)]
struct DescribeEndpointResponse {
    #[serde(alias = "EndpointStatus")]
    status: String,
    #[serde(default, alias = "FailureReason")]
    failure_reason: Option<String>,
}

#[derive(Deserialize, Default)]
struct ErrorBody {
    #[serde(default, alias = "__type", alias = "Code")]
    code: Option<String>,
    #[serde(default, alias = "Message")]
    message: Option<String>,
}

impl HttpControlPlane {
    /// Create a client from control-plane configuration
    pub fn new(config: &ControlPlaneConfig) -> Result<Self> {
        let mut headers = HeaderMap::new();
        if let Some(token) = config.bearer_token() {
            let value = HeaderValue::from_str(&format!("Bearer {}", token))
                .map_err(|e| Error::config(format!("Invalid bearer token: {}", e)))?;
            headers.insert(AUTHORIZATION, value);
        }

        let client = Client::builder()
            .timeout(config.timeout())
            .pool_max_idle_per_host(5)
            .default_headers(headers)
            .build()?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            region: config.region.clone(),
            role_arn: config.role_arn.clone(),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path)
    }

    /// Send a request, turning transport failures and error statuses into `RemoteError`
    async fn send(&self, request: RequestBuilder) -> std::result::Result<Response, RemoteError> {
        let response = request.send().await.map_err(transport_error)?;
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let body = response.text().await.unwrap_or_default();
        Err(remote_error_from_status(status, &body))
    }

    async fn json<T: for<'de> Deserialize<'de>>(
        response: Response,
    ) -> std::result::Result<T, RemoteError> {
        response.json::<T>().await.map_err(|e| {
            RemoteError::new(
                codes::INVALID_RESPONSE,
                format!("Failed to parse response: {}", e),
            )
        })
    }
}

/// Map a reqwest transport error to a remote error code
fn transport_error(err: reqwest::Error) -> RemoteError {
    let code = if err.is_timeout() {
        codes::REQUEST_TIMEOUT
    } else if err.is_connect() {
        codes::SERVICE_UNAVAILABLE
    } else {
        codes::INTERNAL_FAILURE
    };
    RemoteError::new(code, format!("Request failed: {}", err))
}

/// Build a [`RemoteError`] from a non-success HTTP response
pub(crate) fn remote_error_from_status(status: StatusCode, body: &str) -> RemoteError {
    let parsed: ErrorBody = serde_json::from_str(body).unwrap_or_default();
    let message = parsed
        .message
        .filter(|m| !m.is_empty())
        .unwrap_or_else(|| format!("HTTP {}: {}", status, body));

    if let Some(code) = parsed.code.filter(|c| !c.is_empty()) {
        // AWS-style "__type" values may carry a namespace prefix ("svc#Code")
        let code = code.rsplit('#').next().unwrap_or(&code).to_string();
        return RemoteError::new(code, message);
    }

    let code = match status {
        StatusCode::NOT_FOUND => codes::NOT_FOUND,
        StatusCode::CONFLICT => codes::ALREADY_EXISTS,
        StatusCode::TOO_MANY_REQUESTS => codes::THROTTLING,
        StatusCode::BAD_REQUEST | StatusCode::UNPROCESSABLE_ENTITY => codes::VALIDATION,
        StatusCode::SERVICE_UNAVAILABLE => codes::SERVICE_UNAVAILABLE,
        StatusCode::REQUEST_TIMEOUT | StatusCode::GATEWAY_TIMEOUT => codes::REQUEST_TIMEOUT,
        s if s.is_server_error() => codes::INTERNAL_FAILURE,
        s => return RemoteError::new(format!("Http{}", s.as_u16()), message),
    };
    RemoteError::new(code, message)
}

#[async_trait]
impl ControlPlane for HttpControlPlane {
    async fn describe_endpoint(
        &self,
        name: &EndpointName,
    ) -> std::result::Result<EndpointDescription, RemoteError> {
        let response = self
            .send(self.client.get(self.url(&format!("endpoints/{}", name))))
            .await?;
        let described: DescribeEndpointResponse = Self::json(response).await?;

        tracing::debug!("Endpoint '{}' status: {}", name, described.status);

        Ok(EndpointDescription {
            status: described.status,
            detail: described.failure_reason,
        })
    }

    async fn describe_endpoint_config(
        &self,
        name: &EndpointName,
    ) -> std::result::Result<bool, RemoteError> {
        let request = self
            .client
            .get(self.url(&format!("endpoint-configs/{}", name)));

        match self.send(request).await {
            Ok(_) => Ok(true),
            Err(e) if e.is_not_found() => Ok(false),
            Err(e) => Err(e),
        }
    }

    async fn create_endpoint(
        &self,
        name: &EndpointName,
        model: &ModelConfig,
    ) -> std::result::Result<(), RemoteError> {
        let body = CreateEndpointRequest {
            name: name.as_str(),
            model_id: &model.model_id,
            source_kind: model.source_kind,
            compute_class: &model.compute_class,
            region: &self.region,
            role_arn: self.role_arn.as_deref(),
            initial_instance_count: 1,
            accept_eula: true,
        };

        tracing::info!(
            "Requesting endpoint '{}' for model '{}' on {}",
            name,
            model.model_id,
            model.compute_class
        );

        self.send(self.client.post(self.url("endpoints")).json(&body))
            .await
            .map(|_| ())
    }

    async fn create_endpoint_from_config(
        &self,
        name: &EndpointName,
    ) -> std::result::Result<(), RemoteError> {
        tracing::info!("Requesting endpoint '{}' from existing configuration", name);

        self.send(
            self.client
                .post(self.url(&format!("endpoints/{}/from-config", name))),
        )
        .await
        .map(|_| ())
    }
}

#[async_trait]
impl DataPlane for HttpControlPlane {
    async fn invoke_endpoint(
        &self,
        name: &EndpointName,
        payload: &Value,
    ) -> std::result::Result<Value, RemoteError> {
        let response = self
            .send(
                self.client
                    .post(self.url(&format!("endpoints/{}/invocations", name)))
                    .json(payload),
            )
            .await?;
        Self::json(response).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_code_from_body() {
        let err = remote_error_from_status(
            StatusCode::BAD_REQUEST,
            r#"{"code": "ResourceLimitExceeded", "message": "account limit of 2 ml.g5.2xlarge"}"#,
        );
        assert_eq!(err.code, codes::RESOURCE_LIMIT_EXCEEDED);
        assert_eq!(err.message, "account limit of 2 ml.g5.2xlarge");

        let err = remote_error_from_status(
            StatusCode::BAD_REQUEST,
            r#"{
                "__type": "com.amazon.coral.service#ThrottlingException",
                "Message": "Rate exceeded"
            }"#,
        );
        assert_eq!(err.code, codes::THROTTLING);
        assert_eq!(err.message, "Rate exceeded");
    }

    #[test]
    fn test_error_code_from_status() {
        let cases = [
            (StatusCode::NOT_FOUND, codes::NOT_FOUND),
            (StatusCode::CONFLICT, codes::ALREADY_EXISTS),
            (StatusCode::TOO_MANY_REQUESTS, codes::THROTTLING),
            (StatusCode::BAD_REQUEST, codes::VALIDATION),
            (StatusCode::SERVICE_UNAVAILABLE, codes::SERVICE_UNAVAILABLE),
            (StatusCode::GATEWAY_TIMEOUT, codes::REQUEST_TIMEOUT),
            (StatusCode::BAD_GATEWAY, codes::INTERNAL_FAILURE),
        ];
        for (status, code) in cases {
            assert_eq!(remote_error_from_status(status, "oops").code, code, "{status}");
        }

        let err = remote_error_from_status(StatusCode::FORBIDDEN, "denied");
        assert_eq!(err.code, "Http403");
        assert!(err.message.contains("denied"));
    }

    #[test]
    fn test_new_builds_client() {
        let config = ControlPlaneConfig {
            base_url: "https://models.example.com/v1/".to_string(),
            ..Default::default()
        };
        let plane = HttpControlPlane::new(&config).unwrap();
        assert_eq!(
            plane.url("endpoints/abc"),
            "https://models.example.com/v1/endpoints/abc"
        );
    }
}
