//! Deterministic endpoint naming
//!
//! The endpoint name is derived purely from the model id, so every caller
//! provisioning the same model targets the same remote resource. The name is
//! the idempotency key for concurrent creation.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::catalog::EndpointRole;

/// Maximum endpoint name length accepted by the platform
pub const MAX_ENDPOINT_NAME_LEN: usize = 63;

/// Sanitized id length kept in front of the role suffix
const EMBEDDING_PREFIX_LEN: usize = 44;
const INFERENCING_PREFIX_LEN: usize = 42;

/// Canonical name of a remote endpoint
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EndpointName(String);

impl EndpointName {
    /// Sanitize an arbitrary string into a valid endpoint name
    ///
    /// Characters outside `[A-Za-z0-9-]` become `-`, a leading non-letter gets
    /// an `n` prefix, and the result is capped at [`MAX_ENDPOINT_NAME_LEN`].
    pub fn sanitize(raw: &str) -> Self {
        let mut name: String = raw
            .chars()
            .map(|c| if c.is_ascii_alphanumeric() || c == '-' { c } else { '-' })
            .collect();

        if !name.starts_with(|c: char| c.is_ascii_alphabetic()) {
            name.insert(0, 'n');
        }

        // All characters are ASCII at this point
        name.truncate(MAX_ENDPOINT_NAME_LEN);
        Self(name)
    }

    /// Name of the endpoint serving `model_id` in the given role
    ///
    /// e.g. `huggingface-sentencesimilarity-bge-m3-embedding-endpoint`
    pub fn for_model(model_id: &str, role: EndpointRole) -> Self {
        let prefix_len = match role {
            EndpointRole::Embedding => EMBEDDING_PREFIX_LEN,
            EndpointRole::Inferencing => INFERENCING_PREFIX_LEN,
        };
        let mut prefix = Self::sanitize(model_id).0;
        prefix.truncate(prefix_len);

        Self(format!("{}-{}-endpoint", prefix, role.as_str()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

impl fmt::Display for EndpointName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for EndpointName {
    fn as_ref(&self) -> &str {
        &self.0
    }
}
