//! Static catalog of deployable models
//!
//! Maps a model identifier to the parameters needed to provision an endpoint
//! for it. The catalog is built once and never mutated; share it behind an
//! `Arc` and look models up concurrently without locking.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::error::{Error, Result};

/// Where the model artifacts come from
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum SourceKind {
    /// Pre-packaged model from the platform's model catalog
    Catalog,
    /// Model served from a custom container image (e.g. a hub model id)
    CustomImage,
}

/// What the endpoint is used for
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum EndpointRole {
    Embedding,
    Inferencing,
}

impl EndpointRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            EndpointRole::Embedding => "embedding",
            EndpointRole::Inferencing => "inferencing",
        }
    }
}

/// Request body layout expected by the serving container
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum RequestShape {
    /// `{"text_inputs": ...}`
    TextInputs,
    /// `{"inputs": ...}`
    Inputs,
}

impl RequestShape {
    /// JSON key carrying the input text
    pub fn input_key(&self) -> &'static str {
        match self {
            RequestShape::TextInputs => "text_inputs",
            RequestShape::Inputs => "inputs",
        }
    }
}

/// Deployment parameters for one model
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ModelConfig {
    /// Model identifier (catalog id or hub id)
    pub model_id: String,
    /// Embedding or text generation
    pub role: EndpointRole,
    /// Artifact source
    pub source_kind: SourceKind,
    /// Instance type to deploy on (e.g., "ml.g5.2xlarge")
    pub compute_class: String,
    /// Embedding dimensionality; `None` for generation models
    #[serde(default)]
    pub output_dimension: Option<usize>,
    /// Input key expected by the container
    pub request_shape: RequestShape,
}

impl ModelConfig {
    fn embedding(
        model_id: &str,
        compute_class: &str,
        dimension: usize,
        shape: RequestShape,
    ) -> Self {
        Self {
            model_id: model_id.to_string(),
            role: EndpointRole::Embedding,
            source_kind: SourceKind::Catalog,
            compute_class: compute_class.to_string(),
            output_dimension: Some(dimension),
            request_shape: shape,
        }
    }

    fn inferencing(model_id: &str, source_kind: SourceKind, compute_class: &str) -> Self {
        Self {
            model_id: model_id.to_string(),
            role: EndpointRole::Inferencing,
            source_kind,
            compute_class: compute_class.to_string(),
            output_dimension: None,
            request_shape: RequestShape::Inputs,
        }
    }

    fn validate(&self) -> Result<()> {
        if self.model_id.trim().is_empty() {
            return Err(Error::config("model_id must not be empty"));
        }
        if self.compute_class.trim().is_empty() {
            return Err(Error::config(format!(
                "model '{}' has no compute_class",
                self.model_id
            )));
        }
        let has_dimension = matches!(self.output_dimension, Some(d) if d > 0);
        if self.role == EndpointRole::Embedding && !has_dimension {
            return Err(Error::config(format!(
                "embedding model '{}' needs a positive output_dimension",
                self.model_id
            )));
        }
        Ok(())
    }
}

/// Immutable model-id → [`ModelConfig`] table
#[derive(Debug, Clone)]
pub struct ModelCatalog {
    models: HashMap<String, ModelConfig>,
}

impl ModelCatalog {
    /// Catalog of the models supported out of the box
    pub fn builtin() -> Self {
        use RequestShape::*;
        use SourceKind::*;

        let models = [
            ModelConfig::embedding(
                "huggingface-sentencesimilarity-bge-large-en-v1-5",
                "ml.g5.2xlarge",
                1024,
                TextInputs,
            ),
            ModelConfig::embedding(
                "huggingface-sentencesimilarity-bge-m3",
                "ml.g5.2xlarge",
                1024,
                TextInputs,
            ),
            ModelConfig::embedding(
                "huggingface-textembedding-gte-qwen2-7b-instruct",
                "ml.g5.2xlarge",
                3584,
                Inputs,
            ),
            ModelConfig::inferencing(
                "meta-textgeneration-llama-3-1-8b-instruct",
                Catalog,
                "ml.g5.2xlarge",
            ),
            ModelConfig::inferencing(
                "huggingface-llm-falcon-7b-instruct-bf16",
                Catalog,
                "ml.g5.2xlarge",
            ),
            ModelConfig::inferencing(
                "meta-textgeneration-llama-3-3-70b-instruct",
                Catalog,
                "ml.p4d.24xlarge",
            ),
            ModelConfig::inferencing(
                "deepseek-ai/DeepSeek-R1-Distill-Llama-8B",
                CustomImage,
                "ml.g5.2xlarge",
            ),
            ModelConfig::inferencing(
                "deepseek-ai/DeepSeek-R1-Distill-Qwen-1.5B",
                CustomImage,
                "ml.g5.xlarge",
            ),
            ModelConfig::inferencing(
                "deepseek-ai/DeepSeek-R1-Distill-Qwen-7B",
                CustomImage,
                "ml.g5.xlarge",
            ),
            ModelConfig::inferencing(
                "deepseek-ai/DeepSeek-R1-Distill-Qwen-14B",
                CustomImage,
                "ml.g6e.12xlarge",
            ),
        ];

        Self {
            models: models
                .into_iter()
                .map(|m| (m.model_id.clone(), m))
                .collect(),
        }
    }

    /// Build a catalog from explicit entries, rejecting duplicates and invalid entries
    pub fn from_models(models: impl IntoIterator<Item = ModelConfig>) -> Result<Self> {
        let mut table = HashMap::new();
        for model in models {
            model.validate()?;
            if table.contains_key(&model.model_id) {
                return Err(Error::config(format!(
                    "duplicate catalog entry for model '{}'",
                    model.model_id
                )));
            }
            table.insert(model.model_id.clone(), model);
        }
        Ok(Self { models: table })
    }

    /// Extend this catalog, replacing entries that share a model id
    pub fn with_models(mut self, models: impl IntoIterator<Item = ModelConfig>) -> Result<Self> {
        for model in models {
            model.validate()?;
            if self.models.contains_key(&model.model_id) {
                tracing::info!("Overriding catalog entry for model '{}'", model.model_id);
            }
            self.models.insert(model.model_id.clone(), model);
        }
        Ok(self)
    }

    /// Look up a model's deployment parameters
    pub fn resolve(&self, model_id: &str) -> Result<&ModelConfig> {
        self.models
            .get(model_id)
            .ok_or_else(|| Error::UnknownModel(model_id.to_string()))
    }

    pub fn contains(&self, model_id: &str) -> bool {
        self.models.contains_key(model_id)
    }

    pub fn len(&self) -> usize {
        self.models.len()
    }

    pub fn is_empty(&self) -> bool {
        self.models.is_empty()
    }

    /// All entries serving the given role
    pub fn models_for(&self, role: EndpointRole) -> impl Iterator<Item = &ModelConfig> {
        self.models.values().filter(move |m| m.role == role)
    }
}

impl Default for ModelCatalog {
    fn default() -> Self {
        Self::builtin()
    }
}
