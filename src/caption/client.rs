//! Vision model client.
//!
//! The [`VisionClient`] trait is the seam between caption generation and the
//! inference service, mirroring how [`ImageBackend`](crate::imaging::ImageBackend)
//! separates image operations from the code that plans them. The real
//! implementation speaks the Ollama HTTP API:
//!
//! - `GET  {endpoint}/api/tags` lists installed models
//! - `POST {endpoint}/api/generate` with `{model, prompt, images, stream: false}`
//!   answers `{"response": "..."}` or `{"error": "..."}`

use super::CaptionRequest;
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ClientError {
    #[error("cannot reach {endpoint}: {reason}")]
    Unreachable { endpoint: String, reason: String },
    #[error("model service error: {0}")]
    Endpoint(String),
    #[error("response has no 'response' field")]
    MissingField,
    #[error("malformed response: {0}")]
    Decode(String),
    #[error("model '{0}' is not installed")]
    ModelMissing(String),
}

/// An inference service that turns an image and a prompt into text.
pub trait VisionClient {
    /// Names of the models the service can run.
    fn list_models(&self) -> Result<Vec<String>, ClientError>;

    /// Run one caption request, returning the raw response text.
    fn generate(&self, request: &CaptionRequest) -> Result<String, ClientError>;
}

/// Fail unless `model` is installed.
///
/// Matching is by prefix on the model's base name, so `llava` accepts
/// `llava:latest` and `llava:13b`.
pub fn check_model(client: &impl VisionClient, model: &str) -> Result<(), ClientError> {
    let installed = client.list_models()?;
    if model_available(&installed, model) {
        Ok(())
    } else {
        Err(ClientError::ModelMissing(model.to_string()))
    }
}

fn model_available(installed: &[String], model: &str) -> bool {
    let base = model.split(':').next().unwrap_or(model);
    installed.iter().any(|name| name.starts_with(base))
}

#[derive(Serialize)]
struct GenerateRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    images: Vec<String>,
    stream: bool,
}

#[derive(Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    response: Option<String>,
    #[serde(default)]
    error: Option<String>,
}

#[derive(Deserialize)]
struct TagsResponse {
    #[serde(default)]
    models: Vec<ModelEntry>,
}

#[derive(Deserialize)]
struct ModelEntry {
    name: String,
}

impl GenerateResponse {
    fn into_text(self) -> Result<String, ClientError> {
        match (self.response, self.error) {
            (Some(text), _) if !text.is_empty() => Ok(text),
            (_, Some(error)) => Err(ClientError::Endpoint(error)),
            _ => Err(ClientError::MissingField),
        }
    }
}

/// Blocking client for a local Ollama service.
pub struct OllamaClient {
    agent: ureq::Agent,
    endpoint: String,
}

impl OllamaClient {
    pub fn new(endpoint: &str, timeout: Duration) -> Self {
        let agent = ureq::AgentBuilder::new()
            .timeout_connect(Duration::from_secs(5))
            .timeout(timeout)
            .build();
        Self {
            agent,
            endpoint: endpoint.trim_end_matches('/').to_string(),
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.endpoint, path)
    }

    /// Error statuses still carry a JSON body with an `error` field, so they
    /// are read like any other response.
    fn accept(&self, result: Result<ureq::Response, ureq::Error>) -> Result<ureq::Response, ClientError> {
        match result {
            Ok(response) => Ok(response),
            Err(ureq::Error::Status(_, response)) => Ok(response),
            Err(ureq::Error::Transport(transport)) => Err(ClientError::Unreachable {
                endpoint: self.endpoint.clone(),
                reason: transport.to_string(),
            }),
        }
    }
}

impl VisionClient for OllamaClient {
    fn list_models(&self) -> Result<Vec<String>, ClientError> {
        let response = self.accept(self.agent.get(&self.url("/api/tags")).call())?;
        if response.status() >= 400 {
            return Err(ClientError::Endpoint(format!(
                "listing models failed with status {}",
                response.status()
            )));
        }
        let tags: TagsResponse = response
            .into_json()
            .map_err(|e| ClientError::Decode(e.to_string()))?;
        Ok(tags.models.into_iter().map(|m| m.name).collect())
    }

    fn generate(&self, request: &CaptionRequest) -> Result<String, ClientError> {
        let body = GenerateRequest {
            model: &request.model,
            prompt: request.language.prompt(),
            images: vec![STANDARD.encode(&request.image)],
            stream: false,
        };
        let response = self.accept(self.agent.post(&self.url("/api/generate")).send_json(&body))?;
        let parsed: GenerateResponse = response
            .into_json()
            .map_err(|e| ClientError::Decode(e.to_string()))?;
        parsed.into_text()
    }
}
