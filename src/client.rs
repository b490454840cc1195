use std::collections::VecDeque;
use std::sync::Mutex;
use std::{env, time::Duration};

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder};
use serde::Deserialize;
use serde_json::Value;

use crate::error::ProbeError;
use crate::types::CompletionRequest;

const DEFAULT_BASE_URL: &str = "http://localhost:8000/v1";
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// One chat-completion round trip. Implementations return the raw response
/// payload; interpretation belongs to the classifier.
#[async_trait]
pub trait ChatEndpoint: Send + Sync {
    async fn complete(&self, request: &CompletionRequest) -> Result<Value, ProbeError>;

    fn name(&self) -> &'static str;
}

#[derive(Debug, Clone)]
pub struct EndpointConfig {
    pub base_url: String,
    pub api_key: String,
    pub request_timeout: Duration,
}

impl EndpointConfig {
    pub fn new() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            api_key: String::new(),
            request_timeout: DEFAULT_TIMEOUT,
        }
    }

    /// Local servers hand out throwaway keys, so every field has a default
    /// and the environment only overrides what it sets.
    pub fn from_env() -> Self {
        let mut config = Self::new();

        if let Ok(base_url) = env::var("TOOLPROBE_BASE_URL") {
            config.base_url = base_url;
        }
        if let Ok(api_key) = env::var("TOOLPROBE_API_KEY") {
            config.api_key = api_key;
        }
        if let Ok(secs) = env::var("TOOLPROBE_TIMEOUT_SECS") {
            if let Ok(secs) = secs.parse::<u64>() {
                config.request_timeout = Duration::from_secs(secs);
            }
        }

        config
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    pub fn with_api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = api_key.into();
        self
    }

    pub fn with_timeout(mut self, request_timeout: Duration) -> Self {
        self.request_timeout = request_timeout;
        self
    }
}

impl Default for EndpointConfig {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Clone)]
pub struct EndpointClient {
    client: Client,
    config: EndpointConfig,
}

impl EndpointClient {
    pub fn from_config(config: EndpointConfig) -> Result<Self, ProbeError> {
        let client = Client::builder().timeout(config.request_timeout).build()?;

        Ok(Self { client, config })
    }

    pub fn from_env() -> Result<Self, ProbeError> {
        Self::from_config(EndpointConfig::from_env())
    }

    fn endpoint(&self, path: &str) -> String {
        format!(
            "{}/{}",
            self.config.base_url.trim_end_matches('/'),
            path.trim_start_matches('/')
        )
    }

    fn with_auth(&self, builder: RequestBuilder) -> RequestBuilder {
        if self.config.api_key.is_empty() {
            builder
        } else {
            builder.bearer_auth(&self.config.api_key)
        }
    }
}

#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    error: EndpointError,
}

#[derive(Debug, Deserialize)]
struct EndpointError {
    message: String,
}

#[async_trait]
impl ChatEndpoint for EndpointClient {
    async fn complete(&self, request: &CompletionRequest) -> Result<Value, ProbeError> {
        let builder = self
            .with_auth(self.client.post(self.endpoint("chat/completions")))
            .json(request);

        let response = builder.send().await?;
        let status = response.status();

        if !status.is_success() {
            let text = response.text().await?;
            let message = serde_json::from_str::<ErrorEnvelope>(&text)
                .map(|envelope| envelope.error.message)
                .unwrap_or(text);

            return Err(ProbeError::Server {
                status: status.as_u16(),
                message,
            });
        }

        Ok(response.json().await?)
    }

    fn name(&self) -> &'static str {
        "http"
    }
}

/// Canned endpoint for offline runs and tests: pops one queued payload per
/// request and records every request it sees.
pub struct ScriptedEndpoint {
    payloads: Mutex<VecDeque<Value>>,
    requests: Mutex<Vec<CompletionRequest>>,
}

impl ScriptedEndpoint {
    pub fn new(payloads: impl IntoIterator<Item = Value>) -> Self {
        Self {
            payloads: Mutex::new(payloads.into_iter().collect()),
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn requests(&self) -> Vec<CompletionRequest> {
        self.requests
            .lock()
            .map(|requests| requests.clone())
            .unwrap_or_default()
    }
}

#[async_trait]
impl ChatEndpoint for ScriptedEndpoint {
    async fn complete(&self, request: &CompletionRequest) -> Result<Value, ProbeError> {
        if let Ok(mut requests) = self.requests.lock() {
            requests.push(request.clone());
        }

        let payload = self
            .payloads
            .lock()
            .ok()
            .and_then(|mut payloads| payloads.pop_front());

        payload.ok_or(ProbeError::InvalidResponse("no more scripted payloads"))
    }

    fn name(&self) -> &'static str {
        "scripted"
    }
}
