//! HTTP transport

use async_trait::async_trait;
use automato_core::{Transport, TransportError};
use indexmap::IndexMap;
use reqwest::{Client, Method};
use serde::Deserialize;
use serde_json::Value;
use std::time::Duration;
use tracing::{debug, error};

/// `type: http`
#[derive(Debug, Clone, Deserialize)]
pub struct HttpTransportConfig {
    /// Base address, e.g. `http://host1.lan:8080`
    pub address: String,

    /// Basic auth user
    #[serde(default)]
    pub user: Option<String>,

    #[serde(default)]
    pub password: Option<String>,

    /// Headers sent with every request
    #[serde(default)]
    pub headers: IndexMap<String, String>,

    #[serde(default)]
    pub user_agent: Option<String>,

    /// Path requested with `HEAD` by the transport check
    #[serde(default = "default_validation_path")]
    pub validation_path: String,

    /// Request timeout in seconds
    #[serde(default = "default_timeout")]
    pub timeout: u64,
}

fn default_validation_path() -> String {
    "/".to_string()
}

fn default_timeout() -> u64 {
    30
}

fn default_method() -> String {
    "GET".to_string()
}

/// One request relative to the transport's base address
#[derive(Debug, Clone, Deserialize)]
pub struct HttpRequest {
    #[serde(default = "default_method")]
    pub method: String,

    #[serde(default)]
    pub path: String,

    /// Merged over the transport's default headers
    #[serde(default)]
    pub headers: IndexMap<String, String>,

    /// A string is sent as-is, anything else as JSON
    #[serde(default)]
    pub body: Option<Value>,

    /// Query parameters
    #[serde(default)]
    pub params: serde_json::Map<String, Value>,
}

impl HttpRequest {
    pub fn new(method: impl Into<String>, path: impl Into<String>) -> Self {
        Self {
            method: method.into(),
            path: path.into(),
            headers: IndexMap::new(),
            body: None,
            params: serde_json::Map::new(),
        }
    }
}

/// Status and body of a completed request
#[derive(Debug, Clone)]
pub struct HttpResponse {
    pub status: u16,
    pub body: String,
}

impl HttpResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    pub fn json(&self) -> Result<Value, serde_json::Error> {
        serde_json::from_str(&self.body)
    }
}

/// Stateless HTTP client bound to a base address
#[derive(Debug)]
pub struct HttpTransport {
    client: Client,
    config: HttpTransportConfig,
    timeout: Duration,
}

impl HttpTransport {
    pub fn new(config: HttpTransportConfig) -> Result<Self, TransportError> {
        let timeout = Duration::from_secs(config.timeout);
        let mut builder = Client::builder().timeout(timeout);
        if let Some(ref agent) = config.user_agent {
            builder = builder.user_agent(agent.clone());
        }

        let client = builder
            .build()
            .map_err(|e| TransportError::Config(e.to_string()))?;

        Ok(Self {
            client,
            config,
            timeout,
        })
    }

    pub fn address(&self) -> &str {
        &self.config.address
    }

    /// Send a request; any received status is a successful transport round trip
    pub async fn request(&self, request: &HttpRequest) -> Result<HttpResponse, TransportError> {
        let method = Method::from_bytes(request.method.to_uppercase().as_bytes())
            .map_err(|_| TransportError::Config(format!("invalid method '{}'", request.method)))?;
        let url = join_url(&self.config.address, &request.path);
        debug!(method = %method, url = %url, "HTTP request");

        let mut builder = self.client.request(method.clone(), &url);

        for (name, value) in merge_headers(&self.config.headers, &request.headers) {
            builder = builder.header(name, value);
        }

        if let Some(ref user) = self.config.user {
            builder = builder.basic_auth(user, self.config.password.as_ref());
        }

        if !request.params.is_empty() {
            builder = builder.query(&query_pairs(&request.params));
        }

        builder = match request.body {
            Some(Value::String(ref raw)) => builder.body(raw.clone()),
            Some(ref body) => builder.json(body),
            None => builder,
        };

        let response = builder.send().await.map_err(|e| {
            error!(method = %method, url = %url, error = %e, "HTTP request failed");
            self.map_error(e)
        })?;

        let status = response.status().as_u16();
        let body = response.text().await.map_err(|e| self.map_error(e))?;

        Ok(HttpResponse { status, body })
    }

    fn map_error(&self, e: reqwest::Error) -> TransportError {
        if e.is_timeout() {
            TransportError::Timeout(self.timeout)
        } else {
            TransportError::Connection(e.to_string())
        }
    }
}

#[async_trait]
impl Transport for HttpTransport {
    fn kind(&self) -> &'static str {
        "http"
    }

    async fn check(&self) -> Result<(), TransportError> {
        let response = self
            .request(&HttpRequest::new("HEAD", self.config.validation_path.clone()))
            .await?;
        debug!(
            path = %self.config.validation_path,
            status = response.status,
            "HTTP transport checked"
        );

        if response.is_success() {
            Ok(())
        } else {
            Err(TransportError::Status(response.status))
        }
    }
}

/// Join base and path with exactly one slash
fn join_url(base: &str, path: &str) -> String {
    format!(
        "{}/{}",
        base.trim_end_matches('/'),
        path.trim_start_matches('/')
    )
}

fn merge_headers(
    defaults: &IndexMap<String, String>,
    overrides: &IndexMap<String, String>,
) -> IndexMap<String, String> {
    let mut merged = defaults.clone();
    for (name, value) in overrides {
        merged.insert(name.clone(), value.clone());
    }
    merged
}

fn query_pairs(params: &serde_json::Map<String, Value>) -> Vec<(String, String)> {
    params
        .iter()
        .map(|(k, v)| {
            let value = match v {
                Value::String(s) => s.clone(),
                other => other.to_string(),
            };
            (k.clone(), value)
        })
        .collect()
}
