//! JSON documents fetched over HTTP

use async_trait::async_trait;
use automato_core::{CollectionError, StateMap, StateSource, TransportError, PATH_SEPARATOR};
use serde::Deserialize;
use serde_json::Value;
use std::sync::Arc;

use crate::transport::{HttpRequest, HttpTransport};

fn default_method() -> String {
    "GET".to_string()
}

/// `type: http_json`
#[derive(Debug, Clone, Deserialize)]
pub struct HttpJsonStateConfig {
    #[serde(default = "default_method")]
    pub method: String,

    pub path: String,

    /// Dotted path to the part of the document exposed as state
    #[serde(default)]
    pub json_path: Option<String>,

    #[serde(default)]
    pub params: serde_json::Map<String, Value>,
}

/// Key used when the selected document is not an object
const SCALAR_KEY: &str = "value";

pub struct HttpJsonState {
    transport: Arc<HttpTransport>,
    config: HttpJsonStateConfig,
}

impl HttpJsonState {
    pub fn new(transport: Arc<HttpTransport>, config: HttpJsonStateConfig) -> Self {
        Self { transport, config }
    }
}

#[async_trait]
impl StateSource for HttpJsonState {
    async fn collect(&self) -> Result<StateMap, CollectionError> {
        let mut request = HttpRequest::new(self.config.method.clone(), self.config.path.clone());
        request.params = self.config.params.clone();

        let response = self.transport.request(&request).await?;
        if !response.is_success() {
            return Err(TransportError::Status(response.status).into());
        }

        let document = response
            .json()
            .map_err(|e| CollectionError::InvalidData(format!("invalid JSON: {}", e)))?;

        let selected = match self.config.json_path {
            Some(ref path) => select(&document, path).ok_or_else(|| {
                CollectionError::InvalidData(format!("'{}' not found in response", path))
            })?,
            None => document,
        };

        Ok(into_state_map(selected))
    }
}

/// Walk a dotted path through objects and arrays
fn select(document: &Value, path: &str) -> Option<Value> {
    path.split(PATH_SEPARATOR)
        .filter(|p| !p.is_empty())
        .try_fold(document, |node, part| match node {
            Value::Object(map) => map.get(part),
            Value::Array(items) => part.parse::<usize>().ok().and_then(|i| items.get(i)),
            _ => None,
        })
        .cloned()
}

fn into_state_map(value: Value) -> StateMap {
    match value {
        Value::Object(map) => map.into_iter().collect(),
        other => StateMap::from([(SCALAR_KEY.to_string(), other)]),
    }
}
