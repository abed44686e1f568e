use std::time::{Duration, Instant};

use reqwest::RequestBuilder;
use serde_json::Value;
use tracing::{debug, warn};

use crate::config::ApiConfig;
use crate::error::Error;
use crate::metrics::{Metrics, MetricsRecorder};

/// Shared HTTP plumbing for the serverless functions.
#[derive(Clone)]
pub struct ApiClient {
    base: String,
    api_key: Option<String>,
    timeout: Option<Duration>,
    http: reqwest::Client,
    metrics: Metrics,
}

pub(crate) fn build_http_client(timeout: Option<Duration>) -> Result<reqwest::Client, Error> {
    let mut builder = reqwest::Client::builder();
    if let Some(timeout) = timeout {
        builder = builder.timeout(timeout);
    }
    Ok(builder.build()?)
}

/// Returns the response on a 2xx status, otherwise a `Network` error carrying the
/// status and the body.
pub(crate) async fn ensure_success(
    response: reqwest::Response,
    operation: &'static str,
) -> Result<reqwest::Response, Error> {
    if response.status().is_success() {
        return Ok(response);
    }
    let status = response.status().as_u16();
    let body = response.text().await.unwrap_or_default();
    Err(Error::Network {
        operation,
        status: Some(status),
        detail: body,
    })
}

/// Reads the body as JSON. A body that is not JSON at all is the only shape
/// problem reported as an error; field-level problems are handled by the models.
pub(crate) async fn read_json(
    response: reqwest::Response,
    operation: &'static str,
) -> Result<Value, Error> {
    let body = response.text().await.map_err(|e| Error::Network {
        operation,
        status: None,
        detail: format!("Error reading response body: {}", e),
    })?;
    if body.trim().is_empty() {
        return Ok(Value::Null);
    }
    serde_json::from_str(&body)
        .map_err(|e| Error::Validation(format!("{} returned non-JSON body: {}", operation, e)))
}

impl ApiClient {
    pub fn new(config: &ApiConfig, metrics: Metrics) -> Result<Self, Error> {
        let timeout = config.timeout_in_ms.map(Duration::from_millis);
        Ok(ApiClient {
            base: config.base().to_string(),
            api_key: config.api_key.clone().filter(|k| !k.is_empty()),
            timeout,
            http: build_http_client(timeout)?,
            metrics,
        })
    }

    pub fn endpoint(&self, path: &str) -> String {
        format!("{}/{}", self.base, path.trim_start_matches('/'))
    }

    pub fn api_key(&self) -> Option<&str> {
        self.api_key.as_deref()
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.timeout
    }

    pub fn metrics(&self) -> &Metrics {
        &self.metrics
    }

    /// POSTs `body` to `{base}/{path}` with the bearer token and returns the JSON reply.
    pub async fn post_json(
        &self,
        path: &'static str,
        operation: &'static str,
        bearer: &str,
        body: &Value,
    ) -> Result<Value, Error> {
        let request = self.http.post(self.endpoint(path)).json(body);
        self.send(path, operation, bearer, request).await
    }

    async fn send(
        &self,
        path: &'static str,
        operation: &'static str,
        bearer: &str,
        request: RequestBuilder,
    ) -> Result<Value, Error> {
        let mut request = request.bearer_auth(bearer);
        if let Some(key) = &self.api_key {
            request = request.header("apikey", key);
        }

        debug!(endpoint = path, operation, "calling serverless function");
        let start = Instant::now();
        let result = async {
            let response = request.send().await.map_err(|e| Error::Network {
                operation,
                status: e.status().map(|s| s.as_u16()),
                detail: e.to_string(),
            })?;
            let response = ensure_success(response, operation).await?;
            read_json(response, operation).await
        }
        .await;

        self.metrics
            .record_remote_duration(path, start.elapsed().as_secs_f64());
        match &result {
            Ok(_) => self.metrics.record_remote_call(path, "success"),
            Err(e) => {
                self.metrics.record_remote_call(path, "failure");
                warn!(
                    event_name = "api.call.failed",
                    event_domain = "api",
                    endpoint = path,
                    error = %e,
                    "serverless function call failed"
                );
            }
        }
        result
    }
}
