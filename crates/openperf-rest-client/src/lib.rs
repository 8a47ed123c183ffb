// SPDX-License-Identifier: Apache-2.0

//! The TVLP worker's internal REST client (spec.md section 2, item 7; section
//! 4.5.2): loopback HTTP + JSON is the *only* way the TVLP machinery commands
//! another module, exactly as it would a remote client hitting the REST
//! surface of spec.md section 6.2.
//!
//! Every generator module's REST surface is uniform, so this client is
//! generic over a `module_path` (e.g. `"cpu-generators"`) rather than having
//! one method set per module kind; it speaks in `serde_json::Value` since the
//! TVLP result vector is itself untyped JSON (spec.md section 3.6).

use serde::Serialize;
use serde_json::Value;

/// Errors from a loopback REST call.
#[derive(thiserror::Error, Debug)]
pub enum ClientError {
    /// The HTTP transport itself failed (connection refused, timed out, …).
    #[error("request to {url} failed: {source}")]
    Transport {
        /// The URL that was being requested.
        url: String,
        #[source]
        source: reqwest::Error,
    },

    /// The module server answered with a non-2xx status.
    #[error("{method} {url} returned {status}: {body}")]
    Status {
        /// HTTP method used.
        method: &'static str,
        /// The URL that was requested.
        url: String,
        /// The response status code.
        status: u16,
        /// The response body, for diagnostics.
        body: String,
    },

    /// The response body was not valid JSON, or not shaped as expected.
    #[error("failed to decode response from {url}: {source}")]
    Decode {
        /// The URL whose response failed to decode.
        url: String,
        #[source]
        source: serde_json::Error,
    },
}

/// A small JSON-over-HTTP client against this process's own REST facade.
#[derive(Clone)]
pub struct RestClient {
    base_url: String,
    http: reqwest::Client,
}

impl RestClient {
    /// Creates a client targeting `base_url` (e.g. `http://127.0.0.1:8080`).
    #[must_use]
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            http: reqwest::Client::new(),
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// `POST <path>` with an already-assembled JSON body, verbatim. Used by
    /// the YAML config-file bootstrap (spec.md section 6.4), whose entries
    /// are POSTed to their REST endpoint exactly as translated from YAML.
    pub async fn post_raw(&self, path: &str, body: &Value) -> Result<Value, ClientError> {
        self.post_json(path, body).await
    }

    /// `POST /<module_path>` — create a generator (spec.md section 6.2).
    /// `id` of `None` lets the module assign a random one.
    pub async fn create_generator(
        &self,
        module_path: &str,
        id: Option<&str>,
        config: &Value,
    ) -> Result<Value, ClientError> {
        #[derive(Serialize)]
        struct Body<'a> {
            #[serde(skip_serializing_if = "Option::is_none")]
            id: Option<&'a str>,
            config: &'a Value,
        }
        self.post_json(&format!("/{module_path}"), &Body { id, config }).await
    }

    /// `POST /<module_path>/:id/start`.
    pub async fn start(
        &self,
        module_path: &str,
        id: &str,
        dynamic_results: Option<&Value>,
    ) -> Result<Value, ClientError> {
        self.post_json(&format!("/{module_path}/{id}/start"), &dynamic_results).await
    }

    /// `POST /<module_path>/:id/stop`.
    pub async fn stop(&self, module_path: &str, id: &str) -> Result<(), ClientError> {
        self.post_no_body(&format!("/{module_path}/{id}/stop")).await
    }

    /// `POST /<module_path>/x/toggle`.
    pub async fn toggle(
        &self,
        module_path: &str,
        out_id: &str,
        in_id: &str,
        dynamic_results: Option<&Value>,
    ) -> Result<Value, ClientError> {
        #[derive(Serialize)]
        struct Body<'a> {
            replace: &'a str,
            with: &'a str,
            #[serde(skip_serializing_if = "Option::is_none")]
            dynamic_results: Option<&'a Value>,
        }
        self.post_json(
            &format!("/{module_path}/x/toggle"),
            &Body { replace: out_id, with: in_id, dynamic_results },
        )
        .await
    }

    /// `DELETE /<module_path>/:id`.
    pub async fn delete_generator(&self, module_path: &str, id: &str) -> Result<(), ClientError> {
        self.delete(&format!("/{module_path}/{id}")).await
    }

    /// `GET /<results_path>/:id` — fetches the current stats snapshot for a result.
    pub async fn get_result(&self, results_path: &str, id: &str) -> Result<Value, ClientError> {
        self.get_json(&format!("/{results_path}/{id}")).await
    }

    async fn post_json<B: Serialize + ?Sized>(&self, path: &str, body: &B) -> Result<Value, ClientError> {
        let url = self.url(path);
        let response = self
            .http
            .post(&url)
            .json(body)
            .send()
            .await
            .map_err(|source| ClientError::Transport { url: url.clone(), source })?;
        Self::parse_json(response, "POST", url).await
    }

    async fn post_no_body(&self, path: &str) -> Result<(), ClientError> {
        let url = self.url(path);
        let response = self
            .http
            .post(&url)
            .send()
            .await
            .map_err(|source| ClientError::Transport { url: url.clone(), source })?;
        Self::expect_success(response, "POST", url).await
    }

    async fn delete(&self, path: &str) -> Result<(), ClientError> {
        let url = self.url(path);
        let response = self
            .http
            .delete(&url)
            .send()
            .await
            .map_err(|source| ClientError::Transport { url: url.clone(), source })?;
        Self::expect_success(response, "DELETE", url).await
    }

    async fn get_json(&self, path: &str) -> Result<Value, ClientError> {
        let url = self.url(path);
        let response = self
            .http
            .get(&url)
            .send()
            .await
            .map_err(|source| ClientError::Transport { url: url.clone(), source })?;
        Self::parse_json(response, "GET", url).await
    }

    async fn parse_json(response: reqwest::Response, method: &'static str, url: String) -> Result<Value, ClientError> {
        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|source| ClientError::Transport { url: url.clone(), source })?;
        if !status.is_success() {
            return Err(ClientError::Status { method, url, status: status.as_u16(), body });
        }
        if body.is_empty() {
            return Ok(Value::Null);
        }
        serde_json::from_str(&body).map_err(|source| ClientError::Decode { url, source })
    }

    async fn expect_success(response: reqwest::Response, method: &'static str, url: String) -> Result<(), ClientError> {
        let status = response.status();
        if status.is_success() {
            return Ok(());
        }
        let body = response.text().await.unwrap_or_default();
        Err(ClientError::Status { method, url, status: status.as_u16(), body })
    }
}
