//! Minimal HTTP wrapper shared by every provider adapter.
//!
//! Bounds every vendor call with a total timeout, a connect timeout and
//! a read-stall guard so one slow vendor cannot hang the whole failover
//! chain.

use crate::errors::{ProviderError, ProviderResult};
use reqwest_middleware::{ClientBuilder, ClientWithMiddleware};
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::time::Duration;
use url::Url;

/// Timeout budget for a single vendor request.
#[derive(Debug, Clone, Copy)]
pub struct HttpTimeouts {
    /// Whole-request deadline.
    pub total: Duration,
    /// TCP/TLS connect deadline.
    pub connect: Duration,
    /// Abort when no bytes arrive for this long mid-transfer.
    pub read_stall: Duration,
}

impl Default for HttpTimeouts {
    fn default() -> Self {
        Self {
            total: Duration::from_secs(30),
            connect: Duration::from_secs(10),
            read_stall: Duration::from_secs(15),
        }
    }
}

impl HttpTimeouts {
    /// Timeouts with a custom whole-request deadline.
    pub fn with_total(mut self, total: Duration) -> Self {
        self.total = total;
        self
    }
}

/// Thin client over `reqwest` with the timeout policy applied.
#[derive(Debug, Clone)]
pub struct HttpClient {
    inner: ClientWithMiddleware,
}

impl HttpClient {
    /// Build a client with the given timeout budget.
    pub fn new(timeouts: HttpTimeouts) -> ProviderResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeouts.total)
            .connect_timeout(timeouts.connect)
            .read_timeout(timeouts.read_stall)
            .build()
            .map_err(ProviderError::BuildHttpClient)?;
        Ok(Self {
            inner: ClientBuilder::new(client).build(),
        })
    }

    /// Build a client with the default timeout budget.
    pub fn with_defaults() -> ProviderResult<Self> {
        Self::new(HttpTimeouts::default())
    }

    /// GET returning the raw response body, regardless of status.
    ///
    /// Used by the plaintext handler-API dialect, which reports errors
    /// as 200-status text codes.
    pub async fn get_text(&self, url: Url) -> ProviderResult<String> {
        let response = self.inner.get(url).send().await?;
        response.text().await.map_err(ProviderError::ReadBody)
    }

    /// GET expecting a JSON body, with optional bearer auth.
    pub async fn get_json<T: DeserializeOwned>(
        &self,
        url: Url,
        bearer: Option<&str>,
    ) -> ProviderResult<T> {
        let mut request = self.inner.get(url);
        if let Some(token) = bearer {
            request = request.bearer_auth(token);
        }
        let response = request.send().await?;
        Self::json_body(response).await
    }

    /// POST a JSON body expecting a JSON response, with optional bearer
    /// auth and extra headers.
    pub async fn post_json<T: DeserializeOwned>(
        &self,
        url: Url,
        bearer: Option<&str>,
        headers: &[(&str, &str)],
        body: Option<&impl Serialize>,
    ) -> ProviderResult<T> {
        let mut request = self.inner.post(url);
        if let Some(token) = bearer {
            request = request.bearer_auth(token);
        }
        for (name, value) in headers {
            request = request.header(*name, *value);
        }
        if let Some(payload) = body {
            request = request.json(payload);
        }
        let response = request.send().await?;
        Self::json_body(response).await
    }

    /// POST without expecting a meaningful body; returns the HTTP status.
    pub async fn post_status(
        &self,
        url: Url,
        bearer: Option<&str>,
    ) -> ProviderResult<reqwest::StatusCode> {
        let mut request = self.inner.post(url);
        if let Some(token) = bearer {
            request = request.bearer_auth(token);
        }
        let response = request.send().await?;
        Ok(response.status())
    }

    /// POST a form-encoded body expecting a JSON response.
    pub async fn post_form<T: DeserializeOwned>(
        &self,
        url: Url,
        form: &[(&str, String)],
    ) -> ProviderResult<T> {
        let response = self.inner.post(url).form(form).send().await?;
        Self::json_body(response).await
    }

    async fn json_body<T: DeserializeOwned>(response: reqwest::Response) -> ProviderResult<T> {
        let status = response.status();
        let text = response.text().await.map_err(ProviderError::ReadBody)?;
        if !status.is_success() {
            if status == reqwest::StatusCode::UNAUTHORIZED
                || status == reqwest::StatusCode::FORBIDDEN
            {
                return Err(ProviderError::Auth);
            }
            return Err(ProviderError::Api {
                code: status.as_u16().to_string(),
                message: truncate(&text, 200),
            });
        }
        serde_json::from_str(&text).map_err(ProviderError::DeserializeJson)
    }
}

fn truncate(s: &str, max: usize) -> String {
    if s.len() <= max {
        s.to_string()
    } else {
        let mut end = max;
        while !s.is_char_boundary(end) {
            end -= 1;
        }
        format!("{}...", &s[..end])
    }
}
