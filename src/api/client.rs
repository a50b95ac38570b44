//! Authenticated HTTP client for the portal REST API
//!
//! Wraps reqwest::Client with bearer token injection and envelope decoding.

use std::sync::Arc;

use anyhow::{Context, Result};
use reqwest::Method;
use serde::de::DeserializeOwned;
use url::Url;

use super::envelope::Envelope;
use super::error::ApiError;
use crate::auth::SessionStore;
use crate::config::{Config, FileSessionStore};

/// Client for the portal backend. Cheap to share behind an `Arc`.
pub struct PortalClient {
    http: reqwest::Client,
    base: Url,
    session: Arc<dyn SessionStore>,
}

impl PortalClient {
    /// Build a client against `base_url` using the given session store.
    pub fn new(base_url: &str, session: Arc<dyn SessionStore>) -> Result<Self> {
        let base = Url::parse(base_url)
            .with_context(|| format!("Invalid API base URL: {}", base_url))?;
        Ok(Self {
            http: reqwest::Client::new(),
            base,
            session,
        })
    }

    /// Load config and build a client backed by the on-disk session.
    pub fn from_config() -> Result<Self> {
        let config = Config::load()?;
        Self::new(&config.api_base_url(), Arc::new(FileSessionStore))
    }

    /// Like `from_config`, but fails early when nobody is logged in.
    pub fn authenticated() -> Result<Self> {
        let client = Self::from_config()?;
        if client.session.token().is_none() {
            anyhow::bail!("Not logged in. Run 'portal-cli login' first.");
        }
        Ok(client)
    }

    pub fn base_url(&self) -> &Url {
        &self.base
    }

    pub fn session(&self) -> &Arc<dyn SessionStore> {
        &self.session
    }

    /// Resolve an endpoint path (e.g. `list_skill/`) against the base URL.
    pub fn endpoint(&self, path: &str) -> Result<Url, ApiError> {
        self.base
            .join(path.trim_start_matches('/'))
            .map_err(|e| ApiError::Decode {
                url: path.to_string(),
                reason: format!("bad endpoint path: {}", e),
            })
    }

    /// GET with query parameters.
    pub async fn get<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, String)],
    ) -> Result<Envelope<T>, ApiError> {
        self.request(Method::GET, path, query, None, true).await
    }

    /// POST a JSON body.
    pub async fn post<T: DeserializeOwned>(
        &self,
        path: &str,
        body: &serde_json::Value,
    ) -> Result<Envelope<T>, ApiError> {
        self.request(Method::POST, path, &[], Some(body), true).await
    }

    /// PUT a JSON body.
    pub async fn put<T: DeserializeOwned>(
        &self,
        path: &str,
        body: &serde_json::Value,
    ) -> Result<Envelope<T>, ApiError> {
        self.request(Method::PUT, path, &[], Some(body), true).await
    }

    /// DELETE a resource.
    pub async fn delete<T: DeserializeOwned>(&self, path: &str) -> Result<Envelope<T>, ApiError> {
        self.request(Method::DELETE, path, &[], None, true).await
    }

    /// POST without the bearer header (login).
    pub async fn post_public<T: DeserializeOwned>(
        &self,
        path: &str,
        body: &serde_json::Value,
    ) -> Result<Envelope<T>, ApiError> {
        self.request(Method::POST, path, &[], Some(body), false).await
    }

    async fn request<T: DeserializeOwned>(
        &self,
        method: Method,
        path: &str,
        query: &[(&str, String)],
        body: Option<&serde_json::Value>,
        auth: bool,
    ) -> Result<Envelope<T>, ApiError> {
        let url = self.endpoint(path)?;
        tracing::debug!("{} {}", method, url);

        let mut req = self.http.request(method.clone(), url.clone());
        if !query.is_empty() {
            req = req.query(query);
        }
        if auth {
            if let Some(token) = self.session.token() {
                req = req.bearer_auth(token);
            }
        }
        if let Some(body) = body {
            req = req.json(body);
        }

        let resp = req.send().await?;
        let status = resp.status().as_u16();
        let text = resp.text().await?;

        if !(200..300).contains(&status) {
            return Err(error_for_status(status, &text, url.as_str(), self.session.as_ref()));
        }

        decode_envelope(status, &text, url.as_str())
    }
}

/// Turn a failed response into an `ApiError`. A 401 also drops the stored session.
fn error_for_status(status: u16, body: &str, url: &str, session: &dyn SessionStore) -> ApiError {
    let err = ApiError::from_status(status, body, url);
    if err.is_unauthorized() {
        tracing::warn!("401 from {}; clearing stored session", url);
        if let Err(e) = session.clear() {
            tracing::warn!("Failed to clear session: {:#}", e);
        }
    } else {
        tracing::debug!("HTTP {} for {}: {}", status, url, body);
    }
    err
}

fn decode_envelope<T: DeserializeOwned>(
    status: u16,
    body: &str,
    url: &str,
) -> Result<Envelope<T>, ApiError> {
    if body.trim().is_empty() {
        return Ok(Envelope::empty(status));
    }
    serde_json::from_str(body).map_err(|e| ApiError::Decode {
        url: url.to_string(),
        reason: e.to_string(),
    })
}
