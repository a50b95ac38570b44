//! Same-origin media proxy
//!
//! `GET /media?url=<remote>` fetches a file from the API host and streams it back,
//! so attachment and avatar URLs can be served from the client's own origin.
//! Any other host or port is refused, including as a redirect target.

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::{Context, Result};
use axum::{
    body::Body,
    extract::{Extension, Query},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::get,
    Router,
};
use serde::Deserialize;
use thiserror::Error;
use url::Url;

use crate::config::Config;

#[derive(Debug, Error)]
pub enum ProxyError {
    #[error("missing url parameter")]
    MissingUrl,

    #[error("invalid url: {0}")]
    InvalidUrl(String),

    #[error("scheme not allowed: {0}")]
    ForbiddenScheme(String),

    #[error("host not allowed: {0}")]
    ForbiddenHost(String),

    #[error("upstream request failed: {0}")]
    Upstream(String),
}

impl ProxyError {
    fn status(&self) -> StatusCode {
        match self {
            ProxyError::MissingUrl | ProxyError::InvalidUrl(_) => StatusCode::BAD_REQUEST,
            ProxyError::ForbiddenScheme(_) | ProxyError::ForbiddenHost(_) => StatusCode::FORBIDDEN,
            ProxyError::Upstream(_) => StatusCode::BAD_GATEWAY,
        }
    }
}

impl IntoResponse for ProxyError {
    fn into_response(self) -> Response {
        (self.status(), self.to_string()).into_response()
    }
}

/// Check that `raw` is an http(s) URL on the same origin as `api_base`.
pub fn validate_target(raw: Option<&str>, api_base: &Url) -> Result<Url, ProxyError> {
    let raw = raw
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .ok_or(ProxyError::MissingUrl)?;
    let target = Url::parse(raw).map_err(|e| ProxyError::InvalidUrl(e.to_string()))?;

    if !matches!(target.scheme(), "http" | "https") {
        return Err(ProxyError::ForbiddenScheme(target.scheme().to_string()));
    }

    check_origin(&target, api_base)?;
    Ok(target)
}

/// Host and port (explicit or scheme default) must both match the API's.
fn check_origin(target: &Url, api_base: &Url) -> Result<(), ProxyError> {
    let host = target.host_str().unwrap_or_default();
    let allowed = api_base.host_str().unwrap_or_default();
    if host.is_empty() || !host.eq_ignore_ascii_case(allowed) {
        return Err(ProxyError::ForbiddenHost(host.to_string()));
    }
    if target.port_or_known_default() != api_base.port_or_known_default() {
        let port = target.port_or_known_default().unwrap_or_default();
        return Err(ProxyError::ForbiddenHost(format!("{}:{}", host, port)));
    }
    Ok(())
}

/// Redirect hops followed on the API origin before giving up.
const MAX_REDIRECTS: usize = 5;

/// HTTP client that only follows redirects staying on the API origin.
/// A redirect anywhere else is returned to the caller unfollowed.
fn upstream_client(api_base: &Url) -> reqwest::Result<reqwest::Client> {
    let api_base = api_base.clone();
    let policy = reqwest::redirect::Policy::custom(move |attempt| {
        if attempt.previous().len() >= MAX_REDIRECTS {
            attempt.error("too many redirects")
        } else if !matches!(attempt.url().scheme(), "http" | "https") {
            attempt.stop()
        } else if let Err(e) = check_origin(attempt.url(), &api_base) {
            tracing::warn!("Not following redirect to {}: {}", attempt.url(), e);
            attempt.stop()
        } else {
            attempt.follow()
        }
    });
    reqwest::Client::builder().redirect(policy).build()
}

struct ProxyState {
    http: reqwest::Client,
    api_base: Url,
}

#[derive(Debug, Deserialize)]
struct MediaQuery {
    url: Option<String>,
}

/// Router exposing `/media`, restricted to the origin of `api_base`.
pub fn media_routes(api_base: Url) -> Result<Router> {
    let http = upstream_client(&api_base).context("Failed to build proxy HTTP client")?;
    let state = Arc::new(ProxyState { http, api_base });
    Ok(Router::new()
        .route("/media", get(media))
        .layer(Extension(state)))
}

async fn media(
    Query(query): Query<MediaQuery>,
    Extension(state): Extension<Arc<ProxyState>>,
) -> Result<Response, ProxyError> {
    let target = validate_target(query.url.as_deref(), &state.api_base)?;
    tracing::debug!("Proxying {}", target);

    let upstream = state
        .http
        .get(target.clone())
        .send()
        .await
        .map_err(|e| ProxyError::Upstream(e.to_string()))?;

    let status = StatusCode::from_u16(upstream.status().as_u16()).unwrap_or(StatusCode::BAD_GATEWAY);
    let content_type = upstream
        .headers()
        .get(reqwest::header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("application/octet-stream")
        .to_string();

    if !status.is_success() {
        tracing::warn!("Upstream {} answered {}", target, status);
    }

    Response::builder()
        .status(status)
        .header(header::CONTENT_TYPE, content_type)
        .body(Body::from_stream(upstream.bytes_stream()))
        .map_err(|e| ProxyError::Upstream(e.to_string()))
}

/// Serve the media proxy on `addr` until the process is stopped.
pub async fn serve(addr: SocketAddr) -> Result<()> {
    let config = Config::load()?;
    let base = config.api_base_url();
    let api_base = Url::parse(&base).with_context(|| format!("Invalid API base URL: {}", base))?;

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;
    tracing::info!(
        "Media proxy on http://{}/media for host {}",
        addr,
        api_base.host_str().unwrap_or_default()
    );
    println!("Media proxy listening on http://{}/media", addr);

    axum::serve(listener, media_routes(api_base)?)
        .await
        .context("Media proxy server failed")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base() -> Url {
        Url::parse("https://api.example.com/api/").unwrap()
    }

    fn state_for(api_base: Url) -> Extension<Arc<ProxyState>> {
        Extension(Arc::new(ProxyState {
            http: upstream_client(&api_base).unwrap(),
            api_base,
        }))
    }

    fn state() -> Extension<Arc<ProxyState>> {
        state_for(base())
    }

    /// Serve `router` on an ephemeral port of 127.0.0.1.
    async fn spawn_server(router: Router) -> SocketAddr {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, router).await.unwrap();
        });
        addr
    }

    async fn fetch(url: String, state: Extension<Arc<ProxyState>>) -> (StatusCode, String) {
        let resp = match media(Query(MediaQuery { url: Some(url) }), state).await {
            Ok(resp) => resp,
            Err(e) => e.into_response(),
        };
        let status = resp.status();
        let body = axum::body::to_bytes(resp.into_body(), usize::MAX).await.unwrap();
        (status, String::from_utf8_lossy(&body).into_owned())
    }

    #[test]
    fn test_same_host_allowed() {
        let url = validate_target(Some("https://api.example.com/media/cv.pdf"), &base()).unwrap();
        assert_eq!(url.path(), "/media/cv.pdf");
        assert!(validate_target(Some("http://API.example.com/media/a.png"), &base()).is_ok());
    }

    #[test]
    fn test_rejections() {
        assert!(matches!(validate_target(None, &base()), Err(ProxyError::MissingUrl)));
        assert!(matches!(
            validate_target(Some("not a url"), &base()),
            Err(ProxyError::InvalidUrl(_))
        ));
        assert!(matches!(
            validate_target(Some("https://evil.example.net/x"), &base()),
            Err(ProxyError::ForbiddenHost(_))
        ));
        assert!(matches!(
            validate_target(Some("ftp://api.example.com/x"), &base()),
            Err(ProxyError::ForbiddenScheme(_))
        ));
        assert!(matches!(
            validate_target(Some("file:///etc/passwd"), &base()),
            Err(ProxyError::ForbiddenScheme(_))
        ));
    }

    #[test]
    fn test_port_must_match_api_origin() {
        assert!(validate_target(Some("https://api.example.com:443/a.png"), &base()).is_ok());
        assert!(matches!(
            validate_target(Some("https://api.example.com:6379/"), &base()),
            Err(ProxyError::ForbiddenHost(_))
        ));
        assert!(matches!(
            validate_target(Some("http://api.example.com/a.png"), &base()),
            Err(ProxyError::ForbiddenHost(_))
        ));
    }

    #[tokio::test]
    async fn test_redirect_to_other_host_is_not_followed() {
        let secret =
            spawn_server(Router::new().route("/secret", get(|| async { "INTERNAL-SECRET" }))).await;
        let elsewhere = format!("http://localhost:{}/secret", secret.port());

        let api = spawn_server(
            Router::new()
                .route(
                    "/media/away",
                    get(move || {
                        let to = elsewhere.clone();
                        async move { (StatusCode::TEMPORARY_REDIRECT, [(header::LOCATION, to)]) }
                    }),
                )
                .route(
                    "/media/moved",
                    get(|| async {
                        (StatusCode::TEMPORARY_REDIRECT, [(header::LOCATION, "/media/file")])
                    }),
                )
                .route("/media/file", get(|| async { "PDF-BYTES" })),
        )
        .await;
        let api_base = Url::parse(&format!("http://127.0.0.1:{}/api/", api.port())).unwrap();

        let away = format!("http://127.0.0.1:{}/media/away", api.port());
        let (status, body) = fetch(away, state_for(api_base.clone())).await;
        assert_eq!(status, StatusCode::TEMPORARY_REDIRECT);
        assert!(!body.contains("INTERNAL-SECRET"));

        let moved = format!("http://127.0.0.1:{}/media/moved", api.port());
        let (status, body) = fetch(moved, state_for(api_base)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, "PDF-BYTES");
    }

    #[tokio::test]
    async fn test_handler_status_codes() {
        let missing = media(Query(MediaQuery { url: None }), state())
            .await
            .unwrap_err()
            .into_response();
        assert_eq!(missing.status(), StatusCode::BAD_REQUEST);

        let foreign = media(
            Query(MediaQuery {
                url: Some("https://evil.example.net/x.png".to_string()),
            }),
            state(),
        )
        .await
        .unwrap_err()
        .into_response();
        assert_eq!(foreign.status(), StatusCode::FORBIDDEN);
    }
}
