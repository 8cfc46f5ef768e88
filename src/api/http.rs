//! Implements the `Transport` trait with `reqwest`.

use crate::api::{HttpRequest, HttpResponse, Method, Transport};
use crate::error::{ClientError, Res};
use anyhow::Context;
use tracing::trace;
use url::Url;

/// Sends requests to the API at `base_url`. No timeout is configured beyond `reqwest`'s defaults.
pub struct HttpTransport {
    http: reqwest::Client,
    base_url: Url,
}

impl HttpTransport {
    pub fn new(base_url: &str) -> crate::Result<Self> {
        Ok(Self {
            http: reqwest::Client::new(),
            base_url: parse_base_url(base_url)?,
        })
    }
}

/// Parses the base URL, making sure it ends with `/` so that joining a relative path appends to
/// it instead of replacing its last segment.
pub(crate) fn parse_base_url(base_url: &str) -> crate::Result<Url> {
    let mut url =
        Url::parse(base_url).with_context(|| format!("Invalid base URL '{base_url}'"))?;
    if url.cannot_be_a_base() {
        anyhow::bail!("The base URL '{base_url}' cannot have paths appended to it");
    }
    if !url.path().ends_with('/') {
        let path = format!("{}/", url.path());
        url.set_path(&path);
    }
    Ok(url)
}

#[async_trait::async_trait]
impl Transport for HttpTransport {
    async fn send(&self, request: HttpRequest) -> Res<HttpResponse> {
        let url = self
            .base_url
            .join(request.path.trim_start_matches('/'))
            .map_err(|e| {
                ClientError::request_failed(None, format!("Invalid endpoint {}: {e}", request.path))
            })?;
        trace!("{} {url}", request.method);

        let method = match request.method {
            Method::Get => reqwest::Method::GET,
            Method::Post => reqwest::Method::POST,
            Method::Put => reqwest::Method::PUT,
            Method::Patch => reqwest::Method::PATCH,
            Method::Delete => reqwest::Method::DELETE,
        };

        let mut builder = self.http.request(method, url);
        for (name, value) in &request.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }
        if let Some(body) = request.body {
            builder = builder.body(body);
        }

        let response = builder.send().await.map_err(|e| {
            ClientError::request_failed(None, format!("Unable to reach the server: {e}"))
        })?;
        let status = response.status().as_u16();
        let body = response.text().await.map_err(|e| {
            ClientError::request_failed(Some(status), format!("Unable to read the response: {e}"))
        })?;
        Ok(HttpResponse { status, body })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_base_url_adds_slash() {
        let url = parse_base_url("https://example.com/backend").unwrap();
        assert_eq!(url.as_str(), "https://example.com/backend/");
        let joined = url.join("api/finanzas/ingresos/").unwrap();
        assert_eq!(
            joined.as_str(),
            "https://example.com/backend/api/finanzas/ingresos/"
        );
    }

    #[test]
    fn test_parse_base_url_root() {
        let url = parse_base_url("http://localhost:8000").unwrap();
        assert_eq!(url.as_str(), "http://localhost:8000/");
    }

    #[test]
    fn test_parse_base_url_invalid() {
        assert!(parse_base_url("not a url").is_err());
        assert!(parse_base_url("mailto:someone@example.com").is_err());
    }

    #[tokio::test]
    async fn test_unreachable_server_is_request_failed() {
        // Port 9 (discard) on localhost is essentially never listening for HTTP.
        let transport = HttpTransport::new("http://127.0.0.1:9").unwrap();
        let request = HttpRequest {
            method: Method::Get,
            path: "api/finanzas/ingresos/".into(),
            headers: vec![],
            body: None,
        };
        let err = transport.send(request).await.unwrap_err();
        assert!(matches!(err, ClientError::RequestFailed { status: None, .. }));
    }
}
