//! Wire-level request/response types and the seam that executes them.
//!
//! The client builds an [`HttpRequest`] after running its request
//! interceptor and hands it to a [`Transport`]. The default transport uses
//! a pooled reqwest blocking client; tests substitute scripted transports.

use reqwest::blocking::multipart::{Form, Part};
use reqwest::blocking::Client;
use reqwest::Method;
use std::time::Duration;
use url::Url;

use crate::client::{create_rest_client, Config};
use crate::error::{ApiError, Result};
use crate::request::FormPart;

/// Encoded body ready to be written to the wire
#[derive(Debug, Clone, PartialEq)]
pub enum WireBody {
    Empty,
    /// Serialized JSON, already in the backend's key casing
    Json(Vec<u8>),
    Multipart(Vec<FormPart>),
}

/// An HTTP request described as plain data
#[derive(Debug, Clone)]
pub struct HttpRequest {
    pub method: Method,
    pub url: Url,
    pub headers: Vec<(String, String)>,
    pub body: WireBody,
    pub timeout: Duration,
}

/// An HTTP response described as plain data
#[derive(Debug, Clone, PartialEq)]
pub struct HttpResponse {
    pub status: u16,
    pub headers: Vec<(String, String)>,
    pub body: Vec<u8>,
}

impl HttpResponse {
    /// Build a response with a JSON body
    pub fn json(status: u16, body: &serde_json::Value) -> Self {
        HttpResponse {
            status,
            headers: vec![("content-type".to_string(), "application/json".to_string())],
            body: body.to_string().into_bytes(),
        }
    }

    /// Build a response without a body
    pub fn empty(status: u16) -> Self {
        HttpResponse {
            status,
            headers: Vec::new(),
            body: Vec::new(),
        }
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Get a header value (case-insensitive name match)
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }
}

/// Executes wire requests.
///
/// Implementations return `Ok` for every HTTP status; `Err` is reserved for
/// failures where no response was received.
pub trait Transport: Send + Sync {
    fn execute(&self, request: &HttpRequest) -> Result<HttpResponse>;
}

/// Transport backed by a reqwest blocking client
#[derive(Debug, Clone)]
pub struct ReqwestTransport {
    client: Client,
}

impl ReqwestTransport {
    /// Create a transport with pooled connections configured from `config`
    pub fn new(config: &Config) -> Result<Self> {
        Ok(ReqwestTransport {
            client: create_rest_client(config)?,
        })
    }

    /// Wrap an existing reqwest client
    pub fn with_client(client: Client) -> Self {
        ReqwestTransport { client }
    }
}

fn build_form(parts: &[FormPart]) -> Result<Form> {
    let mut form = Form::new();
    for part in parts {
        form = match part {
            FormPart::Text { name, value } => form.text(name.clone(), value.clone()),
            FormPart::File {
                name,
                filename,
                mime_type,
                bytes,
            } => {
                let file = Part::bytes(bytes.clone())
                    .file_name(filename.clone())
                    .mime_str(mime_type)
                    .map_err(|e| ApiError::RequestBuild(format!("invalid MIME type {}: {}", mime_type, e)))?;
                form.part(name.clone(), file)
            }
        };
    }
    Ok(form)
}

impl Transport for ReqwestTransport {
    fn execute(&self, request: &HttpRequest) -> Result<HttpResponse> {
        let mut builder = self
            .client
            .request(request.method.clone(), request.url.clone())
            .timeout(request.timeout);

        for (name, value) in &request.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }

        builder = match &request.body {
            WireBody::Empty => builder,
            WireBody::Json(bytes) => builder.body(bytes.clone()),
            WireBody::Multipart(parts) => builder.multipart(build_form(parts)?),
        };

        let response = builder
            .send()
            .map_err(|e| ApiError::network(None, Some(Box::new(e))))?;
        let status = response.status().as_u16();
        let headers = response
            .headers()
            .iter()
            .filter_map(|(name, value)| {
                value
                    .to_str()
                    .ok()
                    .map(|v| (name.as_str().to_string(), v.to_string()))
            })
            .collect();
        let body = response
            .bytes()
            .map_err(|e| ApiError::network(Some(status), Some(Box::new(e))))?
            .to_vec();

        Ok(HttpResponse {
            status,
            headers,
            body,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_response_helpers() {
        let response = HttpResponse::json(201, &json!({"id": 1}));
        assert!(response.is_success());
        assert_eq!(response.header("Content-Type"), Some("application/json"));
        assert_eq!(response.body, br#"{"id":1}"#.to_vec());

        let response = HttpResponse::empty(401);
        assert!(!response.is_success());
        assert!(response.header("content-type").is_none());
    }

    #[test]
    fn test_build_form_rejects_bad_mime() {
        let parts = vec![FormPart::file("image", "a.png", "not a mime", vec![1, 2, 3])];
        assert!(matches!(build_form(&parts), Err(ApiError::RequestBuild(_))));
    }

    #[test]
    fn test_build_form() {
        let parts = vec![
            FormPart::text("is_primary", "true"),
            FormPart::file("image", "a.png", "image/png", vec![1, 2, 3]),
        ];
        assert!(build_form(&parts).is_ok());
    }
}
