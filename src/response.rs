use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::case::Transformable;
use crate::error::Result;
use crate::transport::HttpResponse;

/// Decode a response body: empty bodies become `null`, bodies that are not
/// JSON become a string value.
pub(crate) fn decode_body(body: &[u8]) -> Value {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Value::Null;
    }
    serde_json::from_slice(body)
        .unwrap_or_else(|_| Value::String(String::from_utf8_lossy(body).trim().to_string()))
}

/// ApiResponse is a successful response after the response interceptor ran:
/// the payload uses the client's key casing.
#[derive(Debug, Clone, PartialEq)]
pub struct ApiResponse {
    /// HTTP status code
    pub status: u16,
    /// Response headers
    pub headers: Vec<(String, String)>,
    /// Payload with camelCase keys
    pub data: Value,
    /// X-Request-Id echoed by the backend, or the one we sent
    pub request_id: Option<String>,
}

impl ApiResponse {
    /// Run the success-path transform over a raw response
    pub fn from_http(response: HttpResponse) -> Self {
        let data = decode_body(&response.body).into_camel_keys();
        let request_id = response.header("X-Request-Id").map(|s| s.to_string());
        ApiResponse {
            status: response.status,
            headers: response.headers,
            data,
            request_id,
        }
    }

    /// Get the raw data value from the response
    pub fn raw(&self) -> &Value {
        &self.data
    }

    /// Apply unmarshals the response data into the provided type
    pub fn apply<T>(&self) -> Result<T>
    where
        T: serde::de::DeserializeOwned,
    {
        serde_json::from_value(self.data.clone()).map_err(|e| e.into())
    }

    /// Consume the response, unmarshaling its data
    pub fn into_data<T>(self) -> Result<T>
    where
        T: serde::de::DeserializeOwned,
    {
        serde_json::from_value(self.data).map_err(|e| e.into())
    }

    /// Get a value from the response data by a slash-separated path.
    /// For example, "user/firstName" would access the "firstName" field inside the "user" object.
    pub fn get(&self, path: &str) -> Option<&Value> {
        let parts = path.split('/').filter(|s| !s.is_empty());

        let mut current = &self.data;

        for part in parts {
            current = match current {
                Value::Object(map) => map.get(part)?,
                Value::Array(arr) => {
                    let index: usize = part.parse().ok()?;
                    arr.get(index)?
                }
                _ => return None,
            };
        }

        Some(current)
    }

    /// Get a string value from the response data by a slash-separated path
    pub fn get_string(&self, path: &str) -> Option<String> {
        self.get(path).and_then(|v| v.as_str().map(|s| s.to_string()))
    }
}

/// Page of results from a paginated listing endpoint
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Page<T> {
    /// Total number of matching items
    pub count: u64,
    /// URL of the next page
    pub next: Option<String>,
    /// URL of the previous page
    pub previous: Option<String>,
    pub results: Vec<T>,
}

impl<T> Page<T> {
    pub fn has_next(&self) -> bool {
        self.next.is_some()
    }
}
