//! Scripted transport shared by the unit tests.

use serde_json::Value;
use std::sync::{Arc, Mutex};

use crate::credentials::{Credentials, MemoryStore};
use crate::error::Result;
use crate::hooks::SessionHooks;
use crate::rest::ApiClient;
use crate::transport::{HttpRequest, HttpResponse, Transport, WireBody};
use crate::Config;

type Handler = Box<dyn Fn(&HttpRequest) -> Result<HttpResponse> + Send + Sync>;

pub(crate) struct MockTransport {
    handler: Handler,
    requests: Mutex<Vec<HttpRequest>>,
}

impl MockTransport {
    pub(crate) fn new<F>(handler: F) -> Arc<Self>
    where
        F: Fn(&HttpRequest) -> Result<HttpResponse> + Send + Sync + 'static,
    {
        Arc::new(MockTransport {
            handler: Box::new(handler),
            requests: Mutex::new(Vec::new()),
        })
    }

    pub(crate) fn requests(&self) -> Vec<HttpRequest> {
        self.requests.lock().unwrap().clone()
    }

    /// Number of requests sent to a URL path
    pub(crate) fn count(&self, path: &str) -> usize {
        self.requests
            .lock()
            .unwrap()
            .iter()
            .filter(|r| r.url.path() == path)
            .count()
    }

    pub(crate) fn last(&self) -> HttpRequest {
        self.requests.lock().unwrap().last().cloned().unwrap()
    }
}

impl Transport for MockTransport {
    fn execute(&self, request: &HttpRequest) -> Result<HttpResponse> {
        self.requests.lock().unwrap().push(request.clone());
        (self.handler)(request)
    }
}

pub(crate) fn header<'a>(request: &'a HttpRequest, name: &str) -> Option<&'a str> {
    request
        .headers
        .iter()
        .find(|(n, _)| n.eq_ignore_ascii_case(name))
        .map(|(_, v)| v.as_str())
}

pub(crate) fn body_json(request: &HttpRequest) -> Value {
    match &request.body {
        WireBody::Json(bytes) => serde_json::from_slice(bytes).unwrap(),
        other => panic!("expected JSON body, got {:?}", other),
    }
}

pub(crate) fn client(transport: Arc<MockTransport>) -> ApiClient {
    ApiClient::with_transport(Config::new("http://backend.test"), transport)
        .with_store(Arc::new(MemoryStore::new()))
        .with_hooks(SessionHooks::default())
}

pub(crate) fn logged_in(transport: Arc<MockTransport>) -> ApiClient {
    let client = client(transport);
    client
        .session()
        .save(&Credentials::new("old", "r1", serde_json::json!({"id": 1, "email": "ana@example.com"})))
        .unwrap();
    client
}
