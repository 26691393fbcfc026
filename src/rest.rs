use reqwest::Method;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{json, Value};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};
use url::Url;

use crate::case::{to_snake_case, Transformable};
use crate::client::Config;
use crate::credentials::{CredentialStore, MemoryStore, Session};
use crate::error::{ApiError, Result};
use crate::error_map::map_error;
use crate::hooks::{SessionHooks, SESSION_EXPIRED_NOTICE};
use crate::request::{ApiRequest, CancelToken, RequestBody};
use crate::response::{decode_body, ApiResponse};
use crate::transport::{HttpRequest, HttpResponse, ReqwestTransport, Transport, WireBody};

/// Client for the marketplace REST API.
///
/// Runs every request through the request interceptor (bearer token, key
/// casing), executes it on the configured transport, and runs the response
/// interceptor: camelCase payloads on success; on a 401, one token refresh
/// followed by one retry; everything else mapped to an [`ApiError`].
///
/// Clones share the transport, credential store, hooks and refresh gate.
#[derive(Clone)]
pub struct ApiClient {
    config: Config,
    transport: Arc<dyn Transport>,
    session: Session,
    hooks: SessionHooks,
    refresh_gate: Arc<Mutex<RefreshState>>,
}

/// State guarded by the refresh gate
#[derive(Debug, Default)]
struct RefreshState {
    /// Access token whose refresh failed, with the failure message
    expired: Option<(String, String)>,
}

impl std::fmt::Debug for ApiClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApiClient")
            .field("config", &self.config)
            .field("session", &self.session)
            .field("hooks", &self.hooks)
            .finish()
    }
}

impl ApiClient {
    /// Create a client with the reqwest transport and an in-memory store
    pub fn new(config: Config) -> Result<Self> {
        let transport = ReqwestTransport::new(&config)?;
        Ok(Self::with_transport(config, Arc::new(transport)))
    }

    /// Create a client on a custom transport with an in-memory store
    pub fn with_transport(config: Config, transport: Arc<dyn Transport>) -> Self {
        ApiClient {
            config,
            transport,
            session: Session::new(Arc::new(MemoryStore::new())),
            hooks: SessionHooks::default(),
            refresh_gate: Arc::new(Mutex::new(RefreshState::default())),
        }
    }

    /// Set the credential store
    pub fn with_store(mut self, store: Arc<dyn CredentialStore>) -> Self {
        self.session = Session::new(store);
        self
    }

    /// Set the notification and session-expired callbacks
    pub fn with_hooks(mut self, hooks: SessionHooks) -> Self {
        self.hooks = hooks;
        self
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Stored credentials
    pub fn session(&self) -> &Session {
        &self.session
    }

    /// Execute a request and return the camelCased response
    pub fn send(&self, mut request: ApiRequest) -> Result<ApiResponse> {
        let url = self.config.resolve(&request.path)?;
        let path = url.path().to_string();
        let response = self.dispatch(&mut request, url)?;

        if response.is_success() {
            return Ok(ApiResponse::from_http(response));
        }

        if response.status == 401
            && !request.retried
            && self.session.has_user()
            && !self.config.is_excluded(&path)
        {
            request.retried = true;
            info!(path = %path, request_id = %request.request_id, "access token rejected, refreshing");

            let token = self.refresh_after_unauthorized(&path, &request)?;
            request.set_bearer(&token);
            return self.send(request);
        }

        let error = map_error(response.status, &path, &response.body);
        debug!(
            status = response.status,
            path = %path,
            kind = ?error.kind(),
            message = %error.message(),
            "API error"
        );
        Err(error)
    }

    /// Execute a request and unmarshal the response data into the target type
    pub fn apply<T>(&self, request: ApiRequest) -> Result<T>
    where
        T: DeserializeOwned,
    {
        self.send(request)?.into_data()
    }

    /// GET a path and unmarshal the response
    pub fn get<T>(&self, path: &str) -> Result<T>
    where
        T: DeserializeOwned,
    {
        self.apply(ApiRequest::get(path))
    }

    /// POST a JSON body and unmarshal the response
    pub fn post<T, B>(&self, path: &str, body: &B) -> Result<T>
    where
        T: DeserializeOwned,
        B: Serialize + ?Sized,
    {
        self.apply(ApiRequest::post(path).json(body)?)
    }

    /// PUT a JSON body and unmarshal the response
    pub fn put<T, B>(&self, path: &str, body: &B) -> Result<T>
    where
        T: DeserializeOwned,
        B: Serialize + ?Sized,
    {
        self.apply(ApiRequest::put(path).json(body)?)
    }

    /// PATCH a JSON body and unmarshal the response
    pub fn patch<T, B>(&self, path: &str, body: &B) -> Result<T>
    where
        T: DeserializeOwned,
        B: Serialize + ?Sized,
    {
        self.apply(ApiRequest::patch(path).json(body)?)
    }

    /// DELETE a path, discarding any response body
    pub fn delete(&self, path: &str) -> Result<()> {
        self.send(ApiRequest::delete(path)).map(|_| ())
    }

    /// Exchange the stored refresh token for a new access token.
    ///
    /// Fails with [`ApiError::NoRefreshToken`] without touching the network
    /// when no refresh token is stored. Does not clear the session on
    /// failure; that only happens on the 401 path of [`ApiClient::send`].
    pub fn refresh_access_token(&self) -> Result<String> {
        let _gate = lock(&self.refresh_gate);
        self.perform_refresh(None, self.config.timeout)
    }

    /// Request interceptor: bearer token, request id, key casing
    fn intercept_request(&self, request: &mut ApiRequest, mut url: Url) -> Result<HttpRequest> {
        // load() drops a partial session, so only a complete one is used
        if let Some(credentials) = self.session.load()? {
            request.set_bearer(&credentials.access);
        }
        let request_id = request.request_id.to_string();
        request.set_header("X-Request-Id", request_id);
        request.set_header("Accept", "application/json");

        if !request.query.is_empty() {
            let mut pairs = url.query_pairs_mut();
            for (key, value) in &request.query {
                pairs.append_pair(&to_snake_case(key), value);
            }
        }

        let body = match &request.body {
            RequestBody::Empty => WireBody::Empty,
            RequestBody::Json(value) => WireBody::Json(serde_json::to_vec(&value.clone().into_snake_keys())?),
            RequestBody::Multipart(parts) => WireBody::Multipart(parts.clone()),
        };
        if matches!(body, WireBody::Json(_)) {
            request.set_header("Content-Type", "application/json");
        }

        Ok(HttpRequest {
            method: request.method.clone(),
            url,
            headers: request.headers.clone(),
            body,
            timeout: request.timeout.unwrap_or(self.config.timeout),
        })
    }

    fn dispatch(&self, request: &mut ApiRequest, url: Url) -> Result<HttpResponse> {
        if request.is_cancelled() {
            return Err(ApiError::Cancelled);
        }
        let wire = self.intercept_request(request, url)?;

        let start = Instant::now();
        let response = self.transport.execute(&wire).map_err(|e| {
            warn!(
                method = %wire.method,
                path = %wire.url.path(),
                request_id = %request.request_id,
                error = %e,
                "request failed"
            );
            e
        })?;
        debug!(
            method = %wire.method,
            path = %wire.url.path(),
            status = response.status,
            elapsed = ?start.elapsed(),
            request_id = %request.request_id,
            retried = request.retried,
            "request completed"
        );
        Ok(response)
    }

    /// Refresh on behalf of a request whose token was rejected.
    ///
    /// Refreshes are serialized by the gate. A waiter that finds the stored
    /// token already replaced since it sent its request reuses the new one;
    /// a waiter whose token already failed to refresh gets
    /// [`ApiError::SessionExpired`] without another refresh or logout.
    /// A failed refresh clears the session while the gate is held.
    fn refresh_after_unauthorized(&self, path: &str, request: &ApiRequest) -> Result<String> {
        let mut state = lock(&self.refresh_gate);
        let stale = request.bearer();

        if let (Some(stale), Some((token, message))) = (stale, &state.expired) {
            if stale == token {
                debug!(path = %path, "session already expired by a concurrent request");
                return Err(ApiError::SessionExpired {
                    source: Box::new(ApiError::Unauthorized {
                        message: message.clone(),
                    }),
                });
            }
        }
        if let Some(current) = self.session.access_token() {
            if stale != Some(current.as_str()) {
                debug!("access token already refreshed by a concurrent request");
                return Ok(current);
            }
        }

        let timeout = request.timeout.unwrap_or(self.config.timeout);
        match self.perform_refresh(request.cancel.as_ref(), timeout) {
            Ok(token) => {
                state.expired = None;
                Ok(token)
            }
            Err(ApiError::Cancelled) => Err(ApiError::Cancelled),
            Err(error) => {
                if let Some(stale) = stale {
                    state.expired = Some((stale.to_string(), error.message()));
                }
                self.expire_session(path, &error);
                Err(ApiError::SessionExpired {
                    source: Box::new(error),
                })
            }
        }
    }

    fn perform_refresh(&self, cancel: Option<&CancelToken>, timeout: Duration) -> Result<String> {
        let refresh = self.session.refresh_token().ok_or(ApiError::NoRefreshToken)?;
        if cancel.is_some_and(CancelToken::is_cancelled) {
            return Err(ApiError::Cancelled);
        }

        let url = self.config.resolve(&self.config.auth.refresh)?;
        let path = url.path().to_string();
        let wire = HttpRequest {
            method: Method::POST,
            url,
            headers: vec![
                ("Content-Type".to_string(), "application/json".to_string()),
                ("Accept".to_string(), "application/json".to_string()),
            ],
            body: WireBody::Json(serde_json::to_vec(&json!({ "refresh": refresh }))?),
            timeout,
        };

        let response = self.transport.execute(&wire)?;
        if !response.is_success() {
            let error = map_error(response.status, &path, &response.body);
            warn!(status = response.status, message = %error.message(), "token refresh rejected");
            return Err(error);
        }

        let data = decode_body(&response.body);
        let access = data
            .get("access")
            .and_then(Value::as_str)
            .filter(|t| !t.is_empty())
            .ok_or_else(|| ApiError::Unauthorized {
                message: "token refresh response did not include an access token".to_string(),
            })?;
        let rotated = data
            .get("refresh")
            .and_then(Value::as_str)
            .filter(|t| !t.is_empty());

        self.session.update_tokens(access, rotated)?;
        info!(rotated = rotated.is_some(), "access token refreshed");
        Ok(access.to_string())
    }

    /// Terminal-auth side effects: drop credentials, tell the user, hand
    /// control to the host's login route
    fn expire_session(&self, path: &str, cause: &ApiError) {
        warn!(path = %path, cause = %cause, "token refresh failed, logging out");
        if let Err(e) = self.session.clear() {
            warn!(error = %e, "failed to clear stored credentials");
        }
        self.hooks.notify(SESSION_EXPIRED_NOTICE);
        self.hooks.session_expired(&self.config.login_route);
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}
