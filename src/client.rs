use crate::error::{ApiError, Result};
use reqwest::blocking::{Client, ClientBuilder};
use std::time::Duration;
use url::Url;

/// Create the HTTP client used for API requests
/// with connection pooling and a connect timeout.
/// Per-request timeouts are applied by the transport.
pub fn create_rest_client(config: &Config) -> Result<Client> {
    ClientBuilder::new()
        .pool_max_idle_per_host(50)
        .timeout(config.timeout)
        .connect_timeout(config.connect_timeout)
        .build()
        .map_err(ApiError::from)
}

/// Backend endpoints that do not live under the resource prefix.
#[derive(Debug, Clone)]
pub struct AuthEndpoints {
    pub login: String,
    pub registration: String,
    pub refresh: String,
    pub logout: String,
    pub verify_registration: String,
    /// Token-based verification under the resource prefix
    pub verify_email: String,
    pub password_reset: String,
    pub password_reset_confirm: String,
}

impl Default for AuthEndpoints {
    fn default() -> Self {
        AuthEndpoints {
            login: "/auth/login/".to_string(),
            registration: "/auth/registration/".to_string(),
            refresh: "/auth/token/refresh/".to_string(),
            logout: "/auth/logout/".to_string(),
            verify_registration: "/auth/registration/verify-email/".to_string(),
            verify_email: "/api/users/verify-email/".to_string(),
            password_reset: "/auth/password/reset/".to_string(),
            password_reset_confirm: "/auth/password/reset/confirm/".to_string(),
        }
    }
}

/// Configuration for the API client
#[derive(Debug, Clone)]
pub struct Config {
    /// Backend origin, e.g. `http://localhost:8000`
    pub base_url: String,
    /// Prefix for resource endpoints
    pub api_prefix: String,
    /// Authentication endpoints (unprefixed)
    pub auth: AuthEndpoints,
    /// Path fragments exempt from refresh and forced logout on 401
    pub excluded_endpoints: Vec<String>,
    /// Route handed to the session-expired callback
    pub login_route: String,
    /// Default timeout for a single HTTP exchange
    pub timeout: Duration,
    /// TCP connect timeout
    pub connect_timeout: Duration,
}

impl Default for Config {
    fn default() -> Self {
        let auth = AuthEndpoints::default();
        let excluded_endpoints = vec![
            "/users/complete_profile/".to_string(),
            auth.login.clone(),
            auth.registration.clone(),
            auth.refresh.clone(),
            auth.logout.clone(),
        ];
        Config {
            base_url: "http://localhost:8000".to_string(),
            api_prefix: "/api".to_string(),
            auth,
            excluded_endpoints,
            login_route: "/login".to_string(),
            timeout: Duration::from_secs(30),
            connect_timeout: Duration::from_secs(10),
        }
    }
}

impl Config {
    /// Create a new configuration pointing at the given backend origin
    pub fn new(base_url: impl Into<String>) -> Self {
        Config {
            base_url: base_url.into(),
            ..Config::default()
        }
    }

    /// Build a configuration from `VHARA_API_URL` and `VHARA_API_TIMEOUT_SECS`,
    /// falling back to defaults for anything unset or unparsable.
    pub fn from_env() -> Self {
        let mut config = Config::default();
        if let Ok(url) = std::env::var("VHARA_API_URL") {
            if !url.trim().is_empty() {
                config.base_url = url.trim().to_string();
            }
        }
        if let Some(secs) = std::env::var("VHARA_API_TIMEOUT_SECS")
            .ok()
            .and_then(|v| v.trim().parse::<u64>().ok())
        {
            config.timeout = Duration::from_secs(secs);
        }
        config
    }

    /// Set the default request timeout
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Add a path fragment to the excluded-endpoint list
    pub fn with_excluded_endpoint(mut self, fragment: impl Into<String>) -> Self {
        self.excluded_endpoints.push(fragment.into());
        self
    }

    /// Set the route reported when the session expires
    pub fn with_login_route(mut self, route: impl Into<String>) -> Self {
        self.login_route = route.into();
        self
    }

    /// Get the base URL without a trailing slash
    pub fn base_url(&self) -> &str {
        self.base_url.trim_end_matches('/')
    }

    /// Resolve an endpoint path into an absolute URL.
    ///
    /// Paths under `/auth/` or already carrying the API prefix are joined to
    /// the origin as-is; everything else is placed under the API prefix.
    pub fn resolve(&self, path: &str) -> Result<Url> {
        let path = if path.starts_with('/') {
            path.to_string()
        } else {
            format!("/{}", path)
        };
        let prefix = self.api_prefix.trim_end_matches('/');
        let full = if path.starts_with("/auth/") || path.starts_with(&format!("{}/", prefix)) {
            format!("{}{}", self.base_url(), path)
        } else {
            format!("{}{}{}", self.base_url(), prefix, path)
        };
        Ok(Url::parse(&full)?)
    }

    /// Check whether a resolved URL path is exempt from forced logout
    pub fn is_excluded(&self, path: &str) -> bool {
        self.excluded_endpoints
            .iter()
            .any(|fragment| path.contains(fragment.as_str()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_prefixes_resource_paths() {
        let config = Config::new("http://localhost:8000/");
        let url = config.resolve("/products/12/").unwrap();
        assert_eq!(url.as_str(), "http://localhost:8000/api/products/12/");

        let url = config.resolve("users/me/").unwrap();
        assert_eq!(url.as_str(), "http://localhost:8000/api/users/me/");
    }

    #[test]
    fn test_resolve_keeps_auth_and_prefixed_paths() {
        let config = Config::new("http://localhost:8000");
        let url = config.resolve("/auth/login/").unwrap();
        assert_eq!(url.as_str(), "http://localhost:8000/auth/login/");

        let url = config.resolve("/api/users/verify-email/abc/").unwrap();
        assert_eq!(url.as_str(), "http://localhost:8000/api/users/verify-email/abc/");
    }

    #[test]
    fn test_resolve_rejects_bad_base() {
        let config = Config::new("not a url");
        assert!(matches!(config.resolve("/products/"), Err(ApiError::UrlParse(_))));
    }

    #[test]
    fn test_excluded_endpoints() {
        let config = Config::default();
        assert!(config.is_excluded("/api/users/complete_profile/"));
        assert!(config.is_excluded("/auth/token/refresh/"));
        assert!(config.is_excluded("/auth/logout/"));
        assert!(!config.is_excluded("/api/users/me/"));

        let config = config.with_excluded_endpoint("/users/upload_picture/");
        assert!(config.is_excluded("/api/users/upload_picture/"));
    }
}
