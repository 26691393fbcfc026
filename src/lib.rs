//! # vhara - API client for the Vhara rental marketplace
//!
//! A Rust client for the Vhara REST backend. It takes care of the plumbing
//! every call needs: bearer authentication, transparent access-token refresh,
//! conversion between the client's camelCase and the backend's snake_case,
//! and turning failed responses into a single user-facing message.
//!
//! ## Features
//!
//! - Session persistence through a pluggable [`CredentialStore`]
//!   (in-memory or a JSON file)
//! - One retry after a 401, with concurrent refreshes collapsed into one
//! - Forced logout and a session-expired callback when the refresh fails
//! - Endpoint-aware error messages for validation and state conflicts
//! - Typed helpers for the auth, product and user endpoints
//!
//! ## Basic Usage
//!
//! ```no_run
//! use vhara::{ApiClient, Config, FileStore, Page};
//! use serde::Deserialize;
//! use std::sync::Arc;
//!
//! #[derive(Deserialize)]
//! #[serde(rename_all = "camelCase")]
//! struct Product {
//!     id: u64,
//!     title: String,
//!     product_type: String,
//! }
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let client = ApiClient::new(Config::new("http://localhost:8000"))?
//!         .with_store(Arc::new(FileStore::open("session.json")?));
//!
//!     client.auth().login("ana@example.com", "secret", true)?;
//!
//!     let page: Page<Product> = client.products().list(&[("category", "camping")])?;
//!     for product in page.results {
//!         println!("{} {} ({})", product.id, product.title, product.product_type);
//!     }
//!     Ok(())
//! }
//! ```
//!
//! ## Session Hooks
//!
//! ```no_run
//! use vhara::{ApiClient, Config, SessionHooks};
//!
//! let hooks = SessionHooks::new()
//!     .with_notify(|message| eprintln!("{}", message))
//!     .with_session_expired(|route| println!("redirect to {}", route));
//!
//! let client = ApiClient::new(Config::from_env())?.with_hooks(hooks);
//! # Ok::<(), vhara::ApiError>(())
//! ```

pub mod auth;
pub mod case;
pub mod client;
pub mod credentials;
pub mod error;
pub mod error_map;
pub mod hooks;
pub mod products;
pub mod request;
pub mod response;
pub mod rest;
pub mod transport;
pub mod users;

#[cfg(test)]
mod testing;

// Re-export main types for convenience
pub use auth::{Auth, AuthOutcome};
pub use case::{to_camel_case, to_snake_case, Transformable};
pub use client::{AuthEndpoints, Config};
pub use credentials::{CredentialStore, Credentials, FileStore, MemoryStore, Session};
pub use error::{ApiError, ErrorKind, Result};
pub use error_map::map_error;
pub use hooks::SessionHooks;
pub use products::{DurationUnit, ImageFile, Products};
pub use request::{ApiRequest, CancelToken, FormPart, RequestBody};
pub use response::{ApiResponse, Page};
pub use rest::ApiClient;
pub use transport::{HttpRequest, HttpResponse, ReqwestTransport, Transport, WireBody};
pub use users::Users;

// Re-export serde_json for convenience
pub use serde_json::json;
