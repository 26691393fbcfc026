use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::{info, warn};

use crate::credentials::Credentials;
use crate::error::{ApiError, Result};
use crate::request::ApiRequest;
use crate::rest::ApiClient;

#[derive(Debug, Deserialize)]
struct TokenPair {
    access: String,
    refresh: String,
}

/// Body shared by the login, registration and verification endpoints
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct AuthPayload {
    message: Option<String>,
    detail: Option<String>,
    user: Option<Value>,
    tokens: Option<TokenPair>,
}

/// Result of an endpoint that may or may not sign the user in
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AuthOutcome {
    /// Message shown to the user, if the backend sent one
    pub message: Option<String>,
    /// Profile of the affected user
    pub user: Option<Value>,
    /// Credentials were issued and stored
    pub authenticated: bool,
}

/// Authentication endpoints.
///
/// Every operation that receives a token pair together with a user record
/// stores them as the current session.
#[derive(Debug, Clone, Copy)]
pub struct Auth<'a> {
    client: &'a ApiClient,
}

impl ApiClient {
    /// Authentication endpoints
    pub fn auth(&self) -> Auth<'_> {
        Auth { client: self }
    }
}

impl<'a> Auth<'a> {
    fn store(&self, payload: AuthPayload) -> Result<AuthOutcome> {
        let message = payload.message.or(payload.detail);
        match (payload.user, payload.tokens) {
            (Some(user), Some(tokens)) => {
                self.client
                    .session()
                    .save(&Credentials::new(tokens.access, tokens.refresh, user.clone()))?;
                Ok(AuthOutcome {
                    message,
                    user: Some(user),
                    authenticated: true,
                })
            }
            (user, _) => Ok(AuthOutcome {
                message,
                user,
                authenticated: false,
            }),
        }
    }

    /// Sign in with email and password; returns the user profile.
    ///
    /// `remember` asks the backend for long-lived tokens.
    pub fn login(&self, email: &str, password: &str, remember: bool) -> Result<Value> {
        let config = self.client.config();
        let payload: AuthPayload = self.client.post(
            &config.auth.login,
            &json!({
                "email": email.trim().to_lowercase(),
                "password": password,
                "remember": remember,
            }),
        )?;
        let outcome = self.store(payload)?;
        match outcome.user {
            Some(user) if outcome.authenticated => {
                info!("signed in");
                Ok(user)
            }
            _ => Err(ApiError::Unauthorized {
                message: "login response did not include credentials".to_string(),
            }),
        }
    }

    /// Create an account. The backend usually requires email verification
    /// first, in which case no session is stored.
    pub fn register<B>(&self, payload: &B) -> Result<AuthOutcome>
    where
        B: Serialize + ?Sized,
    {
        let config = self.client.config();
        let payload: AuthPayload = self.client.post(&config.auth.registration, payload)?;
        self.store(payload)
    }

    /// Verify an email address with the token from the verification link
    pub fn verify_email(&self, token: &str) -> Result<AuthOutcome> {
        let config = self.client.config();
        let path = format!("{}{}/", config.auth.verify_email, token);
        let payload: AuthPayload = self.client.apply(ApiRequest::post(path))?;
        self.store(payload)
    }

    /// Confirm a registration with the key sent by email
    pub fn confirm_email_key(&self, key: &str) -> Result<AuthOutcome> {
        let config = self.client.config();
        let payload: AuthPayload = self
            .client
            .post(&config.auth.verify_registration, &json!({ "key": key }))?;
        self.store(payload)
    }

    /// Ask for a password-reset email; returns the backend's message
    pub fn request_password_reset(&self, email: &str) -> Result<Option<String>> {
        let config = self.client.config();
        let payload: AuthPayload = self
            .client
            .post(&config.auth.password_reset, &json!({ "email": email }))?;
        Ok(payload.message.or(payload.detail))
    }

    /// Set a new password from a reset link
    pub fn confirm_password_reset(&self, uid: &str, token: &str, password: &str) -> Result<Option<String>> {
        let config = self.client.config();
        let path = format!("{}{}/{}/", config.auth.password_reset_confirm, uid, token);
        let payload: AuthPayload = self.client.post(
            &path,
            &json!({ "newPassword1": password, "newPassword2": password }),
        )?;
        Ok(payload.message.or(payload.detail))
    }

    /// Sign out: blacklist the refresh token and drop the local session.
    ///
    /// The local session is cleared even if the backend call fails.
    pub fn logout(&self) -> Result<()> {
        let config = self.client.config();
        let session = self.client.session();
        if let Some(refresh) = session.refresh_token() {
            let result: Result<Value> = self
                .client
                .post(&config.auth.logout, &json!({ "refresh": refresh }));
            if let Err(e) = result {
                warn!(error = %e, "logout request failed, clearing local session anyway");
            }
        }
        session.clear()?;
        info!("signed out");
        Ok(())
    }

    /// Stored profile of the signed-in user
    pub fn current_user(&self) -> Option<Value> {
        self.client.session().user()
    }

    /// Check for a complete stored session
    pub fn is_authenticated(&self) -> Result<bool> {
        Ok(self.client.session().load()?.is_some())
    }
}
