//! Stream token acquisition
//!
//! The streaming endpoint is authenticated by a short-lived bearer token
//! embedded in its URL. [`HttpTokenProvider`] obtains it from the API using
//! the caller's session cookie; [`StaticTokenProvider`] hands out a fixed one.

use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use reqwest::StatusCode;
use reqwest::cookie::Jar;
use serde::Deserialize;

use crate::error::AuthError;

const CSRF_PATH: &str = "/auth/csrf/";
const TOKEN_PATH: &str = "/auth/jwt/";
const CSRF_RESPONSE_HEADER: &str = "x-csrftoken";
const CSRF_REQUEST_HEADER: &str = "X-CSRFToken";

/// Source of stream tokens
#[async_trait]
pub trait TokenProvider: Send + Sync {
    /// Obtain a fresh token
    async fn fetch_token(&self) -> Result<String, AuthError>;
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    #[serde(default)]
    token: Option<String>,
}

/// Token provider backed by the API's token endpoint
pub struct HttpTokenProvider {
    client: reqwest::Client,
    api_url: String,
    csrf: Mutex<Option<String>>,
}

impl HttpTokenProvider {
    /// Create a provider for `api_url`
    ///
    /// `session_cookie` holds `name=value` pairs separated by `;` and is
    /// loaded into the client's cookie jar.
    pub fn new(api_url: impl Into<String>, session_cookie: Option<&str>) -> Result<Self, AuthError> {
        let api_url = api_url.into().trim_end_matches('/').to_string();
        let jar = Arc::new(Jar::default());

        if let Some(cookie) = session_cookie {
            let url: reqwest::Url = api_url
                .parse()
                .map_err(|e| AuthError::Request(format!("invalid API URL {api_url}: {e}")))?;
            for pair in cookie.split(';').map(str::trim).filter(|p| !p.is_empty()) {
                jar.add_cookie_str(pair, &url);
            }
        }

        let client = reqwest::Client::builder()
            .cookie_provider(jar)
            .build()
            .map_err(|e| AuthError::Request(e.to_string()))?;

        Ok(Self {
            client,
            api_url,
            csrf: Mutex::new(None),
        })
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}{}", self.api_url, path)
    }

    /// CSRF token for later requests, fetched once
    async fn csrf_token(&self) -> Option<String> {
        let cached = self.csrf.lock().clone();
        if cached.is_some() {
            return cached;
        }

        let response = match self.client.get(self.endpoint(CSRF_PATH)).send().await {
            Ok(response) => response,
            Err(e) => {
                tracing::warn!(error = %e, "failed to fetch CSRF token");
                return None;
            }
        };

        let token = response
            .headers()
            .get(CSRF_RESPONSE_HEADER)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);

        match &token {
            Some(_) => *self.csrf.lock() = token.clone(),
            None => tracing::warn!(status = %response.status(), "CSRF response carried no token"),
        }
        token
    }
}

#[async_trait]
impl TokenProvider for HttpTokenProvider {
    async fn fetch_token(&self) -> Result<String, AuthError> {
        let mut request = self
            .client
            .get(self.endpoint(TOKEN_PATH))
            .header(reqwest::header::ACCEPT, "application/json");
        if let Some(csrf) = self.csrf_token().await {
            request = request.header(CSRF_REQUEST_HEADER, csrf);
        }

        let response = request
            .send()
            .await
            .map_err(|e| AuthError::Request(e.to_string()))?;

        let status = response.status();
        if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
            return Err(AuthError::Unauthenticated);
        }
        if !status.is_success() {
            return Err(AuthError::InvalidResponse(format!("unexpected status {status}")));
        }

        let body: TokenResponse = response
            .json()
            .await
            .map_err(|e| AuthError::InvalidResponse(e.to_string()))?;

        match body.token {
            Some(token) if !token.is_empty() => {
                tracing::debug!("obtained stream token");
                Ok(token)
            }
            _ => Err(AuthError::InvalidResponse("response carried no token".to_string())),
        }
    }
}

/// Provider returning a preconfigured token
#[derive(Debug, Clone, Default)]
pub struct StaticTokenProvider {
    token: Option<String>,
}

impl StaticTokenProvider {
    pub fn new(token: Option<String>) -> Self {
        Self {
            token: token.filter(|t| !t.is_empty()),
        }
    }
}

#[async_trait]
impl TokenProvider for StaticTokenProvider {
    async fn fetch_token(&self) -> Result<String, AuthError> {
        self.token.clone().ok_or(AuthError::Unauthenticated)
    }
}
