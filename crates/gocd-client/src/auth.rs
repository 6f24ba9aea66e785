//! Credentials for the GoCD API
//!
//! Supports three modes, picked from the environment variables named in
//! the server configuration:
//! 1. Personal access token (`GOCD_TOKEN`) - sent as a bearer token
//! 2. Username and password (`GOCD_USERNAME` / `GOCD_PASSWORD`) - basic auth
//! 3. Anonymous - servers with security disabled

use gocd_core::ServerConfig;
use std::env;

/// Credentials attached to every request
#[derive(Clone, PartialEq, Eq)]
pub enum Credentials {
    Bearer(String),
    Basic { username: String, password: String },
    Anonymous,
}

impl Credentials {
    /// Discover credentials from the environment
    ///
    /// Priority:
    /// 1. Token variable
    /// 2. Username variable together with password variable
    /// 3. Anonymous
    pub fn from_env(server: &ServerConfig) -> Self {
        if let Some(token) = var(&server.token_env) {
            tracing::info!("Using access token from {}", server.token_env);
            return Self::Bearer(token);
        }

        match (var(&server.username_env), var(&server.password_env)) {
            (Some(username), Some(password)) => {
                tracing::info!("Using basic auth for user {}", username);
                Self::Basic { username, password }
            }
            (Some(username), None) => {
                tracing::warn!(
                    "{} is set for {} but {} is not, connecting anonymously",
                    server.username_env,
                    username,
                    server.password_env
                );
                Self::Anonymous
            }
            _ => {
                tracing::info!("No credentials found, connecting anonymously");
                Self::Anonymous
            }
        }
    }

    /// Attach the credentials to a request
    pub(crate) fn apply(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match self {
            Self::Bearer(token) => request.bearer_auth(token),
            Self::Basic { username, password } => request.basic_auth(username, Some(password)),
            Self::Anonymous => request,
        }
    }
}

/// Read an environment variable, treating an empty value as unset
fn var(name: &str) -> Option<String> {
    env::var(name).ok().filter(|value| !value.is_empty())
}

// Secrets stay out of logs
impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Bearer(_) => write!(f, "Bearer(***)"),
            Self::Basic { username, .. } => write!(f, "Basic({}, ***)", username),
            Self::Anonymous => write!(f, "Anonymous"),
        }
    }
}
