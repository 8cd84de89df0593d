use tracing::{debug, error};

use super::{AuthConfig, AuthError, AuthenticateUrl, CookieJar, PageLocation, TokenStore};

/// Token flows a session can run. Fixed for the lifetime of the session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlowKind {
    /// Token arrives in the redirect's URL fragment.
    Implicit,
    /// Token was set as a cookie by a server-side code exchange.
    AuthCode,
}

impl FlowKind {
    /// Check the fields this flow cannot work without.
    pub fn validate(self, config: &AuthConfig) -> Result<(), AuthError> {
        match self {
            FlowKind::Implicit if config.client_id.is_none() => {
                error!("You must provide a clientId for implicit grant flow");
                Err(AuthError::MissingClientId)
            }
            FlowKind::AuthCode if config.api_authenticate_url.is_empty() => {
                error!("You must provide an apiAuthenticateUrl for auth code flow");
                Err(AuthError::MissingAuthenticateUrl)
            }
            _ => Ok(()),
        }
    }

    /// URL the user is sent to by `authenticate()`.
    pub fn build_authenticate_url(self, config: &AuthConfig) -> AuthenticateUrl {
        match self {
            FlowKind::Implicit => {
                let query = format!(
                    "?client_id={}&redirect_uri={}&scope={}&response_type=token",
                    config.client_id.as_deref().unwrap_or_default(),
                    config.redirect_url.as_deref().unwrap_or_default(),
                    config.scope,
                );
                config.api_authenticate_url.with_suffix(query)
            }
            FlowKind::AuthCode => config.api_authenticate_url.clone(),
        }
    }

    /// Current token, or an empty string when the user holds none.
    ///
    /// The implicit flow reconciles the URL fragment with the stored cookie: a fragment
    /// token that is new or differs from the cookie wins and replaces it.
    pub fn resolve_token<J: CookieJar>(
        self,
        store: &TokenStore<J>,
        location: &PageLocation,
    ) -> Result<String, AuthError> {
        let stored = store.get()?;
        if self == FlowKind::AuthCode {
            return Ok(stored);
        }

        let fragment = location.fragment().map(fragment_value).unwrap_or_default();
        match (fragment.is_empty(), stored.is_empty()) {
            (true, _) => Ok(stored),
            (false, true) => {
                debug!("storing access token from URL fragment");
                store.store(fragment)?;
                Ok(fragment.to_owned())
            }
            (false, false) if fragment == stored => Ok(stored),
            (false, false) => {
                debug!("URL fragment token differs from stored token; replacing cookie");
                store.store(fragment)?;
                Ok(fragment.to_owned())
            }
        }
    }

    pub fn supports_refresh(self, config: &AuthConfig) -> bool {
        match self {
            FlowKind::Implicit => false,
            FlowKind::AuthCode => config.refresh_access_token_url.is_some(),
        }
    }
}

/// Value part of a `key=value` fragment; empty when there is no `=`.
fn fragment_value(fragment: &str) -> &str {
    fragment
        .split_once('=')
        .map(|(_, value)| value)
        .unwrap_or_default()
}

impl std::str::FromStr for FlowKind {
    type Err = InvalidFlow;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "implicit" | "implicit-grant" | "token" => Ok(FlowKind::Implicit),
            "auth-code" | "authcode" | "code" => Ok(FlowKind::AuthCode),
            other => Err(InvalidFlow(other.to_owned())),
        }
    }
}

impl std::fmt::Display for FlowKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let value = match self {
            FlowKind::Implicit => "implicit",
            FlowKind::AuthCode => "auth-code",
        };
        write!(f, "{value}")
    }
}

/// Error reported when parsing an unsupported flow.
#[derive(Debug, thiserror::Error)]
#[error("invalid auth flow '{0}'")]
pub struct InvalidFlow(pub String);
