use std::fmt;
use std::fs;
use std::path::Path;
use std::sync::Arc;

use serde::Deserialize;

use super::token_store::{DEFAULT_TOKEN_TTL_HOURS, MAX_TOKEN_TTL_HOURS};
use super::{AuthError, FlowKind, PageLocation};

pub const DEFAULT_API_AUTHENTICATE_URL: &str = "https://api.mendeley.com/oauth/authorize";
pub const DEFAULT_AUTH_CODE_AUTHENTICATE_URL: &str = "/login";
pub const DEFAULT_ACCESS_TOKEN_COOKIE_NAME: &str = "accessToken";
pub const DEFAULT_SCOPE: &str = "all";

/// Authenticate URL given either literally or by a producer evaluated at redirect time.
#[derive(Clone, Deserialize)]
#[serde(from = "String")]
pub enum AuthenticateUrl {
    Literal(String),
    Producer(Arc<dyn Fn() -> String + Send + Sync>),
}

impl AuthenticateUrl {
    pub fn producer<F>(producer: F) -> Self
    where
        F: Fn() -> String + Send + Sync + 'static,
    {
        Self::Producer(Arc::new(producer))
    }

    pub fn resolve(&self) -> String {
        match self {
            AuthenticateUrl::Literal(url) => url.clone(),
            AuthenticateUrl::Producer(producer) => producer(),
        }
    }

    /// A literal empty string counts as "not configured". Producers are always accepted.
    pub fn is_empty(&self) -> bool {
        matches!(self, AuthenticateUrl::Literal(url) if url.is_empty())
    }

    /// Append `suffix`, deferring the call when the base is a producer.
    pub(crate) fn with_suffix(&self, suffix: String) -> Self {
        match self {
            AuthenticateUrl::Literal(url) => AuthenticateUrl::Literal(format!("{url}{suffix}")),
            AuthenticateUrl::Producer(producer) => {
                let producer = Arc::clone(producer);
                Self::producer(move || format!("{}{suffix}", producer()))
            }
        }
    }
}

impl From<String> for AuthenticateUrl {
    fn from(value: String) -> Self {
        AuthenticateUrl::Literal(value)
    }
}

impl From<&str> for AuthenticateUrl {
    fn from(value: &str) -> Self {
        AuthenticateUrl::Literal(value.to_owned())
    }
}

impl fmt::Debug for AuthenticateUrl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AuthenticateUrl::Literal(url) => f.debug_tuple("Literal").field(url).finish(),
            AuthenticateUrl::Producer(_) => f.write_str("Producer(..)"),
        }
    }
}

/// Caller supplied overrides. Unset fields fall back to flow and built-in defaults.
///
/// Field names deserialize in camelCase (`clientId`, `apiAuthenticateUrl`, ...).
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AuthOptions {
    pub client_id: Option<String>,
    pub redirect_url: Option<String>,
    pub api_authenticate_url: Option<AuthenticateUrl>,
    pub scope: Option<String>,
    pub refresh_access_token_url: Option<String>,
    pub access_token: Option<String>,
    pub access_token_cookie_name: Option<String>,
    pub authenticate_on_start: Option<bool>,
    pub token_ttl_hours: Option<i64>,
}

impl AuthOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Read options from a JSON file.
    pub fn from_json_file(path: &Path) -> Result<Self, AuthError> {
        let raw = fs::read_to_string(path)?;
        Ok(serde_json::from_str(&raw)?)
    }

    /// Overlay `overrides` on top of `self`; set fields in `overrides` win.
    pub fn merge(self, overrides: AuthOptions) -> Self {
        Self {
            client_id: overrides.client_id.or(self.client_id),
            redirect_url: overrides.redirect_url.or(self.redirect_url),
            api_authenticate_url: overrides.api_authenticate_url.or(self.api_authenticate_url),
            scope: overrides.scope.or(self.scope),
            refresh_access_token_url: overrides
                .refresh_access_token_url
                .or(self.refresh_access_token_url),
            access_token: overrides.access_token.or(self.access_token),
            access_token_cookie_name: overrides
                .access_token_cookie_name
                .or(self.access_token_cookie_name),
            authenticate_on_start: overrides.authenticate_on_start.or(self.authenticate_on_start),
            token_ttl_hours: overrides.token_ttl_hours.or(self.token_ttl_hours),
        }
    }

    pub fn with_client_id<S: Into<String>>(mut self, client_id: S) -> Self {
        self.client_id = Some(client_id.into());
        self
    }

    pub fn with_redirect_url<S: Into<String>>(mut self, url: S) -> Self {
        self.redirect_url = Some(url.into());
        self
    }

    pub fn with_authenticate_url<U: Into<AuthenticateUrl>>(mut self, url: U) -> Self {
        self.api_authenticate_url = Some(url.into());
        self
    }

    pub fn with_authenticate_url_fn<F>(mut self, producer: F) -> Self
    where
        F: Fn() -> String + Send + Sync + 'static,
    {
        self.api_authenticate_url = Some(AuthenticateUrl::producer(producer));
        self
    }

    pub fn with_scope<S: Into<String>>(mut self, scope: S) -> Self {
        self.scope = Some(scope.into());
        self
    }

    pub fn with_refresh_url<S: Into<String>>(mut self, url: S) -> Self {
        self.refresh_access_token_url = Some(url.into());
        self
    }

    pub fn with_access_token<S: Into<String>>(mut self, token: S) -> Self {
        self.access_token = Some(token.into());
        self
    }

    pub fn with_cookie_name<S: Into<String>>(mut self, name: S) -> Self {
        self.access_token_cookie_name = Some(name.into());
        self
    }

    pub fn with_authenticate_on_start(mut self, enabled: bool) -> Self {
        self.authenticate_on_start = Some(enabled);
        self
    }

    pub fn with_token_ttl_hours(mut self, hours: i64) -> Self {
        self.token_ttl_hours = Some(hours);
        self
    }
}

/// Fully resolved, immutable configuration owned by one session.
#[derive(Debug, Clone)]
pub struct AuthConfig {
    pub client_id: Option<String>,
    pub redirect_url: Option<String>,
    pub api_authenticate_url: AuthenticateUrl,
    pub scope: String,
    pub refresh_access_token_url: Option<String>,
    pub access_token: Option<String>,
    pub access_token_cookie_name: String,
    pub authenticate_on_start: bool,
    pub token_ttl_hours: i64,
}

impl AuthConfig {
    /// Merge built-in defaults, `flow` defaults and `options`, then check the fields the
    /// flow requires.
    pub fn resolve(
        flow: FlowKind,
        options: AuthOptions,
        location: &PageLocation,
    ) -> Result<Self, AuthError> {
        let default_authenticate_url = match flow {
            FlowKind::Implicit => DEFAULT_API_AUTHENTICATE_URL,
            FlowKind::AuthCode => DEFAULT_AUTH_CODE_AUTHENTICATE_URL,
        };

        let config = Self {
            client_id: options.client_id.filter(|id| !id.is_empty()),
            redirect_url: options.redirect_url.filter(|url| !url.is_empty()),
            api_authenticate_url: options
                .api_authenticate_url
                .unwrap_or_else(|| default_authenticate_url.into()),
            scope: options.scope.unwrap_or_else(|| DEFAULT_SCOPE.to_owned()),
            refresh_access_token_url: options
                .refresh_access_token_url
                .filter(|url| !url.is_empty()),
            access_token: options.access_token.filter(|token| !token.is_empty()),
            access_token_cookie_name: options
                .access_token_cookie_name
                .unwrap_or_else(|| DEFAULT_ACCESS_TOKEN_COOKIE_NAME.to_owned()),
            authenticate_on_start: options.authenticate_on_start.unwrap_or(true),
            token_ttl_hours: options.token_ttl_hours.unwrap_or(DEFAULT_TOKEN_TTL_HOURS),
        };

        if !(1..=MAX_TOKEN_TTL_HOURS).contains(&config.token_ttl_hours) {
            tracing::error!(
                hours = config.token_ttl_hours,
                "tokenTtlHours must be at least 1 and at most {MAX_TOKEN_TTL_HOURS}"
            );
            return Err(AuthError::InvalidTokenTtl {
                hours: config.token_ttl_hours,
                max: MAX_TOKEN_TTL_HOURS,
            });
        }
        flow.validate(&config)?;

        Ok(match flow {
            FlowKind::Implicit if config.redirect_url.is_none() => Self {
                redirect_url: Some(location.without_query()),
                ..config
            },
            _ => config,
        })
    }
}
