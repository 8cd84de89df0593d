use std::cell::Cell;

use reqwest::Client;
use tracing::{debug, info};

use super::refresh::{http_client, RefreshRequest};
use super::{
    AuthConfig, AuthError, AuthOptions, AuthenticateUrl, CookieJar, FlowKind, Location,
    TokenStore,
};

/// Start an implicit grant session.
///
/// Fails without a `client_id`. With `authenticate_on_start` (the default) and no token
/// in the fragment or cookie, the location is sent to the authorize URL before this
/// returns.
pub fn implicit_grant_flow<J, L>(
    options: AuthOptions,
    jar: J,
    location: L,
) -> Result<AuthSession<J, L>, AuthError>
where
    J: CookieJar,
    L: Location,
{
    AuthSession::start(FlowKind::Implicit, options, jar, location)
}

/// Start an auth code session, where a server-side exchange has already set the token
/// cookie. Fails when `api_authenticate_url` is cleared.
pub fn auth_code_flow<J, L>(
    options: AuthOptions,
    jar: J,
    location: L,
) -> Result<AuthSession<J, L>, AuthError>
where
    J: CookieJar,
    L: Location,
{
    AuthSession::start(FlowKind::AuthCode, options, jar, location)
}

/// A running token flow bound to one cookie jar and one location.
pub struct AuthSession<J, L> {
    flow: FlowKind,
    config: AuthConfig,
    authenticate_url: AuthenticateUrl,
    store: TokenStore<J>,
    location: L,
    http: Client,
    redirected: Cell<bool>,
}

impl<J, L> AuthSession<J, L>
where
    J: CookieJar,
    L: Location,
{
    pub fn start(
        flow: FlowKind,
        options: AuthOptions,
        jar: J,
        location: L,
    ) -> Result<Self, AuthError> {
        let config = AuthConfig::resolve(flow, options, &location.current())?;
        let authenticate_url = flow.build_authenticate_url(&config);
        let store = TokenStore::new(jar, config.access_token_cookie_name.clone())
            .with_ttl_hours(config.token_ttl_hours);

        let session = Self {
            flow,
            config,
            authenticate_url,
            store,
            location,
            http: http_client()?,
            redirected: Cell::new(false),
        };

        if let Some(token) = &session.config.access_token {
            debug!("seeding access token from options");
            session.store.store(token)?;
        }

        if session.config.authenticate_on_start && session.get_token()?.is_empty() {
            session.authenticate()?;
        }

        Ok(session)
    }

    /// Clear the stored token and navigate to the authenticate URL.
    ///
    /// This ends the page's logical session; nothing should rely on it being alive
    /// afterwards.
    pub fn authenticate(&self) -> Result<(), AuthError> {
        let url = self.authenticate_url.resolve();
        self.store.clear()?;
        info!(flow = %self.flow, %url, "redirecting to authenticate");
        self.location.assign(&url)?;
        self.redirected.set(true);
        Ok(())
    }

    /// Current access token, or an empty string when there is none.
    pub fn get_token(&self) -> Result<String, AuthError> {
        self.flow.resolve_token(&self.store, &self.location.current())
    }

    /// `None` when the flow cannot refresh; otherwise a pending GET to the refresh URL.
    ///
    /// The response is returned as-is; updating the stored token is up to the caller.
    pub fn refresh_token(&self) -> Option<RefreshRequest> {
        if !self.flow.supports_refresh(&self.config) {
            return None;
        }
        let target = self.config.refresh_access_token_url.as_deref()?;
        let resolved = self.location.current().resolve(target);
        Some(RefreshRequest::new(self.http.clone(), resolved))
    }

    pub fn flow(&self) -> FlowKind {
        self.flow
    }

    pub fn config(&self) -> &AuthConfig {
        &self.config
    }

    pub fn token_store(&self) -> &TokenStore<J> {
        &self.store
    }

    pub fn location(&self) -> &L {
        &self.location
    }

    /// Whether `authenticate()` has navigated away.
    pub fn has_redirected(&self) -> bool {
        self.redirected.get()
    }
}

impl<J, L> std::fmt::Debug for AuthSession<J, L> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthSession")
            .field("flow", &self.flow)
            .field("config", &self.config)
            .field("redirected", &self.redirected.get())
            .finish_non_exhaustive()
    }
}
