use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};

use chrono::{DateTime, Utc};
use reqwest::{Client, StatusCode};
use url::Url;

use super::AuthError;

pub(crate) const USER_AGENT: &str = "mendeley-auth/0.1.0";

/// Raw response of the refresh endpoint. The body is opaque to the session.
#[derive(Debug, Clone)]
pub struct RefreshResponse {
    pub status: StatusCode,
    pub body: String,
    pub received_at: DateTime<Utc>,
}

impl RefreshResponse {
    /// Parse the body as JSON for callers that know the endpoint's shape.
    pub fn json<T: serde::de::DeserializeOwned>(&self) -> Result<T, AuthError> {
        Ok(serde_json::from_str(&self.body)?)
    }
}

type PendingRefresh = Pin<Box<dyn Future<Output = Result<RefreshResponse, AuthError>> + Send>>;

/// Pending refresh GET returned by `AuthSession::refresh_token`.
///
/// Awaiting it sends exactly one request; there is no retry and no timeout, and dropping
/// it unawaited cancels the call.
#[must_use = "the refresh request is only sent when awaited"]
pub struct RefreshRequest {
    url: Option<Url>,
    pending: PendingRefresh,
}

impl RefreshRequest {
    pub(crate) fn new(http: Client, target: Result<Url, AuthError>) -> Self {
        let url = target.as_ref().ok().cloned();
        let pending: PendingRefresh = Box::pin(async move {
            match target {
                Ok(url) => send_refresh(&http, url).await,
                Err(err) => Err(err),
            }
        });
        Self { url, pending }
    }

    /// Resolved endpoint, when the configured URL could be resolved.
    pub fn url(&self) -> Option<&Url> {
        self.url.as_ref()
    }
}

impl Future for RefreshRequest {
    type Output = Result<RefreshResponse, AuthError>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        self.pending.as_mut().poll(cx)
    }
}

impl std::fmt::Debug for RefreshRequest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RefreshRequest")
            .field("url", &self.url)
            .finish_non_exhaustive()
    }
}

async fn send_refresh(http: &Client, url: Url) -> Result<RefreshResponse, AuthError> {
    tracing::info!(%url, "requesting access token refresh");
    let response = http.get(url).send().await?;
    let status = response.status();
    let received_at = Utc::now();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_else(|_| "".into());
        return Err(AuthError::RefreshEndpoint { status, body });
    }
    let body = response.text().await?;
    Ok(RefreshResponse {
        status,
        body,
        received_at,
    })
}

pub(crate) fn http_client() -> Result<Client, AuthError> {
    Ok(Client::builder().user_agent(USER_AGENT).build()?)
}
