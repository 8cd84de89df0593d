mod browser;
mod cookie;
mod error;
mod file_jar;
mod flow;
mod location;
mod options;
mod refresh;
mod session;
mod token_store;

pub use browser::{browser_available, BrowserLocation};
pub use cookie::{format_http_date, CookieEntries, CookieJar, MemoryCookieJar, StoredCookie};
pub use error::AuthError;
pub use file_jar::FileCookieJar;
pub use flow::{FlowKind, InvalidFlow};
pub use location::{Location, MemoryLocation, PageLocation};
pub use options::{
    AuthConfig, AuthOptions, AuthenticateUrl, DEFAULT_ACCESS_TOKEN_COOKIE_NAME,
    DEFAULT_API_AUTHENTICATE_URL, DEFAULT_AUTH_CODE_AUTHENTICATE_URL, DEFAULT_SCOPE,
};
pub use refresh::{RefreshRequest, RefreshResponse};
pub use session::{auth_code_flow, implicit_grant_flow, AuthSession};
pub use token_store::{TokenStore, DEFAULT_TOKEN_TTL_HOURS};
