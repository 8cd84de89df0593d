//! Client-side OAuth token resolution for Mendeley applications.
//!
//! Pick a flow with [`auth::implicit_grant_flow`] or [`auth::auth_code_flow`]; both
//! return an [`auth::AuthSession`] that knows where to find the current access token
//! and how to send the user off to authenticate when there is none.

pub mod auth;
pub mod config;
