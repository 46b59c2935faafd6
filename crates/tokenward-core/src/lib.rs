//! Session and credential-refresh core shared by tokenward front-ends.
//!
//! [`auth::SessionManager`] owns the session; [`http::ApiClient`] sends
//! requests through it, attaching the access token and renewing it once on
//! rejection.

pub mod auth;
pub mod config;
pub mod http;
