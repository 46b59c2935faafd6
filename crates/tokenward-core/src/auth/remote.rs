use reqwest::Client;
use serde_json::{json, Value};
use url::Url;

use crate::config::ClientConfig;

use super::fields::{self, TokenPair, USER_KEYS};
use super::SessionError;

pub const LOGIN_PATH: &str = "auth/login";
pub const REFRESH_PATH: &str = "auth/refresh";
pub const LOGOUT_PATH: &str = "auth/logout";

/// Bootstrap endpoints served by the remote API.
#[derive(Debug, Clone)]
pub struct AuthEndpoints {
    pub login_url: Url,
    pub refresh_url: Url,
    pub logout_url: Url,
}

impl AuthEndpoints {
    pub fn from_config(config: &ClientConfig) -> Result<Self, url::ParseError> {
        Ok(Self {
            login_url: config.endpoint(LOGIN_PATH)?,
            refresh_url: config.endpoint(REFRESH_PATH)?,
            logout_url: config.endpoint(LOGOUT_PATH)?,
        })
    }
}

/// Result of a successful login.
#[derive(Debug, Clone)]
pub struct LoginOutcome {
    pub tokens: TokenPair,
    pub user: Option<Value>,
    /// Untouched response body, for the legacy mirror.
    pub raw: Value,
}

/// Talks to the login, refresh and logout endpoints.
///
/// Requests made here never carry an `Authorization` header.
#[derive(Debug, Clone)]
pub struct AuthApi {
    http: Client,
    endpoints: AuthEndpoints,
}

impl AuthApi {
    pub fn new(http: Client, endpoints: AuthEndpoints) -> Self {
        Self { http, endpoints }
    }

    pub fn endpoints(&self) -> &AuthEndpoints {
        &self.endpoints
    }

    pub async fn login(&self, email: &str, password: &str) -> Result<LoginOutcome, SessionError> {
        let response = self
            .http
            .post(self.endpoints.login_url.clone())
            .json(&json!({ "email": email, "password": password }))
            .send()
            .await?;

        let raw = Self::handle_json_response(response).await?;
        let tokens = TokenPair::from_response(&raw)?;
        let user = fields::resolve_object(&raw, USER_KEYS);
        Ok(LoginOutcome { tokens, user, raw })
    }

    /// Exchange a refresh token for a new pair.
    pub async fn refresh(&self, refresh_token: &str) -> Result<TokenPair, SessionError> {
        let response = self
            .http
            .post(self.endpoints.refresh_url.clone())
            .json(&json!({ "refreshToken": refresh_token }))
            .send()
            .await?;

        let raw = Self::handle_json_response(response).await?;
        TokenPair::from_response(&raw)
    }

    /// Ask the server to revoke `refresh_token`. The response body is ignored.
    pub async fn revoke(&self, refresh_token: &str) -> Result<(), SessionError> {
        let response = self
            .http
            .post(self.endpoints.logout_url.clone())
            .json(&json!({ "refreshToken": refresh_token }))
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(SessionError::AuthEndpoint { status, body });
        }
        Ok(())
    }

    async fn handle_json_response(response: reqwest::Response) -> Result<Value, SessionError> {
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(SessionError::AuthEndpoint { status, body });
        }
        let bytes = response.bytes().await?;
        Ok(serde_json::from_slice(&bytes)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use httpmock::prelude::*;
    use reqwest::StatusCode;

    fn api(server: &MockServer) -> AuthApi {
        let config = ClientConfig::new(Url::parse(&server.base_url()).unwrap());
        let endpoints = AuthEndpoints::from_config(&config).unwrap();
        AuthApi::new(Client::new(), endpoints)
    }

    #[tokio::test]
    async fn login_success() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(POST)
                    .path("/auth/login")
                    .json_body(serde_json::json!({ "email": "a@example.com", "password": "pw" }));
                then.status(200).json_body(serde_json::json!({
                    "accessToken": "abc",
                    "refreshToken": "def",
                    "user": { "id": "u1", "role": "seller" }
                }));
            })
            .await;

        let outcome = api(&server).login("a@example.com", "pw").await.unwrap();
        mock.assert_async().await;
        assert_eq!(outcome.tokens.access_token, "abc");
        assert_eq!(outcome.tokens.refresh_token, "def");
        assert_eq!(outcome.user.unwrap()["role"], "seller");
    }

    #[tokio::test]
    async fn refresh_accepts_aliases() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(POST)
                    .path("/auth/refresh")
                    .json_body(serde_json::json!({ "refreshToken": "r0" }));
                then.status(200)
                    .json_body(serde_json::json!({ "token": "A", "refresh_token": "B" }));
            })
            .await;

        let pair = api(&server).refresh("r0").await.unwrap();
        mock.assert_async().await;
        assert_eq!(pair.access_token, "A");
        assert_eq!(pair.refresh_token, "B");
    }

    #[tokio::test]
    async fn refresh_missing_fields() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(POST).path("/auth/refresh");
                then.status(200).json_body(serde_json::json!({ "token": "A" }));
            })
            .await;

        let err = api(&server).refresh("r0").await.unwrap_err();
        assert!(matches!(err, SessionError::MissingField(_)));
    }

    #[tokio::test]
    async fn refresh_malformed_body() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(POST).path("/auth/refresh");
                then.status(200).body("<html>gateway</html>");
            })
            .await;

        let err = api(&server).refresh("r0").await.unwrap_err();
        assert!(matches!(err, SessionError::Serde(_)));
    }

    #[tokio::test]
    async fn endpoint_failure_keeps_status_and_body() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(POST).path("/auth/logout");
                then.status(400).body("unknown token");
            })
            .await;

        match api(&server).revoke("r0").await.unwrap_err() {
            SessionError::AuthEndpoint { status, body } => {
                assert_eq!(status, StatusCode::BAD_REQUEST);
                assert_eq!(body, "unknown token");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }
}
