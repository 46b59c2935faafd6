use reqwest::header::{HeaderValue, AUTHORIZATION};
use reqwest::{Client, Method, Request, RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde::Serialize;
use thiserror::Error;
use url::Url;

use crate::auth::SessionManager;

/// Path fragments identifying login, refresh and logout calls.
const BOOTSTRAP_PATHS: &[&str] = &["/auth/login", "/auth/refresh", "/auth/logout"];

/// Errors returned by the API client.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("invalid request URL: {0}")]
    Url(#[from] url::ParseError),
    #[error("request was not authorized")]
    Unauthorized,
    #[error("HTTP status {status} body: {body}")]
    Status { status: StatusCode, body: String },
    #[error("failed to deserialize response: {0}")]
    Deserialize(#[from] serde_json::Error),
}

pub type ApiResult<T> = Result<T, ApiError>;

/// How the pipeline treats a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EndpointClass {
    /// Login, refresh and logout: never carry a credential, never trigger renewal.
    Bootstrap,
    Ordinary,
}

pub fn classify(url: &Url) -> EndpointClass {
    let path = url.path();
    if BOOTSTRAP_PATHS.iter().any(|fragment| path.contains(fragment)) {
        EndpointClass::Bootstrap
    } else {
        EndpointClass::Ordinary
    }
}

/// HTTP client that attaches the session's access token and recovers once
/// from a rejected token.
#[derive(Clone)]
pub struct ApiClient {
    http: Client,
    session: SessionManager,
}

impl ApiClient {
    pub fn new(session: SessionManager) -> Self {
        Self {
            http: session.http().clone(),
            session,
        }
    }

    pub fn session(&self) -> &SessionManager {
        &self.session
    }

    /// Start a request for `path`, relative to the configured base URL.
    pub fn request(&self, method: Method, path: &str) -> ApiResult<RequestBuilder> {
        let url = self.session.config().endpoint(path)?;
        Ok(self.http.request(method, url))
    }

    pub async fn send(&self, builder: RequestBuilder) -> ApiResult<Response> {
        let request = builder.build()?;
        self.execute(request).await
    }

    /// Send `request` through the pipeline.
    ///
    /// A 401 on an ordinary endpoint renews the token and replays the request
    /// once. If renewal yields nothing, the body cannot be replayed, or the
    /// replay is rejected too, the rejection is returned as-is.
    pub async fn execute(&self, mut request: Request) -> ApiResult<Response> {
        let (class, sent_with) = self.outbound(&mut request).await;
        if class == EndpointClass::Bootstrap {
            return Ok(self.http.execute(request).await?);
        }

        let replay = request.try_clone();
        let response = self.http.execute(request).await?;
        if response.status() != StatusCode::UNAUTHORIZED {
            return Ok(response);
        }

        let Some(mut replay) = replay else {
            tracing::debug!("rejected request has a streaming body; not replaying");
            return Ok(response);
        };
        let Some(token) = self.session.recover(sent_with.as_deref()).await else {
            tracing::debug!(path = %replay.url().path(), "no renewed token; returning rejection");
            return Ok(response);
        };

        attach(&mut replay, Some(&token));
        tracing::debug!(path = %replay.url().path(), "replaying request with renewed token");
        Ok(self.http.execute(replay).await?)
    }

    pub async fn get_json<T>(&self, path: &str) -> ApiResult<T>
    where
        T: DeserializeOwned,
    {
        let response = self.send(self.request(Method::GET, path)?).await?;
        decode(response).await
    }

    pub async fn post_json<B, T>(&self, path: &str, body: &B) -> ApiResult<T>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let builder = self.request(Method::POST, path)?.json(body);
        let response = self.send(builder).await?;
        decode(response).await
    }

    // Outbound stage: decide the class and set the Authorization header.
    // Returns the cached token the request was meant to carry, even when it
    // could not be encoded as a header.
    async fn outbound(&self, request: &mut Request) -> (EndpointClass, Option<String>) {
        let class = classify(request.url());
        match class {
            EndpointClass::Bootstrap => {
                request.headers_mut().remove(AUTHORIZATION);
                (class, None)
            }
            EndpointClass::Ordinary => {
                let token = self.session.access_token().await;
                if token.is_none() {
                    tracing::debug!(
                        path = %request.url().path(),
                        "no access token; sending unauthenticated"
                    );
                }
                attach(request, token.as_deref());
                (class, token)
            }
        }
    }
}

fn attach(request: &mut Request, token: Option<&str>) {
    let headers = request.headers_mut();
    headers.remove(AUTHORIZATION);
    let Some(token) = token else {
        return;
    };
    match HeaderValue::from_str(&format!("Bearer {token}")) {
        Ok(mut value) => {
            value.set_sensitive(true);
            headers.insert(AUTHORIZATION, value);
        }
        Err(_) => {
            tracing::warn!("access token is not a valid header value; sending unauthenticated")
        }
    }
}

async fn decode<T: DeserializeOwned>(response: Response) -> ApiResult<T> {
    let status = response.status();
    if status == StatusCode::UNAUTHORIZED {
        return Err(ApiError::Unauthorized);
    }
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        return Err(ApiError::Status { status, body });
    }
    let bytes = response.bytes().await?;
    Ok(serde_json::from_slice(&bytes)?)
}
