mod client;

pub use client::{classify, ApiClient, ApiError, ApiResult, EndpointClass};
pub use reqwest::{Method, Response, StatusCode};
