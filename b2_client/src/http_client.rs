//! Construction of the HTTP clients owned by a client session.
//!
//! There is no process-wide shared client: each `RemoteClient` builds and
//! owns its own connection pools, with lifetimes tied to the session.

use b2_config::b2_config;
use http::header::{HeaderMap, HeaderValue, ACCEPT, AUTHORIZATION};
use reqwest_middleware::{ClientBuilder, ClientWithMiddleware};

use crate::auth::AuthConfig;
use crate::error::{B2ClientError, Result};

/// Build the client used for JSON API calls. The account authorization
/// token rides on every request as a default header.
pub fn build_api_client(auth: &AuthConfig, user_agent: &str) -> Result<ClientWithMiddleware> {
    let mut headers = HeaderMap::new();
    headers.insert(ACCEPT, HeaderValue::from_static("application/json"));

    let mut token = HeaderValue::from_str(&auth.authorization_token)
        .map_err(|_| B2ClientError::Validation("authorization token is not a valid header value".to_string()))?;
    token.set_sensitive(true);
    headers.insert(AUTHORIZATION, token);

    Ok(ClientBuilder::new(base_client(user_agent, headers)?).build())
}

/// Build the client used for upload traffic. Upload URLs carry their own
/// per-lease authorization tokens, set on each request.
pub fn build_upload_client(user_agent: &str) -> Result<ClientWithMiddleware> {
    let mut headers = HeaderMap::new();
    headers.insert(ACCEPT, HeaderValue::from_static("application/json"));

    Ok(ClientBuilder::new(base_client(user_agent, headers)?).build())
}

fn base_client(user_agent: &str, headers: HeaderMap) -> Result<reqwest::Client> {
    Ok(reqwest::Client::builder()
        .user_agent(user_agent)
        .default_headers(headers)
        .timeout(b2_config().client.request_timeout)
        .build()?)
}
