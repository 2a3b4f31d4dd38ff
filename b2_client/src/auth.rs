/// Account-level session material handed over by the authorization
/// bootstrap: the API base URL to address and the account authorization
/// token to present on JSON API calls. Obtaining and refreshing these is the
/// bootstrap's job, not this crate's; a 401 on any call means the whole
/// session needs re-authorizing.
#[derive(Debug, Clone)]
pub struct AuthConfig {
    pub api_url: String,
    pub authorization_token: String,
}

impl AuthConfig {
    pub fn new(api_url: impl Into<String>, authorization_token: impl Into<String>) -> Self {
        Self {
            api_url: api_url.into(),
            authorization_token: authorization_token.into(),
        }
    }
}
