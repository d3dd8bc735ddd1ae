use infonet_core::{CoreError, RedditApiError, RedditConfig};
use oauth2::basic::{BasicClient, BasicErrorResponse};
use oauth2::{
    AuthUrl, ClientId, ClientSecret, HttpRequest, HttpResponse, RequestTokenError,
    ResourceOwnerPassword, ResourceOwnerUsername, Scope, TokenResponse, TokenUrl,
};
use std::time::{Duration, Instant};
use tracing::{debug, info};

const REDDIT_AUTHORIZE_URL: &str = "https://www.reddit.com/api/v1/authorize";

/// Tokens are refreshed this long before Reddit would reject them.
const EXPIRY_MARGIN: Duration = Duration::from_secs(60);

/// Reddit access tokens live for one hour unless the response says otherwise.
const DEFAULT_TOKEN_LIFETIME: Duration = Duration::from_secs(3600);

#[derive(Debug, Clone)]
pub struct RedditCredentials {
    pub client_id: String,
    pub client_secret: String,
    pub username: Option<String>,
    pub password: Option<String>,
}

impl RedditCredentials {
    pub fn from_config(config: &RedditConfig) -> Self {
        Self {
            client_id: config.client_id.clone(),
            client_secret: config.client_secret.clone(),
            username: config.username.clone().filter(|u| !u.is_empty()),
            password: config.password.clone().filter(|p| !p.is_empty()),
        }
    }

    /// Script apps authenticate as their owner; everything else is application-only.
    pub fn grant_type(&self) -> GrantType {
        match (&self.username, &self.password) {
            (Some(_), Some(_)) => GrantType::Password,
            _ => GrantType::ClientCredentials,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GrantType {
    Password,
    ClientCredentials,
}

#[derive(Debug, Clone)]
pub struct RedditToken {
    pub access_token: String,
    pub scopes: Vec<String>,
    pub expires_at: Instant,
}

impl RedditToken {
    pub fn new(access_token: String, scopes: Vec<String>, lifetime: Duration) -> Self {
        Self {
            access_token,
            scopes,
            expires_at: Instant::now() + lifetime,
        }
    }

    pub fn is_expired(&self) -> bool {
        Instant::now() + EXPIRY_MARGIN >= self.expires_at
    }
}

/// Performs the OAuth2 token exchange against Reddit's token endpoint.
#[derive(Debug)]
pub struct RedditAuth {
    oauth_client: BasicClient,
    http_client: reqwest::Client,
    credentials: RedditCredentials,
}

impl RedditAuth {
    pub fn new(config: &RedditConfig, http_client: reqwest::Client) -> Result<Self, CoreError> {
        let credentials = RedditCredentials::from_config(config);

        let auth_url = AuthUrl::new(REDDIT_AUTHORIZE_URL.to_string()).map_err(|e| {
            CoreError::InvalidInput {
                message: format!("invalid authorize url: {}", e),
            }
        })?;
        let token_url = TokenUrl::new(config.token_url.clone()).map_err(|e| {
            CoreError::InvalidInput {
                message: format!("invalid token url '{}': {}", config.token_url, e),
            }
        })?;

        let oauth_client = BasicClient::new(
            ClientId::new(credentials.client_id.clone()),
            Some(ClientSecret::new(credentials.client_secret.clone())),
            auth_url,
            Some(token_url),
        );

        Ok(Self {
            oauth_client,
            http_client,
            credentials,
        })
    }

    pub fn grant_type(&self) -> GrantType {
        self.credentials.grant_type()
    }

    pub async fn authenticate(&self) -> Result<RedditToken, CoreError> {
        let http_client = self.http_client.clone();
        let send = move |request: HttpRequest| token_http_client(http_client.clone(), request);
        let scope = Scope::new("read".to_string());

        debug!("Requesting Reddit access token ({:?} grant)", self.grant_type());

        let token = match (&self.credentials.username, &self.credentials.password) {
            (Some(username), Some(password)) => {
                let username = ResourceOwnerUsername::new(username.clone());
                let password = ResourceOwnerPassword::new(password.clone());
                self.oauth_client
                    .exchange_password(&username, &password)
                    .add_scope(scope)
                    .request_async(send)
                    .await
            }
            _ => {
                self.oauth_client
                    .exchange_client_credentials()
                    .add_scope(scope)
                    .request_async(send)
                    .await
            }
        }
        .map_err(map_token_error)?;

        let scopes = token
            .scopes()
            .map(|scopes| scopes.iter().map(|s| s.to_string()).collect())
            .unwrap_or_default();
        let lifetime = token.expires_in().unwrap_or(DEFAULT_TOKEN_LIFETIME);

        info!("Authenticated with Reddit, token valid for {:?}", lifetime);
        Ok(RedditToken::new(
            token.access_token().secret().clone(),
            scopes,
            lifetime,
        ))
    }
}

/// Sends the token request through the shared client so it carries our user agent.
async fn token_http_client(
    client: reqwest::Client,
    request: HttpRequest,
) -> Result<HttpResponse, reqwest::Error> {
    let response = client
        .request(request.method, request.url.as_str())
        .headers(request.headers)
        .body(request.body)
        .send()
        .await?;

    let status_code = response.status();
    let headers = response.headers().to_owned();
    let body = response.bytes().await?.to_vec();

    Ok(HttpResponse {
        status_code,
        headers,
        body,
    })
}

fn map_token_error(error: RequestTokenError<reqwest::Error, BasicErrorResponse>) -> CoreError {
    match error {
        RequestTokenError::ServerResponse(response) => {
            CoreError::RedditApi(RedditApiError::AuthenticationFailed {
                reason: response.to_string(),
            })
        }
        RequestTokenError::Request(e) if e.is_timeout() => {
            CoreError::RedditApi(RedditApiError::RequestTimeout)
        }
        RequestTokenError::Request(e) => CoreError::Network(e),
        // Reddit answers a bad password with a 200 carrying `{"error": ...}`.
        RequestTokenError::Parse(e, body) => {
            CoreError::RedditApi(RedditApiError::AuthenticationFailed {
                reason: format!(
                    "unexpected token response ({}): {}",
                    e,
                    String::from_utf8_lossy(&body)
                ),
            })
        }
        RequestTokenError::Other(reason) => {
            CoreError::RedditApi(RedditApiError::AuthenticationFailed { reason })
        }
    }
}
