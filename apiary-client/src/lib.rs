//! Apiary Client
//!
//! REST client for the Hive Fabric management API. Thin and synchronous
//! per call: every method issues one HTTP request and decodes the JSON
//! response into a typed record. Waiting on asynchronous remote tasks
//! lives in [`task`] and [`retry`].
//!
//! ## Module Structure
//!
//! - `pool` / `realm` / `storage` / `template` / `guest` / `host` /
//!   `cluster` - domain records and their CRUD calls
//! - `task` - asynchronous task handles and status polling
//! - `retry` - fixed-interval retry with an explicit deadline
//! - `error` - error taxonomy (transient vs fatal vs not-found)

pub mod cluster;
pub mod error;
pub mod guest;
pub mod host;
pub mod pool;
pub mod realm;
pub mod retry;
pub mod storage;
pub mod task;
pub mod template;

pub use error::Error;
pub use retry::{Retry, retry_until};

use serde::Serialize;
use serde::de::DeserializeOwned;

/// Connection settings for [`Client::connect`]
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Hostname, host:port, or full URL of the fabric controller
    pub host: String,
    pub username: String,
    pub password: String,
    /// Authentication realm ("local" for appliance accounts)
    pub realm: String,
    /// Accept the appliance's self-signed certificate
    pub insecure: bool,
}

#[derive(Serialize)]
struct LoginRequest<'a> {
    username: &'a str,
    password: &'a str,
    realm: &'a str,
}

#[derive(serde::Deserialize)]
struct LoginResponse {
    token: String,
}

/// Authenticated handle to one fabric controller
#[derive(Debug)]
pub struct Client {
    http: reqwest::Client,
    base_url: String,
    token: String,
}

impl Client {
    /// Authenticate against the fabric and return a ready client
    pub async fn connect(config: &ClientConfig) -> Result<Self, Error> {
        let http = reqwest::Client::builder()
            .danger_accept_invalid_certs(config.insecure)
            .build()?;

        let base_url = normalize_base_url(&config.host);

        let response = http
            .post(format!("{}/api/auth", base_url))
            .json(&LoginRequest {
                username: &config.username,
                password: &config.password,
                realm: &config.realm,
            })
            .send()
            .await?;
        let login: LoginResponse = check(response).await?.json().await?;

        tracing::debug!(host = %base_url, user = %config.username, "authenticated");

        Ok(Self {
            http,
            base_url,
            token: login.token,
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}/api/{}", self.base_url, path)
    }

    pub(crate) async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T, Error> {
        let response = self
            .http
            .get(self.url(path))
            .bearer_auth(&self.token)
            .send()
            .await?;
        tracing::debug!(path, status = %response.status(), "GET");
        Ok(check(response).await?.json().await?)
    }

    pub(crate) async fn post_json<T: DeserializeOwned, B: Serialize + ?Sized>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<T, Error> {
        let response = self
            .http
            .post(self.url(path))
            .bearer_auth(&self.token)
            .json(body)
            .send()
            .await?;
        tracing::debug!(path, status = %response.status(), "POST");
        Ok(check(response).await?.json().await?)
    }

    pub(crate) async fn post_empty<B: Serialize + ?Sized>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<(), Error> {
        let response = self
            .http
            .post(self.url(path))
            .bearer_auth(&self.token)
            .json(body)
            .send()
            .await?;
        tracing::debug!(path, status = %response.status(), "POST");
        check(response).await?;
        Ok(())
    }

    pub(crate) async fn put_empty<B: Serialize + ?Sized>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<(), Error> {
        let response = self
            .http
            .put(self.url(path))
            .bearer_auth(&self.token)
            .json(body)
            .send()
            .await?;
        tracing::debug!(path, status = %response.status(), "PUT");
        check(response).await?;
        Ok(())
    }

    pub(crate) async fn delete_path(&self, path: &str) -> Result<(), Error> {
        let response = self
            .http
            .delete(self.url(path))
            .bearer_auth(&self.token)
            .send()
            .await?;
        tracing::debug!(path, status = %response.status(), "DELETE");
        check(response).await?;
        Ok(())
    }
}

fn normalize_base_url(host: &str) -> String {
    let trimmed = host.trim_end_matches('/');
    if trimmed.contains("://") {
        trimmed.to_string()
    } else {
        format!("https://{}", trimmed)
    }
}

/// Error bodies have the shape `{"error": 404, "message": "..."}`
#[derive(serde::Deserialize, Default)]
struct ApiErrorBody {
    #[serde(default)]
    error: Option<u16>,
    #[serde(default)]
    message: Option<String>,
}

async fn check(response: reqwest::Response) -> Result<reqwest::Response, Error> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let text = response.text().await.unwrap_or_default();
    let body: ApiErrorBody = serde_json::from_str(&text).unwrap_or_default();
    Err(Error::Api {
        status: body.error.unwrap_or(status.as_u16()),
        message: body.message.unwrap_or(text),
    })
}

#[cfg(test)]
pub(crate) mod testutil {
    use super::*;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    /// Mount the auth endpoint and return a connected client
    pub async fn connected_client(server: &MockServer) -> Client {
        Mock::given(method("POST"))
            .and(path("/api/auth"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(serde_json::json!({"token": "tok-1"})),
            )
            .mount(server)
            .await;

        Client::connect(&ClientConfig {
            host: server.uri(),
            username: "admin".to_string(),
            password: "swordfish".to_string(),
            realm: "local".to_string(),
            insecure: false,
        })
        .await
        .expect("connect")
    }
}
