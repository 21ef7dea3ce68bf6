use reqwest::{Client, Response};
use serde::Serialize;
use serde_json::Value;
use thiserror::Error;
use url::Url;

#[derive(Debug, Error)]
pub enum CliError {
    #[error("invalid server url `{0}`")]
    InvalidServer(String),
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("server responded with {status}: {body}")]
    Status { status: u16, body: String },
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("invalid JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("invalid base64 archive: {0}")]
    Base64(#[from] base64::DecodeError),
    #[error("invalid input: {0}")]
    InvalidInput(String),
}

pub struct Ctx {
    client: Client,
    base: Url,
}

impl Ctx {
    pub fn new(server: &str) -> Result<Self, CliError> {
        let base = Url::parse(server).map_err(|_| CliError::InvalidServer(server.to_string()))?;
        if !matches!(base.scheme(), "http" | "https") {
            return Err(CliError::InvalidServer(server.to_string()));
        }
        let client = Client::builder()
            .user_agent(concat!("cookiepress-cli/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self { client, base })
    }

    pub fn url(&self, path: &str) -> Result<Url, CliError> {
        self.base
            .join(path)
            .map_err(|_| CliError::InvalidServer(self.base.to_string()))
    }

    pub async fn post_json<B: Serialize + ?Sized>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<Response, CliError> {
        let response = self.client.post(self.url(path)?).json(body).send().await?;
        ensure_success(response).await
    }

    pub async fn get_json(&self, url: Url) -> Result<Value, CliError> {
        let response = ensure_success(self.client.get(url).send().await?).await?;
        let text = response.text().await?;
        Ok(serde_json::from_str(&text)?)
    }
}

async fn ensure_success(response: Response) -> Result<Response, CliError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    Err(CliError::Status {
        status: status.as_u16(),
        body,
    })
}
