use std::{io, path::PathBuf};

use reqwest::{Client, StatusCode};
use thiserror::Error;
use url::Url;

use crate::config::FetchSettings;

const USER_AGENT: &str = concat!("cookiepress/", env!("CARGO_PKG_VERSION"));

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("Cannot download template ZIP from {url}")]
    Request {
        url: Url,
        #[source]
        source: reqwest::Error,
    },
    #[error("Cannot download template ZIP from {url}: upstream responded with {status}")]
    Status { url: Url, status: StatusCode },
    #[error("Cannot download template ZIP from {url}: archive exceeds {limit} bytes")]
    TooLarge { url: Url, limit: u64 },
    #[error("failed to store downloaded template at `{}`", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// Downloads template archives over HTTP.
#[derive(Debug, Clone)]
pub struct ArchiveFetcher {
    client: Client,
    max_bytes: u64,
}

impl ArchiveFetcher {
    pub fn new(settings: &FetchSettings) -> Result<Self, reqwest::Error> {
        let mut builder = Client::builder().user_agent(USER_AGENT);
        if let Some(timeout) = settings.timeout {
            builder = builder.timeout(timeout);
        }

        Ok(Self {
            client: builder.build()?,
            max_bytes: settings.max_archive_bytes.get(),
        })
    }

    /// Download `url` into `destination`, returning the number of bytes stored.
    pub async fn download(&self, url: &Url, destination: &std::path::Path) -> Result<u64, FetchError> {
        let request_error = |source| FetchError::Request {
            url: url.clone(),
            source,
        };

        let mut response = self
            .client
            .get(url.clone())
            .send()
            .await
            .map_err(request_error)?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status {
                url: url.clone(),
                status,
            });
        }

        let too_large = || FetchError::TooLarge {
            url: url.clone(),
            limit: self.max_bytes,
        };
        if response
            .content_length()
            .is_some_and(|length| length > self.max_bytes)
        {
            return Err(too_large());
        }

        let mut body = Vec::new();
        while let Some(chunk) = response.chunk().await.map_err(request_error)? {
            if (body.len() + chunk.len()) as u64 > self.max_bytes {
                return Err(too_large());
            }
            body.extend_from_slice(&chunk);
        }

        tokio::fs::write(destination, &body)
            .await
            .map_err(|source| FetchError::Io {
                path: destination.to_path_buf(),
                source,
            })?;

        Ok(body.len() as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use httpmock::prelude::*;
    use std::num::NonZeroU64;
    use tempfile::TempDir;

    fn settings(max_archive_bytes: u64) -> FetchSettings {
        FetchSettings {
            default_branch: "main".to_string(),
            max_archive_bytes: NonZeroU64::new(max_archive_bytes).expect("non-zero"),
            timeout: None,
        }
    }

    #[tokio::test]
    async fn downloads_body_to_destination() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(GET)
                    .path("/org/repo/archive/refs/heads/main.zip")
                    .header_exists("user-agent");
                then.status(200).body("zip-bytes");
            })
            .await;

        let dir = TempDir::new().expect("dir");
        let destination = dir.path().join("template.zip");
        let url = Url::parse(&server.url("/org/repo/archive/refs/heads/main.zip")).expect("url");

        let written = ArchiveFetcher::new(&settings(1024))
            .expect("client")
            .download(&url, &destination)
            .await
            .expect("download");

        mock.assert_async().await;
        assert_eq!(written, 9);
        assert_eq!(std::fs::read(&destination).expect("read"), b"zip-bytes");
    }

    #[tokio::test]
    async fn non_success_status_names_the_url() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(GET).path("/missing.zip");
                then.status(404);
            })
            .await;

        let dir = TempDir::new().expect("dir");
        let url = Url::parse(&server.url("/missing.zip")).expect("url");
        let err = ArchiveFetcher::new(&settings(1024))
            .expect("client")
            .download(&url, &dir.path().join("template.zip"))
            .await
            .expect_err("404");

        assert!(matches!(err, FetchError::Status { status, .. } if status == StatusCode::NOT_FOUND));
        assert_eq!(
            err.to_string(),
            format!("Cannot download template ZIP from {url}: upstream responded with 404 Not Found")
        );
        assert!(!dir.path().join("template.zip").exists());
    }

    #[tokio::test]
    async fn oversized_archives_are_rejected() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(GET).path("/big.zip");
                then.status(200).body(vec![0_u8; 64]);
            })
            .await;

        let dir = TempDir::new().expect("dir");
        let url = Url::parse(&server.url("/big.zip")).expect("url");
        let err = ArchiveFetcher::new(&settings(16))
            .expect("client")
            .download(&url, &dir.path().join("template.zip"))
            .await
            .expect_err("too large");

        assert!(matches!(err, FetchError::TooLarge { limit: 16, .. }));
    }

    #[tokio::test]
    async fn unreachable_host_is_a_request_error() {
        let url = Url::parse("http://127.0.0.1:9/template.zip").expect("url");
        let dir = TempDir::new().expect("dir");
        let err = ArchiveFetcher::new(&settings(1024))
            .expect("client")
            .download(&url, &dir.path().join("template.zip"))
            .await
            .expect_err("connection refused");

        assert!(matches!(err, FetchError::Request { .. }));
        assert_eq!(
            err.to_string(),
            "Cannot download template ZIP from http://127.0.0.1:9/template.zip"
        );
    }
}
