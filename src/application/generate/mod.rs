//! The generation pipeline: download, extract, render, archive.

use std::{fs, io, path::PathBuf, sync::Arc, time::Instant};

use axum::http::StatusCode;
use bytes::Bytes;
use metrics::{counter, histogram};
use thiserror::Error;
use tracing::{debug, info, warn};
use url::Url;

use crate::{
    application::render::{RenderError, TemplateRenderer, build_renderer},
    config::Settings,
    domain::{
        error::DomainError,
        request::{ExtraContext, ValidatedRequest},
    },
    infra::{
        error::InfraError,
        telemetry::{ARCHIVE_BYTES, GENERATE_MS, GENERATE_TOTAL},
    },
};

pub mod archiver;
pub mod extractor;
pub mod fetcher;
pub mod workspace;

pub use archiver::ArchiveError;
pub use extractor::ExtractError;
pub use fetcher::{ArchiveFetcher, FetchError};
pub use workspace::Workspace;

#[derive(Debug, Error)]
pub enum GenerateError {
    #[error(transparent)]
    Validation(#[from] DomainError),
    #[error(transparent)]
    Fetch(#[from] FetchError),
    #[error(transparent)]
    Extract(#[from] ExtractError),
    #[error(transparent)]
    Render(#[from] RenderError),
    #[error(transparent)]
    Archive(#[from] ArchiveError),
    #[error("workspace failure at `{}`", path.display())]
    Workspace {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("generation task failed")]
    Join(#[source] tokio::task::JoinError),
}

impl GenerateError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::Validation(_) => StatusCode::BAD_REQUEST,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Stable label used for metrics and logs.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Validation(_) => "validation",
            Self::Fetch(_) => "fetch",
            Self::Extract(_) => "extract",
            Self::Render(_) => "render",
            Self::Archive(_) => "archive",
            Self::Workspace { .. } => "workspace",
            Self::Join(_) => "join",
        }
    }
}

/// A finished project archive, held in memory after the workspace is gone.
#[derive(Debug, Clone)]
pub struct GeneratedArchive {
    pub bytes: Bytes,
    pub entries: usize,
}

pub struct GenerateService {
    fetcher: ArchiveFetcher,
    renderer: Arc<dyn TemplateRenderer>,
    workspace_root: PathBuf,
    default_branch: String,
}

impl GenerateService {
    pub fn new(
        fetcher: ArchiveFetcher,
        renderer: Arc<dyn TemplateRenderer>,
        workspace_root: PathBuf,
        default_branch: String,
    ) -> Self {
        Self {
            fetcher,
            renderer,
            workspace_root,
            default_branch,
        }
    }

    pub fn from_settings(settings: &Settings) -> Result<Self, InfraError> {
        let fetcher = ArchiveFetcher::new(&settings.fetch)?;
        Ok(Self::new(
            fetcher,
            build_renderer(&settings.render),
            settings.workspace.root.clone(),
            settings.fetch.default_branch.clone(),
        ))
    }

    pub fn engine(&self) -> &'static str {
        self.renderer.name()
    }

    /// Run the whole pipeline for one request inside a fresh workspace.
    pub async fn generate(
        &self,
        request: ValidatedRequest,
    ) -> Result<GeneratedArchive, GenerateError> {
        let started_at = Instant::now();
        let archive_url = request.template.archive_url(&self.default_branch);

        let result = self.run(archive_url.clone(), request.extra_context).await;
        let elapsed_ms = started_at.elapsed().as_millis() as u64;
        histogram!(GENERATE_MS).record(elapsed_ms as f64);

        match &result {
            Ok(archive) => {
                counter!(GENERATE_TOTAL, "outcome" => "ok").increment(1);
                histogram!(ARCHIVE_BYTES).record(archive.bytes.len() as f64);
                info!(
                    target = "cookiepress::generate",
                    op = "generate",
                    result = "ok",
                    elapsed_ms,
                    engine = self.engine(),
                    template = %archive_url,
                    entries = archive.entries,
                    bytes = archive.bytes.len(),
                    "Project archive generated"
                );
            }
            Err(err) => {
                counter!(GENERATE_TOTAL, "outcome" => err.kind()).increment(1);
                warn!(
                    target = "cookiepress::generate",
                    op = "generate",
                    result = "error",
                    elapsed_ms,
                    engine = self.engine(),
                    template = %archive_url,
                    error_code = err.kind(),
                    error = %err,
                    "Project generation failed"
                );
            }
        }

        result
    }

    async fn run(
        &self,
        archive_url: Url,
        extra_context: ExtraContext,
    ) -> Result<GeneratedArchive, GenerateError> {
        let workspace =
            Workspace::create(&self.workspace_root).map_err(|source| GenerateError::Workspace {
                path: self.workspace_root.clone(),
                source,
            })?;

        let downloaded = match self
            .fetcher
            .download(&archive_url, &workspace.download_path())
            .await
        {
            Ok(bytes) => bytes,
            Err(err) => {
                release(workspace);
                return Err(err.into());
            }
        };
        debug!(
            target = "cookiepress::generate",
            op = "generate::download",
            bytes = downloaded,
            template = %archive_url,
            "Template archive downloaded"
        );

        let renderer = Arc::clone(&self.renderer);
        tokio::task::spawn_blocking(move || {
            let result = build_archive(&workspace, renderer.as_ref(), &archive_url, &extra_context);
            release(workspace);
            result
        })
        .await
        .map_err(GenerateError::Join)?
    }
}

fn build_archive(
    workspace: &Workspace,
    renderer: &dyn TemplateRenderer,
    archive_url: &Url,
    extra_context: &ExtraContext,
) -> Result<GeneratedArchive, GenerateError> {
    let template_dir =
        extractor::extract(&workspace.download_path(), &workspace.template_dir(), archive_url)?;

    let output_dir = workspace.output_dir();
    renderer.render(&template_dir, extra_context, &output_dir)?;

    let summary = archiver::archive(&output_dir, &workspace.archive_path())?;
    let bytes = fs::read(&summary.path).map_err(|source| GenerateError::Workspace {
        path: summary.path.clone(),
        source,
    })?;

    Ok(GeneratedArchive {
        bytes: Bytes::from(bytes),
        entries: summary.entries,
    })
}

fn release(workspace: Workspace) {
    let path = workspace.path().to_path_buf();
    if let Err(err) = workspace.cleanup() {
        warn!(
            target = "cookiepress::generate",
            op = "generate::cleanup",
            path = %path.display(),
            error = %err,
            "Failed to remove workspace"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_validation_errors_are_client_errors() {
        let validation = GenerateError::from(DomainError::validation("bad"));
        assert_eq!(validation.status_code(), StatusCode::BAD_REQUEST);
        assert_eq!(validation.kind(), "validation");

        let extract = GenerateError::from(ExtractError::Empty);
        assert_eq!(extract.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(extract.kind(), "extract");
        assert_eq!(extract.to_string(), "Bad template: ZIP is empty");

        let archive = GenerateError::from(ArchiveError::Empty);
        assert_eq!(archive.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(archive.to_string(), "Rendering produced no files");
    }
}
