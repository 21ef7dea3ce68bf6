//! Template rendering engines.
//!
//! The pipeline only sees [`TemplateRenderer`]; which engine backs it is a
//! deployment choice (`render.engine`).

use std::{io, path::PathBuf, sync::Arc};

use thiserror::Error;

use crate::{
    config::{RenderEngine, RenderSettings},
    domain::request::ExtraContext,
};

mod context;
pub mod cookiecutter;
pub mod native;

pub use cookiecutter::CookiecutterCli;
pub use native::NativeRenderer;

/// A non-interactive engine turning a template directory into a project.
pub trait TemplateRenderer: Send + Sync {
    /// Short engine name used in logs and error messages.
    fn name(&self) -> &'static str;

    /// Render `template_dir` with `extra_context` into `output_dir`.
    ///
    /// Blocking; callers run it off the async runtime.
    fn render(
        &self,
        template_dir: &std::path::Path,
        extra_context: &ExtraContext,
        output_dir: &std::path::Path,
    ) -> Result<(), RenderError>;
}

#[derive(Debug, Error)]
pub enum RenderError {
    #[error("{engine} is not available")]
    Unavailable {
        engine: &'static str,
        #[source]
        source: io::Error,
    },
    #[error("failed to launch {engine}")]
    Spawn {
        engine: &'static str,
        #[source]
        source: io::Error,
    },
    #[error("{engine} invocation failed (exit {exit_code:?}): {message}")]
    Engine {
        engine: &'static str,
        exit_code: Option<i32>,
        message: String,
    },
    #[error("invalid template configuration: {message}")]
    Config { message: String },
    #[error("invalid template: {message}")]
    Template { message: String },
    #[error("invalid value `{value}` for `{variable}`; expected one of: {choices}")]
    InvalidChoice {
        variable: String,
        value: String,
        choices: String,
    },
    #[error("failed to render `{path}`")]
    Syntax {
        path: String,
        #[source]
        source: tera::Error,
    },
    #[error("output directory `{}` already exists", path.display())]
    OutputExists { path: PathBuf },
    #[error("filesystem error at `{}`", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

impl RenderError {
    pub(crate) fn io(path: impl Into<PathBuf>) -> impl FnOnce(io::Error) -> Self {
        let path = path.into();
        move |source| Self::Io { path, source }
    }

    pub(crate) fn template(message: impl Into<String>) -> Self {
        Self::Template {
            message: message.into(),
        }
    }

    pub(crate) fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }
}

/// Build the renderer selected by the settings.
pub fn build_renderer(settings: &RenderSettings) -> Arc<dyn TemplateRenderer> {
    match settings.engine {
        RenderEngine::Cookiecutter => {
            Arc::new(CookiecutterCli::new(settings.cookiecutter_cli_path.clone()))
        }
        RenderEngine::Native => Arc::new(NativeRenderer::new()),
    }
}
