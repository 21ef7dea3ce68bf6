use std::{
    io::ErrorKind,
    path::{Path, PathBuf},
    process::{Command, Stdio},
    time::Instant,
};

use tracing::{info, warn};

use super::{RenderError, TemplateRenderer};
use crate::domain::request::ExtraContext;

const ENGINE: &str = "cookiecutter";

/// Renders templates by invoking the `cookiecutter` executable.
///
/// The process runs with `--no-input`, so every variable not present in the
/// extra context falls back to its `cookiecutter.json` default.
#[derive(Debug, Clone)]
pub struct CookiecutterCli {
    program: PathBuf,
}

impl CookiecutterCli {
    pub fn new(program: PathBuf) -> Self {
        Self { program }
    }

    fn command(&self, template_dir: &Path, extra_context: &ExtraContext, output_dir: &Path) -> Command {
        let mut command = Command::new(&self.program);
        command
            .arg("--no-input")
            .arg("--output-dir")
            .arg(output_dir)
            .arg("--")
            .arg(template_dir);
        for (key, value) in extra_context.iter() {
            command.arg(format!("{key}={value}"));
        }
        command
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());
        command
    }
}

impl TemplateRenderer for CookiecutterCli {
    fn name(&self) -> &'static str {
        ENGINE
    }

    fn render(
        &self,
        template_dir: &Path,
        extra_context: &ExtraContext,
        output_dir: &Path,
    ) -> Result<(), RenderError> {
        let started_at = Instant::now();
        let output = self
            .command(template_dir, extra_context, output_dir)
            .output()
            .map_err(|err| {
                warn!(
                    target = "cookiepress::render::cookiecutter",
                    op = "cookiecutter::render",
                    result = "error",
                    elapsed_ms = started_at.elapsed().as_millis() as u64,
                    error_code = "spawn_cli",
                    program = %self.program.display(),
                    error = %err,
                    "Failed to spawn cookiecutter"
                );
                if err.kind() == ErrorKind::NotFound {
                    RenderError::Unavailable {
                        engine: ENGINE,
                        source: err,
                    }
                } else {
                    RenderError::Spawn {
                        engine: ENGINE,
                        source: err,
                    }
                }
            })?;

        if !output.status.success() {
            let exit_code = output.status.code();
            let message = failure_message(&output.stderr, &output.stdout);
            warn!(
                target = "cookiepress::render::cookiecutter",
                op = "cookiecutter::render",
                result = "error",
                elapsed_ms = started_at.elapsed().as_millis() as u64,
                exit_code = exit_code.map(i64::from).unwrap_or(-1),
                error_code = "cookiecutter_cli",
                message = %message,
                "cookiecutter invocation failed"
            );
            return Err(RenderError::Engine {
                engine: ENGINE,
                exit_code,
                message,
            });
        }

        info!(
            target = "cookiepress::render::cookiecutter",
            op = "cookiecutter::render",
            result = "ok",
            elapsed_ms = started_at.elapsed().as_millis() as u64,
            variables = extra_context.len(),
            "Template rendered via cookiecutter"
        );

        Ok(())
    }
}

/// cookiecutter reports some failures on stdout; prefer stderr when it has content.
fn failure_message(stderr: &[u8], stdout: &[u8]) -> String {
    let stderr = String::from_utf8_lossy(stderr);
    let stderr = stderr.trim();
    if !stderr.is_empty() {
        return stderr.to_string();
    }

    let stdout = String::from_utf8_lossy(stdout);
    let stdout = stdout.trim();
    if stdout.is_empty() {
        "no diagnostic output".to_string()
    } else {
        stdout.to_string()
    }
}
