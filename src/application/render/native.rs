use std::{
    ffi::OsStr,
    fs,
    path::{Component, Path, PathBuf},
    time::Instant,
};

use globset::{Glob, GlobSet, GlobSetBuilder};
use serde_json::{Map, Value};
use tera::{Context, Tera};
use tracing::{debug, info, warn};
use walkdir::WalkDir;

use super::{
    RenderError, TemplateRenderer,
    context::{build_context, load_config, new_tera, tera_context},
};
use crate::domain::request::ExtraContext;

const ENGINE: &str = "native";
const COPY_WITHOUT_RENDER_KEY: &str = "_copy_without_render";
const HOOKS_DIR: &str = "hooks";

/// Renders cookiecutter templates in-process with Tera.
///
/// Follows the cookiecutter layout: variables come from `cookiecutter.json`,
/// the project lives in a directory whose name is itself a template, and
/// paths listed in `_copy_without_render` are copied verbatim. Templates are
/// evaluated with Tera, so Jinja2-only syntax and hooks are not supported.
#[derive(Debug, Clone, Default)]
pub struct NativeRenderer;

impl NativeRenderer {
    pub fn new() -> Self {
        Self
    }
}

impl TemplateRenderer for NativeRenderer {
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
        let mut tera = new_tera();

        let config = load_config(template_dir)?;
        let resolved = build_context(&mut tera, config, extra_context)?;
        let context = tera_context(&resolved);
        let verbatim = copy_without_render(&resolved)?;

        if template_dir.join(HOOKS_DIR).is_dir() {
            warn!(
                target = "cookiepress::render::native",
                op = "native::render",
                template = %template_dir.display(),
                "Template hooks are ignored by the native renderer"
            );
        }

        let project_dir = find_project_dir(template_dir)?;
        let mut renderer = TreeRenderer {
            tera: &mut tera,
            context: &context,
            verbatim: &verbatim,
            template_dir,
            files: 0,
        };
        renderer.render_project(&project_dir, output_dir)?;

        info!(
            target = "cookiepress::render::native",
            op = "native::render",
            result = "ok",
            elapsed_ms = started_at.elapsed().as_millis() as u64,
            files = renderer.files,
            variables = resolved.len(),
            "Template rendered"
        );

        Ok(())
    }
}

struct TreeRenderer<'a> {
    tera: &'a mut Tera,
    context: &'a Context,
    verbatim: &'a GlobSet,
    template_dir: &'a Path,
    files: usize,
}

impl TreeRenderer<'_> {
    fn render_project(&mut self, project_dir: &Path, output_dir: &Path) -> Result<(), RenderError> {
        let project_name = Path::new(project_dir.file_name().unwrap_or_default());
        let target_name = self
            .render_path(project_name)?
            .ok_or_else(|| RenderError::template("project directory name rendered empty"))?;
        let target = output_dir.join(target_name);
        if target.exists() {
            return Err(RenderError::OutputExists { path: target });
        }
        fs::create_dir_all(&target).map_err(RenderError::io(&target))?;

        let mut walker = WalkDir::new(project_dir)
            .min_depth(1)
            .sort_by_file_name()
            .into_iter();

        while let Some(entry) = walker.next() {
            let entry = entry.map_err(|err| {
                let path = err.path().map(Path::to_path_buf).unwrap_or_default();
                RenderError::Io {
                    path,
                    source: err.into(),
                }
            })?;
            let relative = entry
                .path()
                .strip_prefix(project_dir)
                .map_err(|_| RenderError::template("entry escaped the project directory"))?;

            let Some(rendered) = self.render_path(relative)? else {
                debug!(
                    target = "cookiepress::render::native",
                    path = %relative.display(),
                    "Skipping entry whose name rendered empty"
                );
                if entry.file_type().is_dir() {
                    walker.skip_current_dir();
                }
                continue;
            };
            let destination = target.join(rendered);

            if entry.file_type().is_dir() {
                fs::create_dir_all(&destination).map_err(RenderError::io(&destination))?;
            } else if entry.file_type().is_symlink() {
                copy_symlink(entry.path(), &destination)?;
            } else {
                let copy_only = self.is_copy_only(relative);
                self.render_file(entry.path(), &destination, copy_only)?;
                self.files += 1;
            }
        }

        Ok(())
    }

    /// Render every component of `relative`. `None` means the entry is skipped.
    fn render_path(&mut self, relative: &Path) -> Result<Option<PathBuf>, RenderError> {
        let mut rendered = PathBuf::new();
        for component in relative.components() {
            let Component::Normal(name) = component else {
                return Err(RenderError::template(format!(
                    "unexpected path component in `{}`",
                    relative.display()
                )));
            };
            let Some(name) = name.to_str() else {
                rendered.push(name);
                continue;
            };

            let value = self.render_text(name, relative)?;
            if value.trim().is_empty() {
                return Ok(None);
            }
            for part in value.split('/').filter(|part| !part.is_empty()) {
                if part == "." || part == ".." {
                    return Err(RenderError::template(format!(
                        "`{}` renders to a path outside the project",
                        relative.display()
                    )));
                }
                rendered.push(part);
            }
        }
        Ok(Some(rendered))
    }

    fn render_file(
        &mut self,
        source: &Path,
        destination: &Path,
        copy_only: bool,
    ) -> Result<(), RenderError> {
        let bytes = fs::read(source).map_err(RenderError::io(source))?;
        let contents = match (copy_only, String::from_utf8(bytes)) {
            (false, Ok(text)) => {
                let relative = source.strip_prefix(self.template_dir).unwrap_or(source);
                self.render_text(&text, relative)?.into_bytes()
            }
            (_, Ok(text)) => text.into_bytes(),
            (_, Err(err)) => err.into_bytes(),
        };

        fs::write(destination, contents).map_err(RenderError::io(destination))?;
        let permissions = fs::metadata(source)
            .map_err(RenderError::io(source))?
            .permissions();
        fs::set_permissions(destination, permissions).map_err(RenderError::io(destination))
    }

    fn render_text(&mut self, text: &str, origin: &Path) -> Result<String, RenderError> {
        if !is_templated(text) {
            return Ok(text.to_string());
        }
        self.tera
            .render_str(text, self.context)
            .map_err(|source| RenderError::Syntax {
                path: origin.display().to_string(),
                source,
            })
    }

    /// Whether `relative` or any of its ancestors is listed in `_copy_without_render`.
    fn is_copy_only(&self, relative: &Path) -> bool {
        relative
            .ancestors()
            .filter(|ancestor| !ancestor.as_os_str().is_empty())
            .any(|ancestor| self.verbatim.is_match(ancestor))
    }
}

fn is_templated(text: &str) -> bool {
    text.contains("{{") || text.contains("{%") || text.contains("{#")
}

/// Locate the directory holding the project, e.g. `{{cookiecutter.project_slug}}`.
fn find_project_dir(template_dir: &Path) -> Result<PathBuf, RenderError> {
    let entries = fs::read_dir(template_dir).map_err(RenderError::io(template_dir))?;
    let mut candidates = Vec::new();
    for entry in entries {
        let entry = entry.map_err(RenderError::io(template_dir))?;
        let path = entry.path();
        if path.is_dir() && is_project_dir_name(&entry.file_name()) {
            candidates.push(path);
        }
    }
    candidates.sort();

    candidates.into_iter().next().ok_or_else(|| {
        RenderError::template(
            "no project directory found; expected a directory named like `{{cookiecutter.project_slug}}`",
        )
    })
}

fn is_project_dir_name(name: &OsStr) -> bool {
    name.to_str().is_some_and(|name| {
        name.contains("cookiecutter") && name.contains("{{") && name.contains("}}")
    })
}

fn copy_without_render(resolved: &Map<String, Value>) -> Result<GlobSet, RenderError> {
    let mut builder = GlobSetBuilder::new();
    match resolved.get(COPY_WITHOUT_RENDER_KEY) {
        None | Some(Value::Null) => {}
        Some(Value::Array(patterns)) => {
            for pattern in patterns {
                let Value::String(pattern) = pattern else {
                    return Err(RenderError::config(format!(
                        "`{COPY_WITHOUT_RENDER_KEY}` entries must be strings"
                    )));
                };
                let glob = Glob::new(pattern.trim_end_matches('/')).map_err(|err| {
                    RenderError::config(format!(
                        "`{COPY_WITHOUT_RENDER_KEY}` pattern `{pattern}` is invalid: {err}"
                    ))
                })?;
                builder.add(glob);
            }
        }
        Some(_) => {
            return Err(RenderError::config(format!(
                "`{COPY_WITHOUT_RENDER_KEY}` must be a list of glob patterns"
            )));
        }
    }

    builder
        .build()
        .map_err(|err| RenderError::config(format!("`{COPY_WITHOUT_RENDER_KEY}`: {err}")))
}

#[cfg(unix)]
fn copy_symlink(source: &Path, destination: &Path) -> Result<(), RenderError> {
    let target = fs::read_link(source).map_err(RenderError::io(source))?;
    std::os::unix::fs::symlink(target, destination).map_err(RenderError::io(destination))
}

#[cfg(not(unix))]
fn copy_symlink(source: &Path, destination: &Path) -> Result<(), RenderError> {
    fs::copy(source, destination)
        .map(|_| ())
        .map_err(RenderError::io(destination))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    const PROJECT: &str = "{{cookiecutter.project_slug}}";

    fn write(root: &Path, relative: &str, contents: impl AsRef<[u8]>) {
        let path = root.join(relative);
        fs::create_dir_all(path.parent().expect("parent")).expect("create parent");
        fs::write(path, contents).expect("write file");
    }

    fn sample_template() -> TempDir {
        let dir = TempDir::new().expect("template dir");
        write(
            dir.path(),
            "cookiecutter.json",
            r#"{
                "project_name": "Demo App",
                "project_slug": "{{ cookiecutter.project_name | lower | replace(from=' ', to='_') }}",
                "license": ["MIT", "Apache-2.0"],
                "use_docker": false,
                "_copy_without_render": ["assets"]
            }"#,
        );
        write(
            dir.path(),
            &format!("{PROJECT}/README.md"),
            "# {{ cookiecutter.project_name }}\n\nLicense: {{ cookiecutter.license }}\n",
        );
        write(
            dir.path(),
            &format!("{PROJECT}/{PROJECT}/__init__.py"),
            "",
        );
        write(
            dir.path(),
            &format!("{PROJECT}/{{% if cookiecutter.use_docker %}}Dockerfile{{% endif %}}"),
            "FROM python:3.12\n",
        );
        write(
            dir.path(),
            &format!("{PROJECT}/assets/page.html"),
            "<p>{{ raw_jinja }}</p>\n",
        );
        write(
            dir.path(),
            &format!("{PROJECT}/logo.bin"),
            [0xff_u8, 0xfe, 0x00, b'{', b'{'],
        );
        dir
    }

    fn render(template: &TempDir, extra: &[(&str, &str)]) -> Result<TempDir, RenderError> {
        let output = TempDir::new().expect("output dir");
        let extra: ExtraContext = extra.iter().copied().collect();
        NativeRenderer::new().render(template.path(), &extra, output.path())?;
        Ok(output)
    }

    #[test]
    fn renders_names_and_contents() {
        let template = sample_template();
        let output = render(&template, &[("license", "Apache-2.0")]).expect("render");

        let project = output.path().join("demo_app");
        let readme = fs::read_to_string(project.join("README.md")).expect("readme");
        assert_eq!(readme, "# Demo App\n\nLicense: Apache-2.0\n");
        assert!(project.join("demo_app/__init__.py").is_file());
    }

    #[test]
    fn empty_rendered_names_are_skipped() {
        let template = sample_template();

        let output = render(&template, &[]).expect("render");
        assert!(!output.path().join("demo_app/Dockerfile").exists());

        let output = render(&template, &[("use_docker", "yes")]).expect("render");
        assert!(output.path().join("demo_app/Dockerfile").is_file());
    }

    #[test]
    fn copy_without_render_and_binary_files_are_verbatim() {
        let template = sample_template();
        let output = render(&template, &[]).expect("render");

        let project = output.path().join("demo_app");
        let page = fs::read_to_string(project.join("assets/page.html")).expect("page");
        assert_eq!(page, "<p>{{ raw_jinja }}</p>\n");
        let logo = fs::read(project.join("logo.bin")).expect("logo");
        assert_eq!(logo, [0xff_u8, 0xfe, 0x00, b'{', b'{']);
    }

    #[test]
    fn undefined_variable_names_the_failing_file() {
        let template = sample_template();
        write(
            template.path(),
            &format!("{PROJECT}/broken.txt"),
            "{{ cookiecutter.nope }}",
        );

        let err = render(&template, &[]).expect_err("undefined variable");
        assert!(matches!(err, RenderError::Syntax { .. }));
        assert!(err.to_string().contains("broken.txt"), "{err}");
    }

    #[test]
    fn invalid_choice_is_rejected() {
        let template = sample_template();
        let err = render(&template, &[("license", "WTFPL")]).expect_err("bad choice");
        assert!(matches!(err, RenderError::InvalidChoice { .. }));
    }

    #[test]
    fn existing_output_directory_is_an_error() {
        let template = sample_template();
        let output = TempDir::new().expect("output dir");
        fs::create_dir(output.path().join("demo_app")).expect("pre-existing dir");

        let err = NativeRenderer::new()
            .render(template.path(), &ExtraContext::new(), output.path())
            .expect_err("output exists");
        assert!(matches!(err, RenderError::OutputExists { .. }));
    }

    #[test]
    fn template_without_project_directory_is_rejected() {
        let template = TempDir::new().expect("template dir");
        write(template.path(), "cookiecutter.json", r#"{"name": "x"}"#);
        write(template.path(), "plain/README.md", "hello");

        let err = render(&template, &[]).expect_err("no project dir");
        assert!(matches!(err, RenderError::Template { .. }));
    }

    #[test]
    fn missing_config_is_rejected() {
        let template = TempDir::new().expect("template dir");
        write(template.path(), &format!("{PROJECT}/README.md"), "hello");

        let err = render(&template, &[]).expect_err("no config");
        assert!(matches!(err, RenderError::Config { .. }));
    }

    #[cfg(unix)]
    #[test]
    fn file_modes_are_preserved() {
        use std::os::unix::fs::PermissionsExt;

        let template = sample_template();
        let script = template.path().join(PROJECT).join("run.sh");
        fs::write(&script, "#!/bin/sh\necho {{ cookiecutter.project_slug }}\n").expect("script");
        fs::set_permissions(&script, fs::Permissions::from_mode(0o755)).expect("chmod");

        let output = render(&template, &[]).expect("render");
        let rendered = output.path().join("demo_app/run.sh");
        let mode = fs::metadata(&rendered).expect("metadata").permissions().mode();
        assert_eq!(mode & 0o777, 0o755);
        assert_eq!(
            fs::read_to_string(rendered).expect("script"),
            "#!/bin/sh\necho demo_app\n"
        );
    }
}
