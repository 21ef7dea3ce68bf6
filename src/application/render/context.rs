//! Resolution of the `cookiecutter` variable namespace.
//!
//! Variables are resolved in declaration order so later defaults can refer to
//! earlier ones (`"project_slug": "{{ cookiecutter.project_name | slugify }}"`).

use std::{fs, io::ErrorKind, path::Path};

use cookiepress_api_types::TEMPLATE_CONFIG_FILE;
use serde_json::{Map, Value};
use tera::{Context, Tera};

use super::RenderError;
use crate::domain::request::ExtraContext;

pub(crate) const NAMESPACE: &str = "cookiecutter";

/// Create a Tera instance suitable for rendering arbitrary project files.
pub(crate) fn new_tera() -> Tera {
    let mut tera = Tera::default();
    tera.autoescape_on(Vec::new());
    tera
}

/// Read the variable declarations at the template root.
pub(crate) fn load_config(template_dir: &Path) -> Result<Map<String, Value>, RenderError> {
    let path = template_dir.join(TEMPLATE_CONFIG_FILE);
    let raw = match fs::read_to_string(&path) {
        Ok(raw) => raw,
        Err(err) if err.kind() == ErrorKind::NotFound => {
            return Err(RenderError::config(format!(
                "`{TEMPLATE_CONFIG_FILE}` not found at the template root"
            )));
        }
        Err(err) => return Err(RenderError::io(&path)(err)),
    };

    match serde_json::from_str::<Value>(&raw) {
        Ok(Value::Object(map)) => Ok(map),
        Ok(_) => Err(RenderError::config(format!(
            "`{TEMPLATE_CONFIG_FILE}` must contain a JSON object"
        ))),
        Err(err) => Err(RenderError::config(format!(
            "`{TEMPLATE_CONFIG_FILE}` is not valid JSON: {err}"
        ))),
    }
}

/// Apply overrides and render defaults, producing the final namespace.
///
/// Overrides for undeclared variables are ignored.
pub(crate) fn build_context(
    tera: &mut Tera,
    config: Map<String, Value>,
    extra_context: &ExtraContext,
) -> Result<Map<String, Value>, RenderError> {
    let mut resolved = Map::new();
    for (key, default) in config {
        let value = if is_private(&key) {
            default
        } else {
            resolve_variable(tera, &key, default, extra_context.get(&key), &resolved)?
        };
        resolved.insert(key, value);
    }
    Ok(resolved)
}

/// Wrap the resolved namespace into a render context.
pub(crate) fn tera_context(resolved: &Map<String, Value>) -> Context {
    let mut context = Context::new();
    context.insert(NAMESPACE, resolved);
    context
}

/// `_name` variables are copied verbatim; `__name` variables are rendered.
fn is_private(key: &str) -> bool {
    key.starts_with('_') && !key.starts_with("__")
}

fn resolve_variable(
    tera: &mut Tera,
    key: &str,
    default: Value,
    override_value: Option<&str>,
    resolved: &Map<String, Value>,
) -> Result<Value, RenderError> {
    match default {
        Value::String(raw) => {
            let raw = override_value.map(str::to_string).unwrap_or(raw);
            render_value(tera, key, &raw, resolved).map(Value::String)
        }
        Value::Array(choices) => resolve_choice(tera, key, choices, override_value, resolved),
        Value::Bool(flag) => match override_value {
            Some(value) => parse_bool(key, value).map(Value::Bool),
            None => Ok(Value::Bool(flag)),
        },
        Value::Number(number) => Ok(override_value
            .map(|value| Value::String(value.to_string()))
            .unwrap_or(Value::Number(number))),
        Value::Null => Ok(override_value
            .map(|value| Value::String(value.to_string()))
            .unwrap_or(Value::Null)),
        Value::Object(map) => Ok(Value::Object(map)),
    }
}

fn resolve_choice(
    tera: &mut Tera,
    key: &str,
    choices: Vec<Value>,
    override_value: Option<&str>,
    resolved: &Map<String, Value>,
) -> Result<Value, RenderError> {
    let selected = match override_value {
        Some(value) => choices
            .iter()
            .find(|choice| choice_text(choice) == value)
            .cloned()
            .ok_or_else(|| RenderError::InvalidChoice {
                variable: key.to_string(),
                value: value.to_string(),
                choices: choices.iter().map(choice_text).collect::<Vec<_>>().join(", "),
            })?,
        None => choices.into_iter().next().ok_or_else(|| {
            RenderError::config(format!("`{key}` declares an empty list of choices"))
        })?,
    };

    match selected {
        Value::String(raw) => render_value(tera, key, &raw, resolved).map(Value::String),
        other => Ok(other),
    }
}

fn choice_text(choice: &Value) -> String {
    match choice {
        Value::String(text) => text.clone(),
        other => other.to_string(),
    }
}

fn parse_bool(key: &str, value: &str) -> Result<bool, RenderError> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "t" | "yes" | "y" | "on" => Ok(true),
        "0" | "false" | "f" | "no" | "n" | "off" => Ok(false),
        _ => Err(RenderError::InvalidChoice {
            variable: key.to_string(),
            value: value.to_string(),
            choices: "true, false".to_string(),
        }),
    }
}

fn render_value(
    tera: &mut Tera,
    key: &str,
    raw: &str,
    resolved: &Map<String, Value>,
) -> Result<String, RenderError> {
    if !raw.contains("{{") && !raw.contains("{%") {
        return Ok(raw.to_string());
    }

    tera.render_str(raw, &tera_context(resolved))
        .map_err(|source| RenderError::Syntax {
            path: format!("{TEMPLATE_CONFIG_FILE}#{key}"),
            source,
        })
}
