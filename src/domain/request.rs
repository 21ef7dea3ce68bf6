//! Validation of generation requests.

use std::collections::BTreeMap;

use serde_json::{Map, Value};

use super::error::DomainError;
use super::template_url::TemplateUrl;

const TEMPLATE_URL_FIELD: &str = "template_url";
const EXTRA_CONTEXT_FIELD: &str = "extra_context";
const CHECKOUT_FIELD: &str = "checkout";

/// User-supplied overrides for template variables.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExtraContext(BTreeMap<String, String>);

impl ExtraContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key).map(String::as_str)
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.0.insert(key.into(), value.into());
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl<K, V> FromIterator<(K, V)> for ExtraContext
where
    K: Into<String>,
    V: Into<String>,
{
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self(
            iter.into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        )
    }
}

/// A request that passed validation and is ready for the generation pipeline.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidatedRequest {
    pub template: TemplateUrl,
    pub extra_context: ExtraContext,
}

/// Parse and validate a raw `POST /api/generate` body.
///
/// The body is parsed as JSON regardless of the declared content type.
pub fn parse_generate_request(body: &[u8]) -> Result<ValidatedRequest, DomainError> {
    let value: Value = serde_json::from_slice(body)
        .map_err(|err| DomainError::validation(format!("request body is not valid JSON: {err}")))?;

    let Value::Object(fields) = value else {
        return Err(DomainError::validation("request body must be a JSON object"));
    };

    let template_url = match fields.get(TEMPLATE_URL_FIELD) {
        Some(Value::String(url)) if !url.trim().is_empty() => url.as_str(),
        Some(Value::String(_)) | Some(Value::Null) | None => {
            return Err(DomainError::validation("`template_url` is required"));
        }
        Some(_) => return Err(DomainError::validation("`template_url` must be a string")),
    };

    let checkout = match fields.get(CHECKOUT_FIELD) {
        None | Some(Value::Null) => None,
        Some(Value::String(checkout)) => Some(checkout.clone()),
        Some(_) => return Err(DomainError::validation("`checkout` must be a string")),
    };

    let extra_context = match fields.get(EXTRA_CONTEXT_FIELD) {
        None | Some(Value::Null) => ExtraContext::new(),
        Some(Value::Object(entries)) => parse_extra_context(entries)?,
        Some(_) => {
            return Err(DomainError::validation(
                "`extra_context` must be a JSON object",
            ));
        }
    };

    let template = TemplateUrl::parse(template_url, checkout)?;

    Ok(ValidatedRequest {
        template,
        extra_context,
    })
}

fn parse_extra_context(entries: &Map<String, Value>) -> Result<ExtraContext, DomainError> {
    let mut context = ExtraContext::new();
    for (key, value) in entries {
        validate_context_key(key)?;
        let text = match value {
            Value::String(text) => text.clone(),
            Value::Number(number) => number.to_string(),
            Value::Bool(flag) => flag.to_string(),
            Value::Null | Value::Array(_) | Value::Object(_) => {
                return Err(DomainError::validation(format!(
                    "`extra_context.{key}` must be a string, number or boolean"
                )));
            }
        };
        context.insert(key.clone(), text);
    }
    Ok(context)
}

/// Reject override names the rendering engine could read as something other
/// than a `key=value` pair.
pub fn validate_context_key(key: &str) -> Result<(), DomainError> {
    if key.trim().is_empty() {
        return Err(DomainError::validation(
            "`extra_context` keys must not be blank",
        ));
    }
    if key.starts_with('-') || key.contains('=') {
        return Err(DomainError::validation(format!(
            "`extra_context` key `{key}` must not start with `-` or contain `=`"
        )));
    }
    Ok(())
}
