use base64::{Engine as _, engine::general_purpose::STANDARD};
use cookiepress_api_types::{
    BASE64_ENCODING, CONTENT_TRANSFER_ENCODING, GENERATE_PATH, GenerateRequest,
    TEMPLATE_CONFIG_FILE,
};
use serde_json::Value;
use url::Url;

use crate::args::{GenerateArgs, VariablesArgs};
use crate::client::{CliError, Ctx};

const GITHUB_HOST: &str = "github.com";
const RAW_GITHUB_BASE: &str = "https://raw.githubusercontent.com";

pub async fn generate(ctx: &Ctx, args: GenerateArgs) -> Result<(), CliError> {
    let request = build_request(&args)?;
    let response = ctx.post_json(GENERATE_PATH, &request).await?;

    let encoded = response
        .headers()
        .get(CONTENT_TRANSFER_ENCODING)
        .and_then(|value| value.to_str().ok())
        .is_some_and(|value| value.eq_ignore_ascii_case(BASE64_ENCODING));
    let body = response.bytes().await?;
    let archive = if encoded {
        STANDARD.decode(body.trim_ascii())?
    } else {
        body.to_vec()
    };

    tokio::fs::write(&args.output, &archive).await?;
    println!("wrote {} ({} bytes)", args.output.display(), archive.len());
    Ok(())
}

pub async fn variables(ctx: &Ctx, args: VariablesArgs) -> Result<(), CliError> {
    let url = raw_config_url(&args.template_url, &args.checkout)?;
    let variables = ctx.get_json(url).await?;
    println!("{}", serde_json::to_string_pretty(&variables)?);
    Ok(())
}

/// Merge `--context-file` and `-c` overrides into a request body.
pub(crate) fn build_request(args: &GenerateArgs) -> Result<GenerateRequest, CliError> {
    let mut request = GenerateRequest::new(args.template_url.clone());

    if let Some(path) = args.context_file.as_ref() {
        let raw = std::fs::read_to_string(path)?;
        match serde_json::from_str::<Value>(&raw)? {
            Value::Object(entries) => request.extra_context.extend(entries),
            _ => {
                return Err(CliError::InvalidInput(format!(
                    "`{}` must contain a JSON object",
                    path.display()
                )));
            }
        }
    }

    for (key, value) in &args.context {
        request = request.with_context(key.clone(), value.clone());
    }
    if let Some(checkout) = args.checkout.as_ref() {
        request = request.with_checkout(checkout.clone());
    }

    Ok(request)
}

/// Where a template's `cookiecutter.json` can be fetched without cloning.
///
/// GitHub repositories map to `raw.githubusercontent.com`; links already
/// pointing at `cookiecutter.json` are used as given.
pub(crate) fn raw_config_url(template_url: &str, branch: &str) -> Result<Url, CliError> {
    let url = Url::parse(template_url.trim()).map_err(|err| {
        CliError::InvalidInput(format!("`{template_url}` is not a valid URL: {err}"))
    })?;
    if url.path().ends_with(TEMPLATE_CONFIG_FILE) {
        return Ok(url);
    }
    if url.host_str() != Some(GITHUB_HOST) {
        return Err(CliError::InvalidInput(format!(
            "cannot locate {TEMPLATE_CONFIG_FILE} for `{template_url}`; pass a github.com repository or a direct link"
        )));
    }

    let mut segments = url
        .path_segments()
        .into_iter()
        .flatten()
        .filter(|segment| !segment.is_empty());
    let (Some(owner), Some(repo)) = (segments.next(), segments.next()) else {
        return Err(CliError::InvalidInput(format!(
            "`{template_url}` does not name an owner and repository"
        )));
    };
    let repo = repo.strip_suffix(".git").unwrap_or(repo);

    Url::parse(&format!(
        "{RAW_GITHUB_BASE}/{owner}/{repo}/{branch}/{TEMPLATE_CONFIG_FILE}"
    ))
    .map_err(|err| CliError::InvalidInput(err.to_string()))
}
