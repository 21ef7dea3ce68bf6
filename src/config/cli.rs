use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueHint, builder::BoolishValueParser};

/// Command-line arguments for the cookiepress binary.
#[derive(Debug, Parser)]
#[command(
    name = "cookiepress",
    version,
    about = "Render cookiecutter templates into downloadable project archives"
)]
pub struct CliArgs {
    /// Optional path to a configuration file.
    #[arg(long = "config-file", env = "COOKIEPRESS_CONFIG_FILE", value_name = "PATH")]
    pub config_file: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Debug, Subcommand, Clone)]
pub enum Command {
    /// Run the HTTP service.
    Serve(Box<ServeArgs>),
    /// Generate a single project archive locally without starting the server.
    Generate(Box<GenerateArgs>),
}

#[derive(Debug, Args, Default, Clone)]
pub struct ServeArgs {
    #[command(flatten)]
    pub overrides: ServeOverrides,
}

/// Overrides shared by every command that runs the generation pipeline.
#[derive(Debug, Args, Default, Clone)]
pub struct PipelineOverrides {
    /// Override the directory under which per-request workspaces are created.
    #[arg(long = "workspace-root", value_name = "PATH", value_hint = ValueHint::DirPath)]
    pub workspace_root: Option<PathBuf>,

    /// Override the branch assumed when a request does not name one.
    #[arg(long = "fetch-default-branch", value_name = "BRANCH")]
    pub fetch_default_branch: Option<String>,

    /// Override the maximum accepted template archive size in bytes.
    #[arg(long = "fetch-max-archive-bytes", value_name = "BYTES")]
    pub fetch_max_archive_bytes: Option<u64>,

    /// Override the template download timeout.
    #[arg(long = "fetch-timeout-seconds", value_name = "SECONDS")]
    pub fetch_timeout_seconds: Option<u64>,

    /// Override the rendering engine (cookiecutter|native).
    #[arg(long = "render-engine", value_name = "ENGINE")]
    pub render_engine: Option<String>,

    /// Override the cookiecutter executable path.
    #[arg(long = "render-cookiecutter-cli-path", value_name = "PATH")]
    pub render_cookiecutter_cli_path: Option<PathBuf>,

    /// Override the base log level (trace|debug|info|warn|error).
    #[arg(long = "log-level", value_name = "LEVEL")]
    pub log_level: Option<String>,

    /// Toggle JSON logging.
    #[arg(
        long = "log-json",
        value_name = "BOOL",
        value_parser = BoolishValueParser::new()
    )]
    pub log_json: Option<bool>,
}

#[derive(Debug, Args, Default, Clone)]
pub struct ServeOverrides {
    #[command(flatten)]
    pub pipeline: PipelineOverrides,

    /// Override the listener host.
    #[arg(long = "server-host", value_name = "HOST")]
    pub server_host: Option<String>,

    /// Override the listener port.
    #[arg(long = "server-port", value_name = "PORT")]
    pub server_port: Option<u16>,

    /// Override the maximum request body size in bytes.
    #[arg(long = "server-max-request-bytes", value_name = "BYTES")]
    pub server_max_request_bytes: Option<u64>,

    /// Override how archives are returned (binary|base64).
    #[arg(long = "response-transport", value_name = "TRANSPORT")]
    pub response_transport: Option<String>,
}

#[derive(Debug, Args, Clone)]
pub struct GenerateArgs {
    #[command(flatten)]
    pub pipeline: PipelineOverrides,

    /// Repository URL of the template.
    #[arg(value_name = "TEMPLATE_URL", value_hint = ValueHint::Url)]
    pub template_url: String,

    /// Template variable override, repeatable (`key=value`).
    #[arg(short = 'c', long = "context", value_name = "KEY=VALUE", value_parser = parse_key_value)]
    pub context: Vec<(String, String)>,

    /// Branch to download instead of the configured default.
    #[arg(long, value_name = "BRANCH")]
    pub checkout: Option<String>,

    /// Where to write the project archive.
    #[arg(short, long, default_value = "project.zip", value_hint = ValueHint::FilePath)]
    pub output: PathBuf,
}

pub(crate) fn parse_key_value(raw: &str) -> Result<(String, String), String> {
    let (key, value) = raw
        .split_once('=')
        .ok_or_else(|| format!("expected KEY=VALUE, got `{raw}`"))?;
    let key = key.trim();
    if key.is_empty() {
        return Err(format!("missing key in `{raw}`"));
    }
    Ok((key.to_string(), value.to_string()))
}
