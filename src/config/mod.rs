//! Configuration layer: typed settings with layered precedence (file → env → CLI).

use std::{
    fmt::{Display, Formatter},
    net::SocketAddr,
    num::NonZeroU64,
    path::PathBuf,
    str::FromStr,
    time::Duration,
};

use clap::Parser;
use config::{Config, Environment, File};
use serde::Deserialize;
use thiserror::Error;
use tracing::level_filters::LevelFilter;

mod cli;

pub use cli::{CliArgs, Command, GenerateArgs, PipelineOverrides, ServeArgs, ServeOverrides};

const DEFAULT_CONFIG_BASENAME: &str = "config/default";
const LOCAL_CONFIG_BASENAME: &str = "cookiepress";
const ENV_PREFIX: &str = "COOKIEPRESS";
const DEFAULT_HOST: &str = "127.0.0.1";
const DEFAULT_PORT: u16 = 3000;
const DEFAULT_MAX_REQUEST_BYTES: u64 = 1024 * 1024;
const DEFAULT_BRANCH: &str = "main";
const DEFAULT_MAX_ARCHIVE_BYTES: u64 = 64 * 1024 * 1024;
pub(crate) const DEFAULT_COOKIECUTTER_CLI_PATH: &str = "cookiecutter";

/// Fully-resolved deployment settings after precedence resolution and validation.
#[derive(Debug, Clone)]
pub struct Settings {
    pub server: ServerSettings,
    pub logging: LoggingSettings,
    pub workspace: WorkspaceSettings,
    pub fetch: FetchSettings,
    pub render: RenderSettings,
    pub response: ResponseSettings,
}

#[derive(Debug, Clone)]
pub struct ServerSettings {
    pub addr: SocketAddr,
    pub max_request_bytes: NonZeroU64,
}

#[derive(Debug, Clone)]
pub struct LoggingSettings {
    pub level: LevelFilter,
    pub format: LogFormat,
}

#[derive(Debug, Clone, Copy)]
pub enum LogFormat {
    Json,
    Compact,
}

#[derive(Debug, Clone)]
pub struct WorkspaceSettings {
    /// Parent directory for per-request workspaces.
    pub root: PathBuf,
}

#[derive(Debug, Clone)]
pub struct FetchSettings {
    pub default_branch: String,
    pub max_archive_bytes: NonZeroU64,
    /// `None` leaves downloads unbounded in time; the hosting platform's own
    /// request timeout applies.
    pub timeout: Option<Duration>,
}

#[derive(Debug, Clone)]
pub struct RenderSettings {
    pub engine: RenderEngine,
    pub cookiecutter_cli_path: PathBuf,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RenderEngine {
    /// The external `cookiecutter` executable.
    Cookiecutter,
    /// The built-in Tera renderer following cookiecutter conventions.
    Native,
}

impl RenderEngine {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Cookiecutter => "cookiecutter",
            Self::Native => "native",
        }
    }
}

impl FromStr for RenderEngine {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "cookiecutter" => Ok(Self::Cookiecutter),
            "native" => Ok(Self::Native),
            other => Err(format!(
                "unknown engine `{other}` (expected cookiecutter or native)"
            )),
        }
    }
}

impl Display for RenderEngine {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone)]
pub struct ResponseSettings {
    pub transport: ResponseTransport,
}

/// How the finished archive travels back to the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ResponseTransport {
    /// Raw zip bytes.
    #[default]
    Binary,
    /// Base64 text, for hosts that only relay text-safe bodies.
    Base64,
}

impl FromStr for ResponseTransport {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "binary" => Ok(Self::Binary),
            "base64" => Ok(Self::Base64),
            other => Err(format!(
                "unknown transport `{other}` (expected binary or base64)"
            )),
        }
    }
}

#[derive(Debug, Error)]
pub enum LoadError {
    #[error("failed to build configuration: {0}")]
    Build(#[from] config::ConfigError),
    #[error("invalid configuration for `{key}`: {reason}")]
    Invalid { key: &'static str, reason: String },
}

impl LoadError {
    fn invalid(key: &'static str, reason: impl Into<String>) -> Self {
        Self::Invalid {
            key,
            reason: reason.into(),
        }
    }
}

/// Load settings using the configured precedence (file → environment → CLI).
pub fn load(cli: &CliArgs) -> Result<Settings, LoadError> {
    let mut builder = Config::builder()
        .add_source(File::with_name(DEFAULT_CONFIG_BASENAME).required(false))
        .add_source(File::with_name(LOCAL_CONFIG_BASENAME).required(false));

    if let Some(path) = cli.config_file.as_ref() {
        builder = builder.add_source(File::from(path.as_path()).required(true));
    }

    builder = builder.add_source(Environment::with_prefix(ENV_PREFIX).separator("__"));

    let mut raw: RawSettings = builder.build()?.try_deserialize()?;

    match cli.command.as_ref() {
        Some(Command::Serve(args)) => raw.apply_serve_overrides(&args.overrides),
        Some(Command::Generate(args)) => raw.apply_pipeline_overrides(&args.pipeline),
        None => raw.apply_serve_overrides(&ServeOverrides::default()),
    }

    Settings::from_raw(raw)
}

/// Resolve configuration using the supplied CLI arguments, returning both for downstream use.
pub fn load_with_cli() -> Result<(CliArgs, Settings), LoadError> {
    let args = CliArgs::parse();
    let settings = load(&args)?;
    Ok((args, settings))
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawSettings {
    server: RawServerSettings,
    logging: RawLoggingSettings,
    workspace: RawWorkspaceSettings,
    fetch: RawFetchSettings,
    render: RawRenderSettings,
    response: RawResponseSettings,
}

impl RawSettings {
    fn apply_serve_overrides(&mut self, overrides: &ServeOverrides) {
        if let Some(host) = overrides.server_host.as_ref() {
            self.server.host = Some(host.clone());
        }
        if let Some(port) = overrides.server_port {
            self.server.port = Some(port);
        }
        if let Some(limit) = overrides.server_max_request_bytes {
            self.server.max_request_bytes = Some(limit);
        }
        if let Some(transport) = overrides.response_transport.as_ref() {
            self.response.transport = Some(transport.clone());
        }

        self.apply_pipeline_overrides(&overrides.pipeline);
    }

    fn apply_pipeline_overrides(&mut self, overrides: &PipelineOverrides) {
        if let Some(root) = overrides.workspace_root.as_ref() {
            self.workspace.root = Some(root.clone());
        }
        if let Some(branch) = overrides.fetch_default_branch.as_ref() {
            self.fetch.default_branch = Some(branch.clone());
        }
        if let Some(limit) = overrides.fetch_max_archive_bytes {
            self.fetch.max_archive_bytes = Some(limit);
        }
        if let Some(seconds) = overrides.fetch_timeout_seconds {
            self.fetch.timeout_seconds = Some(seconds);
        }
        if let Some(engine) = overrides.render_engine.as_ref() {
            self.render.engine = Some(engine.clone());
        }
        if let Some(path) = overrides.render_cookiecutter_cli_path.as_ref() {
            self.render.cookiecutter_cli_path = Some(path.clone());
        }
        if let Some(level) = overrides.log_level.as_ref() {
            self.logging.level = Some(level.clone());
        }
        if let Some(json) = overrides.log_json {
            self.logging.json = Some(json);
        }
    }
}

impl Settings {
    fn from_raw(raw: RawSettings) -> Result<Self, LoadError> {
        let RawSettings {
            server,
            logging,
            workspace,
            fetch,
            render,
            response,
        } = raw;

        Ok(Self {
            server: build_server_settings(server)?,
            logging: build_logging_settings(logging)?,
            workspace: build_workspace_settings(workspace)?,
            fetch: build_fetch_settings(fetch)?,
            render: build_render_settings(render)?,
            response: build_response_settings(response)?,
        })
    }
}

fn build_server_settings(server: RawServerSettings) -> Result<ServerSettings, LoadError> {
    let host = server.host.unwrap_or_else(|| DEFAULT_HOST.to_string());

    let port = server.port.unwrap_or(DEFAULT_PORT);
    if port == 0 {
        return Err(LoadError::invalid(
            "server.port",
            "port must be greater than zero",
        ));
    }

    let addr = parse_socket_addr(&host, port)
        .map_err(|reason| LoadError::invalid("server.addr", reason))?;

    let max_request_bytes_value = server
        .max_request_bytes
        .unwrap_or(DEFAULT_MAX_REQUEST_BYTES);
    let max_request_bytes = NonZeroU64::new(max_request_bytes_value).ok_or_else(|| {
        LoadError::invalid("server.max_request_bytes", "must be greater than zero")
    })?;
    usize::try_from(max_request_bytes_value).map_err(|_| {
        LoadError::invalid(
            "server.max_request_bytes",
            "value exceeds supported range for usize",
        )
    })?;

    Ok(ServerSettings {
        addr,
        max_request_bytes,
    })
}

fn build_logging_settings(logging: RawLoggingSettings) -> Result<LoggingSettings, LoadError> {
    let level = match logging.level {
        Some(level) => LevelFilter::from_str(level.as_str()).map_err(|err| {
            LoadError::invalid("logging.level", format!("failed to parse: {err}"))
        })?,
        None => LevelFilter::INFO,
    };

    let format = if logging.json.unwrap_or(false) {
        LogFormat::Json
    } else {
        LogFormat::Compact
    };

    Ok(LoggingSettings { level, format })
}

fn build_workspace_settings(
    workspace: RawWorkspaceSettings,
) -> Result<WorkspaceSettings, LoadError> {
    let root = workspace.root.unwrap_or_else(std::env::temp_dir);
    if root.as_os_str().is_empty() {
        return Err(LoadError::invalid(
            "workspace.root",
            "path must not be empty",
        ));
    }

    Ok(WorkspaceSettings { root })
}

fn build_fetch_settings(fetch: RawFetchSettings) -> Result<FetchSettings, LoadError> {
    let default_branch = fetch
        .default_branch
        .map(|value| value.trim().to_string())
        .unwrap_or_else(|| DEFAULT_BRANCH.to_string());
    if default_branch.is_empty() {
        return Err(LoadError::invalid(
            "fetch.default_branch",
            "branch must not be blank",
        ));
    }

    let max_archive_bytes = NonZeroU64::new(
        fetch
            .max_archive_bytes
            .unwrap_or(DEFAULT_MAX_ARCHIVE_BYTES),
    )
    .ok_or_else(|| LoadError::invalid("fetch.max_archive_bytes", "must be greater than zero"))?;

    let timeout = match fetch.timeout_seconds {
        Some(0) => {
            return Err(LoadError::invalid(
                "fetch.timeout_seconds",
                "must be greater than zero",
            ));
        }
        Some(seconds) => Some(Duration::from_secs(seconds)),
        None => None,
    };

    Ok(FetchSettings {
        default_branch,
        max_archive_bytes,
        timeout,
    })
}

fn build_render_settings(render: RawRenderSettings) -> Result<RenderSettings, LoadError> {
    let engine = match render.engine {
        Some(value) => RenderEngine::from_str(&value)
            .map_err(|reason| LoadError::invalid("render.engine", reason))?,
        None => RenderEngine::Cookiecutter,
    };

    let cli_path = render
        .cookiecutter_cli_path
        .unwrap_or_else(|| PathBuf::from(DEFAULT_COOKIECUTTER_CLI_PATH));
    if cli_path.as_os_str().is_empty() {
        return Err(LoadError::invalid(
            "render.cookiecutter_cli_path",
            "path must not be empty",
        ));
    }

    Ok(RenderSettings {
        engine,
        cookiecutter_cli_path: cli_path,
    })
}

fn build_response_settings(response: RawResponseSettings) -> Result<ResponseSettings, LoadError> {
    let transport = match response.transport {
        Some(value) => ResponseTransport::from_str(&value)
            .map_err(|reason| LoadError::invalid("response.transport", reason))?,
        None => ResponseTransport::default(),
    };

    Ok(ResponseSettings { transport })
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawServerSettings {
    host: Option<String>,
    port: Option<u16>,
    max_request_bytes: Option<u64>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawLoggingSettings {
    level: Option<String>,
    json: Option<bool>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawWorkspaceSettings {
    root: Option<PathBuf>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawFetchSettings {
    default_branch: Option<String>,
    max_archive_bytes: Option<u64>,
    timeout_seconds: Option<u64>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawRenderSettings {
    engine: Option<String>,
    cookiecutter_cli_path: Option<PathBuf>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawResponseSettings {
    transport: Option<String>,
}

fn parse_socket_addr(host: &str, port: u16) -> Result<SocketAddr, String> {
    let candidate = format!("{host}:{port}");
    candidate
        .parse()
        .map_err(|err| format!("invalid address `{candidate}`: {err}"))
}
