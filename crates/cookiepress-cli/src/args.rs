use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueHint};

pub const DEFAULT_SERVER_URL: &str = "http://127.0.0.1:3000";

#[derive(Parser, Debug)]
#[command(
    name = "cookiepress-cli",
    version,
    about = "Generate projects from cookiecutter templates through a cookiepress server"
)]
pub struct Cli {
    /// Base URL of the cookiepress server.
    #[arg(
        long,
        env = "COOKIEPRESS_SERVER_URL",
        default_value = DEFAULT_SERVER_URL,
        global = true,
        value_hint = ValueHint::Url
    )]
    pub server: String,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Render a template on the server and save the project archive.
    Generate(GenerateArgs),
    /// Print the variables a template declares in its cookiecutter.json.
    Variables(VariablesArgs),
}

#[derive(Args, Debug)]
pub struct GenerateArgs {
    /// Repository URL of the template.
    #[arg(value_hint = ValueHint::Url)]
    pub template_url: String,

    /// Variable override, repeatable (`key=value`). Wins over --context-file.
    #[arg(short = 'c', long = "context", value_name = "KEY=VALUE", value_parser = parse_key_value)]
    pub context: Vec<(String, String)>,

    /// JSON object of variable overrides.
    #[arg(long, value_name = "FILE", value_hint = ValueHint::FilePath)]
    pub context_file: Option<PathBuf>,

    /// Branch to render instead of the server's default.
    #[arg(long, value_name = "BRANCH")]
    pub checkout: Option<String>,

    /// Where to write the archive.
    #[arg(short, long, default_value = "project.zip", value_hint = ValueHint::FilePath)]
    pub output: PathBuf,
}

#[derive(Args, Debug)]
pub struct VariablesArgs {
    /// Repository URL of the template, or a direct link to its cookiecutter.json.
    #[arg(value_hint = ValueHint::Url)]
    pub template_url: String,

    /// Branch holding cookiecutter.json.
    #[arg(long, value_name = "BRANCH", default_value = "main")]
    pub checkout: String,
}

pub fn parse_key_value(raw: &str) -> Result<(String, String), String> {
    let (key, value) = raw
        .split_once('=')
        .ok_or_else(|| format!("expected KEY=VALUE, got `{raw}`"))?;
    let key = key.trim();
    if key.is_empty() {
        return Err(format!("missing key in `{raw}`"));
    }
    Ok((key.to_string(), value.to_string()))
}
