use std::{process, sync::Arc};

use cookiepress::{
    application::{
        error::AppError,
        generate::{GenerateError, GenerateService},
    },
    config::{self, GenerateArgs, Settings},
    domain::{
        request::{ExtraContext, ValidatedRequest, validate_context_key},
        template_url::TemplateUrl,
    },
    infra::{
        error::InfraError,
        http::{self, HttpState},
        telemetry,
    },
};
use tracing::{Dispatch, Level, dispatcher, error, info, warn};
use tracing_subscriber::fmt as tracing_fmt;

#[tokio::main]
async fn main() {
    if let Err(error) = run().await {
        report_application_error(&error);
        process::exit(1);
    }
}

fn report_application_error(error: &AppError) {
    let detail = error.report();
    if dispatcher::has_been_set() {
        error!(error = %detail, "application error");
        return;
    }

    let subscriber = tracing_fmt().with_max_level(Level::ERROR).finish();
    let dispatch = Dispatch::new(subscriber);
    dispatcher::with_default(&dispatch, || {
        error!(error = %detail, "application error");
    });
}

async fn run() -> Result<(), AppError> {
    let (cli_args, settings) = config::load_with_cli()?;

    let command = cli_args
        .command
        .unwrap_or(config::Command::Serve(Box::<config::ServeArgs>::default()));

    telemetry::init(&settings.logging)?;

    match command {
        config::Command::Serve(_) => run_serve(settings).await,
        config::Command::Generate(args) => run_generate(settings, *args).await,
    }
}

async fn run_serve(settings: Settings) -> Result<(), AppError> {
    let service = Arc::new(GenerateService::from_settings(&settings)?);
    let state = HttpState::new(service.clone(), settings.response.transport);
    let max_request_bytes = usize::try_from(settings.server.max_request_bytes.get())
        .map_err(|_| AppError::unexpected("server.max_request_bytes exceeds usize"))?;
    let router = http::build_router(state, max_request_bytes);

    let listener = tokio::net::TcpListener::bind(settings.server.addr)
        .await
        .map_err(|err| AppError::from(InfraError::from(err)))?;

    info!(
        target = "cookiepress::serve",
        addr = %settings.server.addr,
        engine = service.engine(),
        transport = ?settings.response.transport,
        workspace_root = %settings.workspace.root.display(),
        "Listening"
    );

    axum::serve(listener, router.into_make_service())
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(|err| AppError::unexpected(format!("server error: {err}")))?;

    info!(target = "cookiepress::serve", "Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        warn!(
            target = "cookiepress::serve",
            error = %err,
            "Failed to listen for shutdown signal"
        );
        std::future::pending::<()>().await;
    }
}

async fn run_generate(settings: Settings, args: GenerateArgs) -> Result<(), AppError> {
    let service = GenerateService::from_settings(&settings)?;
    let template = TemplateUrl::parse(&args.template_url, args.checkout)
        .map_err(|err| AppError::from(GenerateError::from(err)))?;
    for (key, _) in &args.context {
        validate_context_key(key).map_err(|err| AppError::from(GenerateError::from(err)))?;
    }
    let extra_context: ExtraContext = args.context.into_iter().collect();

    let archive = service
        .generate(ValidatedRequest {
            template,
            extra_context,
        })
        .await?;

    tokio::fs::write(&args.output, &archive.bytes)
        .await
        .map_err(|err| AppError::from(InfraError::from(err)))?;

    info!(
        target = "cookiepress::generate",
        output = %args.output.display(),
        entries = archive.entries,
        bytes = archive.bytes.len(),
        "Project archive written"
    );

    Ok(())
}
