//! CLI entry point for resource-dl.

use std::io::IsTerminal;
use std::path::Path;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result, bail};
use clap::Parser;
use resource_dl::{
    DownloadObserver, DownloadOrchestrator, DownloadOutcome, DownloadRequest, DownloadSink,
    FileSystemSink, HttpClient, HttpDownloadRecorder, NoopObserver, Resource, UserAgentEnvironment,
};
use tracing::{debug, error, info, warn};

mod cli;
mod config;
mod progress_ui;

use cli::Args;
use config::RunSettings;
use progress_ui::{ProgressBarObserver, is_dumb_terminal, should_show_progress};

/// Upper bound on waiting for the download counter before exiting.
const RECORD_WAIT: Duration = Duration::from_secs(5);

#[tokio::main]
async fn main() -> Result<ExitCode> {
    // Parse CLI arguments first (before tracing, so --help works without logs)
    let args = Args::parse();

    // Priority: RUST_LOG env var > quiet flag > verbose flag > default (info)
    let default_level = if args.quiet {
        "error"
    } else {
        match args.verbose {
            0 => "info",
            1 => "debug",
            _ => "trace",
        }
    };

    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    debug!(?args, "CLI arguments parsed");

    let file_config = config::load_default_file_config()?;
    file_config
        .validate()
        .context("Invalid configuration file")?;
    let settings = RunSettings::resolve(&args, &file_config);
    debug!(?settings, "effective settings");

    let resource = match &args.resource {
        Some(path) => Some(load_resource(path)?),
        None => None,
    };

    let client = HttpClient::new();
    let sink = Arc::new(
        FileSystemSink::new(client.clone(), &settings.output_dir)
            .with_new_contexts(settings.allow_new_contexts),
    );
    let mut orchestrator = DownloadOrchestrator::new(
        Arc::clone(&sink) as Arc<dyn DownloadSink>,
        Arc::new(UserAgentEnvironment::new(&settings.user_agent)),
    )
    .with_client(client.clone())
    .with_tuning(settings.tuning);
    if let Some(endpoint) = &settings.record_endpoint {
        orchestrator = orchestrator.with_recorder(Arc::new(HttpDownloadRecorder::new(
            client.inner().clone(),
            endpoint,
        )));
    }

    let request = build_request(&args, resource.as_ref(), &settings)?;

    let show_progress = should_show_progress(
        std::io::stderr().is_terminal(),
        args.quiet,
        args.json,
        is_dumb_terminal(),
    );
    let observer: Box<dyn DownloadObserver> = if show_progress && !args.native {
        Box::new(ProgressBarObserver::new(request.target_file_name()))
    } else {
        Box::new(NoopObserver)
    };

    // The request carries CLI overrides, so record and download separately.
    let recording = resource
        .as_ref()
        .and_then(|resource| orchestrator.record(resource));

    let outcome = if args.native {
        orchestrator.download_native(request.source_url(), request.target_file_name())
    } else {
        orchestrator.download(&request, observer.as_ref()).await
    };
    drop(observer);

    let saves = sink.wait_for_saves().await;
    let failed_saves = saves.iter().filter(|save| save.is_err()).count();

    if let Some(handle) = recording
        && tokio::time::timeout(RECORD_WAIT, handle).await.is_err()
    {
        warn!("download counter did not answer in time");
    }

    report_outcome(&outcome, args.json)?;

    if outcome.is_success() && failed_saves == 0 {
        Ok(ExitCode::SUCCESS)
    } else {
        Ok(ExitCode::FAILURE)
    }
}

fn load_resource(path: &Path) -> Result<Resource> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read resource file '{}'", path.display()))?;
    let resource: Resource = serde_json::from_str(&raw)
        .with_context(|| format!("Failed to parse resource file '{}'", path.display()))?;
    if !resource.is_published {
        bail!("Resource '{}' is not published", resource.title);
    }
    Ok(resource)
}

fn build_request(
    args: &Args,
    resource: Option<&Resource>,
    settings: &RunSettings,
) -> Result<DownloadRequest> {
    let mut request = match (resource, &args.url) {
        (Some(resource), _) => {
            let mut request = resource.download_request();
            if let Some(name) = &args.name {
                request = DownloadRequest::new(request.source_url(), name);
            }
            request
        }
        (None, Some(url)) => DownloadRequest::new(url, args.name.as_deref().unwrap_or_default()),
        (None, None) => bail!("Pass a URL or --resource"),
    };
    if let Some(limit) = settings.size_limit_bytes {
        request = request.with_size_limit(limit);
    }
    if let Some(timeout) = settings.timeout {
        request = request.with_timeout(timeout);
    }
    Ok(request)
}

fn report_outcome(outcome: &DownloadOutcome, json: bool) -> Result<()> {
    if json {
        println!(
            "{}",
            serde_json::to_string(outcome).context("Failed to serialize outcome")?
        );
        return Ok(());
    }
    match outcome {
        DownloadOutcome::Completed { strategy } => {
            info!(strategy = strategy.as_str(), "Download finished");
        }
        DownloadOutcome::Failed { kind, message } => {
            error!(?kind, "Download failed: {message}");
        }
    }
    Ok(())
}
