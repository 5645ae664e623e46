#![allow(clippy::must_use_candidate, clippy::missing_errors_doc)]

mod args;

use std::sync::Arc;

use args::Args;
use clap::Parser;
use futures_util::StreamExt;
use switchboard_config::Config;
use switchboard_core::{CredentialContext, CredentialHealth, LoggingHealth};
use switchboard_health::HealthReporter;
use switchboard_llm::{ChatCompletionRequest, CompletionParams, Gateway, Message, Usage};
use tokio::io::AsyncWriteExt;
use tokio_util::sync::CancellationToken;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    // Load configuration
    let config = Config::load(&args.config)?;

    // Initialize telemetry
    let _telemetry_guard = switchboard_telemetry::init(config.telemetry.as_ref(), "warn")?;

    tracing::info!(
        config_path = %args.config.display(),
        model = %args.model,
        "starting switchboard"
    );

    // Credential-health sink
    let reporter = match &config.credential_health {
        Some(health) => HealthReporter::from_config(health)?,
        None => None,
    };
    let health: Arc<dyn CredentialHealth> = match &reporter {
        Some(reporter) => Arc::new(reporter.clone()),
        None => Arc::new(LoggingHealth),
    };

    let gateway = Gateway::from_config(&config, health)?;
    let credential = pick_credential(&gateway, &args)?;
    let request = build_request(&args);

    // Cancel the in-flight call on shutdown
    let cancel = CancellationToken::new();
    let cancel_clone = cancel.clone();

    tokio::spawn(async move {
        shutdown_signal().await;
        cancel_clone.cancel();
    });

    let result = if args.stream {
        run_stream(&gateway, &request, &credential, &cancel).await
    } else {
        run_once(&gateway, &request, &credential, &cancel).await
    };

    if let Some(reporter) = &reporter {
        reporter.flush().await;
    }

    result
}

/// Resolve the provider for the requested model and select a key for it
fn pick_credential(gateway: &Gateway, args: &Args) -> anyhow::Result<CredentialContext> {
    let resolved = gateway.resolve(&args.model)?;
    let provider = resolved.provider_name.as_str();

    let credential = match &args.key_id {
        Some(key_id) => gateway.credential(provider, key_id),
        None => gateway.credential_for(provider),
    };

    credential.ok_or_else(|| match &args.key_id {
        Some(key_id) => anyhow::anyhow!("provider '{provider}' has no key '{key_id}'"),
        None => anyhow::anyhow!("provider '{provider}' has no usable key"),
    })
}

fn build_request(args: &Args) -> ChatCompletionRequest {
    let mut messages = Vec::with_capacity(2);
    if let Some(system) = &args.system {
        messages.push(Message::system(system.clone()));
    }
    messages.push(Message::user(args.prompt.clone()));

    ChatCompletionRequest::new(args.model.clone(), messages).with_params(CompletionParams {
        temperature: args.temperature,
        max_tokens: args.max_tokens,
        ..CompletionParams::default()
    })
}

async fn run_once(
    gateway: &Gateway,
    request: &ChatCompletionRequest,
    credential: &CredentialContext,
    cancel: &CancellationToken,
) -> anyhow::Result<()> {
    let response = gateway.complete(request, credential, cancel).await?;

    let mut stdout = tokio::io::stdout();
    stdout.write_all(response.content().as_bytes()).await?;
    stdout.write_all(b"\n").await?;
    stdout.flush().await?;

    log_usage(&response.usage);
    Ok(())
}

async fn run_stream(
    gateway: &Gateway,
    request: &ChatCompletionRequest,
    credential: &CredentialContext,
    cancel: &CancellationToken,
) -> anyhow::Result<()> {
    let mut chunks = gateway.complete_stream(request, credential, cancel).await?;
    let mut stdout = tokio::io::stdout();

    while let Some(chunk) = chunks.next().await {
        let chunk = chunk?;

        stdout.write_all(chunk.content().as_bytes()).await?;
        stdout.flush().await?;

        if let Some(usage) = &chunk.usage {
            log_usage(usage);
        }
    }

    stdout.write_all(b"\n").await?;
    stdout.flush().await?;
    Ok(())
}

fn log_usage(usage: &Usage) {
    tracing::info!(
        prompt_tokens = usage.prompt_tokens,
        completion_tokens = usage.completion_tokens,
        total_tokens = usage.total_tokens,
        "token usage"
    );
}

/// Wait for a shutdown signal (`SIGINT` or `SIGTERM`)
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {}
        () = terminate => {}
    }

    tracing::info!("shutdown signal received, cancelling request");
}
