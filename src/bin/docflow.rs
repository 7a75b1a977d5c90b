//! docflow CLI
//!
//! Inspect and exercise the operation pipelines without a web front end.
//!
//! Usage:
//!   docflow ops                                  # list registered operations
//!   docflow check                                # validate configuration
//!   docflow run /document/load --input req.json  # execute one operation
//!
//! The `--input` file holds the request as `{ "body": ..., "token": ...,
//! "files": [...] }`; file contents are base64 encoded. With `--memory` the
//! operation runs against in-process stores instead of the configured
//! services.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tokio::sync::watch;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use docflow::auth::StaticTokenValidator;
use docflow::notify::ChannelNotifier;
use docflow::{
    AppConfig, HttpGateway, InMemoryGateway, OperationInput, PipelineExecutor, PipelineRegistry, ServiceGateway,
    Services,
};

#[derive(Parser, Debug)]
#[command(name = "docflow")]
#[command(about = "Document operation pipelines")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// List registered operations and their steps
    Ops,

    /// Validate the service catalog, workflows and operation table
    Check,

    /// Execute one operation and print the response envelope
    Run {
        /// Operation name, e.g. /document/load
        operation: String,

        /// Request file (JSON)
        #[arg(long, short = 'i')]
        input: PathBuf,

        /// Use in-process stores instead of the configured services
        #[arg(long)]
        memory: bool,

        /// Token table (YAML) for authenticated operations
        #[arg(long, env = "DOCFLOW_TOKENS")]
        tokens: Option<PathBuf>,

        /// Bearer token, overriding the one in the request file
        #[arg(long)]
        token: Option<String>,

        /// Print status notifications published during the run
        #[arg(long)]
        notify: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "docflow=info".into()))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();
    let config = AppConfig::from_env().context("Invalid environment configuration")?;

    match cli.command {
        Command::Ops => list_operations(),
        Command::Check => check(&config),
        Command::Run {
            operation,
            input,
            memory,
            tokens,
            token,
            notify,
        } => run(&config, &operation, &input, memory, tokens, token, notify).await,
    }
}

fn list_operations() -> Result<()> {
    let registry = PipelineRegistry::standard()?;
    for op in registry.operations() {
        let steps: Vec<&str> = op.steps.iter().map(|s| s.as_str()).collect();
        println!(
            "{:<30} {:<5} {:<13} {}",
            op.name,
            op.method.as_str(),
            format!("{:?}", op.decoding),
            steps.join(" -> ")
        );
    }
    Ok(())
}

fn check(config: &AppConfig) -> Result<()> {
    let catalog = config.service_catalog().context("Loading service catalog")?;
    catalog.validate().context("Validating service catalog")?;
    for (name, service) in &catalog.services {
        println!("service  {:<12} {} ({} operations)", name, service.base_url, service.operations.len());
    }

    let engine = config.workflow_engine().context("Loading workflows")?;
    println!("workflow doc types: {}", engine.catalog().doc_types().join(", "));

    let registry = PipelineRegistry::standard()?;
    registry.validate().context("Validating operation table")?;
    println!("operations: {}", registry.len());

    // templates are compiled when the renderer is built
    docflow::render::HandlebarsRenderer::new().context("Compiling templates")?;
    println!("OK");
    Ok(())
}

async fn run(
    config: &AppConfig,
    operation: &str,
    input_path: &Path,
    memory: bool,
    tokens: Option<PathBuf>,
    token: Option<String>,
    notify: bool,
) -> Result<()> {
    let raw = std::fs::read_to_string(input_path)
        .with_context(|| format!("Reading request file {}", input_path.display()))?;
    let mut input: OperationInput =
        serde_json::from_str(&raw).with_context(|| format!("Parsing request file {}", input_path.display()))?;
    if let Some(token) = token {
        input.token = Some(token);
    }

    let gateway: Arc<dyn ServiceGateway> = if memory {
        Arc::new(InMemoryGateway::new())
    } else {
        Arc::new(HttpGateway::new(config.service_catalog()?).context("Building HTTP gateway")?)
    };

    let mut builder = Services::builder(gateway, config.workflow_engine()?).with_config(config);
    if let Some(path) = tokens {
        let validator = StaticTokenValidator::load_from_file(&path)
            .with_context(|| format!("Loading tokens from {}", path.display()))?;
        builder = builder.auth(Arc::new(validator));
    }
    let notifier = notify.then(|| ChannelNotifier::new(16, config.status_routing_key.clone()));
    let mut published = notifier.as_ref().map(ChannelNotifier::subscribe);
    if let Some(notifier) = &notifier {
        builder = builder.notifier(Arc::new(notifier.clone()));
    }

    let executor = PipelineExecutor::new(Arc::new(PipelineRegistry::standard()?), Arc::new(builder.build()?))?;

    let (cancel_tx, cancel_rx) = watch::channel(false);
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("Interrupted, cancelling");
            let _ = cancel_tx.send(true);
        }
    });

    let response = executor
        .execute_cancellable(operation, input, cancel_rx)
        .await
        .with_context(|| format!("Executing {}", operation))?;
    println!("{}", serde_json::to_string_pretty(&response)?);

    if let Some(rx) = published.as_mut() {
        while let Ok(message) = rx.try_recv() {
            eprintln!("published {}", serde_json::to_string(&message)?);
        }
    }
    Ok(())
}
