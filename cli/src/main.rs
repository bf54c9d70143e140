//! CLI entrypoint for extraction-coach
//!
//! This is the main binary that wires together all layers using
//! dependency injection.

use anyhow::{Context, Result};
use clap::Parser;
use coach_application::{
    EngineServices, LearningStatusUseCase, LedgerStore, NoProgress, ProgressNotifier,
    RunBatchUseCase,
};
use coach_domain::SectionRouter;
use coach_infrastructure::{
    ConfigLoader, FileConfig, InMemoryLedgerStore, JsonSectionizer, JsonlLedgerStore,
    JsonlRunLogger, OpenAiAdvisor, OpenAiInvoker,
};
use coach_presentation::{Cli, ConsoleFormatter, OutputFormat, ProgressReporter};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::prelude::*;

/// Install the console subscriber, plus a daily log file when requested.
///
/// `RUST_LOG` overrides the level chosen by `-v`.
fn init_logging(cli: &Cli) -> Option<WorkerGuard> {
    let level = match cli.verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace", // -vvv or more
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    let console = tracing_subscriber::fmt::layer()
        .with_target(false)
        .with_writer(std::io::stderr);

    let (file, guard) = match &cli.log_dir {
        Some(dir) => {
            let appender = tracing_appender::rolling::daily(dir, "extraction-coach.log");
            let (writer, guard) = tracing_appender::non_blocking(appender);
            let layer = tracing_subscriber::fmt::layer()
                .with_ansi(false)
                .with_writer(writer);
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(console)
        .with(file)
        .init();
    guard
}

async fn open_store(path: Option<&PathBuf>) -> Result<Arc<dyn LedgerStore>> {
    Ok(match path {
        Some(path) => Arc::new(
            JsonlLedgerStore::open(path)
                .await
                .with_context(|| format!("opening ledger {}", path.display()))?,
        ),
        None => {
            warn!("No ledger path configured; learning state will not persist");
            Arc::new(InMemoryLedgerStore::new())
        }
    })
}

fn ledger_path(cli: &Cli, config: &FileConfig) -> Option<PathBuf> {
    cli.ledger
        .clone()
        .or_else(|| config.engine.ledger_path.as_ref().map(PathBuf::from))
}

/// Print the learning status recorded in the ledger.
async fn print_status(cli: &Cli, config: &FileConfig) -> Result<ExitCode> {
    let path = ledger_path(cli, config).context("--status needs a ledger (--ledger or engine.ledger_path)")?;
    let store = JsonlLedgerStore::open(&path)
        .await
        .with_context(|| format!("opening ledger {}", path.display()))?;

    let status = LearningStatusUseCase::new(Arc::new(store), config.phase_classifier())
        .with_run_settings(&config.engine_config(), &config.selector())
        .with_recent_sessions(cli.recent)
        .execute()
        .await?;

    let output = match cli.output {
        OutputFormat::Json => ConsoleFormatter::format_status_json(&status),
        OutputFormat::Full | OutputFormat::Summary => ConsoleFormatter::format_status(&status),
    };
    println!("{}", output);
    Ok(ExitCode::SUCCESS)
}

/// Open the run-event log, or run without one when the path is unusable.
fn open_event_log(path: &Path) -> Option<JsonlRunLogger> {
    let logger = JsonlRunLogger::new(path);
    if logger.is_none() {
        warn!(
            "Cannot open run event log {}; continuing without it",
            path.display()
        );
    }
    logger
}

/// Assemble ports and domain services from the merged configuration.
async fn build_services(cli: &Cli, config: &FileConfig) -> Result<EngineServices> {
    let mut engine = config.engine_config();
    if let Some(limit) = cli.document_concurrency {
        engine = engine.with_document_concurrency(limit);
    }
    if let Some(limit) = cli.agent_concurrency {
        engine = engine.with_agent_concurrency(limit);
    }

    let store = open_store(ledger_path(cli, config).as_ref()).await?;

    let catalog = config.catalog();
    let invoker = OpenAiInvoker::from_config(&config.provider, engine.invoke_retry.timeout)?;
    info!("Extraction model: {} at {}", invoker.model(), config.provider.base_url);

    let mut services = EngineServices::new(Arc::new(invoker), store, &catalog)
        .with_evaluator(config.evaluator())
        .with_selector(config.selector())
        .with_classifier(config.phase_classifier())
        .with_router(SectionRouter::new(&catalog, &config.router_config()))
        .with_validator(config.validator())
        .with_curator(config.curator());

    if config.provider.advisor && !cli.no_advisor {
        let advisor = OpenAiAdvisor::from_config(&config.provider, engine.advisory_retry.timeout)?;
        info!("Advisory model: {}", advisor.model());
        services = services.with_advisor(Arc::new(advisor));
    } else {
        info!("Advisory service disabled; using deterministic fallback");
    }

    let event_log = cli
        .event_log
        .clone()
        .or_else(|| config.engine.event_log.as_ref().map(PathBuf::from));
    if let Some(logger) = event_log.as_deref().and_then(open_event_log) {
        info!("Run events: {}", logger.path().display());
        services = services.with_logger(Arc::new(logger));
    }

    Ok(services.with_config(engine))
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let cli = Cli::parse();
    let _log_guard = init_logging(&cli);

    if cli.show_config {
        ConfigLoader::print_config_sources(cli.config.as_ref());
        return Ok(ExitCode::SUCCESS);
    }

    // === Configuration ===
    let config = if cli.no_config {
        ConfigLoader::load_defaults()
    } else {
        ConfigLoader::load(cli.config.as_ref())?
    };
    for issue in config.check()? {
        warn!("{}", issue);
    }

    if cli.status {
        return print_status(&cli, &config).await;
    }

    let source = cli
        .source
        .as_ref()
        .context("a document file or directory is required")?;

    info!("Starting extraction-coach on {}", source.display());

    // === Dependency Injection ===
    let services = build_services(&cli, &config).await?;
    let use_case = RunBatchUseCase::new(services, Arc::new(JsonSectionizer::new()))
        .with_skip_processed(cli.skip_processed);

    let token = CancellationToken::new();
    {
        let token = token.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                warn!("Received Ctrl+C, cancelling run...");
                token.cancel();
            }
        });
    }

    let progress: Arc<dyn ProgressNotifier> = if cli.quiet || cli.output == OutputFormat::Json {
        Arc::new(NoProgress)
    } else {
        Arc::new(ProgressReporter::new())
    };

    let report = use_case
        .execute_with_progress(&source.to_string_lossy(), &token, progress)
        .await?;

    if let Some(path) = &cli.report {
        std::fs::write(path, ConsoleFormatter::format_json(&report))
            .with_context(|| format!("writing report to {}", path.display()))?;
        info!("Report written to {}", path.display());
    }

    let output = match cli.output {
        OutputFormat::Full => ConsoleFormatter::format(&report),
        OutputFormat::Summary => ConsoleFormatter::format_summary(&report),
        OutputFormat::Json => ConsoleFormatter::format_json(&report),
    };
    println!("{}", output);

    Ok(if report.has_failures() {
        ExitCode::FAILURE
    } else {
        ExitCode::SUCCESS
    })
}
