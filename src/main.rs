use stageboard::cli::{
    commands::{ApplyCommand, StatusCommand, ValidateCommand},
    output::*,
    Cli, Command,
};
use stageboard::core::config::{PersistenceKind, SourceKind, StoreConfig};
use stageboard::ingest::{FileStageSource, Ingestor, StageSource};
use stageboard::persistence::{persist_snapshot, InMemoryPersistence, PersistenceBackend};
use stageboard::store::{Command as StoreCommand, MergeStrategy, StoreHandle};

use anyhow::{Context, Result};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::broadcast::error::TryRecvError;
use tracing::{debug, error, warn};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::from_args();

    // Initialize logging
    let default_level = if cli.verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .finish();
    tracing::subscriber::set_global_default(subscriber)
        .context("Failed to set logging subscriber")?;

    // Execute command
    let result = match &cli.command {
        Command::Status(cmd) => show_status(cmd, &cli).await,
        Command::Apply(cmd) => apply_commands(cmd, &cli).await,
        Command::Validate(cmd) => validate_config(cmd),
    };

    if let Err(e) = result {
        println!("{} {}", CROSS, style(format!("{:#}", e)).red());
        error!("{:#}", e);
        std::process::exit(1);
    }

    Ok(())
}

fn load_config(cli: &Cli) -> Result<StoreConfig> {
    match &cli.config {
        Some(path) => StoreConfig::from_file(path)
            .with_context(|| format!("Failed to load config {}", path.display())),
        None => Ok(StoreConfig::default()),
    }
}

async fn build_source(config: &StoreConfig, path_override: Option<&PathBuf>) -> Result<Arc<dyn StageSource>> {
    let path = path_override.unwrap_or(&config.source.path);
    match config.source.kind {
        SourceKind::File => Ok(Arc::new(FileStageSource::new(path))),
        #[cfg(feature = "sqlite")]
        SourceKind::Sqlite => Ok(Arc::new(
            stageboard::persistence::SqliteStageStore::new(path).await?,
        )),
        #[cfg(not(feature = "sqlite"))]
        SourceKind::Sqlite => anyhow::bail!("SQLite source requires the `sqlite` feature"),
    }
}

async fn build_persistence(config: &StoreConfig) -> Result<Arc<dyn PersistenceBackend>> {
    match config.persistence.kind {
        PersistenceKind::None => Ok(Arc::new(InMemoryPersistence::new())),
        #[cfg(feature = "sqlite")]
        PersistenceKind::Sqlite => {
            use stageboard::persistence::SqliteStageStore;
            let store = match &config.persistence.path {
                Some(path) => SqliteStageStore::new(path).await?,
                None => SqliteStageStore::with_default_path().await?,
            };
            Ok(Arc::new(store))
        }
        #[cfg(not(feature = "sqlite"))]
        PersistenceKind::Sqlite => anyhow::bail!("SQLite persistence requires the `sqlite` feature"),
    }
}

/// Spawn the store and run one ingestion into it.
///
/// Ctrl-C cancels an in-flight fetch.
async fn ingest(
    config: &StoreConfig,
    source: Arc<dyn StageSource>,
    strategy: MergeStrategy,
    quiet: bool,
) -> Result<StoreHandle> {
    let handle = StoreHandle::spawn(config.channel_capacity);
    handle.add_event_handler(|event| {
        debug!(
            "{} {:?} -> {:?} ({})",
            event.command, event.pipeline_id, event.outcome, event.load_state
        );
    });

    let ingestor = Ingestor::new(source, config.ingest.timeout());
    let token = ingestor.cancellation_token();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            token.cancel();
        }
    });

    let spinner = (!quiet).then(|| create_spinner("Loading pipelines"));
    let result = ingestor.run(&handle, strategy).await;
    if let Some(spinner) = spinner {
        spinner.finish_and_clear();
    }

    if let Err(e) = result {
        let state = handle.load_state();
        return Err(anyhow::Error::new(e).context(format!("Loading pipelines failed, store is {}", state)));
    }

    Ok(handle)
}

fn print_store(handle: &StoreHandle, json: bool, with_steps: bool) -> Result<()> {
    let snapshot = handle.snapshot();

    if json {
        println!("{}", serde_json::to_string_pretty(&*snapshot)?);
        return Ok(());
    }

    println!(
        "{} Store is {} with {} pipelines",
        INFO,
        format_load_state(snapshot.load_state()),
        style(snapshot.all_pipelines().len()).cyan()
    );
    for pipeline in snapshot.all_pipelines() {
        println!("  {}", format_pipeline(pipeline));
        if with_steps {
            for line in format_steps(pipeline) {
                println!("{}", line);
            }
        }
    }

    Ok(())
}

async fn show_status(cmd: &StatusCommand, cli: &Cli) -> Result<()> {
    let config = load_config(cli)?;
    let source = build_source(&config, cmd.source.as_ref()).await?;
    let strategy = cmd.merge.map(MergeStrategy::from).unwrap_or(config.ingest.merge);

    let handle = ingest(&config, source, strategy, cli.json).await?;
    print_store(&handle, cli.json, cmd.steps)
}

async fn apply_commands(cmd: &ApplyCommand, cli: &Cli) -> Result<()> {
    let config = load_config(cli)?;

    let content = tokio::fs::read_to_string(&cmd.events)
        .await
        .with_context(|| format!("Failed to read events file {}", cmd.events.display()))?;
    let commands = StoreCommand::parse_lines(&content).context("Failed to parse events file")?;

    let source = build_source(&config, cmd.source.as_ref()).await?;
    let handle = ingest(&config, source, config.ingest.merge, cli.json).await?;

    let mut events = handle.subscribe();
    for command in commands {
        handle.dispatch(command).await?;
    }

    if cmd.trace_events && !cli.json {
        loop {
            match events.try_recv() {
                Ok(event) => println!("{}", format_store_event(&event)),
                Err(TryRecvError::Lagged(skipped)) => {
                    println!("{} {} events not shown", WARN, skipped);
                }
                Err(_) => break,
            }
        }
    }

    print_store(&handle, cli.json, false)?;

    if cmd.persist {
        let backend = build_persistence(&config).await?;
        persist_snapshot(&handle.snapshot(), backend.as_ref(), None)
            .await
            .context("Error saving pipelines")?;
        if config.persistence.kind == PersistenceKind::None {
            warn!("persistence.kind is none, pipelines were kept in memory only");
        }
        if !cli.json {
            println!("{} Pipelines saved", CHECK);
        }
    }

    Ok(())
}

fn validate_config(cmd: &ValidateCommand) -> Result<()> {
    println!("{} Validating configuration...", INFO);

    let config = StoreConfig::from_file(&cmd.file).context("Validation failed")?;
    println!("{} Configuration is valid!", CHECK);
    println!("  Source: {:?} {}", config.source.kind, style(config.source.path.display()).bold());
    println!("  Ingest timeout: {}s", style(config.ingest.timeout_secs).cyan());
    println!("  Merge: {:?}", config.ingest.merge);
    println!("  Persistence: {:?}", config.persistence.kind);
    Ok(())
}
