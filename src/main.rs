use std::{
    fs,
    path::{Path, PathBuf},
    sync::Arc,
};

use anyhow::{Context, Result, bail};
use clap::{Args, Parser, Subcommand};
use medindex::{
    config::{self, Config, DEFAULT_HASHING_DIMENSION},
    embedding::{self, EmbeddingClient, HashingEmbeddingClient},
    logging,
    processing::{
        Cancellation, IndexingPipeline, InputSource, PipelineSettings, RunReport, SourceReport,
        audit_sources,
    },
    qdrant::QdrantService,
    store::{MemoryStore, VectorStore},
};
use walkdir::WalkDir;

const INPUT_EXTENSIONS: &[&str] = &["jsonl", "ndjson"];

#[derive(Parser)]
#[command(
    name = "medindex",
    version,
    about = "Index biomedical literature records into a vector store"
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Normalize, gate, dedup, embed, and upsert every record.
    Index(IndexArgs),
    /// Normalize, gate, and dedup only; nothing is embedded or written.
    Check {
        /// NDJSON files or directories containing `*.jsonl` / `*.ndjson` files.
        #[arg(required = true)]
        paths: Vec<PathBuf>,
    },
}

#[derive(Args)]
struct IndexArgs {
    /// NDJSON files or directories containing `*.jsonl` / `*.ndjson` files.
    #[arg(required = true)]
    paths: Vec<PathBuf>,
    /// Target collection (overrides `QDRANT_COLLECTION_NAME`).
    #[arg(long)]
    collection: Option<String>,
    /// Points per upsert batch (overrides `INDEX_BATCH_SIZE`).
    #[arg(long)]
    batch_size: Option<usize>,
    /// Sources processed at once (overrides `SOURCE_CONCURRENCY`).
    #[arg(long)]
    concurrency: Option<usize>,
    /// Write the JSON run report to this file.
    #[arg(long)]
    report: Option<PathBuf>,
    /// Use the hashing embedder and an in-memory store; nothing leaves the process.
    #[arg(long)]
    dry_run: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = config::init_config().context("Failed to load configuration")?;
    logging::init_tracing(&config.log_file);
    tracing::debug!(
        qdrant_url = %config.qdrant_url,
        collection = %config.qdrant_collection_name,
        embedding_provider = ?config.embedding_provider,
        embedding_url = %config.embedding_url,
        batch_size = config.index_batch_size,
        log_file = %config.log_file.display(),
        "Loaded configuration"
    );

    match cli.command {
        Command::Index(args) => index(config, args).await,
        Command::Check { paths } => check(&paths).await,
    }
}

async fn index(config: &Config, args: IndexArgs) -> Result<()> {
    let sources = collect_sources(&args.paths)?;
    let mut settings = PipelineSettings::from_config(config);
    if let Some(collection) = args.collection {
        settings.collection = collection;
    }
    if let Some(batch_size) = args.batch_size {
        settings.batch_size = batch_size.max(1);
    }
    if let Some(concurrency) = args.concurrency {
        settings.source_concurrency = concurrency.max(1);
    }

    let (embedder, store): (Arc<dyn EmbeddingClient>, Arc<dyn VectorStore>) = if args.dry_run {
        tracing::info!("Dry run: hashing embedder and in-memory store");
        let dimension = config
            .embedding_dimension
            .unwrap_or(DEFAULT_HASHING_DIMENSION);
        (
            Arc::new(HashingEmbeddingClient::new(dimension)),
            Arc::new(MemoryStore::new()),
        )
    } else {
        (
            embedding::get_embedding_client(config)
                .context("Failed to initialize embedding client")?,
            Arc::new(QdrantService::new(config).context("Failed to initialize Qdrant client")?),
        )
    };

    let pipeline = IndexingPipeline::new(embedder, store, settings);
    let cancellation = Cancellation::new();
    let run = pipeline.run(&sources, cancellation.signal());
    tokio::pin!(run);

    let outcome = tokio::select! {
        outcome = &mut run => outcome,
        () = shutdown_signal() => {
            tracing::warn!("Cancelling run; in-flight batches will be dropped");
            cancellation.cancel();
            run.await
        }
    };
    let report = outcome.context("Indexing run aborted during setup")?;

    print_run_summary(&report);
    if let Some(path) = args.report {
        write_report(&report, &path)?;
    }
    Ok(())
}

async fn check(paths: &[PathBuf]) -> Result<()> {
    let sources = collect_sources(paths)?;
    let reports = audit_sources(&sources).await;
    for report in &reports {
        print_source_line(report);
        for (reason, count) in &report.rejections {
            println!("    {reason}: {count}");
        }
    }
    let accepted: u64 = reports.iter().map(|report| report.accepted).sum();
    let rejected: u64 = reports.iter().map(|report| report.rejected).sum();
    let duplicates: u64 = reports.iter().map(|report| report.duplicates).sum();
    println!("total: accepted={accepted} rejected={rejected} duplicates={duplicates}");
    Ok(())
}

/// Expand files and directories into NDJSON sources, directories walked in sorted order.
fn collect_sources(paths: &[PathBuf]) -> Result<Vec<InputSource>> {
    let mut sources = Vec::new();
    for path in paths {
        if path.is_dir() {
            for entry in WalkDir::new(path).sort_by_file_name() {
                let entry = entry.with_context(|| format!("Failed to walk {}", path.display()))?;
                if entry.file_type().is_file() && has_input_extension(entry.path()) {
                    sources.push(InputSource::file(entry.path()));
                }
            }
        } else if path.exists() {
            sources.push(InputSource::file(path));
        } else {
            bail!("Input path does not exist: {}", path.display());
        }
    }
    if sources.is_empty() {
        bail!("No .jsonl or .ndjson inputs found");
    }
    Ok(sources)
}

fn has_input_extension(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| {
            INPUT_EXTENSIONS
                .iter()
                .any(|known| ext.eq_ignore_ascii_case(known))
        })
}

fn print_source_line(report: &SourceReport) {
    print!(
        "{}: lines={} accepted={} rejected={} duplicates={} malformed={}",
        report.source,
        report.lines_read,
        report.accepted,
        report.rejected,
        report.duplicates,
        report.malformed,
    );
    if let Some(error) = &report.error {
        print!(" error={error}");
    }
    println!();
}

fn print_run_summary(report: &RunReport) {
    for source in &report.sources {
        println!(
            "{}: processed={} duplicates={} rejected={} embedding_failures={} dropped={}",
            source.source,
            source.processed,
            source.duplicates,
            source.rejected,
            source.embedding_failures,
            source.points_dropped,
        );
    }
    let totals = &report.totals;
    println!(
        "run {}: processed={} duplicates={} rejected={} malformed={} batches_failed={}{}",
        report.run_id,
        totals.processed,
        totals.duplicates,
        totals.rejected,
        totals.malformed,
        totals.batches_failed,
        if report.cancelled { " (cancelled)" } else { "" },
    );
    if let Some(reconciliation) = &report.reconciliation {
        println!(
            "stored={} expected={} discrepancy={}",
            reconciliation.stored, reconciliation.expected, reconciliation.discrepancy
        );
    }
}

fn write_report(report: &RunReport, path: &Path) -> Result<()> {
    let json = report.to_json().context("Failed to serialize run report")?;
    if let Some(parent) = path.parent().filter(|parent| !parent.as_os_str().is_empty()) {
        fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create {}", parent.display()))?;
    }
    fs::write(path, json).with_context(|| format!("Failed to write {}", path.display()))?;
    tracing::info!(path = %path.display(), "Wrote run report");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %err, "Failed to install Ctrl-C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(err) => {
                tracing::error!(error = %err, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => tracing::info!("Received SIGINT"),
        () = terminate => tracing::info!("Received SIGTERM"),
    }
}
