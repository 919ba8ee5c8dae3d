mod args;
mod metrics;
mod output;
mod progress;
mod story;

use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::Utc;
use clap::Parser;
use tokio::signal;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, Layer};

use voxbatch_core::{
    concatenate_wav, load_audio_prompt, load_config, load_config_from_env, observer_channel,
    validate_config, wav_duration_secs, BatchOrchestrator, ItemStatus, OrchestrateOptions,
    RemoteJobClient, RunpodClient, SanitizedConfig, TrackedItem, WorkItem,
};

use args::Args;
use output::{size_kb, OutputWriter};
use progress::report_progress;
use story::{discover_stories, load_story, ChunkContext};

/// Exit status after an interrupt.
const EXIT_INTERRUPTED: i32 = 130;

#[tokio::main]
async fn main() {
    let args = Args::parse();
    init_tracing(args.json);

    match run(args).await {
        Ok(code) => std::process::exit(code),
        Err(e) => {
            error!("Fatal error: {:#}", e);
            std::process::exit(1);
        }
    }
}

fn init_tracing(json: bool) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "info".into());
    let fmt = if json {
        tracing_subscriber::fmt::layer().json().boxed()
    } else {
        tracing_subscriber::fmt::layer().boxed()
    };

    tracing_subscriber::registry().with(filter).with(fmt).init();
}

async fn run(args: Args) -> Result<i32> {
    let run_id = uuid::Uuid::new_v4();
    let started = Utc::now();
    info!("Starting run {}", run_id);

    // Load configuration
    let config = match &args.config {
        Some(path) => {
            info!("Loading configuration from {:?}", path);
            load_config(path).with_context(|| format!("Failed to load config from {:?}", path))?
        }
        None => load_config_from_env().context("Failed to load config from environment")?,
    };
    validate_config(&config).context("Configuration validation failed")?;
    info!(
        "Configuration: {}",
        serde_json::to_string(&SanitizedConfig::from(&config)).unwrap_or_default()
    );

    let writer = OutputWriter::new(&args.out_dir);
    tokio::fs::create_dir_all(&args.out_dir)
        .await
        .with_context(|| format!("Failed to create output directory {:?}", args.out_dir))?;

    let audio_prompt = match &args.audio_prompt {
        Some(path) => Some(Arc::new(
            load_audio_prompt(path, args.transcript.clone())
                .await
                .context("Failed to load audio prompt")?,
        )),
        None => None,
    };

    // Build work items
    let files = discover_stories(&args.stories_dir)?;
    info!("Found {} stories", files.len());

    let mut items = Vec::new();
    let mut chunk_counts: BTreeMap<String, usize> = BTreeMap::new();
    for file in &files {
        let story = load_story(file, args.chunk_chars)?;
        if !args.chunked && writer.merged_path(&story.name).exists() {
            info!("Skipping {} (merged audio exists)", story.name);
            continue;
        }
        if story.chunks.is_empty() {
            warn!("No content found in {:?}", file);
            continue;
        }

        info!("Prepared {} ({} chunks)", story.name, story.chunks.len());
        chunk_counts.insert(story.name.clone(), story.chunks.len());
        for (chunk, text) in story.chunks.into_iter().enumerate() {
            let label = format!("{}/chunk_{:02}", story.name, chunk);
            let context = ChunkContext {
                story: story.name.clone(),
                chunk,
            };
            let mut item = WorkItem::new(text, label, context);
            if let Some(ref prompt) = audio_prompt {
                item = item.with_audio_prompt(Arc::clone(prompt));
            }
            items.push(item);
        }
    }

    if items.is_empty() {
        info!("Nothing to generate");
        return Ok(0);
    }

    // Orchestrate
    let client: Arc<dyn RemoteJobClient> =
        Arc::new(RunpodClient::new(config.endpoint.clone()).context("Failed to create client")?);
    let orchestrator = Arc::new(BatchOrchestrator::new(config.orchestrator.clone(), client));
    let cancel = CancellationToken::new();
    tokio::spawn(watch_signals(cancel.clone(), Arc::clone(&orchestrator)));

    let (observer, events) = observer_channel(config.orchestrator.observer_buffer);
    let progress = tokio::spawn(report_progress(events, writer.clone()));

    let mut options = OrchestrateOptions::default()
        .with_defaults(config.generation.clone())
        .with_cancel(cancel.clone())
        .with_observer(observer);
    if let Some(batch_size) = args.batch_size {
        options = options.with_batch_size(batch_size);
    }

    let results = orchestrator
        .orchestrate(items, options)
        .await
        .context("Orchestration failed")?;
    let summary = progress.await.context("Progress task failed")?;
    report_metrics(args.metrics_out.as_deref()).await;

    log_summary(&results);
    info!(
        "{} jobs submitted, {} chunks saved, {} failed, took {:.1}s",
        summary.jobs_submitted,
        summary.chunks_written,
        summary.items_failed + summary.write_failures,
        (Utc::now() - started).num_milliseconds() as f64 / 1000.0
    );

    if cancel.is_cancelled() {
        warn!("Run {} interrupted", run_id);
        return Ok(EXIT_INTERRUPTED);
    }

    if !args.chunked {
        merge_stories(&writer, &chunk_counts, &results).await;
    }

    Ok(0)
}

/// Write the run's metrics to `path`, or log them at debug level.
async fn report_metrics(path: Option<&Path>) {
    let text = match metrics::encode_metrics() {
        Ok(text) => text,
        Err(e) => {
            warn!("Failed to collect metrics: {:#}", e);
            return;
        }
    };

    match path {
        Some(path) => match tokio::fs::write(path, &text).await {
            Ok(()) => info!("Metrics written to {}", path.display()),
            Err(e) => warn!("Failed to write metrics to {:?}: {}", path, e),
        },
        None => debug!("Run metrics:\n{}", text),
    }
}

/// Per-story outcome table.
fn log_summary(results: &[TrackedItem<ChunkContext>]) {
    let mut stories: BTreeMap<&str, (usize, usize)> = BTreeMap::new();
    for item in results {
        let entry = stories.entry(item.context.story.as_str()).or_default();
        if item.status == ItemStatus::Completed {
            entry.0 += 1;
        } else {
            entry.1 += 1;
            warn!(
                "{}: {} ({})",
                item.label,
                item.status,
                item.error.as_deref().unwrap_or("-")
            );
        }
    }

    info!("{:<32} {:>9} {:>6}", "story", "completed", "failed");
    for (story, (completed, failed)) in stories {
        info!("{:<32} {:>9} {:>6}", story, completed, failed);
    }
}

/// Merge the chunks of every fully generated story into one WAV.
async fn merge_stories(
    writer: &OutputWriter,
    chunk_counts: &BTreeMap<String, usize>,
    results: &[TrackedItem<ChunkContext>],
) {
    let mut chunks: BTreeMap<&str, Vec<Option<Vec<u8>>>> = chunk_counts
        .iter()
        .map(|(story, count)| (story.as_str(), vec![None; *count]))
        .collect();

    for item in results {
        if item.status != ItemStatus::Completed {
            continue;
        }
        if let Some(slots) = chunks.get_mut(item.context.story.as_str()) {
            if let Some(slot) = slots.get_mut(item.context.chunk) {
                *slot = item.audio.clone();
            }
        }
    }

    for (story, slots) in chunks {
        let buffers: Option<Vec<Vec<u8>>> = slots.into_iter().collect();
        let Some(buffers) = buffers else {
            warn!("Not merging {}: some chunks are missing", story);
            continue;
        };

        let merged = match concatenate_wav(&buffers) {
            Ok(merged) => merged,
            Err(e) => {
                error!("Failed to merge {}: {}", story, e);
                continue;
            }
        };
        match writer.write_merged(story, &merged).await {
            Ok(path) => info!(
                "Merged {} ({:.1} KB, {:.1}s of audio)",
                path.display(),
                size_kb(&merged),
                wav_duration_secs(&merged)
            ),
            Err(e) => error!("Failed to write merged {}: {:#}", story, e),
        }
    }
}

/// First signal cancels gracefully; the second cancels every active job
/// and exits.
async fn watch_signals(cancel: CancellationToken, orchestrator: Arc<BatchOrchestrator>) {
    shutdown_signal().await;
    warn!("Interrupt received, cancelling remaining work (press Ctrl+C again to force exit)");
    cancel.cancel();

    shutdown_signal().await;
    warn!("Second interrupt, cancelling active jobs");
    let cancelled = orchestrator.cancel_all().await;
    warn!("Requested cancellation of {} jobs, exiting", cancelled);
    std::process::exit(EXIT_INTERRUPTED);
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
