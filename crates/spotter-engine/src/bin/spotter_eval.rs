//! spotter-eval: score pipeline configurations against a recorded session.

use std::path::{Path, PathBuf};

use anyhow::{anyhow, Context, Result};
use clap::Parser;
use serde::Deserialize;
use tracing::{info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use spotter_engine::{CancelToken, DetectionEngine, EngineError, ProgressSender};
use spotter_models::{EvaluationSession, GroundTruthItem, PipelinePreset, PipelineRunResult};
use spotter_vision::FrameSequence;

#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Args {
    /// Directory of recorded frames (with optional frames.json manifest).
    #[arg(long)]
    frames: PathBuf,
    /// Ground-truth JSON: a list of names or {"name", "category"} objects.
    #[arg(long)]
    ground_truth: PathBuf,
    /// Pipeline presets to run, in order.
    #[arg(long = "pipeline", num_args = 1.., required = true)]
    pipelines: Vec<PipelinePreset>,
    /// Frame rate used to derive timestamps when there is no manifest.
    #[arg(long, default_value_t = 30.0)]
    fps: f64,
    /// Write the evaluation session as JSON here.
    #[arg(long)]
    output: Option<PathBuf>,
    /// Local detector model path.
    #[arg(long, env = "YOLO_MODEL_PATH")]
    model: Option<String>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum GroundTruthEntry {
    Name(String),
    Item(GroundTruthItem),
}

fn load_ground_truth(path: &Path) -> Result<Vec<GroundTruthItem>> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read ground truth {}", path.display()))?;
    let entries: Vec<GroundTruthEntry> = serde_json::from_str(&raw)
        .with_context(|| format!("invalid ground truth {}", path.display()))?;

    Ok(entries
        .into_iter()
        .map(|entry| match entry {
            GroundTruthEntry::Name(name) => GroundTruthItem::new(name),
            GroundTruthEntry::Item(item) => item,
        })
        .collect())
}

fn init_tracing() {
    let use_json = std::env::var("LOG_FORMAT")
        .map(|v| v.to_lowercase() == "json")
        .unwrap_or(false);

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("spotter=info,ort=warn"));

    if use_json {
        tracing_subscriber::registry()
            .with(fmt::layer().json())
            .with(env_filter)
            .init();
    } else {
        tracing_subscriber::registry()
            .with(fmt::layer().with_ansi(true).with_target(true))
            .with(env_filter)
            .init();
    }
}

fn build_engine(args: &Args) -> DetectionEngine {
    let engine = DetectionEngine::from_env();

    #[cfg(feature = "onnx")]
    if let Some(model) = &args.model {
        if !engine.has_local() {
            let yolo = spotter_vision::YoloConfig::from_env().with_model_path(model.clone());
            return engine.with_yolo(yolo);
        }
    }
    #[cfg(not(feature = "onnx"))]
    if args.model.is_some() {
        warn!("--model ignored: built without the onnx feature");
    }

    engine
}

fn print_summary(run: &PipelineRunResult) {
    println!("== {} ==", run.config.label());
    println!(
        "  frames: {} sampled / {} total, {} processed",
        run.stats.frames_sampled, run.stats.frames_total, run.stats.frames_processed
    );
    println!(
        "  calls: {} local, {} remote, {} ms",
        run.stats.local_calls, run.stats.remote_calls, run.duration_ms
    );
    let skipped = &run.stats.skipped;
    println!(
        "  skipped: {} (timeout {}, http {}, parse {}, transport {}, local {})",
        skipped.total(),
        skipped.timeout,
        skipped.http_error,
        skipped.parse_failure,
        skipped.transport,
        skipped.local_failure
    );
    if let Some(score) = &run.score {
        println!(
            "  recall {:.2}  precision {:.2}  name quality {:.2}/5  ({} of {} matched, {} detected)",
            score.recall,
            score.precision,
            score.avg_name_quality,
            score.matched_count,
            score.ground_truth_count,
            score.detected_count
        );
    }
    if run.stats.cancelled {
        println!("  (cancelled, partial result)");
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    rustls::crypto::ring::default_provider()
        .install_default()
        .map_err(|_| anyhow!("failed to install rustls crypto provider"))?;

    dotenvy::dotenv().ok();
    init_tracing();

    let args = Args::parse();
    let ground_truth = load_ground_truth(&args.ground_truth)?;
    let frames = FrameSequence::load_dir(&args.frames, args.fps)
        .with_context(|| format!("failed to load frames from {}", args.frames.display()))?;

    let engine = build_engine(&args);
    info!(
        frames = frames.len(),
        ground_truth = ground_truth.len(),
        pipelines = args.pipelines.len(),
        local = engine.has_local(),
        remote = engine.has_remote(),
        "Starting evaluation"
    );

    let cancel = CancelToken::new();
    let ctrl_c = cancel.clone();
    tokio::spawn(async move {
        tokio::signal::ctrl_c().await.ok();
        warn!("Received interrupt, cancelling run");
        ctrl_c.cancel();
    });

    let (progress, mut progress_rx) = ProgressSender::channel(64);
    tokio::spawn(async move {
        while let Some(update) = progress_rx.recv().await {
            tracing::debug!(fraction = update.fraction, "{}", update.status);
        }
    });

    let label = args
        .frames
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| "session".to_string());
    let mut session = EvaluationSession::new(label, ground_truth.clone());

    for preset in &args.pipelines {
        let result = engine
            .run_evaluation_with_progress(
                &frames,
                &ground_truth,
                preset.config(),
                &cancel,
                Some(&progress),
            )
            .await;

        match result {
            Ok(run) => {
                print_summary(&run);
                session.add_run(run);
            }
            Err(EngineError::RunCancelled { partial }) => {
                print_summary(&partial);
                session.add_run(*partial);
                break;
            }
            Err(EngineError::Config(msg)) => {
                warn!(pipeline = %preset, "Skipping pipeline: {}", msg);
            }
            Err(e) => return Err(e.into()),
        }
    }

    if let Some(output) = &args.output {
        let json = serde_json::to_string_pretty(&session)?;
        std::fs::write(output, json)
            .with_context(|| format!("failed to write {}", output.display()))?;
        info!(path = %output.display(), runs = session.runs.len(), "Evaluation session written");
    }

    Ok(())
}
