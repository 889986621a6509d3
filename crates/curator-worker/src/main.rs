//! Curator CLI: keep only the footage where something moves.
//!
//! Usage:
//!   curator curate <INPUT>...   Curate videos into the output directory
//!   curator analyze <INPUT>     Report motion intervals without writing a clip

use std::path::PathBuf;

use anyhow::Context;
use clap::{Args, Parser, Subcommand};
use tokio::sync::watch;
use tracing::{error, info, warn};

use curator_worker::{init_tracing, CurationError, CurationPipeline, CuratorConfig, DirectorySink};

#[derive(Parser)]
#[command(
    name = "curator",
    about = "Cut videos down to the intervals that contain motion",
    version,
    author
)]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

/// Tuning flags shared by every command; unset flags keep the configured value.
#[derive(Args, Debug, Default)]
struct Tuning {
    /// Constant frame rate to normalize to
    #[arg(long)]
    fps: Option<u32>,

    /// Analyze every Nth frame
    #[arg(long)]
    stride: Option<u32>,

    /// Minimum blob area in pixels that counts as motion
    #[arg(long)]
    min_area: Option<u32>,

    /// Quiet frames needed to close an interval
    #[arg(long)]
    no_motion_frames: Option<u32>,

    /// Merge intervals separated by at most this many seconds
    #[arg(long)]
    merge_gap: Option<f64>,

    /// Background model history in frames
    #[arg(long)]
    history: Option<u32>,

    /// Disable shadow detection
    #[arg(long)]
    no_shadows: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Curate videos into the output directory
    Curate {
        /// Input video files, processed in order
        #[arg(required = true)]
        inputs: Vec<PathBuf>,

        /// Output directory
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Key prefix for delivered clips
        #[arg(long)]
        prefix: Option<String>,

        #[command(flatten)]
        tuning: Tuning,
    },

    /// Report motion intervals without writing a clip
    Analyze {
        /// Input video file
        input: PathBuf,

        #[command(flatten)]
        tuning: Tuning,
    },
}

impl Tuning {
    fn apply(&self, config: &mut CuratorConfig) {
        if let Some(fps) = self.fps {
            config.target_fps = fps;
        }
        if let Some(stride) = self.stride {
            config.motion.frame_stride = stride;
        }
        if let Some(area) = self.min_area {
            config.motion.min_blob_area = area;
        }
        if let Some(frames) = self.no_motion_frames {
            config.motion.no_motion_frames_required = frames;
        }
        if let Some(gap) = self.merge_gap {
            config.merge_gap_secs = gap;
        }
        if let Some(history) = self.history {
            config.motion.background.history = history;
        }
        if self.no_shadows {
            config.motion.background.detect_shadows = false;
        }
    }
}

/// Flip the cancel signal on Ctrl-C.
fn cancel_on_ctrl_c() -> watch::Receiver<bool> {
    let (cancel_tx, cancel_rx) = watch::channel(false);
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Received interrupt, cancelling");
            let _ = cancel_tx.send(true);
        }
    });
    cancel_rx
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let mut config = CuratorConfig::from_env();

    match cli.command {
        Commands::Curate {
            inputs,
            output,
            prefix,
            tuning,
        } => {
            tuning.apply(&mut config);
            if let Some(output) = output {
                config.output_dir = output;
            }
            if let Some(prefix) = prefix {
                config.clip_prefix = prefix;
            }
            curate(config, inputs).await
        }
        Commands::Analyze { input, tuning } => {
            tuning.apply(&mut config);
            analyze(config, input).await
        }
    }
}

async fn curate(config: CuratorConfig, inputs: Vec<PathBuf>) -> anyhow::Result<()> {
    let sink = DirectorySink::new(config.output_dir.clone());
    let pipeline = CurationPipeline::new(config)?.with_cancel(cancel_on_ctrl_c());

    info!(
        inputs = inputs.len(),
        output_dir = %sink.root().display(),
        "Starting curation"
    );

    let mut failed = 0usize;
    for input in &inputs {
        match pipeline.process(input, &sink).await {
            Ok(report) => {
                println!("{}", serde_json::to_string(&report)?);
            }
            Err(CurationError::Cancelled) => {
                anyhow::bail!("curation cancelled");
            }
            Err(e) => {
                error!(input = %input.display(), error = %e, "Curation failed");
                println!(
                    "{}",
                    serde_json::json!({
                        "source": input,
                        "error": e.to_string(),
                        "kind": e.kind(),
                        "retryable": e.is_retryable(),
                    })
                );
                failed += 1;
            }
        }
    }

    if failed > 0 {
        anyhow::bail!("{} of {} inputs failed", failed, inputs.len());
    }
    Ok(())
}

async fn analyze(config: CuratorConfig, input: PathBuf) -> anyhow::Result<()> {
    let pipeline = CurationPipeline::new(config)?.with_cancel(cancel_on_ctrl_c());
    let report = pipeline
        .analyze(&input)
        .await
        .with_context(|| format!("analysis of {} failed", input.display()))?;

    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}
