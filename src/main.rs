use std::path::{Path, PathBuf};

use anyhow::Context;
use clap::{Args, Parser, Subcommand};
use nir_fusion_rs::image_pipeline::capture::{
    CaptureClient, CaptureConfig, CaptureServer, FileFrameSource, request_operation,
};
use nir_fusion_rs::image_pipeline::{NirFusionPipeline, OperationMode, PipelineConfig};
use nir_fusion_rs::logger;

use tracing::info;

#[derive(Parser)]
#[command(name = "nir_fusion")]
#[command(about = "Register, fuse and analyse RGB/NIR image pairs")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the pipeline on an RGB and a NIR image file.
    Process(ProcessArgs),

    /// Serve a frame file as the remote camera.
    Serve(ServeArgs),

    /// Fetch a synchronized pair from a remote camera, optionally processing it.
    Fetch(FetchArgs),
}

#[derive(Debug, Clone, Args)]
struct PipelineArgs {
    /// JSON pipeline configuration; missing fields use defaults.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Stages to run: skin-smoothing, shadow-detection or all.
    #[arg(long)]
    mode: Option<OperationMode>,

    /// Skip registration; the inputs are already aligned.
    #[arg(long)]
    assume_aligned: bool,
}

#[derive(Debug, Clone, Args)]
struct ProcessArgs {
    /// RGB image (TIFF).
    #[arg(long)]
    rgb: PathBuf,

    /// NIR image (TIFF).
    #[arg(long)]
    nir: PathBuf,

    /// Directory the outputs are written to.
    #[arg(long, default_value = "out")]
    out_dir: PathBuf,

    #[command(flatten)]
    pipeline: PipelineArgs,
}

#[derive(Debug, Clone, Args)]
struct ServeArgs {
    /// Frame file sent for every capture request.
    #[arg(long)]
    frame: PathBuf,

    /// Address to listen on.
    #[arg(long, default_value = "0.0.0.0:1313")]
    bind: String,

    /// Largest frame the server will send.
    #[arg(long)]
    max_frame_bytes: Option<u64>,
}

#[derive(Debug, Clone, Args)]
struct FetchArgs {
    /// Remote camera address.
    #[arg(long)]
    server: String,

    /// Local (NIR) frame file captured at the scheduled instant.
    #[arg(long)]
    local_frame: PathBuf,

    /// Directory the fetched frames and any outputs are written to.
    #[arg(long, default_value = "out")]
    out_dir: PathBuf,

    /// Delay between scheduling and capturing, in milliseconds.
    #[arg(long, default_value = "1000")]
    lead_time_ms: u64,

    /// Positioning tool run before capture; its output selects the mode.
    #[arg(long)]
    positioning: Option<PathBuf>,

    /// Run the pipeline on the fetched pair.
    #[arg(long)]
    process: bool,

    #[command(flatten)]
    pipeline: PipelineArgs,
}

fn pipeline_config(
    args: &PipelineArgs,
    requested: Option<OperationMode>,
) -> anyhow::Result<PipelineConfig> {
    let mut config = match &args.config {
        Some(path) => PipelineConfig::from_json_file(path)
            .with_context(|| format!("loading {}", path.display()))?,
        None => PipelineConfig::default(),
    };
    if let Some(mode) = args.mode.or(requested) {
        config.mode = mode;
    }
    config.assume_aligned |= args.assume_aligned;
    Ok(config)
}

fn run_pipeline(
    config: PipelineConfig,
    rgb: &Path,
    nir: &Path,
    out_dir: &Path,
) -> anyhow::Result<()> {
    let pipeline = NirFusionPipeline::new(config)?;
    info!(mode = %pipeline.config().mode, "Pipeline initialized");

    let (output, written) = pipeline
        .process_files(rgb, nir, out_dir)
        .context("pipeline failed")?;
    output.timings.log_summary();
    for path in written {
        info!("Wrote {}", path.display());
    }
    Ok(())
}

fn main() -> anyhow::Result<()> {
    logger::init();
    let cli = Cli::parse();

    match cli.command {
        Commands::Process(args) => {
            let config = pipeline_config(&args.pipeline, None)?;
            run_pipeline(config, &args.rgb, &args.nir, &args.out_dir)?;
        }
        Commands::Serve(args) => {
            let mut config = CaptureConfig::default();
            if let Some(max) = args.max_frame_bytes {
                config.max_frame_bytes = max;
            }
            let source = FileFrameSource::new(&args.frame);
            let server = CaptureServer::bind(&args.bind, source, config)?;
            server.run()?;
        }
        Commands::Fetch(args) => {
            let requested = args
                .positioning
                .as_ref()
                .map(|tool| request_operation(tool, [] as [&str; 0]))
                .transpose()?;

            let config = CaptureConfig {
                lead_time_ms: args.lead_time_ms,
                ..CaptureConfig::default()
            };
            let local = FileFrameSource::new(&args.local_frame);
            let client = CaptureClient::new(&args.server, local, config)?;
            let pair = client.fetch_pair()?;

            std::fs::create_dir_all(&args.out_dir)
                .with_context(|| format!("creating {}", args.out_dir.display()))?;
            let rgb_path = args.out_dir.join("rgb.tiff");
            let nir_path = args.out_dir.join("nir.tiff");
            std::fs::write(&rgb_path, &pair.remote)?;
            std::fs::write(&nir_path, &pair.local)?;
            info!("Saved {} and {}", rgb_path.display(), nir_path.display());

            if args.process {
                let config = pipeline_config(&args.pipeline, requested)?;
                run_pipeline(config, &rgb_path, &nir_path, &args.out_dir)?;
            }
        }
    }

    Ok(())
}
