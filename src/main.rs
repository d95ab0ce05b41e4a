use std::env;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use emolens::analyzer::{self, FrameAnalyzer, Outcome, OverlayMode, RunStats};
use emolens::display::{self, LabelView, SnapshotTarget, UiLoop};
use emolens::{config, overlay, permission, Classifier, Pipeline};
use emolens_vision::video::Camera;
use log::{error, info};

#[derive(Parser)]
#[command(name = "emolens")]
#[command(version, about = "Live emotion label from your webcam")]
struct Cli {
    /// Config file (defaults to the system config)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Watch the camera and print the current emotion
    Run {
        /// Stop after this many frames
        #[arg(short, long)]
        frames: Option<u64>,
    },
    /// Classify every face in a still image
    Detect {
        image: PathBuf,
        /// Write the image with face boxes and labels drawn on it
        #[arg(short, long)]
        annotate: Option<PathBuf>,
    },
    /// Classify raw probabilities
    Classify {
        #[arg(long)]
        smile: f32,
        #[arg(long)]
        left_eye: f32,
        #[arg(long)]
        right_eye: f32,
    },
    /// Open config file in editor
    Config,
}

fn main() -> Result<()> {
    env_logger::builder()
        .filter_level(log::LevelFilter::Info)
        .format_target(false)
        .format_timestamp(None)
        .parse_default_env()
        .init();

    let cli = Cli::parse();
    let cfg = config::load_config(cli.config.as_deref())?;

    match cli.command {
        Commands::Run { frames } => run(&cfg, frames),
        Commands::Detect { image, annotate } => detect(&cfg, &image, annotate),
        Commands::Classify {
            smile,
            left_eye,
            right_eye,
        } => {
            let classifier = cfg.classifier.build()?;
            println!("{}", classifier.classify(smile, left_eye, right_eye));
            Ok(())
        }
        Commands::Config => open_config(cli.config.as_deref()),
    }
}

fn snapshot_target(path: Option<PathBuf>, font: Option<&Path>) -> Result<Option<SnapshotTarget>> {
    let Some(path) = path else {
        return Ok(None);
    };
    let font = font.map(overlay::load_font).transpose()?;
    Ok(Some(SnapshotTarget { path, font }))
}

fn run(cfg: &config::Config, frames: Option<u64>) -> Result<()> {
    permission::ensure_camera_access(Path::new(&cfg.camera))?;

    let classifier: Classifier = cfg.classifier.build()?;
    let detector = Pipeline::new(&cfg.pipeline_options())
        .context("Face detector dependencies are not available")?;

    let overlay_mode = match (cfg.overlay.enabled, cfg.overlay.snapshot.is_some()) {
        (false, _) => OverlayMode::Off,
        (true, false) => OverlayMode::Faces,
        (true, true) => OverlayMode::FacesWithPreview,
    };
    let snapshot = if cfg.overlay.enabled {
        snapshot_target(cfg.overlay.snapshot.clone(), cfg.overlay.font.as_deref())?
    } else {
        None
    };

    let (ui, rx) = display::channel();
    let device = cfg.camera.clone();
    info!("Opening camera: {}", device);

    let worker = std::thread::Builder::new()
        .name("analyzer".into())
        .spawn(move || -> RunStats {
            let mut frame_analyzer =
                FrameAnalyzer::new(detector, classifier, ui).with_overlay(overlay_mode);
            match Camera::open(&device) {
                Ok(mut camera) => {
                    let stats = analyzer::run(&mut camera, &mut frame_analyzer, frames);
                    info!("Camera got back {} frame buffer(s)", camera.released());
                    stats
                }
                Err(e) => {
                    error!("Camera binding failed: {:#}", e);
                    RunStats::default()
                }
            }
        })
        .context("spawning analyzer thread")?;

    let mut ui_loop = UiLoop::new(rx, LabelView::stdout(), snapshot);
    ui_loop.run();

    let stats = worker
        .join()
        .map_err(|_| anyhow::anyhow!("analyzer thread panicked"))?;
    info!(
        "Processed {} frame(s), {} face(s); skipped {} without data, {} unconvertible, {} failed detection",
        stats.frames, stats.faces, stats.unavailable, stats.conversion_failed, stats.detection_failed
    );
    Ok(())
}

fn detect(cfg: &config::Config, path: &Path, annotate: Option<PathBuf>) -> Result<()> {
    let classifier = cfg.classifier.build()?;
    let detector = Pipeline::new(&cfg.pipeline_options())
        .context("Face detector dependencies are not available")?;
    let img = image::open(path)
        .with_context(|| format!("opening {}", path.display()))?
        .to_rgb8();

    let mode = if annotate.is_some() {
        OverlayMode::FacesWithPreview
    } else {
        OverlayMode::Off
    };
    let snapshot = snapshot_target(annotate, cfg.overlay.font.as_deref())?;

    let (ui, rx) = display::channel();
    let mut frame_analyzer = FrameAnalyzer::new(detector, classifier, ui).with_overlay(mode);
    let outcome = frame_analyzer.analyze_image(img);
    drop(frame_analyzer);

    let mut ui_loop = UiLoop::new(rx, LabelView::stdout(), snapshot);
    ui_loop.run();

    match outcome {
        Outcome::Classified(labels) if labels.is_empty() => {
            info!("No face found in {}", path.display());
            Ok(())
        }
        Outcome::Classified(labels) => {
            info!("{} face(s) classified", labels.len());
            Ok(())
        }
        other => anyhow::bail!("could not classify {}: {:?}", path.display(), other),
    }
}

fn open_config(path: Option<&Path>) -> Result<()> {
    let config_path = path.unwrap_or(&config::CONFIG_PATH).as_os_str();
    let editor = env::var("EDITOR").unwrap_or_else(|_| "vi".to_string());

    info!("Opening config file: {:?}", config_path);

    let status = std::process::Command::new(editor)
        .arg(config_path)
        .status()
        .context("Failed to open editor")?;

    if !status.success() {
        anyhow::bail!("Editor exited with non-zero status");
    }

    Ok(())
}
