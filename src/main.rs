use std::path::PathBuf;

use anyhow::{Context, Result, bail};
use camera_classifier::capture::{
    FrameSource, ImageFileSource, RawFileSource, SyntheticPattern, SyntheticSource,
};
use camera_classifier::classifier::{Classifier, DominantColorClassifier, HttpClassifier};
use camera_classifier::config::{CropMode, PipelineConfig, parse_target};
use camera_classifier::error::{HasRecoverySuggestion, PipelineError};
use camera_classifier::pipeline::{FramePipeline, StdoutSink};
use camera_classifier::pixel_resample::{Interpolation, PixelFormat};
use clap::{Parser, ValueEnum};
use tracing::info;
use tracing_subscriber::EnvFilter;

/// Where frames come from.
#[derive(Debug, Clone, Copy, ValueEnum)]
enum SourceKind {
    /// Generated test pattern
    Synthetic,
    /// File of concatenated raw frames
    Raw,
    /// A still image, repeated
    Image,
}

/// Which model classifies the frames.
#[derive(Debug, Clone, Copy, ValueEnum)]
enum ClassifierKind {
    /// Names the average colour of the frame
    Color,
    /// Model server reached over HTTP
    Http,
}

/// Classify camera frames: crop and scale each frame to the model's input
/// size, classify it, and print the label.
#[derive(Parser, Debug)]
#[command(name = "classify")]
#[command(about = "Classify camera frames with a fixed-input image classifier")]
struct Args {
    /// Frame source
    #[arg(short, long, value_enum, default_value = "synthetic")]
    source: SourceKind,

    /// Input file for the raw and image sources
    #[arg(short, long, required_if_eq_any([("source", "raw"), ("source", "image")]))]
    input: Option<PathBuf>,

    /// Frame width (synthetic and raw sources)
    #[arg(long, default_value_t = 640)]
    width: u32,

    /// Frame height (synthetic and raw sources)
    #[arg(long, default_value_t = 480)]
    height: u32,

    /// Bytes per row of raw frames; defaults to tightly packed
    #[arg(long)]
    stride: Option<usize>,

    /// Pixel format of the frames
    #[arg(long, value_enum, default_value = "bgra")]
    format: PixelFormat,

    /// Test pattern for the synthetic source
    #[arg(long, value_enum, default_value = "color-cycle")]
    pattern: SyntheticPattern,

    /// Stop after this many frames
    #[arg(short = 'n', long)]
    frames: Option<u64>,

    /// Region fed to the model: full, center, or x,y,w,h
    #[arg(long)]
    crop: Option<String>,

    /// Model input size: WIDTHxHEIGHT or a preset (inception-v3, mobilenet, resnet, yolo)
    #[arg(short, long)]
    target: Option<String>,

    /// Resampling kernel
    #[arg(long, value_enum)]
    filter: Option<Interpolation>,

    /// Frames that may wait for the classifier before new ones are dropped
    #[arg(long)]
    queue_depth: Option<usize>,

    /// Process every frame in order instead of dropping frames while busy
    #[arg(long)]
    every_frame: bool,

    /// Classifier to use
    #[arg(short, long, value_enum, default_value = "color")]
    classifier: ClassifierKind,

    /// Classifier endpoint for --classifier http
    #[arg(long, required_if_eq("classifier", "http"))]
    endpoint: Option<String>,

    /// Model name sent to the endpoint
    #[arg(long)]
    model: Option<String>,

    /// Frames the color classifier reports as not ready
    #[arg(long, default_value_t = 0)]
    warmup: u32,

    /// JSON pipeline configuration; flags override its values
    #[arg(long)]
    config: Option<PathBuf>,

    /// More logging (-v debug, -vv trace); RUST_LOG takes precedence
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

fn init_logging(verbose: u8) {
    let default = match verbose {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default)))
        .with_writer(std::io::stderr)
        .init();
}

fn pipeline_config(args: &Args) -> Result<PipelineConfig> {
    let mut config = match &args.config {
        Some(path) => PipelineConfig::from_json_file(path)
            .with_context(|| format!("loading {}", path.display()))?,
        None => PipelineConfig::default(),
    };
    if let Some(target) = &args.target {
        config.target = parse_target(target)?;
    }
    if let Some(crop) = &args.crop {
        config.crop = CropMode::parse(crop)?;
    }
    if let Some(filter) = args.filter {
        config.interpolation = filter;
    }
    if let Some(depth) = args.queue_depth {
        config.queue_depth = depth;
    }
    if args.frames.is_some() {
        config.max_frames = args.frames;
    }
    config.validate()?;
    Ok(config)
}

fn open_source(args: &Args, config: &PipelineConfig) -> Result<Box<dyn FrameSource>> {
    let source: Box<dyn FrameSource> = match args.source {
        SourceKind::Synthetic => {
            let source = SyntheticSource::with_layout(
                args.width,
                args.height,
                args.format,
                args.pattern,
                0,
            )?;
            match config.max_frames {
                Some(frames) => Box::new(source.limit(frames)),
                None => Box::new(source),
            }
        }
        SourceKind::Raw => {
            let Some(path) = &args.input else {
                bail!("--input is required for the raw source");
            };
            Box::new(RawFileSource::open(
                path,
                args.width,
                args.height,
                args.stride,
                args.format,
            )?)
        }
        SourceKind::Image => {
            let Some(path) = &args.input else {
                bail!("--input is required for the image source");
            };
            let repeat = config.max_frames.unwrap_or(1);
            Box::new(ImageFileSource::open(path, args.format)?.repeat(repeat))
        }
    };
    Ok(source)
}

fn open_classifier(args: &Args, config: &PipelineConfig) -> Result<Box<dyn Classifier>> {
    let classifier: Box<dyn Classifier> = match args.classifier {
        ClassifierKind::Color => {
            Box::new(DominantColorClassifier::new(config.target).with_warmup(args.warmup))
        }
        ClassifierKind::Http => {
            let Some(endpoint) = &args.endpoint else {
                bail!("--endpoint is required for the http classifier");
            };
            let mut classifier = HttpClassifier::new(endpoint.clone(), config.target)?;
            if let Some(model) = &args.model {
                classifier = classifier.model(model.clone());
            }
            Box::new(classifier)
        }
    };
    Ok(classifier)
}

/// Operator hint for the first pipeline error in `err`'s chain.
fn recovery_hint(err: &anyhow::Error) -> Option<&'static str> {
    err.chain()
        .find_map(|cause| cause.downcast_ref::<PipelineError>())
        .and_then(|e| e.recovery_suggestion())
}

fn run(args: &Args) -> Result<()> {
    let config = pipeline_config(args)?;
    let mut source = open_source(args, &config)?;
    let classifier = open_classifier(args, &config)?;
    info!(
        source = source.name(),
        target = %config.target,
        crop = ?config.crop,
        interpolation = ?config.interpolation,
        "classifying"
    );

    let every_frame = args.every_frame || !matches!(args.source, SourceKind::Synthetic);
    let mut pipeline = FramePipeline::new(config, classifier, StdoutSink)?;
    let report = if every_frame {
        pipeline.run_inline(&mut source)?
    } else {
        pipeline.run(&mut source)?
    };
    eprintln!("{report}");
    Ok(())
}

fn main() -> Result<()> {
    let args = Args::parse();
    init_logging(args.verbose);
    run(&args).inspect_err(|err| {
        if let Some(hint) = recovery_hint(err) {
            eprintln!("hint: {hint}");
        }
    })
}
