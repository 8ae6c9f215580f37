use std::path::PathBuf;

use anyhow::Context as _;
use chrono::Datelike;
use clap::{Parser, Subcommand};

use gitlapse::{
    ChartRenderer, ContributionDataset, FontSource, Fps, ImmediateClock, JitterOpts, RenderOpts,
    SynthOpts, ThemeKey, TimelapseEncoder, TimelapseOpts, seed_for_username, synthesize,
    validate_username,
};

#[derive(Parser, Debug)]
#[command(name = "gitlapse", version)]
struct Cli {
    #[command(subcommand)]
    cmd: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Render a single chart frame as a PNG.
    Frame(FrameArgs),
    /// Export the reveal timelapse as a WebM (requires `ffmpeg` on PATH).
    Render(RenderArgs),
}

#[derive(Parser, Debug)]
struct CommonArgs {
    /// Profile username (display only, 1-39 chars).
    #[arg(long)]
    username: String,

    /// Year to visualize. Defaults to the current year.
    #[arg(long)]
    year: Option<i32>,

    /// Theme: dark, light, or dimmed.
    #[arg(long, default_value = "dark")]
    theme: String,

    /// Load a dataset from JSON instead of synthesizing one.
    #[arg(long)]
    data: Option<PathBuf>,

    /// Synthesis seed. Defaults to a stable hash of the username.
    #[arg(long)]
    seed: Option<u64>,

    /// TTF/OTF font file for labels. Defaults to a system sans-serif.
    #[arg(long)]
    font: Option<PathBuf>,
}

#[derive(Parser, Debug)]
struct FrameArgs {
    #[command(flatten)]
    common: CommonArgs,

    /// Reveal cutoff: render only the first N day cells.
    #[arg(long)]
    reveal: Option<u64>,

    /// Device pixel scale (>= 1) for crisp high-density output.
    #[arg(long, default_value_t = 1.0)]
    scale: f64,

    /// Output PNG path.
    #[arg(long)]
    out: PathBuf,
}

#[derive(Parser, Debug)]
struct RenderArgs {
    #[command(flatten)]
    common: CommonArgs,

    /// Capture rate (frames per second).
    #[arg(long, default_value_t = 25)]
    fps: u32,

    /// Add sub-pixel camera jitter for a filmed look.
    #[arg(long, default_value_t = false)]
    jitter: bool,

    /// Pace the frame loop in real time instead of encoding flat out.
    #[arg(long, default_value_t = false)]
    realtime: bool,

    /// Output WebM path.
    #[arg(long)]
    out: PathBuf,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    match cli.cmd {
        Command::Frame(args) => cmd_frame(args),
        Command::Render(args) => cmd_render(args),
    }
}

fn cmd_frame(args: FrameArgs) -> anyhow::Result<()> {
    let (theme, data) = resolve_inputs(&args.common)?;
    let mut renderer = ChartRenderer::new(font_source(&args.common)?)?;

    let frame = renderer.render_frame(
        &theme,
        &data,
        &args.common.username,
        &RenderOpts {
            reveal: args.reveal,
            pixel_scale: args.scale,
            ..Default::default()
        },
    )?;

    if let Some(parent) = args.out.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("create output dir '{}'", parent.display()))?;
    }
    image::save_buffer_with_format(
        &args.out,
        &frame.data,
        frame.width,
        frame.height,
        image::ColorType::Rgba8,
        image::ImageFormat::Png,
    )
    .with_context(|| format!("write png '{}'", args.out.display()))?;

    eprintln!("wrote {}", args.out.display());
    Ok(())
}

fn cmd_render(args: RenderArgs) -> anyhow::Result<()> {
    let (theme, data) = resolve_inputs(&args.common)?;
    let renderer = ChartRenderer::new(font_source(&args.common)?)?;

    let opts = TimelapseOpts {
        fps: Fps::new(args.fps, 1)?,
        jitter: args.jitter.then(JitterOpts::default),
        ..Default::default()
    };
    let mut encoder = TimelapseEncoder::new(renderer, opts);
    if !args.realtime {
        encoder = encoder.with_clock(Box::new(ImmediateClock));
    }

    let artifact = encoder.generate_with_progress(
        &theme,
        &data,
        &args.common.username,
        |current, total| {
            eprint!("\rframe {current}/{total}");
        },
    )?;
    eprintln!();

    artifact.save_to(&args.out)?;
    eprintln!(
        "wrote {} ({} bytes, {})",
        args.out.display(),
        artifact.len(),
        artifact.mime_type
    );
    Ok(())
}

fn resolve_inputs(common: &CommonArgs) -> anyhow::Result<(gitlapse::Theme, ContributionDataset)> {
    validate_username(&common.username)?;
    let theme = common.theme.parse::<ThemeKey>()?.theme();

    let today = chrono::Local::now().date_naive();
    let year = common.year.unwrap_or_else(|| today.year());

    let data = match &common.data {
        Some(path) => {
            let file = std::fs::File::open(path)
                .with_context(|| format!("open dataset '{}'", path.display()))?;
            let data: ContributionDataset = serde_json::from_reader(std::io::BufReader::new(file))
                .with_context(|| format!("parse dataset '{}'", path.display()))?;
            data.validate()?;
            data
        }
        None => synthesize(SynthOpts {
            year,
            seed: common
                .seed
                .unwrap_or_else(|| seed_for_username(&common.username)),
            today,
        })?,
    };

    Ok((theme, data))
}

fn font_source(common: &CommonArgs) -> anyhow::Result<FontSource> {
    Ok(match &common.font {
        Some(path) => FontSource::Path(path.clone()),
        None => FontSource::system_default()?,
    })
}
