use std::{
    fs::File,
    io::BufReader,
    path::{Path, PathBuf},
};

use anyhow::Context as _;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "outpaint", version)]
struct Cli {
    #[command(subcommand)]
    cmd: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Replay a scene trace through the software backend.
    Replay(ReplayArgs),
}

#[derive(Parser, Debug)]
struct ReplayArgs {
    /// Input scene trace JSON.
    #[arg(long = "in")]
    in_path: PathBuf,

    /// Write the last presented frame as PNG.
    #[arg(long)]
    out: Option<PathBuf>,

    /// Number of frames to paint (defaults to the length of the trace).
    #[arg(long)]
    frames: Option<usize>,
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    match cli.cmd {
        Command::Replay(args) => cmd_replay(args),
    }
}

fn read_trace_json(path: &Path) -> anyhow::Result<outpaint::replay::Trace> {
    let f = File::open(path).with_context(|| format!("open scene trace '{}'", path.display()))?;
    let r = BufReader::new(f);
    let trace: outpaint::replay::Trace =
        serde_json::from_reader(r).with_context(|| "parse scene trace JSON")?;
    trace.validate()?;
    Ok(trace)
}

fn cmd_replay(args: ReplayArgs) -> anyhow::Result<()> {
    let trace = read_trace_json(&args.in_path)?;
    let mut replay = outpaint::replay::Replay::new(trace)?;
    let frames = args.frames.unwrap_or_else(|| replay.trace_len().max(1));

    let mut presented = 0usize;
    for _ in 0..frames {
        let report = replay.step();
        if report.outcome.is_presented() {
            presented += 1;
        }
        println!("{report}");
    }
    eprintln!("{presented}/{frames} frames presented");

    let Some(out) = args.out else {
        return Ok(());
    };
    let frame = replay
        .last_frame()
        .context("no frame was presented, nothing to write")?;

    if let Some(parent) = out.parent()
        && !parent.as_os_str().is_empty()
    {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("create output dir '{}'", parent.display()))?;
    }

    image::save_buffer_with_format(
        &out,
        &frame.to_straight(),
        frame.width,
        frame.height,
        image::ColorType::Rgba8,
        image::ImageFormat::Png,
    )
    .with_context(|| format!("write png '{}'", out.display()))?;

    eprintln!("wrote {}", out.display());
    Ok(())
}
