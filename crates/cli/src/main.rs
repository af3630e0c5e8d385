use std::path::PathBuf;
use std::process;
use std::time::Instant;

use clap::Parser;

use framefeed_core::loader::config::LoaderConfig;
use framefeed_core::loader::video_loader::VideoLoader;
use framefeed_core::reader::video_reader::VideoReader;
use framefeed_core::shared::device::DeviceContext;

/// Frame-accurate video inspection and batched loading.
#[derive(Parser)]
#[command(name = "framefeed")]
struct Cli {
    /// Input video files.
    #[arg(required = true)]
    inputs: Vec<PathBuf>,

    /// Run a full loader pass and report throughput instead of printing
    /// per-file info.
    #[arg(long)]
    bench: bool,

    /// Check one accurate seek position on the first input.
    #[arg(long)]
    seek: Option<i64>,

    /// Frames per batch (bench mode).
    #[arg(long, default_value = "8")]
    batch_size: usize,

    /// Batch frame height (bench mode).
    #[arg(long, default_value = "224")]
    height: u32,

    /// Batch frame width (bench mode).
    #[arg(long, default_value = "224")]
    width: u32,

    /// Step between sampled frame ordinals.
    #[arg(long, default_value = "1")]
    interval: u64,

    /// First sampled ordinal in each file.
    #[arg(long, default_value = "0")]
    skip: u64,

    /// Shuffle the sample order.
    #[arg(long)]
    shuffle: bool,

    /// Shuffle seed; omit for a fresh permutation per pass.
    #[arg(long)]
    seed: Option<u64>,

    /// Completed batches buffered ahead of consumption.
    #[arg(long, default_value = "2")]
    prefetch: usize,
}

fn main() {
    env_logger::init();

    if let Err(e) = run() {
        eprintln!("Error: {e}");
        process::exit(1);
    }
}

fn run() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    if cli.bench {
        run_bench(&cli)
    } else if let Some(pos) = cli.seek {
        run_seek(&cli, pos)
    } else {
        run_info(&cli)
    }
}

fn run_info(cli: &Cli) -> Result<(), Box<dyn std::error::Error>> {
    for path in &cli.inputs {
        let reader = VideoReader::open(path, DeviceContext::Cpu, None)?;
        let meta = reader.metadata();
        let keys = reader.key_indices();

        println!("{}", path.display());
        println!("  codec:      {}", meta.codec);
        println!("  size:       {}x{}", meta.width, meta.height);
        println!("  fps:        {:.3}", meta.fps);
        println!("  frames:     {}", reader.frame_count());
        println!("  key frames: {}", keys.len());

        let preview: Vec<String> = keys.iter().take(8).map(u64::to_string).collect();
        let suffix = if keys.len() > 8 { ", ..." } else { "" };
        println!("  key index:  [{}{}]", preview.join(", "), suffix);
    }
    Ok(())
}

fn run_seek(cli: &Cli, pos: i64) -> Result<(), Box<dyn std::error::Error>> {
    let path = &cli.inputs[0];
    let mut reader = VideoReader::open(path, DeviceContext::Cpu, None)?;

    let started = Instant::now();
    if !reader.seek_accurate(pos)? {
        return Err(format!(
            "position {pos} out of range (file has {} frames)",
            reader.frame_count()
        )
        .into());
    }
    let frame = reader.next_frame()?;

    println!(
        "frame {} ({}x{}, pts {}) decoded in {:.1} ms",
        frame.ordinal(),
        frame.width(),
        frame.height(),
        frame.pts(),
        started.elapsed().as_secs_f64() * 1000.0
    );
    Ok(())
}

fn run_bench(cli: &Cli) -> Result<(), Box<dyn std::error::Error>> {
    let mut config = LoaderConfig::new(cli.inputs.clone())
        .with_batch_shape(cli.batch_size, cli.height, cli.width)
        .with_sampling(cli.interval, cli.skip)
        .with_shuffle(cli.shuffle)
        .with_prefetch_depth(cli.prefetch);
    if let Some(seed) = cli.seed {
        config = config.with_seed(seed);
    }

    let mut loader = VideoLoader::new(config)?;
    println!(
        "pass: {} batches of {} ({}x{})",
        loader.length(),
        cli.batch_size,
        cli.width,
        cli.height
    );

    let started = Instant::now();
    let mut batches = 0usize;
    while loader.has_next() {
        let batch = loader.next()?;
        batches += 1;
        log::debug!("batch {batches}: {} frames", batch.len());
    }
    let elapsed = started.elapsed().as_secs_f64();

    let frames = batches * cli.batch_size;
    println!(
        "{batches} batches / {frames} frames in {elapsed:.2} s ({:.1} frames/s)",
        frames as f64 / elapsed.max(f64::EPSILON)
    );
    Ok(())
}
