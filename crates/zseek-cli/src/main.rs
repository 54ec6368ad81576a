//! zseek: inspect and read multi-frame zstd files at random offsets
//!
//! Commands:
//!   info <file>                              - frame count, sizes, multiframe flag
//!   index <file> [--json]                    - dump the jump table
//!   cat <file> [--offset N] [--length N]     - write a range to stdout
//!   extract <file> <out> [--offset N] [...]  - write a range to a file

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use indicatif::{ProgressBar, ProgressStyle};
use serde::Serialize;
use std::fs::File;
use std::io::{self, BufWriter, SeekFrom, Write};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info};

use zseek::{IndexMode, JumpTableRecord, SeekContext, SeekOptions};
use zseek_core::config::ZseekConfig;

const COPY_BUFFER: usize = 64 * 1024;

// ── CLI structure ──────────────────────────────────────────────────────────────

#[derive(Parser, Debug)]
#[command(
    name = "zseek",
    version,
    about = "Random access over multi-frame zstd files",
    long_about = "zseek: index multi-frame zstd files and read any uncompressed range without decoding from the start"
)]
struct Cli {
    /// Path to zseek.toml configuration file
    #[arg(long, short = 'c', env = "ZSEEK_CONFIG")]
    config: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error); overrides the config file
    #[arg(long, env = "ZSEEK_LOG")]
    log: Option<String>,

    /// Log format (json, text); overrides the config file
    #[arg(long, env = "ZSEEK_LOG_FORMAT")]
    log_format: Option<LogFormat>,

    /// Build the jump table on demand instead of scanning at open
    #[arg(long)]
    lazy: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Show frame count, sizes and whether the file has several frames
    Info {
        /// Compressed file
        file: PathBuf,
    },

    /// Print the jump table (one record per frame boundary)
    Index {
        /// Compressed file
        file: PathBuf,
        /// Emit JSON instead of a table
        #[arg(long)]
        json: bool,
    },

    /// Write an uncompressed range to stdout
    Cat {
        /// Compressed file
        file: PathBuf,
        #[command(flatten)]
        range: RangeArgs,
    },

    /// Write an uncompressed range to a file
    Extract {
        /// Compressed file
        file: PathBuf,
        /// Destination file
        out: PathBuf,
        #[command(flatten)]
        range: RangeArgs,
    },
}

#[derive(clap::Args, Debug, Clone, Copy, Default)]
struct RangeArgs {
    /// First uncompressed byte to read
    #[arg(long, default_value_t = 0)]
    offset: u64,
    /// Number of bytes to read (default: to the end)
    #[arg(long)]
    length: Option<u64>,
    /// Count --offset back from the end of the stream
    #[arg(long)]
    from_end: bool,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum LogFormat {
    Json,
    Text,
}

// ── Entry point ───────────────────────────────────────────────────────────────

fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = load_config(cli.config.as_deref())?;

    let level = cli.log.as_deref().unwrap_or(&config.log.level);
    let format = match cli.log_format {
        Some(format) => format,
        None if config.log.format == "json" => LogFormat::Json,
        None => LogFormat::Text,
    };
    init_logging(level, format);

    let mut options = SeekOptions::from(&config);
    if cli.lazy {
        options.index = IndexMode::Lazy;
    }
    debug!(
        version = env!("CARGO_PKG_VERSION"),
        mode = %options.index,
        "zseek starting"
    );

    match cli.command {
        Commands::Info { file } => cmd_info(&file, &options, &mut io::stdout().lock()),
        Commands::Index { file, json } => {
            cmd_index(&file, &options, json, &mut io::stdout().lock())
        }
        Commands::Cat { file, range } => {
            cmd_cat(&file, &options, range, &mut io::stdout().lock()).map(|_| ())
        }
        Commands::Extract { file, out, range } => cmd_extract(&file, &out, &options, range),
    }
}

// ── Config loading ────────────────────────────────────────────────────────────

fn load_config(path: Option<&Path>) -> Result<ZseekConfig> {
    match path {
        Some(path) => ZseekConfig::load(path)
            .with_context(|| format!("loading config: {}", path.display())),
        None => Ok(ZseekConfig::default()),
    }
}

fn init_logging(level: &str, format: LogFormat) {
    use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    // stdout carries file content, so logs go to stderr
    match format {
        LogFormat::Json => {
            tracing_subscriber::registry()
                .with(filter)
                .with(fmt::layer().json().with_writer(io::stderr))
                .init();
        }
        LogFormat::Text => {
            tracing_subscriber::registry()
                .with(filter)
                .with(fmt::layer().with_writer(io::stderr))
                .init();
        }
    }
}

fn open(file: &Path, options: &SeekOptions) -> Result<SeekContext> {
    SeekContext::from_path_with(file, options)
        .with_context(|| format!("opening {}", file.display()))
}

fn log_stats(ctx: &SeekContext) {
    let stats = ctx.stats();
    debug!(
        frames_decoded = stats.frames_decoded,
        frames_skipped = stats.frames_skipped,
        compressed_bytes_read = stats.compressed_bytes_read,
        "decoder stats"
    );
}

// ── `zseek info` ──────────────────────────────────────────────────────────────

fn cmd_info(file: &Path, options: &SeekOptions, out: &mut dyn Write) -> Result<()> {
    let mut ctx = open(file, options)?;
    let compressed = std::fs::metadata(file)
        .with_context(|| format!("reading metadata: {}", file.display()))?
        .len();
    let frames = ctx.number_of_frames().context("scanning frames")?;
    let size = ctx.uncompressed_file_size()?;
    let multiframe = ctx.is_multiframe()?;

    writeln!(out, "{}", file.display())?;
    writeln!(out, "  frames:            {frames}")?;
    writeln!(out, "  multiframe:        {}", if multiframe { "yes" } else { "no" })?;
    writeln!(out, "  compressed size:   {compressed}")?;
    writeln!(out, "  uncompressed size: {size}")?;
    if size > 0 {
        writeln!(out, "  ratio:             {:.2}", compressed as f64 / size as f64)?;
    }
    log_stats(&ctx);
    Ok(())
}

// ── `zseek index` ─────────────────────────────────────────────────────────────

#[derive(Serialize)]
struct IndexDump<'a> {
    complete: bool,
    frames: u64,
    uncompressed_size: u64,
    records: &'a [JumpTableRecord],
}

fn cmd_index(file: &Path, options: &SeekOptions, json: bool, out: &mut dyn Write) -> Result<()> {
    let mut ctx = open(file, options)?;
    ctx.initialize_jump_table().context("building jump table")?;
    let table = ctx.jump_table();

    if json {
        let dump = IndexDump {
            complete: table.is_complete(),
            frames: table.frame_count().unwrap_or(0),
            uncompressed_size: table.last_known_uncompressed_offset(),
            records: table.records(),
        };
        serde_json::to_writer_pretty(&mut *out, &dump)?;
        writeln!(out)?;
    } else {
        writeln!(
            out,
            "{:>6}  {:>14}  {:>14}  {:>10}  {:>10}",
            "frame", "compressed", "uncompressed", "c_len", "u_len"
        )?;
        for (i, pair) in table.records().windows(2).enumerate() {
            writeln!(
                out,
                "{:>6}  {:>14}  {:>14}  {:>10}  {:>10}",
                i,
                pair[0].compressed_pos,
                pair[0].uncompressed_pos,
                pair[1].compressed_pos - pair[0].compressed_pos,
                pair[1].uncompressed_pos - pair[0].uncompressed_pos,
            )?;
        }
        if let Some(end) = table.last() {
            writeln!(
                out,
                "{:>6}  {:>14}  {:>14}",
                "end", end.compressed_pos, end.uncompressed_pos
            )?;
        }
    }
    log_stats(&ctx);
    Ok(())
}

// ── Range reads ───────────────────────────────────────────────────────────────

/// Seek to the start of `range` and return how many bytes it spans.
fn position_range(ctx: &mut SeekContext, range: RangeArgs) -> Result<u64> {
    let target = if range.from_end {
        let back = i64::try_from(range.offset).context("--offset too large")?;
        SeekFrom::End(-back)
    } else {
        SeekFrom::Start(range.offset)
    };
    let start = ctx
        .seek(target)
        .with_context(|| format!("seeking to offset {}", range.offset))?;

    let available = ctx.uncompressed_file_size()? - start;
    Ok(range.length.map_or(available, |len| len.min(available)))
}

/// Copy `len` bytes from the cursor, calling `progress` after each chunk.
fn copy_range(
    ctx: &mut SeekContext,
    len: u64,
    out: &mut dyn Write,
    mut progress: impl FnMut(u64),
) -> Result<u64> {
    let mut buf = vec![0u8; COPY_BUFFER];
    let mut copied = 0u64;
    while copied < len {
        let want = (len - copied).min(COPY_BUFFER as u64) as usize;
        let n = ctx
            .read(&mut buf[..want])
            .with_context(|| format!("reading at offset {}", ctx.tell()))?;
        if n == 0 {
            break;
        }
        out.write_all(&buf[..n])?;
        copied += n as u64;
        progress(n as u64);
    }
    Ok(copied)
}

// ── `zseek cat` ───────────────────────────────────────────────────────────────

fn cmd_cat(file: &Path, options: &SeekOptions, range: RangeArgs, out: &mut dyn Write) -> Result<u64> {
    let mut ctx = open(file, options)?;
    let len = position_range(&mut ctx, range)?;
    let copied = copy_range(&mut ctx, len, out, |_| {})?;
    out.flush()?;
    log_stats(&ctx);
    Ok(copied)
}

// ── `zseek extract` ───────────────────────────────────────────────────────────

fn cmd_extract(file: &Path, dest: &Path, options: &SeekOptions, range: RangeArgs) -> Result<()> {
    let mut ctx = open(file, options)?;
    let len = position_range(&mut ctx, range)?;
    let start = ctx.tell();

    let out = File::create(dest).with_context(|| format!("creating {}", dest.display()))?;
    let mut out = BufWriter::new(out);

    let pb = make_progress_bar(len, "extract")?;
    let copied = copy_range(&mut ctx, len, &mut out, |n| pb.inc(n))?;
    out.flush()
        .with_context(|| format!("writing {}", dest.display()))?;
    pb.finish_with_message(format!("{copied} bytes"));

    info!(
        file = %file.display(),
        dest = %dest.display(),
        offset = start,
        bytes = copied,
        "range extracted"
    );
    log_stats(&ctx);
    Ok(())
}

// ── Progress bar helpers ──────────────────────────────────────────────────────

fn make_progress_bar(total: u64, prefix: &str) -> Result<ProgressBar> {
    let pb = ProgressBar::new(total);
    pb.set_style(
        ProgressStyle::with_template(
            "{prefix:.bold} [{bar:40.cyan/blue}] {bytes}/{total_bytes} ({bytes_per_sec}) {msg}",
        )?
        .progress_chars("=>-"),
    );
    pb.set_prefix(prefix.to_string());
    pb.enable_steady_tick(Duration::from_millis(100));
    Ok(pb)
}
