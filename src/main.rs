use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use std::time::Duration;
use tracing::{info, Level};

use ghidra_export::cache::CaptureCache;
use ghidra_export::config::{DEFAULT_CACHE_DIR, GHIDRA_PATH_ENV};
use ghidra_export::{
    export_program, AnalysisHost, CapturedProgram, Direction, ExportConfig, GhidraHeadless, HeadlessConfig,
    Launcher,
};

#[derive(Parser)]
#[command(name = "ghidra-export")]
#[command(about = "Decompile every function of a binary with Ghidra and export them as JSON", long_about = None)]
struct Cli {
    /// Binary to analyze
    #[arg(value_name = "BINARY", required_unless_present = "capture")]
    binary: Option<PathBuf>,

    /// Output file (overrides GHIDRA_OUTPUT_PATH)
    #[arg(short, long, value_name = "PATH")]
    output: Option<PathBuf>,

    /// Ghidra installation directory (defaults to GHIDRA_PATH)
    #[arg(long, value_name = "DIR", conflicts_with = "capture")]
    ghidra_path: Option<PathBuf>,

    /// Run analyzeHeadless inside this Docker image instead (e.g. blacktop/ghidra)
    #[arg(long, value_name = "IMAGE", conflicts_with_all = ["ghidra_path", "capture"])]
    docker_image: Option<String>,

    /// Per-function decompile timeout in seconds
    #[arg(long, value_name = "SECS", default_value_t = 30)]
    timeout: u64,

    /// Enumerate functions from the highest address down
    #[arg(long)]
    reverse: bool,

    /// Add a "status" field to every exported function
    #[arg(long)]
    with_status: bool,

    /// Replay a capture file written by the export script instead of running Ghidra
    #[arg(long, value_name = "FILE", conflicts_with = "binary")]
    capture: Option<PathBuf>,

    /// Directory for cached Ghidra captures
    #[arg(long, value_name = "DIR", default_value = DEFAULT_CACHE_DIR, conflicts_with = "capture")]
    cache_dir: PathBuf,

    /// Always run Ghidra, ignoring and not writing the cache
    #[arg(long, conflicts_with = "capture")]
    no_cache: bool,

    /// Remove cached captures before running
    #[arg(long, conflicts_with = "capture")]
    clear_cache: bool,

    /// JVM max heap for Ghidra (e.g. 4G)
    #[arg(long, value_name = "SIZE", conflicts_with = "capture")]
    max_heap: Option<String>,

    /// Debug logging
    #[arg(short, long)]
    verbose: bool,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_target(false)
        .with_level(true)
        .with_max_level(if cli.verbose { Level::DEBUG } else { Level::INFO })
        .with_writer(std::io::stderr)
        .init();

    let mut config = ExportConfig::from_env();
    if let Some(output) = &cli.output {
        config.output_path = output.clone();
    }
    config.timeout = Duration::from_secs(cli.timeout);
    config.direction = if cli.reverse { Direction::Backward } else { Direction::Forward };
    config.with_status = cli.with_status;

    println!("Ghidra export starting...");

    let mut program = open_program(&cli, &config)?;
    info!("Program {} opened ({} functions)", program.program_name(), program.len());

    let summary = export_program(&mut program, &config)
        .with_context(|| format!("Failed to export to {}", config.output_path.display()))?;

    println!("{}", summary);
    Ok(())
}

/// キャプチャ再生か Ghidra Headless でプログラムを開く
fn open_program(cli: &Cli, config: &ExportConfig) -> Result<CapturedProgram> {
    if let Some(capture) = &cli.capture {
        info!("Replaying capture {}", capture.display());
        return CapturedProgram::load(capture)
            .with_context(|| format!("Failed to load capture {}", capture.display()));
    }

    if cli.clear_cache {
        CaptureCache::new(&cli.cache_dir)?.clear()?;
    }

    let binary = cli
        .binary
        .as_ref()
        .context("BINARY is required unless --capture is given")?;

    let launcher = if let Some(image) = &cli.docker_image {
        Launcher::Docker { image: image.clone() }
    } else {
        let ghidra_path = cli
            .ghidra_path
            .clone()
            .or_else(|| std::env::var_os(GHIDRA_PATH_ENV).map(PathBuf::from))
            .with_context(|| {
                format!("Ghidra location unknown: set {}, --ghidra-path or --docker-image", GHIDRA_PATH_ENV)
            })?;
        Launcher::Local { ghidra_path }
    };

    let headless = GhidraHeadless::new(HeadlessConfig {
        launcher,
        timeout: config.timeout,
        cache_dir: (!cli.no_cache).then(|| cli.cache_dir.clone()),
        max_heap: cli.max_heap.clone(),
    })?;

    headless
        .open(binary)
        .with_context(|| format!("Ghidra analysis of {} failed", binary.display()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_capture_replay_parses() {
        let cli = Cli::try_parse_from(["ghidra-export", "--capture", "run.jsonl"]).unwrap();
        assert_eq!(cli.capture, Some(PathBuf::from("run.jsonl")));
        assert_eq!(cli.cache_dir, PathBuf::from(DEFAULT_CACHE_DIR));
    }

    #[test]
    fn test_ghidra_only_flags_conflict_with_capture() {
        let flags: [&[&str]; 6] = [
            &["--no-cache"],
            &["--clear-cache"],
            &["--cache-dir", "cache"],
            &["--docker-image", "blacktop/ghidra"],
            &["--ghidra-path", "/opt/ghidra"],
            &["--max-heap", "4G"],
        ];
        for flag in flags {
            let mut args = vec!["ghidra-export", "--capture", "run.jsonl"];
            args.extend_from_slice(flag);
            let result = Cli::try_parse_from(args);
            assert!(result.is_err(), "{:?} should conflict with --capture", flag);
        }
    }

    #[test]
    fn test_binary_with_ghidra_flags_parses() {
        let cli = Cli::try_parse_from([
            "ghidra-export",
            "a.out",
            "--ghidra-path",
            "/opt/ghidra",
            "--no-cache",
            "--max-heap",
            "4G",
        ])
        .unwrap();
        assert_eq!(cli.binary, Some(PathBuf::from("a.out")));
        assert!(cli.no_cache);
    }
}
