//! `RdpBridge` CLI - Command-line driver for the `RdpBridge` display pipeline
//!
//! Runs scripted sessions through the connection worker and a headless
//! display, converts raw images between color depths, and manages the
//! session configuration file.

use std::fmt::Write as _;
use std::path::{Path, PathBuf};
use std::sync::mpsc::{self, RecvTimeoutError};
use std::sync::Arc;
use std::time::Duration;

use clap::{Parser, Subcommand, ValueEnum};
use rdpbridge_core::engine::{NoChannels, ScriptStep, ScriptedEngine};
use rdpbridge_core::pixel::{convert_image, ColorDepth, Palette};
use rdpbridge_core::ui::{ChannelWaker, GuiWaker, Region, ROP3_PATCOPY, ROP3_SRCCOPY};
use rdpbridge_core::{BridgeConfig, ConnectionWorker, DisplaySession, HeadlessService};
use serde::Serialize;
use tracing_subscriber::EnvFilter;

/// Exit codes used by the CLI
pub mod exit_codes {
    /// General error (configuration, conversion, IO)
    pub const GENERAL_ERROR: i32 = 1;
    /// The session failed or stopped responding
    pub const SESSION_FAILURE: i32 = 2;
}

/// `RdpBridge` command-line interface
#[derive(Parser)]
#[command(name = "rdpbridge")]
#[command(author, version, about = "RdpBridge command-line interface")]
#[command(propagate_version = true)]
pub struct Cli {
    /// Path to the session configuration file
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

/// Available CLI commands
#[derive(Subcommand)]
pub enum Commands {
    /// Run a scripted session through the worker and a headless display
    #[command(about = "Replay a scripted session and report the result")]
    Demo {
        /// Number of drawing rounds in the script
        #[arg(short, long, default_value = "8")]
        steps: u32,

        /// Server color depth, overrides the configuration
        #[arg(long, value_parser = parse_depth)]
        server_depth: Option<ColorDepth>,

        /// Client color depth, overrides the configuration
        #[arg(long, value_parser = parse_depth)]
        client_depth: Option<ColorDepth>,

        /// Widget size to scale into, as WIDTHxHEIGHT
        #[arg(long, value_parser = parse_size)]
        widget: Option<(u32, u32)>,

        /// Output format for the report
        #[arg(short, long, default_value = "table", value_enum)]
        format: OutputFormat,
    },

    /// Convert a raw image between color depths
    #[command(about = "Convert raw image data from a server depth to a client depth")]
    Convert {
        /// Source depth in bits
        #[arg(long, value_parser = parse_depth)]
        from: ColorDepth,

        /// Target depth in bits
        #[arg(long, value_parser = parse_depth)]
        to: ColorDepth,

        /// Image width in pixels
        #[arg(short = 'W', long)]
        width: u32,

        /// Image height in pixels
        #[arg(short = 'H', long)]
        height: u32,

        /// Raw input file
        input: PathBuf,

        /// Raw output file
        #[arg(short, long)]
        output: PathBuf,
    },

    /// Configuration file management
    #[command(subcommand)]
    Config(ConfigCommands),
}

/// Configuration subcommands
#[derive(Subcommand)]
pub enum ConfigCommands {
    /// Print the effective configuration
    #[command(about = "Print the effective configuration as TOML")]
    Show,

    /// Write a default configuration file
    #[command(about = "Write a default configuration file")]
    Init {
        /// Destination path
        path: PathBuf,

        /// Overwrite an existing file
        #[arg(short, long)]
        force: bool,
    },
}

/// Output format for reports
#[derive(Debug, Clone, Copy, Default, ValueEnum)]
pub enum OutputFormat {
    /// Human-readable table format
    #[default]
    Table,
    /// JSON format for scripting
    Json,
}

/// CLI error type
#[derive(Debug, thiserror::Error)]
pub enum CliError {
    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Conversion error
    #[error("Conversion error: {0}")]
    Convert(String),

    /// Session error
    #[error("Session error: {0}")]
    Session(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl CliError {
    /// Returns the exit code for this error type
    #[must_use]
    pub const fn exit_code(&self) -> i32 {
        match self {
            Self::Session(_) => exit_codes::SESSION_FAILURE,
            Self::Config(_) | Self::Convert(_) | Self::Io(_) => exit_codes::GENERAL_ERROR,
        }
    }
}

fn parse_depth(s: &str) -> Result<ColorDepth, String> {
    let bits: u8 = s
        .trim_end_matches("bpp")
        .parse()
        .map_err(|_| format!("invalid color depth `{s}`"))?;
    ColorDepth::try_from(bits).map_err(|e| e.to_string())
}

fn parse_size(s: &str) -> Result<(u32, u32), String> {
    let (w, h) = s
        .split_once('x')
        .ok_or_else(|| format!("invalid size `{s}`, expected WIDTHxHEIGHT"))?;
    let parse = |v: &str| {
        v.parse::<u32>()
            .map_err(|_| format!("invalid size `{s}`, expected WIDTHxHEIGHT"))
    };
    Ok((parse(w)?, parse(h)?))
}

fn main() {
    let cli = Cli::parse();

    let default_level = if cli.verbose { "debug" } else { "warn" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .with_writer(std::io::stderr)
        .init();

    let result = load_config(cli.config.as_deref()).and_then(|config| match cli.command {
        Commands::Demo {
            steps,
            server_depth,
            client_depth,
            widget,
            format,
        } => cmd_demo(config, steps, server_depth, client_depth, widget, format),
        Commands::Convert {
            from,
            to,
            width,
            height,
            input,
            output,
        } => cmd_convert(from, to, width, height, &input, &output),
        Commands::Config(ConfigCommands::Show) => cmd_config_show(&config),
        Commands::Config(ConfigCommands::Init { path, force }) => cmd_config_init(&path, force),
    });

    if let Err(e) = result {
        eprintln!("Error: {e}");
        std::process::exit(e.exit_code());
    }
}

fn load_config(path: Option<&Path>) -> Result<BridgeConfig, CliError> {
    match path {
        Some(path) => BridgeConfig::load(path).map_err(|e| CliError::Config(e.to_string())),
        None => Ok(BridgeConfig::default()),
    }
}

// ============================================================================
// Demo
// ============================================================================

/// Outcome of a scripted session
#[derive(Debug, Serialize)]
pub struct DemoReport {
    /// Operations applied by the display
    pub operations: usize,
    /// Damage rectangles queued for redraw
    pub damage_rects: usize,
    /// Signals emitted, in order
    pub signals: Vec<String>,
    /// Why the worker stopped
    pub reason: String,
    /// Failure message, if any
    pub error: Option<String>,
    /// Final desktop width
    pub width: u32,
    /// Final desktop height
    pub height: u32,
    /// Off-screen objects still alive
    pub objects: usize,
    /// Operations that named unknown objects
    pub dangling: u64,
    /// FNV-1a hash of the final desktop
    pub checksum: String,
}

fn color_mask(depth: ColorDepth) -> u32 {
    match depth.bits() {
        bits @ 1..=16 => (1u32 << bits) - 1,
        _ => 0x00ff_ffff,
    }
}

/// Builds the drawing script replayed by `demo`
#[must_use]
pub fn build_demo_script(config: &BridgeConfig, rounds: u32) -> Vec<ScriptStep> {
    const TILE: u32 = 16;
    let depth = config.server_depth;
    let tile_bytes = depth.row_bytes(TILE as usize) * TILE as usize;
    let tile: Vec<u8> = (0..tile_bytes).map(|i| (i * 37 % 251) as u8).collect();
    let mask = color_mask(depth);
    let span_x = config.width.saturating_sub(TILE).max(1);
    let span_y = config.height.saturating_sub(TILE).max(1);

    let mut steps = vec![
        ScriptStep::Connected,
        ScriptStep::CreateBitmap {
            width: TILE,
            height: TILE,
            data: tile,
        },
    ];
    for round in 0..rounds {
        let x = (round * 97 % span_x) as i32;
        let y = (round * 61 % span_y) as i32;
        steps.push(ScriptStep::Rect {
            dest: Region::new(x, y, TILE * 2, TILE),
            color: round.wrapping_mul(0x0012_3457) & mask,
            rop: ROP3_PATCOPY,
        });
        steps.push(ScriptStep::MemBlt {
            bitmap: 0,
            rop: ROP3_SRCCOPY,
            dest: Region::new(y, x, TILE, TILE),
            src_x: 0,
            src_y: 0,
        });
        if round % 3 == 2 {
            steps.push(ScriptStep::SetClip(Region::new(0, 0, config.width / 2, config.height)));
            steps.push(ScriptStep::ScreenBlt {
                rop: ROP3_SRCCOPY,
                dest: Region::new(x + 4, y + 4, TILE, TILE),
                src_x: x,
                src_y: y,
            });
            steps.push(ScriptStep::ResetClip);
        }
    }
    steps.push(ScriptStep::CreateSurface {
        width: TILE,
        height: TILE,
        replaces: None,
    });
    steps.push(ScriptStep::SetSurface(Some(0)));
    steps.push(ScriptStep::Rect {
        dest: Region::new(0, 0, TILE, TILE),
        color: mask,
        rop: ROP3_PATCOPY,
    });
    steps.push(ScriptStep::SetSurface(None));
    steps.push(ScriptStep::DestroySurface { surface: 0 });
    steps.push(ScriptStep::DestroyBitmap { bitmap: 0 });
    steps
}

/// Replays the demo script and collects the report
///
/// # Errors
///
/// Returns `CliError::Session` if the worker cannot start or stops
/// responding.
pub fn run_demo(
    config: BridgeConfig,
    rounds: u32,
    widget: Option<(u32, u32)>,
) -> Result<DemoReport, CliError> {
    let script = build_demo_script(&config, rounds);
    tracing::debug!(rounds, steps = script.len(), "Replaying demo script");
    let (engine, _feeder) =
        ScriptedEngine::with_steps(script).map_err(|e| CliError::Session(e.to_string()))?;

    let (tx, wakes) = mpsc::channel();
    let waker: Arc<dyn GuiWaker> = Arc::new(ChannelWaker::new(tx));
    let (handle, link) = ConnectionWorker::spawn(&config, engine, NoChannels, waker)
        .map_err(|e| CliError::Session(e.to_string()))?;
    let mut session = DisplaySession::new(config, link, HeadlessService::new());

    if let Some((width, height)) = widget {
        if session.configure(width, height) {
            session.scale_timer_fired();
        }
    }

    let mut operations = 0;
    while session.exit().is_none() {
        match wakes.recv_timeout(Duration::from_secs(5)) {
            Ok(()) => operations += session.on_wake(),
            Err(RecvTimeoutError::Timeout) => {
                return Err(CliError::Session("worker stopped responding".to_string()));
            }
            Err(RecvTimeoutError::Disconnected) => {
                operations += session.on_wake();
                break;
            }
        }
    }
    handle.join();

    let Some(exit) = session.exit().cloned() else {
        return Err(CliError::Session("worker exited without closing".to_string()));
    };
    let service = session.service();
    let dispatcher = session.dispatcher();
    Ok(DemoReport {
        operations,
        damage_rects: service.damage.len(),
        signals: service.signals.iter().map(ToString::to_string).collect(),
        reason: format!("{:?}", exit.reason),
        error: exit.error,
        width: dispatcher.primary().width(),
        height: dispatcher.primary().height(),
        objects: dispatcher.object_count(),
        dangling: dispatcher.dangling_references(),
        checksum: format!("{:016x}", dispatcher.primary().checksum()),
    })
}

/// Formats a report as a two-column table
#[must_use]
pub fn format_report(report: &DemoReport) -> String {
    let rows = [
        ("operations", report.operations.to_string()),
        ("damage rects", report.damage_rects.to_string()),
        ("signals", report.signals.join(", ")),
        ("reason", report.reason.clone()),
        ("error", report.error.clone().unwrap_or_else(|| "-".to_string())),
        ("desktop", format!("{}x{}", report.width, report.height)),
        ("objects", report.objects.to_string()),
        ("dangling", report.dangling.to_string()),
        ("checksum", report.checksum.clone()),
    ];
    let key_width = rows.iter().map(|(k, _)| k.len()).max().unwrap_or(0);
    let mut output = String::new();
    for (key, value) in rows {
        let _ = writeln!(output, "{key:<key_width$}  {value}");
    }
    output.trim_end().to_string()
}

fn cmd_demo(
    mut config: BridgeConfig,
    steps: u32,
    server_depth: Option<ColorDepth>,
    client_depth: Option<ColorDepth>,
    widget: Option<(u32, u32)>,
    format: OutputFormat,
) -> Result<(), CliError> {
    if let Some(depth) = server_depth {
        config.server_depth = depth;
    }
    if let Some(depth) = client_depth {
        config.client_depth = depth;
    }
    if widget.is_some() && !config.scale {
        config = config.with_scale(0, 0);
    }
    config
        .validate()
        .map_err(|e| CliError::Config(e.to_string()))?;

    let report = run_demo(config, steps, widget)?;
    match format {
        OutputFormat::Table => println!("{}", format_report(&report)),
        OutputFormat::Json => {
            let json = serde_json::to_string_pretty(&report)
                .map_err(|e| CliError::Config(format!("Failed to serialize to JSON: {e}")))?;
            println!("{json}");
        }
    }
    if let Some(error) = report.error {
        return Err(CliError::Session(error));
    }
    Ok(())
}

// ============================================================================
// Convert
// ============================================================================

fn cmd_convert(
    from: ColorDepth,
    to: ColorDepth,
    width: u32,
    height: u32,
    input: &Path,
    output: &Path,
) -> Result<(), CliError> {
    let data = std::fs::read(input)?;
    let converted = convert_image(from, to, &Palette::default(), width, height, &data)
        .map_err(|e| CliError::Convert(e.to_string()))?;
    std::fs::write(output, &converted)?;
    println!(
        "Converted {width}x{height} from {from} to {to}: {} bytes written to {}",
        converted.len(),
        output.display()
    );
    Ok(())
}

// ============================================================================
// Config
// ============================================================================

fn cmd_config_show(config: &BridgeConfig) -> Result<(), CliError> {
    let toml = config
        .to_toml()
        .map_err(|e| CliError::Config(e.to_string()))?;
    print!("{toml}");
    Ok(())
}

fn cmd_config_init(path: &Path, force: bool) -> Result<(), CliError> {
    if path.exists() && !force {
        return Err(CliError::Config(format!(
            "{} already exists, use --force to overwrite",
            path.display()
        )));
    }
    BridgeConfig::default()
        .save(path)
        .map_err(|e| CliError::Config(e.to_string()))?;
    println!("Wrote default configuration to {}", path.display());
    Ok(())
}
