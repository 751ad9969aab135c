use anyhow::{Result, anyhow};
use clap::{Args, Parser};
use console::style;
use dialoguer::{Select, theme::ColorfulTheme};
use indicatif::{ProgressBar, ProgressStyle};
use scanr_core::acquire;
use scanr_core::backend::Backend;
use scanr_core::cancel::{CancelToken, CancellationController};
use scanr_core::device::DeviceInfo;
use scanr_core::error::Status;
use scanr_core::negotiate::AcquisitionParameters;
use scanr_core::pattern::{PatternBackend, PatternConfig};
use scanr_core::reader::ReadOutcome;
use scanr_core::sink::SinkReport;
use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;
use tracing::debug;
use tracing_subscriber::EnvFilter;

#[cfg(unix)]
use libc::ECHOCTL;
#[cfg(unix)]
use std::io::{IsTerminal, stdout};
#[cfg(unix)]
use std::os::unix::io::AsRawFd;
#[cfg(unix)]
use termios::{TCSANOW, Termios, tcsetattr};

#[derive(Parser)]
#[command(name = "scanr")]
#[command(about = "Scan one image from a scanner into a PPM file", version)]
struct Cli {
    /// PPM file to write the scan to (the data is discarded if omitted)
    output: Option<PathBuf>,

    /// Device to scan from; empty selects the first available device
    #[arg(short, long, default_value = "")]
    device: String,

    /// Pick the device from an interactive menu
    #[arg(long, conflicts_with = "device")]
    select: bool,

    /// List available devices and exit
    #[arg(short, long)]
    list: bool,

    #[command(flatten)]
    pattern: PatternArgs,

    /// Increase log verbosity (-v info, -vv debug). RUST_LOG takes precedence
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

#[derive(Args)]
#[command(next_help_heading = "Virtual scanner")]
struct PatternArgs {
    /// Image width in pixels
    #[arg(long, default_value_t = 850)]
    width: u32,

    /// Image height in lines
    #[arg(long, default_value_t = 1100)]
    height: u32,

    /// Pause before every chunk, in milliseconds
    #[arg(long, value_name = "MS", default_value_t = 0)]
    chunk_delay_ms: u64,
}

impl From<&PatternArgs> for PatternConfig {
    fn from(args: &PatternArgs) -> Self {
        Self {
            width: args.width,
            height: args.height,
            chunk_delay: Duration::from_millis(args.chunk_delay_ms),
        }
    }
}

/// Disables `ECHOCTL` on the terminal for as long as it lives, so Ctrl+C
/// does not print `^C` over the progress bar. Restores the saved settings on
/// drop. Does nothing on non-Unix platforms or when stdout is not a terminal.
struct TermRestorer {
    #[cfg(unix)]
    saved: Option<Termios>,
}

impl TermRestorer {
    fn new() -> Self {
        #[cfg(unix)]
        {
            let fd = stdout().as_raw_fd();
            let saved = stdout()
                .is_terminal()
                .then(|| Termios::from_fd(fd).ok())
                .flatten()
                .filter(|original| {
                    let mut quiet = *original;
                    quiet.c_lflag &= !ECHOCTL;
                    tcsetattr(fd, TCSANOW, &quiet).is_ok()
                });
            Self { saved }
        }
        #[cfg(not(unix))]
        {
            Self {}
        }
    }
}

impl Drop for TermRestorer {
    fn drop(&mut self) {
        #[cfg(unix)]
        if let Some(saved) = &self.saved {
            tcsetattr(stdout().as_raw_fd(), TCSANOW, saved).ok();
        }
    }
}

fn default_log_level(verbose: u8) -> &'static str {
    match verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    }
}

/// Installs the global `tracing` subscriber on stderr.
fn init_logging(verbose: u8) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_log_level(verbose)));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

/// Presents an interactive menu for the user to select a device.
fn select_device(devices: &[DeviceInfo], prompt: &str) -> Result<String> {
    if devices.is_empty() {
        return Err(anyhow!("No scanners found."));
    }

    let items: Vec<String> = devices.iter().map(|d| d.to_string()).collect();

    let selection = Select::with_theme(&ColorfulTheme::default())
        .with_prompt(prompt)
        .items(&items)
        .default(0)
        .interact()?;

    Ok(devices[selection].name.clone())
}

fn list_devices(devices: &[DeviceInfo]) {
    if devices.is_empty() {
        println!("No scanners found.");
        return;
    }

    println!("Found {} devices:", devices.len());
    println!("\n  {:<15} {:<12} {:<20} {}", "DEVICE", "VENDOR", "MODEL", "TYPE");
    println!("  {:-<15} {:-<12} {:-<20} {:-<15}", "", "", "", "");
    for device in devices {
        println!(
            "  {:<15} {:<12} {:<20} {}",
            device.name, device.vendor, device.model, device.kind
        );
    }
}

/// A line for stderr when the stream did not run to completion.
fn stream_note(outcome: &ReadOutcome) -> Option<String> {
    match outcome {
        ReadOutcome::Done => None,
        ReadOutcome::Failed(Status::Cancelled) => Some("scan cancelled".to_string()),
        ReadOutcome::Failed(status) => Some(format!("scan ended early: {status}")),
    }
}

fn main() -> Result<ExitCode> {
    // This guard will be dropped when main() exits, restoring the terminal.
    let _term_restorer = TermRestorer::new();

    // The handler only ever asks an open device to abort; with no device open
    // it does nothing.
    let token = CancelToken::new();
    let controller = CancellationController::new(token.clone());
    ctrlc::set_handler(move || {
        controller.on_interrupt();
    })?;

    let cli = Cli::parse();
    init_logging(cli.verbose);

    let backend = PatternBackend::new(PatternConfig::from(&cli.pattern));

    if cli.list {
        list_devices(&backend.devices());
        return Ok(ExitCode::SUCCESS);
    }

    let device = if cli.select {
        select_device(&backend.devices(), "Select the scanner to scan from")?
    } else {
        cli.device.clone()
    };
    debug!(device = %device, output = ?cli.output, "starting acquisition");

    let bar_style = ProgressStyle::default_bar()
        .template(
            "{prefix:12} [{elapsed_precise}] [{bar:40.green/black}] {bytes}/{total_bytes} ({bytes_per_sec}, {eta}) {msg}",
        )?
        .progress_chars("■ ");
    let scan_pb = ProgressBar::new(0);

    let on_parameters = |params: &AcquisitionParameters| {
        println!("image size: {}x{}", params.width, params.height);
        scan_pb.set_length(params.expected_bytes());
        scan_pb.set_prefix("Scanning");
        scan_pb.set_style(bar_style.clone());
    };
    let on_progress = |bytes| scan_pb.set_position(bytes);

    let result = acquire::run(
        backend,
        &device,
        cli.output.as_deref(),
        token,
        on_parameters,
        on_progress,
    );

    let report = match result {
        Ok(report) => report,
        Err(e) => {
            scan_pb.finish_and_clear();
            eprintln!("{} {}", style("error:").red().bold(), e);
            return Ok(ExitCode::FAILURE);
        }
    };

    let complete = report.outcome == ReadOutcome::Done;
    if complete {
        scan_pb.finish_with_message("Scan complete.");
    } else {
        scan_pb.abandon();
    }
    if let Some(note) = stream_note(&report.outcome) {
        eprintln!("{} {}.", style("note:").yellow().bold(), note);
    }

    match &report.sink {
        SinkReport::Written(path) if complete => {
            println!("\n✨ Saved scan to {}.", style(path.display()).cyan());
        }
        SinkReport::Written(path) => {
            println!("\nSaved partial scan to {}.", style(path.display()).cyan());
        }
        SinkReport::Removed(err) => {
            eprintln!(
                "{} {}; output file removed.",
                style("WARNING:").yellow().bold(),
                err
            );
        }
        SinkReport::Unavailable(err) => {
            eprintln!(
                "{} {}; scanning without saving.",
                style("WARNING:").yellow().bold(),
                err
            );
        }
        SinkReport::NotRequested => {}
    }

    if report.bytes != 0 {
        println!("{} bytes of data received", report.bytes);
    }

    Ok(ExitCode::SUCCESS)
}
