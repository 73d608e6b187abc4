//! Scan Guard CLI
//!
//! Command-line interface for running a scan session against the mock
//! camera (or a real one with the `camera` feature) and inspecting the
//! configured camera ladder.

use clap::{Args, Parser, Subcommand};
use scan_guard::{
    capture::{AcquisitionError, CameraBackend, MockCameraBackend},
    config::FileConfig,
    decode::{RegionOfInterest, ScriptedEngine},
    session::{
        EventLog, HostSurface, InterruptRelay, ScanStats, Scanner, SessionOutcome,
        EXIT_CODE_INTERRUPTED,
    },
};
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use tracing::{info, warn};

/// Frame rate of the simulated camera.
const MOCK_FPS: u32 = 30;

#[derive(Parser)]
#[command(name = "scan-guard", version, about = "Live barcode scanning core")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run one scan session
    Scan(ScanArgs),
    /// Print the camera constraint ladder
    Tiers {
        /// TOML configuration file
        #[arg(long)]
        config: Option<PathBuf>,
    },
}

#[derive(Args)]
struct ScanArgs {
    /// TOML configuration file
    #[arg(long)]
    config: Option<PathBuf>,

    /// Agreeing reads required to confirm a code
    #[arg(long)]
    threshold: Option<u32>,

    /// Decoder worker threads
    #[arg(long)]
    workers: Option<usize>,

    /// Target decode rate in frames per second (0 decodes every frame)
    #[arg(long)]
    frequency: Option<u32>,

    /// Scan region as percentage insets: TOP,RIGHT,BOTTOM,LEFT
    #[arg(long, value_parser = parse_roi)]
    roi: Option<RegionOfInterest>,

    /// Skip the camera and complete the session with this code
    #[arg(long)]
    manual: Option<String>,

    /// Codes the simulated decoder reads, one per processed frame
    #[arg(long, value_delimiter = ',')]
    mock_codes: Vec<String>,

    /// Make the first K simulated camera tiers deny permission
    #[arg(long, default_value_t = 0)]
    deny_tiers: usize,

    /// Frames the simulated camera delivers before its track ends
    #[arg(long, default_value_t = 300)]
    mock_frames: u64,

    /// Use the system camera (requires the `camera` feature). Decoding
    /// still replays --mock-codes, which must be given
    #[arg(long)]
    native: bool,
}

fn parse_roi(value: &str) -> Result<RegionOfInterest, String> {
    let insets: Vec<f32> = value
        .split(',')
        .map(|part| {
            part.trim()
                .parse::<f32>()
                .map_err(|e| format!("invalid inset '{part}': {e}"))
        })
        .collect::<Result<_, _>>()?;
    let [top, right, bottom, left] = insets[..] else {
        return Err(format!("expected 4 insets, got {}", insets.len()));
    };
    let region = RegionOfInterest {
        top,
        right,
        bottom,
        left,
    };
    region.validate()?;
    Ok(region)
}

/// Rejects flag combinations that could never finish a session.
fn check_scan_args(args: &ScanArgs) -> Result<(), String> {
    if args.native && args.mock_codes.is_empty() && args.manual.is_none() {
        return Err("--native decodes with the scripted engine; pass --mock-codes or --manual".into());
    }
    Ok(())
}

fn main() -> ExitCode {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .init();

    let cli = Cli::parse();
    match cli.command {
        Command::Scan(args) => run_scan(args),
        Command::Tiers { config } => print_tiers(config),
    }
}

fn load_config(path: Option<&PathBuf>) -> Result<FileConfig, String> {
    match path {
        Some(path) => FileConfig::from_file(path).map_err(|e| e.to_string()),
        None => Ok(FileConfig::default()),
    }
}

fn print_tiers(path: Option<PathBuf>) -> ExitCode {
    let config = match load_config(path.as_ref()) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Failed to load config: {}", e);
            return ExitCode::FAILURE;
        }
    };
    for (index, tier) in config.camera.tiers.iter().enumerate() {
        println!("{}. {}", index + 1, tier);
    }
    ExitCode::SUCCESS
}

fn run_scan(args: ScanArgs) -> ExitCode {
    info!("Scan Guard v{}", scan_guard::VERSION);
    if let Err(e) = check_scan_args(&args) {
        eprintln!("{}", e);
        return ExitCode::FAILURE;
    }

    let mut file = match load_config(args.config.as_ref()) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Failed to load config: {}", e);
            return ExitCode::FAILURE;
        }
    };

    let scan = &mut file.scanner;
    if let Some(threshold) = args.threshold {
        scan.threshold = threshold;
    }
    if let Some(workers) = args.workers {
        scan.decoder.workers = workers;
    }
    if let Some(frequency) = args.frequency {
        scan.decoder.frequency = (frequency > 0).then_some(frequency);
    }
    if let Some(region) = args.roi {
        scan.decoder.region = region;
    }

    let backend = match camera_backend(&args) {
        Ok(backend) => backend,
        Err(e) => {
            eprintln!("{}", e);
            return ExitCode::FAILURE;
        }
    };
    let engine = ScriptedEngine::codes(args.mock_codes.iter().cloned());

    let relay = InterruptRelay::new();
    if let Err(e) = relay.install_ctrlc() {
        warn!("Ctrl+C will not cancel the scan: {}", e);
    }

    let mut scanner = match Scanner::new(backend, Arc::new(engine), file.scanner.clone()) {
        Ok(scanner) => scanner
            .with_tiers(file.camera.tiers.clone())
            .with_interrupts(Arc::clone(&relay)),
        Err(e) => {
            eprintln!("Invalid configuration: {}", e);
            return ExitCode::FAILURE;
        }
    };

    if file.output.metrics_port != 0 {
        spawn_metrics_server(file.output.metrics_port, scanner.stats());
    }

    let observer = Arc::new(EventLog::new());
    let session = scanner.open(observer.clone());
    if let Some(code) = &args.manual {
        session.control().submit_manual(code);
    }
    let report = session.run(&mut HostSurface::headless());
    info!("{}", report);

    match report.outcome {
        SessionOutcome::Detected { code, source } => {
            info!(?source, "Code detected");
            println!("{}", code);
            ExitCode::SUCCESS
        }
        SessionOutcome::Failed(err) => {
            eprintln!("{}", err.user_message());
            ExitCode::FAILURE
        }
        SessionOutcome::Closed => {
            eprintln!("Scan cancelled.");
            ExitCode::from(EXIT_CODE_INTERRUPTED as u8)
        }
    }
}

fn camera_backend(args: &ScanArgs) -> Result<Box<dyn CameraBackend>, String> {
    if args.native {
        return native_backend();
    }

    let mut backend = MockCameraBackend::new()
        .with_resolution(640, 480)
        .with_frame_rate(MOCK_FPS)
        .with_frame_limit(args.mock_frames);
    for _ in 0..args.deny_tiers {
        backend = backend.fail_next(AcquisitionError::PermissionDenied(
            "denied by --deny-tiers".into(),
        ));
    }
    Ok(Box::new(backend))
}

#[cfg(feature = "camera")]
fn native_backend() -> Result<Box<dyn CameraBackend>, String> {
    Ok(Box::new(scan_guard::capture::NativeCameraBackend::new()))
}

#[cfg(not(feature = "camera"))]
fn native_backend() -> Result<Box<dyn CameraBackend>, String> {
    Err("--native requires building with the `camera` feature".into())
}

#[cfg(feature = "metrics")]
fn spawn_metrics_server(port: u16, stats: Arc<ScanStats>) {
    use scan_guard::metrics::{MetricsRegistry, MetricsServer, MetricsServerConfig};

    std::thread::spawn(move || {
        let runtime = match tokio::runtime::Builder::new_multi_thread().enable_all().build() {
            Ok(runtime) => runtime,
            Err(e) => {
                warn!("Failed to start metrics runtime: {}", e);
                return;
            }
        };
        let registry = match MetricsRegistry::new() {
            Ok(registry) => registry,
            Err(e) => {
                warn!("Failed to create metrics registry: {}", e);
                return;
            }
        };
        let server = MetricsServer::new(MetricsServerConfig::with_port(port), registry, stats);
        if let Err(e) = runtime.block_on(server.run()) {
            warn!("Metrics server stopped: {}", e);
        }
    });
}

#[cfg(not(feature = "metrics"))]
fn spawn_metrics_server(port: u16, _stats: Arc<ScanStats>) {
    warn!(port, "metrics_port is set but the `metrics` feature is disabled");
}
