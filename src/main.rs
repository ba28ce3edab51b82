use anyhow::{Context, Result};
use clap::Parser;
use scancam::{
    Decoder, DisplayRotation, MockCameraProvider, ScanConfig, ScanEvent, SessionControllerBuilder,
    StaticDisplay,
};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast::error::RecvError;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// Pace of simulated preview frames
const FRAME_INTERVAL: Duration = Duration::from_millis(33);

#[derive(Parser, Debug)]
#[command(name = "scancam")]
#[command(about = "Barcode scanning camera core driven by a simulated camera")]
#[command(version)]
#[command(long_about = "Runs a scan session against a simulated back-facing camera. \
Every preview frame is cropped to the on-screen scan window and handed to the decoder; \
decoded results are printed one per line.")]
struct Args {
    /// Path to configuration file
    #[arg(short, long, default_value = "scancam.toml", help = "Path to TOML configuration file")]
    config: String,

    /// Enable debug logging (most verbose)
    #[arg(short, long, help = "Enable debug level logging")]
    debug: bool,

    /// Enable verbose logging (info level)
    #[arg(short, long, help = "Enable verbose info level logging")]
    verbose: bool,

    /// Enable quiet mode (errors only)
    #[arg(short, long, help = "Enable quiet mode - only log errors")]
    quiet: bool,

    /// Override log format (json, pretty, compact)
    #[arg(long, value_name = "FORMAT", help = "Log output format: json, pretty, or compact")]
    log_format: Option<String>,

    /// Validate configuration and exit
    #[arg(long, help = "Validate configuration file and exit without opening the camera")]
    validate_config: bool,

    /// Print default configuration and exit
    #[arg(long, help = "Print default configuration in TOML format and exit")]
    print_config: bool,

    /// Image served as every preview frame
    #[arg(long, value_name = "PATH", help = "Still image fed to the simulated camera")]
    image: Option<PathBuf>,

    /// Stop after this many delivered frames
    #[arg(long, value_name = "COUNT", help = "Stop after delivering this many frames")]
    frames: Option<u64>,

    /// Stop after the first decoded result
    #[arg(long, help = "Exit after the first decoded result")]
    once: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    if args.print_config {
        print_default_config()?;
        return Ok(());
    }

    init_logging(&args)?;

    info!("Starting scancam v{}", env!("CARGO_PKG_VERSION"));
    info!("Configuration file: {}", args.config);

    let config = match ScanConfig::load_from_file(&args.config) {
        Ok(config) => {
            info!("Configuration loaded successfully from: {}", args.config);
            config
        }
        Err(e) => {
            error!("Failed to load configuration: {}", e);
            return Err(e.into());
        }
    };

    if args.validate_config {
        match config.validate() {
            Ok(()) => {
                info!("Configuration validation successful");
                println!("✓ Configuration is valid");
                return Ok(());
            }
            Err(e) => {
                error!("Configuration validation failed: {}", e);
                eprintln!("✗ Configuration validation failed: {}", e);
                std::process::exit(1);
            }
        }
    }

    let decoded = run(&args, config).await?;
    info!("Scancam exiting after {} decoded result(s)", decoded);
    Ok(())
}

async fn run(args: &Args, config: ScanConfig) -> Result<u64> {
    let provider = build_provider(args)?.with_auto_focus_result(true);
    let decoder = build_decoder(&config)?;

    // portrait phone screen; the overlay covers all of it
    let (screen_w, screen_h) = (1080, 1920);
    let display = Arc::new(StaticDisplay::new(
        DisplayRotation::Rotation0,
        screen_w,
        screen_h,
    ));
    let overlay = Arc::new(scancam::ScanWindowOverlay::with_size(
        config.scan_window.clone(),
        screen_w,
        screen_h,
    ));

    let rescan_delay = config.system.rescan_delay();
    let controller = SessionControllerBuilder::new()
        .provider(Arc::new(provider.clone()))
        .decoder(decoder)
        .overlay(overlay)
        .display(display)
        .config(config)
        .build()
        .context("Failed to build session controller")?;

    let shutdown = CancellationToken::new();
    {
        let shutdown = shutdown.clone();
        tokio::spawn(async move {
            match tokio::signal::ctrl_c().await {
                Ok(()) => {
                    info!("Received Ctrl+C, shutting down");
                    shutdown.cancel();
                }
                Err(e) => warn!("Failed to listen for Ctrl+C: {}", e),
            }
        });
    }

    let mut events = controller.subscribe();
    controller.surface_created(screen_w, screen_h);
    controller.start()?;
    let session = controller.wait_opened().await?;
    info!("Session {} open", session);

    let mut ticker = tokio::time::interval(FRAME_INTERVAL);
    let mut delivered = 0u64;
    let mut decoded = 0u64;

    'scan: loop {
        tokio::select! {
            _ = shutdown.cancelled() => break 'scan,
            _ = ticker.tick() => {
                if args.frames.is_some_and(|max| delivered >= max) {
                    info!("Delivered {} frames, stopping", delivered);
                    break 'scan;
                }
                if provider.deliver_still_frame() {
                    delivered += 1;
                }
            }
            event = events.recv() => match event {
                Ok(ScanEvent::Decoded { result }) => {
                    decoded += 1;
                    println!("{}\t{}", result.format, result.contents);
                    if args.once {
                        break 'scan;
                    }
                    tokio::select! {
                        _ = shutdown.cancelled() => break 'scan,
                        _ = tokio::time::sleep(rescan_delay) => {}
                    }
                    controller.request_next_frame();
                }
                Ok(ScanEvent::PreviewFailed { details, .. }) => {
                    error!("Preview failed: {}", details);
                    break 'scan;
                }
                Ok(event) => debug!("{}", event.description()),
                Err(RecvError::Lagged(skipped)) => warn!("Event receiver lagged, skipped {} events", skipped),
                Err(RecvError::Closed) => break 'scan,
            }
        }
    }

    controller.stop().await?;
    info!("Delivered {} frames, decoded {}", delivered, decoded);
    Ok(decoded)
}

fn build_provider(args: &Args) -> Result<MockCameraProvider> {
    let provider = MockCameraProvider::single_back_camera();
    match &args.image {
        Some(path) => {
            let (width, height, luma) = load_still(path)?;
            info!("Serving {} ({}x{}) as preview frames", path.display(), width, height);
            Ok(provider.with_still_frame(width, height, luma))
        }
        None => Ok(provider),
    }
}

#[cfg(feature = "qr")]
fn load_still(path: &std::path::Path) -> Result<(u32, u32, Vec<u8>)> {
    let image = image::open(path)
        .with_context(|| format!("Failed to open image {}", path.display()))?
        .to_luma8();
    let (width, height) = image.dimensions();
    Ok((width, height, image.into_raw()))
}

#[cfg(not(feature = "qr"))]
fn load_still(path: &std::path::Path) -> Result<(u32, u32, Vec<u8>)> {
    anyhow::bail!("Cannot load {}: built without image support", path.display())
}

#[cfg(feature = "qr")]
fn build_decoder(config: &ScanConfig) -> Result<Arc<dyn Decoder>> {
    Ok(Arc::new(scancam::QrDecoder::new(config.decoder.clone())))
}

#[cfg(not(feature = "qr"))]
fn build_decoder(_config: &ScanConfig) -> Result<Arc<dyn Decoder>> {
    anyhow::bail!("Built without a decoder backend; enable the `qr` feature")
}

fn init_logging(args: &Args) -> Result<()> {
    use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

    let log_level = if args.debug {
        "debug"
    } else if args.verbose {
        "info"
    } else if args.quiet {
        "error"
    } else {
        "warn"
    };

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("scancam={}", log_level)));

    let fmt_layer = match args.log_format.as_deref() {
        Some("json") => fmt::layer()
            .json()
            .with_target(true)
            .with_thread_names(true)
            .with_file(true)
            .with_line_number(true)
            .boxed(),
        Some("compact") => fmt::layer()
            .compact()
            .with_target(false)
            .with_thread_names(false)
            .boxed(),
        Some("pretty") | None => fmt::layer()
            .pretty()
            .with_target(true)
            .with_thread_names(args.debug)
            .with_file(args.debug)
            .with_line_number(args.debug)
            .boxed(),
        Some(format) => {
            eprintln!("Warning: Unknown log format '{}', using default", format);
            fmt::layer()
                .with_target(true)
                .with_thread_names(args.debug)
                .boxed()
        }
    };

    tracing_subscriber::registry()
        .with(fmt_layer)
        .with(env_filter)
        .try_init()
        .context("Failed to initialize logging")?;

    Ok(())
}

/// Print default configuration in TOML format
fn print_default_config() -> Result<()> {
    println!("# Scancam Configuration File");
    println!("# Every key can be overridden with SCANCAM_<SECTION>__<KEY>");
    println!();
    println!("{}", ScanConfig::default().to_toml()?);
    Ok(())
}
