use anyhow::Result;
use clap::Parser;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info};
use uvccam::{
    FaultPlan, HostScript, SimulatedCameraBuilder, SimulatedUsb, StreamInterface, UvcCamConfig,
    UvcCamOrchestrator,
};

#[derive(Parser, Debug)]
#[command(name = "uvccam")]
#[command(about = "Camera to USB video class bridge")]
#[command(version)]
#[command(long_about = "Captures JPEG frames from a parallel-bus camera and streams them to a \
USB host as a UVC webcam. This binary runs the full pipeline against a simulated camera \
and a simulated USB host.")]
struct Args {
    /// Path to configuration file
    #[arg(short, long, default_value = "uvccam.toml", help = "Path to TOML configuration file")]
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

    /// Validate configuration and exit
    #[arg(long, help = "Validate configuration file and exit without starting the pipeline")]
    validate_config: bool,

    /// Print default configuration and exit
    #[arg(long, help = "Print default configuration in TOML format and exit")]
    print_config: bool,

    /// Dry run mode - initialize but don't start components
    #[arg(long, help = "Perform dry run - initialize components but don't start them")]
    dry_run: bool,

    /// Override log format (json, pretty, compact)
    #[arg(long, value_name = "FORMAT", help = "Log output format: json, pretty, or compact")]
    log_format: Option<String>,

    /// Simulated sensor exposure time per frame
    #[arg(long, default_value_t = 33, value_name = "MS")]
    sim_frame_ms: u64,

    /// Make every n-th simulated capture time out
    #[arg(long, value_name = "N")]
    sim_drop_every: Option<u64>,

    /// Corrupt the start marker of every n-th simulated frame
    #[arg(long, value_name = "N")]
    sim_corrupt_every: Option<u64>,

    /// Delay before the simulated host commits the stream
    #[arg(long, default_value_t = 500, value_name = "MS")]
    sim_commit_ms: u64,

    /// Close the simulated stream after this long, then reopen it
    #[arg(long, value_name = "MS")]
    sim_stream_ms: Option<u64>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Handle special modes that don't require full initialization
    if args.print_config {
        print_default_config()?;
        return Ok(());
    }

    init_logging(&args)?;

    info!("Starting uvccam v{}", env!("CARGO_PKG_VERSION"));
    info!("Configuration file: {}", args.config);

    let config = match UvcCamConfig::load_from_file(&args.config) {
        Ok(config) => config,
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

    let camera = SimulatedCameraBuilder::new()
        .frame_interval(Duration::from_millis(args.sim_frame_ms))
        .faults(FaultPlan {
            drop_every: args.sim_drop_every,
            corrupt_every: args.sim_corrupt_every,
            failed_inits: 0,
        })
        .build();

    let interface = StreamInterface {
        control: config.stream.control_interface,
        streaming: config.stream.streaming_interface,
    };
    let usb = SimulatedUsb::new(
        interface,
        HostScript {
            commit_after: Duration::from_millis(args.sim_commit_ms),
            stream_for: args.sim_stream_ms.map(Duration::from_millis),
            ..HostScript::default()
        },
    );

    let mut orchestrator = UvcCamOrchestrator::new(config, Arc::new(camera), Arc::new(usb))
        .map_err(|e| {
            error!("Failed to create orchestrator: {}", e);
            e
        })?;

    orchestrator.initialize().await.map_err(|e| {
        error!("Failed to initialize system: {}", e);
        e
    })?;

    if args.dry_run {
        info!("Dry run mode - components initialized but not started");
        println!("✓ Dry run completed successfully - all components initialized");
        return Ok(());
    }

    orchestrator.start().await.map_err(|e| {
        error!("Failed to start system: {}", e);
        e
    })?;

    let exit_code = orchestrator.run().await.map_err(|e| {
        error!("System error during execution: {}", e);
        e
    })?;

    info!("uvccam exited with code: {}", exit_code);
    std::process::exit(exit_code);
}

fn init_logging(args: &Args) -> Result<()> {
    use tracing_subscriber::{
        fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer,
    };

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
        .unwrap_or_else(|_| EnvFilter::new(format!("uvccam={}", log_level)));

    let fmt_layer = match args.log_format.as_deref() {
        Some("json") => fmt::layer()
            .json()
            .with_target(true)
            .with_thread_ids(true)
            .with_file(true)
            .with_line_number(true)
            .boxed(),
        Some("compact") => fmt::layer()
            .compact()
            .with_target(false)
            .with_thread_ids(false)
            .with_file(false)
            .with_line_number(false)
            .boxed(),
        Some("pretty") | None => fmt::layer()
            .pretty()
            .with_target(true)
            .with_thread_ids(args.debug)
            .with_file(args.debug)
            .with_line_number(args.debug)
            .boxed(),
        Some(format) => {
            eprintln!("Warning: Unknown log format '{}', using default", format);
            fmt::layer()
                .with_target(true)
                .with_thread_ids(args.debug)
                .with_file(args.debug)
                .with_line_number(args.debug)
                .boxed()
        }
    };

    tracing_subscriber::registry()
        .with(fmt_layer)
        .with(env_filter)
        .init();

    Ok(())
}

/// Print default configuration in TOML format
fn print_default_config() -> Result<()> {
    println!("# uvccam configuration file");
    println!("# Every key is optional; missing keys take the values below.");
    println!("# Environment overrides use UVCCAM_<SECTION>__<KEY>, e.g. UVCCAM_CAPTURE__ERROR_THRESHOLD=5");
    println!();
    println!("{}", UvcCamConfig::default().to_toml()?);
    Ok(())
}
