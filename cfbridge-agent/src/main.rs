use anyhow::{Context, Result};
use cfbridge_agent::{
    config_utils::{
        apply_env_overrides, determine_config_path, load_or_default, load_settings, require_file,
    },
    status::{default_settings_model, set_status_banner},
    watch, Engine, Session, StatusReport,
};
use cfbridge_common::{
    config::{load_bridge_config, save_config, BridgeConfig, LoggingConfig},
    config_utils::{create_default_bridge_config, init_config},
    defaults,
};
use cfbridge_mount::CloudfuseManager;
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, error, info};
use tracing_appender::{non_blocking, non_blocking::WorkerGuard, rolling};
use tracing_subscriber::{
    fmt,
    layer::{Layer, SubscriberExt},
    util::SubscriberInitExt,
    EnvFilter,
};

/// cloudfuse-bridge - Mounts an S3-compatible bucket through cloudfuse
#[derive(Parser)]
#[command(name = "cfbridge")]
#[command(about = "Mount cloud storage for video offload via cloudfuse")]
#[command(version = env!("CARGO_PKG_VERSION"))]
struct Cli {
    /// Configuration file path
    #[arg(short, long, value_name = "FILE", global = true)]
    config: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, value_name = "LEVEL", global = true)]
    log_level: Option<String>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Generate a default configuration file
    GenerateConfig {
        /// Output file path
        #[arg(short, long, value_name = "FILE")]
        output: Option<PathBuf>,

        /// Force overwrite existing file
        #[arg(short, long)]
        force: bool,
    },
    /// Validate configuration file
    ValidateConfig,
    /// Show paths, installation and mount state
    Status,
    /// Mount once with the given settings and leave the mount in place
    Mount {
        /// Settings file (TOML)
        #[arg(short, long, value_name = "FILE")]
        settings: Option<PathBuf>,
    },
    /// Unmount the bucket
    Unmount,
    /// Keep the mount in line with the settings file until interrupted
    Run {
        /// Settings file (TOML)
        #[arg(short, long, value_name = "FILE")]
        settings: Option<PathBuf>,

        /// Seconds between settings checks
        #[arg(long, value_name = "SECS", default_value_t = 30)]
        interval_secs: u64,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let config_path = determine_config_path(cli.config.clone());

    match &cli.command {
        Commands::GenerateConfig { output, force } => {
            return generate_config_file(output.clone(), *force);
        }
        Commands::ValidateConfig => return validate_config_file(&config_path),
        _ => {}
    }

    let config = load_and_merge_config(&config_path, &cli);
    config.validate().context("Invalid configuration")?;
    let _guard = initialize_logging(&config.logging)?;

    info!("Starting cfbridge v{}", env!("CARGO_PKG_VERSION"));
    debug!("Configuration loaded from: {}", config_path.display());
    log_config_summary(&config);

    match cli.command {
        Commands::Status => show_status(&config),
        Commands::Mount { settings } => mount_once(&config, &settings_path(settings)),
        Commands::Unmount => unmount(&config),
        Commands::Run {
            settings,
            interval_secs,
        } => {
            let runtime = tokio::runtime::Runtime::new().context("Failed to start runtime")?;
            runtime.block_on(run_watch(
                config,
                settings_path(settings),
                Duration::from_secs(interval_secs.max(1)),
            ))
        }
        Commands::GenerateConfig { .. } | Commands::ValidateConfig => Ok(()),
    }
}

fn settings_path(cli_path: Option<PathBuf>) -> PathBuf {
    cli_path.unwrap_or_else(defaults::settings_path)
}

/// Load configuration and merge with CLI and environment overrides
fn load_and_merge_config(config_path: &Path, cli: &Cli) -> BridgeConfig {
    let mut config = load_or_default(config_path);
    apply_env_overrides(&mut config);

    if let Some(log_level) = &cli.log_level {
        config.logging.level = log_level.clone();
    }
    if cli.verbose {
        config.logging.level = "debug".to_string();
    }
    config
}

/// Initialize logging. The returned guard flushes the log file when dropped.
fn initialize_logging(logging: &LoggingConfig) -> Result<Option<WorkerGuard>> {
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&logging.level))
        .context("Invalid log level")?;

    let subscriber = tracing_subscriber::registry().with(env_filter);
    let json = logging.format == "json";

    match &logging.file {
        Some(log_file) => {
            let directory = log_file
                .parent()
                .map(Path::to_path_buf)
                .unwrap_or_else(|| PathBuf::from("."));
            std::fs::create_dir_all(&directory).with_context(|| {
                format!("Failed to create log directory {}", directory.display())
            })?;
            let file_name = log_file
                .file_name()
                .map(|name| name.to_os_string())
                .unwrap_or_else(|| "cfbridge.log".into());

            let (writer, guard) = non_blocking(rolling::daily(directory, file_name));
            let fmt_layer = if json {
                fmt::layer().with_writer(writer).json().boxed()
            } else {
                fmt::layer().with_writer(writer).with_ansi(false).boxed()
            };
            subscriber.with(fmt_layer).init();
            Ok(Some(guard))
        }
        None => {
            let fmt_layer = if json {
                fmt::layer().json().boxed()
            } else {
                fmt::layer().boxed()
            };
            subscriber.with(fmt_layer).init();
            Ok(None)
        }
    }
}

/// Log configuration summary
fn log_config_summary(config: &BridgeConfig) {
    info!("cloudfuse: {}", config.tool.executable.display());
    info!("Mount directory: {}", config.target.mount_dir.display());
    info!("File cache: {}", config.target.file_cache_dir.display());
    debug!("Config file: {}", config.target.config_file.display());
    debug!("Template file: {}", config.target.template_file.display());
    debug!(
        "Poll: {} attempts every {}ms",
        config.poll.max_attempts, config.poll.interval_ms
    );
    debug!("Log level: {}", config.logging.level);
}

/// Generate a default configuration file
fn generate_config_file(output: Option<PathBuf>, force: bool) -> Result<()> {
    let output_path = output.unwrap_or_else(defaults::bridge_config_path);

    if force {
        save_config(&create_default_bridge_config(), &output_path)?;
    } else if !init_config(&output_path)? {
        anyhow::bail!(
            "Configuration file already exists: {}. Use --force to overwrite.",
            output_path.display()
        );
    }

    println!("Generated default configuration file: {}", output_path.display());
    println!();
    println!("Review the [target] paths and the [bucket] defaults, then put the bucket");
    println!("credentials in a settings file:");
    println!("  keyId = \"...\"");
    println!("  secretKey = \"...\"");
    println!("  bucketName = \"\"");
    println!();
    Ok(())
}

/// Validate a configuration file
fn validate_config_file(config_path: &Path) -> Result<()> {
    require_file(config_path, "Configuration file")?;

    let config = load_bridge_config(config_path)
        .with_context(|| format!("Configuration is invalid: {}", config_path.display()))?;

    println!("Configuration file is valid: {}", config_path.display());
    println!();
    println!("Configuration summary:");
    println!("  cloudfuse: {}", config.tool.executable.display());
    println!("  Mount directory: {}", config.target.mount_dir.display());
    println!("  File cache: {}", config.target.file_cache_dir.display());
    println!(
        "  Poll: {} attempts every {}ms",
        config.poll.max_attempts, config.poll.interval_ms
    );
    Ok(())
}

fn show_status(config: &BridgeConfig) -> Result<()> {
    let manager = CloudfuseManager::new(config);
    let mounted = manager.is_mounted();

    println!("cloudfuse installed: {}", manager.is_installed());
    println!("Mount directory: {}", manager.mount_dir().display());
    println!("File cache: {}", manager.file_cache_dir().display());
    println!(
        "Config file: {} ({})",
        manager.config_file().display(),
        if manager.config_file().exists() { "present" } else { "missing" }
    );
    println!("Template file: {}", manager.template_file().display());
    print_report(config, &StatusReport::from_mounted(mounted))
}

fn mount_once(config: &BridgeConfig, settings_path: &Path) -> Result<()> {
    require_file(settings_path, "Settings file")?;
    let settings = load_settings(settings_path)?;

    let mut engine = Engine::new(config);
    let mut session = Session::new();
    let report = engine.reconcile(&mut session, settings);
    print_report(config, &report)?;

    if report.is_connected() {
        engine.detach();
        Ok(())
    } else {
        drop(engine);
        anyhow::bail!(report
            .message
            .unwrap_or_else(|| "Cloud storage connection failed".to_string()))
    }
}

fn unmount(config: &BridgeConfig) -> Result<()> {
    let mut manager = CloudfuseManager::new(config);
    let result = manager.unmount()?;
    if result.success() {
        println!("Unmounted {}", manager.mount_dir().display());
        Ok(())
    } else {
        anyhow::bail!(
            "Failed to unmount {}: {}",
            manager.mount_dir().display(),
            result.output.trim()
        )
    }
}

/// Print the report together with the settings model carrying its banner
fn print_report(config: &BridgeConfig, report: &StatusReport) -> Result<()> {
    let mut model = default_settings_model(&config.bucket);
    set_status_banner(&mut model, report.banner());

    let output = serde_json::json!({
        "report": report,
        "model": model,
    });
    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}

async fn run_watch(config: BridgeConfig, settings_path: PathBuf, interval: Duration) -> Result<()> {
    info!(
        "Watching {} every {}s",
        settings_path.display(),
        interval.as_secs()
    );

    let interrupted = async {
        match tokio::signal::ctrl_c().await {
            Ok(()) => info!("Interrupted, shutting down"),
            Err(e) => error!("Failed to listen for Ctrl+C: {}, shutting down", e),
        }
    };
    watch(
        Engine::new(&config),
        move || load_settings(&settings_path),
        interval,
        interrupted,
    )
    .await?;

    info!("cfbridge shutdown complete");
    Ok(())
}
