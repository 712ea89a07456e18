mod cli;
mod dispense;
mod error_fmt;
mod hw;

use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use clap::Parser;
use eyre::WrapErr;
use serde_json::json;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

use crate::cli::{Cli, Commands, DEFAULT_CONFIG, FILE_GUARD, JSON_MODE, json_mode};
use crate::dispense::{DispenseOpts, Verification};
use crate::error_fmt::{exit_code_for_error, format_error_json, humanize};

fn main() {
    let cli = Cli::parse();
    let _ = JSON_MODE.set(cli.json);

    if let Err(e) = color_eyre::install() {
        eprintln!("failed to install error hooks: {e}");
    }

    if let Err(err) = run(cli) {
        if json_mode() {
            println!("{}", format_error_json(&err));
        } else {
            eprintln!("{}", humanize(&err));
        }
        tracing::error!(error = %err, "command failed");
        std::process::exit(exit_code_for_error(&err));
    }
}

fn load_config(cli: &Cli) -> eyre::Result<pillwheel_config::Config> {
    let mut cfg = match cli.config.as_deref() {
        Some(path) => read_config(path)?,
        None if Path::new(DEFAULT_CONFIG).exists() => read_config(Path::new(DEFAULT_CONFIG))?,
        None => pillwheel_config::Config::default(),
    };

    if let Some(csv) = cli.prescription.as_deref() {
        cfg.hoppers = pillwheel_config::load_prescription_csv(csv)?;
    }
    if let Commands::Dispense {
        max_attempts: Some(n),
        ..
    } = &cli.cmd
    {
        cfg.retry.max_attempts = *n;
    }

    cfg.validate()?;
    Ok(cfg)
}

fn read_config(path: &Path) -> eyre::Result<pillwheel_config::Config> {
    let text = std::fs::read_to_string(path)
        .wrap_err_with(|| format!("read config {}", path.display()))?;
    pillwheel_config::load_toml(&text)
        .map_err(|e| eyre::eyre!("parse TOML config {}: {e}", path.display()))
}

fn init_tracing(json: bool, level: Option<&str>, logging: &pillwheel_config::Logging) {
    use tracing_appender::rolling::{RollingFileAppender, Rotation};

    // RUST_LOG wins over --log-level, which wins over [logging] level.
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(level.or(logging.level.as_deref()).unwrap_or("info"))
    });

    let console_json = json.then(|| {
        fmt::layer()
            .json()
            .with_writer(std::io::stderr)
            .with_target(false)
    });
    let console_pretty = (!json).then(|| {
        fmt::layer()
            .with_writer(std::io::stderr)
            .with_target(false)
            .compact()
    });

    let file_layer = logging.file.as_deref().map(|file| {
        let path = Path::new(file);
        let dir = path
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or_else(|| Path::new("."));
        let name = path
            .file_name()
            .map_or_else(|| "pillwheel.log".into(), |n| n.to_string_lossy().into_owned());
        let rotation = match logging.rotation.as_deref() {
            Some("daily") => Rotation::DAILY,
            Some("hourly") => Rotation::HOURLY,
            _ => Rotation::NEVER,
        };
        let appender = RollingFileAppender::new(rotation, dir, name);
        let (writer, guard) = tracing_appender::non_blocking(appender);
        let _ = FILE_GUARD.set(guard);
        fmt::layer().json().with_ansi(false).with_writer(writer)
    });

    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(console_json)
        .with(console_pretty)
        .with(file_layer)
        .try_init();
}

fn run(cli: Cli) -> eyre::Result<()> {
    let cfg = load_config(&cli)?;
    init_tracing(cli.json, cli.log_level.as_deref(), &cfg.logging);
    tracing::debug!(hoppers = cfg.hoppers.len(), "config loaded");

    let shutdown = Arc::new(AtomicBool::new(false));
    {
        let flag = Arc::clone(&shutdown);
        if let Err(e) = ctrlc::set_handler(move || flag.store(true, Ordering::Relaxed)) {
            tracing::warn!(error = %e, "ctrl-c handler not installed");
        }
    }

    match cli.cmd {
        Commands::Dispense {
            yes,
            reject,
            instant,
            ..
        } => {
            let verification = if yes {
                Verification::Confirm
            } else if reject {
                Verification::Reject
            } else {
                Verification::Prompt
            };
            let opts = DispenseOpts {
                verification,
                instant,
                json: cli.json,
            };
            let hardware = hw::assemble(&cfg);
            dispense::run_dispense(&cfg, opts, hardware, shutdown).map(|_| ())
        }
        Commands::TestServo { hopper } => {
            let hardware = hw::assemble(&cfg);
            dispense::run_test_servo(&cfg, &hopper, hardware, cli.json)
        }
        Commands::SelfCheck => {
            let hardware = hw::assemble(&cfg);
            if cli.json {
                println!(
                    "{}",
                    json!({
                        "servos_ok": hardware.status.servos_ok,
                        "sensor_ok": hardware.status.sensor_ok,
                        "hoppers": cfg.hoppers.len(),
                        "config": "ok",
                    })
                );
            } else {
                println!("{}", hardware.status);
                println!("Config: OK ({} hoppers)", cfg.hoppers.len());
            }
            Ok(())
        }
        Commands::Health => health(&cfg, cli.json),
    }
}

fn health(cfg: &pillwheel_config::Config, json: bool) -> eyre::Result<()> {
    use pillwheel_core::{SamplingCfg, SensorSampler};
    use pillwheel_traits::MonotonicClock;

    let hardware = hw::assemble(cfg);
    let status = hardware.status;
    let mut sampler = SensorSampler::new(
        hardware.sensor,
        Arc::new(MonotonicClock::new()),
        SamplingCfg::from(cfg),
    );
    let sample = sampler.sample_once();
    let degraded = sampler.is_degraded();

    if json {
        println!(
            "{}",
            json!({
                "status": if degraded { "degraded" } else { "ok" },
                "servos_ok": status.servos_ok,
                "sensor_ok": status.sensor_ok,
                "distance_mm": sample.distance_mm,
                "hoppers": cfg.hoppers.len(),
            })
        );
    } else {
        let state = if degraded { "DEGRADED" } else { "OK" };
        println!(
            "Health: {state} | {status} | Distance: {} mm | Hoppers: {}",
            sample.distance_mm,
            cfg.hoppers.len()
        );
    }
    Ok(())
}
