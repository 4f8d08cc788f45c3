mod app;
mod cli;
mod error_fmt;
mod keypad;

use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use clap::Parser;
use eyre::Result;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer, fmt};

use crate::cli::{Cli, Commands, DEFAULT_CONFIG, FILE_GUARD, JSON_MODE};
use crate::error_fmt::{exit_code_for_error, format_error_json, humanize};

fn main() {
    let cli = Cli::parse();
    let _ = JSON_MODE.set(cli.json);
    if let Err(e) = color_eyre::install() {
        eprintln!("failed to install error report handler: {e}");
    }

    if let Err(err) = real_main(cli) {
        if JSON_MODE.get().copied().unwrap_or(false) {
            eprintln!("{}", format_error_json(&err));
        } else {
            eprintln!("{}", humanize(&err));
        }
        tracing::error!(error = %err, "exiting with error");
        std::process::exit(exit_code_for_error(&err));
    }
}

fn real_main(cli: Cli) -> Result<()> {
    let is_default = cli.config == Path::new(DEFAULT_CONFIG);
    let cfg = app::load_config(&cli.config, is_default);
    // Console logging comes up even when the config is broken.
    init_tracing(
        cli.json,
        &cli.log_level,
        cfg.as_ref().ok().map(|c| &c.logging),
    );
    let cfg = cfg?;

    match &cli.cmd {
        Commands::Health => {
            println!(
                "{}",
                serde_json::json!({
                    "status": "ok",
                    "backend": backend_name(),
                    "containers": cfg.containers.len(),
                    "load_cells": app::sensor_count(&cfg),
                    "version": env!("CARGO_PKG_VERSION"),
                })
            );
        }
        Commands::SelfCheck { schedule } => {
            let doses = match schedule {
                Some(path) => Some(
                    app::load_schedule(path)?
                        .iter()
                        .map(|p| p.doses.len())
                        .sum::<usize>(),
                ),
                None => None,
            };
            tracing::info!(backend = backend_name(), "self-check ok");
            if cli.json {
                println!(
                    "{}",
                    serde_json::json!({ "ok": true, "scheduled_doses": doses })
                );
            } else {
                match doses {
                    Some(n) => println!("self-check ok: config and schedule valid ({n} doses)"),
                    None => println!("self-check ok: config valid"),
                }
            }
        }
        Commands::Run(args) => {
            let shutdown = Arc::new(AtomicBool::new(false));
            {
                let flag = shutdown.clone();
                if let Err(e) = ctrlc::set_handler(move || flag.store(true, Ordering::Relaxed)) {
                    tracing::warn!(error = %e, "failed to install Ctrl-C handler");
                }
            }
            let summary = app::run_session(&cfg, args, &shutdown, !cli.json)?;
            if cli.json {
                println!("{}", app::summary_json(&summary));
            } else {
                app::print_summary(&summary);
            }
        }
    }
    Ok(())
}

fn backend_name() -> &'static str {
    if cfg!(feature = "hardware") {
        "hardware"
    } else {
        "sim"
    }
}

/// Console layer (pretty or JSON, on stderr) plus an optional JSON file layer
/// from the `[logging]` section.
fn init_tracing(json: bool, level: &str, logging: Option<&pillbox_config::Logging>) {
    let console_filter =
        || EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    let pretty = (!json).then(|| {
        fmt::layer()
            .with_writer(std::io::stderr)
            .with_target(false)
            .with_filter(console_filter())
    });
    let json_console = json.then(|| {
        fmt::layer()
            .json()
            .with_writer(std::io::stderr)
            .with_filter(console_filter())
    });

    let file = logging.and_then(|l| {
        let path = Path::new(l.file.as_deref()?);
        let dir = path
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or_else(|| Path::new("."));
        let name = path.file_name()?;
        let appender = match l.rotation.as_deref() {
            Some("daily") => tracing_appender::rolling::daily(dir, name),
            Some("hourly") => tracing_appender::rolling::hourly(dir, name),
            _ => tracing_appender::rolling::never(dir, name),
        };
        let (writer, guard) = tracing_appender::non_blocking(appender);
        let _ = FILE_GUARD.set(guard);
        let file_filter = EnvFilter::new(l.level.as_deref().unwrap_or("info"));
        Some(
            fmt::layer()
                .json()
                .with_ansi(false)
                .with_writer(writer)
                .with_filter(file_filter),
        )
    });

    let _ = tracing_subscriber::registry()
        .with(pretty)
        .with(json_console)
        .with(file)
        .try_init();
}
