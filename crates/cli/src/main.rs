mod commands;

use std::{
    fs::{self, OpenOptions},
    path::Path,
    sync::Mutex,
};

use anyhow::{Context, Result};
use clap::Parser;
use rental_core::{
    config::{self, AppConfig},
    Registry, Stores,
};
use tracing_subscriber::{prelude::*, EnvFilter};

use crate::commands::Cli;

fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut config = AppConfig::load()?;
    if let Some(data_dir) = cli.data_dir.clone() {
        config = config.with_data_dir(data_dir);
    }

    init_logging(&config.data_dir, cli.verbose)?;
    config::ensure_default_config()?;

    // The one registry for this process; commands borrow it.
    let (registry, report) = Registry::open(Stores::from_config(&config))?;
    if report.skipped() > 0 {
        tracing::warn!(
            "{} malformed line(s) were skipped while loading {}",
            report.skipped(),
            config.data_dir.display()
        );
    }

    commands::run(cli.command, &registry)
}

fn init_logging(data_dir: &Path, verbose: bool) -> Result<()> {
    let log_dir = data_dir.join("logs");
    fs::create_dir_all(&log_dir)
        .with_context(|| format!("failed to create {}", log_dir.display()))?;
    let log_path = log_dir.join("rental.log");
    let log_file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(&log_path)
        .with_context(|| format!("failed to open {}", log_path.display()))?;

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_level(verbose)));

    let stderr_layer = tracing_subscriber::fmt::layer()
        .with_target(false)
        .compact()
        .with_writer(std::io::stderr);

    let file_layer = tracing_subscriber::fmt::layer()
        .with_target(true)
        .with_ansi(false)
        .compact()
        .with_writer(Mutex::new(log_file));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(stderr_layer)
        .with(file_layer)
        .init();

    Ok(())
}

/// Filter used when `RUST_LOG` is unset.
fn default_level(verbose: bool) -> &'static str {
    if verbose {
        "debug"
    } else {
        "info"
    }
}

#[cfg(test)]
mod tests {
    use tracing::level_filters::LevelFilter;

    use super::*;

    #[test]
    fn load_summary_is_visible_by_default() {
        assert_eq!(default_level(false), "info");
        assert_eq!(default_level(true), "debug");
        let filter = EnvFilter::new(default_level(false));
        assert_eq!(filter.max_level_hint(), Some(LevelFilter::INFO));
    }
}
