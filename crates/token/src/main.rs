// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use clap::Parser;
use tracing::{debug, error};

use strava_token::config::{self, Config};

#[tokio::main]
async fn main() {
    // First pass only locates the env file; the second sees what it loaded.
    let env_file = Config::parse().env_file;
    let loaded = match config::load_env_file(&env_file) {
        Ok(loaded) => loaded,
        Err(e) => {
            eprintln!("error: {e:#}");
            std::process::exit(2);
        }
    };
    let config = Config::parse();

    if let Err(e) = config.validate() {
        eprintln!("error: {e}");
        std::process::exit(2);
    }

    init_tracing(&config);
    debug!(path = %config.env_file.display(), loaded, "env file");

    if let Err(e) = strava_token::run(&config).await {
        error!(kind = e.as_str(), "fatal: {e}");
        println!("❌ {e}");
        if !config.always_exit_zero {
            std::process::exit(e.exit_code());
        }
    }
}

fn init_tracing(config: &Config) {
    use tracing_subscriber::fmt;
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_new(&config.log_level).unwrap_or_else(|_| EnvFilter::new("warn"));

    // Stdout carries the user-facing progress lines; logs go to stderr.
    match config.log_format.as_str() {
        "json" => {
            fmt::fmt().with_env_filter(filter).with_writer(std::io::stderr).json().init();
        }
        _ => {
            fmt::fmt().with_env_filter(filter).with_writer(std::io::stderr).init();
        }
    }
}
