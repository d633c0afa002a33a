// src/main.rs

//! The main entry point for the RelayChat server and console client.

use anyhow::{Context, Result, anyhow};
use relaychat::client::{self, ClientConfig};
use relaychat::config::Config;
use relaychat::server;
use std::env;
use std::io::Write;
use tracing::error;
use tracing_subscriber::{filter::EnvFilter, prelude::*};

const VERSION: &str = env!("CARGO_PKG_VERSION");

#[tokio::main]
async fn main() -> Result<()> {
    let args: Vec<String> = env::args().collect();

    if args.contains(&"--version".to_string()) {
        println!("RelayChat version {VERSION}");
        return Ok(());
    }

    if args.iter().any(|arg| arg == "--client") {
        run_client(&args).await
    } else {
        run_server(&args).await
    }
}

/// Returns the value following `flag`, or exits if the flag is given without one.
fn flag_value<'a>(args: &'a [String], flag: &str) -> Option<&'a str> {
    let index = args.iter().position(|arg| arg == flag)?;
    match args.get(index + 1) {
        Some(value) => Some(value.as_str()),
        None => {
            eprintln!("{flag} flag requires a value");
            std::process::exit(1);
        }
    }
}

fn parse_port(args: &[String]) -> Option<u16> {
    let port_str = flag_value(args, "--port")?;
    match port_str.parse::<u16>() {
        Ok(port) => Some(port),
        Err(_) => {
            eprintln!("Invalid port number: {port_str}");
            std::process::exit(1);
        }
    }
}

fn init_logging(default_level: &str) {
    let level = env::var("RUST_LOG").unwrap_or_else(|_| default_level.to_string());
    tracing_subscriber::registry()
        .with(EnvFilter::new(level))
        .with(
            tracing_subscriber::fmt::layer()
                .compact()
                .with_ansi(true)
                .with_writer(std::io::stderr),
        )
        .init();
}

async fn run_server(args: &[String]) -> Result<()> {
    let config_path = flag_value(args, "--config").unwrap_or("config.toml");
    let mut config = match Config::from_file_or_default(config_path) {
        Ok(cfg) => cfg,
        Err(e) => {
            eprintln!("Failed to load configuration from \"{config_path}\": {e:#}");
            std::process::exit(1);
        }
    };
    if let Some(port) = parse_port(args) {
        config.port = port;
    }
    if let Err(e) = config.validate() {
        eprintln!("Invalid configuration: {e}");
        std::process::exit(1);
    }

    init_logging(&config.log_level);

    if let Err(e) = server::run(config).await {
        error!("Server runtime error: {}", e);
        return Err(e);
    }
    Ok(())
}

async fn run_client(args: &[String]) -> Result<()> {
    // Log output shares the terminal with the chat, so stay quiet by default.
    init_logging("warn");

    let mut config = ClientConfig::default();
    if let Some(host) = flag_value(args, "--host") {
        config.host = host.to_string();
    }
    if let Some(port) = parse_port(args) {
        config.port = port;
    }
    config.screen_name = match flag_value(args, "--name") {
        Some(name) => name.to_string(),
        None => prompt_screen_name().await?,
    };
    if config.screen_name.is_empty() {
        return Err(anyhow!("Screen name cannot be empty"));
    }

    // Console stdin is read on a blocking thread that cannot be cancelled, so
    // the runtime would otherwise wait for one more line before exiting.
    let code = match client::run(config).await {
        Ok(_) => 0,
        Err(e) => {
            eprintln!("{e:#}");
            1
        }
    };
    std::process::exit(code);
}

async fn prompt_screen_name() -> Result<String> {
    tokio::task::spawn_blocking(|| -> Result<String> {
        print!("Enter your screen name: ");
        std::io::stdout().flush()?;
        let mut line = String::new();
        std::io::stdin()
            .read_line(&mut line)
            .context("Failed to read screen name")?;
        Ok(line.trim().to_string())
    })
    .await?
}
