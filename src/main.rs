//! phoenix-preview - live preview pipeline for the editor.

#![allow(dead_code)]

mod broker;
mod cli;
mod config;
mod core;
mod logger;
mod protocol;
mod resolver;
mod serve;
mod tracker;
mod transport;
mod utils;

use std::sync::Arc;

use anyhow::Result;
use clap::{ColorChoice, Parser};
use cli::{Cli, Commands};
use config::{PreviewConfig, init_config};

fn main() -> Result<()> {
    // Setup global Ctrl+C handler (before any blocking operations)
    core::setup_shutdown_handler()?;

    let cli = Cli::parse();

    // Set global color override based on CLI option
    match cli.color {
        ColorChoice::Always => owo_colors::set_override(true),
        ColorChoice::Never => owo_colors::set_override(false),
        ColorChoice::Auto => {} // owo-colors auto-detects TTY
    }
    logger::set_verbose(cli.verbose);

    let config = init_config(PreviewConfig::load(&cli)?);

    match &cli.command {
        Commands::Serve { .. } => cli::serve::run_serve(Arc::clone(&config)),
    }
}
