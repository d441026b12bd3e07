mod commands;
mod config;
mod db;
mod error;
mod handlers;
mod models;
mod repair;
mod service;
mod tasks;
mod validation;
mod voting;

use clap::Parser;
use commands::Cli;
use config::AppConfig;
use log::error;

#[tokio::main]
async fn main() {
    // Initialize logging
    dotenvy::dotenv().ok();
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();
    let config = AppConfig::from_env();

    if let Err(e) = commands::run(cli, config).await {
        error!("{}", e);
        std::process::exit(1);
    }
}
