//! Parses the command line arguments.
//!
//! Basic usage for running the scripted echo scenario with logging on:
//!
//! ```cargo run -- --scenario shell_echo --log```

use chrono;
use clap::Parser;
use std::{
    fs::{create_dir_all, OpenOptions},
    sync::Arc,
};
use tracing_subscriber::FmtSubscriber;

use crate::scenarios;

/// Stores the different command line arguments.
#[derive(Parser)]
struct Args {
    ///Logging flag. Used to turn logging on or off.
    #[arg(short, long)]
    log: bool,
    ///Which scenario to run.
    #[arg(short, long, default_value = "shell_echo")]
    scenario: String,
}

/// Parses command line arguments and allows for quick checking of them.
pub async fn initialize_from_arguments() {
    let cli = Args::parse();
    if cli.log {
        initialize_logging();
    }
    match cli.scenario.as_str() {
        "shell_echo" => scenarios::shell_echo().await,
        "bridge_list" => scenarios::bridge_list().await,
        "bridge_console" => scenarios::bridge_console().await,
        other => eprintln!("Unknown scenario: '{other}'"),
    }
}

/// Initializes logging. Only should be called once when the process starts.
/// Writes JSON events to a timestamped file under ./logs.
fn initialize_logging() {
    let main_path = "./logs";
    create_dir_all(main_path).unwrap();
    let file_path = format!(
        "{}/debug-{}.log",
        main_path,
        chrono::offset::Local::now().format("%y-%m-%d_%H-%M-%S")
    );
    let file = OpenOptions::new()
        .append(true)
        .create(true)
        .open(file_path)
        .unwrap();
    let subscriber = FmtSubscriber::builder()
        .with_writer(Arc::new(file))
        .json()
        .finish();
    tracing::subscriber::set_global_default(subscriber).unwrap()
}
