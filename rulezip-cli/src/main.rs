/*!
  Binary for the CLI of rulezip: rzp
*/

#![deny(
    missing_debug_implementations,
    missing_copy_implementations,
    trivial_casts,
    trivial_numeric_casts
)]
#![warn(
    missing_docs,
    unused_import_braces,
    unused_qualifications,
    unused_extern_crates,
    variant_size_differences
)]

pub mod cli;
pub mod error;

use std::path::PathBuf;
use std::time::{Duration, Instant};

use clap::Parser;
use cli::CliApp;
use colored::Colorize;
use error::CliError;

use rulezip::compress::{CompressionResult, Compressor};
use rulezip::kb::loader::load_directory;
use rulezip::kb::KnowledgeBase;
use rulezip::mining::StopFlag;
use rulezip::recovery::validate;

/// How often the stop file is polled.
const STOP_FILE_POLL_INTERVAL: Duration = Duration::from_millis(500);

fn watch_stop_file(path: PathBuf, stop: StopFlag) {
    std::thread::spawn(move || loop {
        if path.exists() {
            log::info!("stop file {} found, interrupting", path.display());
            stop.stop();
            return;
        }
        std::thread::sleep(STOP_FILE_POLL_INTERVAL);
    });
}

fn print_finished_message(result: &CompressionResult, kb: &KnowledgeBase, elapsed: Duration) {
    println!(
        "Compression completed in {}{}. Mined {} rules.",
        elapsed.as_millis().to_string().green().bold(),
        "ms".green().bold(),
        result.rules.len().to_string().green().bold(),
    );

    println!(
        "   {0: <17} {1} of {2}",
        "Necessary facts:",
        result.necessary.len(),
        kb.fact_count()
    );
    println!(
        "   {0: <17} {1}",
        "Counterexamples:",
        result.counterexamples.len()
    );
}

fn run(cli: CliApp) -> Result<(), CliError> {
    let started = Instant::now();

    log::info!("Loading relations ...");
    let mut kb = load_directory(&cli.input)?;
    let original = cli.validate.then(|| kb.clone());

    let stop = StopFlag::new();
    if let Some(path) = &cli.stop_file {
        watch_stop_file(path.clone(), stop.clone());
    }

    log::info!("Compressing ...");
    let compressor = Compressor::new(cli.mining_config(), stop);
    let result = compressor.compress(&mut kb)?;

    let report = serde_json::to_string_pretty(&result.report(&kb))?;
    match &cli.output {
        Some(path) => {
            std::fs::write(path, report).map_err(|error| CliError::OutputWriting {
                error,
                filename: path.clone(),
            })?;
        }
        None => println!("{report}"),
    }

    print_finished_message(&result, &kb, started.elapsed());

    if let Some(original) = original {
        log::info!("Checking recovery ...");
        if !validate(&original, &result)? {
            return Err(CliError::ValidationFailed);
        }
        println!("{}", "Recovery check passed.".green().bold());
    }

    Ok(())
}

fn main() {
    let cli = CliApp::parse();

    cli.logging.initialize_logging();
    log::info!("Version: {}", clap::crate_version!());
    log::debug!("Input directory: {:?}", cli.input);

    run(cli).unwrap_or_else(|err| {
        log::error!("{} {err}", "error:".red().bold());
        std::process::exit(1)
    })
}
