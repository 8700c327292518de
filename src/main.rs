// src/main.rs

use anyhow::Result;
use clap::Parser;
#[cfg(feature = "web")]
use repodigest::cli::Command;
use repodigest::cli::{Cli, IngestArgs};
use repodigest::config::{IngestConfig, IngestOptions};
use repodigest::errors::Error;
use repodigest::output::{write_document, OutputDestination};
#[cfg(feature = "progress")]
use repodigest::progress::IndicatifProgress;
use repodigest::progress::{channel, drive, ProgressReporter};
use std::path::PathBuf;
use std::sync::Arc;

#[cfg(feature = "web")]
use repodigest::web;

fn main() -> Result<()> {
    // Initialize logging. Default to 'info' if RUST_LOG is not set.
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env().add_directive(
                if cfg!(debug_assertions) {
                    "repodigest=debug".parse()?
                } else {
                    "repodigest=info".parse()?
                },
            ),
        )
        .init();

    log::info!("Starting repodigest v{}...", env!("CARGO_PKG_VERSION"));

    // Panic messages may carry URLs; keep only the message.
    std::panic::set_hook(Box::new(|info| {
        let msg = match info.payload().downcast_ref::<&str>() {
            Some(s) => *s,
            None => "Box<Any>",
        };
        eprintln!(
            "Application Error: {}",
            msg.replace(env!("CARGO_MANIFEST_DIR"), "<redacted>")
        );
    }));

    let cli = Cli::parse();
    let rt = tokio::runtime::Runtime::new()?;

    // --- Handle Subcommands (Web Server) ---
    #[cfg(feature = "web")]
    if let Some(Command::Serve { port }) = &cli.command {
        return rt.block_on(web::start_server(*port));
    }

    // --- Configuration & Execution ---
    let code = match rt.block_on(run(&cli.ingest)) {
        Ok(()) => 0,
        Err(e) => {
            eprintln!("Error: {}", e);
            match e {
                Error::InvalidReference(_) => 2,
                _ => 1,
            }
        }
    };
    drop(rt);
    std::process::exit(code);
}

async fn run(args: &IngestArgs) -> repodigest::errors::Result<()> {
    let config = IngestConfig::try_from(args)?;
    let options = IngestOptions::try_from(args)?;
    log::debug!("Configuration built successfully: {:?}", config);
    let reference = args.reference.as_deref().unwrap_or_default();

    let (progress, reporter_task) = match progress_reporter(args.no_progress) {
        Some(reporter) => {
            let (progress, events) = channel();
            (Some(progress), Some(tokio::spawn(drive(events, reporter))))
        }
        None => (None, None),
    };

    let result = repodigest::ingest_with_timeout(reference, &options, &config, progress).await;
    // The sender was moved into the pipeline and is gone now, so the bar finishes.
    if let Some(task) = reporter_task {
        let _ = task.await;
    }
    let result = result?;

    let destination = match &args.output_file {
        Some(path) => OutputDestination::File(PathBuf::from(path)),
        None => OutputDestination::Stdout,
    };
    write_document(&result, &destination)
}

/// A progress bar on stderr when it is a terminal and not disabled.
fn progress_reporter(disabled: bool) -> Option<Arc<dyn ProgressReporter>> {
    if disabled {
        return None;
    }
    #[cfg(feature = "progress")]
    {
        if atty::is(atty::Stream::Stderr) {
            return Some(Arc::new(IndicatifProgress::new()));
        }
    }
    None
}
