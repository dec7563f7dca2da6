//! Tubescribe command-line front end
//!
//! Fetches timestamped transcripts for video URLs, lists caption tracks and
//! writes the default configuration.

use anyhow::Result;
use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use serde::Serialize;
use std::path::Path;
use std::process::ExitCode;
use tracing::{Level, error, info};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::{non_blocking, rolling};
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

use tubescribe::cli::{Args, Commands};
use tubescribe::config::Config;
use tubescribe::video::resolve;
use tubescribe::{ErrorKind, Language, TranscriptEngine, TranscriptResult, TubescribeError};

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let args = Args::parse();

    // Setup logging to both console and file; the guard flushes the file writer on return
    let _log_guard = setup_logging(args.verbose)?;

    match args.command {
        Commands::Resolve { reference } => match resolve(&reference) {
            Ok(video_id) => println!("{}", video_id),
            Err(e) => return Ok(failure(&e)),
        },
        Commands::InitConfig { output } => {
            Config::default().save_to_file(&output)?;
            info!("Default configuration written to {}", output.display());
        }
        Commands::Tracks { reference } => {
            let config = Config::load(args.config.as_deref())?;
            let engine = TranscriptEngine::from_config(&config)?;

            match engine.list_tracks(&reference).await {
                Ok(catalog) => {
                    println!("\nCaption tracks for {}:", catalog.video_id());
                    println!("{:<16} {:<10} {:<30} {:<12}", "Origin", "Code", "Name", "Translatable");
                    println!("{}", "-".repeat(70));
                    for track in catalog.tracks() {
                        println!(
                            "{:<16} {:<10} {:<30} {:<12}",
                            track.origin.to_string(),
                            track.language_code,
                            track.language_name,
                            if track.is_translatable { "yes" } else { "no" }
                        );
                    }
                    println!(
                        "\n{} translation languages advertised",
                        catalog.translation_languages().len()
                    );
                }
                Err(e) => return Ok(failure(&e)),
            }
        }
        Commands::Fetch {
            references,
            language,
            json,
            output,
        } => {
            let config = Config::load(args.config.as_deref())?;
            let engine = TranscriptEngine::from_config(&config)?;
            let preferred = match language {
                Some(language) => language.parse::<Language>()?,
                None => engine.default_language().clone(),
            };

            if let [reference] = references.as_slice() {
                match engine.retrieve(reference, &preferred).await {
                    Ok(result) => {
                        let content = if json {
                            serde_json::to_string_pretty(&result)?
                        } else {
                            result.text.clone()
                        };
                        emit(&content, output.as_deref())?;
                    }
                    Err(e) => return Ok(failure(&e)),
                }
            } else {
                fetch_batch(&engine, &references, &preferred, json, output.as_deref()).await?;
            }
        }
    }

    Ok(ExitCode::SUCCESS)
}

#[derive(Serialize)]
struct BatchItem<'a> {
    reference: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    transcript: Option<&'a TranscriptResult>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error_kind: Option<String>,
}

async fn fetch_batch(
    engine: &TranscriptEngine,
    references: &[String],
    preferred: &Language,
    json: bool,
    output: Option<&Path>,
) -> Result<()> {
    let pb = ProgressBar::new(references.len() as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} transcripts")?
            .progress_chars("#>-"),
    );

    let results = engine
        .retrieve_batch(references, preferred, |done, _total| pb.set_position(done as u64))
        .await;
    pb.finish_and_clear();

    let succeeded = results.iter().filter(|r| r.is_ok()).count();
    info!("Retrieved {}/{} transcripts", succeeded, references.len());

    let content = if json {
        let items: Vec<BatchItem> = references
            .iter()
            .zip(&results)
            .map(|(reference, result)| match result {
                Ok(transcript) => BatchItem {
                    reference,
                    transcript: Some(transcript),
                    error: None,
                    error_kind: None,
                },
                Err(e) => BatchItem {
                    reference,
                    transcript: None,
                    error: Some(e.to_string()),
                    error_kind: Some(format!("{:?}", e.kind())),
                },
            })
            .collect();
        serde_json::to_string_pretty(&items)?
    } else {
        let mut content = String::new();
        for (reference, result) in references.iter().zip(&results) {
            content.push_str(&format!("=== {} ===\n", reference));
            match result {
                Ok(transcript) => content.push_str(&transcript.text),
                Err(e) => content.push_str(&format!("ERROR: {}", e)),
            }
            content.push_str("\n\n");
        }
        content.trim_end().to_string()
    };
    emit(&content, output)?;

    println!("\nBatch summary: {} succeeded, {} failed", succeeded, results.len() - succeeded);
    for (reference, result) in references.iter().zip(&results) {
        if let Err(e) = result {
            println!("  {} -> {:?}: {}", reference, e.kind(), e);
        }
    }

    Ok(())
}

fn emit(content: &str, output: Option<&Path>) -> Result<()> {
    match output {
        Some(path) => {
            std::fs::write(path, content)?;
            info!("Output written to {}", path.display());
        }
        None => println!("{}", content),
    }
    Ok(())
}

/// Process exit code for a failed retrieval
fn exit_code(kind: ErrorKind) -> u8 {
    match kind {
        ErrorKind::Internal => 1,
        ErrorKind::ClientError => 2,
        ErrorKind::NoTranscript => 3,
        ErrorKind::Transient => 4,
        ErrorKind::Defect => 5,
    }
}

fn failure(e: &TubescribeError) -> ExitCode {
    error!("{}", e);
    ExitCode::from(exit_code(e.kind()))
}

fn setup_logging(verbose: bool) -> Result<WorkerGuard> {
    // Create log directory
    let log_dir = std::env::current_dir()?.join(".tubescribe").join("log");
    std::fs::create_dir_all(&log_dir)?;

    // Set up file appender with daily rotation
    let file_appender = rolling::daily(&log_dir, "tubescribe.log");
    let (non_blocking_file, guard) = non_blocking(file_appender);

    let log_level = if verbose { Level::DEBUG } else { Level::INFO };

    // Console output goes to stderr so transcripts on stdout stay clean
    let console_layer = fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(false);

    let file_layer = fmt::layer()
        .with_writer(non_blocking_file)
        .with_target(false)
        .with_thread_ids(true)
        .with_file(true)
        .with_line_number(true)
        .with_ansi(false);

    tracing_subscriber::registry()
        .with(EnvFilter::from_default_env().add_directive(log_level.into()))
        .with(console_layer)
        .with(file_layer)
        .try_init()
        .map_err(|e| anyhow::anyhow!("Failed to initialize logging: {}", e))?;

    info!(
        "Logging initialized - console: {}, file: {}",
        log_level,
        log_dir.join("tubescribe.log").display()
    );

    Ok(guard)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exit_codes_are_distinct() {
        let codes: std::collections::HashSet<_> = [
            ErrorKind::Internal,
            ErrorKind::ClientError,
            ErrorKind::NoTranscript,
            ErrorKind::Transient,
            ErrorKind::Defect,
        ]
        .into_iter()
        .map(exit_code)
        .collect();
        assert_eq!(codes.len(), 5);
        assert!(!codes.contains(&0));
    }

    #[test]
    fn test_failure_returns_exit_code_instead_of_exiting() {
        let code = failure(&TubescribeError::InvalidReference("not a url".to_string()));
        assert_eq!(format!("{:?}", code), format!("{:?}", ExitCode::from(2)));
    }
}
