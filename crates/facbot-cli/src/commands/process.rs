//! Process command - run a batch of invoices through one conversation.

use std::fs;
use std::path::PathBuf;
use std::time::Instant;

use clap::Args;
use console::style;
use glob::glob;
use indicatif::{ProgressBar, ProgressStyle};
use tracing::{debug, warn};

use facbot_core::{ButtonId, Event, Phase, TurnOutcome};

use super::{build_controller, display_name, load_config, print_notices, print_table, write_artifact};

/// Arguments for the process command.
#[derive(Args)]
pub struct ProcessArgs {
    /// Input files or glob pattern
    #[arg(required = true)]
    input: String,

    /// Output directory for the exported file
    #[arg(short, long, default_value = ".")]
    output_dir: PathBuf,

    /// Print the exported line items as JSON
    #[arg(long)]
    json: bool,

    /// Print the exported line items as a table
    #[arg(long)]
    show: bool,
}

pub async fn run(args: ProcessArgs, config_path: Option<&str>) -> anyhow::Result<()> {
    let start = Instant::now();

    let files: Vec<PathBuf> = glob(&args.input)?
        .filter_map(|r| r.ok())
        .filter(|p| {
            p.extension()
                .and_then(|e| e.to_str())
                .is_some_and(|e| e.eq_ignore_ascii_case("pdf"))
        })
        .collect();

    if files.is_empty() {
        anyhow::bail!("No matching files found for pattern: {}", args.input);
    }

    println!(
        "{} Found {} files to process",
        style("ℹ").blue(),
        files.len()
    );

    let config = load_config(config_path)?;
    let controller = build_controller(&config)?;
    let mut session = controller.new_session();

    let pb = ProgressBar::new(files.len() as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} {msg}")?
            .progress_chars("=>-"),
    );

    let mut failed = Vec::new();
    for path in &files {
        let name = display_name(path);
        pb.set_message(name.clone());

        let bytes = match fs::read(path) {
            Ok(bytes) => bytes,
            Err(e) => {
                warn!("Failed to read {}: {}", path.display(), e);
                failed.push(name);
                pb.inc(1);
                continue;
            }
        };

        session.submit(Event::FileUploaded {
            file_name: name.clone(),
            bytes,
        });
        for report in controller.process_pending(&mut session).await {
            pb.suspend(|| print_notices(&report));
            if report.has_errors() {
                failed.push(name.clone());
            }
        }

        if session.phase() == Phase::AwaitingContinueDecision {
            session.submit(Event::ButtonActivated(ButtonId::AddAnother));
            controller.process_pending(&mut session).await;
        }
        pb.inc(1);
    }
    pb.finish_and_clear();

    if session.store().is_empty() {
        anyhow::bail!("None of the {} files could be processed", files.len());
    }

    session.submit(Event::ButtonActivated(ButtonId::FinishExport));
    for report in controller.process_pending(&mut session).await {
        debug!("Finish -> {:?}", report.outcome);
        print_notices(&report);
        if report.outcome != TurnOutcome::Processed {
            anyhow::bail!("Export was not accepted in phase {:?}", session.phase());
        }
    }

    let Some(artifact) = session.export() else {
        anyhow::bail!("Export produced no file");
    };
    let output_path = write_artifact(artifact, &args.output_dir)?;

    if args.show {
        print_table(session.line_items());
    }
    if args.json {
        println!("{}", serde_json::to_string_pretty(session.line_items())?);
    }

    println!();
    println!(
        "{} Processed {} invoices ({} line items) in {:?}",
        style("✓").green(),
        session.store().len(),
        artifact.rows,
        start.elapsed()
    );
    println!("  Output: {}", output_path.display());
    if !failed.is_empty() {
        failed.dedup();
        println!(
            "{} {} files had errors: {}",
            style("⚠").yellow(),
            failed.len(),
            failed.join(", ")
        );
    }

    Ok(())
}
