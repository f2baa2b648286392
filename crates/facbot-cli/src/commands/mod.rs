//! Subcommands and the terminal rendering they share.

pub mod chat;
pub mod config;
pub mod process;

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::Context;
use console::style;
use indicatif::{ProgressBar, ProgressStyle};
use tracing::debug;

use facbot_core::models::config::FacbotConfig;
use facbot_core::{
    AssistantClient, ChatMessage, ConversationController, ExportArtifact, ExportService,
    LineItemRow, NoticeLevel, PdfTextExtractor, Role, TurnReport,
};

/// The controller both interactive and batch runs use.
pub type Controller = ConversationController<AssistantClient, PdfTextExtractor>;

/// `<config_dir>/facbot/config.json`.
pub fn default_config_path() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("facbot")
        .join("config.json")
}

/// Load `--config` if given, else the default file if present, else defaults.
pub fn load_config(config_path: Option<&str>) -> anyhow::Result<FacbotConfig> {
    if let Some(path) = config_path {
        return FacbotConfig::from_file(Path::new(path))
            .with_context(|| format!("Failed to read config file {}", path));
    }

    let default_path = default_config_path();
    if default_path.exists() {
        debug!("Using config file {}", default_path.display());
        return FacbotConfig::from_file(&default_path)
            .with_context(|| format!("Failed to read config file {}", default_path.display()));
    }

    Ok(FacbotConfig::default())
}

/// Wire the configured assistant, extractor and exporter together.
pub fn build_controller(config: &FacbotConfig) -> anyhow::Result<Controller> {
    let assistant = AssistantClient::from_config(&config.assistant)
        .context("Cannot connect to the assistant. Set assistant.assistant_id and an API key")?;

    Ok(ConversationController::new(
        assistant,
        PdfTextExtractor::from_config(&config.pdf),
        ExportService::from_config(&config.export),
        config.chat.clone(),
    ))
}

/// Spinner shown while a turn waits on the assistant.
pub fn spinner(message: &str) -> anyhow::Result<ProgressBar> {
    let pb = ProgressBar::new_spinner();
    pb.set_style(ProgressStyle::default_spinner().template("{spinner:.green} {msg}")?);
    pb.set_message(message.to_string());
    pb.enable_steady_tick(Duration::from_millis(100));
    Ok(pb)
}

/// Print one transcript entry.
pub fn print_message(message: &ChatMessage) {
    let who = match message.role {
        Role::User => style("Tú").cyan().bold(),
        Role::Assistant => style("FacBot").green().bold(),
    };
    println!("{} {}", who, message.text);

    if !message.table.is_empty() {
        print_table(&message.table);
    }
    println!();
}

/// Print rows as an aligned text table.
pub fn print_table(rows: &[LineItemRow]) {
    let columns = ExportService::columns(rows);
    let cells: Vec<Vec<&str>> = rows
        .iter()
        .map(|row| columns.iter().map(|c| row.get(c).unwrap_or("")).collect())
        .collect();

    let widths: Vec<usize> = columns
        .iter()
        .enumerate()
        .map(|(i, c)| {
            cells
                .iter()
                .map(|r| r[i].chars().count())
                .chain(std::iter::once(c.chars().count()))
                .max()
                .unwrap_or(0)
        })
        .collect();

    let header: Vec<&str> = columns.iter().map(String::as_str).collect();
    println!("  {}", style(table_line(&header, &widths)).bold());
    for row in &cells {
        println!("  {}", table_line(row, &widths));
    }
}

fn table_line(values: &[&str], widths: &[usize]) -> String {
    values
        .iter()
        .zip(widths)
        .map(|(v, w)| format!("{:<width$}", v, width = w))
        .collect::<Vec<_>>()
        .join(" | ")
}

/// Print the notices of a turn.
pub fn print_notices(report: &TurnReport) {
    for notice in &report.notices {
        match notice.level {
            NoticeLevel::Info => println!("{} {}", style("ℹ").blue(), notice.text),
            NoticeLevel::Warning => println!("{} {}", style("⚠").yellow(), notice.text),
            NoticeLevel::Error => eprintln!("{} {}", style("✗").red(), notice.text),
        }
    }
}

/// Write an export artifact into `dir` and return its path.
pub fn write_artifact(artifact: &ExportArtifact, dir: &Path) -> anyhow::Result<PathBuf> {
    fs::create_dir_all(dir)?;
    let path = dir.join(&artifact.file_name);
    fs::write(&path, &artifact.bytes)
        .with_context(|| format!("Failed to write {}", path.display()))?;
    debug!("Wrote {} bytes to {}", artifact.bytes.len(), path.display());
    Ok(path)
}

/// File name for log and event purposes.
pub fn display_name(path: &Path) -> String {
    path.file_name()
        .and_then(|n| n.to_str())
        .map(str::to_string)
        .unwrap_or_else(|| path.display().to_string())
}
