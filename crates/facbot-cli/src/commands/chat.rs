//! Chat command - interactive conversation in the terminal.

use std::borrow::Cow::{self, Borrowed, Owned};
use std::fs;
use std::path::PathBuf;

use clap::Args;
use console::style;
use rustyline::completion::{Completer, Pair};
use rustyline::error::ReadlineError;
use rustyline::highlight::Highlighter;
use rustyline::hint::Hinter;
use rustyline::history::DefaultHistory;
use rustyline::validate::Validator;
use rustyline::{Context, Editor, Helper};
use tracing::{debug, warn};

use facbot_core::{ButtonId, Event, Session};

use super::{
    build_controller, display_name, load_config, print_message, print_notices, spinner,
    write_artifact, Controller,
};

/// Arguments for the chat command.
#[derive(Args)]
pub struct ChatArgs {
    /// Directory where exported files are written
    #[arg(short, long, default_value = ".")]
    output_dir: PathBuf,
}

/// One line of user input.
#[derive(Debug, PartialEq, Eq)]
enum Input {
    Upload(PathBuf),
    Button(ButtonId),
    Message(String),
    Help,
    Quit,
    Unknown(String),
}

fn parse_input(line: &str) -> Input {
    let line = line.trim();
    let Some(command) = line.strip_prefix('/') else {
        return Input::Message(line.to_string());
    };

    let (name, rest) = match command.split_once(char::is_whitespace) {
        Some((name, rest)) => (name, rest.trim()),
        None => (command, ""),
    };

    match name {
        "subir" | "upload" if !rest.is_empty() => Input::Upload(PathBuf::from(rest)),
        "otra" | "add" => Input::Button(ButtonId::AddAnother),
        "finalizar" | "finish" => Input::Button(ButtonId::FinishExport),
        "reiniciar" | "reset" => Input::Button(ButtonId::ResetSession),
        "ayuda" | "help" => Input::Help,
        "salir" | "quit" | "exit" => Input::Quit,
        _ => Input::Unknown(line.to_string()),
    }
}

const COMMANDS: [&str; 10] = [
    "/subir", "/upload", "/otra", "/add", "/finalizar", "/finish", "/reiniciar", "/reset",
    "/ayuda", "/salir",
];

fn commands_matching(prefix: &str) -> impl Iterator<Item = &'static str> + '_ {
    COMMANDS
        .iter()
        .copied()
        .filter(move |cmd| cmd.starts_with(prefix))
}

/// Completion and hints for slash commands.
struct ChatHelper;

impl Helper for ChatHelper {}

impl Completer for ChatHelper {
    type Candidate = Pair;

    fn complete(
        &self,
        line: &str,
        pos: usize,
        _ctx: &Context<'_>,
    ) -> rustyline::Result<(usize, Vec<Pair>)> {
        let line = &line[..pos];
        if !line.starts_with('/') || line.contains(' ') {
            return Ok((0, Vec::new()));
        }

        let candidates = commands_matching(line)
            .map(|cmd| Pair {
                display: cmd.to_string(),
                replacement: cmd.to_string(),
            })
            .collect();
        Ok((0, candidates))
    }
}

impl Hinter for ChatHelper {
    type Hint = String;

    fn hint(&self, line: &str, pos: usize, _ctx: &Context<'_>) -> Option<String> {
        let line = &line[..pos];
        if !line.starts_with('/') || line.contains(' ') {
            return None;
        }
        commands_matching(line)
            .find(|cmd| cmd.len() > line.len())
            .map(|cmd| cmd[line.len()..].to_string())
    }
}

impl Highlighter for ChatHelper {
    fn highlight<'l>(&self, line: &'l str, _pos: usize) -> Cow<'l, str> {
        if line.starts_with('/') {
            Owned(style(line).cyan().to_string())
        } else {
            Borrowed(line)
        }
    }

    fn highlight_hint<'h>(&self, hint: &'h str) -> Cow<'h, str> {
        Owned(style(hint).dim().to_string())
    }

    fn highlight_char(&self, _line: &str, _pos: usize, _forced: bool) -> bool {
        true
    }
}

impl Validator for ChatHelper {}

fn command_for(button: ButtonId) -> &'static str {
    match button {
        ButtonId::AddAnother => "/otra",
        ButtonId::FinishExport => "/finalizar",
        ButtonId::ResetSession => "/reiniciar",
    }
}

fn print_help() {
    println!("  /subir <archivo.pdf>  Procesar una factura");
    println!("  /otra                 Agregar otra factura");
    println!("  /finalizar            Finalizar y exportar");
    println!("  /reiniciar            Procesar nuevas facturas");
    println!("  /salir                Salir");
    println!("  Cualquier otro texto se envía como mensaje.");
    println!();
}

/// Prints what changed in the session since the last frame.
struct Renderer {
    output_dir: PathBuf,
    shown: usize,
    exported: bool,
}

impl Renderer {
    fn frame(&mut self, session: &Session) -> anyhow::Result<()> {
        let view = session.view();

        // A reset shrinks the transcript back to the greeting.
        if view.transcript.len() < self.shown {
            self.shown = 0;
        }
        for message in &view.transcript[self.shown..] {
            print_message(message);
        }
        self.shown = view.transcript.len();

        match view.download {
            Some(artifact) if !self.exported => {
                let path = write_artifact(artifact, &self.output_dir)?;
                println!(
                    "{} Archivo guardado en {} ({} filas)",
                    style("✓").green(),
                    path.display(),
                    artifact.rows
                );
                self.exported = true;
            }
            Some(_) => {}
            None => self.exported = false,
        }

        let mut hints: Vec<String> = view
            .actions
            .iter()
            .map(|b| format!("[{}] {}", command_for(*b), b.label()))
            .collect();
        if view.upload_enabled {
            hints.insert(0, "[/subir <pdf>] Subir factura".to_string());
        }
        if !hints.is_empty() {
            println!("{}", style(hints.join("  ")).dim());
        }

        Ok(())
    }
}

async fn turn(controller: &Controller, session: &mut Session, event: Event) -> anyhow::Result<()> {
    let pb = spinner("Procesando...")?;
    session.submit(event);
    let reports = controller.process_pending(session).await;
    pb.finish_and_clear();

    for report in &reports {
        debug!("Event {} -> {:?}", report.event, report.outcome);
        print_notices(report);
    }
    Ok(())
}

pub async fn run(args: ChatArgs, config_path: Option<&str>) -> anyhow::Result<()> {
    let config = load_config(config_path)?;
    let controller = build_controller(&config)?;
    let mut session = controller.new_session();
    let mut renderer = Renderer {
        output_dir: args.output_dir,
        shown: 0,
        exported: false,
    };

    println!("{}", style("Escribe /ayuda para ver los comandos.").dim());
    renderer.frame(&session)?;

    let mut rl: Editor<ChatHelper, DefaultHistory> = Editor::new()?;
    rl.set_helper(Some(ChatHelper));

    loop {
        let line = match rl.readline(">> ") {
            Ok(line) => line,
            Err(ReadlineError::Interrupted) => {
                println!("{}", style("Ctrl-C. Escribe /salir para terminar.").yellow());
                continue;
            }
            Err(ReadlineError::Eof) => break,
            Err(e) => return Err(e.into()),
        };
        if line.trim().is_empty() {
            continue;
        }
        let _ = rl.add_history_entry(line.as_str());

        let event = match parse_input(&line) {
            Input::Quit => break,
            Input::Help => {
                print_help();
                continue;
            }
            Input::Unknown(command) => {
                println!("{} Comando desconocido: {}", style("⚠").yellow(), command);
                continue;
            }
            Input::Upload(path) => match fs::read(&path) {
                Ok(bytes) => Event::FileUploaded {
                    file_name: display_name(&path),
                    bytes,
                },
                Err(e) => {
                    warn!("Cannot read {}: {}", path.display(), e);
                    eprintln!(
                        "{} No se pudo abrir {}: {}",
                        style("✗").red(),
                        path.display(),
                        e
                    );
                    continue;
                }
            },
            Input::Button(button) => Event::ButtonActivated(button),
            Input::Message(text) => Event::ChatMessageSubmitted(text),
        };

        turn(&controller, &mut session, event).await?;
        renderer.frame(&session)?;
    }

    Ok(())
}
