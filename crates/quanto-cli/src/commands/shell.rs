//! Shell command - interactive session over stdin.
//!
//! Uploads accumulate until `analyze` runs them as one batch. Each batch
//! replaces the results of the previous one.

use std::fs;
use std::io::{self, BufRead, Write};
use std::path::PathBuf;

use clap::Args;
use console::style;
use tracing::debug;

use quanto_core::{AzureReceiptClient, BatchOrchestrator, Document, Session, flatten};

use crate::render;

/// Arguments for the shell command.
#[derive(Args)]
pub struct ShellArgs {
    /// Files or glob patterns to add before the prompt opens
    inputs: Vec<String>,
}

#[derive(Debug, PartialEq, Eq)]
enum ShellCommand {
    Add(Vec<String>),
    Remove(String),
    List,
    Clear,
    Analyze,
    Table,
    Json,
    Csv(PathBuf),
    Failures,
    Help,
    Quit,
}

impl ShellCommand {
    fn parse(line: &str) -> Result<Option<Self>, String> {
        let mut words = line.split_whitespace();
        let Some(verb) = words.next() else {
            return Ok(None);
        };
        let rest: Vec<String> = words.map(String::from).collect();

        let command = match verb {
            "add" if !rest.is_empty() => Self::Add(rest),
            "add" => return Err("usage: add <file or pattern>...".to_string()),
            "remove" | "rm" => match rest.as_slice() {
                [name] => Self::Remove(name.clone()),
                _ => return Err("usage: remove <name>".to_string()),
            },
            "list" | "ls" => Self::List,
            "clear" => Self::Clear,
            "analyze" | "run" => Self::Analyze,
            "table" => Self::Table,
            "json" => Self::Json,
            "csv" => match rest.as_slice() {
                [path] => Self::Csv(PathBuf::from(path)),
                _ => return Err("usage: csv <path>".to_string()),
            },
            "failures" => Self::Failures,
            "help" | "?" => Self::Help,
            "quit" | "exit" => Self::Quit,
            other => return Err(format!("unknown command '{}', try 'help'", other)),
        };

        Ok(Some(command))
    }
}

const HELP: &str = "\
Commands:
  add <file or pattern>...  queue receipts for analysis
  remove <name>             drop a queued receipt
  list                      show queued receipts
  clear                     drop all queued receipts
  analyze                   analyze the queued receipts as one batch
  table                     show the line-item table of the last batch
  json                      show the raw records of the last batch
  csv <path>                save the line-item table as CSV
  failures                  show documents that failed in the last batch
  help                      show this message
  quit                      leave the shell";

pub async fn run(args: ShellArgs, config_path: Option<&str>) -> anyhow::Result<()> {
    let config = super::load_config(config_path)?;
    let orchestrator = super::build_orchestrator(&config)?;

    let mut session = Session::new();
    if !args.inputs.is_empty() {
        add_files(&mut session, &args.inputs)?;
    }

    println!("{} Receipt shell. Type 'help' for commands.", style("ℹ").blue());

    let stdin = io::stdin();
    let mut lines = stdin.lock().lines();
    loop {
        print!("quanto> ");
        io::stdout().flush()?;

        let Some(line) = lines.next() else {
            println!();
            break;
        };
        let line = line?;

        let command = match ShellCommand::parse(&line) {
            Ok(Some(command)) => command,
            Ok(None) => continue,
            Err(message) => {
                println!("{} {}", style("✗").red(), message);
                continue;
            }
        };
        debug!("Shell command: {:?}", command);

        if command == ShellCommand::Quit {
            break;
        }
        if let Err(e) = execute(command, &mut session, &orchestrator).await {
            println!("{} {:#}", style("✗").red(), e);
        }
    }

    Ok(())
}

async fn execute(
    command: ShellCommand,
    session: &mut Session,
    orchestrator: &BatchOrchestrator<AzureReceiptClient>,
) -> anyhow::Result<()> {
    match command {
        ShellCommand::Add(inputs) => add_files(session, &inputs)?,
        ShellCommand::Remove(name) => match session.remove_upload(&name) {
            Some(_) => println!("{} Removed {}", style("✓").green(), name),
            None => println!("{} {} is not queued", style("ℹ").blue(), name),
        },
        ShellCommand::List => print_uploads(session.uploads()),
        ShellCommand::Clear => {
            session.clear_uploads();
            println!("{} Queue cleared", style("✓").green());
        }
        ShellCommand::Analyze => {
            if session.uploads().is_empty() {
                anyhow::bail!("Nothing queued. Use 'add' first.");
            }
            let report = orchestrator
                .run_with_progress(session.uploads(), |event| {
                    let mark = if event.succeeded {
                        style("✓").green()
                    } else {
                        style("✗").red()
                    };
                    println!("  {} [{}/{}] {}", mark, event.position, event.total, event.name);
                })
                .await;
            println!("{}", render::format_summary(&report));
            session.replace_report(report);
        }
        ShellCommand::Table => print!("{}", render::format_table(&flatten(session.records()))),
        ShellCommand::Json => println!("{}", render::format_json(session.records())?),
        ShellCommand::Csv(path) => {
            fs::write(&path, render::format_csv(&flatten(session.records()))?)?;
            println!("{} Table saved to {}", style("✓").green(), path.display());
        }
        ShellCommand::Failures => match session.report() {
            Some(report) if !report.failures.is_empty() => {
                print!("{}", render::format_failures(&report.failures))
            }
            Some(_) => println!("{} No failures in the last batch", style("✓").green()),
            None => println!("{} No batch analyzed yet", style("ℹ").blue()),
        },
        ShellCommand::Help => println!("{}", HELP),
        ShellCommand::Quit => {}
    }

    Ok(())
}

fn add_files(session: &mut Session, inputs: &[String]) -> anyhow::Result<()> {
    let files = super::expand_inputs(inputs)?;
    if files.is_empty() {
        anyhow::bail!("No supported files matched: {}", inputs.join(" "));
    }
    for path in &files {
        match Document::load(path) {
            Ok(document) => {
                let kind = document.kind;
                let size = document.len();
                let name = session.add_upload(document);
                println!("{} Queued {} ({}, {} bytes)", style("+").green(), name, kind, size);
            }
            Err(unreadable) => println!(
                "{} Skipped {}: {}",
                style("✗").red(),
                unreadable.name,
                unreadable.error
            ),
        }
    }
    Ok(())
}

fn print_uploads(uploads: &[Document]) {
    if uploads.is_empty() {
        println!("{} Queue is empty", style("ℹ").blue());
        return;
    }
    for (i, document) in uploads.iter().enumerate() {
        println!("  {}. {} ({})", i + 1, document.name, document.kind);
    }
}
