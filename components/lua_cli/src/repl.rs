//! REPL (Read-Eval-Print Loop) implementation

use crate::cli::ErrorFormat;
use crate::error::{render_error, CliError, CliResult};
use crate::runtime::Runtime;
use core_types::Error;
use rustyline::error::ReadlineError;
use rustyline::DefaultEditor;

const CHUNK_NAME: &str = "=stdin";

/// What happened to one complete REPL entry
#[derive(Debug)]
pub enum Evaluation {
    /// The entry ran; these are its results
    Done(Vec<String>),
    /// The entry ends in the middle of a statement
    Incomplete,
}

/// Run the interactive REPL
///
/// # Returns
/// `Ok(())` when REPL exits normally
pub fn run_repl(runtime: &mut Runtime) -> CliResult<()> {
    let mut editor = DefaultEditor::new()
        .map_err(|e| CliError::Repl(format!("Failed to initialize editor: {}", e)))?;

    println!("Lua bridge {}", env!("CARGO_PKG_VERSION"));
    println!("Type Lua code or 'exit' to quit.");
    println!();

    let mut line_buffer = String::new();

    loop {
        let prompt = if line_buffer.is_empty() { "> " } else { ">> " };

        match editor.readline(prompt) {
            Ok(line) => {
                let trimmed = line.trim();

                if line_buffer.is_empty() && (trimmed == "exit" || trimmed == "quit") {
                    break;
                }

                if line_buffer.is_empty() && trimmed.starts_with('.') {
                    handle_repl_command(trimmed, runtime);
                    continue;
                }

                if !line_buffer.is_empty() {
                    line_buffer.push('\n');
                }
                line_buffer.push_str(&line);

                match evaluate(runtime, &line_buffer) {
                    Ok(Evaluation::Incomplete) => continue,
                    Ok(Evaluation::Done(results)) => {
                        if !results.is_empty() {
                            println!("{}", results.join("\t"));
                        }
                    }
                    Err(e) => eprintln!("{}", render_error(&e, ErrorFormat::Text)),
                }

                let _ = editor.add_history_entry(&line_buffer);
                line_buffer.clear();
            }
            Err(ReadlineError::Interrupted) => {
                if line_buffer.is_empty() {
                    println!("Press Ctrl-D or type 'exit' to quit");
                } else {
                    println!("^C");
                    line_buffer.clear();
                }
            }
            Err(ReadlineError::Eof) => break,
            Err(err) => {
                return Err(CliError::Repl(format!("Readline error: {}", err)));
            }
        }
    }

    Ok(())
}

/// Evaluate one REPL entry.
///
/// The entry is first compiled as an expression, so `1 + 1` prints `2`. A
/// syntax error ending at `<eof>` means more input is needed.
pub fn evaluate(runtime: &mut Runtime, input: &str) -> CliResult<Evaluation> {
    let expression = format!("return {}", input);
    match runtime.execute_string(&expression, CHUNK_NAME) {
        Err(CliError::Lua(Error::Syntax(_))) => {}
        other => return other.map(Evaluation::Done),
    }
    match runtime.execute_string(input, CHUNK_NAME) {
        Ok(results) => Ok(Evaluation::Done(results)),
        Err(CliError::Lua(Error::Syntax(message))) if is_incomplete(&message) => {
            Ok(Evaluation::Incomplete)
        }
        Err(e) => Err(e),
    }
}

fn is_incomplete(message: &str) -> bool {
    message.ends_with("<eof>")
}

fn handle_repl_command(command: &str, runtime: &Runtime) {
    match command {
        ".help" => {
            println!("REPL Commands:");
            println!("  .help     - Show this help message");
            println!("  .mem      - Show interpreter memory in use");
            println!("  .exit     - Exit the REPL");
        }
        ".mem" => match runtime.state().gc(core_types::GcAction::Count, 0) {
            Ok(kilobytes) => println!("{} KiB in use", kilobytes),
            Err(e) => eprintln!("{}", e),
        },
        ".exit" => std::process::exit(0),
        _ => {
            println!("Unknown command: {}", command);
            println!("Type .help for available commands");
        }
    }
}
