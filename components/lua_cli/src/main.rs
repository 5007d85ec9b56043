//! Lua bridge CLI
//!
//! Entry point for the `lua-bridge` binary. Parses CLI arguments and
//! delegates to the Runtime for execution.

use clap::Parser as ClapParser;
use lua_cli::{render_error, Cli, CliResult, Runtime};
use tracing_subscriber::EnvFilter;

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    if let Err(e) = run(&cli) {
        eprintln!("{}", render_error(&e, cli.error_format));
        std::process::exit(1);
    }
}

fn run(cli: &Cli) -> CliResult<()> {
    let mut runtime = Runtime::from_config_file(cli.config.as_deref(), cli.bare)?;

    let results = if let Some(file) = &cli.file {
        runtime.execute_file(file)?
    } else if let Some(code) = &cli.eval {
        runtime.execute_string(code, "=eval")?
    } else if cli.repl {
        return runtime.repl();
    } else {
        println!("Lua bridge {}", env!("CARGO_PKG_VERSION"));
        println!();
        println!("Usage:");
        println!("  lua-bridge --file <FILE>     Execute a Lua file");
        println!("  lua-bridge --eval <CODE>     Evaluate inline Lua code");
        println!("  lua-bridge --repl            Start interactive REPL");
        println!();
        println!("Run 'lua-bridge --help' for more options.");
        return Ok(());
    };

    if !results.is_empty() {
        println!("{}", results.join("\t"));
    }
    Ok(())
}
