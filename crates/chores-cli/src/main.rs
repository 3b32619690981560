#![forbid(unsafe_code)]

mod cmd;
mod output;
mod render;
mod script;

use chores_core::ErrorCode;
use chores_core::config;
use clap::{CommandFactory, Parser, Subcommand};
use output::{CliError, OutputMode, render_error, resolve_output_mode};
use std::env;
use std::process::ExitCode;
use tracing::debug;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

#[derive(Parser, Debug)]
#[command(
    author,
    version,
    about = "chores: a to-do list that stays in step with its store",
    long_about = None
)]
struct Cli {
    /// Log debug events to stderr unless `CHORES_LOG` says otherwise.
    #[arg(short, long)]
    verbose: bool,

    /// Output format.
    #[arg(long, value_enum, global = true)]
    format: Option<OutputMode>,

    /// Alias for `--format json`.
    #[arg(long, global = true, hide = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    #[command(
        about = "Run a to-do command script",
        long_about = "Apply a script of list commands, one per line, to a to-do list backed by \
                      an in-memory store. Every command waits for the store to answer before \
                      the next one runs.\n\n\
                      Commands:\n  \
                      add <name> [priority]          edit <pos|id> <name> [priority]\n  \
                      check <pos|id>                 uncheck <pos|id>\n  \
                      toggle <pos|id>                open <pos|id>\n  \
                      delete <pos|id>                undo\n  \
                      show-completed                 hide-completed\n  \
                      sort created|priority|name [asc|desc]\n  \
                      reload                         list\n  \
                      fail query|create|update|delete\n  \
                      latency <ms>",
        after_help = "EXAMPLES:\n    # Run a script file\n    ch run today.chores\n\n    # Pipe commands on stdin\n    printf 'add \"Buy milk\" high\\ncheck 0\\n' | ch run\n\n    # Start from saved items and emit JSON lines\n    ch run --seed todos.json --format json script.chores"
    )]
    Run(cmd::run::RunArgs),

    #[command(
        about = "Generate shell completion scripts",
        long_about = "Generate shell completion scripts for supported shells.",
        after_help = "EXAMPLES:\n    # Generate bash completions\n    ch completions bash\n\n    # Generate zsh completions\n    ch completions zsh"
    )]
    Completions(cmd::completions::CompletionsArgs),
}

/// Filter used when `CHORES_LOG` is unset.
const fn default_filter(verbose: bool, debug_env: bool) -> &'static str {
    if verbose || debug_env {
        "chores=debug,ch=debug,info"
    } else {
        "chores=info,ch=info,warn"
    }
}

fn init_tracing(verbose: bool) {
    let filter = EnvFilter::try_from_env("CHORES_LOG").unwrap_or_else(|_| {
        EnvFilter::new(default_filter(verbose, env::var("DEBUG").is_ok()))
    });

    let format = env::var("CHORES_LOG_FORMAT").unwrap_or_else(|_| "compact".to_string());

    let registry = tracing_subscriber::registry().with(filter);

    match format.as_str() {
        "json" => {
            registry
                .with(fmt::layer().json().with_ansi(false).with_writer(std::io::stderr))
                .init();
        }
        _ => {
            registry
                .with(fmt::layer().compact().with_writer(std::io::stderr))
                .init();
        }
    }
}

fn main() -> anyhow::Result<ExitCode> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);
    if cli.verbose {
        debug!("verbose logging enabled");
    }

    let project_root = env::current_dir()?;
    let effective = match config::resolve_config(&project_root) {
        Ok(effective) => effective,
        Err(err) => {
            let mode = resolve_output_mode(cli.format, cli.json, None);
            let code = ErrorCode::ConfigParseError;
            render_error(
                mode,
                &CliError::with_details(format!("{err:#}"), code.hint(), code.code()),
            )?;
            return Ok(ExitCode::FAILURE);
        }
    };
    let output = resolve_output_mode(cli.format, cli.json, effective.output.as_deref());

    let command_result = match cli.command {
        Commands::Run(ref args) => cmd::run::run_run(args, output, &effective.project),
        Commands::Completions(ref args) => {
            let mut command = Cli::command();
            cmd::completions::run_completions(args.shell, &mut command, &mut std::io::stdout())
        }
    };

    match command_result {
        Ok(()) => Ok(ExitCode::SUCCESS),
        Err(err) => {
            let cli_error = err
                .downcast_ref::<cmd::run::ScriptFailure>()
                .map_or_else(|| CliError::new(format!("{err:#}")), cmd::run::ScriptFailure::to_cli_error);
            render_error(output, &cli_error)?;
            Ok(ExitCode::FAILURE)
        }
    }
}
