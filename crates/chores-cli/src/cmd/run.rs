//! `ch run`: apply a command script to a to-do list over the in-memory store.

use crate::output::{CliError, OutputMode, render_error};
use crate::render::{Event, ListSnapshot, TextBinder, render_event};
use crate::script::{self, Command, Line, ParseError, Target};
use anyhow::{Context, Result};
use chores_core::config::ProjectConfig;
use chores_core::controller::{Outcome, TodoController};
use chores_core::error::{ErrorCode, ListError};
use chores_core::model::Todo;
use chores_core::reconcile::{CompletedItems, ListReconciler};
use chores_core::store::MemoryStore;
use chores_core::view::{Binder, ClickTarget, RecordingReporter};
use clap::Args;
use std::fmt;
use std::fs;
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

const SETTLE_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Args, Debug, Default)]
pub struct RunArgs {
    /// Script to run. Reads stdin when omitted or `-`.
    pub script: Option<PathBuf>,

    /// JSON array of to-dos to preload into the store.
    #[arg(long, value_name = "FILE")]
    pub seed: Option<PathBuf>,

    /// Only print `list`/`open` output, failures and the final list.
    #[arg(short, long)]
    pub quiet: bool,

    /// Report a failing command and continue with the next one.
    #[arg(long)]
    pub keep_going: bool,

    /// Override `[store] latency_ms` from the project config.
    #[arg(long, value_name = "MS")]
    pub latency_ms: Option<u64>,

    /// Start with completed items shown, whatever the config says.
    #[arg(long)]
    pub show_completed: bool,
}

/// A script line that could not be applied.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScriptFailure {
    pub line: usize,
    pub code: ErrorCode,
    pub message: String,
}

impl ScriptFailure {
    fn from_list(line: usize, err: &ListError) -> Self {
        Self {
            line,
            code: err.code(),
            message: err.to_string(),
        }
    }

    pub fn to_cli_error(&self) -> CliError {
        CliError::with_details(self.to_string(), self.code.hint(), self.code.code())
    }
}

impl fmt::Display for ScriptFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "line {}: {}", self.line, self.message)
    }
}

impl std::error::Error for ScriptFailure {}

impl From<ParseError> for ScriptFailure {
    fn from(err: ParseError) -> Self {
        Self {
            line: err.line,
            code: err.code,
            message: err.message,
        }
    }
}

/// Execute `ch run`.
///
/// # Errors
///
/// Returns an error if the script or seed cannot be read, a line does not
/// parse, or a command fails without `--keep-going`.
pub fn run_run(args: &RunArgs, output: OutputMode, config: &ProjectConfig) -> Result<()> {
    let text = read_script(args.script.as_deref())?;
    let lines = script::parse(&text).map_err(ScriptFailure::from)?;
    let seed = match &args.seed {
        Some(path) => load_seed(path)?,
        None => Vec::new(),
    };

    let stdout = io::stdout();
    let mut out = stdout.lock();
    run_script(&lines, seed, args, config, output, &mut out)
}

/// Apply parsed `lines` to a fresh list whose store starts with `seed`.
pub fn run_script(
    lines: &[Line],
    seed: Vec<Todo>,
    args: &RunArgs,
    config: &ProjectConfig,
    output: OutputMode,
    out: &mut dyn Write,
) -> Result<()> {
    let latency = args
        .latency_ms
        .map_or_else(|| config.store.latency(), Duration::from_millis);
    let store = Arc::new(MemoryStore::with_records(seed).with_latency(latency));
    let reporter = RecordingReporter::new();
    let completed = if args.show_completed {
        CompletedItems::Shown
    } else {
        config.list.completed_items()
    };
    let list = ListReconciler::<Todo>::new(store.clone())
        .with_reporter(reporter.clone())
        .with_completed(completed);

    let mut session = Session {
        controller: TodoController::new(list),
        store,
        reporter,
        binder: TextBinder,
        output,
        quiet: args.quiet,
        out,
    };
    session.start(config)?;

    for line in lines {
        if let Err(err) = session.execute(line) {
            match err.downcast::<ScriptFailure>() {
                Ok(failure) if args.keep_going => {
                    render_error(output, &failure.to_cli_error())?;
                }
                Ok(failure) => return Err(failure.into()),
                Err(other) => return Err(other),
            }
        }
    }

    session.print_list()?;
    info!(commands = lines.len(), "script finished");
    Ok(())
}

struct Session<'a> {
    controller: TodoController,
    store: Arc<MemoryStore<Todo>>,
    reporter: RecordingReporter,
    binder: TextBinder,
    output: OutputMode,
    quiet: bool,
    out: &'a mut dyn Write,
}

impl Session<'_> {
    fn start(&mut self, config: &ProjectConfig) -> Result<()> {
        let list = self.controller.list_mut();
        list.subscribe();
        list.reload();
        self.settle(0)?;
        self.controller
            .sort(config.list.sort, config.list.direction);
        self.settle(0)
    }

    fn execute(&mut self, line: &Line) -> Result<()> {
        debug!(line = line.number, command = ?line.command, "executing");
        let fail = |err: ListError| ScriptFailure::from_list(line.number, &err);

        match &line.command {
            Command::Add { name, priority } => {
                self.controller.add(name, *priority).map_err(fail)?;
            }
            Command::Edit {
                target,
                name,
                priority,
            } => {
                let position = self.resolve(target).map_err(fail)?;
                let priority = match priority {
                    Some(priority) => *priority,
                    None => self.row(position).map_err(fail)?.priority,
                };
                self.controller
                    .edit(position, name, priority)
                    .map_err(fail)?;
            }
            Command::Check(target) => {
                let position = self.resolve(target).map_err(fail)?;
                self.controller.toggle(position, true).map_err(fail)?;
            }
            Command::Uncheck(target) => {
                let position = self.resolve(target).map_err(fail)?;
                self.controller.toggle(position, false).map_err(fail)?;
            }
            Command::Toggle(target) => {
                let position = self.resolve(target).map_err(fail)?;
                self.click(position, ClickTarget::Checkbox).map_err(fail)?;
            }
            Command::Open(target) => {
                let position = self.resolve(target).map_err(fail)?;
                if let Outcome::Opened(todo) =
                    self.click(position, ClickTarget::Label).map_err(fail)?
                {
                    let row = self.binder.bind(&todo);
                    self.emit(&Event::Opened { position, row })?;
                }
            }
            Command::Delete(target) => {
                let position = self.resolve(target).map_err(fail)?;
                self.controller.delete(position).map_err(fail)?;
            }
            Command::Undo => {
                if self.controller.undo_delete().map_err(fail)?.is_none() {
                    info!(line = line.number, "nothing to undo");
                }
            }
            Command::ShowCompleted => self.controller.set_completed(CompletedItems::Shown),
            Command::HideCompleted => self.controller.set_completed(CompletedItems::Hidden),
            Command::Sort { key, direction } => self.controller.sort(*key, *direction),
            Command::Reload => self.controller.list_mut().reload(),
            Command::List => {}
            Command::Fail(op) => self.store.fail_next(*op),
            Command::Latency(ms) => self.store.set_latency(Duration::from_millis(*ms)),
        }

        self.settle(line.number)?;
        if matches!(line.command, Command::List) || (line.command.is_mutating() && !self.quiet) {
            self.print_list()?;
        }
        Ok(())
    }

    /// Wait for the store to answer everything in flight, then print any
    /// failures it reported.
    fn settle(&mut self, line: usize) -> Result<()> {
        if !self.controller.list_mut().wait_pending(SETTLE_TIMEOUT) {
            return Err(ScriptFailure {
                line,
                code: ErrorCode::InternalUnexpected,
                message: format!(
                    "store did not answer within {}s",
                    SETTLE_TIMEOUT.as_secs()
                ),
            }
            .into());
        }
        for (op, err) in self.reporter.take() {
            self.emit(&Event::failed(op, &err))?;
        }
        Ok(())
    }

    fn click(&mut self, position: usize, target: ClickTarget) -> Result<Outcome, ListError> {
        let item = self.row(position)?;
        let intent = self.binder.on_click(position, target, &item);
        self.controller.apply(intent)
    }

    fn row(&self, position: usize) -> Result<Todo, ListError> {
        let list = self.controller.list();
        list.get(position)
            .cloned()
            .ok_or(ListError::OutOfRange {
                position,
                len: list.len(),
            })
    }

    fn resolve(&self, target: &Target) -> Result<usize, ListError> {
        match target {
            Target::Position(position) => Ok(*position),
            Target::Id(id) => self
                .controller
                .list()
                .position_of(id)
                .ok_or_else(|| ListError::NotFound { id: id.clone() }),
        }
    }

    fn print_list(&mut self) -> Result<()> {
        let snapshot = ListSnapshot::capture(self.controller.list(), &self.binder);
        self.emit(&Event::List(snapshot))
    }

    fn emit(&mut self, event: &Event) -> Result<()> {
        render_event(&mut *self.out, self.output, event)
    }
}

fn read_script(path: Option<&Path>) -> Result<String> {
    match path {
        Some(path) if path != Path::new("-") => fs::read_to_string(path)
            .with_context(|| format!("Failed to read script {}", path.display())),
        _ => {
            let mut text = String::new();
            io::stdin()
                .read_to_string(&mut text)
                .context("Failed to read script from stdin")?;
            Ok(text)
        }
    }
}

fn load_seed(path: &Path) -> Result<Vec<Todo>> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("Failed to read seed {}", path.display()))?;
    serde_json::from_str(&content)
        .with_context(|| format!("Failed to parse seed {}", path.display()))
}
