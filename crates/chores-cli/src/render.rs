//! Row binding and list rendering for the terminal.

use crate::output::{OutputMode, pretty_kv, pretty_rule, pretty_section, write_json_line};
use chores_core::model::{Direction, Priority, Record, SortKey, Todo};
use chores_core::reconcile::{ListReconciler, priority_counts};
use chores_core::store::StoreOp;
use chores_core::view::{Binder, ClickTarget, Intent};
use chores_core::StoreError;
use serde::Serialize;
use std::io::{self, Write};

/// One rendered row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RowView {
    pub id: String,
    pub name: String,
    pub priority: Priority,
    pub marker: char,
    pub done: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<String>,
}

impl RowView {
    fn checkbox(&self) -> &'static str {
        if self.done { "[x]" } else { "[ ]" }
    }
}

/// Binder for terminal rows. A checkbox click flips completion; a label click
/// opens the row.
#[derive(Debug, Clone, Copy, Default)]
pub struct TextBinder;

impl Binder<Todo> for TextBinder {
    type Row = RowView;

    fn bind(&self, item: &Todo) -> RowView {
        RowView {
            id: item.id.clone(),
            name: item.name.clone(),
            priority: item.priority,
            marker: item.priority.marker(),
            done: item.is_completed(),
            completed_at: item.completed_at.map(|at| at.to_rfc3339()),
        }
    }

    fn on_click(&self, position: usize, target: ClickTarget, item: &Todo) -> Intent {
        match target {
            ClickTarget::Checkbox => Intent::Toggle {
                position,
                checked: !item.is_completed(),
            },
            ClickTarget::Label => Intent::Open { position },
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ListedRow {
    pub position: usize,
    #[serde(flatten)]
    pub row: RowView,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct Counts {
    pub low: usize,
    pub normal: usize,
    pub high: usize,
}

/// Everything the list screen shows at one moment.
#[derive(Debug, Clone, Serialize)]
pub struct ListSnapshot {
    pub rows: Vec<ListedRow>,
    pub completed: usize,
    pub hide_completed: bool,
    pub sort: SortKey,
    pub direction: Direction,
    pub counts: Counts,
}

impl ListSnapshot {
    pub fn capture(list: &ListReconciler<Todo>, binder: &impl Binder<Todo, Row = RowView>) -> Self {
        let mut counts = Counts::default();
        for (priority, n) in priority_counts(list.visible()) {
            match priority {
                Priority::Low => counts.low = n,
                Priority::Normal => counts.normal = n,
                Priority::High => counts.high = n,
            }
        }
        let sort = list.sort();
        Self {
            rows: list
                .visible()
                .iter()
                .enumerate()
                .map(|(position, item)| ListedRow {
                    position,
                    row: binder.bind(item),
                })
                .collect(),
            completed: list.completed().len(),
            hide_completed: list.completed_items().is_hidden(),
            sort: sort.key,
            direction: sort.direction,
            counts,
        }
    }
}

/// A line of `ch run` output.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum Event {
    List(ListSnapshot),
    Opened {
        position: usize,
        #[serde(flatten)]
        row: RowView,
    },
    Failed {
        operation: String,
        code: String,
        message: String,
    },
}

impl Event {
    pub fn failed(operation: StoreOp, error: &StoreError) -> Self {
        Self::Failed {
            operation: operation.to_string(),
            code: error.code().code().to_string(),
            message: error.to_string(),
        }
    }
}

/// Write one event in the given mode.
pub fn render_event(w: &mut dyn Write, mode: OutputMode, event: &Event) -> anyhow::Result<()> {
    match mode {
        OutputMode::Json => write_json_line(w, event)?,
        OutputMode::Text => render_text(w, event)?,
        OutputMode::Pretty => render_pretty(w, event)?,
    }
    Ok(())
}

fn render_text(w: &mut dyn Write, event: &Event) -> io::Result<()> {
    match event {
        Event::List(snapshot) => {
            for listed in &snapshot.rows {
                let row = &listed.row;
                writeln!(
                    w,
                    "{}  {}  {}  {}  {}",
                    listed.position,
                    row.checkbox(),
                    row.marker,
                    row.name,
                    row.id
                )?;
            }
            Ok(())
        }
        Event::Opened { position, row } => writeln!(
            w,
            "open  {position}  {}  {}  {}  {}",
            row.checkbox(),
            row.marker,
            row.name,
            row.id
        ),
        Event::Failed {
            operation,
            code,
            message,
        } => writeln!(w, "failed  {operation}  {code}  {message}"),
    }
}

fn render_pretty(w: &mut dyn Write, event: &Event) -> io::Result<()> {
    match event {
        Event::List(snapshot) => {
            let completed = if snapshot.hide_completed {
                "hidden"
            } else {
                "shown"
            };
            pretty_section(
                w,
                &format!(
                    "To-do (sort: {} {}, completed {completed})",
                    snapshot.sort, snapshot.direction
                ),
            )?;
            if snapshot.rows.is_empty() {
                writeln!(w, "  (nothing to do)")?;
            }
            for listed in &snapshot.rows {
                let row = &listed.row;
                writeln!(
                    w,
                    "{:>3}  {} {} {}",
                    listed.position,
                    row.checkbox(),
                    row.marker,
                    row.name
                )?;
            }
            pretty_rule(w)?;
            let c = snapshot.counts;
            writeln!(
                w,
                "{} shown: {} high, {} normal, {} low; {} completed",
                snapshot.rows.len(),
                c.high,
                c.normal,
                c.low,
                snapshot.completed
            )
        }
        Event::Opened { position, row } => {
            pretty_section(w, &format!("Row {position}"))?;
            pretty_kv(w, "id", &row.id)?;
            pretty_kv(w, "name", &row.name)?;
            pretty_kv(w, "priority", row.priority.as_str())?;
            pretty_kv(
                w,
                "completed",
                row.completed_at.as_deref().unwrap_or("no"),
            )
        }
        Event::Failed {
            operation,
            code,
            message,
        } => writeln!(w, "! {operation} failed [{code}]: {message}"),
    }
}
