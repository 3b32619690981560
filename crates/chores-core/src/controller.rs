//! Screen-level to-do flows on top of [`ListReconciler`]: adding and editing
//! from the options sheet, checkbox toggles, swipe-to-delete with undo, the
//! sort menu, and the show/hide menu item.

use crate::error::ListError;
use crate::model::{Direction, Priority, SortKey, Todo};
use crate::reconcile::{CompletedItems, ListReconciler};
use crate::view::Intent;
use tracing::{debug, info};

/// Result of applying an [`Intent`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// A row changed completion state; carries the saved copy.
    Toggled(Todo),
    /// A row was opened for editing; carries its current value.
    Opened(Todo),
}

pub struct TodoController {
    list: ListReconciler<Todo>,
    last_deleted: Option<Todo>,
}

impl TodoController {
    #[must_use]
    pub const fn new(list: ListReconciler<Todo>) -> Self {
        Self {
            list,
            last_deleted: None,
        }
    }

    #[must_use]
    pub const fn list(&self) -> &ListReconciler<Todo> {
        &self.list
    }

    pub fn list_mut(&mut self) -> &mut ListReconciler<Todo> {
        &mut self.list
    }

    /// Create a new item and save it.
    ///
    /// # Errors
    ///
    /// [`ListError::BlankName`] if `name` is empty after trimming.
    pub fn add(&mut self, name: &str, priority: Priority) -> Result<Todo, ListError> {
        let name = non_blank(name)?;
        let todo = Todo::new(name, priority, self.list.now());
        self.list.insert(todo.clone(), true)?;
        info!(id = %todo.id, %priority, "todo added");
        Ok(todo)
    }

    /// Rename and re-prioritize the row at `position`. Editing clears
    /// completion.
    ///
    /// # Errors
    ///
    /// [`ListError::BlankName`] or [`ListError::OutOfRange`].
    pub fn edit(
        &mut self,
        position: usize,
        name: &str,
        priority: Priority,
    ) -> Result<Todo, ListError> {
        let name = non_blank(name)?;
        let current = self.row(position)?;
        let edited = current.edited(name, priority);
        self.list.update(position, edited.clone())?;
        Ok(edited)
    }

    /// Set the completion of the row at `position`.
    ///
    /// While completed items are hidden, a row being checked is taken out of
    /// the display before it is marked complete.
    ///
    /// # Errors
    ///
    /// [`ListError::OutOfRange`] if `position` is not a visible row.
    pub fn toggle(&mut self, position: usize, checked: bool) -> Result<Todo, ListError> {
        if checked {
            let item = if self.list.completed_items().is_hidden() {
                self.list.take(position)?
            } else {
                self.row(position)?
            };
            Ok(self.list.mark_complete(&item))
        } else {
            let item = self.row(position)?;
            self.list.mark_incomplete(position, &item)
        }
    }

    /// Delete the row at `position`, remembering it for [`undo_delete`](Self::undo_delete).
    ///
    /// # Errors
    ///
    /// [`ListError::OutOfRange`] if `position` is not a visible row.
    pub fn delete(&mut self, position: usize) -> Result<Todo, ListError> {
        let removed = self.list.delete(position)?;
        debug!(id = %removed.id, "remembering deleted todo for undo");
        self.last_deleted = Some(removed.clone());
        Ok(removed)
    }

    /// Re-create the most recently deleted item. Returns `None` if there is
    /// nothing to undo.
    ///
    /// # Errors
    ///
    /// [`ListError::Duplicate`] if the item has come back some other way.
    pub fn undo_delete(&mut self) -> Result<Option<Todo>, ListError> {
        let Some(item) = self.last_deleted.take() else {
            return Ok(None);
        };
        self.list.insert(item.clone(), true)?;
        info!(id = %item.id, "delete undone");
        Ok(Some(item))
    }

    /// The show/hide completed menu item.
    pub fn set_completed(&mut self, completed: CompletedItems) {
        match completed {
            CompletedItems::Shown => self.list.show_completed_tasks(),
            CompletedItems::Hidden => self.list.hide_completed_tasks(),
        }
    }

    /// The sort menu. Creation order is always ascending.
    pub fn sort(&mut self, key: SortKey, direction: Direction) {
        let completed = self.list.completed_items();
        match key {
            SortKey::Created => self.list.sort_by_created(completed),
            SortKey::Priority => self.list.sort_by_priority(completed, direction),
            SortKey::Name => self.list.sort_by_name(completed, direction),
        }
    }

    /// Apply a row click.
    ///
    /// # Errors
    ///
    /// [`ListError::OutOfRange`] if the intent names a row that is gone.
    pub fn apply(&mut self, intent: Intent) -> Result<Outcome, ListError> {
        match intent {
            Intent::Toggle { position, checked } => {
                self.toggle(position, checked).map(Outcome::Toggled)
            }
            Intent::Open { position } => self.row(position).map(Outcome::Opened),
        }
    }

    fn row(&self, position: usize) -> Result<Todo, ListError> {
        self.list
            .get(position)
            .cloned()
            .ok_or(ListError::OutOfRange {
                position,
                len: self.list.len(),
            })
    }
}

fn non_blank(name: &str) -> Result<&str, ListError> {
    let trimmed = name.trim();
    if trimmed.is_empty() {
        Err(ListError::BlankName)
    } else {
        Ok(trimmed)
    }
}
