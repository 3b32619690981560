//! Optimistic list state kept in step with an asynchronous store.
//!
//! A [`ListReconciler`] owns two collections:
//!
//! - `visible`: what the view renders, in the last requested sort order.
//! - `completed`: every known item with a completion timestamp, in the order
//!   it became known. Kept separately so completed rows can be shown or hidden
//!   without asking the store again.
//!
//! Mutations apply locally first and are then written to the store. Store
//! replies never touch the collections directly: each reply only enqueues a
//! `Completion` on a channel, and the owner applies queued completions with
//! [`ListReconciler::process_pending`] or [`ListReconciler::wait_pending`].
//! Handlers look items up by identity at that point; a position captured when
//! the request was issued may be stale by the time the reply arrives.
//!
//! Store failures are reported and otherwise ignored. Local state is never
//! rolled back.
//!
//! The store runs requests in the order they were issued, so a query result
//! predates any write sent after the query. Those writes are kept until the
//! result arrives and replayed over it before it is loaded.

use crate::clock::{Clock, SystemClock};
use crate::error::{ListError, StoreError};
use crate::model::{Direction, Priority, QuerySort, Record, SortKey};
use crate::store::{Change, Store, StoreOp};
use crate::view::{ErrorReporter, LoggingView, TracingReporter, View};
use chrono::{DateTime, FixedOffset};
use std::collections::HashSet;
use std::sync::Arc;
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender, TryRecvError};
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// Whether completed items are displayed after the active ones.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum CompletedItems {
    Shown,
    #[default]
    Hidden,
}

impl CompletedItems {
    #[must_use]
    pub const fn is_hidden(self) -> bool {
        matches!(self, Self::Hidden)
    }

    const fn from_hidden(hidden: bool) -> Self {
        if hidden { Self::Hidden } else { Self::Shown }
    }
}

/// The sort most recently requested for the list.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ListSort {
    pub key: SortKey,
    pub direction: Direction,
}

/// A write issued while a query is outstanding.
#[derive(Debug)]
enum PendingWrite<T> {
    Saved(T),
    Deleted(String),
}

/// A store reply, forwarded to the owning thread.
#[derive(Debug)]
enum Completion<T> {
    Loaded {
        generation: u64,
        result: Result<Vec<T>, StoreError>,
    },
    Written {
        op: StoreOp,
        id: String,
        result: Result<(), StoreError>,
    },
}

pub struct ListReconciler<T: Record> {
    store: Arc<dyn Store<T>>,
    view: Box<dyn View>,
    reporter: Box<dyn ErrorReporter>,
    clock: Arc<dyn Clock>,
    visible: Vec<T>,
    completed: Vec<T>,
    hide_completed: bool,
    sort: ListSort,
    generation: u64,
    query_outstanding: bool,
    since_query: Vec<PendingWrite<T>>,
    in_flight: usize,
    tx: Sender<Completion<T>>,
    rx: Receiver<Completion<T>>,
    changes: Option<Receiver<Change<T>>>,
}

impl<T: Record> ListReconciler<T> {
    /// Create an empty reconciler over `store`. Completed items start hidden.
    #[must_use]
    pub fn new(store: Arc<dyn Store<T>>) -> Self {
        let (tx, rx) = mpsc::channel();
        Self {
            store,
            view: Box::new(LoggingView),
            reporter: Box::new(TracingReporter),
            clock: Arc::new(SystemClock),
            visible: Vec::new(),
            completed: Vec::new(),
            hide_completed: true,
            sort: ListSort::default(),
            generation: 0,
            query_outstanding: false,
            since_query: Vec::new(),
            in_flight: 0,
            tx,
            rx,
            changes: None,
        }
    }

    #[must_use]
    pub fn with_view(mut self, view: impl View + 'static) -> Self {
        self.view = Box::new(view);
        self
    }

    #[must_use]
    pub fn with_reporter(mut self, reporter: impl ErrorReporter + 'static) -> Self {
        self.reporter = Box::new(reporter);
        self
    }

    #[must_use]
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    #[must_use]
    pub fn with_completed(mut self, completed: CompletedItems) -> Self {
        self.hide_completed = completed.is_hidden();
        self
    }

    // -----------------------------------------------------------------------
    // Read access
    // -----------------------------------------------------------------------

    #[must_use]
    pub fn visible(&self) -> &[T] {
        &self.visible
    }

    /// Completed items in the order they became known.
    #[must_use]
    pub fn completed(&self) -> &[T] {
        &self.completed
    }

    #[must_use]
    pub fn get(&self, position: usize) -> Option<&T> {
        self.visible.get(position)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.visible.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.visible.is_empty()
    }

    #[must_use]
    pub fn position_of(&self, id: &str) -> Option<usize> {
        self.visible.iter().position(|item| item.id() == id)
    }

    #[must_use]
    pub const fn completed_items(&self) -> CompletedItems {
        CompletedItems::from_hidden(self.hide_completed)
    }

    #[must_use]
    pub const fn sort(&self) -> ListSort {
        self.sort
    }

    /// Store requests whose replies have not been applied yet.
    #[must_use]
    pub const fn in_flight(&self) -> usize {
        self.in_flight
    }

    /// Current instant from the injected clock.
    #[must_use]
    pub fn now(&self) -> DateTime<FixedOffset> {
        self.clock.now()
    }

    /// Describe every broken invariant. Empty means consistent.
    #[must_use]
    pub fn violations(&self) -> Vec<String> {
        let mut problems = Vec::new();

        let mut seen = HashSet::new();
        for item in &self.visible {
            if !seen.insert(item.id()) {
                problems.push(format!("{} appears twice in visible", item.id()));
            }
        }

        let mut done = HashSet::new();
        for item in &self.completed {
            if !done.insert(item.id()) {
                problems.push(format!("{} appears twice in completed", item.id()));
            }
            if !item.is_completed() {
                problems.push(format!("{} is in completed without a timestamp", item.id()));
            }
        }

        for item in &self.visible {
            let tracked = done.contains(item.id());
            if item.is_completed() && !tracked {
                problems.push(format!("{} is completed but not tracked", item.id()));
            }
            if self.hide_completed && tracked {
                problems.push(format!("{} is visible while completed is hidden", item.id()));
            }
        }

        problems
    }

    // -----------------------------------------------------------------------
    // Loading
    // -----------------------------------------------------------------------

    /// Replace all local state with `items`.
    ///
    /// Items with a completion timestamp go to `completed`; the rest to
    /// `visible`. Completed items are appended to `visible` unless
    /// `hide_completed` is set. Repeated identities keep their first
    /// occurrence.
    pub fn load(&mut self, items: Vec<T>, hide_completed: bool) {
        self.visible.clear();
        self.completed.clear();
        self.hide_completed = hide_completed;

        let mut seen = HashSet::new();
        for item in items {
            if !seen.insert(item.id().to_string()) {
                warn!(id = item.id(), "ignoring repeated item in load");
                continue;
            }
            debug!(id = item.id(), "item loaded");
            if item.is_completed() {
                self.completed.push(item);
            } else {
                self.visible.push(item);
            }
        }

        if self.sort.key == SortKey::Priority {
            sort_by_priority(&mut self.visible, self.sort.direction);
        }
        if !hide_completed {
            let tail = self.completed_tail();
            self.visible.extend(tail);
        }

        info!(
            visible = self.visible.len(),
            completed = self.completed.len(),
            "list loaded"
        );
        self.view.refreshed();
    }

    /// Ask the store for every item using the current sort, and load the
    /// result when it arrives.
    ///
    /// Writes issued before the result is applied are replayed over it, so
    /// rows inserted, edited or deleted in the meantime keep their local
    /// state.
    pub fn reload(&mut self) {
        let sort = match self.sort.key {
            SortKey::Name => QuerySort::new(SortKey::Name, self.sort.direction),
            SortKey::Created | SortKey::Priority => {
                QuerySort::new(SortKey::Created, Direction::Ascending)
            }
        };
        self.request_query(sort);
    }

    // -----------------------------------------------------------------------
    // Mutations
    // -----------------------------------------------------------------------

    /// Append `item` and, if `persist`, create it in the store.
    ///
    /// A completed item is tracked in `completed` and only appended to the
    /// display while completed items are shown.
    ///
    /// # Errors
    ///
    /// [`ListError::Duplicate`] if the identity is already known.
    pub fn insert(&mut self, item: T, persist: bool) -> Result<(), ListError> {
        if self.position_of(item.id()).is_some() || self.completed_index(item.id()).is_some() {
            return Err(ListError::Duplicate {
                id: item.id().to_string(),
            });
        }

        if item.is_completed() {
            self.completed.push(item.clone());
        }
        if !(item.is_completed() && self.hide_completed) {
            self.visible.push(item.clone());
            self.view.inserted(self.visible.len() - 1);
        }

        if persist {
            self.persist(StoreOp::Create, item);
        }
        Ok(())
    }

    /// Replace the item at `position` with `new_item` and save it.
    ///
    /// The identity of `new_item` is not checked against the item it
    /// replaces. A changed identity is logged and otherwise treated as a plain
    /// replacement, as long as no other known item already holds it.
    ///
    /// # Errors
    ///
    /// [`ListError::OutOfRange`] if `position` is not a visible row, or
    /// [`ListError::Duplicate`] if `new_item` takes the identity of another
    /// known item.
    pub fn update(&mut self, position: usize, new_item: T) -> Result<(), ListError> {
        let len = self.visible.len();
        let Some(current) = self.visible.get(position) else {
            return Err(ListError::OutOfRange { position, len });
        };
        if current.id() != new_item.id()
            && (self.position_of(new_item.id()).is_some()
                || self.completed_index(new_item.id()).is_some())
        {
            return Err(ListError::Duplicate {
                id: new_item.id().to_string(),
            });
        }
        let old = std::mem::replace(&mut self.visible[position], new_item.clone());
        if old.id() != new_item.id() {
            warn!(
                old = old.id(),
                new = new_item.id(),
                position,
                "update replaced an item with a different identity"
            );
        }

        let old_index = self.completed_index(old.id());
        if let Some(idx) = old_index {
            self.completed.remove(idx);
        }
        if new_item.is_completed() {
            match self.completed_index(new_item.id()) {
                Some(idx) => self.completed[idx] = new_item.clone(),
                None => {
                    let idx = old_index.unwrap_or(self.completed.len());
                    self.completed.insert(idx.min(self.completed.len()), new_item.clone());
                }
            }
        }

        if new_item.is_completed() && self.hide_completed {
            self.visible.remove(position);
            self.view.removed(position);
        } else {
            self.view.changed(position);
        }

        self.persist(StoreOp::Update, new_item);
        Ok(())
    }

    /// Remove the row at `position`, delete it from the store, and return it
    /// so the caller can offer an undo.
    ///
    /// # Errors
    ///
    /// [`ListError::OutOfRange`] if `position` is not a visible row.
    pub fn delete(&mut self, position: usize) -> Result<T, ListError> {
        let item = self.take(position)?;
        if let Some(idx) = self.completed_index(item.id()) {
            self.completed.remove(idx);
        }
        self.persist(StoreOp::Delete, item.clone());
        Ok(item)
    }

    /// Remove the row at `position` from the display only. The store and the
    /// completed set are untouched.
    ///
    /// # Errors
    ///
    /// [`ListError::OutOfRange`] if `position` is not a visible row.
    pub fn take(&mut self, position: usize) -> Result<T, ListError> {
        if position >= self.visible.len() {
            return Err(ListError::OutOfRange {
                position,
                len: self.visible.len(),
            });
        }
        let item = self.visible.remove(position);
        self.view.removed(position);
        Ok(item)
    }

    /// Stamp `item` as completed now, track it, and save it.
    ///
    /// If the item is still displayed, its row is replaced by the stamped
    /// copy. Callers that hide completed items should [`take`](Self::take) the
    /// row first. Returns the stamped copy.
    pub fn mark_complete(&mut self, item: &T) -> T {
        let done = item.with_completed_at(Some(self.clock.now()));

        match self.completed_index(done.id()) {
            Some(idx) => self.completed[idx] = done.clone(),
            None => self.completed.push(done.clone()),
        }
        if let Some(position) = self.position_of(done.id()) {
            self.visible[position] = done.clone();
            self.view.changed(position);
        }

        self.persist(StoreOp::Update, done.clone());
        done
    }

    /// Clear the completion of `item`, put it back in the display at
    /// `position`, and save it.
    ///
    /// If the identity is already displayed, that row is replaced wherever it
    /// is; otherwise the item is inserted at `position`. Returns the active
    /// copy.
    ///
    /// # Errors
    ///
    /// [`ListError::OutOfRange`] if the item must be inserted and `position`
    /// is past the end of the list.
    pub fn mark_incomplete(&mut self, position: usize, item: &T) -> Result<T, ListError> {
        let current = self.position_of(item.id());
        if current.is_none() && position > self.visible.len() {
            return Err(ListError::OutOfRange {
                position,
                len: self.visible.len(),
            });
        }

        if let Some(idx) = self.completed_index(item.id()) {
            self.completed.remove(idx);
        }
        let active = item.with_completed_at(None);

        if let Some(existing) = current {
            self.visible[existing] = active.clone();
            self.view.changed(existing);
        } else {
            self.visible.insert(position, active.clone());
            self.view.inserted(position);
        }

        self.persist(StoreOp::Update, active.clone());
        Ok(active)
    }

    // -----------------------------------------------------------------------
    // Sorting and visibility
    // -----------------------------------------------------------------------

    /// Reload from the store in creation order.
    pub fn sort_by_created(&mut self, completed: CompletedItems) {
        self.sort = ListSort {
            key: SortKey::Created,
            direction: Direction::Ascending,
        };
        self.hide_completed = completed.is_hidden();
        self.reload();
    }

    /// Stable-sort the active rows by priority, then append the completed
    /// rows (sorted the same way) when they are shown.
    ///
    /// Purely local; nothing is sent to the store.
    pub fn sort_by_priority(&mut self, completed: CompletedItems, direction: Direction) {
        self.sort = ListSort {
            key: SortKey::Priority,
            direction,
        };
        self.hide_completed = completed.is_hidden();

        let done = self.completed_ids();
        let mut rows: Vec<T> = self
            .visible
            .drain(..)
            .filter(|item| !done.contains(item.id()))
            .collect();
        sort_by_priority(&mut rows, direction);
        if !self.hide_completed {
            rows.extend(self.completed_tail());
        }
        self.visible = rows;
        self.view.refreshed();
    }

    /// Reload from the store ordered by name. Collation is the store's.
    pub fn sort_by_name(&mut self, completed: CompletedItems, direction: Direction) {
        self.sort = ListSort {
            key: SortKey::Name,
            direction,
        };
        self.hide_completed = completed.is_hidden();
        self.reload();
    }

    /// Display completed items after the active ones. Local only.
    pub fn show_completed_tasks(&mut self) {
        self.hide_completed = false;
        let done = self.completed_ids();
        self.visible.retain(|item| !done.contains(item.id()));
        let tail = self.completed_tail();
        self.visible.extend(tail);
        self.view.refreshed();
    }

    /// Stop displaying completed items. Local only.
    pub fn hide_completed_tasks(&mut self) {
        self.hide_completed = true;
        let done = self.completed_ids();
        self.visible.retain(|item| !done.contains(item.id()));
        self.view.refreshed();
    }

    // -----------------------------------------------------------------------
    // Store replies
    // -----------------------------------------------------------------------

    /// Attach to the store's change stream. Changes are logged when pending
    /// work is processed; they are not merged into the list.
    pub fn subscribe(&mut self) {
        self.changes = Some(self.store.observe());
    }

    /// Apply every reply that has already arrived, without blocking.
    /// Returns how many replies were applied.
    pub fn process_pending(&mut self) -> usize {
        let mut applied = 0;
        loop {
            match self.rx.try_recv() {
                Ok(completion) => {
                    self.apply(completion);
                    applied += 1;
                }
                Err(TryRecvError::Empty | TryRecvError::Disconnected) => break,
            }
        }
        self.drain_changes();
        applied
    }

    /// Block until every outstanding request has been applied or `timeout`
    /// passes. Returns `true` when nothing is left in flight.
    pub fn wait_pending(&mut self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        while self.in_flight > 0 {
            let remaining = deadline.saturating_duration_since(Instant::now());
            match self.rx.recv_timeout(remaining) {
                Ok(completion) => self.apply(completion),
                Err(RecvTimeoutError::Timeout | RecvTimeoutError::Disconnected) => {
                    self.drain_changes();
                    return false;
                }
            }
        }
        self.process_pending();
        true
    }

    fn apply(&mut self, completion: Completion<T>) {
        self.in_flight = self.in_flight.saturating_sub(1);
        match completion {
            Completion::Loaded { generation, result } => {
                if generation != self.generation {
                    debug!(generation, current = self.generation, "dropping stale query result");
                    return;
                }
                self.query_outstanding = false;
                let writes = std::mem::take(&mut self.since_query);
                match result {
                    Ok(items) => {
                        let items = replay(items, writes);
                        self.load(items, self.hide_completed);
                    }
                    Err(err) => self.reporter.report(StoreOp::Query, &err),
                }
            }
            Completion::Written { op, id, result } => {
                let position = self.position_of(&id);
                match result {
                    Ok(()) => {
                        debug!(%op, id = %id, ?position, "store write confirmed");
                        if op == StoreOp::Update {
                            if let Some(position) = position {
                                self.view.changed(position);
                            }
                        }
                    }
                    Err(err) => {
                        warn!(%op, id = %id, ?position, "store write failed; keeping local state");
                        self.reporter.report(op, &err);
                    }
                }
            }
        }
    }

    fn drain_changes(&mut self) {
        let Some(changes) = &self.changes else {
            return;
        };
        let mut closed = false;
        loop {
            match changes.try_recv() {
                Ok(Change::Started) => info!("store subscription started"),
                Ok(Change::Changed(item)) => info!(id = item.id(), "store change observed"),
                Ok(Change::Failed(err)) => self.reporter.report(StoreOp::Observe, &err),
                Ok(Change::Completed) => {
                    info!("store subscription completed");
                    closed = true;
                    break;
                }
                Err(TryRecvError::Empty) => break,
                Err(TryRecvError::Disconnected) => {
                    closed = true;
                    break;
                }
            }
        }
        if closed {
            self.changes = None;
        }
    }

    fn request_query(&mut self, sort: QuerySort) {
        self.generation += 1;
        self.in_flight += 1;
        // Earlier writes are queued ahead of this query and show up in its result.
        self.query_outstanding = true;
        self.since_query.clear();
        let generation = self.generation;
        let tx = self.tx.clone();
        debug!(generation, key = %sort.key, direction = %sort.direction, "querying store");
        self.store.query(
            Some(sort),
            Box::new(move |result| {
                let _ = tx.send(Completion::Loaded { generation, result });
            }),
        );
    }

    fn persist(&mut self, op: StoreOp, item: T) {
        if self.query_outstanding {
            self.since_query.push(match op {
                StoreOp::Delete => PendingWrite::Deleted(item.id().to_string()),
                StoreOp::Create | StoreOp::Update | StoreOp::Query | StoreOp::Observe => {
                    PendingWrite::Saved(item.clone())
                }
            });
        }
        self.in_flight += 1;
        let tx = self.tx.clone();
        let id = item.id().to_string();
        let reply = Box::new(move |result| {
            let _ = tx.send(Completion::Written { op, id, result });
        });
        match op {
            StoreOp::Create => self.store.create(item, reply),
            StoreOp::Delete => self.store.delete(item, reply),
            StoreOp::Update | StoreOp::Query | StoreOp::Observe => self.store.update(item, reply),
        }
    }

    // -----------------------------------------------------------------------
    // Helpers
    // -----------------------------------------------------------------------

    fn completed_index(&self, id: &str) -> Option<usize> {
        self.completed.iter().position(|item| item.id() == id)
    }

    fn completed_ids(&self) -> HashSet<String> {
        self.completed
            .iter()
            .map(|item| item.id().to_string())
            .collect()
    }

    /// Completed items as they should follow the active rows.
    fn completed_tail(&self) -> Vec<T> {
        let mut tail = self.completed.clone();
        if self.sort.key == SortKey::Priority {
            sort_by_priority(&mut tail, self.sort.direction);
        }
        tail
    }
}

/// Apply `writes`, oldest first, to a query result. Saved items replace the
/// row with the same identity or are appended; deleted identities are dropped.
fn replay<T: Record>(mut items: Vec<T>, writes: Vec<PendingWrite<T>>) -> Vec<T> {
    for write in writes {
        match write {
            PendingWrite::Saved(item) => {
                match items.iter().position(|existing| existing.id() == item.id()) {
                    Some(idx) => items[idx] = item,
                    None => items.push(item),
                }
            }
            PendingWrite::Deleted(id) => items.retain(|existing| existing.id() != id),
        }
    }
    items
}

/// Stable sort by priority. Equal priorities keep their relative order in
/// both directions.
fn sort_by_priority<T: Record>(items: &mut [T], direction: Direction) {
    items.sort_by(|a, b| direction.apply(a.priority().cmp(&b.priority())));
}

/// Count of rows per priority, used by status lines.
#[must_use]
pub fn priority_counts<T: Record>(items: &[T]) -> [(Priority, usize); 3] {
    let mut counts = [(Priority::Low, 0), (Priority::Normal, 0), (Priority::High, 0)];
    for item in items {
        let slot = match item.priority() {
            Priority::Low => 0,
            Priority::Normal => 1,
            Priority::High => 2,
        };
        counts[slot].1 += 1;
    }
    counts
}
