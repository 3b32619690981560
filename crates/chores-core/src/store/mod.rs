//! Store collaborator: the synchronized source of truth behind a list.
//!
//! Every operation returns immediately and delivers its result later through
//! a [`Reply`] callback, which may run on any thread. Callers that own
//! non-thread-safe state must forward the result to their own thread rather
//! than touching that state from inside the callback.

pub mod memory;

use crate::error::StoreError;
use crate::model::{QuerySort, Record};
use std::fmt;
use std::sync::mpsc::Receiver;

pub use memory::MemoryStore;

/// Completion callback for a store operation.
pub type Reply<T> = Box<dyn FnOnce(Result<T, StoreError>) + Send + 'static>;

/// The kind of store operation, used for failure reporting and injection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StoreOp {
    Query,
    Create,
    Update,
    Delete,
    Observe,
}

impl StoreOp {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Query => "query",
            Self::Create => "create",
            Self::Update => "update",
            Self::Delete => "delete",
            Self::Observe => "observe",
        }
    }
}

impl fmt::Display for StoreOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Push notification from a store subscription.
#[derive(Debug, Clone, PartialEq)]
pub enum Change<T> {
    Started,
    Changed(T),
    Failed(StoreError),
    Completed,
}

pub trait Store<T: Record>: Send + Sync {
    /// Fetch every record, in the store's natural order unless `sort` is given.
    fn query(&self, sort: Option<QuerySort>, reply: Reply<Vec<T>>);

    fn create(&self, item: T, reply: Reply<()>);

    /// Replace the record with the same identity.
    fn update(&self, item: T, reply: Reply<()>);

    fn delete(&self, item: T, reply: Reply<()>);

    /// Subscribe to changes. The first message is always [`Change::Started`].
    fn observe(&self) -> Receiver<Change<T>>;
}
