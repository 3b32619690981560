//! In-process store backed by a worker thread.
//!
//! Jobs run strictly in submission order on a single worker, so two writes
//! issued one after the other are applied in that order. Replies are invoked
//! on the worker thread.

use super::{Change, Reply, Store, StoreOp};
use crate::error::StoreError;
use crate::model::{QuerySort, Record, SortKey};
use std::cmp::Ordering;
use std::collections::HashMap;
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::{Arc, Mutex, PoisonError};
use std::thread::{self, JoinHandle};
use std::time::Duration;
use tracing::{debug, trace, warn};

enum Job<T> {
    Query(Option<QuerySort>, Reply<Vec<T>>),
    Create(T, Reply<()>),
    Update(T, Reply<()>),
    Delete(T, Reply<()>),
}

struct Shared<T> {
    records: Vec<T>,
    subscribers: Vec<Sender<Change<T>>>,
    injected: HashMap<StoreOp, usize>,
    latency: Duration,
}

impl<T: Record> Shared<T> {
    fn take_injected(&mut self, op: StoreOp) -> bool {
        match self.injected.get_mut(&op) {
            Some(remaining) if *remaining > 0 => {
                *remaining -= 1;
                true
            }
            _ => false,
        }
    }

    fn position(&self, id: &str) -> Option<usize> {
        self.records.iter().position(|r| r.id() == id)
    }

    fn broadcast(&mut self, change: &Change<T>) {
        self.subscribers.retain(|tx| tx.send(change.clone()).is_ok());
    }

    fn run(&mut self, job: Job<T>) -> Box<dyn FnOnce() + Send> {
        match job {
            Job::Query(sort, reply) => {
                let result = if self.take_injected(StoreOp::Query) {
                    Err(StoreError::QueryFailed("injected failure".into()))
                } else {
                    let mut rows = self.records.clone();
                    if let Some(sort) = sort {
                        rows.sort_by(|a, b| {
                            sort.direction
                                .apply(compare(sort.key, a, b))
                                .then_with(|| a.id().cmp(b.id()))
                        });
                    }
                    trace!(rows = rows.len(), ?sort, "memory store query");
                    Ok(rows)
                };
                Box::new(move || reply(result))
            }
            Job::Create(item, reply) => {
                let result = if self.take_injected(StoreOp::Create) {
                    Err(StoreError::SaveFailed("injected failure".into()))
                } else if self.position(item.id()).is_some() {
                    Err(StoreError::SaveFailed(format!("{} already exists", item.id())))
                } else {
                    self.records.push(item.clone());
                    self.broadcast(&Change::Changed(item));
                    Ok(())
                };
                Box::new(move || reply(result))
            }
            Job::Update(item, reply) => {
                let result = if self.take_injected(StoreOp::Update) {
                    Err(StoreError::SaveFailed("injected failure".into()))
                } else if let Some(idx) = self.position(item.id()) {
                    self.records[idx] = item.clone();
                    self.broadcast(&Change::Changed(item));
                    Ok(())
                } else {
                    Err(StoreError::SaveFailed(format!("{} does not exist", item.id())))
                };
                Box::new(move || reply(result))
            }
            Job::Delete(item, reply) => {
                let result = if self.take_injected(StoreOp::Delete) {
                    Err(StoreError::DeleteFailed("injected failure".into()))
                } else if let Some(idx) = self.position(item.id()) {
                    let removed = self.records.remove(idx);
                    self.broadcast(&Change::Changed(removed));
                    Ok(())
                } else {
                    Err(StoreError::DeleteFailed(format!(
                        "{} does not exist",
                        item.id()
                    )))
                };
                Box::new(move || reply(result))
            }
        }
    }
}

/// Case-insensitive name collation, falling back to the raw bytes.
fn collate(a: &str, b: &str) -> Ordering {
    a.to_lowercase()
        .cmp(&b.to_lowercase())
        .then_with(|| a.cmp(b))
}

fn compare<T: Record>(key: SortKey, a: &T, b: &T) -> Ordering {
    match key {
        SortKey::Created => a.created_at().cmp(&b.created_at()),
        SortKey::Priority => a.priority().cmp(&b.priority()),
        SortKey::Name => collate(a.name(), b.name()),
    }
}

/// A [`Store`] kept entirely in memory.
pub struct MemoryStore<T: Record> {
    shared: Arc<Mutex<Shared<T>>>,
    jobs: Option<Sender<Job<T>>>,
    worker: Option<JoinHandle<()>>,
}

impl<T: Record> MemoryStore<T> {
    #[must_use]
    pub fn new() -> Self {
        Self::with_records(Vec::new())
    }

    /// Start a store that already holds `records`, in natural order.
    #[must_use]
    pub fn with_records(records: Vec<T>) -> Self {
        let shared = Arc::new(Mutex::new(Shared {
            records,
            subscribers: Vec::new(),
            injected: HashMap::new(),
            latency: Duration::ZERO,
        }));
        let (tx, rx) = mpsc::channel::<Job<T>>();
        let worker_shared = Arc::clone(&shared);
        let worker = thread::spawn(move || {
            for job in rx {
                let latency = lock(&worker_shared).latency;
                if !latency.is_zero() {
                    thread::sleep(latency);
                }
                let deliver = lock(&worker_shared).run(job);
                deliver();
            }
            debug!("memory store worker stopped");
        });
        Self {
            shared,
            jobs: Some(tx),
            worker: Some(worker),
        }
    }

    /// Delay every job by `latency` before it runs.
    #[must_use]
    pub fn with_latency(self, latency: Duration) -> Self {
        self.set_latency(latency);
        self
    }

    pub fn set_latency(&self, latency: Duration) {
        lock(&self.shared).latency = latency;
    }

    /// Make the next `op` fail. Calls accumulate.
    pub fn fail_next(&self, op: StoreOp) {
        *lock(&self.shared).injected.entry(op).or_insert(0) += 1;
    }

    /// Current records in natural order. Jobs still queued are not reflected.
    #[must_use]
    pub fn snapshot(&self) -> Vec<T> {
        lock(&self.shared).records.clone()
    }

    fn submit(&self, job: Job<T>) {
        let Some(jobs) = &self.jobs else {
            return;
        };
        if let Err(mpsc::SendError(job)) = jobs.send(job) {
            warn!("memory store worker is gone; failing job");
            let deliver: Box<dyn FnOnce() + Send> = match job {
                Job::Query(_, reply) => {
                    Box::new(move || reply(Err(StoreError::QueryFailed("store closed".into()))))
                }
                Job::Create(_, reply) | Job::Update(_, reply) => {
                    Box::new(move || reply(Err(StoreError::SaveFailed("store closed".into()))))
                }
                Job::Delete(_, reply) => {
                    Box::new(move || reply(Err(StoreError::DeleteFailed("store closed".into()))))
                }
            };
            deliver();
        }
    }
}

impl<T: Record> Default for MemoryStore<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Record> Store<T> for MemoryStore<T> {
    fn query(&self, sort: Option<QuerySort>, reply: Reply<Vec<T>>) {
        self.submit(Job::Query(sort, reply));
    }

    fn create(&self, item: T, reply: Reply<()>) {
        self.submit(Job::Create(item, reply));
    }

    fn update(&self, item: T, reply: Reply<()>) {
        self.submit(Job::Update(item, reply));
    }

    fn delete(&self, item: T, reply: Reply<()>) {
        self.submit(Job::Delete(item, reply));
    }

    fn observe(&self) -> Receiver<Change<T>> {
        let (tx, rx) = mpsc::channel();
        let mut shared = lock(&self.shared);
        if tx.send(Change::Started).is_ok() {
            shared.subscribers.push(tx);
        }
        rx
    }
}

impl<T: Record> Drop for MemoryStore<T> {
    fn drop(&mut self) {
        drop(self.jobs.take());
        if let Some(worker) = self.worker.take() {
            if worker.join().is_err() {
                warn!("memory store worker panicked");
            }
        }
        let mut shared = lock(&self.shared);
        shared.broadcast(&Change::Completed);
        shared.subscribers.clear();
    }
}

fn lock<T>(shared: &Mutex<Shared<T>>) -> std::sync::MutexGuard<'_, Shared<T>> {
    shared.lock().unwrap_or_else(PoisonError::into_inner)
}
