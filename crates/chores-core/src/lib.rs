//! chores-core library.
//!
//! Keeps an on-screen to-do list, its hidden completed items and an
//! asynchronous store in agreement.
//!
//! # Conventions
//!
//! - **Errors**: `thiserror` enums for caller and store errors, `anyhow::Result`
//!   for configuration loading.
//! - **Logging**: `tracing` macros (`info!`, `warn!`, `error!`, `debug!`, `trace!`).

#![forbid(unsafe_code)]

pub mod clock;
pub mod config;
pub mod controller;
pub mod error;
pub mod model;
pub mod reconcile;
pub mod store;
pub mod view;

pub use controller::TodoController;
pub use error::{ErrorCode, ListError, StoreError};
pub use model::{Direction, Priority, Record, SortKey, Todo};
pub use reconcile::{CompletedItems, ListReconciler};
pub use store::{MemoryStore, Store, StoreOp};
