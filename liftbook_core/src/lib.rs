#![forbid(unsafe_code)]

//! Core domain model and persistence for the Liftbook workout library.
//!
//! This crate provides:
//! - Domain types (folders, workouts, exercises, selection, snapshots)
//! - JSON codec for the persisted library document
//! - Storage adapters (atomic file storage, in-memory storage)
//! - The workout store with change notification
//! - Configuration, logging and CSV export

pub mod types;
pub mod error;
pub mod config;
pub mod logging;
pub mod codec;
pub mod storage;
pub mod observer;
pub mod store;
pub mod export;

// Re-export commonly used types
pub use error::{Error, Result};
pub use types::*;
pub use config::Config;
pub use storage::{FileStorage, MemoryStorage, Storage};
pub use observer::{Subscription, SubscriptionId};
pub use store::{Clock, SystemClock, WorkoutStore};
pub use export::export_csv;
