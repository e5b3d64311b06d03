//! Session lifecycle and its durable storage

pub mod controller;
pub mod storage;

pub use controller::{SessionController, SESSION_STORAGE_KEY};
pub use storage::{FileStore, MemoryStore};
