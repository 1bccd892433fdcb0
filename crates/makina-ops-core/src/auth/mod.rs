//! Authentication state for the console.
//!
//! This module provides:
//! - `SessionStore`: the current user and token pair, with change notifications
//! - `SessionStorage`: durable backends for the persisted snapshot
//!   (`FileStorage`, `KeyringStorage`, `MemoryStorage`)
//!
//! The snapshot is written on every mutation and removed on logout.

pub mod session;
pub mod storage;

pub use session::{Session, SessionEvent, SessionStore, STORAGE_KEY};
pub use storage::{FileStorage, KeyringStorage, MemoryStorage, SessionStorage};
