//! # pagelog storage
//!
//! Storage backend trait and implementations for the pagelog write-ahead log.
//!
//! This crate provides the lowest-level storage abstraction for pagelog.
//! Storage backends are **opaque byte stores** - they append, read back, and
//! truncate raw bytes without interpreting them. Pages, fragments, and
//! segment framing are all owned by the core crate; a backend only ever sees
//! the finished byte runs.
//!
//! ## Design Principles
//!
//! - Backends are simple byte stores (append, read, flush, truncate)
//! - No knowledge of pages, fragments, or segment naming
//! - Must be `Send + Sync` so readers can observe a backend concurrently
//!
//! ## Available Backends
//!
//! - [`InMemoryBackend`] - For tests and crash simulations
//! - [`FileBackend`] - For persistent segment files
//!
//! ## Example
//!
//! ```rust
//! use pagelog_storage::{StorageBackend, InMemoryBackend};
//!
//! let mut backend = InMemoryBackend::new();
//! let offset = backend.append(b"fragment bytes").unwrap();
//! let data = backend.read_at(offset, 14).unwrap();
//! assert_eq!(&data, b"fragment bytes");
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod backend;
mod error;
mod file;
mod memory;

pub use backend::StorageBackend;
pub use error::{StorageError, StorageResult};
pub use file::FileBackend;
pub use memory::InMemoryBackend;
