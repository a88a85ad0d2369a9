//! In-memory test double for the remote store
//!
//! `MemoryStore` keeps a parent -> children tree and object contents in
//! memory, serves media streams in fixed-size chunks, and counts every call
//! so tests can assert exactly how much remote traffic an operation caused.
//!
//! # Example
//!
//! ```rust,ignore
//! use common::testkit::MemoryStore;
//!
//! let store = MemoryStore::new(4);
//! store.add_file("root", "A1", "report.txt", b"0123456789".to_vec());
//! assert_eq!(store.calls().total(), 0);
//! ```
mod memory;

pub use memory::{CallCounts, MemoryStore};
