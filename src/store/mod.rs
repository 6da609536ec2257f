//! Store - Concurrent In-Memory Primitives
//!
//! TigerStyle: the fakes own their data through two small primitives.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────┐        ┌──────────────────────────────┐
//! │   AppendLog<T>       │        │   BucketMap<V>               │
//! │   Vec<T> + RwLock    │        │   bucket → key → V + RwLock  │
//! └──────────┬───────────┘        └──────────────┬───────────────┘
//!            │                                   │
//!      ┌─────┴─────┐                      ┌──────┴────────┐
//!      │ SimEmail  │                      │SimBlobStorage │
//!      └───────────┘                      └───────────────┘
//! ```
//!
//! Locks are held only for the in-memory mutation itself, never across an
//! `.await`, so callers never need their own synchronization.

mod append_log;
mod bucket_map;

pub use append_log::AppendLog;
pub use bucket_map::BucketMap;
