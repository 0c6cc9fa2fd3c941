//! # Keystone
//!
//! Reusable systems primitives:
//!
//! - **Object Pool**: thread-caching fixed-size allocator over aligned
//!   slab chunks, with debug-mode leak and use-after-free tracking
//! - **Bounded Queue**: blocking FIFO mailbox with non-blocking, timed
//!   and indefinite wait modes
//! - **JSON Framing**: byte-wise detection of complete top-level JSON
//!   values in an unbounded stream, with linear and ring-buffered framers
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                         KEYSTONE                                 │
//! ├─────────────────────────────────────────────────────────────────┤
//! │                                                                  │
//! │  ┌──────────────┐  ┌──────────────┐  ┌──────────────┐          │
//! │  │    Pool      │  │    Queue     │  │   Framing    │          │
//! │  │  (pool.rs)   │  │  (queue.rs)  │  │ (framing.rs) │          │
//! │  └──────────────┘  └──────────────┘  └──────────────┘          │
//! │         │                 │                 │                   │
//! │         └─────────────────┴─────────────────┘                   │
//! │                           │                                     │
//! │                  ┌──────────────┐                               │
//! │                  │    Config    │                               │
//! │                  │ (config.rs)  │                               │
//! │                  └──────────────┘                               │
//! │                                                                  │
//! └─────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Example
//!
//! ```rust,ignore
//! use keystone::{Pool, BoundedQueue, framing::{self, FramerKind}};
//!
//! let pool = Pool::<u64>::new(1024, 0)?;
//! let value = pool.make_owned(7)?;
//!
//! let queue = BoundedQueue::new(100, "jobs");
//! queue.write(*value, -1).ok();
//!
//! let mut framer = framing::create(
//!     FramerKind::RingBuffer,
//!     Box::new(|json| println!("{}", String::from_utf8_lossy(json))),
//!     None,
//!     8192,
//! );
//! framer.push(br#"{"event":"ready"}"#);
//! ```

#![warn(missing_docs)]
#![warn(rust_2018_idioms)]

pub mod config;
pub mod framing;
pub mod pool;
pub mod queue;

// Re-exports
pub use config::{ConfigError, FramerConfig, PoolConfig, QueueConfig};
pub use framing::{Framer, FramerError, FramerKind, IncrementalFramer, JsonScanner, RingFramer};
pub use pool::{BuildError, Pool, PoolError, Pooled};
pub use queue::BoundedQueue;

/// Crate version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
