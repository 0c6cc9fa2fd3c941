//! # Bounded Blocking Queue
//!
//! Capacity-bounded FIFO mailbox between producer and consumer threads.
//!
//! ## Design
//!
//! A mutex-guarded deque with two condition variables (`not_empty`,
//! `not_full`). Every operation takes a timeout in milliseconds with the
//! convention:
//!
//! - `ms == 0`: non-blocking, fail immediately if the queue is full/empty
//! - `ms > 0`: wait at most that long
//! - `ms < 0`: wait indefinitely
//!
//! Every successful write wakes one reader and every successful read wakes
//! one writer. [`resume_writer`](BoundedQueue::resume_writer) and
//! [`resume_reader`](BoundedQueue::resume_reader) are manual wake-ups that
//! do not alter queue state; a blocked operation that is woken while its
//! condition still does not hold gives up and reports failure, so they can
//! be used to break indefinite waits during shutdown.
//!
//! Queue operations never return errors; a timeout surfaces as `Err(value)`
//! from `write` (handing the rejected value back) or `None` from `read`.

use std::collections::VecDeque;
use std::fmt;
use std::io::{self, Write};
use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex};

use crate::config::QueueConfig;

struct Inner<T> {
    buf: VecDeque<T>,
    name: String,
}

/// A bounded FIFO queue with blocking, timed and non-blocking operations.
pub struct BoundedQueue<T> {
    inner: Mutex<Inner<T>>,
    not_empty: Condvar,
    not_full: Condvar,
    capacity: usize,
}

impl<T> BoundedQueue<T> {
    /// Create a queue holding at most `capacity` elements.
    pub fn new(capacity: usize, name: impl Into<String>) -> Self {
        Self {
            inner: Mutex::new(Inner {
                buf: VecDeque::with_capacity(capacity.max(1)),
                name: name.into(),
            }),
            not_empty: Condvar::new(),
            not_full: Condvar::new(),
            capacity: capacity.max(1),
        }
    }

    /// Create a queue from a [`QueueConfig`].
    pub fn with_config(config: QueueConfig) -> Self {
        Self::new(config.capacity, config.name)
    }

    /// Append `value`, waiting for space according to `ms`.
    ///
    /// Returns `Err(value)` when the queue stayed full for the whole wait,
    /// or when an indefinite wait was woken without space by
    /// [`resume_writer`](Self::resume_writer).
    pub fn write(&self, value: T, ms: i64) -> Result<(), T> {
        let mut inner = self.inner.lock();

        if ms == 0 {
            if inner.buf.len() >= self.capacity {
                return Err(value);
            }
        } else if ms > 0 {
            let deadline = Instant::now() + Duration::from_millis(ms as u64);
            while inner.buf.len() >= self.capacity {
                if self.not_full.wait_until(&mut inner, deadline).timed_out()
                    && inner.buf.len() >= self.capacity
                {
                    return Err(value);
                }
            }
        } else {
            while inner.buf.len() >= self.capacity {
                self.not_full.wait(&mut inner);
                if inner.buf.len() >= self.capacity {
                    // Woken without space: a manual resume during shutdown.
                    return Err(value);
                }
            }
        }

        inner.buf.push_back(value);
        drop(inner);
        self.not_empty.notify_one();
        Ok(())
    }

    /// Remove the oldest element, waiting for data according to `ms`.
    ///
    /// Returns `None` when the queue stayed empty for the whole wait, or
    /// when an indefinite wait was woken without data by
    /// [`resume_reader`](Self::resume_reader).
    pub fn read(&self, ms: i64) -> Option<T> {
        let mut inner = self.inner.lock();

        if ms == 0 {
            if inner.buf.is_empty() {
                return None;
            }
        } else if ms > 0 {
            let deadline = Instant::now() + Duration::from_millis(ms as u64);
            while inner.buf.is_empty() {
                if self.not_empty.wait_until(&mut inner, deadline).timed_out()
                    && inner.buf.is_empty()
                {
                    return None;
                }
            }
        } else {
            while inner.buf.is_empty() {
                self.not_empty.wait(&mut inner);
                if inner.buf.is_empty() {
                    // Woken without data: a manual resume during shutdown.
                    return None;
                }
            }
        }

        let value = inner.buf.pop_front();
        drop(inner);
        self.not_full.notify_one();
        value
    }

    /// Number of elements currently queued.
    pub fn size(&self) -> usize {
        self.inner.lock().buf.len()
    }

    /// Whether the queue is empty.
    pub fn is_empty(&self) -> bool {
        self.inner.lock().buf.is_empty()
    }

    /// Maximum number of elements the queue holds.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Drop every queued element and wake one blocked writer.
    pub fn clear(&self) {
        let mut inner = self.inner.lock();
        inner.buf.clear();
        drop(inner);
        self.not_full.notify_one();
    }

    /// Wake one writer blocked on a full queue without changing state.
    pub fn resume_writer(&self) {
        self.not_full.notify_one();
    }

    /// Wake one reader blocked on an empty queue without changing state.
    pub fn resume_reader(&self) {
        self.not_empty.notify_one();
    }

    /// Set the queue name used in diagnostics.
    pub fn set_name(&self, name: impl Into<String>) {
        self.inner.lock().name = name.into();
    }

    /// Get the queue name.
    pub fn get_name(&self) -> String {
        self.inner.lock().name.clone()
    }
}

impl<T: fmt::Display> BoundedQueue<T> {
    /// Write the queued elements to `sink`, one line per element.
    pub fn print<W: Write>(&self, sink: &mut W) -> io::Result<()> {
        let inner = self.inner.lock();
        for (idx, value) in inner.buf.iter().enumerate() {
            writeln!(sink, "Queue[{}] idx:{}, val:{}", inner.name, idx, value)?;
        }
        Ok(())
    }
}

impl<T> fmt::Debug for BoundedQueue<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let inner = self.inner.lock();
        f.debug_struct("BoundedQueue")
            .field("name", &inner.name)
            .field("len", &inner.buf.len())
            .field("capacity", &self.capacity)
            .finish()
    }
}
