//! # Streaming JSON Framing
//!
//! Byte-wise detection of complete top-level JSON values in an unbounded
//! stream, without parsing their contents.
//!
//! ## Design
//!
//! [`JsonScanner`] is the framing state machine: it classifies one byte at
//! a time, tracking brace/bracket depth and string/escape state, and
//! reports the byte that completes a top-level object or array. It never
//! materializes a parse tree and never rejects input; malformed JSON
//! either never completes or produces a structurally balanced payload for
//! the caller's value parser to judge.
//!
//! Two framers wrap the scanner and emit each complete value to a
//! callback:
//!
//! - [`IncrementalFramer`]: a linear buffer with a scan cursor; consumed
//!   bytes are drained after each emission.
//! - [`RingFramer`]: a ring buffer that doubles its capacity whenever it
//!   fills, so a single value larger than the ring is still framed whole.
//!
//! Both emit the exact byte span of the value: whitespace *between*
//! top-level values is skipped, whitespace *inside* a value is preserved.

use std::fmt;
use std::str::FromStr;

use thiserror::Error;
use tracing::debug;

use crate::config::FramerConfig;

/// Callback receiving the raw bytes of each complete top-level value.
pub type JsonCallback = Box<dyn FnMut(&[u8]) + Send>;

/// Callback receiving error descriptions from a value-parsing layer.
///
/// The framers themselves never produce errors; this channel is reserved
/// for consumers that parse the emitted payloads.
pub type ErrorCallback = Box<dyn FnMut(&str) + Send>;

/// Error returned by the framer factory.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FramerError {
    /// The requested framer kind is not recognized.
    #[error("invalid framer kind: {0}")]
    InvalidParserKind(String),
}

// ============================================================================
// Framing state machine
// ============================================================================

/// Byte-wise classifier detecting the completion of one top-level JSON
/// value (object or array).
///
/// Feed bytes with [`feed`](Self::feed); once it returns `true`, call
/// [`reset`](Self::reset) before framing the next value.
#[derive(Debug, Clone, Default)]
pub struct JsonScanner {
    brace_depth: u32,
    bracket_depth: u32,
    in_string: bool,
    escaped: bool,
    started: bool,
}

impl JsonScanner {
    /// Create a scanner in its initial state.
    pub fn new() -> Self {
        Self::default()
    }

    /// Return the scanner to its initial state.
    pub fn reset(&mut self) {
        *self = Self::default();
    }

    /// Whether the scanner has seen the opening byte of a value.
    pub fn is_started(&self) -> bool {
        self.started
    }

    /// Whether a complete value has been seen: started and both depths
    /// back to zero.
    pub fn is_complete(&self) -> bool {
        self.started && self.brace_depth == 0 && self.bracket_depth == 0
    }

    /// Classify one byte. Returns `true` iff `byte` is the last byte of a
    /// complete top-level value.
    ///
    /// A closing brace or bracket whose counter is already zero is
    /// silently ignored, which keeps the machine resilient to leading
    /// noise. Whitespace and other non-structural bytes outside strings
    /// are no-ops.
    pub fn feed(&mut self, byte: u8) -> bool {
        if self.escaped {
            self.escaped = false;
            return false;
        }
        if byte == b'\\' && self.in_string {
            self.escaped = true;
            return false;
        }
        if byte == b'"' {
            self.in_string = !self.in_string;
            return false;
        }
        if self.in_string {
            return false;
        }

        match byte {
            b'{' => {
                self.started = true;
                self.brace_depth += 1;
            }
            b'}' => {
                if self.brace_depth > 0 {
                    self.brace_depth -= 1;
                    if self.is_complete() {
                        return true;
                    }
                }
            }
            b'[' => {
                self.started = true;
                self.bracket_depth += 1;
            }
            b']' => {
                if self.bracket_depth > 0 {
                    self.bracket_depth -= 1;
                    if self.is_complete() {
                        return true;
                    }
                }
            }
            _ => {}
        }
        false
    }
}

// ============================================================================
// Framer interface and factory
// ============================================================================

/// A streaming framer extracting complete top-level JSON values.
pub trait Framer: Send {
    /// Consume a slice of stream bytes, invoking the value callback for
    /// each complete value found. Partial trailing bytes are retained.
    fn push(&mut self, data: &[u8]);

    /// Discard buffered bytes and reset framing state. Afterwards the
    /// framer behaves as freshly constructed.
    fn clear(&mut self);
}

/// The available framer implementations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FramerKind {
    /// Linear buffer with drained emissions.
    Incremental,
    /// Growable ring buffer.
    RingBuffer,
}

impl FromStr for FramerKind {
    type Err = FramerError;

    fn from_str(s: &str) -> Result<Self, FramerError> {
        match s.to_lowercase().as_str() {
            "incremental" => Ok(FramerKind::Incremental),
            "ring" | "ring_buffer" | "ringbuffer" => Ok(FramerKind::RingBuffer),
            other => Err(FramerError::InvalidParserKind(other.to_string())),
        }
    }
}

impl fmt::Display for FramerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FramerKind::Incremental => write!(f, "incremental"),
            FramerKind::RingBuffer => write!(f, "ring_buffer"),
        }
    }
}

/// Create a framer of the given kind.
///
/// `buffer_size` is the initial ring capacity and is ignored by the
/// incremental variant.
pub fn create(
    kind: FramerKind,
    on_json: JsonCallback,
    on_error: Option<ErrorCallback>,
    buffer_size: usize,
) -> Box<dyn Framer> {
    match kind {
        FramerKind::Incremental => Box::new(IncrementalFramer::new(on_json, on_error)),
        FramerKind::RingBuffer => Box::new(RingFramer::new(on_json, on_error, buffer_size)),
    }
}

// ============================================================================
// Incremental framer
// ============================================================================

/// Framer backed by a linear buffer.
///
/// Incoming bytes are appended and scanned from a cursor; whitespace
/// between values is skipped without feeding the scanner, so it never
/// pollutes the machine. After each emission the consumed prefix is
/// drained and scanning restarts at the front.
pub struct IncrementalFramer {
    buf: Vec<u8>,
    /// Index of the next byte to classify.
    cursor: usize,
    /// Index where the current value started, once the scanner is started.
    value_start: Option<usize>,
    scanner: JsonScanner,
    on_json: JsonCallback,
    #[allow(dead_code)]
    on_error: Option<ErrorCallback>,
}

impl IncrementalFramer {
    /// Create an incremental framer.
    pub fn new(on_json: JsonCallback, on_error: Option<ErrorCallback>) -> Self {
        Self {
            buf: Vec::new(),
            cursor: 0,
            value_start: None,
            scanner: JsonScanner::new(),
            on_json,
            on_error,
        }
    }
}

impl Framer for IncrementalFramer {
    fn push(&mut self, data: &[u8]) {
        self.buf.extend_from_slice(data);

        let mut i = self.cursor;
        while i < self.buf.len() {
            let byte = self.buf[i];

            if !self.scanner.is_started() {
                // Inter-value whitespace is skipped, not fed.
                if byte.is_ascii_whitespace() {
                    i += 1;
                    continue;
                }
                self.scanner.feed(byte);
                if self.scanner.is_started() {
                    self.value_start = Some(i);
                }
                i += 1;
                continue;
            }

            if self.scanner.feed(byte) {
                let start = self.value_start.unwrap_or(0);
                let emitted = &self.buf[start..=i];
                (self.on_json)(emitted);

                self.buf.drain(..=i);
                self.scanner.reset();
                self.value_start = None;
                i = 0;
                continue;
            }
            i += 1;
        }
        self.cursor = i;
    }

    fn clear(&mut self) {
        self.buf.clear();
        self.cursor = 0;
        self.value_start = None;
        self.scanner.reset();
    }
}

// ============================================================================
// Ring-buffer framer
// ============================================================================

/// Framer backed by a ring buffer that grows on demand.
///
/// One slot is always left free, so `head == tail` unambiguously means
/// empty. When the next insertion would collide with `head`, the ring is
/// copied into a linear buffer of twice the capacity (`head` becomes 0)
/// before the byte is stored.
pub struct RingFramer {
    buf: Vec<u8>,
    head: usize,
    tail: usize,
    scanner: JsonScanner,
    on_json: JsonCallback,
    on_error: Option<ErrorCallback>,
}

impl RingFramer {
    /// Create a ring framer with the given initial capacity.
    pub fn new(on_json: JsonCallback, on_error: Option<ErrorCallback>, capacity: usize) -> Self {
        Self {
            buf: vec![0; capacity.max(2)],
            head: 0,
            tail: 0,
            scanner: JsonScanner::new(),
            on_json,
            on_error,
        }
    }

    /// Create a ring framer from a [`FramerConfig`].
    pub fn with_config(
        on_json: JsonCallback,
        on_error: Option<ErrorCallback>,
        config: FramerConfig,
    ) -> Self {
        Self::new(on_json, on_error, config.initial_capacity)
    }

    /// Number of bytes currently stored.
    pub fn len(&self) -> usize {
        let capacity = self.buf.len();
        (self.tail + capacity - self.head) % capacity
    }

    /// Whether the ring holds no bytes.
    pub fn is_empty(&self) -> bool {
        self.head == self.tail
    }

    /// Current ring capacity in bytes.
    pub fn capacity(&self) -> usize {
        self.buf.len()
    }

    /// Double the capacity, linearizing the stored bytes to index 0.
    fn grow(&mut self) {
        let capacity = self.buf.len();
        let mut grown = vec![0u8; capacity * 2];
        let mut len = 0;
        let mut i = self.head;
        while i != self.tail {
            grown[len] = self.buf[i];
            len += 1;
            i = (i + 1) % capacity;
        }
        self.buf = grown;
        self.head = 0;
        self.tail = len;
        debug!(capacity = self.buf.len(), "ring framer grew");
    }

    /// Walk the ring from `head`, identify the completed value with a
    /// self-contained re-scan, emit it and advance `head` past it.
    ///
    /// Everything before the value is guaranteed to have been consumed by
    /// a prior emission or to be inter-value noise, so the walk starts at
    /// the first opening brace or bracket.
    fn extract_and_emit(&mut self) {
        let capacity = self.buf.len();
        let mut value = Vec::new();
        let mut started = false;
        let mut braces = 0u32;
        let mut brackets = 0u32;
        let mut in_string = false;
        let mut escaped = false;
        let mut found = false;

        let mut i = self.head;
        while i != self.tail {
            let byte = self.buf[i];

            if !started {
                if byte == b'{' || byte == b'[' {
                    started = true;
                } else {
                    i = (i + 1) % capacity;
                    continue;
                }
            }

            value.push(byte);

            if escaped {
                escaped = false;
            } else if byte == b'\\' && in_string {
                escaped = true;
            } else if byte == b'"' {
                in_string = !in_string;
            } else if !in_string {
                match byte {
                    b'{' => braces += 1,
                    b'}' => braces = braces.saturating_sub(1),
                    b'[' => brackets += 1,
                    b']' => brackets = brackets.saturating_sub(1),
                    _ => {}
                }
                if braces == 0 && brackets == 0 && matches!(byte, b'}' | b']') {
                    self.head = (i + 1) % capacity;
                    found = true;
                    break;
                }
            }

            i = (i + 1) % capacity;
        }

        if found {
            (self.on_json)(&value);
        } else if let Some(on_error) = &mut self.on_error {
            on_error("completion signalled but no balanced value found in ring");
        }
    }
}

impl Framer for RingFramer {
    fn push(&mut self, data: &[u8]) {
        for &byte in data {
            // One-short-of-full triggers growth before the store.
            if (self.tail + 1) % self.buf.len() == self.head {
                self.grow();
            }
            self.buf[self.tail] = byte;
            self.tail = (self.tail + 1) % self.buf.len();

            if self.scanner.feed(byte) {
                self.extract_and_emit();
                self.scanner.reset();
            }
        }
    }

    fn clear(&mut self) {
        self.head = 0;
        self.tail = 0;
        self.scanner.reset();
    }
}

// ============================================================================
// Tests
// ============================================================================
