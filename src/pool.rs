//! # Fixed-Size Object Pool
//!
//! Thread-caching pool allocator for objects of a single type.
//!
//! ## Design
//!
//! The pool carves aligned slab chunks into fixed-size blocks and threads
//! the free blocks onto intrusive singly-linked lists:
//!
//! - A **global free list** protected by one mutex, together with the
//!   chunk table and the block totals.
//! - A **per-thread cache** holding a short run of free blocks, so the
//!   common allocate/deallocate path never takes the global lock. Caches
//!   refill from and flush to the global list in batches.
//!
//! A block is always in exactly one place: on the global list, on one
//! thread's cache, or owned by the caller. Chunks are only ever released
//! on pool teardown (or, optionally, under memory pressure when every
//! block of a chunk is back on the global list).
//!
//! Debug builds additionally track every issued pointer in an audit set,
//! detect double/invalid frees, poison freed blocks with a dead pattern,
//! and report leaks on teardown.
//!
//! ## Lock order
//!
//! Cache map → global state → audit set. Locks are never taken in the
//! reverse order, and no user code (initializers, destructors) runs while
//! the global lock is held.

use std::alloc::{alloc, dealloc, Layout};
use std::cell::UnsafeCell;
use std::collections::HashMap;
use std::fmt;
use std::io::{self, Write};
use std::marker::PhantomData;
use std::mem;
use std::ops::{Deref, DerefMut};
use std::ptr::{self, NonNull};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::thread::{self, ThreadId};

use parking_lot::Mutex;
use thiserror::Error;
use tracing::{debug, error, trace};

#[cfg(debug_assertions)]
use std::collections::HashSet;

use crate::config::PoolConfig;

/// Error returned by pool operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum PoolError {
    /// The pool reached its configured `max_chunks` and no free block is
    /// available anywhere.
    #[error("pool is at its maximum chunk count and has no free blocks")]
    OutOfCapacity,

    /// The underlying allocator refused a chunk allocation and the retry
    /// budget (if any) is exhausted.
    #[error("chunk allocation failed: out of memory")]
    OutOfMemory,

    /// A pointer passed to `deallocate` was not currently issued by this
    /// pool. Only raised in debug builds.
    #[error("deallocating a pointer that was not issued by this pool")]
    InvalidFree,

    /// Live allocations remained when the pool was checked for leaks.
    #[error("pool leak check found {live} live allocation(s)")]
    LeakDetected {
        /// Number of pointers still outstanding.
        live: usize,
    },
}

/// Error returned by [`Pool::try_construct_with`].
#[derive(Debug, Error)]
pub enum BuildError<E> {
    /// The pool could not provide a block.
    #[error(transparent)]
    Pool(#[from] PoolError),

    /// The initializer failed. The block was returned to the pool and the
    /// original error is carried here unchanged.
    #[error("object initializer failed")]
    Init(E),
}

/// Dead pattern written into freed blocks in debug builds.
#[cfg(debug_assertions)]
const DEAD_PATTERN: usize = 0xDEAD_BEEF;

/// Round `value` up to the nearest multiple of `align` (a power of 2).
fn round_up(value: usize, align: usize) -> usize {
    (value + align - 1) & !(align - 1)
}

// ============================================================================
// Free list node
// ============================================================================

/// In-block free list node. Overlays a free block; never coexists with a
/// live `T` in the same storage.
struct FreeLink {
    next: *mut FreeLink,
}

// ============================================================================
// Chunk
// ============================================================================

/// One slab holding a contiguous run of blocks.
///
/// Alignment uses a header-prefix scheme: the slab is over-allocated by one
/// pointer plus the alignment padding, the user region is aligned manually,
/// and the raw base pointer is written into the word immediately preceding
/// the user region so release can recover it. This supports any alignment
/// without relying on an aligned-allocation primitive.
struct Chunk {
    /// First block; aligned to the pool alignment.
    base: *mut u8,
    /// Bytes spanned by the blocks.
    span: usize,
    /// Layout of the raw over-allocation backing this chunk.
    layout: Layout,
}

// SAFETY: a chunk is plain memory ownership; the pointers are only used
// under the pool's locks or during teardown.
unsafe impl Send for Chunk {}

impl Chunk {
    /// Allocate a slab of `span` bytes aligned to `alignment`.
    fn allocate(span: usize, alignment: usize) -> Option<Self> {
        let header = mem::size_of::<*mut u8>();
        let total = span + header + (alignment - 1);
        let layout = Layout::from_size_align(total, mem::align_of::<*mut u8>()).ok()?;

        // SAFETY: `total` is non-zero (span >= 1 block).
        let raw = unsafe { alloc(layout) };
        if raw.is_null() {
            return None;
        }

        let aligned = round_up(raw as usize + header, alignment);
        // Stash the raw base in the word just below the user region.
        // SAFETY: `aligned - header >= raw` by construction and the write
        // stays inside the allocation; may be unaligned for small block
        // alignments.
        unsafe {
            ptr::write_unaligned((aligned - header) as *mut *mut u8, raw);
        }

        Some(Self {
            base: aligned as *mut u8,
            span,
            layout,
        })
    }

    /// Whether `addr` falls inside this chunk's block region.
    fn contains(&self, addr: usize) -> bool {
        let base = self.base as usize;
        addr >= base && addr < base + self.span
    }

    /// Release the backing allocation.
    ///
    /// # Safety
    ///
    /// Must be called at most once, with no live blocks inside the chunk.
    unsafe fn release(&self) {
        let header = mem::size_of::<*mut u8>();
        let raw = ptr::read_unaligned((self.base as usize - header) as *const *mut u8);
        dealloc(raw, self.layout);
    }
}

// ============================================================================
// Global state
// ============================================================================

/// State shared by every thread, guarded by the pool's global mutex.
struct GlobalState {
    /// Chunk table in allocation order.
    chunks: Vec<Chunk>,
    /// Head of the global free list.
    free_head: *mut FreeLink,
    /// Blocks on the global free list.
    free_count: usize,
    /// Total blocks carved out of all chunks.
    total: usize,
}

// SAFETY: the raw list pointers are only dereferenced while the state is
// locked; a linked block never aliases a live `T`.
unsafe impl Send for GlobalState {}

// ============================================================================
// Thread cache
// ============================================================================

/// Per-thread magazine of free blocks.
struct ThreadCache {
    /// Head of the cached free list. Only the thread whose id keys this
    /// cache dereferences or rewrites it; other threads read `count` only.
    head: UnsafeCell<*mut FreeLink>,
    /// Blocks on this cache, readable from any thread.
    count: AtomicUsize,
}

impl ThreadCache {
    fn new() -> Self {
        Self {
            head: UnsafeCell::new(ptr::null_mut()),
            count: AtomicUsize::new(0),
        }
    }
}

// SAFETY: `head` is touched only by the owning thread (or by `Drop`, which
// has exclusive access to the pool); `count` is atomic.
unsafe impl Send for ThreadCache {}
unsafe impl Sync for ThreadCache {}

// ============================================================================
// Pool
// ============================================================================

/// A thread-caching fixed-size object pool for values of type `T`.
///
/// Blocks are sized and aligned to hold either a `T` or a free-list node,
/// whichever is larger. The common allocate/deallocate path is lock-free
/// (thread-local); the global lock is taken only on batch refill and flush.
pub struct Pool<T> {
    config: PoolConfig,
    /// Aligned size of one block.
    block_size: usize,
    /// Block alignment: `max(align_of::<T>(), align_of::<FreeLink>())`.
    alignment: usize,
    global: Mutex<GlobalState>,
    /// Lazily created caches keyed by thread identity. Entries are only
    /// removed on teardown, so their boxed addresses are stable.
    caches: Mutex<HashMap<ThreadId, Box<ThreadCache>>>,
    #[cfg(debug_assertions)]
    audit: Mutex<HashSet<usize>>,
    _marker: PhantomData<T>,
}

// SAFETY: blocks handed out are exclusively owned by the receiving caller;
// all interior bookkeeping is lock- or owner-thread-protected.
unsafe impl<T: Send> Send for Pool<T> {}
unsafe impl<T: Send> Sync for Pool<T> {}

impl<T> Pool<T> {
    /// Create a pool with `chunk_block_count` blocks per chunk and at most
    /// `max_chunks` chunks (0 = unbounded). The first chunk is allocated
    /// eagerly.
    pub fn new(chunk_block_count: usize, max_chunks: usize) -> Result<Self, PoolError> {
        Self::with_config(PoolConfig {
            chunk_block_count,
            max_chunks,
            ..PoolConfig::default()
        })
    }

    /// Create a pool from a full [`PoolConfig`].
    pub fn with_config(mut config: PoolConfig) -> Result<Self, PoolError> {
        if config.chunk_block_count == 0 {
            config.chunk_block_count = 1;
        }

        let alignment = mem::align_of::<T>().max(mem::align_of::<FreeLink>());
        let block_size = round_up(
            mem::size_of::<T>().max(mem::size_of::<FreeLink>()),
            alignment,
        );

        let pool = Self {
            config,
            block_size,
            alignment,
            global: Mutex::new(GlobalState {
                chunks: Vec::new(),
                free_head: ptr::null_mut(),
                free_count: 0,
                total: 0,
            }),
            caches: Mutex::new(HashMap::new()),
            #[cfg(debug_assertions)]
            audit: Mutex::new(HashSet::new()),
            _marker: PhantomData,
        };

        {
            let mut global = pool.global.lock();
            pool.grow_locked(&mut global)?;
        }

        Ok(pool)
    }

    /// Size in bytes of one block.
    pub fn block_size(&self) -> usize {
        self.block_size
    }

    /// Alignment in bytes of every block.
    pub fn alignment(&self) -> usize {
        self.alignment
    }

    // ------------------------------------------------------------------
    // Allocation
    // ------------------------------------------------------------------

    /// Allocate one uninitialized block.
    ///
    /// The returned pointer is block-sized, correctly aligned for `T`, and
    /// exclusively owned by the caller until passed back to
    /// [`deallocate`](Self::deallocate) or [`destroy`](Self::destroy).
    pub fn allocate(&self) -> Result<NonNull<T>, PoolError> {
        let link = if self.config.thread_local_cache {
            self.pop_local()?
        } else {
            self.pop_global()?
        };

        #[cfg(debug_assertions)]
        self.audit.lock().insert(link as usize);

        // SAFETY: free-list nodes are never null.
        Ok(unsafe { NonNull::new_unchecked(link.cast::<T>()) })
    }

    /// Return a block to the pool. No-op on a null pointer.
    ///
    /// In debug builds an invalid or repeated free is reported and the
    /// block is left untouched; the freed payload is overwritten with a
    /// dead pattern before it is relinked.
    ///
    /// # Safety
    ///
    /// `ptr` must have been returned by this pool's `allocate` (and not
    /// freed since), and any `T` it held must already be dropped.
    pub unsafe fn deallocate(&self, ptr: *mut T) {
        if ptr.is_null() {
            return;
        }
        let link = ptr.cast::<FreeLink>();

        #[cfg(debug_assertions)]
        {
            if !self.audit.lock().remove(&(link as usize)) {
                error!(
                    ptr = link as usize,
                    "{}",
                    PoolError::InvalidFree
                );
                debug_assert!(false, "deallocating a pointer not issued by this pool");
                return;
            }
            self.poison(link.cast::<u8>());
        }

        if self.config.thread_local_cache {
            self.push_local(link);
        } else {
            self.push_global(link);
        }
    }

    /// Allocate a block and move `value` into it.
    pub fn construct(&self, value: T) -> Result<NonNull<T>, PoolError> {
        let ptr = self.allocate()?;
        // SAFETY: the block is uninitialized, sized and aligned for `T`.
        unsafe { ptr::write(ptr.as_ptr(), value) };
        Ok(ptr)
    }

    /// Allocate a block and initialize it with `init`.
    ///
    /// If the initializer fails, the block is returned to the pool and the
    /// originating error propagates unchanged.
    pub fn try_construct_with<F, E>(&self, init: F) -> Result<NonNull<T>, BuildError<E>>
    where
        F: FnOnce() -> Result<T, E>,
    {
        let ptr = self.allocate()?;
        match init() {
            Ok(value) => {
                // SAFETY: the block is uninitialized, sized and aligned for `T`.
                unsafe { ptr::write(ptr.as_ptr(), value) };
                Ok(ptr)
            }
            Err(err) => {
                // SAFETY: the block came from `allocate` above and holds no
                // live value.
                unsafe { self.deallocate(ptr.as_ptr()) };
                Err(BuildError::Init(err))
            }
        }
    }

    /// Drop the value in place and return its block to the pool.
    ///
    /// # Safety
    ///
    /// `ptr` must point at a live `T` constructed in this pool, and must
    /// not be used afterwards.
    pub unsafe fn destroy(&self, ptr: NonNull<T>) {
        ptr::drop_in_place(ptr.as_ptr());
        self.deallocate(ptr.as_ptr());
    }

    /// Construct a value and wrap it in a scoped handle that destroys it
    /// automatically when dropped.
    pub fn make_owned(&self, value: T) -> Result<Pooled<'_, T>, PoolError> {
        let ptr = self.construct(value)?;
        Ok(Pooled { pool: self, ptr })
    }

    /// Grow the pool until at least `n_chunks` chunks exist.
    pub fn reserve(&self, n_chunks: usize) -> Result<(), PoolError> {
        let mut global = self.global.lock();
        while global.chunks.len() < n_chunks {
            self.grow_locked(&mut global)?;
        }
        Ok(())
    }

    // ------------------------------------------------------------------
    // Introspection
    // ------------------------------------------------------------------

    /// Free blocks across the global list and every thread cache.
    pub fn free_count(&self) -> usize {
        let cached: usize = {
            let caches = self.caches.lock();
            caches
                .values()
                .map(|cache| cache.count.load(Ordering::Relaxed))
                .sum()
        };
        cached + self.global.lock().free_count
    }

    /// Total blocks carved out of all chunks.
    pub fn total_count(&self) -> usize {
        self.global.lock().total
    }

    /// Blocks currently owned by callers.
    pub fn allocated_count(&self) -> usize {
        self.total_count().saturating_sub(self.free_count())
    }

    /// Number of chunks currently owned by the pool.
    pub fn chunk_count(&self) -> usize {
        self.global.lock().chunks.len()
    }

    /// `true` iff `ptr` lies inside some chunk and is block-aligned
    /// within it.
    pub fn validate_pointer(&self, ptr: *const T) -> bool {
        if ptr.is_null() {
            return false;
        }
        let addr = ptr as usize;
        let global = self.global.lock();
        global
            .chunks
            .iter()
            .any(|chunk| chunk.contains(addr) && (addr - chunk.base as usize) % self.block_size == 0)
    }

    /// Explicit leak check: fails if any issued pointer is still
    /// outstanding. Always succeeds in release builds, where the audit
    /// layer is compiled out.
    pub fn check_leaks(&self) -> Result<(), PoolError> {
        #[cfg(debug_assertions)]
        {
            let live = self.audit.lock().len();
            if live > 0 {
                return Err(PoolError::LeakDetected { live });
            }
        }
        Ok(())
    }

    /// Write a usage summary to `sink`.
    pub fn print_stats<W: Write>(&self, sink: &mut W) -> io::Result<()> {
        let total = self.total_count();
        let free = self.free_count();
        writeln!(sink, "Memory Pool Stats:")?;
        writeln!(sink, "  Total blocks: {}", total)?;
        writeln!(sink, "  Free blocks: {}", free)?;
        writeln!(sink, "  Allocated blocks: {}", total.saturating_sub(free))?;
        writeln!(sink, "  Block size: {} bytes", self.block_size)?;
        writeln!(sink, "  Alignment: {} bytes", self.alignment)?;
        if self.config.max_chunks > 0 {
            writeln!(
                sink,
                "  Chunks allocated: {} (max: {})",
                self.chunk_count(),
                self.config.max_chunks
            )?;
        } else {
            writeln!(sink, "  Chunks allocated: {}", self.chunk_count())?;
        }
        writeln!(
            sink,
            "  Memory usage: {:.1} KB",
            (total * self.block_size) as f64 / 1024.0
        )?;
        writeln!(
            sink,
            "  Thread local cache: {}",
            if self.config.thread_local_cache {
                "enabled"
            } else {
                "disabled"
            }
        )?;
        #[cfg(debug_assertions)]
        writeln!(
            sink,
            "  Currently allocated objects: {}",
            self.audit.lock().len()
        )?;
        Ok(())
    }

    // ------------------------------------------------------------------
    // Thread cache path
    // ------------------------------------------------------------------

    /// Get this thread's cache, creating it on first touch.
    fn thread_cache(&self) -> &ThreadCache {
        let id = thread::current().id();
        let mut caches = self.caches.lock();
        let cache = caches.entry(id).or_insert_with(|| Box::new(ThreadCache::new()));
        let cache: *const ThreadCache = &**cache;
        drop(caches);
        // SAFETY: boxed caches are never removed while the pool is alive
        // (teardown has exclusive access), so the address stays valid.
        unsafe { &*cache }
    }

    fn pop_local(&self) -> Result<*mut FreeLink, PoolError> {
        let cache = self.thread_cache();
        // SAFETY: only the current thread touches this cache's list.
        unsafe {
            if (*cache.head.get()).is_null() {
                self.refill(cache)?;
            }
            let link = *cache.head.get();
            *cache.head.get() = (*link).next;
            cache.count.fetch_sub(1, Ordering::Relaxed);
            Ok(link)
        }
    }

    fn push_local(&self, link: *mut FreeLink) {
        let cache = self.thread_cache();
        // SAFETY: only the current thread touches this cache's list.
        unsafe {
            (*link).next = *cache.head.get();
            *cache.head.get() = link;
        }
        let count = cache.count.fetch_add(1, Ordering::Relaxed) + 1;
        if count > self.config.chunk_block_count {
            self.flush(cache, count / 2);
        }
    }

    /// Move a batch of blocks from the global list onto `cache`.
    ///
    /// Batch size is `min(32, chunk_block_count / 4)`, at least one. Grows
    /// a chunk first if the global list is empty.
    fn refill(&self, cache: &ThreadCache) -> Result<(), PoolError> {
        let batch = (self.config.chunk_block_count / 4).clamp(1, 32);

        let mut global = self.global.lock();
        if global.free_head.is_null() {
            self.grow_locked(&mut global)?;
        }

        let run = global.free_head;
        let mut run_tail = run;
        let mut taken = 1;
        // SAFETY: list nodes are valid while the global lock is held; the
        // detached run becomes owned by this thread's cache below.
        unsafe {
            while taken < batch && !(*run_tail).next.is_null() {
                run_tail = (*run_tail).next;
                taken += 1;
            }
            global.free_head = (*run_tail).next;
            global.free_count -= taken;
            drop(global);

            (*run_tail).next = *cache.head.get();
            *cache.head.get() = run;
        }
        cache.count.fetch_add(taken, Ordering::Relaxed);
        trace!(taken, "refilled thread cache");
        Ok(())
    }

    /// Return the most-recently-freed half of `cache` to the global list
    /// as one splice.
    fn flush(&self, cache: &ThreadCache, return_count: usize) {
        // SAFETY: only the current thread detaches from its own cache; the
        // detached run is spliced under the global lock.
        unsafe {
            let run = *cache.head.get();
            let mut run_tail = run;
            for _ in 1..return_count {
                run_tail = (*run_tail).next;
            }
            *cache.head.get() = (*run_tail).next;
            cache.count.fetch_sub(return_count, Ordering::Relaxed);

            let mut global = self.global.lock();
            (*run_tail).next = global.free_head;
            global.free_head = run;
            global.free_count += return_count;
        }
        trace!(returned = return_count, "flushed thread cache to global list");
    }

    // ------------------------------------------------------------------
    // Global list path (thread_local_cache = false)
    // ------------------------------------------------------------------

    fn pop_global(&self) -> Result<*mut FreeLink, PoolError> {
        let mut global = self.global.lock();
        if global.free_head.is_null() {
            self.grow_locked(&mut global)?;
        }
        let link = global.free_head;
        // SAFETY: the head is non-null after a successful grow.
        unsafe {
            global.free_head = (*link).next;
        }
        global.free_count -= 1;
        Ok(link)
    }

    fn push_global(&self, link: *mut FreeLink) {
        let mut global = self.global.lock();
        // SAFETY: the block is owned by the caller and being relinked.
        unsafe {
            (*link).next = global.free_head;
        }
        global.free_head = link;
        global.free_count += 1;
    }

    // ------------------------------------------------------------------
    // Chunk growth
    // ------------------------------------------------------------------

    /// Grow one chunk and splice its blocks onto the global list.
    /// Called with the global lock held.
    fn grow_locked(&self, global: &mut GlobalState) -> Result<(), PoolError> {
        if self.config.max_chunks > 0 && global.chunks.len() >= self.config.max_chunks {
            return Err(PoolError::OutOfCapacity);
        }

        let count = self.config.chunk_block_count;
        let span = self.block_size * count;
        let chunk = match Chunk::allocate(span, self.alignment) {
            Some(chunk) => chunk,
            None => self.reclaim_and_retry(global, span)?,
        };

        // Link the new blocks into a local list first, then splice the
        // whole run onto the global head in one step.
        let mut head: *mut FreeLink = ptr::null_mut();
        let mut tail: *mut FreeLink = ptr::null_mut();
        for i in 0..count {
            // SAFETY: each block lies inside the freshly allocated chunk.
            let link = unsafe { chunk.base.add(i * self.block_size) }.cast::<FreeLink>();
            unsafe {
                (*link).next = head;
            }
            if tail.is_null() {
                tail = link;
            }
            head = link;
        }
        // SAFETY: `count >= 1`, so head and tail are non-null.
        unsafe {
            (*tail).next = global.free_head;
        }
        global.free_head = head;
        global.free_count += count;
        global.total += count;
        global.chunks.push(chunk);

        debug!(
            chunks = global.chunks.len(),
            total = global.total,
            "pool grew a chunk"
        );
        Ok(())
    }

    /// Out-of-memory fallback: when enabled, release idle chunks and retry
    /// the slab allocation up to three times.
    fn reclaim_and_retry(
        &self,
        global: &mut GlobalState,
        span: usize,
    ) -> Result<Chunk, PoolError> {
        if !self.config.release_on_pressure || global.chunks.is_empty() {
            return Err(PoolError::OutOfMemory);
        }
        for _ in 0..3 {
            if self.release_idle_chunks(global) == 0 {
                break;
            }
            if let Some(chunk) = Chunk::allocate(span, self.alignment) {
                return Ok(chunk);
            }
        }
        Err(PoolError::OutOfMemory)
    }

    /// Release up to a quarter of the chunk list, most recent first.
    ///
    /// A chunk qualifies only when every one of its blocks is on the
    /// global free list, which guarantees no thread cache or caller holds
    /// a block from it. Returns the number of chunks released.
    fn release_idle_chunks(&self, global: &mut GlobalState) -> usize {
        let budget = (global.chunks.len() / 4).max(1);
        let count = self.config.chunk_block_count;
        let mut released = 0;
        let mut idx = global.chunks.len();

        while released < budget && idx > 0 {
            idx -= 1;
            let base = global.chunks[idx].base as usize;
            let span = global.chunks[idx].span;

            let mut resident = 0;
            let mut cur = global.free_head;
            // SAFETY: nodes are valid while the global lock is held.
            unsafe {
                while !cur.is_null() {
                    let addr = cur as usize;
                    if addr >= base && addr < base + span {
                        resident += 1;
                    }
                    cur = (*cur).next;
                }
            }
            if resident != count {
                continue;
            }

            // Rebuild the free list without this chunk's blocks.
            let mut new_head: *mut FreeLink = ptr::null_mut();
            let mut new_tail: *mut FreeLink = ptr::null_mut();
            let mut cur = global.free_head;
            // SAFETY: same nodes as above; the excluded blocks die with
            // the chunk.
            unsafe {
                while !cur.is_null() {
                    let next = (*cur).next;
                    let addr = cur as usize;
                    if !(addr >= base && addr < base + span) {
                        (*cur).next = ptr::null_mut();
                        if new_tail.is_null() {
                            new_head = cur;
                        } else {
                            (*new_tail).next = cur;
                        }
                        new_tail = cur;
                    }
                    cur = next;
                }
            }
            global.free_head = new_head;
            global.free_count -= count;
            global.total -= count;

            let chunk = global.chunks.remove(idx);
            // SAFETY: every block of the chunk was verified free and has
            // been unlinked.
            unsafe { chunk.release() };
            released += 1;
            debug!(remaining = global.chunks.len(), "released idle chunk under memory pressure");
        }
        released
    }

    // ------------------------------------------------------------------
    // Debug audit
    // ------------------------------------------------------------------

    /// Overwrite a freed block with the dead pattern.
    #[cfg(debug_assertions)]
    fn poison(&self, block: *mut u8) {
        let words = self.block_size / mem::size_of::<usize>();
        let base = block.cast::<usize>();
        for i in 0..words {
            // SAFETY: the block spans `block_size` bytes, is free, and is
            // at least word-aligned (alignment >= align of FreeLink).
            unsafe { ptr::write(base.add(i), DEAD_PATTERN) };
        }
    }
}

impl<T> Drop for Pool<T> {
    fn drop(&mut self) {
        #[cfg(debug_assertions)]
        {
            let live = self.audit.get_mut().len();
            if live > 0 {
                error!("{}", PoolError::LeakDetected { live });
                debug_assert!(live == 0, "memory leak detected on pool teardown");
            }
        }

        // Caches go before chunks: their links point into chunk memory.
        self.caches.get_mut().clear();

        let global = self.global.get_mut();
        for chunk in global.chunks.drain(..) {
            // SAFETY: teardown owns every chunk exclusively.
            unsafe { chunk.release() };
        }
    }
}

impl<T> fmt::Debug for Pool<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Pool")
            .field("block_size", &self.block_size)
            .field("alignment", &self.alignment)
            .field("total", &self.total_count())
            .field("free", &self.free_count())
            .finish()
    }
}

// ============================================================================
// Owned handle
// ============================================================================

/// Scoped handle to a pool-constructed value.
///
/// Dereferences to `T` and destroys the value (finalizer + deallocate)
/// when dropped.
pub struct Pooled<'pool, T> {
    pool: &'pool Pool<T>,
    ptr: NonNull<T>,
}

// SAFETY: the handle owns its value exclusively; the pool itself is Sync
// for Send payloads.
unsafe impl<T: Send> Send for Pooled<'_, T> {}
unsafe impl<T: Sync> Sync for Pooled<'_, T> {}

impl<T> Deref for Pooled<'_, T> {
    type Target = T;

    fn deref(&self) -> &T {
        // SAFETY: the handle owns a live, initialized value.
        unsafe { self.ptr.as_ref() }
    }
}

impl<T> DerefMut for Pooled<'_, T> {
    fn deref_mut(&mut self) -> &mut T {
        // SAFETY: the handle owns a live, initialized value exclusively.
        unsafe { self.ptr.as_mut() }
    }
}

impl<T> Drop for Pooled<'_, T> {
    fn drop(&mut self) {
        // SAFETY: the handle owns a live value constructed in this pool.
        unsafe { self.pool.destroy(self.ptr) };
    }
}

impl<T: fmt::Debug> fmt::Debug for Pooled<'_, T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(&**self, f)
    }
}

// ============================================================================
// Tests
// ============================================================================
