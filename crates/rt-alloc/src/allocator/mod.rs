//! Allocator Module - Thread-Caching Bucket Allocator
//!
//! A per-thread cache of free lists over a small number of geometric size
//! classes ("buckets"), backed by a shared spill cache so threads can hand
//! off freed memory to each other instead of returning it to the system
//! allocator. Requests larger than the biggest bucket fall straight through
//! to the system allocator ("system" blocks below).
//!
//! Every live block, bucketed or system, carries a small header with two
//! magic bytes bracketing a bucket index; `free`/`realloc` check the magic
//! bytes before trusting the header, so a corrupted or double-freed block is
//! caught instead of silently misinterpreted.

use crate::config::AllocConfig;
use crate::error::{AllocError, Result};
use crate::util::Alignment;
use parking_lot::Mutex;
use std::alloc::{alloc as sys_alloc, dealloc as sys_dealloc, Layout};
use std::cell::RefCell;
use std::ptr::NonNull;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::OnceLock;

const ALIGN: usize = 16;
const MAGIC: u8 = 0xEF;

/// Per-block accounting header. Lives immediately before the pointer handed
/// back to the caller. While a block sits on a free list its bucket and
/// magic bytes are left intact so `free` can still validate it; the first
/// pointer-sized word *after* the header (i.e. the start of the payload) is
/// overloaded as the free-list `next` link.
#[repr(C)]
#[derive(Clone, Copy)]
struct Header {
    magic1: u8,
    bucket: u8,
    used: u8,
    magic2: u8,
    sys_size: u32,
}

const HEADER_SIZE: usize = std::mem::size_of::<Header>();
const OFFSET: usize = Alignment::align_up(HEADER_SIZE, ALIGN);
const MIN_ALLOC: usize = Alignment::align_up(OFFSET + 8, ALIGN);
const NBUCKETS: usize = 11 - (MIN_ALLOC >> 5);
const MAX_ALLOC: usize = MIN_ALLOC << (NBUCKETS - 1);
const SYSTEM_BUCKET: u8 = NBUCKETS as u8;

struct BucketInfo {
    block_size: usize,
    shift: u32,
    max_blocks: usize,
    num_move: usize,
}

fn bucket_info() -> &'static [BucketInfo; NBUCKETS] {
    static INFO: OnceLock<[BucketInfo; NBUCKETS]> = OnceLock::new();
    INFO.get_or_init(|| {
        let mut shift = 0u32;
        std::array::from_fn(|i| {
            let block_size = MIN_ALLOC << i;
            while ((block_size - OFFSET) >> shift) > 255 {
                shift += 1;
            }
            let geometric_max_blocks = 1usize << (NBUCKETS - 1 - i);
            let geometric_num_move = if i < NBUCKETS - 1 {
                1usize << (NBUCKETS - 2 - i)
            } else {
                1
            };
            let cfg = config();
            BucketInfo {
                block_size,
                shift,
                max_blocks: cfg.max_blocks_override.unwrap_or(geometric_max_blocks),
                num_move: cfg.num_move_override.unwrap_or(geometric_num_move),
            }
        })
    })
}

fn bucket_for(req_size: usize) -> usize {
    let size = req_size + OFFSET;
    let info = bucket_info();
    for (i, b) in info.iter().enumerate() {
        if b.block_size >= size {
            return i;
        }
    }
    NBUCKETS
}

/// An intrusive singly-linked free list of blocks for one size class.
#[derive(Default)]
struct Bucket {
    first: *mut u8,
    num_free: usize,
}

unsafe impl Send for Bucket {}

impl Bucket {
    fn push(&mut self, block: *mut u8) {
        unsafe { write_next(block, self.first) };
        self.first = block;
        self.num_free += 1;
    }

    fn pop(&mut self) -> Option<*mut u8> {
        if self.first.is_null() {
            return None;
        }
        let block = self.first;
        self.first = unsafe { read_next(block) };
        self.num_free -= 1;
        Some(block)
    }
}

unsafe fn write_next(block: *mut u8, next: *mut u8) {
    (block.add(OFFSET) as *mut *mut u8).write(next);
}

unsafe fn read_next(block: *mut u8) -> *mut u8 {
    (block.add(OFFSET) as *mut *mut u8).read()
}

struct Cache {
    buckets: [Bucket; NBUCKETS],
}

impl Cache {
    fn new() -> Self {
        Cache {
            buckets: std::array::from_fn(|_| Bucket::default()),
        }
    }
}

thread_local! {
    static CACHE: RefCell<Cache> = RefCell::new(Cache::new());
}

fn shared() -> &'static [Mutex<Bucket>; NBUCKETS] {
    static SHARED: OnceLock<[Mutex<Bucket>; NBUCKETS]> = OnceLock::new();
    SHARED.get_or_init(|| std::array::from_fn(|_| Mutex::new(Bucket::default())))
}

#[derive(Debug, Default)]
pub struct AllocStats {
    pub bucket_allocs: u64,
    pub system_allocs: u64,
    pub refills: u64,
    pub spills: u64,
    pub frees: u64,
}

struct Counters {
    bucket_allocs: AtomicU64,
    system_allocs: AtomicU64,
    refills: AtomicU64,
    spills: AtomicU64,
    frees: AtomicU64,
}

static COUNTERS: Counters = Counters {
    bucket_allocs: AtomicU64::new(0),
    system_allocs: AtomicU64::new(0),
    refills: AtomicU64::new(0),
    spills: AtomicU64::new(0),
    frees: AtomicU64::new(0),
};

static CONFIG: OnceLock<AllocConfig> = OnceLock::new();

fn config() -> &'static AllocConfig {
    CONFIG.get_or_init(AllocConfig::from_env)
}

/// Install a configuration other than the environment-derived default.
/// Must be called before the first allocation; later calls are ignored,
/// matching the one-shot sampling the spec describes for purify mode.
pub fn configure(cfg: AllocConfig) {
    let _ = CONFIG.set(cfg);
}

fn purify_mode() -> bool {
    config().purify_mode
}

fn block_from_ptr(ptr: *mut u8) -> *mut u8 {
    unsafe { ptr.sub(OFFSET) }
}

fn ptr_from_block(block: *mut u8) -> *mut u8 {
    unsafe { block.add(OFFSET) }
}

fn header_of(block: *mut u8) -> *mut Header {
    block as *mut Header
}

fn stamp(block: *mut u8, bucket: u8, req_size: usize, sys_size: u32) {
    let h = header_of(block);
    unsafe {
        (*h).magic1 = MAGIC;
        (*h).magic2 = MAGIC;
        (*h).bucket = bucket;
        (*h).sys_size = sys_size;
        (*h).used = if bucket == SYSTEM_BUCKET {
            255
        } else {
            (req_size >> bucket_info()[bucket as usize].shift) as u8
        };
    }
}

fn check_header(block: *mut u8) -> Header {
    let h = header_of(block);
    unsafe {
        let header = h.read();
        if header.magic1 != MAGIC || header.magic2 != MAGIC {
            rt_util::error::fatal("allocator: corrupted block header (bad magic bytes)");
        }
        header
    }
}

fn system_layout(total: usize) -> Layout {
    Layout::from_size_align(total, ALIGN).expect("allocator: invalid system layout")
}

fn system_alloc_block(req_size: usize) -> Result<*mut u8> {
    let total = req_size
        .checked_add(OFFSET)
        .ok_or(AllocError::OutOfMemory { requested: req_size })?;
    let layout = system_layout(total);
    let block = unsafe { sys_alloc(layout) };
    if block.is_null() {
        return Err(AllocError::OutOfMemory { requested: req_size });
    }
    stamp(block, SYSTEM_BUCKET, req_size, total as u32);
    COUNTERS.system_allocs.fetch_add(1, Ordering::Relaxed);
    Ok(block)
}

fn allocate_system_blocks(bucket: usize, count: usize) -> Vec<*mut u8> {
    let block_size = bucket_info()[bucket].block_size;
    let layout = system_layout(block_size);
    (0..count)
        .filter_map(|_| {
            let block = unsafe { sys_alloc(layout) };
            if block.is_null() {
                None
            } else {
                Some(block)
            }
        })
        .collect()
}

/// Move `num_move` blocks from the shared spill cache into the thread's own
/// cache, mallocing a fresh batch from the system allocator if the shared
/// cache is empty. Mirrors `GetBlocks` in the allocator this is grounded on.
fn refill(cache: &mut Cache, bucket: usize) {
    let info = &bucket_info()[bucket];
    {
        let mut shared_bucket = shared()[bucket].lock();
        while cache.buckets[bucket].num_free < info.num_move {
            match shared_bucket.pop() {
                Some(b) => cache.buckets[bucket].push(b),
                None => break,
            }
        }
    }
    if cache.buckets[bucket].num_free == 0 {
        for block in allocate_system_blocks(bucket, info.num_move) {
            cache.buckets[bucket].push(block);
        }
    }
    COUNTERS.refills.fetch_add(1, Ordering::Relaxed);
}

/// Move `num_move` blocks from the thread cache to the shared spill cache.
/// Mirrors `PutBlocks`.
fn spill(cache: &mut Cache, bucket: usize) {
    let info = &bucket_info()[bucket];
    let mut shared_bucket = shared()[bucket].lock();
    for _ in 0..info.num_move {
        match cache.buckets[bucket].pop() {
            Some(b) => shared_bucket.push(b),
            None => break,
        }
    }
    COUNTERS.spills.fetch_add(1, Ordering::Relaxed);
}

/// Request `req_size` bytes. Requests above the largest bucket are served
/// directly by the system allocator.
pub fn alloc(req_size: usize) -> Result<NonNull<u8>> {
    if req_size == 0 {
        return Err(AllocError::InvalidArgument("size must be nonzero".into()));
    }

    if purify_mode() {
        let block = system_alloc_block(req_size)?;
        return Ok(unsafe { NonNull::new_unchecked(ptr_from_block(block)) });
    }

    let bucket = bucket_for(req_size);
    if bucket == NBUCKETS || req_size > MAX_ALLOC {
        let block = system_alloc_block(req_size)?;
        return Ok(unsafe { NonNull::new_unchecked(ptr_from_block(block)) });
    }

    let block = CACHE.with(|cache| {
        let mut cache = cache.borrow_mut();
        if cache.buckets[bucket].first.is_null() {
            refill(&mut cache, bucket);
        }
        cache.buckets[bucket].pop()
    });

    let block = match block {
        Some(b) => b,
        None => *allocate_system_blocks(bucket, 1)
            .first()
            .ok_or(AllocError::OutOfMemory { requested: req_size })?,
    };

    stamp(block, bucket as u8, req_size, 0);
    COUNTERS.bucket_allocs.fetch_add(1, Ordering::Relaxed);
    Ok(unsafe { NonNull::new_unchecked(ptr_from_block(block)) })
}

/// Release a block previously returned by [`alloc`] or [`realloc`].
///
/// # Safety
/// `ptr` must be a live allocation from this allocator and must not be used
/// again after this call.
pub unsafe fn free(ptr: NonNull<u8>) {
    let block = block_from_ptr(ptr.as_ptr());
    let header = check_header(block);
    let bucket = header.bucket;

    if bucket == SYSTEM_BUCKET {
        let layout = system_layout(header.sys_size as usize);
        sys_dealloc(block, layout);
        COUNTERS.frees.fetch_add(1, Ordering::Relaxed);
        return;
    }

    let bucket = bucket as usize;
    CACHE.with(|cache| {
        let mut cache = cache.borrow_mut();
        cache.buckets[bucket].push(block);
        if cache.buckets[bucket].num_free > bucket_info()[bucket].max_blocks {
            spill(&mut cache, bucket);
        }
    });
    COUNTERS.frees.fetch_add(1, Ordering::Relaxed);
}

/// Resize a block in place when possible, otherwise allocate, copy and free.
///
/// # Safety
/// `ptr` must be a live allocation from this allocator (or `free_on_resize`
/// will be called on stale memory); `old_size` must be the size it was
/// allocated or last reallocated with.
pub unsafe fn realloc(ptr: NonNull<u8>, old_size: usize, new_size: usize) -> Result<NonNull<u8>> {
    if new_size == 0 {
        free(ptr);
        return Err(AllocError::InvalidArgument("size must be nonzero".into()));
    }

    let block = block_from_ptr(ptr.as_ptr());
    let header = check_header(block);
    let bucket = header.bucket;

    if bucket != SYSTEM_BUCKET {
        let bucket = bucket as usize;
        let info = &bucket_info()[bucket];
        let size = new_size + OFFSET;
        let min = if bucket > 0 {
            bucket_info()[bucket - 1].block_size
        } else {
            0
        };
        if size > min && size <= info.block_size {
            stamp(block, bucket as u8, new_size, 0);
            return Ok(ptr);
        }
    } else if purify_mode() || new_size + OFFSET > MAX_ALLOC {
        // Stays (or becomes) a system block; ask the system allocator to
        // grow/shrink it in place when it can.
        let old_total = header.sys_size as usize;
        let new_total = new_size + OFFSET;
        let new_block = std::alloc::realloc(block, system_layout(old_total), new_total);
        if new_block.is_null() {
            return Err(AllocError::OutOfMemory { requested: new_size });
        }
        stamp(new_block, SYSTEM_BUCKET, new_size, new_total as u32);
        return Ok(NonNull::new_unchecked(ptr_from_block(new_block)));
    }

    let new_ptr = alloc(new_size)?;
    let copy_len = old_size.min(new_size);
    std::ptr::copy_nonoverlapping(ptr.as_ptr(), new_ptr.as_ptr(), copy_len);
    free(ptr);
    Ok(new_ptr)
}

/// Snapshot of allocator activity since process start.
pub fn stats() -> AllocStats {
    AllocStats {
        bucket_allocs: COUNTERS.bucket_allocs.load(Ordering::Relaxed),
        system_allocs: COUNTERS.system_allocs.load(Ordering::Relaxed),
        refills: COUNTERS.refills.load(Ordering::Relaxed),
        spills: COUNTERS.spills.load(Ordering::Relaxed),
        frees: COUNTERS.frees.load(Ordering::Relaxed),
    }
}

/// The largest request size served from a bucket rather than the system
/// allocator.
pub const fn max_bucketed_size() -> usize {
    MAX_ALLOC - OFFSET
}
