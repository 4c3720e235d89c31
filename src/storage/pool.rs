//! Worker and buffer pools owned by each store instance
//!
//! Buffers handed out by [`BufferPool`] are cleared (length zero) but not
//! zeroed: their capacity may still hold bytes from a previous use, which
//! safe code can never observe.

use parking_lot::Mutex;
use std::ops::{Deref, DerefMut};

use crate::constants::{BUFFER_SIZE, MAX_WORKERS};
use crate::error::{Error, Result};

/// Worker count for batch operations: `min(CPU, 8)`
pub fn worker_count() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1)
        .clamp(1, MAX_WORKERS)
}

/// Build the rayon pool used for batch list/save/load
pub fn build_thread_pool(threads: usize) -> Result<rayon::ThreadPool> {
    rayon::ThreadPoolBuilder::new()
        .num_threads(threads)
        .thread_name(|i| format!("vaino-store-{}", i))
        .build()
        .map_err(|e| Error::Internal(format!("failed to build worker pool: {}", e)))
}

/// Pool of 64 KiB byte buffers
#[derive(Debug)]
pub struct BufferPool {
    free: Mutex<Vec<Vec<u8>>>,
    max_pooled: usize,
}

impl BufferPool {
    pub fn new(max_pooled: usize) -> Self {
        Self {
            free: Mutex::new(Vec::with_capacity(max_pooled)),
            max_pooled,
        }
    }

    /// Take a cleared buffer with at least 64 KiB of capacity
    pub fn get(&self) -> PooledBuffer<'_> {
        let buf = self
            .free
            .lock()
            .pop()
            .unwrap_or_else(|| Vec::with_capacity(BUFFER_SIZE));
        PooledBuffer { buf, pool: self }
    }

    fn put(&self, mut buf: Vec<u8>) {
        // Oversized buffers from huge documents are dropped rather than retained
        if buf.capacity() > BUFFER_SIZE * 4 {
            return;
        }
        buf.clear();
        let mut free = self.free.lock();
        if free.len() < self.max_pooled {
            free.push(buf);
        }
    }

    /// Number of idle buffers
    pub fn idle(&self) -> usize {
        self.free.lock().len()
    }
}

/// Buffer on loan from a [`BufferPool`]; returned on drop
#[derive(Debug)]
pub struct PooledBuffer<'a> {
    buf: Vec<u8>,
    pool: &'a BufferPool,
}

impl Deref for PooledBuffer<'_> {
    type Target = Vec<u8>;

    fn deref(&self) -> &Vec<u8> {
        &self.buf
    }
}

impl DerefMut for PooledBuffer<'_> {
    fn deref_mut(&mut self) -> &mut Vec<u8> {
        &mut self.buf
    }
}

impl Drop for PooledBuffer<'_> {
    fn drop(&mut self) {
        self.pool.put(std::mem::take(&mut self.buf));
    }
}
