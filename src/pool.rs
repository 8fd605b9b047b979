//! Buffer Pool
//!
//! Reuses elastic native buffers for short-lived scratch work such as
//! formatting or staging a message.
//!
//! ```text
//!   acquire() ──► pop free buffer (or allocate) ──► PooledBytes
//!                                                     │ drop
//!   free list ◄── clear, keep if below max_pooled ◄───┘
//! ```
//!
//! A `PooledBytes` derefs to `MemoryBytes` and goes back to the pool when
//! dropped. Buffers that grew past `max_buffer_size` are released instead.

use std::mem::ManuallyDrop;
use std::ops::{Deref, DerefMut};

use parking_lot::Mutex;

use crate::bytes::MemoryBytes;
use crate::error::Result;

/// Default initial size of a pooled buffer
pub const DEFAULT_POOLED_SIZE: u64 = 256;

/// Default number of idle buffers kept
pub const DEFAULT_MAX_POOLED: usize = 16;

/// Largest buffer returned to the free list
pub const DEFAULT_MAX_BUFFER_SIZE: u64 = 1 << 20;

/// Pool of reusable elastic buffers
pub struct BytesPool {
    free: Mutex<Vec<MemoryBytes>>,
    initial_size: u64,
    max_pooled: usize,
    max_buffer_size: u64,
}

impl BytesPool {
    pub fn new() -> Self {
        Self::with_limits(DEFAULT_POOLED_SIZE, DEFAULT_MAX_POOLED, DEFAULT_MAX_BUFFER_SIZE)
    }

    pub fn with_limits(initial_size: u64, max_pooled: usize, max_buffer_size: u64) -> Self {
        Self {
            free: Mutex::new(Vec::with_capacity(max_pooled)),
            initial_size,
            max_pooled,
            max_buffer_size,
        }
    }

    /// Borrow an empty buffer bound to the calling thread.
    pub fn acquire(&self) -> Result<PooledBytes<'_>> {
        let reused = self.free.lock().pop();
        let mut bytes = match reused {
            Some(bytes) => bytes,
            None => MemoryBytes::elastic_native(self.initial_size)?,
        };
        bytes.clear()?;
        bytes.reset_thread_owner();
        Ok(PooledBytes {
            bytes: ManuallyDrop::new(bytes),
            pool: self,
        })
    }

    /// Idle buffers ready for reuse.
    pub fn available(&self) -> usize {
        self.free.lock().len()
    }

    fn give_back(&self, mut bytes: MemoryBytes) {
        if bytes.is_released() || bytes.is_closed() || bytes.real_capacity() > self.max_buffer_size {
            return;
        }
        if bytes.clear().is_err() {
            return;
        }
        let mut free = self.free.lock();
        if free.len() < self.max_pooled {
            free.push(bytes);
        }
    }
}

impl Default for BytesPool {
    fn default() -> Self {
        Self::new()
    }
}

/// A buffer on loan from a `BytesPool`
pub struct PooledBytes<'a> {
    bytes: ManuallyDrop<MemoryBytes>,
    pool: &'a BytesPool,
}

impl Deref for PooledBytes<'_> {
    type Target = MemoryBytes;

    fn deref(&self) -> &MemoryBytes {
        &self.bytes
    }
}

impl DerefMut for PooledBytes<'_> {
    fn deref_mut(&mut self) -> &mut MemoryBytes {
        &mut self.bytes
    }
}

impl Drop for PooledBytes<'_> {
    fn drop(&mut self) {
        // SAFETY: `bytes` is taken exactly once, here, and never used again.
        let bytes = unsafe { ManuallyDrop::take(&mut self.bytes) };
        self.pool.give_back(bytes);
    }
}
