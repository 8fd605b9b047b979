//! Storage Module
//!
//! Storage regions and the backing capability a buffer is generic over.
//!
//! ## Responsibilities
//! - `Region`: one contiguous span with its own reservation count
//! - `Backing`: what a `Bytes` needs from its storage (resolve the region
//!   covering a range, grow, sync, release)
//! - `ElasticStore`: heap or native backing, fixed or growable
//!
//! ```text
//!   Bytes<S: Backing>
//!         │ region_for(offset, len)
//!         ▼
//!   ┌──────────────┐        ┌───────────────────────┐
//!   │ ElasticStore │  or    │ ChunkedStore (mapped) │
//!   │  one Region  │        │  swaps chunk Regions  │
//!   └──────────────┘        └───────────────────────┘
//! ```

mod elastic;
mod region;

pub use elastic::ElasticStore;
pub use region::{Region, RegionKind};

use std::sync::Arc;

use crate::error::{BytesError, Result};
use crate::refcount::OwnerId;

/// Storage capability behind a positional buffer
///
/// Implementations hold exactly one current `Region` reservation at a time
/// (or none before first use) under their own `OwnerId`.
pub trait Backing: Send {
    /// First valid offset.
    fn start(&self) -> u64;

    /// Logical capacity: the largest write limit a buffer may have.
    fn capacity(&self) -> u64;

    /// Bytes currently backed by memory.
    fn real_capacity(&self) -> u64;

    /// Whether writes past `real_capacity` grow the store.
    fn is_elastic(&self) -> bool;

    fn is_direct_memory(&self) -> bool;

    /// Whether the memory may be shared with other buffers or processes.
    fn is_shared(&self) -> bool;

    /// Identity under which this backing reserves its regions.
    fn owner(&self) -> OwnerId;

    /// The region currently held, if any.
    fn current(&self) -> Option<&Arc<Region>>;

    /// The region that contains `[offset, offset + len)`, switching the
    /// current region if required. `len` may be zero.
    fn region_for(&mut self, offset: u64, len: u64) -> Result<&Arc<Region>>;

    /// Make `[start, desired)` addressable.
    fn ensure_capacity(&mut self, desired: u64) -> Result<()>;

    /// Copy bytes out starting at `offset`.
    fn read_at(&mut self, offset: u64, dst: &mut [u8]) -> Result<()> {
        self.region_for(offset, dst.len() as u64)?.read(offset, dst)
    }

    /// Copy bytes in starting at `offset`.
    fn write_at(&mut self, offset: u64, src: &[u8]) -> Result<()> {
        self.region_for(offset, src.len() as u64)?.write(offset, src)
    }

    /// memmove of `len` bytes from `from` to `to`. Ranges that do not fit in
    /// one region go through a temporary copy.
    fn move_bytes(&mut self, from: u64, to: u64, len: u64) -> Result<()> {
        let low = from.min(to);
        let span = from.max(to) - low + len;
        match self.region_for(low, span) {
            Ok(region) => region.move_bytes(from, to, len),
            Err(BytesError::InvalidArgument(_)) => {
                let mut tmp = vec![0u8; len as usize];
                self.read_at(from, &mut tmp)?;
                self.write_at(to, &tmp)
            }
            Err(e) => Err(e),
        }
    }

    /// Read without changing the current region, holding a temporary
    /// reservation on whatever region is touched.
    fn peek_at(&self, offset: u64, dst: &mut [u8]) -> Result<()>;

    /// Region for an atomic access of `size` bytes: the range must lie
    /// inside `[region.start, region.safe_limit)`.
    fn region_for_atomic(&mut self, offset: u64, size: u64) -> Result<&Arc<Region>> {
        self.region_for(offset, size)
    }

    /// Address safe for a contiguous read up to the end of the current
    /// region's non-overlap part.
    fn address_for_read(&mut self, offset: u64) -> Result<*const u8> {
        let region = self.region_for(offset, 0)?;
        region.address_for_read(offset, 0)
    }

    /// Address safe for a contiguous read of `len` bytes.
    fn address_for_read_len(&mut self, offset: u64, len: u64) -> Result<*const u8> {
        let region = self.region_for(offset, len)?;
        region.address_for_read(offset, len)
    }

    /// Address safe for a contiguous write at `offset`.
    fn address_for_write(&mut self, offset: u64) -> Result<*mut u8> {
        let region = self.region_for(offset, 0)?;
        region.address_for_write(offset, 0)
    }

    /// Flush modified bytes up to `position` to stable storage.
    fn sync_up_to(&mut self, _position: u64) -> Result<()> {
        Ok(())
    }

    /// Release every reservation held. A second call fails with `Released`.
    fn release(&mut self) -> Result<()>;

    fn is_released(&self) -> bool;
}
