//! Heap and native backing
//!
//! Holds a single region. An elastic store grows by allocating a larger
//! region of the same kind, copying the backed bytes across, reserving the
//! new region and only then releasing the old one.

use std::sync::Arc;

use crate::config::MAX_CAPACITY;
use crate::error::{BytesError, Result};
use crate::refcount::{OwnerId, ReferenceCounted};

use super::{Backing, Region, RegionKind};

/// Largest capacity of an elastic heap store
pub const MAX_HEAP_CAPACITY: u64 = (i32::MAX - 15) as u64;

/// Smallest allocation made when growing
const MIN_GROWTH: u64 = 256;

/// Heap or native backing store, fixed or elastic
pub struct ElasticStore {
    region: Arc<Region>,
    kind: RegionKind,
    elastic: bool,
    max_capacity: u64,
    owner: OwnerId,
    released: bool,
}

impl ElasticStore {
    /// Growable heap store starting at `initial` bytes.
    pub fn elastic_heap(initial: u64) -> Result<Self> {
        Self::allocate(RegionKind::Heap, initial, true, MAX_HEAP_CAPACITY)
    }

    /// Fixed-size heap store.
    pub fn fixed_heap(capacity: u64) -> Result<Self> {
        Self::allocate(RegionKind::Heap, capacity, false, capacity)
    }

    /// Growable native store starting at `initial` bytes.
    pub fn elastic_native(initial: u64) -> Result<Self> {
        Self::allocate(RegionKind::Native, initial, true, MAX_CAPACITY)
    }

    /// Fixed-size native store.
    pub fn fixed_native(capacity: u64) -> Result<Self> {
        Self::allocate(RegionKind::Native, capacity, false, capacity)
    }

    /// Fixed heap store holding a copy of `data`.
    pub fn from_slice(data: &[u8]) -> Result<Self> {
        let owner = OwnerId::new("heap bytes");
        let region = Region::heap_from(data, owner)?;
        Ok(Self {
            region: Arc::new(region),
            kind: RegionKind::Heap,
            elastic: false,
            max_capacity: data.len() as u64,
            owner,
            released: false,
        })
    }

    fn allocate(kind: RegionKind, capacity: u64, elastic: bool, max_capacity: u64) -> Result<Self> {
        if capacity > max_capacity {
            return Err(BytesError::InvalidArgument(format!(
                "capacity {} exceeds maximum {}",
                capacity, max_capacity
            )));
        }
        let owner = OwnerId::new(match kind {
            RegionKind::Native => "native bytes",
            _ => "heap bytes",
        });
        let region = Self::new_region(kind, capacity, owner)?;
        Ok(Self {
            region: Arc::new(region),
            kind,
            elastic,
            max_capacity,
            owner,
            released: false,
        })
    }

    fn new_region(kind: RegionKind, capacity: u64, owner: OwnerId) -> Result<Region> {
        match kind {
            RegionKind::Native => Region::native(capacity, owner),
            _ => Region::heap(capacity, owner),
        }
    }

    fn check_not_released(&self) -> Result<()> {
        if self.released {
            return Err(BytesError::Released(format!("store of {}", self.owner)));
        }
        Ok(())
    }
}

impl Backing for ElasticStore {
    fn start(&self) -> u64 {
        0
    }

    fn capacity(&self) -> u64 {
        if self.elastic {
            self.max_capacity
        } else {
            self.region.capacity()
        }
    }

    fn real_capacity(&self) -> u64 {
        self.region.real_capacity()
    }

    fn is_elastic(&self) -> bool {
        self.elastic
    }

    fn is_direct_memory(&self) -> bool {
        self.region.is_direct_memory()
    }

    fn is_shared(&self) -> bool {
        false
    }

    fn owner(&self) -> OwnerId {
        self.owner
    }

    fn current(&self) -> Option<&Arc<Region>> {
        if self.released {
            None
        } else {
            Some(&self.region)
        }
    }

    fn region_for(&mut self, _offset: u64, _len: u64) -> Result<&Arc<Region>> {
        self.check_not_released()?;
        Ok(&self.region)
    }

    fn ensure_capacity(&mut self, desired: u64) -> Result<()> {
        self.check_not_released()?;
        let real = self.region.real_capacity();
        if desired <= real {
            return Ok(());
        }
        if !self.elastic || desired > self.max_capacity {
            return Err(BytesError::Overflow {
                op: "ensure capacity",
                offset: 0,
                length: desired,
                limit: real,
                capacity: self.capacity(),
            });
        }

        let new_capacity = desired
            .checked_next_power_of_two()
            .unwrap_or(desired)
            .max(MIN_GROWTH)
            .min(self.max_capacity);
        let grown = Arc::new(Self::new_region(self.kind, new_capacity, self.owner)?);
        self.region.copy_to(&grown, real)?;

        // The new region is already reserved by `owner`; drop the old one.
        let old = std::mem::replace(&mut self.region, grown);
        old.release(self.owner)?;

        tracing::debug!(
            kind = ?self.kind,
            from = real,
            to = new_capacity,
            "elastic store grown"
        );
        Ok(())
    }

    fn peek_at(&self, offset: u64, dst: &mut [u8]) -> Result<()> {
        self.check_not_released()?;
        let guard = OwnerId::temporary("peek");
        self.region.reserve(guard)?;
        let result = self.region.read(offset, dst);
        self.region.release(guard)?;
        result
    }

    fn release(&mut self) -> Result<()> {
        self.check_not_released()?;
        self.released = true;
        self.region.release(self.owner)
    }

    fn is_released(&self) -> bool {
        self.released
    }
}

impl Drop for ElasticStore {
    fn drop(&mut self) {
        if self.released {
            return;
        }
        if let Err(e) = self.release() {
            tracing::warn!(owner = %self.owner, error = %e, "failed to release store on drop");
        }
    }
}

impl std::fmt::Debug for ElasticStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ElasticStore")
            .field("kind", &self.kind)
            .field("elastic", &self.elastic)
            .field("real_capacity", &self.region.real_capacity())
            .field("owner", &self.owner)
            .finish()
    }
}
