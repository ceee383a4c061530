/*!
region.rs - owning arena of RAM-backed memory regions.

Grounded on `mem_add_memory`/`mem_free` in
`examples/original_source/bare68k/machine_src/glue/mem.c`: a region owns a
zero-initialized byte buffer sized `num_pages * PAGE_SIZE`; the C code links
regions in a singleton list purely for teardown (`mem_free` walks it freeing
each buffer). In Rust the arena itself *is* the owner, so dropping `Memory`
drops every region's buffer — there is no separate teardown walk to write.
*/

use super::flags::MemFlags;
use super::PAGE_SIZE;

/// Opaque handle to an installed RAM region. Stable for the region's lifetime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RegionId(pub(super) u32);

pub(super) struct MemoryRegion {
    pub start_page: u32,
    pub num_pages: u32,
    pub flags: MemFlags,
    pub data: Vec<u8>,
}

impl MemoryRegion {
    pub fn new(start_page: u32, num_pages: u32, flags: MemFlags) -> MemoryRegion {
        MemoryRegion {
            start_page,
            num_pages,
            flags,
            data: vec![0u8; num_pages as usize * PAGE_SIZE as usize],
        }
    }

    /// Byte offset of `addr` within this region's buffer.
    #[inline]
    pub fn offset_of(&self, addr: u32) -> usize {
        (addr as usize) - (self.start_page as usize) * PAGE_SIZE as usize
    }

    /// Bytes remaining in the region's buffer from `addr` to its end.
    #[inline]
    pub fn remaining_from(&self, addr: u32) -> u32 {
        self.data.len() as u32 - self.offset_of(addr) as u32
    }
}

#[derive(Default)]
pub(super) struct RegionArena {
    regions: Vec<MemoryRegion>,
}

impl RegionArena {
    pub fn insert(&mut self, region: MemoryRegion) -> RegionId {
        let id = RegionId(self.regions.len() as u32);
        self.regions.push(region);
        id
    }

    pub fn get(&self, id: RegionId) -> &MemoryRegion {
        &self.regions[id.0 as usize]
    }

    pub fn get_mut(&mut self, id: RegionId) -> &mut MemoryRegion {
        &mut self.regions[id.0 as usize]
    }
}
