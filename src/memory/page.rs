/*!
page.rs - per-page table entries.

Grounded on the `page_info_t` array (`aux`/`get_func`/`set_func`/`flags`) in
`examples/original_source/bare68k/machine_src/glue/mem.c`. The C struct
overloads a single `aux` scalar across four unrelated meanings (remaining RAM
bytes, mirror target page, empty-page default value); here each `PageBacking`
variant only carries the data that applies to it, and the RAM remaining-bytes
figure is computed on demand from `MemoryRegion::remaining_from` instead of
being cached.

Mirror dispatch is one hop: a `Mirror` page resolves straight to its target
page's backing. If the target page is itself a `Mirror`, resolution stops and
the access is treated as unbacked (`MemAccess` event) rather than chasing the
chain recursively. The original C callback indirection would in fact recurse
on chained mirrors; capping it at one hop avoids that failure mode entirely
and is SPEC_FULL.md's resolution of that ambiguity.
*/

use super::flags::MemFlags;
use super::region::RegionId;
use super::special::SpecialId;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(super) enum PageBacking {
    Ram { region: RegionId },
    Empty { value: u32 },
    Mirror { target_page: u32 },
    Special { id: SpecialId },
}

/// A page's backing plus the flags governing it. `flags` is authoritative
/// for every variant, including `Ram` (the owning region's flags are copied
/// in at `add_memory` time; a region spanning many pages may in principle
/// back pages with different effective flags after re-mapping, though the
/// public API never exercises that today).
#[derive(Debug, Clone, Copy, Default)]
pub(super) struct PageEntry {
    pub backing: Option<PageBacking>,
    pub flags: MemFlags,
}

impl PageEntry {
    pub fn empty() -> PageEntry {
        PageEntry {
            backing: None,
            flags: MemFlags::empty(),
        }
    }
}
