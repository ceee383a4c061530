/*!
memory - paged 24/32-bit address space with typed access handlers.

The largest component in this crate (SPEC_FULL.md §4.B). Grounded throughout
on `examples/original_source/bare68k/machine_src/glue/mem.c`/`mem.h`: a flat
page table (`num_pages` entries, each `PAGE_SIZE` bytes), four page backings
(RAM, constant-valued empty, one-hop mirror, host-callback special overlay),
and a CPU-facing read/write dispatch that never errors out of band — every
anomaly becomes an `Event` instead.

The host-facing API is split from the CPU-facing one the way `mem.c` splits
`r8`/`w8` (CPU, through the function-code/trap/trace pipeline) from `api_r8`/
`api_w8` (host, direct and untraced) — see `Memory::r8` vs `Memory::read8`.
*/

mod flags;
mod page;
mod region;
mod special;

pub use flags::MemFlags;
pub use region::RegionId;
pub use special::{SpecialId, SpecialReadFn, SpecialReadResult, SpecialWriteFn, SpecialWriteResult};

use byteorder::{BigEndian, ByteOrder};

use crate::access::{AccessWord, ApiAccessKind, FunctionCode, Width};
use crate::error::MemoryConfigError;
use crate::event::{CallbackOutcome, EventBus, EventKind};
use crate::tools::{PointData, Points};

use page::{PageBacking, PageEntry};
use region::{MemoryRegion, RegionArena};
use special::{SpecialArena, SpecialOverlay};

/// Bytes per page. Matches `bare68k`'s fixed `PAGE_SIZE` (64 KiB): large
/// enough to keep the page table small, small enough that a handful of pages
/// covers most peripheral register windows.
pub const PAGE_SIZE: u32 = 0x1_0000;
/// `log2(PAGE_SIZE)`, used to convert an address to a page index.
pub const PAGE_SHIFT: u32 = 16;

pub type CpuTraceFn = Box<dyn FnMut(AccessWord, u32, u32) -> CallbackOutcome>;
/// `(access_bits, addr, value, extra)`, matching `api_trace_func_t`'s plain
/// `int access` parameter: `access_bits` is either a packed `AccessWord` (for
/// `r8`/`w8`/...) or an `ApiAccessKind` tag (for the block/string/BCPL-pointer
/// helpers), since a host-API call has no function code to tell them apart by
/// type. `extra` carries a subtype's secondary operand (`BSET`'s fill value,
/// `BCOPY`'s source address); it is `0` for every other subtype.
pub type ApiTraceFn = Box<dyn FnMut(u32, u32, u32, u32)>;

fn page_of(addr: u32) -> u32 {
    addr >> PAGE_SHIFT
}

/// A paged 24/32-bit address space.
pub struct Memory {
    num_pages: u32,
    pages: Vec<PageEntry>,
    regions: RegionArena,
    specials: SpecialArena,
    invalid_value: u32,
    cpu_trace: Option<CpuTraceFn>,
    api_trace: Option<ApiTraceFn>,
}

impl Memory {
    /// Build an all-unbacked page table of `num_pages` pages.
    pub fn new(num_pages: u32) -> Memory {
        Memory {
            num_pages,
            pages: vec![PageEntry::empty(); num_pages as usize],
            regions: RegionArena::default(),
            specials: SpecialArena::default(),
            invalid_value: 0,
            cpu_trace: None,
            api_trace: None,
        }
    }

    fn check_range(&self, start_page: u32, num_pages: u32) -> Result<u32, MemoryConfigError> {
        if num_pages == 0 {
            log::warn!("memory: rejected zero-page region at page {}", start_page);
            return Err(MemoryConfigError::ZeroPages);
        }
        let end_page = start_page + num_pages;
        if end_page > self.num_pages {
            log::warn!(
                "memory: rejected out-of-range page {}..{} ({} pages configured)",
                start_page,
                end_page,
                self.num_pages
            );
            return Err(MemoryConfigError::OutOfRange {
                start_page,
                end_page,
                num_pages: self.num_pages,
            });
        }
        Ok(end_page)
    }

    /// Install a RAM-backed region over `[start_page, start_page+num_pages)`.
    pub fn add_memory(
        &mut self,
        start_page: u32,
        num_pages: u32,
        flags: MemFlags,
    ) -> Result<RegionId, MemoryConfigError> {
        let end_page = self.check_range(start_page, num_pages)?;
        let region = MemoryRegion::new(start_page, num_pages, flags);
        let id = self.regions.insert(region);
        for page in start_page..end_page {
            self.pages[page as usize] = PageEntry {
                backing: Some(PageBacking::Ram { region: id }),
                flags,
            };
        }
        log::trace!(
            "memory: add_memory pages {}..{} flags={:?}",
            start_page,
            end_page,
            flags
        );
        Ok(id)
    }

    /// Install a constant-valued unbacked region (every read returns `value`,
    /// every write is discarded).
    pub fn add_empty(
        &mut self,
        start_page: u32,
        num_pages: u32,
        flags: MemFlags,
        value: u32,
    ) -> Result<(), MemoryConfigError> {
        let end_page = self.check_range(start_page, num_pages)?;
        for page in start_page..end_page {
            self.pages[page as usize] = PageEntry {
                backing: Some(PageBacking::Empty { value }),
                flags,
            };
        }
        Ok(())
    }

    /// Install a mirror region: every page in `[start_page, start_page+num_pages)`
    /// forwards one hop to the corresponding page starting at `base_page`.
    pub fn add_mirror(
        &mut self,
        start_page: u32,
        num_pages: u32,
        flags: MemFlags,
        base_page: u32,
    ) -> Result<(), MemoryConfigError> {
        let end_page = self.check_range(start_page, num_pages)?;
        if base_page == start_page {
            log::warn!("memory: rejected self-mirror at page {}", start_page);
            return Err(MemoryConfigError::SelfMirror { page: start_page });
        }
        let target_end = base_page + num_pages;
        if target_end > self.num_pages {
            log::warn!(
                "memory: rejected mirror target {}..{} ({} pages configured)",
                base_page,
                target_end,
                self.num_pages
            );
            return Err(MemoryConfigError::TargetOutOfRange {
                base_page,
                end_page: target_end,
                num_pages: self.num_pages,
            });
        }
        for (i, page) in (start_page..end_page).enumerate() {
            self.pages[page as usize] = PageEntry {
                backing: Some(PageBacking::Mirror {
                    target_page: base_page + i as u32,
                }),
                flags,
            };
        }
        log::trace!(
            "memory: add_mirror pages {}..{} -> base {}",
            start_page,
            end_page,
            base_page
        );
        Ok(())
    }

    /// Install a host-callback-backed region.
    pub fn add_special(
        &mut self,
        start_page: u32,
        num_pages: u32,
        flags: MemFlags,
        read: Option<SpecialReadFn>,
        write: Option<SpecialWriteFn>,
    ) -> Result<SpecialId, MemoryConfigError> {
        let end_page = self.check_range(start_page, num_pages)?;
        let id = self.specials.insert(SpecialOverlay { read, write });
        for page in start_page..end_page {
            self.pages[page as usize] = PageEntry {
                backing: Some(PageBacking::Special { id }),
                flags,
            };
        }
        log::trace!("memory: add_special pages {}..{}", start_page, end_page);
        Ok(id)
    }

    /// Value returned by `read8/16/32` on an unbacked or bounds-failing access.
    pub fn set_invalid_value(&mut self, value: u32) {
        self.invalid_value = value;
    }

    pub fn memory_flags(&self, addr: u32) -> Option<MemFlags> {
        let page = page_of(addr);
        self.pages
            .get(page as usize)
            .and_then(|entry| entry.backing.as_ref().map(|_| entry.flags))
    }

    pub fn set_cpu_trace(&mut self, trace: Option<CpuTraceFn>) {
        self.cpu_trace = trace;
    }

    pub fn set_api_trace(&mut self, trace: Option<ApiTraceFn>) {
        self.api_trace = trace;
    }

    /// Resolve a page's effective backing, following exactly one mirror hop.
    /// A mirror that targets another mirror resolves to "unbacked". Returns
    /// an owned `PageBacking` (it is `Copy`) so callers can freely take
    /// further mutable borrows of `self` afterwards.
    fn resolve(&self, addr: u32) -> Option<(PageBacking, MemFlags, u32)> {
        let page = page_of(addr) as usize;
        let entry = self.pages.get(page)?;
        let backing = entry.backing?;
        match backing {
            PageBacking::Mirror { target_page } => {
                let target = self.pages.get(target_page as usize)?;
                match target.backing? {
                    PageBacking::Mirror { .. } => None,
                    other => {
                        let target_addr = (target_page << PAGE_SHIFT) | (addr & (PAGE_SIZE - 1));
                        Some((other, target.flags, target_addr))
                    }
                }
            }
            other => Some((other, entry.flags, addr)),
        }
    }

    fn in_bounds(&self, addr: u32, width: Width) -> bool {
        let last = addr as u64 + width.bits() as u64 - 1;
        last < (self.num_pages as u64) * (PAGE_SIZE as u64)
    }

    /// CPU-facing read: bounds-checked, function-code-aware, traced, events
    /// on every anomaly. Never panics and never reports failure out of band —
    /// on any anomaly the invalid value is returned and the slice continues.
    ///
    /// `watchpoints` is borrowed rather than stored, since `Memory` and
    /// `Tools` are sibling fields of `Machine`/`CpuDriver`: passing the table
    /// in per call avoids a self-referential "`Memory` owns a closure over
    /// its sibling" arrangement.
    pub fn read_cpu(
        &mut self,
        addr: u32,
        width: Width,
        fc_raw: u8,
        bus: &mut EventBus,
        watchpoints: &Points<PointData>,
    ) -> u32 {
        let fc = FunctionCode::from_raw(fc_raw);
        let access = AccessWord::read(width, fc);
        if !self.in_bounds(addr, width) {
            bus.add(EventKind::MemBounds, addr, 0, access.bits(), None);
            return self.invalid_value;
        }
        let value = self.raw_read(addr, width, access, Some(bus));
        if let Some(trace) = self.cpu_trace.as_mut() {
            match trace(access, addr, value) {
                CallbackOutcome::Event => bus.add(EventKind::MemTrace, addr, value, access.bits(), None),
                CallbackOutcome::Error => bus.add(EventKind::CallbackError, addr, value, access.bits(), None),
                CallbackOutcome::NoEvent => {}
            }
        }
        if let Some(id) = watchpoints.check(addr, access.bits()) {
            bus.add(EventKind::Watchpoint, addr, id as u32, access.bits(), None);
        }
        value
    }

    /// CPU-facing write; mirrors `read_cpu`'s event-never-fails contract.
    pub fn write_cpu(
        &mut self,
        addr: u32,
        value: u32,
        width: Width,
        fc_raw: u8,
        bus: &mut EventBus,
        watchpoints: &Points<PointData>,
    ) {
        let fc = FunctionCode::from_raw(fc_raw);
        let access = AccessWord::write(width, fc);
        let value = width.truncate(value);
        if !self.in_bounds(addr, width) {
            bus.add(EventKind::MemBounds, addr, value, access.bits(), None);
            return;
        }
        if !self.raw_write(addr, value, width, access, Some(bus)) {
            return;
        }
        if let Some(trace) = self.cpu_trace.as_mut() {
            match trace(access, addr, value) {
                CallbackOutcome::Event => bus.add(EventKind::MemTrace, addr, value, access.bits(), None),
                CallbackOutcome::Error => bus.add(EventKind::CallbackError, addr, value, access.bits(), None),
                CallbackOutcome::NoEvent => {}
            }
        }
        if let Some(id) = watchpoints.check(addr, access.bits()) {
            bus.add(EventKind::Watchpoint, addr, id as u32, access.bits(), None);
        }
    }

    /// Resolve and perform a single read at `addr`/`width`, dispatching
    /// through RAM/empty/mirror/special backings. `access` is what a special
    /// overlay's callback sees and what any anomaly event is stamped with;
    /// `bus` is `None` for the untraced host API, which also never sees
    /// `MemBounds` (bounds are only checked by `read_cpu`).
    fn raw_read(&mut self, addr: u32, width: Width, access: AccessWord, bus: Option<&mut EventBus>) -> u32 {
        let (backing, flags, addr) = match self.resolve(addr) {
            Some(v) => v,
            None => {
                if let Some(bus) = bus {
                    bus.add(EventKind::MemAccess, addr, 0, access.bits(), None);
                }
                return self.invalid_value;
            }
        };
        if !flags.contains(MemFlags::READ) {
            if let Some(bus) = bus {
                bus.add(EventKind::MemAccess, addr, 0, access.bits(), None);
            }
            return self.invalid_value;
        }
        match backing {
            PageBacking::Ram { region } => {
                let region = self.regions.get(region);
                let off = region.offset_of(addr);
                read_be(&region.data, off, width)
            }
            PageBacking::Empty { value } => width.truncate(value),
            PageBacking::Mirror { .. } => {
                if let Some(bus) = bus {
                    bus.add(EventKind::MemAccess, addr, 0, access.bits(), None);
                }
                self.invalid_value
            }
            PageBacking::Special { id } => {
                let overlay = self.specials.get_mut(id);
                let read = match overlay.read.as_mut() {
                    Some(read) => read,
                    None => {
                        if let Some(bus) = bus {
                            bus.add(EventKind::MemAccess, addr, 0, access.bits(), None);
                        }
                        return self.invalid_value;
                    }
                };
                let (value, outcome, data) = read(access, addr);
                if let Some(bus) = bus {
                    match outcome {
                        CallbackOutcome::Event => bus.add(EventKind::MemSpecial, addr, value, access.bits(), data),
                        CallbackOutcome::Error => bus.add(EventKind::CallbackError, addr, value, access.bits(), data),
                        CallbackOutcome::NoEvent => {}
                    }
                }
                width.truncate(value)
            }
        }
    }

    /// Mirrors `raw_read`'s contract; returns whether the write actually
    /// landed (RAM/empty/special succeeded), matching the original's
    /// distinction between "wrote" and "bounced off an unbacked page".
    fn raw_write(
        &mut self,
        addr: u32,
        value: u32,
        width: Width,
        access: AccessWord,
        bus: Option<&mut EventBus>,
    ) -> bool {
        let (backing, flags, addr) = match self.resolve(addr) {
            Some(v) => v,
            None => {
                if let Some(bus) = bus {
                    bus.add(EventKind::MemAccess, addr, value, access.bits(), None);
                }
                return false;
            }
        };
        if !flags.contains(MemFlags::WRITE) {
            if let Some(bus) = bus {
                bus.add(EventKind::MemAccess, addr, value, access.bits(), None);
            }
            return false;
        }
        match backing {
            PageBacking::Ram { region } => {
                let region = self.regions.get_mut(region);
                let off = region.offset_of(addr);
                write_be(&mut region.data, off, value, width);
                true
            }
            PageBacking::Empty { .. } => true,
            PageBacking::Mirror { .. } => {
                if let Some(bus) = bus {
                    bus.add(EventKind::MemAccess, addr, value, access.bits(), None);
                }
                false
            }
            PageBacking::Special { id } => {
                let overlay = self.specials.get_mut(id);
                let write = match overlay.write.as_mut() {
                    Some(write) => write,
                    None => {
                        if let Some(bus) = bus {
                            bus.add(EventKind::MemAccess, addr, value, access.bits(), None);
                        }
                        return false;
                    }
                };
                let (outcome, data) = write(access, addr, value);
                if let Some(bus) = bus {
                    match outcome {
                        CallbackOutcome::Event => bus.add(EventKind::MemSpecial, addr, value, access.bits(), data),
                        CallbackOutcome::Error => bus.add(EventKind::CallbackError, addr, value, access.bits(), data),
                        CallbackOutcome::NoEvent => {}
                    }
                }
                true
            }
        }
    }

    // ---- Host-facing API: direct, untraced, function-code-less. ----

    pub fn r8(&mut self, addr: u32) -> u8 {
        self.host_read(addr, Width::Byte) as u8
    }

    pub fn r16(&mut self, addr: u32) -> u16 {
        self.host_read(addr, Width::Word) as u16
    }

    pub fn r32(&mut self, addr: u32) -> u32 {
        self.host_read(addr, Width::Long)
    }

    pub fn w8(&mut self, addr: u32, value: u8) {
        self.host_write(addr, value as u32, Width::Byte);
    }

    pub fn w16(&mut self, addr: u32, value: u16) {
        self.host_write(addr, value as u32, Width::Word);
    }

    pub fn w32(&mut self, addr: u32, value: u32) {
        self.host_write(addr, value, Width::Long);
    }

    fn host_read(&mut self, addr: u32, width: Width) -> u32 {
        let access = AccessWord::read(width, FunctionCode::UserData);
        let value = self.raw_read(addr, width, access, None);
        if let Some(trace) = self.api_trace.as_mut() {
            trace(access.bits(), addr, value, 0);
        }
        value
    }

    fn host_write(&mut self, addr: u32, value: u32, width: Width) {
        let value = width.truncate(value);
        let access = AccessWord::write(width, FunctionCode::UserData);
        self.raw_write(addr, value, width, access, None);
        if let Some(trace) = self.api_trace.as_mut() {
            trace(access.bits(), addr, value, 0);
        }
    }

    fn raw_byte_read(&mut self, addr: u32) -> u8 {
        let access = AccessWord::read(Width::Byte, FunctionCode::UserData);
        self.raw_read(addr, Width::Byte, access, None) as u8
    }

    fn raw_byte_write(&mut self, addr: u32, value: u8) {
        let access = AccessWord::write(Width::Byte, FunctionCode::UserData);
        self.raw_write(addr, value as u32, Width::Byte, access, None);
    }

    /// Bytes remaining from `addr` to the end of its owning RAM region,
    /// matching `mem_get_max_range`. `None` if `addr` is not RAM-backed.
    fn max_range(&self, addr: u32) -> Option<u32> {
        match self.resolve(addr)? {
            (PageBacking::Ram { region }, _, region_addr) => Some(self.regions.get(region).remaining_from(region_addr)),
            _ => None,
        }
    }

    /// Fill `addr..addr+len` with `value`, untraced per byte; fires one
    /// `ApiAccessKind::BSet` trace afterwards, matching `mem_set_block`.
    pub fn set_block(&mut self, addr: u32, len: u32, value: u8) {
        for i in 0..len {
            self.raw_byte_write(addr + i, value);
        }
        if let Some(trace) = self.api_trace.as_mut() {
            trace(ApiAccessKind::BSet.bits(), addr, len, value as u32);
        }
    }

    /// Copy `len` bytes from `src` to `dst` through the host API (so mirrors
    /// and specials at either end behave as a real host caller would see).
    /// Fires one `ApiAccessKind::BCopy` trace afterwards, matching `mem_copy_block`.
    pub fn copy_block(&mut self, src: u32, dst: u32, len: u32) {
        for i in 0..len {
            let b = self.raw_byte_read(src + i);
            self.raw_byte_write(dst + i, b);
        }
        if let Some(trace) = self.api_trace.as_mut() {
            trace(ApiAccessKind::BCopy.bits(), dst, len, src);
        }
    }

    /// Read `buf.len()` bytes starting at `addr` into `buf`.
    pub fn r_block(&mut self, addr: u32, buf: &mut [u8]) {
        for (i, slot) in buf.iter_mut().enumerate() {
            *slot = self.raw_byte_read(addr + i as u32);
        }
        if let Some(trace) = self.api_trace.as_mut() {
            trace(ApiAccessKind::RBlock.bits(), addr, buf.len() as u32, 0);
        }
    }

    /// Write all of `buf` starting at `addr`.
    pub fn w_block(&mut self, addr: u32, buf: &[u8]) {
        for (i, byte) in buf.iter().enumerate() {
            self.raw_byte_write(addr + i as u32, *byte);
        }
        if let Some(trace) = self.api_trace.as_mut() {
            trace(ApiAccessKind::WBlock.bits(), addr, buf.len() as u32, 0);
        }
    }

    /// Read a NUL-terminated C string, bounded by the remaining bytes in
    /// `addr`'s owning RAM region (`mem_get_max_range`). `None` if `addr`
    /// isn't RAM-backed or no NUL terminator falls within range.
    pub fn r_cstr(&mut self, addr: u32) -> Option<Vec<u8>> {
        let size = self.max_range(addr)?;
        let mut out = Vec::new();
        for i in 0..size {
            let b = self.raw_byte_read(addr + i);
            if b == 0 {
                if let Some(trace) = self.api_trace.as_mut() {
                    trace(ApiAccessKind::RCstr.bits(), addr, out.len() as u32, 0);
                }
                return Some(out);
            }
            out.push(b);
        }
        None
    }

    /// Write `bytes` followed by a terminating NUL, bounded the same way as
    /// `r_cstr`. Returns `false` (no write performed) if `bytes` plus the NUL
    /// don't fit in the remaining region.
    pub fn w_cstr(&mut self, addr: u32, bytes: &[u8]) -> bool {
        let size = match self.max_range(addr) {
            Some(size) => size,
            None => return false,
        };
        if bytes.len() as u32 + 1 > size {
            return false;
        }
        for (i, byte) in bytes.iter().enumerate() {
            self.raw_byte_write(addr + i as u32, *byte);
        }
        self.raw_byte_write(addr + bytes.len() as u32, 0);
        if let Some(trace) = self.api_trace.as_mut() {
            trace(ApiAccessKind::WCstr.bits(), addr, bytes.len() as u32, 0);
        }
        true
    }

    /// Read a BCPL-style length-prefixed string: one length byte, then data,
    /// bounded the same way as `r_cstr`. `None` if `addr` isn't RAM-backed or
    /// the length byte plus its data don't fit in the remaining region.
    pub fn r_bstr(&mut self, addr: u32) -> Option<Vec<u8>> {
        let size = self.max_range(addr)?;
        if size == 0 {
            return None;
        }
        let len = self.raw_byte_read(addr) as u32;
        if len + 1 > size {
            return None;
        }
        let mut out = vec![0u8; len as usize];
        for (i, slot) in out.iter_mut().enumerate() {
            *slot = self.raw_byte_read(addr + 1 + i as u32);
        }
        if let Some(trace) = self.api_trace.as_mut() {
            trace(ApiAccessKind::RBstr.bits(), addr, len, 0);
        }
        Some(out)
    }

    /// Write a BCPL-style length-prefixed string. Returns `false` (no write
    /// performed) if `bytes.len()` exceeds 255 or doesn't fit in the
    /// remaining region, matching `mem_w_bstr`'s rejection of an oversized
    /// string instead of silently truncating its length prefix.
    pub fn w_bstr(&mut self, addr: u32, bytes: &[u8]) -> bool {
        if bytes.len() > 255 {
            return false;
        }
        let size = match self.max_range(addr) {
            Some(size) => size,
            None => return false,
        };
        if bytes.len() as u32 + 1 > size {
            return false;
        }
        self.raw_byte_write(addr, bytes.len() as u8);
        for (i, byte) in bytes.iter().enumerate() {
            self.raw_byte_write(addr + 1 + i as u32, *byte);
        }
        if let Some(trace) = self.api_trace.as_mut() {
            trace(ApiAccessKind::WBstr.bits(), addr, bytes.len() as u32, 0);
        }
        true
    }

    /// Read a BCPL pointer (stored as a word-address, `addr = byte_addr / 4`)
    /// and return the byte address it designates.
    pub fn rb32(&mut self, addr: u32) -> u32 {
        let access = AccessWord::read(Width::Long, FunctionCode::UserData);
        let value = self.raw_read(addr, Width::Long, access, None) * 4;
        if let Some(trace) = self.api_trace.as_mut() {
            trace(ApiAccessKind::RB32.bits(), addr, value, 0);
        }
        value
    }

    /// Write a byte address as a BCPL pointer (`value / 4`).
    pub fn wb32(&mut self, addr: u32, byte_addr: u32) {
        let access = AccessWord::write(Width::Long, FunctionCode::UserData);
        self.raw_write(addr, byte_addr / 4, Width::Long, access, None);
        if let Some(trace) = self.api_trace.as_mut() {
            trace(ApiAccessKind::WB32.bits(), addr, byte_addr, 0);
        }
    }
}

fn read_be(data: &[u8], off: usize, width: Width) -> u32 {
    match width {
        Width::Byte => data[off] as u32,
        Width::Word => BigEndian::read_u16(&data[off..off + 2]) as u32,
        Width::Long => BigEndian::read_u32(&data[off..off + 4]),
    }
}

fn write_be(data: &mut [u8], off: usize, value: u32, width: Width) {
    match width {
        Width::Byte => data[off] = value as u8,
        Width::Word => BigEndian::write_u16(&mut data[off..off + 2], value as u16),
        Width::Long => BigEndian::write_u32(&mut data[off..off + 4], value),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn event_bus() -> EventBus {
        EventBus::new()
    }

    #[test]
    fn ram_round_trips_big_endian() {
        let mut mem = Memory::new(4);
        mem.add_memory(0, 1, MemFlags::READ | MemFlags::WRITE).unwrap();
        mem.w32(0x100, 0xdead_beef);
        assert_eq!(mem.r32(0x100), 0xdead_beef);
        assert_eq!(mem.r8(0x100), 0xde);
        assert_eq!(mem.r16(0x102), 0xbeef);
    }

    #[test]
    fn empty_page_returns_constant_and_discards_writes() {
        let mut mem = Memory::new(2);
        mem.add_empty(0, 1, MemFlags::READ | MemFlags::WRITE, 0xffff_ffff)
            .unwrap();
        assert_eq!(mem.r32(0), 0xffff_ffff);
        mem.w32(0, 0);
        assert_eq!(mem.r32(0), 0xffff_ffff);
    }

    #[test]
    fn mirror_forwards_one_hop() {
        let mut mem = Memory::new(4);
        mem.add_memory(0, 1, MemFlags::READ | MemFlags::WRITE).unwrap();
        mem.add_mirror(1, 1, MemFlags::READ | MemFlags::WRITE, 0).unwrap();
        mem.w8(0x0010, 0x42);
        assert_eq!(mem.r8(PAGE_SIZE + 0x0010), 0x42);
    }

    #[test]
    fn chained_mirror_resolves_to_unbacked() {
        let mut mem = Memory::new(4);
        mem.add_mirror(1, 1, MemFlags::READ, 2).unwrap();
        mem.add_mirror(2, 1, MemFlags::READ, 0).unwrap();
        let mut bus = event_bus();
        let watchpoints = Points::new(0);
        let v = mem.read_cpu(PAGE_SIZE, Width::Byte, 1, &mut bus, &watchpoints);
        assert_eq!(v, mem.invalid_value);
        assert_eq!(bus.num_events(), 1);
    }

    #[test]
    fn out_of_bounds_read_reports_mem_bounds() {
        let mut mem = Memory::new(1);
        let mut bus = event_bus();
        let watchpoints = Points::new(0);
        let v = mem.read_cpu(PAGE_SIZE, Width::Byte, 1, &mut bus, &watchpoints);
        assert_eq!(v, 0);
        assert_eq!(bus.events()[0].kind as u8, EventKind::MemBounds as u8);
    }

    #[test]
    fn unbacked_page_reports_mem_access() {
        let mut mem = Memory::new(1);
        let mut bus = event_bus();
        let watchpoints = Points::new(0);
        mem.read_cpu(0, Width::Byte, 1, &mut bus, &watchpoints);
        assert_eq!(bus.events()[0].kind as u8, EventKind::MemAccess as u8);
    }

    #[test]
    fn watchpoint_hit_on_cpu_read_enqueues_event() {
        let mut mem = Memory::new(1);
        mem.add_memory(0, 1, MemFlags::READ).unwrap();
        let mut watchpoints: Points<PointData> = Points::new(1);
        watchpoints.create(0, PointData { addr: 0x10, flags: 0xffff_ffff });
        let mut bus = event_bus();
        mem.read_cpu(0x10, Width::Byte, 1, &mut bus, &watchpoints);
        assert!(bus.events().iter().any(|e| e.kind as u8 == EventKind::Watchpoint as u8));
    }

    #[test]
    fn add_memory_rejects_out_of_range() {
        let mut mem = Memory::new(2);
        let err = mem.add_memory(1, 2, MemFlags::READ).unwrap_err();
        assert_eq!(
            err,
            MemoryConfigError::OutOfRange {
                start_page: 1,
                end_page: 3,
                num_pages: 2
            }
        );
    }

    #[test]
    fn add_mirror_rejects_self_mirror() {
        let mut mem = Memory::new(2);
        let err = mem.add_mirror(0, 1, MemFlags::READ, 0).unwrap_err();
        assert_eq!(err, MemoryConfigError::SelfMirror { page: 0 });
    }

    #[test]
    fn bcpl_pointer_conversion_round_trips() {
        let mut mem = Memory::new(1);
        mem.add_memory(0, 1, MemFlags::READ | MemFlags::WRITE).unwrap();
        mem.wb32(0, 0x40);
        assert_eq!(mem.r32(0), 0x10);
        assert_eq!(mem.rb32(0), 0x40);
    }

    #[test]
    fn special_overlay_dispatches_read_and_write() {
        use std::cell::RefCell;
        use std::rc::Rc;

        let store = Rc::new(RefCell::new(0u32));
        let store_r = store.clone();
        let store_w = store.clone();
        let mut mem = Memory::new(1);
        mem.add_special(
            0,
            1,
            MemFlags::READ | MemFlags::WRITE,
            Some(Box::new(move |_access, _addr| {
                (*store_r.borrow(), CallbackOutcome::NoEvent, None)
            })),
            Some(Box::new(move |_access, _addr, value| {
                *store_w.borrow_mut() = value;
                (CallbackOutcome::NoEvent, None)
            })),
        )
        .unwrap();
        mem.w32(0, 7);
        assert_eq!(*store.borrow(), 7);
        assert_eq!(mem.r32(0), 7);
    }

    #[test]
    fn special_overlay_event_outcome_reaches_the_bus_on_cpu_access() {
        let mut mem = Memory::new(1);
        mem.add_special(
            0,
            1,
            MemFlags::READ | MemFlags::WRITE,
            Some(Box::new(|_access, _addr| (0x55, CallbackOutcome::Event, None))),
            Some(Box::new(|_access, _addr, _value| (CallbackOutcome::Error, None))),
        )
        .unwrap();
        let watchpoints = Points::new(0);

        let mut bus = event_bus();
        let value = mem.read_cpu(0, Width::Byte, 1, &mut bus, &watchpoints);
        assert_eq!(value, 0x55);
        assert_eq!(bus.events()[0].kind as u8, EventKind::MemSpecial as u8);

        let mut bus = event_bus();
        mem.write_cpu(0, 1, Width::Byte, 1, &mut bus, &watchpoints);
        assert_eq!(bus.events()[0].kind as u8, EventKind::CallbackError as u8);
    }

    #[test]
    fn special_overlay_sees_the_real_function_code() {
        use std::cell::RefCell;
        use std::rc::Rc;

        let seen_fc = Rc::new(RefCell::new(0u32));
        let seen_fc_clone = seen_fc.clone();
        let mut mem = Memory::new(1);
        mem.add_special(
            0,
            1,
            MemFlags::READ,
            Some(Box::new(move |access, _addr| {
                *seen_fc_clone.borrow_mut() = access.function_code_bits();
                (0, CallbackOutcome::NoEvent, None)
            })),
            None,
        )
        .unwrap();
        let watchpoints = Points::new(0);
        let mut bus = event_bus();
        // fc_raw = 5 -> SuperData (0x2100), never the UserData this overlay
        // would see if the function code were hardcoded.
        mem.read_cpu(0, Width::Byte, 5, &mut bus, &watchpoints);
        assert_eq!(*seen_fc.borrow(), FunctionCode::SuperData.bits());
    }

    #[test]
    fn cstr_round_trips_and_is_bounded_by_the_region() {
        let mut mem = Memory::new(1);
        mem.add_memory(0, 1, MemFlags::READ | MemFlags::WRITE).unwrap();
        assert!(mem.w_cstr(PAGE_SIZE - 4, b"hi"));
        assert_eq!(mem.r_cstr(PAGE_SIZE - 4), Some(b"hi".to_vec()));
        // "toolong" plus its NUL does not fit in the last 3 bytes of the region.
        assert!(!mem.w_cstr(PAGE_SIZE - 3, b"toolong"));
        // not RAM-backed at all.
        assert_eq!(mem.r_cstr(PAGE_SIZE), None);
    }

    #[test]
    fn bstr_round_trips_and_rejects_oversized_strings() {
        let mut mem = Memory::new(1);
        mem.add_memory(0, 1, MemFlags::READ | MemFlags::WRITE).unwrap();
        assert!(mem.w_bstr(0, b"hello"));
        assert_eq!(mem.r_bstr(0), Some(b"hello".to_vec()));
        assert!(!mem.w_bstr(0, &[0u8; 256]));
        // fits the 255-byte cap but not the one remaining byte in the region.
        assert!(!mem.w_bstr(PAGE_SIZE - 1, &[0u8; 1]));
    }

    #[test]
    fn block_and_string_helpers_fire_their_api_subtype() {
        use std::cell::RefCell;
        use std::rc::Rc;

        let seen = Rc::new(RefCell::new(Vec::new()));
        let seen_clone = seen.clone();
        let mut mem = Memory::new(1);
        mem.add_memory(0, 1, MemFlags::READ | MemFlags::WRITE).unwrap();
        mem.set_api_trace(Some(Box::new(move |access, addr, val, extra| {
            seen_clone.borrow_mut().push((access, addr, val, extra));
        })));

        mem.set_block(0, 4, 0xaa);
        mem.w_cstr(0x10, b"ok");
        mem.rb32(0x20);

        let log = seen.borrow();
        assert_eq!(log[0], (ApiAccessKind::BSet.bits(), 0, 4, 0xaa));
        assert_eq!(log[1], (ApiAccessKind::WCstr.bits(), 0x10, 2, 0));
        assert_eq!(log[2].0, ApiAccessKind::RB32.bits());
    }
}
