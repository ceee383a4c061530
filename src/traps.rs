/*!
traps.rs - A-line opcode trap table.

Grounded on `examples/original_source/bare68k/machine_src/glue/traps.c`: a
fixed 4096-slot table keyed by an A-line opcode's low 12 bits, a doubly
linked free list threaded through the slots themselves (so `setup_abs` can
unlink an arbitrary slot in O(1) by its neighbours, not just the head), and a
dispatch order of global-enable check, then page TRAPS-flag check, then
per-slot ENABLE check, before an event is ever enqueued.

A trap's host payload is a plain `u32` tag rather than a boxed `dyn Any`
(unlike labels or special overlays): the original C `data` pointer is never
inspected by this layer, only handed back verbatim, and a `Copy` tag lets
`dispatch` stamp a fresh `Event::data` without taking ownership away from the
slot (a trap, unlike a label or event, usually survives being dispatched).
*/

use bitflags::bitflags;

use crate::event::{EventBus, EventKind};
use crate::memory::MemFlags;

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct TrapFlags: u8 {
        const ONE_SHOT = 0b0001;
        const AUTO_RTS = 0b0010;
        const SETUP    = 0b0100;
        const ENABLE   = 0b1000;
    }
}

/// Result of dispatching an A-line opcode, mirroring `M68K_ALINE_*`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrapOutcome {
    Except,
    None,
    Rts,
}

const NUM_SLOTS: usize = 4096;
const OPCODE_BASE: u16 = 0xA000;
/// Sentinel opcode meaning "no slot available", matching `TRAP_INVALID`.
pub const TRAP_INVALID: u16 = 0xFFFF;

#[derive(Clone, Copy)]
struct TrapSlot {
    flags: TrapFlags,
    data: u32,
    prev: Option<u16>,
    next: Option<u16>,
}

impl TrapSlot {
    const fn empty() -> TrapSlot {
        TrapSlot {
            flags: TrapFlags::empty(),
            data: 0,
            prev: None,
            next: None,
        }
    }
}

/// Fixed 4096-slot A-line trap table.
pub struct TrapTable {
    slots: Vec<TrapSlot>,
    free_head: Option<u16>,
    enabled: bool,
}

impl Default for TrapTable {
    fn default() -> Self {
        Self::new()
    }
}

impl TrapTable {
    pub fn new() -> TrapTable {
        let mut slots = vec![TrapSlot::empty(); NUM_SLOTS];
        for id in 0..NUM_SLOTS as u16 {
            slots[id as usize].prev = id.checked_sub(1);
            slots[id as usize].next = if id as usize + 1 < NUM_SLOTS { Some(id + 1) } else { None };
        }
        TrapTable {
            slots,
            free_head: Some(0),
            enabled: true,
        }
    }

    /// Globally enable or disable A-line dispatch (independent of per-slot
    /// ENABLE bits); a disabled table always excepts.
    pub fn set_globally_enabled(&mut self, enabled: bool) {
        self.enabled = enabled;
    }

    pub fn num_free(&self) -> usize {
        let mut count = 0;
        let mut cur = self.free_head;
        while let Some(id) = cur {
            count += 1;
            cur = self.slots[id as usize].next;
        }
        count
    }

    fn unlink(&mut self, id: u16) {
        let (prev, next) = {
            let slot = &self.slots[id as usize];
            (slot.prev, slot.next)
        };
        match prev {
            Some(p) => self.slots[p as usize].next = next,
            None => self.free_head = next,
        }
        if let Some(n) = next {
            self.slots[n as usize].prev = prev;
        }
        let slot = &mut self.slots[id as usize];
        slot.prev = None;
        slot.next = None;
    }

    fn push_free(&mut self, id: u16) {
        let old_head = self.free_head;
        {
            let slot = &mut self.slots[id as usize];
            slot.prev = None;
            slot.next = old_head;
            slot.flags = TrapFlags::empty();
            slot.data = 0;
        }
        if let Some(head) = old_head {
            self.slots[head as usize].prev = Some(id);
        }
        self.free_head = Some(id);
    }

    fn is_free(&self, id: u16) -> bool {
        !self.slots[id as usize].flags.intersects(TrapFlags::SETUP | TrapFlags::ENABLE)
    }

    /// Allocate the first free slot. Returns the A-line opcode, or
    /// `TRAP_INVALID` if the table is full.
    pub fn setup(&mut self, flags: TrapFlags, data: u32) -> u16 {
        let id = match self.free_head {
            Some(id) => id,
            None => return TRAP_INVALID,
        };
        self.unlink(id);
        let slot = &mut self.slots[id as usize];
        slot.flags = flags | TrapFlags::SETUP | TrapFlags::ENABLE;
        slot.data = data;
        let opcode = OPCODE_BASE | id;
        log::trace!("traps: setup opcode {:#06x} flags={:?}", opcode, slot.flags);
        opcode
    }

    /// Allocate a specific slot id, unlinking it from the free list by its
    /// own neighbours. Fails if the slot is already set up.
    pub fn setup_abs(&mut self, id: u16, flags: TrapFlags, data: u32) -> Option<u16> {
        if id as usize >= NUM_SLOTS || !self.is_free(id) {
            return None;
        }
        self.unlink(id);
        let slot = &mut self.slots[id as usize];
        slot.flags = flags | TrapFlags::SETUP | TrapFlags::ENABLE;
        slot.data = data;
        Some(OPCODE_BASE | id)
    }

    /// Release a slot, returning its last-stored data tag.
    pub fn free(&mut self, opcode: u16) -> Option<u32> {
        let id = opcode & 0x0fff;
        if self.is_free(id) {
            return None;
        }
        let data = self.slots[id as usize].data;
        self.push_free(id);
        log::trace!("traps: freed opcode {:#06x}", opcode);
        Some(data)
    }

    pub fn enable(&mut self, opcode: u16) {
        let id = (opcode & 0x0fff) as usize;
        self.slots[id].flags |= TrapFlags::ENABLE;
    }

    pub fn disable(&mut self, opcode: u16) {
        let id = (opcode & 0x0fff) as usize;
        self.slots[id].flags.remove(TrapFlags::ENABLE);
    }

    pub fn data(&self, opcode: u16) -> Option<u32> {
        let id = (opcode & 0x0fff) as usize;
        if self.is_free(id as u16) {
            None
        } else {
            Some(self.slots[id].data)
        }
    }

    /// Dispatch an A-line opcode fetched from a page with the given flags.
    pub fn dispatch(&mut self, opcode: u16, pc: u32, page_flags: MemFlags, bus: &mut EventBus) -> TrapOutcome {
        if !self.enabled || !page_flags.contains(MemFlags::TRAPS) {
            return TrapOutcome::Except;
        }
        let id = opcode & 0x0fff;
        let slot = self.slots[id as usize];
        if !slot.flags.contains(TrapFlags::ENABLE) {
            return TrapOutcome::Except;
        }

        log::trace!("traps: dispatch opcode {:#06x} at pc={:#010x}", opcode, pc);
        bus.add(
            EventKind::AlineTrap,
            pc,
            OPCODE_BASE as u32 | id as u32,
            slot.flags.bits() as u32,
            Some(Box::new(slot.data)),
        );

        if slot.flags.contains(TrapFlags::ONE_SHOT) {
            self.free(opcode);
        }

        if slot.flags.contains(TrapFlags::AUTO_RTS) {
            TrapOutcome::Rts
        } else {
            TrapOutcome::None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn setup_and_dispatch_round_trip() {
        let mut traps = TrapTable::new();
        let opcode = traps.setup(TrapFlags::empty(), 7);
        assert_ne!(opcode, TRAP_INVALID);
        assert_eq!(opcode & 0xf000, OPCODE_BASE);

        let mut bus = EventBus::new();
        let outcome = traps.dispatch(opcode, 0x400, MemFlags::TRAPS, &mut bus);
        assert_eq!(outcome, TrapOutcome::None);
        assert_eq!(bus.num_events(), 1);
        assert_eq!(traps.data(opcode), Some(7));
    }

    #[test]
    fn dispatch_without_traps_flag_excepts() {
        let mut traps = TrapTable::new();
        let opcode = traps.setup(TrapFlags::empty(), 0);
        let mut bus = EventBus::new();
        let outcome = traps.dispatch(opcode, 0, MemFlags::empty(), &mut bus);
        assert_eq!(outcome, TrapOutcome::Except);
        assert_eq!(bus.num_events(), 0);
    }

    #[test]
    fn one_shot_frees_after_single_dispatch() {
        let mut traps = TrapTable::new();
        let opcode = traps.setup(TrapFlags::ONE_SHOT, 1);
        let mut bus = EventBus::new();
        traps.dispatch(opcode, 0, MemFlags::TRAPS, &mut bus);
        let outcome = traps.dispatch(opcode, 0, MemFlags::TRAPS, &mut bus);
        assert_eq!(outcome, TrapOutcome::Except);
    }

    #[test]
    fn auto_rts_reports_rts() {
        let mut traps = TrapTable::new();
        let opcode = traps.setup(TrapFlags::AUTO_RTS, 0);
        let mut bus = EventBus::new();
        let outcome = traps.dispatch(opcode, 0, MemFlags::TRAPS, &mut bus);
        assert_eq!(outcome, TrapOutcome::Rts);
    }

    #[test]
    fn setup_abs_unlinks_arbitrary_slot() {
        let mut traps = TrapTable::new();
        assert!(traps.setup_abs(100, TrapFlags::empty(), 0).is_some());
        assert!(traps.setup_abs(100, TrapFlags::empty(), 0).is_none());
        assert_eq!(traps.num_free(), NUM_SLOTS - 1);
    }

    #[test]
    fn free_returns_slot_to_free_list() {
        let mut traps = TrapTable::new();
        let opcode = traps.setup(TrapFlags::empty(), 55);
        assert_eq!(traps.num_free(), NUM_SLOTS - 1);
        assert_eq!(traps.free(opcode), Some(55));
        assert_eq!(traps.num_free(), NUM_SLOTS);
    }

    #[test]
    fn disable_then_dispatch_excepts() {
        let mut traps = TrapTable::new();
        let opcode = traps.setup(TrapFlags::empty(), 0);
        traps.disable(opcode);
        let mut bus = EventBus::new();
        let outcome = traps.dispatch(opcode, 0, MemFlags::TRAPS, &mut bus);
        assert_eq!(outcome, TrapOutcome::Except);
    }
}
