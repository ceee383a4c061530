/*!
special.rs - host-callback-backed page ranges ("special overlays").

Grounded on `mem_add_special`/`r8_special`/`w8_special` in
`examples/original_source/bare68k/machine_src/glue/mem.c`: a special overlay
owns a read callback and a write callback (either may be absent), and every
call's three-valued outcome drives a `MemSpecial`/`CallbackError` event. The
callback-struct-with-boxed-closures idiom follows `arness`'s `bus/dma.rs`
(`CpuMemory`/`OamWriter` traits wrapping a borrowed slice of `Bus` state).
*/

use std::any::Any;

use crate::access::AccessWord;
use crate::event::CallbackOutcome;

/// `(value, outcome, optional event payload)`.
pub type SpecialReadResult = (u32, CallbackOutcome, Option<Box<dyn Any>>);
/// `(outcome, optional event payload)`.
pub type SpecialWriteResult = (CallbackOutcome, Option<Box<dyn Any>>);

pub type SpecialReadFn = Box<dyn FnMut(AccessWord, u32) -> SpecialReadResult>;
pub type SpecialWriteFn = Box<dyn FnMut(AccessWord, u32, u32) -> SpecialWriteResult>;

/// Opaque handle to an installed special overlay.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct SpecialId(pub(super) u32);

impl std::fmt::Debug for SpecialId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "SpecialId({})", self.0)
    }
}

pub(super) struct SpecialOverlay {
    pub read: Option<SpecialReadFn>,
    pub write: Option<SpecialWriteFn>,
}

#[derive(Default)]
pub(super) struct SpecialArena {
    overlays: Vec<SpecialOverlay>,
}

impl SpecialArena {
    pub fn insert(&mut self, overlay: SpecialOverlay) -> SpecialId {
        let id = SpecialId(self.overlays.len() as u32);
        self.overlays.push(overlay);
        id
    }

    pub fn get_mut(&mut self, id: SpecialId) -> &mut SpecialOverlay {
        &mut self.overlays[id.0 as usize]
    }
}
