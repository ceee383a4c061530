/*!
event.rs - bounded event queue delivered to the host after each execution slice.

Overview
- A machine never aborts a slice on an anomaly (bad access, callback error,
  trap). It records an `Event` and keeps going; the host decides what to do
  by inspecting the `RunInfo` snapshot handed back once the slice ends.
- The queue holds at most `EventBus::CAPACITY` events. The ninth+ enqueue in
  a slice only increments `lost_events` — the slot array itself never grows.
- The *first* event of a slice fires a one-shot "timeslice end" latch. The
  CPU driver installs this latch before calling into the interpreter so the
  interpreter can stop at the next instruction boundary instead of running
  its full cycle budget once something worth reporting has happened.

Grounded on `examples/original_source/bare68k/machine_src/glue/cpu.c`
(`cpu_add_event`, `cpu_clear_info`, `event_func`/`cleanup_func` statics),
translated from a pair of global function pointers into owned `Box<dyn FnMut>`
fields following the callback-struct idiom in `arness`'s `bus/dma.rs` and
`bus/clock.rs`.
*/

use std::any::Any;

/// Stable, wire-level event kind values (see SPEC_FULL.md §6).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum EventKind {
    CallbackError = 0,
    Reset = 1,
    AlineTrap = 2,
    MemAccess = 3,
    MemBounds = 4,
    MemTrace = 5,
    MemSpecial = 6,
    InstrHook = 7,
    IntAck = 8,
    Breakpoint = 9,
    Watchpoint = 10,
    Timer = 11,
}

/// Result a host-supplied callback reports back to the crate.
///
/// Every callback-shaped seam (special overlay read/write, CPU trace,
/// instruction hook, interrupt ack) returns one of these. `Event`/`NoEvent`
/// are both "the callback ran fine"; only the former also enqueues a record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallbackOutcome {
    Event,
    NoEvent,
    Error,
}

/// A single recorded condition, as delivered to the host in `RunInfo::events`.
pub struct Event {
    pub kind: EventKind,
    pub cycles: u64,
    pub addr: u32,
    pub value: u32,
    pub flags: u32,
    pub data: Option<Box<dyn Any>>,
}

impl std::fmt::Debug for Event {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Event")
            .field("kind", &self.kind)
            .field("cycles", &self.cycles)
            .field("addr", &self.addr)
            .field("value", &self.value)
            .field("flags", &self.flags)
            .field("data", &self.data.is_some())
            .finish()
    }
}

/// Immutable snapshot the host inspects after a slice.
///
/// `lost_events` is the only trace left of anything past the eighth event in
/// a slice; `total_cycles` accumulates across slices until `CpuDriver::reset`
/// (see SPEC_FULL.md §10 Open Question 1).
#[derive(Debug, Default)]
pub struct RunInfo {
    pub num_events: usize,
    pub lost_events: u32,
    pub done_cycles: u64,
    pub total_cycles: u64,
}

/// Bounded event queue plus the timeslice-end latch.
pub struct EventBus {
    events: Vec<Event>,
    lost_events: u32,
    done_cycles: u64,
    total_cycles: u64,
    cycle_clock: u64,
    timeslice_end: Option<Box<dyn FnMut()>>,
    cleanup: Option<Box<dyn Fn(&Event)>>,
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

impl EventBus {
    /// Maximum number of events buffered per slice.
    pub const CAPACITY: usize = 8;

    pub fn new() -> Self {
        Self {
            events: Vec::with_capacity(Self::CAPACITY),
            lost_events: 0,
            done_cycles: 0,
            total_cycles: 0,
            cycle_clock: 0,
            timeslice_end: None,
            cleanup: None,
        }
    }

    /// Install the hook invoked exactly once, on the first enqueue of a slice.
    ///
    /// The CPU driver wires this to the interpreter's "end my timeslice now"
    /// entry point before calling `Interpreter::execute`.
    pub fn set_timeslice_end_hook(&mut self, hook: Option<Box<dyn FnMut()>>) {
        self.timeslice_end = hook;
    }

    /// Install the cleanup hook invoked on each event's `data` when `clear` runs.
    pub fn set_cleanup_hook(&mut self, hook: Option<Box<dyn Fn(&Event)>>) {
        self.cleanup = hook;
    }

    /// Advance the bus's notion of "current cycle" (stamped onto new events).
    pub fn set_cycle_clock(&mut self, cycles: u64) {
        self.cycle_clock = cycles;
    }

    /// Enqueue an event, or count it as lost if the slice's buffer is full.
    ///
    /// Fires the timeslice-end hook exactly once: on the transition from zero
    /// to one stored events.
    pub fn add(&mut self, kind: EventKind, addr: u32, value: u32, flags: u32, data: Option<Box<dyn Any>>) {
        if self.events.len() >= Self::CAPACITY {
            self.lost_events += 1;
            return;
        }
        let was_empty = self.events.is_empty();
        self.events.push(Event {
            kind,
            cycles: self.cycle_clock,
            addr,
            value,
            flags,
            data,
        });
        if was_empty {
            if let Some(hook) = self.timeslice_end.as_mut() {
                hook();
            }
        }
    }

    /// Number of events currently buffered for this slice.
    pub fn num_events(&self) -> usize {
        self.events.len()
    }

    pub fn events(&self) -> &[Event] {
        &self.events
    }

    pub fn lost_events(&self) -> u32 {
        self.lost_events
    }

    /// Record how many cycles the just-finished slice actually ran, folding
    /// them into the running `total_cycles` counter.
    pub fn account_slice(&mut self, done_cycles: u64) {
        self.done_cycles = done_cycles;
        self.total_cycles += done_cycles;
    }

    pub fn run_info(&self) -> RunInfo {
        RunInfo {
            num_events: self.events.len(),
            lost_events: self.lost_events,
            done_cycles: self.done_cycles,
            total_cycles: self.total_cycles,
        }
    }

    /// Invoke the cleanup hook on every buffered event, then zero all counts
    /// for the slice (matches `cpu_clear_info`, which does NOT touch
    /// `total_cycles`).
    pub fn clear(&mut self) {
        if let Some(cleanup) = self.cleanup.as_ref() {
            for event in &self.events {
                cleanup(event);
            }
        }
        self.events.clear();
        self.lost_events = 0;
        self.done_cycles = 0;
    }

    /// Reset both cycle counters to zero (only legal while IDLE; see `CpuDriver::reset`).
    pub fn reset_cycles(&mut self) {
        self.done_cycles = 0;
        self.total_cycles = 0;
        self.cycle_clock = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn enqueue_and_snapshot() {
        let mut bus = EventBus::new();
        bus.add(EventKind::Reset, 0x1000, 0, 0, None);
        let info = bus.run_info();
        assert_eq!(info.num_events, 1);
        assert_eq!(info.lost_events, 0);
    }

    #[test]
    fn overflow_counts_lost_events() {
        let mut bus = EventBus::new();
        for i in 0..12 {
            bus.add(EventKind::MemAccess, i, 0, 0, None);
        }
        let info = bus.run_info();
        assert_eq!(info.num_events, EventBus::CAPACITY);
        assert_eq!(info.lost_events, 4);
    }

    #[test]
    fn timeslice_end_fires_once_on_first_event() {
        use std::cell::RefCell;
        use std::rc::Rc;

        let fired = Rc::new(RefCell::new(0));
        let fired_clone = fired.clone();
        let mut bus = EventBus::new();
        bus.set_timeslice_end_hook(Some(Box::new(move || {
            *fired_clone.borrow_mut() += 1;
        })));
        bus.add(EventKind::Reset, 0, 0, 0, None);
        bus.add(EventKind::Reset, 0, 0, 0, None);
        bus.add(EventKind::Reset, 0, 0, 0, None);
        assert_eq!(*fired.borrow(), 1);
    }

    #[test]
    fn clear_invokes_cleanup_and_zeroes_counts() {
        use std::cell::RefCell;
        use std::rc::Rc;

        let cleaned = Rc::new(RefCell::new(0));
        let cleaned_clone = cleaned.clone();
        let mut bus = EventBus::new();
        bus.set_cleanup_hook(Some(Box::new(move |_event: &Event| {
            *cleaned_clone.borrow_mut() += 1;
        })));
        bus.add(EventKind::Reset, 0, 0, 0, Some(Box::new(42u32)));
        bus.add(EventKind::Reset, 0, 0, 0, Some(Box::new(43u32)));
        bus.clear();
        assert_eq!(*cleaned.borrow(), 2);
        assert_eq!(bus.num_events(), 0);
        assert_eq!(bus.lost_events(), 0);
    }

    #[test]
    fn clear_does_not_touch_total_cycles() {
        let mut bus = EventBus::new();
        bus.account_slice(100);
        bus.add(EventKind::Reset, 0, 0, 0, None);
        bus.clear();
        assert_eq!(bus.run_info().total_cycles, 100);
        assert_eq!(bus.run_info().done_cycles, 0);
    }
}
