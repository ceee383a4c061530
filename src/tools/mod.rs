/*!
tools - PC trace, breakpoints, watchpoints, and timers (SPEC_FULL.md §4.E).

`Tools` is the façade a `CpuDriver` drives from its per-instruction hook:
append to the PC trace, probe breakpoints, tick timers. Watchpoints are
probed by `Memory` on every CPU-facing access instead, since that is where
the access actually happens (see `memory::Memory::read_cpu`/`write_cpu`), but
they are allocated and enabled/disabled through this same façade.
*/

mod points;
mod timers;
mod trace;

pub use points::{PointData, Points};
pub use timers::{TimerData, Timers};
pub use trace::PcTrace;

use crate::event::{EventBus, EventKind};

/// Breakpoint/watchpoint flag bit for "this probe matches a supervisor-mode
/// program fetch" access, used by the doc-test style example in
/// SPEC_FULL.md §11 scenario 6. Other bits are host-defined.
pub const SUPER_PROG: u32 = 0b0010_0000;

pub struct Tools {
    pub pc_trace: PcTrace,
    pub breakpoints: Points<PointData>,
    pub watchpoints: Points<PointData>,
    pub timers: Timers,
    pc_trace_enabled: bool,
    breakpoints_enabled: bool,
    watchpoints_enabled: bool,
    timers_enabled: bool,
}

impl Tools {
    pub fn new(pc_trace_capacity: usize, max_breakpoints: usize, max_watchpoints: usize, max_timers: usize) -> Tools {
        Tools {
            pc_trace: PcTrace::new(pc_trace_capacity),
            breakpoints: Points::new(max_breakpoints),
            watchpoints: Points::new(max_watchpoints),
            timers: Timers::new(max_timers),
            pc_trace_enabled: true,
            breakpoints_enabled: true,
            watchpoints_enabled: true,
            timers_enabled: true,
        }
    }

    pub fn set_pc_trace_enabled(&mut self, enabled: bool) {
        self.pc_trace_enabled = enabled;
    }

    pub fn set_breakpoints_enabled(&mut self, enabled: bool) {
        self.breakpoints_enabled = enabled;
    }

    pub fn set_watchpoints_enabled(&mut self, enabled: bool) {
        self.watchpoints_enabled = enabled;
    }

    pub fn set_timers_enabled(&mut self, enabled: bool) {
        self.timers_enabled = enabled;
    }

    pub fn watchpoints_enabled(&self) -> bool {
        self.watchpoints_enabled
    }

    /// Fan-out run by the CPU driver at every instruction boundary: PC trace
    /// append, breakpoint probe, timer tick.
    pub fn on_instruction(&mut self, pc: u32, fc_flags: u32, elapsed_cycles: u32, bus: &mut EventBus) {
        if self.pc_trace_enabled {
            self.pc_trace.update(pc);
        }
        if self.breakpoints_enabled {
            if let Some(id) = self.breakpoints.check(pc, fc_flags) {
                bus.add(EventKind::Breakpoint, pc, id as u32, fc_flags, None);
            }
        }
        if self.timers_enabled {
            self.timers.tick(pc, elapsed_cycles, bus);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::points::PointData;

    #[test]
    fn breakpoint_hit_enqueues_event() {
        let mut tools = Tools::new(8, 4, 4, 4);
        tools.breakpoints.create(0, PointData { addr: 0x400, flags: SUPER_PROG });
        let mut bus = EventBus::new();
        tools.on_instruction(0x400, SUPER_PROG, 4, &mut bus);
        assert_eq!(bus.num_events(), 1);
        assert_eq!(bus.events()[0].addr, 0x400);
    }

    #[test]
    fn pc_trace_records_every_instruction() {
        let mut tools = Tools::new(4, 0, 0, 0);
        let mut bus = EventBus::new();
        tools.on_instruction(0x100, 0, 1, &mut bus);
        tools.on_instruction(0x104, 0, 1, &mut bus);
        assert_eq!(tools.pc_trace.snapshot(), vec![0x100, 0x104]);
    }

    #[test]
    fn watchpoints_enabled_defaults_true_and_toggles() {
        let mut tools = Tools::new(4, 0, 4, 0);
        assert!(tools.watchpoints_enabled());
        tools.set_watchpoints_enabled(false);
        assert!(!tools.watchpoints_enabled());
    }
}
