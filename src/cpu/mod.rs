/*!
cpu - the driver that owns memory/traps/tools and steps an `Interpreter`.

Grounded on `examples/original_source/bare68k/machine_src/glue/cpu.c`
(`cpu_init`, `instr_hook_cb`, `int_ack_cb`, `cpu_execute`,
`cpu_execute_to_event`). The C globals (`g_memory`, `g_labels`, `g_traps`,
`g_tools`, the event bus statics) become fields `CpuDriver` owns outright, the
way `arness`'s `src/bus/mod.rs` composes a `Bus` struct out of owned device
submodules rather than passing them around separately.
*/

mod format;
mod interpreter;
mod registers;

pub use format::{instr_string, registers_string, sr_string};
pub use interpreter::{Bus, Interpreter, StepInterpreter};
pub use registers::{CpuType, Registers, RESET_SR};

use crate::access::Width;
use crate::event::{CallbackOutcome, EventBus, EventKind, RunInfo};
use crate::memory::{MemFlags, Memory};
use crate::tools::{PointData, Points, Tools};
use crate::traps::{TrapOutcome, TrapTable};

/// Default cycle budget for `execute(0)`, matching `cpu_execute`'s `num_cycles == 0` case.
pub const DEFAULT_CYCLES: u32 = 100_000;

/// Coarse state machine guarding `reset`/`execute`/`set_irq` (SPEC_FULL.md §4.D).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SliceState {
    Idle,
    Running,
}

/// Host hook run at every instruction boundary, ahead of PC trace/breakpoints/timers.
pub type InstrHookFn = Box<dyn FnMut(u32, u8) -> CallbackOutcome>;
/// Host hook run on interrupt acknowledgement; returns the vector to feed back.
pub type IntAckHookFn = Box<dyn FnMut(u8) -> (CallbackOutcome, u8)>;

/// Everything `Bus` needs, split out from the interpreter itself so
/// `CpuDriver::run_interpreter` can hand the interpreter a mutable borrow of
/// `core` while it still holds `interpreter` by a disjoint field borrow —
/// `self.interpreter.execute(self, ..)` would otherwise need `self` borrowed
/// twice at once.
struct DriverCore {
    memory: Memory,
    traps: TrapTable,
    tools: Tools,
    events: EventBus,
    current_fc: u8,
    instr_hook: Option<InstrHookFn>,
    int_ack_hook: Option<IntAckHookFn>,
    empty_watchpoints: Points<PointData>,
}

/// Owns the paged memory map, trap table, tools, and event bus, and drives an
/// `Interpreter` through them via `Bus`.
pub struct CpuDriver<I: Interpreter> {
    interpreter: I,
    core: DriverCore,
    cpu_type: CpuType,
    state: SliceState,
    suppress_clear: bool,
}

/// Tools sizing for a `CpuDriver`/`Machine`, matching the constructor
/// arguments `tools_init` takes in the original binding (SPEC_FULL.md §9).
#[derive(Debug, Clone, Copy)]
pub struct ToolsConfig {
    pub pc_trace_capacity: usize,
    pub max_breakpoints: usize,
    pub max_watchpoints: usize,
    pub max_timers: usize,
}

impl Default for ToolsConfig {
    fn default() -> ToolsConfig {
        ToolsConfig {
            pc_trace_capacity: 64,
            max_breakpoints: 16,
            max_watchpoints: 16,
            max_timers: 8,
        }
    }
}

impl<I: Interpreter> CpuDriver<I> {
    pub fn new(cpu_type: CpuType, interpreter: I, memory: Memory, tools_config: ToolsConfig) -> CpuDriver<I> {
        CpuDriver {
            interpreter,
            core: DriverCore {
                memory,
                traps: TrapTable::new(),
                tools: Tools::new(
                    tools_config.pc_trace_capacity,
                    tools_config.max_breakpoints,
                    tools_config.max_watchpoints,
                    tools_config.max_timers,
                ),
                events: EventBus::new(),
                current_fc: 0,
                instr_hook: None,
                int_ack_hook: None,
                empty_watchpoints: Points::new(0),
            },
            cpu_type,
            state: SliceState::Idle,
            suppress_clear: false,
        }
    }

    pub fn cpu_type(&self) -> CpuType {
        self.cpu_type
    }

    pub fn memory(&self) -> &Memory {
        &self.core.memory
    }

    pub fn memory_mut(&mut self) -> &mut Memory {
        &mut self.core.memory
    }

    pub fn traps(&self) -> &TrapTable {
        &self.core.traps
    }

    pub fn traps_mut(&mut self) -> &mut TrapTable {
        &mut self.core.traps
    }

    pub fn tools(&self) -> &Tools {
        &self.core.tools
    }

    pub fn tools_mut(&mut self) -> &mut Tools {
        &mut self.core.tools
    }

    pub fn events(&self) -> &EventBus {
        &self.core.events
    }

    /// Mutable access to the event bus, for hosts that need to install a
    /// cleanup hook or (for an FFI-backed `Interpreter` that cannot cheaply
    /// poll `Bus::should_stop()` per instruction) a timeslice-end push hook.
    /// `StepInterpreter` and any other poll-based `Interpreter` never need
    /// this: `should_stop()` already ends the slice at the next boundary.
    pub fn events_mut(&mut self) -> &mut EventBus {
        &mut self.core.events
    }

    pub fn set_instr_hook(&mut self, hook: Option<InstrHookFn>) {
        self.core.instr_hook = hook;
    }

    pub fn set_int_ack_hook(&mut self, hook: Option<IntAckHookFn>) {
        self.core.int_ack_hook = hook;
    }

    /// Reset the interpreter and the event bus's cycle counters. Legal only
    /// while idle, matching `cpu_init`'s "never called mid-slice" contract.
    pub fn reset(&mut self) {
        if self.state != SliceState::Idle {
            return;
        }
        log::debug!("cpu: reset ({:?})", self.cpu_type);
        self.core.events.reset_cycles();
        self.core.events.clear();
        let CpuDriver { interpreter, core, .. } = self;
        interpreter.reset(core);
    }

    /// Run up to `num_cycles` (0 meaning `DEFAULT_CYCLES`), stopping early if
    /// an event fires. Returns the number of events queued.
    pub fn execute(&mut self, num_cycles: u32) -> usize {
        let cycles = if num_cycles == 0 { DEFAULT_CYCLES } else { num_cycles };
        if !self.suppress_clear {
            self.core.events.clear();
        }
        self.suppress_clear = false;
        self.state = SliceState::Running;

        let CpuDriver { interpreter, core, .. } = self;
        let done = interpreter.execute(core, cycles);

        self.core.events.account_slice(done as u64);
        self.state = SliceState::Idle;
        let num_events = self.core.events.num_events();
        log::debug!("cpu: execute requested={} done={} events={}", cycles, done, num_events);
        num_events
    }

    /// Run `cycles_per_run` cycles at a time until a slice produces at least
    /// one event, matching `cpu_execute_to_event`'s unbounded
    /// `while(run_info.num_events == 0) { ... }` loop. There is no total-cycle
    /// cap: a caller that needs one bounds it externally (e.g. by counting
    /// `execute_to_event` calls), the same way the original leaves it to the
    /// host.
    pub fn execute_to_event(&mut self, cycles_per_run: u32) -> RunInfo {
        loop {
            let num_events = self.execute(cycles_per_run);
            if num_events > 0 {
                break;
            }
        }
        self.core.events.run_info()
    }

    /// Raise an interrupt: clear the event bus, forward to the interpreter,
    /// and suppress the next `execute`'s auto-clear (it would otherwise be a
    /// redundant no-op, since nothing runs between this call and that one).
    pub fn set_irq(&mut self, level: u8) {
        self.core.events.clear();
        self.interpreter.set_irq(level);
        self.suppress_clear = true;
    }

    pub fn registers(&self) -> Registers {
        self.interpreter.registers()
    }

    pub fn set_registers(&mut self, regs: &Registers) {
        self.interpreter.set_registers(regs);
    }
}

impl Bus for DriverCore {
    fn read(&mut self, addr: u32, width: Width, fc: u8) -> u32 {
        self.current_fc = fc;
        if self.tools.watchpoints_enabled() {
            self.memory.read_cpu(addr, width, fc, &mut self.events, &self.tools.watchpoints)
        } else {
            self.memory.read_cpu(addr, width, fc, &mut self.events, &self.empty_watchpoints)
        }
    }

    fn write(&mut self, addr: u32, value: u32, width: Width, fc: u8) {
        self.current_fc = fc;
        if self.tools.watchpoints_enabled() {
            self.memory.write_cpu(addr, value, width, fc, &mut self.events, &self.tools.watchpoints);
        } else {
            self.memory.write_cpu(addr, value, width, fc, &mut self.events, &self.empty_watchpoints);
        }
    }

    fn on_instruction(&mut self, pc: u32, fc: u8, elapsed_cycles: u32) -> bool {
        self.current_fc = fc;
        #[cfg(feature = "instr-trace")]
        log::trace!("cpu: instr pc={:#010x} fc={}", pc, fc);
        if let Some(hook) = self.instr_hook.as_mut() {
            match hook(pc, fc) {
                CallbackOutcome::Event => self.events.add(EventKind::InstrHook, pc, 0, fc as u32, None),
                CallbackOutcome::Error => {
                    self.events.add(EventKind::CallbackError, pc, 0, fc as u32, None)
                }
                CallbackOutcome::NoEvent => {}
            }
        }
        self.tools.on_instruction(pc, fc as u32, elapsed_cycles, &mut self.events);
        self.events.num_events() == 0
    }

    fn dispatch_trap(&mut self, opcode: u16, pc: u32) -> TrapOutcome {
        let page_flags = self.memory.memory_flags(pc).unwrap_or(MemFlags::empty());
        self.traps.dispatch(opcode, pc, page_flags, &mut self.events)
    }

    fn int_ack(&mut self, level: u8) -> u8 {
        if let Some(hook) = self.int_ack_hook.as_mut() {
            let (outcome, vector) = hook(level);
            if outcome == CallbackOutcome::Event {
                self.events.add(EventKind::IntAck, 0, level as u32, vector as u32, None);
            }
            vector
        } else {
            // Autovector: 24 + level, matching the 68k autovectored interrupt convention.
            24 + level
        }
    }

    fn should_stop(&self) -> bool {
        self.events.num_events() > 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::Memory;

    fn driver() -> CpuDriver<StepInterpreter> {
        let memory = Memory::new(1);
        CpuDriver::new(CpuType::MC68000, StepInterpreter::new(4), memory, ToolsConfig::default())
    }

    #[test]
    fn reset_zeroes_registers_and_sets_sr() {
        let mut cpu = driver();
        cpu.reset();
        assert_eq!(cpu.registers().sr, RESET_SR);
    }

    #[test]
    fn execute_advances_pc_by_step_count() {
        let mut cpu = driver();
        cpu.reset();
        let events = cpu.execute(16);
        assert_eq!(events, 0);
        assert_eq!(cpu.registers().pc, 8);
    }

    #[test]
    fn execute_zero_uses_default_budget() {
        let mut cpu = driver();
        cpu.reset();
        cpu.execute(0);
        assert_eq!(cpu.registers().pc as u64, (DEFAULT_CYCLES / 4 * 2) as u64);
    }

    #[test]
    fn breakpoint_hit_stops_the_slice_early() {
        let mut cpu = driver();
        cpu.reset();
        cpu.tools_mut().breakpoints.create(0, PointData { addr: 8, flags: 0xffff_ffff });
        cpu.execute(100);
        assert_eq!(cpu.registers().pc, 8);
        assert_eq!(cpu.events().num_events(), 1);
    }

    #[test]
    fn watchpoint_hit_on_memory_access_is_visible_through_bus() {
        let mut cpu = driver();
        cpu.memory_mut().add_memory(0, 1, MemFlags::READ | MemFlags::WRITE).unwrap();
        cpu.tools_mut().watchpoints.create(0, PointData { addr: 0x10, flags: 0xffff_ffff });
        cpu.core.read(0x10, Width::Byte, 1);
        assert_eq!(cpu.events().num_events(), 1);
    }

    #[test]
    fn execute_to_event_loops_across_empty_slices_until_one_fires() {
        let mut cpu = driver();
        cpu.reset();
        // pc reaches 16 only after four 4-cycle slices (0, 4, 8, 12, 16);
        // the first three must each come back with zero events.
        cpu.tools_mut().breakpoints.create(0, PointData { addr: 16, flags: 0xffff_ffff });
        let info = cpu.execute_to_event(4);
        assert_eq!(cpu.registers().pc, 16);
        assert_eq!(info.num_events, 1);
    }

    #[test]
    fn execute_to_event_returns_on_the_first_slice_when_it_already_has_an_event() {
        let mut cpu = driver();
        cpu.reset();
        cpu.tools_mut().breakpoints.create(0, PointData { addr: 8, flags: 0xffff_ffff });
        let info = cpu.execute_to_event(100);
        assert_eq!(cpu.registers().pc, 8);
        assert_eq!(info.num_events, 1);
    }

    #[test]
    fn set_irq_suppresses_the_next_auto_clear() {
        let mut cpu = driver();
        cpu.reset();
        cpu.tools_mut().breakpoints.create(0, PointData { addr: 8, flags: 0xffff_ffff });
        cpu.execute(100);
        assert_eq!(cpu.events().num_events(), 1);
        cpu.set_irq(2);
        cpu.execute(4);
        assert_eq!(cpu.events().num_events(), 1);
    }
}
