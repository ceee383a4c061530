/*!
machine.rs - top-level façade composing the address space, labels, traps,
tools, and CPU driver into one handle.

Grounded on `arness`'s `src/bus/mod.rs` (a public façade `pub use`-ing
submodule types so callers reach everything through one handle) and
`src/lib.rs` (crate-root re-exports). `Machine` adds `LabelIndex` alongside a
`CpuDriver`: labels are address-space metadata a host queries between slices
(symbol lookup, tooling), independent of the interpreter-stepping loop that
`CpuDriver` already owns `Memory`/`TrapTable`/`Tools`/`EventBus` for, so there
is no call for `CpuDriver` itself to also carry `LabelIndex`.
*/

use std::any::Any;

use crate::cpu::{CpuDriver, CpuType, Interpreter, Registers, ToolsConfig};
use crate::error::LabelError;
use crate::event::{EventBus, RunInfo};
use crate::label::{LabelId, LabelIndex};
use crate::memory::Memory;
use crate::tools::Tools;
use crate::traps::TrapTable;

/// Owns everything a host needs to run and inspect a 68k-family interpreter.
pub struct Machine<I: Interpreter> {
    cpu: CpuDriver<I>,
    labels: LabelIndex,
}

impl<I: Interpreter> Machine<I> {
    /// Build a machine over a `num_pages`-page address space.
    pub fn new(cpu_type: CpuType, interpreter: I, num_pages: u32) -> Machine<I> {
        Machine::with_tools_config(cpu_type, interpreter, num_pages, ToolsConfig::default())
    }

    pub fn with_tools_config(
        cpu_type: CpuType,
        interpreter: I,
        num_pages: u32,
        tools_config: ToolsConfig,
    ) -> Machine<I> {
        Machine {
            cpu: CpuDriver::new(cpu_type, interpreter, Memory::new(num_pages), tools_config),
            labels: LabelIndex::new(num_pages),
        }
    }

    pub fn memory(&self) -> &Memory {
        self.cpu.memory()
    }

    pub fn memory_mut(&mut self) -> &mut Memory {
        self.cpu.memory_mut()
    }

    pub fn labels(&self) -> &LabelIndex {
        &self.labels
    }

    /// Mutable access, e.g. to install `LabelIndex::set_cleanup_hook`.
    pub fn labels_mut(&mut self) -> &mut LabelIndex {
        &mut self.labels
    }

    /// Install a label over `[addr, addr+size-1]`.
    pub fn add_label(&mut self, addr: u32, size: u32, data: Option<Box<dyn Any>>) -> Result<LabelId, LabelError> {
        self.labels.add(addr, size, data)
    }

    pub fn remove_label(&mut self, id: LabelId) {
        self.labels.remove(id);
    }

    pub fn traps(&self) -> &TrapTable {
        self.cpu.traps()
    }

    pub fn traps_mut(&mut self) -> &mut TrapTable {
        self.cpu.traps_mut()
    }

    pub fn tools(&self) -> &Tools {
        self.cpu.tools()
    }

    pub fn tools_mut(&mut self) -> &mut Tools {
        self.cpu.tools_mut()
    }

    pub fn events(&self) -> &EventBus {
        self.cpu.events()
    }

    pub fn events_mut(&mut self) -> &mut EventBus {
        self.cpu.events_mut()
    }

    pub fn cpu(&self) -> &CpuDriver<I> {
        &self.cpu
    }

    pub fn cpu_mut(&mut self) -> &mut CpuDriver<I> {
        &mut self.cpu
    }

    pub fn reset(&mut self) {
        self.cpu.reset();
    }

    pub fn execute(&mut self, num_cycles: u32) -> usize {
        self.cpu.execute(num_cycles)
    }

    pub fn execute_to_event(&mut self, cycles_per_run: u32) -> RunInfo {
        self.cpu.execute_to_event(cycles_per_run)
    }

    pub fn set_irq(&mut self, level: u8) {
        self.cpu.set_irq(level);
    }

    pub fn registers(&self) -> Registers {
        self.cpu.registers()
    }

    pub fn set_registers(&mut self, regs: &Registers) {
        self.cpu.set_registers(regs);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cpu::StepInterpreter;
    use crate::memory::MemFlags;

    fn machine() -> Machine<StepInterpreter> {
        Machine::new(CpuType::MC68000, StepInterpreter::new(4), 2)
    }

    #[test]
    fn reset_then_execute_runs_the_interpreter() {
        let mut m = machine();
        m.reset();
        m.execute(16);
        assert_eq!(m.registers().pc, 8);
    }

    #[test]
    fn labels_and_memory_are_independently_addressable() {
        let mut m = machine();
        m.memory_mut().add_memory(0, 1, MemFlags::READ | MemFlags::WRITE).unwrap();
        let id = m.add_label(0x100, 0x10, None).unwrap();
        assert_eq!(m.labels().find(0x108), Some(id));
        m.memory_mut().w32(0x100, 0x1234);
        assert_eq!(m.memory_mut().r32(0x100), 0x1234);
    }
}
