/*!
interpreter.rs - the seam between this crate and an external 68k interpreter.

The actual instruction decode/execute core (Musashi, in the system this
crate's glue is modelled on) is explicitly out of scope: this crate only
drives one. `Bus` is what the interpreter calls back into for every memory
access, instruction boundary, A-line opcode, and interrupt acknowledgement —
the trait form of the function pointers `cpu_init` installs in
`examples/original_source/bare68k/machine_src/glue/cpu.c`
(`instr_hook_cb`, `int_ack_cb`, `cpu_fc_map`, the `m68k_read/write_memory_*`
family). `CpuDriver` implements `Bus`; `Interpreter` is generic over whatever
engine the host plugs in, the way `arness`'s `src/bus/interfaces.rs` decouples
its bus from a concrete PPU/APU by trait rather than concrete type.
*/

use crate::access::Width;
use crate::traps::TrapOutcome;

use super::registers::Registers;

/// Callback surface an `Interpreter` drives during `execute`.
pub trait Bus {
    fn read(&mut self, addr: u32, width: Width, fc: u8) -> u32;
    fn write(&mut self, addr: u32, value: u32, width: Width, fc: u8);

    /// Called at every instruction boundary, before the instruction at `pc`
    /// is decoded. `elapsed_cycles` is how many cycles ran since the
    /// previous boundary (used to drive `Timers::tick`). Returns `true` if
    /// the interpreter should keep running this slice (the bus may still end
    /// the slice later via a queued event and `should_stop`).
    fn on_instruction(&mut self, pc: u32, fc: u8, elapsed_cycles: u32) -> bool;

    /// Dispatch an A-line opcode fetched at `pc`.
    fn dispatch_trap(&mut self, opcode: u16, pc: u32) -> TrapOutcome;

    /// Forward an interrupt acknowledgement at `level`; returns the vector
    /// number to feed back to the interpreter (autovector by default).
    fn int_ack(&mut self, level: u8) -> u8;

    /// `true` once the event bus has latched "end this timeslice now".
    fn should_stop(&self) -> bool;
}

/// An external 68k-family interpreter, driven through a `Bus`.
pub trait Interpreter {
    fn reset(&mut self, bus: &mut dyn Bus);

    /// Run up to `cycles` worth of instructions, stopping early if
    /// `bus.should_stop()` becomes true between instructions. Returns the
    /// number of cycles actually consumed.
    fn execute(&mut self, bus: &mut dyn Bus, cycles: u32) -> u32;

    fn registers(&self) -> Registers;
    fn set_registers(&mut self, regs: &Registers);
    fn set_irq(&mut self, level: u8);
}

/// Deterministic test double: every "instruction" is a fixed-cost NOP that
/// only advances PC and calls back into the bus, with no real 68k decode.
/// Exists purely to exercise `CpuDriver`'s orchestration (event clearing,
/// cycle accounting, timeslice-end latching) without a real decoder.
#[derive(Default)]
pub struct StepInterpreter {
    regs: Registers,
    pub cycles_per_step: u32,
}

impl StepInterpreter {
    pub fn new(cycles_per_step: u32) -> StepInterpreter {
        StepInterpreter {
            regs: Registers::reset(),
            cycles_per_step: cycles_per_step.max(1),
        }
    }
}

impl Interpreter for StepInterpreter {
    fn reset(&mut self, _bus: &mut dyn Bus) {
        self.regs = Registers::reset();
    }

    fn execute(&mut self, bus: &mut dyn Bus, cycles: u32) -> u32 {
        let mut done = 0;
        while done + self.cycles_per_step <= cycles {
            let fc = 0b101; // supervisor data, matching RESET_SR's supervisor bit
            if !bus.on_instruction(self.regs.pc, fc, self.cycles_per_step) || bus.should_stop() {
                break;
            }
            self.regs.pc = self.regs.pc.wrapping_add(2);
            done += self.cycles_per_step;
            if bus.should_stop() {
                break;
            }
        }
        done
    }

    fn registers(&self) -> Registers {
        self.regs
    }

    fn set_registers(&mut self, regs: &Registers) {
        self.regs = *regs;
    }

    fn set_irq(&mut self, _level: u8) {}
}
