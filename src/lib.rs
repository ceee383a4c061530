#![doc = r#"
m68k_glue library crate.

This crate exposes the paged memory map, label index, A-line trap dispatcher,
tools subsystem, and CPU driver glue that sits between an external 68k-family
interpreter and a host application. It does not implement 68k instruction
semantics itself (see `cpu::Interpreter`).

Modules:
- access: function-code mapping and the packed CPU access word
- error: configuration-time error taxon (`MemoryConfigError`, `LabelError`)
- event: bounded per-slice event queue and the `RunInfo` snapshot
- memory: paged address space, RAM/empty/mirror/special backings, host API
- label: sorted, page-bucketed symbol/interval index
- traps: A-line opcode trap table
- tools: PC trace, breakpoints, watchpoints, timers
- cpu: `Interpreter`/`Bus` seam and `CpuDriver` orchestration
- machine: top-level façade composing the above
"#]

pub mod access;
pub mod cpu;
pub mod error;
pub mod event;
pub mod label;
pub mod machine;
pub mod memory;
pub mod tools;
pub mod traps;

// Re-export commonly used types at the crate root for convenience.
pub use cpu::{CpuDriver, CpuType, Interpreter, Registers, ToolsConfig};
pub use event::{Event, EventKind, RunInfo};
pub use label::{LabelId, LabelIndex};
pub use machine::Machine;
pub use memory::Memory;
pub use traps::TrapTable;
