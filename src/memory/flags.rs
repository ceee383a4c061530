use bitflags::bitflags;

bitflags! {
    /// Region capability flags (SPEC_FULL.md §6). `TRAPS` additionally marks
    /// the region as a valid source of A-line trap opcodes for `TrapTable`.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct MemFlags: u32 {
        const READ  = 0b001;
        const WRITE = 0b010;
        const TRAPS = 0b100;
    }
}
