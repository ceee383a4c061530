/*!
access.rs - the CPU "access word" and function-code mapping (SPEC_FULL.md §6).

The access word is not a bitflags set in the usual sense (its fields are
small enumerations packed into fixed bit positions, not independently
combinable booleans), so it is modelled as a plain `u32` newtype with
constructors and accessors rather than `bitflags!`. `MemFlags` and
`TrapFlags`, which *are* independently combinable, use `bitflags!` instead
(see `memory::MemFlags`, `traps::TrapFlags`) — grounded in
`examples/other_examples/manifests/valerino-rv6502emu/Cargo.toml`, a 6502
emulator/debugger pairing `bitflags` with exactly this kind of access-flags
value.
*/

/// Raw 3-bit function code as emitted by the interpreter (0-7), before
/// mapping to `FunctionCode`.
pub type RawFc = u8;

/// CPU function-code class, packed into the access word's upper byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u32)]
pub enum FunctionCode {
    Invalid = 0x8000,
    UserData = 0x1100,
    UserProg = 0x1200,
    SuperData = 0x2100,
    SuperProg = 0x2200,
    IntAck = 0x4000,
}

impl FunctionCode {
    /// Map a raw interpreter function code (0-7) the way `cpu_fc_map` does.
    pub fn from_raw(raw: RawFc) -> FunctionCode {
        match raw & 7 {
            1 => FunctionCode::UserData,
            2 => FunctionCode::UserProg,
            5 => FunctionCode::SuperData,
            6 => FunctionCode::SuperProg,
            7 => FunctionCode::IntAck,
            _ => FunctionCode::Invalid,
        }
    }

    pub fn bits(self) -> u32 {
        self as u32
    }
}

/// Access width in bytes (8/16/32-bit accesses only).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u32)]
pub enum Width {
    Byte = 1,
    Word = 2,
    Long = 4,
}

impl Width {
    pub fn bits(self) -> u32 {
        self as u32
    }

    /// Truncate a 32-bit value down to this width.
    pub fn truncate(self, value: u32) -> u32 {
        match self {
            Width::Byte => value & 0xff,
            Width::Word => value & 0xffff,
            Width::Long => value,
        }
    }
}

const DIR_READ: u32 = 0x10;
const DIR_WRITE: u32 = 0x20;
const WIDTH_MASK: u32 = 0x0f;
const FC_MASK: u32 = 0xff00;

/// `{width, direction, function-code}` packed exactly as the original C
/// `MEM_ACCESS_*` macros (SPEC_FULL.md §6).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AccessWord(pub u32);

/// Subtype tag for the host "API trace" channel (SPEC_FULL.md §6). A direct
/// host-API call (block/string/BCPL-pointer helpers) has no function code of
/// its own, so `api_trace_func` tags the same upper byte `AccessWord` packs
/// its function code into with one of these instead, exactly as
/// `MEM_ACCESS_R_BLOCK`/`MEM_ACCESS_BSET`/etc. do in the original header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u32)]
pub enum ApiAccessKind {
    RBlock = 0x1100,
    WBlock = 0x1200,
    RCstr = 0x2100,
    WCstr = 0x2200,
    RBstr = 0x3100,
    WBstr = 0x3200,
    RB32 = 0x4100,
    WB32 = 0x4200,
    BSet = 0x5400,
    BCopy = 0x6400,
}

impl ApiAccessKind {
    pub fn bits(self) -> u32 {
        self as u32
    }
}

impl AccessWord {
    pub fn read(width: Width, fc: FunctionCode) -> AccessWord {
        AccessWord(width.bits() | DIR_READ | fc.bits())
    }

    pub fn write(width: Width, fc: FunctionCode) -> AccessWord {
        AccessWord(width.bits() | DIR_WRITE | fc.bits())
    }

    pub fn bits(self) -> u32 {
        self.0
    }

    pub fn width_bits(self) -> u32 {
        self.0 & WIDTH_MASK
    }

    pub fn is_write(self) -> bool {
        self.0 & DIR_WRITE != 0
    }

    pub fn is_read(self) -> bool {
        self.0 & DIR_READ != 0
    }

    pub fn function_code_bits(self) -> u32 {
        self.0 & FC_MASK
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fc_map_matches_spec_table() {
        assert_eq!(FunctionCode::from_raw(0), FunctionCode::Invalid);
        assert_eq!(FunctionCode::from_raw(1), FunctionCode::UserData);
        assert_eq!(FunctionCode::from_raw(2), FunctionCode::UserProg);
        assert_eq!(FunctionCode::from_raw(3), FunctionCode::Invalid);
        assert_eq!(FunctionCode::from_raw(4), FunctionCode::Invalid);
        assert_eq!(FunctionCode::from_raw(5), FunctionCode::SuperData);
        assert_eq!(FunctionCode::from_raw(6), FunctionCode::SuperProg);
        assert_eq!(FunctionCode::from_raw(7), FunctionCode::IntAck);
    }

    #[test]
    fn access_word_packs_width_direction_fc() {
        let a = AccessWord::read(Width::Long, FunctionCode::SuperProg);
        assert_eq!(a.width_bits(), 4);
        assert!(a.is_read());
        assert!(!a.is_write());
        assert_eq!(a.function_code_bits(), 0x2200);
        assert_eq!(a.bits() & 0x0f, 4);
    }

    #[test]
    fn api_access_kinds_match_header_constants() {
        assert_eq!(ApiAccessKind::RBlock.bits(), 0x1100);
        assert_eq!(ApiAccessKind::WBlock.bits(), 0x1200);
        assert_eq!(ApiAccessKind::RCstr.bits(), 0x2100);
        assert_eq!(ApiAccessKind::WCstr.bits(), 0x2200);
        assert_eq!(ApiAccessKind::RBstr.bits(), 0x3100);
        assert_eq!(ApiAccessKind::WBstr.bits(), 0x3200);
        assert_eq!(ApiAccessKind::RB32.bits(), 0x4100);
        assert_eq!(ApiAccessKind::WB32.bits(), 0x4200);
        assert_eq!(ApiAccessKind::BSet.bits(), 0x5400);
        assert_eq!(ApiAccessKind::BCopy.bits(), 0x6400);
    }
}
