/*!
format.rs - host-facing string rendering for registers and disassembly.

Grounded on `examples/original_source/bare68k/machine_src/glue/cpu.c`
(`cpu_get_sr_str`, `cpu_get_regs_str`, `cpu_get_instr_str`). The SR mask
string and the fixed six-line register block are reproduced verbatim from
SPEC_FULL.md §6; only the composition (`format!` instead of a fixed `char[]`
buffer with manual indices) is the Rust-native part.
*/

use super::registers::Registers;

const SR_MASK: &str = "T?S??210???XNZVC";

/// Render `sr` as a 16-character flag string against `T?S??210???XNZVC`,
/// with `-` standing in for a clear bit, including at the mask's reserved
/// (`?`) positions: every position is tested against the live bit, never
/// rendered from the mask unconditionally.
pub fn sr_string(sr: u16) -> String {
    SR_MASK
        .chars()
        .enumerate()
        .map(|(i, mask_char)| {
            let bit = 15 - i;
            if sr & (1 << bit) != 0 {
                mask_char
            } else {
                '-'
            }
        })
        .collect()
}

/// Fixed 6-line register block: D0-D3, D4-D7, A0-A3, A4-A7, PC/SR, USP/ISP/MSP/VBR.
pub fn registers_string(regs: &Registers) -> String {
    format!(
        "D0={:08x} D1={:08x} D2={:08x} D3={:08x}\n\
         D4={:08x} D5={:08x} D6={:08x} D7={:08x}\n\
         A0={:08x} A1={:08x} A2={:08x} A3={:08x}\n\
         A4={:08x} A5={:08x} A6={:08x} A7={:08x}\n\
         PC={:08x} SR={:04x} [{}]\n\
         USP={:08x} ISP={:08x} MSP={:08x} VBR={:08x}",
        regs.d[0], regs.d[1], regs.d[2], regs.d[3],
        regs.d[4], regs.d[5], regs.d[6], regs.d[7],
        regs.a[0], regs.a[1], regs.a[2], regs.a[3],
        regs.a[4], regs.a[5], regs.a[6], regs.a[7],
        regs.pc, regs.sr, sr_string(regs.sr),
        regs.usp, regs.isp, regs.msp, regs.vbr,
    )
}

/// One disassembly line: `%08x:`-prefixed address followed by the
/// interpreter-supplied mnemonic text.
pub fn instr_string(pc: u32, mnemonic: &str) -> String {
    format!("{:08x}: {}", pc, mnemonic)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sr_string_renders_reset_value() {
        assert_eq!(sr_string(super::super::registers::RESET_SR), "--S--210--------");
    }

    #[test]
    fn sr_string_renders_set_condition_codes() {
        assert_eq!(sr_string(0x000f), "------------NZVC");
    }

    #[test]
    fn instr_string_prefixes_address() {
        assert_eq!(instr_string(0x1000, "nop"), "00001000: nop");
    }
}
