//! Shared fixtures for the integration tests.
#![allow(dead_code)]

use std::sync::Arc;
use std::sync::atomic::AtomicBool;

use lumen_core::bus::MachineBus;
use lumen_core::cpu::m68k::M68k;

/// A small flat bus: 2 MiB is enough for programs, VRAM at 0x100000 and
/// the register window.
pub fn test_bus() -> Arc<MachineBus> {
    Arc::new(MachineBus::new(0x20_0000))
}

pub const PROGRAM_BASE: u32 = 0x1000;
pub const STACK_TOP: u32 = 0xFF00;

/// Write `words` big-endian at the program base, point the reset vectors
/// at it and build a core ready to step.
pub fn m68k_with_program(bus: &Arc<MachineBus>, words: &[u16]) -> M68k {
    bus.write32_be(0, STACK_TOP);
    bus.write32_be(4, PROGRAM_BASE);
    for (i, w) in words.iter().enumerate() {
        bus.write16_be(PROGRAM_BASE + i as u32 * 2, *w as u32);
    }
    M68k::new(Arc::clone(bus), Arc::new(AtomicBool::new(true)))
}

/// Build a core over a fresh bus in one call.
pub fn m68k(words: &[u16]) -> M68k {
    let bus = test_bus();
    m68k_with_program(&bus, words)
}
