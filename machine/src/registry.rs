//! Mode registry for front-end discovery.
//!
//! Each machine mode self-registers via [`inventory::submit!`] with a
//! [`ModeEntry`], so the front-end builds its mode list and help text
//! without a central table.

use crate::system::CpuMode;

/// A CLI-selectable machine personality.
pub struct ModeEntry {
    /// CLI name (e.g. "m68k").
    pub name: &'static str,
    /// One-line description for help output.
    pub help: &'static str,
    pub mode: CpuMode,
}

impl ModeEntry {
    pub const fn new(name: &'static str, help: &'static str, mode: CpuMode) -> Self {
        Self { name, help, mode }
    }
}

inventory::collect!(ModeEntry);

inventory::submit! {
    ModeEntry::new("m68k", "68020-class primary core with FPU", CpuMode::M68k)
}

inventory::submit! {
    ModeEntry::new("z80", "Z80 core with bank window and PSG ports", CpuMode::Z80)
}

inventory::submit! {
    ModeEntry::new("m6502", "6502 core with bank window", CpuMode::M6502)
}

inventory::submit! {
    ModeEntry::new("play", "no CPU: standalone media player", CpuMode::Play)
}

/// All registered modes, sorted by name.
pub fn all() -> Vec<&'static ModeEntry> {
    let mut entries: Vec<_> = inventory::iter::<ModeEntry>.into_iter().collect();
    entries.sort_by_key(|e| e.name);
    entries
}

/// Look up a mode by its CLI name.
pub fn find(name: &str) -> Option<&'static ModeEntry> {
    inventory::iter::<ModeEntry>
        .into_iter()
        .find(|e| e.name == name)
}
