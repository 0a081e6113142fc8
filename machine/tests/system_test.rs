use lumen_machine::system::{CpuMode, System, SystemConfig};
use lumen_machine::{memory_map, registry};

fn config(mode: CpuMode) -> SystemConfig {
    SystemConfig {
        mode,
        media_dir: std::env::temp_dir(),
        file_dir: std::env::temp_dir(),
        ..SystemConfig::default()
    }
}

#[test]
fn test_every_mode_builds_without_mmio_conflicts() {
    // `map_io` rejects overlap, so a clean build proves the register map
    // is pairwise disjoint, 8-bit views included.
    for mode in [CpuMode::M68k, CpuMode::Z80, CpuMode::M6502, CpuMode::Play] {
        let system = System::build(config(mode)).unwrap_or_else(|e| {
            panic!("building {mode:?} failed: {e}");
        });
        assert!(system.is_running());
    }
}

#[test]
fn test_sentinel_write_stops_the_machine() {
    let system = System::build(config(CpuMode::M68k)).unwrap();
    system
        .bus
        .write32(memory_map::TERM_BASE + 0x28, 0xDEAD);
    assert!(!system.is_running());
    assert!(system.terminal.is_halted());
}

#[test]
fn test_video_status_fast_path_is_wired() {
    let system = System::build(config(CpuMode::M68k)).unwrap();
    // VBlank poll address from the memory map.
    let status = system.bus.read32(memory_map::VIDEO_BASE + 0x04);
    assert_eq!(status & 1, 0, "not in vblank before any composition");
}

#[test]
fn test_media_loader_error_surfaces_through_registers() {
    let system = System::build(config(CpuMode::M68k)).unwrap();
    system.play_media("../outside.ym", 0);
    let (status, error) = system.media_status();
    assert_eq!(status, 3, "ERROR state");
    assert_eq!(error, 4, "PATH_INVALID");
}

#[test]
fn test_eight_bit_views_only_in_small_cpu_modes() {
    let m68k = System::build(config(CpuMode::M68k)).unwrap();
    // In the primary mode the SID-style page is plain memory.
    m68k.bus.write8(memory_map::VIEW8_PSG_BASE, 0x5A);
    assert_eq!(m68k.bus.read8(memory_map::VIEW8_PSG_BASE), 0x5A);

    let z80 = System::build(config(CpuMode::Z80)).unwrap();
    // In Z80 mode it is the PSG register file: reads come from the chip.
    z80.bus.write8(memory_map::VIEW8_PSG_BASE, 0x0F); // R0 = period 0x0F
    assert_eq!(z80.bus.read8(memory_map::VIEW8_PSG_BASE), 0x0F);
    z80.bus.write8(memory_map::VIEW8_BANK_REG, 3);
    assert_eq!(z80.bus.read8(memory_map::VIEW8_BANK_REG), 3);
}

#[test]
fn test_registry_lists_all_modes() {
    let names: Vec<_> = registry::all().iter().map(|e| e.name).collect();
    assert_eq!(names, ["m6502", "m68k", "play", "z80"]);
    assert_eq!(registry::find("m68k").unwrap().mode, CpuMode::M68k);
    assert!(registry::find("pdp11").is_none());
}

#[test]
fn test_start_and_join_shutdown_cleanly() {
    let mut system = System::build(config(CpuMode::Play)).unwrap();
    system.start(None);
    std::thread::sleep(std::time::Duration::from_millis(40));
    assert!(system.is_running());
    system.request_stop();
    system.join();
}
