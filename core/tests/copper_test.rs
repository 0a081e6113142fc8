use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};

use lumen_core::bus::MachineBus;
use lumen_core::device::Copper;
use lumen_core::device::copper::{REG_CTRL, REG_LIST};

const COP: u32 = 0xF0200;
const CAPTURE: u32 = 0xF0020;
const LIST: u32 = 0x4000;

/// Bus with the copper and a capture register that records MOVE writes.
fn setup() -> (Arc<MachineBus>, Arc<Copper>, Arc<AtomicU32>) {
    let mut bus = MachineBus::new(0x10_0000);
    let copper = Copper::new(COP);
    copper.map(&mut bus).unwrap();
    let captured = Arc::new(AtomicU32::new(0));
    let rd = Arc::clone(&captured);
    let wr = Arc::clone(&captured);
    bus.map_io(
        CAPTURE,
        CAPTURE + 3,
        Arc::new(move |_| rd.load(Ordering::SeqCst)),
        Arc::new(move |_, v| wr.store(v, Ordering::SeqCst)),
    )
    .unwrap();
    (Arc::new(bus), copper, captured)
}

fn write_wait(bus: &MachineBus, at: u32, y: u32) {
    bus.write32(at, 0x0100_0000 | y);
    bus.write32(at + 4, 0);
}

fn write_move(bus: &MachineBus, at: u32, reg: u32, val: u32) {
    bus.write32(at, 0x0200_0000 | reg & 0xFF_FFFF);
    bus.write32(at + 4, val);
}

fn write_end(bus: &MachineBus, at: u32) {
    bus.write32(at, 0);
    bus.write32(at + 4, 0);
}

#[test]
fn test_wait_holds_moves_until_scanline() {
    let (bus, copper, captured) = setup();
    write_wait(&bus, LIST, 10);
    write_move(&bus, LIST + 8, CAPTURE, 0xAA);
    write_end(&bus, LIST + 16);

    bus.write32(COP + REG_LIST, LIST);
    bus.write32(COP + REG_CTRL, 0x3); // enable + reset

    for y in 0..10 {
        copper.run_scanline(y, &bus);
        assert_eq!(captured.load(Ordering::SeqCst), 0, "held at scanline {y}");
    }
    copper.run_scanline(10, &bus);
    assert_eq!(captured.load(Ordering::SeqCst), 0xAA);
}

#[test]
fn test_moves_before_wait_run_immediately() {
    let (bus, copper, captured) = setup();
    write_move(&bus, LIST, CAPTURE, 0x11);
    write_wait(&bus, LIST + 8, 100);
    write_end(&bus, LIST + 16);

    bus.write32(COP + REG_LIST, LIST);
    bus.write32(COP + REG_CTRL, 0x3);

    copper.run_scanline(0, &bus);
    assert_eq!(captured.load(Ordering::SeqCst), 0x11);
}

#[test]
fn test_end_stops_until_restart() {
    let (bus, copper, captured) = setup();
    write_move(&bus, LIST, CAPTURE, 0x22);
    write_end(&bus, LIST + 8);

    bus.write32(COP + REG_LIST, LIST);
    bus.write32(COP + REG_CTRL, 0x3);

    copper.run_scanline(0, &bus);
    captured.store(0, Ordering::SeqCst);
    // No further execution this frame.
    copper.run_scanline(1, &bus);
    assert_eq!(captured.load(Ordering::SeqCst), 0);
    // The vertical blank rewinds the program.
    copper.restart();
    copper.run_scanline(0, &bus);
    assert_eq!(captured.load(Ordering::SeqCst), 0x22);
}

#[test]
fn test_disabled_copper_does_nothing() {
    let (bus, copper, captured) = setup();
    write_move(&bus, LIST, CAPTURE, 0x33);
    bus.write32(COP + REG_LIST, LIST);
    copper.restart();
    copper.run_scanline(0, &bus);
    assert_eq!(captured.load(Ordering::SeqCst), 0);
}

#[test]
fn test_late_wait_releases_immediately() {
    // A WAIT for a line already passed must not stall the list.
    let (bus, copper, captured) = setup();
    write_wait(&bus, LIST, 5);
    write_move(&bus, LIST + 8, CAPTURE, 0x44);
    write_end(&bus, LIST + 16);

    bus.write32(COP + REG_LIST, LIST);
    bus.write32(COP + REG_CTRL, 0x3);

    copper.run_scanline(20, &bus);
    assert_eq!(captured.load(Ordering::SeqCst), 0x44);
}
