use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

use lumen_core::bus::MachineBus;
use lumen_core::device::Terminal;
use lumen_core::device::terminal::{
    REG_CTRL, REG_ECHO, REG_IN, REG_KEY_IN, REG_KEY_STATUS, REG_LINE_STATUS, REG_OUT, REG_SENTINEL,
    REG_STATUS, SENTINEL_MAGIC,
};

const TERM: u32 = 0xF0700;

fn setup() -> (Arc<MachineBus>, Arc<Terminal>) {
    let mut bus = MachineBus::new(0x10_0000);
    let term = Terminal::new(TERM);
    term.map(&mut bus).unwrap();
    (Arc::new(bus), term)
}

#[test]
fn test_line_mode_routing_and_newline_counter() {
    let (bus, term) = setup();
    for &b in b"hi\n" {
        term.route_host_key(b);
    }
    assert_eq!(bus.read32(TERM + REG_LINE_STATUS), 1);
    assert_eq!(bus.read32(TERM + REG_STATUS) & 1, 1);

    assert_eq!(bus.read32(TERM + REG_IN), b'h' as u32);
    assert_eq!(bus.read32(TERM + REG_IN), b'i' as u32);
    assert_eq!(bus.read32(TERM + REG_LINE_STATUS), 1, "newline still queued");
    assert_eq!(bus.read32(TERM + REG_IN), b'\n' as u32);
    assert_eq!(bus.read32(TERM + REG_LINE_STATUS), 0);
    assert_eq!(bus.read32(TERM + REG_IN), 0, "empty ring reads zero");
}

#[test]
fn test_raw_mode_routes_to_key_ring_only() {
    let (bus, term) = setup();
    bus.write32(TERM + REG_CTRL, 0); // raw-key mode
    term.route_host_key(b'x');
    assert_eq!(bus.read32(TERM + REG_STATUS) & 1, 0, "line ring untouched");
    assert_eq!(bus.read32(TERM + REG_KEY_STATUS), 1);
    assert_eq!(bus.read32(TERM + REG_KEY_IN), b'x' as u32);
    assert_eq!(bus.read32(TERM + REG_KEY_IN), 0);
}

#[test]
fn test_exactly_one_channel_receives_each_byte() {
    let (bus, term) = setup();
    term.route_host_key(b'a'); // line mode
    bus.write32(TERM + REG_CTRL, 0);
    term.route_host_key(b'b'); // raw mode
    bus.write32(TERM + REG_CTRL, 1);

    assert_eq!(bus.read32(TERM + REG_IN), b'a' as u32);
    assert_eq!(bus.read32(TERM + REG_IN), 0);
    assert_eq!(bus.read32(TERM + REG_KEY_IN), b'b' as u32);
    assert_eq!(bus.read32(TERM + REG_KEY_IN), 0);
}

#[test]
fn test_output_collects_and_status_is_always_ready() {
    let (bus, term) = setup();
    for &b in b"ok" {
        bus.write32(TERM + REG_OUT, b as u32);
    }
    assert_eq!(term.take_output(), b"ok");
    assert_eq!(term.take_output(), b"");
    assert_ne!(bus.read32(TERM + REG_STATUS) & 0x2, 0);
}

#[test]
fn test_output_callback_runs_outside_lock() {
    let (bus, term) = setup();
    let seen = Arc::new(AtomicU32::new(0));
    let seen_cb = Arc::clone(&seen);
    let term_cb = Arc::clone(&term);
    term.set_output_callback(Box::new(move |b| {
        // Re-entering the device here must not deadlock.
        let _ = term_cb.take_output();
        seen_cb.store(b as u32, Ordering::SeqCst);
    }));
    bus.write32(TERM + REG_OUT, 0x41);
    assert_eq!(seen.load(Ordering::SeqCst), 0x41);
}

#[test]
fn test_echo_flag_is_readable_and_writable() {
    let (bus, _term) = setup();
    assert_eq!(bus.read32(TERM + REG_ECHO), 1);
    bus.write32(TERM + REG_ECHO, 0);
    assert_eq!(bus.read32(TERM + REG_ECHO), 0);
}

#[test]
fn test_sentinel_fires_exactly_once() {
    let (bus, term) = setup();
    let fired = Arc::new(AtomicU32::new(0));
    let fired_cb = Arc::clone(&fired);
    term.set_halt_callback(Box::new(move || {
        fired_cb.fetch_add(1, Ordering::SeqCst);
    }));

    bus.write32(TERM + REG_SENTINEL, 0xBEEF);
    assert!(!term.is_halted(), "wrong magic leaves the latch alone");
    assert_eq!(fired.load(Ordering::SeqCst), 0);

    bus.write32(TERM + REG_SENTINEL, SENTINEL_MAGIC);
    assert!(term.is_halted());
    assert_eq!(fired.load(Ordering::SeqCst), 1);

    bus.write32(TERM + REG_SENTINEL, SENTINEL_MAGIC);
    assert_eq!(fired.load(Ordering::SeqCst), 1, "latched: no second fire");
}

#[test]
fn test_status_read_timestamp_gates_cursor() {
    let (bus, term) = setup();
    assert!(!term.recently_polled(Duration::from_secs(1)));
    bus.read32(TERM + REG_STATUS);
    assert!(term.recently_polled(Duration::from_secs(1)));
}

#[test]
fn test_line_ring_capacity_drops_overflow() {
    let (bus, term) = setup();
    for _ in 0..2000 {
        term.route_host_key(b'a');
    }
    let mut drained = 0;
    while bus.read32(TERM + REG_IN) != 0 {
        drained += 1;
    }
    assert_eq!(drained, 1024, "ring caps at its capacity");
}
