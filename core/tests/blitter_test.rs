use std::sync::Arc;

use lumen_core::bus::MachineBus;
use lumen_core::device::Blitter;
use lumen_core::device::blitter::{
    OP_COPY, OP_FILL, OP_MASKED_COPY, REG_COLOR, REG_CTRL, REG_DST, REG_DST_STRIDE, REG_HEIGHT,
    REG_MASK, REG_OP, REG_SRC, REG_SRC_STRIDE, REG_WIDTH,
};

const BLT: u32 = 0xF0100;
const VRAM: u32 = 0x10_0000;

fn setup() -> Arc<MachineBus> {
    let mut bus = MachineBus::new(0x40_0000);
    let blitter = Blitter::new(BLT);
    blitter.map(&mut bus).unwrap();
    let bus = Arc::new(bus);
    blitter.connect_bus(&bus);
    bus
}

fn fill(bus: &MachineBus, dst: u32, w: u32, h: u32, stride: u32, color: u32) {
    bus.write32(BLT + REG_OP, OP_FILL);
    bus.write32(BLT + REG_DST, dst);
    bus.write32(BLT + REG_WIDTH, w);
    bus.write32(BLT + REG_HEIGHT, h);
    bus.write32(BLT + REG_DST_STRIDE, stride);
    bus.write32(BLT + REG_COLOR, color);
    bus.write32(BLT + REG_CTRL, 1);
}

#[test]
fn test_full_screen_fill() {
    let bus = setup();
    // Marker just past the rectangle must survive.
    bus.write8(VRAM + 640 * 480 * 4, 0xAB);

    fill(&bus, VRAM, 640, 480, 2560, 0xFF00_0000);

    for addr in (VRAM..VRAM + 640 * 480 * 4).step_by(4 * 997) {
        let word_addr = addr & !3;
        assert_eq!(bus.read32(word_addr), 0xFF00_0000, "at {word_addr:#x}");
    }
    assert_eq!(bus.read32(VRAM), 0xFF00_0000);
    assert_eq!(bus.read32(VRAM + 640 * 480 * 4 - 4), 0xFF00_0000);
    assert_eq!(bus.read8(VRAM + 640 * 480 * 4), 0xAB, "beyond rect untouched");
}

#[test]
fn test_busy_flag_reads_once_after_completion() {
    let bus = setup();
    fill(&bus, VRAM, 4, 4, 16, 0x1234_5678);
    // The op ran synchronously, but the contract still shows one busy
    // read before idle.
    assert_eq!(bus.read32(BLT + REG_CTRL) & 0x2, 0x2);
    assert_eq!(bus.read32(BLT + REG_CTRL) & 0x2, 0);
}

#[test]
fn test_double_fill_is_idempotent() {
    let bus = setup();
    fill(&bus, VRAM, 64, 64, 256, 0xA5A5_A5A5);
    let mut first = vec![0u8; 64 * 256];
    bus.read_block(VRAM, &mut first);
    fill(&bus, VRAM, 64, 64, 256, 0xA5A5_A5A5);
    let mut second = vec![0u8; 64 * 256];
    bus.read_block(VRAM, &mut second);
    assert_eq!(first, second);
}

#[test]
fn test_strided_fill_leaves_gaps() {
    let bus = setup();
    // Two pixels wide, stride 16: bytes 8..15 of each row stay zero.
    fill(&bus, VRAM, 2, 2, 16, 0xFFFF_FFFF);
    assert_eq!(bus.read32(VRAM), 0xFFFF_FFFF);
    assert_eq!(bus.read32(VRAM + 4), 0xFFFF_FFFF);
    assert_eq!(bus.read32(VRAM + 8), 0);
    assert_eq!(bus.read32(VRAM + 16), 0xFFFF_FFFF);
}

#[test]
fn test_copy_with_strides() {
    let bus = setup();
    for i in 0..8u32 {
        bus.write32(VRAM + i * 4, 0x1000 + i);
    }
    bus.write32(BLT + REG_OP, OP_COPY);
    bus.write32(BLT + REG_SRC, VRAM);
    bus.write32(BLT + REG_DST, VRAM + 0x1000);
    bus.write32(BLT + REG_WIDTH, 4);
    bus.write32(BLT + REG_HEIGHT, 2);
    bus.write32(BLT + REG_SRC_STRIDE, 16);
    bus.write32(BLT + REG_DST_STRIDE, 32);
    bus.write32(BLT + REG_CTRL, 1);

    for col in 0..4u32 {
        assert_eq!(bus.read32(VRAM + 0x1000 + col * 4), 0x1000 + col);
        assert_eq!(bus.read32(VRAM + 0x1000 + 32 + col * 4), 0x1004 + col);
    }
}

#[test]
fn test_masked_copy_touches_only_set_bits() {
    let bus = setup();
    for i in 0..8u32 {
        bus.write32(VRAM + i * 4, 0xCAFE_0000 + i);
        bus.write32(VRAM + 0x2000 + i * 4, 0x5555_5555);
    }
    // Mask byte 0b10100000: pixels 0 and 2 of the row.
    bus.write8(VRAM + 0x3000, 0xA0);
    bus.write32(BLT + REG_OP, OP_MASKED_COPY);
    bus.write32(BLT + REG_SRC, VRAM);
    bus.write32(BLT + REG_DST, VRAM + 0x2000);
    bus.write32(BLT + REG_MASK, VRAM + 0x3000);
    bus.write32(BLT + REG_WIDTH, 8);
    bus.write32(BLT + REG_HEIGHT, 1);
    bus.write32(BLT + REG_SRC_STRIDE, 32);
    bus.write32(BLT + REG_DST_STRIDE, 32);
    bus.write32(BLT + REG_CTRL, 1);

    assert_eq!(bus.read32(VRAM + 0x2000), 0xCAFE_0000);
    assert_eq!(bus.read32(VRAM + 0x2000 + 4), 0x5555_5555);
    assert_eq!(bus.read32(VRAM + 0x2000 + 8), 0xCAFE_0002);
    assert_eq!(bus.read32(VRAM + 0x2000 + 12), 0x5555_5555);
}

#[test]
fn test_oversized_rectangle_clamps_to_memory() {
    let bus = setup();
    // Destination near the end of memory; the fill must not wrap.
    let dst = 0x3F_FF00;
    fill(&bus, dst, 64, 64, 256, 0xFFFF_FFFF);
    assert_eq!(bus.read32(0x0000), 0, "no wraparound into low memory");
}
