//! Block-transfer engine (blitter).
//!
//! Moves rectangles of memory without CPU involvement. All reads and writes
//! go through the bus, so blits land in VRAM no matter which video source
//! owns the target region.
//!
//! # Register map (offsets from the blitter base)
//!
//! | Offset | Name           | Description                                  |
//! |--------|----------------|----------------------------------------------|
//! | 0x00   | BLT_CTRL       | Write bit 0 = start; read bit 1 = busy       |
//! | 0x04   | BLT_OP         | 0 = FILL, 1 = COPY, 2 = MASKED_COPY          |
//! | 0x08   | BLT_SRC        | Source address (COPY, MASKED_COPY)           |
//! | 0x0C   | BLT_DST        | Destination address                          |
//! | 0x10   | BLT_WIDTH      | Rectangle width in 32-bit pixels             |
//! | 0x14   | BLT_HEIGHT     | Rectangle height in rows                     |
//! | 0x18   | BLT_SRC_STRIDE | Source row pitch in bytes                    |
//! | 0x1C   | BLT_DST_STRIDE | Destination row pitch in bytes               |
//! | 0x20   | BLT_COLOR      | Fill value (FILL)                            |
//! | 0x24   | BLT_MASK       | 1-bpp mask pointer (MASKED_COPY), row pitch  |
//! |        |                | = (width + 7) / 8 bytes, MSB first           |
//!
//! The operation runs synchronously inside the start write; the busy flag
//! contract is that after a start, BLT_CTRL reads busy at least once before
//! dropping to idle, so a guest poll loop always observes the
//! start → busy → idle sequence. Oversized rectangles clamp silently to the
//! end of backing memory.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use crate::bus::{BusError, BusHook, MachineBus};

pub const REG_CTRL: u32 = 0x00;
pub const REG_OP: u32 = 0x04;
pub const REG_SRC: u32 = 0x08;
pub const REG_DST: u32 = 0x0C;
pub const REG_WIDTH: u32 = 0x10;
pub const REG_HEIGHT: u32 = 0x14;
pub const REG_SRC_STRIDE: u32 = 0x18;
pub const REG_DST_STRIDE: u32 = 0x1C;
pub const REG_COLOR: u32 = 0x20;
pub const REG_MASK: u32 = 0x24;

pub const OP_FILL: u32 = 0;
pub const OP_COPY: u32 = 1;
pub const OP_MASKED_COPY: u32 = 2;

const CTRL_START: u32 = 0x1;
const CTRL_BUSY: u32 = 0x2;

#[derive(Default)]
struct BlitterRegs {
    op: u32,
    src: u32,
    dst: u32,
    width: u32,
    height: u32,
    src_stride: u32,
    dst_stride: u32,
    color: u32,
    mask: u32,
}

struct BlitterShared {
    regs: Mutex<BlitterRegs>,
    /// One-shot latch: set by start, cleared by the first CTRL read after
    /// the operation completed.
    busy_latch: AtomicBool,
    bus: BusHook,
}

pub struct Blitter {
    base: u32,
    shared: Arc<BlitterShared>,
}

impl Blitter {
    pub fn new(base: u32) -> Self {
        Self {
            base,
            shared: Arc::new(BlitterShared {
                regs: Mutex::new(BlitterRegs::default()),
                busy_latch: AtomicBool::new(false),
                bus: BusHook::new(),
            }),
        }
    }

    /// Register the MMIO block and remember the bus for DMA.
    pub fn map(&self, bus: &mut MachineBus) -> Result<(), BusError> {
        let base = self.base;
        let rd = Arc::clone(&self.shared);
        let wr = Arc::clone(&self.shared);
        bus.map_io(
            base,
            base + REG_MASK + 3,
            Arc::new(move |addr| rd.read_register(addr - base)),
            Arc::new(move |addr, val| wr.write_register(addr - base, val)),
        )
    }

    pub fn connect_bus(&self, bus: &Arc<MachineBus>) {
        self.shared.bus.connect(bus);
    }
}

impl BlitterShared {
    fn read_register(&self, offset: u32) -> u32 {
        match offset {
            REG_CTRL => {
                if self.busy_latch.swap(false, Ordering::AcqRel) {
                    CTRL_BUSY
                } else {
                    0
                }
            }
            _ => {
                let r = self.regs.lock().unwrap();
                match offset {
                    REG_OP => r.op,
                    REG_SRC => r.src,
                    REG_DST => r.dst,
                    REG_WIDTH => r.width,
                    REG_HEIGHT => r.height,
                    REG_SRC_STRIDE => r.src_stride,
                    REG_DST_STRIDE => r.dst_stride,
                    REG_COLOR => r.color,
                    REG_MASK => r.mask,
                    _ => 0,
                }
            }
        }
    }

    fn write_register(&self, offset: u32, val: u32) {
        match offset {
            REG_CTRL => {
                if val & CTRL_START != 0 {
                    self.busy_latch.store(true, Ordering::Release);
                    self.run();
                }
            }
            _ => {
                let mut r = self.regs.lock().unwrap();
                match offset {
                    REG_OP => r.op = val,
                    REG_SRC => r.src = val,
                    REG_DST => r.dst = val,
                    REG_WIDTH => r.width = val,
                    REG_HEIGHT => r.height = val,
                    REG_SRC_STRIDE => r.src_stride = val,
                    REG_DST_STRIDE => r.dst_stride = val,
                    REG_COLOR => r.color = val,
                    REG_MASK => r.mask = val,
                    _ => {}
                }
            }
        }
    }

    fn run(&self) {
        let Some(bus) = self.bus.bus() else {
            log::warn!("blitter: start with no bus connected");
            return;
        };
        let (op, src, dst, width, height, src_stride, dst_stride, color, mask) = {
            let r = self.regs.lock().unwrap();
            (
                r.op, r.src, r.dst, r.width, r.height, r.src_stride, r.dst_stride, r.color, r.mask,
            )
        };

        // Clamp the rectangle so the last row still ends inside memory.
        let mem = bus.mem_size() as u64;
        let width = width.min(0x10000);
        let height = {
            let mut h = height.min(0x10000);
            let row_bytes = width as u64 * 4;
            while h > 0 && dst as u64 + (h as u64 - 1) * dst_stride as u64 + row_bytes > mem {
                h -= 1;
            }
            h
        };

        match op {
            OP_FILL => {
                for row in 0..height {
                    let line = dst.wrapping_add(row.wrapping_mul(dst_stride));
                    for col in 0..width {
                        bus.write32(line.wrapping_add(col * 4), color);
                    }
                }
            }
            OP_COPY => {
                for row in 0..height {
                    let s = src.wrapping_add(row.wrapping_mul(src_stride));
                    let d = dst.wrapping_add(row.wrapping_mul(dst_stride));
                    for col in 0..width {
                        let v = bus.read32(s.wrapping_add(col * 4));
                        bus.write32(d.wrapping_add(col * 4), v);
                    }
                }
            }
            OP_MASKED_COPY => {
                let mask_pitch = (width + 7) / 8;
                for row in 0..height {
                    let s = src.wrapping_add(row.wrapping_mul(src_stride));
                    let d = dst.wrapping_add(row.wrapping_mul(dst_stride));
                    let m = mask.wrapping_add(row.wrapping_mul(mask_pitch));
                    for col in 0..width {
                        let bits = bus.read8(m.wrapping_add(col / 8));
                        if bits >> (7 - col % 8) & 1 != 0 {
                            let v = bus.read32(s.wrapping_add(col * 4));
                            bus.write32(d.wrapping_add(col * 4), v);
                        }
                    }
                }
            }
            other => log::warn!("blitter: unknown op {other}"),
        }
    }
}
