//! Raster-synchronised register coprocessor (copper).
//!
//! The copper runs a small program of 64-bit instructions fetched from guest
//! memory. The compositor restarts the program at every vertical blank and
//! steps it once per scanline, so MOVE writes executed before scanline `y`
//! are visible to the scanline-aware renderers for that line — the classic
//! mid-frame palette trick.
//!
//! # Instruction encoding (two little-endian 32-bit words)
//!
//! | Word 0                          | Word 1 | Meaning                     |
//! |---------------------------------|--------|-----------------------------|
//! | 0x01 << 24 \| raster-Y          | —      | WAIT until scanline >= Y    |
//! | 0x02 << 24 \| register address  | value  | MOVE value to register      |
//! | 0x00 << 24                      | —      | END (idle until next frame) |
//!
//! Register addresses are the low 24 bits of the absolute MMIO address,
//! which covers the whole device window.
//!
//! # Register map (offsets from the copper base)
//!
//! | Offset | Name      | Description                              |
//! |--------|-----------|------------------------------------------|
//! | 0x00   | COP_CTRL  | Bit 0 = enable, bit 1 = reset (one-shot) |
//! | 0x04   | COP_LIST  | Program pointer in guest memory          |
//! | 0x08   | COP_PC    | (read) current fetch address             |

use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::Arc;

use crate::bus::{BusError, MachineBus};

pub const REG_CTRL: u32 = 0x00;
pub const REG_LIST: u32 = 0x04;
pub const REG_PC: u32 = 0x08;

const CTRL_ENABLE: u32 = 0x1;
const CTRL_RESET: u32 = 0x2;

const OP_END: u32 = 0x00;
const OP_WAIT: u32 = 0x01;
const OP_MOVE: u32 = 0x02;

/// Ceiling on instructions executed per scanline step; a malformed list
/// cannot wedge the compositor thread.
const MAX_STEPS_PER_LINE: u32 = 4096;

pub struct Copper {
    base: u32,
    enabled: AtomicBool,
    list_ptr: AtomicU32,
    pc: AtomicU32,
    /// Pending WAIT target, or u32::MAX when not waiting.
    wait_y: AtomicU32,
    /// Set by END or a fault; cleared by `restart`.
    done: AtomicBool,
}

impl Copper {
    pub fn new(base: u32) -> Arc<Self> {
        Arc::new(Self {
            base,
            enabled: AtomicBool::new(false),
            list_ptr: AtomicU32::new(0),
            pc: AtomicU32::new(0),
            wait_y: AtomicU32::new(u32::MAX),
            done: AtomicBool::new(true),
        })
    }

    pub fn map(self: &Arc<Self>, bus: &mut MachineBus) -> Result<(), BusError> {
        let base = self.base;
        let rd = Arc::clone(self);
        let wr = Arc::clone(self);
        bus.map_io(
            base,
            base + REG_PC + 3,
            Arc::new(move |addr| rd.read_register(addr - base)),
            Arc::new(move |addr, val| wr.write_register(addr - base, val)),
        )
    }

    fn read_register(&self, offset: u32) -> u32 {
        match offset {
            REG_CTRL => self.enabled.load(Ordering::Relaxed) as u32,
            REG_LIST => self.list_ptr.load(Ordering::Relaxed),
            REG_PC => self.pc.load(Ordering::Relaxed),
            _ => 0,
        }
    }

    fn write_register(&self, offset: u32, val: u32) {
        match offset {
            REG_CTRL => {
                self.enabled.store(val & CTRL_ENABLE != 0, Ordering::Relaxed);
                if val & CTRL_RESET != 0 {
                    self.restart();
                }
            }
            REG_LIST => self.list_ptr.store(val, Ordering::Relaxed),
            _ => {}
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::Relaxed)
    }

    /// Rewind to the top of the list. Called by the compositor at vertical
    /// blank (and by a guest CTRL reset write).
    pub fn restart(&self) {
        self.pc.store(self.list_ptr.load(Ordering::Relaxed), Ordering::Relaxed);
        self.wait_y.store(u32::MAX, Ordering::Relaxed);
        self.done.store(false, Ordering::Relaxed);
    }

    /// Execute the program up to (and including) scanline `y`: pending WAITs
    /// whose target has been reached release, and the MOVEs behind them are
    /// performed through the bus before the caller renders the line.
    pub fn run_scanline(&self, y: u32, bus: &MachineBus) {
        if !self.is_enabled() || self.done.load(Ordering::Relaxed) {
            return;
        }
        let wait = self.wait_y.load(Ordering::Relaxed);
        if wait != u32::MAX {
            if y < wait {
                return;
            }
            self.wait_y.store(u32::MAX, Ordering::Relaxed);
        }

        let mut pc = self.pc.load(Ordering::Relaxed);
        for _ in 0..MAX_STEPS_PER_LINE {
            let word0 = bus.read32(pc);
            let word1 = bus.read32(pc.wrapping_add(4));
            match word0 >> 24 {
                OP_WAIT => {
                    let target = word0 & 0x00FF_FFFF;
                    pc = pc.wrapping_add(8);
                    if target > y {
                        self.wait_y.store(target, Ordering::Relaxed);
                        break;
                    }
                }
                OP_MOVE => {
                    bus.write32(word0 & 0x00FF_FFFF, word1);
                    pc = pc.wrapping_add(8);
                }
                OP_END => {
                    self.done.store(true, Ordering::Relaxed);
                    break;
                }
                other => {
                    log::warn!("copper: bad opcode {other:#x} at {pc:#010x}, stopping list");
                    self.done.store(true, Ordering::Relaxed);
                    break;
                }
            }
        }
        self.pc.store(pc, Ordering::Relaxed);
    }
}
