//! MMIO shim for byte-granular chip registers.
//!
//! The emulated sound chips address their registers as single bytes, while
//! bus handlers speak 32-bit words. The shim packs four consecutive byte
//! registers into each word: reads assemble them from the engine, writes
//! compare against a shadow copy and dispatch only the bytes that changed,
//! so a read-modify-write of one byte lane does not replay the other three
//! registers into the chip.

use std::sync::{Arc, Mutex};

use crate::audio::SharedEngine;
use crate::bus::{BusError, MachineBus};

pub struct EngineMmio {
    engine: SharedEngine,
    shadow: Mutex<[u8; 64]>,
    reg_count: u8,
}

impl EngineMmio {
    pub fn new(engine: SharedEngine, reg_count: u8) -> Arc<Self> {
        assert!(reg_count as usize <= 64);
        Arc::new(Self {
            engine,
            shadow: Mutex::new([0; 64]),
            reg_count,
        })
    }

    /// Map the register block at `base`; the block spans
    /// `reg_count` bytes rounded up to a whole word.
    pub fn map(self: &Arc<Self>, bus: &mut MachineBus, base: u32) -> Result<(), BusError> {
        let words = (self.reg_count as u32 + 3) / 4;
        let rd = Arc::clone(self);
        let wr = Arc::clone(self);
        bus.map_io(
            base,
            base + words * 4 - 1,
            Arc::new(move |addr| rd.read_word(addr - base)),
            Arc::new(move |addr, val| wr.write_word(addr - base, val)),
        )
    }

    fn read_word(&self, offset: u32) -> u32 {
        let engine = self.engine.lock().unwrap();
        let mut word = 0u32;
        for lane in 0..4u32 {
            let reg = offset + lane;
            if reg < self.reg_count as u32 {
                word |= (engine.read_reg(reg as u8) as u32) << (lane * 8);
            }
        }
        word
    }

    fn write_word(&self, offset: u32, val: u32) {
        let mut shadow = self.shadow.lock().unwrap();
        let mut engine = self.engine.lock().unwrap();
        for lane in 0..4u32 {
            let reg = offset + lane;
            if reg >= self.reg_count as u32 {
                continue;
            }
            let byte = (val >> (lane * 8)) as u8;
            if shadow[reg as usize] != byte {
                shadow[reg as usize] = byte;
                engine.write_reg(reg as u8, byte);
            }
        }
    }
}
