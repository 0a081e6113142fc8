//! The 8-bit cores' view of the 32-bit bus.
//!
//! A Z80 or 6502 address maps straight onto bus addresses 0x0000-0xFFFF,
//! except for an 8 KiB window at 0xA000-0xBFFF that is redirected through
//! the BANK_SELECT page register: the window shows bank × 8 KiB of the
//! 32-bit space, which is how the small cores reach VRAM and the staging
//! buffers.

use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};

use crate::bus::{BusError, MachineBus};

pub const WINDOW_BASE: u16 = 0xA000;
pub const WINDOW_SIZE: u32 = 0x2000;

#[derive(Clone, Default)]
pub struct BankWindow {
    bank: Arc<AtomicU32>,
}

impl BankWindow {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn select(&self, bank: u32) {
        self.bank.store(bank, Ordering::Relaxed);
    }

    pub fn selected(&self) -> u32 {
        self.bank.load(Ordering::Relaxed)
    }

    /// 16-bit core address to 32-bit bus address.
    pub fn translate(&self, addr: u16) -> u32 {
        if (WINDOW_BASE..WINDOW_BASE.wrapping_add(WINDOW_SIZE as u16)).contains(&addr) {
            self.selected() * WINDOW_SIZE + (addr - WINDOW_BASE) as u32
        } else {
            addr as u32
        }
    }

    /// Expose the page register itself at an 8-bit-visible bus address.
    pub fn map_register(&self, bus: &mut MachineBus, addr: u32) -> Result<(), BusError> {
        let rd = self.bank.clone();
        let wr = self.bank.clone();
        bus.map_io(
            addr,
            addr + 3,
            Arc::new(move |_| rd.load(Ordering::Relaxed)),
            Arc::new(move |_, val| wr.store(val, Ordering::Relaxed)),
        )
    }
}
