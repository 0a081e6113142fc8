//! ULA-style video source: 256×192 bitmap with 8×8 attribute colouring and
//! a border, in the ZX display tradition.
//!
//! VRAM layout follows the historical interleave: 6144 bytes of bitmap
//! where the address of line `y` is `(y & 0xC0) << 5 | (y & 7) << 8 |
//! (y & 0x38) << 2`, then 768 attribute bytes (ink 0-2, paper 3-5, bright
//! 6, flash 7). FLASH swaps ink and paper every 16 frames, counted in
//! `signal_vsync`.
//!
//! # Register map (offsets from the device base)
//!
//! | Offset | Name          | Description                       |
//! |--------|---------------|-----------------------------------|
//! | 0x00   | ULA_CTRL      | Bit 0 = enable                    |
//! | 0x04   | ULA_BORDER    | Border colour 0-7                 |
//! | 0x08   | ULA_VRAM_BASE | Screen memory address             |
//! | 0x0C   | ULA_LAYER     | Compositor Z-order (signed)       |

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

use crate::bus::{BusError, BusHook, MachineBus};
use crate::tables::ULA_PALETTE;
use crate::video::FrameProducer;
use crate::video::producer::ChipCore;
use crate::video::source::{CompositorManageable, ScanlineAware, VideoSource};

pub const REG_CTRL: u32 = 0x00;
pub const REG_BORDER: u32 = 0x04;
pub const REG_VRAM_BASE: u32 = 0x08;
pub const REG_LAYER: u32 = 0x0C;

/// Output dimensions including the border.
pub const WIDTH: u32 = 320;
pub const HEIGHT: u32 = 240;

/// Active bitmap area.
const BITMAP_W: u32 = 256;
const BITMAP_H: u32 = 192;
const BORDER_X: u32 = (WIDTH - BITMAP_W) / 2;
const BORDER_Y: u32 = (HEIGHT - BITMAP_H) / 2;

const BITMAP_LEN: u32 = 6144;

/// FLASH attribute period in frames (on phase and off phase each).
const FLASH_PERIOD: u64 = 16;

pub struct Ula {
    base: u32,
    core: ChipCore,
    border: AtomicU32,
    vram_base: AtomicU32,
    bus: BusHook,
}

impl Ula {
    pub fn new(base: u32, default_vram: u32) -> Arc<Self> {
        Arc::new(Self {
            base,
            core: ChipCore::new(WIDTH, HEIGHT, 1),
            border: AtomicU32::new(0),
            vram_base: AtomicU32::new(default_vram),
            bus: BusHook::new(),
        })
    }

    pub fn map(self: &Arc<Self>, bus: &mut MachineBus) -> Result<(), BusError> {
        let base = self.base;
        let rd = Arc::clone(self);
        let wr = Arc::clone(self);
        bus.map_io(
            base,
            base + REG_LAYER + 3,
            Arc::new(move |addr| rd.read_register(addr - base)),
            Arc::new(move |addr, val| wr.write_register(addr - base, val)),
        )
    }

    pub fn connect_bus(&self, bus: &Arc<MachineBus>) {
        self.bus.connect(bus);
    }

    fn read_register(&self, offset: u32) -> u32 {
        match offset {
            REG_CTRL => self.core.is_enabled() as u32,
            REG_BORDER => self.border.load(Ordering::Relaxed),
            REG_VRAM_BASE => self.vram_base.load(Ordering::Relaxed),
            REG_LAYER => self.core.layer() as u32,
            _ => 0,
        }
    }

    fn write_register(&self, offset: u32, val: u32) {
        match offset {
            REG_CTRL => self.core.set_enabled(val & 1 != 0),
            REG_BORDER => self.border.store(val & 7, Ordering::Relaxed),
            REG_VRAM_BASE => self.vram_base.store(val, Ordering::Relaxed),
            REG_LAYER => self.core.set_layer(val as i32),
            _ => {}
        }
    }

    /// Historical bitmap interleave: thirds, then character row, then line.
    fn line_addr(y: u32) -> u32 {
        (y & 0xC0) << 5 | (y & 0x07) << 8 | (y & 0x38) << 2
    }

    fn render_line(&self, y: u32, line: &mut [u8]) {
        let border = ULA_PALETTE[self.border.load(Ordering::Relaxed) as usize & 7].to_le_bytes();
        let flash_on = self.core.vsyncs() / FLASH_PERIOD % 2 == 1;

        if !(BORDER_Y..BORDER_Y + BITMAP_H).contains(&y) {
            for px in line.chunks_exact_mut(4) {
                px.copy_from_slice(&border);
            }
            return;
        }
        let Some(bus) = self.bus.bus() else {
            line.fill(0);
            return;
        };
        let vram = self.vram_base.load(Ordering::Relaxed);
        let by = y - BORDER_Y;

        bus.with_memory(|mem| {
            let at = |addr: u32| mem.get(addr as usize).map_or(0, |c| c.load(Ordering::Relaxed));
            for (x, px) in line.chunks_exact_mut(4).enumerate() {
                let x = x as u32;
                if !(BORDER_X..BORDER_X + BITMAP_W).contains(&x) {
                    px.copy_from_slice(&border);
                    continue;
                }
                let bx = x - BORDER_X;
                let bits = at(vram + Self::line_addr(by) + bx / 8);
                let attr = at(vram + BITMAP_LEN + by / 8 * 32 + bx / 8);
                let set = bits >> (7 - bx % 8) & 1 != 0;
                let bright = (attr >> 6 & 1) as usize * 8;
                let (ink, paper) = (attr as usize & 7, attr as usize >> 3 & 7);
                let fg = if attr & 0x80 != 0 && flash_on { paper } else { ink };
                let bg = if attr & 0x80 != 0 && flash_on { ink } else { paper };
                let colour = ULA_PALETTE[if set { fg } else { bg } + bright];
                px.copy_from_slice(&colour.to_le_bytes());
            }
        });
    }

    fn render_frame(&self, buf: &mut [u8]) {
        let pitch = WIDTH as usize * 4;
        for y in 0..HEIGHT {
            self.render_line(y, &mut buf[y as usize * pitch..][..pitch]);
        }
    }
}

impl FrameProducer for Ula {
    fn produce_frame(&self) {
        if !self.core.is_enabled() {
            return;
        }
        self.core.produce_with(|buf| self.render_frame(buf));
    }
}

impl VideoSource for Ula {
    fn get_frame(&self) -> Option<&[u8]> {
        if !self.core.is_enabled() {
            return None;
        }
        Some(self.core.frames().acquire())
    }

    fn is_enabled(&self) -> bool {
        self.core.is_enabled()
    }

    fn layer(&self) -> i32 {
        self.core.layer()
    }

    fn dimensions(&self) -> (u32, u32) {
        (WIDTH, HEIGHT)
    }

    fn signal_vsync(&self) {
        self.core.count_vsync();
    }
}

impl CompositorManageable for Ula {
    fn set_compositor_managed(&self, managed: bool) {
        self.core.set_managed(managed);
    }

    fn wait_render_idle(&self) {
        self.core.wait_render_idle();
    }
}

impl ScanlineAware for Ula {
    fn start_frame(&self) {}

    fn process_scanline(&self, y: u32) {
        if y >= HEIGHT {
            return;
        }
        let pitch = WIDTH as usize * 4;
        self.core.frames().with_write(|buf| {
            self.render_line(y, &mut buf[y as usize * pitch..][..pitch]);
        });
    }

    fn finish_frame(&self) -> &[u8] {
        self.core.frames().publish();
        self.core.frames().acquire()
    }
}
