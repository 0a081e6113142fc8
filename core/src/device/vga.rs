//! VGA-style video source: linear 8-bpp and 4-plane planar modes with a
//! 6-bit DAC palette.
//!
//! # Register map (offsets from the device base)
//!
//! | Offset | Name          | Description                                  |
//! |--------|---------------|----------------------------------------------|
//! | 0x00   | VGA_CTRL      | Bit 0 = enable                               |
//! | 0x04   | VGA_MODE      | 0 = linear 320×200×8, 1 = planar 640×480×4   |
//! | 0x08   | VGA_VRAM_BASE | Video memory address                         |
//! | 0x0C   | VGA_LAYER     | Compositor Z-order (signed)                  |
//! | 0x10   | VGA_DAC_IDX   | Palette index; writing resets the RGB phase  |
//! | 0x14   | VGA_DAC_DATA  | 6-bit component writes in R, G, B order;     |
//! |        |               | after B the index auto-increments            |
//!
//! In planar mode the four 1-bpp planes sit consecutively in VRAM
//! (plane pitch = 640×480/8 bytes); a pixel's 4-bit palette index is
//! composed from one bit of each plane, plane 0 least significant.

use std::sync::atomic::Ordering;
use std::sync::{Arc, Mutex};

use crate::bus::{BusError, BusHook, MachineBus};
use crate::tables::VGA_PALETTE;
use crate::video::FrameProducer;
use crate::video::producer::ChipCore;
use crate::video::source::{CompositorManageable, ScanlineAware, VideoSource};

pub const REG_CTRL: u32 = 0x00;
pub const REG_MODE: u32 = 0x04;
pub const REG_VRAM_BASE: u32 = 0x08;
pub const REG_LAYER: u32 = 0x0C;
pub const REG_DAC_IDX: u32 = 0x10;
pub const REG_DAC_DATA: u32 = 0x14;

pub const MODE_LINEAR: u32 = 0;
pub const MODE_PLANAR: u32 = 1;

pub const WIDTH: u32 = 640;
pub const HEIGHT: u32 = 480;

const PLANE_PITCH: u32 = WIDTH * HEIGHT / 8;

struct VgaRegs {
    mode: u32,
    vram_base: u32,
    dac_index: u8,
    dac_phase: u8,
    dac_latch: [u8; 2],
}

pub struct Vga {
    base: u32,
    core: ChipCore,
    regs: Mutex<VgaRegs>,
    palette: Mutex<[u32; 256]>,
    bus: BusHook,
}

impl Vga {
    pub fn new(base: u32, default_vram: u32) -> Arc<Self> {
        Arc::new(Self {
            base,
            core: ChipCore::new(WIDTH, HEIGHT, 1),
            regs: Mutex::new(VgaRegs {
                mode: MODE_LINEAR,
                vram_base: default_vram,
                dac_index: 0,
                dac_phase: 0,
                dac_latch: [0; 2],
            }),
            palette: Mutex::new(VGA_PALETTE),
            bus: BusHook::new(),
        })
    }

    pub fn map(self: &Arc<Self>, bus: &mut MachineBus) -> Result<(), BusError> {
        let base = self.base;
        let rd = Arc::clone(self);
        let wr = Arc::clone(self);
        bus.map_io(
            base,
            base + REG_DAC_DATA + 3,
            Arc::new(move |addr| rd.read_register(addr - base)),
            Arc::new(move |addr, val| wr.write_register(addr - base, val)),
        )
    }

    pub fn connect_bus(&self, bus: &Arc<MachineBus>) {
        self.bus.connect(bus);
    }

    fn read_register(&self, offset: u32) -> u32 {
        let r = self.regs.lock().unwrap();
        match offset {
            REG_CTRL => self.core.is_enabled() as u32,
            REG_MODE => r.mode,
            REG_VRAM_BASE => r.vram_base,
            REG_LAYER => self.core.layer() as u32,
            REG_DAC_IDX => r.dac_index as u32,
            _ => 0,
        }
    }

    fn write_register(&self, offset: u32, val: u32) {
        match offset {
            REG_CTRL => self.core.set_enabled(val & 1 != 0),
            REG_MODE => self.regs.lock().unwrap().mode = val & 1,
            REG_VRAM_BASE => self.regs.lock().unwrap().vram_base = val,
            REG_LAYER => self.core.set_layer(val as i32),
            REG_DAC_IDX => {
                let mut r = self.regs.lock().unwrap();
                r.dac_index = val as u8;
                r.dac_phase = 0;
            }
            REG_DAC_DATA => {
                let mut r = self.regs.lock().unwrap();
                // 6-bit DAC component, scaled to 8 bits on the last write.
                let c = (val as u8 & 0x3F) << 2 | (val as u8 & 0x3F) >> 4;
                match r.dac_phase {
                    0 | 1 => {
                        let phase = r.dac_phase as usize;
                        r.dac_latch[phase] = c;
                        r.dac_phase += 1;
                    }
                    _ => {
                        let [red, green] = r.dac_latch;
                        let idx = r.dac_index as usize;
                        self.palette.lock().unwrap()[idx] = 0xFF00_0000
                            | (c as u32) << 16
                            | (green as u32) << 8
                            | red as u32;
                        r.dac_index = r.dac_index.wrapping_add(1);
                        r.dac_phase = 0;
                    }
                }
            }
            _ => {}
        }
    }

    fn mode_dims(mode: u32) -> (u32, u32) {
        match mode {
            MODE_PLANAR => (WIDTH, HEIGHT),
            _ => (320, 200),
        }
    }

    fn render_line(&self, y: u32, line: &mut [u8]) {
        let Some(bus) = self.bus.bus() else {
            line.fill(0);
            return;
        };
        let (mode, vram) = {
            let r = self.regs.lock().unwrap();
            (r.mode, r.vram_base)
        };
        let pal = *self.palette.lock().unwrap();
        let (w, _) = Self::mode_dims(mode);
        bus.with_memory(|mem| {
            let at = |addr: u32| mem.get(addr as usize).map_or(0, |c| c.load(Ordering::Relaxed));
            match mode {
                MODE_PLANAR => {
                    for (x, out) in line.chunks_exact_mut(4).enumerate().take(w as usize) {
                        let bit_addr = y * (WIDTH / 8) + x as u32 / 8;
                        let bit = 7 - (x as u32 & 7);
                        let mut idx = 0u8;
                        for plane in 0..4u32 {
                            idx |= (at(vram + plane * PLANE_PITCH + bit_addr) >> bit & 1) << plane;
                        }
                        out.copy_from_slice(&pal[idx as usize].to_le_bytes());
                    }
                }
                _ => {
                    let row = vram + y * w;
                    for (x, out) in line.chunks_exact_mut(4).enumerate().take(w as usize) {
                        let idx = at(row + x as u32);
                        out.copy_from_slice(&pal[idx as usize].to_le_bytes());
                    }
                }
            }
        });
    }

    fn render_frame(&self, buf: &mut [u8]) {
        let mode = self.regs.lock().unwrap().mode;
        let (w, h) = Self::mode_dims(mode);
        let pitch = w as usize * 4;
        for y in 0..h {
            self.render_line(y, &mut buf[y as usize * pitch..][..pitch]);
        }
    }
}

impl FrameProducer for Vga {
    fn produce_frame(&self) {
        if !self.core.is_enabled() {
            return;
        }
        self.core.produce_with(|buf| self.render_frame(buf));
    }
}

impl VideoSource for Vga {
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
        Self::mode_dims(self.regs.lock().unwrap().mode)
    }

    fn signal_vsync(&self) {
        self.core.count_vsync();
    }
}

impl CompositorManageable for Vga {
    fn set_compositor_managed(&self, managed: bool) {
        self.core.set_managed(managed);
    }

    fn wait_render_idle(&self) {
        self.core.wait_render_idle();
    }
}

impl ScanlineAware for Vga {
    fn start_frame(&self) {}

    fn process_scanline(&self, y: u32) {
        let mode = self.regs.lock().unwrap().mode;
        let (w, h) = Self::mode_dims(mode);
        if y >= h {
            return;
        }
        let pitch = w as usize * 4;
        self.core.frames().with_write(|buf| {
            self.render_line(y, &mut buf[y as usize * pitch..][..pitch]);
        });
    }

    fn finish_frame(&self) -> &[u8] {
        self.core.frames().publish();
        self.core.frames().acquire()
    }
}
