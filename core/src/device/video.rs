//! Base video chip: palettised framebuffer, VBlank status and the
//! scanline-aware palette pipeline the copper pokes at.
//!
//! The framebuffer lives in ordinary bus memory (default 0x100000) so the
//! blitter and the CPUs reach it with plain stores. The chip renders it to
//! RGBA either from its own 60 Hz producer loop or, when the copper is
//! enabled, one scanline at a time under compositor control.
//!
//! # Register map (offsets from the chip base)
//!
//! | Offset | Name         | Description                                     |
//! |--------|--------------|-------------------------------------------------|
//! | 0x00   | VID_CTRL     | Bit 0 = enable, bit 1 = VBlank IRQ enable       |
//! | 0x04   | VID_STATUS   | Bit 0 = in VBlank; bits 8+ = frame counter      |
//! | 0x08   | VID_MODE     | 0 = 8bpp 640×480, 1 = 32bpp 640×480, 2 = 8bpp 320×240 |
//! | 0x0C   | VID_FB_BASE  | Framebuffer address                             |
//! | 0x10   | VID_LAYER    | Compositor Z-order (signed)                     |
//! | 0x14   | VID_PAL_IDX  | Palette write index                             |
//! | 0x18   | VID_PAL_DATA | Palette entry (RGBA, auto-incrementing index)   |
//! | 0x1C   | VID_RASTER_Y | (read) scanline currently being composed        |
//! | 0x20   | VID_RASTER_COLOR | Background colour; aliases palette entry 0  |
//!
//! VID_STATUS has a dedicated lock-free reader on the bus fast path, since
//! guests poll it in tight VBlank-wait loops.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};

use crate::bus::{BusError, BusHook, MachineBus};
use crate::cpu::IrqLine;
use crate::tables::BASE_PALETTE;
use crate::video::producer::ChipCore;
use crate::video::source::{CompositorManageable, ScanlineAware, VideoSource};
use crate::video::FrameProducer;

pub const REG_CTRL: u32 = 0x00;
pub const REG_STATUS: u32 = 0x04;
pub const REG_MODE: u32 = 0x08;
pub const REG_FB_BASE: u32 = 0x0C;
pub const REG_LAYER: u32 = 0x10;
pub const REG_PAL_IDX: u32 = 0x14;
pub const REG_PAL_DATA: u32 = 0x18;
pub const REG_RASTER_Y: u32 = 0x1C;
pub const REG_RASTER_COLOR: u32 = 0x20;

const CTRL_ENABLE: u32 = 0x1;
const CTRL_VBLANK_IRQ: u32 = 0x2;

const STATUS_VBLANK: u32 = 0x1;

pub const MODE_PAL8_640: u32 = 0;
pub const MODE_RGBA_640: u32 = 1;
pub const MODE_PAL8_320: u32 = 2;

pub const WIDTH: u32 = 640;
pub const HEIGHT: u32 = 480;

struct VideoRegs {
    ctrl: u32,
    mode: u32,
    fb_base: u32,
    pal_index: u32,
}

pub struct VideoChip {
    base: u32,
    core: ChipCore,
    regs: Mutex<VideoRegs>,
    palette: Mutex<[u32; 256]>,
    /// VBlank flag + frame counter, read on the bus fast path.
    status: Arc<AtomicU32>,
    raster_y: AtomicU32,
    irq: Mutex<Option<IrqLine>>,
    bus: BusHook,
}

impl VideoChip {
    pub fn new(base: u32, default_fb: u32) -> Arc<Self> {
        Arc::new(Self {
            base,
            core: ChipCore::new(WIDTH, HEIGHT, 0),
            regs: Mutex::new(VideoRegs {
                ctrl: 0,
                mode: MODE_PAL8_640,
                fb_base: default_fb,
                pal_index: 0,
            }),
            palette: Mutex::new(BASE_PALETTE),
            status: Arc::new(AtomicU32::new(0)),
            raster_y: AtomicU32::new(0),
            irq: Mutex::new(None),
            bus: BusHook::new(),
        })
    }

    pub fn map(self: &Arc<Self>, bus: &mut MachineBus) -> Result<(), BusError> {
        let base = self.base;
        let rd = Arc::clone(self);
        let wr = Arc::clone(self);
        bus.map_io(
            base,
            base + REG_RASTER_COLOR + 3,
            Arc::new(move |addr| rd.read_register(addr - base)),
            Arc::new(move |addr, val| wr.write_register(addr - base, val)),
        )?;
        let status = Arc::clone(&self.status);
        bus.set_fast_status(base + REG_STATUS, Arc::new(move |_| status.load(Ordering::Acquire)));
        Ok(())
    }

    pub fn connect_bus(&self, bus: &Arc<MachineBus>) {
        self.bus.connect(bus);
    }

    pub fn set_irq_line(&self, line: IrqLine) {
        *self.irq.lock().unwrap() = Some(line);
    }

    pub fn status_word(&self) -> u32 {
        self.status.load(Ordering::Acquire)
    }

    fn read_register(&self, offset: u32) -> u32 {
        match offset {
            REG_CTRL => self.regs.lock().unwrap().ctrl,
            REG_STATUS => self.status.load(Ordering::Acquire),
            REG_MODE => self.regs.lock().unwrap().mode,
            REG_FB_BASE => self.regs.lock().unwrap().fb_base,
            REG_LAYER => self.core.layer() as u32,
            REG_PAL_IDX => self.regs.lock().unwrap().pal_index,
            REG_PAL_DATA => {
                let idx = self.regs.lock().unwrap().pal_index as usize & 0xFF;
                self.palette.lock().unwrap()[idx]
            }
            REG_RASTER_Y => self.raster_y.load(Ordering::Relaxed),
            REG_RASTER_COLOR => self.palette.lock().unwrap()[0],
            _ => 0,
        }
    }

    fn write_register(&self, offset: u32, val: u32) {
        match offset {
            REG_CTRL => {
                let mut r = self.regs.lock().unwrap();
                r.ctrl = val;
                drop(r);
                self.core.set_enabled(val & CTRL_ENABLE != 0);
            }
            REG_MODE => {
                if val <= MODE_PAL8_320 {
                    self.regs.lock().unwrap().mode = val;
                }
            }
            REG_FB_BASE => self.regs.lock().unwrap().fb_base = val,
            REG_LAYER => self.core.set_layer(val as i32),
            REG_PAL_IDX => self.regs.lock().unwrap().pal_index = val & 0xFF,
            REG_PAL_DATA => {
                let mut r = self.regs.lock().unwrap();
                let idx = r.pal_index as usize & 0xFF;
                r.pal_index = (r.pal_index + 1) & 0xFF;
                drop(r);
                self.palette.lock().unwrap()[idx] = val;
            }
            REG_RASTER_COLOR => self.palette.lock().unwrap()[0] = val,
            _ => {}
        }
    }

    /// Mode-dependent active resolution (the frame buffer slot is always
    /// allocated at the 640×480 maximum).
    fn mode_dims(mode: u32) -> (u32, u32) {
        match mode {
            MODE_PAL8_320 => (320, 240),
            _ => (WIDTH, HEIGHT),
        }
    }

    /// Render one scanline of the guest framebuffer into `line` (RGBA).
    /// The palette is consulted per call, so copper writes between
    /// scanlines show up mid-frame.
    fn render_line(&self, y: u32, line: &mut [u8]) {
        let Some(bus) = self.bus.bus() else {
            line.fill(0);
            return;
        };
        let (mode, fb_base) = {
            let r = self.regs.lock().unwrap();
            (r.mode, r.fb_base)
        };
        let (w, _) = Self::mode_dims(mode);
        match mode {
            MODE_RGBA_640 => bus.with_memory(|mem| {
                let row = (fb_base + y * w * 4) as usize;
                for (x, out) in line.chunks_exact_mut(4).enumerate().take(w as usize) {
                    for (i, b) in out.iter_mut().enumerate().take(3) {
                        *b = mem
                            .get(row + x * 4 + i)
                            .map_or(0, |c| c.load(Ordering::Relaxed));
                    }
                    out[3] = 0xFF;
                }
            }),
            _ => {
                let pal = *self.palette.lock().unwrap();
                bus.with_memory(|mem| {
                    let row = (fb_base + y * w) as usize;
                    for (x, out) in line.chunks_exact_mut(4).enumerate().take(w as usize) {
                        let idx = mem.get(row + x).map_or(0, |c| c.load(Ordering::Relaxed));
                        out.copy_from_slice(&pal[idx as usize].to_le_bytes());
                    }
                });
            }
        }
    }

    fn render_frame(&self, buf: &mut [u8]) {
        let mode = self.regs.lock().unwrap().mode;
        let (w, h) = Self::mode_dims(mode);
        let pitch = w as usize * 4;
        for y in 0..h {
            self.raster_y.store(y, Ordering::Relaxed);
            let line = &mut buf[y as usize * pitch..][..pitch];
            self.render_line(y, line);
        }
    }
}

impl FrameProducer for VideoChip {
    fn produce_frame(&self) {
        if !self.core.is_enabled() {
            return;
        }
        // Leaving the blanking interval.
        self.status.fetch_and(!STATUS_VBLANK, Ordering::AcqRel);
        self.core.produce_with(|buf| self.render_frame(buf));
    }
}

impl VideoSource for VideoChip {
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
        let frames = self.core.count_vsync() as u32;
        self.status.store(STATUS_VBLANK | frames << 8, Ordering::Release);
        let ctrl = self.regs.lock().unwrap().ctrl;
        if ctrl & CTRL_VBLANK_IRQ != 0
            && let Some(irq) = self.irq.lock().unwrap().as_ref()
        {
            irq.raise(2);
        }
    }
}

impl CompositorManageable for VideoChip {
    fn set_compositor_managed(&self, managed: bool) {
        self.core.set_managed(managed);
    }

    fn wait_render_idle(&self) {
        self.core.wait_render_idle();
    }
}

impl ScanlineAware for VideoChip {
    fn start_frame(&self) {
        self.status.fetch_and(!STATUS_VBLANK, Ordering::AcqRel);
    }

    fn process_scanline(&self, y: u32) {
        let mode = self.regs.lock().unwrap().mode;
        let (w, h) = Self::mode_dims(mode);
        if y >= h {
            return;
        }
        self.raster_y.store(y, Ordering::Relaxed);
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
