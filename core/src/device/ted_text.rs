//! TED-style text video source: a 40×25 character matrix with per-cell
//! colour attributes and the TED luminance/hue palette.
//!
//! The character matrix (1000 bytes of codes followed by 1000 bytes of
//! attributes) lives in bus memory. Attribute byte: hue in bits 0-3,
//! luminance in bits 4-6. Glyphs come from an opaque 8×8 charset table
//! supplied by the host; with no charset configured the device falls back
//! to a diagnostic pattern derived from the character code so text layout
//! stays debuggable.
//!
//! # Register map (offsets from the device base)
//!
//! | Offset | Name            | Description                           |
//! |--------|-----------------|---------------------------------------|
//! | 0x00   | TED_CTRL        | Bit 0 = enable                        |
//! | 0x04   | TED_MATRIX_BASE | Character matrix address              |
//! | 0x08   | TED_BG          | Background colour (palette index)     |
//! | 0x0C   | TED_LAYER       | Compositor Z-order (signed)           |
//! | 0x10   | TED_CURSOR      | Cursor cell (0-999); 0xFFFF disables  |

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

use crate::bus::{BusError, BusHook, MachineBus};
use crate::tables::TED_PALETTE;
use crate::video::FrameProducer;
use crate::video::producer::ChipCore;
use crate::video::source::{CompositorManageable, ScanlineAware, VideoSource};

pub const REG_CTRL: u32 = 0x00;
pub const REG_MATRIX_BASE: u32 = 0x04;
pub const REG_BG: u32 = 0x08;
pub const REG_LAYER: u32 = 0x0C;
pub const REG_CURSOR: u32 = 0x10;

pub const COLUMNS: u32 = 40;
pub const ROWS: u32 = 25;
pub const WIDTH: u32 = COLUMNS * 8;
pub const HEIGHT: u32 = ROWS * 8;

const MATRIX_CELLS: u32 = COLUMNS * ROWS;

/// Cursor blink period in frames.
const CURSOR_PERIOD: u64 = 20;

pub struct TedText {
    base: u32,
    core: ChipCore,
    matrix_base: AtomicU32,
    bg: AtomicU32,
    cursor: AtomicU32,
    charset: Option<Box<[u8]>>,
    bus: BusHook,
}

impl TedText {
    /// `charset` is an opaque table of 8 bytes per glyph, indexed by
    /// character code; `None` selects the diagnostic fallback glyphs.
    pub fn new(base: u32, default_matrix: u32, charset: Option<Box<[u8]>>) -> Arc<Self> {
        Arc::new(Self {
            base,
            core: ChipCore::new(WIDTH, HEIGHT, 2),
            matrix_base: AtomicU32::new(default_matrix),
            bg: AtomicU32::new(0),
            cursor: AtomicU32::new(0xFFFF),
            charset,
            bus: BusHook::new(),
        })
    }

    pub fn map(self: &Arc<Self>, bus: &mut MachineBus) -> Result<(), BusError> {
        let base = self.base;
        let rd = Arc::clone(self);
        let wr = Arc::clone(self);
        bus.map_io(
            base,
            base + REG_CURSOR + 3,
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
            REG_MATRIX_BASE => self.matrix_base.load(Ordering::Relaxed),
            REG_BG => self.bg.load(Ordering::Relaxed),
            REG_LAYER => self.core.layer() as u32,
            REG_CURSOR => self.cursor.load(Ordering::Relaxed),
            _ => 0,
        }
    }

    fn write_register(&self, offset: u32, val: u32) {
        match offset {
            REG_CTRL => self.core.set_enabled(val & 1 != 0),
            REG_MATRIX_BASE => self.matrix_base.store(val, Ordering::Relaxed),
            REG_BG => self.bg.store(val & 0x7F, Ordering::Relaxed),
            REG_LAYER => self.core.set_layer(val as i32),
            REG_CURSOR => self.cursor.store(val & 0xFFFF, Ordering::Relaxed),
            _ => {}
        }
    }

    /// One glyph row. Falls back to a code-derived pattern when no charset
    /// table was configured.
    fn glyph_row(&self, code: u8, row: u32) -> u8 {
        match &self.charset {
            Some(font) => font
                .get(code as usize * 8 + row as usize)
                .copied()
                .unwrap_or(0),
            None => {
                // Diagnostic fallback: nibble stripes unique per code.
                if row == 0 || row == 7 {
                    0xFF
                } else if row < 4 {
                    code | 0x81
                } else {
                    code.rotate_left(4) | 0x81
                }
            }
        }
    }

    fn render_line(&self, y: u32, line: &mut [u8]) {
        let Some(bus) = self.bus.bus() else {
            line.fill(0);
            return;
        };
        let matrix = self.matrix_base.load(Ordering::Relaxed);
        let bg = TED_PALETTE[self.bg.load(Ordering::Relaxed) as usize & 0x7F].to_le_bytes();
        let cursor = self.cursor.load(Ordering::Relaxed);
        let cursor_on = self.core.vsyncs() / CURSOR_PERIOD % 2 == 0;
        let row = y / 8;
        let glyph_line = y % 8;

        bus.with_memory(|mem| {
            let at = |addr: u32| mem.get(addr as usize).map_or(0, |c| c.load(Ordering::Relaxed));
            for col in 0..COLUMNS {
                let cell = row * COLUMNS + col;
                let code = at(matrix + cell);
                let attr = at(matrix + MATRIX_CELLS + cell);
                let fg = TED_PALETTE[(attr & 0x7F) as usize].to_le_bytes();
                let mut bits = self.glyph_row(code, glyph_line);
                if cell == cursor && cursor_on {
                    bits = !bits;
                }
                for bit in 0..8u32 {
                    let px = &mut line[((col * 8 + bit) * 4) as usize..][..4];
                    if bits >> (7 - bit) & 1 != 0 {
                        px.copy_from_slice(&fg);
                    } else {
                        px.copy_from_slice(&bg);
                    }
                }
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

impl FrameProducer for TedText {
    fn produce_frame(&self) {
        if !self.core.is_enabled() {
            return;
        }
        self.core.produce_with(|buf| self.render_frame(buf));
    }
}

impl VideoSource for TedText {
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

impl CompositorManageable for TedText {
    fn set_compositor_managed(&self, managed: bool) {
        self.core.set_managed(managed);
    }

    fn wait_render_idle(&self) {
        self.core.wait_render_idle();
    }
}

impl ScanlineAware for TedText {
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
