//! The compositor: collects frames from every enabled video source at
//! ~60 Hz, blends them in Z order and publishes the final picture.
//!
//! Plain sources are consumed through the lock-free triple-buffer swap.
//! Scanline-aware sources are taken over while the copper is enabled: the
//! compositor suspends their producer loop (managed flag + idle spin),
//! then walks the frame one scanline at a time, running the copper before
//! each line so mid-frame register writes land exactly where the raster
//! beam would put them.

use std::sync::Arc;
use std::sync::atomic::AtomicBool;
use std::sync::atomic::Ordering;
use std::thread::JoinHandle;
use std::time::Instant;

use crate::bus::MachineBus;
use crate::device::copper::Copper;
use crate::video::producer::FRAME_PERIOD;
use crate::video::source::{ScanlineAware, VideoSource};
use crate::video::triple::TripleBuffer;

/// Output dimensions of the composed picture.
pub const OUT_WIDTH: u32 = 640;
pub const OUT_HEIGHT: u32 = 480;

enum Slot {
    Plain(Arc<dyn VideoSource>),
    Scanline(Arc<dyn ScanlineAware>),
}

impl Slot {
    fn source(&self) -> &dyn VideoSource {
        match self {
            Slot::Plain(s) => s.as_ref(),
            Slot::Scanline(s) => s.as_ref(),
        }
    }
}

pub struct Compositor {
    bus: Arc<MachineBus>,
    slots: Vec<Slot>,
    copper: Option<Arc<Copper>>,
    out: Arc<TripleBuffer>,
}

impl Compositor {
    pub fn new(bus: Arc<MachineBus>) -> Self {
        Self {
            bus,
            slots: Vec::new(),
            copper: None,
            out: Arc::new(TripleBuffer::new(
                OUT_WIDTH as usize * OUT_HEIGHT as usize * 4,
            )),
        }
    }

    pub fn add_source(&mut self, source: Arc<dyn VideoSource>) {
        self.slots.push(Slot::Plain(source));
    }

    /// Sources registered here take the scanline path whenever the copper
    /// runs; otherwise they are consumed like plain sources.
    pub fn add_scanline_source(&mut self, source: Arc<dyn ScanlineAware>) {
        self.slots.push(Slot::Scanline(source));
    }

    pub fn set_copper(&mut self, copper: Arc<Copper>) {
        self.copper = Some(copper);
    }

    /// The composed output frames, consumed by the front-end presenter.
    pub fn output(&self) -> Arc<TripleBuffer> {
        Arc::clone(&self.out)
    }

    /// Compose one frame: scanline pass, plain collection, Z-order blend,
    /// publish, VSync fan-out.
    pub fn compose_frame(&self) {
        let copper_active = self.copper.as_ref().is_some_and(|c| c.is_enabled());

        // Scanline pass under copper control.
        if copper_active {
            let copper = self.copper.as_ref().unwrap();
            copper.restart();
            let managed: Vec<&Arc<dyn ScanlineAware>> = self
                .slots
                .iter()
                .filter_map(|s| match s {
                    Slot::Scanline(s) if s.is_enabled() => Some(s),
                    _ => None,
                })
                .collect();
            for s in &managed {
                s.set_compositor_managed(true);
                s.wait_render_idle();
                s.start_frame();
            }
            let sweep = managed
                .iter()
                .map(|s| s.dimensions().1)
                .max()
                .unwrap_or(OUT_HEIGHT);
            for y in 0..sweep {
                copper.run_scanline(y, &self.bus);
                for s in &managed {
                    s.process_scanline(y);
                }
            }
        }

        // Collect and blend in Z order (lowest layer first).
        let mut layers: Vec<(i32, (u32, u32), &[u8])> = Vec::with_capacity(self.slots.len());
        for slot in &self.slots {
            let src = slot.source();
            if !src.is_enabled() {
                continue;
            }
            let frame = match slot {
                Slot::Scanline(s) if copper_active => {
                    s.set_compositor_managed(false);
                    Some(s.finish_frame())
                }
                _ => src.get_frame(),
            };
            if let Some(frame) = frame {
                layers.push((src.layer(), src.dimensions(), frame));
            }
        }
        layers.sort_by_key(|&(layer, ..)| layer);

        self.out.with_write(|buf| {
            buf.fill(0);
            // Opaque black backdrop.
            for px in buf.chunks_exact_mut(4) {
                px[3] = 0xFF;
            }
            for (_, dims, frame) in &layers {
                blend_layer(buf, *dims, frame);
            }
        });
        self.out.publish();

        // Vertical blank.
        for slot in &self.slots {
            slot.source().signal_vsync();
        }
    }

    /// Spawn the ~60 Hz compositor thread; exits when `running` clears.
    pub fn spawn(self, running: Arc<AtomicBool>) -> JoinHandle<()> {
        std::thread::Builder::new()
            .name("compositor".into())
            .spawn(move || {
                let mut next = Instant::now();
                while running.load(Ordering::Relaxed) {
                    self.compose_frame();
                    next += FRAME_PERIOD;
                    let now = Instant::now();
                    if next > now {
                        std::thread::sleep(next - now);
                    } else {
                        next = now;
                    }
                }
            })
            .expect("spawn compositor")
    }
}

/// Integer-upscale `frame` to fit the output and source-over blend it,
/// centred.
fn blend_layer(out: &mut [u8], (w, h): (u32, u32), frame: &[u8]) {
    if w == 0 || h == 0 {
        return;
    }
    let scale = (OUT_WIDTH / w).min(OUT_HEIGHT / h).max(1);
    let dw = (w * scale).min(OUT_WIDTH);
    let dh = (h * scale).min(OUT_HEIGHT);
    let x0 = (OUT_WIDTH - dw) / 2;
    let y0 = (OUT_HEIGHT - dh) / 2;

    for dy in 0..dh {
        let sy = dy / scale;
        let src_row = (sy * w) as usize * 4;
        let dst_row = ((y0 + dy) * OUT_WIDTH + x0) as usize * 4;
        for dx in 0..dw {
            let sx = dx / scale;
            let Some(px) = frame.get(src_row + sx as usize * 4..src_row + sx as usize * 4 + 4)
            else {
                return;
            };
            let a = px[3] as u32;
            if a == 0 {
                continue;
            }
            let dst = &mut out[dst_row + dx as usize * 4..][..4];
            if a == 255 {
                dst.copy_from_slice(px);
            } else {
                for c in 0..3 {
                    let s = px[c] as u32;
                    let d = dst[c] as u32;
                    dst[c] = ((s * a + d * (255 - a) + 127) / 255) as u8;
                }
                dst[3] = 0xFF;
            }
        }
    }
}
