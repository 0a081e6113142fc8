//! Shared state and the 60 Hz render loop used by every video device.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicI32, AtomicU64, Ordering};
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use crate::video::triple::TripleBuffer;

/// Nominal frame period of the compositor and the device render loops.
pub const FRAME_PERIOD: Duration = Duration::from_micros(16_667);

/// The per-chip state every video source carries: enable/layer registers,
/// the compositor-managed handshake, and the published frame slots.
pub struct ChipCore {
    width: u32,
    height: u32,
    enabled: AtomicBool,
    layer: AtomicI32,
    managed: AtomicBool,
    rendering: AtomicBool,
    vsyncs: AtomicU64,
    frames: TripleBuffer,
}

impl ChipCore {
    pub fn new(width: u32, height: u32, layer: i32) -> Self {
        Self {
            width,
            height,
            enabled: AtomicBool::new(false),
            layer: AtomicI32::new(layer),
            managed: AtomicBool::new(false),
            rendering: AtomicBool::new(false),
            vsyncs: AtomicU64::new(0),
            frames: TripleBuffer::new(width as usize * height as usize * 4),
        }
    }

    pub fn dimensions(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::Relaxed)
    }

    pub fn set_enabled(&self, on: bool) {
        self.enabled.store(on, Ordering::Relaxed);
    }

    pub fn layer(&self) -> i32 {
        self.layer.load(Ordering::Relaxed)
    }

    pub fn set_layer(&self, layer: i32) {
        self.layer.store(layer, Ordering::Relaxed);
    }

    pub fn is_managed(&self) -> bool {
        self.managed.load(Ordering::Relaxed)
    }

    pub fn set_managed(&self, managed: bool) {
        self.managed.store(managed, Ordering::Relaxed);
    }

    pub fn wait_render_idle(&self) {
        while self.rendering.load(Ordering::Acquire) {
            std::hint::spin_loop();
        }
    }

    pub fn count_vsync(&self) -> u64 {
        self.vsyncs.fetch_add(1, Ordering::Relaxed) + 1
    }

    pub fn vsyncs(&self) -> u64 {
        self.vsyncs.load(Ordering::Relaxed)
    }

    pub fn frames(&self) -> &TripleBuffer {
        &self.frames
    }

    /// Producer-side render guarded by the in-flight flag the compositor
    /// spins on in `wait_render_idle`. Skipped entirely while managed.
    pub fn produce_with(&self, render: impl FnOnce(&mut [u8])) {
        if self.is_managed() {
            return;
        }
        self.rendering.store(true, Ordering::Release);
        self.frames.with_write(render);
        self.frames.publish();
        self.rendering.store(false, Ordering::Release);
    }
}

/// A device that owns a free-running render loop.
pub trait FrameProducer: Send + Sync {
    /// Render and publish one frame (no-op while compositor-managed).
    fn produce_frame(&self);
}

/// Sleep-then-spin pacing, so the loop holds 60 Hz without burning a core.
fn wait_until(deadline: Instant) {
    let now = Instant::now();
    if now >= deadline {
        return;
    }
    let remaining = deadline - now;
    if remaining > Duration::from_micros(1500) {
        std::thread::sleep(remaining - Duration::from_micros(1000));
    }
    while Instant::now() < deadline {
        std::hint::spin_loop();
    }
}

/// Spawn the ~60 Hz producer loop for one source. The loop exits when
/// `running` clears.
pub fn spawn_render_loop(
    producer: Arc<dyn FrameProducer>,
    running: Arc<AtomicBool>,
    name: &str,
) -> JoinHandle<()> {
    std::thread::Builder::new()
        .name(format!("render-{name}"))
        .spawn(move || {
            let mut next = Instant::now();
            while running.load(Ordering::Relaxed) {
                producer.produce_frame();
                next += FRAME_PERIOD;
                wait_until(next);
            }
        })
        .expect("spawn render loop")
}
