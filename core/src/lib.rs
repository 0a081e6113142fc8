#[cfg(target_endian = "big")]
compile_error!("lumen-core requires a little-endian host (guest memory and MMIO are little-endian)");

pub mod audio;
pub mod bus;
pub mod cpu;
pub mod device;
pub mod tables;
pub mod video;

pub mod prelude {
    pub use crate::audio::{AudioMixer, SampleTicker};
    pub use crate::bus::{BusError, BusHook, MachineBus};
    pub use crate::cpu::CpuCore;
    pub use crate::video::{Compositor, ScanlineAware, VideoSource};
}
