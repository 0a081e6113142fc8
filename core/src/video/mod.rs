pub mod compositor;
pub mod producer;
pub mod source;
pub mod triple;

pub use compositor::Compositor;
pub use producer::{ChipCore, FrameProducer, spawn_render_loop};
pub use source::{CompositorManageable, ScanlineAware, VideoSource};
pub use triple::TripleBuffer;
