pub mod ahx;
pub mod blitter;
pub mod copper;
pub mod file_gateway;
pub mod media;
pub mod player;
pub mod pokey;
pub mod psg;
pub mod sid;
pub mod ted_audio;
pub mod ted_text;
pub mod terminal;
pub mod ula;
pub mod v3d;
pub mod vga;
pub mod video;

pub use blitter::Blitter;
pub use copper::Copper;
pub use file_gateway::FileGateway;
pub use media::MediaLoader;
pub use player::EventPlayer;
pub use terminal::Terminal;
pub use video::VideoChip;
