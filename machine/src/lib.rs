pub mod loader;
pub mod memory_map;
pub mod registry;
pub mod system;

pub use loader::{Container, LoadError, LoadedProgram};
pub use registry::ModeEntry;
pub use system::{CpuMode, System, SystemConfig};
