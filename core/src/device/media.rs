//! Asynchronous media loader.
//!
//! A PLAY request names a music file, which is sanitised, type-sniffed by
//! extension, staged into the 64 KiB media buffer and handed to the replay
//! renderer; the resulting event stream is programmed into the matching
//! engine's player through the bus, exactly as a guest would do it.
//!
//! Loading happens on a one-shot worker thread. Every request bumps a
//! generation counter captured by its worker; a completion whose
//! generation no longer matches is dropped silently, so a newer PLAY
//! always supersedes an in-flight load and at most one player is active.
//!
//! # Register map (offsets from the device base)
//!
//! | Offset | Name           | Description                                |
//! |--------|----------------|--------------------------------------------|
//! | 0x00   | MEDIA_CTRL     | Write 1 = play, 2 = stop                   |
//! | 0x04   | MEDIA_NAME_PTR | NUL-terminated filename in guest memory    |
//! | 0x08   | MEDIA_SUBSONG  | Sub-song index                             |
//! | 0x0C   | MEDIA_STATUS   | 0 idle, 1 loading, 2 playing, 3 error      |
//! | 0x10   | MEDIA_ERROR    | Last error code                            |

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use crate::bus::{BusError, BusHook, MachineBus};
use crate::device::file_gateway::{read_guest_cstring, sanitize_path};
use crate::device::player::{self, EventList, EventPlayer};

pub const REG_CTRL: u32 = 0x00;
pub const REG_NAME_PTR: u32 = 0x04;
pub const REG_SUBSONG: u32 = 0x08;
pub const REG_STATUS: u32 = 0x0C;
pub const REG_ERROR: u32 = 0x10;

pub const OP_PLAY: u32 = 1;
pub const OP_STOP: u32 = 2;

pub const STATUS_IDLE: u32 = 0;
pub const STATUS_LOADING: u32 = 1;
pub const STATUS_PLAYING: u32 = 2;
pub const STATUS_ERROR: u32 = 3;

pub const ERR_NONE: u32 = 0;
pub const ERR_NOT_FOUND: u32 = 1;
pub const ERR_BAD_FORMAT: u32 = 2;
pub const ERR_UNSUPPORTED: u32 = 3;
pub const ERR_PATH_INVALID: u32 = 4;
pub const ERR_TOO_LARGE: u32 = 5;

/// The staging buffer bound: payloads and rendered streams must fit.
pub const STAGING_SIZE: usize = 0x1_0000;

/// Media families, keyed by file extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MediaKind {
    Sid,
    Psg,
    Pokey,
    Ted,
    Ahx,
}

impl MediaKind {
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_ascii_lowercase().as_str() {
            "sid" => Some(Self::Sid),
            "ym" | "ay" | "sndh" => Some(Self::Psg),
            "sap" => Some(Self::Pokey),
            "ted" | "prg" => Some(Self::Ted),
            "ahx" | "thx" => Some(Self::Ahx),
            _ => None,
        }
    }
}

#[derive(Debug)]
pub enum RenderError {
    /// The payload is recognisably of the right family but malformed.
    BadFormat,
    /// Rendering this format needs an external replay renderer.
    NeedsExternal,
}

/// Turns a staged media payload into a playable event stream. The replay
/// renderers for the concrete music formats (running the original replay
/// code at audio rate and capturing register writes) are external
/// collaborators; hosts install them at machine build time.
pub trait ReplayRenderer: Send + Sync {
    fn render(&self, kind: MediaKind, data: &[u8], subsong: u32)
    -> Result<EventList, RenderError>;
}

/// The built-in renderer: accepts payloads that already are event streams
/// in the native container and defers everything else to an external
/// renderer by failing with `NeedsExternal`.
pub struct StreamRenderer;

impl ReplayRenderer for StreamRenderer {
    fn render(
        &self,
        _kind: MediaKind,
        data: &[u8],
        _subsong: u32,
    ) -> Result<EventList, RenderError> {
        if data.len() >= 4 && data[0..4] == player::STREAM_MAGIC {
            EventList::from_bytes(data).map_err(|_| RenderError::BadFormat)
        } else {
            Err(RenderError::NeedsExternal)
        }
    }
}

/// A player bound to one media family: the device to start and the MMIO
/// base the worker programs through the bus.
#[derive(Clone)]
pub struct PlayerBinding {
    pub player: Arc<EventPlayer>,
    pub mmio_base: u32,
}

struct MediaState {
    name_ptr: u32,
    subsong: u32,
    status: u32,
    error: u32,
    active: Option<MediaKind>,
}

pub struct MediaLoader {
    base: u32,
    base_dir: PathBuf,
    staging: u32,
    state: Mutex<MediaState>,
    generation: AtomicU64,
    players: Mutex<HashMap<MediaKind, PlayerBinding>>,
    renderer: Box<dyn ReplayRenderer>,
    bus: BusHook,
}

impl MediaLoader {
    pub fn new(
        base: u32,
        base_dir: PathBuf,
        staging: u32,
        renderer: Box<dyn ReplayRenderer>,
    ) -> Arc<Self> {
        Arc::new(Self {
            base,
            base_dir,
            staging,
            state: Mutex::new(MediaState {
                name_ptr: 0,
                subsong: 0,
                status: STATUS_IDLE,
                error: ERR_NONE,
                active: None,
            }),
            generation: AtomicU64::new(0),
            players: Mutex::new(HashMap::new()),
            renderer,
            bus: BusHook::new(),
        })
    }

    pub fn bind_player(&self, kind: MediaKind, binding: PlayerBinding) {
        self.players.lock().unwrap().insert(kind, binding);
    }

    pub fn map(self: &Arc<Self>, bus: &mut MachineBus) -> Result<(), BusError> {
        let base = self.base;
        let rd = Arc::clone(self);
        let wr = Arc::clone(self);
        bus.map_io(
            base,
            base + REG_ERROR + 3,
            Arc::new(move |addr| rd.read_register(addr - base)),
            Arc::new(move |addr, val| wr.write_register(addr - base, val)),
        )
    }

    pub fn connect_bus(self: &Arc<Self>, bus: &Arc<MachineBus>) {
        self.bus.connect(bus);
    }

    fn read_register(&self, offset: u32) -> u32 {
        let mut s = self.state.lock().unwrap();
        match offset {
            REG_NAME_PTR => s.name_ptr,
            REG_SUBSONG => s.subsong,
            REG_STATUS => {
                // Poll the active player: a finished track drops to idle.
                if s.status == STATUS_PLAYING
                    && let Some(kind) = s.active
                    && let Some(b) = self.players.lock().unwrap().get(&kind)
                    && b.player.is_idle()
                {
                    s.status = STATUS_IDLE;
                    s.active = None;
                }
                s.status
            }
            REG_ERROR => s.error,
            _ => 0,
        }
    }

    fn write_register(self: &Arc<Self>, offset: u32, val: u32) {
        match offset {
            REG_NAME_PTR => self.state.lock().unwrap().name_ptr = val,
            REG_SUBSONG => self.state.lock().unwrap().subsong = val,
            REG_CTRL => match val {
                OP_PLAY => self.begin_play(),
                OP_STOP => self.stop_all(),
                _ => {}
            },
            _ => {}
        }
    }

    fn fail(&self, code: u32) {
        let mut s = self.state.lock().unwrap();
        s.status = STATUS_ERROR;
        s.error = code;
        s.active = None;
    }

    fn stop_all(&self) {
        for b in self.players.lock().unwrap().values() {
            b.player.stop();
        }
        let mut s = self.state.lock().unwrap();
        s.status = STATUS_IDLE;
        s.active = None;
    }

    /// Synchronous part of PLAY: sanitise and sniff before any I/O, then
    /// bump the generation and hand off to the worker.
    fn begin_play(self: &Arc<Self>) {
        let Some(bus) = self.bus.bus() else {
            self.fail(ERR_NOT_FOUND);
            return;
        };
        let (name_ptr, subsong) = {
            let s = self.state.lock().unwrap();
            (s.name_ptr, s.subsong)
        };
        let Some(name) = read_guest_cstring(&bus, name_ptr) else {
            self.fail(ERR_PATH_INVALID);
            return;
        };
        let Some(path) = sanitize_path(&self.base_dir, &name) else {
            log::warn!("media: rejected path {name:?}");
            self.fail(ERR_PATH_INVALID);
            return;
        };
        let Some(kind) = path
            .extension()
            .and_then(|e| e.to_str())
            .and_then(MediaKind::from_extension)
        else {
            self.fail(ERR_UNSUPPORTED);
            return;
        };

        let generation = self.generation.fetch_add(1, Ordering::AcqRel) + 1;
        {
            let mut s = self.state.lock().unwrap();
            s.status = STATUS_LOADING;
            s.error = ERR_NONE;
        }
        log::info!("media: loading {path:?} as {kind:?} (gen {generation})");

        let loader = Arc::clone(self);
        std::thread::Builder::new()
            .name("media-load".into())
            .spawn(move || loader.worker(generation, path, kind, subsong))
            .expect("spawn media worker");
    }

    /// One-shot async load. Only the newest generation may publish.
    fn worker(self: Arc<Self>, generation: u64, path: PathBuf, kind: MediaKind, subsong: u32) {
        let outcome = self.load(path, kind, subsong);
        if self.generation.load(Ordering::Acquire) != generation {
            // A newer PLAY superseded us; drop without touching state.
            log::debug!("media: dropping stale completion (gen {generation})");
            return;
        }
        match outcome {
            Ok(()) => {
                let mut s = self.state.lock().unwrap();
                s.status = STATUS_PLAYING;
                s.error = ERR_NONE;
                s.active = Some(kind);
            }
            Err(code) => self.fail(code),
        }
    }

    fn load(&self, path: PathBuf, kind: MediaKind, subsong: u32) -> Result<(), u32> {
        let data = std::fs::read(&path).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                ERR_NOT_FOUND
            } else {
                ERR_BAD_FORMAT
            }
        })?;
        if data.len() > STAGING_SIZE {
            return Err(ERR_TOO_LARGE);
        }
        let list = self
            .renderer
            .render(kind, &data, subsong)
            .map_err(|e| match e {
                RenderError::BadFormat => ERR_BAD_FORMAT,
                RenderError::NeedsExternal => ERR_UNSUPPORTED,
            })?;
        let stream = list.to_bytes();
        if stream.len() > STAGING_SIZE {
            return Err(ERR_TOO_LARGE);
        }

        let binding = self
            .players
            .lock()
            .unwrap()
            .get(&kind)
            .cloned()
            .ok_or(ERR_UNSUPPORTED)?;
        let bus = self.bus.bus().ok_or(ERR_NOT_FOUND)?;

        // Stop whatever is playing, then drive the player exactly like a
        // guest would: stage the stream and program its registers.
        for b in self.players.lock().unwrap().values() {
            b.player.stop();
        }
        bus.write_block(self.staging, &stream);
        bus.write32(binding.mmio_base + player::REG_PTR, self.staging);
        bus.write32(binding.mmio_base + player::REG_LEN, stream.len() as u32);
        bus.write32(binding.mmio_base + player::REG_SUBSONG, subsong);
        bus.write32(binding.mmio_base + player::REG_CTRL, 0x1);

        if binding.player.status() & player::STATUS_ERROR != 0 {
            return Err(ERR_BAD_FORMAT);
        }
        Ok(())
    }
}
