//! Sample-accurate register-event player.
//!
//! A player owns a pre-rendered event list — absolute host-sample
//! timestamps paired with chip register writes, produced at load time by
//! an external replay renderer — and dispatches it into its synth engine
//! one host sample at a time. The cursor only advances; a list without a
//! loop marker ends playback, a list with one wraps to the marker.
//!
//! # Event stream container
//!
//! A little-endian binary blob: magic `EVS1`, u32 event count, u32 loop
//! event index (0xFFFF_FFFF for none), then 8 bytes per event
//! (u32 sample, u8 register, u8 value, u16 reserved). Sample indices must
//! be non-decreasing.
//!
//! # Register map (offsets from the player base)
//!
//! | Offset | Name         | Description                               |
//! |--------|--------------|-------------------------------------------|
//! | 0x00   | PLAY_PTR     | Event stream address in guest memory      |
//! | 0x04   | PLAY_LEN     | Event stream length in bytes              |
//! | 0x08   | PLAY_SUBSONG | Sub-song index (stored for the renderer)  |
//! | 0x0C   | PLAY_CTRL    | Write bit 0 = start, bit 1 = stop         |
//! | 0x10   | PLAY_STATUS  | Bit 0 = playing, bit 1 = bad stream       |

use std::sync::{Arc, Mutex};

use crate::audio::{AudioMixer, SampleTicker, SharedEngine};
use crate::bus::{BusError, BusHook, MachineBus};

pub const REG_PTR: u32 = 0x00;
pub const REG_LEN: u32 = 0x04;
pub const REG_SUBSONG: u32 = 0x08;
pub const REG_CTRL: u32 = 0x0C;
pub const REG_STATUS: u32 = 0x10;

const CTRL_START: u32 = 0x1;
const CTRL_STOP: u32 = 0x2;

pub const STATUS_PLAYING: u32 = 0x1;
pub const STATUS_ERROR: u32 = 0x2;

pub const STREAM_MAGIC: [u8; 4] = *b"EVS1";
pub const NO_LOOP: u32 = 0xFFFF_FFFF;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AudioEvent {
    pub sample: u64,
    pub reg: u8,
    pub value: u8,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EventListError {
    BadMagic,
    Truncated,
    NotMonotonic { index: usize },
    BadLoop { index: u32 },
}

impl std::fmt::Display for EventListError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::BadMagic => write!(f, "event stream magic mismatch"),
            Self::Truncated => write!(f, "event stream shorter than its header claims"),
            Self::NotMonotonic { index } => {
                write!(f, "event {index} goes backwards in time")
            }
            Self::BadLoop { index } => write!(f, "loop marker {index} past the end"),
        }
    }
}

impl std::error::Error for EventListError {}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct EventList {
    pub events: Vec<AudioEvent>,
    pub loop_at: Option<usize>,
}

impl EventList {
    /// Parse the `EVS1` container, enforcing monotonic sample order.
    pub fn from_bytes(data: &[u8]) -> Result<Self, EventListError> {
        if data.len() < 12 {
            return Err(EventListError::Truncated);
        }
        if data[0..4] != STREAM_MAGIC {
            return Err(EventListError::BadMagic);
        }
        let count = u32::from_le_bytes(data[4..8].try_into().unwrap()) as usize;
        let loop_idx = u32::from_le_bytes(data[8..12].try_into().unwrap());
        let body = &data[12..];
        if body.len() < count * 8 {
            return Err(EventListError::Truncated);
        }
        let mut events = Vec::with_capacity(count);
        let mut last = 0u64;
        for i in 0..count {
            let rec = &body[i * 8..i * 8 + 8];
            let sample = u32::from_le_bytes(rec[0..4].try_into().unwrap()) as u64;
            if sample < last {
                return Err(EventListError::NotMonotonic { index: i });
            }
            last = sample;
            events.push(AudioEvent {
                sample,
                reg: rec[4],
                value: rec[5],
            });
        }
        let loop_at = match loop_idx {
            NO_LOOP => None,
            i if (i as usize) < count.max(1) => Some(i as usize),
            i => return Err(EventListError::BadLoop { index: i }),
        };
        Ok(Self { events, loop_at })
    }

    /// Serialise back into the container format (used by tests and by
    /// hosts that cache rendered streams).
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(12 + self.events.len() * 8);
        out.extend_from_slice(&STREAM_MAGIC);
        out.extend_from_slice(&(self.events.len() as u32).to_le_bytes());
        out.extend_from_slice(&self.loop_at.map_or(NO_LOOP, |i| i as u32).to_le_bytes());
        for e in &self.events {
            out.extend_from_slice(&(e.sample as u32).to_le_bytes());
            out.push(e.reg);
            out.push(e.value);
            out.extend_from_slice(&[0, 0]);
        }
        out
    }
}

/// The ticking half of the player: registered in the mixer slot, called by
/// the audio thread once per host sample.
pub struct PlayerTicker {
    engine: SharedEngine,
    list: EventList,
    cursor: usize,
    sample_pos: u64,
    playing: bool,
    error: bool,
}

impl PlayerTicker {
    fn new(engine: SharedEngine) -> Self {
        Self {
            engine,
            list: EventList::default(),
            cursor: 0,
            sample_pos: 0,
            playing: false,
            error: false,
        }
    }

    pub fn is_playing(&self) -> bool {
        self.playing
    }

    pub fn had_error(&self) -> bool {
        self.error
    }
}

impl SampleTicker for PlayerTicker {
    fn tick_one_sample(&mut self) -> (f32, f32) {
        if self.playing {
            // Dispatch everything due at or before the current sample.
            while let Some(e) = self.list.events.get(self.cursor) {
                if e.sample > self.sample_pos {
                    break;
                }
                self.engine.lock().unwrap().write_reg(e.reg, e.value);
                self.cursor += 1;
            }
            if self.cursor >= self.list.events.len() {
                match self.list.loop_at {
                    Some(at) if !self.list.events.is_empty() => {
                        self.cursor = at;
                        self.sample_pos = self.list.events[at].sample;
                    }
                    _ => self.playing = false,
                }
            } else {
                self.sample_pos += 1;
            }
        }
        self.engine.lock().unwrap().tick_one_sample()
    }
}

#[derive(Default)]
struct PlayerRegs {
    ptr: u32,
    len: u32,
    subsong: u32,
}

/// The MMIO-programmable player device bound to one engine.
pub struct EventPlayer {
    base: u32,
    engine: SharedEngine,
    mixer: Arc<AudioMixer>,
    regs: Mutex<PlayerRegs>,
    ticker: Arc<Mutex<PlayerTicker>>,
    bus: BusHook,
}

impl EventPlayer {
    pub fn new(base: u32, engine: SharedEngine, mixer: Arc<AudioMixer>) -> Arc<Self> {
        let ticker = Arc::new(Mutex::new(PlayerTicker::new(Arc::clone(&engine))));
        Arc::new(Self {
            base,
            engine,
            mixer,
            regs: Mutex::new(PlayerRegs::default()),
            ticker,
            bus: BusHook::new(),
        })
    }

    pub fn map(self: &Arc<Self>, bus: &mut MachineBus) -> Result<(), BusError> {
        let base = self.base;
        let rd = Arc::clone(self);
        let wr = Arc::clone(self);
        bus.map_io(
            base,
            base + REG_STATUS + 3,
            Arc::new(move |addr| rd.read_register(addr - base)),
            Arc::new(move |addr, val| wr.write_register(addr - base, val)),
        )
    }

    pub fn connect_bus(&self, bus: &Arc<MachineBus>) {
        self.bus.connect(bus);
    }

    fn read_register(&self, offset: u32) -> u32 {
        match offset {
            REG_PTR => self.regs.lock().unwrap().ptr,
            REG_LEN => self.regs.lock().unwrap().len,
            REG_SUBSONG => self.regs.lock().unwrap().subsong,
            REG_STATUS => self.status(),
            _ => 0,
        }
    }

    fn write_register(&self, offset: u32, val: u32) {
        match offset {
            REG_PTR => self.regs.lock().unwrap().ptr = val,
            REG_LEN => self.regs.lock().unwrap().len = val,
            REG_SUBSONG => self.regs.lock().unwrap().subsong = val,
            REG_CTRL => {
                if val & CTRL_STOP != 0 {
                    self.stop();
                }
                if val & CTRL_START != 0 {
                    self.start();
                }
            }
            _ => {}
        }
    }

    pub fn status(&self) -> u32 {
        let t = self.ticker.lock().unwrap();
        let mut s = 0;
        if t.is_playing() {
            s |= STATUS_PLAYING;
        }
        if t.had_error() {
            s |= STATUS_ERROR;
        }
        s
    }

    pub fn is_idle(&self) -> bool {
        let t = self.ticker.lock().unwrap();
        !t.is_playing()
    }

    /// Load a pre-parsed list directly (media loader path, full register
    /// side-effect fidelity).
    pub fn play_list(&self, list: EventList) {
        self.engine.lock().unwrap().reset();
        {
            let mut t = self.ticker.lock().unwrap();
            t.list = list;
            t.cursor = 0;
            t.sample_pos = 0;
            t.playing = true;
            t.error = false;
        }
        self.mixer
            .set_sample_ticker(Some(Arc::clone(&self.ticker) as _));
    }

    /// Guest-programmed start: parse the event stream the registers point
    /// at and begin playback.
    pub fn start(&self) {
        let (ptr, len) = {
            let r = self.regs.lock().unwrap();
            (r.ptr, r.len)
        };
        let Some(bus) = self.bus.bus() else {
            log::warn!("player: start with no bus connected");
            return;
        };
        let mut raw = vec![0u8; len as usize];
        bus.read_block(ptr, &mut raw);
        match EventList::from_bytes(&raw) {
            Ok(list) => {
                log::info!(
                    "player: starting {} events{}",
                    list.events.len(),
                    if list.loop_at.is_some() { " (looped)" } else { "" }
                );
                self.play_list(list);
            }
            Err(e) => {
                log::warn!("player: bad event stream: {e}");
                let mut t = self.ticker.lock().unwrap();
                t.playing = false;
                t.error = true;
            }
        }
    }

    pub fn stop(&self) {
        let mut t = self.ticker.lock().unwrap();
        t.playing = false;
    }

    /// The ticker half, for hosts that register it manually.
    pub fn ticker(&self) -> Arc<Mutex<PlayerTicker>> {
        Arc::clone(&self.ticker)
    }
}
