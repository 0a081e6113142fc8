//! Terminal device: MMIO-driven character I/O with ring-buffered input.
//!
//! Host keystrokes are routed, under the device lock, into exactly one of
//! two channels: the line-input ring (newline-terminated reads, tracked by
//! a `\n` counter) or the raw-key ring (per-keystroke reads). Which channel
//! receives a byte depends on the line-input-mode flag at the moment of
//! routing.
//!
//! Writing the magic word 0xDEAD to TERM_SENTINEL latches the halt flag
//! and fires the registered halt callback once per trigger; the lock is
//! released before the callback runs so a callback that touches the
//! terminal again cannot deadlock.
//!
//! # Register map (offsets from the device base)
//!
//! | Offset | Name             | Description                                |
//! |--------|------------------|--------------------------------------------|
//! | 0x00   | TERM_OUT         | Write one output character                 |
//! | 0x04   | TERM_IN          | Read next line-ring byte (0 when empty)    |
//! | 0x08   | TERM_STATUS      | Bit 0 = input available, bit 1 = output    |
//! |        |                  | ready (always set)                         |
//! | 0x0C   | TERM_LINE_STATUS | Bit 0 = a full line is buffered            |
//! | 0x10   | TERM_KEY_STATUS  | Bit 0 = raw key available                  |
//! | 0x14   | TERM_KEY_IN      | Read next raw-key byte (0 when empty)      |
//! | 0x18   | TERM_ECHO        | Echo flag (read/write)                     |
//! | 0x1C   | TERM_CTRL        | Bit 0 = line-input mode                    |
//! | 0x28   | TERM_SENTINEL    | Write 0xDEAD to halt the machine           |

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Instant;

use crate::bus::{BusError, MachineBus};

pub const REG_OUT: u32 = 0x00;
pub const REG_IN: u32 = 0x04;
pub const REG_STATUS: u32 = 0x08;
pub const REG_LINE_STATUS: u32 = 0x0C;
pub const REG_KEY_STATUS: u32 = 0x10;
pub const REG_KEY_IN: u32 = 0x14;
pub const REG_ECHO: u32 = 0x18;
pub const REG_CTRL: u32 = 0x1C;
pub const REG_SENTINEL: u32 = 0x28;

/// Magic halt word.
pub const SENTINEL_MAGIC: u32 = 0xDEAD;

/// Line-input ring capacity.
const LINE_CAPACITY: usize = 1024;

/// Raw-key ring capacity.
const KEY_CAPACITY: usize = 256;

pub type HaltCallback = Box<dyn Fn() + Send>;
pub type OutputCallback = Box<dyn Fn(u8) + Send>;

struct TermState {
    line_ring: VecDeque<u8>,
    newlines: usize,
    key_ring: VecDeque<u8>,
    output: Vec<u8>,
    echo: bool,
    line_mode: bool,
    halted: bool,
    last_status_read: Option<Instant>,
    on_output: Option<OutputCallback>,
}

pub struct Terminal {
    base: u32,
    state: Mutex<TermState>,
    on_halt: Mutex<Option<HaltCallback>>,
}

impl Terminal {
    pub fn new(base: u32) -> Arc<Self> {
        Arc::new(Self {
            base,
            state: Mutex::new(TermState {
                line_ring: VecDeque::with_capacity(LINE_CAPACITY),
                newlines: 0,
                key_ring: VecDeque::with_capacity(KEY_CAPACITY),
                output: Vec::new(),
                echo: true,
                line_mode: true,
                halted: false,
                last_status_read: None,
                on_output: None,
            }),
            on_halt: Mutex::new(None),
        })
    }

    pub fn map(self: &Arc<Self>, bus: &mut MachineBus) -> Result<(), BusError> {
        let base = self.base;
        let rd = Arc::clone(self);
        let wr = Arc::clone(self);
        bus.map_io(
            base,
            base + REG_SENTINEL + 3,
            Arc::new(move |addr| rd.read_register(addr - base)),
            Arc::new(move |addr, val| wr.write_register(addr - base, val)),
        )
    }

    pub fn set_halt_callback(&self, cb: HaltCallback) {
        *self.on_halt.lock().unwrap() = Some(cb);
    }

    pub fn set_output_callback(&self, cb: OutputCallback) {
        self.state.lock().unwrap().on_output = Some(cb);
    }

    // --- Host-side API ---

    /// Route one host keystroke. Exactly one channel receives the byte,
    /// decided under the device lock.
    pub fn route_host_key(&self, b: u8) {
        let mut s = self.state.lock().unwrap();
        if s.line_mode {
            if s.line_ring.len() < LINE_CAPACITY {
                if b == b'\n' {
                    s.newlines += 1;
                }
                s.line_ring.push_back(b);
            }
        } else if s.key_ring.len() < KEY_CAPACITY {
            s.key_ring.push_back(b);
        }
    }

    /// Enqueue a byte into the line ring regardless of mode (programmatic
    /// input, e.g. pasted text). No echo: echoing is the application's
    /// business.
    pub fn enqueue_byte(&self, b: u8) {
        let mut s = self.state.lock().unwrap();
        if s.line_ring.len() < LINE_CAPACITY {
            if b == b'\n' {
                s.newlines += 1;
            }
            s.line_ring.push_back(b);
        }
    }

    /// Drain the guest's accumulated output.
    pub fn take_output(&self) -> Vec<u8> {
        std::mem::take(&mut self.state.lock().unwrap().output)
    }

    pub fn is_halted(&self) -> bool {
        self.state.lock().unwrap().halted
    }

    /// Whether the guest polled TERM_STATUS within `window`; the host UI
    /// gates cursor blink on this.
    pub fn recently_polled(&self, window: std::time::Duration) -> bool {
        self.state
            .lock()
            .unwrap()
            .last_status_read
            .is_some_and(|t| t.elapsed() <= window)
    }

    // --- MMIO handlers ---

    fn read_register(&self, offset: u32) -> u32 {
        let mut s = self.state.lock().unwrap();
        match offset {
            REG_IN => s.line_ring.pop_front().map_or(0, |b| {
                if b == b'\n' {
                    s.newlines -= 1;
                }
                b as u32
            }),
            REG_STATUS => {
                s.last_status_read = Some(Instant::now());
                let input = !s.line_ring.is_empty() as u32;
                input | 0x2 // output always ready
            }
            REG_LINE_STATUS => (s.newlines > 0) as u32,
            REG_KEY_STATUS => !s.key_ring.is_empty() as u32,
            REG_KEY_IN => s.key_ring.pop_front().map_or(0, |b| b as u32),
            REG_ECHO => s.echo as u32,
            REG_CTRL => s.line_mode as u32,
            _ => 0,
        }
    }

    fn write_register(&self, offset: u32, val: u32) {
        match offset {
            REG_OUT => {
                let mut s = self.state.lock().unwrap();
                s.output.push(val as u8);
                if let Some(cb) = s.on_output.take() {
                    // Release the lock around the callback.
                    drop(s);
                    cb(val as u8);
                    self.state.lock().unwrap().on_output = Some(cb);
                }
            }
            REG_ECHO => self.state.lock().unwrap().echo = val & 1 != 0,
            REG_CTRL => self.state.lock().unwrap().line_mode = val & 1 != 0,
            REG_SENTINEL => {
                if val == SENTINEL_MAGIC {
                    let fire = {
                        let mut s = self.state.lock().unwrap();
                        let first = !s.halted;
                        s.halted = true;
                        first
                    };
                    // At most one callback per trigger, outside the lock.
                    if fire {
                        log::info!("terminal: sentinel halt");
                        if let Some(cb) = self.on_halt.lock().unwrap().as_ref() {
                            cb();
                        }
                    }
                }
            }
            _ => {}
        }
    }
}
