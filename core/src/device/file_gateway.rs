//! Sandboxed file gateway.
//!
//! Guest programs read and write host files through a staging buffer in
//! bus memory. Every filename is validated against the configured base
//! directory before any I/O: absolute paths and `..` segments are rejected
//! with `PATH_TRAVERSAL`, so a guest can never climb out of its sandbox.
//!
//! # Register map (offsets from the device base)
//!
//! | Offset | Name           | Description                                 |
//! |--------|----------------|---------------------------------------------|
//! | 0x00   | FILE_CMD       | Write 1 = read file, 2 = write file         |
//! | 0x04   | FILE_NAME_PTR  | NUL-terminated filename in guest memory     |
//! | 0x08   | FILE_DATA_PTR  | Guest data buffer                           |
//! | 0x0C   | FILE_LEN       | In: write length / read cap. Out: bytes read|
//! | 0x10   | FILE_STATUS    | 0 = ok, 1 = error                           |
//! | 0x14   | FILE_ERROR     | Error code of the last operation            |

use std::path::{Component, Path, PathBuf};
use std::sync::{Arc, Mutex};

use crate::bus::{BusError, BusHook, MachineBus};

pub const REG_CMD: u32 = 0x00;
pub const REG_NAME_PTR: u32 = 0x04;
pub const REG_DATA_PTR: u32 = 0x08;
pub const REG_LEN: u32 = 0x0C;
pub const REG_STATUS: u32 = 0x10;
pub const REG_ERROR: u32 = 0x14;

pub const CMD_READ: u32 = 1;
pub const CMD_WRITE: u32 = 2;

pub const FILE_OK: u32 = 0;
pub const FILE_ERR_NOT_FOUND: u32 = 1;
pub const FILE_ERR_PATH_TRAVERSAL: u32 = 2;
pub const FILE_ERR_IO: u32 = 3;
pub const FILE_ERR_TOO_LARGE: u32 = 4;

/// Longest filename the gateway will read out of guest memory.
pub const MAX_NAME: usize = 256;

/// Default cap on bytes moved per read when FILE_LEN is zero.
const DEFAULT_READ_CAP: u32 = 0x0010_0000;

/// Validate `name` against `base`: relative, no `..`, no NUL, and the
/// joined path stays inside `base`. Returns the joined path.
pub fn sanitize_path(base: &Path, name: &str) -> Option<PathBuf> {
    if name.is_empty() || name.contains('\0') {
        return None;
    }
    let rel = Path::new(name);
    if rel.is_absolute() {
        return None;
    }
    for comp in rel.components() {
        match comp {
            Component::Normal(_) => {}
            // `.` is harmless but anything that climbs or re-roots is not.
            Component::CurDir => {}
            _ => return None,
        }
    }
    Some(base.join(rel))
}

struct GatewayRegs {
    name_ptr: u32,
    data_ptr: u32,
    len: u32,
    status: u32,
    error: u32,
}

pub struct FileGateway {
    base: u32,
    base_dir: PathBuf,
    regs: Mutex<GatewayRegs>,
    bus: BusHook,
}

impl FileGateway {
    pub fn new(base: u32, base_dir: PathBuf, default_data_ptr: u32) -> Arc<Self> {
        Arc::new(Self {
            base,
            base_dir,
            regs: Mutex::new(GatewayRegs {
                name_ptr: 0,
                data_ptr: default_data_ptr,
                len: 0,
                status: FILE_OK,
                error: FILE_OK,
            }),
            bus: BusHook::new(),
        })
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

    pub fn connect_bus(&self, bus: &Arc<MachineBus>) {
        self.bus.connect(bus);
    }

    fn read_register(&self, offset: u32) -> u32 {
        let r = self.regs.lock().unwrap();
        match offset {
            REG_NAME_PTR => r.name_ptr,
            REG_DATA_PTR => r.data_ptr,
            REG_LEN => r.len,
            REG_STATUS => r.status,
            REG_ERROR => r.error,
            _ => 0,
        }
    }

    fn write_register(&self, offset: u32, val: u32) {
        match offset {
            REG_NAME_PTR => self.regs.lock().unwrap().name_ptr = val,
            REG_DATA_PTR => self.regs.lock().unwrap().data_ptr = val,
            REG_LEN => self.regs.lock().unwrap().len = val,
            REG_CMD => self.run_command(val),
            _ => {}
        }
    }

    fn fail(&self, code: u32) {
        let mut r = self.regs.lock().unwrap();
        r.status = 1;
        r.error = code;
    }

    fn run_command(&self, cmd: u32) {
        let Some(bus) = self.bus.bus() else {
            self.fail(FILE_ERR_IO);
            return;
        };
        let (name_ptr, data_ptr, len) = {
            let r = self.regs.lock().unwrap();
            (r.name_ptr, r.data_ptr, r.len)
        };
        let Some(name) = read_guest_cstring(&bus, name_ptr) else {
            self.fail(FILE_ERR_PATH_TRAVERSAL);
            return;
        };
        let Some(path) = sanitize_path(&self.base_dir, &name) else {
            log::warn!("file gateway: rejected path {name:?}");
            self.fail(FILE_ERR_PATH_TRAVERSAL);
            return;
        };

        match cmd {
            CMD_READ => match std::fs::read(&path) {
                Ok(data) => {
                    let cap = if len == 0 { DEFAULT_READ_CAP } else { len } as usize;
                    let n = data.len().min(cap);
                    bus.write_block(data_ptr, &data[..n]);
                    let mut r = self.regs.lock().unwrap();
                    r.len = n as u32;
                    r.status = FILE_OK;
                    r.error = FILE_OK;
                }
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                    self.fail(FILE_ERR_NOT_FOUND)
                }
                Err(_) => self.fail(FILE_ERR_IO),
            },
            CMD_WRITE => {
                let mut data = vec![0u8; len as usize];
                bus.read_block(data_ptr, &mut data);
                match std::fs::write(&path, &data) {
                    Ok(()) => {
                        let mut r = self.regs.lock().unwrap();
                        r.status = FILE_OK;
                        r.error = FILE_OK;
                    }
                    Err(_) => self.fail(FILE_ERR_IO),
                }
            }
            _ => self.fail(FILE_ERR_IO),
        }
    }
}

/// Read a NUL-terminated string from guest memory, bounded by [`MAX_NAME`].
pub fn read_guest_cstring(bus: &MachineBus, ptr: u32) -> Option<String> {
    let mut bytes = Vec::new();
    for i in 0..MAX_NAME as u32 {
        let b = bus.read8(ptr + i) as u8;
        if b == 0 {
            return String::from_utf8(bytes).ok();
        }
        bytes.push(b);
    }
    None
}
