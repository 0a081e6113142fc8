//! The machine itself: builds the bus, registers every device for the
//! selected CPU mode, wires the halt plumbing, and owns the thread
//! lifecycle (CPU executor, per-device render loops, compositor).

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;

use lumen_core::audio::{AudioMixer, EngineMmio, SharedEngine, SynthEngine};
use lumen_core::bus::{BusError, MachineBus};
use lumen_core::cpu::bank::BankWindow;
use lumen_core::cpu::{CpuCore, M68k, M6502, Z80};
use lumen_core::device::ahx::Ahx;
use lumen_core::device::copper::Copper;
use lumen_core::device::file_gateway::FileGateway;
use lumen_core::device::media::{MediaKind, MediaLoader, PlayerBinding, StreamRenderer};
use lumen_core::device::player::EventPlayer;
use lumen_core::device::pokey::Pokey;
use lumen_core::device::psg::Psg;
use lumen_core::device::sid::{self, Sid};
use lumen_core::device::ted_audio::TedAudio;
use lumen_core::device::ted_text::TedText;
use lumen_core::device::terminal::Terminal;
use lumen_core::device::ula::Ula;
use lumen_core::device::v3d::{NullBackend, V3d};
use lumen_core::device::vga::Vga;
use lumen_core::device::video::VideoChip;
use lumen_core::device::Blitter;
use lumen_core::video::triple::TripleBuffer;
use lumen_core::video::{spawn_render_loop, Compositor, FrameProducer};

use crate::loader::{self, LoadError, LoadedProgram};
use crate::memory_map as map;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CpuMode {
    M68k,
    Z80,
    M6502,
    /// No CPU: standalone media player.
    Play,
}

pub struct SystemConfig {
    pub mode: CpuMode,
    pub load_addr: Option<u32>,
    pub entry: Option<u32>,
    pub psg_plus: bool,
    pub sid_plus: bool,
    pub pokey_plus: bool,
    pub ted_plus: bool,
    /// SID chip clock (PAL unless overridden).
    pub sid_clock: u32,
    /// Sandbox roots for the media loader and the file gateway.
    pub media_dir: PathBuf,
    pub file_dir: PathBuf,
    /// Opaque 8×8 charset for the text device.
    pub charset: Option<Box<[u8]>>,
}

impl Default for SystemConfig {
    fn default() -> Self {
        Self {
            mode: CpuMode::M68k,
            load_addr: None,
            entry: None,
            psg_plus: false,
            sid_plus: false,
            pokey_plus: false,
            ted_plus: false,
            sid_clock: sid::CLOCK_PAL,
            media_dir: PathBuf::from("."),
            file_dir: PathBuf::from("."),
            charset: None,
        }
    }
}

#[derive(Debug)]
pub enum BuildError {
    Bus(BusError),
}

impl std::fmt::Display for BuildError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Bus(e) => write!(f, "MMIO map conflict: {e}"),
        }
    }
}

impl std::error::Error for BuildError {}

impl From<BusError> for BuildError {
    fn from(e: BusError) -> Self {
        Self::Bus(e)
    }
}

pub struct System {
    pub bus: Arc<MachineBus>,
    pub running: Arc<AtomicBool>,
    pub mixer: Arc<AudioMixer>,
    pub terminal: Arc<Terminal>,
    pub media: Arc<MediaLoader>,

    mode: CpuMode,
    entry: Option<u32>,
    load_addr: Option<u32>,

    video: Arc<VideoChip>,
    vga: Arc<Vga>,
    ula: Arc<Ula>,
    ted: Arc<TedText>,
    bank: BankWindow,

    compositor: Option<Compositor>,
    output: Arc<TripleBuffer>,
    threads: Vec<JoinHandle<()>>,
}

impl System {
    pub fn build(config: SystemConfig) -> Result<Self, BuildError> {
        let running = Arc::new(AtomicBool::new(true));
        let mut bus = MachineBus::new(map::MEM_SIZE);
        let mixer = AudioMixer::new();
        let bank = BankWindow::new();

        // --- Video devices ---
        let video = VideoChip::new(map::VIDEO_BASE, map::VRAM_BASE);
        video.map(&mut bus)?;
        let vga = Vga::new(map::VGA_BASE, map::VGA_VRAM_BASE);
        vga.map(&mut bus)?;
        let ula = Ula::new(map::ULA_BASE, map::ULA_VRAM_BASE);
        ula.map(&mut bus)?;
        let ted = TedText::new(map::TED_VIDEO_BASE, map::TED_MATRIX_BASE, config.charset);
        ted.map(&mut bus)?;

        let blitter = Blitter::new(map::BLITTER_BASE);
        blitter.map(&mut bus)?;
        let copper = Copper::new(map::COPPER_BASE);
        copper.map(&mut bus)?;

        // --- Terminal ---
        let terminal = Terminal::new(map::TERM_BASE);
        terminal.map(&mut bus)?;

        // --- Synth engines and their players ---
        let psg: SharedEngine = Arc::new(Mutex::new({
            let mut e = Psg::new();
            e.set_enhanced(config.psg_plus);
            e
        }));
        let sid_engine: SharedEngine = Arc::new(Mutex::new({
            let mut e = Sid::new();
            e.set_clock(config.sid_clock);
            e.set_enhanced(config.sid_plus);
            e
        }));
        let pokey: SharedEngine = Arc::new(Mutex::new({
            let mut e = Pokey::new();
            e.set_enhanced(config.pokey_plus);
            e
        }));
        let ted_audio: SharedEngine = Arc::new(Mutex::new({
            let mut e = TedAudio::new();
            e.set_enhanced(config.ted_plus);
            e
        }));
        let ahx: SharedEngine = Arc::new(Mutex::new(Ahx::new()));

        let psg_mmio = EngineMmio::new(Arc::clone(&psg), 16);
        psg_mmio.map(&mut bus, map::PSG_BASE)?;
        let sid_mmio = EngineMmio::new(Arc::clone(&sid_engine), 0x20);
        sid_mmio.map(&mut bus, map::SID_BASE)?;
        let pokey_mmio = EngineMmio::new(Arc::clone(&pokey), 16);
        pokey_mmio.map(&mut bus, map::POKEY_BASE)?;
        let ted_audio_mmio = EngineMmio::new(Arc::clone(&ted_audio), 5);
        ted_audio_mmio.map(&mut bus, map::TED_AUDIO_BASE)?;
        let ahx_mmio = EngineMmio::new(Arc::clone(&ahx), 0x15);
        ahx_mmio.map(&mut bus, map::AHX_BASE)?;

        let psg_player = EventPlayer::new(map::PSG_PLAYER_BASE, Arc::clone(&psg), Arc::clone(&mixer));
        psg_player.map(&mut bus)?;
        let sid_player =
            EventPlayer::new(map::SID_PLAYER_BASE, Arc::clone(&sid_engine), Arc::clone(&mixer));
        sid_player.map(&mut bus)?;
        let pokey_player =
            EventPlayer::new(map::POKEY_PLAYER_BASE, Arc::clone(&pokey), Arc::clone(&mixer));
        pokey_player.map(&mut bus)?;
        let ted_player = EventPlayer::new(
            map::TED_AUDIO_PLAYER_BASE,
            Arc::clone(&ted_audio),
            Arc::clone(&mixer),
        );
        ted_player.map(&mut bus)?;
        let ahx_player = EventPlayer::new(map::AHX_PLAYER_BASE, Arc::clone(&ahx), Arc::clone(&mixer));
        ahx_player.map(&mut bus)?;

        // --- Media loader and file gateway ---
        let media = MediaLoader::new(
            map::MEDIA_BASE,
            config.media_dir.clone(),
            map::MEDIA_STAGING_BASE,
            Box::new(StreamRenderer),
        );
        media.map(&mut bus)?;
        media.bind_player(
            MediaKind::Psg,
            PlayerBinding { player: Arc::clone(&psg_player), mmio_base: map::PSG_PLAYER_BASE },
        );
        media.bind_player(
            MediaKind::Sid,
            PlayerBinding { player: Arc::clone(&sid_player), mmio_base: map::SID_PLAYER_BASE },
        );
        media.bind_player(
            MediaKind::Pokey,
            PlayerBinding {
                player: Arc::clone(&pokey_player),
                mmio_base: map::POKEY_PLAYER_BASE,
            },
        );
        media.bind_player(
            MediaKind::Ted,
            PlayerBinding {
                player: Arc::clone(&ted_player),
                mmio_base: map::TED_AUDIO_PLAYER_BASE,
            },
        );
        media.bind_player(
            MediaKind::Ahx,
            PlayerBinding { player: Arc::clone(&ahx_player), mmio_base: map::AHX_PLAYER_BASE },
        );

        let file_gateway =
            FileGateway::new(map::FILE_BASE, config.file_dir.clone(), map::FILE_DATA_BASE);
        file_gateway.map(&mut bus)?;

        let v3d = V3d::new(map::V3D_BASE, Box::new(NullBackend));
        v3d.map(&mut bus)?;

        // --- 8-bit views ---
        if matches!(config.mode, CpuMode::Z80 | CpuMode::M6502) {
            psg_mmio.map(&mut bus, map::VIEW8_PSG_BASE)?;
            ahx_mmio.map(&mut bus, map::VIEW8_AHX_BASE)?;
            bank.map_register(&mut bus, map::VIEW8_BANK_REG)?;
            Self::map_z80_psg_ports(&mut bus, Arc::clone(&psg))?;
        }

        // --- Share the bus and connect the DMA hooks ---
        let bus = Arc::new(bus);
        blitter.connect_bus(&bus);
        video.connect_bus(&bus);
        vga.connect_bus(&bus);
        ula.connect_bus(&bus);
        ted.connect_bus(&bus);
        media.connect_bus(&bus);
        file_gateway.connect_bus(&bus);
        for p in [&psg_player, &sid_player, &pokey_player, &ted_player, &ahx_player] {
            p.connect_bus(&bus);
        }

        // Sentinel: 0xDEAD halts every thread cooperatively.
        {
            let running = Arc::clone(&running);
            terminal.set_halt_callback(Box::new(move || {
                running.store(false, Ordering::Relaxed);
            }));
        }

        // --- Compositor ---
        let mut compositor = Compositor::new(Arc::clone(&bus));
        compositor.set_copper(Arc::clone(&copper));
        compositor.add_scanline_source(Arc::clone(&video) as _);
        compositor.add_scanline_source(Arc::clone(&vga) as _);
        compositor.add_scanline_source(Arc::clone(&ula) as _);
        compositor.add_scanline_source(Arc::clone(&ted) as _);
        let output = compositor.output();

        Ok(Self {
            bus,
            running,
            mixer,
            terminal,
            media,
            mode: config.mode,
            entry: config.entry,
            load_addr: config.load_addr,
            video,
            vga,
            ula,
            ted,
            bank,
            compositor: Some(compositor),
            output,
            threads: Vec::new(),
        })
    }

    /// AY-style select/data port pair for the Z80 view: port 0xF0 latches
    /// a register index, port 0xF1 reads or writes it.
    fn map_z80_psg_ports(bus: &mut MachineBus, psg: SharedEngine) -> Result<(), BusError> {
        let latch = Arc::new(AtomicU32::new(0));
        let select_addr = map::Z80_PORT_BASE + map::Z80_PSG_PORT_SELECT as u32 * 4;
        let data_addr = map::Z80_PORT_BASE + map::Z80_PSG_PORT_DATA as u32 * 4;

        let rd_latch = Arc::clone(&latch);
        let wr_latch = Arc::clone(&latch);
        bus.map_io(
            select_addr,
            select_addr + 3,
            Arc::new(move |_| rd_latch.load(Ordering::Relaxed)),
            Arc::new(move |_, val| wr_latch.store(val & 0x0F, Ordering::Relaxed)),
        )?;

        let rd_psg = Arc::clone(&psg);
        let rd_latch = Arc::clone(&latch);
        let wr_latch = latch;
        bus.map_io(
            data_addr,
            data_addr + 3,
            Arc::new(move |_| {
                let reg = rd_latch.load(Ordering::Relaxed) as u8;
                rd_psg.lock().unwrap().read_reg(reg) as u32
            }),
            Arc::new(move |_, val| {
                let reg = wr_latch.load(Ordering::Relaxed) as u8;
                psg.lock().unwrap().write_reg(reg, val as u8);
            }),
        )
    }

    pub fn mode(&self) -> CpuMode {
        self.mode
    }

    /// The composed frames the front-end presents.
    pub fn output(&self) -> Arc<TripleBuffer> {
        Arc::clone(&self.output)
    }

    pub fn load_program(&self, path: &std::path::Path) -> Result<LoadedProgram, LoadError> {
        loader::load_program(&self.bus, path, self.mode, self.load_addr, self.entry)
    }

    /// Ask the media loader to play a file below its base directory, the
    /// same way a guest would.
    pub fn play_media(&self, name: &str, subsong: u32) {
        use lumen_core::device::media as m;
        let mut bytes = name.as_bytes().to_vec();
        bytes.push(0);
        self.bus.write_block(map::MEDIA_NAME_SCRATCH, &bytes);
        self.bus.write32(self.media_reg(m::REG_NAME_PTR), map::MEDIA_NAME_SCRATCH);
        self.bus.write32(self.media_reg(m::REG_SUBSONG), subsong);
        self.bus.write32(self.media_reg(m::REG_CTRL), m::OP_PLAY);
    }

    pub fn media_status(&self) -> (u32, u32) {
        use lumen_core::device::media as m;
        (
            self.bus.read32(self.media_reg(m::REG_STATUS)),
            self.bus.read32(self.media_reg(m::REG_ERROR)),
        )
    }

    fn media_reg(&self, offset: u32) -> u32 {
        map::MEDIA_BASE + offset
    }

    /// Spawn the render loops, the compositor and (for CPU modes) the
    /// executor thread. The program must already be loaded.
    pub fn start(&mut self, program: Option<LoadedProgram>) {
        // Per-device producer loops.
        for (chip, name) in [
            (Arc::clone(&self.video) as Arc<dyn FrameProducer>, "video"),
            (Arc::clone(&self.vga) as _, "vga"),
            (Arc::clone(&self.ula) as _, "ula"),
            (Arc::clone(&self.ted) as _, "ted"),
        ] {
            self.threads
                .push(spawn_render_loop(chip, Arc::clone(&self.running), name));
        }

        if let Some(compositor) = self.compositor.take() {
            self.threads.push(compositor.spawn(Arc::clone(&self.running)));
        }

        if let Some(mut cpu) = self.make_cpu(program) {
            let name = format!("cpu-{:?}", self.mode).to_lowercase();
            let running = Arc::clone(&self.running);
            let handle = std::thread::Builder::new()
                .name(name)
                .spawn(move || {
                    cpu.execute();
                    // A CPU halt (sentinel, STOP) takes the machine down.
                    running.store(false, Ordering::Relaxed);
                })
                .expect("spawn cpu thread");
            self.threads.push(handle);
        }
    }

    fn make_cpu(&self, program: Option<LoadedProgram>) -> Option<Box<dyn CpuCore>> {
        let entry = program.map(|p| p.entry);
        match self.mode {
            CpuMode::M68k => {
                let cpu = M68k::new(Arc::clone(&self.bus), Arc::clone(&self.running));
                Some(Box::new(cpu))
            }
            CpuMode::M6502 => {
                let mut cpu = M6502::new(
                    Arc::clone(&self.bus),
                    self.bank.clone(),
                    Arc::clone(&self.running),
                );
                cpu.reset();
                if let Some(e) = entry {
                    cpu.set_entry(e as u16);
                }
                Some(Box::new(cpu))
            }
            CpuMode::Z80 => {
                let mut cpu = Z80::new(
                    Arc::clone(&self.bus),
                    self.bank.clone(),
                    map::Z80_PORT_BASE,
                    Arc::clone(&self.running),
                );
                cpu.reset();
                if let Some(e) = entry {
                    cpu.set_entry(e as u16);
                }
                Some(Box::new(cpu))
            }
            CpuMode::Play => None,
        }
    }

    pub fn request_stop(&self) {
        self.running.store(false, Ordering::Relaxed);
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Relaxed)
    }

    /// Join every spawned thread; called after `request_stop`.
    pub fn join(&mut self) {
        for handle in self.threads.drain(..) {
            let _ = handle.join();
        }
    }
}
