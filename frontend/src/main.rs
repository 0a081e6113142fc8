use std::path::PathBuf;
use std::sync::atomic::Ordering;
use std::time::Duration;

use clap::Parser;
use lumen_core::audio::HOST_SAMPLE_RATE;
use lumen_core::device::media;
use lumen_machine::{registry, system::CpuMode, System, SystemConfig};
use sdl2::event::Event;
use sdl2::keyboard::Keycode;

mod audio;
mod config;
mod input;
mod video;

/// Fantasy microcomputer VM: multi-ISA cores, blitter, copper, chip synths.
#[derive(Parser, Debug)]
#[command(name = "lumen", version)]
struct Cli {
    /// Program image (.iex/.ie68/.ie80/.ie65/.bin) or media file to play.
    path: Option<PathBuf>,

    /// Machine mode; inferred from the file suffix when omitted.
    #[arg(long)]
    mode: Option<String>,

    /// Load address override (hex accepted with 0x prefix).
    #[arg(long, value_parser = parse_u32)]
    load_addr: Option<u32>,

    /// Entry point override.
    #[arg(long, value_parser = parse_u32)]
    entry: Option<u32>,

    /// PSG "+" enhancement (oversampling, low-pass, saturation).
    #[arg(long = "psg-plus")]
    psg_plus: bool,

    #[arg(long = "sid-plus")]
    sid_plus: bool,

    #[arg(long = "pokey-plus")]
    pokey_plus: bool,

    #[arg(long = "ted-plus")]
    ted_plus: bool,

    /// Force SID PAL timing (the default).
    #[arg(long)]
    sid_pal: bool,

    /// Force SID NTSC timing.
    #[arg(long)]
    sid_ntsc: bool,

    /// Sub-song index for media playback.
    #[arg(long, default_value_t = 0)]
    subsong: u32,

    /// Window scale factor.
    #[arg(long)]
    scale: Option<u32>,

    /// Sandbox directory for the media loader.
    #[arg(long)]
    media_dir: Option<PathBuf>,

    /// Sandbox directory for the file gateway.
    #[arg(long)]
    file_dir: Option<PathBuf>,
}

fn parse_u32(s: &str) -> Result<u32, String> {
    let parsed = if let Some(hex) = s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
        u32::from_str_radix(hex, 16)
    } else {
        s.parse()
    };
    parsed.map_err(|e| e.to_string())
}

/// Media suffixes the player mode accepts.
fn is_media_path(path: &PathBuf) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .and_then(media::MediaKind::from_extension)
        .is_some()
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let cli = Cli::parse();
    std::process::exit(match run(cli) {
        Ok(()) => 0,
        Err(e) => {
            eprintln!("lumen: {e}");
            1
        }
    });
}

fn run(cli: Cli) -> Result<(), String> {
    let file_cfg = config::load();

    // Resolve the mode: explicit flag, else the file suffix decides.
    let mode = match &cli.mode {
        Some(name) => {
            let entry = registry::find(name).ok_or_else(|| {
                let names: Vec<_> = registry::all().iter().map(|e| e.name).collect();
                format!("unknown mode {name:?}; available: {}", names.join(", "))
            })?;
            entry.mode
        }
        None => match &cli.path {
            Some(p) if is_media_path(p) => CpuMode::Play,
            Some(p) => lumen_machine::Container::from_path(p)
                .map(|c| c.cpu_mode())
                .ok_or_else(|| format!("cannot infer mode from {}", p.display()))?,
            None => return Err("no program given; see --help".into()),
        },
    };

    let media_dir = cli
        .media_dir
        .clone()
        .or(file_cfg.media_dir)
        .unwrap_or_else(|| PathBuf::from("."));
    let sid_clock = if cli.sid_ntsc {
        lumen_core::device::sid::CLOCK_NTSC
    } else {
        lumen_core::device::sid::CLOCK_PAL
    };

    let mut system = System::build(SystemConfig {
        mode,
        load_addr: cli.load_addr,
        entry: cli.entry,
        psg_plus: cli.psg_plus,
        sid_plus: cli.sid_plus,
        pokey_plus: cli.pokey_plus,
        ted_plus: cli.ted_plus,
        sid_clock,
        media_dir: media_dir.clone(),
        file_dir: cli
            .file_dir
            .clone()
            .or(file_cfg.file_dir)
            .unwrap_or_else(|| PathBuf::from(".")),
        charset: None,
    })
    .map_err(|e| e.to_string())?;

    // Load the program for CPU modes; queue the track for player mode.
    let program = match mode {
        CpuMode::Play => None,
        _ => {
            let path = cli.path.as_ref().ok_or("no program given")?;
            Some(system.load_program(path).map_err(|e| e.to_string())?)
        }
    };

    // --- Host backends ---
    let sdl = sdl2::init()?;
    let sdl_video = sdl.video()?;
    let sdl_audio = sdl.audio()?;
    let scale = cli.scale.or(file_cfg.scale).unwrap_or(1).max(1);
    let title = format!("Lumen ({:?})", mode);
    let mut video = video::Video::new(&sdl_video, &title, 640, 480, scale);
    let (device, fade_out) = audio::init(&sdl_audio, system.mixer.clone(), HOST_SAMPLE_RATE)?;
    device.resume();

    let output = system.output();
    system.start(program);

    if mode == CpuMode::Play {
        let path = cli.path.as_ref().ok_or("no media file given")?;
        let name = path
            .strip_prefix(&media_dir)
            .unwrap_or(path)
            .to_string_lossy()
            .into_owned();
        system.play_media(&name, cli.subsong);
    }

    // --- Main loop: events in, frames out ---
    let mut event_pump = sdl.event_pump()?;
    'main: loop {
        for event in event_pump.poll_iter() {
            match event {
                Event::Quit { .. }
                | Event::KeyDown {
                    keycode: Some(Keycode::Escape),
                    ..
                } => break 'main,
                other => {
                    input::route_event(&system.terminal, &other);
                }
            }
        }

        if !system.is_running() {
            break;
        }
        if mode == CpuMode::Play {
            let (status, error) = system.media_status();
            if status == media::STATUS_ERROR {
                fade_and_stop(&mut system, &fade_out);
                return Err(format!("media load failed (error {error})"));
            }
            if status == media::STATUS_IDLE {
                log::info!("playback finished");
                break;
            }
        }

        video.present(output.acquire());
        // present_vsync paces the loop at the display rate.
    }

    fade_and_stop(&mut system, &fade_out);
    Ok(())
}

fn fade_and_stop(system: &mut System, fade_out: &audio::FadeOut) {
    fade_out.store(true, Ordering::Relaxed);
    std::thread::sleep(audio::fade_out_duration());
    system.request_stop();
    system.join();
    std::thread::sleep(Duration::from_millis(1));
}
