//! Process-wide immutable lookup tables: synth waveform helpers and the
//! stock palettes of the video sources. Initialised once, never mutated.

use std::sync::LazyLock;

/// Entries in the sine table (one full period).
pub const SIN_TABLE_LEN: usize = 1024;

/// One period of sine scaled to ±1.0, indexed by phase / 2^32 * 1024.
pub static SIN_TABLE: LazyLock<[f32; SIN_TABLE_LEN]> = LazyLock::new(|| {
    let mut t = [0.0f32; SIN_TABLE_LEN];
    for (i, v) in t.iter_mut().enumerate() {
        *v = (i as f32 / SIN_TABLE_LEN as f32 * std::f32::consts::TAU).sin();
    }
    t
});

/// tanh over [-4, 4] for the "+" enhancement soft saturator.
pub const TANH_TABLE_LEN: usize = 512;
pub const TANH_TABLE_RANGE: f32 = 4.0;

pub static TANH_TABLE: LazyLock<[f32; TANH_TABLE_LEN]> = LazyLock::new(|| {
    let mut t = [0.0f32; TANH_TABLE_LEN];
    for (i, v) in t.iter_mut().enumerate() {
        let x = (i as f32 / (TANH_TABLE_LEN - 1) as f32 * 2.0 - 1.0) * TANH_TABLE_RANGE;
        *v = x.tanh();
    }
    t
});

/// Table-driven tanh; clamps outside ±[`TANH_TABLE_RANGE`].
pub fn soft_clip(x: f32) -> f32 {
    let n = (x / TANH_TABLE_RANGE).clamp(-1.0, 1.0);
    let idx = ((n + 1.0) * 0.5 * (TANH_TABLE_LEN - 1) as f32) as usize;
    TANH_TABLE[idx.min(TANH_TABLE_LEN - 1)]
}

/// Default palette of the base video chip: 256 RGBA entries, 3-3-2 spread
/// so an unconfigured palette still shows a usable colour ramp.
pub const BASE_PALETTE: [u32; 256] = {
    let mut p = [0u32; 256];
    let mut i = 0;
    while i < 256 {
        let r = (i >> 5 & 7) * 255 / 7;
        let g = (i >> 2 & 7) * 255 / 7;
        let b = (i & 3) * 255 / 3;
        p[i] = 0xFF00_0000 | (b as u32) << 16 | (g as u32) << 8 | r as u32;
        i += 1;
    }
    p
};

/// ZX-style ULA palette: 8 basic colours, then the same 8 at full
/// brightness. Layout is ABGR to match the RGBA8 byte order of frames.
pub const ULA_PALETTE: [u32; 16] = [
    0xFF000000, 0xFFC00000, 0xFF0000C0, 0xFFC000C0, // black, blue, red, magenta
    0xFF00C000, 0xFFC0C000, 0xFF00C0C0, 0xFFC0C0C0, // green, cyan, yellow, white
    0xFF000000, 0xFFFF0000, 0xFF0000FF, 0xFFFF00FF,
    0xFF00FF00, 0xFFFFFF00, 0xFF00FFFF, 0xFFFFFFFF,
];

/// TED-style palette: 16 hues × 8 luminance levels.
pub static TED_PALETTE: LazyLock<[u32; 128]> = LazyLock::new(|| {
    // Hue angles in degrees; hue 0 is grey, hue 1 unused black slot.
    const HUE_ANGLES: [f32; 16] = [
        -1.0, -2.0, 103.0, 283.0, 53.0, 241.0, 347.0, 167.0, 129.0, 148.0, 195.0, 83.0, 265.0,
        323.0, 23.0, 213.0,
    ];
    let mut pal = [0u32; 128];
    for lum in 0..8 {
        let y = 0.11 + lum as f32 * 0.127;
        for hue in 0..16 {
            let (u, v) = match HUE_ANGLES[hue] {
                a if a < -1.5 => (0.0, 0.0), // black
                a if a < -0.5 => (0.0, 0.0), // grey
                a => {
                    let rad = a.to_radians();
                    (0.19 * rad.cos(), 0.19 * rad.sin())
                }
            };
            let y = if HUE_ANGLES[hue] < -1.5 { 0.0 } else { y };
            let r = ((y + 1.140 * v) * 255.0).clamp(0.0, 255.0) as u32;
            let g = ((y - 0.396 * u - 0.581 * v) * 255.0).clamp(0.0, 255.0) as u32;
            let b = ((y + 2.029 * u) * 255.0).clamp(0.0, 255.0) as u32;
            pal[lum * 16 + hue] = 0xFF00_0000 | b << 16 | g << 8 | r;
        }
    }
    pal
});

/// VGA DAC power-on palette: 6-bit-per-channel EGA-compatible first 64
/// entries, then a grey ramp; guests normally overwrite it via the DAC
/// ports.
pub const VGA_PALETTE: [u32; 256] = {
    let mut p = [0u32; 256];
    let mut i = 0;
    while i < 64 {
        let r = ((i >> 2 & 1) * 0xAA + (i >> 5 & 1) * 0x55) as u32;
        let g = ((i >> 1 & 1) * 0xAA + (i >> 4 & 1) * 0x55) as u32;
        let b = ((i & 1) * 0xAA + (i >> 3 & 1) * 0x55) as u32;
        p[i] = 0xFF00_0000 | b << 16 | g << 8 | r;
        i += 1;
    }
    while i < 256 {
        let v = ((i - 64) * 255 / 191) as u32;
        p[i] = 0xFF00_0000 | v << 16 | v << 8 | v;
        i += 1;
    }
    p
};
