//! AHX-class wavetable synthesiser engine.
//!
//! Four Paula-style voices stepping through 64-entry waveform tables
//! (triangle, sawtooth, variable-width square, noise) at
//! `PAULA_CLOCK / period` samples per second, with 6-bit volumes and
//! hard stereo pairing (voices 0/3 left, 1/2 right) softened by a small
//! cross-feed.
//!
//! # Registers (per voice v at v*5)
//!
//! | Reg | Description                                   |
//! |-----|-----------------------------------------------|
//! | 0-1 | Period, low then high (Amiga period units)    |
//! | 2   | Volume (0-64)                                 |
//! | 3   | Waveform: 0 tri, 1 saw, 2 square, 3 noise     |
//! | 4   | Square width (1-63)                           |
//!
//! Global: 0x14 master volume (0-64), closing the 21-byte block.

use std::sync::LazyLock;

use crate::audio::{Enhancer, HOST_SAMPLE_RATE, SampleTicker, SynthEngine};

/// PAL Paula clock; period N plays at CLOCK / N Hz.
pub const PAULA_CLOCK: u32 = 3_546_895;

const WAVE_LEN: usize = 64;

pub const WAVE_TRIANGLE: u8 = 0;
pub const WAVE_SAWTOOTH: u8 = 1;
pub const WAVE_SQUARE: u8 = 2;
pub const WAVE_NOISE: u8 = 3;

static TRIANGLE: LazyLock<[f32; WAVE_LEN]> = LazyLock::new(|| {
    let mut t = [0.0; WAVE_LEN];
    for (i, v) in t.iter_mut().enumerate() {
        let phase = i as f32 / WAVE_LEN as f32;
        *v = if phase < 0.5 { phase * 4.0 - 1.0 } else { 3.0 - phase * 4.0 };
    }
    t
});

static SAWTOOTH: LazyLock<[f32; WAVE_LEN]> = LazyLock::new(|| {
    let mut t = [0.0; WAVE_LEN];
    for (i, v) in t.iter_mut().enumerate() {
        *v = i as f32 / WAVE_LEN as f32 * 2.0 - 1.0;
    }
    t
});

struct Voice {
    period: u16,
    volume: u8,
    waveform: u8,
    square_width: u8,
    phase: f32,
    noise_lfsr: u32,
    noise_level: f32,
}

impl Voice {
    fn new() -> Self {
        Self {
            period: 0,
            volume: 0,
            waveform: WAVE_TRIANGLE,
            square_width: 32,
            phase: 0.0,
            noise_lfsr: 0x1234_5678,
            noise_level: 0.0,
        }
    }

    fn sample(&mut self, host_rate: u32) -> f32 {
        if self.period == 0 || self.volume == 0 {
            return 0.0;
        }
        let freq = PAULA_CLOCK as f32 / self.period as f32;
        let step = freq / host_rate as f32 / WAVE_LEN as f32;
        self.phase += step;
        while self.phase >= 1.0 {
            self.phase -= 1.0;
            if self.waveform == WAVE_NOISE {
                let bit = (self.noise_lfsr >> 22 ^ self.noise_lfsr >> 17) & 1;
                self.noise_lfsr = (self.noise_lfsr << 1 | bit) & 0x7F_FFFF;
                self.noise_level = (self.noise_lfsr & 0xFF) as f32 / 127.5 - 1.0;
            }
        }
        let idx = (self.phase * WAVE_LEN as f32) as usize % WAVE_LEN;
        let raw = match self.waveform {
            WAVE_TRIANGLE => TRIANGLE[idx],
            WAVE_SAWTOOTH => SAWTOOTH[idx],
            WAVE_SQUARE => {
                if idx < self.square_width.clamp(1, 63) as usize {
                    1.0
                } else {
                    -1.0
                }
            }
            _ => self.noise_level,
        };
        raw * self.volume.min(64) as f32 / 64.0
    }
}

pub struct Ahx {
    voices: [Voice; 4],
    master: u8,
    enhancer: Enhancer,
}

impl Ahx {
    pub fn new() -> Self {
        Self {
            voices: [Voice::new(), Voice::new(), Voice::new(), Voice::new()],
            master: 64,
            enhancer: Enhancer::new(),
        }
    }

    fn raw_tick(&mut self) -> (f32, f32) {
        let rate = HOST_SAMPLE_RATE * self.enhancer.oversample();
        let s: [f32; 4] = std::array::from_fn(|v| self.voices[v].sample(rate));
        let master = self.master.min(64) as f32 / 64.0;
        // Amiga channel pairing with cross-feed.
        let left = (s[0] + s[3]) * 0.75 + (s[1] + s[2]) * 0.25;
        let right = (s[1] + s[2]) * 0.75 + (s[0] + s[3]) * 0.25;
        (left * master * 0.4, right * master * 0.4)
    }
}

impl SampleTicker for Ahx {
    fn tick_one_sample(&mut self) -> (f32, f32) {
        let n = self.enhancer.oversample();
        let mut l = 0.0;
        let mut r = 0.0;
        for _ in 0..n {
            let s = self.raw_tick();
            l += s.0;
            r += s.1;
        }
        self.enhancer.finish(l / n as f32, r / n as f32)
    }
}

impl SynthEngine for Ahx {
    fn write_reg(&mut self, reg: u8, val: u8) {
        if reg == 0x14 {
            self.master = val;
            return;
        }
        let (voice, field) = (reg as usize / 5, reg % 5);
        let Some(v) = self.voices.get_mut(voice) else {
            return;
        };
        match field {
            0 => v.period = v.period & 0xFF00 | val as u16,
            1 => v.period = v.period & 0x00FF | (val as u16) << 8,
            2 => v.volume = val,
            3 => v.waveform = val & 3,
            4 => v.square_width = val & 0x3F,
            _ => {}
        }
    }

    fn read_reg(&self, reg: u8) -> u8 {
        if reg == 0x14 {
            return self.master;
        }
        let (voice, field) = (reg as usize / 5, reg % 5);
        let Some(v) = self.voices.get(voice) else {
            return 0;
        };
        match field {
            0 => v.period as u8,
            1 => (v.period >> 8) as u8,
            2 => v.volume,
            3 => v.waveform,
            4 => v.square_width,
            _ => 0,
        }
    }

    fn reset(&mut self) {
        let enhanced = self.enhancer.enabled();
        *self = Self::new();
        self.enhancer.set_enabled(enhanced);
    }

    fn set_enhanced(&mut self, on: bool) {
        self.enhancer.set_enabled(on);
    }

    fn name(&self) -> &'static str {
        "ahx"
    }
}

impl Default for Ahx {
    fn default() -> Self {
        Self::new()
    }
}
