//! SID-class synthesiser engine: three voices with multi-waveform
//! oscillators, ADSR envelopes, oscillator sync and ring modulation, and a
//! simplified state-variable filter.
//!
//! Oscillators are 24-bit phase accumulators clocked at the chip clock
//! (985248 Hz PAL or 1022727 Hz NTSC); the engine advances them in chip
//! cycles accumulated per host sample. The filter is a two-integrator
//! state-variable loop, which reproduces the low/band/high routing without
//! attempting the analogue curve of any particular chip revision.
//!
//! # Registers (per voice v at v*7)
//!
//! | Reg | Description                                  |
//! |-----|----------------------------------------------|
//! | 0-1 | Frequency, low then high                     |
//! | 2-3 | Pulse width, low then high (12 bits)         |
//! | 4   | Control: GATE/SYNC/RING/TEST/TRI/SAW/PUL/NOI |
//! | 5   | Attack (hi nibble) / Decay (lo nibble)       |
//! | 6   | Sustain (hi nibble) / Release (lo nibble)    |
//!
//! Globals: 0x15-0x16 filter cutoff, 0x17 resonance/routing, 0x18 volume
//! and filter mode.

use crate::audio::{Enhancer, HOST_SAMPLE_RATE, SampleTicker, SynthEngine};

pub const CLOCK_PAL: u32 = 985_248;
pub const CLOCK_NTSC: u32 = 1_022_727;

const CTRL_GATE: u8 = 0x01;
const CTRL_SYNC: u8 = 0x02;
const CTRL_RING: u8 = 0x04;
const CTRL_TEST: u8 = 0x08;
const CTRL_TRI: u8 = 0x10;
const CTRL_SAW: u8 = 0x20;
const CTRL_PULSE: u8 = 0x40;
const CTRL_NOISE: u8 = 0x80;

/// Attack rates in ms per full envelope sweep, per the classic table.
const ATTACK_MS: [f32; 16] = [
    2.0, 8.0, 16.0, 24.0, 38.0, 56.0, 68.0, 80.0, 100.0, 250.0, 500.0, 800.0, 1000.0, 3000.0,
    5000.0, 8000.0,
];

/// Decay/release sweeps are three times slower than attack.
const DECAY_SCALE: f32 = 3.0;

#[derive(Clone, Copy, PartialEq)]
enum EnvPhase {
    Attack,
    DecaySustain,
    Release,
}

struct Voice {
    freq: u16,
    pulse_width: u16,
    control: u8,
    attack_decay: u8,
    sustain_release: u8,

    phase: u32, // 24-bit accumulator
    noise_lfsr: u32,
    env_phase: EnvPhase,
    env_level: f32, // 0..1
}

impl Voice {
    fn new() -> Self {
        Self {
            freq: 0,
            pulse_width: 0,
            control: 0,
            attack_decay: 0,
            sustain_release: 0,
            phase: 0,
            noise_lfsr: 0x7F_FFF8,
            env_phase: EnvPhase::Release,
            env_level: 0.0,
        }
    }

    /// Advance the oscillator by `cycles` chip cycles; returns true when
    /// the accumulator wrapped (sync source for the next voice).
    fn step_osc(&mut self, cycles: u32, hard_sync: bool) -> bool {
        if self.control & CTRL_TEST != 0 {
            self.phase = 0;
            return false;
        }
        if hard_sync {
            self.phase = 0;
        }
        let before = self.phase;
        self.phase = self.phase.wrapping_add(self.freq as u32 * cycles) & 0x00FF_FFFF;
        let wrapped = self.phase < before;
        if wrapped && self.control & CTRL_NOISE != 0 {
            // 23-bit LFSR, taps 22 and 17.
            let bit = (self.noise_lfsr >> 22 ^ self.noise_lfsr >> 17) & 1;
            self.noise_lfsr = (self.noise_lfsr << 1 | bit) & 0x7F_FFFF;
        }
        wrapped
    }

    /// Waveform output in [-1, 1]. `ring_phase` is the previous voice's
    /// oscillator, used by ring modulation on the triangle.
    fn waveform(&self, ring_phase: u32) -> f32 {
        let mut acc: Option<u16> = None; // 12-bit sample
        let mut mix = |v: u16, acc: &mut Option<u16>| {
            // Combined waveforms AND together, like the real bus fight.
            *acc = Some(match *acc {
                Some(a) => a & v,
                None => v,
            });
        };
        if self.control & CTRL_TRI != 0 {
            let mut p = self.phase;
            if self.control & CTRL_RING != 0 {
                p ^= ring_phase & 0x80_0000;
            }
            let tri = if p & 0x80_0000 != 0 { !p } else { p };
            mix((tri >> 11) as u16 & 0xFFF, &mut acc);
        }
        if self.control & CTRL_SAW != 0 {
            mix((self.phase >> 12) as u16, &mut acc);
        }
        if self.control & CTRL_PULSE != 0 {
            let high = (self.phase >> 12) as u16 >= self.pulse_width & 0xFFF;
            mix(if high { 0xFFF } else { 0 }, &mut acc);
        }
        if self.control & CTRL_NOISE != 0 {
            // Spread 8 LFSR taps across the 12-bit range.
            mix(((self.noise_lfsr >> 11) as u16) & 0xFFF, &mut acc);
        }
        match acc {
            Some(v) => v as f32 / 2047.5 - 1.0,
            None => 0.0,
        }
    }

    fn gate(&mut self, on: bool) {
        self.env_phase = if on { EnvPhase::Attack } else { EnvPhase::Release };
    }

    fn step_env(&mut self, dt: f32) {
        let ad = self.attack_decay;
        let sr = self.sustain_release;
        match self.env_phase {
            EnvPhase::Attack => {
                let rate = 1.0 / (ATTACK_MS[(ad >> 4) as usize] / 1000.0);
                self.env_level += rate * dt;
                if self.env_level >= 1.0 {
                    self.env_level = 1.0;
                    self.env_phase = EnvPhase::DecaySustain;
                }
            }
            EnvPhase::DecaySustain => {
                let sustain = (sr >> 4) as f32 / 15.0;
                if self.env_level > sustain {
                    let rate = 1.0 / (ATTACK_MS[(ad & 0xF) as usize] * DECAY_SCALE / 1000.0);
                    self.env_level = (self.env_level - rate * dt).max(sustain);
                }
            }
            EnvPhase::Release => {
                let rate = 1.0 / (ATTACK_MS[(sr & 0xF) as usize] * DECAY_SCALE / 1000.0);
                self.env_level = (self.env_level - rate * dt).max(0.0);
            }
        }
    }
}

pub struct Sid {
    regs: [u8; 0x20],
    voices: [Voice; 3],
    clock: u32,
    cycle_acc: f32,
    // State-variable filter integrators.
    filt_low: f32,
    filt_band: f32,
    enhancer: Enhancer,
}

impl Sid {
    pub fn new() -> Self {
        Self {
            regs: [0; 0x20],
            voices: [Voice::new(), Voice::new(), Voice::new()],
            clock: CLOCK_PAL,
            cycle_acc: 0.0,
            filt_low: 0.0,
            filt_band: 0.0,
            enhancer: Enhancer::new(),
        }
    }

    pub fn set_clock(&mut self, hz: u32) {
        self.clock = hz;
    }

    fn raw_tick(&mut self) -> (f32, f32) {
        let rate = HOST_SAMPLE_RATE * self.enhancer.oversample();
        let dt = 1.0 / rate as f32;
        self.cycle_acc += self.clock as f32 * dt;
        let cycles = self.cycle_acc as u32;
        self.cycle_acc -= cycles as f32;

        // Oscillators: voice v hard-syncs from voice (v + 2) % 3.
        let mut wrapped = [false; 3];
        for v in 0..3 {
            let sync_src = (v + 2) % 3;
            let hard = self.voices[v].control & CTRL_SYNC != 0 && wrapped[sync_src];
            wrapped[v] = self.voices[v].step_osc(cycles, hard);
        }

        let mut dry = 0.0;
        let mut filtered = 0.0;
        let filt_route = self.regs[0x17];
        for v in 0..3 {
            let ring_src = (v + 2) % 3;
            let ring_phase = self.voices[ring_src].phase;
            self.voices[v].step_env(dt);
            let s = self.voices[v].waveform(ring_phase) * self.voices[v].env_level;
            if filt_route >> v & 1 != 0 {
                filtered += s;
            } else {
                dry += s;
            }
        }

        // State-variable filter.
        let cutoff = (self.regs[0x15] as u32 & 7 | (self.regs[0x16] as u32) << 3) as f32 / 2047.0;
        let f = (cutoff * 1.2 + 0.02).min(1.0);
        let q = 1.0 - (filt_route >> 4) as f32 / 22.0;
        self.filt_low += f * self.filt_band;
        let high = filtered - self.filt_low - q * self.filt_band;
        self.filt_band += f * high;

        let mode = self.regs[0x18];
        let mut filt_out = 0.0;
        if mode & 0x10 != 0 {
            filt_out += self.filt_low;
        }
        if mode & 0x20 != 0 {
            filt_out += self.filt_band;
        }
        if mode & 0x40 != 0 {
            filt_out += high;
        }
        if mode & 0x70 == 0 {
            // No filter mode selected: pass the routed voices dry.
            filt_out = filtered;
        }

        let volume = (mode & 0x0F) as f32 / 15.0;
        let out = (dry + filt_out) / 3.0 * volume;
        (out, out)
    }
}

impl SampleTicker for Sid {
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

impl SynthEngine for Sid {
    fn write_reg(&mut self, reg: u8, val: u8) {
        if reg as usize >= self.regs.len() {
            return;
        }
        self.regs[reg as usize] = val;
        if reg < 21 {
            let v = &mut self.voices[reg as usize / 7];
            match reg % 7 {
                0 => v.freq = v.freq & 0xFF00 | val as u16,
                1 => v.freq = v.freq & 0x00FF | (val as u16) << 8,
                2 => v.pulse_width = v.pulse_width & 0x0F00 | val as u16,
                3 => v.pulse_width = v.pulse_width & 0x00FF | (val as u16 & 0x0F) << 8,
                4 => {
                    let was_gated = v.control & CTRL_GATE != 0;
                    let gated = val & CTRL_GATE != 0;
                    v.control = val;
                    if gated != was_gated {
                        v.gate(gated);
                    }
                }
                5 => v.attack_decay = val,
                _ => v.sustain_release = val,
            }
        }
    }

    fn read_reg(&self, reg: u8) -> u8 {
        match reg {
            // OSC3 and ENV3 taps.
            0x1B => (self.voices[2].phase >> 16) as u8,
            0x1C => (self.voices[2].env_level * 255.0) as u8,
            _ => self.regs.get(reg as usize).copied().unwrap_or(0),
        }
    }

    fn reset(&mut self) {
        let clock = self.clock;
        let enhanced = self.enhancer.enabled();
        *self = Self::new();
        self.clock = clock;
        self.enhancer.set_enabled(enhanced);
    }

    fn set_enhanced(&mut self, on: bool) {
        self.enhancer.set_enabled(on);
    }

    fn name(&self) -> &'static str {
        "sid"
    }
}

impl Default for Sid {
    fn default() -> Self {
        Self::new()
    }
}
