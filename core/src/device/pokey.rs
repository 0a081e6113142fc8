//! POKEY-class synthesiser engine.
//!
//! Four channels clocked from polynomial-counter noise and square-wave
//! dividers. The core steps at the 1.79 MHz master clock, accumulated per
//! host sample; distortion gating, 16-bit channel linking and the
//! high-pass pairs follow the historical chip behaviour.
//!
//! # Registers
//!
//! | Reg  | Name   | Description                                      |
//! |------|--------|--------------------------------------------------|
//! | 0,2,4,6 | AUDF1-4 | Frequency divider reload (period = N+1)     |
//! | 1,3,5,7 | AUDC1-4 | Distortion (bits 7:5), volume-only (bit 4), |
//! |      |        | volume (bits 3:0)                                |
//! | 8    | AUDCTL | Master control (poly select, clocks, linking,    |
//! |      |        | high-pass)                                       |
//! | 9    | STIMER | Reset the channel dividers                       |

use crate::audio::{Enhancer, HOST_SAMPLE_RATE, SampleTicker, SynthEngine};

/// NTSC master clock, the rate POKEY music was authored against.
pub const MASTER_CLOCK: u32 = 1_789_773;

const AUDCTL_POLY9: u8 = 0x80;
const AUDCTL_CH1_FAST: u8 = 0x40;
const AUDCTL_CH3_FAST: u8 = 0x20;
const AUDCTL_CH12_LINK: u8 = 0x10;
const AUDCTL_CH34_LINK: u8 = 0x08;
const AUDCTL_HPF_CH1: u8 = 0x04;
const AUDCTL_HPF_CH2: u8 = 0x02;
const AUDCTL_CLOCK_15K: u8 = 0x01;

const AUDC_VOL_ONLY: u8 = 0x10;

pub struct Pokey {
    audf: [u8; 4],
    audc: [u8; 4],
    audctl: u8,

    divider: [u32; 4],
    channel_out: [bool; 4],
    hp_ff: [bool; 2],

    poly4: u8,
    poly5: u8,
    poly9: u16,
    poly17: u32,

    base_div28: u8,
    base_div114: u8,

    cycle_acc: f32,
    enhancer: Enhancer,
}

impl Pokey {
    pub fn new() -> Self {
        Self {
            audf: [0; 4],
            audc: [0; 4],
            audctl: 0,
            divider: [1; 4],
            channel_out: [false; 4],
            hp_ff: [false; 2],
            poly4: 0x0F,
            poly5: 0x1F,
            poly9: 0x1FF,
            poly17: 0x1FFFF,
            base_div28: 28,
            base_div114: 114,
            cycle_acc: 0.0,
            enhancer: Enhancer::new(),
        }
    }

    fn step_polys(&mut self) {
        let b4 = (self.poly4 >> 2 ^ self.poly4 >> 3) & 1;
        self.poly4 = (self.poly4 << 1 | b4) & 0x0F;
        let b5 = (self.poly5 >> 2 ^ self.poly5 >> 4) & 1;
        self.poly5 = (self.poly5 << 1 | b5) & 0x1F;
        let b9 = (self.poly9 >> 4 ^ self.poly9 >> 8) as u8 & 1;
        self.poly9 = (self.poly9 << 1 | b9 as u16) & 0x1FF;
        let b17 = (self.poly17 >> 11 ^ self.poly17 >> 16) & 1;
        self.poly17 = (self.poly17 << 1 | b17) & 0x1_FFFF;
    }

    fn reload(&self, ch: usize) -> u32 {
        let linked_hi = (ch == 1 && self.audctl & AUDCTL_CH12_LINK != 0)
            || (ch == 3 && self.audctl & AUDCTL_CH34_LINK != 0);
        if linked_hi {
            // 16-bit reload from the channel pair.
            (self.audf[ch] as u32) << 8 | self.audf[ch - 1] as u32
        } else {
            self.audf[ch] as u32
        }
    }

    /// Distortion handling on a divider underflow. The 3-bit AUDC field
    /// selects whether the 5-bit poly gates the event and whether the
    /// output flip-flop toggles (pure tone) or samples a polynomial.
    fn gate_channel(&mut self, ch: usize) {
        let dist = self.audc[ch] >> 5;
        if dist & 0b100 == 0 && self.poly5 & 1 == 0 {
            // 5-bit poly swallowed this underflow.
            return;
        }
        self.channel_out[ch] = match dist & 0b011 {
            0b00 => {
                if self.audctl & AUDCTL_POLY9 != 0 {
                    self.poly9 & 1 != 0
                } else {
                    self.poly17 & 1 != 0
                }
            }
            0b10 => self.poly4 & 1 != 0,
            _ => !self.channel_out[ch],
        };
    }

    /// One master-clock cycle.
    fn step_cycle(&mut self) {
        self.step_polys();

        let tick_64k = {
            self.base_div28 -= 1;
            if self.base_div28 == 0 {
                self.base_div28 = 28;
                true
            } else {
                false
            }
        };
        let tick_15k = {
            self.base_div114 -= 1;
            if self.base_div114 == 0 {
                self.base_div114 = 114;
                true
            } else {
                false
            }
        };
        let base_tick = if self.audctl & AUDCTL_CLOCK_15K != 0 { tick_15k } else { tick_64k };

        for ch in 0..4 {
            let fast = (ch == 0 && self.audctl & AUDCTL_CH1_FAST != 0)
                || (ch == 2 && self.audctl & AUDCTL_CH3_FAST != 0);
            let linked_lo = (ch == 0 && self.audctl & AUDCTL_CH12_LINK != 0)
                || (ch == 2 && self.audctl & AUDCTL_CH34_LINK != 0);
            let clocked = if fast {
                true
            } else if linked_lo {
                // The low half of a linked pair free-runs on the fast clock
                // to provide the carry for the high half.
                true
            } else {
                base_tick
            };
            if !clocked {
                continue;
            }
            self.divider[ch] = self.divider[ch].saturating_sub(1);
            if self.divider[ch] == 0 {
                self.divider[ch] = self.reload(ch) + 1;
                self.gate_channel(ch);

                // High-pass flip-flops clock from the partner channel.
                if ch == 2 && self.audctl & AUDCTL_HPF_CH1 != 0 {
                    self.hp_ff[0] = self.channel_out[0];
                }
                if ch == 3 && self.audctl & AUDCTL_HPF_CH2 != 0 {
                    self.hp_ff[1] = self.channel_out[1];
                }
            }
        }
    }

    fn mix(&self) -> f32 {
        let mut sum = 0.0;
        for ch in 0..4 {
            let vol = (self.audc[ch] & 0x0F) as f32 / 15.0;
            let level = if self.audc[ch] & AUDC_VOL_ONLY != 0 {
                true
            } else {
                let mut out = self.channel_out[ch];
                if ch == 0 && self.audctl & AUDCTL_HPF_CH1 != 0 {
                    out ^= self.hp_ff[0];
                }
                if ch == 1 && self.audctl & AUDCTL_HPF_CH2 != 0 {
                    out ^= self.hp_ff[1];
                }
                out
            };
            if level {
                sum += vol;
            }
        }
        sum / 4.0
    }

    fn raw_tick(&mut self) -> (f32, f32) {
        let rate = HOST_SAMPLE_RATE * self.enhancer.oversample();
        self.cycle_acc += MASTER_CLOCK as f32 / rate as f32;
        let cycles = self.cycle_acc as u32;
        self.cycle_acc -= cycles as f32;
        let mut acc = 0.0;
        for _ in 0..cycles {
            self.step_cycle();
            acc += self.mix();
        }
        let s = if cycles > 0 { acc / cycles as f32 } else { self.mix() };
        (s, s)
    }
}

impl SampleTicker for Pokey {
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

impl SynthEngine for Pokey {
    fn write_reg(&mut self, reg: u8, val: u8) {
        match reg {
            0 | 2 | 4 | 6 => self.audf[reg as usize / 2] = val,
            1 | 3 | 5 | 7 => self.audc[reg as usize / 2] = val,
            8 => self.audctl = val,
            9 => {
                // STIMER: restart all dividers from their reload values.
                for ch in 0..4 {
                    self.divider[ch] = self.reload(ch) + 1;
                }
            }
            _ => {}
        }
    }

    fn read_reg(&self, reg: u8) -> u8 {
        match reg {
            0 | 2 | 4 | 6 => self.audf[reg as usize / 2],
            1 | 3 | 5 | 7 => self.audc[reg as usize / 2],
            8 => self.audctl,
            0x0A => self.poly9 as u8, // RANDOM tap
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
        "pokey"
    }
}

impl Default for Pokey {
    fn default() -> Self {
        Self::new()
    }
}
