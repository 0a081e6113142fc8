use lumen_core::audio::{SampleTicker, SynthEngine};
use lumen_core::device::ahx::Ahx;
use lumen_core::device::pokey::Pokey;
use lumen_core::device::psg::Psg;
use lumen_core::device::sid::Sid;
use lumen_core::device::ted_audio::TedAudio;

fn peak(engine: &mut dyn SynthEngine, samples: usize) -> f32 {
    let mut peak = 0.0f32;
    for _ in 0..samples {
        let (l, r) = engine.tick_one_sample();
        peak = peak.max(l.abs()).max(r.abs());
    }
    peak
}

#[test]
fn test_psg_tone_produces_output() {
    let mut psg = Psg::new();
    psg.write_reg(0, 0xFE); // channel A period
    psg.write_reg(1, 0x00);
    psg.write_reg(7, 0x3E); // tone A enabled, everything else off
    psg.write_reg(8, 15); // full volume
    assert!(peak(&mut psg, 4096) > 0.1);
}

#[test]
fn test_psg_silent_at_volume_zero() {
    let mut psg = Psg::new();
    psg.write_reg(0, 0xFE);
    psg.write_reg(7, 0x3E);
    psg.write_reg(8, 0);
    assert_eq!(peak(&mut psg, 4096), 0.0);
}

#[test]
fn test_psg_envelope_decays() {
    let mut psg = Psg::new();
    psg.write_reg(7, 0x3E);
    psg.write_reg(8, 0x10); // envelope-driven volume
    psg.write_reg(0, 0x40);
    psg.write_reg(11, 0x10); // short envelope period
    psg.write_reg(13, 0x00); // one-shot decay
    let early = peak(&mut psg, 256);
    // Run long enough for the decay shape to finish.
    let _ = peak(&mut psg, 44_100);
    let late = peak(&mut psg, 4096);
    assert!(early > 0.0);
    assert_eq!(late, 0.0, "one-shot envelope ends at level 0");
}

#[test]
fn test_psg_reset_keeps_clock_and_enhancement() {
    let mut psg = Psg::new();
    psg.set_clock(2_000_000);
    psg.set_enhanced(true);
    psg.write_reg(8, 15);
    psg.reset();
    assert_eq!(psg.read_reg(8), 0, "registers cleared");
}

#[test]
fn test_sid_gate_starts_and_releases_sound() {
    let mut sid = Sid::new();
    sid.write_reg(0x18, 0x0F); // master volume
    sid.write_reg(0, 0x00); // voice 0 frequency
    sid.write_reg(1, 0x20);
    sid.write_reg(5, 0x00); // instant attack
    sid.write_reg(6, 0xF0); // full sustain
    sid.write_reg(4, 0x21); // sawtooth + gate
    assert!(peak(&mut sid, 8192) > 0.01);

    sid.write_reg(4, 0x20); // gate off
    let _ = peak(&mut sid, 44_100);
    assert!(peak(&mut sid, 2048) < 0.01, "release ramps to silence");
}

#[test]
fn test_sid_osc3_tap_advances() {
    let mut sid = Sid::new();
    sid.write_reg(14, 0x00);
    sid.write_reg(15, 0x40); // voice 2 frequency
    let before = sid.read_reg(0x1B);
    for _ in 0..512 {
        sid.tick_one_sample();
    }
    assert_ne!(sid.read_reg(0x1B), before);
}

#[test]
fn test_pokey_volume_only_is_dc() {
    let mut pokey = Pokey::new();
    pokey.write_reg(1, 0x1F); // volume-only, level 15
    let (l, r) = pokey.tick_one_sample();
    assert!((l - 0.25).abs() < 0.01);
    assert_eq!(l, r);
}

#[test]
fn test_pokey_pure_tone_oscillates() {
    let mut pokey = Pokey::new();
    pokey.write_reg(0, 0x20); // AUDF1
    pokey.write_reg(1, 0xAF); // pure tone (dist 5), volume 15
    let mut seen_low = false;
    let mut seen_high = false;
    for _ in 0..8192 {
        let (l, _) = pokey.tick_one_sample();
        if l < 0.05 {
            seen_low = true;
        }
        if l > 0.15 {
            seen_high = true;
        }
    }
    assert!(seen_low && seen_high, "square wave toggles");
}

#[test]
fn test_ted_two_channels_mix() {
    let mut ted = TedAudio::new();
    ted.write_reg(0, 0x80);
    ted.write_reg(1, 0x40);
    ted.write_reg(3, 0x38); // both channels on, volume 8
    assert!(peak(&mut ted, 8192) > 0.2);
    ted.write_reg(3, 0x08); // channels gated off
    assert_eq!(peak(&mut ted, 1024), 0.0);
}

#[test]
fn test_ahx_wavetable_voice() {
    let mut ahx = Ahx::new();
    ahx.write_reg(0, 0x00);
    ahx.write_reg(1, 0x01); // period 256
    ahx.write_reg(2, 64); // full voice volume
    ahx.write_reg(3, 1); // sawtooth
    assert!(peak(&mut ahx, 4096) > 0.05);
    ahx.write_reg(0x14, 0); // master volume to zero
    assert_eq!(peak(&mut ahx, 1024), 0.0);
}

#[test]
fn test_enhanced_path_stays_bounded() {
    let mut psg = Psg::new();
    psg.set_enhanced(true);
    psg.write_reg(0, 0x10);
    psg.write_reg(7, 0x3E);
    psg.write_reg(8, 15);
    for _ in 0..8192 {
        let (l, r) = psg.tick_one_sample();
        assert!(l.abs() <= 1.0 && r.abs() <= 1.0);
    }
}
