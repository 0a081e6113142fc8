use std::sync::{Arc, Mutex};

use lumen_core::audio::{AudioMixer, SampleTicker, SharedEngine, SynthEngine};
use lumen_core::bus::MachineBus;
use lumen_core::device::EventPlayer;
use lumen_core::device::player::{
    AudioEvent, EventList, EventListError, NO_LOOP, REG_CTRL, REG_LEN, REG_PTR, REG_STATUS,
    STATUS_ERROR, STATUS_PLAYING, STREAM_MAGIC,
};

/// Records every register write with the tick at which it arrived.
#[derive(Default)]
struct RecordingEngine {
    ticks: u64,
    writes: Vec<(u64, u8, u8)>,
}

impl SampleTicker for RecordingEngine {
    fn tick_one_sample(&mut self) -> (f32, f32) {
        self.ticks += 1;
        (0.0, 0.0)
    }
}

impl SynthEngine for RecordingEngine {
    fn write_reg(&mut self, reg: u8, val: u8) {
        self.writes.push((self.ticks, reg, val));
    }

    fn reset(&mut self) {}
    fn set_enhanced(&mut self, _on: bool) {}
    fn name(&self) -> &'static str {
        "recording"
    }
}

fn list(events: &[(u32, u8, u8)], loop_at: Option<usize>) -> EventList {
    EventList {
        events: events
            .iter()
            .map(|&(sample, reg, value)| AudioEvent { sample: sample as u64, reg, value })
            .collect(),
        loop_at,
    }
}

fn rig() -> (Arc<EventPlayer>, SharedEngine, Arc<Mutex<RecordingEngine>>) {
    let engine = Arc::new(Mutex::new(RecordingEngine::default()));
    let shared: SharedEngine = engine.clone();
    let mixer = AudioMixer::new();
    let player = EventPlayer::new(0xF0C10, Arc::clone(&shared), mixer);
    (player, shared, engine)
}

#[test]
fn test_events_dispatch_in_nondecreasing_order() {
    let (player, _, engine) = rig();
    player.play_list(list(&[(0, 1, 10), (2, 2, 20), (2, 3, 30), (5, 4, 40)], None));

    let ticker = player.ticker();
    for _ in 0..8 {
        ticker.lock().unwrap().tick_one_sample();
    }
    let writes = engine.lock().unwrap().writes.clone();
    let regs: Vec<u8> = writes.iter().map(|w| w.1).collect();
    assert_eq!(regs, [1, 2, 3, 4]);
    // Dispatch ticks never go backwards.
    assert!(writes.windows(2).all(|w| w[0].0 <= w[1].0));
    assert!(player.is_idle(), "finite list without loop ends playback");
}

#[test]
fn test_loop_marker_wraps_the_cursor() {
    let (player, _, engine) = rig();
    player.play_list(list(&[(0, 1, 1), (1, 2, 2), (2, 3, 3)], Some(1)));

    let ticker = player.ticker();
    for _ in 0..10 {
        ticker.lock().unwrap().tick_one_sample();
    }
    let regs: Vec<u8> = engine.lock().unwrap().writes.iter().map(|w| w.1).collect();
    // 1,2,3 then 2,3 repeating from the marker.
    assert_eq!(&regs[..3], &[1, 2, 3]);
    assert!(regs[3..].chunks(2).all(|c| c[0] == 2 && (c.len() == 1 || c[1] == 3)));
    assert!(!player.is_idle(), "looping playback never finishes");
}

#[test]
fn test_stream_container_roundtrip() {
    let original = list(&[(0, 9, 1), (44100, 8, 2)], Some(0));
    let bytes = original.to_bytes();
    assert_eq!(&bytes[0..4], &STREAM_MAGIC);
    let parsed = EventList::from_bytes(&bytes).unwrap();
    assert_eq!(parsed.events, original.events);
    assert_eq!(parsed.loop_at, original.loop_at);
}

#[test]
fn test_stream_container_rejects_garbage() {
    assert_eq!(EventList::from_bytes(b"EV"), Err(EventListError::Truncated));
    assert_eq!(
        EventList::from_bytes(b"NOPE\x00\x00\x00\x00\xFF\xFF\xFF\xFF"),
        Err(EventListError::BadMagic)
    );

    // Monotonicity violation: second event earlier than the first.
    let mut bad = Vec::new();
    bad.extend_from_slice(&STREAM_MAGIC);
    bad.extend_from_slice(&2u32.to_le_bytes());
    bad.extend_from_slice(&NO_LOOP.to_le_bytes());
    bad.extend_from_slice(&[10, 0, 0, 0, 1, 1, 0, 0]);
    bad.extend_from_slice(&[5, 0, 0, 0, 2, 2, 0, 0]);
    assert_eq!(
        EventList::from_bytes(&bad),
        Err(EventListError::NotMonotonic { index: 1 })
    );
}

#[test]
fn test_mmio_start_parses_stream_from_memory() {
    let mut bus = MachineBus::new(0x10_0000);
    let (player, _, engine) = rig();
    player.map(&mut bus).unwrap();
    let bus = Arc::new(bus);
    player.connect_bus(&bus);

    let stream = list(&[(0, 7, 0x55)], None).to_bytes();
    bus.write_block(0x8000, &stream);
    bus.write32(0xF0C10 + REG_PTR, 0x8000);
    bus.write32(0xF0C10 + REG_LEN, stream.len() as u32);
    bus.write32(0xF0C10 + REG_CTRL, 1);

    assert_eq!(bus.read32(0xF0C10 + REG_STATUS), STATUS_PLAYING);
    player.ticker().lock().unwrap().tick_one_sample();
    assert_eq!(engine.lock().unwrap().writes, [(0, 7, 0x55)]);
}

#[test]
fn test_mmio_start_with_bad_stream_flags_error() {
    let mut bus = MachineBus::new(0x10_0000);
    let (player, _, _) = rig();
    player.map(&mut bus).unwrap();
    let bus = Arc::new(bus);
    player.connect_bus(&bus);

    bus.write32(0xF0C10 + REG_PTR, 0x8000); // garbage memory
    bus.write32(0xF0C10 + REG_LEN, 64);
    bus.write32(0xF0C10 + REG_CTRL, 1);
    assert_eq!(bus.read32(0xF0C10 + REG_STATUS) & STATUS_ERROR, STATUS_ERROR);
}

#[test]
fn test_mixer_slot_swaps_atomically() {
    let mixer = AudioMixer::new();
    assert!(mixer.current().is_none());
    let mut silent = [1.0f32; 8];
    mixer.fill(&mut silent);
    assert!(silent.iter().all(|&s| s == 0.0), "empty slot produces silence");

    let engine = Arc::new(Mutex::new(RecordingEngine::default()));
    mixer.set_sample_ticker(Some(engine.clone()));
    let mut out = [0.0f32; 8];
    mixer.fill(&mut out);
    assert_eq!(engine.lock().unwrap().ticks, 4, "one tick per stereo frame");

    mixer.set_sample_ticker(None);
    assert!(mixer.current().is_none());
}
