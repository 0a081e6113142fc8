use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use lumen_core::audio::AudioMixer;
use sdl2::audio::{AudioCallback, AudioDevice, AudioSpecDesired};

/// Number of samples over which to fade in/out (~5.8 ms at 44.1 kHz).
const FADE_SAMPLES: u32 = 256;

/// The SDL pull callback: drains the registered sample ticker through the
/// mixer, with gentle ramps at startup and shutdown so the speaker never
/// pops.
pub struct MixerCallback {
    mixer: Arc<AudioMixer>,
    fade_in_pos: u32,
    fading_out: Arc<AtomicBool>,
    fade_out_pos: u32,
}

impl AudioCallback for MixerCallback {
    type Channel = f32;

    fn callback(&mut self, out: &mut [f32]) {
        self.mixer.fill(out);
        for frame in out.chunks_exact_mut(2) {
            if self.fade_in_pos < FADE_SAMPLES {
                let gain = self.fade_in_pos as f32 / FADE_SAMPLES as f32;
                frame[0] *= gain;
                frame[1] *= gain;
                self.fade_in_pos += 1;
            } else if self.fading_out.load(Ordering::Relaxed) {
                if self.fade_out_pos < FADE_SAMPLES {
                    let gain = 1.0 - self.fade_out_pos as f32 / FADE_SAMPLES as f32;
                    frame[0] *= gain;
                    frame[1] *= gain;
                    self.fade_out_pos += 1;
                } else {
                    frame[0] = 0.0;
                    frame[1] = 0.0;
                }
            }
        }
    }
}

/// Handle for signalling the audio callback to fade out before shutdown.
pub type FadeOut = Arc<AtomicBool>;

/// Open the SDL playback device against the machine's mixer. The device
/// must be kept alive for the duration of the session.
pub fn init(
    sdl_audio: &sdl2::AudioSubsystem,
    mixer: Arc<AudioMixer>,
    sample_rate: u32,
) -> Result<(AudioDevice<MixerCallback>, FadeOut), String> {
    let fade_out: FadeOut = Arc::new(AtomicBool::new(false));

    let desired_spec = AudioSpecDesired {
        freq: Some(sample_rate as i32),
        channels: Some(2),
        samples: Some(512),
    };

    let device = sdl_audio.open_playback(None, &desired_spec, |_spec| MixerCallback {
        mixer,
        fade_in_pos: 0,
        fading_out: Arc::clone(&fade_out),
        fade_out_pos: 0,
    })?;

    Ok((device, fade_out))
}

/// Duration to sleep after signalling fade-out, letting the callback ramp
/// down before the device is paused.
pub fn fade_out_duration() -> std::time::Duration {
    std::time::Duration::from_millis(10)
}
