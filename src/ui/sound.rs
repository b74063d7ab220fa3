/// Sound engine: procedural sound cues via rodio.
///
/// All cues are generated as in-memory WAV buffers at init time.
/// Playback is fire-and-forget (non-blocking) via rodio's Sink.
///
/// Compile without the "sound" feature to disable audio entirely
/// (the stub SoundEngine does nothing).

/// The closed set of audible game events.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum Cue {
    Move,
    Stop,
    Explode,
    Arm,
    Teleport,
    Sensor,
    ExitSuccess,
    ExitFailure,
}

#[cfg(feature = "sound")]
mod inner {
    use std::io::Cursor;
    use std::sync::Arc;

    use rodio::{OutputStream, OutputStreamHandle, Sink};

    use super::Cue;

    const SAMPLE_RATE: u32 = 22050;

    /// Pre-generated WAV buffers, one per cue.
    pub struct SoundEngine {
        _stream: OutputStream,
        handle: OutputStreamHandle,
        buffers: [Arc<Vec<u8>>; 8],
    }

    impl SoundEngine {
        pub fn new() -> Option<Self> {
            let (stream, handle) = OutputStream::try_default().ok()?;

            let buffers = [
                Arc::new(make_wav(&gen_move())),
                Arc::new(make_wav(&gen_stop())),
                Arc::new(make_wav(&gen_explode())),
                Arc::new(make_wav(&gen_arm())),
                Arc::new(make_wav(&gen_teleport())),
                Arc::new(make_wav(&gen_sensor())),
                Arc::new(make_wav(&gen_exit_success())),
                Arc::new(make_wav(&gen_exit_failure())),
            ];

            Some(SoundEngine {
                _stream: stream,
                handle,
                buffers,
            })
        }

        pub fn play(&self, cue: Cue) {
            let buf = &self.buffers[cue as usize];
            if let Ok(sink) = Sink::try_new(&self.handle) {
                let cursor = Cursor::new(buf.as_ref().clone());
                if let Ok(src) = rodio::Decoder::new(cursor) {
                    sink.append(src);
                    sink.detach(); // fire-and-forget
                }
            }
        }
    }

    // ════════════════════════════════════════════════════════════
    //  Waveform generators — all produce Vec<f32> mono samples
    // ════════════════════════════════════════════════════════════

    /// Sine sweep from one frequency to another with a fade-out envelope.
    fn sweep(from: f32, to: f32, duration: f32, volume: f32) -> Vec<f32> {
        let n = (SAMPLE_RATE as f32 * duration) as usize;
        let mut phase = 0.0f32;
        (0..n)
            .map(|i| {
                let t = i as f32 / n as f32;
                let freq = from + (to - from) * t;
                phase += freq * 2.0 * std::f32::consts::PI / SAMPLE_RATE as f32;
                let env = (1.0 - t).powf(0.7);
                phase.sin() * env * volume
            })
            .collect()
    }

    /// A short sequence of notes with a slightly square-ish timbre.
    fn notes(seq: &[(f32, f32)], volume: f32) -> Vec<f32> {
        let mut samples = Vec::new();
        for &(freq, dur) in seq {
            let n = (SAMPLE_RATE as f32 * dur) as usize;
            for i in 0..n {
                let t = i as f32 / SAMPLE_RATE as f32;
                let env = 1.0 - (i as f32 / n as f32).powf(0.5);
                let wave = (t * freq * 2.0 * std::f32::consts::PI).sin() * 0.7
                    + (t * freq * 3.0 * 2.0 * std::f32::consts::PI).sin() * 0.3;
                samples.push(wave * env * volume);
            }
        }
        samples
    }

    /// Filtered noise burst with a falling pitch underneath.
    fn burst(duration: f32, volume: f32) -> Vec<f32> {
        let n = (SAMPLE_RATE as f32 * duration) as usize;
        let mut rng: u32 = 0x2545_f491;
        (0..n)
            .map(|i| {
                let t = i as f32 / n as f32;
                let ti = i as f32 / SAMPLE_RATE as f32;
                let tone = (ti * (160.0 + (1.0 - t) * 240.0) * 2.0 * std::f32::consts::PI).sin();
                rng = rng.wrapping_mul(1103515245).wrapping_add(12345);
                let noise = (rng as f32 / u32::MAX as f32) * 2.0 - 1.0;
                let env = (1.0 - t).powf(0.8);
                (tone * 0.35 + noise * 0.65) * env * volume
            })
            .collect()
    }

    fn gen_move() -> Vec<f32> {
        sweep(520.0, 660.0, 0.05, 0.2)
    }

    fn gen_stop() -> Vec<f32> {
        sweep(330.0, 180.0, 0.08, 0.3)
    }

    fn gen_explode() -> Vec<f32> {
        burst(0.4, 0.4)
    }

    fn gen_arm() -> Vec<f32> {
        notes(&[(440.0, 0.06), (587.0, 0.09)], 0.25)
    }

    fn gen_teleport() -> Vec<f32> {
        sweep(240.0, 1200.0, 0.18, 0.25)
    }

    fn gen_sensor() -> Vec<f32> {
        notes(&[(880.0, 0.05), (1175.0, 0.1)], 0.25)
    }

    fn gen_exit_success() -> Vec<f32> {
        notes(
            &[(523.0, 0.1), (659.0, 0.1), (784.0, 0.1), (1047.0, 0.3)],
            0.3,
        )
    }

    fn gen_exit_failure() -> Vec<f32> {
        let mut samples = notes(&[(392.0, 0.12), (330.0, 0.12), (262.0, 0.2)], 0.3);
        samples.extend(burst(0.25, 0.3));
        samples
    }

    // ════════════════════════════════════════════════════════════
    //  WAV encoder — wraps f32 samples into a valid WAV buffer
    // ════════════════════════════════════════════════════════════

    fn make_wav(samples: &[f32]) -> Vec<u8> {
        let num_channels: u16 = 1;
        let bits_per_sample: u16 = 16;
        let byte_rate = SAMPLE_RATE * (num_channels as u32) * (bits_per_sample as u32) / 8;
        let block_align = num_channels * bits_per_sample / 8;
        let data_size = samples.len() as u32 * 2;
        let file_size = 36 + data_size;

        let mut buf = Vec::with_capacity(44 + data_size as usize);

        // RIFF header
        buf.extend_from_slice(b"RIFF");
        buf.extend_from_slice(&file_size.to_le_bytes());
        buf.extend_from_slice(b"WAVE");

        // fmt chunk
        buf.extend_from_slice(b"fmt ");
        buf.extend_from_slice(&16u32.to_le_bytes());
        buf.extend_from_slice(&1u16.to_le_bytes()); // PCM
        buf.extend_from_slice(&num_channels.to_le_bytes());
        buf.extend_from_slice(&SAMPLE_RATE.to_le_bytes());
        buf.extend_from_slice(&byte_rate.to_le_bytes());
        buf.extend_from_slice(&block_align.to_le_bytes());
        buf.extend_from_slice(&bits_per_sample.to_le_bytes());

        // data chunk
        buf.extend_from_slice(b"data");
        buf.extend_from_slice(&data_size.to_le_bytes());

        for &s in samples {
            let clamped = s.clamp(-1.0, 1.0);
            let val = (clamped * 32767.0) as i16;
            buf.extend_from_slice(&val.to_le_bytes());
        }

        buf
    }
}

#[cfg(feature = "sound")]
pub use inner::SoundEngine;

#[cfg(not(feature = "sound"))]
pub struct SoundEngine;

#[cfg(not(feature = "sound"))]
impl SoundEngine {
    pub fn new() -> Option<Self> {
        Some(SoundEngine)
    }
    pub fn play(&self, _cue: Cue) {}
}
