use std::f32::consts::TAU;
use std::path::Path;

/// Write a mono 32-bit float WAV, creating parent directories.
pub fn write_test_wav(path: &Path, sample_rate: u32, samples: &[f32]) {
    let spec = hound::WavSpec {
        channels: 1,
        sample_rate,
        bits_per_sample: 32,
        sample_format: hound::SampleFormat::Float,
    };
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).expect("create wav parent dirs");
    }
    let mut writer = hound::WavWriter::create(path, spec).expect("create wav writer");
    for &sample in samples {
        writer.write_sample(sample).expect("write wav sample");
    }
    writer.finalize().expect("finalize wav");
}

/// `frames` samples of a sine at `freq` Hz.
pub fn sine(sample_rate: u32, freq: f32, frames: usize) -> Vec<f32> {
    (0..frames)
        .map(|i| (TAU * freq * i as f32 / sample_rate as f32).sin() * 0.5)
        .collect()
}
