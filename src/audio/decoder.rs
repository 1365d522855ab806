//! Symphonia decoding of whole sound files into shared sample buffers.

use std::io::Cursor;
use std::sync::Arc;
use std::time::Duration;

use symphonia::core::audio::SampleBuffer;
use symphonia::core::codecs::DecoderOptions;
use symphonia::core::errors::Error;
use symphonia::core::formats::FormatOptions;
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;

const DEFAULT_SAMPLE_RATE: u32 = 44_100;

/// Fully decoded, interleaved `f32` audio shared by every voice playing it.
#[derive(Debug, Clone, PartialEq)]
pub struct DecodedBuffer {
    samples: Arc<[f32]>,
    channels: u16,
    sample_rate: u32,
}

impl DecodedBuffer {
    /// Wrap interleaved samples.
    pub fn new(samples: Vec<f32>, channels: u16, sample_rate: u32) -> Self {
        Self {
            samples: Arc::from(samples),
            channels: channels.max(1),
            sample_rate: sample_rate.max(1),
        }
    }

    /// Interleaved samples.
    pub fn samples(&self) -> &[f32] {
        &self.samples
    }

    pub fn channels(&self) -> u16 {
        self.channels
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// Number of frames (samples per channel).
    pub fn frames(&self) -> usize {
        self.samples.len() / self.channels as usize
    }

    pub fn duration(&self) -> Duration {
        Duration::from_secs_f64(self.frames() as f64 / self.sample_rate as f64)
    }

    /// Sample of `channel` at `frame`, folding extra output channels onto the last source channel.
    pub(crate) fn sample(&self, frame: usize, channel: usize) -> f32 {
        let channels = self.channels as usize;
        let channel = channel.min(channels - 1);
        self.samples
            .get(frame * channels + channel)
            .copied()
            .unwrap_or(0.0)
    }
}

/// Decode an encoded payload (mp3, ogg, wav, flac, aiff) into memory.
pub fn decode_bytes(bytes: &[u8], extension: Option<&str>) -> Result<DecodedBuffer, String> {
    if bytes.is_empty() {
        return Err("Audio payload is empty".into());
    }
    let cursor = Cursor::new(bytes.to_vec());
    let mss = MediaSourceStream::new(Box::new(cursor), Default::default());
    let mut hint = Hint::new();
    if let Some(extension) = extension {
        hint.with_extension(extension);
    }
    let probed = symphonia::default::get_probe()
        .format(
            &hint,
            mss,
            &FormatOptions::default(),
            &MetadataOptions::default(),
        )
        .map_err(|err| format!("Symphonia probe failed: {err}"))?;
    let mut reader = probed.format;
    let track = reader.default_track().ok_or("No default track found")?;
    let track_id = track.id;
    let mut sample_rate = track.codec_params.sample_rate.unwrap_or(DEFAULT_SAMPLE_RATE);
    let mut channels = track
        .codec_params
        .channels
        .map(|layout| layout.count() as u16)
        .unwrap_or(2);
    let mut decoder = symphonia::default::get_codecs()
        .make(&track.codec_params, &DecoderOptions::default())
        .map_err(|err| format!("Symphonia decoder creation failed: {err}"))?;

    let mut samples = Vec::new();
    loop {
        let packet = match reader.next_packet() {
            Ok(packet) => packet,
            Err(Error::IoError(ref err)) if err.kind() == std::io::ErrorKind::UnexpectedEof => {
                break;
            }
            Err(Error::ResetRequired) => break,
            Err(err) => return Err(format!("Symphonia read failed: {err}")),
        };
        if packet.track_id() != track_id {
            continue;
        }
        let decoded = match decoder.decode(&packet) {
            Ok(decoded) => decoded,
            Err(Error::DecodeError(err)) => {
                tracing::warn!("Skipping undecodable packet: {err}");
                continue;
            }
            Err(err) => return Err(format!("Symphonia decode failed: {err}")),
        };
        let spec = *decoded.spec();
        sample_rate = spec.rate;
        channels = spec.channels.count() as u16;
        let mut buffer = SampleBuffer::<f32>::new(decoded.capacity() as u64, spec);
        buffer.copy_interleaved_ref(decoded);
        samples.extend_from_slice(buffer.samples());
    }
    if samples.is_empty() {
        return Err("Decoded audio contained no samples".into());
    }
    Ok(DecodedBuffer::new(samples, channels, sample_rate))
}
