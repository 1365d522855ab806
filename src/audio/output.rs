use std::sync::{Arc, Mutex, PoisonError};

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{error, info, warn};

use super::cpal_graph::{StreamState, render_block};
use super::device::{device_label, host_label};

/// Failures while listing or opening the sound output.
#[derive(Debug, Error)]
pub enum AudioOutputError {
    /// The host exposes no output device at all.
    #[error("No audio output devices found")]
    NoOutputDevices,
    /// Device enumeration failed.
    #[error("Could not list output devices: {source}")]
    ListOutputDevices {
        /// Underlying cpal error.
        source: cpal::DevicesError,
    },
    /// The chosen device reported no usable default format.
    #[error("No default output format on {device}: {source}")]
    DefaultConfig {
        /// Device that was queried.
        device: String,
        /// Underlying cpal error.
        source: cpal::DefaultStreamConfigError,
    },
    /// Neither the preferred nor the default device accepted a stream.
    #[error("Failed to open output stream on {device}: {source}")]
    BuildStream {
        /// Last device tried.
        device: String,
        /// Underlying cpal error.
        source: cpal::BuildStreamError,
    },
    /// The stream opened but would not start.
    #[error("Playback failed to start: {source}")]
    PlayStream {
        /// Underlying cpal error.
        source: cpal::PlayStreamError,
    },
}

/// Output preferences stored in the settings file.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct AudioOutputConfig {
    /// cpal host name, e.g. "alsa" or "wasapi".
    #[serde(default)]
    pub host: Option<String>,
    /// Output device name as reported by the host.
    #[serde(default)]
    pub device: Option<String>,
    /// Sample rate override in Hz.
    #[serde(default)]
    pub sample_rate: Option<u32>,
    /// Fixed buffer size in frames; 0 or absent keeps the device default.
    #[serde(default)]
    pub buffer_size: Option<u32>,
}

/// One audio host, for `--devices`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AudioHostSummary {
    pub id: String,
    pub label: String,
    pub is_default: bool,
}

/// One output device on a host.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AudioDeviceSummary {
    pub host_id: String,
    pub name: String,
    pub is_default: bool,
}

/// What the opened stream actually runs with.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ResolvedOutput {
    pub host_id: String,
    pub device_name: String,
    pub sample_rate: u32,
    pub channel_count: u16,
    /// True when the preferred host or device could not be used.
    pub used_fallback: bool,
}

/// Running cpal stream; dropping it stops the callback.
pub struct CpalAudioStream {
    stream: cpal::Stream,
}

impl CpalAudioStream {
    pub fn pause(&self) {
        if let Err(err) = self.stream.pause() {
            error!("Failed to pause output stream: {err}");
        }
    }
}

pub(crate) struct OpenStreamOutcome {
    pub(crate) stream: CpalAudioStream,
    pub(crate) resolved: ResolvedOutput,
}

/// Audio hosts compiled into this build.
pub fn available_hosts() -> Vec<AudioHostSummary> {
    let default_id = cpal::default_host().id().name().to_string();
    cpal::available_hosts()
        .into_iter()
        .map(|id| {
            let id = id.name().to_string();
            AudioHostSummary {
                label: host_label(&id),
                is_default: id == default_id,
                id,
            }
        })
        .collect()
}

/// Output devices of `host_id` (unknown hosts list the default host).
pub fn available_devices(host_id: &str) -> Result<Vec<AudioDeviceSummary>, AudioOutputError> {
    let host = pick_host(Some(host_id));
    let id = host.id().name().to_string();
    let default_name = host.default_output_device().and_then(|d| device_label(&d));
    let devices = host
        .output_devices()
        .map_err(|source| AudioOutputError::ListOutputDevices { source })?
        .filter_map(|device| device_label(&device))
        .map(|name| AudioDeviceSummary {
            host_id: id.clone(),
            is_default: default_name.as_deref() == Some(name.as_str()),
            name,
        })
        .collect();
    Ok(devices)
}

/// Open a stream rendering `state`, retrying on the system default device when the
/// preferred one refuses.
pub(crate) fn open_output_stream(
    config: &AudioOutputConfig,
    state: Arc<Mutex<StreamState>>,
) -> Result<OpenStreamOutcome, AudioOutputError> {
    let host = pick_host(config.host.as_deref());
    let mut used_fallback = config
        .host
        .as_deref()
        .is_some_and(|wanted| wanted != host.id().name());
    let (device, device_fallback) = pick_device(&host, config.device.as_deref())?;
    used_fallback |= device_fallback;
    let mut host_id = host.id().name().to_string();

    let attempt = build_stream(&device, Some(config), &state);
    let (stream, stream_config, device_name) = match attempt {
        Ok((stream, stream_config)) => (stream, stream_config, label_or_default(&device)),
        Err(err) => {
            warn!("Preferred output failed ({err}); trying the system default");
            used_fallback = true;
            let host = cpal::default_host();
            let device = host
                .default_output_device()
                .ok_or(AudioOutputError::NoOutputDevices)?;
            host_id = host.id().name().to_string();
            let (stream, stream_config) = build_stream(&device, None, &state)?;
            (stream, stream_config, label_or_default(&device))
        }
    };
    stream
        .play()
        .map_err(|source| AudioOutputError::PlayStream { source })?;

    let resolved = ResolvedOutput {
        host_id,
        device_name,
        sample_rate: stream_config.sample_rate.0,
        channel_count: stream_config.channels,
        used_fallback,
    };
    info!(
        host = %resolved.host_id,
        device = %resolved.device_name,
        rate = resolved.sample_rate,
        channels = resolved.channel_count,
        fallback = resolved.used_fallback,
        "Audio output ready"
    );
    Ok(OpenStreamOutcome {
        stream: CpalAudioStream { stream },
        resolved,
    })
}

/// Build a stream on `device` from its default format, with `prefs` overrides applied.
fn build_stream(
    device: &cpal::Device,
    prefs: Option<&AudioOutputConfig>,
    state: &Arc<Mutex<StreamState>>,
) -> Result<(cpal::Stream, cpal::StreamConfig), AudioOutputError> {
    let name = label_or_default(device);
    let default = device
        .default_output_config()
        .map_err(|source| AudioOutputError::DefaultConfig {
            device: name.clone(),
            source,
        })?;
    let mut stream_config: cpal::StreamConfig = default.into();
    if let Some(prefs) = prefs {
        if let Some(rate) = prefs.sample_rate {
            stream_config.sample_rate = cpal::SampleRate(rate);
        }
        if let Some(frames) = prefs.buffer_size.filter(|frames| *frames > 0) {
            stream_config.buffer_size = cpal::BufferSize::Fixed(frames);
        }
    }
    state
        .lock()
        .unwrap_or_else(PoisonError::into_inner)
        .set_format(stream_config.sample_rate.0, stream_config.channels);

    let render_state = state.clone();
    let stream = device
        .build_output_stream(
            &stream_config,
            move |data: &mut [f32], _: &cpal::OutputCallbackInfo| {
                let mut state = render_state.lock().unwrap_or_else(PoisonError::into_inner);
                render_block(&mut state, data);
            },
            |err| error!("Output stream error: {err}"),
            None,
        )
        .map_err(|source| AudioOutputError::BuildStream {
            device: name,
            source,
        })?;
    Ok((stream, stream_config))
}

/// Named host when compiled in, otherwise the platform default.
fn pick_host(name: Option<&str>) -> cpal::Host {
    name.and_then(|wanted| {
        cpal::available_hosts()
            .into_iter()
            .find(|id| id.name() == wanted)
    })
    .and_then(|id| cpal::host_from_id(id).ok())
    .unwrap_or_else(cpal::default_host)
}

/// Named device on `host`, or the host default; the flag reports a missed preference.
fn pick_device(
    host: &cpal::Host,
    name: Option<&str>,
) -> Result<(cpal::Device, bool), AudioOutputError> {
    if let Some(wanted) = name {
        let found = host
            .output_devices()
            .map_err(|source| AudioOutputError::ListOutputDevices { source })?
            .find(|device| device_label(device).as_deref() == Some(wanted));
        if let Some(device) = found {
            return Ok((device, false));
        }
        warn!("Output device \"{wanted}\" not found; using the host default");
    }
    let device = host
        .default_output_device()
        .ok_or(AudioOutputError::NoOutputDevices)?;
    Ok((device, name.is_some()))
}

fn label_or_default(device: &cpal::Device) -> String {
    device_label(device).unwrap_or_else(|| "Default device".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_settings_keep_device_defaults() {
        let parsed: AudioOutputConfig = toml::from_str("").unwrap();
        assert_eq!(parsed, AudioOutputConfig::default());
    }

    #[test]
    fn output_preferences_survive_the_settings_file() {
        let cfg = AudioOutputConfig {
            host: Some("alsa".into()),
            device: None,
            sample_rate: Some(48_000),
            buffer_size: Some(512),
        };
        let text = toml::to_string(&cfg).unwrap();
        let parsed: AudioOutputConfig = toml::from_str(&text).unwrap();
        assert_eq!(parsed, cfg);
    }
}
