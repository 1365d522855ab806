//! Harmoni: layered ambient soundscapes with fades, a sleep timer and shareable mixes.

/// Application directories (config, logs, stored data).
pub mod app_dirs;
/// Playback engine, audio graph backends and decoding.
pub mod audio;
/// Built-in and user-added sounds, Freesound imports.
pub mod catalog;
/// System clipboard access for share links.
pub mod clipboard;
/// Persisted application settings.
pub mod config;
mod http_client;
/// Tracing subscriber setup.
pub mod logging;
/// Saved mixes, share tokens and sharing.
pub mod mix;
/// Player orchestration over engine, catalog, mixes and timer.
pub mod session;
/// Sleep timer state machine.
pub mod timer;
