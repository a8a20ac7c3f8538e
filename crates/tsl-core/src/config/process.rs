//! Per-process launch configuration

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;

/// Audio server (jackd) settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Server binary, looked up on PATH unless it contains a `/`
    pub binary: String,

    /// Server options placed before the backend (e.g. `-R`, `-P70`)
    pub args: Vec<String>,

    /// Driver backend passed as `-d <backend>`
    pub backend: String,

    /// Backend device (e.g. `hw:1`)
    pub device: Option<String>,

    /// Extra backend options (e.g. `-p 128 -n 3`)
    pub backend_args: Vec<String>,

    /// Client name the server's hardware ports appear under
    pub port_client: String,

    /// Extra environment for the server process
    pub env: BTreeMap<String, String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            binary: "jackd".to_string(),
            args: Vec::new(),
            backend: "alsa".to_string(),
            device: None,
            backend_args: Vec::new(),
            port_client: "system".to_string(),
            env: BTreeMap::new(),
        }
    }
}

impl ServerConfig {
    /// Command-line arguments for the server
    pub fn to_args(&self) -> Vec<String> {
        let mut args = self.args.clone();
        args.push("-d".to_string());
        args.push(self.backend.clone());
        if let Some(device) = &self.device {
            args.push("-d".to_string());
            args.push(device.clone());
        }
        args.extend(self.backend_args.iter().cloned());
        args
    }
}

/// Touchscreen instrument application settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Client binary, looked up on PATH unless it contains a `/`
    pub binary: String,

    /// Name the client registers its ports under
    pub jack_name: String,

    /// X display to attach to; falls back to the inherited `DISPLAY`
    pub display: Option<String>,

    /// Refuse to launch when no display is available
    pub require_display: bool,

    /// Arguments appended after the launch flags
    pub extra_args: Vec<String>,

    /// Extra environment for the client process
    pub env: BTreeMap<String, String>,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            binary: "rust-device-reading".to_string(),
            jack_name: "touchscreen-instrument".to_string(),
            display: None,
            require_display: true,
            extra_args: Vec::new(),
            env: BTreeMap::new(),
        }
    }
}

/// Options forwarded to the instrument on its command line
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LaunchConfig {
    /// Touch layout name (`Parallelograms`, `Grid`, `Grid2`, ...)
    pub layout: Option<String>,

    /// Initial gain
    pub volume: Option<f32>,

    /// Audio block size in frames, applied to the server after patching
    pub buffer_size: Option<u32>,

    /// Run without touch hardware
    pub dev_mode: bool,

    /// MIDI note the layout starts from
    pub pitch: Option<i32>,

    /// Use the instrument's MIDI backend instead of audio
    pub midi: bool,
}

impl LaunchConfig {
    /// Instrument flags for this configuration
    ///
    /// Values are forwarded verbatim; unset options are omitted so the
    /// instrument applies its own defaults.
    pub fn to_args(&self) -> Vec<String> {
        let mut args = Vec::new();
        if let Some(layout) = &self.layout {
            args.push("--layout".to_string());
            args.push(layout.clone());
        }
        if let Some(volume) = self.volume {
            args.push("--volume".to_string());
            args.push(volume.to_string());
        }
        if let Some(pitch) = self.pitch {
            args.push("--pitch".to_string());
            args.push(pitch.to_string());
        }
        if self.midi {
            args.push("--midi".to_string());
        }
        if self.dev_mode {
            args.push("--dev-mode".to_string());
        }
        args
    }
}

/// Optional guitarix effects host between the instrument and the speakers
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EffectsConfig {
    /// Effects host binary
    pub binary: String,

    /// Client names the host registers ports under
    pub jack_names: Vec<String>,

    /// Port the host reads from
    pub input: String,

    /// Ports the host writes to
    pub outputs: Vec<String>,

    /// Preset file loaded at startup
    pub preset: Option<PathBuf>,

    /// Extra arguments
    pub extra_args: Vec<String>,
}

impl Default for EffectsConfig {
    fn default() -> Self {
        Self {
            binary: "guitarix".to_string(),
            jack_names: vec!["gx_head_amp".to_string(), "gx_head_fx".to_string()],
            input: "touchscreen-instrument:left-output".to_string(),
            outputs: vec![
                "system:playback_1".to_string(),
                "system:playback_2".to_string(),
            ],
            preset: None,
            extra_args: Vec::new(),
        }
    }
}

impl EffectsConfig {
    /// Command-line arguments for the effects host
    pub fn to_args(&self) -> Vec<String> {
        let mut args = vec!["--jack-input".to_string(), self.input.clone()];
        for output in &self.outputs {
            args.push("--jack-output".to_string());
            args.push(output.clone());
        }
        args.push("--disable-save-on-exit".to_string());
        if let Some(preset) = &self.preset {
            args.push("--load-file".to_string());
            args.push(preset.display().to_string());
        }
        args.extend(self.extra_args.iter().cloned());
        args
    }
}

/// Paths of the JACK command-line tools used to inspect and patch the graph
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct JackToolsConfig {
    /// Port lister
    pub lsp: String,
    /// Port patcher
    pub connect: String,
    /// Buffer size setter
    pub bufsize: String,
}

impl Default for JackToolsConfig {
    fn default() -> Self {
        Self {
            lsp: "jack_lsp".to_string(),
            connect: "jack_connect".to_string(),
            bufsize: "jack_bufsize".to_string(),
        }
    }
}
