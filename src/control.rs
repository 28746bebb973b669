//! Runtime configuration: the mutable parameters the render loop reads every
//! tick, and the command channel external UI uses to change them.
//!
//! UI code never writes the config directly. It sends commands through a
//! [`ConfigHandle`]; the loop drains them once at the start of each tick, so
//! a tick always draws against one consistent snapshot.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::mpsc::{self, Receiver, Sender};

pub const MIN_TRACKED_FACES: u32 = 1;
pub const MAX_TRACKED_FACES: u32 = 20;

/// Execution provider used by the landmark model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum ComputeBackend {
    #[default]
    Cpu,
    #[value(name = "coreml")]
    CoreMl,
    Cuda,
}

impl ComputeBackend {
    pub const ALL: [ComputeBackend; 3] = [ComputeBackend::Cpu, ComputeBackend::CoreMl, ComputeBackend::Cuda];

    pub fn as_str(&self) -> &'static str {
        match self {
            ComputeBackend::Cpu => "cpu",
            ComputeBackend::CoreMl => "coreml",
            ComputeBackend::Cuda => "cuda",
        }
    }

    /// Next backend in `ALL`, wrapping around.
    pub fn cycle(self) -> Self {
        let i = Self::ALL.iter().position(|b| *b == self).unwrap_or(0);
        Self::ALL[(i + 1) % Self::ALL.len()]
    }
}

impl fmt::Display for ComputeBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown compute backend '{0}' (expected cpu, coreml or cuda)")]
pub struct UnknownBackend(pub String);

impl FromStr for ComputeBackend {
    type Err = UnknownBackend;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|b| b.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| UnknownBackend(s.to_string()))
    }
}

/// What the landmark model was (or must be) loaded with. A change here
/// means a reload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ModelOptions {
    pub backend: ComputeBackend,
    pub max_faces: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PipelineConfig {
    pub backend: ComputeBackend,
    pub max_tracked_faces: u32,
    pub overlay_enabled: bool,
    pub point_cloud_enabled: bool,
    pub mirror: bool,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            backend: ComputeBackend::Cpu,
            max_tracked_faces: 1,
            overlay_enabled: true,
            point_cloud_enabled: false,
            mirror: true,
        }
    }
}

impl PipelineConfig {
    pub fn model_options(&self) -> ModelOptions {
        ModelOptions {
            backend: self.backend,
            max_faces: self.max_tracked_faces,
        }
    }

    pub fn clamped(mut self) -> Self {
        self.max_tracked_faces = self
            .max_tracked_faces
            .clamp(MIN_TRACKED_FACES, MAX_TRACKED_FACES);
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigCommand {
    SetBackend(ComputeBackend),
    SetMaxTrackedFaces(u32),
    SetOverlayEnabled(bool),
    SetPointCloudEnabled(bool),
    SetMirror(bool),
}

/// Cloneable sender side handed to UI callbacks.
#[derive(Debug, Clone)]
pub struct ConfigHandle {
    tx: Sender<ConfigCommand>,
}

impl ConfigHandle {
    fn send(&self, cmd: ConfigCommand) {
        if self.tx.send(cmd).is_err() {
            log::debug!("Render loop gone, dropping {:?}", cmd);
        }
    }

    /// Switch compute backend. Takes effect after the model reloads.
    pub fn set_backend(&self, backend: ComputeBackend) {
        self.send(ConfigCommand::SetBackend(backend));
    }

    /// Change the face cap. Takes effect after the model reloads.
    pub fn set_max_tracked_faces(&self, n: u32) {
        self.send(ConfigCommand::SetMaxTrackedFaces(n));
    }

    pub fn set_overlay_enabled(&self, enabled: bool) {
        self.send(ConfigCommand::SetOverlayEnabled(enabled));
    }

    pub fn set_point_cloud_enabled(&self, enabled: bool) {
        self.send(ConfigCommand::SetPointCloudEnabled(enabled));
    }

    pub fn set_mirror(&self, enabled: bool) {
        self.send(ConfigCommand::SetMirror(enabled));
    }
}

/// Single-consumer owner of the pipeline config.
pub struct ConfigStore {
    current: PipelineConfig,
    loaded: Option<ModelOptions>,
    tx: Sender<ConfigCommand>,
    rx: Receiver<ConfigCommand>,
}

impl ConfigStore {
    pub fn new(initial: PipelineConfig) -> Self {
        let (tx, rx) = mpsc::channel();
        Self {
            current: initial.clamped(),
            loaded: None,
            tx,
            rx,
        }
    }

    pub fn handle(&self) -> ConfigHandle {
        ConfigHandle {
            tx: self.tx.clone(),
        }
    }

    pub fn current(&self) -> PipelineConfig {
        self.current
    }

    /// Apply every queued command in order. Returns how many were applied.
    pub fn drain(&mut self) -> usize {
        let mut applied = 0;
        while let Ok(cmd) = self.rx.try_recv() {
            self.apply(cmd);
            applied += 1;
        }
        applied
    }

    fn apply(&mut self, cmd: ConfigCommand) {
        match cmd {
            ConfigCommand::SetBackend(b) => self.current.backend = b,
            ConfigCommand::SetMaxTrackedFaces(n) => {
                let clamped = n.clamp(MIN_TRACKED_FACES, MAX_TRACKED_FACES);
                if clamped != n {
                    log::warn!("max tracked faces {} out of range, using {}", n, clamped);
                }
                self.current.max_tracked_faces = clamped;
            }
            ConfigCommand::SetOverlayEnabled(v) => self.current.overlay_enabled = v,
            ConfigCommand::SetPointCloudEnabled(v) => self.current.point_cloud_enabled = v,
            ConfigCommand::SetMirror(v) => self.current.mirror = v,
        }
    }

    /// Model options the loop must load before it may run the next
    /// inference, if they differ from what is loaded.
    pub fn pending_reload(&self) -> Option<ModelOptions> {
        let wanted = self.current.model_options();
        match self.loaded {
            Some(loaded) if loaded == wanted => None,
            _ => Some(wanted),
        }
    }

    pub fn reload_resolved(&mut self, options: ModelOptions) {
        self.loaded = Some(options);
    }

    /// Keep running with the model that is already loaded.
    pub fn reload_failed(&mut self) {
        if let Some(loaded) = self.loaded {
            self.current.backend = loaded.backend;
            self.current.max_tracked_faces = loaded.max_faces;
        }
    }
}
