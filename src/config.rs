use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

use crate::control::{ComputeBackend, PipelineConfig};
use crate::overlays;

#[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub pipeline: PipelineDefaults,
    pub overlays: OverlaySelection,
    pub anchor: AnchorConfig,
    pub ui: UiConfig,
    pub models: ModelPaths,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineDefaults {
    pub backend: ComputeBackend,
    pub max_tracked_faces: u32,
    pub overlay_enabled: bool,
    pub point_cloud_enabled: bool,
    pub mirror: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OverlaySelection {
    pub presets: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnchorConfig {
    pub enabled: bool,
    pub object: String,
    pub landmark: String,
    // Hand-tuned for a 640x480 stream: recenter, then pixels -> scene units.
    pub offset: [f32; 3],
    pub scale: [f32; 3],
    pub object_scale: f32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct UiConfig {
    pub fill_color_hex: String,
    pub stroke_color_hex: String,
    pub line_width: f32,
    pub point_size: f32,
    pub target_fps: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelPaths {
    pub face_detection: String,
    pub face_mesh: String,
}

impl Default for PipelineDefaults {
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

impl Default for OverlaySelection {
    fn default() -> Self {
        Self {
            presets: overlays::PRESET_NAMES.iter().map(|s| s.to_string()).collect(),
        }
    }
}

impl Default for AnchorConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            object: "leftear".to_string(),
            landmark: "nose-tip".to_string(),
            offset: [320.0, 240.0, 0.0],
            scale: [1.0 / 75.0, 1.0 / 30.0, 0.0],
            object_scale: 0.6,
        }
    }
}

impl Default for UiConfig {
    fn default() -> Self {
        Self {
            fill_color_hex: "#32EEDB".to_string(),
            stroke_color_hex: "#32EEDB".to_string(),
            line_width: 0.5,
            point_size: 2.0,
            target_fps: 60,
        }
    }
}

impl Default for ModelPaths {
    fn default() -> Self {
        Self {
            face_detection: "models/face_detection.onnx".to_string(),
            face_mesh: "models/face_mesh.onnx".to_string(),
        }
    }
}

impl PipelineDefaults {
    pub fn to_pipeline_config(&self) -> PipelineConfig {
        PipelineConfig {
            backend: self.backend,
            max_tracked_faces: self.max_tracked_faces,
            overlay_enabled: self.overlay_enabled,
            point_cloud_enabled: self.point_cloud_enabled,
            mirror: self.mirror,
        }
        .clamped()
    }
}

impl AppConfig {
    pub const DEFAULT_PATH: &'static str = "config.json";

    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let config = if path.exists() {
            let content = fs::read_to_string(path)?;
            // Missing fields fall back to Default through #[serde(default)].
            match serde_json::from_str::<AppConfig>(&content) {
                Ok(c) => {
                    log::info!("Loaded configuration from {}", path.display());
                    c
                }
                Err(e) => {
                    log::warn!("Error parsing config: {}. Loading defaults.", e);
                    Self::default()
                }
            }
        } else {
            log::info!("Configuration file not found. Creating default at {}", path.display());
            Self::default()
        };

        // Always save back so new fields show up in the file.
        config.save(path)?;

        Ok(config)
    }

    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let content = serde_json::to_string_pretty(self)?;
        fs::write(path, content)?;
        Ok(())
    }
}

/// Parse `#RRGGBB`, falling back to red.
pub fn parse_hex(hex: &str) -> (u8, u8, u8) {
    if hex.len() == 7 && hex.starts_with('#') {
        let r = u8::from_str_radix(&hex[1..3], 16).unwrap_or(255);
        let g = u8::from_str_radix(&hex[3..5], 16).unwrap_or(0);
        let b = u8::from_str_radix(&hex[5..7], 16).unwrap_or(0);
        (r, g, b)
    } else {
        (255, 0, 0)
    }
}
