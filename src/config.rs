//! Configuration surface.
//!
//! `ProcessingConfig` holds the per-call parameters of the silhouette
//! transform. Any field missing from a config file falls back to its
//! documented default, so a partial object behaves like a merge over the
//! defaults. `AppConfig` wraps it with the settings of the preview binary.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::layout::DisplayLayout;

pub const DEFAULT_OUTPUT_WIDTH: u32 = 640;
pub const DEFAULT_OUTPUT_HEIGHT: u32 = 480;
pub const DEFAULT_DEPTH_THRESHOLD: i32 = 2000;
pub const DEFAULT_DARKNESS_THRESHOLD: i32 = 50;

/// How a depth-space coordinate finds its color sample.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MappingStrategy {
    /// Scale depth pixel coordinates into the color frame about the centers.
    #[default]
    Affine,
    /// Crop the color frame on its own and sample it at the same output
    /// fraction as depth. Misaligns when the sensors differ in aspect.
    IndependentCrop,
}

/// Parameters of one `process` call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ProcessingConfig {
    /// Target display width in pixels.
    pub output_width: u32,
    /// Target display height in pixels.
    pub output_height: u32,
    /// Farthest depth (device units) still counted as present. Must be > 0.
    pub depth_threshold: i32,
    /// Pixels must be darker than this luminance to light up. 0..=255.
    pub darkness_threshold: i32,
    /// Flip the output horizontally.
    pub is_mirrored: bool,
    pub mapping: MappingStrategy,
}

impl Default for ProcessingConfig {
    fn default() -> Self {
        Self {
            output_width: DEFAULT_OUTPUT_WIDTH,
            output_height: DEFAULT_OUTPUT_HEIGHT,
            depth_threshold: DEFAULT_DEPTH_THRESHOLD,
            darkness_threshold: DEFAULT_DARKNESS_THRESHOLD,
            is_mirrored: false,
            mapping: MappingStrategy::Affine,
        }
    }
}

impl ProcessingConfig {
    /// Check the thresholds and the output size before any frame work.
    pub fn validate(&self) -> Result<()> {
        if self.depth_threshold <= 0 {
            return Err(Error::Config(format!(
                "depth threshold must be positive (got {})",
                self.depth_threshold
            )));
        }
        if !(0..=255).contains(&self.darkness_threshold) {
            return Err(Error::Config(format!(
                "darkness threshold must be between 0 and 255 (got {})",
                self.darkness_threshold
            )));
        }
        if self.output_width == 0 || self.output_height == 0 {
            return Err(Error::Config(format!(
                "output size must be non-zero (got {}x{})",
                self.output_width, self.output_height
            )));
        }
        Ok(())
    }
}

/// Where frames come from in the preview binary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceKind {
    #[default]
    Webcam,
    Synthetic,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CameraConfig {
    pub source: SourceKind,
    /// Device index (0 = default webcam).
    pub index: u32,
    pub width: u32,
    pub height: u32,
    pub fps: u32,
    /// Depth assigned to every pixel of a color-only source.
    pub plane_depth: u16,
}

impl Default for CameraConfig {
    fn default() -> Self {
        Self {
            source: SourceKind::Webcam,
            index: 0,
            width: 640,
            height: 480,
            fps: 30,
            plane_depth: 1000,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PreviewConfig {
    /// Screen pixels per display dot (edge length).
    pub dot_size: usize,
    /// Dark gap between neighbouring dots.
    pub dot_gap: usize,
    pub snapshot_dir: PathBuf,
}

impl Default for PreviewConfig {
    fn default() -> Self {
        Self {
            dot_size: 8,
            dot_gap: 1,
            snapshot_dir: PathBuf::from("."),
        }
    }
}

/// Everything the preview binary reads from its JSON config file.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub processing: ProcessingConfig,
    pub layout: Option<DisplayLayout>,
    pub camera: CameraConfig,
    pub preview: PreviewConfig,
}

impl AppConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_json(&text)
    }

    pub fn from_json(text: &str) -> Result<Self> {
        let config: AppConfig = serde_json::from_str(text)?;
        if let Some(layout) = &config.layout {
            layout.validate()?;
        }
        Ok(config)
    }

    /// Processing parameters with the output size taken from the display
    /// layout when one is configured.
    pub fn effective_processing(&self) -> ProcessingConfig {
        let mut processing = self.processing.clone();
        if let Some(layout) = &self.layout {
            processing.output_width = layout.width();
            processing.output_height = layout.height();
        }
        processing
    }
}
