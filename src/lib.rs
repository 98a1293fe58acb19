//! Flip-dot silhouette
//!
//! Turns a paired depth + color camera frame into an on/off dot buffer
//! sized for a physical dot/flap display. A dot is lit where something is
//! within depth range and dark in the color image.
//!
//! ```
//! use flipdot_silhouette::{process_frame, ChannelOrder, ColorFrame, DepthFrame, FramePair, ProcessingConfig};
//!
//! let depth = [1200u16; 4];
//! let color = [0u8; 12];
//! let pair = FramePair::new(
//!     DepthFrame::new(2, 2, &depth).unwrap(),
//!     ColorFrame::new(2, 2, ChannelOrder::Bgr, &color).unwrap(),
//! );
//! let config = ProcessingConfig { output_width: 2, output_height: 2, ..Default::default() };
//! let out = process_frame(&pair, &config).unwrap();
//! assert_eq!(out.lit_count(), 4);
//! ```

pub mod camera;
pub mod config;
pub mod display;
pub mod error;
pub mod geometry;
pub mod layout;
pub mod silhouette;
pub mod types;

pub use config::{AppConfig, MappingStrategy, ProcessingConfig};
pub use error::{Error, Result};
pub use geometry::{CoordinateMapping, CropRect};
pub use layout::{DisplayLayout, PanelFrame, PanelSize};
pub use silhouette::{luminance, luminance_milli, process_frame, FrameProcessor, OutputBuffer};
pub use types::{ChannelOrder, ColorFrame, DepthFrame, FramePair, OwnedFramePair};
