// Depth + color frame -> binary silhouette for a dot/flap display.
// A pixel is lit when it is in depth range AND dark in the color image.
// Output is RGBA so it can go straight to a display driver or a PNG:
// R = G = B in {0, 255}, A = 255, for every pixel.

use std::path::Path;

#[cfg(feature = "parallel")]
use rayon::prelude::*;

use crate::config::{MappingStrategy, ProcessingConfig};
use crate::error::{Error, Result};
use crate::geometry::{CoordinateMapping, CropRect};
use crate::types::{ChannelOrder, ColorFrame, DepthFrame, FramePair};

pub const LIT: u8 = 255;
pub const OFF: u8 = 0;

/// Perceptual luminance (0.299 R + 0.587 G + 0.114 B) of one color triplet.
/// `order` tells which byte is which channel.
#[inline]
pub fn luminance(pixel: &[u8], order: ChannelOrder) -> f64 {
    let (r, g, b) = order.rgb_offsets();
    0.299 * pixel[r] as f64 + 0.587 * pixel[g] as f64 + 0.114 * pixel[b] as f64
}

/// Luminance scaled by 1000 (299 R + 587 G + 114 B), exact.
/// Classification compares this against `1000 * darkness_threshold`, so a
/// pixel whose luminance equals the threshold is never counted as darker.
#[inline]
pub fn luminance_milli(pixel: &[u8], order: ChannelOrder) -> u32 {
    let (r, g, b) = order.rgb_offsets();
    299 * u32::from(pixel[r]) + 587 * u32::from(pixel[g]) + 114 * u32::from(pixel[b])
}

/// RGBA silhouette, `width * height * 4` bytes, row-major.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputBuffer {
    width: usize,
    height: usize,
    data: Vec<u8>,
}

impl OutputBuffer {
    pub fn width(&self) -> usize { self.width }
    pub fn height(&self) -> usize { self.height }
    pub fn as_bytes(&self) -> &[u8] { &self.data }
    pub fn into_bytes(self) -> Vec<u8> { self.data }

    /// RGBA bytes of row `y`.
    pub fn row(&self, y: usize) -> &[u8] {
        let stride = self.width * 4;
        &self.data[y * stride..(y + 1) * stride]
    }

    #[inline]
    pub fn is_lit(&self, x: usize, y: usize) -> bool {
        self.data[(y * self.width + x) * 4] == LIT
    }

    pub fn lit_count(&self) -> usize {
        self.data.chunks_exact(4).filter(|px| px[0] == LIT).count()
    }

    /// One bit per pixel, row-major, most significant bit first.
    /// The final byte is zero-padded.
    pub fn pack_bits(&self) -> Vec<u8> {
        let mut bits = vec![0u8; (self.width * self.height).div_ceil(8)];
        for (i, px) in self.data.chunks_exact(4).enumerate() {
            if px[0] == LIT {
                bits[i / 8] |= 0x80 >> (i % 8);
            }
        }
        bits
    }

    /// Copy into an `image` buffer (for snapshots).
    pub fn to_image(&self) -> Result<image::RgbaImage> {
        image::RgbaImage::from_raw(self.width as u32, self.height as u32, self.data.clone())
            .ok_or_else(|| Error::InvalidFrame("output does not fit an RGBA image".into()))
    }

    /// Write a PNG snapshot to `path`.
    pub fn save_png(&self, path: &Path) -> Result<()> {
        self.to_image()?.save_with_format(path, image::ImageFormat::Png)?;
        Ok(())
    }
}

/// Where the color sample for an output pixel comes from.
#[derive(Debug, Clone, Copy)]
enum ColorSampler {
    /// From the depth source pixel through the affine map.
    Mapped(CoordinateMapping),
    /// From the output pixel through the color frame's own crop.
    Cropped(CropRect),
}

/// Everything one frame needs; shared read-only by all rows.
struct Pass<'a> {
    depth: DepthFrame<'a>,
    color: ColorFrame<'a>,
    crop: CropRect,
    sampler: ColorSampler,
    out_w: usize,
    out_h: usize,
    depth_threshold: i32,
    /// `darkness_threshold * 1000`, same scale as `luminance_milli`.
    darkness_milli: u32,
    mirrored: bool,
}

impl Pass<'_> {
    #[inline]
    fn classify(&self, x: usize, y: usize) -> u8 {
        let (sx, sy) = self.crop.source_pixel(x, y, self.out_w, self.out_h);
        let depth = self.depth.at(sx, sy);

        let color_at = match self.sampler {
            ColorSampler::Mapped(mapping) => mapping.map(sx, sy),
            ColorSampler::Cropped(crop) => Some(crop.source_pixel(x, y, self.out_w, self.out_h)),
        };
        let Some((cx, cy)) = color_at else {
            return OFF;
        };

        let in_range = depth > 0 && i32::from(depth) <= self.depth_threshold;
        if in_range && luminance_milli(self.color.pixel(cx, cy), self.color.order()) < self.darkness_milli {
            LIT
        } else {
            OFF
        }
    }

    /// Fill one output row. Mirroring only moves where a value is written.
    fn fill_row(&self, y: usize, row: &mut [u8]) {
        for x in 0..self.out_w {
            let value = self.classify(x, y);
            let out_x = if self.mirrored { self.out_w - 1 - x } else { x };
            row[out_x * 4..out_x * 4 + 4].copy_from_slice(&[value, value, value, 255]);
        }
    }
}

/// Stateless frame-to-silhouette transform.
#[derive(Debug, Clone, Copy, Default)]
pub struct FrameProcessor;

impl FrameProcessor {
    pub fn new() -> Self {
        Self
    }

    /// Validate, then turn one frame pair into a fresh output buffer.
    pub fn process(&self, frame: &FramePair<'_>, config: &ProcessingConfig) -> Result<OutputBuffer> {
        config.validate()?;
        let (depth, color) = frame.require()?;

        let sampler = match config.mapping {
            MappingStrategy::Affine => ColorSampler::Mapped(CoordinateMapping::affine(
                depth.width(),
                depth.height(),
                color.width(),
                color.height(),
            )),
            MappingStrategy::IndependentCrop => ColorSampler::Cropped(CropRect::fit(
                color.width(),
                color.height(),
                config.output_width as usize,
                config.output_height as usize,
            )),
        };
        Ok(render(depth, color, config, sampler))
    }

    /// Like `process`, but with a caller-supplied depth-to-color mapping
    /// (for rigs with a measured offset between the two sensors).
    /// `config.mapping` is ignored.
    pub fn process_with_mapping(
        &self,
        frame: &FramePair<'_>,
        config: &ProcessingConfig,
        mapping: CoordinateMapping,
    ) -> Result<OutputBuffer> {
        config.validate()?;
        let (depth, color) = frame.require()?;
        Ok(render(depth, color, config, ColorSampler::Mapped(mapping)))
    }
}

/// Shorthand for `FrameProcessor::new().process(frame, config)`.
pub fn process_frame(frame: &FramePair<'_>, config: &ProcessingConfig) -> Result<OutputBuffer> {
    FrameProcessor::new().process(frame, config)
}

fn render(depth: DepthFrame<'_>, color: ColorFrame<'_>, config: &ProcessingConfig, sampler: ColorSampler) -> OutputBuffer {
    let out_w = config.output_width as usize;
    let out_h = config.output_height as usize;
    let pass = Pass {
        depth,
        color,
        crop: CropRect::fit(depth.width(), depth.height(), out_w, out_h),
        sampler,
        out_w,
        out_h,
        depth_threshold: config.depth_threshold,
        // validated to 0..=255
        darkness_milli: config.darkness_threshold as u32 * 1000,
        mirrored: config.is_mirrored,
    };

    let mut data = vec![0u8; out_w * out_h * 4];

    // Rows are disjoint chunks; no synchronization beyond the join.
    #[cfg(feature = "parallel")]
    data.par_chunks_mut(out_w * 4)
        .enumerate()
        .for_each(|(y, row)| pass.fill_row(y, row));

    #[cfg(not(feature = "parallel"))]
    data.chunks_mut(out_w * 4)
        .enumerate()
        .for_each(|(y, row)| pass.fill_row(y, row));

    OutputBuffer { width: out_w, height: out_h, data }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cfg(w: u32, h: u32) -> ProcessingConfig {
        ProcessingConfig { output_width: w, output_height: h, ..Default::default() }
    }

    #[test]
    fn test_luminance_weights_follow_channel_order() {
        // pure red in BGR layout
        let bgr_red = [0u8, 0, 255];
        assert!((luminance(&bgr_red, ChannelOrder::Bgr) - 0.299 * 255.0).abs() < 1e-9);
        assert!((luminance(&bgr_red, ChannelOrder::Rgb) - 0.114 * 255.0).abs() < 1e-9);
        assert_eq!(luminance(&[0u8, 0, 0], ChannelOrder::Bgr), 0.0);
    }

    #[test]
    fn test_luminance_milli_is_exact() {
        assert_eq!(luminance_milli(&[0u8, 0, 255], ChannelOrder::Bgr), 299 * 255);
        assert_eq!(luminance_milli(&[0u8, 0, 255], ChannelOrder::Rgb), 114 * 255);
        for g in 0..=255u8 {
            assert_eq!(luminance_milli(&[g, g, g], ChannelOrder::Bgr), 1000 * u32::from(g));
        }
    }

    #[test]
    fn test_gray_at_threshold_is_off() {
        let depth = [1000u16];
        let d = DepthFrame::new(1, 1, &depth).unwrap();
        for g in 0..=255u8 {
            let gray = [g, g, g];
            let pair = FramePair::new(d, ColorFrame::new(1, 1, ChannelOrder::Bgr, &gray).unwrap());

            let at = ProcessingConfig { darkness_threshold: i32::from(g), ..cfg(1, 1) };
            assert!(!process_frame(&pair, &at).unwrap().is_lit(0, 0), "gray {g} lit at threshold {g}");

            if g < 255 {
                let above = ProcessingConfig { darkness_threshold: i32::from(g) + 1, ..cfg(1, 1) };
                assert!(process_frame(&pair, &above).unwrap().is_lit(0, 0), "gray {g} off at threshold {}", g + 1);
            }
        }
    }

    #[test]
    fn test_single_pixel_lit_and_off() {
        let depth = [1000u16];
        let dark = [10u8, 10, 10];
        let bright = [200u8, 200, 200];

        let d = DepthFrame::new(1, 1, &depth).unwrap();
        let pair = FramePair::new(d, ColorFrame::new(1, 1, ChannelOrder::Bgr, &dark).unwrap());
        let out = process_frame(&pair, &cfg(1, 1)).unwrap();
        assert_eq!(out.as_bytes(), &[255, 255, 255, 255]);

        let pair = FramePair::new(d, ColorFrame::new(1, 1, ChannelOrder::Bgr, &bright).unwrap());
        let out = process_frame(&pair, &cfg(1, 1)).unwrap();
        assert_eq!(out.as_bytes(), &[0, 0, 0, 255]);
    }

    #[test]
    fn test_config_checked_before_frames() {
        // An empty pair would be MissingFrame; the bad config must win.
        let bad = ProcessingConfig { depth_threshold: 0, ..Default::default() };
        assert!(matches!(process_frame(&FramePair::default(), &bad), Err(Error::Config(_))));
    }

    #[test]
    fn test_independent_crop_samples_color_crop() {
        // depth 2x1 all in range; color 4x1 where only the right half is dark.
        let depth = [500u16, 500];
        let color = [250, 250, 250, 250, 250, 250, 0, 0, 0, 0, 0, 0];
        let pair = FramePair::new(
            DepthFrame::new(2, 1, &depth).unwrap(),
            ColorFrame::new(4, 1, ChannelOrder::Bgr, &color).unwrap(),
        );
        let config = ProcessingConfig { mapping: MappingStrategy::IndependentCrop, ..cfg(2, 1) };
        let out = process_frame(&pair, &config).unwrap();
        assert!(!out.is_lit(0, 0));
        assert!(out.is_lit(1, 0));
    }

    #[test]
    fn test_shifted_mapping_turns_edge_off() {
        let depth = [500u16; 4];
        let color = [0u8; 12];
        let pair = FramePair::new(
            DepthFrame::new(4, 1, &depth).unwrap(),
            ColorFrame::new(4, 1, ChannelOrder::Bgr, &color).unwrap(),
        );
        let mapping = CoordinateMapping::affine(4, 1, 4, 1).shifted(1.0, 0.0);
        let out = FrameProcessor::new().process_with_mapping(&pair, &cfg(4, 1), mapping).unwrap();
        assert_eq!((0..4).map(|x| out.is_lit(x, 0)).collect::<Vec<_>>(), [true, true, true, false]);
    }

    #[test]
    fn test_pack_bits_msb_first() {
        let depth = [500u16, 0, 500, 0, 0, 0, 0, 0, 500];
        let color = [0u8; 27];
        let pair = FramePair::new(
            DepthFrame::new(9, 1, &depth).unwrap(),
            ColorFrame::new(9, 1, ChannelOrder::Bgr, &color).unwrap(),
        );
        let out = process_frame(&pair, &cfg(9, 1)).unwrap();
        assert_eq!(out.lit_count(), 3);
        assert_eq!(out.pack_bits(), vec![0b1010_0000, 0b1000_0000]);
    }

    #[test]
    fn test_save_png_reports_missing_directory() {
        let depth = [500u16];
        let color = [0u8; 3];
        let pair = FramePair::new(
            DepthFrame::new(1, 1, &depth).unwrap(),
            ColorFrame::new(1, 1, ChannelOrder::Bgr, &color).unwrap(),
        );
        let out = process_frame(&pair, &cfg(1, 1)).unwrap();

        let dir = std::env::temp_dir().join(format!("flipdot-missing-{}", std::process::id()));
        let result = out.save_png(&dir.join("nested").join("silhouette.png"));
        assert!(matches!(result, Err(Error::Snapshot(_))));
    }

    #[test]
    fn test_save_png_round_trip() {
        let depth = [500u16, 0];
        let color = [0u8; 6];
        let pair = FramePair::new(
            DepthFrame::new(2, 1, &depth).unwrap(),
            ColorFrame::new(2, 1, ChannelOrder::Bgr, &color).unwrap(),
        );
        let out = process_frame(&pair, &cfg(2, 1)).unwrap();

        let path = std::env::temp_dir().join(format!("flipdot-snapshot-{}.png", std::process::id()));
        out.save_png(&path).unwrap();
        let back = image::open(&path).unwrap().to_rgba8();
        std::fs::remove_file(&path).unwrap();
        assert_eq!(back.into_raw(), out.as_bytes());
    }

    #[test]
    fn test_to_image_keeps_pixels() {
        let depth = [500u16, 0];
        let color = [0u8; 6];
        let pair = FramePair::new(
            DepthFrame::new(2, 1, &depth).unwrap(),
            ColorFrame::new(2, 1, ChannelOrder::Bgr, &color).unwrap(),
        );
        let out = process_frame(&pair, &cfg(2, 1)).unwrap();
        let img = out.to_image().unwrap();
        assert_eq!(img.get_pixel(0, 0).0, [255, 255, 255, 255]);
        assert_eq!(img.get_pixel(1, 0).0, [0, 0, 0, 255]);
    }
}
