//! Crop and coordinate helpers for the silhouette pass.

/// Centered region of a source frame with the target's aspect ratio.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CropRect {
    pub crop_width: usize,
    pub crop_height: usize,
    pub start_x: usize,
    pub start_y: usize,
}

impl CropRect {
    /// Largest centered crop of `source` whose aspect equals `target`'s.
    /// All sizes must be non-zero.
    pub fn fit(source_width: usize, source_height: usize, target_width: usize, target_height: usize) -> Self {
        let source_aspect = source_width as f64 / source_height as f64;
        let target_aspect = target_width as f64 / target_height as f64;

        let (crop_width, crop_height) = if source_aspect > target_aspect {
            // source is wider: keep full height, trim the sides
            let h = source_height;
            ((h as f64 * target_aspect).round() as usize, h)
        } else {
            let w = source_width;
            (w, (w as f64 / target_aspect).round() as usize)
        };

        // Rounding never pushes past the source, but keep the subtraction safe.
        let crop_width = crop_width.min(source_width);
        let crop_height = crop_height.min(source_height);

        Self {
            crop_width,
            crop_height,
            start_x: (source_width - crop_width) / 2,
            start_y: (source_height - crop_height) / 2,
        }
    }

    /// Nearest source pixel for output pixel (x, y) of an `out_w`x`out_h` raster.
    #[inline]
    pub fn source_pixel(&self, x: usize, y: usize, out_w: usize, out_h: usize) -> (usize, usize) {
        (
            x * self.crop_width / out_w + self.start_x,
            y * self.crop_height / out_h + self.start_y,
        )
    }
}

/// Affine map from depth-frame pixels to color-frame pixels, with both
/// fields of view centered on each other.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CoordinateMapping {
    pub scale_x: f64,
    pub scale_y: f64,
    pub offset_x: f64,
    pub offset_y: f64,
    color_width: usize,
    color_height: usize,
}

impl CoordinateMapping {
    pub fn affine(depth_width: usize, depth_height: usize, color_width: usize, color_height: usize) -> Self {
        let (dw, dh) = (depth_width as f64, depth_height as f64);
        let (cw, ch) = (color_width as f64, color_height as f64);
        let scale_x = cw / dw;
        let scale_y = ch / dh;
        Self {
            scale_x,
            scale_y,
            // zero with these scales; centers the two fields of view
            offset_x: (cw - dw * scale_x) / 2.0,
            offset_y: (ch - dh * scale_y) / 2.0,
            color_width,
            color_height,
        }
    }

    /// Same mapping shifted by a fixed number of color pixels.
    pub fn shifted(self, dx: f64, dy: f64) -> Self {
        Self { offset_x: self.offset_x + dx, offset_y: self.offset_y + dy, ..self }
    }

    /// Color pixel for depth pixel (dx, dy), or `None` outside the color frame.
    #[inline]
    pub fn map(&self, dx: usize, dy: usize) -> Option<(usize, usize)> {
        let cx = (dx as f64 * self.scale_x + self.offset_x).floor();
        let cy = (dy as f64 * self.scale_y + self.offset_y).floor();
        if cx < 0.0 || cy < 0.0 {
            return None;
        }
        let (cx, cy) = (cx as usize, cy as usize);
        if cx >= self.color_width || cy >= self.color_height {
            return None;
        }
        Some((cx, cy))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_crop_wide_target_trims_height() {
        // 4:3 source, 2:1 target
        let c = CropRect::fit(640, 480, 128, 64);
        assert_eq!(c, CropRect { crop_width: 640, crop_height: 320, start_x: 0, start_y: 80 });
    }

    #[test]
    fn test_crop_narrow_target_trims_width() {
        // 16:9 source onto the 28x24 flip-disc wall
        let c = CropRect::fit(480, 270, 28, 24);
        assert_eq!(c.crop_height, 270);
        assert_eq!(c.crop_width, 315); // round(270 * 28 / 24)
        assert_eq!(c.start_x, 82);
        assert_eq!(c.start_y, 0);
    }

    #[test]
    fn test_crop_same_aspect_is_identity() {
        let c = CropRect::fit(640, 480, 320, 240);
        assert_eq!(c, CropRect { crop_width: 640, crop_height: 480, start_x: 0, start_y: 0 });
    }

    #[test]
    fn test_source_pixel_nearest_neighbour() {
        let c = CropRect::fit(640, 480, 128, 64);
        assert_eq!(c.source_pixel(0, 0, 128, 64), (0, 80));
        assert_eq!(c.source_pixel(127, 63, 128, 64), (635, 395));
    }

    #[test]
    fn test_affine_scales_and_offsets() {
        let m = CoordinateMapping::affine(480, 270, 424, 240);
        assert!((m.scale_x - 424.0 / 480.0).abs() < 1e-12);
        assert!((m.scale_y - 240.0 / 270.0).abs() < 1e-12);
        assert_eq!(m.offset_x, 0.0);
        assert_eq!(m.offset_y, 0.0);
        assert_eq!(m.map(0, 0), Some((0, 0)));
        assert_eq!(m.map(479, 269), Some((423, 239)));
    }

    #[test]
    fn test_map_out_of_bounds() {
        let m = CoordinateMapping::affine(4, 4, 4, 4).shifted(2.0, 0.0);
        assert_eq!(m.map(1, 0), Some((3, 0)));
        assert_eq!(m.map(2, 0), None);

        let m = CoordinateMapping::affine(4, 4, 4, 4).shifted(0.0, -1.0);
        assert_eq!(m.map(0, 0), None);
        assert_eq!(m.map(0, 1), Some((0, 0)));
    }
}
