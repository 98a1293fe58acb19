// Frame types handed over by the camera side.
// The views borrow the source's sample buffers; nothing here copies pixels.

use crate::error::{Error, Result};

/// Byte order of the three channels in a color pixel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ChannelOrder {
    /// Blue, green, red (depth-camera color streams).
    #[default]
    Bgr,
    /// Red, green, blue (webcams decoded through `image`).
    Rgb,
}

impl ChannelOrder {
    /// Offsets of (red, green, blue) inside one pixel triplet.
    #[inline]
    pub fn rgb_offsets(self) -> (usize, usize, usize) {
        match self {
            ChannelOrder::Bgr => (2, 1, 0),
            ChannelOrder::Rgb => (0, 1, 2),
        }
    }
}

fn check_shape(kind: &str, width: usize, height: usize, channels: usize, len: usize) -> Result<()> {
    if width == 0 || height == 0 {
        return Err(Error::InvalidFrame(format!("{kind} frame is {width}x{height}")));
    }
    let expected = width
        .checked_mul(height)
        .and_then(|n| n.checked_mul(channels))
        .ok_or_else(|| Error::InvalidFrame(format!("{kind} frame {width}x{height} is too large")))?;
    if len != expected {
        return Err(Error::InvalidFrame(format!(
            "{kind} frame {width}x{height} needs {expected} samples, got {len}"
        )));
    }
    Ok(())
}

/// 16-bit depth samples, row-major. 0 means the sensor got no return.
#[derive(Debug, Clone, Copy)]
pub struct DepthFrame<'a> {
    width: usize,
    height: usize,
    samples: &'a [u16],
}

impl<'a> DepthFrame<'a> {
    pub fn new(width: usize, height: usize, samples: &'a [u16]) -> Result<Self> {
        check_shape("depth", width, height, 1, samples.len())?;
        Ok(Self { width, height, samples })
    }

    /// View a raw byte region as `u16` samples in the host's byte order.
    /// Depth cameras emit little-endian samples, so this assumes a
    /// little-endian host. Fails if the region is misaligned or has an odd length.
    pub fn from_bytes(width: usize, height: usize, bytes: &'a [u8]) -> Result<Self> {
        let samples: &[u16] = bytemuck::try_cast_slice(bytes)
            .map_err(|e| Error::InvalidFrame(format!("depth bytes: {e}")))?;
        Self::new(width, height, samples)
    }

    pub fn width(&self) -> usize { self.width }
    pub fn height(&self) -> usize { self.height }

    #[inline]
    pub fn at(&self, x: usize, y: usize) -> u16 {
        self.samples[y * self.width + x]
    }
}

/// 8-bit, 3-channel color samples, row-major.
#[derive(Debug, Clone, Copy)]
pub struct ColorFrame<'a> {
    width: usize,
    height: usize,
    order: ChannelOrder,
    data: &'a [u8],
}

impl<'a> ColorFrame<'a> {
    pub fn new(width: usize, height: usize, order: ChannelOrder, data: &'a [u8]) -> Result<Self> {
        check_shape("color", width, height, 3, data.len())?;
        Ok(Self { width, height, order, data })
    }

    pub fn width(&self) -> usize { self.width }
    pub fn height(&self) -> usize { self.height }
    pub fn order(&self) -> ChannelOrder { self.order }

    /// The raw triplet at (x, y), in this frame's channel order.
    #[inline]
    pub fn pixel(&self, x: usize, y: usize) -> &'a [u8] {
        let i = (y * self.width + x) * 3;
        &self.data[i..i + 3]
    }
}

/// One synchronized capture. Either half may be missing.
#[derive(Debug, Clone, Copy, Default)]
pub struct FramePair<'a> {
    pub depth: Option<DepthFrame<'a>>,
    pub color: Option<ColorFrame<'a>>,
}

impl<'a> FramePair<'a> {
    pub fn new(depth: DepthFrame<'a>, color: ColorFrame<'a>) -> Self {
        Self { depth: Some(depth), color: Some(color) }
    }

    /// Both halves, or `MissingFrame` naming the absent one.
    pub fn require(&self) -> Result<(DepthFrame<'a>, ColorFrame<'a>)> {
        let depth = self.depth.ok_or(Error::MissingFrame("depth"))?;
        let color = self.color.ok_or(Error::MissingFrame("color"))?;
        Ok((depth, color))
    }
}

/// Owned buffers for a capture, as produced by a frame source.
#[derive(Debug, Clone)]
pub struct OwnedFramePair {
    pub sequence: u64,
    pub depth_width: usize,
    pub depth_height: usize,
    pub depth: Vec<u16>,
    pub color_width: usize,
    pub color_height: usize,
    pub color_order: ChannelOrder,
    pub color: Vec<u8>,
}

impl OwnedFramePair {
    /// Borrow the buffers as validated views.
    pub fn as_pair(&self) -> Result<FramePair<'_>> {
        let depth = DepthFrame::new(self.depth_width, self.depth_height, &self.depth)?;
        let color = ColorFrame::new(self.color_width, self.color_height, self.color_order, &self.color)?;
        Ok(FramePair::new(depth, color))
    }
}
