// Physical layout of a flip-dot wall: a grid of equally sized panels,
// each with a bus address. The silhouette is produced at the wall's full
// resolution and sliced here into one bitmap per panel.
// Serial transport and framing belong to the display driver, not here.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::silhouette::OutputBuffer;

/// Widest panel whose rows fit one `u32` bitmask.
pub const MAX_PANEL_WIDTH: u32 = 32;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PanelSize {
    pub width: u32,
    pub height: u32,
}

/// Panel grid, rows listed top to bottom, addresses left to right.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DisplayLayout {
    pub panel: PanelSize,
    pub grid: Vec<Vec<u8>>,
}

/// Dots of one panel. Bit `x` of `rows[y]` is the dot at column `x`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PanelFrame {
    pub address: u8,
    pub rows: Vec<u32>,
}

impl DisplayLayout {
    fn columns(&self) -> u32 {
        self.grid.first().map_or(0, |row| row.len() as u32)
    }

    /// Wall width in dots.
    pub fn width(&self) -> u32 {
        self.columns() * self.panel.width
    }

    /// Wall height in dots.
    pub fn height(&self) -> u32 {
        self.grid.len() as u32 * self.panel.height
    }

    pub fn validate(&self) -> Result<()> {
        if self.panel.width == 0 || self.panel.height == 0 {
            return Err(Error::Config("panel size must be non-zero".into()));
        }
        if self.panel.width > MAX_PANEL_WIDTH {
            return Err(Error::Config(format!(
                "panel width {} exceeds {MAX_PANEL_WIDTH}",
                self.panel.width
            )));
        }
        let columns = self.columns();
        if columns == 0 {
            return Err(Error::Config("layout grid is empty".into()));
        }
        let mut seen = HashSet::new();
        for (i, row) in self.grid.iter().enumerate() {
            if row.len() as u32 != columns {
                return Err(Error::Config(format!(
                    "layout row {i} has {} panels, expected {columns}",
                    row.len()
                )));
            }
            for &address in row {
                if !seen.insert(address) {
                    return Err(Error::Config(format!("panel address {address} used twice")));
                }
            }
        }
        Ok(())
    }

    /// Slice a wall-sized silhouette into per-panel bitmaps, in grid order.
    pub fn panels(&self, output: &OutputBuffer) -> Result<Vec<PanelFrame>> {
        if output.width() != self.width() as usize || output.height() != self.height() as usize {
            return Err(Error::InvalidFrame(format!(
                "silhouette is {}x{}, layout is {}x{}",
                output.width(),
                output.height(),
                self.width(),
                self.height()
            )));
        }

        let (pw, ph) = (self.panel.width as usize, self.panel.height as usize);
        let mut frames = Vec::with_capacity(self.grid.len() * self.columns() as usize);
        for (gy, row) in self.grid.iter().enumerate() {
            for (gx, &address) in row.iter().enumerate() {
                let rows = (0..ph)
                    .map(|y| {
                        (0..pw).fold(0u32, |bits, x| {
                            if output.is_lit(gx * pw + x, gy * ph + y) {
                                bits | (1 << x)
                            } else {
                                bits
                            }
                        })
                    })
                    .collect();
                frames.push(PanelFrame { address, rows });
            }
        }
        Ok(frames)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ProcessingConfig;
    use crate::silhouette::process_frame;
    use crate::types::{ChannelOrder, ColorFrame, DepthFrame, FramePair};

    fn wall() -> DisplayLayout {
        // the 4x6 grid of 7x4 panels
        DisplayLayout {
            panel: PanelSize { width: 7, height: 4 },
            grid: (0..6u8).map(|r| (1..=4u8).map(|c| r * 4 + c).collect()).collect(),
        }
    }

    #[test]
    fn test_wall_size() {
        let w = wall();
        assert!(w.validate().is_ok());
        assert_eq!((w.width(), w.height()), (28, 24));
    }

    #[test]
    fn test_validate_rejects_bad_grids() {
        let mut w = wall();
        w.grid[2].pop();
        assert!(matches!(w.validate(), Err(Error::Config(_))));

        let mut w = wall();
        w.grid[1][0] = 1;
        assert!(matches!(w.validate(), Err(Error::Config(_))));

        let w = DisplayLayout { panel: PanelSize { width: 0, height: 4 }, ..wall() };
        assert!(matches!(w.validate(), Err(Error::Config(_))));

        let w = DisplayLayout { panel: PanelSize { width: 7, height: 4 }, grid: vec![vec![]] };
        assert!(matches!(w.validate(), Err(Error::Config(_))));
    }

    #[test]
    fn test_panels_split_silhouette() {
        let layout = DisplayLayout {
            panel: PanelSize { width: 2, height: 1 },
            grid: vec![vec![10, 20]],
        };
        // 4x1 frame, dots 0 and 3 present
        let depth = [500u16, 0, 0, 500];
        let color = [0u8; 12];
        let pair = FramePair::new(
            DepthFrame::new(4, 1, &depth).unwrap(),
            ColorFrame::new(4, 1, ChannelOrder::Bgr, &color).unwrap(),
        );
        let config = ProcessingConfig { output_width: 4, output_height: 1, ..Default::default() };
        let out = process_frame(&pair, &config).unwrap();

        let panels = layout.panels(&out).unwrap();
        assert_eq!(panels, vec![
            PanelFrame { address: 10, rows: vec![0b01] },
            PanelFrame { address: 20, rows: vec![0b10] },
        ]);
    }

    #[test]
    fn test_panels_size_mismatch() {
        let depth = [500u16];
        let color = [0u8; 3];
        let pair = FramePair::new(
            DepthFrame::new(1, 1, &depth).unwrap(),
            ColorFrame::new(1, 1, ChannelOrder::Bgr, &color).unwrap(),
        );
        let config = ProcessingConfig { output_width: 1, output_height: 1, ..Default::default() };
        let out = process_frame(&pair, &config).unwrap();
        assert!(matches!(wall().panels(&out), Err(Error::InvalidFrame(_))));
    }
}
