// Preview window that stands in for the dot display.
// Each silhouette pixel becomes a square "dot" with a dark gap around it,
// so the window looks like the flip-dot wall would.

use minifb::{Key, KeyRepeat, Window, WindowOptions};

use crate::error::{Error, Result};
use crate::silhouette::OutputBuffer;

/// Dot showing its bright side (0x00RRGGBB for minifb).
pub const DOT_ON: u32 = 0x00_F2_E0_40;
/// Dot showing its dark side.
pub const DOT_OFF: u32 = 0x00_22_22_22;
/// Frame between dots.
pub const GAP: u32 = 0x00_00_00_00;

/// A 0x00RRGGBB screen buffer, the format minifb wants.
pub struct Screen {
    pub width: usize,
    pub height: usize,
    pub pixels: Vec<u32>,
}

impl Screen {
    /// Screen big enough for a `dots_w`x`dots_h` wall.
    pub fn for_dots(dots_w: usize, dots_h: usize, dot_size: usize, dot_gap: usize) -> Self {
        let pitch = dot_size + dot_gap;
        let width = dots_w * pitch + dot_gap;
        let height = dots_h * pitch + dot_gap;
        Self { width, height, pixels: vec![GAP; width * height] }
    }
}

/// Paint `output` as dots of `dot_size` pixels separated by `dot_gap`.
/// `screen` must come from `Screen::for_dots` with the same sizes.
pub fn render_dots(output: &OutputBuffer, screen: &mut Screen, dot_size: usize, dot_gap: usize) {
    let pitch = dot_size + dot_gap;
    for dy in 0..output.height() {
        for dx in 0..output.width() {
            let color = if output.is_lit(dx, dy) { DOT_ON } else { DOT_OFF };
            let (x0, y0) = (dot_gap + dx * pitch, dot_gap + dy * pitch);
            for y in y0..y0 + dot_size {
                let row = y * screen.width;
                screen.pixels[row + x0..row + x0 + dot_size].fill(color);
            }
        }
    }
}

pub struct Drawer {
    window: Window, // the on-screen window you see
}

impl Drawer {
    /// Create a window of the given size.
    pub fn new(title: &str, width: usize, height: usize) -> Result<Self> {
        let mut window = Window::new(title, width, height, WindowOptions::default())
            .map_err(|e| Error::WindowInit(e.to_string()))?;
        window.set_target_fps(60);
        Ok(Self { window })
    }

    /// Push the screen buffer to the window.
    pub fn present(&mut self, screen: &Screen) -> Result<()> {
        self.window
            .update_with_buffer(&screen.pixels, screen.width, screen.height)
            .map_err(|e| Error::WindowUpdate(e.to_string()))
    }

    /// Returns false when the user closes the window (so we can stop the loop).
    pub fn is_open(&self) -> bool {
        self.window.is_open()
    }

    pub fn esc_pressed(&self) -> bool {
        self.window.is_key_down(Key::Escape)
    }

    // flips the mirroring flag in main
    pub fn m_pressed_once(&self) -> bool {
        self.window.is_key_pressed(Key::M, KeyRepeat::No)
    }

    // saves a PNG of the current silhouette
    pub fn s_pressed_once(&self) -> bool {
        self.window.is_key_pressed(Key::S, KeyRepeat::No)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ProcessingConfig;
    use crate::silhouette::process_frame;
    use crate::types::{ChannelOrder, ColorFrame, DepthFrame, FramePair};

    #[test]
    fn test_render_dots_layout() {
        // 2x1 wall: left dot lit, right dot off
        let depth = [500u16, 0];
        let color = [0u8; 6];
        let pair = FramePair::new(
            DepthFrame::new(2, 1, &depth).unwrap(),
            ColorFrame::new(2, 1, ChannelOrder::Bgr, &color).unwrap(),
        );
        let config = ProcessingConfig { output_width: 2, output_height: 1, ..Default::default() };
        let out = process_frame(&pair, &config).unwrap();

        let mut screen = Screen::for_dots(2, 1, 3, 1);
        assert_eq!((screen.width, screen.height), (9, 5));
        render_dots(&out, &mut screen, 3, 1);

        let px = |x: usize, y: usize| screen.pixels[y * screen.width + x];
        assert_eq!(px(0, 0), GAP);
        assert_eq!(px(1, 1), DOT_ON);
        assert_eq!(px(3, 3), DOT_ON);
        assert_eq!(px(4, 2), GAP);
        assert_eq!(px(5, 1), DOT_OFF);
        assert_eq!(px(7, 3), DOT_OFF);
        assert_eq!(px(8, 4), GAP);
    }
}
