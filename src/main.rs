// Live preview: camera -> silhouette -> on-screen dot wall.
// • Usage: flipdot-silhouette [config.json]
// • M toggles mirroring, S saves a PNG of the current silhouette, ESC quits.
// • RUST_LOG=debug shows dropped frames and per-panel dot counts.

use std::path::Path;
use std::time::{Duration, Instant};

use flipdot_silhouette::camera::{CaptureThread, Received, SyntheticSource, WebcamSource};
use flipdot_silhouette::config::{AppConfig, SourceKind};
use flipdot_silhouette::display::{render_dots, Drawer, Screen};
use flipdot_silhouette::{Error, FrameProcessor, OutputBuffer};

fn main() -> Result<(), Error> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    /* --- Config ---
       Missing file argument means all defaults. */
    let app = match std::env::args().nth(1) {
        Some(path) => AppConfig::load(Path::new(&path))?,
        None => AppConfig::default(),
    };
    let mut processing = app.effective_processing();
    processing.validate()?;
    log::info!(
        "Output {}x{}, depth <= {}, darkness < {}, mirrored: {}",
        processing.output_width,
        processing.output_height,
        processing.depth_threshold,
        processing.darkness_threshold,
        processing.is_mirrored
    );

    /* --- Frame source on its own thread --- */
    let camera = app.camera.clone();
    let mut capture = match camera.source {
        SourceKind::Webcam => CaptureThread::spawn(move || WebcamSource::open(&camera))?,
        SourceKind::Synthetic => {
            let fps = camera.fps;
            CaptureThread::spawn(move || Ok(SyntheticSource::new(None).with_fps(fps)))?
        }
    };

    /* --- Preview window sized to the dot wall --- */
    let (dot_size, dot_gap) = (app.preview.dot_size.max(1), app.preview.dot_gap);
    let mut screen = Screen::for_dots(
        processing.output_width as usize,
        processing.output_height as usize,
        dot_size,
        dot_gap,
    );
    let mut drawer = Drawer::new("Flip-dot Silhouette", screen.width, screen.height)?;

    let processor = FrameProcessor::new();
    let mut last: Option<(u64, OutputBuffer)> = None;

    let mut last_fps_time = Instant::now();
    let mut frames_this_second: u32 = 0;

    /* ------------------------------ Main loop ------------------------------ */
    while drawer.is_open() && !drawer.esc_pressed() {
        if drawer.m_pressed_once() {
            processing.is_mirrored = !processing.is_mirrored;
            log::info!("Mirroring {}", if processing.is_mirrored { "on" } else { "off" });
        }

        match capture.latest().wait(Duration::from_millis(50)) {
            Received::Frame(frame) => {
                // A bad frame is skipped; the stream keeps going.
                let result = frame.as_pair().and_then(|pair| processor.process(&pair, &processing));
                match result {
                    Ok(out) => {
                        if let Some(layout) = &app.layout {
                            for panel in layout.panels(&out)? {
                                let dots: u32 = panel.rows.iter().map(|r| r.count_ones()).sum();
                                log::debug!("Panel {}: {} dots set", panel.address, dots);
                            }
                        }
                        render_dots(&out, &mut screen, dot_size, dot_gap);
                        last = Some((frame.sequence, out));
                        frames_this_second += 1;
                    }
                    Err(e) => log::warn!("Skipping frame {}: {e}", frame.sequence),
                }
            }
            Received::Ended => {
                log::info!("Source ended; closing preview");
                break;
            }
            Received::Timeout => {}
        }

        if drawer.s_pressed_once() {
            if let Some((sequence, out)) = &last {
                let path = app.preview.snapshot_dir.join(format!("silhouette-{sequence}.png"));
                // A failed snapshot is reported; the preview keeps running.
                match out.save_png(&path) {
                    Ok(()) => log::info!("Saved {}", path.display()),
                    Err(e) => log::warn!("Snapshot {} not saved: {e}", path.display()),
                }
            }
        }

        drawer.present(&screen)?;

        /* FPS counter (terminal, once per second) */
        let now = Instant::now();
        if now.duration_since(last_fps_time) >= Duration::from_secs(1) {
            let secs = now.duration_since(last_fps_time).as_secs_f32();
            log::info!(
                "FPS: {:.1} (dropped {} so far)",
                frames_this_second as f32 / secs,
                capture.latest().dropped()
            );
            frames_this_second = 0;
            last_fps_time = now;
        }
    }

    capture.stop();
    Ok(())
}
