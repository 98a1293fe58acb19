// Frame sources and the hand-off to the processing loop.
// A source runs on its own thread and pushes captures into a one-slot
// mailbox. If the consumer is still busy, the newer capture replaces the
// pending one: frames get dropped, never queued.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use nokhwa::{
    Camera,
    pixel_format::RgbFormat,
    utils::{
        CameraFormat, CameraIndex, FrameFormat, RequestedFormat, RequestedFormatType, Resolution,
    },
};
use parking_lot::{Condvar, Mutex};

use crate::config::CameraConfig;
use crate::error::{Error, Result};
use crate::types::{ChannelOrder, OwnedFramePair};

/// What a source reports on each poll.
#[derive(Debug)]
pub enum StreamEvent {
    /// The stream is open and delivering at this color resolution.
    Started { width: usize, height: usize },
    Frame(OwnedFramePair),
    /// No more frames will come.
    Ended,
}

/// Something that produces depth + color captures, one poll at a time.
pub trait FrameSource {
    /// Block until the next event is available.
    fn next_event(&mut self) -> Result<StreamEvent>;
}

/* ------------------------------ Webcam source ------------------------------ */

/// A plain webcam through nokhwa. It has no depth sensor, so every capture
/// is paired with a flat depth plane at `plane_depth`; only the darkness
/// test then shapes the silhouette.
pub struct WebcamSource {
    cam: Camera,
    plane_depth: u16,
    sequence: u64,
    announced: bool,
}

impl WebcamSource {
    /// Open camera `config.index` near the requested resolution and start streaming.
    pub fn open(config: &CameraConfig) -> Result<Self> {
        // 1) Choose the device (0 = default webcam)
        let idx = CameraIndex::Index(config.index);

        let fmt = CameraFormat::new(
            Resolution::new(config.width, config.height),
            FrameFormat::YUYV, // uncompressed; cheap to convert to RGB
            config.fps,
        );

        // 2) Ask for RGB frames close to that format.
        let req = RequestedFormat::new::<RgbFormat>(RequestedFormatType::Closest(fmt));

        // 3) Create the camera (this might fail if no device exists).
        let mut cam = Camera::new(idx, req)
            .map_err(|e| Error::CameraInit(format!("Create camera: {e}")))?;

        // 4) Start streaming.
        cam.open_stream()
            .map_err(|e| Error::CameraInit(format!("Open stream: {e}")))?;

        Ok(Self {
            cam,
            plane_depth: config.plane_depth,
            sequence: 0,
            announced: false,
        })
    }
}

impl FrameSource for WebcamSource {
    fn next_event(&mut self) -> Result<StreamEvent> {
        if !self.announced {
            self.announced = true;
            // The stream might have picked a slightly different resolution.
            let actual = self.cam.resolution();
            return Ok(StreamEvent::Started {
                width: actual.width() as usize,
                height: actual.height() as usize,
            });
        }

        let frame = self
            .cam
            .frame()
            .map_err(|e| Error::CameraFrame(format!("Fetch frame: {e}")))?;
        let rgb = frame
            .decode_image::<RgbFormat>()
            .map_err(|e| Error::CameraFrame(format!("Decode RGB: {e}")))?;

        let (w, h) = rgb.dimensions();
        let (w, h) = (w as usize, h as usize);
        self.sequence += 1;
        Ok(StreamEvent::Frame(OwnedFramePair {
            sequence: self.sequence,
            depth_width: w,
            depth_height: h,
            depth: vec![self.plane_depth; w * h],
            color_width: w,
            color_height: h,
            color_order: ChannelOrder::Rgb,
            color: rgb.into_raw(),
        }))
    }
}

impl Drop for WebcamSource {
    fn drop(&mut self) {
        if let Err(e) = self.cam.stop_stream() {
            log::warn!("Failed to stop camera stream: {e}");
        }
    }
}

/* ----------------------------- Synthetic source ---------------------------- */

/// Depth resolution of the synthetic rig (a 16:9 depth sensor).
pub const SYNTHETIC_DEPTH_SIZE: (usize, usize) = (480, 270);
/// Color resolution of the synthetic rig (different from depth on purpose).
pub const SYNTHETIC_COLOR_SIZE: (usize, usize) = (424, 240);

/// Deterministic test scene: a dark disc at 0.8 m sweeping left to right
/// in front of a bright wall at 4 m. Frames are BGR like a depth camera's.
pub struct SyntheticSource {
    sequence: u64,
    limit: Option<u64>,
    interval: Duration,
    announced: bool,
}

impl SyntheticSource {
    /// `limit` frames, then `Ended`; `None` runs forever.
    pub fn new(limit: Option<u64>) -> Self {
        Self { sequence: 0, limit, interval: Duration::ZERO, announced: false }
    }

    /// Pace frames like a camera at `fps` (0 = as fast as polled).
    pub fn with_fps(mut self, fps: u32) -> Self {
        self.interval = if fps == 0 { Duration::ZERO } else { Duration::from_secs(1) / fps };
        self
    }

    /// The capture for frame number `sequence`.
    pub fn render(sequence: u64) -> OwnedFramePair {
        let (dw, dh) = SYNTHETIC_DEPTH_SIZE;
        let (cw, ch) = SYNTHETIC_COLOR_SIZE;

        // disc center travels across the frame, as a fraction of width
        let phase = (sequence % 120) as f64 / 120.0;
        let (fx, fy, fr) = (0.15 + 0.7 * phase, 0.5, 0.2);
        let inside = |x: usize, y: usize, w: usize, h: usize| {
            let dx = (x as f64 + 0.5) / w as f64 - fx;
            // radius measured in heights so the disc stays round
            let dy = ((y as f64 + 0.5) / h as f64 - fy) * h as f64 / w as f64;
            (dx * dx + dy * dy).sqrt() < fr * h as f64 / w as f64
        };

        let mut depth = Vec::with_capacity(dw * dh);
        for y in 0..dh {
            for x in 0..dw {
                depth.push(if inside(x, y, dw, dh) { 800 } else { 4000 });
            }
        }

        let mut color = Vec::with_capacity(cw * ch * 3);
        for y in 0..ch {
            for x in 0..cw {
                let v = if inside(x, y, cw, ch) { 15 } else { 230 };
                color.extend_from_slice(&[v, v, v]);
            }
        }

        OwnedFramePair {
            sequence,
            depth_width: dw,
            depth_height: dh,
            depth,
            color_width: cw,
            color_height: ch,
            color_order: ChannelOrder::Bgr,
            color,
        }
    }
}

impl FrameSource for SyntheticSource {
    fn next_event(&mut self) -> Result<StreamEvent> {
        if !self.announced {
            self.announced = true;
            let (width, height) = SYNTHETIC_COLOR_SIZE;
            return Ok(StreamEvent::Started { width, height });
        }
        if self.limit.is_some_and(|limit| self.sequence >= limit) {
            return Ok(StreamEvent::Ended);
        }
        if !self.interval.is_zero() {
            std::thread::sleep(self.interval);
        }
        self.sequence += 1;
        Ok(StreamEvent::Frame(Self::render(self.sequence)))
    }
}

/* ------------------------------- Hand-off slot ------------------------------ */

/// What the consumer gets from `LatestFrame::wait`.
#[derive(Debug)]
pub enum Received {
    Frame(OwnedFramePair),
    Ended,
    Timeout,
}

#[derive(Default)]
struct Slot {
    pending: Option<OwnedFramePair>,
    ended: bool,
    dropped: u64,
}

/// One-frame mailbox between a capture thread and the processing loop.
#[derive(Default)]
pub struct LatestFrame {
    slot: Mutex<Slot>,
    ready: Condvar,
}

impl LatestFrame {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store `frame`, replacing any capture nobody has taken yet.
    pub fn publish(&self, frame: OwnedFramePair) {
        let mut slot = self.slot.lock();
        if let Some(stale) = slot.pending.replace(frame) {
            slot.dropped += 1;
            log::debug!("Dropped frame {} (consumer busy)", stale.sequence);
        }
        self.ready.notify_one();
    }

    /// Mark the stream finished; waiters wake up with `Ended` once drained.
    pub fn finish(&self) {
        self.slot.lock().ended = true;
        self.ready.notify_all();
    }

    /// Take the pending capture without blocking.
    pub fn take(&self) -> Option<OwnedFramePair> {
        self.slot.lock().pending.take()
    }

    /// Wait up to `timeout` for a capture. A pending frame is returned
    /// before `Ended` is reported.
    pub fn wait(&self, timeout: Duration) -> Received {
        let deadline = Instant::now() + timeout;
        let mut slot = self.slot.lock();
        while slot.pending.is_none() && !slot.ended {
            if self.ready.wait_until(&mut slot, deadline).timed_out() {
                break;
            }
        }
        match slot.pending.take() {
            Some(frame) => Received::Frame(frame),
            None if slot.ended => Received::Ended,
            None => Received::Timeout,
        }
    }

    /// Captures overwritten before they were taken.
    pub fn dropped(&self) -> u64 {
        self.slot.lock().dropped
    }
}

/// Failed polls in a row before the capture thread gives up on a source.
pub const MAX_CONSECUTIVE_FAILURES: u32 = 50;

/// A frame source running on a background thread, feeding a `LatestFrame`.
pub struct CaptureThread {
    latest: Arc<LatestFrame>,
    running: Arc<AtomicBool>,
    handle: Option<JoinHandle<()>>,
}

impl CaptureThread {
    /// Spawn the thread. `open` builds the source on that thread, since
    /// camera handles are not always `Send`.
    pub fn spawn<S, F>(open: F) -> Result<Self>
    where
        S: FrameSource,
        F: FnOnce() -> Result<S> + Send + 'static,
    {
        let latest = Arc::new(LatestFrame::new());
        let running = Arc::new(AtomicBool::new(true));

        let latest_thread = latest.clone();
        let running_thread = running.clone();
        let handle = std::thread::Builder::new()
            .name("frame-capture".to_string())
            .spawn(move || {
                match open() {
                    Ok(mut source) => Self::capture_loop(&mut source, &latest_thread, &running_thread),
                    Err(e) => log::error!("Failed to open frame source: {e}"),
                }
                latest_thread.finish();
            })?;

        Ok(Self { latest, running, handle: Some(handle) })
    }

    fn capture_loop(source: &mut impl FrameSource, latest: &LatestFrame, running: &AtomicBool) {
        let mut failures = 0;
        while running.load(Ordering::Acquire) {
            match source.next_event() {
                Ok(StreamEvent::Started { width, height }) => {
                    failures = 0;
                    log::info!("Stream started ({width}x{height})");
                }
                Ok(StreamEvent::Frame(frame)) => {
                    failures = 0;
                    latest.publish(frame);
                }
                Ok(StreamEvent::Ended) => {
                    log::info!("Streaming ended.");
                    break;
                }
                Err(e) => {
                    failures += 1;
                    if failures >= MAX_CONSECUTIVE_FAILURES {
                        log::error!("Capture failed {failures} times in a row, ending stream: {e}");
                        break;
                    }
                    log::warn!("Capture failed: {e}");
                    std::thread::sleep(Duration::from_millis(10));
                }
            }
        }
        log::info!("Capture thread stopped");
    }

    pub fn latest(&self) -> &LatestFrame {
        &self.latest
    }

    /// Stop polling the source and join the thread.
    pub fn stop(&mut self) {
        self.running.store(false, Ordering::Release);
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                log::error!("Capture thread panicked");
            }
        }
    }
}

impl Drop for CaptureThread {
    fn drop(&mut self) {
        self.stop();
    }
}
