// One error type for the whole crate.
// Every variant states *where* things went wrong.
use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    /// A processing parameter is out of range; nothing was processed.
    #[error("Config error: {0}")]
    Config(String),

    /// The frame pair arrived without its depth or color half.
    #[error("Missing frame: {0} frame is required")]
    MissingFrame(&'static str),

    /// Frame dimensions and sample buffer disagree (or the frame is empty).
    #[error("Invalid frame: {0}")]
    InvalidFrame(String),

    #[error("Camera init error: {0}")]
    CameraInit(String), // Opening/starting the camera failed

    #[error("Camera frame error: {0}")]
    CameraFrame(String), // Grabbing/decoding a frame failed

    #[error("Window init error: {0}")]
    WindowInit(String), // Creating the preview window failed

    #[error("Window update error: {0}")]
    WindowUpdate(String), // Updating the window buffer failed

    #[error("Config file error: {0}")]
    ConfigFile(#[from] serde_json::Error),

    #[error("Snapshot error: {0}")]
    Snapshot(#[from] image::ImageError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_messages_name_the_failure() {
        let e = Error::MissingFrame("depth");
        assert_eq!(e.to_string(), "Missing frame: depth frame is required");

        let e = Error::Config("depth threshold must be positive".into());
        assert!(e.to_string().starts_with("Config error"));
    }
}
