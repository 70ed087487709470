//! Generic `Camera` trait and supporting types for image-capture hardware.

use doda_types::DodaError;

/// MIME type used for unencoded greyscale frames.
pub const RAW_GRAY_MIME: &str = "image/x-raw-gray";

/// An image returned by a camera driver.
#[derive(Debug, Clone)]
pub struct CameraFrame {
    /// Frame width in pixels (0 when the driver does not decode the image).
    pub width: u32,
    /// Frame height in pixels (0 when the driver does not decode the image).
    pub height: u32,
    /// Encoding of `data`, e.g. `"image/jpeg"` or [`RAW_GRAY_MIME`].
    pub mime: String,
    pub data: Vec<u8>,
}

impl CameraFrame {
    /// `true` when `data` is a compressed image a vision model can read.
    pub fn is_encoded(&self) -> bool {
        matches!(self.mime.as_str(), "image/jpeg" | "image/png")
    }

    /// File extension matching [`mime`][Self::mime].
    pub fn extension(&self) -> &'static str {
        match self.mime.as_str() {
            "image/jpeg" => "jpg",
            "image/png" => "png",
            _ => "raw",
        }
    }
}

/// A camera or image-capture device.
///
/// Drivers implement this trait and register themselves with a
/// [`HardwareRegistry`][crate::registry::HardwareRegistry].
pub trait Camera: Send + Sync {
    /// Stable identifier for this camera, e.g. `"beak_cam"`.
    fn id(&self) -> &str;

    /// Capture and return the next available frame.
    ///
    /// # Errors
    ///
    /// Returns [`DodaError::CaptureFailure`] if no frame can be produced
    /// (device unplugged, stale snapshot, unreadable file).
    fn capture(&mut self) -> Result<CameraFrame, DodaError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn jpeg_frame_is_encoded() {
        let frame = CameraFrame {
            width: 0,
            height: 0,
            mime: "image/jpeg".to_string(),
            data: vec![0xFF, 0xD8],
        };
        assert!(frame.is_encoded());
        assert_eq!(frame.extension(), "jpg");
    }

    #[test]
    fn raw_frame_is_not_encoded() {
        let frame = CameraFrame {
            width: 2,
            height: 2,
            mime: RAW_GRAY_MIME.to_string(),
            data: vec![0u8; 4],
        };
        assert!(!frame.is_encoded());
        assert_eq!(frame.extension(), "raw");
    }
}
