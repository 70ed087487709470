//! File-backed camera.
//!
//! An external grabber (a `ffmpeg` loop, a phone app, a test) keeps writing
//! the latest picture to a fixed path; [`SnapshotCamera`] reads that file on
//! every capture.  When `max_age` is set, a file that has not been refreshed
//! recently is reported as a capture failure instead of silently showing Doda
//! an old gift.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};

use doda_types::DodaError;
use tracing::debug;

use crate::camera::{Camera, CameraFrame, RAW_GRAY_MIME};

pub struct SnapshotCamera {
    id: String,
    path: PathBuf,
    max_age: Option<Duration>,
}

impl SnapshotCamera {
    pub fn new(id: impl Into<String>, path: impl Into<PathBuf>) -> Self {
        Self {
            id: id.into(),
            path: path.into(),
            max_age: None,
        }
    }

    /// Reject snapshots whose modification time is older than `max_age`.
    pub fn with_max_age(mut self, max_age: Duration) -> Self {
        self.max_age = Some(max_age);
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn mime_for(path: &Path) -> &'static str {
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_ascii_lowercase);
        match ext.as_deref() {
            Some("jpg" | "jpeg") => "image/jpeg",
            Some("png") => "image/png",
            _ => RAW_GRAY_MIME,
        }
    }

    fn failure(&self, what: impl std::fmt::Display) -> DodaError {
        DodaError::CaptureFailure(format!("{}: {what}", self.path.display()))
    }
}

impl Camera for SnapshotCamera {
    fn id(&self) -> &str {
        &self.id
    }

    fn capture(&mut self) -> Result<CameraFrame, DodaError> {
        let meta = fs::metadata(&self.path).map_err(|e| self.failure(e))?;
        if let Some(max_age) = self.max_age {
            let modified = meta.modified().map_err(|e| self.failure(e))?;
            let age = SystemTime::now()
                .duration_since(modified)
                .unwrap_or(Duration::ZERO);
            if age > max_age {
                return Err(self.failure(format!(
                    "snapshot is {}s old (limit {}s)",
                    age.as_secs(),
                    max_age.as_secs()
                )));
            }
        }

        let data = fs::read(&self.path).map_err(|e| self.failure(e))?;
        if data.is_empty() {
            return Err(self.failure("snapshot file is empty"));
        }
        debug!(camera = %self.id, bytes = data.len(), "snapshot captured");
        Ok(CameraFrame {
            width: 0,
            height: 0,
            mime: Self::mime_for(&self.path).to_string(),
            data,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn reads_jpeg_snapshot() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("latest.JPG");
        fs::write(&path, [0xFF, 0xD8, 0xFF, 0xE0]).unwrap();

        let mut cam = SnapshotCamera::new("beak_cam", &path);
        let frame = cam.capture().unwrap();
        assert_eq!(frame.mime, "image/jpeg");
        assert_eq!(frame.data.len(), 4);
        assert!(frame.is_encoded());
    }

    #[test]
    fn missing_file_is_capture_failure() {
        let dir = TempDir::new().unwrap();
        let mut cam = SnapshotCamera::new("beak_cam", dir.path().join("nope.png"));
        assert!(matches!(cam.capture(), Err(DodaError::CaptureFailure(_))));
    }

    #[test]
    fn empty_file_is_capture_failure() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("latest.png");
        fs::write(&path, b"").unwrap();
        let mut cam = SnapshotCamera::new("beak_cam", &path);
        assert!(matches!(cam.capture(), Err(DodaError::CaptureFailure(_))));
    }

    #[test]
    fn fresh_file_passes_age_check() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("latest.png");
        fs::write(&path, [0x89, b'P', b'N', b'G']).unwrap();
        let mut cam = SnapshotCamera::new("beak_cam", &path).with_max_age(Duration::from_secs(60));
        assert_eq!(cam.capture().unwrap().mime, "image/png");
    }

    #[test]
    fn stale_file_is_rejected() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("latest.png");
        fs::write(&path, [0x89, b'P', b'N', b'G']).unwrap();
        std::thread::sleep(Duration::from_millis(20));
        let mut cam = SnapshotCamera::new("beak_cam", &path).with_max_age(Duration::ZERO);
        assert!(matches!(cam.capture(), Err(DodaError::CaptureFailure(_))));
    }
}
