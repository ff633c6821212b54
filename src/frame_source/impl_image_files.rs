use crate::error::{Error, Result};
use crate::frame_source::frame::Frame;
use crate::frame_source::interface::FrameSource;
use crate::frame_source::normalize::{frame_from_image, ResizePolicy};
use crate::library::logger::interface::Logger;
use std::path::{Path, PathBuf};
use std::sync::Arc;

const EXTENSIONS: [&str; 5] = ["jpg", "jpeg", "png", "bmp", "webp"];

pub fn load_frame(path: &Path, size: u32, policy: ResizePolicy) -> Result<Frame> {
    let image = image::open(path).map_err(|e| Error::capture(format!("{}: {}", path.display(), e)))?;
    frame_from_image(&image, size, policy)
}

/// Replays the images of a directory in file name order, looping at the end.
pub struct FrameSourceImageFiles {
    logger: Arc<dyn Logger + Send + Sync>,
    dir: PathBuf,
    size: u32,
    policy: ResizePolicy,
    paths: Vec<PathBuf>,
    next: usize,
}

impl FrameSourceImageFiles {
    pub fn new(
        logger: Arc<dyn Logger + Send + Sync>,
        dir: PathBuf,
        size: u32,
        policy: ResizePolicy,
    ) -> Self {
        Self {
            logger: logger.with_namespace("frame_source").with_namespace("image_files"),
            dir,
            size,
            policy,
            paths: Vec::new(),
            next: 0,
        }
    }
}

impl FrameSource for FrameSourceImageFiles {
    fn setup(&mut self) -> Result<()> {
        let entries = std::fs::read_dir(&self.dir)
            .map_err(|e| Error::external_load(self.dir.display().to_string(), e))?;

        let mut paths: Vec<PathBuf> = entries
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|path| {
                path.extension()
                    .and_then(|ext| ext.to_str())
                    .map(|ext| EXTENSIONS.contains(&ext.to_lowercase().as_str()))
                    .unwrap_or(false)
            })
            .collect();
        paths.sort();

        if paths.is_empty() {
            return Err(Error::external_load(
                self.dir.display().to_string(),
                "no images found",
            ));
        }

        self.logger
            .info(&format!("Found {} images in {}", paths.len(), self.dir.display()))
            .ok();
        self.paths = paths;
        self.next = 0;
        Ok(())
    }

    fn capture(&mut self) -> Result<Frame> {
        if self.paths.is_empty() {
            return Err(Error::capture("image source is not set up"));
        }

        let path = &self.paths[self.next % self.paths.len()];
        self.next = (self.next + 1) % self.paths.len();
        load_frame(path, self.size, self.policy)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::library::logger::impl_console::LoggerConsole;
    use chrono::Offset;
    use image::{ImageBuffer, Rgb};

    fn temp_dir(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("transfer_cam_{}_{}", name, std::process::id()));
        let _ = std::fs::remove_dir_all(&dir);
        std::fs::create_dir_all(&dir).unwrap();
        dir
    }

    fn source(dir: PathBuf) -> FrameSourceImageFiles {
        let logger = Arc::new(LoggerConsole::new(chrono::Utc.fix()));
        FrameSourceImageFiles::new(logger, dir, 16, ResizePolicy::CenterCrop)
    }

    #[test]
    fn test_setup_fails_on_missing_dir() {
        let mut source = source(PathBuf::from("/definitely/not/here"));
        assert!(matches!(
            source.setup(),
            Err(Error::ExternalLoadFailure { .. })
        ));
    }

    #[test]
    fn test_setup_fails_without_images() {
        let dir = temp_dir("empty");
        std::fs::write(dir.join("notes.txt"), "not an image").unwrap();
        let mut source = source(dir);
        assert!(source.setup().is_err());
    }

    #[test]
    fn test_capture_cycles_through_images() {
        let dir = temp_dir("cycle");
        ImageBuffer::from_pixel(20, 10, Rgb([255u8, 0, 0]))
            .save(dir.join("a.png"))
            .unwrap();
        ImageBuffer::from_pixel(20, 10, Rgb([0u8, 0, 255]))
            .save(dir.join("b.png"))
            .unwrap();

        let mut source = source(dir);
        assert!(source.capture().is_err());
        source.setup().unwrap();

        let first = source.capture().unwrap();
        let second = source.capture().unwrap();
        let third = source.capture().unwrap();

        assert_eq!(first.shape(), [16, 16, 3]);
        assert!(first.pixel(8, 8).unwrap()[0] > 0.9);
        assert!(second.pixel(8, 8).unwrap()[2] > 0.9);
        assert_eq!(first, third);
    }
}
