use crate::error::{Error, Result};
use crate::frame_source::frame::{Frame, CHANNELS};
use crate::frame_source::interface::FrameSource;
use crate::library::logger::interface::Logger;
use rand::Rng;
use std::sync::{Arc, Mutex};

/// Shared handle to the color the fake camera is looking at.
#[derive(Debug, Clone)]
pub struct FakeScene {
    rgb: Arc<Mutex<[f32; 3]>>,
}

impl FakeScene {
    pub fn new(rgb: [f32; 3]) -> Self {
        Self {
            rgb: Arc::new(Mutex::new(rgb)),
        }
    }

    pub fn set(&self, rgb: [f32; 3]) {
        if let Ok(mut current) = self.rgb.lock() {
            *current = rgb;
        }
    }

    pub fn get(&self) -> Result<[f32; 3]> {
        self.rgb
            .lock()
            .map(|rgb| *rgb)
            .map_err(|_| Error::capture("fake scene lock poisoned"))
    }
}

/// Synthetic camera producing a solid scene color plus uniform noise.
pub struct FrameSourceFake {
    logger: Arc<dyn Logger + Send + Sync>,
    size: usize,
    noise: f32,
    scene: FakeScene,
    started: bool,
}

impl FrameSourceFake {
    pub fn new(logger: Arc<dyn Logger + Send + Sync>, size: u32, noise: f32) -> Self {
        Self {
            logger: logger.with_namespace("frame_source").with_namespace("fake"),
            size: size as usize,
            noise: noise.abs(),
            scene: FakeScene::new([0.0, 0.0, 0.0]),
            started: false,
        }
    }

    pub fn scene(&self) -> FakeScene {
        self.scene.clone()
    }
}

impl FrameSource for FrameSourceFake {
    fn setup(&mut self) -> Result<()> {
        self.logger.info("Starting fake camera...").ok();
        self.started = true;
        self.logger.info("Fake camera started").ok();
        Ok(())
    }

    fn capture(&mut self) -> Result<Frame> {
        if !self.started {
            return Err(Error::capture("camera is not set up"));
        }

        let rgb = self.scene.get()?;
        let mut rng = rand::rng();
        let mut data = Vec::with_capacity(self.size * self.size * CHANNELS);
        for _ in 0..self.size * self.size {
            for channel in rgb {
                let jitter = if self.noise > 0.0 {
                    rng.random_range(-self.noise..self.noise)
                } else {
                    0.0
                };
                data.push((channel + jitter).clamp(-1.0, 1.0));
            }
        }

        Frame::new(self.size, self.size, data)
    }
}
