use crate::display::interface::{write_into, LineBuffer, StatusDisplay};
use std::error::Error;
use std::sync::{Arc, Mutex};

/// Keeps the last flushed lines so tests can read what the user would see.
#[derive(Clone, Default)]
pub struct StatusDisplayFake {
    buffer: LineBuffer,
    shown: Arc<Mutex<LineBuffer>>,
    flushes: Arc<Mutex<usize>>,
}

impl StatusDisplayFake {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn lines(&self) -> Vec<String> {
        self.shown
            .lock()
            .map(|shown| shown.to_vec())
            .unwrap_or_default()
    }

    pub fn flushes(&self) -> usize {
        self.flushes.lock().map(|count| *count).unwrap_or(0)
    }
}

impl StatusDisplay for StatusDisplayFake {
    fn init(&mut self) -> Result<(), Box<dyn Error + Send + Sync>> {
        Ok(())
    }

    fn clear(&mut self) -> Result<(), Box<dyn Error + Send + Sync>> {
        self.buffer = LineBuffer::default();
        Ok(())
    }

    fn write_line(&mut self, line: u8, text: &str) -> Result<(), Box<dyn Error + Send + Sync>> {
        let width = self.chars_per_line();
        write_into(&mut self.buffer, line, text, width)
    }

    fn flush(&mut self) -> Result<(), Box<dyn Error + Send + Sync>> {
        *self.shown.lock().map_err(|_| "display lock poisoned")? = self.buffer.clone();
        *self.flushes.lock().map_err(|_| "display lock poisoned")? += 1;
        Ok(())
    }
}
