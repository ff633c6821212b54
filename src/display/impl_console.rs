use crate::display::interface::{write_into, LineBuffer, StatusDisplay};
use std::error::Error;

/// Draws the status box on stdout whenever its content changes.
pub struct StatusDisplayConsole {
    buffer: LineBuffer,
    shown: Option<LineBuffer>,
}

impl StatusDisplayConsole {
    pub fn new() -> Self {
        Self {
            buffer: LineBuffer::default(),
            shown: None,
        }
    }

    fn render_display(&self) {
        let width = self.chars_per_line() as usize;
        println!("┌{}┐", "─".repeat(width));
        for row in &self.buffer {
            println!("│{:<width$}│", row, width = width);
        }
        println!("└{}┘", "─".repeat(width));
    }
}

impl Default for StatusDisplayConsole {
    fn default() -> Self {
        Self::new()
    }
}

impl StatusDisplay for StatusDisplayConsole {
    fn init(&mut self) -> Result<(), Box<dyn Error + Send + Sync>> {
        self.render_display();
        self.shown = Some(self.buffer.clone());
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
        if self.shown.as_ref() != Some(&self.buffer) {
            self.render_display();
            self.shown = Some(self.buffer.clone());
        }
        Ok(())
    }
}
