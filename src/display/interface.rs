use std::error::Error;

/// Two-line status display the session renders into.
pub trait StatusDisplay: Send + Sync {
    fn init(&mut self) -> Result<(), Box<dyn Error + Send + Sync>>;

    /// Blank every line.
    fn clear(&mut self) -> Result<(), Box<dyn Error + Send + Sync>>;

    /// Write text to a line (0-based). Text longer than a line is truncated.
    fn write_line(&mut self, line: u8, text: &str) -> Result<(), Box<dyn Error + Send + Sync>>;

    /// Called once the lines of one render are written.
    fn flush(&mut self) -> Result<(), Box<dyn Error + Send + Sync>> {
        Ok(())
    }

    fn num_lines(&self) -> u8 {
        2
    }

    fn chars_per_line(&self) -> u8 {
        32
    }
}

pub(crate) type LineBuffer = [String; 2];

pub(crate) fn write_into(
    buffer: &mut LineBuffer,
    line: u8,
    text: &str,
    chars_per_line: u8,
) -> Result<(), Box<dyn Error + Send + Sync>> {
    let slot = buffer
        .get_mut(line as usize)
        .ok_or_else(|| format!("Invalid line number {}", line))?;
    *slot = text.chars().take(chars_per_line as usize).collect();
    Ok(())
}
