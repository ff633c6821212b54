//! Line commands accepted by the binary on stdin.

use std::path::PathBuf;

#[derive(Debug, Clone, PartialEq)]
pub enum HostCommand {
    AddLabel(String),
    Record(usize),
    Stop,
    RecordImage { path: PathBuf, label: usize },
    Train { epochs: Option<usize> },
    Predict,
    Status,
    /// Color the synthetic camera shows, each channel in [-1, 1].
    Scene([f32; 3]),
    Quit,
}

pub const HELP: &str = "commands: label <name> | record <index> | stop | image <path> <index> | train [epochs] | predict | status | scene <r> <g> <b> | quit";

pub fn parse(line: &str) -> Result<HostCommand, String> {
    let mut words = line.split_whitespace();
    let command = words.next().ok_or_else(|| "empty command".to_string())?;
    let rest: Vec<&str> = words.collect();

    match (command.to_lowercase().as_str(), rest.as_slice()) {
        ("label", []) => Err("label needs a name".to_string()),
        ("label", name) => Ok(HostCommand::AddLabel(name.join(" "))),
        ("record", [index]) => Ok(HostCommand::Record(parse_index(index)?)),
        ("stop", []) => Ok(HostCommand::Stop),
        ("image", [path, index]) => Ok(HostCommand::RecordImage {
            path: PathBuf::from(*path),
            label: parse_index(index)?,
        }),
        ("train", []) => Ok(HostCommand::Train { epochs: None }),
        ("train", [epochs]) => epochs
            .parse()
            .map(|epochs| HostCommand::Train {
                epochs: Some(epochs),
            })
            .map_err(|_| format!("invalid epoch count '{}'", epochs)),
        ("predict", []) => Ok(HostCommand::Predict),
        ("status", []) => Ok(HostCommand::Status),
        ("scene", [r, g, b]) => {
            let mut rgb = [0.0; 3];
            for (channel, value) in rgb.iter_mut().zip([r, g, b]) {
                let parsed: f32 = value
                    .parse()
                    .map_err(|_| format!("invalid channel value '{}'", value))?;
                *channel = parsed.clamp(-1.0, 1.0);
            }
            Ok(HostCommand::Scene(rgb))
        }
        ("quit", []) | ("exit", []) => Ok(HostCommand::Quit),
        _ => Err(format!("unknown command '{}'. {}", line.trim(), HELP)),
    }
}

fn parse_index(value: &str) -> Result<usize, String> {
    value
        .parse()
        .map_err(|_| format!("invalid label index '{}'", value))
}
