//! Key bindings for the live view window.

use minifb::Key;

use crate::exposure::{Direction, ExposureParam};

/// What a keypress in the live view asks for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LiveCommand {
    /// Leave the loop and run cleanup.
    Quit,
    /// Capture a RAW still and download it.
    CaptureRaw,
    /// Save the current preview JPEG to the configured file.
    SavePreview,
    /// Step one exposure setting.
    Adjust(ExposureParam, Direction),
}

/// Map a pressed key to its command, if it has one.
#[must_use]
pub fn command_for(key: Key) -> Option<LiveCommand> {
    match key {
        Key::Escape | Key::X => Some(LiveCommand::Quit),
        Key::Space => Some(LiveCommand::CaptureRaw),
        Key::M => Some(LiveCommand::SavePreview),
        Key::A => Some(LiveCommand::Adjust(ExposureParam::Iso, Direction::Down)),
        Key::Q => Some(LiveCommand::Adjust(ExposureParam::Iso, Direction::Up)),
        Key::S => Some(LiveCommand::Adjust(ExposureParam::Av, Direction::Down)),
        Key::W => Some(LiveCommand::Adjust(ExposureParam::Av, Direction::Up)),
        Key::D => Some(LiveCommand::Adjust(ExposureParam::Tv, Direction::Down)),
        Key::E => Some(LiveCommand::Adjust(ExposureParam::Tv, Direction::Up)),
        _ => None,
    }
}
