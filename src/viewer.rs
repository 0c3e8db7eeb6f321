//! Live view window and input loop.
//!
//! One fully sequential cycle per poll period: grab a frame, scan it, decode
//! it, draw the overlay, present it, then handle at most the keys pressed in
//! that window update. The loop is the only yield point; every SDK command
//! happens between polls, so at most one command is ever in flight.

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use log::{info, warn};
use minifb::{Key, KeyRepeat, Scale, ScaleMode, Window, WindowOptions};

use crate::edsdk::CameraSdk;
use crate::keys::{command_for, LiveCommand};
use crate::overlay;
use crate::preview::{decode_frame, PreviewFrame};
use crate::session::{CamError, Session};

/// Grabs tolerated before giving up on ever seeing a decodable first frame.
const FIRST_FRAME_ATTEMPTS: u32 = 20;

static INTERRUPTED: AtomicBool = AtomicBool::new(false);

/// Install the Ctrl-C flag; the loop breaks on it so teardown still runs.
pub fn setup_interrupt_handler() -> Result<(), ctrlc::Error> {
    ctrlc::set_handler(|| INTERRUPTED.store(true, Ordering::SeqCst))
}

/// Whether Ctrl-C was received.
#[must_use]
pub fn interrupted() -> bool {
    INTERRUPTED.load(Ordering::SeqCst)
}

/// Knobs for the live view loop.
#[derive(Debug, Clone)]
pub struct ViewerOptions {
    /// Integer window upscale (1, 2 or 4).
    pub scale: u32,
    /// Poll period; one frame and one key sample per period.
    pub poll: Duration,
    /// Where the `m` key writes the current preview JPEG.
    pub preview_path: PathBuf,
    /// Where captured stills land.
    pub images_dir: PathBuf,
    pub grid_pitch: i32,
}

impl Default for ViewerOptions {
    fn default() -> Self {
        Self {
            scale: 2,
            poll: Duration::from_millis(100),
            preview_path: PathBuf::from("preview.jpg"),
            images_dir: PathBuf::from("images"),
            grid_pitch: 100,
        }
    }
}

fn window_scale(scale: u32) -> Scale {
    match scale {
        4 => Scale::X4,
        2 => Scale::X2,
        _ => Scale::X1,
    }
}

/// Pack an RGB frame into minifb's 0RGB buffer.
#[must_use]
pub fn pack_frame(image: &image::RgbImage) -> Vec<u32> {
    image
        .pixels()
        .map(|p| (u32::from(p.0[0]) << 16) | (u32::from(p.0[1]) << 8) | u32::from(p.0[2]))
        .collect()
}

/// Run the live view until the user quits, the window closes, or Ctrl-C.
pub fn run_live<S: CameraSdk>(
    session: &mut Session<S>,
    options: &ViewerOptions,
) -> Result<(), CamError> {
    std::fs::create_dir_all(&options.images_dir)?;

    // The first decodable frame sizes the window.
    let (mut frame, mut jpeg) = first_frame(session, options.grid_pitch)?;
    let (width, height) = frame.image.dimensions();

    let mut window = Window::new(
        "live view",
        width as usize,
        height as usize,
        WindowOptions {
            scale: window_scale(options.scale),
            scale_mode: ScaleMode::Stretch,
            ..WindowOptions::default()
        },
    )
    .map_err(|e| CamError::Display(e.to_string()))?;
    let fps = (1000 / options.poll.as_millis().max(1)) as usize;
    window.set_target_fps(fps.max(1));

    let mut live_dot = false;
    while window.is_open() {
        if interrupted() {
            info!("interrupted; shutting down");
            break;
        }
        live_dot = !live_dot;

        let payload = session.grab_frame()?;
        if payload.complete {
            match decode_frame(&payload.bytes, options.grid_pitch) {
                Ok(decoded) if decoded.image.dimensions() == (width, height) => {
                    frame = decoded;
                    jpeg = payload.bytes;
                }
                Ok(decoded) => warn!(
                    "frame size changed to {:?}; keeping the window at {}x{}",
                    decoded.image.dimensions(),
                    width,
                    height
                ),
                Err(e) => warn!("dropping undecodable frame: {e}"),
            }
        } else {
            warn!(
                "no end marker in {} scanned bytes; dropping frame",
                payload.bytes.len()
            );
        }

        // Draw on a copy so a dropped frame does not accumulate overlays.
        let mut shown = frame.clone();
        overlay::draw(&mut shown, &session.exposure, live_dot);
        window
            .update_with_buffer(&pack_frame(&shown.image), width as usize, height as usize)
            .map_err(|e| CamError::Display(e.to_string()))?;

        if !handle_keys(&mut window, session, options, &jpeg)? {
            break;
        }
    }
    Ok(())
}

fn first_frame<S: CameraSdk>(
    session: &mut Session<S>,
    grid_pitch: i32,
) -> Result<(PreviewFrame, Vec<u8>), CamError> {
    for _ in 0..FIRST_FRAME_ATTEMPTS {
        let payload = session.grab_frame()?;
        if !payload.complete {
            continue;
        }
        match decode_frame(&payload.bytes, grid_pitch) {
            Ok(frame) => return Ok((frame, payload.bytes)),
            Err(e) => warn!("dropping undecodable frame: {e}"),
        }
    }
    Err(CamError::NoPreviewFrame)
}

/// Dispatch this cycle's keys. Returns false when the loop should end.
fn handle_keys<S: CameraSdk>(
    window: &mut Window,
    session: &mut Session<S>,
    options: &ViewerOptions,
    jpeg: &[u8],
) -> Result<bool, CamError> {
    let pressed: Vec<Key> = window.get_keys_pressed(KeyRepeat::No);
    for key in pressed {
        match command_for(key) {
            Some(LiveCommand::Quit) => return Ok(false),
            Some(LiveCommand::CaptureRaw) => {
                let path = session.capture_and_download(&options.images_dir)?;
                info!("captured {}", path.display());
            }
            Some(LiveCommand::SavePreview) => {
                std::fs::write(&options.preview_path, jpeg)?;
                info!("preview saved to {}", options.preview_path.display());
            }
            Some(LiveCommand::Adjust(param, direction)) => {
                if let Some((prop, code)) = session.exposure.adjust(param, direction) {
                    session.update_setting(prop, code)?;
                    info!("{:?} -> {}", param, session.exposure.label(param));
                }
            }
            None => {}
        }
    }
    Ok(true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgb, RgbImage};

    #[test]
    fn test_pack_frame_channel_order() {
        let mut image = RgbImage::new(2, 1);
        *image.get_pixel_mut(0, 0) = Rgb([0x12, 0x34, 0x56]);
        *image.get_pixel_mut(1, 0) = Rgb([0xFF, 0x00, 0x00]);
        assert_eq!(pack_frame(&image), vec![0x0012_3456, 0x00FF_0000]);
    }

    #[test]
    fn test_window_scale_mapping() {
        assert!(matches!(window_scale(1), Scale::X1));
        assert!(matches!(window_scale(2), Scale::X2));
        assert!(matches!(window_scale(4), Scale::X4));
        // Anything else falls back to no upscale.
        assert!(matches!(window_scale(3), Scale::X1));
    }

    #[test]
    fn test_viewer_defaults() {
        let options = ViewerOptions::default();
        assert_eq!(options.poll, Duration::from_millis(100));
        assert_eq!(options.grid_pitch, 100);
    }
}
