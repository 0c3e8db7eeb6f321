//! Live preview frame pipeline.
//!
//! The camera writes each live-view frame into the session's reusable memory
//! stream as a JPEG padded out with zeros. [`scan_to_end_of_image`] walks the
//! buffer byte by byte for the padded end marker `FF D9 00 00` and trims the
//! two pad bytes, so the payload handed to the decoder ends in a plain JPEG
//! terminator. [`decode_frame`] turns the payload into pixels plus the
//! per-frame calibration geometry.

use std::marker::PhantomData;

use image::RgbImage;

use crate::edsdk::CameraSdk;
use crate::overlay::grid_offsets;
use crate::session::{CamError, Session};

/// Borrowed view over the SDK-owned preview buffer. The session never frees
/// these bytes; the stream handle does.
pub struct RawFrameBuffer<'a> {
    ptr: *const u8,
    len: usize,
    _owner: PhantomData<&'a ()>,
}

impl<'a> RawFrameBuffer<'a> {
    pub(crate) fn new(ptr: *const u8, len: usize) -> Self {
        Self {
            ptr,
            len,
            _owner: PhantomData,
        }
    }

    #[must_use]
    pub fn as_bytes(&self) -> &'a [u8] {
        if self.ptr.is_null() || self.len == 0 {
            return &[];
        }
        unsafe { std::slice::from_raw_parts(self.ptr, self.len) }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.len
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }
}

/// Matcher states for the padded end-of-image marker.
///
/// On any mismatch the matcher drops back to `Scanning` WITHOUT re-examining
/// the current byte. In particular a `0xFF` right after a failed partial
/// match does not re-arm the matcher, so `FF FF D9 00 00` is missed. That
/// mirrors the camera-facing behavior this scanner was validated against;
/// do not "fix" it without re-checking real sensor output.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ScanState {
    Scanning,
    SawFf,
    SawD9,
    SawPad,
}

/// Result of one scan over the preview buffer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScannedPayload {
    pub bytes: Vec<u8>,
    /// Whether the full `FF D9 00 00` marker was seen. When false, `bytes`
    /// holds everything scanned, untrimmed.
    pub complete: bool,
}

/// Copy bytes out of `buffer` up to and including the JPEG terminator.
///
/// On a complete match the two zero pad bytes are trimmed, leaving a payload
/// that ends in `FF D9`. An exhausted buffer yields everything scanned with
/// `complete == false`.
#[must_use]
pub fn scan_to_end_of_image(buffer: &[u8]) -> ScannedPayload {
    let mut bytes = Vec::with_capacity(buffer.len().min(64 * 1024));
    let mut state = ScanState::Scanning;
    let mut complete = false;

    for &b in buffer {
        bytes.push(b);
        state = match (state, b) {
            (ScanState::Scanning, 0xFF) => ScanState::SawFf,
            (ScanState::SawFf, 0xD9) => ScanState::SawD9,
            (ScanState::SawD9, 0x00) => ScanState::SawPad,
            (ScanState::SawPad, 0x00) => {
                complete = true;
                ScanState::Scanning
            }
            _ => ScanState::Scanning,
        };
        if complete {
            break;
        }
    }

    if complete {
        bytes.truncate(bytes.len() - 2);
    }
    ScannedPayload { bytes, complete }
}

/// One decoded preview frame plus the calibration geometry derived from its
/// dimensions. Recomputed every frame; the grid follows whatever size the
/// decoder returns.
#[derive(Clone)]
pub struct PreviewFrame {
    pub image: RgbImage,
    pub center: (i32, i32),
    pub label_radius: i32,
    pub v_lines: Vec<i32>,
    pub h_lines: Vec<i32>,
}

/// Decode a scanned JPEG payload and derive the frame geometry.
pub fn decode_frame(jpeg: &[u8], grid_pitch: i32) -> Result<PreviewFrame, CamError> {
    let image = image::load_from_memory_with_format(jpeg, image::ImageFormat::Jpeg)?.to_rgb8();
    let width = image.width() as i32;
    let height = image.height() as i32;
    let center = (width / 2, height / 2);
    let label_radius = (center.1 as f32 * 0.95) as i32;
    Ok(PreviewFrame {
        v_lines: grid_offsets(width, center.0, grid_pitch),
        h_lines: grid_offsets(height, center.1, grid_pitch),
        image,
        center,
        label_radius,
    })
}

impl<S: CameraSdk> Session<S> {
    /// Pull the next live-view frame into the preview stream and scan it.
    ///
    /// The EVF image reference is created over the stream on first use and
    /// reused for every later download.
    pub fn grab_frame(&mut self) -> Result<ScannedPayload, CamError> {
        let camera = self.camera()?;
        let stream = self.stream.get().ok_or(CamError::NotInitialized)?;

        if self.evf_image.get().is_none() {
            let (status, image) = self.sdk.create_evf_image(stream);
            self.check("EdsCreateEvfImageRef", status)?;
            self.evf_image.acquire(image);
        }
        if let Some(image) = self.evf_image.get() {
            self.check(
                "EdsDownloadEvfImage",
                self.sdk.download_evf_image(camera, image),
            )?;
        }

        let (status, ptr) = self.sdk.stream_pointer(stream);
        self.check("EdsGetPointer", status)?;
        let (status, length) = self.sdk.stream_length(stream);
        self.check("EdsGetLength", status)?;

        let length = length.min(self.options.buffer_capacity) as usize;
        let view = RawFrameBuffer::new(ptr, length);
        Ok(scan_to_end_of_image(view.as_bytes()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scan_trims_padding_after_marker() {
        // Marker at position 3: bytes [0, 5) come back, ending in FF D9.
        let buffer = [0x01, 0x02, 0x03, 0xFF, 0xD9, 0x00, 0x00, 0x55, 0x66];
        let payload = scan_to_end_of_image(&buffer);
        assert!(payload.complete);
        assert_eq!(payload.bytes, vec![0x01, 0x02, 0x03, 0xFF, 0xD9]);
    }

    #[test]
    fn test_scan_marker_at_start() {
        let buffer = [0xFF, 0xD9, 0x00, 0x00, 0x01];
        let payload = scan_to_end_of_image(&buffer);
        assert!(payload.complete);
        assert_eq!(payload.bytes, vec![0xFF, 0xD9]);
    }

    #[test]
    fn test_scan_does_not_stop_on_bare_jpeg_terminator() {
        // FF D9 followed by 01: the pad bytes never arrive at this position,
        // so scanning continues to the genuine marker.
        let buffer = [0xFF, 0xD9, 0x01, 0x00, 0x00, 0xFF, 0xD9, 0x00, 0x00];
        let payload = scan_to_end_of_image(&buffer);
        assert!(payload.complete);
        assert_eq!(payload.bytes.len(), 7);
        assert_eq!(&payload.bytes[5..], &[0xFF, 0xD9]);
    }

    #[test]
    fn test_scan_ff_after_partial_match_does_not_rearm() {
        // The doubled FF defeats the matcher: after the first FF fails to be
        // followed by D9, the second FF is not treated as a new start.
        let buffer = [0xFF, 0xFF, 0xD9, 0x00, 0x00];
        let payload = scan_to_end_of_image(&buffer);
        assert!(!payload.complete);
        assert_eq!(payload.bytes, buffer.to_vec());
    }

    #[test]
    fn test_scan_exhausted_buffer_returns_everything_untrimmed() {
        let buffer = [0x10, 0x20, 0xFF, 0xD9, 0x00];
        let payload = scan_to_end_of_image(&buffer);
        assert!(!payload.complete);
        assert_eq!(payload.bytes, buffer.to_vec());
    }

    #[test]
    fn test_scan_empty_buffer() {
        let payload = scan_to_end_of_image(&[]);
        assert!(!payload.complete);
        assert!(payload.bytes.is_empty());
    }

    #[test]
    fn test_scan_interrupted_pad_restarts() {
        // FF D9 00 17: the fourth byte breaks the match; the real marker
        // later is still found.
        let buffer = [0xFF, 0xD9, 0x00, 0x17, 0xFF, 0xD9, 0x00, 0x00];
        let payload = scan_to_end_of_image(&buffer);
        assert!(payload.complete);
        assert_eq!(payload.bytes.len(), 6);
        assert_eq!(&payload.bytes[4..], &[0xFF, 0xD9]);
    }

    #[test]
    fn test_decode_frame_geometry() {
        // Encode a small real JPEG in memory, then run it through the
        // decoder path.
        let source = RgbImage::from_pixel(427, 240, image::Rgb([40, 90, 40]));
        let mut jpeg = Vec::new();
        source
            .write_to(
                &mut std::io::Cursor::new(&mut jpeg),
                image::ImageFormat::Jpeg,
            )
            .expect("in-memory JPEG encode");

        let frame = decode_frame(&jpeg, 100).expect("decode");
        assert_eq!(frame.image.dimensions(), (427, 240));
        assert_eq!(frame.center, (213, 120));
        assert_eq!(frame.label_radius, 114);
        assert_eq!(frame.v_lines, vec![13, 113, 213, 313, 413]);
        assert_eq!(frame.h_lines, vec![20, 120, 220]);
    }

    #[test]
    fn test_decode_frame_rejects_garbage() {
        assert!(decode_frame(&[0x00, 0x01, 0x02], 100).is_err());
    }
}
