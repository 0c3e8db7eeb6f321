//! End-to-end preview pipeline over the mock SDK: grab, sentinel scan,
//! decode, geometry, overlay, display packing. The frame is a real JPEG
//! encoded in memory, padded and garbage-trailed the way the camera pads the
//! preview stream.

use std::time::Duration;

use image::{Rgb, RgbImage};

use dslr_tether::edsdk::mock::{FakeClock, MockSdk};
use dslr_tether::edsdk::{
    EVF_OUTPUT_DEVICE_PC, PROP_AV, PROP_EVF_OUTPUT_DEVICE, PROP_ISO_SPEED, PROP_TV,
};
use dslr_tether::overlay;
use dslr_tether::preview::decode_frame;
use dslr_tether::session::{Session, SessionOptions};
use dslr_tether::viewer::pack_frame;

const WIDTH: u32 = 320;
const HEIGHT: u32 = 240;

fn encode_jpeg() -> Vec<u8> {
    let source = RgbImage::from_fn(WIDTH, HEIGHT, |x, y| {
        Rgb([(x % 256) as u8, (y % 256) as u8, 64])
    });
    let mut jpeg = Vec::new();
    source
        .write_to(
            &mut std::io::Cursor::new(&mut jpeg),
            image::ImageFormat::Jpeg,
        )
        .expect("in-memory JPEG encode");
    jpeg
}

/// JPEG payload with the camera's two pad zeros and trailing stream garbage.
fn padded_frame(jpeg: &[u8]) -> Vec<u8> {
    let mut frame = jpeg.to_vec();
    frame.extend_from_slice(&[0x00, 0x00]);
    frame.extend_from_slice(&[0x17; 64]);
    frame
}

fn live_session(frame: Vec<u8>) -> Session<MockSdk> {
    let sdk = MockSdk::new()
        .with_prop(PROP_EVF_OUTPUT_DEVICE, EVF_OUTPUT_DEVICE_PC)
        .with_prop(PROP_ISO_SPEED, 0x48)
        .with_prop(PROP_AV, 0x30)
        .with_prop(PROP_TV, 0x60)
        .with_frame(frame);
    let mut session = Session::new(
        sdk,
        SessionOptions {
            settle_delay: Duration::from_secs(2),
            capture_delay: Duration::from_secs(6),
            buffer_capacity: 256 * 1024,
        },
    )
    .with_clock(Box::new(FakeClock::new()));
    session.initialize().expect("initialize");
    session
}

#[test]
fn grab_recovers_exactly_the_jpeg_payload() {
    let jpeg = encode_jpeg();
    let mut session = live_session(padded_frame(&jpeg));

    let payload = session.grab_frame().expect("grab");
    assert!(payload.complete);
    assert_eq!(payload.bytes, jpeg);
    assert_eq!(&payload.bytes[payload.bytes.len() - 2..], &[0xFF, 0xD9]);
}

#[test]
fn grab_reuses_one_evf_image_reference() {
    let jpeg = encode_jpeg();
    let mut session = live_session(padded_frame(&jpeg));

    session.grab_frame().expect("first grab");
    session.grab_frame().expect("second grab");
    assert_eq!(session.sdk().call_count("EdsCreateEvfImageRef"), 1);
    assert_eq!(session.sdk().call_count("EdsDownloadEvfImage"), 2);
}

#[test]
fn grab_without_marker_reports_incomplete() {
    // A frame of 0x17 bytes has no FF anywhere; the scan exhausts the
    // buffer and hands back everything it saw.
    let mut session = live_session(vec![0x17; 128]);
    let payload = session.grab_frame().expect("grab");
    assert!(!payload.complete);
    assert_eq!(payload.bytes.len(), 256 * 1024);
}

#[test]
fn decoded_frame_carries_grid_geometry() {
    let jpeg = encode_jpeg();
    let mut session = live_session(padded_frame(&jpeg));

    let payload = session.grab_frame().expect("grab");
    let frame = decode_frame(&payload.bytes, 100).expect("decode");

    assert_eq!(frame.image.dimensions(), (WIDTH, HEIGHT));
    assert_eq!(frame.center, (160, 120));
    assert_eq!(frame.label_radius, 114);
    assert_eq!(frame.v_lines, vec![60, 160, 260]);
    assert_eq!(frame.h_lines, vec![20, 120, 220]);
}

#[test]
fn overlay_and_packing_produce_a_window_buffer() {
    let jpeg = encode_jpeg();
    let mut session = live_session(padded_frame(&jpeg));

    let payload = session.grab_frame().expect("grab");
    let mut frame = decode_frame(&payload.bytes, 100).expect("decode");
    overlay::draw(&mut frame, &session.exposure, true);

    // Grid lines landed in the pixels.
    let x = frame.v_lines[0] as u32;
    assert_eq!(*frame.image.get_pixel(x, HEIGHT - 1), Rgb([0, 255, 0]));

    let buffer = pack_frame(&frame.image);
    assert_eq!(buffer.len(), (WIDTH * HEIGHT) as usize);
    // The packed grid pixel keeps the channel order: green in 0RGB.
    assert_eq!(buffer[((HEIGHT - 1) * WIDTH + x) as usize], 0x0000_FF00);
}

#[test]
fn changing_exposure_issues_exactly_one_property_write() {
    let jpeg = encode_jpeg();
    let mut session = live_session(padded_frame(&jpeg));
    let writes_before = session.sdk().set_calls().len();

    // ISO starts at "100" (0x48); stepping up lands on "200" (0x50).
    use dslr_tether::exposure::{Direction, ExposureParam};
    let update = session.exposure.adjust(ExposureParam::Iso, Direction::Up);
    let (prop, code) = update.expect("in-range step");
    session.update_setting(prop, code).expect("update");

    let writes = session.sdk().set_calls();
    assert_eq!(writes.len(), writes_before + 1);
    assert_eq!(*writes.last().unwrap(), (PROP_ISO_SPEED, 0x50));
}
