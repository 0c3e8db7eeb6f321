//! Calibration overlay drawn onto each preview frame.
//!
//! Everything is drawn straight into the RGB pixel grid: a green alignment
//! grid across the full frame, a red circle sized to the label being
//! photographed, a black readout panel with the exposure triad, and a
//! blinking live indicator.

use image::{Rgb, RgbImage};

use crate::exposure::{ExposureParam, ExposureState};
use crate::font;
use crate::preview::PreviewFrame;

pub const GRID_COLOR: Rgb<u8> = Rgb([0, 255, 0]);
pub const MARKER_COLOR: Rgb<u8> = Rgb([255, 0, 0]);
pub const PANEL_COLOR: Rgb<u8> = Rgb([0, 0, 0]);
pub const TEXT_COLOR: Rgb<u8> = Rgb([255, 255, 255]);
pub const LIVE_COLOR: Rgb<u8> = Rgb([0, 255, 0]);

/// Readout panel extent, top-left corner.
const PANEL_WIDTH: i32 = 200;
const PANEL_HEIGHT: i32 = 100;

/// Grid line offsets along one axis: pitch-spaced, centered, symmetric, and
/// clipped to `[0, extent)`.
#[must_use]
pub fn grid_offsets(extent: i32, center: i32, pitch: i32) -> Vec<i32> {
    if pitch <= 0 || extent <= 0 {
        return Vec::new();
    }
    let half = (extent / pitch) / 2;
    (-half..=half)
        .map(|i| i * pitch + center)
        .filter(|&offset| offset >= 0 && offset < extent)
        .collect()
}

/// Draw the full overlay for one frame.
pub fn draw(frame: &mut PreviewFrame, exposure: &ExposureState, live: bool) {
    let image = &mut frame.image;
    for &x in &frame.v_lines {
        vertical_line(image, x, GRID_COLOR);
    }
    for &y in &frame.h_lines {
        horizontal_line(image, y, GRID_COLOR);
    }
    hollow_circle(image, frame.center, frame.label_radius, MARKER_COLOR);

    settings_panel(image, exposure);

    if live {
        let x = image.width() as i32 - 20;
        filled_circle(image, (x, 20), 10, LIVE_COLOR);
    }
}

/// The exposure readout with its key hints, one line per setting.
pub fn settings_panel(image: &mut RgbImage, exposure: &ExposureState) {
    fill_rect(image, 0, 0, PANEL_WIDTH, PANEL_HEIGHT, PANEL_COLOR);
    let lines = [
        format!("(a,q) ISO = {}", exposure.label(ExposureParam::Iso)),
        format!("(s,w) Aperture = {}", exposure.label(ExposureParam::Av)),
        format!("(d,e) Shutter = {}", exposure.label(ExposureParam::Tv)),
    ];
    for (i, line) in lines.iter().enumerate() {
        font::draw_text(image, 5, 20 + 20 * i as i32, line, TEXT_COLOR);
    }
}

pub fn vertical_line(image: &mut RgbImage, x: i32, color: Rgb<u8>) {
    if x < 0 || x >= image.width() as i32 {
        return;
    }
    for y in 0..image.height() {
        *image.get_pixel_mut(x as u32, y) = color;
    }
}

pub fn horizontal_line(image: &mut RgbImage, y: i32, color: Rgb<u8>) {
    if y < 0 || y >= image.height() as i32 {
        return;
    }
    for x in 0..image.width() {
        *image.get_pixel_mut(x, y as u32) = color;
    }
}

/// Filled axis-aligned rectangle, clamped to the image.
pub fn fill_rect(image: &mut RgbImage, left: i32, top: i32, right: i32, bottom: i32, color: Rgb<u8>) {
    let width = image.width() as i32;
    let height = image.height() as i32;
    let left = left.clamp(0, width);
    let right = right.clamp(0, width);
    let top = top.clamp(0, height);
    let bottom = bottom.clamp(0, height);
    for y in top..bottom {
        for x in left..right {
            *image.get_pixel_mut(x as u32, y as u32) = color;
        }
    }
}

fn put_pixel(image: &mut RgbImage, x: i32, y: i32, color: Rgb<u8>) {
    if x >= 0 && y >= 0 && x < image.width() as i32 && y < image.height() as i32 {
        *image.get_pixel_mut(x as u32, y as u32) = color;
    }
}

/// One-pixel circle outline (midpoint algorithm).
pub fn hollow_circle(image: &mut RgbImage, center: (i32, i32), radius: i32, color: Rgb<u8>) {
    if radius <= 0 {
        put_pixel(image, center.0, center.1, color);
        return;
    }
    let (cx, cy) = center;
    let mut x = radius;
    let mut y = 0;
    let mut err = 1 - radius;
    while x >= y {
        for (px, py) in [
            (cx + x, cy + y),
            (cx - x, cy + y),
            (cx + x, cy - y),
            (cx - x, cy - y),
            (cx + y, cy + x),
            (cx - y, cy + x),
            (cx + y, cy - x),
            (cx - y, cy - x),
        ] {
            put_pixel(image, px, py, color);
        }
        y += 1;
        if err < 0 {
            err += 2 * y + 1;
        } else {
            x -= 1;
            err += 2 * (y - x) + 1;
        }
    }
}

pub fn filled_circle(image: &mut RgbImage, center: (i32, i32), radius: i32, color: Rgb<u8>) {
    let (cx, cy) = center;
    for dy in -radius..=radius {
        for dx in -radius..=radius {
            if dx * dx + dy * dy <= radius * radius {
                put_pixel(image, cx + dx, cy + dy, color);
            }
        }
    }
}

/// Straight line between two points (Bresenham). Used by the prep utility's
/// line annotations.
pub fn line_segment(
    image: &mut RgbImage,
    from: (i32, i32),
    to: (i32, i32),
    color: Rgb<u8>,
) {
    let (mut x0, mut y0) = from;
    let (x1, y1) = to;
    let dx = (x1 - x0).abs();
    let dy = -(y1 - y0).abs();
    let sx = if x0 < x1 { 1 } else { -1 };
    let sy = if y0 < y1 { 1 } else { -1 };
    let mut err = dx + dy;
    loop {
        put_pixel(image, x0, y0, color);
        if x0 == x1 && y0 == y1 {
            break;
        }
        let e2 = 2 * err;
        if e2 >= dy {
            err += dy;
            x0 += sx;
        }
        if e2 <= dx {
            err += dx;
            y0 += sy;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_grid_offsets_width_427() {
        assert_eq!(grid_offsets(427, 213, 100), vec![13, 113, 213, 313, 413]);
    }

    #[test]
    fn test_grid_offsets_odd_multiple() {
        assert_eq!(grid_offsets(350, 175, 100), vec![75, 175, 275]);
    }

    #[test]
    fn test_grid_offsets_exact_multiple_clips_edge() {
        // The +200 offset would land on x == 400, one past the last column.
        assert_eq!(grid_offsets(400, 200, 100), vec![0, 100, 200, 300]);
    }

    #[test]
    fn test_grid_offsets_symmetric_around_center() {
        let center = 213;
        let offsets = grid_offsets(427, center, 100);
        for &offset in &offsets {
            let mirrored = 2 * center - offset;
            if (0..427).contains(&mirrored) {
                assert!(offsets.contains(&mirrored), "{offset} has no mirror");
            }
        }
    }

    #[test]
    fn test_grid_offsets_smaller_than_pitch() {
        assert_eq!(grid_offsets(60, 30, 100), vec![30]);
    }

    #[test]
    fn test_grid_offsets_degenerate() {
        assert!(grid_offsets(0, 0, 100).is_empty());
        assert!(grid_offsets(100, 50, 0).is_empty());
    }

    #[test]
    fn test_vertical_line_spans_height() {
        let mut image = RgbImage::new(10, 6);
        vertical_line(&mut image, 4, GRID_COLOR);
        for y in 0..6 {
            assert_eq!(*image.get_pixel(4, y), GRID_COLOR);
        }
        assert_ne!(*image.get_pixel(5, 0), GRID_COLOR);
    }

    #[test]
    fn test_out_of_range_lines_are_ignored() {
        let mut image = RgbImage::new(4, 4);
        vertical_line(&mut image, -1, GRID_COLOR);
        vertical_line(&mut image, 4, GRID_COLOR);
        horizontal_line(&mut image, 17, GRID_COLOR);
        assert!(image.pixels().all(|p| p.0 == [0, 0, 0]));
    }

    #[test]
    fn test_fill_rect_clamps() {
        let mut image = RgbImage::new(4, 4);
        fill_rect(&mut image, -5, -5, 99, 99, TEXT_COLOR);
        assert!(image.pixels().all(|p| p.0 == [255, 255, 255]));
    }

    #[test]
    fn test_hollow_circle_on_radius() {
        let mut image = RgbImage::new(21, 21);
        hollow_circle(&mut image, (10, 10), 5, MARKER_COLOR);
        // Cardinal points sit exactly on the outline; the center stays clear.
        assert_eq!(*image.get_pixel(15, 10), MARKER_COLOR);
        assert_eq!(*image.get_pixel(5, 10), MARKER_COLOR);
        assert_eq!(*image.get_pixel(10, 15), MARKER_COLOR);
        assert_eq!(*image.get_pixel(10, 5), MARKER_COLOR);
        assert_ne!(*image.get_pixel(10, 10), MARKER_COLOR);
    }

    #[test]
    fn test_filled_circle_covers_center() {
        let mut image = RgbImage::new(9, 9);
        filled_circle(&mut image, (4, 4), 2, LIVE_COLOR);
        assert_eq!(*image.get_pixel(4, 4), LIVE_COLOR);
        assert_eq!(*image.get_pixel(6, 4), LIVE_COLOR);
        assert_ne!(*image.get_pixel(8, 8), LIVE_COLOR);
    }

    #[test]
    fn test_line_segment_endpoints() {
        let mut image = RgbImage::new(10, 10);
        line_segment(&mut image, (1, 1), (8, 5), GRID_COLOR);
        assert_eq!(*image.get_pixel(1, 1), GRID_COLOR);
        assert_eq!(*image.get_pixel(8, 5), GRID_COLOR);
    }

    #[test]
    fn test_settings_panel_paints_background_and_text() {
        let mut image = RgbImage::from_pixel(320, 240, Rgb([9, 9, 9]));
        let exposure = ExposureState::default();
        settings_panel(&mut image, &exposure);
        assert_eq!(*image.get_pixel(150, 90), PANEL_COLOR);
        let lit = image.pixels().filter(|p| p.0 == [255, 255, 255]).count();
        assert!(lit > 0, "panel text should render");
        // Outside the panel the frame is untouched.
        assert_eq!(*image.get_pixel(250, 150), Rgb([9, 9, 9]));
    }
}
