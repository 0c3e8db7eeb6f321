//! Offline image preparation: normalization and straight-line detection.
//!
//! `prep` exists to eyeball a converted RAW before OCR: 16-bit sensor data is
//! spread onto the 8-bit display range, and `--lines` overlays the straight
//! edges found in the frame together with their slopes, which is what tells
//! you how far off square the document sits.

use std::path::Path;

use image::{GrayImage, Rgb, RgbImage};
use log::info;
use minifb::{Key, Window, WindowOptions};

use crate::font;
use crate::overlay::{line_segment, GRID_COLOR, MARKER_COLOR};
use crate::session::CamError;

/// Sobel magnitude above which a pixel counts as an edge.
const EDGE_THRESHOLD: i32 = 60;
/// Accumulator votes a line needs to be reported.
const HOUGH_THRESHOLD: u32 = 80;
/// Keep the strongest lines only; the annotation gets unreadable beyond this.
const MAX_LINES: usize = 25;

/// Spread pixel values onto `0..=new_max`.
///
/// Scaling divides by the maximum rather than the value range, so a frame
/// that never reaches black keeps its offset; this matches the behavior the
/// downstream tooling was tuned against.
#[must_use]
pub fn normalize(pixels: &[u16], new_max: u8) -> Vec<u8> {
    let min = pixels.iter().copied().min().unwrap_or(0);
    let max = pixels.iter().copied().max().unwrap_or(0);
    if max == 0 {
        return vec![0; pixels.len()];
    }
    pixels
        .iter()
        .map(|&v| ((f32::from(v - min) / f32::from(max)) * f32::from(new_max)) as u8)
        .collect()
}

/// One detected straight line, clipped to the image.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DetectedLine {
    pub from: (i32, i32),
    pub to: (i32, i32),
    /// Slope against the horizontal, in degrees, in (-90, 90].
    pub slope_deg: f32,
    pub votes: u32,
}

/// Sobel edge map: true where the gradient magnitude clears the threshold.
fn edge_map(gray: &GrayImage) -> Vec<bool> {
    let width = gray.width() as i32;
    let height = gray.height() as i32;
    let sample = |x: i32, y: i32| -> i32 {
        let x = x.clamp(0, width - 1);
        let y = y.clamp(0, height - 1);
        i32::from(gray.get_pixel(x as u32, y as u32).0[0])
    };
    let mut edges = vec![false; (width * height) as usize];
    for y in 0..height {
        for x in 0..width {
            let gx = -sample(x - 1, y - 1) + sample(x + 1, y - 1) - 2 * sample(x - 1, y)
                + 2 * sample(x + 1, y)
                - sample(x - 1, y + 1)
                + sample(x + 1, y + 1);
            let gy = -sample(x - 1, y - 1) - 2 * sample(x, y - 1) - sample(x + 1, y - 1)
                + sample(x - 1, y + 1)
                + 2 * sample(x, y + 1)
                + sample(x + 1, y + 1);
            if (gx.abs() + gy.abs()) / 2 > EDGE_THRESHOLD {
                edges[(y * width + x) as usize] = true;
            }
        }
    }
    edges
}

/// Standard Hough transform over the edge map, 1 degree x 1 pixel bins.
#[must_use]
pub fn detect_lines(gray: &GrayImage) -> Vec<DetectedLine> {
    let width = gray.width() as i32;
    let height = gray.height() as i32;
    if width == 0 || height == 0 {
        return Vec::new();
    }
    let edges = edge_map(gray);

    let diag = (((width * width + height * height) as f64).sqrt()).ceil() as i32;
    let rho_bins = (2 * diag + 1) as usize;
    let mut accumulator = vec![0u32; 180 * rho_bins];
    let tables: Vec<(f64, f64)> = (0..180)
        .map(|t| {
            let rad = f64::from(t) * std::f64::consts::PI / 180.0;
            (rad.cos(), rad.sin())
        })
        .collect();

    for y in 0..height {
        for x in 0..width {
            if !edges[(y * width + x) as usize] {
                continue;
            }
            for (t, &(cos_t, sin_t)) in tables.iter().enumerate() {
                let rho = (f64::from(x) * cos_t + f64::from(y) * sin_t).round() as i32 + diag;
                accumulator[t * rho_bins + rho as usize] += 1;
            }
        }
    }

    // Collect peaks, strongest first, suppressing near-duplicates.
    let mut peaks: Vec<(u32, usize, i32)> = Vec::new();
    for t in 0..180 {
        for r in 0..rho_bins {
            let votes = accumulator[t * rho_bins + r];
            if votes >= HOUGH_THRESHOLD {
                peaks.push((votes, t, r as i32 - diag));
            }
        }
    }
    peaks.sort_by(|a, b| b.0.cmp(&a.0));

    let mut lines: Vec<DetectedLine> = Vec::new();
    let mut kept: Vec<(usize, i32)> = Vec::new();
    for (votes, theta, rho) in peaks {
        if lines.len() >= MAX_LINES {
            break;
        }
        if kept
            .iter()
            .any(|&(t, r)| (t as i32 - theta as i32).abs() <= 2 && (r - rho).abs() <= 2)
        {
            continue;
        }
        if let Some((from, to)) = clip_line(theta, rho, width, height) {
            let slope_deg = line_slope_deg(from, to);
            kept.push((theta, rho));
            lines.push(DetectedLine {
                from,
                to,
                slope_deg,
                votes,
            });
        }
    }
    lines
}

fn line_slope_deg(from: (i32, i32), to: (i32, i32)) -> f32 {
    let dx = to.0 - from.0;
    let dy = to.1 - from.1;
    if dx == 0 {
        return 90.0;
    }
    (f64::from(dy) / f64::from(dx)).atan().to_degrees() as f32
}

/// Intersect the (theta, rho) line with the image border rectangle.
fn clip_line(theta: usize, rho: i32, width: i32, height: i32) -> Option<((i32, i32), (i32, i32))> {
    let rad = theta as f64 * std::f64::consts::PI / 180.0;
    let (cos_t, sin_t) = (rad.cos(), rad.sin());
    let rho = f64::from(rho);
    let mut points: Vec<(i32, i32)> = Vec::new();

    // x cos + y sin = rho, crossed with each border.
    if sin_t.abs() > 1e-9 {
        for x in [0, width - 1] {
            let y = (rho - f64::from(x) * cos_t) / sin_t;
            if y >= 0.0 && y <= f64::from(height - 1) {
                points.push((x, y.round() as i32));
            }
        }
    }
    if cos_t.abs() > 1e-9 {
        for y in [0, height - 1] {
            let x = (rho - f64::from(y) * sin_t) / cos_t;
            if x >= 0.0 && x <= f64::from(width - 1) {
                points.push((x.round() as i32, y));
            }
        }
    }
    points.dedup();
    if points.len() < 2 {
        return None;
    }
    // Farthest pair of the border hits spans the whole visible line.
    let (mut best, mut best_d) = ((points[0], points[1]), -1i64);
    for i in 0..points.len() {
        for j in i + 1..points.len() {
            let dx = i64::from(points[i].0 - points[j].0);
            let dy = i64::from(points[i].1 - points[j].1);
            let d = dx * dx + dy * dy;
            if d > best_d {
                best_d = d;
                best = (points[i], points[j]);
            }
        }
    }
    (best_d > 0).then_some(best)
}

/// Whether a detected line is worth flagging: clearly tilted, or so close to
/// level that it confirms the document sits square.
#[must_use]
pub fn worth_flagging(slope_deg: f32) -> bool {
    let s = slope_deg.abs();
    s > 5.0 || s < 0.05
}

/// Draw the flagged lines and their slopes onto an annotation copy.
#[must_use]
pub fn annotate(gray: &GrayImage, lines: &[DetectedLine]) -> RgbImage {
    let mut out = RgbImage::from_fn(gray.width(), gray.height(), |x, y| {
        let v = gray.get_pixel(x, y).0[0];
        Rgb([v, v, v])
    });
    for line in lines.iter().filter(|l| worth_flagging(l.slope_deg)) {
        line_segment(&mut out, line.from, line.to, GRID_COLOR);
        font::draw_text(
            &mut out,
            line.from.0,
            line.from.1,
            &format!("{:.4}", line.slope_deg),
            MARKER_COLOR,
        );
    }
    out
}

/// Load, normalize, optionally annotate, and display until dismissed.
pub fn run_prep(path: &Path, with_lines: bool) -> Result<(), CamError> {
    let source = image::open(path)?.to_luma16();
    let (width, height) = source.dimensions();
    let normalized = normalize(source.as_raw(), u8::MAX);
    let gray = GrayImage::from_raw(width, height, normalized)
        .expect("normalized buffer matches source dimensions");

    let shown: RgbImage = if with_lines {
        let lines = detect_lines(&gray);
        info!("found {} line(s)", lines.len());
        for line in &lines {
            info!(
                "  ({},{}) -> ({},{})  slope {:.4} deg  votes {}",
                line.from.0, line.from.1, line.to.0, line.to.1, line.slope_deg, line.votes
            );
        }
        annotate(&gray, &lines)
    } else {
        RgbImage::from_fn(width, height, |x, y| {
            let v = gray.get_pixel(x, y).0[0];
            Rgb([v, v, v])
        })
    };

    let mut window = Window::new(
        "prep",
        width as usize,
        height as usize,
        WindowOptions::default(),
    )
    .map_err(|e| CamError::Display(e.to_string()))?;
    window.set_target_fps(30);
    let buffer = crate::viewer::pack_frame(&shown);
    while window.is_open() {
        window
            .update_with_buffer(&buffer, width as usize, height as usize)
            .map_err(|e| CamError::Display(e.to_string()))?;
        if window.is_key_down(Key::Escape) || window.is_key_down(Key::X) {
            break;
        }
    }
    Ok(())
}
