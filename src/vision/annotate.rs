//! Draws detections onto the source image for the response overlay.

use super::Detection;
use crate::Result;
use ab_glyph::{FontArc, PxScale};
use base64::{Engine as _, engine::general_purpose::STANDARD};
use image::{DynamicImage, ImageFormat, Rgb, RgbImage};
use imageproc::drawing::{draw_filled_rect_mut, draw_hollow_rect_mut, draw_text_mut, text_size};
use imageproc::rect::Rect;
use std::io::Cursor;
use std::sync::LazyLock;

const FONT_BYTES: &[u8] = include_bytes!("../../assets/DejaVuSans.ttf");

static FONT: LazyLock<FontArc> = LazyLock::new(|| {
    FontArc::try_from_slice(FONT_BYTES).expect("embedded font is valid")
});

const PALETTE: [[u8; 3]; 10] = [
    [255, 56, 56],
    [255, 157, 151],
    [255, 112, 31],
    [255, 178, 29],
    [207, 210, 49],
    [72, 249, 10],
    [146, 204, 23],
    [61, 219, 134],
    [26, 147, 52],
    [0, 212, 187],
];

/// Colour for a label, stable across requests.
pub fn label_color(label: &str) -> Rgb<u8> {
    let hash = label
        .bytes()
        .fold(0usize, |acc, b| acc.wrapping_mul(31).wrapping_add(b as usize));
    Rgb(PALETTE[hash % PALETTE.len()])
}

/// Caption drawn in a detection's label tab.
pub fn caption(detection: &Detection) -> String {
    format!("{} {:.2}", detection.label, detection.confidence)
}

/// Black or white, whichever reads better on `background`.
fn text_color(background: Rgb<u8>) -> Rgb<u8> {
    let [r, g, b] = background.0;
    let luma = 0.299 * r as f32 + 0.587 * g as f32 + 0.114 * b as f32;
    if luma > 150.0 {
        Rgb([0, 0, 0])
    } else {
        Rgb([255, 255, 255])
    }
}

/// Outlines every detection and writes `"{label} {confidence}"` in a filled
/// tab on its top edge (inside the box when there is no room above).
pub fn render(image: &DynamicImage, detections: &[Detection]) -> RgbImage {
    let mut canvas = image.to_rgb8();
    let (width, height) = canvas.dimensions();
    if width == 0 || height == 0 {
        return canvas;
    }
    let thickness = (width.min(height) / 200).max(2) as i32;
    let scale = PxScale::from((thickness * 7).max(14) as f32);

    for detection in detections {
        let color = label_color(&detection.label);
        let (x1, y1, x2, y2) = detection.corners();
        let (left, top) = (x1.round() as i32, y1.round() as i32);
        let box_w = (x2.round() as i32 - left).max(1);
        let box_h = (y2.round() as i32 - top).max(1);

        for t in 0..thickness {
            let (w, h) = (box_w - 2 * t, box_h - 2 * t);
            if w <= 0 || h <= 0 {
                break;
            }
            draw_hollow_rect_mut(
                &mut canvas,
                Rect::at(left + t, top + t).of_size(w as u32, h as u32),
                color,
            );
        }

        let text = caption(detection);
        let (text_w, text_h) = text_size(scale, &*FONT, &text);
        let pad = thickness;
        let tab_w = text_w as i32 + 2 * pad;
        let tab_h = text_h as i32 + 2 * pad;
        let tab_top = if top - tab_h >= 0 { top - tab_h } else { top };

        draw_filled_rect_mut(
            &mut canvas,
            Rect::at(left, tab_top).of_size(tab_w as u32, tab_h as u32),
            color,
        );
        draw_text_mut(
            &mut canvas,
            text_color(color),
            left + pad,
            tab_top + pad,
            scale,
            &*FONT,
            &text,
        );
    }

    canvas
}

/// [`render`] then JPEG, then standard base64.
pub fn render_base64(image: &DynamicImage, detections: &[Detection]) -> Result<String> {
    let annotated = DynamicImage::ImageRgb8(render(image, detections));
    let mut buffer = Vec::new();
    annotated.write_to(&mut Cursor::new(&mut buffer), ImageFormat::Jpeg)?;
    Ok(STANDARD.encode(&buffer))
}
