//! Frame annotation: bounding boxes, joint markers, posture labels,
//! and the fall alert banner. Text uses a built-in 5x7 glyph set so no
//! font asset ships with the binary.

use crate::detector::SubjectDetection;
use crate::posture::Posture;
use image::{Rgb, RgbImage};
use imageproc::drawing::{draw_filled_circle_mut, draw_filled_rect_mut, draw_hollow_rect_mut};
use imageproc::rect::Rect;

const BOX_COLOR: Rgb<u8> = Rgb([0, 255, 0]);
const JOINT_COLOR: Rgb<u8> = Rgb([0, 255, 0]);
const LABEL_COLOR: Rgb<u8> = Rgb([255, 255, 255]);
const ALERT_COLOR: Rgb<u8> = Rgb([255, 40, 40]);
const BACKDROP_COLOR: Rgb<u8> = Rgb([0, 0, 0]);

const JOINT_RADIUS: i32 = 3;
const GLYPH_ADVANCE: i32 = 6;

/// Draw one subject's overlay: box, joints, posture label, and, when
/// the fall is confirmed, an alert banner above the box.
pub fn annotate_subject(
    frame: &mut RgbImage,
    detection: &SubjectDetection,
    posture: Posture,
    fall_confirmed: bool,
) {
    let width = frame.width() as i32;
    let height = frame.height() as i32;

    let left = (detection.bbox.x1.round() as i32).clamp(0, width - 1);
    let top = (detection.bbox.y1.round() as i32).clamp(0, height - 1);
    let right = (detection.bbox.x2.round() as i32).clamp(0, width - 1);
    let bottom = (detection.bbox.y2.round() as i32).clamp(0, height - 1);

    let box_width = (right - left).max(1) as u32;
    let box_height = (bottom - top).max(1) as u32;
    draw_hollow_rect_mut(
        frame,
        Rect::at(left, top).of_size(box_width, box_height),
        BOX_COLOR,
    );

    for keypoint in &detection.keypoints {
        let x = keypoint.x.round() as i32;
        let y = keypoint.y.round() as i32;
        if x >= 0 && x < width && y >= 0 && y < height {
            draw_filled_circle_mut(frame, (x, y), JOINT_RADIUS, JOINT_COLOR);
        }
    }

    let label_y = (top - 12).max(0);
    draw_label(frame, left, label_y, posture.label(), LABEL_COLOR);

    if fall_confirmed {
        let alert_y = (top - 28).max(0);
        draw_label(frame, left, alert_y, "FALL DETECTED", ALERT_COLOR);
    }
}

/// Render text with a filled backdrop at (x, y).
fn draw_label(frame: &mut RgbImage, x: i32, y: i32, text: &str, color: Rgb<u8>) {
    let backdrop_width = (text.chars().count() as i32 * GLYPH_ADVANCE + 2).max(1) as u32;
    let backdrop_x = x.max(0);
    let backdrop_y = (y - 1).max(0);
    draw_filled_rect_mut(
        frame,
        Rect::at(backdrop_x, backdrop_y).of_size(backdrop_width, 9),
        BACKDROP_COLOR,
    );
    draw_text(frame, x + 1, y, text, color);
}

fn draw_text(frame: &mut RgbImage, mut x: i32, y: i32, text: &str, color: Rgb<u8>) {
    let width = frame.width() as i32;
    let height = frame.height() as i32;

    for ch in text.chars().flat_map(|c| c.to_uppercase()) {
        if let Some(glyph) = glyph_bits(ch) {
            for (row, pattern) in glyph.iter().enumerate() {
                let py = y + row as i32;
                if py < 0 || py >= height {
                    continue;
                }
                for col in 0..5 {
                    if (pattern >> (4 - col)) & 1 == 1 {
                        let px = x + col;
                        if px >= 0 && px < width {
                            frame.put_pixel(px as u32, py as u32, color);
                        }
                    }
                }
            }
        }
        x += GLYPH_ADVANCE;
    }
}

fn glyph_bits(ch: char) -> Option<[u8; 7]> {
    match ch {
        'A' => Some([
            0b01110, 0b10001, 0b10001, 0b11111, 0b10001, 0b10001, 0b10001,
        ]),
        'C' => Some([
            0b01110, 0b10001, 0b10000, 0b10000, 0b10000, 0b10001, 0b01110,
        ]),
        'D' => Some([
            0b11110, 0b10001, 0b10001, 0b10001, 0b10001, 0b10001, 0b11110,
        ]),
        'E' => Some([
            0b11111, 0b10000, 0b11110, 0b10000, 0b10000, 0b10000, 0b11111,
        ]),
        'F' => Some([
            0b11111, 0b10000, 0b11110, 0b10000, 0b10000, 0b10000, 0b10000,
        ]),
        'G' => Some([
            0b01110, 0b10001, 0b10000, 0b10011, 0b10001, 0b10001, 0b01111,
        ]),
        'I' => Some([
            0b01110, 0b00100, 0b00100, 0b00100, 0b00100, 0b00100, 0b01110,
        ]),
        'L' => Some([
            0b10000, 0b10000, 0b10000, 0b10000, 0b10000, 0b10000, 0b11111,
        ]),
        'N' => Some([
            0b10001, 0b11001, 0b10101, 0b10101, 0b10011, 0b10001, 0b10001,
        ]),
        'O' => Some([
            0b01110, 0b10001, 0b10001, 0b10001, 0b10001, 0b10001, 0b01110,
        ]),
        'P' => Some([
            0b11110, 0b10001, 0b10001, 0b11110, 0b10000, 0b10000, 0b10000,
        ]),
        'R' => Some([
            0b11110, 0b10001, 0b10001, 0b11110, 0b10100, 0b10010, 0b10001,
        ]),
        'S' => Some([
            0b01111, 0b10000, 0b01110, 0b00001, 0b00001, 0b10001, 0b01110,
        ]),
        'T' => Some([
            0b11111, 0b00100, 0b00100, 0b00100, 0b00100, 0b00100, 0b00100,
        ]),
        'U' => Some([
            0b10001, 0b10001, 0b10001, 0b10001, 0b10001, 0b10001, 0b01110,
        ]),
        'Y' => Some([
            0b10001, 0b10001, 0b01010, 0b00100, 0b00100, 0b00100, 0b00100,
        ]),
        '_' => Some([
            0b00000, 0b00000, 0b00000, 0b00000, 0b00000, 0b00000, 0b11111,
        ]),
        ' ' => Some([0, 0, 0, 0, 0, 0, 0]),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detector::{BoundingBox, Keypoint};

    fn detection(x1: f32, y1: f32, x2: f32, y2: f32) -> SubjectDetection {
        SubjectDetection {
            bbox: BoundingBox { x1, y1, x2, y2 },
            keypoints: vec![Keypoint { x: 50.0, y: 50.0 }; 17],
            confidence: 0.9,
        }
    }

    #[test]
    fn annotation_marks_the_bounding_box() {
        let mut frame = RgbImage::new(200, 200);
        annotate_subject(&mut frame, &detection(20.0, 40.0, 120.0, 180.0), Posture::Standing, false);

        assert_eq!(*frame.get_pixel(20, 40), BOX_COLOR);
        assert_eq!(*frame.get_pixel(120, 180), BOX_COLOR);
        // Joint marker at (50, 50).
        assert_eq!(*frame.get_pixel(50, 50), JOINT_COLOR);
    }

    #[test]
    fn fall_banner_paints_alert_pixels() {
        let mut frame = RgbImage::new(200, 200);
        annotate_subject(&mut frame, &detection(20.0, 60.0, 120.0, 180.0), Posture::Lying, true);

        let alert_painted = (0..200u32)
            .flat_map(|x| (0..60u32).map(move |y| (x, y)))
            .any(|(x, y)| *frame.get_pixel(x, y) == ALERT_COLOR);
        assert!(alert_painted, "expected red alert text above the box");
    }

    #[test]
    fn off_screen_geometry_does_not_panic() {
        let mut frame = RgbImage::new(64, 64);
        let mut det = detection(-50.0, -50.0, 500.0, 500.0);
        det.keypoints.push(Keypoint {
            x: -10.0,
            y: 1000.0,
        });
        annotate_subject(&mut frame, &det, Posture::Lying, true);
    }

    #[test]
    fn all_label_characters_have_glyphs() {
        for posture in [
            Posture::Standing,
            Posture::SittingOnSupport,
            Posture::SittingOnGround,
            Posture::Lying,
        ] {
            for ch in posture.label().chars() {
                assert!(glyph_bits(ch).is_some(), "missing glyph for {ch:?}");
            }
        }
        for ch in "FALL DETECTED".chars() {
            assert!(glyph_bits(ch).is_some(), "missing glyph for {ch:?}");
        }
    }
}
