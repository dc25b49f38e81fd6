use image::{Rgb, RgbImage};
use imageproc::drawing::{draw_hollow_rect_mut, draw_line_segment_mut};
use imageproc::rect::Rect;
use sift_core::Point;

pub const RED: Rgb<u8> = Rgb([255, 0, 0]);
pub const GREEN: Rgb<u8> = Rgb([0, 255, 0]);
/// Stroke width for all annotations, in pixels
pub const STROKE: u32 = 2;

/// Axis-aligned integer rectangle enclosing a point set
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, serde::Serialize)]
pub struct BoundingBox {
    pub x: i32,
    pub y: i32,
    pub width: u32,
    pub height: u32,
}

impl BoundingBox {
    /// Smallest box containing every point: floored minimum corner, and the
    /// floored maximum included. `None` for an empty slice.
    pub fn enclosing(points: &[Point]) -> Option<Self> {
        let first = points.first()?;
        let (mut x0, mut y0, mut x1, mut y1) = (first.x, first.y, first.x, first.y);
        for p in &points[1..] {
            x0 = x0.min(p.x);
            y0 = y0.min(p.y);
            x1 = x1.max(p.x);
            y1 = y1.max(p.y);
        }
        let (x0, y0) = (x0.floor() as i32, y0.floor() as i32);
        let (x1, y1) = (x1.floor() as i32, y1.floor() as i32);
        Some(Self { x: x0, y: y0, width: (x1 - x0 + 1) as u32, height: (y1 - y0 + 1) as u32 })
    }

    fn rect(&self) -> Rect {
        Rect::at(self.x, self.y).of_size(self.width.max(1), self.height.max(1))
    }
}

/// Draw the outline of `bbox` with a `thickness` pixel stroke growing inwards
pub fn draw_box(img: &mut RgbImage, bbox: &BoundingBox, color: Rgb<u8>, thickness: u32) {
    for t in 0..thickness {
        let (w, h) = (bbox.width.saturating_sub(2 * t), bbox.height.saturating_sub(2 * t));
        if w == 0 || h == 0 {
            break;
        }
        let inset = BoundingBox { x: bbox.x + t as i32, y: bbox.y + t as i32, width: w, height: h };
        draw_hollow_rect_mut(img, inset.rect(), color);
    }
}

/// Draw a closed polyline with a `thickness` pixel stroke
pub fn draw_closed_polyline(
    img: &mut RgbImage,
    points: &[(f32, f32)],
    color: Rgb<u8>,
    thickness: u32,
) {
    if points.is_empty() {
        return;
    }
    let next = points.iter().cycle().skip(1);
    for (&(x0, y0), &(x1, y1)) in points.iter().zip(next) {
        for dy in 0..thickness {
            for dx in 0..thickness {
                let (ox, oy) = (dx as f32, dy as f32);
                draw_line_segment_mut(img, (x0 + ox, y0 + oy), (x1 + ox, y1 + oy), color);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_enclosing_box() {
        let pts = [Point::new(10.7, 20.2), Point::new(30.1, 5.9), Point::new(15.0, 12.0)];
        let b = BoundingBox::enclosing(&pts).unwrap();
        assert_eq!(b, BoundingBox { x: 10, y: 5, width: 21, height: 16 });
        assert!(BoundingBox::enclosing(&[]).is_none());
    }

    #[test]
    fn test_single_point_box() {
        let b = BoundingBox::enclosing(&[Point::new(3.5, 4.5)]).unwrap();
        assert_eq!(b, BoundingBox { x: 3, y: 4, width: 1, height: 1 });
    }

    #[test]
    fn test_draw_box_two_pixel_stroke() {
        let mut img = RgbImage::new(20, 20);
        draw_box(&mut img, &BoundingBox { x: 2, y: 3, width: 10, height: 8 }, RED, STROKE);
        assert_eq!(*img.get_pixel(2, 3), RED);
        assert_eq!(*img.get_pixel(3, 4), RED);
        assert_eq!(*img.get_pixel(11, 10), RED);
        assert_eq!(*img.get_pixel(10, 9), RED);
        assert_eq!(*img.get_pixel(6, 7), Rgb([0, 0, 0]));
        assert_eq!(*img.get_pixel(4, 5), Rgb([0, 0, 0]));
    }

    #[test]
    fn test_closed_polyline_is_closed() {
        let mut img = RgbImage::new(20, 20);
        draw_closed_polyline(&mut img, &[(2.0, 2.0), (10.0, 2.0), (10.0, 10.0)], GREEN, 1);
        // closing segment from (10, 10) back to (2, 2)
        assert_eq!(*img.get_pixel(6, 6), GREEN);
    }
}
