use crate::annotate::{draw_closed_polyline, RED, STROKE};
use crate::raster::to_gray;
use image::{GrayImage, RgbImage};
use imageproc::contours::{find_contours, BorderType};
use imageproc::edges::canny;
use imageproc::point::Point;

pub const CANNY_LOW: f32 = 100.0;
pub const CANNY_HIGH: f32 = 200.0;

/// Intermediate and final products of contour rendering
#[derive(Debug, Clone)]
pub struct ContourRendering {
    pub gray: GrayImage,
    pub edges: GrayImage,
    /// Outermost contours only
    pub contours: Vec<Vec<Point<i32>>>,
    /// Copy of the input with contours drawn in red
    pub annotated: RgbImage,
}

/// Detect edges and draw the external contours of `img` on a copy of it.
///
/// The edge detector smooths the gray image with a Gaussian (sigma 1.4)
/// before applying the 100/200 hysteresis thresholds.
pub fn render_contours(img: &RgbImage) -> ContourRendering {
    let gray = to_gray(img);
    let edges = canny(&gray, CANNY_LOW, CANNY_HIGH);

    let contours: Vec<Vec<Point<i32>>> = find_contours::<i32>(&edges)
        .into_iter()
        .filter(|c| c.border_type == BorderType::Outer && c.parent.is_none())
        .map(|c| c.points)
        .collect();

    let mut annotated = img.clone();
    for contour in &contours {
        let pts: Vec<(f32, f32)> = contour.iter().map(|p| (p.x as f32, p.y as f32)).collect();
        draw_closed_polyline(&mut annotated, &pts, RED, STROKE);
    }

    log::debug!("contours: {} external contours", contours.len());
    ContourRendering { gray, edges, contours, annotated }
}
