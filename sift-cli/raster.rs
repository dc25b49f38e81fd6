use crate::error::{PipelineError, PipelineResult};
use image::{DynamicImage, GrayImage, RgbImage};
use sift_core::ImageView;
use std::path::Path;

/// Decode an image file (PNG or JPEG)
pub fn load_image<P: AsRef<Path>>(path: P) -> PipelineResult<DynamicImage> {
    let path = path.as_ref();
    image::open(path).map_err(|source| PipelineError::Decode { path: path.to_path_buf(), source })
}

/// Decode an image file and convert it to 8-bit RGB
pub fn load_rgb<P: AsRef<Path>>(path: P) -> PipelineResult<RgbImage> {
    Ok(load_image(path)?.to_rgb8())
}

/// Borrow an RGB raster as an extractor input
pub fn image_view(img: &RgbImage) -> ImageView<'_> {
    ImageView::new(img.width() as usize, img.height() as usize, 3, img.as_raw())
}

/// ITU-R 601 luma, rounded to 8 bits
pub fn to_gray(img: &RgbImage) -> GrayImage {
    let gray = image_view(img).to_gray_f32();
    let data = gray.iter().map(|v| v.round().clamp(0.0, 255.0) as u8).collect();
    let (w, h) = img.dimensions();
    GrayImage::from_raw(w, h, data).unwrap_or_else(|| GrayImage::new(w, h))
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgb;

    #[test]
    fn test_image_view_layout() {
        let img = RgbImage::from_pixel(4, 3, Rgb([1, 2, 3]));
        let view = image_view(&img);
        assert_eq!((view.width, view.height, view.channels), (4, 3, 3));
        assert_eq!(view.data.len(), view.expected_len());
    }

    #[test]
    fn test_gray_weights() {
        let mut img = RgbImage::new(3, 1);
        img.put_pixel(0, 0, Rgb([255, 0, 0]));
        img.put_pixel(1, 0, Rgb([0, 255, 0]));
        img.put_pixel(2, 0, Rgb([255, 255, 255]));
        let gray = to_gray(&img);
        assert_eq!(gray.get_pixel(0, 0)[0], 76);
        assert_eq!(gray.get_pixel(1, 0)[0], 150);
        assert_eq!(gray.get_pixel(2, 0)[0], 255);
    }

    #[test]
    fn test_missing_file_is_decode_error() {
        let err = load_image("definitely/not/here.png").unwrap_err();
        assert!(matches!(err, PipelineError::Decode { .. }));
    }
}
