//! Page image clean-up before the image is sent to the model.
//!
//! Rendered PDF pages are turned into black-on-white by an adaptive
//! Gaussian threshold: each pixel is compared with the Gaussian-weighted
//! mean of its 11×11 neighbourhood minus a small offset. Faint scans and
//! coloured backgrounds come out as crisp text.

use image::{imageops, DynamicImage, GrayImage, Luma};

/// Side of the square neighbourhood the Gaussian covers.
pub const WINDOW: u32 = 11;

/// Subtracted from the local mean before comparing.
pub const OFFSET: i16 = 2;

/// Gaussian sigma for a `window`-wide kernel (the usual
/// `0.3 * ((k - 1) / 2 - 1) + 0.8` rule, 2.0 for 11).
pub fn sigma_for(window: u32) -> f32 {
    0.3 * ((window.max(3) as f32 - 1.0) * 0.5 - 1.0) + 0.8
}

/// Grayscale + adaptive Gaussian threshold, returned as RGB.
pub fn enhance(img: &DynamicImage) -> DynamicImage {
    let gray = img.to_luma8();
    let binary = adaptive_threshold(&gray, WINDOW, OFFSET);
    DynamicImage::ImageRgb8(DynamicImage::ImageLuma8(binary).to_rgb8())
}

/// Binary threshold against the Gaussian-weighted local mean: white when
/// `pixel > mean - offset`, black otherwise.
pub fn adaptive_threshold(gray: &GrayImage, window: u32, offset: i16) -> GrayImage {
    let (w, h) = gray.dimensions();
    if w == 0 || h == 0 {
        return GrayImage::new(w, h);
    }

    let mean = imageops::blur(gray, sigma_for(window));
    GrayImage::from_fn(w, h, |x, y| {
        let p = gray.get_pixel(x, y)[0] as i16;
        let t = mean.get_pixel(x, y)[0] as i16 - offset;
        Luma([if p > t { 255 } else { 0 }])
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgb, RgbImage};

    /// Left-to-right ramp from 40 to about 238.
    fn ramp(w: u32, h: u32) -> GrayImage {
        GrayImage::from_fn(w, h, |x, _| Luma([40 + (x * 2) as u8]))
    }

    #[test]
    fn kernel_sigma_for_default_window() {
        assert!((sigma_for(WINDOW) - 2.0).abs() < 1e-6);
    }

    #[test]
    fn uniform_page_turns_white() {
        let gray = GrayImage::from_pixel(20, 20, Luma([90]));
        let out = adaptive_threshold(&gray, WINDOW, OFFSET);
        assert!(out.pixels().all(|p| p[0] == 255));
    }

    #[test]
    fn smooth_gradient_turns_white() {
        let gray = ramp(100, 24);
        let out = adaptive_threshold(&gray, WINDOW, OFFSET);
        for y in 8..16 {
            for x in 10..90 {
                assert_eq!(out.get_pixel(x, y)[0], 255, "({x},{y})");
            }
        }
    }

    #[test]
    fn dark_line_on_gradient_stays_black() {
        let mut gray = ramp(100, 40);
        for y in 5..35 {
            gray.put_pixel(50, y, Luma([20]));
        }
        let out = adaptive_threshold(&gray, WINDOW, OFFSET);
        for y in 10..30 {
            assert_eq!(out.get_pixel(50, y)[0], 0, "line at y={y}");
            assert_eq!(out.get_pixel(20, y)[0], 255);
            assert_eq!(out.get_pixel(80, y)[0], 255);
        }
    }

    #[test]
    fn enhance_keeps_dimensions_and_returns_rgb() {
        let img = DynamicImage::ImageRgb8(RgbImage::from_pixel(7, 4, Rgb([200, 10, 10])));
        let out = enhance(&img);
        assert_eq!((out.width(), out.height()), (7, 4));
        assert!(matches!(out, DynamicImage::ImageRgb8(_)));
    }

    #[test]
    fn enhance_binarises_every_pixel() {
        let img = DynamicImage::ImageLuma8(ramp(60, 30)).to_rgb8();
        let out = enhance(&DynamicImage::ImageRgb8(img)).to_rgb8();
        assert!(out
            .pixels()
            .all(|p| p.0 == [0, 0, 0] || p.0 == [255, 255, 255]));
    }

    #[test]
    fn empty_image_is_fine() {
        let out = adaptive_threshold(&GrayImage::new(0, 0), WINDOW, OFFSET);
        assert_eq!(out.dimensions(), (0, 0));
    }
}
