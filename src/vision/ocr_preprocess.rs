//! Image preprocessing filters for OCR
//!
//! A fixed chain of pixel transforms run before recognition. Each stage can be
//! toggled through [`PreprocessConfig`] except the final histogram blend, which
//! always runs. All filters keep the alpha channel unchanged.

use image::imageops::{self, FilterType};
use image::{GrayImage, Luma, RgbaImage};
use imageproc::integral_image::integral_image;
use std::time::Instant;
use tracing::debug;

use crate::config::{FilterParams, PreprocessConfig};

/// Luminance of an RGB pixel, rounded
fn luminance(pixel: &[u8]) -> u8 {
    (0.299 * pixel[0] as f32 + 0.587 * pixel[1] as f32 + 0.114 * pixel[2] as f32)
        .round()
        .clamp(0.0, 255.0) as u8
}

fn to_channel(value: f32) -> u8 {
    value.round().clamp(0.0, 255.0) as u8
}

/// Runs the preprocessing chain
#[derive(Debug, Clone, Default)]
pub struct ImagePreprocessor {
    flags: PreprocessConfig,
    params: FilterParams,
}

impl ImagePreprocessor {
    pub fn new(flags: PreprocessConfig, params: FilterParams) -> Self {
        Self { flags, params }
    }

    /// Apply every enabled stage in order
    ///
    /// The output has the dimensions of the resized image.
    pub fn preprocess(&self, image: RgbaImage) -> RgbaImage {
        let start = Instant::now();
        let p = &self.params;
        let (width, height) = image.dimensions();

        let mut image = if self.flags.resize {
            resize_for_ocr(image, p.min_dimension, p.max_dimension)
        } else {
            image
        };

        if self.flags.denoise {
            image = gaussian_blur(&image, p.denoise_radius);
        }

        if self.flags.enhance {
            enhance_contrast(&mut image, p.gamma, p.contrast, p.brightness);
        }

        if self.flags.binarize {
            adaptive_threshold(&mut image, p.threshold_block_size, p.threshold_c);
        }

        if self.flags.sharpen {
            image = unsharp_mask(&image, p.sharpen_amount, p.sharpen_radius, p.sharpen_threshold);
        }

        equalize_blend(&mut image, p.equalize_blend);

        debug!(
            "Preprocessed {}x{} -> {}x{} in {:?} ({:?})",
            width,
            height,
            image.width(),
            image.height(),
            start.elapsed(),
            self.flags
        );
        image
    }
}

/// Scale so the longer edge lies within `min_edge..=max_edge`
///
/// Aspect ratio is preserved and each side stays at least one pixel.
pub fn resize_for_ocr(image: RgbaImage, min_edge: u32, max_edge: u32) -> RgbaImage {
    let (width, height) = image.dimensions();
    let longer = width.max(height);
    if longer == 0 {
        return image;
    }

    let scale = if longer > max_edge {
        max_edge as f32 / longer as f32
    } else if longer < min_edge {
        min_edge as f32 / longer as f32
    } else {
        return image;
    };

    let new_width = ((width as f32 * scale).round() as u32).max(1);
    let new_height = ((height as f32 * scale).round() as u32).max(1);
    debug!("Resizing {}x{} to {}x{}", width, height, new_width, new_height);

    imageops::resize(&image, new_width, new_height, FilterType::Triangle)
}

/// Normalized Gaussian weights, kernel size `2 * ceil(radius) + 1`
fn gaussian_kernel(radius: f32) -> Vec<f32> {
    let half = radius.ceil() as i32;
    let sigma = radius / 3.0;
    let weights: Vec<f32> = (-half..=half)
        .map(|offset| (-((offset * offset) as f32) / (2.0 * sigma * sigma)).exp())
        .collect();
    let sum: f32 = weights.iter().sum();
    weights.into_iter().map(|w| w / sum).collect()
}

/// Separable Gaussian blur of the RGB channels
///
/// Pixels closer than half a kernel to any border keep their values.
pub fn gaussian_blur(image: &RgbaImage, radius: f32) -> RgbaImage {
    let mut output = image.clone();
    if radius <= 0.0 {
        return output;
    }

    let kernel = gaussian_kernel(radius);
    let half = kernel.len() / 2;
    let (w, h) = (image.width() as usize, image.height() as usize);
    if w <= 2 * half || h <= 2 * half {
        return output;
    }

    let src = image.as_raw();

    // Horizontal pass over every row, interior columns only
    let mut horizontal = vec![0.0f32; w * h * 3];
    for y in 0..h {
        for x in half..w - half {
            for c in 0..3 {
                let mut acc = 0.0;
                for (k, weight) in kernel.iter().enumerate() {
                    acc += src[(y * w + x + k - half) * 4 + c] as f32 * weight;
                }
                horizontal[(y * w + x) * 3 + c] = acc;
            }
        }
    }

    let dst: &mut [u8] = &mut output;
    for y in half..h - half {
        for x in half..w - half {
            for c in 0..3 {
                let mut acc = 0.0;
                for (k, weight) in kernel.iter().enumerate() {
                    acc += horizontal[((y + k - half) * w + x) * 3 + c] * weight;
                }
                dst[(y * w + x) * 4 + c] = to_channel(acc);
            }
        }
    }

    output
}

/// Gamma, contrast and brightness adjustment of the RGB channels
pub fn enhance_contrast(image: &mut RgbaImage, gamma: f32, contrast: f32, brightness: f32) {
    let lut: Vec<u8> = (0..=255u8)
        .map(|v| {
            let corrected = (v as f32 / 255.0).powf(gamma) * 255.0;
            to_channel((corrected - 128.0) * contrast + 128.0 + brightness)
        })
        .collect();

    for pixel in image.pixels_mut() {
        for c in 0..3 {
            pixel[c] = lut[pixel[c] as usize];
        }
    }
}

/// Binarize against the mean of a centered block of the grayscale image
///
/// The block is clamped at the image edges. Pixels darker than the local mean
/// minus `c` become black, all others white.
pub fn adaptive_threshold(image: &mut RgbaImage, block_size: u32, c: f32) {
    let (width, height) = image.dimensions();
    if width == 0 || height == 0 {
        return;
    }

    let gray = GrayImage::from_fn(width, height, |x, y| Luma([luminance(&image.get_pixel(x, y).0)]));
    let sums = integral_image::<_, u64>(&gray);
    let sum_at = |x: u32, y: u32| sums.get_pixel(x, y)[0] as i64;
    let half = block_size / 2;

    for (x, y, pixel) in image.enumerate_pixels_mut() {
        let x0 = x.saturating_sub(half);
        let y0 = y.saturating_sub(half);
        let x1 = (x + half).min(width - 1) + 1;
        let y1 = (y + half).min(height - 1) + 1;

        let total = sum_at(x1, y1) - sum_at(x0, y1) - sum_at(x1, y0) + sum_at(x0, y0);
        let count = ((x1 - x0) * (y1 - y0)) as f32;
        let mean = total as f32 / count;

        let value = if (gray.get_pixel(x, y)[0] as f32) < mean - c { 0 } else { 255 };
        pixel[0] = value;
        pixel[1] = value;
        pixel[2] = value;
    }
}

/// Unsharp mask of the RGB channels
///
/// Channels whose difference to the blurred copy exceeds `threshold` are
/// pushed away from the blur by `amount`.
pub fn unsharp_mask(image: &RgbaImage, amount: f32, radius: f32, threshold: f32) -> RgbaImage {
    let blurred = gaussian_blur(image, radius);
    let mut output = image.clone();

    for (pixel, soft) in output.pixels_mut().zip(blurred.pixels()) {
        for c in 0..3 {
            let original = pixel[c] as f32;
            let diff = original - soft[c] as f32;
            if diff.abs() > threshold {
                pixel[c] = to_channel(original + amount * diff);
            }
        }
    }

    output
}

/// Blend each pixel towards its histogram-equalized brightness
///
/// The target brightness is `(1 - blend) * gray + blend * equalized` and the
/// RGB channels are scaled to reach it. Pure black pixels stay black.
pub fn equalize_blend(image: &mut RgbaImage, blend: f32) {
    let total = image.width() as u64 * image.height() as u64;
    if total == 0 {
        return;
    }

    let mut histogram = [0u64; 256];
    for pixel in image.pixels() {
        histogram[luminance(&pixel.0) as usize] += 1;
    }

    let mut lut = [0f32; 256];
    let mut cdf = 0u64;
    for (value, count) in histogram.iter().enumerate() {
        cdf += count;
        lut[value] = (cdf as f32 * 255.0 / total as f32).round();
    }

    for pixel in image.pixels_mut() {
        let gray = luminance(&pixel.0);
        if gray == 0 {
            continue;
        }

        let target = gray as f32 * (1.0 - blend) + lut[gray as usize] * blend;
        let ratio = target / gray as f32;
        for c in 0..3 {
            pixel[c] = to_channel(pixel[c] as f32 * ratio);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgba;

    fn uniform(width: u32, height: u32, value: u8) -> RgbaImage {
        RgbaImage::from_pixel(width, height, Rgba([value, value, value, 255]))
    }

    #[test]
    fn test_resize_limits() {
        let large = resize_for_ocr(uniform(3000, 1500, 0), 400, 2000);
        assert_eq!(large.dimensions(), (2000, 1000));

        let small = resize_for_ocr(uniform(100, 50, 0), 400, 2000);
        assert_eq!(small.dimensions(), (400, 200));

        let ok = resize_for_ocr(uniform(800, 600, 0), 400, 2000);
        assert_eq!(ok.dimensions(), (800, 600));
    }

    #[test]
    fn test_resize_keeps_one_pixel() {
        let thin = resize_for_ocr(uniform(4000, 1, 0), 400, 2000);
        assert_eq!(thin.dimensions(), (2000, 1));
    }

    #[test]
    fn test_kernel_normalized_and_symmetric() {
        let kernel = gaussian_kernel(1.5);
        assert_eq!(kernel.len(), 5);
        assert!((kernel.iter().sum::<f32>() - 1.0).abs() < 1e-5);
        assert!((kernel[0] - kernel[4]).abs() < 1e-6);
        assert!(kernel[2] > kernel[1]);
    }

    #[test]
    fn test_blur_uniform_and_borders() {
        let blurred = gaussian_blur(&uniform(10, 10, 120), 1.0);
        assert!(blurred.pixels().all(|p| p.0 == [120, 120, 120, 255]));

        let mut image = uniform(10, 10, 0);
        image.put_pixel(0, 0, Rgba([255, 255, 255, 255]));
        image.put_pixel(5, 5, Rgba([255, 255, 255, 255]));
        let blurred = gaussian_blur(&image, 1.0);

        // Border pixel untouched, interior impulse spread out
        assert_eq!(blurred.get_pixel(0, 0).0, [255, 255, 255, 255]);
        assert!(blurred.get_pixel(5, 5)[0] < 255);
        assert!(blurred.get_pixel(5, 6)[0] > 0);
    }

    #[test]
    fn test_blur_tiny_image_unchanged() {
        let mut image = uniform(2, 2, 10);
        image.put_pixel(1, 1, Rgba([200, 200, 200, 255]));
        assert_eq!(gaussian_blur(&image, 1.0), image);
    }

    #[test]
    fn test_enhance_contrast_values() {
        let mut image = RgbaImage::from_raw(
            5,
            1,
            [0u8, 64, 128, 200, 255]
                .iter()
                .flat_map(|&v| [v, v, v, 7])
                .collect(),
        )
        .unwrap();

        enhance_contrast(&mut image, 0.8, 1.4, 10.0);

        let values: Vec<u8> = image.pixels().map(|p| p[0]).collect();
        assert_eq!(values, vec![0, 77, 164, 253, 255]);
        assert!(image.pixels().all(|p| p[3] == 7));
    }

    #[test]
    fn test_adaptive_threshold_dark_stroke() {
        let mut image = uniform(30, 30, 230);
        for y in 10..20 {
            image.put_pixel(15, y, Rgba([20, 20, 20, 255]));
        }

        adaptive_threshold(&mut image, 15, 8.0);

        assert_eq!(image.get_pixel(15, 15).0, [0, 0, 0, 255]);
        assert_eq!(image.get_pixel(5, 5).0, [255, 255, 255, 255]);
        assert_eq!(image.get_pixel(0, 29).0, [255, 255, 255, 255]);
    }

    #[test]
    fn test_adaptive_threshold_uniform_is_white() {
        let mut image = uniform(8, 8, 40);
        adaptive_threshold(&mut image, 15, 8.0);
        assert!(image.pixels().all(|p| p.0 == [255, 255, 255, 255]));
    }

    #[test]
    fn test_adaptive_threshold_large_bright_image() {
        // Block sums of a 16.9 MP white page exceed u32
        let mut image = uniform(16_900, 1_000, 255);
        adaptive_threshold(&mut image, 15, 8.0);

        assert_eq!(image.get_pixel(0, 0).0, [255, 255, 255, 255]);
        assert_eq!(image.get_pixel(16_899, 999).0, [255, 255, 255, 255]);
        assert_eq!(image.get_pixel(8_450, 500).0, [255, 255, 255, 255]);
    }

    #[test]
    fn test_unsharp_mask() {
        let flat = uniform(12, 12, 100);
        assert_eq!(unsharp_mask(&flat, 1.5, 1.5, 0.0), flat);

        let mut edge = uniform(12, 12, 60);
        for y in 0..12 {
            for x in 6..12 {
                edge.put_pixel(x, y, Rgba([180, 180, 180, 255]));
            }
        }
        let sharpened = unsharp_mask(&edge, 1.5, 1.5, 0.0);
        // Dark side of the edge gets darker, bright side brighter
        assert!(sharpened.get_pixel(5, 6)[0] < 60);
        assert!(sharpened.get_pixel(6, 6)[0] > 180);

        // A high threshold leaves everything alone
        assert_eq!(unsharp_mask(&edge, 1.5, 1.5, 255.0), edge);
    }

    #[test]
    fn test_equalize_blend() {
        let mut white = uniform(4, 4, 255);
        equalize_blend(&mut white, 0.3);
        assert!(white.pixels().all(|p| p.0 == [255, 255, 255, 255]));

        let mut black = uniform(4, 4, 0);
        equalize_blend(&mut black, 0.3);
        assert!(black.pixels().all(|p| p.0 == [0, 0, 0, 255]));
    }

    #[test]
    fn test_equalize_blend_keeps_black_text() {
        let mut page = uniform(10, 10, 255);
        for x in 0..10 {
            page.put_pixel(x, 4, Rgba([0, 0, 0, 255]));
        }

        equalize_blend(&mut page, 0.3);

        assert!((0..10).all(|x| page.get_pixel(x, 4).0 == [0, 0, 0, 255]));
        assert_eq!(page.get_pixel(3, 0).0, [255, 255, 255, 255]);
    }

    #[test]
    fn test_preprocess_output_dimensions() {
        let preprocessor = ImagePreprocessor::default();
        let output = preprocessor.preprocess(uniform(100, 40, 200));
        assert_eq!(output.dimensions(), (400, 160));

        let unresized = ImagePreprocessor::new(
            PreprocessConfig {
                resize: false,
                ..Default::default()
            },
            FilterParams::default(),
        );
        assert_eq!(unresized.preprocess(uniform(100, 40, 200)).dimensions(), (100, 40));
    }

    #[test]
    fn test_preprocess_all_stages_off() {
        let flags = PreprocessConfig {
            enhance: false,
            resize: false,
            sharpen: false,
            binarize: false,
            denoise: false,
            auto_rotate: false,
        };
        let preprocessor = ImagePreprocessor::new(flags, FilterParams::default());

        // Only the final blend runs; a white image is a fixed point
        let output = preprocessor.preprocess(uniform(20, 20, 255));
        assert_eq!(output, uniform(20, 20, 255));
    }
}
