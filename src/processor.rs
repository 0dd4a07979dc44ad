//! This module provides tools for preprocessing images before they are fed into a model.
//!
//! It defines the `ImageProcessor` trait for generic image processing operations
//! and provides a concrete implementation, `ImagePreprocessor`, which converts
//! to RGB, resizes to the model's input size and scales pixels to `[0, 1]`.
//! Decoding helpers turn raw bytes or files into images, reporting undecodable
//! input as `MushguardError::Decode`.

use std::path::Path;

use image::{imageops::FilterType, DynamicImage, ImageReader, RgbImage};
use ndarray::{Array, Axis, Ix4};

use crate::{
    classifier::Classifier,
    config::InputSize,
    error::{MushguardError, Result},
};

/// A trait for processing images into tensors suitable for model input.
pub trait ImageProcessor {
    /// Processes a single image into a 4D tensor.
    fn process(&self, image: &DynamicImage) -> Result<Array<f32, Ix4>>;
}

/// A preprocessor that produces `[1, H, W, 3]` tensors with values in `[0, 1]`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImagePreprocessor {
    pub height: u32,
    pub width: u32,
}

impl ImagePreprocessor {
    /// Creates a new `ImagePreprocessor`.
    pub fn new(height: u32, width: u32) -> Self {
        Self { height, width }
    }

    /// Creates a preprocessor matching the input size the model declares.
    pub fn for_model(model: &dyn Classifier) -> Self {
        let InputSize { height, width } = model.input_size();
        Self::new(height, width)
    }

    /// Scales the pixel values and arranges them in NHWC layout.
    fn to_tensor(&self, image: &RgbImage) -> Array<f32, Ix4> {
        let mut tensor = Array::zeros((self.height as usize, self.width as usize, 3));

        for (x, y, pixel) in image.enumerate_pixels() {
            for (c, &value) in pixel.0.iter().enumerate() {
                tensor[[y as usize, x as usize, c]] = value as f32 / 255.0;
            }
        }

        tensor.insert_axis(Axis(0))
    }
}

impl ImageProcessor for ImagePreprocessor {
    fn process(&self, image: &DynamicImage) -> Result<Array<f32, Ix4>> {
        if image.width() == 0 || image.height() == 0 {
            return Err(MushguardError::EmptyImage);
        }
        let rgb = image.to_rgb8();
        let resized = image::imageops::resize(&rgb, self.width, self.height, FilterType::CatmullRom);
        Ok(self.to_tensor(&resized))
    }
}

fn ensure_pixels(image: DynamicImage) -> Result<DynamicImage> {
    if image.width() == 0 || image.height() == 0 {
        return Err(MushguardError::EmptyImage);
    }
    Ok(image)
}

/// Decodes an in-memory image, guessing the format from its contents.
pub fn decode_image(bytes: &[u8]) -> Result<DynamicImage> {
    let image = ImageReader::new(std::io::Cursor::new(bytes))
        .with_guessed_format()?
        .decode()?;
    ensure_pixels(image)
}

/// Opens and fully decodes an image file.
pub fn open_image<P: AsRef<Path>>(path: P) -> Result<DynamicImage> {
    let image = ImageReader::open(path)?.with_guessed_format()?.decode()?;
    ensure_pixels(image)
}

#[cfg(test)]
mod test {
    use super::*;
    use image::{GrayImage, Luma, Rgb, Rgba, RgbaImage};

    #[test]
    fn test_tensor_shape_and_scale() {
        let image = DynamicImage::ImageRgb8(RgbImage::from_pixel(10, 20, Rgb([255, 0, 51])));
        let tensor = ImagePreprocessor::new(4, 6).process(&image).unwrap();

        assert_eq!(tensor.shape(), &[1, 4, 6, 3]);
        for pixel in tensor.lanes(Axis(3)) {
            assert!((pixel[0] - 1.0).abs() < 1e-6);
            assert!(pixel[1].abs() < 1e-6);
            assert!((pixel[2] - 0.2).abs() < 1e-6);
        }
    }

    #[test]
    fn test_grayscale_is_expanded_to_rgb() {
        let image = DynamicImage::ImageLuma8(GrayImage::from_pixel(8, 8, Luma([102])));
        let tensor = ImagePreprocessor::new(8, 8).process(&image).unwrap();
        assert_eq!(tensor.shape(), &[1, 8, 8, 3]);
        assert!(tensor.iter().all(|&v| (v - 0.4).abs() < 1e-6));
    }

    #[test]
    fn test_alpha_channel_is_dropped() {
        let image = DynamicImage::ImageRgba8(RgbaImage::from_pixel(3, 3, Rgba([0, 255, 0, 10])));
        let tensor = ImagePreprocessor::new(3, 3).process(&image).unwrap();
        assert_eq!(tensor.shape(), &[1, 3, 3, 3]);
        assert_eq!(tensor[[0, 1, 1, 1]], 1.0);
        assert_eq!(tensor[[0, 1, 1, 0]], 0.0);
    }

    #[test]
    fn test_decode_rejects_garbage() {
        let err = decode_image(b"definitely not an image").unwrap_err();
        assert!(err.is_decode(), "{err}");
    }

    #[test]
    fn test_decode_png() {
        let mut bytes = Vec::new();
        DynamicImage::ImageRgb8(RgbImage::from_pixel(5, 7, Rgb([1, 2, 3])))
            .write_to(&mut std::io::Cursor::new(&mut bytes), image::ImageFormat::Png)
            .unwrap();
        let image = decode_image(&bytes).unwrap();
        assert_eq!((image.width(), image.height()), (5, 7));
    }
}
