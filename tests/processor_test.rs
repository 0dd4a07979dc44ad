use mushguard::processor::{decode_image, open_image, ImagePreprocessor, ImageProcessor};

mod common;
use common::setup;

#[test]
fn test_process_image() {
    setup();
    let image = open_image("tests/assets/test_image.jpg").unwrap();
    let processor = ImagePreprocessor::new(224, 224);
    let tensor = processor.process(&image).unwrap();

    // Check the shape of the output tensor
    assert_eq!(tensor.shape(), &[1, 224, 224, 3]);

    // Values are scaled into [0, 1] and the image is not blank
    assert!(tensor.iter().all(|&x| (0.0..=1.0).contains(&x)));
    assert!(tensor.iter().any(|&x| x != 0.0));
}

#[test]
fn test_process_non_square_model() {
    setup();
    let image = open_image("tests/assets/test_image.jpg").unwrap();
    let tensor = ImagePreprocessor::new(120, 200).process(&image).unwrap();

    assert_eq!(tensor.shape(), &[1, 120, 200, 3]);

    // The generated image has a constant blue channel of 96.
    let blue = tensor[[0, 60, 100, 2]];
    assert!((blue - 96.0 / 255.0).abs() < 0.05, "blue = {blue}");
}

#[test]
fn test_decode_matches_open() {
    setup();
    let bytes = std::fs::read("tests/assets/test_image.jpg").unwrap();
    let decoded = decode_image(&bytes).unwrap();
    let opened = open_image("tests/assets/test_image.jpg").unwrap();

    assert_eq!(decoded.width(), 100);
    assert_eq!(decoded.height(), 100);
    assert_eq!(decoded.to_rgb8(), opened.to_rgb8());
}

#[test]
fn test_open_corrupt_image() {
    setup();
    let err = open_image("tests/assets/corrupt.jpg").unwrap_err();
    assert!(err.is_decode(), "{err}");
}

#[test]
fn test_open_missing_image() {
    let err = open_image("tests/assets/does_not_exist.jpg").unwrap_err();
    assert!(!err.is_decode());
}
