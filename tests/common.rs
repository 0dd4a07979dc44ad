use image::{DynamicImage, ImageBuffer, Rgb};
use mushguard::{
    classifier::{Classifier, OutputHead},
    config::InputSize,
    error::{MushguardError, Result},
};
use ndarray::{Array, Ix4};
use std::{
    fs,
    path::Path,
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc, Mutex, Once,
    },
};

#[allow(dead_code)]
static SETUP: Once = Once::new();

#[allow(dead_code)]
fn generate_test_image(path: &Path) {
    let img_width = 100;
    let img_height = 100;
    let mut img = ImageBuffer::new(img_width, img_height);
    for (x, y, pixel) in img.enumerate_pixels_mut() {
        *pixel = Rgb([(x * 2) as u8, (y * 2) as u8, 96u8]);
    }
    img.save(path).unwrap();
}

#[allow(dead_code)]
pub fn setup() {
    SETUP.call_once(|| {
        let assets_dir = Path::new("tests/assets");
        if !assets_dir.exists() {
            fs::create_dir_all(assets_dir).unwrap();
        }

        let image_path = assets_dir.join("test_image.jpg");
        if !image_path.exists() {
            generate_test_image(&image_path);
        }

        let corrupt_path = assets_dir.join("corrupt.jpg");
        if !corrupt_path.exists() {
            // A JPEG start-of-image marker followed by garbage.
            fs::write(&corrupt_path, [0xFF, 0xD8, 0xFF, 0x00, 0x13, 0x37, 0x00, 0x42]).unwrap();
        }
    });
}

#[allow(dead_code)]
pub fn test_image() -> DynamicImage {
    DynamicImage::ImageRgb8(ImageBuffer::from_fn(64, 48, |x, y| {
        Rgb([(x * 4) as u8, (y * 5) as u8, 128u8])
    }))
}

/// A classifier that returns a fixed output and records every call.
#[allow(dead_code)]
pub struct FakeClassifier {
    size: InputSize,
    output: Vec<f32>,
    calls: AtomicUsize,
    shapes: Mutex<Vec<Vec<usize>>>,
}

#[allow(dead_code)]
impl FakeClassifier {
    pub fn new(height: u32, width: u32, output: Vec<f32>) -> Arc<Self> {
        Arc::new(Self {
            size: InputSize::new(height, width),
            output,
            calls: AtomicUsize::new(0),
            shapes: Mutex::new(Vec::new()),
        })
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn shapes(&self) -> Vec<Vec<usize>> {
        self.shapes.lock().unwrap().clone()
    }
}

impl Classifier for FakeClassifier {
    fn input_size(&self) -> InputSize {
        self.size
    }

    fn head(&self) -> OutputHead {
        OutputHead::from_num_classes(self.output.len())
    }

    fn predict(&self, input: Array<f32, Ix4>) -> Result<Vec<f32>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.shapes.lock().unwrap().push(input.shape().to_vec());
        Ok(self.output.clone())
    }
}

/// A classifier whose runtime always faults.
#[allow(dead_code)]
pub struct FailingClassifier {
    pub num_classes: usize,
}

impl Classifier for FailingClassifier {
    fn input_size(&self) -> InputSize {
        InputSize::new(16, 16)
    }

    fn head(&self) -> OutputHead {
        OutputHead::from_num_classes(self.num_classes)
    }

    fn predict(&self, _input: Array<f32, Ix4>) -> Result<Vec<f32>> {
        Err(MushguardError::Ort("session run failed".to_string()))
    }
}

/// A classifier that declares one output but returns none.
#[allow(dead_code)]
pub struct EmptyOutputClassifier;

impl Classifier for EmptyOutputClassifier {
    fn input_size(&self) -> InputSize {
        InputSize::new(16, 16)
    }

    fn head(&self) -> OutputHead {
        OutputHead::SingleClass
    }

    fn predict(&self, _input: Array<f32, Ix4>) -> Result<Vec<f32>> {
        Ok(Vec::new())
    }
}
