use std::path::Path;

use image::{imageops::FilterType, io::Reader as ImageReader, DynamicImage};

pub const IMAGE_SIZE: u32 = 224;
pub const CHANNELS: usize = 3;

#[derive(Debug, thiserror::Error)]
pub enum PreprocessError {
    #[error("image file not found: {0}")]
    Missing(String),

    #[error("unsupported or corrupt image: {0}")]
    Decode(String),
}

/// Single-image batch in NHWC layout, `f32` channel values in `[0, 255]`.
#[derive(Debug, Clone, PartialEq)]
pub struct ImageTensor {
    data: Vec<f32>,
}

impl ImageTensor {
    pub const SHAPE: [u64; 4] = [1, IMAGE_SIZE as u64, IMAGE_SIZE as u64, CHANNELS as u64];

    pub fn zeros() -> Self {
        Self {
            data: vec![0.0; Self::element_count()],
        }
    }

    pub fn element_count() -> usize {
        (IMAGE_SIZE * IMAGE_SIZE) as usize * CHANNELS
    }

    pub fn as_slice(&self) -> &[f32] {
        &self.data
    }
}

pub fn load_tensor(path: &Path) -> Result<ImageTensor, PreprocessError> {
    let reader = ImageReader::open(path).map_err(|e| match e.kind() {
        std::io::ErrorKind::NotFound => PreprocessError::Missing(path.display().to_string()),
        _ => PreprocessError::Decode(e.to_string()),
    })?;

    // Sniff the format from the bytes; the extension comes from the client.
    let image = reader
        .with_guessed_format()
        .map_err(|e| PreprocessError::Decode(e.to_string()))?
        .decode()
        .map_err(|e| PreprocessError::Decode(e.to_string()))?;

    Ok(tensor_from_image(&image))
}

pub fn tensor_from_image(image: &DynamicImage) -> ImageTensor {
    let rgb = DynamicImage::ImageRgb8(image.to_rgb8());
    let resized = rgb
        .resize_exact(IMAGE_SIZE, IMAGE_SIZE, FilterType::CatmullRom)
        .to_rgb8();

    let mut data = Vec::with_capacity(ImageTensor::element_count());
    for pixel in resized.pixels() {
        data.push(pixel[0] as f32);
        data.push(pixel[1] as f32);
        data.push(pixel[2] as f32);
    }

    ImageTensor { data }
}
