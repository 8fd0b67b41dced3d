//! Conversion between image files and the `(3, H, W)` tensors the generator
//! consumes.
//!
//! Images are resized so the short side is [`SHORT_SIDE`] pixels, the long side
//! being `floor(SHORT_SIDE * long / short)`, with [`RESIZE_FILTER`] (bilinear).
//! Pixel values map to `[-1, 1]` via `(x / 255 - 0.5) / 0.5` on the way in and
//! back through `(x + 1) / 2 * 255`, clamped and rounded, on the way out.

use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use candle_core::{DType, Device, Tensor};
use image::{imageops::FilterType, DynamicImage, ImageFormat, ImageReader, RgbImage};

use crate::{Result, StyleError};

pub const SHORT_SIDE: u32 = 256;
pub const RESIZE_FILTER: FilterType = FilterType::Triangle;

pub fn decode_image(path: &Path) -> Result<DynamicImage> {
    let reader = ImageReader::open(path)
        .map_err(|e| StyleError::io(path, e))?
        .with_guessed_format()
        .map_err(|e| StyleError::io(path, e))?;
    reader
        .decode()
        .map_err(|e| StyleError::unsupported_format(path, e))
}

/// Target `(width, height)` with the short side scaled to `short_side`.
pub fn resized_dimensions(width: u32, height: u32, short_side: u32) -> (u32, u32) {
    let scale_long = |long: u32, short: u32| (short_side as u64 * long as u64 / short as u64) as u32;
    if width <= height {
        (short_side, scale_long(height, width))
    } else {
        (scale_long(width, height), short_side)
    }
}

/// Drops alpha/palette information and resizes to the working resolution.
pub fn prepare_image(img: &DynamicImage) -> RgbImage {
    let rgb = img.to_rgb8();
    let (width, height) = resized_dimensions(rgb.width(), rgb.height(), SHORT_SIDE);
    if (width, height) == rgb.dimensions() {
        rgb
    } else {
        image::imageops::resize(&rgb, width, height, RESIZE_FILTER)
    }
}

/// `(H, W, 3)` u8 pixels to a normalized `(3, H, W)` f32 tensor.
pub fn image_to_tensor(img: &RgbImage, device: &Device) -> Result<Tensor> {
    let (width, height) = img.dimensions();
    let data = img.as_raw().clone();
    let tensor = Tensor::from_vec(data, (height as usize, width as usize, 3), &Device::Cpu)?
        .permute((2, 0, 1))?
        .to_dtype(DType::F32)?;
    let tensor = ((tensor / 255.)? - 0.5)? / 0.5;
    Ok(tensor?.to_device(device)?)
}

/// Decode, convert to RGB, resize, and normalize in one step.
pub fn load_image_tensor(path: &Path, device: &Device) -> Result<Tensor> {
    let img = decode_image(path)?;
    if img.width() == 0 || img.height() == 0 {
        return Err(StyleError::unsupported_format(path, "image has no pixels"));
    }
    image_to_tensor(&prepare_image(&img), device)
}

/// Inverse of [`image_to_tensor`] for a `(3, H, W)` tensor in `[-1, 1]`.
pub fn tensor_to_image(img: &Tensor) -> Result<RgbImage> {
    let (channels, height, width) = img.dims3()?;
    if channels != 3 {
        return Err(StyleError::ShapeMismatch {
            name: "output image".to_string(),
            expected: vec![3, height, width],
            actual: img.dims().to_vec(),
        });
    }
    let img = ((img.to_dtype(DType::F32)?.clamp(-1f32, 1f32)? + 1.0)? * 127.5)?
        .round()?
        .to_dtype(DType::U8)?
        .to_device(&Device::Cpu)?;
    let pixels = img.permute((1, 2, 0))?.flatten_all()?.to_vec1::<u8>()?;
    RgbImage::from_raw(width as u32, height as u32, pixels)
        .ok_or_else(|| candle_core::Error::msg("error converting tensor to image buffer").into())
}

/// Encodes `img` in the format named by `path`'s extension.
///
/// The bytes go to a hidden sibling first and are renamed into place, so
/// `path` either holds a complete image or does not exist.
pub fn save_image_atomic(img: &RgbImage, path: &Path) -> Result<()> {
    let format =
        ImageFormat::from_path(path).map_err(|e| StyleError::unsupported_format(path, e))?;
    let partial = partial_path(path);

    let written = write_encoded(img, &partial, format).and_then(|()| {
        fs::rename(&partial, path).map_err(|e| StyleError::io(path, e))
    });
    if written.is_err() {
        let _ = fs::remove_file(&partial);
    }
    written
}

fn write_encoded(img: &RgbImage, path: &Path, format: ImageFormat) -> Result<()> {
    let file = File::create(path).map_err(|e| StyleError::io(path, e))?;
    let mut writer = BufWriter::new(file);
    img.write_to(&mut writer, format).map_err(|e| match e {
        image::ImageError::IoError(e) => StyleError::io(path, e),
        other => StyleError::unsupported_format(path, other),
    })?;
    writer.flush().map_err(|e| StyleError::io(path, e))
}

fn partial_path(path: &Path) -> PathBuf {
    let name = path
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default();
    path.with_file_name(format!(".{name}.partial"))
}
