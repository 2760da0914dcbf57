//! Input preparation shared by the frame networks.
//!
//! Pretrained weights only behave when fed exactly what they were trained
//! on: a 224x224 image, in the right channel order, with the weights' own
//! scale and offset applied.

use anyhow::{Result, anyhow};
use candle_core::{Device, Tensor};
use image::{ImageBuffer, Rgb};

use crate::decoder::DecodedFrame;

pub const IMAGE_SIZE: usize = 224;

const IMAGENET_MEAN: [f32; 3] = [0.485, 0.456, 0.406];
const IMAGENET_STD: [f32; 3] = [0.229, 0.224, 0.225];
// Keras "caffe" mode, BGR order on the 0-255 scale
const CAFFE_MEAN_BGR: [f32; 3] = [103.939, 116.779, 123.68];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Normalization {
    /// torchvision ImageNet weights: `(x/255 - mean) / std` per channel
    ImageNet,
    /// HF ViT processors: `(x/255 - 0.5) / 0.5`
    Symmetric,
    /// Keras ResNet50 `preprocess_input`: RGB->BGR, subtract channel means
    Caffe,
}

impl Normalization {
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_lowercase().as_str() {
            "imagenet" | "torch" => Some(Normalization::ImageNet),
            "symmetric" | "vit" => Some(Normalization::Symmetric),
            "caffe" | "keras" => Some(Normalization::Caffe),
            _ => None,
        }
    }

    /// Normalized value for channel `c` (0 = R, 1 = G, 2 = B) of an 8-bit sample.
    fn apply(&self, c: usize, value: u8) -> f32 {
        let v = value as f32;
        match self {
            Normalization::ImageNet => (v / 255.0 - IMAGENET_MEAN[c]) / IMAGENET_STD[c],
            Normalization::Symmetric => (v / 255.0 - 0.5) / 0.5,
            Normalization::Caffe => v - CAFFE_MEAN_BGR[2 - c],
        }
    }

    /// Output plane for channel `c`; caffe mode writes planes in BGR order.
    fn plane(&self, c: usize) -> usize {
        match self {
            Normalization::Caffe => 2 - c,
            _ => c,
        }
    }
}

/// Scale a frame to `size`x`size` RGB bytes.
pub fn scale(frame: &DecodedFrame, size: usize) -> Result<Vec<u8>> {
    let img: ImageBuffer<Rgb<u8>, _> =
        ImageBuffer::from_raw(frame.width, frame.height, frame.rgb.clone())
            .ok_or_else(|| anyhow!("Invalid frame dimensions {}x{}", frame.width, frame.height))?;

    if img.width() as usize == size && img.height() as usize == size {
        return Ok(img.into_raw());
    }

    let resized = image::imageops::resize(
        &img,
        size as u32,
        size as u32,
        image::imageops::FilterType::Triangle,
    );
    Ok(resized.into_raw())
}

/// Stack scaled RGB images into a `(batch, 3, size, size)` f32 tensor.
pub fn to_batch_tensor(
    scaled_images: &[Vec<u8>],
    size: usize,
    normalization: Normalization,
    device: &Device,
) -> Result<Tensor> {
    let plane = size * size;
    let batch_size = scaled_images.len();
    let mut data = vec![0f32; batch_size * 3 * plane];

    for (batch_idx, scaled_rgb) in scaled_images.iter().enumerate() {
        if scaled_rgb.len() != plane * 3 {
            return Err(anyhow!(
                "Image {} expected {}x{}x3 RGB, got {} bytes",
                batch_idx,
                size,
                size,
                scaled_rgb.len()
            ));
        }
        let offset = batch_idx * 3 * plane;
        for i in 0..plane {
            for c in 0..3 {
                let value = normalization.apply(c, scaled_rgb[i * 3 + c]);
                data[offset + normalization.plane(c) * plane + i] = value;
            }
        }
    }

    let tensor = Tensor::from_vec(data, (batch_size, 3, size, size), device)?;
    Ok(tensor)
}

pub fn frames_to_tensor(
    frames: &[DecodedFrame],
    size: usize,
    normalization: Normalization,
    device: &Device,
) -> Result<Tensor> {
    let scaled = frames
        .iter()
        .map(|frame| scale(frame, size))
        .collect::<Result<Vec<_>>>()?;
    to_batch_tensor(&scaled, size, normalization, device)
}
