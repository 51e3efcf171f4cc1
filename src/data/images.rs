use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use image::imageops::FilterType;
use image::Rgb32FImage;
use log::debug;
use tiff::decoder::{Decoder, DecodingResult};
use tiff::ColorType;

use crate::error::{Error, Result};

/// Per-channel normalisation constants of the ImageNet-pretrained backbones.
pub const CHANNEL_MEAN: [f64; 3] = [0.485, 0.456, 0.406];
pub const CHANNEL_STD: [f64; 3] = [0.229, 0.224, 0.225];

/// A channel-first (`C x H x W`) image tensor.
#[derive(Debug, Clone, PartialEq)]
pub struct ImageTensor {
    pub channels: usize,
    pub height: usize,
    pub width: usize,
    pub data: Vec<f64>,
}

impl ImageTensor {
    pub fn new(channels: usize, height: usize, width: usize, data: Vec<f64>) -> Result<ImageTensor> {
        if channels * height * width != data.len() {
            return Err(Error::Data(format!(
                "image of {}x{}x{} needs {} values, got {}",
                channels, height, width, channels * height * width, data.len()
            )));
        }
        Ok(ImageTensor { channels, height, width, data })
    }

    /// Converts an RGB buffer with values in `[0, 1]` to a `3 x H x W` tensor.
    pub fn from_rgb32f(img: &Rgb32FImage) -> ImageTensor {
        let (w, h) = img.dimensions();
        let (w, h) = (w as usize, h as usize);
        let mut data = vec![0.0; 3 * h * w];
        for (x, y, px) in img.enumerate_pixels() {
            for c in 0..3 {
                data[c * h * w + y as usize * w + x as usize] = px.0[c] as f64;
            }
        }
        ImageTensor { channels: 3, height: h, width: w, data }
    }

    pub fn channel(&self, c: usize) -> &[f64] {
        let plane = self.height * self.width;
        &self.data[c * plane..(c + 1) * plane]
    }

    /// Applies `(v - mean[c]) / std[c]` to every value of channel `c`.
    pub fn normalize(&mut self) {
        let plane = self.height * self.width;
        for (c, chunk) in self.data.chunks_mut(plane).enumerate().take(3) {
            for v in chunk.iter_mut() {
                *v = (*v - CHANNEL_MEAN[c]) / CHANNEL_STD[c];
            }
        }
    }
}

/// Loads every image in `path` as a normalised `3 x H x W` tensor.
///
/// `.tif`/`.tiff` files are read page by page (one sample per page); any
/// other format supported by `image` is read as a single sample. Grayscale
/// pages are replicated to three channels. When `resize` is set, each image
/// is resized to `resize x resize` before normalisation.
pub fn load_images(path: impl AsRef<Path>, resize: Option<u32>) -> Result<Vec<ImageTensor>> {
    let path = path.as_ref();
    if !path.is_file() {
        return Err(Error::data_at(path, "file not found"));
    }
    let ext = path.extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
        .unwrap_or_default();

    let pages = if ext == "tif" || ext == "tiff" {
        decode_tiff_pages(path)?
    } else {
        let img = image::open(path).map_err(|e| Error::data_at(path, e))?;
        vec![img.to_rgb32f()]
    };
    debug!("decoded {} image(s) from {}", pages.len(), path.display());

    Ok(pages
        .into_iter()
        .map(|page| {
            let page = match resize {
                Some(side) => image::imageops::resize(&page, side, side, FilterType::Triangle),
                None => page,
            };
            let mut tensor = ImageTensor::from_rgb32f(&page);
            tensor.normalize();
            tensor
        })
        .collect())
}

fn decode_tiff_pages(path: &Path) -> Result<Vec<Rgb32FImage>> {
    let file = File::open(path).map_err(|e| Error::data_at(path, e))?;
    let mut decoder = Decoder::new(BufReader::new(file)).map_err(|e| Error::data_at(path, e))?;
    let mut pages = Vec::new();

    loop {
        let (width, height) = decoder.dimensions().map_err(|e| Error::data_at(path, e))?;
        let samples = match decoder.colortype().map_err(|e| Error::data_at(path, e))? {
            ColorType::Gray(_) => 1,
            ColorType::GrayA(_) => 2,
            ColorType::RGB(_) => 3,
            ColorType::RGBA(_) => 4,
            other => {
                return Err(Error::data_at(path, format!("unsupported TIFF color type {:?}", other)))
            }
        };
        let pixels: Vec<f32> = match decoder.read_image().map_err(|e| Error::data_at(path, e))? {
            DecodingResult::U8(buf) => buf.into_iter().map(|v| v as f32 / 255.0).collect(),
            DecodingResult::U16(buf) => buf.into_iter().map(|v| v as f32 / 65535.0).collect(),
            DecodingResult::F32(buf) => buf,
            DecodingResult::F64(buf) => buf.into_iter().map(|v| v as f32).collect(),
            _ => return Err(Error::data_at(path, "unsupported TIFF sample format")),
        };
        pages.push(
            to_rgb(width, height, samples, &pixels)
                .ok_or_else(|| Error::data_at(path, format!("truncated TIFF page {}", pages.len())))?,
        );

        if !decoder.more_images() {
            break;
        }
        decoder.next_image().map_err(|e| Error::data_at(path, e))?;
    }
    Ok(pages)
}

/// Interleaved samples → RGB, dropping alpha and replicating gray.
fn to_rgb(width: u32, height: u32, samples: usize, pixels: &[f32]) -> Option<Rgb32FImage> {
    let n = width as usize * height as usize;
    if pixels.len() < n * samples {
        return None;
    }
    let mut rgb = Vec::with_capacity(n * 3);
    for px in pixels.chunks(samples).take(n) {
        if samples < 3 {
            rgb.extend_from_slice(&[px[0], px[0], px[0]]);
        } else {
            rgb.extend_from_slice(&px[..3]);
        }
    }
    Rgb32FImage::from_raw(width, height, rgb)
}
