//! File adapted from: https://github.com/jamjamjon
//!
//! Functions to preprocess frames for the model and to scale annotated frames for output.

use anyhow::{bail, Context, Result};
use fast_image_resize::{
    images::{CroppedImageMut, Image as FirImage},
    pixels::PixelType,
    FilterType, ResizeAlg, ResizeOptions, Resizer,
};
use image::RgbImage;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use crate::detection_runners::X;

/// Channel order of the planar tensor handed to the model.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChannelOrder {
    #[default]
    Rgb,
    Bgr,
}

/// Forward letterbox transform of one frame. Kept per slot so boxes can be mapped back.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct LetterboxInfo {
    pub width_src: u32,
    pub height_src: u32,
    pub width_dst: u32,
    pub height_dst: u32,
    pub width_resized: u32,
    pub height_resized: u32,
    pub scale: f32,
    pub pad_x: f32,
    pub pad_y: f32,
}

impl LetterboxInfo {
    /// Proportional fit of `src` into `dst`, centred.
    pub fn compute(width_src: u32, height_src: u32, width_dst: u32, height_dst: u32) -> Self {
        let scale = (width_dst as f32 / width_src as f32).min(height_dst as f32 / height_src as f32);
        let width_resized = ((width_src as f32 * scale).round() as u32).clamp(1, width_dst);
        let height_resized = ((height_src as f32 * scale).round() as u32).clamp(1, height_dst);

        Self {
            width_src,
            height_src,
            width_dst,
            height_dst,
            width_resized,
            height_resized,
            scale,
            pad_x: ((width_dst - width_resized) / 2) as f32,
            pad_y: ((height_dst - height_resized) / 2) as f32,
        }
    }

    pub fn to_model_space(&self, x: f32, y: f32) -> (f32, f32) {
        (x * self.scale + self.pad_x, y * self.scale + self.pad_y)
    }

    pub fn to_frame_space(&self, x: f32, y: f32) -> (f32, f32) {
        ((x - self.pad_x) / self.scale, (y - self.pad_y) / self.scale)
    }
}

pub fn to_fir_image<'a>(image: &RgbImage) -> Result<FirImage<'a>> {
    let (width, height) = image.dimensions();
    FirImage::from_vec_u8(width, height, image.as_raw().clone(), PixelType::U8x3)
        .with_context(|| format!("Failed to wrap {}x{} frame for resizing", width, height))
}

/// Resizes `img` into the centre of a `target_w x target_h` canvas filled with `bg`.
pub fn letterbox(
    img: &RgbImage,
    target_w: u32,
    target_h: u32,
    bg: u8,
    resizer: &mut Resizer,
) -> Result<(FirImage<'static>, LetterboxInfo)> {
    let (w0, h0) = img.dimensions();
    if w0 == 0 || h0 == 0 {
        bail!("Cannot letterbox an empty {}x{} frame", w0, h0);
    }
    let info = LetterboxInfo::compute(w0, h0, target_w, target_h);
    let src = to_fir_image(img)?;

    let mut padded = FirImage::from_vec_u8(
        target_w,
        target_h,
        vec![bg; target_w as usize * target_h as usize * 3],
        PixelType::U8x3,
    )?;

    let options = ResizeOptions::new().resize_alg(ResizeAlg::Convolution(FilterType::Bilinear));
    let mut cropped = CroppedImageMut::new(
        &mut padded,
        info.pad_x as u32,
        info.pad_y as u32,
        info.width_resized,
        info.height_resized,
    )?;
    resizer.resize(&src, &mut cropped, &options)?;

    Ok((padded, info))
}

/// Plain resize used for the per-source output cells.
pub fn resize_rgb(img: &RgbImage, target_w: u32, target_h: u32) -> Result<RgbImage> {
    if img.dimensions() == (target_w, target_h) {
        return Ok(img.clone());
    }
    let src = to_fir_image(img)?;
    let mut dst = FirImage::new(target_w, target_h, PixelType::U8x3);
    let options = ResizeOptions::new().resize_alg(ResizeAlg::Convolution(FilterType::Box));
    Resizer::new().resize(&src, &mut dst, &options)?;

    RgbImage::from_raw(target_w, target_h, dst.into_vec())
        .context("Resized buffer does not match the requested size")
}

/// HWC u8 to planar CHW f32 in `[0, 1]`.
pub fn nchw_normalize_flat(img: &FirImage, order: ChannelOrder) -> Result<Vec<f32>> {
    let buf = img.buffer();
    let w = img.width() as usize;
    let h = img.height() as usize;

    if buf.len() != w * h * 3 {
        bail!("Unexpected buffer size: got {}, expected {}", buf.len(), w * h * 3);
    }

    let mut out = vec![0.0f32; buf.len()];
    let hw = w * h;
    let (first, last) = match order {
        ChannelOrder::Rgb => (0, 2),
        ChannelOrder::Bgr => (2, 0),
    };

    for i in 0..hw {
        out[i] = buf[3 * i + first] as f32 / 255.0;
        out[i + hw] = buf[3 * i + 1] as f32 / 255.0;
        out[i + 2 * hw] = buf[3 * i + last] as f32 / 255.0;
    }

    Ok(out)
}

/// Builds the `[slots.len(), 3, H, W]` batch. `None` slots stay zero and get no transform.
///
/// A frame that cannot be letterboxed is logged and left as a zero slot with no transform, so the
/// caller can retire that source without failing the whole batch.
pub fn preprocess_batch(
    slots: &[Option<&RgbImage>],
    target_w: u32,
    target_h: u32,
    bg: u8,
    order: ChannelOrder,
) -> Result<(X, Vec<Option<LetterboxInfo>>)> {
    let image_size = 3 * target_h as usize * target_w as usize;

    let planes: Vec<(Vec<f32>, Option<LetterboxInfo>)> = slots
        .par_iter()
        .map(|slot| match slot {
            Some(img) => {
                let mut resizer = Resizer::new();
                let plane = letterbox(img, target_w, target_h, bg, &mut resizer)
                    .and_then(|(padded, info)| Ok((nchw_normalize_flat(&padded, order)?, info)));
                match plane {
                    Ok((plane, info)) => (plane, Some(info)),
                    Err(err) => {
                        log::warn!("Skipping frame in preprocessing: {:#}", err);
                        (vec![0.0f32; image_size], None)
                    }
                }
            }
            None => (vec![0.0f32; image_size], None),
        })
        .collect();

    let mut batch_flat: Vec<f32> = Vec::with_capacity(slots.len() * image_size);
    let mut infos = Vec::with_capacity(slots.len());
    for (plane, info) in planes {
        batch_flat.extend_from_slice(&plane);
        infos.push(info);
    }

    let xs = X::from_shape_vec(&[slots.len(), 3, target_h as usize, target_w as usize], batch_flat)?;
    Ok((xs, infos))
}
