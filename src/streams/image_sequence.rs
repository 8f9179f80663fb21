use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use anyhow::{bail, Context, Result};
use image::RgbImage;
use crate::common::SourceDescriptor;
use crate::streams::{CaptureOpener, CaptureSource};

const IMAGE_EXTENSIONS: [&str; 6] = ["jpg", "jpeg", "png", "bmp", "webp", "tiff"];

/// Plays a directory of still images (lexical order) or a single image as a finite stream.
#[derive(Debug)]
pub struct ImageSequenceCapture {
    paths: VecDeque<PathBuf>,
}

impl ImageSequenceCapture {
    pub fn open(path: &Path) -> Result<Self> {
        let paths: VecDeque<PathBuf> = if path.is_dir() {
            let mut found: Vec<PathBuf> = std::fs::read_dir(path)
                .with_context(|| format!("Failed to list {}", path.display()))?
                .filter_map(|entry| entry.ok().map(|e| e.path()))
                .filter(|p| p.is_file() && is_image(p))
                .collect();
            found.sort();
            found.into()
        } else if path.is_file() {
            VecDeque::from(vec![path.to_path_buf()])
        } else {
            bail!("No such image file or directory: {}", path.display());
        };

        if paths.is_empty() {
            bail!("No images found in {}", path.display());
        }
        Ok(Self { paths })
    }
}

fn is_image(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| IMAGE_EXTENSIONS.contains(&e.to_ascii_lowercase().as_str()))
        .unwrap_or(false)
}

impl CaptureSource for ImageSequenceCapture {
    fn pull_frame(&mut self) -> Result<Option<RgbImage>> {
        let Some(path) = self.paths.pop_front() else {
            return Ok(None);
        };
        let img = image::open(&path).with_context(|| format!("Failed to decode {}", path.display()))?;
        Ok(Some(img.to_rgb8()))
    }

    fn release(&mut self) {
        self.paths.clear();
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct ImageSequenceOpener;

impl CaptureOpener for ImageSequenceOpener {
    fn open(&self, source: &SourceDescriptor) -> Result<Box<dyn CaptureSource>> {
        if source.is_live() {
            bail!("{} is a live stream, which needs a video decoder behind CaptureOpener", source.uri);
        }
        Ok(Box::new(ImageSequenceCapture::open(Path::new(&source.uri))?))
    }
}
