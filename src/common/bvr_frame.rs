use image::RgbImage;

/// A captured frame moving through the pipeline.
///
/// Ownership moves with the frame: capture worker, mailbox, collector, post-processor and
/// finally the output router. Nothing else keeps a reference to the pixels.
#[derive(Debug, Clone, Default)]
pub struct BvrFrame {
    pub image: RgbImage,
    pub source_id: usize,
    pub frame_index: u64,
}

impl std::ops::Deref for BvrFrame {
    type Target = RgbImage;

    fn deref(&self) -> &Self::Target {
        &self.image
    }
}

impl BvrFrame {
    pub fn new(image: RgbImage, source_id: usize, frame_index: u64) -> Self {
        Self {
            image,
            source_id,
            frame_index,
        }
    }

    pub fn width(&self) -> u32 {
        self.image.width()
    }

    pub fn height(&self) -> u32 {
        self.image.height()
    }

    /// A 0-sized frame, which capture treats as the end of its stream.
    pub fn is_empty(&self) -> bool {
        self.image.width() == 0 || self.image.height() == 0
    }
}
