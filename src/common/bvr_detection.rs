use serde::{Deserialize, Serialize};
use crate::common::BvrBox;

/// One finalized detection for one source frame.
#[derive(Default, Debug, Clone, PartialEq, PartialOrd, Serialize, Deserialize)]
pub struct BvrDetection {
    pub class_id: usize,
    pub confidence: f32,
    pub bbox: BvrBox,
    pub label: Option<String>,
    pub source_id: usize,
}

impl BvrDetection {
    pub fn new(class_id: usize, bbox: BvrBox, label: Option<String>, confidence: f32) -> Self {
        Self {
            class_id,
            confidence,
            bbox,
            label,
            source_id: 0,
        }
    }

    /// Sets the bounding box from centre and size.
    ///
    /// # Arguments
    ///
    /// * `cx` - The x-coordinate of the horizontal center.
    /// * `cy` - The y-coordinate of the vertical center.
    /// * `w` - The width of the bounding box.
    /// * `h` - The height of the bounding box.
    pub fn with_cxcy_wh(mut self, cx: f32, cy: f32, w: f32, h: f32) -> Self {
        self.bbox = BvrBox::default().with_cxcy_wh(cx, cy, w, h);
        self
    }

    pub fn with_bbox(mut self, bbox: BvrBox) -> Self {
        self.bbox = bbox;
        self
    }

    pub fn with_confidence(mut self, conf: f32) -> Self {
        self.confidence = conf;
        self
    }

    pub fn with_class_id(mut self, class_id: usize) -> Self {
        self.class_id = class_id;
        self
    }

    pub fn with_label(mut self, label: &str) -> Self {
        self.label = Some(label.to_string());
        self
    }

    pub fn with_source_id(mut self, source_id: usize) -> Self {
        self.source_id = source_id;
        self
    }

    pub fn get_label(&self) -> String {
        self.label.clone().unwrap_or_else(|| format!("# {}", self.class_id))
    }

    /// Computes the intersection area between this detection and another.
    pub fn intersect(&self, other: &BvrDetection) -> f32 {
        self.bbox.intersect(&other.bbox)
    }

    /// Computes the union area between this detection and another.
    pub fn union(&self, other: &BvrDetection) -> f32 {
        self.bbox.union(&other.bbox)
    }
}
