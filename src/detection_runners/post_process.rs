use std::collections::BTreeMap;
use crate::common::{BvrBox, BvrDetection};
use crate::data::PipelineConfig;
use crate::detection_runners::{non_max_suppression, LetterboxInfo, RawDetections, DEFAULT_MAX_RECORDS};

/// Turns one slot's raw buffer into final detections in frame coordinates.
///
/// Steps: decode, confidence filter, optional per-class grouping, NMS, letterbox inverse.
#[derive(Debug, Clone)]
pub struct PostProcessor {
    conf_threshold: f32,
    iou_threshold: f32,
    group_by_class: bool,
    max_records: usize,
    names: Option<Vec<String>>,
}

impl Default for PostProcessor {
    fn default() -> Self {
        Self::new(0.5, 0.4)
    }
}

impl PostProcessor {
    pub fn new(conf_threshold: f32, iou_threshold: f32) -> Self {
        Self {
            conf_threshold,
            iou_threshold,
            group_by_class: true,
            max_records: DEFAULT_MAX_RECORDS,
            names: None,
        }
    }

    pub fn from_config(config: &PipelineConfig) -> Self {
        Self {
            conf_threshold: config.conf_threshold,
            iou_threshold: config.iou_threshold,
            group_by_class: config.group_by_class,
            max_records: config.max_records,
            names: config.class_names.clone(),
        }
    }

    pub fn with_group_by_class(mut self, x: bool) -> Self {
        self.group_by_class = x;
        self
    }

    pub fn with_max_records(mut self, n: usize) -> Self {
        self.max_records = n;
        self
    }

    pub fn with_names(mut self, names: Vec<String>) -> Self {
        self.names = Some(names);
        self
    }

    pub fn process(&self, raw: &[f32], info: &LetterboxInfo, source_id: usize) -> Vec<BvrDetection> {
        let mut detections = self.suppress(self.candidates(raw, source_id));
        self.remap(&mut detections, info);
        detections
    }

    /// Decoded records at or above the confidence threshold, in decode order, model space.
    pub fn candidates(&self, raw: &[f32], source_id: usize) -> Vec<BvrDetection> {
        RawDetections::parse(raw, self.max_records)
            .filter(|r| r.confidence >= self.conf_threshold)
            .map(|r| BvrDetection {
                class_id: r.class_id,
                confidence: r.confidence,
                bbox: BvrBox::default().with_cxcy_wh(r.center_x, r.center_y, r.width, r.height),
                label: Some(self.label_for(r.class_id)),
                source_id,
            })
            .collect()
    }

    /// NMS per class (ascending id) or over everything, depending on `group_by_class`.
    pub fn suppress(&self, candidates: Vec<BvrDetection>) -> Vec<BvrDetection> {
        if !self.group_by_class {
            let mut all = candidates;
            non_max_suppression(&mut all, self.iou_threshold);
            return all;
        }

        let mut groups: BTreeMap<usize, Vec<BvrDetection>> = BTreeMap::new();
        for det in candidates {
            groups.entry(det.class_id).or_default().push(det);
        }

        let mut kept = Vec::new();
        for (_, mut group) in groups {
            non_max_suppression(&mut group, self.iou_threshold);
            kept.extend(group);
        }
        kept
    }

    /// Model space to frame space, clipped to the frame.
    pub fn remap(&self, detections: &mut [BvrDetection], info: &LetterboxInfo) {
        let max_x = info.width_src as f32;
        let max_y = info.height_src as f32;
        for det in detections.iter_mut() {
            let (x1, y1) = info.to_frame_space(det.bbox.x1, det.bbox.y1);
            let (x2, y2) = info.to_frame_space(det.bbox.x2, det.bbox.y2);
            det.bbox = BvrBox::new(x1, y1, x2, y2).clip(max_x, max_y);
        }
    }

    fn label_for(&self, class_id: usize) -> String {
        self.names
            .as_ref()
            .and_then(|names| names.get(class_id))
            .cloned()
            .unwrap_or_else(|| format!("# {}", class_id))
    }
}
