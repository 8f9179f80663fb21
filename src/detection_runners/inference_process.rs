use crate::detection_runners::X;

/// Batched inference boundary.
///
/// `infer` receives an `[N, 3, H, W]` tensor and must return exactly `N` raw buffers, one per
/// slot and in slot order, each in the `[count, records...]` layout read by
/// [`RawDetections`](crate::detection_runners::RawDetections).
pub trait InferenceBackend: Send {
    fn name(&self) -> &str;

    /// Model input `(width, height)` when the backend knows it.
    fn input_size(&self) -> Option<(u32, u32)> {
        None
    }

    fn infer(&mut self, xs: &X) -> anyhow::Result<Vec<Vec<f32>>>;
}

