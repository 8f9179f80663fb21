use std::path::Path;
use serde::{Deserialize, Serialize};
use crate::streams::DeliveryMode;

/// Where a source's frames come from and how its mailbox hands them over.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceDescriptor {
    pub uri: String,
    pub mode: DeliveryMode,
}

impl SourceDescriptor {
    pub fn new(uri: &str, mode: DeliveryMode) -> Self {
        Self {
            uri: uri.to_string(),
            mode,
        }
    }

    /// Picks the delivery mode from the URI: live streams overwrite, everything else blocks.
    pub fn from_uri(uri: &str) -> Self {
        Self::new(uri, DeliveryMode::for_uri(uri))
    }

    pub fn is_live(&self) -> bool {
        DeliveryMode::is_live_uri(&self.uri)
    }

    /// Name used for this source's output: the file stem for files and directories,
    /// `stream-<index>` for live streams.
    pub fn output_stem(&self, index: usize) -> String {
        if self.is_live() {
            return format!("stream-{}", index);
        }
        Path::new(self.uri.trim_end_matches(['/', '\\']))
            .file_stem()
            .and_then(|s| s.to_str())
            .filter(|s| !s.is_empty())
            .map(|s| s.to_string())
            .unwrap_or_else(|| format!("source-{}", index))
    }
}
