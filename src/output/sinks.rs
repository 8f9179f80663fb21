use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::thread::{self, JoinHandle};
use anyhow::{bail, Context, Result};
use crossbeam_channel::{bounded, Sender, TrySendError};
use image::RgbImage;
use crate::common::SourceDescriptor;
use crate::data::{create_directory, FsAccess};

/// Per-source persistence of annotated frames (a video writer, an image directory, ...).
pub trait PersistenceSink: Send {
    fn write(&mut self, source_id: usize, frame: &RgbImage) -> Result<()>;

    /// Called once per source after its last frame.
    fn close(&mut self, source_id: usize) -> Result<()>;
}

/// Receives the composited grid once per tick. `Ok(false)` asks the pipeline to stop.
pub trait DisplaySink: Send {
    fn show(&mut self, canvas: &RgbImage) -> Result<bool>;
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SinkStats {
    pub written: u64,
    pub failed: u64,
    pub dropped: u64,
}

enum SinkMessage {
    Write(usize, RgbImage),
    Close(usize),
}

/// Runs a [`PersistenceSink`] on its own thread behind a bounded queue.
///
/// When the queue is full the newest frame is dropped and counted, the caller never waits on disk.
pub struct ThreadedSink {
    tx: Option<Sender<SinkMessage>>,
    writer: Option<JoinHandle<SinkStats>>,
    dropped: Arc<AtomicU64>,
}

impl ThreadedSink {
    pub fn spawn(mut sink: Box<dyn PersistenceSink>, depth: usize) -> Result<Self> {
        let (tx, rx) = bounded::<SinkMessage>(depth.max(1));
        let writer = thread::Builder::new()
            .name("bvr-sink".to_string())
            .spawn(move || {
                let mut stats = SinkStats::default();
                for msg in rx {
                    match msg {
                        SinkMessage::Write(source_id, frame) => match sink.write(source_id, &frame) {
                            Ok(()) => stats.written += 1,
                            Err(err) => {
                                log::warn!("Source {}: failed to persist frame: {:#}", source_id, err);
                                stats.failed += 1;
                            }
                        },
                        SinkMessage::Close(source_id) => {
                            if let Err(err) = sink.close(source_id) {
                                log::warn!("Source {}: failed to close output: {:#}", source_id, err);
                            }
                        }
                    }
                }
                stats
            })
            .context("Failed to spawn sink writer thread")?;

        Ok(Self {
            tx: Some(tx),
            writer: Some(writer),
            dropped: Arc::new(AtomicU64::new(0)),
        })
    }

    /// Queues a frame, returns `false` if it was dropped.
    pub fn submit(&self, source_id: usize, frame: RgbImage) -> bool {
        let Some(tx) = &self.tx else {
            return false;
        };
        match tx.try_send(SinkMessage::Write(source_id, frame)) {
            Ok(()) => true,
            Err(TrySendError::Full(_)) => {
                let n = self.dropped.fetch_add(1, Ordering::Relaxed) + 1;
                log::debug!("Sink queue full, dropped frame from source {} ({} dropped so far)", source_id, n);
                false
            }
            Err(TrySendError::Disconnected(_)) => {
                log::warn!("Sink writer is gone, dropping frame from source {}", source_id);
                false
            }
        }
    }

    /// Queues a close. Waits for room, a close is never dropped.
    pub fn close_source(&self, source_id: usize) {
        if let Some(tx) = &self.tx {
            if tx.send(SinkMessage::Close(source_id)).is_err() {
                log::warn!("Sink writer is gone, could not close source {}", source_id);
            }
        }
    }

    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }

    /// Flushes everything queued and joins the writer thread.
    pub fn finish(mut self) -> SinkStats {
        self.tx.take();
        let mut stats = match self.writer.take().map(|w| w.join()) {
            Some(Ok(stats)) => stats,
            Some(Err(_)) => {
                log::error!("Sink writer thread panicked");
                SinkStats::default()
            }
            None => SinkStats::default(),
        };
        stats.dropped = self.dropped();
        stats
    }
}

impl Drop for ThreadedSink {
    fn drop(&mut self) {
        self.tx.take();
        if let Some(writer) = self.writer.take() {
            let _ = writer.join();
        }
    }
}

/// Writes each source's frames to `<root>/<stem>-out/<index:06>.<ext>`.
///
/// Sources sharing a stem get `<stem>-<source_id>-out` so they never overwrite each other.
#[derive(Debug)]
pub struct ImageDirSink {
    root: PathBuf,
    extension: String,
    stems: Vec<String>,
    counters: Vec<u64>,
    dirs: Vec<Option<PathBuf>>,
}

impl ImageDirSink {
    pub fn new(root: &Path, sources: &[SourceDescriptor]) -> Self {
        Self {
            root: root.to_path_buf(),
            extension: "jpg".to_string(),
            stems: unique_stems(sources),
            counters: vec![0; sources.len()],
            dirs: vec![None; sources.len()],
        }
    }

    /// Same as [`ImageDirSink::new`] rooted at `<cwd>/bvr-out`.
    pub fn in_current_dir(sources: &[SourceDescriptor]) -> Result<Self> {
        Ok(Self::new(&FsAccess::output_root()?, sources))
    }

    pub fn with_extension(mut self, ext: &str) -> Self {
        self.extension = ext.trim_start_matches('.').to_string();
        self
    }

    pub fn output_dir(&self, source_id: usize) -> Option<PathBuf> {
        self.stems.get(source_id).map(|stem| self.root.join(format!("{}-out", stem)))
    }

    fn dir_for(&mut self, source_id: usize) -> Result<PathBuf> {
        if let Some(Some(dir)) = self.dirs.get(source_id) {
            return Ok(dir.clone());
        }
        let Some(dir) = self.output_dir(source_id) else {
            bail!("Unknown source {}", source_id);
        };
        create_directory(&dir)?;
        self.dirs[source_id] = Some(dir.clone());
        Ok(dir)
    }
}

fn unique_stems(sources: &[SourceDescriptor]) -> Vec<String> {
    let stems: Vec<String> = sources.iter().enumerate().map(|(i, s)| s.output_stem(i)).collect();
    let mut seen: HashMap<&str, usize> = HashMap::new();
    for stem in &stems {
        *seen.entry(stem.as_str()).or_default() += 1;
    }
    stems
        .iter()
        .enumerate()
        .map(|(i, stem)| match seen.get(stem.as_str()) {
            Some(&n) if n > 1 => format!("{}-{}", stem, i),
            _ => stem.clone(),
        })
        .collect()
}

impl PersistenceSink for ImageDirSink {
    fn write(&mut self, source_id: usize, frame: &RgbImage) -> Result<()> {
        let dir = self.dir_for(source_id)?;
        let path = dir.join(format!("{:06}.{}", self.counters[source_id], self.extension));
        frame.save(&path).with_context(|| format!("Failed to write {}", path.display()))?;
        self.counters[source_id] += 1;
        Ok(())
    }

    fn close(&mut self, source_id: usize) -> Result<()> {
        let Some(written) = self.counters.get(source_id) else {
            bail!("Unknown source {}", source_id);
        };
        if let Some(Some(dir)) = self.dirs.get(source_id) {
            log::info!("Source {}: wrote {} frames to {}", source_id, written, dir.display());
        }
        Ok(())
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct NullDisplay;

impl DisplaySink for NullDisplay {
    fn show(&mut self, _canvas: &RgbImage) -> Result<bool> {
        Ok(true)
    }
}

/// Display without a window: keeps the latest canvas, optionally saves it, and asks to stop after
/// `max_frames` canvases.
#[derive(Debug, Default)]
pub struct HeadlessDisplay {
    max_frames: Option<u64>,
    snapshot_path: Option<PathBuf>,
    shown: u64,
    last: Option<RgbImage>,
}

impl HeadlessDisplay {
    pub fn new() -> Self {
        Default::default()
    }

    pub fn with_max_frames(mut self, n: u64) -> Self {
        self.max_frames = Some(n);
        self
    }

    pub fn with_snapshot(mut self, path: &Path) -> Self {
        self.snapshot_path = Some(path.to_path_buf());
        self
    }

    pub fn shown(&self) -> u64 {
        self.shown
    }

    pub fn last_canvas(&self) -> Option<&RgbImage> {
        self.last.as_ref()
    }
}

impl DisplaySink for HeadlessDisplay {
    fn show(&mut self, canvas: &RgbImage) -> Result<bool> {
        self.shown += 1;
        self.last = Some(canvas.clone());
        if let Some(path) = &self.snapshot_path {
            canvas.save(path).with_context(|| format!("Failed to save canvas to {}", path.display()))?;
        }
        Ok(self.max_frames.map_or(true, |max| self.shown < max))
    }
}
