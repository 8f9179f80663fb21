extern crate bvr_stream;

use std::sync::Arc;
use std::thread;
use std::time::Duration;
use image::{Rgb, RgbImage};
use bvr_stream::common::{BvrFrame, SourceDescriptor};
use bvr_stream::streams::{
    CaptureExit, CaptureOpener, CaptureWorker, DeliveryMode, ImageSequenceOpener, Mailbox, ShutdownCoordinator,
    ShutdownReason, ShutdownSignal,
};

use fakes::{ScriptedOpener, Script};

fn image_dir(name: &str, count: u8) -> std::path::PathBuf {
    let dir = std::env::temp_dir().join(format!("bvr_stream_{}_{}", name, std::process::id()));
    let _ = std::fs::remove_dir_all(&dir);
    std::fs::create_dir_all(&dir).unwrap();
    // written out of order, read back sorted
    for i in (0..count).rev() {
        RgbImage::from_pixel(12, 8, Rgb([i * 10, 0, 0])).save(dir.join(format!("frame_{:03}.png", i))).unwrap();
    }
    std::fs::write(dir.join("notes.txt"), "not an image").unwrap();
    dir
}

#[test]
fn image_directory_plays_in_order() {
    let dir = image_dir("sequence", 3);
    let source = SourceDescriptor::from_uri(dir.to_str().unwrap());
    let mailbox = Arc::new(Mailbox::new(DeliveryMode::Blocking));
    let worker = CaptureWorker::new(4, source, Arc::new(ImageSequenceOpener), mailbox.clone(), ShutdownSignal::new());
    let handle = worker.spawn().unwrap();

    let mut frames: Vec<BvrFrame> = vec![];
    while let Some(frame) = mailbox.receive() {
        frames.push(frame);
    }
    let summary = handle.join().unwrap();

    assert_eq!(summary.exit, CaptureExit::EndOfStream);
    assert_eq!(summary.frames_pushed, 3);
    assert_eq!(frames.len(), 3);
    for (i, frame) in frames.iter().enumerate() {
        assert_eq!(frame.source_id, 4);
        assert_eq!(frame.frame_index, i as u64);
        assert_eq!(frame.dimensions(), (12, 8));
        assert_eq!(frame.get_pixel(0, 0)[0], i as u8 * 10);
    }
    let _ = std::fs::remove_dir_all(dir);
}

#[test]
fn image_opener_rejects_missing_and_live() {
    let opener = ImageSequenceOpener;
    assert!(opener.open(&SourceDescriptor::from_uri("/definitely/not/here")).is_err());
    assert!(opener.open(&SourceDescriptor::from_uri("rtsp://10.1.1.1/cam")).is_err());
}

#[test]
fn open_failure_ends_stream() {
    let opener = ScriptedOpener::new(vec![Script::FailOpen], 8, 8);
    let source = opener.sources().remove(0);
    let mailbox = Arc::new(Mailbox::new(DeliveryMode::Blocking));
    let summary = CaptureWorker::new(0, source, Arc::new(opener), mailbox.clone(), ShutdownSignal::new()).run();

    assert_eq!(summary.exit, CaptureExit::OpenFailed);
    assert_eq!(mailbox.receive().map(|f| f.frame_index), None);
}

#[test]
fn signal_is_set_once() {
    let signal = ShutdownSignal::new();
    let other = signal.clone();
    assert!(!signal.is_triggered());
    assert!(other.trigger(ShutdownReason::AllSourcesFinished));
    assert!(!signal.trigger(ShutdownReason::Fatal));
    assert!(signal.is_triggered());
    assert_eq!(signal.reason(), Some(ShutdownReason::AllSourcesFinished));
}

#[test]
fn coordinator_joins_blocked_workers() {
    let opener: Arc<dyn CaptureOpener> = Arc::new(ScriptedOpener::new(vec![Script::Endless, Script::Endless], 8, 8));
    let signal = ShutdownSignal::new();
    let mut coordinator = ShutdownCoordinator::new(signal.clone());

    let mut mailboxes = vec![];
    for source_id in 0..2 {
        let source = SourceDescriptor::new(&format!("fake://{}", source_id), DeliveryMode::Blocking);
        let mailbox = Arc::new(Mailbox::new(DeliveryMode::Blocking));
        let handle = CaptureWorker::new(source_id, source, opener.clone(), mailbox.clone(), signal.clone())
            .spawn()
            .unwrap();
        coordinator.register(source_id, mailbox.clone(), handle);
        mailboxes.push(mailbox);
    }

    // nobody consumes: both producers end up blocked on their second send
    thread::sleep(Duration::from_millis(100));
    let summaries = coordinator.shutdown(ShutdownReason::StopRequested);

    assert_eq!(summaries.len(), 2);
    assert!(summaries.iter().all(|s| s.exit == CaptureExit::Shutdown && s.frames_pushed == 1));
    assert_eq!(signal.reason(), Some(ShutdownReason::StopRequested));
    assert!(mailboxes.iter().all(|m| m.drain().is_none()));
}

#[test]
fn empty_frame_is_end_of_stream() {
    let opener = ScriptedOpener::new(vec![Script::EmptyAfter(2)], 8, 8);
    let source = opener.sources().remove(0);
    let mailbox = Arc::new(Mailbox::new(DeliveryMode::Blocking));
    let handle = CaptureWorker::new(0, source, Arc::new(opener), mailbox.clone(), ShutdownSignal::new())
        .spawn()
        .unwrap();

    let mut indices = vec![];
    while let Some(frame) = mailbox.receive() {
        assert!(!frame.is_empty());
        indices.push(frame.frame_index);
    }
    let summary = handle.join().unwrap();

    assert_eq!(indices, vec![0, 1]);
    assert_eq!(summary.exit, CaptureExit::EndOfStream);
    assert_eq!(summary.frames_pushed, 2);
}
