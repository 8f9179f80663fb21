extern crate bvr_stream;

use image::{Rgb, RgbImage};
use ndarray::Array3;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use bvr_stream::detection_runners::{
    decode, encode, pack_yolo_output, preprocess_batch, ChannelOrder, LetterboxInfo, PostProcessor, RawDetections,
    RawRecord,
};

fn identity(width: u32, height: u32) -> LetterboxInfo {
    LetterboxInfo::compute(width, height, width, height)
}

#[test]
fn decode_truncates_at_capacity() {
    let records: Vec<RawRecord> = (0..1500)
        .map(|i| RawRecord::new(i as f32, 10., 4., 4., 0.9, i % 3))
        .collect();
    let mut buffer = encode(&records, usize::MAX);
    assert_eq!(buffer[0], 1500.);

    let parsed = RawDetections::parse(&buffer, 1000);
    assert_eq!(parsed.announced(), 1500);
    assert_eq!(parsed.len(), 1000);
    let decoded: Vec<RawRecord> = parsed.collect();
    assert_eq!(decoded[999], records[999]);

    // announced count larger than the data present
    buffer.truncate(1 + 6 * 2 + 3);
    assert_eq!(decode(&buffer, 1000).len(), 2);

    assert!(decode(&[], 1000).is_empty());
    assert!(decode(&[0.0], 1000).is_empty());
    assert!(decode(&[-3.0, 1., 1., 1., 1., 1., 1.], 1000).is_empty());
}

#[test]
fn confidence_threshold_is_inclusive() {
    let buffer = encode(
        &[
            RawRecord::new(10., 10., 4., 4., 0.5, 0),
            RawRecord::new(30., 30., 4., 4., 0.49, 0),
            RawRecord::new(50., 50., 4., 4., 0.8, 1),
        ],
        1000,
    );
    let post = PostProcessor::new(0.5, 0.4);
    let dets = post.process(&buffer, &identity(100, 100), 3);
    assert_eq!(dets.len(), 2);
    assert!(dets.iter().all(|d| d.confidence >= 0.5));
    assert!(dets.iter().all(|d| d.source_id == 3));
}

#[test]
fn overlapping_same_class_keeps_best() {
    // IoU of the two boxes is ~0.7
    let buffer = encode(
        &[
            RawRecord::new(30.0, 30., 20., 20., 0.6, 0),
            RawRecord::new(26.5, 30., 20., 20., 0.9, 0),
        ],
        1000,
    );
    let post = PostProcessor::new(0.5, 0.4);
    let dets = post.process(&buffer, &identity(64, 64), 0);
    assert_eq!(dets.len(), 1);
    assert_eq!(dets[0].confidence, 0.9);
    assert!((dets[0].bbox.cx() - 26.5).abs() < 1e-4);
}

#[test]
fn iou_at_threshold_is_retained() {
    let post = PostProcessor::new(0.5, 0.4);

    // B sits inside A: intersection 40, union 100
    let at_threshold = encode(
        &[
            RawRecord::new(50., 50., 10., 10., 0.9, 2),
            RawRecord::new(50., 47., 10., 4., 0.8, 2),
        ],
        1000,
    );
    let candidates = post.candidates(&at_threshold, 0);
    assert_eq!(candidates[0].bbox.iou(&candidates[1].bbox), 0.4);
    assert_eq!(post.suppress(candidates).len(), 2);

    let above_threshold = encode(
        &[
            RawRecord::new(50., 50., 10., 10., 0.9, 2),
            RawRecord::new(50., 47.1, 10., 4.2, 0.8, 2),
        ],
        1000,
    );
    let kept = post.suppress(post.candidates(&above_threshold, 0));
    assert_eq!(kept.len(), 1);
    assert_eq!(kept[0].confidence, 0.9);
}

#[test]
fn grouping_by_class() {
    let buffer = encode(
        &[
            RawRecord::new(40., 40., 20., 20., 0.7, 5),
            RawRecord::new(40., 40., 20., 20., 0.9, 1),
        ],
        1000,
    );
    let info = identity(100, 100);

    let grouped = PostProcessor::new(0.5, 0.4).process(&buffer, &info, 0);
    assert_eq!(grouped.iter().map(|d| d.class_id).collect::<Vec<_>>(), vec![1, 5]);

    let merged = PostProcessor::new(0.5, 0.4).with_group_by_class(false).process(&buffer, &info, 0);
    assert_eq!(merged.len(), 1);
    assert_eq!(merged[0].class_id, 1);
}

#[test]
fn equal_confidence_lower_index_wins() {
    let buffer = encode(
        &[
            RawRecord::new(40., 40., 20., 20., 0.8, 0),
            RawRecord::new(42., 40., 20., 20., 0.8, 0),
        ],
        1000,
    );
    let dets = PostProcessor::new(0.5, 0.4).process(&buffer, &identity(100, 100), 0);
    assert_eq!(dets.len(), 1);
    assert!((dets[0].bbox.cx() - 40.).abs() < 1e-4);
}

#[test]
fn suppression_is_idempotent() {
    let mut rng = StdRng::seed_from_u64(0xB0B);
    let post = PostProcessor::new(0.3, 0.45);

    for _ in 0..20 {
        let records: Vec<RawRecord> = (0..300)
            .map(|_| {
                RawRecord::new(
                    rng.gen_range(0.0..608.0),
                    rng.gen_range(0.0..608.0),
                    rng.gen_range(4.0..160.0),
                    rng.gen_range(4.0..160.0),
                    rng.gen_range(0.0..1.0),
                    rng.gen_range(0..4),
                )
            })
            .collect();
        let buffer = encode(&records, 1000);

        let once = post.suppress(post.candidates(&buffer, 0));
        let twice = post.suppress(once.clone());
        assert!(!once.is_empty());
        assert_eq!(once, twice);
    }
}

#[test]
fn letterbox_round_trip() {
    let info = LetterboxInfo::compute(1280, 720, 640, 640);
    assert_eq!(info.scale, 0.5);
    assert_eq!(info.pad_x, 0.);
    assert_eq!(info.pad_y, 140.);

    let info = LetterboxInfo::compute(1280, 720, 608, 608);
    let (x1, y1, x2, y2) = (100f32, 200f32, 300f32, 400f32);
    let (mx1, my1) = info.to_model_space(x1, y1);
    let (mx2, my2) = info.to_model_space(x2, y2);
    let buffer = encode(
        &[RawRecord::new((mx1 + mx2) / 2., (my1 + my2) / 2., mx2 - mx1, my2 - my1, 0.95, 0)],
        1000,
    );

    let dets = PostProcessor::default().process(&buffer, &info, 0);
    assert_eq!(dets.len(), 1);
    let b = dets[0].bbox;
    assert!((b.x1 - x1).abs() <= 1.0, "x1 {}", b.x1);
    assert!((b.y1 - y1).abs() <= 1.0, "y1 {}", b.y1);
    assert!((b.x2 - x2).abs() <= 1.0, "x2 {}", b.x2);
    assert!((b.y2 - y2).abs() <= 1.0, "y2 {}", b.y2);
}

#[test]
fn boxes_are_clipped_to_frame() {
    let info = LetterboxInfo::compute(200, 100, 200, 200);
    // spills into the bottom padding and past the left edge
    let buffer = encode(&[RawRecord::new(5., 140., 30., 40., 0.9, 0)], 1000);
    let dets = PostProcessor::default().process(&buffer, &info, 0);
    let b = dets[0].bbox;
    assert_eq!(b.x1, 0.);
    assert!(b.y2 <= 100.);
    assert!(b.x2 > 0. && b.y1 >= 0.);
}

#[test]
fn labels_from_names() {
    let buffer = encode(
        &[RawRecord::new(10., 10., 5., 5., 0.9, 1), RawRecord::new(80., 80., 5., 5., 0.9, 7)],
        1000,
    );
    let post = PostProcessor::new(0.5, 0.4).with_names(vec!["person".into(), "bicycle".into()]);
    let dets = post.process(&buffer, &identity(100, 100), 0);
    assert_eq!(dets[0].get_label(), "bicycle");
    assert_eq!(dets[1].get_label(), "# 7");
}

#[test]
fn preprocess_pads_and_orders_channels() {
    let frame = RgbImage::from_pixel(128, 72, Rgb([255, 0, 0]));

    let (xs, infos) = preprocess_batch(&[Some(&frame), None], 64, 64, 128, ChannelOrder::Rgb).unwrap();
    assert_eq!(xs.shape(), &[2, 3, 64, 64]);
    let info = infos[0].unwrap();
    assert_eq!((info.width_resized, info.height_resized), (64, 36));
    assert_eq!(info.pad_y, 14.);
    assert!(infos[1].is_none());

    assert!((xs[[0, 0, 0, 0]] - 128. / 255.).abs() < 1e-6);
    assert!(xs[[0, 0, 32, 32]] > 0.99);
    assert!(xs[[0, 2, 32, 32]] < 0.01);
    assert!(xs.0.index_axis(ndarray::Axis(0), 1).iter().all(|v| *v == 0.));

    let (xs, _) = preprocess_batch(&[Some(&frame)], 64, 64, 128, ChannelOrder::Bgr).unwrap();
    assert!(xs[[0, 0, 32, 32]] < 0.01);
    assert!(xs[[0, 2, 32, 32]] > 0.99);
}

#[test]
fn yolo_output_packing() {
    // one image, three anchors, two classes
    let preds = Array3::from_shape_vec(
        (1, 3, 7),
        vec![
            10., 10., 4., 4., 0.05, 0.9, 0.9,
            20., 20., 6., 6., 0.8, 0.2, 0.9,
            30., 30., 8., 8., 0.5, 0.6, 0.1,
        ],
    )
    .unwrap()
    .into_dyn();

    let buffers = pack_yolo_output(preds.view(), 1000, 0.1).unwrap();
    assert_eq!(buffers.len(), 1);
    let records = decode(&buffers[0], 1000);
    assert_eq!(records.len(), 2);
    assert_eq!(records[0].class_id, 1);
    assert!((records[0].confidence - 0.72).abs() < 1e-6);
    assert_eq!(records[1].class_id, 0);
    assert!((records[1].confidence - 0.3).abs() < 1e-6);

    let capped = pack_yolo_output(preds.view(), 1, 0.1).unwrap();
    assert_eq!(capped[0][0], 1.);

    let flat = ndarray::Array2::<f32>::zeros((3, 7)).into_dyn();
    assert!(pack_yolo_output(flat.view(), 1000, 0.1).is_err());
}

#[test]
fn unusable_frame_leaves_an_empty_slot() {
    let empty = RgbImage::new(0, 0);
    let frame = RgbImage::from_pixel(32, 32, Rgb([0, 255, 0]));

    let (xs, infos) = preprocess_batch(&[Some(&empty), Some(&frame)], 64, 64, 128, ChannelOrder::Rgb).unwrap();
    assert_eq!(xs.shape(), &[2, 3, 64, 64]);
    assert!(infos[0].is_none());
    assert!(infos[1].is_some());
    assert!(xs.0.index_axis(ndarray::Axis(0), 0).iter().all(|v| *v == 0.));
    assert!(xs[[1, 1, 32, 32]] > 0.99);
}
