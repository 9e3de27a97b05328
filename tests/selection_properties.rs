//! Property checks against seeded random detections and a brute-force reference.

use onnxnms::{iou, BoxFormat, BoxesView, Corners, NmsParams, NmsSelector, ScoresView};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

const NUM_BATCHES: usize = 2;
const NUM_CLASSES: usize = 3;
const SPATIAL: usize = 64;

struct Detections {
    boxes: Vec<f32>,
    scores: Vec<f32>,
}

fn make_detections(seed: u64) -> Detections {
    let mut rng = StdRng::seed_from_u64(seed);
    let mut boxes = Vec::with_capacity(NUM_BATCHES * SPATIAL * 4);
    for _ in 0..NUM_BATCHES * SPATIAL {
        let y1 = rng.random_range(0.0f32..100.0);
        let x1 = rng.random_range(0.0f32..100.0);
        let h = rng.random_range(1.0f32..30.0);
        let w = rng.random_range(1.0f32..30.0);
        boxes.extend_from_slice(&[y1, x1, y1 + h, x1 + w]);
    }
    let scores = (0..NUM_BATCHES * NUM_CLASSES * SPATIAL)
        .map(|_| rng.random_range(0.0f32..1.0))
        .collect();
    Detections { boxes, scores }
}

fn corners_of(det: &Detections, batch: usize, index: usize) -> Corners {
    let base = (batch * SPATIAL + index) * 4;
    let raw = &det.boxes[base..base + 4];
    Corners::decode([raw[0], raw[1], raw[2], raw[3]], BoxFormat::Corners)
}

fn score_of(det: &Detections, batch: usize, class: usize, index: usize) -> f32 {
    det.scores[(batch * NUM_CLASSES + class) * SPATIAL + index]
}

/// Straightforward greedy NMS for one pair.
fn reference_pair(det: &Detections, batch: usize, class: usize, params: &NmsParams) -> Vec<usize> {
    let mut candidates: Vec<usize> = (0..SPATIAL)
        .filter(|&i| score_of(det, batch, class, i) > params.score_threshold)
        .collect();
    candidates.sort_by(|&a, &b| {
        score_of(det, batch, class, b)
            .partial_cmp(&score_of(det, batch, class, a))
            .unwrap_or(std::cmp::Ordering::Equal)
            .then(a.cmp(&b))
    });
    let cap = params.selection_cap(SPATIAL);
    let mut kept: Vec<usize> = Vec::new();
    for idx in candidates {
        if kept.len() == cap {
            break;
        }
        let candidate = corners_of(det, batch, idx);
        let suppressed = kept.iter().any(|&k| {
            let selected = corners_of(det, batch, k);
            selected.area() > 0.0
                && candidate.area() > 0.0
                && iou(&selected, &candidate) > params.iou_threshold
        });
        if !suppressed {
            kept.push(idx);
        }
    }
    kept
}

fn run(det: &Detections, params: NmsParams) -> onnxnms::Selection {
    NmsSelector::new(params)
        .select(
            BoxesView::new(&det.boxes, NUM_BATCHES, SPATIAL).unwrap(),
            ScoresView::new(&det.scores, NUM_BATCHES, NUM_CLASSES, SPATIAL).unwrap(),
        )
        .unwrap()
}

#[test]
fn selection_matches_reference_greedy_nms() {
    for seed in 0..6u64 {
        let det = make_detections(seed);
        for &(iou_threshold, score_threshold, cap) in
            &[(0.5f32, 0.0f32, 0usize), (0.3, 0.4, 5), (0.7, 0.2, 0), (0.0, 0.5, 3)]
        {
            let params = NmsParams {
                iou_threshold,
                score_threshold,
                max_output_boxes_per_class: cap,
                ..NmsParams::default()
            };
            let selection = run(&det, params);
            for batch in 0..NUM_BATCHES {
                for class in 0..NUM_CLASSES {
                    assert_eq!(
                        selection.boxes_for(batch, class),
                        reference_pair(&det, batch, class, &params),
                        "seed {seed}, batch {batch}, class {class}, params {params:?}"
                    );
                }
            }
        }
    }
}

#[test]
fn survivors_respect_cap_score_and_overlap_bounds() {
    let det = make_detections(42);
    let params = NmsParams {
        iou_threshold: 0.45,
        score_threshold: 0.3,
        max_output_boxes_per_class: 10,
        ..NmsParams::default()
    };
    let selection = run(&det, params);
    assert!(selection.len() <= selection.capacity());

    for batch in 0..NUM_BATCHES {
        for class in 0..NUM_CLASSES {
            let kept = selection.boxes_for(batch, class);
            assert!(kept.len() <= 10);
            for (pos, &a) in kept.iter().enumerate() {
                assert!(score_of(&det, batch, class, a) > params.score_threshold);
                for &b in &kept[pos + 1..] {
                    let overlap = iou(&corners_of(&det, batch, a), &corners_of(&det, batch, b));
                    assert!(overlap <= params.iou_threshold, "iou {overlap} between {a} and {b}");
                    assert!(score_of(&det, batch, class, a) >= score_of(&det, batch, class, b));
                }
            }
        }
    }
}

#[test]
fn output_prefix_is_in_canonical_order() {
    let det = make_detections(3);
    let selection = run(
        &det,
        NmsParams {
            iou_threshold: 0.5,
            ..NmsParams::default()
        },
    );
    let keys: Vec<(usize, usize)> = selection
        .indices()
        .iter()
        .map(|s| (s.batch_index, s.class_index))
        .collect();
    let mut sorted = keys.clone();
    sorted.sort();
    assert_eq!(keys, sorted);
}

#[test]
fn repeated_selection_is_identical() {
    let det = make_detections(11);
    let params = NmsParams {
        iou_threshold: 0.5,
        score_threshold: 0.1,
        ..NmsParams::default()
    };
    assert_eq!(run(&det, params), run(&det, params));
}

#[test]
fn raising_iou_threshold_never_reduces_selection() {
    // Ten 10x10 boxes shifted by 2 along x, scores decreasing with index.
    let boxes: Vec<f32> = (0..10)
        .flat_map(|i| {
            let x = i as f32 * 2.0;
            [0.0, x, 10.0, x + 10.0]
        })
        .collect();
    let scores: Vec<f32> = (0..10).map(|i| 1.0 - i as f32 * 0.05).collect();

    let mut counts = Vec::new();
    for step in 0..=10 {
        let params = NmsParams {
            iou_threshold: step as f32 / 10.0,
            ..NmsParams::default()
        };
        let selection = NmsSelector::new(params)
            .select(
                BoxesView::new(&boxes, 1, 10).unwrap(),
                ScoresView::new(&scores, 1, 1, 10).unwrap(),
            )
            .unwrap();
        counts.push(selection.len());
    }

    assert!(counts.windows(2).all(|w| w[0] <= w[1]), "counts {counts:?}");
    assert_eq!(counts.first(), Some(&2));
    assert_eq!(counts.last(), Some(&10));
}
