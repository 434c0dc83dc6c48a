//! MediaPipe palm detector: SSD anchors, box decoding and NMS.

use std::{cmp::Ordering, f32::consts::FRAC_PI_2, path::Path, sync::OnceLock};

use anyhow::{Context, Result, anyhow};
use ort::{session::Session, value::Tensor};

use super::{
    common::{HANDPOSE_INPUT_SIZE, Letterbox, PALM_INPUT_SIZE, RotatedCrop, letterbox_tensor},
    ort::load_session,
};
use crate::types::Frame;

const PALM_KEYPOINTS: usize = 7;
const BOX_FEATURES: usize = 4 + PALM_KEYPOINTS * 2;

/// (stride, anchors per cell) for each SSD output layer of the 192px model.
const ANCHOR_LAYERS: &[(u32, usize)] = &[(8, 2), (16, 6)];

/// Crop side relative to the detected palm, wide enough to keep the fingers.
const CROP_EXPANSION: f32 = 2.4;
const MIN_CROP_SIDE: f32 = 80.0;

#[derive(Clone, Debug)]
pub struct PalmDetectorConfig {
    pub score_threshold: f32,
    pub nms_threshold: f32,
    pub top_k: usize,
}

impl Default for PalmDetectorConfig {
    fn default() -> Self {
        Self {
            score_threshold: 0.5,
            nms_threshold: 0.3,
            top_k: 8,
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct Palm {
    /// x1, y1, x2, y2 in frame pixels.
    pub bbox: [f32; 4],
    pub keypoints: Vec<(f32, f32)>,
    pub score: f32,
}

pub struct PalmDetector {
    session: Session,
    cfg: PalmDetectorConfig,
}

impl PalmDetector {
    pub fn new(model_path: &Path, cfg: PalmDetectorConfig) -> Result<Self> {
        let session = load_session(model_path).context("failed to load palm detector")?;
        Ok(Self { session, cfg })
    }

    /// Palms in descending score order.
    pub fn detect(&mut self, frame: &Frame) -> Result<Vec<Palm>> {
        let (input, letterbox) = letterbox_tensor(frame, PALM_INPUT_SIZE)?;
        let outputs = self
            .session
            .run(ort::inputs![Tensor::from_array(input)?])
            .context("failed to run palm detector")?;
        if outputs.len() < 2 {
            return Err(anyhow!("palm detector returned {} outputs, need 2", outputs.len()));
        }

        let boxes = outputs[0].try_extract_array::<f32>()?;
        let scores = outputs[1].try_extract_array::<f32>()?;
        let boxes = boxes
            .as_slice()
            .ok_or_else(|| anyhow!("palm box output is not contiguous"))?;
        let scores = scores
            .as_slice()
            .ok_or_else(|| anyhow!("palm score output is not contiguous"))?;

        decode_palms(boxes, scores, &letterbox, &self.cfg)
    }
}

fn anchors() -> &'static [[f32; 2]] {
    static ANCHORS: OnceLock<Vec<[f32; 2]>> = OnceLock::new();
    ANCHORS.get_or_init(|| {
        let mut anchors = Vec::new();
        for &(stride, per_cell) in ANCHOR_LAYERS {
            let cells = PALM_INPUT_SIZE / stride;
            for row in 0..cells {
                for col in 0..cells {
                    let center = [
                        (col as f32 + 0.5) / cells as f32,
                        (row as f32 + 0.5) / cells as f32,
                    ];
                    anchors.extend(std::iter::repeat_n(center, per_cell));
                }
            }
        }
        anchors
    })
}

fn decode_palms(
    boxes: &[f32],
    scores: &[f32],
    letterbox: &Letterbox,
    cfg: &PalmDetectorConfig,
) -> Result<Vec<Palm>> {
    let anchors = anchors();
    if boxes.len() < anchors.len() * BOX_FEATURES || scores.len() < anchors.len() {
        return Err(anyhow!(
            "palm outputs too short: {} box values, {} scores for {} anchors",
            boxes.len(),
            scores.len(),
            anchors.len()
        ));
    }

    let input = PALM_INPUT_SIZE as f32;
    // Anchor-relative unit coordinates back to frame pixels.
    let to_frame = |u: f32, v: f32| letterbox.to_frame(u * input, v * input);
    let max_x = letterbox.frame_w.saturating_sub(1) as f32;
    let max_y = letterbox.frame_h.saturating_sub(1) as f32;

    let mut candidates = Vec::new();
    for (idx, anchor) in anchors.iter().enumerate() {
        let score = sigmoid(scores[idx]);
        if score < cfg.score_threshold {
            continue;
        }
        let raw = &boxes[idx * BOX_FEATURES..(idx + 1) * BOX_FEATURES];
        let cx = anchor[0] + raw[0] / input;
        let cy = anchor[1] + raw[1] / input;
        let hw = raw[2] / input / 2.0;
        let hh = raw[3] / input / 2.0;
        if hw <= 0.0 || hh <= 0.0 {
            continue;
        }

        let (x1, y1) = to_frame(cx - hw, cy - hh);
        let (x2, y2) = to_frame(cx + hw, cy + hh);
        let keypoints = raw[4..]
            .chunks_exact(2)
            .map(|k| to_frame(anchor[0] + k[0] / input, anchor[1] + k[1] / input))
            .collect();

        candidates.push(Palm {
            bbox: [
                x1.clamp(0.0, max_x),
                y1.clamp(0.0, max_y),
                x2.clamp(0.0, max_x),
                y2.clamp(0.0, max_y),
            ],
            keypoints,
            score,
        });
    }

    Ok(non_max_suppression(candidates, cfg.nms_threshold, cfg.top_k))
}

fn non_max_suppression(mut candidates: Vec<Palm>, threshold: f32, top_k: usize) -> Vec<Palm> {
    candidates.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(Ordering::Equal));
    let mut kept: Vec<Palm> = Vec::new();
    for candidate in candidates {
        if kept.len() >= top_k {
            break;
        }
        if kept.iter().all(|k| iou(&k.bbox, &candidate.bbox) < threshold) {
            kept.push(candidate);
        }
    }
    kept
}

fn iou(a: &[f32; 4], b: &[f32; 4]) -> f32 {
    let w = (a[2].min(b[2]) - a[0].max(b[0])).max(0.0);
    let h = (a[3].min(b[3]) - a[1].max(b[1])).max(0.0);
    let inter = w * h;
    if inter <= 0.0 {
        return 0.0;
    }
    let area = |r: &[f32; 4]| (r[2] - r[0]).max(0.0) * (r[3] - r[1]).max(0.0);
    let union = area(a) + area(b) - inter;
    if union <= 0.0 { 0.0 } else { inter / union }
}

fn sigmoid(x: f32) -> f32 {
    1.0 / (1.0 + (-x).exp())
}

/// Square rotated crop around a palm, oriented so the fingers point up.
pub fn crop_for_palm(palm: &Palm, frame_w: u32, frame_h: u32) -> RotatedCrop {
    let center = mean(&palm.keypoints).unwrap_or((
        (palm.bbox[0] + palm.bbox[2]) * 0.5,
        (palm.bbox[1] + palm.bbox[3]) * 0.5,
    ));

    let (min_x, max_x, min_y, max_y) = palm.keypoints.iter().fold(
        (f32::MAX, f32::MIN, f32::MAX, f32::MIN),
        |(a, b, c, d), &(x, y)| (a.min(x), b.max(x), c.min(y), d.max(y)),
    );
    let keypoint_span = if palm.keypoints.is_empty() {
        0.0
    } else {
        (max_x - min_x).max(max_y - min_y)
    };
    let box_span = (palm.bbox[2] - palm.bbox[0])
        .abs()
        .max((palm.bbox[3] - palm.bbox[1]).abs());

    RotatedCrop {
        center,
        side: box_span.max(keypoint_span).max(MIN_CROP_SIDE) * CROP_EXPANSION,
        angle: principal_angle(&palm.keypoints) - FRAC_PI_2,
        size: HANDPOSE_INPUT_SIZE,
        frame_w,
        frame_h,
    }
}

fn mean(points: &[(f32, f32)]) -> Option<(f32, f32)> {
    if points.is_empty() {
        return None;
    }
    let n = points.len() as f32;
    let (sx, sy) = points.iter().fold((0.0, 0.0), |(sx, sy), &(x, y)| (sx + x, sy + y));
    Some((sx / n, sy / n))
}

/// Direction of largest spread of the palm keypoints, from their 2x2 covariance.
fn principal_angle(points: &[(f32, f32)]) -> f32 {
    let Some((mx, my)) = mean(points).filter(|_| points.len() >= 2) else {
        return FRAC_PI_2;
    };
    let n = points.len() as f32;
    let (xx, xy, yy) = points.iter().fold((0.0, 0.0, 0.0), |(xx, xy, yy), &(x, y)| {
        let (dx, dy) = (x - mx, y - my);
        (xx + dx * dx, xy + dx * dy, yy + dy * dy)
    });
    let (xx, xy, yy) = (xx / n, xy / n, yy / n);

    if xy.abs() <= 1e-6 {
        return if xx >= yy { 0.0 } else { FRAC_PI_2 };
    }
    let half_trace = (xx + yy) * 0.5;
    let largest = half_trace + (half_trace * half_trace - (xx * yy - xy * xy)).max(0.0).sqrt();
    xy.atan2(largest - yy)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn palm(bbox: [f32; 4], score: f32) -> Palm {
        Palm {
            bbox,
            keypoints: Vec::new(),
            score,
        }
    }

    #[test]
    fn anchor_layout_matches_model() {
        let anchors = anchors();
        assert_eq!(anchors.len(), 2016);
        assert_eq!(anchors[0], [0.5 / 24.0, 0.5 / 24.0]);
        assert_eq!(anchors[1], anchors[0]);
        assert_eq!(anchors[1152], [0.5 / 12.0, 0.5 / 12.0]);
    }

    #[test]
    fn nms_drops_overlaps_and_orders_by_score() {
        let kept = non_max_suppression(
            vec![
                palm([0.0, 0.0, 10.0, 10.0], 0.6),
                palm([1.0, 1.0, 11.0, 11.0], 0.9),
                palm([50.0, 50.0, 60.0, 60.0], 0.7),
            ],
            0.3,
            8,
        );
        let scores: Vec<f32> = kept.iter().map(|p| p.score).collect();
        assert_eq!(scores, vec![0.9, 0.7]);
    }

    #[test]
    fn nms_respects_top_k() {
        let kept = non_max_suppression(
            vec![
                palm([0.0, 0.0, 10.0, 10.0], 0.6),
                palm([50.0, 50.0, 60.0, 60.0], 0.7),
            ],
            0.3,
            1,
        );
        assert_eq!(kept.len(), 1);
        assert_relative_eq!(kept[0].score, 0.7);
    }

    #[test]
    fn iou_of_disjoint_and_identical_boxes() {
        let a = [0.0, 0.0, 10.0, 10.0];
        assert_relative_eq!(iou(&a, &a), 1.0);
        assert_relative_eq!(iou(&a, &[20.0, 20.0, 30.0, 30.0]), 0.0);
    }

    #[test]
    fn decodes_single_confident_anchor() {
        let anchors = anchors();
        let mut boxes = vec![0.0f32; anchors.len() * BOX_FEATURES];
        let mut scores = vec![-10.0f32; anchors.len()];
        // First anchor, 19.2px box (0.1 of the input) centred on the anchor.
        boxes[2] = 19.2;
        boxes[3] = 19.2;
        scores[0] = 10.0;

        let letterbox = Letterbox {
            scale: 1.0,
            pad_x: 0.0,
            pad_y: 0.0,
            frame_w: 192,
            frame_h: 192,
        };
        let palms =
            decode_palms(&boxes, &scores, &letterbox, &PalmDetectorConfig::default()).unwrap();
        assert_eq!(palms.len(), 1);
        let p = &palms[0];
        assert_relative_eq!(p.bbox[0], 0.0);
        assert_relative_eq!(p.bbox[2], 4.0 + 9.6, epsilon = 1e-3);
        assert_eq!(p.keypoints.len(), PALM_KEYPOINTS);
    }

    #[test]
    fn vertical_palm_needs_no_rotation() {
        let p = Palm {
            bbox: [90.0, 50.0, 110.0, 150.0],
            keypoints: vec![(100.0, 50.0), (100.0, 100.0), (100.0, 150.0)],
            score: 0.9,
        };
        let crop = crop_for_palm(&p, 640, 480);
        assert_relative_eq!(crop.center.0, 100.0);
        assert_relative_eq!(crop.center.1, 100.0);
        assert_relative_eq!(crop.angle, 0.0, epsilon = 1e-5);
        assert_relative_eq!(crop.side, 100.0 * CROP_EXPANSION);
    }
}
