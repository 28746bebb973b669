//! UltraFace face detector. Prior generation, box decoding and suppression
//! are plain functions; the ONNX session lives behind the `onnx` feature.

use crate::types::Rect;

pub const INPUT_WIDTH: u32 = 320;
pub const INPUT_HEIGHT: u32 = 240;
pub const SCORE_THRESHOLD: f32 = 0.7;
pub const IOU_THRESHOLD: f32 = 0.3;

const CENTER_VARIANCE: f32 = 0.1;
const SIZE_VARIANCE: f32 = 0.2;

/// Prior boxes `(cx, cy, w, h)` normalised to the input size.
pub fn generate_anchors(width: usize, height: usize) -> Vec<(f32, f32, f32, f32)> {
    // UltraFace configs
    let shrinkage_list = [8, 16, 32, 64];
    let min_boxes: [&[f32]; 4] = [
        &[10.0, 16.0, 24.0],
        &[32.0, 48.0],
        &[64.0, 96.0],
        &[128.0, 192.0, 256.0],
    ];
    let mut anchors = Vec::new();

    let w = width as f32;
    let h = height as f32;

    for (i, &shrinkage) in shrinkage_list.iter().enumerate() {
        let feature_h = (height as f32 / shrinkage as f32).ceil() as usize;
        let feature_w = (width as f32 / shrinkage as f32).ceil() as usize;

        for v in 0..feature_h {
            for u in 0..feature_w {
                let cx = (u as f32 * shrinkage as f32 + shrinkage as f32 / 2.0) / w;
                let cy = (v as f32 * shrinkage as f32 + shrinkage as f32 / 2.0) / h;

                for &min_box in min_boxes[i] {
                    anchors.push((cx, cy, min_box / w, min_box / h));
                }
            }
        }
    }
    anchors
}

/// Decode every prior whose face score passes `threshold`, in input pixels.
pub fn decode(
    anchors: &[(f32, f32, f32, f32)],
    scores_raw: &[f32],
    boxes_raw: &[f32],
    threshold: f32,
) -> Vec<(f32, Rect)> {
    let mut out = Vec::new();
    let n = anchors.len().min(scores_raw.len() / 2).min(boxes_raw.len() / 4);
    for i in 0..n {
        let score = scores_raw[i * 2 + 1];
        if score <= threshold {
            continue;
        }
        let (ax, ay, aw, ah) = anchors[i];
        let cx = boxes_raw[i * 4] * CENTER_VARIANCE * aw + ax;
        let cy = boxes_raw[i * 4 + 1] * CENTER_VARIANCE * ah + ay;
        let w = (boxes_raw[i * 4 + 2] * SIZE_VARIANCE).exp() * aw;
        let h = (boxes_raw[i * 4 + 3] * SIZE_VARIANCE).exp() * ah;

        out.push((
            score,
            Rect::new(
                (cx - w / 2.0) * INPUT_WIDTH as f32,
                (cy - h / 2.0) * INPUT_HEIGHT as f32,
                w * INPUT_WIDTH as f32,
                h * INPUT_HEIGHT as f32,
            ),
        ));
    }
    out
}

/// Greedy non-maximum suppression, keeping at most `max_faces` boxes in
/// descending score order.
pub fn suppress(mut candidates: Vec<(f32, Rect)>, iou_threshold: f32, max_faces: usize) -> Vec<Rect> {
    candidates.sort_by(|a, b| b.0.total_cmp(&a.0));
    let mut kept: Vec<Rect> = Vec::new();
    for (_, rect) in candidates {
        if kept.len() >= max_faces {
            break;
        }
        if kept.iter().all(|k| k.iou(&rect) <= iou_threshold) {
            kept.push(rect);
        }
    }
    kept
}

#[cfg(feature = "onnx")]
pub use session::FaceDetector;

#[cfg(feature = "onnx")]
mod session {
    use super::*;
    use crate::types::RgbFrame;
    use anyhow::Result;
    use image::imageops::FilterType;
    use ort::session::Session;
    use ort::value::Tensor;

    pub struct FaceDetector {
        session: Session,
        anchors: Vec<(f32, f32, f32, f32)>,
    }

    impl FaceDetector {
        pub fn new(session: Session) -> Self {
            let anchors = generate_anchors(INPUT_WIDTH as usize, INPUT_HEIGHT as usize);
            Self { session, anchors }
        }

        /// Up to `max_faces` face boxes in frame pixels.
        pub fn detect(&mut self, frame: &RgbFrame, max_faces: usize) -> Result<Vec<Rect>> {
            let resized = image::imageops::resize(frame, INPUT_WIDTH, INPUT_HEIGHT, FilterType::Triangle);

            // NCHW, normalised (pixel - 127) / 128
            let plane = (INPUT_WIDTH * INPUT_HEIGHT) as usize;
            let mut input_data = vec![0.0f32; 3 * plane];
            for (i, p) in resized.pixels().enumerate() {
                for c in 0..3 {
                    input_data[c * plane + i] = (p[c] as f32 - 127.0) / 128.0;
                }
            }

            let input_tensor = Tensor::from_array((
                vec![1i64, 3, INPUT_HEIGHT as i64, INPUT_WIDTH as i64],
                input_data,
            ))?;
            let outputs = self.session.run(ort::inputs![input_tensor])?;

            let (_scores_shape, scores_data) = outputs["scores"].try_extract_tensor::<f32>()?;
            let (_boxes_shape, boxes_data) = outputs["boxes"].try_extract_tensor::<f32>()?;

            let candidates = decode(&self.anchors, scores_data, boxes_data, SCORE_THRESHOLD);
            let sx = frame.width() as f32 / INPUT_WIDTH as f32;
            let sy = frame.height() as f32 / INPUT_HEIGHT as f32;

            Ok(suppress(candidates, IOU_THRESHOLD, max_faces)
                .into_iter()
                .map(|r| Rect::new(r.x * sx, r.y * sy, r.width * sx, r.height * sy))
                .collect())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ultraface_prior_count() {
        assert_eq!(generate_anchors(320, 240).len(), 4420);
    }

    #[test]
    fn decode_applies_threshold_and_identity_offsets() {
        let anchors = vec![(0.5, 0.5, 0.25, 0.5), (0.1, 0.1, 0.1, 0.1)];
        let scores = [0.1, 0.9, 0.5, 0.5];
        let boxes = [0.0; 8];
        let out = decode(&anchors, &scores, &boxes, SCORE_THRESHOLD);
        assert_eq!(out.len(), 1);
        let (score, rect) = out[0];
        assert_eq!(score, 0.9);
        assert!((rect.x - 120.0).abs() < 1e-3);
        assert!((rect.y - 60.0).abs() < 1e-3);
        assert!((rect.width - 80.0).abs() < 1e-3);
        assert!((rect.height - 120.0).abs() < 1e-3);
    }

    #[test]
    fn suppression_drops_overlaps_and_caps_count() {
        let a = Rect::new(0.0, 0.0, 10.0, 10.0);
        let a2 = Rect::new(1.0, 1.0, 10.0, 10.0);
        let b = Rect::new(50.0, 0.0, 10.0, 10.0);
        let c = Rect::new(100.0, 0.0, 10.0, 10.0);
        let candidates = vec![(0.8, a2), (0.95, a), (0.9, b), (0.85, c)];

        assert_eq!(suppress(candidates.clone(), IOU_THRESHOLD, 5), vec![a, b, c]);
        assert_eq!(suppress(candidates, IOU_THRESHOLD, 1), vec![a]);
    }
}
