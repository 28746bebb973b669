use async_trait::async_trait;
use std::time::Instant;

use crate::control::ModelOptions;
use crate::error::{InferenceError, ModelLoadError};
use crate::types::{Point3D, Prediction, RgbFrame, MESH_POINT_COUNT};

/// Produces a landmark model for a given configuration. Loading may be slow
/// (model files, execution provider setup), so it is async.
#[async_trait(?Send)]
pub trait LandmarkSource {
    fn name(&self) -> String;
    async fn load(&self, options: ModelOptions) -> Result<Box<dyn LandmarkModel>, ModelLoadError>;
}

/// A loaded model. An empty result means no face was found.
#[async_trait(?Send)]
pub trait LandmarkModel {
    async fn estimate(&mut self, frame: &RgbFrame) -> Result<Vec<Prediction>, InferenceError>;
}

/// Stand-in used when no ONNX models are available: animated rings of 468
/// points, one per tracked face, spread across the frame.
pub struct SyntheticSource;

impl SyntheticSource {
    pub fn new() -> Self {
        Self
    }
}

impl Default for SyntheticSource {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait(?Send)]
impl LandmarkSource for SyntheticSource {
    fn name(&self) -> String {
        "Synthetic Mesh (468 pts)".to_string()
    }

    async fn load(&self, options: ModelOptions) -> Result<Box<dyn LandmarkModel>, ModelLoadError> {
        log::info!(
            "Synthetic landmark model ready (backend {}, up to {} faces)",
            options.backend,
            options.max_faces
        );
        Ok(Box::new(SyntheticModel {
            faces: options.max_faces.max(1) as usize,
            start_time: Instant::now(),
        }))
    }
}

pub struct SyntheticModel {
    faces: usize,
    start_time: Instant,
}

impl SyntheticModel {
    /// One face ring at time `t` seconds.
    pub fn face(cx: f32, cy: f32, radius: f32, t: f32) -> Prediction {
        let radius = radius + (t * 2.0).sin() * radius * 0.2;
        let points = (0..MESH_POINT_COUNT)
            .map(|i| {
                let angle = (i as f32 / MESH_POINT_COUNT as f32) * std::f32::consts::PI * 2.0 + t;
                Point3D {
                    x: cx + angle.cos() * radius,
                    y: cy + angle.sin() * radius,
                    z: 0.0,
                }
            })
            .collect();
        Prediction::new(points)
    }
}

#[async_trait(?Send)]
impl LandmarkModel for SyntheticModel {
    async fn estimate(&mut self, frame: &RgbFrame) -> Result<Vec<Prediction>, InferenceError> {
        let w = frame.width() as f32;
        let h = frame.height() as f32;
        let t = self.start_time.elapsed().as_secs_f32();
        let slot = w / self.faces as f32;
        let radius = (slot.min(h) / 4.0).max(1.0);

        Ok((0..self.faces)
            .map(|i| Self::face(slot * (i as f32 + 0.5), h / 2.0, radius, t))
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::control::ComputeBackend;

    #[tokio::test]
    async fn synthetic_model_honours_face_cap() {
        let source = SyntheticSource::new();
        let mut model = source
            .load(ModelOptions {
                backend: ComputeBackend::Cpu,
                max_faces: 3,
            })
            .await
            .unwrap();
        let frame = RgbFrame::new(640, 480);
        let predictions = model.estimate(&frame).await.unwrap();
        assert_eq!(predictions.len(), 3);
        assert!(predictions.iter().all(|p| p.len() == MESH_POINT_COUNT));
    }

    #[test]
    fn synthetic_face_is_centred() {
        let face = SyntheticModel::face(100.0, 50.0, 10.0, 0.0);
        let mean_x = face.points.iter().map(|p| p.x).sum::<f32>() / face.len() as f32;
        let mean_y = face.points.iter().map(|p| p.y).sum::<f32>() / face.len() as f32;
        assert!((mean_x - 100.0).abs() < 1e-2);
        assert!((mean_y - 50.0).abs() < 1e-2);
    }
}
