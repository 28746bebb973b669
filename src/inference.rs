//! ONNX landmark source: UltraFace boxes, then the 468-point face mesh on
//! each padded box.

use anyhow::Result;
use async_trait::async_trait;
use image::imageops::FilterType;
use ort::execution_providers::{
    CPUExecutionProvider, CUDAExecutionProvider, CoreMLExecutionProvider, ExecutionProviderDispatch,
};
use ort::session::{builder::GraphOptimizationLevel, Session};
use std::path::{Path, PathBuf};

use crate::control::{ComputeBackend, ModelOptions};
use crate::detector::FaceDetector;
use crate::error::{InferenceError, ModelLoadError};
use crate::pipeline::{LandmarkModel, LandmarkSource};
use crate::types::{Point3D, Prediction, Rect, RgbFrame, MESH_POINT_COUNT};

const MESH_INPUT: u32 = 192;
const ROI_PADDING: f32 = 0.25;

fn execution_providers(backend: ComputeBackend) -> Vec<ExecutionProviderDispatch> {
    let preferred = match backend {
        ComputeBackend::Cpu => None,
        ComputeBackend::CoreMl => Some(CoreMLExecutionProvider::default().build()),
        ComputeBackend::Cuda => Some(CUDAExecutionProvider::default().build()),
    };
    // CPU stays registered as the fallback.
    preferred
        .into_iter()
        .chain(std::iter::once(CPUExecutionProvider::default().build()))
        .collect()
}

fn build_session(path: &Path, backend: ComputeBackend) -> Result<Session> {
    Ok(Session::builder()?
        .with_optimization_level(GraphOptimizationLevel::Level3)?
        .with_intra_threads(4)?
        .with_execution_providers(execution_providers(backend))?
        .commit_from_file(path)?)
}

pub struct FaceMeshSource {
    mesh_path: PathBuf,
    detector_path: PathBuf,
}

impl FaceMeshSource {
    pub fn new(mesh_path: impl Into<PathBuf>, detector_path: impl Into<PathBuf>) -> Self {
        Self {
            mesh_path: mesh_path.into(),
            detector_path: detector_path.into(),
        }
    }

    /// Whether the mesh model file exists at all.
    pub fn available(&self) -> bool {
        self.mesh_path.exists()
    }
}

#[async_trait(?Send)]
impl LandmarkSource for FaceMeshSource {
    fn name(&self) -> String {
        "Face Mesh (468 pts)".to_string()
    }

    async fn load(&self, options: ModelOptions) -> Result<Box<dyn LandmarkModel>, ModelLoadError> {
        let detector = if self.detector_path.exists() {
            log::info!("Loading Face Detector from {}...", self.detector_path.display());
            let session = build_session(&self.detector_path, options.backend)
                .map_err(|e| ModelLoadError(format!("{}: {e:#}", self.detector_path.display())))?;
            Some(FaceDetector::new(session))
        } else {
            log::warn!("Face Detector not found. Tracking a single full-frame face.");
            None
        };

        log::info!(
            "Loading Face Mesh from {} ({} backend)...",
            self.mesh_path.display(),
            options.backend
        );
        let mesh = build_session(&self.mesh_path, options.backend)
            .map_err(|e| ModelLoadError(format!("{}: {e:#}", self.mesh_path.display())))?;

        Ok(Box::new(FaceMeshModel {
            mesh,
            detector,
            max_faces: options.max_faces.max(1) as usize,
        }))
    }
}

pub struct FaceMeshModel {
    mesh: Session,
    detector: Option<FaceDetector>,
    max_faces: usize,
}

/// Expand a detection a little for mesh context and clip it to the frame.
fn padded_roi(rect: Rect, frame_w: f32, frame_h: f32) -> Rect {
    let pad_w = rect.width * ROI_PADDING;
    let pad_h = rect.height * ROI_PADDING;
    let x = (rect.x - pad_w / 2.0).max(0.0);
    let y = (rect.y - pad_h / 2.0).max(0.0);
    let w = (rect.width + pad_w).min(frame_w - x);
    let h = (rect.height + pad_h).min(frame_h - y);
    Rect::new(x, y, w, h)
}

impl FaceMeshModel {
    fn mesh_for(&mut self, frame: &RgbFrame, roi: Rect) -> Result<Option<Prediction>> {
        if roi.width < 1.0 || roi.height < 1.0 {
            return Ok(None);
        }
        let crop = image::imageops::crop_imm(
            frame,
            roi.x as u32,
            roi.y as u32,
            roi.width as u32,
            roi.height as u32,
        )
        .to_image();
        let resized = image::imageops::resize(&crop, MESH_INPUT, MESH_INPUT, FilterType::Triangle);

        // NHWC, normalised to [-1, 1]
        let input_data: Vec<f32> = resized
            .pixels()
            .flat_map(|p| p.0.map(|c| c as f32 / 127.5 - 1.0))
            .collect();
        let shape = vec![1i64, MESH_INPUT as i64, MESH_INPUT as i64, 3];
        let input = ort::value::Tensor::from_array((shape, input_data))?;
        let outputs = self.mesh.run(ort::inputs![input])?;
        let (_shape, data) = outputs[0].try_extract_tensor::<f32>()?;

        if data.len() < MESH_POINT_COUNT * 3 {
            return Ok(None);
        }

        // Mesh local (0..192) -> crop -> full frame
        let scale_x = roi.width / MESH_INPUT as f32;
        let scale_y = roi.height / MESH_INPUT as f32;
        let points = data
            .chunks_exact(3)
            .take(MESH_POINT_COUNT)
            .map(|v| Point3D {
                x: roi.x + v[0] * scale_x,
                y: roi.y + v[1] * scale_y,
                z: v[2],
            })
            .collect();

        Ok(Some(Prediction::new(points)))
    }
}

#[async_trait(?Send)]
impl LandmarkModel for FaceMeshModel {
    async fn estimate(&mut self, frame: &RgbFrame) -> Result<Vec<Prediction>, InferenceError> {
        let (fw, fh) = (frame.width() as f32, frame.height() as f32);
        let rois = match &mut self.detector {
            Some(det) => det
                .detect(frame, self.max_faces)
                .map_err(|e| InferenceError(format!("face detection: {e:#}")))?
                .into_iter()
                .map(|r| padded_roi(r, fw, fh))
                .collect(),
            None => vec![Rect::new(0.0, 0.0, fw, fh)],
        };

        let mut predictions = Vec::with_capacity(rois.len());
        for roi in rois {
            if let Some(p) = self
                .mesh_for(frame, roi)
                .map_err(|e| InferenceError(format!("face mesh: {e:#}")))?
            {
                predictions.push(p);
            }
        }
        Ok(predictions)
    }
}
