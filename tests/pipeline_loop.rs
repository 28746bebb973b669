use async_trait::async_trait;
use std::cell::{Cell, RefCell};
use std::collections::VecDeque;
use std::rc::Rc;

use rusty_overlay::anchor::AnchorSpec;
use rusty_overlay::camera::VideoCapture;
use rusty_overlay::control::{ComputeBackend, ModelOptions, PipelineConfig};
use rusty_overlay::controller::{LoopState, PipelineContext, RenderLoop};
use rusty_overlay::error::{CaptureError, InferenceError, ModelLoadError, SetupError, TickError};
use rusty_overlay::geometry::{OverlaySpec, PathSpec};
use rusty_overlay::landmarks;
use rusty_overlay::output::Canvas2D;
use rusty_overlay::overlays;
use rusty_overlay::pipeline::{LandmarkModel, LandmarkSource};
use rusty_overlay::scene::{PerspectiveCamera, Renderer3D, Scene, SceneObject, SceneTarget};
use rusty_overlay::types::{Point2D, Point3D, Prediction, RgbFrame, VideoMetadata, MESH_POINT_COUNT};

#[derive(Debug, Clone, PartialEq)]
enum Call {
    Load(ModelOptions),
    Estimate,
    Image,
    Mirror(bool),
    BeginPath,
    MoveTo,
    LineTo,
    Quadratic,
    Bezier,
    ClosePath,
    Fill,
    Stroke,
    Points(usize),
    Render,
}

impl Call {
    fn is_drawing(&self) -> bool {
        matches!(
            self,
            Call::BeginPath
                | Call::MoveTo
                | Call::LineTo
                | Call::Quadratic
                | Call::Bezier
                | Call::ClosePath
                | Call::Fill
                | Call::Stroke
                | Call::Points(_)
        )
    }
}

type Log = Rc<RefCell<Vec<Call>>>;
// Called with the face cap the model was loaded with.
type Step = Box<dyn FnOnce(u32) -> Result<Vec<Prediction>, InferenceError>>;
type Script = Rc<RefCell<VecDeque<Step>>>;

struct MockCapture {
    fail_open: Option<CaptureError>,
}

#[async_trait(?Send)]
impl VideoCapture for MockCapture {
    fn name(&self) -> String {
        "mock".to_string()
    }

    async fn open(&mut self) -> Result<VideoMetadata, CaptureError> {
        match self.fail_open.take() {
            Some(e) => Err(e),
            None => Ok(VideoMetadata { width: 640, height: 480 }),
        }
    }

    fn capture(&mut self) -> Result<RgbFrame, CaptureError> {
        Ok(RgbFrame::new(4, 4))
    }
}

struct MockSource {
    log: Log,
    script: Script,
    fail_load: Rc<Cell<bool>>,
}

#[async_trait(?Send)]
impl LandmarkSource for MockSource {
    fn name(&self) -> String {
        "mock".to_string()
    }

    async fn load(&self, options: ModelOptions) -> Result<Box<dyn LandmarkModel>, ModelLoadError> {
        self.log.borrow_mut().push(Call::Load(options));
        if self.fail_load.get() {
            return Err(ModelLoadError("mock refuses".to_string()));
        }
        Ok(Box::new(MockModel {
            log: self.log.clone(),
            script: self.script.clone(),
            max_faces: options.max_faces,
        }))
    }
}

struct MockModel {
    log: Log,
    script: Script,
    max_faces: u32,
}

#[async_trait(?Send)]
impl LandmarkModel for MockModel {
    async fn estimate(&mut self, _frame: &RgbFrame) -> Result<Vec<Prediction>, InferenceError> {
        self.log.borrow_mut().push(Call::Estimate);
        let step = self.script.borrow_mut().pop_front();
        match step {
            Some(step) => step(self.max_faces),
            None => Ok(Vec::new()),
        }
    }
}

struct MockCanvas {
    log: Log,
}

impl Canvas2D for MockCanvas {
    fn draw_image(&mut self, _frame: &RgbFrame) {
        self.log.borrow_mut().push(Call::Image);
    }
    fn begin_path(&mut self) {
        self.log.borrow_mut().push(Call::BeginPath);
    }
    fn move_to(&mut self, _p: Point2D) {
        self.log.borrow_mut().push(Call::MoveTo);
    }
    fn line_to(&mut self, _p: Point2D) {
        self.log.borrow_mut().push(Call::LineTo);
    }
    fn quadratic_curve_to(&mut self, _c: Point2D, _p: Point2D) {
        self.log.borrow_mut().push(Call::Quadratic);
    }
    fn bezier_curve_to(&mut self, _c1: Point2D, _c2: Point2D, _p: Point2D) {
        self.log.borrow_mut().push(Call::Bezier);
    }
    fn close_path(&mut self) {
        self.log.borrow_mut().push(Call::ClosePath);
    }
    fn fill(&mut self) {
        self.log.borrow_mut().push(Call::Fill);
    }
    fn stroke(&mut self) {
        self.log.borrow_mut().push(Call::Stroke);
    }
    fn draw_points(&mut self, points: &[Point2D]) {
        self.log.borrow_mut().push(Call::Points(points.len()));
    }
    fn set_mirrored(&mut self, mirrored: bool) {
        self.log.borrow_mut().push(Call::Mirror(mirrored));
    }
}

struct MockRenderer {
    log: Log,
}

impl Renderer3D for MockRenderer {
    fn render(&mut self, _scene: &Scene, _camera: &PerspectiveCamera) {
        self.log.borrow_mut().push(Call::Render);
    }
}

struct Harness {
    log: Log,
    script: Script,
    fail_load: Rc<Cell<bool>>,
    overlay: RenderLoop<MockCanvas, MockRenderer>,
}

impl Harness {
    fn new(config: PipelineConfig) -> Self {
        Self::with_capture(config, MockCapture { fail_open: None })
    }

    fn with_capture(config: PipelineConfig, capture: MockCapture) -> Self {
        let log: Log = Rc::default();
        let script: Script = Rc::default();
        let fail_load = Rc::new(Cell::new(false));

        let mut scene = Scene::default();
        scene.add(SceneObject::new("leftear").with_scale(0.6));
        let target = SceneTarget::new(scene, PerspectiveCamera::default(), MockRenderer { log: log.clone() });
        let ctx = PipelineContext::new(MockCanvas { log: log.clone() }, Some(target));
        let source = MockSource {
            log: log.clone(),
            script: script.clone(),
            fail_load: fail_load.clone(),
        };

        let overlay = RenderLoop::new(ctx, Box::new(capture), Box::new(source), config);
        Self {
            log,
            script,
            fail_load,
            overlay,
        }
    }

    fn push(&self, step: impl FnOnce(u32) -> Result<Vec<Prediction>, InferenceError> + 'static) {
        self.script.borrow_mut().push_back(Box::new(step));
    }

    fn take_log(&self) -> Vec<Call> {
        std::mem::take(&mut *self.log.borrow_mut())
    }
}

fn face() -> Prediction {
    Prediction::new(vec![Point3D::default(); MESH_POINT_COUNT])
}

fn ear_anchor() -> AnchorSpec {
    AnchorSpec {
        object: "leftear".to_string(),
        landmark: landmarks::NOSE_TIP,
        offset: Point3D::new(320.0, 240.0, 0.0),
        scale: Point3D::new(1.0 / 75.0, 1.0 / 30.0, 0.0),
    }
}

#[tokio::test]
async fn zero_predictions_draw_video_then_render_only() {
    let mut h = Harness::new(PipelineConfig::default());
    h.overlay = h
        .overlay
        .with_overlays(overlays::presets(&overlays::PRESET_NAMES))
        .with_anchors(vec![ear_anchor()]);
    h.overlay.start().await.unwrap();
    h.take_log();

    let report = h.overlay.tick().await.unwrap();
    assert_eq!(report.predictions, 0);

    let calls: Vec<Call> = h
        .take_log()
        .into_iter()
        .filter(|c| matches!(c, Call::Image | Call::Render) || c.is_drawing())
        .collect();
    assert_eq!(calls, vec![Call::Image, Call::Render]);
}

#[tokio::test]
async fn empty_ticks_keep_running() {
    let mut h = Harness::new(PipelineConfig::default());
    h.overlay.start().await.unwrap();
    for _ in 0..3 {
        h.overlay.tick().await.unwrap();
        assert_eq!(h.overlay.state(), LoopState::Running);
    }
    let renders = h.take_log().iter().filter(|c| **c == Call::Render).count();
    assert_eq!(renders, 3);
}

#[tokio::test]
async fn start_walks_the_setup_states() {
    let mut h = Harness::new(PipelineConfig::default());
    assert_eq!(h.overlay.state(), LoopState::Uninitialized);
    assert!(matches!(h.overlay.tick().await, Err(TickError::NotRunning(LoopState::Uninitialized))));

    let video = h.overlay.start().await.unwrap();
    assert_eq!(video, VideoMetadata { width: 640, height: 480 });
    assert_eq!(h.overlay.context().video, Some(video));
    assert_eq!(h.overlay.state(), LoopState::Running);
    assert_eq!(
        h.take_log(),
        vec![Call::Load(ModelOptions {
            backend: ComputeBackend::Cpu,
            max_faces: 1
        })]
    );

    assert!(matches!(h.overlay.start().await, Err(SetupError::InvalidState(LoopState::Running))));
}

#[tokio::test]
async fn camera_failure_stops_the_loop() {
    let mut h = Harness::with_capture(
        PipelineConfig::default(),
        MockCapture {
            fail_open: Some(CaptureError::PermissionDenied("denied".to_string())),
        },
    );
    let err = h.overlay.start().await.unwrap_err();
    assert!(matches!(err, SetupError::Camera(CaptureError::PermissionDenied(_))));
    assert_eq!(h.overlay.state(), LoopState::Stopped);
    // The model is never requested without video.
    assert!(h.take_log().is_empty());
    assert!(matches!(h.overlay.tick().await, Err(TickError::NotRunning(LoopState::Stopped))));
}

#[tokio::test]
async fn model_failure_stops_the_loop() {
    let mut h = Harness::new(PipelineConfig::default());
    h.fail_load.set(true);
    let err = h.overlay.start().await.unwrap_err();
    assert!(matches!(err, SetupError::ModelLoad(_)));
    assert_eq!(h.overlay.state(), LoopState::Stopped);

    // Setup may be retried once the cause is gone.
    h.fail_load.set(false);
    h.overlay.start().await.unwrap();
    assert_eq!(h.overlay.state(), LoopState::Running);
}

#[tokio::test]
async fn face_cap_change_applies_from_the_next_tick() {
    let mut h = Harness::new(PipelineConfig::default());
    h.overlay.start().await.unwrap();
    h.take_log();

    let handle = h.overlay.handle();
    h.push(move |n| {
        handle.set_max_tracked_faces(3);
        Ok(vec![face(); n as usize])
    });
    h.push(|n| Ok(vec![face(); n as usize]));

    let first = h.overlay.tick().await.unwrap();
    assert!(!first.reloaded);
    assert_eq!(first.predictions, 1);
    assert_eq!(h.overlay.config().max_tracked_faces, 1);
    assert!(!h.take_log().iter().any(|c| matches!(c, Call::Load(_))));

    let second = h.overlay.tick().await.unwrap();
    assert!(second.reloaded);
    assert_eq!(second.predictions, 3);
    assert_eq!(h.overlay.config().max_tracked_faces, 3);

    let log = h.take_log();
    let load = log
        .iter()
        .position(|c| {
            *c == Call::Load(ModelOptions {
                backend: ComputeBackend::Cpu,
                max_faces: 3,
            })
        })
        .unwrap();
    let estimate = log.iter().position(|c| *c == Call::Estimate).unwrap();
    assert!(load < estimate);
}

#[tokio::test]
async fn failed_reload_keeps_previous_model() {
    let mut h = Harness::new(PipelineConfig::default());
    h.overlay.start().await.unwrap();
    h.fail_load.set(true);

    h.overlay.handle().set_backend(ComputeBackend::Cuda);
    let report = h.overlay.tick().await.unwrap();
    assert!(!report.reloaded);
    assert_eq!(h.overlay.config().backend, ComputeBackend::Cpu);
    assert!(h.take_log().contains(&Call::Estimate));

    // Nothing pending any more, so no retry next tick.
    h.overlay.tick().await.unwrap();
    assert!(!h.take_log().iter().any(|c| matches!(c, Call::Load(_))));
}

#[tokio::test]
async fn inference_error_skips_drawing_and_keeps_running() {
    let mut h = Harness::new(PipelineConfig::default());
    h.overlay.start().await.unwrap();
    h.take_log();

    h.push(|_| Err(InferenceError("boom".to_string())));
    let err = h.overlay.tick().await.unwrap_err();
    assert!(matches!(err, TickError::Inference(_)));
    assert_eq!(h.overlay.state(), LoopState::Running);

    let log = h.take_log();
    assert!(!log.contains(&Call::Image));
    assert!(!log.contains(&Call::Render));

    h.overlay.tick().await.unwrap();
    assert!(h.take_log().contains(&Call::Render));
}

#[tokio::test]
async fn eye_region_traces_curve_then_lines() {
    let mut h = Harness::new(PipelineConfig::default());
    h.overlay = h
        .overlay
        .with_overlays(overlays::presets(&[overlays::LEFT_EYE_REGION]));
    h.overlay.start().await.unwrap();
    h.take_log();

    h.push(|_| Ok(vec![face()]));
    let report = h.overlay.tick().await.unwrap();
    assert_eq!(report.overlays_drawn, 1);

    let mut expected = vec![Call::Image, Call::BeginPath, Call::MoveTo, Call::Bezier];
    expected.extend(std::iter::repeat(Call::LineTo).take(13));
    expected.extend([Call::ClosePath, Call::Fill, Call::Stroke, Call::Render]);

    let calls: Vec<Call> = h
        .take_log()
        .into_iter()
        .filter(|c| matches!(c, Call::Image | Call::Render) || c.is_drawing())
        .collect();
    assert_eq!(calls, expected);
}

#[tokio::test]
async fn overlays_toggle_off_at_snapshot() {
    let mut h = Harness::new(PipelineConfig::default());
    h.overlay = h
        .overlay
        .with_overlays(overlays::presets(&[overlays::NECK_GUIDE]));
    h.overlay.start().await.unwrap();
    h.take_log();

    h.overlay.handle().set_overlay_enabled(false);
    h.overlay.handle().set_mirror(false);
    h.push(|_| Ok(vec![face()]));
    let report = h.overlay.tick().await.unwrap();
    assert_eq!(report.overlays_drawn, 0);

    let log = h.take_log();
    assert_eq!(log.first(), Some(&Call::Mirror(false)));
    assert!(!log.iter().any(Call::is_drawing));
}

#[tokio::test]
async fn point_cloud_draws_every_point() {
    let config = PipelineConfig {
        overlay_enabled: false,
        point_cloud_enabled: true,
        ..PipelineConfig::default()
    };
    let mut h = Harness::new(config);
    h.overlay.start().await.unwrap();
    h.take_log();

    h.push(|_| Ok(vec![face(), face()]));
    h.overlay.tick().await.unwrap();
    assert!(h.take_log().contains(&Call::Points(2 * MESH_POINT_COUNT)));
}

#[tokio::test]
async fn short_prediction_disables_only_that_overlay() {
    let far = OverlaySpec::new("far", vec![PathSpec::starting_at(landmarks::RIGHT_EYE_OUTER).line_to(landmarks::NOSE_TIP)]);
    let near = OverlaySpec::new("near", vec![PathSpec::starting_at(landmarks::NOSE_TIP).line_to(landmarks::CENTER)]);

    let mut h = Harness::new(PipelineConfig::default());
    h.overlay = h.overlay.with_overlays(vec![far, near]);
    h.overlay.start().await.unwrap();

    h.push(|_| Ok(vec![Prediction::new(vec![Point3D::default(); 10])]));
    let report = h.overlay.tick().await.unwrap();
    assert_eq!(report.violations.len(), 1);
    assert_eq!(report.violations[0].item, "far");
    assert_eq!(report.violations[0].required, landmarks::RIGHT_EYE_OUTER.index);
    assert_eq!(report.violations[0].available, 10);
    assert_eq!(report.overlays_drawn, 1);
    assert_eq!(h.overlay.overlay_enabled("far"), Some(false));
    assert_eq!(h.overlay.overlay_enabled("near"), Some(true));
    assert_eq!(h.overlay.state(), LoopState::Running);

    // Stays off even once predictions are long enough again.
    h.take_log();
    h.push(|_| Ok(vec![face()]));
    let report = h.overlay.tick().await.unwrap();
    assert!(report.violations.is_empty());
    assert_eq!(report.overlays_drawn, 1);
    assert_eq!(h.take_log().iter().filter(|c| **c == Call::BeginPath).count(), 1);
}

#[tokio::test]
async fn anchor_moves_scene_object() {
    let mut h = Harness::new(PipelineConfig::default());
    h.overlay = h.overlay.with_anchors(vec![ear_anchor()]);
    h.overlay.start().await.unwrap();

    h.push(|_| {
        let mut p = face();
        p.points[1] = Point3D::new(100.0, 50.0, 0.0);
        Ok(vec![p])
    });
    let report = h.overlay.tick().await.unwrap();
    assert_eq!(report.anchors_applied, 1);

    let scene = &h.overlay.context().scene.as_ref().unwrap().scene;
    let ear = scene.object("leftear").unwrap();
    approx::assert_relative_eq!(ear.position.x, 5.6, epsilon = 1e-4);
    approx::assert_relative_eq!(ear.position.y, 9.6667, epsilon = 1e-3);
    approx::assert_relative_eq!(ear.position.z, 0.0);
    approx::assert_relative_eq!(ear.scale, 0.6);
}

#[tokio::test]
async fn anchor_without_landmark_is_disabled() {
    let mut h = Harness::new(PipelineConfig::default());
    h.overlay = h.overlay.with_anchors(vec![ear_anchor()]);
    h.overlay.start().await.unwrap();

    h.push(|_| Ok(vec![Prediction::new(vec![Point3D::new(1.0, 1.0, 0.0)])]));
    let report = h.overlay.tick().await.unwrap();
    assert_eq!(report.anchors_applied, 0);
    assert_eq!(report.violations.len(), 1);
    assert_eq!(h.overlay.anchor_enabled("leftear"), Some(false));

    let scene = &h.overlay.context().scene.as_ref().unwrap().scene;
    assert_eq!(scene.object("leftear").unwrap().position, Point3D::default());
}
