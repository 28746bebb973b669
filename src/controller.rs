//! The render loop: capture, infer, draw, render, reschedule.
//!
//! All pipeline state lives in [`RenderLoop`] and its [`PipelineContext`];
//! nothing is global. Ticks never overlap: the next one is only scheduled
//! after the previous render has returned.

use std::ops::ControlFlow;
use std::time::{Duration, Instant};

use tokio::time::MissedTickBehavior;

use crate::anchor::AnchorSpec;
use crate::camera::VideoCapture;
use crate::control::{ConfigHandle, ConfigStore, PipelineConfig};
use crate::error::{ContractViolation, SetupError, TickError};
use crate::geometry::{build_overlay, to_surface, OverlaySpec};
use crate::output::{trace_path, Canvas2D};
use crate::pipeline::{LandmarkModel, LandmarkSource};
use crate::scene::{Renderer3D, SceneTarget};
use crate::stats::FrameStats;
use crate::types::{Point2D, Prediction, VideoMetadata};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopState {
    Uninitialized,
    AwaitingCamera,
    AwaitingModel,
    Running,
    /// Terminal after a setup failure; `start` may be called again.
    Stopped,
}

/// Presentation targets handed in by the application.
pub struct PipelineContext<C, R> {
    pub canvas: C,
    pub scene: Option<SceneTarget<R>>,
    pub video: Option<VideoMetadata>,
}

impl<C, R> PipelineContext<C, R> {
    pub fn new(canvas: C, scene: Option<SceneTarget<R>>) -> Self {
        Self {
            canvas,
            scene,
            video: None,
        }
    }
}

struct Slot<T> {
    spec: T,
    enabled: bool,
}

impl<T> Slot<T> {
    fn new(spec: T) -> Self {
        Self { spec, enabled: true }
    }
}

/// What one tick did.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TickReport {
    pub predictions: usize,
    pub overlays_drawn: usize,
    pub anchors_applied: usize,
    pub violations: Vec<ContractViolation>,
    pub reloaded: bool,
}

pub struct RenderLoop<C, R> {
    state: LoopState,
    ctx: PipelineContext<C, R>,
    capture: Box<dyn VideoCapture>,
    source: Box<dyn LandmarkSource>,
    model: Option<Box<dyn LandmarkModel>>,
    store: ConfigStore,
    overlays: Vec<Slot<OverlaySpec>>,
    anchors: Vec<Slot<AnchorSpec>>,
    stats: FrameStats,
}

impl<C: Canvas2D, R: Renderer3D> RenderLoop<C, R> {
    pub fn new(
        ctx: PipelineContext<C, R>,
        capture: Box<dyn VideoCapture>,
        source: Box<dyn LandmarkSource>,
        config: PipelineConfig,
    ) -> Self {
        Self {
            state: LoopState::Uninitialized,
            ctx,
            capture,
            source,
            model: None,
            store: ConfigStore::new(config),
            overlays: Vec::new(),
            anchors: Vec::new(),
            stats: FrameStats::new(Duration::from_secs(1)),
        }
    }

    pub fn with_overlays(mut self, overlays: Vec<OverlaySpec>) -> Self {
        self.overlays = overlays.into_iter().map(Slot::new).collect();
        self
    }

    pub fn with_anchors(mut self, anchors: Vec<AnchorSpec>) -> Self {
        self.anchors = anchors.into_iter().map(Slot::new).collect();
        self
    }

    pub fn state(&self) -> LoopState {
        self.state
    }

    /// Sender for runtime config changes.
    pub fn handle(&self) -> ConfigHandle {
        self.store.handle()
    }

    /// Config as of the last snapshot (plus nothing queued since).
    pub fn config(&self) -> PipelineConfig {
        self.store.current()
    }

    pub fn context(&self) -> &PipelineContext<C, R> {
        &self.ctx
    }

    pub fn context_mut(&mut self) -> &mut PipelineContext<C, R> {
        &mut self.ctx
    }

    /// `Some(enabled)` for a configured overlay.
    pub fn overlay_enabled(&self, name: &str) -> Option<bool> {
        self.overlays
            .iter()
            .find(|s| s.spec.name == name)
            .map(|s| s.enabled)
    }

    pub fn anchor_enabled(&self, object: &str) -> Option<bool> {
        self.anchors
            .iter()
            .find(|s| s.spec.object == object)
            .map(|s| s.enabled)
    }

    fn stop(&mut self, err: SetupError) -> SetupError {
        log::error!("Pipeline setup failed: {}", err);
        self.state = LoopState::Stopped;
        self.model = None;
        err
    }

    /// Attach the camera, then load the landmark model. On failure the loop
    /// is `Stopped` and the error is returned once.
    pub async fn start(&mut self) -> Result<VideoMetadata, SetupError> {
        if !matches!(self.state, LoopState::Uninitialized | LoopState::Stopped) {
            return Err(SetupError::InvalidState(self.state));
        }

        self.state = LoopState::AwaitingCamera;
        let video = match self.capture.open().await {
            Ok(v) => v,
            Err(e) => return Err(self.stop(e.into())),
        };
        log::info!("Video attached: {} ({}x{})", self.capture.name(), video.width, video.height);
        self.ctx.video = Some(video);

        self.state = LoopState::AwaitingModel;
        self.store.drain();
        let options = self.store.current().model_options();
        match self.source.load(options).await {
            Ok(model) => {
                self.model = Some(model);
                self.store.reload_resolved(options);
            }
            Err(e) => return Err(self.stop(e.into())),
        }
        log::info!("Active source: {}", self.source.name());

        self.state = LoopState::Running;
        Ok(video)
    }

    /// Apply queued config changes and reload the model if they require it.
    /// Runs before any inference of the tick.
    async fn snapshot(&mut self) -> (PipelineConfig, bool) {
        self.store.drain();
        let mut reloaded = false;
        if let Some(options) = self.store.pending_reload() {
            log::info!(
                "Reloading landmark model (backend {}, max faces {})",
                options.backend,
                options.max_faces
            );
            match self.source.load(options).await {
                Ok(model) => {
                    // The old model is dropped here; nothing of it is in flight.
                    self.model = Some(model);
                    self.store.reload_resolved(options);
                    reloaded = true;
                }
                Err(e) => {
                    log::warn!("{}; keeping the previous model", e);
                    self.store.reload_failed();
                }
            }
        }
        (self.store.current(), reloaded)
    }

    pub async fn tick(&mut self) -> Result<TickReport, TickError> {
        if self.state != LoopState::Running {
            return Err(TickError::NotRunning(self.state));
        }
        let started = Instant::now();

        // 1. snapshot
        let (config, reloaded) = self.snapshot().await;
        self.ctx.canvas.set_mirrored(config.mirror);

        // 2. infer
        let frame = self.capture.capture()?;
        let Some(model) = self.model.as_mut() else {
            return Err(TickError::NotRunning(self.state));
        };
        let predictions = model.estimate(&frame).await?;

        // 3. video
        self.ctx.canvas.draw_image(&frame);

        // 4. overlays, anchors, point cloud
        let mut report = TickReport {
            predictions: predictions.len(),
            reloaded,
            ..TickReport::default()
        };
        if !predictions.is_empty() {
            if config.overlay_enabled {
                self.draw_overlays(&predictions, &mut report);
                self.apply_anchors(&predictions[0], &mut report);
            }
            if config.point_cloud_enabled {
                let points: Vec<Point2D> = predictions
                    .iter()
                    .flat_map(|p| p.points.iter().map(|&pt| to_surface(pt)))
                    .collect();
                self.ctx.canvas.draw_points(&points);
            }
        }

        // 5. 3D
        if let Some(scene) = self.ctx.scene.as_mut() {
            scene.render();
        }

        if let Some(r) = self.stats.record(started.elapsed()) {
            log::info!("{:.1} fps, {:.2} ms/tick", r.fps, r.mean_tick_ms);
        }
        Ok(report)
    }

    fn draw_overlays(&mut self, predictions: &[Prediction], report: &mut TickReport) {
        for slot in self.overlays.iter_mut().filter(|s| s.enabled) {
            for prediction in predictions {
                match build_overlay(prediction, &slot.spec) {
                    Ok(geometry) => {
                        for path in &geometry.paths {
                            trace_path(&mut self.ctx.canvas, path);
                        }
                        report.overlays_drawn += 1;
                    }
                    Err(v) => {
                        log::warn!("{}; disabling overlay", v);
                        slot.enabled = false;
                        report.violations.push(v);
                        break;
                    }
                }
            }
        }
    }

    fn apply_anchors(&mut self, prediction: &Prediction, report: &mut TickReport) {
        let Some(target) = self.ctx.scene.as_mut() else {
            return;
        };
        for slot in self.anchors.iter_mut().filter(|s| s.enabled) {
            let position = match slot.spec.resolve(prediction) {
                Ok(p) => p,
                Err(v) => {
                    log::warn!("{}; disabling anchor", v);
                    slot.enabled = false;
                    report.violations.push(v);
                    continue;
                }
            };
            match target.scene.object_mut(&slot.spec.object) {
                Some(object) => {
                    object.position = position;
                    report.anchors_applied += 1;
                }
                None => {
                    log::warn!("No scene object named '{}'; disabling anchor", slot.spec.object);
                    slot.enabled = false;
                }
            }
        }
    }

    /// Start if needed, then tick at up to `fps` until `on_frame` breaks.
    /// `on_frame` runs after each tick's render, before the next is
    /// scheduled. Per-tick failures are logged and the loop carries on.
    pub async fn run<F>(&mut self, fps: u32, mut on_frame: F) -> Result<(), SetupError>
    where
        F: FnMut(&mut Self) -> ControlFlow<()>,
    {
        if self.state != LoopState::Running {
            self.start().await?;
        }

        let mut interval = tokio::time::interval(Duration::from_secs_f64(1.0 / fps.max(1) as f64));
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            interval.tick().await;
            if let Err(e) = self.tick().await {
                log::warn!("Tick failed: {}", e);
            }
            if on_frame(self).is_break() {
                return Ok(());
            }
        }
    }
}
