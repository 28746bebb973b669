use anyhow::{Context, Result};
use clap::Parser;
use colored::*;
use std::ops::ControlFlow;
use std::path::Path;

mod args;

use args::Args;
use rusty_overlay::camera::VideoCapture;
use rusty_overlay::config::{parse_hex, AppConfig};
use rusty_overlay::control::PipelineConfig;
use rusty_overlay::controller::{PipelineContext, RenderLoop};
use rusty_overlay::output::{CanvasStyle, FrameCanvas};
use rusty_overlay::overlays;
use rusty_overlay::pipeline::{LandmarkSource, SyntheticSource};
use rusty_overlay::scene::{PerspectiveCamera, Scene, SceneObject, SceneTarget, SoftwareRenderer};
use rusty_overlay::types::VideoMetadata;

type Overlay = RenderLoop<FrameCanvas, SoftwareRenderer>;

#[cfg(not(feature = "window"))]
const DEFAULT_HEADLESS_FRAMES: u32 = 120;

#[cfg(feature = "camera")]
fn open_capture(args: &Args) -> Box<dyn VideoCapture> {
    Box::new(rusty_overlay::camera::CameraSource::new(args.cam_index))
}

#[cfg(not(feature = "camera"))]
fn open_capture(_args: &Args) -> Box<dyn VideoCapture> {
    log::warn!("Built without camera support. Using a synthetic 640x480 feed.");
    Box::new(rusty_overlay::camera::SyntheticCamera::new(640, 480))
}

fn landmark_source(config: &AppConfig) -> Box<dyn LandmarkSource> {
    #[cfg(feature = "onnx")]
    {
        let source = rusty_overlay::inference::FaceMeshSource::new(
            &config.models.face_mesh,
            &config.models.face_detection,
        );
        if source.available() {
            return Box::new(source);
        }
        log::warn!("Face Mesh not found at {}. Using synthetic landmarks.", config.models.face_mesh);
    }
    #[cfg(not(feature = "onnx"))]
    let _ = config;
    Box::new(SyntheticSource::new())
}

fn list_cameras() -> Result<()> {
    #[cfg(feature = "camera")]
    {
        let cameras = nokhwa::query(nokhwa::utils::ApiBackend::Auto)?;
        println!("Available Cameras:");
        println!("{:<5} | {:<30} | {:<10}", "Index", "Name", "Misc");
        println!("{}", "-".repeat(60));
        for cam in cameras {
            println!("{:<5} | {:<30} | {:?}", cam.index(), cam.human_name(), cam.misc());
        }
    }
    #[cfg(not(feature = "camera"))]
    println!("{}", "Built without the `camera` feature; no devices to list.".yellow());
    Ok(())
}

fn canvas_style(config: &AppConfig) -> CanvasStyle {
    CanvasStyle {
        fill: parse_hex(&config.ui.fill_color_hex),
        stroke: parse_hex(&config.ui.stroke_color_hex),
        line_width: config.ui.line_width,
        point_size: config.ui.point_size,
    }
}

/// The 3D layer: one prop per anchor, viewed from z = 20.
fn build_scene(config: &AppConfig, video: VideoMetadata) -> SceneTarget<SoftwareRenderer> {
    let mut scene = Scene::default();
    if config.anchor.enabled {
        scene.add(SceneObject::new(&config.anchor.object).with_scale(config.anchor.object_scale));
    }
    let camera = PerspectiveCamera {
        aspect: video.width as f32 / video.height.max(1) as f32,
        ..PerspectiveCamera::default()
    };
    SceneTarget::new(scene, camera, SoftwareRenderer::new(video.width, video.height))
}

fn apply_overrides(args: &Args, mut config: PipelineConfig) -> PipelineConfig {
    if let Some(backend) = args.backend {
        config.backend = backend;
    }
    if let Some(n) = args.max_faces {
        config.max_tracked_faces = n;
    }
    if let Some(mirror) = args.mirror {
        config.mirror = mirror;
    }
    config.clamped()
}

/// Blend the 3D layer over the 2D canvas.
fn composite(overlay: &mut Overlay) {
    let PipelineContext { canvas, scene, .. } = overlay.context_mut();
    if let Some(target) = scene {
        canvas.composite(target.renderer.layer());
    }
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();

    if args.list {
        return list_cameras();
    }

    let config = AppConfig::load(&args.config)?;
    let pipeline_config = apply_overrides(&args, config.pipeline.to_pipeline_config());

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_time()
        .build()?;
    runtime.block_on(run(args, config, pipeline_config))
}

async fn run(args: Args, config: AppConfig, pipeline_config: PipelineConfig) -> Result<()> {
    let style = canvas_style(&config);
    let ctx: PipelineContext<FrameCanvas, SoftwareRenderer> = PipelineContext::new(FrameCanvas::new(1, 1, style), None);

    let anchors = overlays::anchor_from_config(&config.anchor).into_iter().collect();
    let mut overlay = RenderLoop::new(ctx, open_capture(&args), landmark_source(&config), pipeline_config)
        .with_overlays(overlays::presets(&config.overlays.presets))
        .with_anchors(anchors);

    let video = overlay.start().await?;
    {
        // Size the surfaces to the stream now that it is known.
        let ctx = overlay.context_mut();
        ctx.canvas = FrameCanvas::new(video.width, video.height, style);
        ctx.scene = Some(build_scene(&config, video));
    }

    let fps = config.ui.target_fps;
    println!("{}", "Starting Pipeline...".green());

    if let Some(frames) = args.headless {
        return run_headless(&mut overlay, frames, fps, args.snapshot.as_deref()).await;
    }

    #[cfg(feature = "window")]
    return run_window(&mut overlay, video, fps).await;

    #[cfg(not(feature = "window"))]
    {
        log::warn!("Built without the `window` feature. Running {} headless frames.", DEFAULT_HEADLESS_FRAMES);
        run_headless(&mut overlay, DEFAULT_HEADLESS_FRAMES, fps, args.snapshot.as_deref()).await
    }
}

async fn run_headless(overlay: &mut Overlay, frames: u32, fps: u32, snapshot: Option<&Path>) -> Result<()> {
    let mut remaining = frames.max(1);
    overlay
        .run(fps, |_| {
            remaining -= 1;
            if remaining == 0 {
                ControlFlow::Break(())
            } else {
                ControlFlow::Continue(())
            }
        })
        .await?;

    if let Some(path) = snapshot {
        composite(overlay);
        overlay
            .context()
            .canvas
            .to_image()
            .save(path)
            .with_context(|| format!("saving snapshot to {}", path.display()))?;
        println!("{}", format!("Saved snapshot to {}", path.display()).green());
    }
    Ok(())
}

#[cfg(feature = "window")]
async fn run_window(overlay: &mut Overlay, video: VideoMetadata, fps: u32) -> Result<()> {
    use minifb::Key;
    use rusty_overlay::output::WindowOutput;

    let mut window = WindowOutput::new("Rusty Overlay", video.width as usize, video.height as usize, fps)?;
    let handle = overlay.handle();
    let mut window_error = None;

    println!("Controls: [1] Overlays [2] Point Cloud [5] Mirror [Up/Down] Max Faces [B] Backend [Esc] Quit");

    overlay
        .run(fps, |overlay| {
            composite(overlay);
            if let Err(e) = window.update(&overlay.context().canvas) {
                window_error = Some(e);
                return ControlFlow::Break(());
            }
            if !window.is_open() {
                return ControlFlow::Break(());
            }

            let config = overlay.config();
            for key in window.keys_pressed() {
                match key {
                    Key::Escape => return ControlFlow::Break(()),
                    Key::Key1 => handle.set_overlay_enabled(!config.overlay_enabled),
                    Key::Key2 => handle.set_point_cloud_enabled(!config.point_cloud_enabled),
                    Key::Key5 => handle.set_mirror(!config.mirror),
                    Key::Up => handle.set_max_tracked_faces(config.max_tracked_faces + 1),
                    Key::Down => handle.set_max_tracked_faces(config.max_tracked_faces.saturating_sub(1)),
                    Key::B => {
                        let next = config.backend.cycle();
                        println!("Switching backend to {}", next);
                        handle.set_backend(next);
                    }
                    _ => {}
                }
            }
            ControlFlow::Continue(())
        })
        .await?;

    match window_error {
        Some(e) => Err(e),
        None => Ok(()),
    }
}
