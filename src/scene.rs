//! Minimal 3D target: named objects with a mutable position, a perspective
//! camera and a renderer that draws the scene into a transparent layer.

use crate::types::Point3D;

#[derive(Debug, Clone, PartialEq)]
pub struct SceneObject {
    pub name: String,
    pub position: Point3D,
    pub scale: f32,
    /// Radius in scene units before `scale`.
    pub radius: f32,
    pub color: (u8, u8, u8),
}

impl SceneObject {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            position: Point3D::default(),
            scale: 1.0,
            radius: 1.0,
            color: (0xC4, 0xC4, 0xC4),
        }
    }

    pub fn with_scale(mut self, scale: f32) -> Self {
        self.scale = scale;
        self
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Scene {
    pub objects: Vec<SceneObject>,
}

impl Scene {
    pub fn add(&mut self, object: SceneObject) {
        self.objects.push(object);
    }

    pub fn object(&self, name: &str) -> Option<&SceneObject> {
        self.objects.iter().find(|o| o.name == name)
    }

    pub fn object_mut(&mut self, name: &str) -> Option<&mut SceneObject> {
        self.objects.iter_mut().find(|o| o.name == name)
    }
}

/// Camera on the +z axis looking toward -z.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PerspectiveCamera {
    pub position: Point3D,
    /// Vertical field of view in degrees.
    pub fov: f32,
    pub aspect: f32,
    pub near: f32,
}

impl Default for PerspectiveCamera {
    fn default() -> Self {
        Self {
            position: Point3D::new(0.0, 0.0, 20.0),
            fov: 50.0,
            aspect: 1.0,
            near: 0.1,
        }
    }
}

/// Screen-space result of projecting one object.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Projected {
    pub x: f32,
    pub y: f32,
    pub radius: f32,
    pub depth: f32,
}

impl PerspectiveCamera {
    /// Project a world point onto a `width` x `height` viewport. `None` if it
    /// sits behind the near plane.
    pub fn project(&self, p: Point3D, world_radius: f32, width: u32, height: u32) -> Option<Projected> {
        let depth = self.position.z - p.z;
        if depth <= self.near {
            return None;
        }
        let half_h = depth * (self.fov.to_radians() / 2.0).tan();
        let half_w = half_h * self.aspect;
        let ndc_x = (p.x - self.position.x) / half_w;
        let ndc_y = (p.y - self.position.y) / half_h;
        Some(Projected {
            x: (ndc_x + 1.0) / 2.0 * width as f32,
            y: (1.0 - ndc_y) / 2.0 * height as f32,
            radius: world_radius / half_h * height as f32 / 2.0,
            depth,
        })
    }
}

pub trait Renderer3D {
    fn render(&mut self, scene: &Scene, camera: &PerspectiveCamera);
}

/// The scene/camera/renderer triple owned by the application and handed to
/// the render loop.
pub struct SceneTarget<R> {
    pub scene: Scene,
    pub camera: PerspectiveCamera,
    pub renderer: R,
}

impl<R: Renderer3D> SceneTarget<R> {
    pub fn new(scene: Scene, camera: PerspectiveCamera, renderer: R) -> Self {
        Self {
            scene,
            camera,
            renderer,
        }
    }

    pub fn render(&mut self) {
        self.renderer.render(&self.scene, &self.camera);
    }
}

/// Draws every object as a shaded disc into an RGBA layer that starts
/// fully transparent each frame.
pub struct SoftwareRenderer {
    width: u32,
    height: u32,
    layer: Vec<u8>,
}

impl SoftwareRenderer {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            layer: vec![0; (width * height * 4) as usize],
        }
    }

    /// RGBA8, row-major.
    pub fn layer(&self) -> &[u8] {
        &self.layer
    }

    fn disc(&mut self, p: Projected, color: (u8, u8, u8)) {
        let r = p.radius.max(1.0);
        let x0 = (p.x - r).floor().max(0.0) as i64;
        let y0 = (p.y - r).floor().max(0.0) as i64;
        let x1 = ((p.x + r).ceil() as i64).min(self.width as i64 - 1);
        let y1 = ((p.y + r).ceil() as i64).min(self.height as i64 - 1);
        for y in y0..=y1 {
            for x in x0..=x1 {
                let dx = x as f32 + 0.5 - p.x;
                let dy = y as f32 + 0.5 - p.y;
                let d2 = (dx * dx + dy * dy) / (r * r);
                if d2 > 1.0 {
                    continue;
                }
                // Lambert-ish falloff toward the rim.
                let shade = 0.4 + 0.6 * (1.0 - d2).sqrt();
                let idx = ((y as u32 * self.width + x as u32) * 4) as usize;
                self.layer[idx] = (color.0 as f32 * shade) as u8;
                self.layer[idx + 1] = (color.1 as f32 * shade) as u8;
                self.layer[idx + 2] = (color.2 as f32 * shade) as u8;
                self.layer[idx + 3] = 255;
            }
        }
    }
}

impl Renderer3D for SoftwareRenderer {
    fn render(&mut self, scene: &Scene, camera: &PerspectiveCamera) {
        self.layer.fill(0);
        let mut projected: Vec<_> = scene
            .objects
            .iter()
            .filter_map(|o| {
                camera
                    .project(o.position, o.radius * o.scale, self.width, self.height)
                    .map(|p| (p, o.color))
            })
            .collect();
        // Far to near so closer objects win.
        projected.sort_by(|a, b| b.0.depth.total_cmp(&a.0.depth));
        for (p, color) in projected {
            self.disc(p, color);
        }
    }
}
