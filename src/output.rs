use crate::geometry::{BuiltPath, PathCommand};
use crate::types::{Point2D, RgbFrame};

/// 2D drawing target, in the vocabulary of a canvas context.
pub trait Canvas2D {
    fn draw_image(&mut self, frame: &RgbFrame);
    fn begin_path(&mut self);
    fn move_to(&mut self, p: Point2D);
    fn line_to(&mut self, p: Point2D);
    fn quadratic_curve_to(&mut self, c: Point2D, p: Point2D);
    fn bezier_curve_to(&mut self, c1: Point2D, c2: Point2D, p: Point2D);
    fn close_path(&mut self);
    fn fill(&mut self);
    fn stroke(&mut self);
    fn draw_points(&mut self, points: &[Point2D]);
    /// Mirror the video horizontally from the next `draw_image` on.
    fn set_mirrored(&mut self, mirrored: bool);
}

/// Issue one built path against a canvas.
///
/// Runs of curve points are consumed three at a time as a cubic bezier
/// (control, control, end); a trailing pair becomes a quadratic and a lone
/// point a line.
pub fn trace_path<C: Canvas2D + ?Sized>(canvas: &mut C, path: &BuiltPath) {
    canvas.begin_path();
    let mut curve: Vec<Point2D> = Vec::with_capacity(3);
    let flush = |canvas: &mut C, curve: &mut Vec<Point2D>| {
        match curve.as_slice() {
            [] => {}
            [p] => canvas.line_to(*p),
            [c, p] => canvas.quadratic_curve_to(*c, *p),
            _ => {}
        }
        curve.clear();
    };

    for cmd in &path.commands {
        match *cmd {
            PathCommand::CurveTo(p) => {
                curve.push(p);
                if curve.len() == 3 {
                    canvas.bezier_curve_to(curve[0], curve[1], curve[2]);
                    curve.clear();
                }
            }
            PathCommand::MoveTo(p) => {
                flush(canvas, &mut curve);
                canvas.move_to(p);
            }
            PathCommand::LineTo(p) => {
                flush(canvas, &mut curve);
                canvas.line_to(p);
            }
        }
    }
    flush(canvas, &mut curve);

    if path.close {
        canvas.close_path();
    }
    if path.fill {
        canvas.fill();
    }
    if path.stroke {
        canvas.stroke();
    }
}

/// Affine map `(a*x + c*y + e, b*x + d*y + f)`, as in `setTransform`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Transform2D {
    pub a: f32,
    pub b: f32,
    pub c: f32,
    pub d: f32,
    pub e: f32,
    pub f: f32,
}

impl Transform2D {
    pub const IDENTITY: Transform2D = Transform2D {
        a: 1.0,
        b: 0.0,
        c: 0.0,
        d: 1.0,
        e: 0.0,
        f: 0.0,
    };

    /// Map overlay coordinates (negated video pixels) onto the preview.
    /// Mirrored: `(u, v) -> (width + u, -v)`, which lands a landmark at
    /// `(width - x, y)` like the flipped video. Unmirrored: `(-u, -v)`.
    pub fn overlay_view(width: u32, mirrored: bool) -> Self {
        if mirrored {
            Transform2D {
                a: 1.0,
                d: -1.0,
                e: width as f32,
                ..Self::IDENTITY
            }
        } else {
            Transform2D {
                a: -1.0,
                d: -1.0,
                ..Self::IDENTITY
            }
        }
    }

    pub fn apply(&self, p: Point2D) -> Point2D {
        Point2D::new(
            self.a * p.x + self.c * p.y + self.e,
            self.b * p.x + self.d * p.y + self.f,
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CanvasStyle {
    pub fill: (u8, u8, u8),
    pub stroke: (u8, u8, u8),
    pub line_width: f32,
    pub point_size: f32,
}

impl Default for CanvasStyle {
    fn default() -> Self {
        Self {
            fill: (0x32, 0xEE, 0xDB),
            stroke: (0x32, 0xEE, 0xDB),
            line_width: 0.5,
            point_size: 2.0,
        }
    }
}

const CURVE_SEGMENTS: usize = 16;

/// Software canvas over an RGB8 buffer.
pub struct FrameCanvas {
    width: usize,
    height: usize,
    buffer: Vec<u8>,
    style: CanvasStyle,
    transform: Transform2D,
    mirrored: bool,
    // Sub-paths in device pixels.
    subpaths: Vec<Vec<Point2D>>,
    closed: Vec<bool>,
}

impl FrameCanvas {
    pub fn new(width: u32, height: u32, style: CanvasStyle) -> Self {
        Self {
            width: width as usize,
            height: height as usize,
            buffer: vec![0; width as usize * height as usize * 3],
            style,
            transform: Transform2D::IDENTITY,
            mirrored: false,
            subpaths: Vec::new(),
            closed: Vec::new(),
        }
    }

    /// RGB8, row-major.
    pub fn buffer(&self) -> &[u8] {
        &self.buffer
    }

    pub fn pixel(&self, x: usize, y: usize) -> Option<(u8, u8, u8)> {
        if x >= self.width || y >= self.height {
            return None;
        }
        let idx = (y * self.width + x) * 3;
        Some((self.buffer[idx], self.buffer[idx + 1], self.buffer[idx + 2]))
    }

    fn put(&mut self, x: i64, y: i64, color: (u8, u8, u8)) {
        if x < 0 || y < 0 || x as usize >= self.width || y as usize >= self.height {
            return;
        }
        let idx = (y as usize * self.width + x as usize) * 3;
        self.buffer[idx] = color.0;
        self.buffer[idx + 1] = color.1;
        self.buffer[idx + 2] = color.2;
    }

    fn last_point(&self) -> Option<Point2D> {
        self.subpaths.last().and_then(|s| s.last().copied())
    }

    fn push_device(&mut self, p: Point2D) {
        match self.subpaths.last_mut() {
            Some(s) => s.push(p),
            None => {
                self.subpaths.push(vec![p]);
                self.closed.push(false);
            }
        }
    }

    fn draw_segment(&mut self, from: Point2D, to: Point2D, color: (u8, u8, u8)) {
        let half = (self.style.line_width.max(1.0) / 2.0).floor() as i64;
        let len = (to.x - from.x).abs().max((to.y - from.y).abs()).max(1.0);
        let steps = len.ceil() as usize;
        for i in 0..=steps {
            let p = from.lerp(to, i as f32 / steps as f32);
            let (px, py) = (p.x.round() as i64, p.y.round() as i64);
            for dy in -half..=half {
                for dx in -half..=half {
                    self.put(px + dx, py + dy, color);
                }
            }
        }
    }

    /// Blend an RGBA layer of the same size over the canvas.
    pub fn composite(&mut self, layer: &[u8]) {
        for (dst, src) in self.buffer.chunks_exact_mut(3).zip(layer.chunks_exact(4)) {
            let a = src[3] as u32;
            if a == 0 {
                continue;
            }
            for c in 0..3 {
                dst[c] = ((src[c] as u32 * a + dst[c] as u32 * (255 - a)) / 255) as u8;
            }
        }
    }

    pub fn to_image(&self) -> RgbFrame {
        RgbFrame::from_raw(self.width as u32, self.height as u32, self.buffer.clone())
            .unwrap_or_else(|| RgbFrame::new(self.width as u32, self.height as u32))
    }
}

impl Canvas2D for FrameCanvas {
    fn draw_image(&mut self, frame: &RgbFrame) {
        let frame = if frame.width() as usize != self.width || frame.height() as usize != self.height {
            image::imageops::resize(
                frame,
                self.width as u32,
                self.height as u32,
                image::imageops::FilterType::Triangle,
            )
        } else {
            frame.clone()
        };
        let mut frame = frame;
        if self.mirrored {
            image::imageops::flip_horizontal_in_place(&mut frame);
        }
        self.buffer.copy_from_slice(frame.as_raw());
    }

    fn begin_path(&mut self) {
        self.subpaths.clear();
        self.closed.clear();
    }

    fn move_to(&mut self, p: Point2D) {
        self.subpaths.push(vec![self.transform.apply(p)]);
        self.closed.push(false);
    }

    fn line_to(&mut self, p: Point2D) {
        let p = self.transform.apply(p);
        self.push_device(p);
    }

    fn quadratic_curve_to(&mut self, c: Point2D, p: Point2D) {
        let c = self.transform.apply(c);
        let p = self.transform.apply(p);
        let Some(start) = self.last_point() else {
            self.push_device(p);
            return;
        };
        for i in 1..=CURVE_SEGMENTS {
            let t = i as f32 / CURVE_SEGMENTS as f32;
            let a = start.lerp(c, t);
            let b = c.lerp(p, t);
            self.push_device(a.lerp(b, t));
        }
    }

    fn bezier_curve_to(&mut self, c1: Point2D, c2: Point2D, p: Point2D) {
        let c1 = self.transform.apply(c1);
        let c2 = self.transform.apply(c2);
        let p = self.transform.apply(p);
        let Some(start) = self.last_point() else {
            self.push_device(p);
            return;
        };
        for i in 1..=CURVE_SEGMENTS {
            let t = i as f32 / CURVE_SEGMENTS as f32;
            let ab = start.lerp(c1, t);
            let bc = c1.lerp(c2, t);
            let cd = c2.lerp(p, t);
            let abc = ab.lerp(bc, t);
            let bcd = bc.lerp(cd, t);
            self.push_device(abc.lerp(bcd, t));
        }
    }

    fn close_path(&mut self) {
        if let Some(last) = self.closed.last_mut() {
            *last = true;
        }
    }

    /// Nonzero winding scanline fill over every sub-path, matching the
    /// default canvas fill rule.
    fn fill(&mut self) {
        let color = self.style.fill;
        let edges: Vec<(Point2D, Point2D)> = self
            .subpaths
            .iter()
            .filter(|s| s.len() >= 3)
            .flat_map(|s| s.iter().copied().zip(s.iter().copied().cycle().skip(1)).take(s.len()))
            .collect();
        if edges.is_empty() {
            return;
        }
        let min_y = edges.iter().map(|(a, b)| a.y.min(b.y)).fold(f32::MAX, f32::min);
        let max_y = edges.iter().map(|(a, b)| a.y.max(b.y)).fold(f32::MIN, f32::max);
        let y0 = min_y.floor().max(0.0) as i64;
        let y1 = (max_y.ceil() as i64).min(self.height as i64 - 1);

        // (x, +1 for a downward edge, -1 for an upward one)
        let mut crossings: Vec<(f32, i32)> = Vec::new();
        for y in y0..=y1 {
            let sy = y as f32 + 0.5;
            crossings.clear();
            for (a, b) in &edges {
                if (a.y <= sy && b.y > sy) || (b.y <= sy && a.y > sy) {
                    let x = a.x + (sy - a.y) / (b.y - a.y) * (b.x - a.x);
                    crossings.push((x, if b.y > a.y { 1 } else { -1 }));
                }
            }
            crossings.sort_by(|l, r| l.0.total_cmp(&r.0));

            let mut winding = 0;
            for pair in crossings.windows(2) {
                winding += pair[0].1;
                if winding == 0 {
                    continue;
                }
                let start = (pair[0].0 - 0.5).ceil().max(0.0) as i64;
                let end = ((pair[1].0 - 0.5).floor() as i64).min(self.width as i64 - 1);
                for x in start..=end {
                    self.put(x, y, color);
                }
            }
        }
    }

    fn stroke(&mut self) {
        let color = self.style.stroke;
        let subpaths = std::mem::take(&mut self.subpaths);
        let closed = std::mem::take(&mut self.closed);
        for (s, &is_closed) in subpaths.iter().zip(&closed) {
            for w in s.windows(2) {
                self.draw_segment(w[0], w[1], color);
            }
            if is_closed && s.len() > 2 {
                self.draw_segment(s[s.len() - 1], s[0], color);
            }
        }
        self.subpaths = subpaths;
        self.closed = closed;
    }

    fn draw_points(&mut self, points: &[Point2D]) {
        let size = self.style.point_size.max(1.0) as i64;
        let color = self.style.stroke;
        for p in points {
            let p = self.transform.apply(*p);
            let (x, y) = (p.x as i64, p.y as i64);
            for dy in 0..size {
                for dx in 0..size {
                    self.put(x + dx, y + dy, color);
                }
            }
        }
    }

    fn set_mirrored(&mut self, mirrored: bool) {
        self.mirrored = mirrored;
        self.transform = Transform2D::overlay_view(self.width as u32, mirrored);
    }
}

#[cfg(feature = "window")]
pub use window::WindowOutput;

#[cfg(feature = "window")]
mod window {
    use super::FrameCanvas;
    use anyhow::Result;

    pub struct WindowOutput {
        window: minifb::Window,
        buffer: Vec<u32>,
        width: usize,
        height: usize,
    }

    impl WindowOutput {
        pub fn new(title: &str, width: usize, height: usize, fps: u32) -> Result<Self> {
            let mut window = minifb::Window::new(
                title,
                width,
                height,
                minifb::WindowOptions {
                    resize: true,
                    ..minifb::WindowOptions::default()
                },
            )
            .map_err(|e| anyhow::anyhow!("Failed to create window: {}", e))?;

            window.set_target_fps(fps.max(1) as usize);

            Ok(Self {
                window,
                buffer: vec![0; width * height],
                width,
                height,
            })
        }

        pub fn is_open(&self) -> bool {
            self.window.is_open()
        }

        pub fn keys_pressed(&self) -> Vec<minifb::Key> {
            self.window.get_keys_pressed(minifb::KeyRepeat::No)
        }

        /// Present the canvas (RGB8) converted to 0RGB.
        pub fn update(&mut self, canvas: &FrameCanvas) -> Result<()> {
            if self.buffer.len() != self.width * self.height {
                self.buffer.resize(self.width * self.height, 0);
            }

            for (i, chunk) in canvas.buffer().chunks(3).enumerate() {
                if i >= self.buffer.len() {
                    break;
                }
                let r = chunk[0] as u32;
                let g = chunk[1] as u32;
                let b = chunk[2] as u32;
                self.buffer[i] = (r << 16) | (g << 8) | b;
            }

            self.window
                .update_with_buffer(&self.buffer, self.width, self.height)
                .map_err(|e| anyhow::anyhow!("Window update failed: {}", e))
        }
    }
}
