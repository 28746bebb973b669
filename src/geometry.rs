//! Overlay geometry: declarative path descriptions over named landmarks and
//! the builder that turns them into drawing commands for one prediction.
//!
//! Emitted coordinates are in the negated video space: every landmark
//! `(x, y)` becomes `(-x, -y)`. The canvas view transform installed by the
//! render loop maps that space back onto the (optionally mirrored) preview.

use crate::error::ContractViolation;
use crate::landmarks::NamedLandmark;
use crate::types::{Point2D, Point3D, Prediction};

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum VertexSource {
    Landmark(NamedLandmark),
    /// Halfway between two landmarks.
    Midpoint(NamedLandmark, NamedLandmark),
}

/// A path vertex: a landmark (or landmark midpoint) plus a constant offset
/// in video pixels, applied before negation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Vertex {
    pub source: VertexSource,
    pub offset: Point2D,
}

impl Vertex {
    pub fn at(landmark: NamedLandmark) -> Self {
        Self {
            source: VertexSource::Landmark(landmark),
            offset: Point2D::default(),
        }
    }

    pub fn midpoint(a: NamedLandmark, b: NamedLandmark) -> Self {
        Self {
            source: VertexSource::Midpoint(a, b),
            offset: Point2D::default(),
        }
    }

    pub fn offset(mut self, dx: f32, dy: f32) -> Self {
        self.offset = Point2D::new(dx, dy);
        self
    }

    fn max_index(&self) -> usize {
        match self.source {
            VertexSource::Landmark(l) => l.index,
            VertexSource::Midpoint(a, b) => a.index.max(b.index),
        }
    }

    fn resolve(&self, prediction: &Prediction) -> Option<Point2D> {
        let p = match self.source {
            VertexSource::Landmark(l) => prediction.point(l.index)?,
            VertexSource::Midpoint(a, b) => {
                let a = prediction.point(a.index)?;
                let b = prediction.point(b.index)?;
                Point3D::new((a.x + b.x) / 2.0, (a.y + b.y) / 2.0, (a.z + b.z) / 2.0)
            }
        };
        Some(to_surface(Point3D::new(p.x + self.offset.x, p.y + self.offset.y, p.z)))
    }
}

impl From<NamedLandmark> for Vertex {
    fn from(landmark: NamedLandmark) -> Self {
        Vertex::at(landmark)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepKind {
    Move,
    Line,
    /// Curve through this point. Consecutive curve points are consumed three
    /// at a time as (control, control, end), like a canvas bezier call.
    Curve,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PathStep {
    pub kind: StepKind,
    pub vertex: Vertex,
}

/// One sub-path of an overlay.
#[derive(Debug, Clone, PartialEq)]
pub struct PathSpec {
    pub steps: Vec<PathStep>,
    pub close: bool,
    pub fill: bool,
    pub stroke: bool,
}

impl PathSpec {
    pub fn starting_at(vertex: impl Into<Vertex>) -> Self {
        Self {
            steps: vec![PathStep {
                kind: StepKind::Move,
                vertex: vertex.into(),
            }],
            close: false,
            fill: false,
            stroke: true,
        }
    }

    pub fn line_to(mut self, vertex: impl Into<Vertex>) -> Self {
        self.steps.push(PathStep {
            kind: StepKind::Line,
            vertex: vertex.into(),
        });
        self
    }

    pub fn curve_to(mut self, vertex: impl Into<Vertex>) -> Self {
        self.steps.push(PathStep {
            kind: StepKind::Curve,
            vertex: vertex.into(),
        });
        self
    }

    /// Close, fill and stroke.
    pub fn filled(mut self) -> Self {
        self.close = true;
        self.fill = true;
        self
    }

    pub fn closed(mut self) -> Self {
        self.close = true;
        self
    }
}

/// Declarative 2D shape built from named landmark points.
#[derive(Debug, Clone, PartialEq)]
pub struct OverlaySpec {
    pub name: String,
    pub paths: Vec<PathSpec>,
}

impl OverlaySpec {
    pub fn new(name: impl Into<String>, paths: Vec<PathSpec>) -> Self {
        Self {
            name: name.into(),
            paths,
        }
    }

    /// Highest landmark index any vertex touches.
    pub fn max_index(&self) -> usize {
        self.paths
            .iter()
            .flat_map(|p| p.steps.iter())
            .map(|s| s.vertex.max_index())
            .max()
            .unwrap_or(0)
    }

    pub fn point_count(&self) -> usize {
        self.paths.iter().map(|p| p.steps.len()).sum()
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PathCommand {
    MoveTo(Point2D),
    LineTo(Point2D),
    CurveTo(Point2D),
}

impl PathCommand {
    pub fn point(&self) -> Point2D {
        match *self {
            PathCommand::MoveTo(p) | PathCommand::LineTo(p) | PathCommand::CurveTo(p) => p,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct BuiltPath {
    pub commands: Vec<PathCommand>,
    pub close: bool,
    pub fill: bool,
    pub stroke: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct OverlayGeometry {
    pub name: String,
    pub paths: Vec<BuiltPath>,
}

impl OverlayGeometry {
    pub fn commands(&self) -> impl Iterator<Item = &PathCommand> {
        self.paths.iter().flat_map(|p| p.commands.iter())
    }
}

/// Drop depth and negate both axes.
pub fn to_surface(p: Point3D) -> Point2D {
    Point2D::new(-p.x, -p.y)
}

/// Build the drawing commands for one overlay against one prediction.
///
/// Fails without panicking when the prediction is too short for the
/// overlay's highest index.
pub fn build_overlay(
    prediction: &Prediction,
    spec: &OverlaySpec,
) -> Result<OverlayGeometry, ContractViolation> {
    let required = spec.max_index();
    if required >= prediction.len() {
        return Err(ContractViolation {
            item: spec.name.clone(),
            required,
            available: prediction.len(),
        });
    }

    let mut paths = Vec::with_capacity(spec.paths.len());
    for path in &spec.paths {
        let mut commands = Vec::with_capacity(path.steps.len());
        for step in &path.steps {
            // Every index was bounds-checked above.
            let Some(p) = step.vertex.resolve(prediction) else {
                continue;
            };
            commands.push(match step.kind {
                StepKind::Move => PathCommand::MoveTo(p),
                StepKind::Line => PathCommand::LineTo(p),
                StepKind::Curve => PathCommand::CurveTo(p),
            });
        }
        paths.push(BuiltPath {
            commands,
            close: path.close,
            fill: path.fill,
            stroke: path.stroke,
        });
    }

    Ok(OverlayGeometry {
        name: spec.name.clone(),
        paths,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::landmarks::{self, NamedLandmark};
    use crate::types::MESH_POINT_COUNT;

    fn mesh(n: usize) -> Prediction {
        Prediction::new(
            (0..n)
                .map(|i| Point3D::new(i as f32 * 2.0, i as f32 + 0.5, -(i as f32)))
                .collect(),
        )
    }

    fn contour_spec() -> OverlaySpec {
        let c = landmarks::LEFT_EYE_CONTOUR;
        let mut path = PathSpec::starting_at(c[0]);
        for (i, l) in c.iter().enumerate().skip(1) {
            path = if i < 4 { path.curve_to(*l) } else { path.line_to(*l) };
        }
        OverlaySpec::new("contour", vec![path.filled()])
    }

    #[test]
    fn one_command_per_point_with_negated_coordinates() {
        let prediction = mesh(MESH_POINT_COUNT);
        let spec = contour_spec();
        let geometry = build_overlay(&prediction, &spec).unwrap();

        let commands: Vec<_> = geometry.commands().collect();
        assert_eq!(commands.len(), spec.point_count());

        for (cmd, l) in commands.iter().zip(landmarks::LEFT_EYE_CONTOUR) {
            let src = prediction.points[l.index];
            assert_eq!(cmd.point(), Point2D::new(-src.x, -src.y));
        }
    }

    #[test]
    fn step_kinds_are_emitted_verbatim() {
        let geometry = build_overlay(&mesh(MESH_POINT_COUNT), &contour_spec()).unwrap();
        let path = &geometry.paths[0];
        assert!(matches!(path.commands[0], PathCommand::MoveTo(_)));
        assert!(matches!(path.commands[1], PathCommand::CurveTo(_)));
        assert!(matches!(path.commands[3], PathCommand::CurveTo(_)));
        assert!(matches!(path.commands[4], PathCommand::LineTo(_)));
        assert!(path.close && path.fill && path.stroke);
    }

    #[test]
    fn short_prediction_is_a_contract_violation() {
        let spec = contour_spec();
        let err = build_overlay(&mesh(100), &spec).unwrap_err();
        assert_eq!(err.item, "contour");
        assert_eq!(err.required, 225);
        assert_eq!(err.available, 100);
    }

    #[test]
    fn exactly_long_enough_prediction_succeeds() {
        let spec = contour_spec();
        assert!(build_overlay(&mesh(spec.max_index() + 1), &spec).is_ok());
        assert!(build_overlay(&mesh(spec.max_index()), &spec).is_err());
    }

    #[test]
    fn offsets_and_midpoints_apply_before_negation() {
        let a = NamedLandmark::new("a", 2);
        let b = NamedLandmark::new("b", 4);
        let spec = OverlaySpec::new(
            "guide",
            vec![PathSpec::starting_at(Vertex::at(a).offset(-10.0, -10.0))
                .line_to(Vertex::midpoint(a, b).offset(0.0, 40.0))],
        );
        let geometry = build_overlay(&mesh(5), &spec).unwrap();
        let pts: Vec<_> = geometry.commands().map(|c| c.point()).collect();
        // a = (4, 2.5), b = (8, 4.5)
        assert_eq!(pts[0], Point2D::new(6.0, 7.5));
        assert_eq!(pts[1], Point2D::new(-6.0, -43.5));
    }
}
