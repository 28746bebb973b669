//! Maps one landmark to the position of a 3D scene object.

use crate::error::ContractViolation;
use crate::landmarks::NamedLandmark;
use crate::types::{Point3D, Prediction};

/// Per-axis `(p + offset) * scale` from landmark pixels into scene units.
///
/// The offsets recenter pixel coordinates around the middle of the video,
/// the scales compress pixels into scene units. Both are tuned by hand and
/// live in the config file.
#[derive(Debug, Clone, PartialEq)]
pub struct AnchorSpec {
    pub object: String,
    pub landmark: NamedLandmark,
    pub offset: Point3D,
    pub scale: Point3D,
}

impl AnchorSpec {
    pub fn map(&self, p: Point3D) -> Point3D {
        Point3D {
            x: (p.x + self.offset.x) * self.scale.x,
            y: (p.y + self.offset.y) * self.scale.y,
            z: (p.z + self.offset.z) * self.scale.z,
        }
    }

    /// Resolve the landmark in `prediction` and map it.
    pub fn resolve(&self, prediction: &Prediction) -> Result<Point3D, ContractViolation> {
        prediction
            .point(self.landmark.index)
            .map(|p| self.map(p))
            .ok_or_else(|| ContractViolation {
                item: self.object.clone(),
                required: self.landmark.index,
                available: prediction.len(),
            })
    }
}
