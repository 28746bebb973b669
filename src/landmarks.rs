//! Named indices into the 468-point face mesh.
//!
//! Overlays and anchors never use raw numbers; they refer to these entries,
//! which are resolved once against a prediction.

use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NamedLandmark {
    pub label: &'static str,
    pub index: usize,
}

impl NamedLandmark {
    pub const fn new(label: &'static str, index: usize) -> Self {
        Self { label, index }
    }
}

impl fmt::Display for NamedLandmark {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}#{}", self.label, self.index)
    }
}

pub const NOSE_TIP: NamedLandmark = NamedLandmark::new("nose-tip", 1);
pub const CENTER: NamedLandmark = NamedLandmark::new("center", 5);
pub const NOSE_BRIDGE: NamedLandmark = NamedLandmark::new("nose-bridge", 6);
pub const CHIN_CENTER: NamedLandmark = NamedLandmark::new("chin-center", 152);

pub const LEFT_EAR: NamedLandmark = NamedLandmark::new("left-ear", 161);
pub const LEFT_EYE_OUTER: NamedLandmark = NamedLandmark::new("left-eye-outer", 246);
pub const LEFT_EYE_INNER: NamedLandmark = NamedLandmark::new("left-eye-inner", 189);
pub const RIGHT_EAR: NamedLandmark = NamedLandmark::new("right-ear", 388);
pub const RIGHT_EYE_OUTER: NamedLandmark = NamedLandmark::new("right-eye-outer", 466);
pub const RIGHT_EYE_INNER: NamedLandmark = NamedLandmark::new("right-eye-inner", 414);

pub const LEFT_EARLOBE_UPPER: NamedLandmark = NamedLandmark::new("left-earlobe-upper", 137);
pub const LEFT_EARLOBE_LOWER: NamedLandmark = NamedLandmark::new("left-earlobe-lower", 177);
pub const RIGHT_EARLOBE_UPPER: NamedLandmark = NamedLandmark::new("right-earlobe-upper", 366);
pub const RIGHT_EARLOBE_LOWER: NamedLandmark = NamedLandmark::new("right-earlobe-lower", 401);

/// Contour around the left eye socket, starting at the cheek, running over
/// the brow to the nose bridge and back under the eye.
pub const LEFT_EYE_CONTOUR: [NamedLandmark; 16] = [
    NamedLandmark::new("left-eye-contour-0", 143),
    NamedLandmark::new("left-eye-contour-1", 113),
    NamedLandmark::new("left-eye-contour-2", 225),
    NamedLandmark::new("left-eye-contour-3", 224),
    NamedLandmark::new("left-eye-contour-4", 223),
    NamedLandmark::new("left-eye-contour-5", 222),
    NamedLandmark::new("left-eye-contour-6", 221),
    NamedLandmark::new("left-eye-contour-7", 193),
    NOSE_BRIDGE,
    NamedLandmark::new("left-eye-contour-9", 122),
    NamedLandmark::new("left-eye-contour-10", 188),
    NamedLandmark::new("left-eye-contour-11", 121),
    NamedLandmark::new("left-eye-contour-12", 120),
    NamedLandmark::new("left-eye-contour-13", 119),
    NamedLandmark::new("left-eye-contour-14", 118),
    NamedLandmark::new("left-eye-contour-15", 117),
];

/// Mirror image of [`LEFT_EYE_CONTOUR`].
pub const RIGHT_EYE_CONTOUR: [NamedLandmark; 16] = [
    NamedLandmark::new("right-eye-contour-0", 372),
    NamedLandmark::new("right-eye-contour-1", 342),
    NamedLandmark::new("right-eye-contour-2", 445),
    NamedLandmark::new("right-eye-contour-3", 444),
    NamedLandmark::new("right-eye-contour-4", 443),
    NamedLandmark::new("right-eye-contour-5", 442),
    NamedLandmark::new("right-eye-contour-6", 441),
    NamedLandmark::new("right-eye-contour-7", 417),
    NOSE_BRIDGE,
    NamedLandmark::new("right-eye-contour-9", 351),
    NamedLandmark::new("right-eye-contour-10", 412),
    NamedLandmark::new("right-eye-contour-11", 350),
    NamedLandmark::new("right-eye-contour-12", 349),
    NamedLandmark::new("right-eye-contour-13", 348),
    NamedLandmark::new("right-eye-contour-14", 347),
    NamedLandmark::new("right-eye-contour-15", 346),
];

const SINGLE: [NamedLandmark; 14] = [
    NOSE_TIP,
    CENTER,
    NOSE_BRIDGE,
    CHIN_CENTER,
    LEFT_EAR,
    LEFT_EYE_OUTER,
    LEFT_EYE_INNER,
    RIGHT_EAR,
    RIGHT_EYE_OUTER,
    RIGHT_EYE_INNER,
    LEFT_EARLOBE_UPPER,
    LEFT_EARLOBE_LOWER,
    RIGHT_EARLOBE_UPPER,
    RIGHT_EARLOBE_LOWER,
];

/// Every named landmark, in a stable order.
pub fn all() -> impl Iterator<Item = NamedLandmark> {
    // The contours share the nose bridge, which already sits in SINGLE.
    let contours = LEFT_EYE_CONTOUR
        .into_iter()
        .chain(RIGHT_EYE_CONTOUR)
        .filter(|l| *l != NOSE_BRIDGE);
    SINGLE.into_iter().chain(contours)
}

/// Resolve a label (as written in the config file) to its landmark.
pub fn lookup(label: &str) -> Option<NamedLandmark> {
    all().find(|l| l.label == label)
}
