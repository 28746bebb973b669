//! Built-in overlay presets and the default ear anchor.

use crate::anchor::AnchorSpec;
use crate::config::AnchorConfig;
use crate::geometry::{OverlaySpec, PathSpec, Vertex};
use crate::landmarks::{self, NamedLandmark};

pub const LEFT_EYE_REGION: &str = "left-eye-region";
pub const RIGHT_EYE_REGION: &str = "right-eye-region";
pub const EAR_GUIDES: &str = "ear-guides";
pub const NECK_GUIDE: &str = "neck-guide";
pub const EAR_TRIANGLE: &str = "ear-triangle";

pub const PRESET_NAMES: [&str; 5] = [
    LEFT_EYE_REGION,
    RIGHT_EYE_REGION,
    EAR_GUIDES,
    NECK_GUIDE,
    EAR_TRIANGLE,
];

// Video pixels; +y runs down the frame.
const GUIDE_OFFSET: f32 = 10.0;
const NECK_LENGTH: f32 = 40.0;

/// Silhouette around an eye socket: curve over the first three contour
/// points, then straight back along the lower contour.
fn eye_region(name: &str, contour: &[NamedLandmark; 16]) -> OverlaySpec {
    let path = PathSpec::starting_at(contour[0])
        .curve_to(contour[1])
        .curve_to(contour[2])
        .curve_to(contour[3]);
    // 14 and 13 are skipped on the way back.
    let back = [15, 12, 11, 10, 9, 8, 7, 6, 5, 4, 3, 2, 1];
    let path = back
        .iter()
        .fold(path, |path, &i| path.line_to(contour[i]))
        .filled();
    OverlaySpec::new(name, vec![path])
}

fn ear_guides() -> OverlaySpec {
    let left = PathSpec::starting_at(Vertex::at(landmarks::LEFT_EARLOBE_UPPER).offset(-GUIDE_OFFSET, -GUIDE_OFFSET))
        .line_to(Vertex::at(landmarks::LEFT_EARLOBE_LOWER).offset(-GUIDE_OFFSET, -GUIDE_OFFSET));
    let right = PathSpec::starting_at(Vertex::at(landmarks::RIGHT_EARLOBE_UPPER).offset(GUIDE_OFFSET, GUIDE_OFFSET))
        .line_to(Vertex::at(landmarks::RIGHT_EARLOBE_LOWER).offset(GUIDE_OFFSET, GUIDE_OFFSET));
    OverlaySpec::new(EAR_GUIDES, vec![left, right])
}

fn neck_end() -> Vertex {
    Vertex::at(landmarks::CHIN_CENTER).offset(0.0, NECK_LENGTH)
}

fn neck_guide() -> OverlaySpec {
    let path = PathSpec::starting_at(landmarks::CHIN_CENTER).line_to(neck_end());
    OverlaySpec::new(NECK_GUIDE, vec![path])
}

fn ear_triangle() -> OverlaySpec {
    let path = PathSpec::starting_at(
        Vertex::midpoint(landmarks::RIGHT_EARLOBE_UPPER, landmarks::RIGHT_EARLOBE_LOWER)
            .offset(GUIDE_OFFSET, GUIDE_OFFSET),
    )
    .line_to(
        Vertex::midpoint(landmarks::LEFT_EARLOBE_UPPER, landmarks::LEFT_EARLOBE_LOWER)
            .offset(-GUIDE_OFFSET, -GUIDE_OFFSET),
    )
    .line_to(neck_end())
    .closed();
    OverlaySpec::new(EAR_TRIANGLE, vec![path])
}

/// Look up a preset by name.
pub fn preset(name: &str) -> Option<OverlaySpec> {
    match name {
        LEFT_EYE_REGION => Some(eye_region(LEFT_EYE_REGION, &landmarks::LEFT_EYE_CONTOUR)),
        RIGHT_EYE_REGION => Some(eye_region(RIGHT_EYE_REGION, &landmarks::RIGHT_EYE_CONTOUR)),
        EAR_GUIDES => Some(ear_guides()),
        NECK_GUIDE => Some(neck_guide()),
        EAR_TRIANGLE => Some(ear_triangle()),
        _ => None,
    }
}

/// Resolve the configured preset names, skipping (and logging) unknown ones.
pub fn presets<S: AsRef<str>>(names: &[S]) -> Vec<OverlaySpec> {
    names
        .iter()
        .filter_map(|n| {
            let spec = preset(n.as_ref());
            if spec.is_none() {
                log::warn!("Unknown overlay preset '{}', skipping", n.as_ref());
            }
            spec
        })
        .collect()
}

/// Build the anchor described by the config, if enabled and its landmark
/// label is known.
pub fn anchor_from_config(cfg: &AnchorConfig) -> Option<AnchorSpec> {
    if !cfg.enabled {
        return None;
    }
    let Some(landmark) = landmarks::lookup(&cfg.landmark) else {
        log::warn!("Unknown anchor landmark '{}', anchor disabled", cfg.landmark);
        return None;
    };
    Some(AnchorSpec {
        object: cfg.object.clone(),
        landmark,
        offset: cfg.offset.into(),
        scale: cfg.scale.into(),
    })
}
