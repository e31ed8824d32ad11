//! Transition math: a pure function from `(type, progress)` to the transforms
//! of the outgoing and incoming photo layers.
//!
//! Translations are percentages of the layer size, rotations are degrees,
//! scale and opacity are unit factors. Renderers map these onto whatever
//! surface they draw on.

use crate::types::TransitionType;
use serde::{Deserialize, Serialize};

/// Transform applied to one photo layer for a single frame.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct LayerTransform {
    pub opacity: f64,
    pub translate_x: f64,
    pub translate_y: f64,
    pub scale: f64,
    pub rotate_x: f64,
    pub rotate_y: f64,
    pub rotate_z: f64,
}

impl LayerTransform {
    pub const IDENTITY: Self = Self {
        opacity: 1.0,
        translate_x: 0.0,
        translate_y: 0.0,
        scale: 1.0,
        rotate_x: 0.0,
        rotate_y: 0.0,
        rotate_z: 0.0,
    };

    pub const HIDDEN: Self = Self {
        opacity: 0.0,
        ..Self::IDENTITY
    };

    pub fn is_visible(&self) -> bool {
        self.opacity > 0.0
    }
}

impl Default for LayerTransform {
    fn default() -> Self {
        Self::IDENTITY
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct TransitionFrame {
    pub outgoing: LayerTransform,
    pub incoming: LayerTransform,
}

/// Evaluate a transition at `progress`. Progress is clamped to `[0, 1]`;
/// NaN is treated as 0.
pub fn evaluate(kind: TransitionType, progress: f64) -> TransitionFrame {
    let p = clamp_progress(progress);
    let mut out = LayerTransform::IDENTITY;
    let mut inc = LayerTransform::IDENTITY;

    match kind {
        TransitionType::Fade => {
            out.opacity = 1.0 - p;
            inc.opacity = p;
        }
        TransitionType::SlideLeft => {
            out.translate_x = -p * 100.0;
            inc.translate_x = (1.0 - p) * 100.0;
        }
        TransitionType::SlideRight => {
            out.translate_x = p * 100.0;
            inc.translate_x = -(1.0 - p) * 100.0;
        }
        TransitionType::SlideUp => {
            out.translate_y = -p * 100.0;
            inc.translate_y = (1.0 - p) * 100.0;
        }
        TransitionType::SlideDown => {
            out.translate_y = p * 100.0;
            inc.translate_y = -(1.0 - p) * 100.0;
        }
        TransitionType::Zoom => {
            out.scale = 1.0 + p;
            out.opacity = 1.0 - p;
            inc.scale = 0.5 + p * 0.5;
            inc.opacity = p;
        }
        TransitionType::Rotate => {
            out.rotate_y = p * 90.0;
            out.opacity = 1.0 - p;
            inc.rotate_y = -90.0 + p * 90.0;
            inc.opacity = p;
        }
        TransitionType::Cube => {
            // First half turns the outgoing face away, second half brings the
            // incoming face in.
            if p < 0.5 {
                out.rotate_y = p * 180.0;
                inc.opacity = 0.0;
            } else {
                out.opacity = 0.0;
                inc.rotate_y = (p - 0.5) * 180.0 - 90.0;
            }
        }
        TransitionType::Flip => {
            out.rotate_x = p * 180.0;
            out.opacity = if p < 0.5 { 1.0 } else { 0.0 };
            inc.rotate_x = -180.0 + p * 180.0;
            inc.opacity = if p >= 0.5 { 1.0 } else { 0.0 };
        }
        TransitionType::Dissolve => {
            out.opacity = 1.0 - p;
            out.scale = 1.0 - p * 0.1;
            inc.opacity = p;
            inc.scale = 0.9 + p * 0.1;
        }
        TransitionType::Blur => {
            out.opacity = 1.0 - p;
            out.translate_x = -p * 50.0;
            inc.opacity = p;
            inc.translate_x = (1.0 - p) * 50.0;
        }
        TransitionType::WipeCircle => {
            out.opacity = 1.0 - p;
            out.scale = 1.0 - p;
            inc.opacity = p;
            inc.scale = p;
        }
        TransitionType::Push => {
            out.translate_x = -p * 100.0;
            inc.translate_x = -p * 100.0 + 100.0;
        }
    }

    TransitionFrame {
        outgoing: out,
        incoming: inc,
    }
}

pub fn clamp_progress(progress: f64) -> f64 {
    if progress.is_nan() {
        0.0
    } else {
        progress.clamp(0.0, 1.0)
    }
}

// ---------------------------------------------------------------------------
// Easing
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum Easing {
    #[default]
    Linear,
    EaseIn,
    EaseOut,
    EaseInOut,
    EaseInCubic,
    EaseOutCubic,
    EaseInOutCubic,
}

impl Easing {
    pub fn apply(&self, t: f64) -> f64 {
        let t = clamp_progress(t);
        match self {
            Easing::Linear => t,
            Easing::EaseIn => t * t,
            Easing::EaseOut => t * (2.0 - t),
            Easing::EaseInOut => {
                if t < 0.5 {
                    2.0 * t * t
                } else {
                    -1.0 + (4.0 - 2.0 * t) * t
                }
            }
            Easing::EaseInCubic => t * t * t,
            Easing::EaseOutCubic => {
                let u = t - 1.0;
                u * u * u + 1.0
            }
            Easing::EaseInOutCubic => {
                if t < 0.5 {
                    4.0 * t * t * t
                } else {
                    (t - 1.0) * (2.0 * t - 2.0) * (2.0 * t - 2.0) + 1.0
                }
            }
        }
    }
}
