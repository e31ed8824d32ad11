use crate::types::TransitionType;
use serde::Serialize;

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum TransitionCategory {
    Basic,
    Slide,
    #[serde(rename = "3d")]
    ThreeD,
    Creative,
}

/// Static description of one transition type.
#[derive(Debug, Clone, Copy, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct TransitionSpec {
    pub kind: TransitionType,
    pub name: &'static str,
    pub description: &'static str,
    pub default_duration_ms: u64,
    pub premium: bool,
    pub category: TransitionCategory,
}

impl TransitionSpec {
    pub fn default_duration_secs(&self) -> f64 {
        self.default_duration_ms as f64 / 1000.0
    }
}

const fn spec(
    kind: TransitionType,
    name: &'static str,
    description: &'static str,
    default_duration_ms: u64,
    premium: bool,
    category: TransitionCategory,
) -> TransitionSpec {
    TransitionSpec {
        kind,
        name,
        description,
        default_duration_ms,
        premium,
        category,
    }
}

pub const CATALOG: [TransitionSpec; 13] = [
    spec(
        TransitionType::Fade,
        "Fade",
        "Smooth crossfade between photos",
        500,
        false,
        TransitionCategory::Basic,
    ),
    spec(
        TransitionType::SlideLeft,
        "Slide Left",
        "Slide from right to left",
        600,
        false,
        TransitionCategory::Slide,
    ),
    spec(
        TransitionType::SlideRight,
        "Slide Right",
        "Slide from left to right",
        600,
        false,
        TransitionCategory::Slide,
    ),
    spec(
        TransitionType::SlideUp,
        "Slide Up",
        "Slide from bottom to top",
        600,
        false,
        TransitionCategory::Slide,
    ),
    spec(
        TransitionType::SlideDown,
        "Slide Down",
        "Slide from top to bottom",
        600,
        false,
        TransitionCategory::Slide,
    ),
    spec(
        TransitionType::Zoom,
        "Zoom",
        "Zoom in/out effect",
        700,
        false,
        TransitionCategory::Basic,
    ),
    spec(
        TransitionType::Rotate,
        "Rotate",
        "3D rotation effect",
        800,
        true,
        TransitionCategory::ThreeD,
    ),
    spec(
        TransitionType::Cube,
        "Cube",
        "3D cube rotation",
        800,
        true,
        TransitionCategory::ThreeD,
    ),
    spec(
        TransitionType::Flip,
        "Flip",
        "Page flip effect",
        700,
        true,
        TransitionCategory::ThreeD,
    ),
    spec(
        TransitionType::Dissolve,
        "Dissolve",
        "Particle dissolve effect",
        900,
        true,
        TransitionCategory::Creative,
    ),
    spec(
        TransitionType::Blur,
        "Blur",
        "Motion blur transition",
        600,
        true,
        TransitionCategory::Creative,
    ),
    spec(
        TransitionType::WipeCircle,
        "Circle Wipe",
        "Circular wipe pattern",
        700,
        true,
        TransitionCategory::Creative,
    ),
    spec(
        TransitionType::Push,
        "Push",
        "Push transition",
        600,
        true,
        TransitionCategory::Slide,
    ),
];

impl TransitionType {
    pub fn spec(&self) -> &'static TransitionSpec {
        // CATALOG is declared in the same order as TransitionType::ALL.
        &CATALOG[*self as usize]
    }

    pub fn is_premium(&self) -> bool {
        self.spec().premium
    }

    pub fn default_duration_secs(&self) -> f64 {
        self.spec().default_duration_secs()
    }
}

/// Transition types a user with the given entitlement can pick.
pub fn available(premium: bool) -> impl Iterator<Item = &'static TransitionSpec> {
    CATALOG.iter().filter(move |s| premium || !s.premium)
}

/// Seconds a transition runs: the override when it is a positive finite
/// number, otherwise the type default.
pub fn effective_duration(kind: TransitionType, duration: Option<f64>) -> f64 {
    match duration {
        Some(d) if d.is_finite() && d > 0.0 => d,
        _ => kind.default_duration_secs(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn catalog_order_matches_enum() {
        for (i, kind) in TransitionType::ALL.iter().enumerate() {
            assert_eq!(CATALOG[i].kind, *kind);
            assert_eq!(kind.spec().kind, *kind);
        }
    }

    #[test]
    fn free_and_premium_split() {
        assert_eq!(available(false).count(), 6);
        assert_eq!(available(true).count(), 13);
        assert!(!TransitionType::Zoom.is_premium());
        assert!(TransitionType::Cube.is_premium());
        assert!(TransitionType::Push.is_premium());
    }

    #[test]
    fn default_durations() {
        assert_eq!(TransitionType::Fade.default_duration_secs(), 0.5);
        assert_eq!(TransitionType::Dissolve.default_duration_secs(), 0.9);
        assert_eq!(TransitionType::WipeCircle.spec().name, "Circle Wipe");
    }

    #[test]
    fn effective_duration_falls_back_on_invalid_override() {
        assert_eq!(effective_duration(TransitionType::Fade, Some(1.25)), 1.25);
        assert_eq!(effective_duration(TransitionType::Fade, None), 0.5);
        assert_eq!(effective_duration(TransitionType::Zoom, Some(0.0)), 0.7);
        assert_eq!(effective_duration(TransitionType::Zoom, Some(-2.0)), 0.7);
        assert_eq!(effective_duration(TransitionType::Zoom, Some(f64::NAN)), 0.7);
    }

    #[test]
    fn category_wire_names() {
        let json = serde_json::to_value(TransitionType::Flip.spec()).unwrap();
        assert_eq!(json["category"], "3d");
        assert_eq!(json["defaultDurationMs"], 700);
    }
}
