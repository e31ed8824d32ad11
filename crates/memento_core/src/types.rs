use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::ops::{Add, Div, Mul, Sub};
use uuid::Uuid;

use crate::timeline::Timeline;

// ---------------------------------------------------------------------------
// TimeUs
// ---------------------------------------------------------------------------

/// Microsecond timestamp or duration. Playback and autosave clocks are
/// expressed in this unit so phase arithmetic stays exact.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TimeUs(pub i64);

impl TimeUs {
    pub const ZERO: Self = Self(0);

    pub fn from_seconds(s: f64) -> Self {
        Self((s * 1_000_000.0).round() as i64)
    }

    pub fn from_millis(ms: u64) -> Self {
        Self(ms as i64 * 1_000)
    }

    pub fn as_seconds(&self) -> f64 {
        self.0 as f64 / 1_000_000.0
    }

    pub fn as_millis(&self) -> i64 {
        self.0 / 1_000
    }

    /// Difference that never goes below zero; clocks handed in by hosts are
    /// not always monotonic.
    pub fn saturating_since(self, earlier: Self) -> Self {
        Self(self.0.saturating_sub(earlier.0).max(0))
    }

    pub fn saturating_add(self, rhs: Self) -> Self {
        Self(self.0.saturating_add(rhs.0))
    }
}

impl Add for TimeUs {
    type Output = Self;
    fn add(self, rhs: Self) -> Self {
        Self(self.0 + rhs.0)
    }
}

impl Sub for TimeUs {
    type Output = Self;
    fn sub(self, rhs: Self) -> Self {
        Self(self.0 - rhs.0)
    }
}

impl Mul<i64> for TimeUs {
    type Output = Self;
    fn mul(self, rhs: i64) -> Self {
        Self(self.0 * rhs)
    }
}

impl Div<i64> for TimeUs {
    type Output = Self;
    fn div(self, rhs: i64) -> Self {
        Self(self.0 / rhs)
    }
}

impl fmt::Display for TimeUs {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let total_us = self.0.unsigned_abs();
        let total_ms = total_us / 1_000;
        let ms = total_ms % 1_000;
        let total_secs = total_ms / 1_000;
        let secs = total_secs % 60;
        let mins = total_secs / 60;
        let sign = if self.0 < 0 { "-" } else { "" };
        write!(f, "{sign}{:02}:{:02}.{:03}", mins, secs, ms)
    }
}

// ---------------------------------------------------------------------------
// TransitionType
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(rename_all = "camelCase")]
pub enum TransitionType {
    Fade,
    SlideLeft,
    SlideRight,
    SlideUp,
    SlideDown,
    Zoom,
    Rotate,
    Cube,
    Flip,
    Dissolve,
    Blur,
    WipeCircle,
    Push,
}

impl TransitionType {
    pub const ALL: [TransitionType; 13] = [
        TransitionType::Fade,
        TransitionType::SlideLeft,
        TransitionType::SlideRight,
        TransitionType::SlideUp,
        TransitionType::SlideDown,
        TransitionType::Zoom,
        TransitionType::Rotate,
        TransitionType::Cube,
        TransitionType::Flip,
        TransitionType::Dissolve,
        TransitionType::Blur,
        TransitionType::WipeCircle,
        TransitionType::Push,
    ];

    /// Wire tag, identical to the serde representation.
    pub fn tag(&self) -> &'static str {
        match self {
            TransitionType::Fade => "fade",
            TransitionType::SlideLeft => "slideLeft",
            TransitionType::SlideRight => "slideRight",
            TransitionType::SlideUp => "slideUp",
            TransitionType::SlideDown => "slideDown",
            TransitionType::Zoom => "zoom",
            TransitionType::Rotate => "rotate",
            TransitionType::Cube => "cube",
            TransitionType::Flip => "flip",
            TransitionType::Dissolve => "dissolve",
            TransitionType::Blur => "blur",
            TransitionType::WipeCircle => "wipeCircle",
            TransitionType::Push => "push",
        }
    }

    pub fn from_tag(tag: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|t| t.tag().eq_ignore_ascii_case(tag.trim()))
    }
}

impl fmt::Display for TransitionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag())
    }
}

// ---------------------------------------------------------------------------
// PhotoEffect
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(rename_all = "camelCase")]
pub enum PhotoEffect {
    KenBurns,
    Vignette,
    Sepia,
    BlackWhite,
    Vintage,
    FilmGrain,
    ColorPop,
    LightLeak,
}

// ---------------------------------------------------------------------------
// ExportQuality / AspectRatio
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ExportQuality {
    #[serde(rename = "720p")]
    Low,
    #[serde(rename = "1080p")]
    Medium,
    #[serde(rename = "4K")]
    High,
}

impl ExportQuality {
    pub fn bitrate(&self) -> &'static str {
        match self {
            ExportQuality::Low => "2M",
            ExportQuality::Medium => "5M",
            ExportQuality::High => "20M",
        }
    }

    pub fn fps(&self) -> u32 {
        match self {
            ExportQuality::High => 60,
            ExportQuality::Low | ExportQuality::Medium => 30,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum AspectRatio {
    #[serde(rename = "1:1")]
    Square,
    #[serde(rename = "9:16")]
    Portrait,
    #[serde(rename = "16:9")]
    Landscape,
    #[serde(rename = "21:9")]
    Cinema,
}

impl AspectRatio {
    /// Output frame size in pixels for this preset.
    pub fn dimensions(&self) -> (u32, u32) {
        match self {
            AspectRatio::Square => (1080, 1080),
            AspectRatio::Portrait => (1080, 1920),
            AspectRatio::Landscape => (1920, 1080),
            AspectRatio::Cinema => (2560, 1080),
        }
    }
}

// ---------------------------------------------------------------------------
// Photo
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Photo {
    pub id: Uuid,
    pub uri: String,
    pub width: u32,
    pub height: u32,
    /// Display time in seconds.
    pub duration: f64,
    #[serde(default)]
    pub effects: BTreeSet<PhotoEffect>,
    /// Legacy per-photo transition tag. Only read as a playback fallback.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transition: Option<TransitionType>,
    pub order: usize,
}

/// Picked image handed to the editor by the host's photo picker.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PhotoAsset {
    pub uri: String,
    #[serde(default)]
    pub width: u32,
    #[serde(default)]
    pub height: u32,
}

impl PhotoAsset {
    pub fn new(uri: impl Into<String>, width: u32, height: u32) -> Self {
        Self {
            uri: uri.into(),
            width,
            height,
        }
    }
}

/// Fields of a photo that may be changed without touching its position.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PhotoPatch {
    pub duration: Option<f64>,
    pub effects: Option<BTreeSet<PhotoEffect>>,
    pub transition: Option<Option<TransitionType>>,
}

// ---------------------------------------------------------------------------
// Transition
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Transition {
    pub id: Uuid,
    #[serde(rename = "type")]
    pub kind: TransitionType,
    /// Override in seconds; the catalog default applies when unset.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration: Option<f64>,
    /// Slot index; plays as photo `order` gives way to the next one.
    pub order: usize,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct TransitionPatch {
    pub kind: Option<TransitionType>,
    pub duration: Option<Option<f64>>,
}

// ---------------------------------------------------------------------------
// ProjectSettings
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ProjectSettings {
    pub default_duration: f64,
    pub default_transition: TransitionType,
    pub export_quality: ExportQuality,
    pub resolution: AspectRatio,
}

impl Default for ProjectSettings {
    fn default() -> Self {
        Self {
            default_duration: 5.0,
            default_transition: TransitionType::Fade,
            export_quality: ExportQuality::Medium,
            resolution: AspectRatio::Portrait,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct SettingsPatch {
    pub default_duration: Option<f64>,
    pub default_transition: Option<TransitionType>,
    pub export_quality: Option<ExportQuality>,
    pub resolution: Option<AspectRatio>,
}

// ---------------------------------------------------------------------------
// Project
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
pub struct Project {
    pub id: Uuid,
    pub title: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub timeline: Timeline,
    pub settings: ProjectSettings,
    /// URI of the cover photo, empty when the project has no photos.
    pub thumbnail: String,
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn time_us_add_sub() {
        let a = TimeUs(5_000_000);
        let b = TimeUs(3_000_000);
        assert_eq!(a + b, TimeUs(8_000_000));
        assert_eq!(a - b, TimeUs(2_000_000));
    }

    #[test]
    fn time_us_from_seconds_rounds() {
        assert_eq!(TimeUs::from_seconds(2.5), TimeUs(2_500_000));
        assert_eq!(TimeUs::from_seconds(0.1), TimeUs(100_000));
        assert!((TimeUs(2_500_000).as_seconds() - 2.5).abs() < 1e-9);
    }

    #[test]
    fn time_us_millis() {
        assert_eq!(TimeUs::from_millis(1500), TimeUs(1_500_000));
        assert_eq!(TimeUs(2_750_000).as_millis(), 2750);
    }

    #[test]
    fn time_us_saturating_since() {
        assert_eq!(TimeUs(5).saturating_since(TimeUs(2)), TimeUs(3));
        assert_eq!(TimeUs(2).saturating_since(TimeUs(5)), TimeUs::ZERO);
    }

    #[test]
    fn time_us_display() {
        assert_eq!(TimeUs(0).to_string(), "00:00.000");
        assert_eq!(TimeUs(1_500_000).to_string(), "00:01.500");
        assert_eq!(TimeUs::from_seconds(61.25).to_string(), "01:01.250");
    }

    #[test]
    fn transition_type_tags_match_serde() {
        for kind in TransitionType::ALL {
            let json = serde_json::to_string(&kind).unwrap();
            assert_eq!(json, format!("\"{}\"", kind.tag()));
            assert_eq!(TransitionType::from_tag(kind.tag()), Some(kind));
        }
        assert_eq!(TransitionType::from_tag("WIPECIRCLE"), Some(TransitionType::WipeCircle));
        assert_eq!(TransitionType::from_tag("sparkle"), None);
    }

    #[test]
    fn export_quality_wire_names() {
        assert_eq!(serde_json::to_string(&ExportQuality::High).unwrap(), "\"4K\"");
        let q: ExportQuality = serde_json::from_str("\"720p\"").unwrap();
        assert_eq!(q, ExportQuality::Low);
        assert_eq!(ExportQuality::High.fps(), 60);
        assert_eq!(ExportQuality::Medium.bitrate(), "5M");
    }

    #[test]
    fn aspect_ratio_dimensions() {
        assert_eq!(AspectRatio::Portrait.dimensions(), (1080, 1920));
        assert_eq!(AspectRatio::Cinema.dimensions(), (2560, 1080));
        let a: AspectRatio = serde_json::from_str("\"16:9\"").unwrap();
        assert_eq!(a, AspectRatio::Landscape);
    }

    #[test]
    fn photo_effects_have_set_semantics() {
        let json = r#"{"id":"6f1c2b7e-8a3d-4f7e-9c1a-2b3c4d5e6f70","uri":"file:///a.jpg",
            "width":10,"height":20,"duration":3.0,
            "effects":["sepia","vignette","sepia"],"order":0}"#;
        let photo: Photo = serde_json::from_str(json).unwrap();
        assert_eq!(photo.effects.len(), 2);
        assert!(photo.effects.contains(&PhotoEffect::Sepia));
        assert_eq!(photo.transition, None);
    }

    #[test]
    fn transition_serializes_type_field() {
        let t = Transition {
            id: Uuid::new_v4(),
            kind: TransitionType::Zoom,
            duration: None,
            order: 1,
        };
        let value = serde_json::to_value(&t).unwrap();
        assert_eq!(value["type"], "zoom");
        assert!(value.get("duration").is_none());
    }

    #[test]
    fn settings_defaults() {
        let s = ProjectSettings::default();
        assert_eq!(s.default_duration, 5.0);
        assert_eq!(s.default_transition, TransitionType::Fade);
        assert_eq!(s.export_quality, ExportQuality::Medium);
        assert_eq!(s.resolution, AspectRatio::Portrait);
        let json = serde_json::to_value(&s).unwrap();
        assert_eq!(json["defaultTransition"], "fade");
        assert_eq!(json["resolution"], "9:16");
    }
}
