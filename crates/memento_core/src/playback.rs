//! Time-driven slideshow playback.
//!
//! The engine never reads a clock. Hosts pass `now` into every call and the
//! engine accounts elapsed time in whole microseconds, walking through every
//! photo and transition phase in between. Ticking at 60 fps or jumping
//! straight to a timestamp lands on the same frame.
//!
//! A cycle per photo is: show the photo for its duration, then run the
//! transition into the next photo. The transition leaving photo `i` is the
//! explicit one with `order == i`, so a transition at order 0 plays after the
//! first photo. Without an explicit transition there, the outgoing photo's
//! legacy tag is used, then the project default.

use crate::catalog;
use crate::config::PlaybackConfig;
use crate::transition::{self, LayerTransform, TransitionFrame};
use crate::types::*;
use serde::Serialize;
use uuid::Uuid;

/// Shortest phase the engine will run, so a zero-length phase can't stall
/// the phase walk.
const MIN_PHASE: TimeUs = TimeUs(1);

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum PlaybackState {
    Stopped,
    Playing,
    Paused,
}

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum TransitionSource {
    Explicit(Uuid),
    Legacy,
    ProjectDefault,
}

#[derive(Debug, Clone, Copy, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ResolvedTransition {
    pub kind: TransitionType,
    pub duration: TimeUs,
    pub source: TransitionSource,
}

/// Pick the transition that plays when leaving the photo at `outgoing`.
pub fn resolve_transition(project: &Project, outgoing: usize) -> ResolvedTransition {
    let timeline = &project.timeline;
    if let Some(t) = timeline.transition_at(outgoing) {
        return ResolvedTransition {
            kind: t.kind,
            duration: phase_len(catalog::effective_duration(t.kind, t.duration)),
            source: TransitionSource::Explicit(t.id),
        };
    }
    let (kind, source) = match timeline.photos().get(outgoing).and_then(|p| p.transition) {
        Some(kind) => (kind, TransitionSource::Legacy),
        None => (project.settings.default_transition, TransitionSource::ProjectDefault),
    };
    ResolvedTransition {
        kind,
        duration: phase_len(kind.default_duration_secs()),
        source,
    }
}

/// Display time of the photo at `index`, falling back to the project default
/// and then to `config` when the stored value is unusable.
pub fn photo_duration(project: &Project, index: usize, config: &PlaybackConfig) -> TimeUs {
    let stored = project
        .timeline
        .photos()
        .get(index)
        .map(|p| p.duration)
        .unwrap_or(f64::NAN);
    let seconds = [stored, project.settings.default_duration, config.fallback_photo_duration]
        .into_iter()
        .find(|d| d.is_finite() && *d > 0.0)
        .unwrap_or(5.0);
    phase_len(seconds)
}

fn phase_len(seconds: f64) -> TimeUs {
    TimeUs::from_seconds(seconds).max(MIN_PHASE)
}

// ---------------------------------------------------------------------------
// Frames
// ---------------------------------------------------------------------------

/// One photo to draw, back to front.
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct RenderLayer {
    pub photo_id: Uuid,
    pub uri: String,
    pub transform: LayerTransform,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ActiveTransition {
    pub kind: TransitionType,
    pub source: TransitionSource,
    /// Linear progress in `[0, 1]`.
    pub progress: f64,
    pub frame: TransitionFrame,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PlaybackFrame {
    pub state: PlaybackState,
    pub current_index: usize,
    pub next_index: usize,
    /// Progress through the current photo's display time; 1 while a
    /// transition runs.
    pub photo_progress: f64,
    pub transition: Option<ActiveTransition>,
    pub layers: Vec<RenderLayer>,
}

impl PlaybackFrame {
    fn empty(state: PlaybackState) -> Self {
        Self {
            state,
            current_index: 0,
            next_index: 0,
            photo_progress: 0.0,
            transition: None,
            layers: Vec::new(),
        }
    }
}

/// Consumer of playback frames, e.g. a canvas or a frame dumper.
pub trait Renderer: Send {
    fn render(&mut self, frame: &PlaybackFrame);
}

// ---------------------------------------------------------------------------
// PlaybackEngine
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq)]
enum Phase {
    Photo,
    Transition(ResolvedTransition),
}

#[derive(Debug, Clone)]
pub struct PlaybackEngine {
    state: PlaybackState,
    current_index: usize,
    phase: Phase,
    /// Time spent in `phase` up to `anchor`.
    phase_elapsed: TimeUs,
    /// Clock value `phase_elapsed` was last synced at; set only while playing.
    anchor: Option<TimeUs>,
    config: PlaybackConfig,
}

impl Default for PlaybackEngine {
    fn default() -> Self {
        Self::new(PlaybackConfig::default())
    }
}

impl PlaybackEngine {
    pub fn new(config: PlaybackConfig) -> Self {
        Self {
            state: PlaybackState::Stopped,
            current_index: 0,
            phase: Phase::Photo,
            phase_elapsed: TimeUs::ZERO,
            anchor: None,
            config,
        }
    }

    pub fn state(&self) -> PlaybackState {
        self.state
    }

    pub fn current_index(&self) -> usize {
        self.current_index
    }

    pub fn config(&self) -> &PlaybackConfig {
        &self.config
    }

    pub fn in_transition(&self) -> bool {
        matches!(self.phase, Phase::Transition(_))
    }

    /// Start or resume playback. Returns `false` for an empty timeline.
    pub fn play(&mut self, now: TimeUs, project: &Project) -> bool {
        let len = project.timeline.len();
        if len == 0 {
            self.stop();
            return false;
        }
        match self.state {
            PlaybackState::Playing => {}
            PlaybackState::Paused => self.resume(now),
            PlaybackState::Stopped => {
                if self.current_index >= len {
                    self.current_index = 0;
                }
                self.reset_phase(None);
                self.anchor = Some(now);
                self.set_state(PlaybackState::Playing);
            }
        }
        true
    }

    /// Freeze elapsed-time accounting.
    pub fn pause(&mut self, now: TimeUs) {
        if self.state != PlaybackState::Playing {
            return;
        }
        self.accrue(now);
        self.anchor = None;
        self.set_state(PlaybackState::Paused);
    }

    pub fn resume(&mut self, now: TimeUs) {
        if self.state != PlaybackState::Paused {
            return;
        }
        self.anchor = Some(now);
        self.set_state(PlaybackState::Playing);
    }

    /// Reset to the first photo with no progress.
    pub fn stop(&mut self) {
        self.current_index = 0;
        self.reset_phase(None);
        self.set_state(PlaybackState::Stopped);
    }

    /// Jump to the next photo, skipping any transition in flight.
    pub fn next(&mut self, now: TimeUs, project: &Project) -> bool {
        let len = project.timeline.len();
        if len == 0 {
            return false;
        }
        self.jump((self.current_index + 1) % len, now);
        true
    }

    pub fn previous(&mut self, now: TimeUs, project: &Project) -> bool {
        let len = project.timeline.len();
        if len == 0 {
            return false;
        }
        let index = (self.current_index.min(len - 1) + len - 1) % len;
        self.jump(index, now);
        true
    }

    /// Jump to `index`, keeping the play/pause state.
    pub fn seek_to(&mut self, index: usize, now: TimeUs, project: &Project) -> bool {
        if index >= project.timeline.len() {
            tracing::warn!(index, len = project.timeline.len(), "seek past end");
            return false;
        }
        self.jump(index, now);
        true
    }

    /// Advance to `now` and describe what should be on screen.
    pub fn tick(&mut self, now: TimeUs, project: &Project) -> PlaybackFrame {
        let len = project.timeline.len();
        if len == 0 {
            if self.state != PlaybackState::Stopped {
                self.stop();
            }
            return PlaybackFrame::empty(self.state);
        }
        if self.current_index >= len {
            self.current_index %= len;
            self.reset_phase(self.anchor.map(|_| now));
        }
        self.accrue(now);
        self.settle(project);
        self.frame(project)
    }

    // -- internals --

    fn set_state(&mut self, state: PlaybackState) {
        if self.state != state {
            tracing::debug!(
                from = ?self.state,
                to = ?state,
                index = self.current_index,
                "playback state"
            );
            self.state = state;
        }
    }

    fn jump(&mut self, index: usize, now: TimeUs) {
        tracing::debug!(from = self.current_index, to = index, "playback jump");
        self.current_index = index;
        let anchor = (self.state == PlaybackState::Playing).then_some(now);
        self.reset_phase(anchor);
    }

    fn reset_phase(&mut self, anchor: Option<TimeUs>) {
        self.phase = Phase::Photo;
        self.phase_elapsed = TimeUs::ZERO;
        self.anchor = anchor;
    }

    fn accrue(&mut self, now: TimeUs) {
        if self.state != PlaybackState::Playing {
            return;
        }
        if let Some(anchor) = self.anchor {
            self.phase_elapsed = self.phase_elapsed.saturating_add(now.saturating_since(anchor));
        }
        self.anchor = Some(now);
    }

    fn phase_duration(&self, project: &Project) -> TimeUs {
        match self.phase {
            Phase::Photo => photo_duration(project, self.current_index, &self.config),
            Phase::Transition(t) => t.duration,
        }
    }

    /// Length of one full pass over the timeline, photos plus transitions.
    fn cycle_length(&self, project: &Project) -> TimeUs {
        (0..project.timeline.len()).fold(TimeUs::ZERO, |acc, i| {
            acc.saturating_add(photo_duration(project, i, &self.config))
                .saturating_add(resolve_transition(project, i).duration)
        })
    }

    /// Consume whole phases until `phase_elapsed` falls inside the current
    /// one.
    fn settle(&mut self, project: &Project) {
        let len = project.timeline.len();
        let cycle = self.cycle_length(project);
        if self.phase == Phase::Photo && cycle > TimeUs::ZERO && self.phase_elapsed >= cycle {
            self.phase_elapsed = TimeUs(self.phase_elapsed.0 % cycle.0);
        }
        loop {
            let duration = self.phase_duration(project);
            if self.phase_elapsed < duration {
                break;
            }
            self.phase_elapsed = self.phase_elapsed - duration;
            self.phase = match self.phase {
                Phase::Photo => Phase::Transition(resolve_transition(project, self.current_index)),
                Phase::Transition(_) => {
                    self.current_index = (self.current_index + 1) % len;
                    Phase::Photo
                }
            };
        }
    }

    fn frame(&self, project: &Project) -> PlaybackFrame {
        let photos = project.timeline.photos();
        let len = photos.len();
        let current = &photos[self.current_index];
        let next_index = (self.current_index + 1) % len;
        let progress = |duration: TimeUs| {
            transition::clamp_progress(self.phase_elapsed.0 as f64 / duration.0 as f64)
        };

        match self.phase {
            Phase::Photo => PlaybackFrame {
                state: self.state,
                current_index: self.current_index,
                next_index,
                photo_progress: progress(self.phase_duration(project)),
                transition: None,
                layers: vec![layer(current, LayerTransform::IDENTITY)],
            },
            Phase::Transition(t) => {
                let linear = progress(t.duration);
                let frame = transition::evaluate(t.kind, self.config.easing.apply(linear));
                let incoming = &photos[next_index];
                PlaybackFrame {
                    state: self.state,
                    current_index: self.current_index,
                    next_index,
                    photo_progress: 1.0,
                    transition: Some(ActiveTransition {
                        kind: t.kind,
                        source: t.source,
                        progress: linear,
                        frame,
                    }),
                    layers: vec![
                        layer(current, frame.outgoing),
                        layer(incoming, frame.incoming),
                    ],
                }
            }
        }
    }
}

fn layer(photo: &Photo, transform: LayerTransform) -> RenderLayer {
    RenderLayer {
        photo_id: photo.id,
        uri: photo.uri.clone(),
        transform,
    }
}
