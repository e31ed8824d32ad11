use crate::error::{CoreError, Result};
use crate::timeline::{renumber, Timeline};
use crate::types::*;
use chrono::Utc;
use uuid::Uuid;

pub const DEFAULT_TITLE: &str = "Untitled Project";

impl Project {
    pub fn new(title: impl Into<String>, settings: ProjectSettings) -> Self {
        let now = Utc::now();
        let title = title.into();
        Self {
            id: Uuid::new_v4(),
            title: normalize_title(&title),
            created_at: now,
            updated_at: now,
            timeline: Timeline::new(),
            settings,
            thumbnail: String::new(),
        }
    }

    pub fn touch(&mut self) {
        self.updated_at = Utc::now();
    }

    /// Build a photo for `asset` using this project's defaults. The default
    /// transition type goes into the legacy per-photo tag only.
    pub fn photo_from_asset(&self, asset: &PhotoAsset) -> Photo {
        Photo {
            id: Uuid::new_v4(),
            uri: asset.uri.clone(),
            width: asset.width,
            height: asset.height,
            duration: self.settings.default_duration,
            effects: Default::default(),
            transition: Some(self.settings.default_transition),
            order: 0,
        }
    }

    /// Append photos at the end of the timeline.
    ///
    /// A trailing transition (order == old length) stays trailing. The first
    /// photo of an empty project becomes the thumbnail.
    pub fn append_photos(&mut self, new_photos: Vec<Photo>) -> Result<()> {
        if new_photos.is_empty() {
            return Ok(());
        }
        let (mut photos, mut transitions) = self.timeline.to_parts();
        let old_len = photos.len();
        let added = new_photos.len();
        let first_uri = new_photos[0].uri.clone();

        photos.extend(new_photos);
        renumber(&mut photos);
        for t in transitions.iter_mut().filter(|t| t.order >= old_len) {
            t.order += added;
        }

        self.timeline.replace(Timeline::assemble(photos, transitions))?;
        if self.thumbnail.is_empty() {
            self.thumbnail = first_uri;
        }
        Ok(())
    }

    /// Remove a photo, returning it with the index it occupied.
    ///
    /// Transitions after the removed slot move down by one. The transition
    /// at the removed slot itself stays and now precedes the photo that slid
    /// into it, unless the following transition also lands there.
    pub fn remove_photo(&mut self, photo_id: Uuid) -> Result<(usize, Photo)> {
        let index = self
            .timeline
            .photo_index(photo_id)
            .ok_or(CoreError::PhotoNotFound(photo_id))?;
        let (mut photos, transitions) = self.timeline.to_parts();
        let removed = photos.remove(index);
        renumber(&mut photos);

        let len = photos.len();
        let collides = transitions.iter().any(|t| t.order == index + 1);
        let transitions = transitions
            .into_iter()
            .filter(|t| !(collides && t.order == index))
            .map(|mut t| {
                if t.order > index {
                    t.order -= 1;
                }
                t
            })
            .filter(|t| t.order <= len)
            .collect();

        self.timeline.replace(Timeline::assemble(photos, transitions))?;
        if self.thumbnail == removed.uri || self.timeline.is_empty() {
            self.thumbnail = self
                .timeline
                .photos()
                .first()
                .map(|p| p.uri.clone())
                .unwrap_or_default();
        }
        Ok((index, removed))
    }

    /// Merge `patch` into a photo. Position is never changed.
    pub fn update_photo(&mut self, photo_id: Uuid, patch: &PhotoPatch) -> Result<()> {
        if let Some(d) = patch.duration {
            validate_duration(d)?;
        }
        let (mut photos, transitions) = self.timeline.to_parts();
        let photo = photos
            .iter_mut()
            .find(|p| p.id == photo_id)
            .ok_or(CoreError::PhotoNotFound(photo_id))?;

        if let Some(d) = patch.duration {
            photo.duration = d;
        }
        if let Some(effects) = &patch.effects {
            photo.effects = effects.clone();
        }
        if let Some(transition) = patch.transition {
            photo.transition = transition;
        }

        self.timeline.replace(Timeline::assemble(photos, transitions))
    }

    /// Move the photo at `from` to `to`. Transitions keep their slots; the
    /// photo count is unchanged so every slot stays in range.
    pub fn reorder_photo(&mut self, from: usize, to: usize) -> Result<()> {
        let len = self.timeline.len();
        for index in [from, to] {
            if index >= len {
                return Err(CoreError::IndexOutOfRange { index, len });
            }
        }
        if from == to {
            return Ok(());
        }
        let (mut photos, transitions) = self.timeline.to_parts();
        let photo = photos.remove(from);
        photos.insert(to, photo);
        renumber(&mut photos);

        let transitions = clamp_transitions(transitions, photos.len());
        self.timeline.replace(Timeline::assemble(photos, transitions))
    }

    /// Put a transition of `kind` before the photo at `photo_index`.
    ///
    /// An existing transition at that slot is retyped in place and keeps its
    /// id. Otherwise transitions at or after the slot move up by one, those
    /// pushed past the end are dropped, and a new transition with
    /// `new_id` is inserted. Returns the id of the transition at the slot.
    pub fn add_transition(
        &mut self,
        photo_index: usize,
        kind: TransitionType,
        new_id: Uuid,
    ) -> Result<Uuid> {
        let len = self.timeline.len();
        if photo_index > len {
            return Err(CoreError::IndexOutOfRange {
                index: photo_index,
                len,
            });
        }
        let (photos, mut transitions) = self.timeline.to_parts();

        let id = if let Some(existing) = transitions.iter_mut().find(|t| t.order == photo_index) {
            existing.kind = kind;
            existing.id
        } else {
            for t in transitions.iter_mut().filter(|t| t.order >= photo_index) {
                t.order += 1;
            }
            transitions.retain(|t| t.order <= len);
            transitions.push(Transition {
                id: new_id,
                kind,
                duration: None,
                order: photo_index,
            });
            transitions.sort_by_key(|t| t.order);
            new_id
        };

        self.timeline.replace(Timeline::assemble(photos, transitions))?;
        Ok(id)
    }

    /// Delete a transition; every transition with a greater order moves down
    /// by one.
    pub fn remove_transition(&mut self, transition_id: Uuid) -> Result<Transition> {
        let (photos, mut transitions) = self.timeline.to_parts();
        let pos = transitions
            .iter()
            .position(|t| t.id == transition_id)
            .ok_or(CoreError::TransitionNotFound(transition_id))?;
        let removed = transitions.remove(pos);
        for t in transitions.iter_mut().filter(|t| t.order > removed.order) {
            t.order -= 1;
        }
        self.timeline.replace(Timeline::assemble(photos, transitions))?;
        Ok(removed)
    }

    pub fn update_transition(
        &mut self,
        transition_id: Uuid,
        patch: &TransitionPatch,
    ) -> Result<()> {
        if let Some(Some(d)) = patch.duration {
            validate_duration(d)?;
        }
        let (photos, mut transitions) = self.timeline.to_parts();
        let transition = transitions
            .iter_mut()
            .find(|t| t.id == transition_id)
            .ok_or(CoreError::TransitionNotFound(transition_id))?;

        if let Some(kind) = patch.kind {
            transition.kind = kind;
        }
        if let Some(duration) = patch.duration {
            transition.duration = duration;
        }
        self.timeline.replace(Timeline::assemble(photos, transitions))
    }

    pub fn update_settings(&mut self, patch: &SettingsPatch) -> Result<()> {
        if let Some(d) = patch.default_duration {
            validate_duration(d)?;
        }
        if let Some(d) = patch.default_duration {
            self.settings.default_duration = d;
        }
        if let Some(t) = patch.default_transition {
            self.settings.default_transition = t;
        }
        if let Some(q) = patch.export_quality {
            self.settings.export_quality = q;
        }
        if let Some(r) = patch.resolution {
            self.settings.resolution = r;
        }
        Ok(())
    }

    pub fn rename(&mut self, title: &str) {
        self.title = normalize_title(title);
    }
}

/// Pull any transition past `len` back to `len`, dropping it if that slot is
/// already taken.
fn clamp_transitions(transitions: Vec<Transition>, len: usize) -> Vec<Transition> {
    let mut kept: Vec<Transition> = Vec::with_capacity(transitions.len());
    for mut t in transitions {
        if t.order > len {
            t.order = len;
        }
        if kept.iter().any(|k| k.order == t.order) {
            continue;
        }
        kept.push(t);
    }
    kept.sort_by_key(|t| t.order);
    kept
}

/// Longest display or transition time an edit may set: one day.
pub const MAX_DURATION_SECS: f64 = 24.0 * 60.0 * 60.0;

fn validate_duration(seconds: f64) -> Result<()> {
    if seconds.is_finite() && seconds > 0.0 && seconds <= MAX_DURATION_SECS {
        Ok(())
    } else {
        Err(CoreError::InvalidOperation(format!(
            "duration must be between 0 and {MAX_DURATION_SECS} seconds, got {seconds}"
        )))
    }
}

fn normalize_title(title: &str) -> String {
    let trimmed = title.trim();
    if trimmed.is_empty() {
        DEFAULT_TITLE.to_string()
    } else {
        trimmed.to_string()
    }
}
