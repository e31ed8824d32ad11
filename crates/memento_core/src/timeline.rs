//! The ordered photo/transition sequence of a project.
//!
//! A [`Timeline`] is only ever replaced as a whole. Every constructor re-derives
//! photo `order` fields from vector position and checks the transition
//! invariants, so a timeline that exists is a timeline that is consistent:
//!
//! - `photos[i].order == i` for every photo,
//! - no two transitions share an `order`,
//! - every transition `order` lies in `[0, photos.len()]`,
//! - transitions are sorted by `order`.

use crate::error::{CoreError, Result};
use crate::types::{Photo, TimeUs, Transition};
use uuid::Uuid;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Timeline {
    photos: Vec<Photo>,
    transitions: Vec<Transition>,
}

impl Timeline {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a timeline from raw parts, e.g. a loaded snapshot.
    ///
    /// Photo order is taken from vector position, never from the stored
    /// `order` field. Transitions are sorted; duplicates or out-of-range
    /// orders are rejected.
    pub fn from_parts(mut photos: Vec<Photo>, mut transitions: Vec<Transition>) -> Result<Self> {
        renumber(&mut photos);
        transitions.sort_by_key(|t| t.order);
        let timeline = Self {
            photos,
            transitions,
        };
        timeline.validate()?;
        Ok(timeline)
    }

    pub fn photos(&self) -> &[Photo] {
        &self.photos
    }

    pub fn transitions(&self) -> &[Transition] {
        &self.transitions
    }

    /// Explicit transition anchored at `photo_index`, if any.
    pub fn transition_at(&self, photo_index: usize) -> Option<&Transition> {
        self.transitions
            .binary_search_by_key(&photo_index, |t| t.order)
            .ok()
            .map(|i| &self.transitions[i])
    }

    pub fn len(&self) -> usize {
        self.photos.len()
    }

    pub fn is_empty(&self) -> bool {
        self.photos.is_empty()
    }

    pub fn photo(&self, photo_id: Uuid) -> Option<&Photo> {
        self.photos.iter().find(|p| p.id == photo_id)
    }

    pub fn photo_index(&self, photo_id: Uuid) -> Option<usize> {
        self.photos.iter().position(|p| p.id == photo_id)
    }

    pub fn transition(&self, transition_id: Uuid) -> Option<&Transition> {
        self.transitions.iter().find(|t| t.id == transition_id)
    }

    /// Sum of photo display times. Transitions are resolved per playback
    /// and not included here.
    pub fn total_duration(&self) -> TimeUs {
        let seconds: f64 = self.photos.iter().map(|p| p.duration.max(0.0)).sum();
        TimeUs::from_seconds(seconds)
    }

    /// Check every structural invariant, naming the first one that fails.
    pub fn validate(&self) -> Result<()> {
        for (i, photo) in self.photos.iter().enumerate() {
            if photo.order != i {
                return Err(CoreError::InvariantViolation(format!(
                    "photo {} has order {} at index {}",
                    photo.id, photo.order, i
                )));
            }
        }

        let len = self.photos.len();
        let mut previous: Option<usize> = None;
        for transition in &self.transitions {
            if transition.order > len {
                return Err(CoreError::InvariantViolation(format!(
                    "transition {} has order {} beyond {} photos",
                    transition.id, transition.order, len
                )));
            }
            match previous {
                Some(prev) if prev == transition.order => {
                    return Err(CoreError::InvariantViolation(format!(
                        "two transitions share order {}",
                        transition.order
                    )));
                }
                Some(prev) if prev > transition.order => {
                    return Err(CoreError::InvariantViolation(
                        "transitions are not sorted by order".into(),
                    ));
                }
                _ => {}
            }
            previous = Some(transition.order);
        }
        Ok(())
    }

    /// Swap in a whole new model. The replacement is validated first; on error
    /// the current timeline is left untouched.
    pub(crate) fn replace(&mut self, next: Timeline) -> Result<()> {
        next.validate()?;
        *self = next;
        Ok(())
    }

    /// Decompose into raw parts for building a working copy.
    pub(crate) fn to_parts(&self) -> (Vec<Photo>, Vec<Transition>) {
        (self.photos.clone(), self.transitions.clone())
    }

    /// Assemble a working copy whose invariants the caller has already
    /// re-derived; `replace` validates it before it becomes visible.
    pub(crate) fn assemble(photos: Vec<Photo>, transitions: Vec<Transition>) -> Self {
        Self {
            photos,
            transitions,
        }
    }
}

/// Re-derive `order` from position.
pub(crate) fn renumber(photos: &mut [Photo]) {
    for (i, photo) in photos.iter_mut().enumerate() {
        photo.order = i;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::TransitionType;
    use std::collections::BTreeSet;

    fn photo(order: usize) -> Photo {
        Photo {
            id: Uuid::new_v4(),
            uri: format!("file:///photo-{order}.jpg"),
            width: 100,
            height: 100,
            duration: 3.0,
            effects: BTreeSet::new(),
            transition: None,
            order,
        }
    }

    fn transition(kind: TransitionType, order: usize) -> Transition {
        Transition {
            id: Uuid::new_v4(),
            kind,
            duration: None,
            order,
        }
    }

    #[test]
    fn from_parts_rederives_photo_order() {
        let mut a = photo(7);
        a.order = 7;
        let b = photo(3);
        let tl = Timeline::from_parts(vec![a, b], vec![]).unwrap();
        assert_eq!(tl.photos()[0].order, 0);
        assert_eq!(tl.photos()[1].order, 1);
    }

    #[test]
    fn from_parts_sorts_transitions() {
        let tl = Timeline::from_parts(
            vec![photo(0), photo(1), photo(2)],
            vec![
                transition(TransitionType::Zoom, 2),
                transition(TransitionType::Fade, 0),
            ],
        )
        .unwrap();
        assert_eq!(tl.transitions()[0].order, 0);
        assert_eq!(tl.transitions()[1].order, 2);
    }

    #[test]
    fn from_parts_rejects_duplicate_orders() {
        let result = Timeline::from_parts(
            vec![photo(0), photo(1)],
            vec![
                transition(TransitionType::Fade, 1),
                transition(TransitionType::Zoom, 1),
            ],
        );
        assert!(matches!(result, Err(CoreError::InvariantViolation(_))));
    }

    #[test]
    fn from_parts_rejects_out_of_range_order() {
        let result = Timeline::from_parts(
            vec![photo(0)],
            vec![transition(TransitionType::Fade, 2)],
        );
        assert!(matches!(result, Err(CoreError::InvariantViolation(_))));
    }

    #[test]
    fn trailing_transition_is_valid() {
        let tl = Timeline::from_parts(
            vec![photo(0), photo(1)],
            vec![transition(TransitionType::Fade, 2)],
        )
        .unwrap();
        assert_eq!(tl.transition_at(2).unwrap().kind, TransitionType::Fade);
        assert!(tl.transition_at(0).is_none());
    }

    #[test]
    fn replace_rejects_invalid_model_and_keeps_old() {
        let mut tl = Timeline::from_parts(vec![photo(0)], vec![]).unwrap();
        let before = tl.clone();
        let mut bad = photo(0);
        bad.order = 4;
        let result = tl.replace(Timeline::assemble(vec![bad], vec![]));
        assert!(result.is_err());
        assert_eq!(tl, before);
    }

    #[test]
    fn lookup_helpers() {
        let a = photo(0);
        let b = photo(1);
        let b_id = b.id;
        let t = transition(TransitionType::Push, 1);
        let t_id = t.id;
        let tl = Timeline::from_parts(vec![a, b], vec![t]).unwrap();
        assert_eq!(tl.len(), 2);
        assert!(!tl.is_empty());
        assert_eq!(tl.photo_index(b_id), Some(1));
        assert_eq!(tl.photo(b_id).unwrap().order, 1);
        assert_eq!(tl.transition(t_id).unwrap().order, 1);
        assert_eq!(tl.photo_index(Uuid::new_v4()), None);
    }

    #[test]
    fn total_duration_sums_photos() {
        let mut long = photo(1);
        long.duration = 4.5;
        let tl = Timeline::from_parts(
            vec![photo(0), long],
            vec![transition(TransitionType::Zoom, 1)],
        )
        .unwrap();
        assert_eq!(tl.total_duration(), TimeUs::from_seconds(7.5));
    }
}
