//! The owned editing facade: one project, its undo history, the user's
//! entitlement and a revision counter that observers subscribe to.
//!
//! Every method reports an [`EditOutcome`] instead of an error. Unknown ids
//! and out-of-range indices are a `NotFound` no-op, paid features without
//! entitlement are `Gated`, and in every non-`Applied` case the project is
//! left exactly as it was.

use std::sync::Arc;

use tokio::sync::watch;
use uuid::Uuid;

use crate::catalog;
use crate::entitlement::{Entitlement, PremiumFeature, TierLimits};
use crate::error::CoreError;
use crate::history::*;
use crate::snapshot::ProjectSnapshot;
use crate::types::*;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Missing {
    Photo(Uuid),
    Transition(Uuid),
    PhotoIndex(usize),
    Slot(usize),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GateReason {
    PremiumTransition(TransitionType),
    PhotoLimit { limit: usize },
    EffectLimit { limit: usize },
    ExportQuality(ExportQuality),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EditOutcome {
    Applied,
    Unchanged,
    NotFound(Missing),
    Gated(GateReason),
    Rejected(String),
}

impl EditOutcome {
    pub fn is_applied(&self) -> bool {
        matches!(self, EditOutcome::Applied)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct DragState {
    from: usize,
    to: usize,
}

pub struct Editor {
    project: Project,
    history: History,
    entitlement: Arc<dyn Entitlement>,
    revision: watch::Sender<u64>,
    drag: Option<DragState>,
}

impl std::fmt::Debug for Editor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Editor")
            .field("project", &self.project.id)
            .field("revision", &*self.revision.borrow())
            .field("history", &self.history.len())
            .field("drag", &self.drag)
            .finish()
    }
}

impl Editor {
    pub fn new(project: Project, entitlement: Arc<dyn Entitlement>, history_limit: usize) -> Self {
        let (revision, _) = watch::channel(0);
        Self {
            project,
            history: History::new(history_limit),
            entitlement,
            revision,
            drag: None,
        }
    }

    pub fn project(&self) -> &Project {
        &self.project
    }

    pub fn snapshot(&self) -> ProjectSnapshot {
        ProjectSnapshot::from(&self.project)
    }

    /// Receiver that sees the revision bump after every applied change.
    pub fn subscribe(&self) -> watch::Receiver<u64> {
        self.revision.subscribe()
    }

    pub fn revision(&self) -> u64 {
        *self.revision.borrow()
    }

    pub fn set_entitlement(&mut self, entitlement: Arc<dyn Entitlement>) {
        self.entitlement = entitlement;
    }

    pub fn limits(&self) -> TierLimits {
        TierLimits::for_entitlement(self.entitlement.as_ref())
    }

    /// Swap in a different project. History is discarded.
    pub fn load_project(&mut self, project: Project) {
        tracing::info!(project_id = %project.id, title = %project.title, "project loaded");
        self.project = project;
        self.history.clear();
        self.drag = None;
        self.bump();
    }

    // -- photos --

    pub fn insert_photos(&mut self, assets: &[PhotoAsset]) -> EditOutcome {
        if assets.is_empty() {
            return EditOutcome::Unchanged;
        }
        let limit = self.limits().max_photos;
        if self.project.timeline.len() + assets.len() > limit {
            return self.gated(GateReason::PhotoLimit { limit });
        }
        let photos: Vec<Photo> = assets
            .iter()
            .map(|a| self.project.photo_from_asset(a))
            .collect();
        self.apply(Box::new(InsertPhotosCommand::new(photos)))
    }

    pub fn remove_photo(&mut self, photo_id: Uuid) -> EditOutcome {
        self.apply(Box::new(RemovePhotoCommand::new(photo_id)))
    }

    pub fn update_photo(&mut self, photo_id: Uuid, patch: PhotoPatch) -> EditOutcome {
        if let Some(effects) = &patch.effects {
            let limit = self.limits().max_effects;
            if effects.len() > limit {
                return self.gated(GateReason::EffectLimit { limit });
            }
        }
        if let Some(Some(kind)) = patch.transition {
            if let Some(reason) = self.transition_gate(kind) {
                return self.gated(reason);
            }
        }
        if self.leaves_unchanged(|p| p.update_photo(photo_id, &patch)) {
            return EditOutcome::Unchanged;
        }
        self.apply(Box::new(UpdatePhotoCommand::new(photo_id, patch)))
    }

    pub fn reorder_photo(&mut self, from: usize, to: usize) -> EditOutcome {
        let len = self.project.timeline.len();
        if let Some(index) = [from, to].into_iter().find(|i| *i >= len) {
            return self.not_found(Missing::PhotoIndex(index));
        }
        if from == to {
            return EditOutcome::Unchanged;
        }
        self.apply(Box::new(ReorderPhotoCommand::new(from, to)))
    }

    // -- drag session --

    /// Start dragging the photo at `from`. Nothing changes until `end_drag`.
    pub fn begin_drag(&mut self, from: usize) -> EditOutcome {
        if from >= self.project.timeline.len() {
            return self.not_found(Missing::PhotoIndex(from));
        }
        self.drag = Some(DragState { from, to: from });
        tracing::debug!(from, "drag started");
        EditOutcome::Unchanged
    }

    /// Move the drag target. Returns `false` when no drag is active.
    pub fn drag_to(&mut self, index: usize) -> bool {
        let len = self.project.timeline.len();
        match self.drag.as_mut() {
            Some(drag) if len > 0 => {
                drag.to = index.min(len - 1);
                true
            }
            _ => false,
        }
    }

    /// Photo ids in the order the active drag would leave them.
    pub fn drag_preview(&self) -> Option<Vec<Uuid>> {
        let drag = self.drag?;
        let mut ids: Vec<Uuid> = self.project.timeline.photos().iter().map(|p| p.id).collect();
        if drag.from < ids.len() && drag.to < ids.len() {
            let id = ids.remove(drag.from);
            ids.insert(drag.to, id);
        }
        Some(ids)
    }

    pub fn is_dragging(&self) -> bool {
        self.drag.is_some()
    }

    /// Commit the drag as a single reorder.
    pub fn end_drag(&mut self) -> EditOutcome {
        match self.drag.take() {
            Some(drag) => self.reorder_photo(drag.from, drag.to),
            None => EditOutcome::Unchanged,
        }
    }

    pub fn cancel_drag(&mut self) {
        if self.drag.take().is_some() {
            tracing::debug!("drag cancelled");
        }
    }

    // -- transitions --

    pub fn add_transition(&mut self, photo_index: usize, kind: TransitionType) -> EditOutcome {
        if let Some(reason) = self.transition_gate(kind) {
            return self.gated(reason);
        }
        if photo_index > self.project.timeline.len() {
            return self.not_found(Missing::Slot(photo_index));
        }
        if self
            .project
            .timeline
            .transition_at(photo_index)
            .is_some_and(|t| t.kind == kind)
        {
            return EditOutcome::Unchanged;
        }
        self.apply(Box::new(AddTransitionCommand::new(photo_index, kind)))
    }

    pub fn remove_transition(&mut self, transition_id: Uuid) -> EditOutcome {
        self.apply(Box::new(RemoveTransitionCommand::new(transition_id)))
    }

    pub fn update_transition(
        &mut self,
        transition_id: Uuid,
        patch: TransitionPatch,
    ) -> EditOutcome {
        if let Some(kind) = patch.kind {
            if let Some(reason) = self.transition_gate(kind) {
                return self.gated(reason);
            }
        }
        if self.leaves_unchanged(|p| p.update_transition(transition_id, &patch)) {
            return EditOutcome::Unchanged;
        }
        self.apply(Box::new(UpdateTransitionCommand::new(transition_id, patch)))
    }

    // -- project --

    pub fn update_settings(&mut self, patch: SettingsPatch) -> EditOutcome {
        if patch.export_quality == Some(ExportQuality::High)
            && !self.entitlement.has_feature(PremiumFeature::Export4K)
        {
            return self.gated(GateReason::ExportQuality(ExportQuality::High));
        }
        if let Some(kind) = patch.default_transition {
            if let Some(reason) = self.transition_gate(kind) {
                return self.gated(reason);
            }
        }
        if self.leaves_unchanged(|p| p.update_settings(&patch)) {
            return EditOutcome::Unchanged;
        }
        self.apply(Box::new(UpdateSettingsCommand::new(patch)))
    }

    pub fn rename(&mut self, title: &str) -> EditOutcome {
        if self.leaves_unchanged(|p| {
            p.rename(title);
            Ok(())
        }) {
            return EditOutcome::Unchanged;
        }
        self.apply(Box::new(RenameCommand::new(title)))
    }

    // -- history --

    pub fn undo(&mut self) -> bool {
        self.drag = None;
        match self.history.undo(&mut self.project) {
            Ok(true) => {
                self.changed();
                true
            }
            Ok(false) => false,
            Err(e) => {
                tracing::error!(error = %e, "undo failed");
                false
            }
        }
    }

    pub fn redo(&mut self) -> bool {
        self.drag = None;
        match self.history.redo(&mut self.project) {
            Ok(true) => {
                self.changed();
                true
            }
            Ok(false) => false,
            Err(e) => {
                tracing::error!(error = %e, "redo failed");
                false
            }
        }
    }

    pub fn can_undo(&self) -> bool {
        self.history.can_undo()
    }

    pub fn can_redo(&self) -> bool {
        self.history.can_redo()
    }

    pub fn undo_description(&self) -> Option<&str> {
        self.history.undo_description()
    }

    pub fn redo_description(&self) -> Option<&str> {
        self.history.redo_description()
    }

    // -- internals --

    fn transition_gate(&self, kind: TransitionType) -> Option<GateReason> {
        if kind.is_premium() && !self.entitlement.has_feature(PremiumFeature::PremiumTransitions) {
            Some(GateReason::PremiumTransition(kind))
        } else {
            None
        }
    }

    /// Whether `edit` would succeed without changing anything. Failing edits
    /// report `false` so `apply` can classify the error.
    fn leaves_unchanged(
        &self,
        edit: impl FnOnce(&mut Project) -> crate::error::Result<()>,
    ) -> bool {
        let mut trial = self.project.clone();
        edit(&mut trial).is_ok() && trial == self.project
    }

    fn apply(&mut self, cmd: Box<dyn Command>) -> EditOutcome {
        let description = cmd.description().to_string();
        match self.history.execute(cmd, &mut self.project) {
            Ok(()) => {
                tracing::debug!(
                    action = %description,
                    photos = self.project.timeline.len(),
                    "edit applied"
                );
                self.changed();
                EditOutcome::Applied
            }
            Err(CoreError::PhotoNotFound(id)) => self.not_found(Missing::Photo(id)),
            Err(CoreError::TransitionNotFound(id)) => self.not_found(Missing::Transition(id)),
            Err(CoreError::IndexOutOfRange { index, .. }) => {
                self.not_found(Missing::PhotoIndex(index))
            }
            Err(e) => {
                tracing::warn!(action = %description, error = %e, "edit rejected");
                EditOutcome::Rejected(e.to_string())
            }
        }
    }

    fn changed(&mut self) {
        self.project.touch();
        self.bump();
    }

    fn bump(&self) {
        self.revision.send_modify(|rev| *rev += 1);
    }

    fn not_found(&self, missing: Missing) -> EditOutcome {
        tracing::warn!(?missing, "edit target not found");
        EditOutcome::NotFound(missing)
    }

    fn gated(&self, reason: GateReason) -> EditOutcome {
        tracing::warn!(?reason, "edit requires premium");
        EditOutcome::Gated(reason)
    }
}

/// Premium transition types are still listed, but only unlocked ones can be
/// chosen.
pub fn selectable_transitions(entitlement: &dyn Entitlement) -> Vec<TransitionType> {
    catalog::available(entitlement.has_feature(PremiumFeature::PremiumTransitions))
        .map(|s| s.kind)
        .collect()
}
