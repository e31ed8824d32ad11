use crate::error::{CoreError, Result};
use crate::timeline::Timeline;
use crate::types::*;
use uuid::Uuid;

/// A command that can be executed, undone, and described.
///
/// Commands capture whatever they need to reverse themselves during
/// `execute`, so `undo` is only valid after a successful `execute`.
pub trait Command: std::fmt::Debug + Send {
    fn execute(&mut self, project: &mut Project) -> Result<()>;
    fn undo(&mut self, project: &mut Project) -> Result<()>;
    fn description(&self) -> &str;
}

/// Undo/redo history stack.
#[derive(Debug)]
pub struct History {
    undo_stack: Vec<Box<dyn Command>>,
    redo_stack: Vec<Box<dyn Command>>,
    max_size: usize,
}

pub const DEFAULT_HISTORY_LIMIT: usize = 100;

impl Default for History {
    fn default() -> Self {
        Self::new(DEFAULT_HISTORY_LIMIT)
    }
}

impl History {
    pub fn new(max_size: usize) -> Self {
        Self {
            undo_stack: Vec::new(),
            redo_stack: Vec::new(),
            max_size: max_size.max(1),
        }
    }

    /// Execute a command and push it onto the undo stack. Clears redo stack.
    /// A command that fails is not recorded.
    pub fn execute(&mut self, mut cmd: Box<dyn Command>, project: &mut Project) -> Result<()> {
        cmd.execute(project)?;
        self.redo_stack.clear();
        self.undo_stack.push(cmd);
        if self.undo_stack.len() > self.max_size {
            self.undo_stack.remove(0);
        }
        Ok(())
    }

    /// Undo the last command. Returns `false` when there is nothing to undo.
    pub fn undo(&mut self, project: &mut Project) -> Result<bool> {
        let Some(mut cmd) = self.undo_stack.pop() else {
            return Ok(false);
        };
        if let Err(e) = cmd.undo(project) {
            self.undo_stack.push(cmd);
            return Err(e);
        }
        self.redo_stack.push(cmd);
        Ok(true)
    }

    /// Redo the last undone command. Returns `false` when there is nothing to
    /// redo.
    pub fn redo(&mut self, project: &mut Project) -> Result<bool> {
        let Some(mut cmd) = self.redo_stack.pop() else {
            return Ok(false);
        };
        if let Err(e) = cmd.execute(project) {
            self.redo_stack.push(cmd);
            return Err(e);
        }
        self.undo_stack.push(cmd);
        Ok(true)
    }

    pub fn can_undo(&self) -> bool {
        !self.undo_stack.is_empty()
    }

    pub fn can_redo(&self) -> bool {
        !self.redo_stack.is_empty()
    }

    pub fn undo_description(&self) -> Option<&str> {
        self.undo_stack.last().map(|cmd| cmd.description())
    }

    pub fn redo_description(&self) -> Option<&str> {
        self.redo_stack.last().map(|cmd| cmd.description())
    }

    pub fn len(&self) -> usize {
        self.undo_stack.len()
    }

    pub fn is_empty(&self) -> bool {
        self.undo_stack.is_empty()
    }

    pub fn clear(&mut self) {
        self.undo_stack.clear();
        self.redo_stack.clear();
    }
}

// ---------------------------------------------------------------------------
// ProjectState
// ---------------------------------------------------------------------------

/// Everything a command may change. Restoring it reproduces the prior
/// project exactly, apart from `updated_at`.
#[derive(Debug, Clone, PartialEq)]
pub struct ProjectState {
    timeline: Timeline,
    settings: ProjectSettings,
    title: String,
    thumbnail: String,
}

impl ProjectState {
    pub fn capture(project: &Project) -> Self {
        Self {
            timeline: project.timeline.clone(),
            settings: project.settings.clone(),
            title: project.title.clone(),
            thumbnail: project.thumbnail.clone(),
        }
    }

    pub fn restore(&self, project: &mut Project) -> Result<()> {
        project.timeline.replace(self.timeline.clone())?;
        project.settings = self.settings.clone();
        project.title = self.title.clone();
        project.thumbnail = self.thumbnail.clone();
        Ok(())
    }
}

fn restore_before(before: &Option<ProjectState>, project: &mut Project) -> Result<()> {
    before
        .as_ref()
        .ok_or_else(|| CoreError::InvalidOperation("command was never executed".into()))?
        .restore(project)
}

// ---------------------------------------------------------------------------
// InsertPhotosCommand
// ---------------------------------------------------------------------------

#[derive(Debug)]
pub struct InsertPhotosCommand {
    photos: Vec<Photo>,
    before: Option<ProjectState>,
}

impl InsertPhotosCommand {
    /// `photos` are fully built (ids assigned) so redo re-inserts the same
    /// photos.
    pub fn new(photos: Vec<Photo>) -> Self {
        Self {
            photos,
            before: None,
        }
    }

    pub fn photo_ids(&self) -> Vec<Uuid> {
        self.photos.iter().map(|p| p.id).collect()
    }
}

impl Command for InsertPhotosCommand {
    fn execute(&mut self, project: &mut Project) -> Result<()> {
        let before = ProjectState::capture(project);
        project.append_photos(self.photos.clone())?;
        self.before = Some(before);
        Ok(())
    }

    fn undo(&mut self, project: &mut Project) -> Result<()> {
        restore_before(&self.before, project)
    }

    fn description(&self) -> &str {
        if self.photos.len() == 1 {
            "Add photo"
        } else {
            "Add photos"
        }
    }
}

// ---------------------------------------------------------------------------
// RemovePhotoCommand
// ---------------------------------------------------------------------------

#[derive(Debug)]
pub struct RemovePhotoCommand {
    photo_id: Uuid,
    before: Option<ProjectState>,
}

impl RemovePhotoCommand {
    pub fn new(photo_id: Uuid) -> Self {
        Self {
            photo_id,
            before: None,
        }
    }
}

impl Command for RemovePhotoCommand {
    fn execute(&mut self, project: &mut Project) -> Result<()> {
        let before = ProjectState::capture(project);
        project.remove_photo(self.photo_id)?;
        self.before = Some(before);
        Ok(())
    }

    fn undo(&mut self, project: &mut Project) -> Result<()> {
        restore_before(&self.before, project)
    }

    fn description(&self) -> &str {
        "Remove photo"
    }
}

// ---------------------------------------------------------------------------
// UpdatePhotoCommand
// ---------------------------------------------------------------------------

#[derive(Debug)]
pub struct UpdatePhotoCommand {
    photo_id: Uuid,
    patch: PhotoPatch,
    old_photo: Option<Photo>,
}

impl UpdatePhotoCommand {
    pub fn new(photo_id: Uuid, patch: PhotoPatch) -> Self {
        Self {
            photo_id,
            patch,
            old_photo: None,
        }
    }
}

impl Command for UpdatePhotoCommand {
    fn execute(&mut self, project: &mut Project) -> Result<()> {
        let old = project
            .timeline
            .photo(self.photo_id)
            .cloned()
            .ok_or(CoreError::PhotoNotFound(self.photo_id))?;
        project.update_photo(self.photo_id, &self.patch)?;
        self.old_photo = Some(old);
        Ok(())
    }

    fn undo(&mut self, project: &mut Project) -> Result<()> {
        let old = self
            .old_photo
            .as_ref()
            .ok_or_else(|| CoreError::InvalidOperation("no old photo saved".into()))?;
        let restore = PhotoPatch {
            duration: Some(old.duration),
            effects: Some(old.effects.clone()),
            transition: Some(old.transition),
        };
        project.update_photo(self.photo_id, &restore)
    }

    fn description(&self) -> &str {
        "Edit photo"
    }
}

// ---------------------------------------------------------------------------
// ReorderPhotoCommand
// ---------------------------------------------------------------------------

#[derive(Debug)]
pub struct ReorderPhotoCommand {
    from: usize,
    to: usize,
    before: Option<ProjectState>,
}

impl ReorderPhotoCommand {
    pub fn new(from: usize, to: usize) -> Self {
        Self {
            from,
            to,
            before: None,
        }
    }
}

impl Command for ReorderPhotoCommand {
    fn execute(&mut self, project: &mut Project) -> Result<()> {
        let before = ProjectState::capture(project);
        project.reorder_photo(self.from, self.to)?;
        self.before = Some(before);
        Ok(())
    }

    fn undo(&mut self, project: &mut Project) -> Result<()> {
        restore_before(&self.before, project)
    }

    fn description(&self) -> &str {
        "Reorder photos"
    }
}

// ---------------------------------------------------------------------------
// AddTransitionCommand
// ---------------------------------------------------------------------------

#[derive(Debug)]
pub struct AddTransitionCommand {
    photo_index: usize,
    kind: TransitionType,
    new_id: Uuid,
    before: Option<ProjectState>,
}

impl AddTransitionCommand {
    pub fn new(photo_index: usize, kind: TransitionType) -> Self {
        Self {
            photo_index,
            kind,
            new_id: Uuid::new_v4(),
            before: None,
        }
    }
}

impl Command for AddTransitionCommand {
    fn execute(&mut self, project: &mut Project) -> Result<()> {
        let before = ProjectState::capture(project);
        project.add_transition(self.photo_index, self.kind, self.new_id)?;
        self.before = Some(before);
        Ok(())
    }

    fn undo(&mut self, project: &mut Project) -> Result<()> {
        restore_before(&self.before, project)
    }

    fn description(&self) -> &str {
        "Add transition"
    }
}

// ---------------------------------------------------------------------------
// RemoveTransitionCommand
// ---------------------------------------------------------------------------

#[derive(Debug)]
pub struct RemoveTransitionCommand {
    transition_id: Uuid,
    before: Option<ProjectState>,
}

impl RemoveTransitionCommand {
    pub fn new(transition_id: Uuid) -> Self {
        Self {
            transition_id,
            before: None,
        }
    }
}

impl Command for RemoveTransitionCommand {
    fn execute(&mut self, project: &mut Project) -> Result<()> {
        let before = ProjectState::capture(project);
        project.remove_transition(self.transition_id)?;
        self.before = Some(before);
        Ok(())
    }

    fn undo(&mut self, project: &mut Project) -> Result<()> {
        restore_before(&self.before, project)
    }

    fn description(&self) -> &str {
        "Remove transition"
    }
}

// ---------------------------------------------------------------------------
// UpdateTransitionCommand
// ---------------------------------------------------------------------------

#[derive(Debug)]
pub struct UpdateTransitionCommand {
    transition_id: Uuid,
    patch: TransitionPatch,
    old: Option<Transition>,
}

impl UpdateTransitionCommand {
    pub fn new(transition_id: Uuid, patch: TransitionPatch) -> Self {
        Self {
            transition_id,
            patch,
            old: None,
        }
    }
}

impl Command for UpdateTransitionCommand {
    fn execute(&mut self, project: &mut Project) -> Result<()> {
        let old = project
            .timeline
            .transition(self.transition_id)
            .cloned()
            .ok_or(CoreError::TransitionNotFound(self.transition_id))?;
        project.update_transition(self.transition_id, &self.patch)?;
        self.old = Some(old);
        Ok(())
    }

    fn undo(&mut self, project: &mut Project) -> Result<()> {
        let old = self
            .old
            .as_ref()
            .ok_or_else(|| CoreError::InvalidOperation("no old transition saved".into()))?;
        let restore = TransitionPatch {
            kind: Some(old.kind),
            duration: Some(old.duration),
        };
        project.update_transition(self.transition_id, &restore)
    }

    fn description(&self) -> &str {
        "Edit transition"
    }
}

// ---------------------------------------------------------------------------
// UpdateSettingsCommand
// ---------------------------------------------------------------------------

#[derive(Debug)]
pub struct UpdateSettingsCommand {
    patch: SettingsPatch,
    old_settings: Option<ProjectSettings>,
}

impl UpdateSettingsCommand {
    pub fn new(patch: SettingsPatch) -> Self {
        Self {
            patch,
            old_settings: None,
        }
    }
}

impl Command for UpdateSettingsCommand {
    fn execute(&mut self, project: &mut Project) -> Result<()> {
        let old = project.settings.clone();
        project.update_settings(&self.patch)?;
        self.old_settings = Some(old);
        Ok(())
    }

    fn undo(&mut self, project: &mut Project) -> Result<()> {
        project.settings = self
            .old_settings
            .clone()
            .ok_or_else(|| CoreError::InvalidOperation("no old settings saved".into()))?;
        Ok(())
    }

    fn description(&self) -> &str {
        "Change settings"
    }
}

// ---------------------------------------------------------------------------
// RenameCommand
// ---------------------------------------------------------------------------

#[derive(Debug)]
pub struct RenameCommand {
    title: String,
    old_title: Option<String>,
}

impl RenameCommand {
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            old_title: None,
        }
    }
}

impl Command for RenameCommand {
    fn execute(&mut self, project: &mut Project) -> Result<()> {
        self.old_title = Some(project.title.clone());
        project.rename(&self.title);
        Ok(())
    }

    fn undo(&mut self, project: &mut Project) -> Result<()> {
        project.title = self
            .old_title
            .clone()
            .ok_or_else(|| CoreError::InvalidOperation("no old title saved".into()))?;
        Ok(())
    }

    fn description(&self) -> &str {
        "Rename project"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_project(n: usize) -> Project {
        let mut project = Project::new("History", ProjectSettings::default());
        let photos: Vec<Photo> = (0..n)
            .map(|i| {
                project.photo_from_asset(&PhotoAsset::new(format!("file:///{i}.jpg"), 640, 480))
            })
            .collect();
        project.append_photos(photos).unwrap();
        project
    }

    fn insert_one(project: &Project, uri: &str) -> Box<InsertPhotosCommand> {
        let photo = project.photo_from_asset(&PhotoAsset::new(uri, 10, 10));
        Box::new(InsertPhotosCommand::new(vec![photo]))
    }

    #[test]
    fn insert_undo_redo() {
        let mut project = Project::new("Empty", ProjectSettings::default());
        let mut history = History::new(100);
        let empty = ProjectState::capture(&project);

        let cmd = insert_one(&project, "file:///a.jpg");
        history.execute(cmd, &mut project).unwrap();
        let after = ProjectState::capture(&project);
        assert_eq!(project.timeline.len(), 1);
        assert_eq!(project.thumbnail, "file:///a.jpg");

        assert!(history.undo(&mut project).unwrap());
        assert_eq!(ProjectState::capture(&project), empty);
        assert!(project.thumbnail.is_empty());

        assert!(history.redo(&mut project).unwrap());
        assert_eq!(ProjectState::capture(&project), after);
    }

    #[test]
    fn new_action_clears_redo() {
        let mut project = make_project(2);
        let mut history = History::new(100);

        let id = project.timeline.photos()[0].id;
        history
            .execute(Box::new(RemovePhotoCommand::new(id)), &mut project)
            .unwrap();
        history.undo(&mut project).unwrap();
        assert!(history.can_redo());

        history
            .execute(Box::new(AddTransitionCommand::new(1, TransitionType::Fade)), &mut project)
            .unwrap();
        assert!(!history.can_redo());
    }

    #[test]
    fn undo_empty_history_reports_false() {
        let mut project = make_project(1);
        let mut history = History::new(100);
        let before = project.clone();
        assert!(!history.undo(&mut project).unwrap());
        assert!(!history.redo(&mut project).unwrap());
        assert_eq!(project, before);
    }

    #[test]
    fn failed_command_is_not_recorded() {
        let mut project = make_project(1);
        let mut history = History::new(100);
        let result =
            history.execute(Box::new(RemovePhotoCommand::new(Uuid::new_v4())), &mut project);
        assert!(matches!(result, Err(CoreError::PhotoNotFound(_))));
        assert!(!history.can_undo());
    }

    #[test]
    fn remove_photo_undo_restores_transitions_and_thumbnail() {
        let mut project = make_project(3);
        project.add_transition(1, TransitionType::Zoom, Uuid::new_v4()).unwrap();
        project.add_transition(3, TransitionType::Fade, Uuid::new_v4()).unwrap();
        let before = ProjectState::capture(&project);
        let mut history = History::new(100);

        let first = project.timeline.photos()[0].id;
        history
            .execute(Box::new(RemovePhotoCommand::new(first)), &mut project)
            .unwrap();
        assert_eq!(project.thumbnail, "file:///1.jpg");
        let after = ProjectState::capture(&project);

        history.undo(&mut project).unwrap();
        assert_eq!(ProjectState::capture(&project), before);
        history.redo(&mut project).unwrap();
        assert_eq!(ProjectState::capture(&project), after);
    }

    #[test]
    fn reorder_undo_redo() {
        let mut project = make_project(3);
        let ids: Vec<Uuid> = project.timeline.photos().iter().map(|p| p.id).collect();
        let mut history = History::new(100);

        history
            .execute(Box::new(ReorderPhotoCommand::new(0, 2)), &mut project)
            .unwrap();
        let moved: Vec<Uuid> = project.timeline.photos().iter().map(|p| p.id).collect();
        assert_eq!(moved, vec![ids[1], ids[2], ids[0]]);

        history.undo(&mut project).unwrap();
        let restored: Vec<Uuid> = project.timeline.photos().iter().map(|p| p.id).collect();
        assert_eq!(restored, ids);

        history.redo(&mut project).unwrap();
        let again: Vec<Uuid> = project.timeline.photos().iter().map(|p| p.id).collect();
        assert_eq!(again, moved);
    }

    #[test]
    fn add_transition_redo_reuses_id() {
        let mut project = make_project(2);
        let mut history = History::new(100);
        history
            .execute(Box::new(AddTransitionCommand::new(1, TransitionType::Push)), &mut project)
            .unwrap();
        let id = project.timeline.transitions()[0].id;

        history.undo(&mut project).unwrap();
        assert!(project.timeline.transitions().is_empty());
        history.redo(&mut project).unwrap();
        assert_eq!(project.timeline.transitions()[0].id, id);
    }

    #[test]
    fn retype_existing_transition_undo_restores_type() {
        let mut project = make_project(2);
        project.add_transition(1, TransitionType::Fade, Uuid::new_v4()).unwrap();
        let mut history = History::new(100);
        history
            .execute(Box::new(AddTransitionCommand::new(1, TransitionType::Cube)), &mut project)
            .unwrap();
        assert_eq!(project.timeline.transitions()[0].kind, TransitionType::Cube);
        history.undo(&mut project).unwrap();
        assert_eq!(project.timeline.transitions()[0].kind, TransitionType::Fade);
    }

    #[test]
    fn update_photo_undo_restores_fields() {
        let mut project = make_project(1);
        let id = project.timeline.photos()[0].id;
        let before = project.timeline.photos()[0].clone();
        let mut history = History::new(100);

        let patch = PhotoPatch {
            duration: Some(9.0),
            effects: Some([PhotoEffect::FilmGrain].into()),
            transition: Some(Some(TransitionType::Zoom)),
        };
        history
            .execute(Box::new(UpdatePhotoCommand::new(id, patch)), &mut project)
            .unwrap();
        assert_eq!(project.timeline.photos()[0].duration, 9.0);

        history.undo(&mut project).unwrap();
        assert_eq!(project.timeline.photos()[0], before);
    }

    #[test]
    fn transition_remove_and_update_undo() {
        let mut project = make_project(3);
        let a = project.add_transition(1, TransitionType::Fade, Uuid::new_v4()).unwrap();
        project.add_transition(2, TransitionType::Zoom, Uuid::new_v4()).unwrap();
        let before = ProjectState::capture(&project);
        let mut history = History::new(100);

        history
            .execute(
                Box::new(UpdateTransitionCommand::new(
                    a,
                    TransitionPatch {
                        kind: Some(TransitionType::Blur),
                        duration: Some(Some(2.0)),
                    },
                )),
                &mut project,
            )
            .unwrap();
        history
            .execute(Box::new(RemoveTransitionCommand::new(a)), &mut project)
            .unwrap();
        assert_eq!(project.timeline.transitions().len(), 1);
        assert_eq!(project.timeline.transitions()[0].order, 1);

        history.undo(&mut project).unwrap();
        history.undo(&mut project).unwrap();
        assert_eq!(ProjectState::capture(&project), before);
    }

    #[test]
    fn settings_and_rename_undo() {
        let mut project = make_project(0);
        let mut history = History::new(100);
        history
            .execute(
                Box::new(UpdateSettingsCommand::new(SettingsPatch {
                    export_quality: Some(ExportQuality::High),
                    ..Default::default()
                })),
                &mut project,
            )
            .unwrap();
        history
            .execute(Box::new(RenameCommand::new("Road trip")), &mut project)
            .unwrap();
        assert_eq!(project.title, "Road trip");
        assert_eq!(history.undo_description(), Some("Rename project"));

        history.undo(&mut project).unwrap();
        assert_eq!(project.title, "History");
        history.undo(&mut project).unwrap();
        assert_eq!(project.settings, ProjectSettings::default());
    }

    #[test]
    fn max_size_limits_undo_stack() {
        let mut project = make_project(0);
        let mut history = History::new(3);
        for i in 0..5 {
            let cmd = insert_one(&project, &format!("file:///{i}.jpg"));
            history.execute(cmd, &mut project).unwrap();
        }
        assert_eq!(history.len(), 3);

        let mut undone = 0;
        while history.undo(&mut project).unwrap() {
            undone += 1;
        }
        assert_eq!(undone, 3);
        // The two oldest inserts were evicted and stay applied.
        assert_eq!(project.timeline.len(), 2);
    }

    #[test]
    fn can_undo_can_redo_flags() {
        let mut project = make_project(1);
        let mut history = History::default();
        assert!(!history.can_undo());
        assert!(!history.can_redo());

        history
            .execute(Box::new(AddTransitionCommand::new(0, TransitionType::Fade)), &mut project)
            .unwrap();
        assert!(history.can_undo());
        assert!(!history.can_redo());

        history.undo(&mut project).unwrap();
        assert!(!history.can_undo());
        assert!(history.can_redo());
        assert_eq!(history.redo_description(), Some("Add transition"));
    }

    #[test]
    fn description_methods() {
        let project = make_project(0);
        assert_eq!(insert_one(&project, "file:///x.jpg").description(), "Add photo");
        assert_eq!(RemovePhotoCommand::new(Uuid::new_v4()).description(), "Remove photo");
        assert_eq!(ReorderPhotoCommand::new(0, 1).description(), "Reorder photos");
        assert_eq!(
            UpdateSettingsCommand::new(SettingsPatch::default()).description(),
            "Change settings"
        );
    }
}
