use crate::error::{CoreError, Result};
use crate::timeline::Timeline;
use crate::types::*;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use uuid::Uuid;

pub const PROJECT_EXTENSION: &str = "memento";

/// Serialized form of a project, as handed to persistence and encoders.
///
/// Loading goes through [`Timeline::from_parts`], so stored `order` fields
/// are never trusted.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ProjectSnapshot {
    pub id: Uuid,
    pub title: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub photos: Vec<Photo>,
    #[serde(default)]
    pub transitions: Vec<Transition>,
    #[serde(default)]
    pub settings: ProjectSettings,
    #[serde(default)]
    pub thumbnail: String,
}

#[derive(Serialize)]
struct ChangeKey<'a> {
    photos: &'a [Photo],
    transitions: &'a [Transition],
    settings: &'a ProjectSettings,
    title: &'a str,
}

impl ProjectSnapshot {
    /// Serialization of the user-editable content only. Two snapshots with
    /// the same key need not be saved twice.
    pub fn change_key(&self) -> Result<String> {
        let key = ChangeKey {
            photos: &self.photos,
            transitions: &self.transitions,
            settings: &self.settings,
            title: &self.title,
        };
        Ok(serde_json::to_string(&key)?)
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn from_json(data: &str) -> Result<Self> {
        Ok(serde_json::from_str(data)?)
    }

    /// Save as pretty-printed JSON, appending `.memento` if missing.
    pub fn save_to_file(&self, path: impl AsRef<Path>) -> Result<PathBuf> {
        let path = ensure_extension(path.as_ref());
        std::fs::write(&path, self.to_json()?)?;
        Ok(path)
    }

    pub fn load_from_file(path: impl AsRef<Path>) -> Result<Self> {
        let data = std::fs::read_to_string(path.as_ref())?;
        Self::from_json(&data)
    }
}

impl From<&Project> for ProjectSnapshot {
    fn from(project: &Project) -> Self {
        Self {
            id: project.id,
            title: project.title.clone(),
            created_at: project.created_at,
            updated_at: project.updated_at,
            photos: project.timeline.photos().to_vec(),
            transitions: project.timeline.transitions().to_vec(),
            settings: project.settings.clone(),
            thumbnail: project.thumbnail.clone(),
        }
    }
}

impl TryFrom<ProjectSnapshot> for Project {
    type Error = CoreError;

    fn try_from(snapshot: ProjectSnapshot) -> Result<Self> {
        let timeline = Timeline::from_parts(snapshot.photos, snapshot.transitions)?;
        let thumbnail = if snapshot.thumbnail.is_empty() {
            timeline
                .photos()
                .first()
                .map(|p| p.uri.clone())
                .unwrap_or_default()
        } else {
            snapshot.thumbnail
        };
        Ok(Project {
            id: snapshot.id,
            title: snapshot.title,
            created_at: snapshot.created_at,
            updated_at: snapshot.updated_at,
            timeline,
            settings: snapshot.settings,
            thumbnail,
        })
    }
}

pub fn ensure_extension(path: &Path) -> PathBuf {
    if path.extension().and_then(|e| e.to_str()) == Some(PROJECT_EXTENSION) {
        path.to_path_buf()
    } else {
        let mut name = path.file_name().unwrap_or_default().to_os_string();
        name.push(".");
        name.push(PROJECT_EXTENSION);
        path.with_file_name(name)
    }
}
