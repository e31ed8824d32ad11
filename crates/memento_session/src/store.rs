//! Project persistence behind an async trait.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use memento_core::snapshot::PROJECT_EXTENSION;
use memento_core::ProjectSnapshot;
use uuid::Uuid;

use crate::error::{Result, SessionError};

#[async_trait]
pub trait ProjectStore: Send + Sync {
    async fn save(&self, project_id: Uuid, snapshot: &ProjectSnapshot) -> Result<()>;

    /// Every stored project, most recently updated first.
    async fn load_all(&self) -> Result<Vec<ProjectSnapshot>>;

    async fn load(&self, project_id: Uuid) -> Result<ProjectSnapshot> {
        self.load_all()
            .await?
            .into_iter()
            .find(|s| s.id == project_id)
            .ok_or(SessionError::ProjectNotFound(project_id))
    }

    /// Returns `false` if there was nothing to delete.
    async fn delete(&self, project_id: Uuid) -> Result<bool>;
}

fn newest_first(snapshots: &mut [ProjectSnapshot]) {
    snapshots.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
}

// ---------------------------------------------------------------------------
// JsonDirStore
// ---------------------------------------------------------------------------

/// One pretty-printed `<id>.memento` file per project in a directory.
#[derive(Debug, Clone)]
pub struct JsonDirStore {
    dir: PathBuf,
}

impl JsonDirStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn path_for(&self, project_id: Uuid) -> PathBuf {
        self.dir.join(format!("{project_id}.{PROJECT_EXTENSION}"))
    }
}

#[async_trait]
impl ProjectStore for JsonDirStore {
    async fn save(&self, project_id: Uuid, snapshot: &ProjectSnapshot) -> Result<()> {
        tokio::fs::create_dir_all(&self.dir).await?;
        let path = self.path_for(project_id);
        let tmp = path.with_extension(format!("{PROJECT_EXTENSION}.tmp"));
        let json = serde_json::to_vec_pretty(snapshot)?;

        // Write then rename so a crash never leaves a half-written project.
        tokio::fs::write(&tmp, json).await?;
        tokio::fs::rename(&tmp, &path).await?;
        tracing::debug!(%project_id, path = %path.display(), "project written");
        Ok(())
    }

    async fn load_all(&self) -> Result<Vec<ProjectSnapshot>> {
        let mut entries = match tokio::fs::read_dir(&self.dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let mut snapshots = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some(PROJECT_EXTENSION) {
                continue;
            }
            let data = tokio::fs::read_to_string(&path).await?;
            match ProjectSnapshot::from_json(&data) {
                Ok(snapshot) => snapshots.push(snapshot),
                Err(e) => {
                    tracing::warn!(
                        path = %path.display(),
                        error = %e,
                        "skipping unreadable project file"
                    );
                }
            }
        }
        newest_first(&mut snapshots);
        Ok(snapshots)
    }

    async fn load(&self, project_id: Uuid) -> Result<ProjectSnapshot> {
        let path = self.path_for(project_id);
        let data = match tokio::fs::read_to_string(&path).await {
            Ok(data) => data,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(SessionError::ProjectNotFound(project_id))
            }
            Err(e) => return Err(e.into()),
        };
        Ok(ProjectSnapshot::from_json(&data)?)
    }

    async fn delete(&self, project_id: Uuid) -> Result<bool> {
        match tokio::fs::remove_file(self.path_for(project_id)).await {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }
}

// ---------------------------------------------------------------------------
// MemoryStore
// ---------------------------------------------------------------------------

/// In-memory store with failure injection and call counting.
#[derive(Debug, Default)]
pub struct MemoryStore {
    projects: Mutex<HashMap<Uuid, ProjectSnapshot>>,
    failing: AtomicBool,
    save_calls: AtomicUsize,
    delay: Mutex<Option<Duration>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every following `save` fail until switched back.
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    /// Delay each `save` by `delay`, to observe the `Saving` state.
    pub fn set_delay(&self, delay: Option<Duration>) {
        *self.delay.lock().unwrap_or_else(|e| e.into_inner()) = delay;
    }

    /// Number of `save` calls, failed ones included.
    pub fn save_calls(&self) -> usize {
        self.save_calls.load(Ordering::SeqCst)
    }

    pub fn get(&self, project_id: Uuid) -> Option<ProjectSnapshot> {
        self.projects
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .get(&project_id)
            .cloned()
    }

    pub fn len(&self) -> usize {
        self.projects.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl ProjectStore for MemoryStore {
    async fn save(&self, project_id: Uuid, snapshot: &ProjectSnapshot) -> Result<()> {
        self.save_calls.fetch_add(1, Ordering::SeqCst);
        let delay = *self.delay.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        if self.failing.load(Ordering::SeqCst) {
            return Err(SessionError::Store("injected failure".into()));
        }
        self.projects
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .insert(project_id, snapshot.clone());
        Ok(())
    }

    async fn load_all(&self) -> Result<Vec<ProjectSnapshot>> {
        let mut snapshots: Vec<ProjectSnapshot> = self
            .projects
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .values()
            .cloned()
            .collect();
        newest_first(&mut snapshots);
        Ok(snapshots)
    }

    async fn delete(&self, project_id: Uuid) -> Result<bool> {
        Ok(self
            .projects
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .remove(&project_id)
            .is_some())
    }
}
