//! Tokio tasks that drive the explicit-time engines from real time.
//!
//! Both drivers share the editor through a `std::sync::Mutex`. The lock is
//! only ever taken for a snapshot or a tick, never across an `.await`.

use std::sync::{Arc, Mutex, MutexGuard};

use memento_core::playback::{PlaybackEngine, Renderer};
use memento_core::Editor;
use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

use crate::autosave::{AutosaveCoordinator, SaveStatus};
use crate::clock::MonotonicClock;
use crate::error::{Result, SessionError};

pub type SharedEditor = Arc<Mutex<Editor>>;

pub fn shared(editor: Editor) -> SharedEditor {
    Arc::new(Mutex::new(editor))
}

/// Lock the editor, recovering from a poisoned mutex.
pub fn lock(editor: &SharedEditor) -> MutexGuard<'_, Editor> {
    editor.lock().unwrap_or_else(|e| e.into_inner())
}

// ---------------------------------------------------------------------------
// Autosave
// ---------------------------------------------------------------------------

type ForceReply = oneshot::Sender<Result<()>>;

pub struct AutosaveHandle {
    force_tx: mpsc::Sender<ForceReply>,
    status: watch::Receiver<SaveStatus>,
    cancel: CancellationToken,
    task: JoinHandle<AutosaveCoordinator>,
}

impl AutosaveHandle {
    /// Save the editor's current state now, bypassing the debounce.
    pub async fn force_save(&self) -> Result<()> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.force_tx
            .send(reply_tx)
            .await
            .map_err(|_| SessionError::Stopped)?;
        reply_rx.await.map_err(|_| SessionError::Stopped)?
    }

    pub fn status(&self) -> watch::Receiver<SaveStatus> {
        self.status.clone()
    }

    /// Stop the driver. Pending saves are dropped, not flushed.
    pub async fn shutdown(self) -> Result<AutosaveCoordinator> {
        self.cancel.cancel();
        Ok(self.task.await?)
    }
}

/// Spawn the autosave loop. The editor's current state becomes the baseline,
/// so only edits made after this call are saved.
pub fn spawn_autosave(
    editor: SharedEditor,
    mut coordinator: AutosaveCoordinator,
    clock: MonotonicClock,
) -> AutosaveHandle {
    let (mut revisions, baseline) = {
        let guard = lock(&editor);
        (guard.subscribe(), guard.snapshot())
    };
    if let Err(e) = coordinator.observe(clock.now(), baseline) {
        tracing::error!(error = %e, "could not record autosave baseline");
    }

    let (force_tx, mut force_rx) = mpsc::channel::<ForceReply>(8);
    let status = coordinator.subscribe();
    let cancel = CancellationToken::new();
    let token = cancel.clone();

    let task = tokio::spawn(async move {
        tracing::debug!("autosave driver started");
        loop {
            let wake = coordinator.next_deadline().map(|t| clock.instant_at(t));

            tokio::select! {
                _ = token.cancelled() => {
                    coordinator.close();
                    break;
                }
                changed = revisions.changed() => {
                    if changed.is_err() {
                        coordinator.close();
                        break;
                    }
                    let snapshot = lock(&editor).snapshot();
                    if let Err(e) = coordinator.observe(clock.now(), snapshot) {
                        tracing::error!(error = %e, "could not observe project change");
                    }
                }
                Some(reply) = force_rx.recv() => {
                    let snapshot = lock(&editor).snapshot();
                    let result = coordinator.force_save(clock.now(), snapshot).await;
                    let _ = reply.send(result);
                }
                _ = sleep_until(wake), if wake.is_some() => {
                    coordinator.poll(clock.now()).await;
                }
            }
        }
        tracing::debug!(saves = coordinator.save_count(), "autosave driver stopped");
        coordinator
    });

    AutosaveHandle {
        force_tx,
        status,
        cancel,
        task,
    }
}

async fn sleep_until(wake: Option<tokio::time::Instant>) {
    match wake {
        Some(at) => tokio::time::sleep_until(at).await,
        None => std::future::pending().await,
    }
}

// ---------------------------------------------------------------------------
// Playback
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaybackCommand {
    Play,
    Pause,
    Resume,
    Stop,
    Next,
    Previous,
    SeekTo(usize),
}

pub struct PlaybackHandle<R> {
    commands: mpsc::Sender<PlaybackCommand>,
    cancel: CancellationToken,
    task: JoinHandle<(PlaybackEngine, R)>,
}

impl<R> PlaybackHandle<R> {
    pub async fn send(&self, command: PlaybackCommand) -> Result<()> {
        self.commands
            .send(command)
            .await
            .map_err(|_| SessionError::Stopped)
    }

    /// Stop ticking and hand back the engine and renderer.
    pub async fn shutdown(self) -> Result<(PlaybackEngine, R)> {
        self.cancel.cancel();
        Ok(self.task.await?)
    }
}

/// Spawn a loop that ticks `engine` at its configured frame rate and hands
/// each frame to `renderer` while playing or paused.
pub fn spawn_playback<R>(
    editor: SharedEditor,
    mut engine: PlaybackEngine,
    mut renderer: R,
    clock: MonotonicClock,
) -> PlaybackHandle<R>
where
    R: Renderer + 'static,
{
    let (commands, mut command_rx) = mpsc::channel::<PlaybackCommand>(32);
    let cancel = CancellationToken::new();
    let token = cancel.clone();

    let task = tokio::spawn(async move {
        let mut ticker = tokio::time::interval(engine.config().frame_interval());
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                _ = token.cancelled() => break,
                Some(command) = command_rx.recv() => {
                    let guard = lock(&editor);
                    apply_command(&mut engine, command, clock.now(), guard.project());
                }
                _ = ticker.tick() => {
                    if engine.state() == memento_core::playback::PlaybackState::Stopped {
                        continue;
                    }
                    let frame = {
                        let guard = lock(&editor);
                        engine.tick(clock.now(), guard.project())
                    };
                    renderer.render(&frame);
                }
            }
        }
        engine.stop();
        (engine, renderer)
    });

    PlaybackHandle {
        commands,
        cancel,
        task,
    }
}

fn apply_command(
    engine: &mut PlaybackEngine,
    command: PlaybackCommand,
    now: memento_core::TimeUs,
    project: &memento_core::Project,
) {
    tracing::debug!(?command, "playback command");
    match command {
        PlaybackCommand::Play => {
            engine.play(now, project);
        }
        PlaybackCommand::Pause => engine.pause(now),
        PlaybackCommand::Resume => engine.resume(now),
        PlaybackCommand::Stop => engine.stop(),
        PlaybackCommand::Next => {
            engine.next(now, project);
        }
        PlaybackCommand::Previous => {
            engine.previous(now, project);
        }
        PlaybackCommand::SeekTo(index) => {
            engine.seek_to(index, now, project);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;
    use memento_core::config::AutosaveConfig;
    use memento_core::entitlement::StaticEntitlement;
    use memento_core::playback::{PlaybackFrame, PlaybackState};
    use memento_core::{PhotoAsset, PhotoPatch, Project, ProjectSettings, TransitionType};
    use std::time::Duration;

    fn editor() -> SharedEditor {
        let project = Project::new("Driver", ProjectSettings::default());
        shared(Editor::new(project, Arc::new(StaticEntitlement::PREMIUM), 100))
    }

    fn add_photo(editor: &SharedEditor, n: usize) {
        lock(editor).insert_photos(&[PhotoAsset::new(format!("file:///{n}.jpg"), 4, 3)]);
    }

    // -----------------------------------------------------------------------
    // Autosave driver
    // -----------------------------------------------------------------------

    #[tokio::test(start_paused = true)]
    async fn edits_are_saved_after_quiet_period() {
        let editor = editor();
        let store = Arc::new(MemoryStore::new());
        let coordinator = AutosaveCoordinator::new(store.clone(), AutosaveConfig::default());
        let handle = spawn_autosave(editor.clone(), coordinator, MonotonicClock::new());

        for n in 0..4 {
            add_photo(&editor, n);
            tokio::time::sleep(Duration::from_millis(200)).await;
        }
        assert_eq!(store.save_calls(), 0);

        tokio::time::sleep(Duration::from_millis(2000)).await;
        assert_eq!(store.save_calls(), 1);
        let id = lock(&editor).project().id;
        assert_eq!(store.get(id).unwrap().photos.len(), 4);

        tokio::time::sleep(Duration::from_secs(10)).await;
        assert_eq!(*handle.status().borrow(), SaveStatus::Idle);
        let coordinator = handle.shutdown().await.unwrap();
        assert_eq!(coordinator.save_count(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn untouched_editor_is_never_saved() {
        let store = Arc::new(MemoryStore::new());
        let coordinator = AutosaveCoordinator::new(store.clone(), AutosaveConfig::default());
        let handle = spawn_autosave(editor(), coordinator, MonotonicClock::new());
        tokio::time::sleep(Duration::from_secs(30)).await;
        assert_eq!(store.save_calls(), 0);
        handle.shutdown().await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn force_save_through_handle_has_no_duplicate() {
        let editor = editor();
        let store = Arc::new(MemoryStore::new());
        let coordinator = AutosaveCoordinator::new(store.clone(), AutosaveConfig::default());
        let handle = spawn_autosave(editor.clone(), coordinator, MonotonicClock::new());

        add_photo(&editor, 0);
        tokio::time::sleep(Duration::from_millis(10)).await;
        handle.force_save().await.unwrap();
        assert_eq!(store.save_calls(), 1);

        tokio::time::sleep(Duration::from_secs(5)).await;
        assert_eq!(store.save_calls(), 1);
        handle.shutdown().await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn shutdown_drops_pending_save() {
        let editor = editor();
        let store = Arc::new(MemoryStore::new());
        let coordinator = AutosaveCoordinator::new(store.clone(), AutosaveConfig::default());
        let handle = spawn_autosave(editor.clone(), coordinator, MonotonicClock::new());

        add_photo(&editor, 0);
        tokio::time::sleep(Duration::from_millis(100)).await;
        let coordinator = handle.shutdown().await.unwrap();
        assert!(coordinator.is_closed());

        tokio::time::sleep(Duration::from_secs(5)).await;
        assert_eq!(store.save_calls(), 0);
    }

    // -----------------------------------------------------------------------
    // Playback driver
    // -----------------------------------------------------------------------

    #[derive(Default)]
    struct Recorder {
        frames: Vec<PlaybackFrame>,
    }

    impl Renderer for Recorder {
        fn render(&mut self, frame: &PlaybackFrame) {
            self.frames.push(frame.clone());
        }
    }

    #[tokio::test(start_paused = true)]
    async fn playback_driver_renders_transition_and_advances() {
        let editor = editor();
        add_photo(&editor, 0);
        add_photo(&editor, 1);
        {
            let mut guard = lock(&editor);
            let ids: Vec<_> = guard.project().timeline.photos().iter().map(|p| p.id).collect();
            for (id, secs) in ids.into_iter().zip([3.0, 2.0]) {
                guard.update_photo(
                    id,
                    PhotoPatch {
                        duration: Some(secs),
                        transition: Some(None),
                        ..Default::default()
                    },
                );
            }
            guard.add_transition(1, TransitionType::Fade);
        }

        let handle = spawn_playback(
            editor.clone(),
            PlaybackEngine::default(),
            Recorder::default(),
            MonotonicClock::new(),
        );
        handle.send(PlaybackCommand::Play).await.unwrap();
        tokio::time::sleep(Duration::from_millis(4000)).await;

        let (engine, recorder) = handle.shutdown().await.unwrap();
        assert_eq!(engine.state(), PlaybackState::Stopped);
        assert!(recorder
            .frames
            .iter()
            .any(|f| f.transition.as_ref().is_some_and(|t| t.kind == TransitionType::Fade)));
        let last = recorder.frames.last().unwrap();
        assert_eq!(last.current_index, 1);
        assert!(last.transition.is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn stopped_engine_renders_nothing() {
        let editor = editor();
        add_photo(&editor, 0);
        let handle = spawn_playback(
            editor,
            PlaybackEngine::default(),
            Recorder::default(),
            MonotonicClock::new(),
        );
        tokio::time::sleep(Duration::from_millis(500)).await;
        let (_, recorder) = handle.shutdown().await.unwrap();
        assert!(recorder.frames.is_empty());
    }
}
