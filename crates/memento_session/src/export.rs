//! Export: job description, frame plan, encoder seam and the controller that
//! owns export state.

use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use memento_core::config::PlaybackConfig;
use memento_core::entitlement::{Entitlement, PremiumFeature};
use memento_core::playback::photo_duration;
use memento_core::{AspectRatio, ExportQuality, GateReason, Project, ProjectSnapshot, TimeUs};
use serde::{Deserialize, Serialize};
use tokio::sync::watch;
use uuid::Uuid;

use crate::error::{Result, SessionError};

/// Largest GIF the optimizer aims for.
pub const MAX_GIF_BYTES: u64 = 10 * 1024 * 1024;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum ExportFormat {
    Video,
    Gif,
}

/// Progress update during encoding.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ExportProgress {
    /// 0 to 100.
    pub percent: f64,
    pub frame: u64,
    pub total_frames: u64,
}

// ---------------------------------------------------------------------------
// GIF sizing
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct GifSettings {
    pub width: u32,
    pub height: u32,
    pub fps: u32,
    pub colors: u32,
}

/// Rough GIF size in bytes: one tenth of a palettized frame per frame.
pub fn estimate_gif_bytes(settings: &GifSettings, duration_secs: f64) -> u64 {
    let pixels = f64::from(settings.width) * f64::from(settings.height);
    let bytes_per_frame = pixels * (f64::from(settings.colors) / 256.0) * 0.1;
    let frames = f64::from(settings.fps) * duration_secs.max(0.0);
    (bytes_per_frame * frames).floor() as u64
}

/// Shrink GIF settings until the estimate fits `max_bytes`: first the frame
/// size (not below 320 px wide), then the palette (not below 64 colors),
/// then the frame rate (not below 5 fps).
pub fn optimize_gif(width: u32, height: u32, duration_secs: f64, max_bytes: u64) -> GifSettings {
    let mut s = GifSettings {
        width,
        height,
        fps: 10,
        colors: 256,
    };
    let too_big = |s: &GifSettings| estimate_gif_bytes(s, duration_secs) > max_bytes;

    while too_big(&s) && s.width > 320 {
        s.width = (f64::from(s.width) * 0.8) as u32;
        s.height = (f64::from(s.height) * 0.8) as u32;
    }
    while too_big(&s) && s.colors > 64 {
        s.colors /= 2;
    }
    while too_big(&s) && s.fps > 5 {
        s.fps = (f64::from(s.fps) * 0.8) as u32;
    }
    s
}

// ---------------------------------------------------------------------------
// ExportJob / ExportPlan
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
pub struct ExportRequest {
    pub format: ExportFormat,
    /// Falls back to the project's export quality.
    pub quality: Option<ExportQuality>,
    /// Falls back to the project's aspect preset.
    pub aspect: Option<AspectRatio>,
    pub output_path: PathBuf,
}

impl ExportRequest {
    pub fn video(output_path: impl Into<PathBuf>) -> Self {
        Self {
            format: ExportFormat::Video,
            quality: None,
            aspect: None,
            output_path: output_path.into(),
        }
    }

    pub fn gif(output_path: impl Into<PathBuf>) -> Self {
        Self {
            format: ExportFormat::Gif,
            ..Self::video(output_path)
        }
    }
}

/// Everything an encoder needs, resolved from a project and a request.
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ExportJob {
    pub snapshot: ProjectSnapshot,
    pub format: ExportFormat,
    pub quality: ExportQuality,
    pub aspect: AspectRatio,
    pub width: u32,
    pub height: u32,
    /// `None` for GIF output.
    pub bitrate: Option<String>,
    pub fps: u32,
    pub colors: Option<u32>,
    pub output_path: PathBuf,
    pub watermark: bool,
}

impl ExportJob {
    pub fn new(project: &Project, request: &ExportRequest, entitlement: &dyn Entitlement) -> Self {
        let quality = request.quality.unwrap_or(project.settings.export_quality);
        let aspect = request.aspect.unwrap_or(project.settings.resolution);
        let watermark = !entitlement.has_feature(PremiumFeature::NoWatermark);

        let (width, height, bitrate, fps, colors) = match request.format {
            ExportFormat::Video => {
                let (w, h) = aspect.dimensions();
                (w, h, Some(quality.bitrate().to_string()), quality.fps(), None)
            }
            ExportFormat::Gif => {
                let seconds = project.timeline.total_duration().as_seconds();
                let gif = optimize_gif(480, 480, seconds, MAX_GIF_BYTES);
                (gif.width, gif.height, None, gif.fps, Some(gif.colors))
            }
        };

        Self {
            snapshot: ProjectSnapshot::from(project),
            format: request.format,
            quality,
            aspect,
            width,
            height,
            bitrate,
            fps,
            colors,
            output_path: request.output_path.clone(),
            watermark,
        }
    }
}

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PlanSegment {
    pub photo_id: Uuid,
    pub uri: String,
    pub start_frame: u64,
    pub frame_count: u64,
}

/// Which photo each output frame shows.
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ExportPlan {
    pub total_duration: TimeUs,
    pub fps: u32,
    pub segments: Vec<PlanSegment>,
}

impl ExportPlan {
    /// Each photo gets `floor(duration * fps)` frames.
    pub fn build(project: &Project, fps: u32, playback: &PlaybackConfig) -> Self {
        let mut segments = Vec::with_capacity(project.timeline.len());
        let mut start_frame = 0;
        let mut total = TimeUs::ZERO;
        for (i, photo) in project.timeline.photos().iter().enumerate() {
            let duration = photo_duration(project, i, playback);
            let frame_count = (duration.as_seconds() * f64::from(fps)).floor() as u64;
            segments.push(PlanSegment {
                photo_id: photo.id,
                uri: photo.uri.clone(),
                start_frame,
                frame_count,
            });
            start_frame += frame_count;
            total = total + duration;
        }
        Self {
            total_duration: total,
            fps,
            segments,
        }
    }

    pub fn total_frames(&self) -> u64 {
        self.segments.iter().map(|s| s.frame_count).sum()
    }

    /// The segment showing `frame`, if it is inside the plan.
    pub fn frame_at(&self, frame: u64) -> Option<&PlanSegment> {
        let i = self
            .segments
            .partition_point(|s| s.start_frame + s.frame_count <= frame);
        self.segments.get(i).filter(|s| s.frame_count > 0)
    }

    /// Photo URI for every output frame, in order.
    pub fn frames(&self) -> impl Iterator<Item = &str> + '_ {
        self.segments
            .iter()
            .flat_map(|s| std::iter::repeat(s.uri.as_str()).take(s.frame_count as usize))
    }
}

// ---------------------------------------------------------------------------
// Encoders
// ---------------------------------------------------------------------------

#[async_trait]
pub trait Encoder: Send + Sync {
    /// Produce the output file, reporting progress as it goes.
    async fn encode(
        &self,
        job: &ExportJob,
        plan: &ExportPlan,
        progress_tx: &watch::Sender<ExportProgress>,
    ) -> Result<PathBuf>;
}

/// Reports that no encoder is installed.
#[derive(Debug, Clone, Copy, Default)]
pub struct UnavailableEncoder;

#[async_trait]
impl Encoder for UnavailableEncoder {
    async fn encode(
        &self,
        job: &ExportJob,
        _plan: &ExportPlan,
        _progress_tx: &watch::Sender<ExportProgress>,
    ) -> Result<PathBuf> {
        let what = match job.format {
            ExportFormat::Video => "video encoding",
            ExportFormat::Gif => "GIF creation",
        };
        Err(SessionError::Encode(format!("{what} is not available")))
    }
}

/// Writes the job and frame plan as a JSON manifest instead of media, for
/// previews and external encoders.
#[derive(Debug, Clone, Copy, Default)]
pub struct ManifestEncoder;

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct Manifest<'a> {
    job: &'a ExportJob,
    plan: &'a ExportPlan,
    total_frames: u64,
}

#[async_trait]
impl Encoder for ManifestEncoder {
    async fn encode(
        &self,
        job: &ExportJob,
        plan: &ExportPlan,
        progress_tx: &watch::Sender<ExportProgress>,
    ) -> Result<PathBuf> {
        let total_frames = plan.total_frames();
        let mut frame = 0;
        for segment in &plan.segments {
            frame += segment.frame_count;
            let percent = if total_frames > 0 {
                frame as f64 / total_frames as f64 * 100.0
            } else {
                100.0
            };
            let _ = progress_tx.send(ExportProgress {
                percent,
                frame,
                total_frames,
            });
            tokio::task::yield_now().await;
        }

        let manifest = Manifest {
            job,
            plan,
            total_frames,
        };
        let json = serde_json::to_vec_pretty(&manifest)?;
        if let Some(parent) = job.output_path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(&job.output_path, json).await?;
        Ok(job.output_path.clone())
    }
}

// ---------------------------------------------------------------------------
// ExportController
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
pub enum ExportState {
    Idle,
    Exporting,
    Completed(PathBuf),
    Failed(String),
}

#[derive(Debug, Clone, PartialEq)]
pub enum ExportOutcome {
    Completed(PathBuf),
    Failed(String),
    /// Needs an entitlement the user does not hold.
    Gated(GateReason),
}

pub struct ExportController {
    encoder: Arc<dyn Encoder>,
    entitlement: Arc<dyn Entitlement>,
    playback: PlaybackConfig,
    state: watch::Sender<ExportState>,
    progress: watch::Sender<ExportProgress>,
}

impl ExportController {
    pub fn new(encoder: Arc<dyn Encoder>, entitlement: Arc<dyn Entitlement>) -> Self {
        let (state, _) = watch::channel(ExportState::Idle);
        let (progress, _) = watch::channel(ExportProgress::default());
        Self {
            encoder,
            entitlement,
            playback: PlaybackConfig::default(),
            state,
            progress,
        }
    }

    pub fn with_playback_config(mut self, playback: PlaybackConfig) -> Self {
        self.playback = playback;
        self
    }

    pub fn state(&self) -> ExportState {
        self.state.borrow().clone()
    }

    pub fn subscribe_state(&self) -> watch::Receiver<ExportState> {
        self.state.subscribe()
    }

    pub fn subscribe_progress(&self) -> watch::Receiver<ExportProgress> {
        self.progress.subscribe()
    }

    /// Run one export to completion. State passes through `Exporting` and a
    /// terminal state, then always returns to `Idle`.
    pub async fn export(&self, project: &Project, request: ExportRequest) -> ExportOutcome {
        let job = ExportJob::new(project, &request, self.entitlement.as_ref());
        if job.format == ExportFormat::Video
            && job.quality == ExportQuality::High
            && !self.entitlement.has_feature(PremiumFeature::Export4K)
        {
            tracing::warn!(project_id = %project.id, "4K export requires premium");
            return ExportOutcome::Gated(GateReason::ExportQuality(job.quality));
        }
        if project.timeline.is_empty() {
            return ExportOutcome::Failed("project has no photos".into());
        }

        let plan = ExportPlan::build(project, job.fps, &self.playback);
        self.progress.send_replace(ExportProgress {
            percent: 0.0,
            frame: 0,
            total_frames: plan.total_frames(),
        });
        self.state.send_replace(ExportState::Exporting);
        tracing::info!(
            project_id = %project.id,
            format = ?job.format,
            width = job.width,
            height = job.height,
            fps = job.fps,
            frames = plan.total_frames(),
            "export started",
        );

        let outcome = match self.encoder.encode(&job, &plan, &self.progress).await {
            Ok(path) => {
                tracing::info!(project_id = %project.id, path = %path.display(), "export finished");
                self.state.send_replace(ExportState::Completed(path.clone()));
                ExportOutcome::Completed(path)
            }
            Err(e) => {
                tracing::error!(project_id = %project.id, error = %e, "export failed");
                let message = e.to_string();
                self.state.send_replace(ExportState::Failed(message.clone()));
                ExportOutcome::Failed(message)
            }
        };
        self.state.send_replace(ExportState::Idle);
        outcome
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use memento_core::entitlement::StaticEntitlement;
    use memento_core::{PhotoAsset, PhotoPatch, ProjectSettings};

    fn project(durations: &[f64]) -> Project {
        let mut project = Project::new("Export", ProjectSettings::default());
        let photos = durations
            .iter()
            .enumerate()
            .map(|(i, d)| {
                let asset = PhotoAsset::new(format!("file:///{i}.jpg"), 8, 6);
                let mut photo = project.photo_from_asset(&asset);
                photo.duration = *d;
                photo
            })
            .collect();
        project.append_photos(photos).unwrap();
        project
    }

    fn controller(encoder: impl Encoder + 'static, premium: bool) -> ExportController {
        let entitlement = if premium {
            StaticEntitlement::PREMIUM
        } else {
            StaticEntitlement::FREE
        };
        ExportController::new(Arc::new(encoder), Arc::new(entitlement))
    }

    // -----------------------------------------------------------------------
    // Plan
    // -----------------------------------------------------------------------

    #[test]
    fn plan_floors_frames_per_photo() {
        let p = project(&[1.0, 0.55]);
        let plan = ExportPlan::build(&p, 30, &PlaybackConfig::default());
        assert_eq!(plan.segments[0].frame_count, 30);
        assert_eq!(plan.segments[1].frame_count, 16);
        assert_eq!(plan.segments[1].start_frame, 30);
        assert_eq!(plan.total_frames(), 46);
        assert_eq!(plan.total_duration, TimeUs::from_millis(1550));
        assert_eq!(plan.frames().count(), 46);
        assert_eq!(plan.frames().nth(30), Some("file:///1.jpg"));
    }

    #[test]
    fn frame_lookup() {
        let p = project(&[1.0, 1.0]);
        let plan = ExportPlan::build(&p, 10, &PlaybackConfig::default());
        assert_eq!(plan.frame_at(0).unwrap().uri, "file:///0.jpg");
        assert_eq!(plan.frame_at(9).unwrap().uri, "file:///0.jpg");
        assert_eq!(plan.frame_at(10).unwrap().uri, "file:///1.jpg");
        assert!(plan.frame_at(20).is_none());
    }

    // -----------------------------------------------------------------------
    // Job
    // -----------------------------------------------------------------------

    #[test]
    fn video_job_uses_project_settings() {
        let p = project(&[2.0]);
        let job = ExportJob::new(&p, &ExportRequest::video("out.mp4"), &StaticEntitlement::FREE);
        assert_eq!((job.width, job.height), (1080, 1920));
        assert_eq!(job.bitrate.as_deref(), Some("5M"));
        assert_eq!(job.fps, 30);
        assert!(job.watermark);

        let premium =
            ExportJob::new(&p, &ExportRequest::video("out.mp4"), &StaticEntitlement::PREMIUM);
        assert!(!premium.watermark);
    }

    #[test]
    fn gif_job_is_small() {
        let p = project(&[2.0, 2.0]);
        let job = ExportJob::new(&p, &ExportRequest::gif("out.gif"), &StaticEntitlement::FREE);
        assert_eq!((job.width, job.height, job.fps), (480, 480, 10));
        assert_eq!(job.colors, Some(256));
        assert_eq!(job.bitrate, None);
    }

    #[test]
    fn gif_optimizer_shrinks_long_slideshows() {
        let s = optimize_gif(480, 480, 600.0, MAX_GIF_BYTES);
        assert!(s.width < 480);
        assert!(s.width >= 320 || s.colors < 256);
        assert!(s.fps >= 5 && s.colors >= 64);

        let short = optimize_gif(480, 480, 1.0, MAX_GIF_BYTES);
        assert_eq!(short, GifSettings { width: 480, height: 480, fps: 10, colors: 256 });
    }

    // -----------------------------------------------------------------------
    // Controller
    // -----------------------------------------------------------------------

    #[tokio::test]
    async fn unavailable_encoder_fails_and_returns_to_idle() {
        let ctl = controller(UnavailableEncoder, false);
        let mut states = ctl.subscribe_state();
        let outcome = ctl.export(&project(&[1.0]), ExportRequest::video("x.mp4")).await;
        assert!(matches!(outcome, ExportOutcome::Failed(ref m) if m.contains("not available")));
        assert_eq!(ctl.state(), ExportState::Idle);
        assert!(states.has_changed().unwrap());
        assert_eq!(*states.borrow_and_update(), ExportState::Idle);
    }

    #[tokio::test]
    async fn four_k_is_gated_without_entitlement() {
        let ctl = controller(UnavailableEncoder, false);
        let request = ExportRequest {
            quality: Some(ExportQuality::High),
            ..ExportRequest::video("x.mp4")
        };
        let outcome = ctl.export(&project(&[1.0]), request).await;
        assert_eq!(outcome, ExportOutcome::Gated(GateReason::ExportQuality(ExportQuality::High)));
        assert_eq!(ctl.state(), ExportState::Idle);
    }

    #[tokio::test]
    async fn empty_project_fails() {
        let ctl = controller(ManifestEncoder, true);
        let empty = Project::new("Empty", ProjectSettings::default());
        let outcome = ctl.export(&empty, ExportRequest::video("x.mp4")).await;
        assert!(matches!(outcome, ExportOutcome::Failed(_)));
    }

    #[tokio::test]
    async fn manifest_encoder_writes_plan_and_reports_progress() {
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("nested").join("show.json");
        let ctl = controller(ManifestEncoder, true);
        let progress = ctl.subscribe_progress();

        let mut p = project(&[1.0, 2.0]);
        let first = p.timeline.photos()[0].id;
        p.update_photo(first, &PhotoPatch { duration: Some(0.5), ..Default::default() }).unwrap();
        let request = ExportRequest {
            quality: Some(ExportQuality::High),
            ..ExportRequest::video(&out)
        };

        let outcome = ctl.export(&p, request).await;
        assert_eq!(outcome, ExportOutcome::Completed(out.clone()));
        assert_eq!(progress.borrow().percent, 100.0);
        assert_eq!(progress.borrow().total_frames, 150);

        let manifest: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&out).unwrap()).unwrap();
        assert_eq!(manifest["totalFrames"], 150);
        assert_eq!(manifest["job"]["fps"], 60);
        assert_eq!(manifest["job"]["watermark"], false);
        assert_eq!(manifest["plan"]["segments"][0]["frameCount"], 30);
    }
}
