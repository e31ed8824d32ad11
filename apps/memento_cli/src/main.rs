use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{bail, Context as _};
use clap::{Parser, Subcommand};
use memento_core::config::{preset_for, EngineConfig};
use memento_core::entitlement::{Entitlement, StaticEntitlement};
use memento_core::playback::{photo_duration, resolve_transition};
use memento_core::transition::evaluate;
use memento_core::{
    AspectRatio, EditOutcome, Editor, ExportQuality, PhotoAsset, Project, ProjectSnapshot, TimeUs,
    TransitionType,
};
use memento_session::export::{Encoder, ManifestEncoder, UnavailableEncoder};
use memento_session::{ExportController, ExportOutcome, ExportRequest, JsonDirStore, ProjectStore};
use uuid::Uuid;

#[derive(Parser, Debug)]
#[command(name = "memento", version, about = "Photo slideshow projects from the command line")]
struct Cli {
    /// Directory holding `.memento` project files.
    #[arg(long, global = true, default_value = "projects")]
    store: PathBuf,

    /// Engine configuration JSON.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Act with every premium feature unlocked.
    #[arg(long, global = true, default_value_t = false)]
    premium: bool,

    #[command(subcommand)]
    cmd: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Create an empty project.
    New {
        #[arg(long, default_value = "Untitled Project")]
        title: String,
        /// Aspect preset: 1:1, 9:16, 16:9 or 21:9.
        #[arg(long, value_parser = parse_aspect)]
        aspect: Option<AspectRatio>,
    },
    /// List stored projects, newest first.
    List,
    /// Print a project as JSON.
    Show { id: Uuid },
    /// Append photos to a project.
    Add {
        id: Uuid,
        uris: Vec<String>,
        #[arg(long, default_value_t = 1080)]
        width: u32,
        #[arg(long, default_value_t = 1920)]
        height: u32,
    },
    /// Remove the photo at an index.
    Remove { id: Uuid, index: usize },
    /// Move a photo between positions.
    Move { id: Uuid, from: usize, to: usize },
    /// Set the transition that plays after the photo at `at`.
    Transition {
        id: Uuid,
        #[arg(long)]
        at: usize,
        #[arg(long, value_parser = parse_transition)]
        kind: TransitionType,
        /// Seconds; the catalog default when omitted.
        #[arg(long)]
        duration: Option<f64>,
    },
    /// Print when each photo and transition plays.
    Schedule { id: Uuid },
    /// Sample a transition's layer transforms.
    Frames {
        #[arg(value_parser = parse_transition)]
        kind: TransitionType,
        #[arg(long, default_value_t = 5)]
        steps: u32,
    },
    /// List transitions available at the current tier.
    Catalog,
    /// Export a project.
    Export {
        id: Uuid,
        #[arg(long)]
        out: PathBuf,
        #[arg(long, default_value_t = false)]
        gif: bool,
        /// 720p, 1080p or 4K.
        #[arg(long, value_parser = parse_quality)]
        quality: Option<ExportQuality>,
        /// Write a JSON frame manifest instead of media.
        #[arg(long, default_value_t = false)]
        manifest: bool,
    },
}

fn parse_transition(s: &str) -> Result<TransitionType, String> {
    TransitionType::from_tag(s).ok_or_else(|| format!("unknown transition '{s}'"))
}

fn parse_aspect(s: &str) -> Result<AspectRatio, String> {
    serde_json::from_value(serde_json::Value::String(s.to_string()))
        .map_err(|_| format!("unknown aspect ratio '{s}'"))
}

fn parse_quality(s: &str) -> Result<ExportQuality, String> {
    serde_json::from_value(serde_json::Value::String(s.to_string()))
        .map_err(|_| format!("unknown quality '{s}'"))
}

struct App {
    store: JsonDirStore,
    config: EngineConfig,
    entitlement: Arc<dyn Entitlement>,
}

impl App {
    async fn load(&self, id: Uuid) -> anyhow::Result<Project> {
        let snapshot = self.store.load(id).await?;
        Project::try_from(snapshot).with_context(|| format!("project {id} is inconsistent"))
    }

    async fn editor(&self, id: Uuid) -> anyhow::Result<Editor> {
        let project = self.load(id).await?;
        Ok(Editor::new(project, self.entitlement.clone(), self.config.history_limit))
    }

    async fn save(&self, project: &Project) -> anyhow::Result<()> {
        self.store.save(project.id, &ProjectSnapshot::from(project)).await?;
        Ok(())
    }

    /// Persist an edit, or explain why nothing happened.
    async fn commit(&self, editor: &Editor, outcome: EditOutcome) -> anyhow::Result<()> {
        match outcome {
            EditOutcome::Applied => self.save(editor.project()).await,
            EditOutcome::Unchanged => {
                println!("nothing to change");
                Ok(())
            }
            EditOutcome::Gated(reason) => bail!("requires premium: {reason:?}"),
            EditOutcome::NotFound(missing) => bail!("not found: {missing:?}"),
            EditOutcome::Rejected(message) => bail!("rejected: {message}"),
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let cli = Cli::parse();
    let config = match &cli.config {
        Some(path) => EngineConfig::load_from_file(path)
            .with_context(|| format!("read config '{}'", path.display()))?,
        None => EngineConfig::default(),
    };
    let entitlement: Arc<dyn Entitlement> = if cli.premium {
        Arc::new(StaticEntitlement::PREMIUM)
    } else {
        Arc::new(StaticEntitlement::FREE)
    };
    let app = App {
        store: JsonDirStore::new(&cli.store),
        config,
        entitlement,
    };

    match cli.cmd {
        Command::New { title, aspect } => {
            let settings = match aspect {
                Some(aspect) => preset_for(aspect),
                None => app.config.project_defaults.clone(),
            };
            let project = Project::new(&title, settings);
            app.save(&project).await?;
            println!("{}", project.id);
        }
        Command::List => {
            for snapshot in app.store.load_all().await? {
                let total: f64 = snapshot.photos.iter().map(|p| p.duration).sum();
                println!(
                    "{}  {:<24}  {:>3} photos  {:>6.1}s  {}",
                    snapshot.id,
                    snapshot.title,
                    snapshot.photos.len(),
                    total,
                    snapshot.updated_at.format("%Y-%m-%d %H:%M"),
                );
            }
        }
        Command::Show { id } => {
            let snapshot = app.store.load(id).await?;
            println!("{}", snapshot.to_json()?);
        }
        Command::Add { id, uris, width, height } => {
            if uris.is_empty() {
                bail!("no photos given");
            }
            let mut editor = app.editor(id).await?;
            let assets: Vec<PhotoAsset> = uris
                .into_iter()
                .map(|uri| PhotoAsset::new(uri, width, height))
                .collect();
            let outcome = editor.insert_photos(&assets);
            app.commit(&editor, outcome).await?;
            println!("{} photos", editor.project().timeline.len());
        }
        Command::Remove { id, index } => {
            let mut editor = app.editor(id).await?;
            let Some(photo_id) = editor.project().timeline.photos().get(index).map(|p| p.id) else {
                bail!("no photo at index {index}");
            };
            let outcome = editor.remove_photo(photo_id);
            app.commit(&editor, outcome).await?;
        }
        Command::Move { id, from, to } => {
            let mut editor = app.editor(id).await?;
            let outcome = editor.reorder_photo(from, to);
            app.commit(&editor, outcome).await?;
        }
        Command::Transition { id, at, kind, duration } => {
            let mut editor = app.editor(id).await?;
            let outcome = editor.add_transition(at, kind);
            app.commit(&editor, outcome).await?;
            if let Some(seconds) = duration {
                let transition = editor.project().timeline.transition_at(at);
                let Some(transition_id) = transition.map(|t| t.id) else {
                    bail!("no transition at {at}");
                };
                let patch = memento_core::TransitionPatch {
                    duration: Some(Some(seconds)),
                    ..Default::default()
                };
                let outcome = editor.update_transition(transition_id, patch);
                app.commit(&editor, outcome).await?;
            }
        }
        Command::Schedule { id } => {
            let project = app.load(id).await?;
            let mut t = TimeUs::ZERO;
            let len = project.timeline.len();
            for (i, photo) in project.timeline.photos().iter().enumerate() {
                let shown = photo_duration(&project, i, &app.config.playback);
                println!(
                    "{:>8.3}s  photo {i}  {}  ({:.3}s)",
                    t.as_seconds(),
                    photo.uri,
                    shown.as_seconds()
                );
                t = t + shown;
                if i + 1 < len {
                    let transition = resolve_transition(&project, i);
                    println!(
                        "{:>8.3}s    {} ({:.3}s, {:?})",
                        t.as_seconds(),
                        transition.kind,
                        transition.duration.as_seconds(),
                        transition.source,
                    );
                    t = t + transition.duration;
                }
            }
            println!("{:>8.3}s  end", t.as_seconds());
        }
        Command::Frames { kind, steps } => {
            let steps = steps.max(1);
            for step in 0..=steps {
                let progress = f64::from(step) / f64::from(steps);
                let frame = evaluate(kind, app.config.playback.easing.apply(progress));
                println!("{}", serde_json::to_string(&serde_json::json!({
                    "progress": progress,
                    "outgoing": frame.outgoing,
                    "incoming": frame.incoming,
                }))?);
            }
        }
        Command::Catalog => {
            for kind in memento_core::editor::selectable_transitions(app.entitlement.as_ref()) {
                let spec = kind.spec();
                println!(
                    "{:<12} {:<18} {:>5}ms  {}",
                    kind.tag(),
                    spec.name,
                    spec.default_duration_ms,
                    spec.description
                );
            }
        }
        Command::Export { id, out, gif, quality, manifest } => {
            let project = app.load(id).await?;
            let encoder: Arc<dyn Encoder> = if manifest {
                Arc::new(ManifestEncoder)
            } else {
                Arc::new(UnavailableEncoder)
            };
            let controller = ExportController::new(encoder, app.entitlement.clone())
                .with_playback_config(app.config.playback);
            let request = ExportRequest {
                quality,
                ..if gif {
                    ExportRequest::gif(out)
                } else {
                    ExportRequest::video(out)
                }
            };

            let mut progress = controller.subscribe_progress();
            let reporter = tokio::spawn(async move {
                while progress.changed().await.is_ok() {
                    let p = progress.borrow_and_update().clone();
                    tracing::debug!(percent = p.percent, frame = p.frame, "export progress");
                }
            });
            let outcome = controller.export(&project, request).await;
            drop(controller);
            let _ = reporter.await;

            match outcome {
                ExportOutcome::Completed(path) => println!("wrote {}", path.display()),
                ExportOutcome::Failed(message) => bail!("export failed: {message}"),
                ExportOutcome::Gated(reason) => bail!("requires premium: {reason:?}"),
            }
        }
    }
    Ok(())
}
