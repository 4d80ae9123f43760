use std::path::PathBuf;

use anyhow::{Context, bail};
use clap::{Args, Parser, Subcommand};
use log::info;
use mq_core::{BrushMode, MaskEditor, RasterPoint, SourceImage};

use crate::client::schemas::GenerationParams;
use crate::client::{JobApi, RemoteJobClient, SubmitRequest};
use crate::config::AppConfig;
use crate::events::JobEvent;
use crate::gallery::{Gallery, GeneratedImage};
use crate::materializer::image_bytes;
use crate::orchestrator::JobOrchestrator;
use crate::session::{SessionStore, SessionUpdate};

#[derive(Debug, Parser)]
#[command(name = "mq", about = "Paint an inpainting mask and run it through a remote generation queue")]
pub struct Cli {
    /// Service base URL; remembered in the session.
    #[arg(long, global = true)]
    pub api_url: Option<String>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Check that the service answers.
    Ping,
    /// Show the service's queue and job history.
    Queue,
    /// Paint a mask over an image and generate.
    Generate(GenerateArgs),
    /// Manage generated images.
    #[command(subcommand)]
    Gallery(GalleryCommand),
}

#[derive(Debug, Args)]
pub struct GenerateArgs {
    #[arg(long)]
    pub image: PathBuf,
    #[arg(long)]
    pub prompt: String,
    #[arg(long, default_value = "")]
    pub negative: String,
    /// Brush radius in image pixels (5-100).
    #[arg(long, default_value_t = 20)]
    pub brush: u32,
    /// Painted stroke as `x,y;x,y;...` in image pixels. Repeatable.
    #[arg(long = "stroke")]
    pub strokes: Vec<String>,
    /// Erased stroke, same format. Applied after the painted ones.
    #[arg(long = "erase")]
    pub erases: Vec<String>,
    /// Keep the mask painted in earlier sessions for the same image.
    #[arg(long)]
    pub resume: bool,
    #[arg(long, default_value_t = 1.0)]
    pub inpaint_strength: f32,
    #[arg(long, default_value_t = 4.0)]
    pub guidance: f32,
    /// Write the mask PNG here before submitting.
    #[arg(long)]
    pub mask_out: Option<PathBuf>,
    /// Write the generated image here.
    #[arg(long)]
    pub out: Option<PathBuf>,
}

#[derive(Debug, Subcommand)]
pub enum GalleryCommand {
    List,
    Rename { id: String, name: String },
    Delete { id: String },
    /// Save an image to PATH (a file or a directory).
    Download { id: String, path: Option<PathBuf> },
}

pub async fn run(cli: Cli, conf: AppConfig) -> anyhow::Result<()> {
    let mut session = SessionStore::load(conf.session_path());
    if let Some(url) = cli.api_url {
        session.update(SessionUpdate {
            api_url: Some(url),
            ..Default::default()
        })?;
    }
    let api_url = session.state().effective_api_url(&conf.api_url).to_string();

    match cli.command {
        Command::Ping => {
            let mut orch = connect(&conf, &api_url)?;
            orch.probe().await?;
            println!("{} is online", api_url);
            if let Some(queue) = orch.queue_snapshot() {
                println!("running: {}  finished: {}", queue.running_size, queue.finished_size);
            }
        }
        Command::Queue => {
            let mut orch = connect(&conf, &api_url)?;
            orch.probe().await?;
            match orch.queue_snapshot() {
                Some(q) => println!(
                    "running: {}  finished: {}  last job: {}",
                    q.running_size,
                    q.finished_size,
                    q.last_job_id.as_deref().unwrap_or("-")
                ),
                None => println!("queue status unavailable"),
            }
            if let Some(h) = orch.history_snapshot() {
                for (i, job) in h.queue.iter().enumerate() {
                    println!("  #{} {}", i + 1, job.job_id);
                }
                println!("{} jobs in history", h.history.len());
            }
        }
        Command::Generate(args) => generate(args, &conf, &api_url, &mut session).await?,
        Command::Gallery(cmd) => {
            let mut gallery = Gallery::load(conf.gallery_path());
            match cmd {
                GalleryCommand::List => {
                    for image in gallery.list() {
                        println!(
                            "{}  {}  {}  job {}",
                            image.id,
                            image.timestamp.format("%Y-%m-%d %H:%M:%S"),
                            image.display_name(),
                            image.job_id
                        );
                    }
                }
                GalleryCommand::Rename { id, name } => {
                    if !gallery.rename(&id, &name) {
                        bail!("no gallery image with id {}", id);
                    }
                    gallery.save()?;
                }
                GalleryCommand::Delete { id } => {
                    if !gallery.delete(&id) {
                        bail!("no gallery image with id {}", id);
                    }
                    gallery.save()?;
                }
                GalleryCommand::Download { id, path } => {
                    let Some(image) = gallery.get(&id) else {
                        bail!("no gallery image with id {}", id);
                    };
                    let client = RemoteJobClient::with_base_url(&conf, &api_url)?;
                    let bytes = image_bytes(&client, image).await?;
                    let target = download_target(path, image);
                    std::fs::write(&target, bytes)
                        .with_context(|| format!("could not write {}", target.display()))?;
                    println!("saved to {}", target.display());
                }
            }
        }
    }

    Ok(())
}

fn connect(conf: &AppConfig, api_url: &str) -> anyhow::Result<JobOrchestrator<RemoteJobClient>> {
    let client = RemoteJobClient::with_base_url(conf, api_url)?;
    Ok(JobOrchestrator::new(client, conf.poll_interval))
}

async fn generate(
    args: GenerateArgs,
    conf: &AppConfig,
    api_url: &str,
    session: &mut SessionStore,
) -> anyhow::Result<()> {
    let source = SourceImage::open(&args.image)
        .with_context(|| format!("could not load {}", args.image.display()))?;

    let same_image = session.state().input_image == source.as_base64();
    let mut editor = if args.resume && same_image {
        MaskEditor::restore(source.width(), source.height(), &session.state().mask_history)?
    } else {
        MaskEditor::initialize(source.width(), source.height())?
    };
    info!("Editing a {}x{} mask", source.width(), source.height());

    editor.set_brush_size(args.brush);
    apply_strokes(&mut editor, BrushMode::Paint, &args.strokes)?;
    apply_strokes(&mut editor, BrushMode::Erase, &args.erases)?;

    session.update(SessionUpdate {
        input_image: Some(source.as_base64().to_string()),
        prompt: Some(args.prompt.clone()),
        negative_prompt: Some(args.negative.clone()),
        mask_history: Some(editor.history().to_vec()),
        ..Default::default()
    })?;

    if let Some(path) = &args.mask_out {
        std::fs::write(path, editor.raster().to_png()?)?;
        println!("mask written to {}", path.display());
    }

    editor.ensure_matches(source.width(), source.height())?;
    let mut orch = connect(conf, api_url)?;
    orch.probe().await?;

    let params = GenerationParams {
        inpaint_strength: args.inpaint_strength,
        guidance_scale: args.guidance,
        ..Default::default()
    };
    let job_id = orch
        .submit(SubmitRequest {
            image: source.as_base64().to_string(),
            mask: Some(editor.encode()?),
            prompt: args.prompt,
            negative_prompt: args.negative,
            params,
        })
        .await?;
    println!("job {} started, Ctrl-C stops it", job_id);

    let mut gallery = Gallery::load(conf.gallery_path());
    let interrupt = tokio::signal::ctrl_c();
    tokio::pin!(interrupt);

    loop {
        let tick = tokio::select! {
            tick = orch.next_tick() => Some(tick),
            _ = &mut interrupt => None,
        };
        let Some(tick) = tick else {
            stop_job(&mut orch).await;
            break;
        };
        let Some(epoch) = tick else {
            break;
        };

        // A poll in flight must not hold up Ctrl-C.
        let event = tokio::select! {
            event = orch.on_tick(epoch, &mut gallery) => Some(event),
            _ = &mut interrupt => None,
        };
        let Some(event) = event else {
            stop_job(&mut orch).await;
            break;
        };

        match event {
            JobEvent::Progress { progress, stage, .. } => {
                let est = orch.queue_estimate();
                if est.position > 0 {
                    println!(
                        "queued #{} (about {} min)  {:.0}%",
                        est.position,
                        est.wait_minutes(),
                        progress
                    );
                } else {
                    println!("{:.0}%  {}", progress, stage.as_deref().unwrap_or(""));
                }
            }
            JobEvent::Finished { image_id, warning, .. } => {
                if let Some(w) = warning {
                    println!("warning: {}", w);
                }
                gallery.save()?;
                if let Some(image) = gallery.get(&image_id) {
                    println!("finished: {}", image.url);
                    if let (Some(path), Some(bytes)) = (&args.out, image.bytes()) {
                        std::fs::write(path, bytes)?;
                        println!("saved to {}", path.display());
                    }
                }
                break;
            }
            JobEvent::Failed { error, .. } => bail!("generation failed: {}", error),
            JobEvent::QueryFailed { .. } | JobEvent::Stopped { .. } | JobEvent::Stale => {}
        }
    }
    println!("job {}", orch.state().label());

    Ok(())
}

async fn stop_job<A: JobApi>(orch: &mut JobOrchestrator<A>) {
    match orch.cancel().await {
        Ok(_) => println!("stopped"),
        Err(e) => println!("stopped locally; {}", e),
    }
}

/// Where `gallery download` writes: the given file, the default name inside a
/// given directory, or the default name in the working directory.
fn download_target(path: Option<PathBuf>, image: &GeneratedImage) -> PathBuf {
    match path {
        Some(dir) if dir.is_dir() => dir.join(image.download_name()),
        Some(file) => file,
        None => PathBuf::from(image.download_name()),
    }
}

fn apply_strokes(editor: &mut MaskEditor, mode: BrushMode, strokes: &[String]) -> anyhow::Result<()> {
    editor.set_mode(mode);
    for stroke in strokes {
        let points = parse_stroke(stroke)?;
        let mut iter = points.into_iter();
        let Some(first) = iter.next() else {
            continue;
        };
        editor.begin_stroke(first);
        for point in iter {
            editor.continue_stroke(point);
        }
        editor.end_stroke()?;
    }
    Ok(())
}

/// Parses `x,y;x,y;...` into raster points.
pub fn parse_stroke(text: &str) -> anyhow::Result<Vec<RasterPoint>> {
    text.split(';')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|pair| {
            let (x, y) = pair
                .split_once(',')
                .with_context(|| format!("expected x,y but got {:?}", pair))?;
            let x: f32 = x.trim().parse().with_context(|| format!("bad x in {:?}", pair))?;
            let y: f32 = y.trim().parse().with_context(|| format!("bad y in {:?}", pair))?;
            Ok(RasterPoint::new(x, y))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use mq_core::PAINTED;

    #[test]
    fn test_parse_stroke() {
        let points = parse_stroke("1,2; 3.5 , 4 ;").unwrap();
        assert_eq!(points, vec![RasterPoint::new(1.0, 2.0), RasterPoint::new(3.5, 4.0)]);
        assert!(parse_stroke("1;2").is_err());
        assert!(parse_stroke("a,2").is_err());
        assert!(parse_stroke("").unwrap().is_empty());
    }

    #[test]
    fn test_apply_strokes_commits_each() {
        let mut editor = MaskEditor::initialize(100, 100).unwrap();
        apply_strokes(&mut editor, BrushMode::Paint, &["10,10;20,10".into(), "50,50".into()]).unwrap();
        assert_eq!(editor.history().len(), 3);
        assert_eq!(editor.raster().get(50, 50), Some(PAINTED));
    }

    #[test]
    fn test_download_target() {
        let image = GeneratedImage {
            id: "i1".into(),
            url: "http://svc/files/r.png".into(),
            blob: None,
            base64_data: None,
            prompt: "x".into(),
            negative_prompt: String::new(),
            timestamp: chrono::Utc::now(),
            job_id: "j1".into(),
            name: Some("hat".into()),
        };
        assert_eq!(download_target(None, &image), PathBuf::from("inpainted_image_hat.png"));

        let dir = std::env::temp_dir();
        assert_eq!(download_target(Some(dir.clone()), &image), dir.join("inpainted_image_hat.png"));
        assert_eq!(
            download_target(Some(PathBuf::from("out/keep.png")), &image),
            PathBuf::from("out/keep.png")
        );

        let cli = Cli::try_parse_from(["mq", "gallery", "download", "i1"]).unwrap();
        assert!(matches!(
            cli.command,
            Command::Gallery(GalleryCommand::Download { path: None, .. })
        ));
    }

    #[test]
    fn test_cli_parses_generate() {
        let cli = Cli::try_parse_from([
            "mq",
            "--api-url",
            "http://gpu:8888",
            "generate",
            "--image",
            "in.png",
            "--prompt",
            "a hat",
            "--stroke",
            "1,1",
            "--stroke",
            "2,2",
        ])
        .unwrap();
        assert_eq!(cli.api_url.as_deref(), Some("http://gpu:8888"));
        match cli.command {
            Command::Generate(args) => {
                assert_eq!(args.strokes.len(), 2);
                assert_eq!(args.brush, 20);
            }
            other => panic!("unexpected {:?}", other),
        }
    }
}
