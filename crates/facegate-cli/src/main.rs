use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use facegate_capture::{
    CanvasOverlay, DirectoryCamera, EdgeClient, LiveConfig, LiveLoop, OverlapPolicy,
};
use facegate_core::encode_data_url;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;

#[derive(Parser)]
#[command(name = "facegate", about = "Facegate face registration and recognition CLI")]
struct Cli {
    /// Base URL of the facegated edge server
    #[arg(long, global = true, default_value = "http://localhost:3001")]
    server: String,

    /// Per-request timeout in seconds
    #[arg(long, global = true, default_value_t = 30)]
    timeout_secs: u64,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Register a face under a unique name
    Register {
        /// Name to register (must be unique)
        #[arg(short, long)]
        name: String,
        /// Image file containing the face
        #[arg(short, long)]
        image: PathBuf,
    },
    /// Recognize faces in a single image
    Recognize {
        /// Image file to recognize
        #[arg(short, long)]
        image: PathBuf,
    },
    /// Run the periodic capture loop against a still-image source
    Live {
        /// Image file or directory of images standing in for the camera
        #[arg(short, long)]
        frames: PathBuf,
        /// Capture interval in milliseconds
        #[arg(long, default_value_t = 3000)]
        interval_ms: u64,
        /// Dispatch a new call even if the previous one has not returned
        #[arg(long)]
        allow_overlap: bool,
        /// Overlay width in pixels
        #[arg(long, default_value_t = 640)]
        width: u32,
        /// Overlay height in pixels
        #[arg(long, default_value_t = 480)]
        height: u32,
        /// Write the final overlay to this PNG on exit
        #[arg(long)]
        overlay_out: Option<PathBuf>,
    },
    /// List registered names
    Faces,
    /// Delete every registered face
    Reset {
        /// Confirm the deletion
        #[arg(long)]
        yes: bool,
    },
    /// Show edge and upstream status
    Status,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();
    let client = EdgeClient::new(&cli.server, Duration::from_secs(cli.timeout_secs))
        .context("building HTTP client")?;

    match cli.command {
        Commands::Register { name, image } => {
            let payload = read_image_payload(&image)?;
            match client.register(&name, &payload).await {
                Ok(_) => println!("Success! {name} has been registered."),
                Err(e) => bail!("{}", e.detail()),
            }
        }
        Commands::Recognize { image } => {
            let payload = read_image_payload(&image)?;
            let results = client
                .recognize(&payload)
                .await
                .map_err(|e| anyhow::anyhow!("{}", e.detail()))?;
            if results.is_empty() {
                println!("No faces detected");
            }
            for (i, d) in results.iter().enumerate() {
                let b = d.bounding_box;
                println!(
                    "#{i}: {label} [top={top}, right={right}, bottom={bottom}, left={left}]",
                    label = d.label(),
                    top = b.top,
                    right = b.right,
                    bottom = b.bottom,
                    left = b.left,
                );
            }
        }
        Commands::Live {
            frames,
            interval_ms,
            allow_overlap,
            width,
            height,
            overlay_out,
        } => {
            run_live(
                client,
                &frames,
                LiveConfig {
                    interval: Duration::from_millis(interval_ms),
                    overlap: if allow_overlap {
                        OverlapPolicy::Allow
                    } else {
                        OverlapPolicy::Skip
                    },
                },
                (width, height),
                overlay_out.as_deref(),
            )
            .await?;
        }
        Commands::Faces => {
            let faces = client
                .list_faces()
                .await
                .map_err(|e| anyhow::anyhow!("{}", e.detail()))?;
            match faces.get("faces").and_then(|f| f.as_array()) {
                Some(names) if names.is_empty() => println!("No faces registered"),
                Some(names) => {
                    for name in names {
                        println!("{}", name.as_str().unwrap_or_default());
                    }
                }
                None => println!("{}", serde_json::to_string_pretty(&faces)?),
            }
        }
        Commands::Reset { yes } => {
            if !yes {
                bail!("refusing to delete all faces without --yes");
            }
            client
                .delete_all_faces()
                .await
                .map_err(|e| anyhow::anyhow!("{}", e.detail()))?;
            println!("All registered faces deleted");
        }
        Commands::Status => match client.health().await {
            Ok(status) => println!("{}", serde_json::to_string_pretty(&status)?),
            Err(e) => println!("facegated: not reachable ({})", e.detail()),
        },
    }

    Ok(())
}

async fn run_live(
    client: EdgeClient,
    frames: &Path,
    config: LiveConfig,
    (width, height): (u32, u32),
    overlay_out: Option<&Path>,
) -> Result<()> {
    let camera = DirectoryCamera::open(frames)?;
    let overlay = Arc::new(Mutex::new(CanvasOverlay::new(width, height)));
    let (tx, rx) = tokio::sync::watch::channel(false);

    tokio::spawn(async move {
        let _ = tokio::signal::ctrl_c().await;
        tracing::info!("stopping live loop");
        let _ = tx.send(true);
    });

    println!("Live recognition running; press Ctrl-C to stop");
    let stats = LiveLoop::new(config)
        .run(camera, Arc::new(client), overlay.clone(), rx)
        .await;

    println!(
        "ticks={} dispatched={} rendered={} failed={} skipped={}",
        stats.ticks, stats.dispatched, stats.rendered, stats.failed, stats.skipped_in_flight
    );

    if let Some(path) = overlay_out {
        let overlay = overlay
            .lock()
            .map_err(|_| anyhow::anyhow!("overlay lock poisoned"))?;
        for a in overlay.annotations() {
            println!("{} at ({}, {})", a.label, a.anchor.0, a.anchor.1);
        }
        overlay
            .save_png(path)
            .with_context(|| format!("writing overlay to {}", path.display()))?;
        println!("Overlay written to {}", path.display());
    }

    Ok(())
}

/// Read an image file and wrap it as a data URL.
fn read_image_payload(path: &Path) -> Result<String> {
    let bytes = std::fs::read(path).with_context(|| format!("reading {}", path.display()))?;
    let format = image::guess_format(&bytes)
        .with_context(|| format!("{} is not a recognised image", path.display()))?;
    Ok(encode_data_url(format.to_mime_type(), &bytes))
}
