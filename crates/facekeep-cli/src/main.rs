use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};

// `#[zbus::proxy]` generates `FaceKeepProxy` (async) alongside the blocking variant.
#[zbus::proxy(
    interface = "org.facekeep.FaceKeep1",
    default_service = "org.facekeep.FaceKeep1",
    default_path = "/org/facekeep/FaceKeep1"
)]
trait FaceKeep {
    async fn enroll(&self, user_id: &str, label: &str, images: Vec<Vec<u8>>) -> zbus::Result<(u32, u32)>;

    async fn identify(&self, user_id: &str, image: Vec<u8>) -> zbus::Result<(bool, String, f64, String, String)>;

    async fn profile(&self, user_id: &str) -> zbus::Result<String>;

    async fn status(&self) -> zbus::Result<String>;
}

#[derive(Parser)]
#[command(name = "facekeep", about = "facekeep face enrollment and matching CLI")]
struct Cli {
    /// Talk to a daemon on the session bus instead of the system bus
    #[arg(long, global = true)]
    session: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Enroll an identity from one or more face images, replacing any existing profile
    Enroll {
        user_id: String,
        /// Human-readable label returned on a match
        #[arg(short, long)]
        label: String,
        /// Encoded image files (JPEG, PNG, ...)
        #[arg(required = true)]
        images: Vec<PathBuf>,
    },
    /// Check whether an image matches an enrolled identity
    Identify { user_id: String, image: PathBuf },
    /// Show a stored profile
    Show { user_id: String },
    /// Show daemon status
    Status,
}

fn read_image(path: &Path) -> Result<Vec<u8>> {
    std::fs::read(path).with_context(|| format!("read image {}", path.display()))
}

fn print_json(raw: &str) -> Result<()> {
    let value: serde_json::Value = serde_json::from_str(raw).context("daemon returned malformed JSON")?;
    println!("{}", serde_json::to_string_pretty(&value)?);
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();

    let conn = if cli.session {
        zbus::Connection::session().await
    } else {
        zbus::Connection::system().await
    }
    .context("connect to D-Bus")?;
    let proxy = FaceKeepProxy::new(&conn).await?;
    tracing::debug!(session = cli.session, "connected to facekeepd");

    match cli.command {
        Commands::Enroll {
            user_id,
            label,
            images,
        } => {
            let bytes = images.iter().map(|p| read_image(p)).collect::<Result<Vec<_>>>()?;
            let (descriptors, skipped) = proxy.enroll(&user_id, &label, bytes).await?;
            println!("Enrolled {user_id} as {label:?}: {descriptors} descriptors");
            if skipped > 0 {
                println!("{skipped} image(s) had no detectable face and were skipped");
            }
        }
        Commands::Identify { user_id, image } => {
            let (matched, label, distance, update, detail) =
                proxy.identify(&user_id, read_image(&image)?).await?;
            let verdict = if matched { "MATCH" } else { "NO MATCH" };
            println!("{verdict}: {label} (distance {distance:.4})");
            match update.as_str() {
                "applied" => println!("window update: applied ({detail} descriptors)"),
                "failed" => println!("window update: failed: {detail}"),
                other => println!("window update: {other}"),
            }
        }
        Commands::Show { user_id } => print_json(&proxy.profile(&user_id).await?)?,
        Commands::Status => print_json(&proxy.status().await?)?,
    }

    Ok(())
}
