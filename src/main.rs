use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use serde_json::Value;
use tracing::{debug, info};
use uuid::Uuid;

use profile_canvas::config::{ConfigError, EditorConfig, StoreConfig};
use profile_canvas::editor::{Access, Editor, EditorError, LoadReport};
use profile_canvas::gateway::{CanvasGateway, GatewayError, PgGateway, RestGateway, decode_canvas_state};
use profile_canvas::raster::RasterFactory;

#[derive(Debug, thiserror::Error)]
enum CliError {
    #[error("configuration: {0}")]
    Config(#[from] ConfigError),
    #[error("editor: {0}")]
    Editor(#[from] EditorError),
    #[error("store: {0}")]
    Gateway(#[from] GatewayError),
    #[error("io: {0}")]
    Io(#[from] std::io::Error),
    #[error("{0} does not contain a canvas")]
    EmptySnapshot(PathBuf),
}

#[derive(Parser, Debug)]
#[command(name = "profile-canvas", about = "Inspect, export and import profile canvases")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Print a summary of a user's stored canvas.
    Show { user_id: Uuid },
    /// Render a user's canvas to PNG.
    Export {
        user_id: Uuid,
        #[arg(long, env = "CANVAS_EXPORT_DIR", default_value = ".")]
        out_dir: PathBuf,
    },
    /// Validate a snapshot file and save it as a user's canvas.
    Import { user_id: Uuid, file: PathBuf },
}

#[tokio::main]
async fn main() -> Result<(), CliError> {
    tracing_subscriber::fmt::init();
    if let Err(e) = dotenvy::dotenv() {
        debug!(error = %e, "no .env file loaded");
    }

    let cli = Cli::parse();
    let gateway = connect_gateway(StoreConfig::from_env()?).await?;
    let config = EditorConfig::from_env();

    match cli.command {
        Command::Show { user_id } => run_show(config, gateway, user_id).await,
        Command::Export { user_id, out_dir } => run_export(config, gateway, user_id, out_dir).await,
        Command::Import { user_id, file } => run_import(gateway.as_ref(), user_id, file).await,
    }
}

async fn connect_gateway(store: StoreConfig) -> Result<Arc<dyn CanvasGateway>, GatewayError> {
    match store {
        StoreConfig::Postgres { database_url } => Ok(Arc::new(PgGateway::connect(&database_url).await?)),
        StoreConfig::Rest { base_url, api_key, access_token, table } => {
            info!(%base_url, %table, "using REST store");
            Ok(Arc::new(RestGateway::new(base_url, api_key, access_token, table)?))
        }
    }
}

/// Open a read-only operator session on `user_id`'s canvas and load it.
async fn open_loaded(
    config: EditorConfig,
    gateway: Arc<dyn CanvasGateway>,
    user_id: Uuid,
) -> Result<(Editor, LoadReport), CliError> {
    let mut editor = Editor::open(config, gateway, Arc::new(RasterFactory), user_id, Access::viewer(user_id)).await?;
    let report = editor.load().await?;
    Ok((editor, report))
}

async fn run_show(config: EditorConfig, gateway: Arc<dyn CanvasGateway>, user_id: Uuid) -> Result<(), CliError> {
    let (editor, report) = open_loaded(config, gateway, user_id).await?;
    let scene = editor.scene();

    let mut kinds: BTreeMap<&str, usize> = BTreeMap::new();
    for drawable in &scene.objects {
        *kinds.entry(drawable.shape.kind_name()).or_default() += 1;
    }

    println!("user:       {user_id}");
    println!("status:     {report:?}");
    println!("size:       {}x{}", scene.width, scene.height);
    println!("background: {}", scene.background);
    println!("objects:    {}", scene.len());
    for (kind, count) in kinds {
        println!("  {kind:<8} {count}");
    }
    Ok(())
}

async fn run_export(
    config: EditorConfig,
    gateway: Arc<dyn CanvasGateway>,
    user_id: Uuid,
    out_dir: PathBuf,
) -> Result<(), CliError> {
    let (mut editor, _) = open_loaded(config, gateway, user_id).await?;
    let (file_name, bytes) = editor.export().await?;
    editor.dispose();

    tokio::fs::create_dir_all(&out_dir).await?;
    let path = out_dir.join(file_name);
    tokio::fs::write(&path, &bytes).await?;
    eprintln!("wrote {} ({} bytes)", path.display(), bytes.len());
    Ok(())
}

async fn run_import(gateway: &dyn CanvasGateway, user_id: Uuid, file: PathBuf) -> Result<(), CliError> {
    let text = tokio::fs::read_to_string(&file).await?;
    let Some(snapshot) = decode_canvas_state(Some(Value::String(text)))? else {
        return Err(CliError::EmptySnapshot(file));
    };
    gateway.save(user_id, &snapshot).await?;
    info!(%user_id, file = %file.display(), "canvas imported");
    eprintln!("imported {} into {user_id}", file.display());
    Ok(())
}
