// crates/edge/src/cli.rs

use crate::{
    fs::{watch_collections, CollectionRoots},
    settings::load_settings,
    EdgeError,
};
use chrono::Utc;
use clap::{builder::ValueHint, Args, Parser, Subcommand};
use domain::pattern::TokenMap;
use domain::Metadata;
use serde::Serialize;
use serde_json::Value as Json;
use serve::file::{CreateRequest, UpdateRequest};
use serve::{CollectionCache, WriteOutcome, Workspace};
use std::{path::PathBuf, process::ExitCode, sync::Arc, time::Duration};
use tracing::{error, info, warn};

pub type Result<T> = std::result::Result<T, EdgeError>;

/// Quire CLI entry point
#[tokio::main(flavor = "multi_thread")]
#[tracing::instrument(skip_all)]
pub async fn start() -> ExitCode {
    let cli = Cli::parse();

    run(cli).await.map_or_else(
        |e| {
            error!("quire failed: {}", e);
            eprintln!("error: {e}");
            ExitCode::FAILURE
        },
        |_| ExitCode::SUCCESS,
    )
}

#[derive(Parser, Debug)]
#[command(name = "quire", version, about = "Inspect and edit content collections")]
pub struct Cli {
    /// Project directory (or set QUIRE_DIR)
    ///
    /// Must exist and be a directory; `quire.toml` is read from here.
    #[arg(
        value_name = "DIR",
        env = "QUIRE_DIR",
        required = true,
        value_hint = ValueHint::DirPath,
        value_parser = dir_must_exist
    )]
    pub dir: PathBuf,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// List discovered and configured collections
    Collections,
    /// Infer a collection's naming pattern from its files
    Detect { collection: String },
    /// List a collection's items, newest first
    List { collection: String },
    /// Print one item
    Show { collection: String, id: String },
    /// List the images an item uses
    Images { collection: String, id: String },
    /// Create an item using the collection's naming pattern
    New(NewCmd),
    /// Change fields or the body of an item
    Set(SetCmd),
    /// Delete an item
    Rm { collection: String, id: String },
    /// Keep a cache warm and log every change under the content directory
    Watch,
}

#[derive(Args, Debug)]
pub struct NewCmd {
    pub collection: String,
    #[arg(long)]
    pub title: String,
    /// Explicit slug (default: derived from the title)
    #[arg(long)]
    pub slug: Option<String>,
    /// File pattern override, e.g. `{year}/{slug}.md`
    #[arg(long)]
    pub pattern: Option<String>,
    /// Extra front matter, `key=value` (value parsed as JSON when it can be)
    #[arg(long = "field", value_name = "K=V", value_parser = parse_kv)]
    pub fields: Vec<(String, String)>,
    /// Token override, `key=value`
    #[arg(long = "token", value_name = "K=V", value_parser = parse_kv)]
    pub tokens: Vec<(String, String)>,
    #[arg(long)]
    pub body: Option<String>,
}

#[derive(Args, Debug)]
pub struct SetCmd {
    pub collection: String,
    pub id: String,
    #[arg(long = "field", value_name = "K=V", value_parser = parse_kv)]
    pub fields: Vec<(String, String)>,
    #[arg(long)]
    pub body: Option<String>,
}

fn dir_must_exist(s: &str) -> std::result::Result<PathBuf, String> {
    let p = PathBuf::from(s);
    if !p.exists() {
        return Err(format!("Not found: {}", p.display()));
    }
    if !p.is_dir() {
        return Err(format!("Not a directory: {}", p.display()));
    }
    Ok(p)
}

fn parse_kv(s: &str) -> std::result::Result<(String, String), String> {
    match s.split_once('=') {
        Some((k, v)) if !k.trim().is_empty() => Ok((k.trim().to_string(), v.to_string())),
        _ => Err(format!("expected key=value, got `{s}`")),
    }
}

/// `3` → number, `true` → bool, `[..]` → array; anything else stays a string.
fn field_value(raw: &str) -> Json {
    serde_json::from_str::<Json>(raw)
        .ok()
        .filter(|v| !v.is_string() && !v.is_null())
        .unwrap_or_else(|| Json::String(raw.to_string()))
}

fn to_metadata(fields: &[(String, String)]) -> Metadata {
    fields
        .iter()
        .map(|(k, v)| (k.clone(), field_value(v)))
        .collect()
}

fn print_json<T: Serialize + ?Sized>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

/// Print a write's outcome; a failed write still fails the process.
fn print_outcome<T: Serialize>(result: serve::Result<T>) -> Result<()> {
    let outcome: WriteOutcome<T> = result.into();
    print_json(&outcome)?;
    match outcome.error {
        Some(e) => Err(EdgeError::Rejected(e)),
        None => Ok(()),
    }
}

#[tracing::instrument(skip_all)]
async fn run(cli: Cli) -> Result<()> {
    let then = Utc::now();
    let settings = load_settings(&cli.dir)?;
    info!(
        "Settings parsed in {} milliseconds",
        Utc::now().timestamp_millis() - then.timestamp_millis()
    );

    let cache = Arc::new(CollectionCache::from_settings(&settings.cache));
    let ws = Workspace::new(cli.dir.clone(), &settings, Arc::clone(&cache));

    match cli.command {
        Commands::Collections => {
            let then = Utc::now();
            let cols = ws.collections().await?;
            info!(
                "Collections scanned in {} milliseconds",
                Utc::now().timestamp_millis() - then.timestamp_millis()
            );
            print_json(cols.as_slice())
        }
        Commands::Detect { collection } => print_json(&ws.detect(&collection).await?),
        Commands::List { collection } => print_json(ws.content(&collection).await?.as_slice()),
        Commands::Show { collection, id } => {
            let item = ws.item(&collection, &id).await?;
            let preview = ws.preview_url(&collection, &id).await?;
            print_json(&serde_json::json!({
                "id": item.id,
                "slug": item.slug,
                "path": item.path,
                "previewUrl": preview,
                "metadata": item.metadata,
                "body": item.body,
            }))
        }
        Commands::Images { collection, id } => {
            print_json(ws.images(&collection, &id).await?.as_slice())
        }
        Commands::New(cmd) => {
            let mut metadata = Metadata::new();
            metadata.insert("title".to_string(), Json::String(cmd.title));
            metadata.extend(to_metadata(&cmd.fields));
            let req = CreateRequest {
                metadata,
                body: cmd.body.unwrap_or_default(),
                slug: cmd.slug,
                file_pattern: cmd.pattern,
                custom_tokens: cmd.tokens.into_iter().collect::<TokenMap>(),
                collection: None,
            };
            print_outcome(ws.create(&cmd.collection, req).await)
        }
        Commands::Set(cmd) => {
            if cmd.fields.is_empty() && cmd.body.is_none() {
                return Err(EdgeError::Usage("nothing to set: pass --field or --body".into()));
            }
            let req = UpdateRequest {
                metadata: (!cmd.fields.is_empty()).then(|| to_metadata(&cmd.fields)),
                body: cmd.body,
            };
            print_outcome(ws.update(&cmd.collection, &cmd.id, req).await)
        }
        Commands::Rm { collection, id } => {
            let result = ws
                .delete(&collection, &id)
                .await
                .map(|()| serde_json::json!({ "id": id }));
            print_outcome(result)
        }
        Commands::Watch => watch(ws, &settings.watch).await,
    }
}

#[tracing::instrument(skip_all)]
async fn watch(ws: Workspace, cfg: &domain::setting::WatchSettings) -> Result<()> {
    if !cfg.enabled {
        warn!("watching is disabled in quire.toml");
        return Ok(());
    }
    let root = ws.content_root();
    if !root.is_dir() {
        return Err(EdgeError::Config(format!(
            "Content directory does not exist: {}",
            root.display()
        )));
    }

    let cols = ws.collections().await?;
    let roots = CollectionRoots::new(&root).with_collections(ws.root(), &cols);
    let watched = watch_collections(
        roots,
        Arc::clone(ws.cache()),
        Duration::from_millis(cfg.debounce_ms),
    )?;
    info!("{} collection(s) under {}", cols.len(), root.display());
    eprintln!("watching {} (ctrl-c to stop)", root.display());

    tokio::signal::ctrl_c().await?;
    info!("{} change(s) applied", watched.applied());
    watched.stop().await;
    Ok(())
}
