//! Command-line caller for `catalog_core`.
//!
//! # Responsibility
//! - Resolve configuration (environment, then flags), start logging and run
//!   one catalog use-case per invocation.
//! - Translate core errors into the same status codes the HTTP boundary uses.

use catalog_core::{
    init_logging, CancelSignal, CatalogConfig, CatalogError, CatalogService, CategoryPolicy,
    ItemId, JsonItemRepository, NewItemRequest, SqliteItemRepository, StorageBackend,
};
use clap::{Parser, Subcommand};
use log::info;
use serde_json::json;
use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;

/// Item catalog: content-addressed images and item records.
#[derive(Parser)]
#[command(name = "catalog")]
#[command(version, about, long_about = None)]
struct Cli {
    /// SQLite database file (overrides CATALOG_DB_PATH)
    #[arg(long)]
    db_path: Option<PathBuf>,

    /// JSON catalog file (overrides CATALOG_JSON_PATH)
    #[arg(long)]
    json_path: Option<PathBuf>,

    /// Image directory (overrides CATALOG_IMAGE_DIR)
    #[arg(long)]
    image_dir: Option<PathBuf>,

    /// Storage backend: sqlite|json (overrides CATALOG_BACKEND)
    #[arg(long)]
    backend: Option<String>,

    /// Category policy: lazy|strict (overrides CATALOG_CATEGORY_POLICY)
    #[arg(long)]
    category_policy: Option<String>,

    /// Log level (overrides CATALOG_LOG_LEVEL)
    #[arg(long)]
    log_level: Option<String>,

    /// Absolute log directory; stderr when unset (overrides CATALOG_LOG_DIR)
    #[arg(long)]
    log_dir: Option<PathBuf>,

    /// Abort the command after this many milliseconds
    #[arg(long)]
    timeout_ms: Option<u64>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Store an image and add an item referencing it
    Add {
        #[arg(long)]
        name: String,
        #[arg(long)]
        category: String,
        /// Image file to upload
        #[arg(long, value_name = "FILE")]
        image: PathBuf,
    },
    /// List every item
    List,
    /// Show one item by id
    Get {
        #[arg(value_name = "ID")]
        id: ItemId,
    },
    /// Search items by name (case-insensitive substring)
    Search {
        #[arg(value_name = "KEYWORD")]
        keyword: String,
    },
    /// Resolve an image file name to the path that would be served
    Image {
        #[arg(value_name = "FILENAME")]
        filename: String,
    },
    /// Pre-seed category labels (bootstrap data for strict mode)
    Seed {
        #[arg(value_name = "LABEL", required = true)]
        labels: Vec<String>,
    },
    /// Install the fallback image if none exists yet
    ProvisionDefault {
        #[arg(value_name = "FILE")]
        image: PathBuf,
    },
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    match run(cli) {
        Ok(output) => {
            println!("{output}");
            ExitCode::SUCCESS
        }
        Err(failure) => {
            eprintln!("{}", failure.to_json());
            ExitCode::FAILURE
        }
    }
}

/// Command failure with the HTTP-equivalent status it maps to.
struct Failure {
    status: u16,
    message: String,
}

impl Failure {
    fn usage(message: impl Into<String>) -> Self {
        Self {
            status: 400,
            message: message.into(),
        }
    }

    fn to_json(&self) -> serde_json::Value {
        json!({ "status": self.status, "error": self.message })
    }
}

impl From<CatalogError> for Failure {
    fn from(err: CatalogError) -> Self {
        Self {
            status: err.http_status(),
            message: err.to_string(),
        }
    }
}

fn run(cli: Cli) -> Result<serde_json::Value, Failure> {
    let config = resolve_config(&cli)?;
    init_logging(&config.log_level, config.log_dir.as_deref())
        .map_err(|err| Failure::usage(err.to_string()))?;
    info!(
        "event=cli_start module=cli status=ok backend={} policy={}",
        config.backend.as_str(),
        config.category_policy.as_str()
    );

    let cancel = match cli.timeout_ms {
        Some(ms) => CancelSignal::with_timeout(Duration::from_millis(ms)),
        None => CancelSignal::none(),
    };

    let open = || CatalogService::from_config(&config);
    let output = match cli.command {
        Command::Add {
            name,
            category,
            image,
        } => {
            let bytes = std::fs::read(&image).map_err(|err| {
                Failure::usage(format!("failed to read {}: {err}", image.display()))
            })?;
            let request = NewItemRequest {
                name,
                category,
                image: bytes,
            };
            json!({ "item": open()?.add_item(&request, &cancel)? })
        }
        Command::List => json!({ "items": open()?.load_items(&cancel)? }),
        Command::Get { id } => json!({ "item": open()?.get_item_by_id(id, &cancel)? }),
        Command::Search { keyword } => {
            json!({ "items": open()?.search_items_by_name(&keyword, &cancel)? })
        }
        Command::Image { filename } => {
            let path = open()?.get_image(&filename, &cancel)?;
            json!({ "path": path.display().to_string() })
        }
        Command::ProvisionDefault { image } => {
            let bytes = std::fs::read(&image).map_err(|err| {
                Failure::usage(format!("failed to read {}: {err}", image.display()))
            })?;
            let service = open()?;
            let written = service
                .image_store()
                .ensure_default_image(&bytes, &cancel)
                .map_err(CatalogError::from)?;
            json!({
                "path": service.image_store().default_image_path().display().to_string(),
                "written": written,
            })
        }
        Command::Seed { labels } => seed(&config, &labels, &cancel)?,
    };
    Ok(output)
}

fn seed(
    config: &CatalogConfig,
    labels: &[String],
    cancel: &CancelSignal,
) -> Result<serde_json::Value, Failure> {
    let categories = match config.backend {
        StorageBackend::Sqlite => {
            let repo = SqliteItemRepository::open(&config.db_path, config.category_policy)
                .map_err(CatalogError::from)?;
            repo.seed_categories(labels, cancel)
                .map_err(CatalogError::from)?
                .into_iter()
                .map(|category| category.name)
                .collect::<Vec<_>>()
        }
        StorageBackend::Json => {
            let repo = JsonItemRepository::new(&config.json_path, config.category_policy);
            repo.seed_categories(labels, cancel)
                .map_err(CatalogError::from)?
        }
    };
    Ok(json!({ "categories": categories }))
}

fn resolve_config(cli: &Cli) -> Result<CatalogConfig, Failure> {
    let mut config = CatalogConfig::from_env().map_err(|err| Failure::usage(err.to_string()))?;
    if let Some(path) = &cli.db_path {
        config.db_path = path.clone();
    }
    if let Some(path) = &cli.json_path {
        config.json_path = path.clone();
    }
    if let Some(dir) = &cli.image_dir {
        config.image_dir = dir.clone();
    }
    if let Some(value) = &cli.backend {
        config.backend = StorageBackend::parse(value)
            .ok_or_else(|| Failure::usage(format!("unknown backend `{value}`")))?;
    }
    if let Some(value) = &cli.category_policy {
        config.category_policy = CategoryPolicy::parse(value)
            .ok_or_else(|| Failure::usage(format!("unknown category policy `{value}`")))?;
    }
    if let Some(level) = &cli.log_level {
        config.log_level = level.clone();
    }
    if let Some(dir) = &cli.log_dir {
        config.log_dir = Some(dir.clone());
    }
    Ok(config)
}
