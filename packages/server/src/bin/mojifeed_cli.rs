//! Command-line access to the ingestion, search and live feed pipelines.
//!
//! Talks to the same Postgres database as the server and prints JSON.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use base64::Engine;
use clap::{Parser, Subcommand};
use mojifeed_core::config::Config;
use mojifeed_core::domains::emoji::actions::{
    ingest_upload, search_records, FeedParams, SearchParams, SearchResponse, UploadRequest,
};
use mojifeed_core::domains::emoji::{
    search_debouncer, EmojiResult, FeedState, FeedStatus, HubFeedSource, LiveFeed, Record,
    SearchOutcome,
};
use mojifeed_core::kernel::ServerDeps;
use serde::Serialize;
use sqlx::postgres::PgPoolOptions;
use tokio::io::{AsyncBufReadExt, BufReader};

#[derive(Parser)]
#[command(name = "mojifeed_cli")]
#[command(about = "Ingest photos and search emoji descriptions")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Turn a JPEG/PNG photo into a stored emoji or sticker
    Ingest { path: PathBuf },

    /// Semantic search over descriptions
    Search {
        query: String,
        #[arg(long)]
        limit: Option<u32>,
        #[arg(long)]
        threshold: Option<f64>,
    },

    /// Most recent records, newest first
    Recent {
        #[arg(long)]
        limit: Option<u32>,
    },

    /// Search as you type: one query per stdin line, debounced
    Interactive {
        #[arg(long, default_value_t = 300)]
        debounce_ms: u64,
    },

    /// Watch the live feed while ingesting photo paths read from stdin
    Feed,
}

#[derive(Serialize)]
struct Response<T: Serialize> {
    success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    data: Option<T>,
}

fn output<T: Serialize>(data: T) -> Result<()> {
    let resp = Response {
        success: true,
        message: None,
        data: Some(data),
    };
    println!("{}", serde_json::to_string(&resp)?);
    Ok(())
}

fn output_error(message: String) -> Result<()> {
    let resp: Response<()> = Response {
        success: false,
        message: Some(message),
        data: None,
    };
    println!("{}", serde_json::to_string(&resp)?);
    Ok(())
}

async fn connect(config: &Config) -> Result<ServerDeps> {
    let pool = PgPoolOptions::new()
        .max_connections(2)
        .connect(&config.database_url)
        .await
        .context("Failed to connect to database")?;
    ServerDeps::from_config(config, pool)
}

fn mime_for(path: &Path) -> Result<&'static str> {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase());
    match ext.as_deref() {
        Some("png") => Ok("image/png"),
        Some("jpg") | Some("jpeg") => Ok("image/jpeg"),
        _ => bail!("Only .png, .jpg and .jpeg files are supported"),
    }
}

async fn read_upload(path: &Path) -> Result<UploadRequest> {
    let mime_type = mime_for(path)?;
    let bytes = tokio::fs::read(path)
        .await
        .with_context(|| format!("Failed to read {}", path.display()))?;

    Ok(UploadRequest {
        file: Some(base64::engine::general_purpose::STANDARD.encode(&bytes)),
        mime_type: Some(mime_type.to_string()),
    })
}

async fn cmd_ingest(deps: &ServerDeps, path: &Path) -> Result<()> {
    let request = read_upload(path).await?;
    match ingest_upload(request, deps).await {
        Ok(record) => output(record),
        Err(e) => output_error(format!("{:#}", anyhow::Error::new(e))),
    }
}

async fn cmd_search(
    deps: &ServerDeps,
    query: String,
    limit: Option<u32>,
    threshold: Option<f64>,
) -> Result<()> {
    let params = SearchParams {
        q: Some(query),
        limit: limit.map(|l| l.to_string()),
        threshold: threshold.map(|t| t.to_string()),
    };
    match search_records(params, deps).await {
        Ok(response) => output(response),
        Err(e) => output_error(format!("{:#}", anyhow::Error::new(e))),
    }
}

async fn cmd_recent(deps: &ServerDeps, limit: Option<u32>) -> Result<()> {
    let limit = FeedParams {
        limit: limit.map(|l| l.to_string()),
    }
    .validate()?;
    output(deps.records.recent(limit as i64).await?)
}

async fn cmd_interactive(deps: ServerDeps, debounce_ms: u64) -> Result<()> {
    let mut debouncer = search_debouncer(deps).with_delay(Duration::from_millis(debounce_ms));
    let mut outcomes = debouncer.subscribe();
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut awaiting = false;

    loop {
        tokio::select! {
            line = lines.next_line() => match line? {
                Some(text) => {
                    awaiting = !text.trim().is_empty();
                    debouncer.input(&text);
                }
                None => break,
            },
            changed = outcomes.changed() => {
                if changed.is_err() {
                    return Ok(());
                }
                awaiting = false;
                print_outcome(&outcomes.borrow_and_update())?;
            }
        }
    }

    // Input closed with a search still pending: wait for it
    if awaiting
        && tokio::time::timeout(Duration::from_secs(60), outcomes.changed())
            .await
            .is_ok_and(|changed| changed.is_ok())
    {
        print_outcome(&outcomes.borrow_and_update())?;
    }
    Ok(())
}

fn print_outcome(outcome: &SearchOutcome<EmojiResult<SearchResponse>>) -> Result<()> {
    match outcome {
        SearchOutcome::Empty => output(Vec::<()>::new()),
        SearchOutcome::Ready {
            result: Ok(response),
            ..
        } => output(response),
        SearchOutcome::Ready {
            result: Err(e), ..
        } => output_error(e.to_string()),
    }
}

#[derive(Serialize)]
struct FeedSnapshot<'a> {
    status: FeedStatus,
    count: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    last_error: Option<&'a str>,
    records: &'a [Record],
}

fn print_feed(state: &FeedState) -> Result<()> {
    output(FeedSnapshot {
        status: state.status,
        count: state.items.len(),
        last_error: state.last_error.as_deref(),
        records: state.items.records(),
    })
}

async fn cmd_feed(deps: ServerDeps) -> Result<()> {
    let feed = LiveFeed::start(Arc::new(HubFeedSource::from_deps(&deps)));
    let mut state = feed.watch();
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    loop {
        tokio::select! {
            line = lines.next_line() => match line? {
                Some(path) if path.trim().is_empty() => {}
                Some(path) => {
                    let result = match read_upload(Path::new(path.trim())).await {
                        Ok(request) => ingest_upload(request, &deps).await.map_err(anyhow::Error::new),
                        Err(e) => Err(e),
                    };
                    // Successes show up through the feed itself
                    if let Err(e) = result {
                        output_error(format!("{}: {:#}", path.trim(), e))?;
                    }
                }
                None => break,
            },
            changed = state.changed() => {
                if changed.is_err() {
                    return Ok(());
                }
                print_feed(&state.borrow_and_update())?;
            }
        }
    }

    // Let the last insert land before the final snapshot
    let _ = tokio::time::timeout(Duration::from_secs(1), state.changed()).await;
    print_feed(&state.borrow_and_update())?;
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    // Logs go to stderr so stdout stays machine-readable
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "warn".into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = Config::from_env().context("Failed to load configuration")?;
    let deps = connect(&config).await?;

    match cli.command {
        Commands::Ingest { path } => cmd_ingest(&deps, &path).await,
        Commands::Search {
            query,
            limit,
            threshold,
        } => cmd_search(&deps, query, limit, threshold).await,
        Commands::Recent { limit } => cmd_recent(&deps, limit).await,
        Commands::Interactive { debounce_ms } => cmd_interactive(deps, debounce_ms).await,
        Commands::Feed => cmd_feed(deps).await,
    }
}
