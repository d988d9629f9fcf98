use std::env;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use anyhow::Context;
use catlab_db::CategoryLabelDatabase;
use catlab_normalize::Normalizer;
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;
use tracing::{Level, info};
use tracing_subscriber::EnvFilter;

use catlab_slu::{AppState, SluPreprocessing, router};

const DEFAULT_PORT: u16 = 8080;
const DEFAULT_HOST: &str = "0.0.0.0";
const DEFAULT_CLDB_PATH: &str = "cldb.json";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();

    let config = load_config();
    info!("binding to {}:{}", config.host, config.port);
    info!("using category label database at {}", config.cldb_path.display());
    if !config.normalize {
        info!("input normalization disabled");
    }

    let start = Instant::now();
    let cldb = CategoryLabelDatabase::from_file(&config.cldb_path)?;
    info!(
        "database loaded in {} ms ({} forms, {} homonyms)",
        start.elapsed().as_millis(),
        cldb.form_count(),
        cldb.homonyms().count()
    );

    let normalizer = match &config.normalization_path {
        Some(path) => Normalizer::load(path)?,
        None => Normalizer::default(),
    };
    info!("{} normalization rules", normalizer.rules().len());

    let state = AppState {
        preprocessing: Arc::new(SluPreprocessing::new(Arc::new(cldb), normalizer)),
        normalize: config.normalize,
    };

    let app = router(state).layer(TraceLayer::new_for_http());
    let addr: SocketAddr = format!("{}:{}", config.host, config.port)
        .parse()
        .context("invalid listen address")?;
    let listener = TcpListener::bind(addr).await?;

    axum::serve(listener, app).await?;
    Ok(())
}

#[derive(Debug, Clone)]
struct Config {
    host: String,
    port: u16,
    cldb_path: PathBuf,
    normalization_path: Option<PathBuf>,
    normalize: bool,
}

fn load_config() -> Config {
    let mut normalize = true;
    let mut cli_cldb: Option<PathBuf> = None;
    let mut cli_normalization: Option<PathBuf> = None;
    let mut args = env::args().skip(1);
    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--no-normalize" => normalize = false,
            "--cldb" => {
                if let Some(path) = args.next() {
                    cli_cldb = Some(PathBuf::from(path));
                }
            }
            _ => {
                if let Some(path) = arg.strip_prefix("--cldb=") {
                    cli_cldb = Some(PathBuf::from(path));
                } else if let Some(path) = arg.strip_prefix("--normalization=") {
                    cli_normalization = Some(PathBuf::from(path));
                }
            }
        }
    }

    let host = env::var("HOST").unwrap_or_else(|_| DEFAULT_HOST.to_string());
    let port = env::var("PORT")
        .ok()
        .and_then(|p| p.parse::<u16>().ok())
        .unwrap_or(DEFAULT_PORT);
    let cldb_path = cli_cldb
        .or_else(|| env::var("CLDB_PATH").ok().map(PathBuf::from))
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CLDB_PATH));
    let normalization_path =
        cli_normalization.or_else(|| env::var("NORMALIZATION_PATH").ok().map(PathBuf::from));

    Config {
        host,
        port,
        cldb_path,
        normalization_path,
        normalize,
    }
}

fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new("info"))
        .unwrap_or_else(|_| EnvFilter::new("info"));
    let max_level = env_filter
        .max_level_hint()
        .and_then(|hint| hint.into_level())
        .unwrap_or(Level::INFO);
    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .with_level(true)
        .with_max_level(max_level)
        .init();
}
