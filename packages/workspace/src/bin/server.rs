use anyhow::Context;
use atelier_workspace::{
    router, BuildStore, FileStore, MemoryStore, NamespaceRegistry, Reconciler, ServerConfig,
};
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "atelier-server")]
#[command(about = "Server of record for Atelier builds", long_about = None)]
#[command(version)]
struct Args {
    /// Port to listen on
    #[arg(short, long)]
    port: Option<u16>,

    /// Address to bind
    #[arg(long)]
    host: Option<String>,

    /// Persist builds as JSON files in this directory
    #[arg(long)]
    data_dir: Option<PathBuf>,

    /// Config file (defaults to ./atelier.config.json when present)
    #[arg(short, long)]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let args = Args::parse();

    let mut config = match &args.config {
        Some(path) => ServerConfig::load_file(path)
            .with_context(|| format!("Failed to load config {}", path.display()))?,
        None => ServerConfig::load(std::env::current_dir()?)?,
    };

    // Flags override the file
    if let Some(port) = args.port {
        config.port = port;
    }
    if let Some(host) = args.host {
        config.host = host;
    }
    if let Some(data_dir) = args.data_dir {
        config.data_dir = Some(data_dir);
    }

    let store: Arc<dyn BuildStore> = match &config.data_dir {
        Some(dir) => Arc::new(
            FileStore::open(dir)
                .await
                .with_context(|| format!("Failed to open data dir {}", dir.display()))?,
        ),
        None => {
            tracing::warn!("no data dir configured, builds are kept in memory");
            Arc::new(MemoryStore::new())
        }
    };

    let namespaces = match &config.namespaces {
        Some(names) => NamespaceRegistry::with_generic(names.iter().cloned()),
        None => NamespaceRegistry::default(),
    };
    tracing::info!(?namespaces, "namespace allow-list");

    let reconciler = Arc::new(Reconciler::new(store, namespaces));
    let app = router(reconciler);

    let address = config.bind_address();
    let listener = tokio::net::TcpListener::bind(&address)
        .await
        .with_context(|| format!("Failed to bind {}", address))?;

    tracing::info!(%address, "atelier server listening");
    axum::serve(listener, app).await?;

    Ok(())
}
