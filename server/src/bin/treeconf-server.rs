use clap::Parser;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, Level};
use treeconf_resolver::{store, Refresher, SnapshotManager};
use treeconf_server::AppState;

/// Serve a configuration tree to services over HTTP.
#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Where the tree is stored, e.g. `sqlite:///var/lib/treeconf/tree.db`.
    #[arg(long, env, default_value = "sqlite:///var/lib/treeconf/tree.db")]
    store_addr: String,

    /// Seconds between two checks of the store for changes.
    #[arg(long, env, default_value_t = 5, value_parser = clap::value_parser!(u64).range(1..))]
    refresh_interval: u64,

    /// The log level. RUST_LOG takes precedence.
    #[arg(long, env, default_value_t = Level::INFO)]
    log_level: Level,

    /// Log in JSON.
    #[arg(long, env)]
    json: bool,

    /// The address to listen on.
    #[clap(flatten)]
    listen_args: tokio_listener::ListenerAddressLFlag,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let cli = Cli::parse();

    treeconf_tracing::TracingBuilder::default()
        .level(cli.log_level)
        .json(cli.json)
        .build()?;

    let tree_store = store::from_addr(&cli.store_addr).await?;
    let snapshots = Arc::new(SnapshotManager::new());
    let refresher = Arc::new(Refresher::new(tree_store, snapshots.clone()));

    // refuse to serve anything until the tree loaded once
    refresher.load_initial().await?;
    let refresh_handle =
        refresher.start_background_refresh(Duration::from_secs(cli.refresh_interval));

    let app = treeconf_server::gen_router(AppState::new(snapshots));

    let listen_address = &cli.listen_args.listen_address.unwrap_or_else(|| {
        "[::]:8000"
            .parse()
            .expect("invalid fallback listen address")
    });

    let listener = tokio_listener::Listener::bind(
        listen_address,
        &Default::default(),
        &cli.listen_args.listener_options,
    )
    .await?;

    info!(listen_address=%listen_address, "starting daemon");

    tokio_listener::axum07::serve(
        listener,
        app.into_make_service_with_connect_info::<tokio_listener::SomeSocketAddrClonable>(),
    )
    .with_graceful_shutdown(async {
        let _ = tokio::signal::ctrl_c().await;
        info!("interrupted, shutting down");
    })
    .await?;

    refresh_handle.shutdown().await?;

    Ok(())
}
