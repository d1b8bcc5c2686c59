use std::sync::Arc;

use casbrowser::AppState;
use casbrowser_castore::actioncache::{self, DEFAULT_MAXIMUM_MESSAGE_SIZE_BYTES};
use casbrowser_castore::blobservice;
use clap::Parser;
use tracing::{info, Level};

/// Browse the contents of a Remote Execution CAS over HTTP.
#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Where blobs, directories and trees are read from.
    #[arg(long, env, default_value = "memory://")]
    cas_addr: String,

    /// Where action results are read from.
    #[arg(long, env, default_value = "memory://")]
    action_cache_addr: String,

    /// Trees and action results larger than this are refused.
    #[arg(long, env, default_value_t = DEFAULT_MAXIMUM_MESSAGE_SIZE_BYTES)]
    maximum_message_size_bytes: usize,

    /// A global log level to use when printing logs.
    /// It's also possible to set `RUST_LOG` according to
    /// `tracing_subscriber::filter::EnvFilter`, which will always have
    /// priority.
    #[arg(long, default_value_t = Level::INFO)]
    log_level: Level,

    /// Print logs as JSON objects, one per line.
    #[arg(long, env)]
    log_json: bool,

    /// The address to listen on.
    #[clap(flatten)]
    listen_args: tokio_listener::ListenerAddressLFlag,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let cli = Cli::parse();

    casbrowser_tracing::TracingBuilder::default()
        .level(cli.log_level)
        .json(cli.log_json)
        .build()?;

    let blob_service = blobservice::from_addr(&cli.cas_addr).await?;
    let action_cache =
        actioncache::from_addr(&cli.action_cache_addr, cli.maximum_message_size_bytes).await?;

    let state = AppState::new(
        Arc::from(blob_service),
        Arc::from(action_cache),
        cli.maximum_message_size_bytes,
    );

    let app = casbrowser::gen_router().with_state(state);

    let listen_address = &cli.listen_args.listen_address.unwrap_or_else(|| {
        "[::]:7984"
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
    .await?;

    Ok(())
}
